//! Avro serializer and deserializer
//!
//! Values travel as `serde_json::Value` and are converted against the parsed
//! schema: records are objects, enums are symbol strings, `bytes`, `fixed`,
//! `decimal` and `duration` are base64 strings, `uuid` and `big-decimal` are
//! strings, and a union accepts either the branch value itself or a
//! single-key `{"<type name>": value}` wrapper.
//!
//! Named types defined under other subjects are fetched through the schema's
//! references and parsed together with it.
//!
//! # Example
//!
//! ```rust,ignore
//! let serializer = AvroSerializer::new(client.clone(), ORDER_SCHEMA, SerializerConfig::default())?;
//! let bytes = serializer.serialize_value(Some(&json!({"id": "abc"})), &SerializationContext::value("orders"))?;
//!
//! let deserializer = AvroDeserializer::new(client);
//! let value = deserializer.deserialize(bytes.as_deref(), &SerializationContext::value("orders"))?;
//! ```

use crate::config::SerializerConfig;
use crate::context::SerializationContext;
use crate::error::{SerdeError, SerdeResult};
use crate::schema::{wrap_avro_primitive, SchemaInput};
use crate::subject::KnownSubjects;
use crate::wire;
use apache_avro::schema::{Name, Schema as AvroSchema};
use apache_avro::types::Value as AvroValue;
use apache_avro::{from_avro_datum_reader_schemata, to_avro_datum_schemata, Decimal, Duration};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bigdecimal::BigDecimal;
use bytes::{BufMut, BytesMut};
use parking_lot::Mutex;
use schema_registry_client::{Schema, SchemaId, SchemaRegistryClient, SchemaType};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const NAMED_TYPES: [&str; 4] = ["record", "error", "enum", "fixed"];

/// Record wrapping an unnamed top-level schema so it can be parsed with its
/// references
const ROOT_HOLDER: &str = "__SchemaRoot";

fn fullname(name: &Name) -> String {
    match name.namespace.as_deref() {
        Some(ns) if !ns.is_empty() => format!("{}.{}", ns, name.name),
        _ => name.name.clone(),
    }
}

fn parse_declaration(schema_str: &str) -> SerdeResult<JsonValue> {
    serde_json::from_str(&wrap_avro_primitive(schema_str))
        .map_err(|e| SerdeError::SchemaParse(e.to_string()))
}

fn schema_parse_error(e: apache_avro::Error) -> SerdeError {
    SerdeError::SchemaParse(e.to_string())
}

fn is_named(declaration: &JsonValue) -> bool {
    declaration
        .get("type")
        .and_then(JsonValue::as_str)
        .is_some_and(|kind| NAMED_TYPES.contains(&kind))
        && declaration.get("name").is_some()
}

/// Fetch the declarations behind `schema`'s references, depth first
///
/// `visited` holds the (subject, version) pairs already fetched, so shared
/// and cyclic references are read once.
fn resolve_references(
    client: &SchemaRegistryClient,
    schema: &Schema,
    visited: &mut HashSet<(String, u32)>,
    declarations: &mut Vec<String>,
) -> SerdeResult<()> {
    for reference in schema.references() {
        if !visited.insert((reference.subject.clone(), reference.version)) {
            continue;
        }
        let registered = client.get_version(&reference.subject, reference.version)?;
        resolve_references(client, &registered.schema, visited, declarations)?;

        declarations.push(parse_declaration(registered.schema.schema_str())?.to_string());
        debug!(
            subject = %reference.subject,
            version = reference.version,
            name = %reference.name,
            "Resolved schema reference"
        );
    }
    Ok(())
}

/// Parse `root` together with the referenced `declarations`
///
/// Returns the root schema and every parsed schema the encoder needs to
/// resolve named references.
fn parse_with_references(
    root: &JsonValue,
    mut declarations: Vec<String>,
) -> SerdeResult<(AvroSchema, Vec<AvroSchema>)> {
    let named = is_named(root);
    if named {
        declarations.push(root.to_string());
    } else {
        let holder = json!({
            "type": "record",
            "name": ROOT_HOLDER,
            "fields": [{"name": "value", "type": root}]
        });
        declarations.push(holder.to_string());
    }

    let inputs: Vec<&str> = declarations.iter().map(String::as_str).collect();
    let schemata = AvroSchema::parse_list(&inputs).map_err(schema_parse_error)?;

    let parsed = match schemata.last() {
        Some(root) if named => Some(root.clone()),
        Some(AvroSchema::Record(holder)) => holder.fields.first().map(|f| f.schema.clone()),
        _ => None,
    }
    .ok_or_else(|| SerdeError::SchemaParse("top-level schema missing after parsing".to_string()))?;

    Ok((parsed, schemata))
}

/// A registry schema parsed together with its referenced named types
#[derive(Debug)]
struct ParsedSchema {
    schema: AvroSchema,
    /// Schemas defining every name `schema` refers to, itself included
    schemata: Vec<AvroSchema>,
    names: HashMap<String, AvroSchema>,
    record_name: Option<String>,
}

impl ParsedSchema {
    fn resolve(client: &SchemaRegistryClient, schema: &Schema) -> SerdeResult<Self> {
        let mut declarations = Vec::new();
        resolve_references(client, schema, &mut HashSet::new(), &mut declarations)?;

        let declaration = parse_declaration(schema.schema_str())?;
        let (parsed, schemata) = if declarations.is_empty() {
            let parsed = AvroSchema::parse(&declaration).map_err(schema_parse_error)?;
            (parsed.clone(), vec![parsed])
        } else {
            parse_with_references(&declaration, declarations)?
        };

        let mut names = HashMap::new();
        for schema in &schemata {
            collect_names(schema, &mut names);
        }

        let record_name = match &parsed {
            AvroSchema::Union(_) => None,
            AvroSchema::Record(r) => Some(fullname(&r.name)),
            AvroSchema::Enum(e) => Some(fullname(&e.name)),
            AvroSchema::Fixed(f) => Some(fullname(&f.name)),
            // Primitives are named after their type
            _ => declaration
                .get("type")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
        };

        Ok(Self {
            schema: parsed,
            schemata,
            names,
            record_name,
        })
    }

    fn schemata(&self) -> Vec<&AvroSchema> {
        self.schemata.iter().collect()
    }

    /// Follow a named reference to its definition
    fn deref<'s>(&'s self, schema: &'s AvroSchema) -> &'s AvroSchema {
        match schema {
            AvroSchema::Ref { name } => self.names.get(&fullname(name)).unwrap_or(schema),
            other => other,
        }
    }

    fn to_avro(&self, json: &JsonValue) -> SerdeResult<AvroValue> {
        self.json_to_avro(json, &self.schema)
    }

    fn json_to_avro(&self, json: &JsonValue, schema: &AvroSchema) -> SerdeResult<AvroValue> {
        let schema = self.deref(schema);
        match (schema, json) {
            (AvroSchema::Null, JsonValue::Null) => Ok(AvroValue::Null),

            (AvroSchema::Boolean, JsonValue::Bool(b)) => Ok(AvroValue::Boolean(*b)),

            (AvroSchema::Int, JsonValue::Number(n)) => Ok(AvroValue::Int(as_i32(n)?)),
            (AvroSchema::Date, JsonValue::Number(n)) => Ok(AvroValue::Date(as_i32(n)?)),
            (AvroSchema::TimeMillis, JsonValue::Number(n)) => {
                Ok(AvroValue::TimeMillis(as_i32(n)?))
            }

            (AvroSchema::Long, JsonValue::Number(n)) => Ok(AvroValue::Long(as_i64(n)?)),
            (AvroSchema::TimeMicros, JsonValue::Number(n)) => {
                Ok(AvroValue::TimeMicros(as_i64(n)?))
            }
            (AvroSchema::TimestampMillis, JsonValue::Number(n)) => {
                Ok(AvroValue::TimestampMillis(as_i64(n)?))
            }
            (AvroSchema::TimestampMicros, JsonValue::Number(n)) => {
                Ok(AvroValue::TimestampMicros(as_i64(n)?))
            }
            (AvroSchema::LocalTimestampMillis, JsonValue::Number(n)) => {
                Ok(AvroValue::LocalTimestampMillis(as_i64(n)?))
            }
            (AvroSchema::LocalTimestampMicros, JsonValue::Number(n)) => {
                Ok(AvroValue::LocalTimestampMicros(as_i64(n)?))
            }
            (AvroSchema::TimestampNanos, JsonValue::Number(n)) => {
                Ok(AvroValue::TimestampNanos(as_i64(n)?))
            }
            (AvroSchema::LocalTimestampNanos, JsonValue::Number(n)) => {
                Ok(AvroValue::LocalTimestampNanos(as_i64(n)?))
            }

            (AvroSchema::Float, JsonValue::Number(n)) => Ok(AvroValue::Float(as_f64(n)? as f32)),
            (AvroSchema::Double, JsonValue::Number(n)) => Ok(AvroValue::Double(as_f64(n)?)),

            (AvroSchema::String, JsonValue::String(s)) => Ok(AvroValue::String(s.clone())),

            (AvroSchema::Bytes, JsonValue::String(s)) => Ok(AvroValue::Bytes(decode_base64(s)?)),

            (AvroSchema::Uuid, JsonValue::String(s)) => Uuid::parse_str(s)
                .map(AvroValue::Uuid)
                .map_err(|e| SerdeError::Encode(format!("Invalid uuid '{}': {}", s, e))),

            // Two's-complement big-endian unscaled value
            (AvroSchema::Decimal(_), JsonValue::String(s)) => {
                Ok(AvroValue::Decimal(Decimal::from(decode_base64(s)?)))
            }

            (AvroSchema::BigDecimal, JsonValue::String(s)) => BigDecimal::from_str(s)
                .map(AvroValue::BigDecimal)
                .map_err(|e| SerdeError::Encode(format!("Invalid big-decimal '{}': {}", s, e))),
            (AvroSchema::BigDecimal, JsonValue::Number(n)) => BigDecimal::from_str(&n.to_string())
                .map(AvroValue::BigDecimal)
                .map_err(|e| SerdeError::Encode(format!("Invalid big-decimal {}: {}", n, e))),

            // months, days and millis as little-endian u32s
            (AvroSchema::Duration, JsonValue::String(s)) => {
                let bytes: [u8; 12] = decode_base64(s)?.try_into().map_err(|b: Vec<u8>| {
                    SerdeError::Encode(format!("Duration must be 12 bytes, got {}", b.len()))
                })?;
                Ok(AvroValue::Duration(Duration::from(bytes)))
            }

            (AvroSchema::Array(array), JsonValue::Array(items)) => {
                let items: SerdeResult<Vec<_>> = items
                    .iter()
                    .map(|item| self.json_to_avro(item, &array.items))
                    .collect();
                Ok(AvroValue::Array(items?))
            }

            (AvroSchema::Map(map), JsonValue::Object(object)) => {
                let mut values = HashMap::with_capacity(object.len());
                for (k, v) in object {
                    values.insert(k.clone(), self.json_to_avro(v, &map.types)?);
                }
                Ok(AvroValue::Map(values))
            }

            (AvroSchema::Union(union), json) => {
                // A single-key object naming the branch selects it explicitly
                if let JsonValue::Object(object) = json {
                    if let (1, Some((key, value))) = (object.len(), object.iter().next()) {
                        for (idx, variant) in union.variants().iter().enumerate() {
                            if self.branch_matches(variant, key) {
                                if let Ok(v) = self.json_to_avro(value, variant) {
                                    return Ok(AvroValue::Union(idx as u32, Box::new(v)));
                                }
                            }
                        }
                    }
                }

                for (idx, variant) in union.variants().iter().enumerate() {
                    if let Ok(v) = self.json_to_avro(json, variant) {
                        return Ok(AvroValue::Union(idx as u32, Box::new(v)));
                    }
                }
                Err(SerdeError::Encode(format!(
                    "No matching union branch for: {}",
                    json
                )))
            }

            (AvroSchema::Record(record), JsonValue::Object(object)) => {
                let mut fields = Vec::with_capacity(record.fields.len());
                for field in &record.fields {
                    let value = if let Some(v) = object.get(&field.name) {
                        self.json_to_avro(v, &field.schema)?
                    } else if let Some(default) = &field.default {
                        self.json_to_avro(default, &field.schema)?
                    } else {
                        return Err(SerdeError::Encode(format!(
                            "Missing required field '{}' of {}",
                            field.name,
                            fullname(&record.name)
                        )));
                    };
                    fields.push((field.name.clone(), value));
                }
                Ok(AvroValue::Record(fields))
            }

            (AvroSchema::Enum(enum_schema), JsonValue::String(s)) => {
                match enum_schema.symbols.iter().position(|sym| sym == s) {
                    Some(pos) => Ok(AvroValue::Enum(pos as u32, s.clone())),
                    None => Err(SerdeError::Encode(format!(
                        "Invalid symbol '{}' for enum {}",
                        s,
                        fullname(&enum_schema.name)
                    ))),
                }
            }

            (AvroSchema::Fixed(fixed), JsonValue::String(s)) => {
                let bytes = decode_base64(s)?;
                if bytes.len() != fixed.size {
                    return Err(SerdeError::Encode(format!(
                        "Fixed size mismatch: expected {}, got {}",
                        fixed.size,
                        bytes.len()
                    )));
                }
                Ok(AvroValue::Fixed(fixed.size, bytes))
            }

            (schema, json) => Err(SerdeError::Encode(format!(
                "Value {} does not match schema {}",
                json,
                type_name(schema)
            ))),
        }
    }

    fn branch_matches(&self, variant: &AvroSchema, key: &str) -> bool {
        match self.deref(variant) {
            AvroSchema::Record(r) => key == fullname(&r.name) || key == r.name.name,
            AvroSchema::Enum(e) => key == fullname(&e.name) || key == e.name.name,
            AvroSchema::Fixed(f) => key == fullname(&f.name) || key == f.name.name,
            other => key == type_name(other),
        }
    }

    fn to_json(&self, value: &AvroValue, return_record_name: bool) -> SerdeResult<JsonValue> {
        self.avro_to_json(value, Some(&self.schema), return_record_name)
    }

    fn avro_to_json(
        &self,
        value: &AvroValue,
        schema: Option<&AvroSchema>,
        return_record_name: bool,
    ) -> SerdeResult<JsonValue> {
        let schema = schema.map(|s| self.deref(s));
        match value {
            AvroValue::Null => Ok(JsonValue::Null),
            AvroValue::Boolean(b) => Ok(JsonValue::Bool(*b)),
            AvroValue::Int(i) | AvroValue::Date(i) | AvroValue::TimeMillis(i) => {
                Ok(JsonValue::from(*i))
            }
            AvroValue::Long(l)
            | AvroValue::TimeMicros(l)
            | AvroValue::TimestampMillis(l)
            | AvroValue::TimestampMicros(l)
            | AvroValue::LocalTimestampMillis(l)
            | AvroValue::LocalTimestampMicros(l)
            | AvroValue::TimestampNanos(l)
            | AvroValue::LocalTimestampNanos(l) => Ok(JsonValue::from(*l)),
            AvroValue::Float(f) => Ok(json!(*f)),
            AvroValue::Double(d) => Ok(json!(*d)),
            AvroValue::String(s) => Ok(JsonValue::String(s.clone())),
            AvroValue::Uuid(u) => Ok(JsonValue::String(u.to_string())),
            AvroValue::Bytes(b) | AvroValue::Fixed(_, b) => Ok(JsonValue::String(STANDARD.encode(b))),
            AvroValue::Decimal(d) => {
                let bytes = Vec::<u8>::try_from(d)
                    .map_err(|e| SerdeError::Decode(format!("Invalid decimal: {}", e)))?;
                Ok(JsonValue::String(STANDARD.encode(bytes)))
            }
            AvroValue::BigDecimal(d) => Ok(JsonValue::String(d.to_string())),
            AvroValue::Duration(d) => {
                let bytes: [u8; 12] = (*d).into();
                Ok(JsonValue::String(STANDARD.encode(bytes)))
            }
            AvroValue::Enum(_, symbol) => Ok(JsonValue::String(symbol.clone())),
            AvroValue::Array(items) => {
                let item_schema = match schema {
                    Some(AvroSchema::Array(array)) => Some(&*array.items),
                    _ => None,
                };
                let items: SerdeResult<Vec<_>> = items
                    .iter()
                    .map(|item| self.avro_to_json(item, item_schema, return_record_name))
                    .collect();
                Ok(JsonValue::Array(items?))
            }
            AvroValue::Map(values) => {
                let value_schema = match schema {
                    Some(AvroSchema::Map(map)) => Some(&*map.types),
                    _ => None,
                };
                let mut object = Map::new();
                for (k, v) in values {
                    object.insert(k.clone(), self.avro_to_json(v, value_schema, return_record_name)?);
                }
                Ok(JsonValue::Object(object))
            }
            AvroValue::Record(fields) => {
                let record = match schema {
                    Some(AvroSchema::Record(record)) => Some(record),
                    _ => None,
                };
                let mut object = Map::new();
                for (name, v) in fields {
                    let field_schema = record.and_then(|r| {
                        r.lookup
                            .get(name)
                            .and_then(|&position| r.fields.get(position))
                            .map(|field| &field.schema)
                    });
                    object.insert(
                        name.clone(),
                        self.avro_to_json(v, field_schema, return_record_name)?,
                    );
                }
                Ok(JsonValue::Object(object))
            }
            AvroValue::Union(idx, inner) => {
                let branch = match schema {
                    Some(AvroSchema::Union(union)) => union
                        .variants()
                        .get(*idx as usize)
                        .map(|variant| self.deref(variant)),
                    _ => None,
                };
                let json = self.avro_to_json(inner, branch, return_record_name)?;
                match branch {
                    Some(AvroSchema::Record(record)) if return_record_name => {
                        let mut named = Map::new();
                        named.insert(fullname(&record.name), json);
                        Ok(JsonValue::Object(named))
                    }
                    _ => Ok(json),
                }
            }
            other => Err(SerdeError::Decode(format!(
                "Unsupported Avro value: {:?}",
                other
            ))),
        }
    }
}

fn collect_names(schema: &AvroSchema, names: &mut HashMap<String, AvroSchema>) {
    match schema {
        AvroSchema::Record(record) => {
            names.insert(fullname(&record.name), schema.clone());
            for field in &record.fields {
                collect_names(&field.schema, names);
            }
        }
        AvroSchema::Enum(e) => {
            names.insert(fullname(&e.name), schema.clone());
        }
        AvroSchema::Fixed(f) => {
            names.insert(fullname(&f.name), schema.clone());
        }
        AvroSchema::Array(array) => collect_names(&array.items, names),
        AvroSchema::Map(map) => collect_names(&map.types, names),
        AvroSchema::Union(union) => {
            for variant in union.variants() {
                collect_names(variant, names);
            }
        }
        _ => {}
    }
}

fn type_name(schema: &AvroSchema) -> &'static str {
    match schema {
        AvroSchema::Null => "null",
        AvroSchema::Boolean => "boolean",
        AvroSchema::Int => "int",
        AvroSchema::Long => "long",
        AvroSchema::Float => "float",
        AvroSchema::Double => "double",
        AvroSchema::Bytes => "bytes",
        AvroSchema::String => "string",
        AvroSchema::Array(_) => "array",
        AvroSchema::Map(_) => "map",
        AvroSchema::Union(_) => "union",
        AvroSchema::Record(_) => "record",
        AvroSchema::Enum(_) => "enum",
        AvroSchema::Fixed(_) => "fixed",
        _ => "logical",
    }
}

fn as_i32(n: &serde_json::Number) -> SerdeResult<i32> {
    let i = as_i64(n)?;
    i32::try_from(i).map_err(|_| SerdeError::Encode(format!("Value {} out of i32 range", i)))
}

fn as_i64(n: &serde_json::Number) -> SerdeResult<i64> {
    n.as_i64()
        .ok_or_else(|| SerdeError::Encode(format!("Expected an integer, got {}", n)))
}

fn as_f64(n: &serde_json::Number) -> SerdeResult<f64> {
    n.as_f64()
        .ok_or_else(|| SerdeError::Encode(format!("Expected a number, got {}", n)))
}

fn decode_base64(s: &str) -> SerdeResult<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| SerdeError::Encode(format!("Invalid base64: {}", e)))
}

/// Frames values with a registered Avro schema
#[derive(Debug)]
pub struct AvroSerializer {
    client: Arc<SchemaRegistryClient>,
    schema: Schema,
    parsed: ParsedSchema,
    config: SerializerConfig,
    known_subjects: KnownSubjects,
}

impl AvroSerializer {
    /// Create a serializer for `schema`
    ///
    /// Fails on invalid configuration before contacting the registry.
    /// Schema references are resolved here.
    pub fn new(
        client: Arc<SchemaRegistryClient>,
        schema: impl Into<SchemaInput>,
        config: SerializerConfig,
    ) -> SerdeResult<Self> {
        config.validate()?;
        let schema = schema.into().into_schema(SchemaType::Avro)?;
        let parsed = ParsedSchema::resolve(&client, &schema)?;

        Ok(Self {
            client,
            schema,
            parsed,
            config,
            known_subjects: KnownSubjects::new(),
        })
    }

    /// Name handed to the subject name strategy
    ///
    /// The full name for named types, the type name for primitives, and
    /// `None` for unions.
    pub fn record_name(&self) -> Option<&str> {
        self.parsed.record_name.as_deref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Serialize a JSON value; `None` passes through as `None`
    pub fn serialize_value(
        &self,
        value: Option<&JsonValue>,
        ctx: &SerializationContext,
    ) -> SerdeResult<Option<Vec<u8>>> {
        let Some(value) = value else {
            return Ok(None);
        };

        let subject = self
            .config
            .subject_name_strategy
            .subject(ctx, self.record_name())?;
        let datum = to_avro_datum_schemata(
            &self.parsed.schema,
            self.parsed.schemata(),
            self.parsed.to_avro(value)?,
        )?;
        let schema_id = self
            .known_subjects
            .resolve(&self.client, &self.config, &subject, || Ok(self.schema.clone()))?;

        let mut buf = BytesMut::with_capacity(wire::HEADER_LEN + datum.len());
        wire::write_header(&mut buf, schema_id);
        buf.put_slice(&datum);
        Ok(Some(buf.to_vec()))
    }

    /// Serialize any `Serialize` value through its JSON form
    pub fn serialize<T: Serialize + ?Sized>(
        &self,
        value: Option<&T>,
        ctx: &SerializationContext,
    ) -> SerdeResult<Option<Vec<u8>>> {
        let value = value.map(serde_json::to_value).transpose()?;
        self.serialize_value(value.as_ref(), ctx)
    }
}

/// Decodes framed Avro messages
#[derive(Debug)]
pub struct AvroDeserializer {
    client: Arc<SchemaRegistryClient>,
    reader: Option<ParsedSchema>,
    return_record_name: bool,
    writers: Mutex<HashMap<SchemaId, Arc<ParsedSchema>>>,
}

impl AvroDeserializer {
    /// Decode with each message's writer schema
    pub fn new(client: Arc<SchemaRegistryClient>) -> Self {
        Self {
            client,
            reader: None,
            return_record_name: false,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve every message into `schema`
    pub fn with_reader_schema(
        client: Arc<SchemaRegistryClient>,
        schema: impl Into<SchemaInput>,
    ) -> SerdeResult<Self> {
        let schema = schema.into().into_schema(SchemaType::Avro)?;
        let reader = ParsedSchema::resolve(&client, &schema)?;
        Ok(Self {
            reader: Some(reader),
            ..Self::new(client)
        })
    }

    /// Decode record branches of unions as `{"<full name>": record}`
    pub fn with_return_record_name(mut self, return_record_name: bool) -> Self {
        self.return_record_name = return_record_name;
        self
    }

    fn writer_schema(&self, schema_id: SchemaId) -> SerdeResult<Arc<ParsedSchema>> {
        if let Some(parsed) = self.writers.lock().get(&schema_id) {
            return Ok(parsed.clone());
        }

        let schema = self.client.get_schema(schema_id)?;
        if schema.schema_type() != SchemaType::Avro {
            return Err(SerdeError::Type(format!(
                "schema {} is {}, not AVRO",
                schema_id,
                schema.schema_type()
            )));
        }
        let parsed = Arc::new(ParsedSchema::resolve(&self.client, &schema)?);

        Ok(self
            .writers
            .lock()
            .entry(schema_id)
            .or_insert(parsed)
            .clone())
    }

    /// Decode a framed message; `None` passes through as `None`
    pub fn deserialize(
        &self,
        data: Option<&[u8]>,
        _ctx: &SerializationContext,
    ) -> SerdeResult<Option<JsonValue>> {
        let Some(data) = data else {
            return Ok(None);
        };

        let (schema_id, mut payload) = wire::parse_header(data)?;
        let writer = self.writer_schema(schema_id)?;
        let value = from_avro_datum_reader_schemata(
            &writer.schema,
            writer.schemata(),
            &mut payload,
            self.reader.as_ref().map(|r| &r.schema),
            self.reader.as_ref().map(ParsedSchema::schemata).unwrap_or_default(),
        )
        .map_err(|e| SerdeError::Decode(e.to_string()))?;

        let shape = self.reader.as_ref().unwrap_or(writer.as_ref());
        shape.to_json(&value, self.return_record_name).map(Some)
    }

    /// Decode straight into a `Deserialize` type
    pub fn deserialize_into<T: DeserializeOwned>(
        &self,
        data: Option<&[u8]>,
        ctx: &SerializationContext,
    ) -> SerdeResult<Option<T>> {
        self.deserialize(data, ctx)?
            .map(|value| serde_json::from_value(value).map_err(|e| SerdeError::Decode(e.to_string())))
            .transpose()
    }
}
