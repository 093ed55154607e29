//! JSON Schema serializer and deserializer
//!
//! Payloads are UTF-8 JSON documents after the usual five byte header.
//! Values are validated against the schema before they are framed and after
//! they are read.
//!
//! The schema's `title` is its record name and must be present. Referenced
//! schemas are made available to `$ref` under their reference name.

use crate::config::SerializerConfig;
use crate::context::SerializationContext;
use crate::error::{SerdeError, SerdeResult};
use crate::schema::SchemaInput;
use crate::subject::KnownSubjects;
use crate::wire;
use bytes::{BufMut, BytesMut};
use jsonschema::JSONSchema;
use parking_lot::Mutex;
use schema_registry_client::{Schema, SchemaId, SchemaRegistryClient, SchemaType};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Base URI relative `$ref`s are resolved against
const DEFAULT_BASE_URI: &str = "json-schema:///";

fn parse_document(schema: &Schema) -> SerdeResult<JsonValue> {
    serde_json::from_str(schema.schema_str()).map_err(|e| SerdeError::SchemaParse(e.to_string()))
}

/// Referenced documents keyed by reference name, depth first
fn resolve_documents(
    client: &SchemaRegistryClient,
    schema: &Schema,
    visited: &mut HashSet<(String, u32)>,
    documents: &mut HashMap<String, JsonValue>,
) -> SerdeResult<()> {
    for reference in schema.references() {
        if !visited.insert((reference.subject.clone(), reference.version)) {
            continue;
        }
        let registered = client.get_version(&reference.subject, reference.version)?;
        resolve_documents(client, &registered.schema, visited, documents)?;
        documents.insert(reference.name.clone(), parse_document(&registered.schema)?);
        debug!(
            subject = %reference.subject,
            version = reference.version,
            name = %reference.name,
            "Resolved schema reference"
        );
    }
    Ok(())
}

/// A compiled schema and the record name taken from its title
struct Validator {
    compiled: JSONSchema,
    title: Option<String>,
}

impl Validator {
    fn compile(client: &SchemaRegistryClient, schema: &Schema) -> SerdeResult<Self> {
        let document = parse_document(schema)?;
        let title = document
            .get("title")
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        let mut documents = HashMap::new();
        resolve_documents(client, schema, &mut HashSet::new(), &mut documents)?;

        let mut options = JSONSchema::options();
        for (name, referenced) in documents {
            if !name.contains("://") {
                options.with_document(format!("{}{}", DEFAULT_BASE_URI, name), referenced.clone());
            }
            options.with_document(name, referenced);
        }
        let compiled = options
            .compile(&document)
            .map_err(|e| SerdeError::SchemaParse(e.to_string()))?;

        Ok(Self { compiled, title })
    }

    fn validate(&self, value: &JsonValue) -> Result<(), String> {
        self.compiled.validate(value).map_err(|errors| {
            errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        })
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

/// Frames JSON values validated against a JSON Schema
#[derive(Debug)]
pub struct JsonSerializer {
    client: Arc<SchemaRegistryClient>,
    schema: Schema,
    validator: Validator,
    config: SerializerConfig,
    known_subjects: KnownSubjects,
}

impl JsonSerializer {
    /// Create a serializer for `schema`, which must carry a `title`
    pub fn new(
        client: Arc<SchemaRegistryClient>,
        schema: impl Into<SchemaInput>,
        config: SerializerConfig,
    ) -> SerdeResult<Self> {
        config.validate()?;
        let schema = schema.into().into_schema(SchemaType::Json)?;
        if parse_document(&schema)?.get("title").is_none() {
            return Err(SerdeError::SchemaParse(
                "Missing required JSON schema annotation title".to_string(),
            ));
        }
        let validator = Validator::compile(&client, &schema)?;

        Ok(Self {
            client,
            schema,
            validator,
            config,
            known_subjects: KnownSubjects::new(),
        })
    }

    /// The schema's title
    pub fn record_name(&self) -> Option<&str> {
        self.validator.title.as_deref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate and frame a JSON value; `None` passes through as `None`
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
        self.validator.validate(value).map_err(SerdeError::Encode)?;
        let schema_id = self
            .known_subjects
            .resolve(&self.client, &self.config, &subject, || Ok(self.schema.clone()))?;

        let payload = serde_json::to_vec(value)?;
        let mut buf = BytesMut::with_capacity(wire::HEADER_LEN + payload.len());
        wire::write_header(&mut buf, schema_id);
        buf.put_slice(&payload);
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

/// Decodes and validates framed JSON messages
#[derive(Debug)]
pub struct JsonDeserializer {
    client: Arc<SchemaRegistryClient>,
    reader: Option<Validator>,
    writers: Mutex<HashMap<SchemaId, Arc<Validator>>>,
}

impl JsonDeserializer {
    /// Validate each message against the schema it was written with
    pub fn new(client: Arc<SchemaRegistryClient>) -> Self {
        Self {
            client,
            reader: None,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Validate every message against `schema`
    pub fn with_reader_schema(
        client: Arc<SchemaRegistryClient>,
        schema: impl Into<SchemaInput>,
    ) -> SerdeResult<Self> {
        let schema = schema.into().into_schema(SchemaType::Json)?;
        let reader = Validator::compile(&client, &schema)?;
        Ok(Self {
            reader: Some(reader),
            ..Self::new(client)
        })
    }

    fn writer_validator(&self, schema_id: SchemaId) -> SerdeResult<Arc<Validator>> {
        if let Some(validator) = self.writers.lock().get(&schema_id) {
            return Ok(validator.clone());
        }

        let schema = self.client.get_schema(schema_id)?;
        if schema.schema_type() != SchemaType::Json {
            return Err(SerdeError::Type(format!(
                "schema {} is {}, not JSON",
                schema_id,
                schema.schema_type()
            )));
        }
        let validator = Arc::new(Validator::compile(&self.client, &schema)?);

        Ok(self
            .writers
            .lock()
            .entry(schema_id)
            .or_insert(validator)
            .clone())
    }

    /// Decode and validate a framed message; `None` passes through as `None`
    pub fn deserialize(
        &self,
        data: Option<&[u8]>,
        _ctx: &SerializationContext,
    ) -> SerdeResult<Option<JsonValue>> {
        let Some(data) = data else {
            return Ok(None);
        };

        let (schema_id, payload) = wire::parse_header(data)?;
        let value: JsonValue =
            serde_json::from_slice(payload).map_err(|e| SerdeError::Decode(e.to_string()))?;

        let result = match &self.reader {
            Some(reader) => reader.validate(&value),
            None => self.writer_validator(schema_id)?.validate(&value),
        };
        result.map_err(SerdeError::Decode)?;

        Ok(Some(value))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SubjectNameStrategy;
    use schema_registry_client::{Method, MockSchemaRegistry, SchemaReference};
    use serde::Deserialize;
    use serde_json::json;

    const ORDER: &str = r#"{
        "title": "Order",
        "type": "object",
        "properties": {"id": {"type": "string"}, "qty": {"type": "integer", "minimum": 1}},
        "required": ["id"]
    }"#;

    fn setup() -> (Arc<MockSchemaRegistry>, Arc<SchemaRegistryClient>) {
        let mock = Arc::new(MockSchemaRegistry::new());
        let client = Arc::new(SchemaRegistryClient::with_service(mock.clone()));
        (mock, client)
    }

    fn ctx() -> SerializationContext {
        SerializationContext::value("orders")
    }

    #[test]
    fn test_round_trip() {
        let (_mock, client) = setup();
        let serializer = JsonSerializer::new(client.clone(), ORDER, SerializerConfig::default()).unwrap();
        let value = json!({"id": "abc", "qty": 2});
        let bytes = serializer.serialize_value(Some(&value), &ctx()).unwrap().unwrap();

        let id = client.get_latest_version("orders-value").unwrap().schema_id;
        let mut header = vec![0u8];
        header.extend_from_slice(&id.as_u32().to_be_bytes());
        assert_eq!(&bytes[..5], header.as_slice());
        assert_eq!(&bytes[5..], serde_json::to_vec(&value).unwrap().as_slice());

        let decoded = JsonDeserializer::new(client).deserialize(Some(&bytes), &ctx()).unwrap();
        assert_eq!(decoded, Some(value));
    }

    #[test]
    fn test_title_required() {
        let (mock, client) = setup();
        let err = JsonSerializer::new(client, r#"{"type": "object"}"#, SerializerConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("title"));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_invalid_value_not_framed() {
        let (mock, client) = setup();
        let serializer = JsonSerializer::new(client, ORDER, SerializerConfig::default()).unwrap();
        let err = serializer
            .serialize_value(Some(&json!({"qty": 0})), &ctx())
            .unwrap_err();
        assert!(matches!(err, SerdeError::Encode(_)));
        assert_eq!(mock.count(Method::Post), 0);
    }

    #[test]
    fn test_record_name_strategy_uses_title() {
        let (_mock, client) = setup();
        let config =
            SerializerConfig::default().with_subject_name_strategy(SubjectNameStrategy::RecordName);
        let serializer = JsonSerializer::new(client.clone(), ORDER, config).unwrap();
        serializer
            .serialize_value(Some(&json!({"id": "a"})), &ctx())
            .unwrap();
        assert_eq!(client.get_subjects().unwrap(), vec!["Order".to_string()]);
    }

    #[test]
    fn test_reader_schema_validation() {
        let (_mock, client) = setup();
        let serializer = JsonSerializer::new(client.clone(), ORDER, SerializerConfig::default()).unwrap();
        let bytes = serializer
            .serialize_value(Some(&json!({"id": "a"})), &ctx())
            .unwrap();

        let strict = r#"{"title": "Order", "type": "object", "required": ["id", "qty"]}"#;
        let deserializer = JsonDeserializer::with_reader_schema(client, strict).unwrap();
        let err = deserializer.deserialize(bytes.as_deref(), &ctx()).unwrap_err();
        assert!(matches!(err, SerdeError::Decode(_)));
    }

    #[test]
    fn test_writer_validator_cached() {
        let (mock, client) = setup();
        let serializer = JsonSerializer::new(client, ORDER, SerializerConfig::default()).unwrap();
        let bytes = serializer
            .serialize_value(Some(&json!({"id": "a"})), &ctx())
            .unwrap();

        let deserializer =
            JsonDeserializer::new(Arc::new(SchemaRegistryClient::with_service(mock.clone())));
        mock.clear_requests();
        for _ in 0..3 {
            deserializer.deserialize(bytes.as_deref(), &ctx()).unwrap();
        }
        assert_eq!(mock.count(Method::Get), 1);
    }

    #[test]
    fn test_malformed_payload() {
        let (_mock, client) = setup();
        let deserializer = JsonDeserializer::with_reader_schema(client, ORDER).unwrap();
        let err = deserializer
            .deserialize(Some(&[0, 0, 0, 0, 1, b'{']), &ctx())
            .unwrap_err();
        assert!(matches!(err, SerdeError::Decode(_)));

        let err = deserializer.deserialize(Some(&[0, 0, 0, 1]), &ctx()).unwrap_err();
        assert!(matches!(err, SerdeError::Framing(_)));
    }

    #[test]
    fn test_references_resolved_by_name() {
        let (_mock, client) = setup();
        let address = Schema::json(
            r#"{"type": "object", "properties": {"city": {"type": "string"}}, "required": ["city"]}"#,
        )
        .unwrap();
        client.register_schema("address", &address, false).unwrap();

        let customer = Schema::with_references(
            r#"{
                "title": "Customer",
                "type": "object",
                "properties": {"address": {"$ref": "https://example.com/address.json"}}
            }"#,
            SchemaType::Json,
            vec![SchemaReference::new("https://example.com/address.json", "address", 1)],
        )
        .unwrap();

        let serializer = JsonSerializer::new(client, customer, SerializerConfig::default()).unwrap();
        assert!(serializer
            .serialize_value(Some(&json!({"address": {"city": "Oslo"}})), &ctx())
            .is_ok());
        assert!(serializer
            .serialize_value(Some(&json!({"address": {"city": 7}})), &ctx())
            .is_err());
    }

    #[test]
    fn test_typed_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Order {
            id: String,
            qty: u32,
        }

        let (_mock, client) = setup();
        let serializer = JsonSerializer::new(client.clone(), ORDER, SerializerConfig::default()).unwrap();
        let order = Order {
            id: "x".into(),
            qty: 3,
        };
        let bytes = serializer.serialize(Some(&order), &ctx()).unwrap();
        let decoded: Option<Order> = JsonDeserializer::new(client)
            .deserialize_into(bytes.as_deref(), &ctx())
            .unwrap();
        assert_eq!(decoded, Some(order));
    }
}
