//! Protobuf serializer and deserializer
//!
//! Messages are described at runtime by `prost-reflect` descriptors, so both
//! generated types (anything implementing [`ReflectMessage`]) and
//! [`DynamicMessage`]s can be framed.
//!
//! The registered schema is the message's file descriptor, serialized and
//! base64 encoded. Imported files are registered as references under the
//! reference subject name strategy before the message's own subject.
//!
//! ```text
//! ┌──────┬───────────┬───────────────────┬────────────────┐
//! │ 0x00 │ schema id │ message indexes   │ protobuf bytes │
//! └──────┴───────────┴───────────────────┴────────────────┘
//! ```

use crate::config::{ProtobufDeserializerConfig, ProtobufSerializerConfig};
use crate::context::SerializationContext;
use crate::error::{SerdeError, SerdeResult};
use crate::subject::KnownSubjects;
use crate::wire;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use prost::Message;
use prost_reflect::{
    DynamicMessage, FieldDescriptor, FileDescriptor, Kind, MapKey, MessageDescriptor,
    ReflectMessage, Value as ProtoValue,
};
use schema_registry_client::{Schema, SchemaReference, SchemaRegistryClient};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const KNOWN_TYPES_PREFIX: &str = "google/protobuf/";

/// Registry schema string for a file: its descriptor proto, base64 encoded
fn schema_string(file: &FileDescriptor) -> String {
    STANDARD.encode(file.file_descriptor_proto().encode_to_vec())
}

/// Path from the file's top-level messages down to `descriptor`
///
/// `[0]` is the first top-level message; `[1, 0]` the first message nested
/// in the second top-level message.
pub fn message_indexes(descriptor: &MessageDescriptor) -> SerdeResult<Vec<i64>> {
    let not_found = || {
        SerdeError::Type(format!(
            "message {} not found in its parent",
            descriptor.full_name()
        ))
    };

    let mut indexes = Vec::new();
    let mut current = descriptor.clone();
    while let Some(parent) = current.parent_message() {
        let position = parent
            .child_messages()
            .position(|m| m.full_name() == current.full_name())
            .ok_or_else(not_found)?;
        indexes.push(position as i64);
        current = parent;
    }

    let position = current
        .parent_file()
        .messages()
        .position(|m| m.full_name() == current.full_name())
        .ok_or_else(not_found)?;
    indexes.push(position as i64);

    indexes.reverse();
    Ok(indexes)
}

/// Frames Protobuf messages of one type
#[derive(Debug)]
pub struct ProtobufSerializer {
    client: Arc<SchemaRegistryClient>,
    descriptor: MessageDescriptor,
    message_indexes: Vec<i64>,
    schema: Schema,
    config: ProtobufSerializerConfig,
    known_subjects: KnownSubjects,
}

impl ProtobufSerializer {
    /// Create a serializer for messages described by `descriptor`
    ///
    /// Fails on invalid configuration before contacting the registry.
    pub fn new(
        client: Arc<SchemaRegistryClient>,
        descriptor: MessageDescriptor,
        config: ProtobufSerializerConfig,
    ) -> SerdeResult<Self> {
        config.validate()?;
        if config.deprecated_format() {
            warn!(
                message = %descriptor.full_name(),
                "Writing message indexes in the deprecated non zig-zag format"
            );
        }

        let message_indexes = message_indexes(&descriptor)?;
        let schema = Schema::protobuf(schema_string(&descriptor.parent_file()))?;

        Ok(Self {
            client,
            descriptor,
            message_indexes,
            schema,
            config,
            known_subjects: KnownSubjects::new(),
        })
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// Registry schema without references
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn message_indexes(&self) -> &[i64] {
        &self.message_indexes
    }

    /// Register (or look up) each imported file, depth first
    fn resolve_dependencies(
        &self,
        ctx: &SerializationContext,
        file: &FileDescriptor,
    ) -> SerdeResult<Vec<SchemaReference>> {
        let mut references = Vec::new();
        for dependency in file.dependencies() {
            if self.config.skip_known_types && dependency.name().starts_with(KNOWN_TYPES_PREFIX) {
                continue;
            }

            let dependency_references = self.resolve_dependencies(ctx, &dependency)?;
            let subject = self
                .config
                .reference_subject_name_strategy
                .subject(ctx, &dependency);
            let schema = Schema::protobuf(schema_string(&dependency))?
                .set_references(dependency_references);

            let normalize = self.config.serializer.normalize_schemas;
            if self.config.serializer.auto_register_schemas {
                self.client.register_schema(&subject, &schema, normalize)?;
            }
            let registered = self.client.lookup_schema(&subject, &schema, normalize)?;

            debug!(
                file = %dependency.name(),
                subject = %subject,
                version = registered.version,
                "Resolved protobuf dependency"
            );
            references.push(SchemaReference::new(
                dependency.name(),
                subject,
                registered.version,
            ));
        }
        Ok(references)
    }

    /// Serialize a generated or dynamic message; `None` passes through as `None`
    pub fn serialize<M: ReflectMessage>(
        &self,
        message: Option<&M>,
        ctx: &SerializationContext,
    ) -> SerdeResult<Option<Vec<u8>>> {
        let Some(message) = message else {
            return Ok(None);
        };

        let descriptor = message.descriptor();
        if descriptor.full_name() != self.descriptor.full_name() {
            return Err(SerdeError::Type(format!(
                "message must be of type {} not {}",
                self.descriptor.full_name(),
                descriptor.full_name()
            )));
        }

        let subject = self
            .config
            .serializer
            .subject_name_strategy
            .subject(ctx, Some(self.descriptor.full_name()))?;
        let schema_id = self.known_subjects.resolve(
            &self.client,
            &self.config.serializer,
            &subject,
            || {
                let references =
                    self.resolve_dependencies(ctx, &self.descriptor.parent_file())?;
                Ok(self.schema.clone().set_references(references))
            },
        )?;

        let mut buf = BytesMut::with_capacity(wire::HEADER_LEN + 1 + message.encoded_len());
        wire::write_header(&mut buf, schema_id);
        wire::encode_message_indexes(
            &mut buf,
            &self.message_indexes,
            !self.config.deprecated_format(),
        );
        message
            .encode(&mut buf)
            .map_err(|e| SerdeError::Encode(e.to_string()))?;
        Ok(Some(buf.to_vec()))
    }

    /// Serialize a JSON object shaped like the message
    pub fn serialize_value(
        &self,
        value: Option<&JsonValue>,
        ctx: &SerializationContext,
    ) -> SerdeResult<Option<Vec<u8>>> {
        let message = value
            .map(|v| json_to_proto_message(v, &self.descriptor))
            .transpose()?;
        self.serialize(message.as_ref(), ctx)
    }
}

/// Decodes framed Protobuf messages of one type
///
/// Protobuf payloads decode without their writer schema, so the registry is
/// never consulted.
#[derive(Debug)]
pub struct ProtobufDeserializer {
    descriptor: MessageDescriptor,
    config: ProtobufDeserializerConfig,
}

impl ProtobufDeserializer {
    pub fn new(
        descriptor: MessageDescriptor,
        config: ProtobufDeserializerConfig,
    ) -> SerdeResult<Self> {
        config.validate()?;
        Ok(Self { descriptor, config })
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// Strip the header and message indexes, returning the protobuf bytes
    fn payload<'a>(&self, data: &'a [u8]) -> SerdeResult<&'a [u8]> {
        let (_schema_id, mut payload) = wire::parse_header(data)?;
        wire::decode_message_indexes(&mut payload, !self.config.deprecated_format())?;
        Ok(payload)
    }

    /// Decode into a [`DynamicMessage`]; `None` passes through as `None`
    pub fn deserialize(
        &self,
        data: Option<&[u8]>,
        _ctx: &SerializationContext,
    ) -> SerdeResult<Option<DynamicMessage>> {
        let Some(data) = data else {
            return Ok(None);
        };
        let payload = self.payload(data)?;
        Ok(Some(DynamicMessage::decode(self.descriptor.clone(), payload)?))
    }

    /// Decode into a generated message type
    pub fn deserialize_message<M: Message + Default>(
        &self,
        data: Option<&[u8]>,
        _ctx: &SerializationContext,
    ) -> SerdeResult<Option<M>> {
        let Some(data) = data else {
            return Ok(None);
        };
        let payload = self.payload(data)?;
        Ok(Some(M::decode(payload)?))
    }

    /// Decode into a JSON object keyed by field name
    pub fn deserialize_value(
        &self,
        data: Option<&[u8]>,
        ctx: &SerializationContext,
    ) -> SerdeResult<Option<JsonValue>> {
        self.deserialize(data, ctx)?
            .map(|message| proto_message_to_json(&message))
            .transpose()
    }

    /// Decode through the JSON form into a `Deserialize` type
    pub fn deserialize_into<T: DeserializeOwned>(
        &self,
        data: Option<&[u8]>,
        ctx: &SerializationContext,
    ) -> SerdeResult<Option<T>> {
        self.deserialize_value(data, ctx)?
            .map(|value| serde_json::from_value(value).map_err(|e| SerdeError::Decode(e.to_string())))
            .transpose()
    }
}

/// Build a message from a JSON object keyed by field name or JSON name
pub fn json_to_proto_message(
    json: &JsonValue,
    descriptor: &MessageDescriptor,
) -> SerdeResult<DynamicMessage> {
    let JsonValue::Object(object) = json else {
        return Err(SerdeError::Encode(format!(
            "Expected JSON object for {}",
            descriptor.full_name()
        )));
    };

    let mut message = DynamicMessage::new(descriptor.clone());
    for field in descriptor.fields() {
        let Some(value) = object
            .get(field.name())
            .or_else(|| object.get(field.json_name()))
        else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        let proto_value = if field.is_map() {
            json_to_proto_map(value, &field)?
        } else if field.is_list() {
            let JsonValue::Array(items) = value else {
                return Err(field_error(&field, "expected an array"));
            };
            let items: SerdeResult<Vec<_>> = items
                .iter()
                .map(|item| json_to_proto_value(item, &field))
                .collect();
            ProtoValue::List(items?)
        } else {
            json_to_proto_value(value, &field)?
        };

        message
            .try_set_field(&field, proto_value)
            .map_err(|e| field_error(&field, &e.to_string()))?;
    }
    Ok(message)
}

fn field_error(field: &FieldDescriptor, message: &str) -> SerdeError {
    SerdeError::Encode(format!("field {}: {}", field.full_name(), message))
}

fn json_to_proto_map(json: &JsonValue, field: &FieldDescriptor) -> SerdeResult<ProtoValue> {
    let (JsonValue::Object(object), Kind::Message(entry)) = (json, field.kind()) else {
        return Err(field_error(field, "expected an object"));
    };
    let key_field = entry.map_entry_key_field();
    let value_field = entry.map_entry_value_field();

    let mut map = HashMap::with_capacity(object.len());
    for (k, v) in object {
        let key = match key_field.kind() {
            Kind::String => MapKey::String(k.clone()),
            Kind::Bool => MapKey::Bool(parse_key(k, &key_field)?),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => MapKey::I32(parse_key(k, &key_field)?),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => MapKey::I64(parse_key(k, &key_field)?),
            Kind::Uint32 | Kind::Fixed32 => MapKey::U32(parse_key(k, &key_field)?),
            Kind::Uint64 | Kind::Fixed64 => MapKey::U64(parse_key(k, &key_field)?),
            _ => return Err(field_error(field, "unsupported map key type")),
        };
        map.insert(key, json_to_proto_value(v, &value_field)?);
    }
    Ok(ProtoValue::Map(map))
}

fn parse_key<T: std::str::FromStr>(key: &str, field: &FieldDescriptor) -> SerdeResult<T> {
    key.parse()
        .map_err(|_| field_error(field, &format!("invalid map key '{}'", key)))
}

/// Convert a single (non-repeated) JSON value for `field`
fn json_to_proto_value(json: &JsonValue, field: &FieldDescriptor) -> SerdeResult<ProtoValue> {
    match field.kind() {
        Kind::Double => json
            .as_f64()
            .map(ProtoValue::F64)
            .ok_or_else(|| field_error(field, "expected double")),
        Kind::Float => json
            .as_f64()
            .map(|v| ProtoValue::F32(v as f32))
            .ok_or_else(|| field_error(field, "expected float")),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => json
            .as_i64()
            .map(ProtoValue::I64)
            .ok_or_else(|| field_error(field, "expected int64")),
        Kind::Uint64 | Kind::Fixed64 => json
            .as_u64()
            .map(ProtoValue::U64)
            .ok_or_else(|| field_error(field, "expected uint64")),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            let v = json
                .as_i64()
                .ok_or_else(|| field_error(field, "expected int32"))?;
            i32::try_from(v)
                .map(ProtoValue::I32)
                .map_err(|_| field_error(field, &format!("value {} out of i32 range", v)))
        }
        Kind::Uint32 | Kind::Fixed32 => {
            let v = json
                .as_u64()
                .ok_or_else(|| field_error(field, "expected uint32"))?;
            u32::try_from(v)
                .map(ProtoValue::U32)
                .map_err(|_| field_error(field, &format!("value {} out of u32 range", v)))
        }
        Kind::Bool => json
            .as_bool()
            .map(ProtoValue::Bool)
            .ok_or_else(|| field_error(field, "expected bool")),
        Kind::String => json
            .as_str()
            .map(|s| ProtoValue::String(s.to_string()))
            .ok_or_else(|| field_error(field, "expected string")),
        Kind::Bytes => {
            let encoded = json
                .as_str()
                .ok_or_else(|| field_error(field, "expected base64 string"))?;
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|e| field_error(field, &format!("invalid base64: {}", e)))?;
            Ok(ProtoValue::Bytes(Bytes::from(bytes)))
        }
        Kind::Enum(enum_descriptor) => {
            if let Some(name) = json.as_str() {
                enum_descriptor
                    .get_value_by_name(name)
                    .map(|v| ProtoValue::EnumNumber(v.number()))
                    .ok_or_else(|| field_error(field, &format!("unknown enum value {}", name)))
            } else {
                let n = json
                    .as_i64()
                    .ok_or_else(|| field_error(field, "expected enum name or number"))?;
                i32::try_from(n)
                    .map(ProtoValue::EnumNumber)
                    .map_err(|_| field_error(field, &format!("enum value {} out of range", n)))
            }
        }
        Kind::Message(message_descriptor) => Ok(ProtoValue::Message(json_to_proto_message(
            json,
            &message_descriptor,
        )?)),
    }
}

/// Set fields of a message as a JSON object keyed by field name
pub fn proto_message_to_json(message: &DynamicMessage) -> SerdeResult<JsonValue> {
    let mut object = Map::new();
    for field in message.descriptor().fields() {
        if message.has_field(&field) || field.is_list() || field.is_map() {
            let value = message.get_field(&field);
            object.insert(field.name().to_string(), proto_value_to_json(&value, &field)?);
        }
    }
    Ok(JsonValue::Object(object))
}

fn proto_value_to_json(value: &ProtoValue, field: &FieldDescriptor) -> SerdeResult<JsonValue> {
    match value {
        ProtoValue::Bool(v) => Ok(JsonValue::Bool(*v)),
        ProtoValue::I32(v) => Ok(JsonValue::from(*v)),
        ProtoValue::I64(v) => Ok(JsonValue::from(*v)),
        ProtoValue::U32(v) => Ok(JsonValue::from(*v)),
        ProtoValue::U64(v) => Ok(JsonValue::from(*v)),
        ProtoValue::F32(v) => Ok(float_to_json(f64::from(*v))),
        ProtoValue::F64(v) => Ok(float_to_json(*v)),
        ProtoValue::String(v) => Ok(JsonValue::String(v.clone())),
        ProtoValue::Bytes(v) => Ok(JsonValue::String(STANDARD.encode(v))),
        ProtoValue::EnumNumber(v) => {
            if let Kind::Enum(enum_descriptor) = field.kind() {
                if let Some(ev) = enum_descriptor.get_value(*v) {
                    return Ok(JsonValue::String(ev.name().to_string()));
                }
            }
            Ok(JsonValue::from(*v))
        }
        ProtoValue::Message(m) => proto_message_to_json(m),
        ProtoValue::List(items) => {
            let items: SerdeResult<Vec<_>> = items
                .iter()
                .map(|item| proto_value_to_json(item, field))
                .collect();
            Ok(JsonValue::Array(items?))
        }
        ProtoValue::Map(map) => {
            let value_field = match field.kind() {
                Kind::Message(entry) => entry.map_entry_value_field(),
                _ => return Err(field_error(field, "map field without entry message")),
            };
            let mut object = Map::new();
            for (k, v) in map {
                let key = match k {
                    MapKey::Bool(b) => b.to_string(),
                    MapKey::I32(i) => i.to_string(),
                    MapKey::I64(i) => i.to_string(),
                    MapKey::U32(u) => u.to_string(),
                    MapKey::U64(u) => u.to_string(),
                    MapKey::String(s) => s.clone(),
                };
                object.insert(key, proto_value_to_json(v, &value_field)?);
            }
            Ok(JsonValue::Object(object))
        }
    }
}

fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_reflect::DescriptorPool;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
        MessageOptions,
    };
    use schema_registry_client::{Method, MockSchemaRegistry, SchemaType};
    use serde_json::json;

    fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(ty as i32),
            json_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
        FieldDescriptorProto {
            type_name: Some(type_name.to_string()),
            ..field(name, number, Type::Message)
        }
    }

    fn repeated(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
        field.label = Some(Label::Repeated as i32);
        field
    }

    fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
        DescriptorProto {
            name: Some(name.to_string()),
            field: fields,
            ..Default::default()
        }
    }

    /// `shop/orders.proto` importing `common/money.proto` and
    /// `google/protobuf/empty.proto`
    fn pool() -> DescriptorPool {
        let empty = FileDescriptorProto {
            name: Some("google/protobuf/empty.proto".to_string()),
            package: Some("google.protobuf".to_string()),
            message_type: vec![message("Empty", vec![])],
            syntax: Some("proto3".to_string()),
            ..Default::default()
        };
        let money = FileDescriptorProto {
            name: Some("common/money.proto".to_string()),
            package: Some("common".to_string()),
            message_type: vec![message(
                "Money",
                vec![field("currency", 1, Type::String), field("units", 2, Type::Int64)],
            )],
            syntax: Some("proto3".to_string()),
            ..Default::default()
        };

        let counts_entry = DescriptorProto {
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..message(
                "CountsEntry",
                vec![field("key", 1, Type::String), field("value", 2, Type::Int32)],
            )
        };
        let order = DescriptorProto {
            nested_type: vec![
                counts_entry,
                message("Line", vec![field("sku", 1, Type::String)]),
            ],
            ..message(
                "Order",
                vec![
                    field("id", 1, Type::String),
                    message_field("total", 2, ".common.Money"),
                    repeated(field("tags", 3, Type::String)),
                    repeated(message_field("counts", 4, ".shop.Order.CountsEntry")),
                    repeated(message_field("lines", 5, ".shop.Order.Line")),
                ],
            )
        };
        let orders = FileDescriptorProto {
            name: Some("shop/orders.proto".to_string()),
            package: Some("shop".to_string()),
            dependency: vec![
                "common/money.proto".to_string(),
                "google/protobuf/empty.proto".to_string(),
            ],
            message_type: vec![
                order,
                message("Ping", vec![message_field("empty", 1, ".google.protobuf.Empty")]),
            ],
            syntax: Some("proto3".to_string()),
            ..Default::default()
        };

        DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
            file: vec![empty, money, orders],
        })
        .unwrap()
    }

    fn descriptor(name: &str) -> MessageDescriptor {
        pool().get_message_by_name(name).unwrap()
    }

    fn setup() -> (Arc<MockSchemaRegistry>, Arc<SchemaRegistryClient>) {
        let mock = Arc::new(MockSchemaRegistry::new());
        let client = Arc::new(SchemaRegistryClient::with_service(mock.clone()));
        (mock, client)
    }

    fn ctx() -> SerializationContext {
        SerializationContext::value("orders")
    }

    fn order_json() -> JsonValue {
        json!({
            "id": "o-1",
            "total": {"currency": "EUR", "units": 42},
            "tags": ["gift"],
            "counts": {"apples": 3},
            "lines": [{"sku": "A-1"}]
        })
    }

    #[test]
    fn test_message_indexes() {
        assert_eq!(message_indexes(&descriptor("shop.Order")).unwrap(), vec![0]);
        assert_eq!(message_indexes(&descriptor("shop.Ping")).unwrap(), vec![1]);
        // CountsEntry sits before Line among Order's nested types
        assert_eq!(message_indexes(&descriptor("shop.Order.Line")).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_round_trip() {
        let (_mock, client) = setup();
        let serializer = ProtobufSerializer::new(
            client,
            descriptor("shop.Order"),
            ProtobufSerializerConfig::new(false),
        )
        .unwrap();

        let bytes = serializer
            .serialize_value(Some(&order_json()), &ctx())
            .unwrap()
            .unwrap();
        assert_eq!(bytes[0], 0x00);
        // [0] is a single zero byte after the header
        assert_eq!(bytes[5], 0x00);

        let deserializer =
            ProtobufDeserializer::new(descriptor("shop.Order"), ProtobufDeserializerConfig::new(false))
                .unwrap();
        let decoded = deserializer.deserialize_value(Some(&bytes), &ctx()).unwrap();
        assert_eq!(decoded, Some(order_json()));
    }

    #[test]
    fn test_dependencies_registered_as_references() {
        let (mock, client) = setup();
        let serializer = ProtobufSerializer::new(
            client.clone(),
            descriptor("shop.Order"),
            ProtobufSerializerConfig::new(false),
        )
        .unwrap();
        serializer
            .serialize_value(Some(&order_json()), &ctx())
            .unwrap();

        let subjects = client.get_subjects().unwrap();
        assert_eq!(
            subjects,
            vec![
                "common/money.proto".to_string(),
                "google/protobuf/empty.proto".to_string(),
                "orders-value".to_string()
            ]
        );

        let registered = client.get_latest_version("orders-value").unwrap();
        assert_eq!(registered.schema.schema_type(), SchemaType::Protobuf);
        assert_eq!(
            registered.schema.references(),
            &[
                SchemaReference::new("common/money.proto", "common/money.proto", 1),
                SchemaReference::new("google/protobuf/empty.proto", "google/protobuf/empty.proto", 1),
            ]
        );

        // Second message: no further registry traffic
        mock.clear_requests();
        serializer
            .serialize_value(Some(&order_json()), &ctx())
            .unwrap();
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_skip_known_types() {
        let (_mock, client) = setup();
        let config = ProtobufSerializerConfig::new(false).with_skip_known_types(true);
        let serializer = ProtobufSerializer::new(client.clone(), descriptor("shop.Ping"), config).unwrap();
        serializer
            .serialize_value(Some(&json!({"empty": {}})), &ctx())
            .unwrap();

        let subjects = client.get_subjects().unwrap();
        assert!(!subjects.iter().any(|s| s.starts_with("google/protobuf/")));
        let registered = client.get_latest_version("orders-value").unwrap();
        assert_eq!(registered.schema.references().len(), 1);
    }

    #[test]
    fn test_schema_is_base64_file_descriptor() {
        let (_mock, client) = setup();
        let order = descriptor("shop.Order");
        let serializer =
            ProtobufSerializer::new(client, order.clone(), ProtobufSerializerConfig::new(false)).unwrap();

        let raw = STANDARD.decode(serializer.schema().schema_str()).unwrap();
        let file = FileDescriptorProto::decode(raw.as_slice()).unwrap();
        assert_eq!(file.name(), "shop/orders.proto");
        assert_eq!(&file, order.parent_file().file_descriptor_proto());
    }

    #[test]
    fn test_nested_message_deprecated_format() {
        let (_mock, client) = setup();
        let line = descriptor("shop.Order.Line");
        let serializer = ProtobufSerializer::new(
            client,
            line.clone(),
            ProtobufSerializerConfig::new(true),
        )
        .unwrap();
        let bytes = serializer
            .serialize_value(Some(&json!({"sku": "A-1"})), &ctx())
            .unwrap()
            .unwrap();
        assert_eq!(&bytes[5..8], &[0x02, 0x00, 0x01]);

        // A zig-zag reader misreads the length
        let zigzag = ProtobufDeserializer::new(line.clone(), ProtobufDeserializerConfig::new(false))
            .unwrap();
        let plain = ProtobufDeserializer::new(line, ProtobufDeserializerConfig::new(true)).unwrap();
        let decoded = plain.deserialize_value(Some(&bytes), &ctx()).unwrap();
        assert_eq!(decoded, Some(json!({"sku": "A-1"})));
        assert_ne!(zigzag.deserialize_value(Some(&bytes), &ctx()).ok().flatten(), decoded);
    }

    #[test]
    fn test_wrong_message_type_rejected() {
        let (mock, client) = setup();
        let serializer = ProtobufSerializer::new(
            client,
            descriptor("shop.Order"),
            ProtobufSerializerConfig::new(false),
        )
        .unwrap();
        let ping = DynamicMessage::new(descriptor("shop.Ping"));
        let err = serializer.serialize(Some(&ping), &ctx()).unwrap_err();
        assert!(matches!(err, SerdeError::Type(_)));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_deprecated_format_must_be_set() {
        let (mock, client) = setup();
        let config = ProtobufSerializerConfig::default();
        let err = ProtobufSerializer::new(client, descriptor("shop.Order"), config).unwrap_err();
        assert!(matches!(err, SerdeError::Config(_)));
        assert!(mock.requests().is_empty());

        let err = ProtobufDeserializer::new(
            descriptor("shop.Order"),
            ProtobufDeserializerConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SerdeError::Config(_)));
    }

    #[test]
    fn test_use_latest_skips_dependencies() {
        let (mock, client) = setup();
        let order = descriptor("shop.Order");
        client
            .register_schema(
                "orders-value",
                &Schema::protobuf(schema_string(&order.parent_file())).unwrap(),
                false,
            )
            .unwrap();
        mock.clear_requests();

        let mut config = ProtobufSerializerConfig::new(false);
        config.serializer = config
            .serializer
            .with_auto_register(false)
            .with_use_latest_version(true);
        let serializer = ProtobufSerializer::new(client, order, config).unwrap();
        serializer
            .serialize_value(Some(&json!({"id": "x"})), &ctx())
            .unwrap();

        assert_eq!(mock.requests().len(), 1);
        assert_eq!(mock.count(Method::Get), 1);
    }

    #[test]
    fn test_none_and_framing() {
        let deserializer =
            ProtobufDeserializer::new(descriptor("shop.Order"), ProtobufDeserializerConfig::new(false))
                .unwrap();
        assert!(deserializer.deserialize(None, &ctx()).unwrap().is_none());
        assert!(matches!(
            deserializer.deserialize(Some(&[0, 0, 0, 0, 1]), &ctx()),
            Err(SerdeError::Framing(_))
        ));
        assert!(matches!(
            deserializer.deserialize(Some(&[2, 0, 0, 0, 1, 0]), &ctx()),
            Err(SerdeError::Framing(_))
        ));
    }

    #[test]
    fn test_decode_into_prost_message() {
        #[derive(Clone, PartialEq, prost::Message)]
        struct Line {
            #[prost(string, tag = "1")]
            sku: String,
        }

        let (_mock, client) = setup();
        let line = descriptor("shop.Order.Line");
        let serializer =
            ProtobufSerializer::new(client, line.clone(), ProtobufSerializerConfig::new(false)).unwrap();
        let bytes = serializer
            .serialize_value(Some(&json!({"sku": "B-2"})), &ctx())
            .unwrap();

        let deserializer = ProtobufDeserializer::new(line, ProtobufDeserializerConfig::new(false)).unwrap();
        let decoded: Option<Line> = deserializer.deserialize_message(bytes.as_deref(), &ctx()).unwrap();
        assert_eq!(decoded, Some(Line { sku: "B-2".into() }));
    }
}
