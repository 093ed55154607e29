//! Integration tests for schema-registry-serdes
//!
//! Every format is driven through the public API against the in-memory
//! registry.

use prost_reflect::DescriptorPool;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet};
use schema_registry_client::{Method, MockSchemaRegistry, Schema, SchemaRegistryClient};
use schema_registry_serdes::{
    AvroDeserializer, AvroSerializer, JsonDeserializer, JsonSerializer, ProtobufDeserializer,
    ProtobufDeserializerConfig, ProtobufSerializer, ProtobufSerializerConfig, SerdeError,
    SerializationContext, SerializerConfig, SubjectNameStrategy,
};
use serde_json::json;
use std::sync::Arc;

const ORDER_AVRO: &str = r#"{
    "type": "record",
    "name": "Order",
    "namespace": "shop",
    "fields": [
        {"name": "id", "type": "string"},
        {"name": "qty", "type": "int"}
    ]
}"#;

const ORDER_JSON: &str = r#"{
    "title": "Order",
    "type": "object",
    "properties": {"id": {"type": "string"}, "qty": {"type": "integer"}},
    "required": ["id", "qty"]
}"#;

fn setup() -> (Arc<MockSchemaRegistry>, Arc<SchemaRegistryClient>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("schema_registry_serdes=debug")
        .with_test_writer()
        .try_init();

    let mock = Arc::new(MockSchemaRegistry::new());
    let client = Arc::new(SchemaRegistryClient::with_service(mock.clone()));
    (mock, client)
}

fn order_pool() -> DescriptorPool {
    let field = |name: &str, number: i32, ty: Type| FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    };
    let file = FileDescriptorProto {
        name: Some("shop/order.proto".to_string()),
        package: Some("shop".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("Order".to_string()),
            field: vec![field("id", 1, Type::String), field("qty", 2, Type::Int32)],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    };
    DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] }).unwrap()
}

#[test]
fn test_orders_value_scenario() {
    let (mock, client) = setup();
    let ctx = SerializationContext::value("orders");
    let serializer =
        AvroSerializer::new(client.clone(), ORDER_AVRO, SerializerConfig::default()).unwrap();

    let order = json!({"id": "a-1", "qty": 2});
    let first = serializer.serialize_value(Some(&order), &ctx).unwrap().unwrap();
    let second = serializer.serialize_value(Some(&order), &ctx).unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(mock.count(Method::Post), 1);

    let registered = client.get_latest_version("orders-value").unwrap();
    assert_eq!(first[0], 0);
    assert_eq!(&first[1..5], &registered.schema_id.as_u32().to_be_bytes());

    let deserializer = AvroDeserializer::new(client);
    assert_eq!(deserializer.deserialize(Some(&first), &ctx).unwrap(), Some(order));
}

#[test]
fn test_key_and_value_subjects() {
    let (_mock, client) = setup();
    let serializer =
        AvroSerializer::new(client.clone(), r#""string""#, SerializerConfig::default()).unwrap();

    serializer
        .serialize_value(Some(&json!("k")), &SerializationContext::key("orders"))
        .unwrap();
    serializer
        .serialize_value(Some(&json!("v")), &SerializationContext::value("orders"))
        .unwrap();

    assert_eq!(
        client.get_subjects().unwrap(),
        vec!["orders-key".to_string(), "orders-value".to_string()]
    );
}

#[test]
fn test_json_round_trip_with_record_strategy() {
    let (_mock, client) = setup();
    let ctx = SerializationContext::value("orders");
    let config = SerializerConfig::default()
        .with_subject_name_strategy(SubjectNameStrategy::TopicRecordName);
    let serializer = JsonSerializer::new(client.clone(), ORDER_JSON, config).unwrap();

    let order = json!({"id": "a-1", "qty": 2});
    let bytes = serializer.serialize_value(Some(&order), &ctx).unwrap();
    assert_eq!(client.get_subjects().unwrap(), vec!["orders-Order".to_string()]);

    let deserializer = JsonDeserializer::new(client);
    assert_eq!(deserializer.deserialize(bytes.as_deref(), &ctx).unwrap(), Some(order));
}

#[test]
fn test_protobuf_round_trip() {
    let (_mock, client) = setup();
    let ctx = SerializationContext::value("orders");
    let descriptor = order_pool().get_message_by_name("shop.Order").unwrap();

    let serializer = ProtobufSerializer::new(
        client.clone(),
        descriptor.clone(),
        ProtobufSerializerConfig::new(false),
    )
    .unwrap();
    let order = json!({"id": "a-1", "qty": 2});
    let bytes = serializer.serialize_value(Some(&order), &ctx).unwrap().unwrap();

    // Header then the single-byte [0] message index
    assert_eq!(bytes[0], 0);
    assert_eq!(bytes[5], 0);

    let deserializer =
        ProtobufDeserializer::new(descriptor, ProtobufDeserializerConfig::new(false)).unwrap();
    assert_eq!(deserializer.deserialize_value(Some(&bytes), &ctx).unwrap(), Some(order));
}

#[test]
fn test_framing_rejected_by_every_format() {
    let (_mock, client) = setup();
    let ctx = SerializationContext::value("orders");
    let bad: [&[u8]; 3] = [&[], &[0, 0, 0, 0, 1], &[1, 0, 0, 0, 1, 0]];

    let avro = AvroDeserializer::new(client.clone());
    let json = JsonDeserializer::new(client);
    let protobuf = ProtobufDeserializer::new(
        order_pool().get_message_by_name("shop.Order").unwrap(),
        ProtobufDeserializerConfig::new(false),
    )
    .unwrap();

    for data in bad {
        assert!(matches!(avro.deserialize(Some(data), &ctx), Err(SerdeError::Framing(_))));
        assert!(matches!(json.deserialize(Some(data), &ctx), Err(SerdeError::Framing(_))));
        assert!(matches!(protobuf.deserialize(Some(data), &ctx), Err(SerdeError::Framing(_))));
    }
}

#[test]
fn test_conflicting_config_makes_no_requests() {
    let (mock, client) = setup();
    let config = SerializerConfig::default()
        .with_auto_register(true)
        .with_use_latest_version(true);

    assert!(matches!(
        AvroSerializer::new(client.clone(), ORDER_AVRO, config.clone()),
        Err(SerdeError::Config(_))
    ));
    assert!(matches!(
        JsonSerializer::new(client.clone(), ORDER_JSON, config.clone()),
        Err(SerdeError::Config(_))
    ));
    assert!(matches!(
        ProtobufSerializer::new(
            client,
            order_pool().get_message_by_name("shop.Order").unwrap(),
            ProtobufSerializerConfig::new(false).with_serializer(config),
        ),
        Err(SerdeError::Config(_))
    ));

    assert!(mock.requests().is_empty());
}

#[test]
fn test_use_latest_version_frames_latest_id() {
    let (_mock, client) = setup();
    let v1 = Schema::avro(ORDER_AVRO).unwrap();
    client.register_schema("orders-value", &v1, false).unwrap();
    let v2 = Schema::avro(
        r#"{"type": "record", "name": "Order", "namespace": "shop", "fields": [
            {"name": "id", "type": "string"},
            {"name": "qty", "type": "int"},
            {"name": "note", "type": ["null", "string"], "default": null}
        ]}"#,
    )
    .unwrap();
    let latest = client.register_schema("orders-value", &v2, false).unwrap();

    let config = SerializerConfig::default()
        .with_auto_register(false)
        .with_use_latest_version(true);
    let serializer = AvroSerializer::new(client.clone(), ORDER_AVRO, config).unwrap();
    let bytes = serializer
        .serialize_value(
            Some(&json!({"id": "a", "qty": 1})),
            &SerializationContext::value("orders"),
        )
        .unwrap()
        .unwrap();
    assert_eq!(&bytes[1..5], &latest.as_u32().to_be_bytes());
}

#[test]
fn test_none_passes_through() {
    let (mock, client) = setup();
    let ctx = SerializationContext::value("orders");

    let avro = AvroSerializer::new(client.clone(), ORDER_AVRO, SerializerConfig::default()).unwrap();
    let json = JsonSerializer::new(client, ORDER_JSON, SerializerConfig::default()).unwrap();
    assert_eq!(avro.serialize_value(None, &ctx).unwrap(), None);
    assert_eq!(json.serialize_value(None, &ctx).unwrap(), None);
    assert!(mock.requests().is_empty());
}
