//! # Schema Registry Serdes
//!
//! Serializers and deserializers producing the Confluent wire format for
//! Avro, Protobuf and JSON Schema payloads.
//!
//! ## Wire Format
//!
//! ```text
//! ┌───────┬──────────────────┬─────────────────────────┬───────────────┐
//! │ 0x00  │ schema id (u32,  │ message indexes         │ payload       │
//! │ magic │ big endian)      │ (Protobuf only, varint) │               │
//! └───────┴──────────────────┴─────────────────────────┴───────────────┘
//! ```
//!
//! ## Subjects and Schema Ids
//!
//! A serializer derives the subject from its [`SubjectNameStrategy`] and
//! resolves the schema id once per subject:
//!
//! - `use.latest.version`: the subject's latest registered version
//! - `auto.register.schemas` (default): registers the schema
//! - otherwise: looks the schema up under the subject
//!
//! ## Example
//!
//! ```rust
//! use schema_registry_client::{MockSchemaRegistry, SchemaRegistryClient};
//! use schema_registry_serdes::{
//!     AvroDeserializer, AvroSerializer, SerializationContext, SerializerConfig,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(SchemaRegistryClient::with_service(Arc::new(
//!     MockSchemaRegistry::new(),
//! )));
//!
//! let schema = r#"{"type": "record", "name": "Order", "fields": [{"name": "id", "type": "string"}]}"#;
//! let serializer = AvroSerializer::new(client.clone(), schema, SerializerConfig::default())?;
//!
//! let ctx = SerializationContext::value("orders");
//! let bytes = serializer.serialize_value(Some(&json!({"id": "abc"})), &ctx)?;
//!
//! let deserializer = AvroDeserializer::new(client);
//! let value = deserializer.deserialize(bytes.as_deref(), &ctx)?;
//! assert_eq!(value, Some(json!({"id": "abc"})));
//! # Ok(())
//! # }
//! ```

mod subject;

pub mod avro;
pub mod config;
pub mod context;
pub mod error;
pub mod json;
pub mod protobuf;
pub mod schema;
pub mod strategy;
pub mod wire;

pub use avro::{AvroDeserializer, AvroSerializer};
pub use config::{ProtobufDeserializerConfig, ProtobufSerializerConfig, SerializerConfig};
pub use context::{MessageField, SerializationContext};
pub use error::{SerdeError, SerdeResult};
pub use json::{JsonDeserializer, JsonSerializer};
pub use protobuf::{ProtobufDeserializer, ProtobufSerializer};
pub use schema::SchemaInput;
pub use strategy::{ReferenceSubjectNameStrategy, SubjectNameStrategy};
