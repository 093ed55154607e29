//! # Schema Registry Client
//!
//! A blocking client for Confluent-compatible Schema Registries.
//!
//! ## Features
//!
//! - **Confluent REST API**: register, lookup, versions, subjects, deletion,
//!   compatibility configuration and testing
//! - **Per-process caching**: ids, schemas and subject versions are fetched
//!   at most once per client
//! - **Pluggable transport**: HTTP via `reqwest`, or the in-memory
//!   [`MockSchemaRegistry`] for tests
//! - **Client configuration**: basic auth, TLS material, request timeout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  SchemaRegistryClient                     │
//! ├──────────────────────────────────────────────────────────┤
//! │  Caches                                                   │
//! │  ├── id → Schema                                          │
//! │  ├── (subject, schema) → id                               │
//! │  └── (subject, version | schema) → RegisteredSchema       │
//! ├──────────────────────────────────────────────────────────┤
//! │  RestService                                              │
//! │  ├── HttpTransport (reqwest, blocking)                    │
//! │  └── MockSchemaRegistry (in memory)                       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use schema_registry_client::{ClientConfig, Schema, SchemaRegistryClient};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SchemaRegistryClient::new(&ClientConfig::new("http://localhost:8081"))?;
//!
//! let schema = Schema::avro(r#"{"type": "record", "name": "User", "fields": [{"name": "id", "type": "long"}]}"#)?;
//! let schema_id = client.register_schema("users-value", &schema, false)?;
//!
//! // Served from the cache, no round trip
//! let fetched = client.get_schema(schema_id)?;
//! assert_eq!(fetched, schema);
//! # Ok(())
//! # }
//! ```

mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod rest;
pub mod types;

pub use client::SchemaRegistryClient;
pub use config::ClientConfig;
pub use error::{error_codes, SchemaRegistryError, SchemaRegistryResult};
pub use mock::MockSchemaRegistry;
pub use rest::{HttpTransport, Method, RestRequest, RestResponse, RestService};
pub use types::{
    CompatibilityLevel, RegisteredSchema, Schema, SchemaId, SchemaReference, SchemaType,
    SchemaVersion,
};
