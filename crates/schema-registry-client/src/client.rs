//! Schema Registry client (Confluent-compatible REST API)

use crate::cache::{RegisteredSchemaCache, SchemaCache};
use crate::config::ClientConfig;
use crate::error::{SchemaRegistryError, SchemaRegistryResult};
use crate::rest::{HttpTransport, RestRequest, RestService};
use crate::types::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Response from schema registration
#[derive(Debug, Deserialize)]
struct RegisterSchemaResponse {
    id: u32,
}

/// Response from getting a schema by ID
#[derive(Debug, Deserialize)]
struct GetSchemaResponse {
    schema: String,
    #[serde(rename = "schemaType", default)]
    schema_type: SchemaType,
    #[serde(default)]
    references: Vec<SchemaReference>,
}

/// Response from getting (or looking up) a subject version
#[derive(Debug, Deserialize)]
struct SubjectVersionResponse {
    subject: String,
    version: u32,
    id: u32,
    schema: String,
    #[serde(rename = "schemaType", default)]
    schema_type: SchemaType,
    #[serde(default)]
    references: Vec<SchemaReference>,
}

impl SubjectVersionResponse {
    fn into_registered(self) -> SchemaRegistryResult<RegisteredSchema> {
        Ok(RegisteredSchema {
            schema_id: SchemaId::new(self.id),
            schema: Schema::with_references(self.schema, self.schema_type, self.references)?,
            subject: self.subject,
            version: self.version,
        })
    }
}

/// Response from compatibility check
#[derive(Debug, Deserialize)]
struct CompatibilityCheckResponse {
    is_compatible: bool,
}

#[derive(Debug, Deserialize)]
struct GetConfigResponse {
    #[serde(rename = "compatibilityLevel")]
    compatibility_level: CompatibilityLevel,
}

#[derive(Debug, Serialize, Deserialize)]
struct SetConfigRequest {
    compatibility: CompatibilityLevel,
}

/// Blocking Schema Registry client
///
/// Each instance owns its caches; share one client between serializers by
/// wrapping it in an [`Arc`].
pub struct SchemaRegistryClient {
    rest: Arc<dyn RestService>,
    schema_cache: SchemaCache,
    registered_cache: RegisteredSchemaCache,
}

impl std::fmt::Debug for SchemaRegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistryClient").finish_non_exhaustive()
    }
}

impl SchemaRegistryClient {
    /// Create a client speaking HTTP to the configured registry
    pub fn new(config: &ClientConfig) -> SchemaRegistryResult<Self> {
        Ok(Self::with_service(Arc::new(HttpTransport::new(config)?)))
    }

    /// Create a client from a string-keyed property map
    pub fn from_properties<I, K>(properties: I) -> SchemaRegistryResult<Self>
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        Self::new(&ClientConfig::from_properties(properties)?)
    }

    /// Create a client on top of any [`RestService`]
    pub fn with_service(rest: Arc<dyn RestService>) -> Self {
        Self {
            rest,
            schema_cache: SchemaCache::default(),
            registered_cache: RegisteredSchemaCache::default(),
        }
    }

    /// Register a schema under `subject`, returning its id
    ///
    /// Returns the cached id without a round trip when this schema was already
    /// registered under `subject` by this client.
    pub fn register_schema(
        &self,
        subject: &str,
        schema: &Schema,
        normalize: bool,
    ) -> SchemaRegistryResult<SchemaId> {
        if let Some(schema_id) = self.schema_cache.get_schema_id(subject, schema) {
            tracing::debug!(subject = %subject, schema_id = %schema_id, "Schema id cache hit");
            return Ok(schema_id);
        }

        let request = RestRequest::post(["subjects", subject, "versions"])
            .with_query("normalize", normalize)
            .with_body(schema_request(schema));
        let response: RegisterSchemaResponse = self.send(&request)?;
        let schema_id = SchemaId::new(response.id);

        self.schema_cache.set(schema_id, schema, Some(subject));

        tracing::info!(
            subject = %subject,
            schema_id = %schema_id,
            "Registered schema"
        );

        Ok(schema_id)
    }

    /// Fetch a schema by its global id
    pub fn get_schema(&self, schema_id: SchemaId) -> SchemaRegistryResult<Schema> {
        if let Some(schema) = self.schema_cache.get_schema(schema_id) {
            tracing::debug!(schema_id = %schema_id, "Schema cache hit");
            return Ok(schema);
        }

        let id = schema_id.to_string();
        let request = RestRequest::get(["schemas", "ids", id.as_str()]);
        let response: GetSchemaResponse = self.send(&request)?;
        let schema =
            Schema::with_references(response.schema, response.schema_type, response.references)?;

        self.schema_cache.set(schema_id, &schema, None);

        Ok(schema)
    }

    /// Registration information for `schema` under `subject`
    pub fn lookup_schema(
        &self,
        subject: &str,
        schema: &Schema,
        normalize: bool,
    ) -> SchemaRegistryResult<RegisteredSchema> {
        if let Some(registered) = self.registered_cache.get_by_schema(subject, schema) {
            tracing::debug!(subject = %subject, schema_id = %registered.schema_id, "Lookup cache hit");
            return Ok(registered);
        }

        let request = RestRequest::post(["subjects", subject])
            .with_query("normalize", normalize)
            .with_body(schema_request(schema));
        let response: SubjectVersionResponse = self.send(&request)?;
        let registered = response.into_registered()?;

        self.registered_cache.set_by_schema(subject, schema, &registered);

        Ok(registered)
    }

    /// Latest version registered under `subject` (never cached)
    pub fn get_latest_version(&self, subject: &str) -> SchemaRegistryResult<RegisteredSchema> {
        let latest = SchemaVersion::latest().to_string();
        let request = RestRequest::get(["subjects", subject, "versions", latest.as_str()]);
        let response: SubjectVersionResponse = self.send(&request)?;
        response.into_registered()
    }

    /// A specific version registered under `subject`
    pub fn get_version(&self, subject: &str, version: u32) -> SchemaRegistryResult<RegisteredSchema> {
        if let Some(registered) = self.registered_cache.get_by_version(subject, version) {
            tracing::debug!(subject = %subject, version, "Version cache hit");
            return Ok(registered);
        }

        let version_str = version.to_string();
        let request = RestRequest::get(["subjects", subject, "versions", version_str.as_str()]);
        let response: SubjectVersionResponse = self.send(&request)?;
        let registered = response.into_registered()?;

        self.registered_cache.set_by_version(subject, version, &registered);

        Ok(registered)
    }

    /// All versions registered under `subject`
    pub fn get_versions(&self, subject: &str) -> SchemaRegistryResult<Vec<u32>> {
        self.send(&RestRequest::get(["subjects", subject, "versions"]))
    }

    /// All registered subjects
    pub fn get_subjects(&self) -> SchemaRegistryResult<Vec<String>> {
        self.send(&RestRequest::get(["subjects"]))
    }

    /// Delete a subject, returning the deleted versions
    ///
    /// With `permanent`, a hard delete follows the soft delete. Cached entries
    /// for the subject are dropped as soon as the soft delete succeeds.
    pub fn delete_subject(&self, subject: &str, permanent: bool) -> SchemaRegistryResult<Vec<u32>> {
        let versions: Vec<u32> = self.send(&RestRequest::delete(["subjects", subject]))?;

        self.schema_cache.remove_by_subject(subject);
        self.registered_cache.remove_by_subject(subject);

        tracing::info!(subject = %subject, versions = ?versions, "Deleted subject");

        if permanent {
            let request = RestRequest::delete(["subjects", subject]).with_query("permanent", true);
            if let Err(e) = self.rest.send(&request) {
                tracing::warn!(subject = %subject, error = %e, "Permanent subject delete failed");
                return Err(e);
            }
            tracing::info!(subject = %subject, "Permanently deleted subject");
        }

        Ok(versions)
    }

    /// Delete one version of a subject, returning the deleted version number
    pub fn delete_version(&self, subject: &str, version: u32) -> SchemaRegistryResult<u32> {
        let version_str = version.to_string();
        let request = RestRequest::delete(["subjects", subject, "versions", version_str.as_str()]);
        let deleted: u32 = self.send(&request)?;
        tracing::info!(subject = %subject, version = deleted, "Deleted schema version");
        Ok(deleted)
    }

    /// Set the compatibility level for `subject`, or globally when `None`
    pub fn set_compatibility(
        &self,
        subject: Option<&str>,
        level: CompatibilityLevel,
    ) -> SchemaRegistryResult<CompatibilityLevel> {
        let request = RestRequest::put(config_path(subject))
            .with_body(json!(SetConfigRequest { compatibility: level }));
        let response: SetConfigRequest = self.send(&request)?;
        Ok(response.compatibility)
    }

    /// Compatibility level for `subject`, or the global level when `None`
    pub fn get_compatibility(&self, subject: Option<&str>) -> SchemaRegistryResult<CompatibilityLevel> {
        let response: GetConfigResponse = self.send(&RestRequest::get(config_path(subject)))?;
        Ok(response.compatibility_level)
    }

    /// Check `schema` against a registered version (`SchemaVersion::latest()` by default)
    pub fn test_compatibility(
        &self,
        subject: &str,
        schema: &Schema,
        version: SchemaVersion,
    ) -> SchemaRegistryResult<bool> {
        let mut body = json!({ "schema": schema.schema_str() });
        if schema.schema_type() != SchemaType::Avro {
            body["schemaType"] = json!(schema.schema_type());
        }
        if !schema.references().is_empty() {
            body["references"] = json!(schema.references());
        }

        let version_str = version.to_string();
        let request = RestRequest::post([
            "compatibility",
            "subjects",
            subject,
            "versions",
            version_str.as_str(),
        ])
        .with_body(body);
        let response: CompatibilityCheckResponse = self.send(&request)?;
        Ok(response.is_compatible)
    }

    // Private helpers

    fn send<T: DeserializeOwned>(&self, request: &RestRequest) -> SchemaRegistryResult<T> {
        let response = self.rest.send(request)?;
        serde_json::from_value(response.body.clone())
            .map_err(|_| SchemaRegistryError::unknown(response.status, response.body))
    }
}

fn config_path(subject: Option<&str>) -> Vec<String> {
    match subject {
        Some(subject) => vec!["config".to_string(), subject.to_string()],
        None => vec!["config".to_string()],
    }
}

/// Registration / lookup body; `schemaType` and `references` only when needed
fn schema_request(schema: &Schema) -> serde_json::Value {
    let mut body = json!({ "schema": schema.schema_str() });
    if !schema.references().is_empty() || schema.schema_type() != SchemaType::Avro {
        body["schemaType"] = json!(schema.schema_type());
        body["references"] = json!(schema.references());
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avro_request_is_minimal() {
        let body = schema_request(&Schema::avro(r#""string""#).unwrap());
        assert_eq!(body, json!({ "schema": "\"string\"" }));
    }

    #[test]
    fn test_protobuf_request_carries_type_and_references() {
        let schema = Schema::protobuf("Cg50ZXN0LnByb3Rv")
            .unwrap()
            .set_references(vec![SchemaReference::new("dep.proto", "dep.proto", 1)]);
        let body = schema_request(&schema);
        assert_eq!(body["schemaType"], "PROTOBUF");
        assert_eq!(
            body["references"],
            json!([{ "name": "dep.proto", "subject": "dep.proto", "version": 1 }])
        );
    }

    #[test]
    fn test_config_path() {
        assert_eq!(config_path(None), vec!["config"]);
        assert_eq!(config_path(Some("orders-value")), vec!["config", "orders-value"]);
    }
}
