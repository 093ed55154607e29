//! In-memory registry for testing and development
//!
//! [`MockSchemaRegistry`] answers the same REST routes as a real registry, so
//! a [`SchemaRegistryClient`](crate::SchemaRegistryClient) built with
//! [`with_service`](crate::SchemaRegistryClient::with_service) behaves as it
//! would against a server. Every request is recorded, which lets tests assert
//! how many round trips an operation cost.

use crate::error::{error_codes, SchemaRegistryError, SchemaRegistryResult};
use crate::rest::{Method, RestRequest, RestResponse, RestService};
use crate::types::{CompatibilityLevel, Schema, SchemaReference, SchemaType};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};

type Matcher = Box<dyn Fn(&RestRequest) -> bool + Send + Sync>;

#[derive(Clone)]
struct SubjectVersionEntry {
    version: u32,
    schema_id: u32,
    deleted: bool,
}

#[derive(Deserialize)]
struct SchemaBody {
    schema: String,
    #[serde(rename = "schemaType", default)]
    schema_type: SchemaType,
    #[serde(default)]
    references: Vec<SchemaReference>,
}

#[derive(Deserialize)]
struct ConfigBody {
    compatibility: String,
}

/// In-memory Schema Registry
pub struct MockSchemaRegistry {
    /// Schema ID counter
    next_id: AtomicU32,
    /// Schemas by ID
    schemas: DashMap<u32, Schema>,
    /// Schema content -> ID mapping (for deduplication)
    fingerprints: DashMap<Schema, u32>,
    /// Subject -> versions mapping
    subjects: DashMap<String, Vec<SubjectVersionEntry>>,
    /// Subject-level compatibility overrides
    subject_config: DashMap<String, CompatibilityLevel>,
    global_config: Mutex<CompatibilityLevel>,
    requests: Mutex<Vec<RestRequest>>,
    failures: Mutex<Vec<(Matcher, SchemaRegistryError)>>,
}

impl MockSchemaRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            schemas: DashMap::new(),
            fingerprints: DashMap::new(),
            subjects: DashMap::new(),
            subject_config: DashMap::new(),
            global_config: Mutex::new(CompatibilityLevel::default()),
            requests: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RestRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received with `method`
    pub fn count(&self, method: Method) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    /// Answer the next request matching `matcher` with `error` instead of serving it
    pub fn fail_once<F>(&self, matcher: F, error: SchemaRegistryError)
    where
        F: Fn(&RestRequest) -> bool + Send + Sync + 'static,
    {
        self.failures.lock().push((Box::new(matcher), error));
    }

    fn take_failure(&self, request: &RestRequest) -> Option<SchemaRegistryError> {
        let mut failures = self.failures.lock();
        let idx = failures.iter().position(|(m, _)| m(request))?;
        Some(failures.remove(idx).1)
    }

    fn route(&self, request: &RestRequest) -> SchemaRegistryResult<Value> {
        let path: Vec<&str> = request.path.iter().map(String::as_str).collect();
        let permanent = request.query_param("permanent") == Some("true");

        match (request.method, path.as_slice()) {
            (Method::Get, ["subjects"]) => Ok(json!(self.live_subjects())),
            (Method::Post, ["subjects", subject, "versions"]) => {
                self.register(subject, parse_body(request)?)
            }
            (Method::Post, ["subjects", subject]) => self.lookup(subject, parse_body(request)?),
            (Method::Get, ["subjects", subject, "versions"]) => {
                Ok(json!(self.live_versions(subject)?))
            }
            (Method::Get, ["subjects", subject, "versions", version]) => {
                let entry = self.find_version(subject, version)?;
                self.version_body(subject, &entry)
            }
            (Method::Delete, ["subjects", subject]) => {
                self.delete_subject(subject, permanent).map(|v| json!(v))
            }
            (Method::Delete, ["subjects", subject, "versions", version]) => {
                self.delete_version(subject, version, permanent).map(|v| json!(v))
            }
            (Method::Get, ["schemas", "ids", id]) => {
                let id: u32 = id.parse().map_err(|_| schema_not_found())?;
                let schema = self.schemas.get(&id).ok_or_else(schema_not_found)?;
                Ok(schema_body(&schema))
            }
            (Method::Get, ["config"]) => {
                Ok(json!({ "compatibilityLevel": self.global_config.lock().to_string() }))
            }
            (Method::Get, ["config", subject]) => match self.subject_config.get(*subject) {
                Some(level) => Ok(json!({ "compatibilityLevel": level.to_string() })),
                None => Err(error(
                    404,
                    error_codes::SUBJECT_COMPATIBILITY_NOT_CONFIGURED,
                    format!("Subject '{}' does not have subject-level compatibility configured", subject),
                )),
            },
            (Method::Put, ["config"]) => {
                let level = parse_level(request)?;
                *self.global_config.lock() = level;
                Ok(json!({ "compatibility": level.to_string() }))
            }
            (Method::Put, ["config", subject]) => {
                let level = parse_level(request)?;
                self.subject_config.insert(subject.to_string(), level);
                Ok(json!({ "compatibility": level.to_string() }))
            }
            (Method::Post, ["compatibility", "subjects", subject, "versions", version]) => {
                let body = parse_body(request)?;
                let entry = self.find_version(subject, version)?;
                let existing = self
                    .schemas
                    .get(&entry.schema_id)
                    .ok_or_else(schema_not_found)?;
                let is_compatible = self.compatibility_for(subject) == CompatibilityLevel::None
                    || existing.schema_type() == body.schema_type;
                Ok(json!({ "is_compatible": is_compatible }))
            }
            _ => Err(error(404, 404, format!("HTTP 404 Not Found: {} /{}", request.method, path.join("/")))),
        }
    }

    fn register(&self, subject: &str, body: SchemaBody) -> SchemaRegistryResult<Value> {
        let schema = to_schema(body)?;

        let id = *self
            .fingerprints
            .entry(schema.clone())
            .or_insert_with(|| {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                self.schemas.insert(id, schema.clone());
                id
            });

        let mut entry = self.subjects.entry(subject.to_string()).or_default();
        let registered = entry.iter().any(|v| v.schema_id == id && !v.deleted);
        if !registered {
            let version = entry.iter().map(|v| v.version).max().unwrap_or(0) + 1;
            entry.push(SubjectVersionEntry {
                version,
                schema_id: id,
                deleted: false,
            });
        }

        Ok(json!({ "id": id }))
    }

    fn lookup(&self, subject: &str, body: SchemaBody) -> SchemaRegistryResult<Value> {
        let schema = to_schema(body)?;
        let versions = self.live_entries(subject)?;
        let id = self.fingerprints.get(&schema).map(|id| *id);
        let entry = versions
            .into_iter()
            .find(|v| Some(v.schema_id) == id)
            .ok_or_else(schema_not_found)?;
        self.version_body(subject, &entry)
    }

    fn delete_subject(&self, subject: &str, permanent: bool) -> SchemaRegistryResult<Vec<u32>> {
        if permanent {
            let entries = self.subjects.get(subject).map(|e| e.value().clone()).unwrap_or_default();
            if entries.is_empty() {
                return Err(subject_not_found(subject));
            }
            if entries.iter().any(|v| !v.deleted) {
                return Err(error(
                    404,
                    error_codes::SUBJECT_NOT_SOFT_DELETED,
                    format!("Subject '{}' was not deleted first before being permanently deleted", subject),
                ));
            }
            self.subjects.remove(subject);
            self.subject_config.remove(subject);
            return Ok(entries.iter().map(|v| v.version).collect());
        }

        let mut entry = self
            .subjects
            .get_mut(subject)
            .ok_or_else(|| subject_not_found(subject))?;
        let mut deleted = Vec::new();
        for v in entry.iter_mut().filter(|v| !v.deleted) {
            v.deleted = true;
            deleted.push(v.version);
        }
        if deleted.is_empty() {
            return Err(subject_not_found(subject));
        }
        Ok(deleted)
    }

    fn delete_version(&self, subject: &str, version: &str, permanent: bool) -> SchemaRegistryResult<u32> {
        let target = self.resolve_version(subject, version)?;
        let mut entry = self
            .subjects
            .get_mut(subject)
            .ok_or_else(|| subject_not_found(subject))?;
        let idx = entry
            .iter()
            .position(|v| v.version == target && (permanent || !v.deleted))
            .ok_or_else(|| version_not_found(version))?;
        if permanent {
            entry.remove(idx);
        } else {
            entry[idx].deleted = true;
        }
        Ok(target)
    }

    fn live_subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .subjects
            .iter()
            .filter(|e| e.value().iter().any(|v| !v.deleted))
            .map(|e| e.key().clone())
            .collect();
        subjects.sort();
        subjects
    }

    fn live_entries(&self, subject: &str) -> SchemaRegistryResult<Vec<SubjectVersionEntry>> {
        let entries: Vec<SubjectVersionEntry> = self
            .subjects
            .get(subject)
            .map(|e| e.iter().filter(|v| !v.deleted).cloned().collect())
            .unwrap_or_default();
        if entries.is_empty() {
            return Err(subject_not_found(subject));
        }
        Ok(entries)
    }

    fn live_versions(&self, subject: &str) -> SchemaRegistryResult<Vec<u32>> {
        Ok(self.live_entries(subject)?.iter().map(|v| v.version).collect())
    }

    fn resolve_version(&self, subject: &str, version: &str) -> SchemaRegistryResult<u32> {
        if version == "latest" {
            let versions = self.live_versions(subject)?;
            return versions
                .into_iter()
                .max()
                .ok_or_else(|| subject_not_found(subject));
        }
        version.parse().map_err(|_| {
            error(
                422,
                error_codes::INVALID_VERSION,
                format!("The specified version '{}' is not a valid version id", version),
            )
        })
    }

    fn find_version(&self, subject: &str, version: &str) -> SchemaRegistryResult<SubjectVersionEntry> {
        let target = self.resolve_version(subject, version)?;
        self.live_entries(subject)?
            .into_iter()
            .find(|v| v.version == target)
            .ok_or_else(|| version_not_found(version))
    }

    fn version_body(&self, subject: &str, entry: &SubjectVersionEntry) -> SchemaRegistryResult<Value> {
        let schema = self
            .schemas
            .get(&entry.schema_id)
            .ok_or_else(schema_not_found)?;
        let mut body = schema_body(&schema);
        body["subject"] = json!(subject);
        body["version"] = json!(entry.version);
        body["id"] = json!(entry.schema_id);
        Ok(body)
    }

    fn compatibility_for(&self, subject: &str) -> CompatibilityLevel {
        self.subject_config
            .get(subject)
            .map(|l| *l)
            .unwrap_or_else(|| *self.global_config.lock())
    }
}

impl Default for MockSchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RestService for MockSchemaRegistry {
    fn send(&self, request: &RestRequest) -> SchemaRegistryResult<RestResponse> {
        self.requests.lock().push(request.clone());
        if let Some(err) = self.take_failure(request) {
            return Err(err);
        }
        self.route(request).map(RestResponse::ok)
    }
}

fn schema_body(schema: &Schema) -> Value {
    let mut body = json!({ "schema": schema.schema_str() });
    if schema.schema_type() != SchemaType::Avro {
        body["schemaType"] = json!(schema.schema_type());
    }
    if !schema.references().is_empty() {
        body["references"] = json!(schema.references());
    }
    body
}

fn parse_body(request: &RestRequest) -> SchemaRegistryResult<SchemaBody> {
    let body = request.body.clone().unwrap_or(Value::Null);
    serde_json::from_value(body).map_err(|e| error(422, error_codes::INVALID_SCHEMA, e.to_string()))
}

fn parse_level(request: &RestRequest) -> SchemaRegistryResult<CompatibilityLevel> {
    let body = request.body.clone().unwrap_or(Value::Null);
    let invalid = |msg: String| error(422, error_codes::INVALID_COMPATIBILITY_LEVEL, msg);
    let config: ConfigBody = serde_json::from_value(body).map_err(|e| invalid(e.to_string()))?;
    config
        .compatibility
        .parse()
        .map_err(|_: SchemaRegistryError| {
            invalid(format!("Invalid compatibility level: {}", config.compatibility))
        })
}

fn to_schema(body: SchemaBody) -> SchemaRegistryResult<Schema> {
    Schema::with_references(body.schema, body.schema_type, body.references)
        .map_err(|e| error(422, error_codes::INVALID_SCHEMA, e.to_string()))
}

fn error(status: u16, error_code: i32, message: impl Into<String>) -> SchemaRegistryError {
    SchemaRegistryError::Registry {
        status,
        error_code,
        message: message.into(),
    }
}

fn subject_not_found(subject: &str) -> SchemaRegistryError {
    error(
        404,
        error_codes::SUBJECT_NOT_FOUND,
        format!("Subject '{}' not found.", subject),
    )
}

fn version_not_found(version: &str) -> SchemaRegistryError {
    error(
        404,
        error_codes::VERSION_NOT_FOUND,
        format!("Version {} not found.", version),
    )
}

fn schema_not_found() -> SchemaRegistryError {
    error(404, error_codes::SCHEMA_NOT_FOUND, "Schema not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(mock: &MockSchemaRegistry, subject: &str, schema: &str) -> u32 {
        let request = RestRequest::post(["subjects", subject, "versions"])
            .with_body(json!({ "schema": schema }));
        mock.send(&request).unwrap().body["id"].as_u64().unwrap() as u32
    }

    #[test]
    fn test_ids_dedup_across_subjects() {
        let mock = MockSchemaRegistry::new();
        let a = register(&mock, "a-value", r#""string""#);
        let b = register(&mock, "b-value", r#""string""#);
        let c = register(&mock, "a-value", r#""long""#);

        assert_eq!(a, 1);
        assert_eq!(a, b);
        assert_eq!(c, 2);

        let versions = mock
            .send(&RestRequest::get(["subjects", "a-value", "versions"]))
            .unwrap()
            .body;
        assert_eq!(versions, json!([1, 2]));
    }

    #[test]
    fn test_reregistering_keeps_version() {
        let mock = MockSchemaRegistry::new();
        register(&mock, "a-value", r#""string""#);
        register(&mock, "a-value", r#""string""#);

        let latest = mock
            .send(&RestRequest::get(["subjects", "a-value", "versions", "latest"]))
            .unwrap()
            .body;
        assert_eq!(latest["version"], 1);
        assert_eq!(latest["subject"], "a-value");
        assert!(latest.get("schemaType").is_none());
    }

    #[test]
    fn test_permanent_delete_requires_soft_delete() {
        let mock = MockSchemaRegistry::new();
        register(&mock, "a-value", r#""string""#);

        let hard = RestRequest::delete(["subjects", "a-value"]).with_query("permanent", true);
        let err = mock.send(&hard).unwrap_err();
        assert_eq!(err.error_code(), Some(error_codes::SUBJECT_NOT_SOFT_DELETED));

        let soft = mock.send(&RestRequest::delete(["subjects", "a-value"])).unwrap().body;
        assert_eq!(soft, json!([1]));
        assert_eq!(mock.send(&hard).unwrap().body, json!([1]));
        assert_eq!(mock.send(&RestRequest::get(["subjects"])).unwrap().body, json!([]));
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let mock = MockSchemaRegistry::new();
        mock.fail_once(
            |r| r.method == Method::Get,
            error(500, 50001, "Error in the backend data store"),
        );

        let err = mock.send(&RestRequest::get(["subjects"])).unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(mock.send(&RestRequest::get(["subjects"])).is_ok());
        assert_eq!(mock.count(Method::Get), 2);
    }

    #[test]
    fn test_unknown_route() {
        let mock = MockSchemaRegistry::new();
        let err = mock.send(&RestRequest::get(["mode"])).unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
