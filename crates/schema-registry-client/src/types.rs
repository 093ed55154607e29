//! Schema Registry types
//!
//! - [`SchemaId`], [`SchemaVersion`] - Core identifiers
//! - [`Schema`], [`SchemaReference`], [`RegisteredSchema`] - Schema data structures
//! - [`SchemaType`], [`CompatibilityLevel`] - Enumerations shared with the registry

use crate::error::{SchemaRegistryError, SchemaRegistryResult};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Registry-assigned schema identifier (global across all subjects)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaId(pub u32);

impl SchemaId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SchemaId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Version number for a schema within a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    pub fn new(version: u32) -> Self {
        Self(version)
    }

    pub fn latest() -> Self {
        Self(u32::MAX)
    }

    pub fn is_latest(&self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::latest()
    }
}

impl From<u32> for SchemaVersion {
    fn from(version: u32) -> Self {
        Self(version)
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_latest() {
            write!(f, "latest")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Schema type (format)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    /// Apache Avro (the registry default when `schemaType` is omitted)
    #[default]
    Avro,
    /// Protocol Buffers
    Protobuf,
    /// JSON Schema
    Json,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Avro => "AVRO",
            SchemaType::Protobuf => "PROTOBUF",
            SchemaType::Json => "JSON",
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SchemaType {
    type Err = SchemaRegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AVRO" => Ok(SchemaType::Avro),
            "PROTOBUF" | "PROTO" => Ok(SchemaType::Protobuf),
            "JSON" | "JSONSCHEMA" => Ok(SchemaType::Json),
            _ => Err(SchemaRegistryError::InvalidSchema(format!(
                "Unknown schema type: {}",
                s
            ))),
        }
    }
}

/// Reference to another registered schema (subject + version)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaReference {
    /// Reference name (the name the referencing schema uses)
    pub name: String,
    /// Subject containing the referenced schema
    pub subject: String,
    /// Version of the referenced schema
    pub version: u32,
}

impl SchemaReference {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            version,
        }
    }
}

/// An unregistered schema
///
/// Identity (`Eq` + `Hash`) is the pair (schema string, schema type);
/// references are carried along but do not take part in comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    schema_str: String,
    schema_type: SchemaType,
    #[serde(default)]
    references: Vec<SchemaReference>,
}

impl Schema {
    /// Create a schema, rejecting empty declarations
    pub fn new(schema_str: impl Into<String>, schema_type: SchemaType) -> SchemaRegistryResult<Self> {
        Self::with_references(schema_str, schema_type, Vec::new())
    }

    pub fn with_references(
        schema_str: impl Into<String>,
        schema_type: SchemaType,
        references: Vec<SchemaReference>,
    ) -> SchemaRegistryResult<Self> {
        let schema_str = schema_str.into();
        if schema_str.trim().is_empty() {
            return Err(SchemaRegistryError::InvalidSchema(
                "schema string must not be empty".to_string(),
            ));
        }
        Ok(Self {
            schema_str,
            schema_type,
            references,
        })
    }

    pub fn avro(schema_str: impl Into<String>) -> SchemaRegistryResult<Self> {
        Self::new(schema_str, SchemaType::Avro)
    }

    pub fn protobuf(schema_str: impl Into<String>) -> SchemaRegistryResult<Self> {
        Self::new(schema_str, SchemaType::Protobuf)
    }

    pub fn json(schema_str: impl Into<String>) -> SchemaRegistryResult<Self> {
        Self::new(schema_str, SchemaType::Json)
    }

    pub fn schema_str(&self) -> &str {
        &self.schema_str
    }

    pub fn schema_type(&self) -> SchemaType {
        self.schema_type
    }

    pub fn references(&self) -> &[SchemaReference] {
        &self.references
    }

    /// Returns a copy of this schema carrying `references`
    pub fn set_references(mut self, references: Vec<SchemaReference>) -> Self {
        self.references = references;
        self
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.schema_str == other.schema_str && self.schema_type == other.schema_type
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema_str.hash(state);
        self.schema_type.hash(state);
    }
}

/// Schema registration information: a schema bound to a subject version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredSchema {
    pub schema_id: SchemaId,
    pub schema: Schema,
    pub subject: String,
    pub version: u32,
}

/// Compatibility level for schema evolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    /// No compatibility checking
    None,
    /// New schema can read data written with old schema
    #[default]
    Backward,
    /// New schema can read data written with all previous versions
    BackwardTransitive,
    /// Old schema can read data written with new schema
    Forward,
    /// Old schema can read data written with all newer versions
    ForwardTransitive,
    /// Both backward and forward compatible
    Full,
    /// Both backward and forward compatible with all versions
    FullTransitive,
}

impl std::fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompatibilityLevel::None => write!(f, "NONE"),
            CompatibilityLevel::Backward => write!(f, "BACKWARD"),
            CompatibilityLevel::BackwardTransitive => write!(f, "BACKWARD_TRANSITIVE"),
            CompatibilityLevel::Forward => write!(f, "FORWARD"),
            CompatibilityLevel::ForwardTransitive => write!(f, "FORWARD_TRANSITIVE"),
            CompatibilityLevel::Full => write!(f, "FULL"),
            CompatibilityLevel::FullTransitive => write!(f, "FULL_TRANSITIVE"),
        }
    }
}

impl std::str::FromStr for CompatibilityLevel {
    type Err = SchemaRegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NONE" => Ok(CompatibilityLevel::None),
            "BACKWARD" => Ok(CompatibilityLevel::Backward),
            "BACKWARD_TRANSITIVE" => Ok(CompatibilityLevel::BackwardTransitive),
            "FORWARD" => Ok(CompatibilityLevel::Forward),
            "FORWARD_TRANSITIVE" => Ok(CompatibilityLevel::ForwardTransitive),
            "FULL" => Ok(CompatibilityLevel::Full),
            "FULL_TRANSITIVE" => Ok(CompatibilityLevel::FullTransitive),
            _ => Err(SchemaRegistryError::Config(format!(
                "Unknown compatibility level: {}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_schema_identity_ignores_references() {
        let plain = Schema::avro(r#""string""#).unwrap();
        let referenced = Schema::avro(r#""string""#)
            .unwrap()
            .set_references(vec![SchemaReference::new("Other", "other-value", 1)]);

        assert_eq!(plain, referenced);

        let mut set = HashSet::new();
        set.insert(plain);
        assert!(set.contains(&referenced));
    }

    #[test]
    fn test_schema_identity_includes_type() {
        let avro = Schema::avro("{}").unwrap();
        let json = Schema::json("{}").unwrap();
        assert_ne!(avro, json);
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert!(matches!(
            Schema::avro("  "),
            Err(SchemaRegistryError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_schema_type_parse() {
        assert_eq!("avro".parse::<SchemaType>().unwrap(), SchemaType::Avro);
        assert_eq!("PROTOBUF".parse::<SchemaType>().unwrap(), SchemaType::Protobuf);
        assert_eq!("json".parse::<SchemaType>().unwrap(), SchemaType::Json);
        assert!("xml".parse::<SchemaType>().is_err());
    }

    #[test]
    fn test_schema_version_display() {
        assert_eq!(SchemaVersion::latest().to_string(), "latest");
        assert_eq!(SchemaVersion::new(3).to_string(), "3");
    }

    #[test]
    fn test_compatibility_level_roundtrip() {
        for level in [
            CompatibilityLevel::None,
            CompatibilityLevel::BackwardTransitive,
            CompatibilityLevel::FullTransitive,
        ] {
            assert_eq!(level.to_string().parse::<CompatibilityLevel>().unwrap(), level);
        }
        let json = serde_json::to_string(&CompatibilityLevel::ForwardTransitive).unwrap();
        assert_eq!(json, "\"FORWARD_TRANSITIVE\"");
    }
}
