//! Serializer and deserializer configuration
//!
//! | Key | Type | Default | Applies to |
//! |-----|------|---------|------------|
//! | `auto.register.schemas` | bool | true | all serializers |
//! | `normalize.schemas` | bool | false | all serializers |
//! | `use.latest.version` | bool | false | all serializers |
//! | `subject.name.strategy` | strategy | `topic_name` | all serializers |
//! | `reference.subject.name.strategy` | strategy | `file_name` | Protobuf serializer |
//! | `skip.known.types` | bool | false | Protobuf serializer |
//! | `use.deprecated.format` | bool | must be set | Protobuf serializer and deserializer |
//!
//! Unknown keys are rejected when the configuration is built.

use crate::error::{SerdeError, SerdeResult};
use crate::strategy::{ReferenceSubjectNameStrategy, SubjectNameStrategy};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

const USE_DEPRECATED_FORMAT_REQUIRED: &str = "the 'use.deprecated.format' configuration property \
     must be explicitly set due to backward incompatibility with older Protobuf producers and consumers";

fn default_true() -> bool {
    true
}

fn from_map<T: DeserializeOwned>(map: Map<String, Value>) -> SerdeResult<T> {
    serde_json::from_value(Value::Object(map)).map_err(|e| SerdeError::Config(e.to_string()))
}

fn collect<I, K>(properties: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    properties.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Configuration shared by the Avro, Protobuf and JSON Schema serializers
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializerConfig {
    /// Register the schema on first use of a subject
    #[serde(rename = "auto.register.schemas", default = "default_true")]
    pub auto_register_schemas: bool,

    /// Ask the registry to normalize schemas on register / lookup
    #[serde(rename = "normalize.schemas", default)]
    pub normalize_schemas: bool,

    /// Frame with the subject's latest registered schema id
    #[serde(rename = "use.latest.version", default)]
    pub use_latest_version: bool,

    #[serde(rename = "subject.name.strategy", default)]
    pub subject_name_strategy: SubjectNameStrategy,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            auto_register_schemas: true,
            normalize_schemas: false,
            use_latest_version: false,
            subject_name_strategy: SubjectNameStrategy::default(),
        }
    }
}

impl SerializerConfig {
    /// Build from a string-keyed property map
    pub fn from_properties<I, K>(properties: I) -> SerdeResult<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let config: Self = from_map(collect(properties))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_auto_register(mut self, auto_register: bool) -> Self {
        self.auto_register_schemas = auto_register;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize_schemas = normalize;
        self
    }

    pub fn with_use_latest_version(mut self, use_latest: bool) -> Self {
        self.use_latest_version = use_latest;
        self
    }

    pub fn with_subject_name_strategy(mut self, strategy: SubjectNameStrategy) -> Self {
        self.subject_name_strategy = strategy;
        self
    }

    pub fn validate(&self) -> SerdeResult<()> {
        if self.use_latest_version && self.auto_register_schemas {
            return Err(SerdeError::Config(
                "cannot enable both use.latest.version and auto.register.schemas".to_string(),
            ));
        }
        Ok(())
    }
}

/// Keys understood by the Protobuf serializer on top of [`SerializerConfig`]
#[derive(Debug, Clone, Default, Deserialize)]
struct ProtobufExtras {
    #[serde(rename = "reference.subject.name.strategy", default)]
    reference_subject_name_strategy: ReferenceSubjectNameStrategy,
    #[serde(rename = "skip.known.types", default)]
    skip_known_types: bool,
    #[serde(rename = "use.deprecated.format", default)]
    use_deprecated_format: Option<bool>,
}

const PROTOBUF_KEYS: [&str; 3] = [
    "reference.subject.name.strategy",
    "skip.known.types",
    "use.deprecated.format",
];

/// Protobuf serializer configuration
#[derive(Debug, Clone, Default)]
pub struct ProtobufSerializerConfig {
    pub serializer: SerializerConfig,

    /// Subject each dependency file is registered under
    pub reference_subject_name_strategy: ReferenceSubjectNameStrategy,

    /// Leave `google/protobuf/*` dependencies out of the reference list
    pub skip_known_types: bool,

    /// Write message indexes as plain varints instead of zig-zag
    ///
    /// Must be set explicitly; `None` fails validation.
    pub use_deprecated_format: Option<bool>,
}

impl ProtobufSerializerConfig {
    pub fn new(use_deprecated_format: bool) -> Self {
        Self {
            use_deprecated_format: Some(use_deprecated_format),
            ..Default::default()
        }
    }

    /// Build from a string-keyed property map
    pub fn from_properties<I, K>(properties: I) -> SerdeResult<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut common = collect(properties);
        let mut extras = Map::new();
        for key in PROTOBUF_KEYS {
            if let Some(value) = common.remove(key) {
                extras.insert(key.to_string(), value);
            }
        }

        let extras: ProtobufExtras = from_map(extras)?;
        let config = Self {
            serializer: from_map(common)?,
            reference_subject_name_strategy: extras.reference_subject_name_strategy,
            skip_known_types: extras.skip_known_types,
            use_deprecated_format: extras.use_deprecated_format,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_serializer(mut self, serializer: SerializerConfig) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_reference_subject_name_strategy(
        mut self,
        strategy: ReferenceSubjectNameStrategy,
    ) -> Self {
        self.reference_subject_name_strategy = strategy;
        self
    }

    pub fn with_skip_known_types(mut self, skip: bool) -> Self {
        self.skip_known_types = skip;
        self
    }

    pub fn validate(&self) -> SerdeResult<()> {
        if self.use_deprecated_format.is_none() {
            return Err(SerdeError::Config(USE_DEPRECATED_FORMAT_REQUIRED.to_string()));
        }
        self.serializer.validate()
    }

    pub(crate) fn deprecated_format(&self) -> bool {
        self.use_deprecated_format.unwrap_or(false)
    }
}

/// Protobuf deserializer configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtobufDeserializerConfig {
    /// Read message indexes as plain varints instead of zig-zag
    #[serde(rename = "use.deprecated.format", default)]
    pub use_deprecated_format: Option<bool>,
}

impl ProtobufDeserializerConfig {
    pub fn new(use_deprecated_format: bool) -> Self {
        Self {
            use_deprecated_format: Some(use_deprecated_format),
        }
    }

    pub fn from_properties<I, K>(properties: I) -> SerdeResult<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let config: Self = from_map(collect(properties))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SerdeResult<()> {
        if self.use_deprecated_format.is_none() {
            return Err(SerdeError::Config(USE_DEPRECATED_FORMAT_REQUIRED.to_string()));
        }
        Ok(())
    }

    pub(crate) fn deprecated_format(&self) -> bool {
        self.use_deprecated_format.unwrap_or(false)
    }
}
