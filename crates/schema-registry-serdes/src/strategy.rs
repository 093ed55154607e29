//! Subject naming strategies

use crate::context::SerializationContext;
use crate::error::{SerdeError, SerdeResult};
use prost_reflect::FileDescriptor;
use serde::Deserialize;
use std::sync::Arc;

type SubjectFn = dyn Fn(&SerializationContext, Option<&str>) -> SerdeResult<String> + Send + Sync;
type ReferenceSubjectFn = dyn Fn(&SerializationContext, &FileDescriptor) -> String + Send + Sync;

/// Strategy for generating the subject a schema is registered under
#[derive(Clone, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum SubjectNameStrategy {
    /// `{topic}-{field}`, e.g. `orders-value`
    #[default]
    TopicName,
    /// `{topic}-{record_name}`
    TopicRecordName,
    /// `{record_name}`
    RecordName,
    /// Custom function of the context and record name
    Custom(Arc<SubjectFn>),
}

impl SubjectNameStrategy {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&SerializationContext, Option<&str>) -> SerdeResult<String> + Send + Sync + 'static,
    {
        SubjectNameStrategy::Custom(Arc::new(f))
    }

    /// Subject for a record named `record_name` (full name, if any)
    pub fn subject(&self, ctx: &SerializationContext, record_name: Option<&str>) -> SerdeResult<String> {
        match self {
            SubjectNameStrategy::TopicName => Ok(format!("{}-{}", ctx.topic, ctx.field)),
            SubjectNameStrategy::TopicRecordName => {
                Ok(format!("{}-{}", ctx.topic, require_record_name(record_name, "topic_record_name")?))
            }
            SubjectNameStrategy::RecordName => {
                Ok(require_record_name(record_name, "record_name")?.to_string())
            }
            SubjectNameStrategy::Custom(f) => f(ctx, record_name),
        }
    }
}

fn require_record_name<'a>(record_name: Option<&'a str>, strategy: &str) -> SerdeResult<&'a str> {
    record_name.ok_or_else(|| {
        SerdeError::Type(format!(
            "the {} subject name strategy needs a named schema",
            strategy
        ))
    })
}

impl TryFrom<String> for SubjectNameStrategy {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::str::FromStr for SubjectNameStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Confluent class names are accepted alongside the short forms
        let short = s.rsplit('.').next().unwrap_or(s);
        match short {
            "topic_name" | "TopicNameStrategy" => Ok(SubjectNameStrategy::TopicName),
            "topic_record_name" | "TopicRecordNameStrategy" => {
                Ok(SubjectNameStrategy::TopicRecordName)
            }
            "record_name" | "RecordNameStrategy" => Ok(SubjectNameStrategy::RecordName),
            _ => Err(format!("Unknown subject name strategy: {}", s)),
        }
    }
}

impl std::fmt::Debug for SubjectNameStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubjectNameStrategy::TopicName => write!(f, "TopicName"),
            SubjectNameStrategy::TopicRecordName => write!(f, "TopicRecordName"),
            SubjectNameStrategy::RecordName => write!(f, "RecordName"),
            SubjectNameStrategy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Strategy for the subject a Protobuf dependency is registered under
#[derive(Clone, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ReferenceSubjectNameStrategy {
    /// The dependency's file name, e.g. `common/money.proto`
    #[default]
    FileName,
    Custom(Arc<ReferenceSubjectFn>),
}

impl ReferenceSubjectNameStrategy {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&SerializationContext, &FileDescriptor) -> String + Send + Sync + 'static,
    {
        ReferenceSubjectNameStrategy::Custom(Arc::new(f))
    }

    pub fn subject(&self, ctx: &SerializationContext, dependency: &FileDescriptor) -> String {
        match self {
            ReferenceSubjectNameStrategy::FileName => dependency.name().to_string(),
            ReferenceSubjectNameStrategy::Custom(f) => f(ctx, dependency),
        }
    }
}

impl TryFrom<String> for ReferenceSubjectNameStrategy {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.rsplit('.').next().unwrap_or(&s) {
            "file_name" | "DefaultReferenceSubjectNameStrategy" => {
                Ok(ReferenceSubjectNameStrategy::FileName)
            }
            _ => Err(format!("Unknown reference subject name strategy: {}", s)),
        }
    }
}

impl std::fmt::Debug for ReferenceSubjectNameStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceSubjectNameStrategy::FileName => write!(f, "FileName"),
            ReferenceSubjectNameStrategy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
