//! Schema arguments accepted by serializer and deserializer constructors

use crate::error::{SerdeError, SerdeResult};
use schema_registry_client::{Schema, SchemaType};

/// A schema given either as a bare declaration or as a registry [`Schema`]
///
/// Bare declarations carry no references; pass a [`Schema`] built with
/// [`Schema::with_references`] when the declaration names types defined
/// under other subjects.
#[derive(Debug, Clone)]
pub enum SchemaInput {
    Declaration(String),
    Schema(Schema),
}

impl SchemaInput {
    /// Resolve into a [`Schema`] of the expected type
    pub(crate) fn into_schema(self, expected: SchemaType) -> SerdeResult<Schema> {
        match self {
            SchemaInput::Declaration(declaration) => {
                let declaration = if expected == SchemaType::Avro {
                    wrap_avro_primitive(&declaration)
                } else {
                    declaration
                };
                Schema::new(declaration, expected)
                    .map_err(|e| SerdeError::SchemaParse(e.to_string()))
            }
            SchemaInput::Schema(schema) if schema.schema_type() == expected => Ok(schema),
            SchemaInput::Schema(schema) => Err(SerdeError::Type(format!(
                "expected a {} schema, got {}",
                expected,
                schema.schema_type()
            ))),
        }
    }
}

/// Canonical-form primitive declarations such as `"string"` become
/// `{"type": "string"}`
pub(crate) fn wrap_avro_primitive(declaration: &str) -> String {
    let trimmed = declaration.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        trimmed.to_string()
    } else {
        format!("{{\"type\":{}}}", trimmed)
    }
}

impl From<&str> for SchemaInput {
    fn from(declaration: &str) -> Self {
        SchemaInput::Declaration(declaration.to_string())
    }
}

impl From<String> for SchemaInput {
    fn from(declaration: String) -> Self {
        SchemaInput::Declaration(declaration)
    }
}

impl From<Schema> for SchemaInput {
    fn from(schema: Schema) -> Self {
        SchemaInput::Schema(schema)
    }
}

impl From<&Schema> for SchemaInput {
    fn from(schema: &Schema) -> Self {
        SchemaInput::Schema(schema.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_wrapped() {
        assert_eq!(wrap_avro_primitive(r#" "string" "#), r#"{"type":"string"}"#);
        assert_eq!(wrap_avro_primitive(r#"["null", "long"]"#), r#"["null", "long"]"#);

        let schema = SchemaInput::from(r#""long""#).into_schema(SchemaType::Avro).unwrap();
        assert_eq!(schema.schema_str(), r#"{"type":"long"}"#);
    }

    #[test]
    fn test_json_declaration_untouched() {
        let schema = SchemaInput::from(r#"{"title": "T"}"#)
            .into_schema(SchemaType::Json)
            .unwrap();
        assert_eq!(schema.schema_type(), SchemaType::Json);
        assert_eq!(schema.schema_str(), r#"{"title": "T"}"#);
    }

    #[test]
    fn test_type_mismatch() {
        let schema = Schema::json(r#"{"title": "T"}"#).unwrap();
        let err = SchemaInput::from(schema).into_schema(SchemaType::Avro).unwrap_err();
        assert!(matches!(err, SerdeError::Type(_)));
    }

    #[test]
    fn test_empty_declaration_rejected() {
        let err = SchemaInput::from("").into_schema(SchemaType::Json).unwrap_err();
        assert!(matches!(err, SerdeError::SchemaParse(_)));
    }
}
