//! Serialization context handed to every serializer call

/// Which part of a record is being (de)serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageField {
    #[default]
    None,
    Key,
    Value,
}

impl MessageField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageField::None => "none",
            MessageField::Key => "key",
            MessageField::Value => "value",
        }
    }
}

impl std::fmt::Display for MessageField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic, message field and headers of the record being processed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SerializationContext {
    pub topic: String,
    pub field: MessageField,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl SerializationContext {
    pub fn new(topic: impl Into<String>, field: MessageField) -> Self {
        Self {
            topic: topic.into(),
            field,
            headers: Vec::new(),
        }
    }

    pub fn key(topic: impl Into<String>) -> Self {
        Self::new(topic, MessageField::Key)
    }

    pub fn value(topic: impl Into<String>) -> Self {
        Self::new(topic, MessageField::Value)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}
