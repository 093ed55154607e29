//! Subject → schema id memo shared by the serializers

use crate::config::SerializerConfig;
use crate::error::SerdeResult;
use parking_lot::Mutex;
use schema_registry_client::{Schema, SchemaId, SchemaRegistryClient};
use std::collections::HashMap;
use tracing::debug;

/// Schema ids this serializer instance has already resolved, per subject
#[derive(Debug, Default)]
pub(crate) struct KnownSubjects {
    ids: Mutex<HashMap<String, SchemaId>>,
}

impl KnownSubjects {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Schema id to frame `subject` with, asking the registry on first sight
    ///
    /// `schema` builds the schema to register or look up; it is not called
    /// for known subjects or with `use.latest.version`. The lock is not held
    /// across the registry call; two threads racing on a new subject both
    /// ask and the first answer is kept.
    pub(crate) fn resolve<F>(
        &self,
        client: &SchemaRegistryClient,
        config: &SerializerConfig,
        subject: &str,
        schema: F,
    ) -> SerdeResult<SchemaId>
    where
        F: FnOnce() -> SerdeResult<Schema>,
    {
        if let Some(id) = self.ids.lock().get(subject) {
            return Ok(*id);
        }

        let schema_id = if config.use_latest_version {
            client.get_latest_version(subject)?.schema_id
        } else if config.auto_register_schemas {
            client.register_schema(subject, &schema()?, config.normalize_schemas)?
        } else {
            client
                .lookup_schema(subject, &schema()?, config.normalize_schemas)?
                .schema_id
        };

        debug!(subject = %subject, schema_id = %schema_id, "Resolved subject");
        Ok(*self
            .ids
            .lock()
            .entry(subject.to_string())
            .or_insert(schema_id))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.ids.lock().len()
    }
}
