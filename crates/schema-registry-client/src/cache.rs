//! Client-side caches
//!
//! Entries are only ever added (first value wins) until a subject is deleted,
//! which purges everything recorded under that subject.

use crate::types::{RegisteredSchema, Schema, SchemaId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct SchemaIndex {
    by_id: HashMap<SchemaId, Schema>,
    ids: HashMap<(String, Schema), SchemaId>,
    subject_schemas: HashMap<String, HashSet<Schema>>,
}

/// id → schema and (subject, schema) → id
#[derive(Default)]
pub(crate) struct SchemaCache {
    inner: Mutex<SchemaIndex>,
}

impl SchemaCache {
    pub fn set(&self, schema_id: SchemaId, schema: &Schema, subject: Option<&str>) {
        let mut index = self.inner.lock();
        index.by_id.entry(schema_id).or_insert_with(|| schema.clone());
        if let Some(subject) = subject {
            index
                .ids
                .entry((subject.to_string(), schema.clone()))
                .or_insert(schema_id);
            index
                .subject_schemas
                .entry(subject.to_string())
                .or_default()
                .insert(schema.clone());
        }
    }

    pub fn get_schema(&self, schema_id: SchemaId) -> Option<Schema> {
        self.inner.lock().by_id.get(&schema_id).cloned()
    }

    pub fn get_schema_id(&self, subject: &str, schema: &Schema) -> Option<SchemaId> {
        self.inner
            .lock()
            .ids
            .get(&(subject.to_string(), schema.clone()))
            .copied()
    }

    pub fn remove_by_subject(&self, subject: &str) {
        let mut index = self.inner.lock();
        let Some(schemas) = index.subject_schemas.remove(subject) else {
            return;
        };
        for schema in schemas {
            if let Some(id) = index.ids.remove(&(subject.to_string(), schema)) {
                index.by_id.remove(&id);
            }
        }
    }
}

#[derive(Default)]
struct RegisteredIndex {
    by_version: HashMap<(String, u32), RegisteredSchema>,
    by_schema: HashMap<(String, Schema), RegisteredSchema>,
}

/// (subject, version) → registered schema and (subject, schema) → registered schema
#[derive(Default)]
pub(crate) struct RegisteredSchemaCache {
    inner: Mutex<RegisteredIndex>,
}

impl RegisteredSchemaCache {
    pub fn set_by_version(&self, subject: &str, version: u32, registered: &RegisteredSchema) {
        self.inner
            .lock()
            .by_version
            .entry((subject.to_string(), version))
            .or_insert_with(|| registered.clone());
    }

    pub fn set_by_schema(&self, subject: &str, schema: &Schema, registered: &RegisteredSchema) {
        self.inner
            .lock()
            .by_schema
            .entry((subject.to_string(), schema.clone()))
            .or_insert_with(|| registered.clone());
    }

    pub fn get_by_version(&self, subject: &str, version: u32) -> Option<RegisteredSchema> {
        self.inner
            .lock()
            .by_version
            .get(&(subject.to_string(), version))
            .cloned()
    }

    pub fn get_by_schema(&self, subject: &str, schema: &Schema) -> Option<RegisteredSchema> {
        self.inner
            .lock()
            .by_schema
            .get(&(subject.to_string(), schema.clone()))
            .cloned()
    }

    pub fn remove_by_subject(&self, subject: &str) {
        let mut index = self.inner.lock();
        index.by_version.retain(|(s, _), _| s != subject);
        index.by_schema.retain(|(s, _), _| s != subject);
    }
}
