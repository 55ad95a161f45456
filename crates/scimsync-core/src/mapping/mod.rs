//! Mapping store: the local ↔ remote identity table.
//!
//! Within one scope and resource type the table is a bijection between
//! local ids and external ids. Lookups that find nothing return `None`;
//! callers branch on presence.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryMappingStore;
pub use postgres::PgMappingStore;

use async_trait::async_trait;
use scimsync_db::{CreateScimMapping, InsertOutcome, ScimMapping, ScimResourceType};
use tracing::warn;

use crate::error::{MappingError, MappingResult};

/// A persisted mapping record.
pub type MappingRecord = ScimMapping;

/// Realm and sync component a mapping belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingScope {
    pub realm: String,
    pub component_id: String,
}

impl MappingScope {
    pub fn new(realm: impl Into<String>, component_id: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            component_id: component_id.into(),
        }
    }

    /// Build the insert payload for a mapping in this scope.
    pub fn new_mapping(
        &self,
        resource_type: ScimResourceType,
        local_id: impl Into<String>,
        external_id: impl Into<String>,
    ) -> CreateScimMapping {
        CreateScimMapping {
            realm: self.realm.clone(),
            component_id: self.component_id.clone(),
            resource_type,
            local_id: local_id.into(),
            external_id: external_id.into(),
        }
    }
}

/// Which side of the mapping a lookup key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingLookup<'a> {
    ByLocalId(&'a str),
    ByExternalId(&'a str),
}

/// Persistence for mapping records.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Point lookup by one side of the mapping.
    async fn find(
        &self,
        scope: &MappingScope,
        lookup: MappingLookup<'_>,
        resource_type: ScimResourceType,
    ) -> MappingResult<Option<MappingRecord>>;

    /// Atomically insert unless the local id or external id is taken.
    async fn insert_if_absent(&self, mapping: CreateScimMapping) -> MappingResult<InsertOutcome>;

    /// Insert a mapping, or adopt the one another writer created first.
    ///
    /// If a record already exists for the same local id, it wins and is
    /// returned even when its external id differs. If the external id is
    /// bound to a different local id, the call fails with a conflict.
    async fn create_if_absent(&self, mapping: CreateScimMapping) -> MappingResult<MappingRecord> {
        match self.insert_if_absent(mapping.clone()).await? {
            InsertOutcome::Inserted(record) => Ok(record),
            InsertOutcome::Existing(record) if record.local_id == mapping.local_id => {
                if record.external_id != mapping.external_id {
                    warn!(
                        resource_type = %mapping.resource_type,
                        local_id = %mapping.local_id,
                        existing_external_id = %record.external_id,
                        discarded_external_id = %mapping.external_id,
                        "Mapping already created by another writer, adopting existing external id"
                    );
                }
                Ok(record)
            }
            InsertOutcome::Existing(_) => Err(MappingError::Conflict {
                resource_type: mapping.resource_type,
                local_id: mapping.local_id,
                external_id: mapping.external_id,
            }),
        }
    }
}
