//! In-memory [`MappingStore`].

use async_trait::async_trait;
use chrono::Utc;
use scimsync_db::{CreateScimMapping, InsertOutcome, ScimResourceType};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MappingLookup, MappingRecord, MappingScope, MappingStore};
use crate::error::MappingResult;

/// Mapping store held in memory.
///
/// The check and the insert happen under one write lock, which gives the
/// same create-if-absent guarantee as the database constraints.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    records: RwLock<Vec<MappingRecord>>,
}

fn in_scope(record: &MappingRecord, scope_realm: &str, scope_component: &str) -> bool {
    record.realm == scope_realm && record.component_id == scope_component
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all scopes.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Records of one resource type within a scope.
    pub async fn records(
        &self,
        scope: &MappingScope,
        resource_type: ScimResourceType,
    ) -> Vec<MappingRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| {
                in_scope(r, &scope.realm, &scope.component_id) && r.resource_type == resource_type
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn find(
        &self,
        scope: &MappingScope,
        lookup: MappingLookup<'_>,
        resource_type: ScimResourceType,
    ) -> MappingResult<Option<MappingRecord>> {
        let records = self.records.read().await;
        let found = records
            .iter()
            .filter(|r| {
                in_scope(r, &scope.realm, &scope.component_id) && r.resource_type == resource_type
            })
            .find(|r| match lookup {
                MappingLookup::ByLocalId(id) => r.local_id == id,
                MappingLookup::ByExternalId(id) => r.external_id == id,
            })
            .cloned();
        Ok(found)
    }

    async fn insert_if_absent(&self, mapping: CreateScimMapping) -> MappingResult<InsertOutcome> {
        let mut records = self.records.write().await;
        let same_type = |r: &&MappingRecord| {
            in_scope(r, &mapping.realm, &mapping.component_id)
                && r.resource_type == mapping.resource_type
        };

        let existing = records
            .iter()
            .filter(same_type)
            .find(|r| r.local_id == mapping.local_id)
            .or_else(|| {
                records
                    .iter()
                    .filter(same_type)
                    .find(|r| r.external_id == mapping.external_id)
            });
        if let Some(record) = existing {
            return Ok(InsertOutcome::Existing(record.clone()));
        }

        let now = Utc::now();
        let record = MappingRecord {
            id: Uuid::new_v4(),
            realm: mapping.realm,
            component_id: mapping.component_id,
            resource_type: mapping.resource_type,
            local_id: mapping.local_id,
            external_id: mapping.external_id,
            created_at: now,
            updated_at: now,
        };
        records.push(record.clone());
        Ok(InsertOutcome::Inserted(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MappingError;

    fn scope() -> MappingScope {
        MappingScope::new("realm", "component")
    }

    #[tokio::test]
    async fn test_find_absent_is_none() {
        let store = InMemoryMappingStore::new();
        let found = store
            .find(&scope(), MappingLookup::ByLocalId("u1"), ScimResourceType::User)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_create_and_find_both_sides() {
        let store = InMemoryMappingStore::new();
        store
            .create_if_absent(scope().new_mapping(ScimResourceType::User, "u1", "ext-1"))
            .await
            .unwrap();

        let by_local = store
            .find(&scope(), MappingLookup::ByLocalId("u1"), ScimResourceType::User)
            .await
            .unwrap()
            .unwrap();
        let by_external = store
            .find(&scope(), MappingLookup::ByExternalId("ext-1"), ScimResourceType::User)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(by_local, by_external);
        assert!(store
            .find(&scope(), MappingLookup::ByLocalId("u1"), ScimResourceType::Group)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_second_writer_adopts_first_external_id() {
        let store = InMemoryMappingStore::new();
        let first = store
            .create_if_absent(scope().new_mapping(ScimResourceType::User, "u1", "ext-a"))
            .await
            .unwrap();
        let second = store
            .create_if_absent(scope().new_mapping(ScimResourceType::User, "u1", "ext-b"))
            .await
            .unwrap();

        assert_eq!(second.external_id, "ext-a");
        assert_eq!(first.id, second.id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_external_id_bound_elsewhere_conflicts() {
        let store = InMemoryMappingStore::new();
        store
            .create_if_absent(scope().new_mapping(ScimResourceType::User, "u1", "ext-1"))
            .await
            .unwrap();

        let err = store
            .create_if_absent(scope().new_mapping(ScimResourceType::User, "u2", "ext-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, MappingError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let store = InMemoryMappingStore::new();
        let other = MappingScope::new("realm", "other-component");
        store
            .create_if_absent(scope().new_mapping(ScimResourceType::Group, "g1", "ext-1"))
            .await
            .unwrap();
        store
            .create_if_absent(other.new_mapping(ScimResourceType::Group, "g1", "ext-2"))
            .await
            .unwrap();

        assert_eq!(store.records(&scope(), ScimResourceType::Group).await.len(), 1);
        assert_eq!(store.records(&other, ScimResourceType::Group).await.len(), 1);
    }
}
