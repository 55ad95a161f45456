//! PostgreSQL-backed [`MappingStore`].

use async_trait::async_trait;
use scimsync_db::{CreateScimMapping, InsertOutcome, ScimMapping, ScimResourceType};
use sqlx::PgPool;

use super::{MappingLookup, MappingRecord, MappingScope, MappingStore};
use crate::error::MappingResult;

/// Mapping store over the `scim_mappings` table.
///
/// Uniqueness of both sides is enforced by the table constraints, so
/// concurrent sync passes converge on a single record per entity.
#[derive(Debug, Clone)]
pub struct PgMappingStore {
    pool: PgPool,
}

impl PgMappingStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MappingStore for PgMappingStore {
    async fn find(
        &self,
        scope: &MappingScope,
        lookup: MappingLookup<'_>,
        resource_type: ScimResourceType,
    ) -> MappingResult<Option<MappingRecord>> {
        let record = match lookup {
            MappingLookup::ByLocalId(local_id) => {
                ScimMapping::find_by_local_id(
                    &self.pool,
                    &scope.realm,
                    &scope.component_id,
                    resource_type,
                    local_id,
                )
                .await?
            }
            MappingLookup::ByExternalId(external_id) => {
                ScimMapping::find_by_external_id(
                    &self.pool,
                    &scope.realm,
                    &scope.component_id,
                    resource_type,
                    external_id,
                )
                .await?
            }
        };
        Ok(record)
    }

    async fn insert_if_absent(&self, mapping: CreateScimMapping) -> MappingResult<InsertOutcome> {
        Ok(ScimMapping::insert_if_absent(&self.pool, mapping).await?)
    }
}
