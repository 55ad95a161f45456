//! Entity adapters.
//!
//! An adapter is a short-lived value holding one entity's identity pair
//! (local id, external id) plus the attributes exchanged with the remote
//! side. It is filled from a local entity or a remote resource, then asked
//! to produce the other representation. The engine drives it; the adapter
//! owns the per-type semantics.
//!
//! Remote `id` is always the adapter's external id and remote `externalId`
//! is always the local id. An inbound resource never supplies the local id:
//! it comes from the mapping store or from creating the local entity.

pub mod group;
pub mod patch;
pub mod user;

pub use group::{ensure_user_mapping, GroupAdapter};
pub use patch::{PatchOp, PatchOperation, PatchPlan};
pub use user::UserAdapter;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use scimsync_db::ScimResourceType;
use scimsync_models::{ScimMeta, ScimResource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::warn;

use crate::context::SyncContext;
use crate::error::{MappingError, SyncError, SyncResult};
use crate::mapping::{MappingLookup, MappingRecord};

/// Per-type reconciliation behaviour.
#[async_trait]
pub trait EntityAdapter: Default + Send + Sync {
    /// Local directory entity.
    type Local: Send + Sync;

    /// Remote SCIM resource.
    type Remote: ScimResource + Serialize + DeserializeOwned + Send + Sync;

    const RESOURCE_TYPE: ScimResourceType;

    fn local_id(&self) -> Option<&str>;

    fn set_local_id(&mut self, local_id: String);

    fn external_id(&self) -> Option<&str>;

    fn set_external_id(&mut self, external_id: String);

    /// The local entity opted out of synchronization.
    fn skip(&self) -> bool;

    /// Populate from a local entity. Sets the local id.
    async fn apply_from_local(&mut self, ctx: &SyncContext, local: &Self::Local)
        -> SyncResult<()>;

    /// Populate from a remote resource. Sets the external id, never the
    /// local id.
    async fn apply_from_remote(
        &mut self,
        ctx: &SyncContext,
        remote: &Self::Remote,
    ) -> SyncResult<()>;

    /// Build the remote resource.
    async fn to_remote_representation(
        &self,
        ctx: &SyncContext,
        include_meta: bool,
    ) -> SyncResult<Self::Remote>;

    /// Whether the local entity behind the local id still exists.
    async fn entity_exists(&self, ctx: &SyncContext) -> SyncResult<bool>;

    /// Match an unmapped remote resource to an existing local entity.
    /// On success the local id is set.
    async fn try_to_map(&mut self, ctx: &SyncContext) -> SyncResult<bool>;

    /// Create the local entity from the adapter state and set the local id.
    async fn create_entity(&mut self, ctx: &SyncContext) -> SyncResult<()>;

    /// Lazily enumerate the local entities eligible for outbound sync.
    fn resource_stream<'a>(ctx: &'a SyncContext) -> BoxStream<'a, SyncResult<Self::Local>>;

    /// Outbound refresh of this entity is suppressed.
    fn skip_refresh(&self, ctx: &SyncContext) -> bool;

    /// Build the ordered PATCH plan against `target` (e.g. `Groups/<id>`).
    async fn to_patch_plan(&self, ctx: &SyncContext, target: &str) -> SyncResult<PatchPlan>;

    /// Bring an already-mapped local entity in line with the adapter state.
    /// Returns whether anything changed.
    async fn reconcile_existing(&self, _ctx: &SyncContext) -> SyncResult<bool> {
        Ok(false)
    }

    async fn lookup_mapping(
        &self,
        ctx: &SyncContext,
        lookup: MappingLookup<'_>,
    ) -> SyncResult<Option<MappingRecord>> {
        Ok(ctx
            .mappings()
            .find(ctx.scope(), lookup, Self::RESOURCE_TYPE)
            .await?)
    }

    /// Persist the identity pair.
    ///
    /// Fails with [`MappingError::Conflict`] when either id is already
    /// mapped to something else, including when the local id is already
    /// bound to a different external id.
    async fn save_mapping(&self, ctx: &SyncContext) -> SyncResult<MappingRecord> {
        let local_id = self
            .local_id()
            .ok_or_else(|| SyncError::missing_field(Self::RESOURCE_TYPE, "localId"))?
            .to_string();
        let external_id = self
            .external_id()
            .ok_or_else(|| SyncError::missing_field(Self::RESOURCE_TYPE, "externalId"))?
            .to_string();

        let record = ctx
            .mappings()
            .create_if_absent(ctx.scope().new_mapping(
                Self::RESOURCE_TYPE,
                local_id.clone(),
                external_id.clone(),
            ))
            .await?;

        if record.external_id != external_id {
            warn!(
                resource_type = %Self::RESOURCE_TYPE,
                local_id = %local_id,
                existing_external_id = %record.external_id,
                external_id = %external_id,
                "Local entity is already mapped to another remote resource"
            );
            return Err(MappingError::Conflict {
                resource_type: Self::RESOURCE_TYPE,
                local_id,
                external_id,
            }
            .into());
        }
        Ok(record)
    }

    /// Fill the local id from the mapping keyed by the external id.
    async fn resolve_local_id(&mut self, ctx: &SyncContext) -> SyncResult<bool> {
        let Some(external_id) = self.external_id().map(str::to_string) else {
            return Ok(false);
        };

        match self
            .lookup_mapping(ctx, MappingLookup::ByExternalId(&external_id))
            .await?
        {
            Some(record) => {
                self.set_local_id(record.local_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Write `value` only if the slot has never been written.
pub(crate) fn set_once<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// `meta` for a resource at `<endpoint>/<external_id>`. A location that
/// cannot be resolved is logged and the meta omitted.
pub(crate) fn resource_meta(
    ctx: &SyncContext,
    resource_type: ScimResourceType,
    external_id: Option<&str>,
) -> Option<ScimMeta> {
    let Some(external_id) = external_id else {
        warn!(
            resource_type = %resource_type,
            "No external id yet, omitting meta"
        );
        return None;
    };

    let path = format!("{}/{}", resource_type.endpoint(), external_id);
    match ctx.resolve_location(&path) {
        Ok(location) => Some(ScimMeta::located(resource_type.as_str(), location)),
        Err(e) => {
            warn!(
                resource_type = %resource_type,
                external_id = %external_id,
                error = %e,
                "Failed to build meta location, omitting meta"
            );
            None
        }
    }
}

/// Members to add and remove to turn `current` into `desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl MembershipDiff {
    pub fn between(current: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            added: desired.difference(current).cloned().collect(),
            removed: current.difference(desired).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
