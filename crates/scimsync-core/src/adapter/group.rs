//! Group adapter.
//!
//! Members are held as local user ids. On export each member is translated
//! to its external id, creating the user mapping on the fly when the user
//! has never been exported. On import each remote member is translated
//! back through the mapping store; members without a mapping are dropped.

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use scimsync_db::ScimResourceType;
use scimsync_models::{ScimGroup, ScimGroupMember};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{resource_meta, set_once, EntityAdapter, MembershipDiff, PatchOperation, PatchPlan};
use crate::context::SyncContext;
use crate::directory::LocalGroup;
use crate::error::{SyncError, SyncResult};
use crate::mapping::MappingLookup;

/// Reconciliation state for one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupAdapter {
    local_id: Option<String>,
    external_id: Option<String>,
    skip: bool,
    display_name: Option<String>,
    members: BTreeSet<String>,
}

impl GroupAdapter {
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Written once; later values are ignored.
    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        set_once(&mut self.display_name, Some(display_name.into()));
    }

    /// Local user ids of the members.
    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    pub fn set_members<I>(&mut self, members: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.members = members.into_iter().collect();
    }

    /// Member references for the remote side. Members whose mapping cannot
    /// be obtained are logged and left out.
    async fn export_members(&self, ctx: &SyncContext) -> Vec<ScimGroupMember> {
        let mut exported = Vec::with_capacity(self.members.len());
        for user_id in &self.members {
            match ensure_user_mapping(ctx, user_id).await {
                Some(external_id) => exported.push(ScimGroupMember::user(external_id)),
                None => error!(
                    group = ?self.local_id,
                    user_id = %user_id,
                    "Could not get or create user mapping, skipping member"
                ),
            }
        }
        exported
    }

    async fn build_patch_plan(&self, ctx: &SyncContext, target: &str) -> SyncResult<PatchPlan> {
        let mut plan = PatchPlan::new(ctx.resolve_location(target)?);

        let members = self.export_members(ctx).await;
        if members.is_empty() {
            plan.push(PatchOperation::remove("members"));
        } else {
            plan.push(PatchOperation::replace(
                "members",
                serde_json::to_value(&members)?,
            ));
        }

        plan.push(PatchOperation::replace(
            "displayName",
            self.display_name.clone().map_or(Value::Null, Value::String),
        ));
        plan.push(PatchOperation::replace(
            "externalId",
            self.local_id.clone().map_or(Value::Null, Value::String),
        ));
        Ok(plan)
    }
}

/// Translate one remote member reference to a local user id.
async fn resolve_remote_member(
    ctx: &SyncContext,
    member: &ScimGroupMember,
) -> SyncResult<Option<String>> {
    if member.value.trim().is_empty() {
        return Err(SyncError::invalid_reference(
            &member.value,
            "member value is empty",
        ));
    }
    if let Some(member_type) = member.member_type.as_deref() {
        if !member_type.eq_ignore_ascii_case("User") {
            return Err(SyncError::invalid_reference(
                &member.value,
                format!("unsupported member type '{member_type}'"),
            ));
        }
    }

    let record = ctx
        .mappings()
        .find(
            ctx.scope(),
            MappingLookup::ByExternalId(&member.value),
            ScimResourceType::User,
        )
        .await?;
    Ok(record.map(|record| record.local_id))
}

/// External id for a local user, creating the mapping when the user has
/// never been exported. Failures are logged and yield `None`.
///
/// Calling this repeatedly for the same user yields the same external id
/// and leaves exactly one mapping record.
pub async fn ensure_user_mapping(ctx: &SyncContext, user_id: &str) -> Option<String> {
    match try_ensure_user_mapping(ctx, user_id).await {
        Ok(external_id) => external_id,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to ensure user mapping");
            None
        }
    }
}

async fn try_ensure_user_mapping(ctx: &SyncContext, user_id: &str) -> SyncResult<Option<String>> {
    let mappings = ctx.mappings();
    if let Some(record) = mappings
        .find(
            ctx.scope(),
            MappingLookup::ByLocalId(user_id),
            ScimResourceType::User,
        )
        .await?
    {
        return Ok(Some(record.external_id));
    }

    let Some(user) = ctx.directory().get_user_by_id(ctx.realm(), user_id).await? else {
        warn!(user_id = %user_id, "Group member not found in local directory");
        return Ok(None);
    };

    // A concurrent writer may have mapped the user since the lookup; its
    // external id wins over the one synthesized here.
    let record = mappings
        .create_if_absent(ctx.scope().new_mapping(
            ScimResourceType::User,
            user.id,
            Uuid::new_v4().to_string(),
        ))
        .await?;
    debug!(
        user_id = %user_id,
        external_id = %record.external_id,
        "Created user mapping for group member"
    );
    Ok(Some(record.external_id))
}

#[async_trait]
impl EntityAdapter for GroupAdapter {
    type Local = LocalGroup;
    type Remote = ScimGroup;

    const RESOURCE_TYPE: ScimResourceType = ScimResourceType::Group;

    fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    fn set_local_id(&mut self, local_id: String) {
        self.local_id = Some(local_id);
    }

    fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    fn set_external_id(&mut self, external_id: String) {
        self.external_id = Some(external_id);
    }

    fn skip(&self) -> bool {
        self.skip
    }

    async fn apply_from_local(&mut self, ctx: &SyncContext, group: &LocalGroup) -> SyncResult<()> {
        self.local_id = Some(group.id.clone());
        self.set_display_name(group.name.clone());
        self.skip = group.first_attribute(&ctx.settings().skip_attribute) == Some("true");
        self.members = ctx
            .directory()
            .group_members(ctx.realm(), &group.id)
            .await?
            .into_iter()
            .collect();
        debug!(
            group_id = %group.id,
            members = self.members.len(),
            "Collected group members"
        );
        Ok(())
    }

    async fn apply_from_remote(&mut self, ctx: &SyncContext, group: &ScimGroup) -> SyncResult<()> {
        if let Some(id) = &group.id {
            self.external_id = Some(id.clone());
        }
        self.set_display_name(group.display_name.clone());

        let mut members = BTreeSet::new();
        for member in &group.members {
            match resolve_remote_member(ctx, member).await {
                Ok(Some(local_id)) => {
                    members.insert(local_id);
                }
                Ok(None) => error!(
                    group = ?self.external_id,
                    member = %member.value,
                    "No user mapping found for member, dropping it"
                ),
                Err(e) => error!(
                    group = ?self.external_id,
                    member = %member.value,
                    error = %e,
                    "Failed to process incoming group member"
                ),
            }
        }
        self.members = members;
        Ok(())
    }

    async fn to_remote_representation(
        &self,
        ctx: &SyncContext,
        include_meta: bool,
    ) -> SyncResult<ScimGroup> {
        let mut group = ScimGroup::new(self.display_name.clone().unwrap_or_default());
        group.id = self.external_id.clone();
        group.external_id = self.local_id.clone();
        group.members = self.export_members(ctx).await;
        if include_meta {
            group.meta = resource_meta(ctx, Self::RESOURCE_TYPE, self.external_id.as_deref());
        }
        Ok(group)
    }

    async fn entity_exists(&self, ctx: &SyncContext) -> SyncResult<bool> {
        let Some(local_id) = self.local_id.as_deref() else {
            return Ok(false);
        };
        Ok(ctx
            .directory()
            .get_group_by_id(ctx.realm(), local_id)
            .await?
            .is_some())
    }

    /// First local group whose name equals the display name.
    async fn try_to_map(&mut self, ctx: &SyncContext) -> SyncResult<bool> {
        let Some(name) = self.display_name.clone() else {
            return Ok(false);
        };

        let mut groups = ctx.directory().groups(ctx.realm());
        while let Some(group) = groups.try_next().await? {
            if group.name == name {
                debug!(
                    external_id = ?self.external_id,
                    local_id = %group.id,
                    "Matched remote group to existing local group"
                );
                self.local_id = Some(group.id);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn create_entity(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let name = self
            .display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| SyncError::missing_field(Self::RESOURCE_TYPE, "displayName"))?;

        let directory = ctx.directory();
        let group = directory.create_group(ctx.realm(), name).await?;
        info!(
            local_id = %group.id,
            name = %group.name,
            external_id = ?self.external_id,
            "Created local group from remote resource"
        );

        for user_id in &self.members {
            match directory.get_user_by_id(ctx.realm(), user_id).await {
                Ok(Some(user)) => {
                    if let Err(e) = directory.join_group(ctx.realm(), &user.id, &group.id).await {
                        warn!(user_id = %user_id, group_id = %group.id, error = %e, "Failed to add member");
                    }
                }
                Ok(None) => {
                    warn!(user_id = %user_id, group_id = %group.id, "Member not found, skipping")
                }
                Err(e) => {
                    warn!(user_id = %user_id, group_id = %group.id, error = %e, "Failed to look up member")
                }
            }
        }

        self.local_id = Some(group.id);
        Ok(())
    }

    fn resource_stream<'a>(ctx: &'a SyncContext) -> BoxStream<'a, SyncResult<LocalGroup>> {
        ctx.directory()
            .groups(ctx.realm())
            .map_err(SyncError::from)
            .boxed()
    }

    fn skip_refresh(&self, _ctx: &SyncContext) -> bool {
        false
    }

    async fn to_patch_plan(&self, ctx: &SyncContext, target: &str) -> SyncResult<PatchPlan> {
        match self.build_patch_plan(ctx, target).await {
            Ok(plan) => {
                debug!(target = %plan.target(), operations = plan.len(), "Built group PATCH plan");
                Ok(plan)
            }
            Err(e) => {
                error!(target = %target, error = %e, "Failed to create group patch request");
                Err(e)
            }
        }
    }

    /// Apply the adapter's member set to the local group.
    async fn reconcile_existing(&self, ctx: &SyncContext) -> SyncResult<bool> {
        let Some(group_id) = self.local_id.as_deref() else {
            return Ok(false);
        };

        let directory = ctx.directory();
        let current: BTreeSet<String> = directory
            .group_members(ctx.realm(), group_id)
            .await?
            .into_iter()
            .collect();

        let diff = MembershipDiff::between(&current, &self.members);
        if diff.is_empty() {
            return Ok(false);
        }

        for user_id in &diff.added {
            if let Err(e) = directory.join_group(ctx.realm(), user_id, group_id).await {
                warn!(user_id = %user_id, group_id = %group_id, error = %e, "Failed to add member");
            }
        }
        for user_id in &diff.removed {
            if let Err(e) = directory.leave_group(ctx.realm(), user_id, group_id).await {
                warn!(user_id = %user_id, group_id = %group_id, error = %e, "Failed to remove member");
            }
        }

        info!(
            group_id = %group_id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "Reconciled group membership"
        );
        Ok(true)
    }
}
