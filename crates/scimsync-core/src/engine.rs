//! Reconciliation passes.
//!
//! A pass walks one resource type in one direction. Each entity is
//! reconciled independently: a failure is recorded in the report and the
//! pass moves on.

use futures_util::StreamExt;
use scimsync_db::ScimResourceType;
use scimsync_models::ScimResource;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::adapter::{EntityAdapter, GroupAdapter, UserAdapter};
use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::mapping::MappingLookup;
use crate::remote::RemoteDirectory;

/// Direction of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Local directory to remote service provider.
    Outbound,
    /// Remote service provider to local directory.
    Inbound,
}

/// What happened to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOutcome {
    /// Created on the receiving side and mapped.
    Created,
    /// Already mapped; the receiving side was updated.
    Updated,
    /// Matched to an existing unmapped entity and mapped.
    Linked,
    /// Already mapped and already in sync.
    Unchanged,
    /// Opted out or refresh-protected.
    Skipped,
}

/// A failed entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFailure {
    /// Local id on outbound passes, external id on inbound passes.
    pub entity: String,
    pub error: String,
}

/// Counts for one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub resource_type: ScimResourceType,
    pub created: usize,
    pub updated: usize,
    pub linked: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failures: Vec<EntityFailure>,
}

impl SyncReport {
    pub fn new(direction: SyncDirection, resource_type: ScimResourceType) -> Self {
        Self {
            direction,
            resource_type,
            created: 0,
            updated: 0,
            linked: 0,
            unchanged: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: EntityOutcome) {
        match outcome {
            EntityOutcome::Created => self.created += 1,
            EntityOutcome::Updated => self.updated += 1,
            EntityOutcome::Linked => self.linked += 1,
            EntityOutcome::Unchanged => self.unchanged += 1,
            EntityOutcome::Skipped => self.skipped += 1,
        }
    }

    fn fail(&mut self, entity: impl Into<String>, error: &SyncError) {
        self.failures.push(EntityFailure {
            entity: entity.into(),
            error: error.to_string(),
        });
    }

    /// Entities visited, successful or not.
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.linked + self.unchanged + self.skipped + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives adapters between a local directory and a remote SCIM directory.
pub struct SyncEngine {
    ctx: SyncContext,
    remote: Arc<dyn RemoteDirectory>,
}

impl SyncEngine {
    pub fn new(ctx: SyncContext, remote: Arc<dyn RemoteDirectory>) -> Self {
        Self { ctx, remote }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// Export every eligible local entity of one type.
    pub async fn sync_outbound<A: EntityAdapter>(&self) -> SyncReport {
        let mut report = SyncReport::new(SyncDirection::Outbound, A::RESOURCE_TYPE);
        info!(
            realm = %self.ctx.realm(),
            component_id = %self.ctx.component_id(),
            resource_type = %A::RESOURCE_TYPE,
            "Starting outbound sync"
        );

        let mut locals = A::resource_stream(&self.ctx);
        while let Some(item) = locals.next().await {
            let local = match item {
                Ok(local) => local,
                Err(e) => {
                    error!(resource_type = %A::RESOURCE_TYPE, error = %e, "Failed to read local entity");
                    report.fail("<directory>", &e);
                    continue;
                }
            };

            let mut adapter = A::default();
            match self.export_entity(&mut adapter, &local).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    let entity = adapter.local_id().unwrap_or("<unknown>").to_string();
                    error!(
                        resource_type = %A::RESOURCE_TYPE,
                        local_id = %entity,
                        error = %e,
                        "Failed to export entity"
                    );
                    report.fail(entity, &e);
                }
            }
        }

        log_report(&report);
        report
    }

    /// Import every remote resource of one type.
    pub async fn sync_inbound<A: EntityAdapter>(&self) -> SyncReport {
        let mut report = SyncReport::new(SyncDirection::Inbound, A::RESOURCE_TYPE);
        info!(
            realm = %self.ctx.realm(),
            component_id = %self.ctx.component_id(),
            resource_type = %A::RESOURCE_TYPE,
            "Starting inbound sync"
        );

        let resources = match self.remote.list(A::RESOURCE_TYPE).await {
            Ok(resources) => resources,
            Err(e) => {
                let e = SyncError::from(e);
                error!(resource_type = %A::RESOURCE_TYPE, error = %e, "Failed to list remote resources");
                report.fail("<remote>", &e);
                return report;
            }
        };

        for body in resources {
            let mut adapter = A::default();
            match self.import_entity(&mut adapter, body).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    let entity = adapter.external_id().unwrap_or("<unknown>").to_string();
                    error!(
                        resource_type = %A::RESOURCE_TYPE,
                        external_id = %entity,
                        error = %e,
                        "Failed to import resource"
                    );
                    report.fail(entity, &e);
                }
            }
        }

        log_report(&report);
        report
    }

    /// Users, then groups, so group members are already mapped.
    pub async fn full_outbound(&self) -> Vec<SyncReport> {
        vec![
            self.sync_outbound::<UserAdapter>().await,
            self.sync_outbound::<GroupAdapter>().await,
        ]
    }

    /// Users, then groups, so member references resolve.
    pub async fn full_inbound(&self) -> Vec<SyncReport> {
        vec![
            self.sync_inbound::<UserAdapter>().await,
            self.sync_inbound::<GroupAdapter>().await,
        ]
    }

    async fn export_entity<A: EntityAdapter>(
        &self,
        adapter: &mut A,
        local: &A::Local,
    ) -> SyncResult<EntityOutcome> {
        let ctx = &self.ctx;
        adapter.apply_from_local(ctx, local).await?;

        if adapter.skip() {
            debug!(local_id = ?adapter.local_id(), "Entity opted out of sync");
            return Ok(EntityOutcome::Skipped);
        }

        let local_id = adapter
            .local_id()
            .ok_or_else(|| SyncError::missing_field(A::RESOURCE_TYPE, "localId"))?
            .to_string();

        if let Some(record) = adapter
            .lookup_mapping(ctx, MappingLookup::ByLocalId(&local_id))
            .await?
        {
            adapter.set_external_id(record.external_id.clone());
            if adapter.skip_refresh(ctx) {
                debug!(local_id = %local_id, "Refresh suppressed for protected entity");
                return Ok(EntityOutcome::Skipped);
            }

            let target = format!("{}/{}", A::RESOURCE_TYPE.endpoint(), record.external_id);
            let plan = adapter.to_patch_plan(ctx, &target).await?;
            self.remote.patch(&plan).await?;
            return Ok(EntityOutcome::Updated);
        }

        let resource = adapter.to_remote_representation(ctx, false).await?;
        let created = self
            .remote
            .create(A::RESOURCE_TYPE, serde_json::to_value(&resource)?)
            .await?;
        let created: A::Remote = serde_json::from_value(created)?;
        let remote_id = created
            .resource_id()
            .ok_or(SyncError::MissingRemoteId {
                resource_type: A::RESOURCE_TYPE,
            })?
            .to_string();

        adapter.set_external_id(remote_id);
        adapter.save_mapping(ctx).await?;
        Ok(EntityOutcome::Created)
    }

    async fn import_entity<A: EntityAdapter>(
        &self,
        adapter: &mut A,
        body: serde_json::Value,
    ) -> SyncResult<EntityOutcome> {
        let ctx = &self.ctx;
        let remote: A::Remote = serde_json::from_value(body)?;
        adapter.apply_from_remote(ctx, &remote).await?;

        let external_id = adapter
            .external_id()
            .ok_or(SyncError::MissingRemoteId {
                resource_type: A::RESOURCE_TYPE,
            })?
            .to_string();

        if adapter.resolve_local_id(ctx).await? {
            if !adapter.entity_exists(ctx).await? {
                let local_id = adapter.local_id().unwrap_or_default().to_string();
                warn!(
                    external_id = %external_id,
                    local_id = %local_id,
                    "Mapping points at a deleted local entity"
                );
                return Err(SyncError::StaleMapping {
                    resource_type: A::RESOURCE_TYPE,
                    external_id,
                    local_id,
                });
            }

            return Ok(if adapter.reconcile_existing(ctx).await? {
                EntityOutcome::Updated
            } else {
                EntityOutcome::Unchanged
            });
        }

        if adapter.try_to_map(ctx).await? {
            adapter.save_mapping(ctx).await?;
            adapter.reconcile_existing(ctx).await?;
            return Ok(EntityOutcome::Linked);
        }

        adapter.create_entity(ctx).await?;
        adapter.save_mapping(ctx).await?;
        Ok(EntityOutcome::Created)
    }
}

fn log_report(report: &SyncReport) {
    info!(
        direction = ?report.direction,
        resource_type = %report.resource_type,
        created = report.created,
        updated = report.updated,
        linked = report.linked,
        unchanged = report.unchanged,
        skipped = report.skipped,
        failed = report.failures.len(),
        "Sync pass finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = SyncReport::new(SyncDirection::Outbound, ScimResourceType::User);
        report.record(EntityOutcome::Created);
        report.record(EntityOutcome::Created);
        report.record(EntityOutcome::Skipped);
        report.fail("u-9", &SyncError::missing_field(ScimResourceType::User, "username"));

        assert_eq!(report.created, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed(), 4);
        assert!(!report.is_clean());
        assert_eq!(report.failures[0].entity, "u-9");
    }
}
