//! Remote SCIM directory seam.
//!
//! Request framing, authentication and retries belong to the SCIM client
//! that implements this trait. Bodies travel as JSON so the trait stays
//! object safe.

use async_trait::async_trait;
use scimsync_db::ScimResourceType;

use crate::adapter::PatchPlan;
use crate::error::RemoteResult;

#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// POST a new resource; returns the resource as stored by the provider.
    async fn create(
        &self,
        resource_type: ScimResourceType,
        body: serde_json::Value,
    ) -> RemoteResult<serde_json::Value>;

    /// PATCH the resource at `plan.target()`.
    async fn patch(&self, plan: &PatchPlan) -> RemoteResult<()>;

    /// List every resource of a type.
    async fn list(&self, resource_type: ScimResourceType) -> RemoteResult<Vec<serde_json::Value>>;
}
