//! In-memory SCIM service provider for engine tests.
//!
//! Assigns ids on create, records every PATCH plan it receives, and can be
//! told to fail creates for a given userName or displayName.

#![allow(dead_code)]

use async_trait::async_trait;
use scimsync_core::adapter::PatchPlan;
use scimsync_core::error::{RemoteError, RemoteResult};
use scimsync_core::{RemoteDirectory, ScimResourceType};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MockRemote {
    users: RwLock<BTreeMap<String, Value>>,
    groups: RwLock<BTreeMap<String, Value>>,
    patches: RwLock<Vec<PatchPlan>>,
    rejected_names: RwLock<HashSet<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self, resource_type: ScimResourceType) -> &RwLock<BTreeMap<String, Value>> {
        match resource_type {
            ScimResourceType::User => &self.users,
            ScimResourceType::Group => &self.groups,
        }
    }

    /// Seed a resource as if it already existed on the provider.
    pub async fn seed(&self, resource_type: ScimResourceType, resource: Value) {
        let id = resource["id"]
            .as_str()
            .expect("seeded resource must carry an id")
            .to_string();
        self.store(resource_type).write().await.insert(id, resource);
    }

    /// Fail creates whose userName or displayName equals `name`.
    pub async fn reject(&self, name: &str) {
        self.rejected_names.write().await.insert(name.to_string());
    }

    pub async fn resources(&self, resource_type: ScimResourceType) -> Vec<Value> {
        self.store(resource_type).read().await.values().cloned().collect()
    }

    pub async fn patches(&self) -> Vec<PatchPlan> {
        self.patches.read().await.clone()
    }
}

#[async_trait]
impl RemoteDirectory for MockRemote {
    async fn create(&self, resource_type: ScimResourceType, mut body: Value) -> RemoteResult<Value> {
        let name = body
            .get("userName")
            .or_else(|| body.get("displayName"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if self.rejected_names.read().await.contains(&name) {
            return Err(RemoteError::Conflict {
                message: format!("{name} already exists"),
            });
        }

        let id = Uuid::new_v4().to_string();
        body["id"] = Value::String(id.clone());
        self.store(resource_type).write().await.insert(id, body.clone());
        Ok(body)
    }

    async fn patch(&self, plan: &PatchPlan) -> RemoteResult<()> {
        self.patches.write().await.push(plan.clone());
        Ok(())
    }

    async fn list(&self, resource_type: ScimResourceType) -> RemoteResult<Vec<Value>> {
        Ok(self.resources(resource_type).await)
    }
}
