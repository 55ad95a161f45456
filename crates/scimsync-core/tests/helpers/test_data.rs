//! Fixtures for reconciliation tests.

#![allow(dead_code)]

use scimsync_core::directory::{Attributes, InMemoryDirectory, LocalGroup, LocalRole, LocalUser};
use scimsync_core::{InMemoryMappingStore, SyncContext, SyncSettings};
use serde_json::{json, Value};
use std::sync::Arc;

pub const REALM: &str = "acme";
pub const COMPONENT: &str = "scim-target-1";

/// A context plus typed handles on its in-memory collaborators.
pub struct Fixture {
    pub ctx: SyncContext,
    pub directory: Arc<InMemoryDirectory>,
    pub mappings: Arc<InMemoryMappingStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(SyncSettings::default())
    }

    pub fn with_settings(settings: SyncSettings) -> Self {
        scimsync_core::logging::init_test_logging();
        let directory = Arc::new(InMemoryDirectory::new());
        let mappings = Arc::new(InMemoryMappingStore::new());
        let ctx = SyncContext::new(
            REALM,
            COMPONENT,
            directory.clone(),
            mappings.clone(),
            settings,
        );
        Self {
            ctx,
            directory,
            mappings,
        }
    }

    pub fn add_user(&self, user: LocalUser) -> LocalUser {
        self.directory.insert_user(REALM, user.clone());
        user
    }

    pub fn add_group(&self, group: LocalGroup, members: &[&LocalUser]) -> LocalGroup {
        self.directory.insert_group(REALM, group.clone());
        for member in members {
            self.directory.insert_membership(REALM, &member.id, &group.id);
        }
        group
    }
}

pub fn attributes(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
        .collect()
}

pub fn local_user(id: &str, username: &str) -> LocalUser {
    LocalUser {
        id: id.to_string(),
        username: username.to_string(),
        first_name: None,
        last_name: None,
        email: Some(format!("{username}@example.com")),
        enabled: true,
        attributes: Attributes::new(),
    }
}

pub fn named_user(id: &str, username: &str, first: &str, last: &str) -> LocalUser {
    LocalUser {
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        ..local_user(id, username)
    }
}

pub fn local_group(id: &str, name: &str) -> LocalGroup {
    LocalGroup {
        id: id.to_string(),
        name: name.to_string(),
        attributes: Attributes::new(),
    }
}

pub fn role(name: &str, exported: bool) -> LocalRole {
    LocalRole {
        name: name.to_string(),
        attributes: if exported {
            attributes(&[("scim", "true")])
        } else {
            Attributes::new()
        },
    }
}

pub fn remote_user(id: &str, username: &str, email: Option<&str>) -> Value {
    let mut user = json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
        "id": id,
        "userName": username,
        "displayName": username,
        "active": true,
    });
    if let Some(email) = email {
        user["emails"] = json!([{ "value": email, "primary": true }]);
    }
    user
}

pub fn remote_group(id: &str, name: &str, member_ids: &[&str]) -> Value {
    let members: Vec<Value> = member_ids
        .iter()
        .map(|m| json!({ "value": m, "type": "User", "$ref": format!("Users/{m}") }))
        .collect();
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
        "id": id,
        "displayName": name,
        "members": members,
    })
}
