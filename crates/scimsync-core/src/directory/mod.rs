//! Local identity directory seam.
//!
//! The host identity platform owns storage of users, groups, and roles. The
//! engine only reads and writes through [`LocalDirectory`], always scoped
//! by realm.

pub mod memory;

pub use memory::InMemoryDirectory;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::HashMap;

use crate::error::DirectoryResult;

/// Multi-valued string attributes attached to a directory entity.
pub type Attributes = HashMap<String, Vec<String>>;

fn first_attribute<'a>(attributes: &'a Attributes, name: &str) -> Option<&'a str> {
    attributes
        .get(name)
        .and_then(|values| values.first())
        .map(String::as_str)
}

/// A user principal in the local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    pub id: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub enabled: bool,
    pub attributes: Attributes,
}

impl LocalUser {
    /// First value of the named attribute.
    pub fn first_attribute(&self, name: &str) -> Option<&str> {
        first_attribute(&self.attributes, name)
    }
}

/// A group of principals in the local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalGroup {
    pub id: String,
    pub name: String,
    pub attributes: Attributes,
}

impl LocalGroup {
    /// First value of the named attribute.
    pub fn first_attribute(&self, name: &str) -> Option<&str> {
        first_attribute(&self.attributes, name)
    }
}

/// A role that can be granted to users directly or through groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRole {
    pub name: String,
    pub attributes: Attributes,
}

impl LocalRole {
    /// First value of the named attribute.
    pub fn first_attribute(&self, name: &str) -> Option<&str> {
        first_attribute(&self.attributes, name)
    }
}

/// Data required to add a user to the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewLocalUser {
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub enabled: bool,
}

/// Filter for [`LocalDirectory::users`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserQuery {
    /// Only yield users whose account is enabled.
    pub enabled_only: bool,
}

/// Read/write access to the local identity directory.
///
/// Lookups that find nothing return `Ok(None)`; errors are reserved for
/// failures of the directory itself or writes against missing entities.
#[async_trait]
pub trait LocalDirectory: Send + Sync {
    async fn get_user_by_id(&self, realm: &str, id: &str) -> DirectoryResult<Option<LocalUser>>;

    async fn get_user_by_username(
        &self,
        realm: &str,
        username: &str,
    ) -> DirectoryResult<Option<LocalUser>>;

    async fn get_user_by_email(
        &self,
        realm: &str,
        email: &str,
    ) -> DirectoryResult<Option<LocalUser>>;

    /// Add a user; fails with a conflict when the username is taken.
    async fn add_user(&self, realm: &str, user: NewLocalUser) -> DirectoryResult<LocalUser>;

    /// Enumerate users lazily. Each call starts a fresh pass.
    fn users<'a>(
        &'a self,
        realm: &'a str,
        query: UserQuery,
    ) -> BoxStream<'a, DirectoryResult<LocalUser>>;

    /// Roles granted directly to the user.
    async fn user_role_mappings(&self, realm: &str, user_id: &str)
        -> DirectoryResult<Vec<LocalRole>>;

    /// Groups the user belongs to.
    async fn user_groups(&self, realm: &str, user_id: &str) -> DirectoryResult<Vec<LocalGroup>>;

    async fn get_group_by_id(&self, realm: &str, id: &str) -> DirectoryResult<Option<LocalGroup>>;

    /// Enumerate groups lazily. Each call starts a fresh pass.
    fn groups<'a>(&'a self, realm: &'a str) -> BoxStream<'a, DirectoryResult<LocalGroup>>;

    /// Roles granted to every member of the group.
    async fn group_role_mappings(
        &self,
        realm: &str,
        group_id: &str,
    ) -> DirectoryResult<Vec<LocalRole>>;

    /// Ids of the users that belong to the group.
    async fn group_members(&self, realm: &str, group_id: &str) -> DirectoryResult<Vec<String>>;

    async fn create_group(&self, realm: &str, name: &str) -> DirectoryResult<LocalGroup>;

    async fn join_group(&self, realm: &str, user_id: &str, group_id: &str) -> DirectoryResult<()>;

    async fn leave_group(&self, realm: &str, user_id: &str, group_id: &str)
        -> DirectoryResult<()>;
}
