//! In-memory [`LocalDirectory`] for tests and embedders.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{LocalDirectory, LocalGroup, LocalRole, LocalUser, NewLocalUser, UserQuery};
use crate::error::{DirectoryError, DirectoryResult};

#[derive(Debug, Default)]
struct RealmData {
    users: BTreeMap<String, LocalUser>,
    groups: BTreeMap<String, LocalGroup>,
    user_roles: HashMap<String, Vec<LocalRole>>,
    group_roles: HashMap<String, Vec<LocalRole>>,
    /// group id -> member user ids
    members: HashMap<String, BTreeSet<String>>,
}

impl RealmData {
    fn user_by(&self, pred: impl Fn(&LocalUser) -> bool) -> Option<LocalUser> {
        self.users.values().find(|u| pred(u)).cloned()
    }
}

/// Directory held entirely in memory, partitioned by realm.
///
/// Entities are enumerated in id order. Usernames and emails match
/// case-insensitively.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    realms: RwLock<HashMap<String, RealmData>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, RealmData>> {
        self.realms.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RealmData>> {
        self.realms.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_realm<T>(&self, realm: &str, f: impl FnOnce(&RealmData) -> T) -> Option<T> {
        self.read().get(realm).map(f)
    }

    /// Insert or replace a user with a caller-chosen id.
    pub fn insert_user(&self, realm: &str, user: LocalUser) {
        self.write()
            .entry(realm.to_string())
            .or_default()
            .users
            .insert(user.id.clone(), user);
    }

    /// Insert or replace a group with a caller-chosen id.
    pub fn insert_group(&self, realm: &str, group: LocalGroup) {
        self.write()
            .entry(realm.to_string())
            .or_default()
            .groups
            .insert(group.id.clone(), group);
    }

    /// Remove a user and all of its memberships.
    pub fn remove_user(&self, realm: &str, user_id: &str) {
        if let Some(data) = self.write().get_mut(realm) {
            data.users.remove(user_id);
            data.user_roles.remove(user_id);
            for members in data.members.values_mut() {
                members.remove(user_id);
            }
        }
    }

    /// Grant a role directly to a user.
    pub fn grant_user_role(&self, realm: &str, user_id: &str, role: LocalRole) {
        self.write()
            .entry(realm.to_string())
            .or_default()
            .user_roles
            .entry(user_id.to_string())
            .or_default()
            .push(role);
    }

    /// Grant a role to a group.
    pub fn grant_group_role(&self, realm: &str, group_id: &str, role: LocalRole) {
        self.write()
            .entry(realm.to_string())
            .or_default()
            .group_roles
            .entry(group_id.to_string())
            .or_default()
            .push(role);
    }

    /// Record a membership without validating either side.
    pub fn insert_membership(&self, realm: &str, user_id: &str, group_id: &str) {
        self.write()
            .entry(realm.to_string())
            .or_default()
            .members
            .entry(group_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    pub fn user_count(&self, realm: &str) -> usize {
        self.with_realm(realm, |data| data.users.len()).unwrap_or(0)
    }

    pub fn group_count(&self, realm: &str) -> usize {
        self.with_realm(realm, |data| data.groups.len()).unwrap_or(0)
    }

    /// Snapshot of a group's member ids.
    pub fn members_of(&self, realm: &str, group_id: &str) -> BTreeSet<String> {
        self.with_realm(realm, |data| data.members.get(group_id).cloned())
            .flatten()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LocalDirectory for InMemoryDirectory {
    async fn get_user_by_id(&self, realm: &str, id: &str) -> DirectoryResult<Option<LocalUser>> {
        Ok(self
            .with_realm(realm, |data| data.users.get(id).cloned())
            .flatten())
    }

    async fn get_user_by_username(
        &self,
        realm: &str,
        username: &str,
    ) -> DirectoryResult<Option<LocalUser>> {
        Ok(self
            .with_realm(realm, |data| {
                data.user_by(|u| u.username.eq_ignore_ascii_case(username))
            })
            .flatten())
    }

    async fn get_user_by_email(
        &self,
        realm: &str,
        email: &str,
    ) -> DirectoryResult<Option<LocalUser>> {
        Ok(self
            .with_realm(realm, |data| {
                data.user_by(|u| {
                    u.email
                        .as_deref()
                        .is_some_and(|e| e.eq_ignore_ascii_case(email))
                })
            })
            .flatten())
    }

    async fn add_user(&self, realm: &str, user: NewLocalUser) -> DirectoryResult<LocalUser> {
        let mut realms = self.write();
        let data = realms.entry(realm.to_string()).or_default();

        if data
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&user.username))
        {
            return Err(DirectoryError::conflict(format!(
                "username '{}' already exists in realm {realm}",
                user.username
            )));
        }

        let created = LocalUser {
            id: Uuid::new_v4().to_string(),
            username: user.username.to_lowercase(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            enabled: user.enabled,
            attributes: Default::default(),
        };
        data.users.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    fn users<'a>(
        &'a self,
        realm: &'a str,
        query: UserQuery,
    ) -> BoxStream<'a, DirectoryResult<LocalUser>> {
        let snapshot: Vec<LocalUser> = self
            .with_realm(realm, |data| {
                data.users
                    .values()
                    .filter(|u| !query.enabled_only || u.enabled)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        stream::iter(snapshot.into_iter().map(Ok)).boxed()
    }

    async fn user_role_mappings(
        &self,
        realm: &str,
        user_id: &str,
    ) -> DirectoryResult<Vec<LocalRole>> {
        Ok(self
            .with_realm(realm, |data| data.user_roles.get(user_id).cloned())
            .flatten()
            .unwrap_or_default())
    }

    async fn user_groups(&self, realm: &str, user_id: &str) -> DirectoryResult<Vec<LocalGroup>> {
        Ok(self
            .with_realm(realm, |data| {
                data.groups
                    .values()
                    .filter(|g| {
                        data.members
                            .get(&g.id)
                            .is_some_and(|members| members.contains(user_id))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_group_by_id(&self, realm: &str, id: &str) -> DirectoryResult<Option<LocalGroup>> {
        Ok(self
            .with_realm(realm, |data| data.groups.get(id).cloned())
            .flatten())
    }

    fn groups<'a>(&'a self, realm: &'a str) -> BoxStream<'a, DirectoryResult<LocalGroup>> {
        let snapshot: Vec<LocalGroup> = self
            .with_realm(realm, |data| data.groups.values().cloned().collect())
            .unwrap_or_default();
        stream::iter(snapshot.into_iter().map(Ok)).boxed()
    }

    async fn group_role_mappings(
        &self,
        realm: &str,
        group_id: &str,
    ) -> DirectoryResult<Vec<LocalRole>> {
        Ok(self
            .with_realm(realm, |data| data.group_roles.get(group_id).cloned())
            .flatten()
            .unwrap_or_default())
    }

    async fn group_members(&self, realm: &str, group_id: &str) -> DirectoryResult<Vec<String>> {
        Ok(self.members_of(realm, group_id).into_iter().collect())
    }

    async fn create_group(&self, realm: &str, name: &str) -> DirectoryResult<LocalGroup> {
        let group = LocalGroup {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            attributes: Default::default(),
        };
        self.insert_group(realm, group.clone());
        Ok(group)
    }

    async fn join_group(&self, realm: &str, user_id: &str, group_id: &str) -> DirectoryResult<()> {
        let mut realms = self.write();
        let data = realms
            .get_mut(realm)
            .ok_or_else(|| DirectoryError::not_found("Realm", realm))?;

        if !data.users.contains_key(user_id) {
            return Err(DirectoryError::not_found("User", user_id));
        }
        if !data.groups.contains_key(group_id) {
            return Err(DirectoryError::not_found("Group", group_id));
        }

        data.members
            .entry(group_id.to_string())
            .or_default()
            .insert(user_id.to_string());
        Ok(())
    }

    async fn leave_group(
        &self,
        realm: &str,
        user_id: &str,
        group_id: &str,
    ) -> DirectoryResult<()> {
        let mut realms = self.write();
        let data = realms
            .get_mut(realm)
            .ok_or_else(|| DirectoryError::not_found("Realm", realm))?;

        if !data.groups.contains_key(group_id) {
            return Err(DirectoryError::not_found("Group", group_id));
        }
        if let Some(members) = data.members.get_mut(group_id) {
            members.remove(user_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    fn user(id: &str, username: &str, enabled: bool) -> LocalUser {
        LocalUser {
            id: id.to_string(),
            username: username.to_string(),
            first_name: None,
            last_name: None,
            email: Some(format!("{username}@example.com")),
            enabled,
            attributes: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let dir = InMemoryDirectory::new();
        dir.insert_user("r", user("u1", "alice", true));

        let by_name = dir.get_user_by_username("r", "ALICE").await.unwrap();
        let by_email = dir.get_user_by_email("r", "Alice@Example.com").await.unwrap();

        assert_eq!(by_name.unwrap().id, "u1");
        assert_eq!(by_email.unwrap().id, "u1");
        assert!(dir.get_user_by_id("other", "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_user_rejects_duplicate_username() {
        let dir = InMemoryDirectory::new();
        dir.insert_user("r", user("u1", "alice", true));

        let err = dir
            .add_user(
                "r",
                NewLocalUser {
                    username: "Alice".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_users_stream_filters_disabled() {
        let dir = InMemoryDirectory::new();
        dir.insert_user("r", user("u1", "alice", true));
        dir.insert_user("r", user("u2", "bob", false));

        let enabled: Vec<LocalUser> = dir
            .users("r", UserQuery { enabled_only: true })
            .try_collect()
            .await
            .unwrap();
        let all: Vec<LocalUser> = dir
            .users("r", UserQuery::default())
            .try_collect()
            .await
            .unwrap();

        assert_eq!(enabled.len(), 1);
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_membership_round_trip() {
        let dir = InMemoryDirectory::new();
        dir.insert_user("r", user("u1", "alice", true));
        let group = dir.create_group("r", "Engineering").await.unwrap();

        dir.join_group("r", "u1", &group.id).await.unwrap();
        assert_eq!(dir.group_members("r", &group.id).await.unwrap(), vec!["u1"]);
        assert_eq!(dir.user_groups("r", "u1").await.unwrap()[0].name, "Engineering");

        dir.leave_group("r", "u1", &group.id).await.unwrap();
        assert!(dir.group_members("r", &group.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_join_unknown_user_fails() {
        let dir = InMemoryDirectory::new();
        let group = dir.create_group("r", "Engineering").await.unwrap();

        let err = dir.join_group("r", "ghost", &group.id).await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { kind: "User", .. }));
    }
}
