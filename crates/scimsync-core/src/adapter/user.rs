//! User adapter.

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use scimsync_db::ScimResourceType;
use scimsync_models::{ScimEmail, ScimName, ScimRole, ScimUser};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::{resource_meta, set_once, EntityAdapter, PatchOperation, PatchPlan};
use crate::context::SyncContext;
use crate::directory::{LocalRole, LocalUser, NewLocalUser, UserQuery};
use crate::error::{SyncError, SyncResult};

/// Reconciliation state for one user.
///
/// `username`, `display_name`, `email` and `active` are written once: the
/// first source to provide a value wins and later writes are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAdapter {
    local_id: Option<String>,
    external_id: Option<String>,
    skip: bool,
    username: Option<String>,
    display_name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    email: Option<String>,
    active: Option<bool>,
    roles: BTreeSet<String>,
}

impl UserAdapter {
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn given_name(&self) -> Option<&str> {
        self.given_name.as_deref()
    }

    pub fn family_name(&self) -> Option<&str> {
        self.family_name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn active(&self) -> Option<bool> {
        self.active
    }

    /// Exported role names, deduplicated.
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        set_once(&mut self.username, Some(username.into()));
    }

    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        set_once(&mut self.display_name, Some(display_name.into()));
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        set_once(&mut self.email, Some(email.into()));
    }

    pub fn set_active(&mut self, active: bool) {
        set_once(&mut self.active, Some(active));
    }

    pub fn set_given_name(&mut self, given_name: Option<String>) {
        self.given_name = given_name;
    }

    pub fn set_family_name(&mut self, family_name: Option<String>) {
        self.family_name = family_name;
    }

    /// Roles granted through the user's groups plus those granted directly,
    /// keeping only roles flagged for export.
    async fn exported_roles(ctx: &SyncContext, user: &LocalUser) -> SyncResult<BTreeSet<String>> {
        let directory = ctx.directory();
        let attribute = ctx.settings().export_role_attribute.as_str();
        let exported = |role: &LocalRole| role.first_attribute(attribute) == Some("true");

        let mut roles = BTreeSet::new();
        for group in directory.user_groups(ctx.realm(), &user.id).await? {
            let group_roles = directory.group_role_mappings(ctx.realm(), &group.id).await?;
            roles.extend(
                group_roles
                    .into_iter()
                    .filter(|role| exported(role))
                    .map(|role| role.name),
            );
        }

        let direct = directory.user_role_mappings(ctx.realm(), &user.id).await?;
        roles.extend(
            direct
                .into_iter()
                .filter(|role| exported(role))
                .map(|role| role.name),
        );

        Ok(roles)
    }
}

/// `"<first> <last>"` trimmed, or the username when both are blank.
fn derive_display_name(user: &LocalUser) -> String {
    let full = format!(
        "{} {}",
        user.first_name.as_deref().unwrap_or_default(),
        user.last_name.as_deref().unwrap_or_default()
    );
    let full = full.trim();
    if full.is_empty() {
        user.username.clone()
    } else {
        full.to_string()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl EntityAdapter for UserAdapter {
    type Local = LocalUser;
    type Remote = ScimUser;

    const RESOURCE_TYPE: ScimResourceType = ScimResourceType::User;

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

    async fn apply_from_local(&mut self, ctx: &SyncContext, user: &LocalUser) -> SyncResult<()> {
        self.local_id = Some(user.id.clone());
        self.set_username(user.username.clone());
        self.set_display_name(derive_display_name(user));
        self.given_name = user.first_name.clone();
        self.family_name = user.last_name.clone();
        if let Some(email) = &user.email {
            self.set_email(email.clone());
        }
        self.set_active(user.enabled);
        self.skip = user.first_attribute(&ctx.settings().skip_attribute) == Some("true");
        self.roles = Self::exported_roles(ctx, user).await?;
        Ok(())
    }

    async fn apply_from_remote(&mut self, _ctx: &SyncContext, user: &ScimUser) -> SyncResult<()> {
        if let Some(id) = &user.id {
            self.external_id = Some(id.clone());
        }
        self.set_username(user.user_name.clone());
        if let Some(display_name) = &user.display_name {
            self.set_display_name(display_name.clone());
        }
        self.set_active(user.active);
        if let Some(email) = user.emails.first() {
            self.set_email(email.value.clone());
        }
        if let Some(name) = &user.name {
            self.given_name = name.given_name.clone();
            self.family_name = name.family_name.clone();
        }
        Ok(())
    }

    async fn to_remote_representation(
        &self,
        ctx: &SyncContext,
        include_meta: bool,
    ) -> SyncResult<ScimUser> {
        let mut user = ScimUser::new(self.username.clone().unwrap_or_default());
        user.id = self.external_id.clone();
        user.external_id = self.local_id.clone();
        user.display_name = self.display_name.clone();
        if self.given_name.is_some() || self.family_name.is_some() {
            user.name = Some(ScimName {
                formatted: None,
                family_name: self.family_name.clone(),
                given_name: self.given_name.clone(),
            });
        }
        user.active = self.active.unwrap_or(true);
        user.emails = self
            .email
            .iter()
            .map(|email| ScimEmail {
                value: email.clone(),
                email_type: None,
                primary: true,
            })
            .collect();
        user.roles = self
            .roles
            .iter()
            .map(|role| ScimRole {
                value: role.clone(),
                display: None,
            })
            .collect();
        if include_meta {
            user.meta = resource_meta(ctx, Self::RESOURCE_TYPE, self.external_id.as_deref());
        }
        Ok(user)
    }

    async fn entity_exists(&self, ctx: &SyncContext) -> SyncResult<bool> {
        let Some(local_id) = self.local_id.as_deref() else {
            return Ok(false);
        };
        Ok(ctx
            .directory()
            .get_user_by_id(ctx.realm(), local_id)
            .await?
            .is_some())
    }

    async fn try_to_map(&mut self, ctx: &SyncContext) -> SyncResult<bool> {
        let directory = ctx.directory();

        let by_username = match non_empty(self.username.as_deref()) {
            Some(username) => directory.get_user_by_username(ctx.realm(), username).await?,
            None => None,
        };
        let by_email = match non_empty(self.email.as_deref()) {
            Some(email) => directory.get_user_by_email(ctx.realm(), email).await?,
            None => None,
        };

        match (by_username, by_email) {
            (Some(a), Some(b)) if a.id != b.id => {
                warn!(
                    external_id = ?self.external_id,
                    username_match = %a.id,
                    email_match = %b.id,
                    "Username and email match different local users, not mapping"
                );
                Ok(false)
            }
            (Some(user), _) | (None, Some(user)) => {
                debug!(
                    external_id = ?self.external_id,
                    local_id = %user.id,
                    "Matched remote user to existing local user"
                );
                self.local_id = Some(user.id);
                Ok(true)
            }
            (None, None) => Ok(false),
        }
    }

    async fn create_entity(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let username = non_empty(self.username.as_deref())
            .ok_or_else(|| SyncError::missing_field(Self::RESOURCE_TYPE, "username"))?
            .to_string();

        let created = ctx
            .directory()
            .add_user(
                ctx.realm(),
                NewLocalUser {
                    username,
                    first_name: self.given_name.clone(),
                    last_name: self.family_name.clone(),
                    email: self.email.clone(),
                    enabled: self.active.unwrap_or(true),
                },
            )
            .await?;

        info!(
            local_id = %created.id,
            username = %created.username,
            external_id = ?self.external_id,
            "Created local user from remote resource"
        );
        self.local_id = Some(created.id);
        Ok(())
    }

    fn resource_stream<'a>(ctx: &'a SyncContext) -> BoxStream<'a, SyncResult<LocalUser>> {
        let query = UserQuery {
            enabled_only: ctx.settings().enabled_users_only,
        };
        ctx.directory()
            .users(ctx.realm(), query)
            .map_err(SyncError::from)
            .boxed()
    }

    fn skip_refresh(&self, ctx: &SyncContext) -> bool {
        self.username
            .as_deref()
            .is_some_and(|username| ctx.settings().is_refresh_protected(username))
    }

    async fn to_patch_plan(&self, ctx: &SyncContext, target: &str) -> SyncResult<PatchPlan> {
        let mut plan = PatchPlan::new(ctx.resolve_location(target)?);
        plan.push(PatchOperation::replace(
            "active",
            self.active.unwrap_or(true),
        ));
        plan.push(PatchOperation::replace(
            "userName",
            self.username.clone().map_or(Value::Null, Value::String),
        ));
        plan.push(PatchOperation::replace(
            "displayName",
            self.display_name.clone().map_or(Value::Null, Value::String),
        ));
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(first: Option<&str>, last: Option<&str>) -> LocalUser {
        LocalUser {
            id: "u-1".to_string(),
            username: "jdoe".to_string(),
            first_name: first.map(str::to_string),
            last_name: last.map(str::to_string),
            email: None,
            enabled: true,
            attributes: Default::default(),
        }
    }

    #[test]
    fn test_display_name_from_names() {
        assert_eq!(derive_display_name(&local(Some("Jane"), Some("Doe"))), "Jane Doe");
        assert_eq!(derive_display_name(&local(Some("Jane"), None)), "Jane");
        assert_eq!(derive_display_name(&local(None, Some("Doe"))), "Doe");
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        assert_eq!(derive_display_name(&local(None, None)), "jdoe");
        assert_eq!(derive_display_name(&local(Some(" "), Some(""))), "jdoe");
    }

    #[test]
    fn test_set_once_fields() {
        let mut adapter = UserAdapter::default();
        adapter.set_username("first");
        adapter.set_username("second");
        adapter.set_display_name("First");
        adapter.set_display_name("Second");
        adapter.set_email("a@example.com");
        adapter.set_email("b@example.com");
        adapter.set_active(false);
        adapter.set_active(true);

        assert_eq!(adapter.username(), Some("first"));
        assert_eq!(adapter.display_name(), Some("First"));
        assert_eq!(adapter.email(), Some("a@example.com"));
        assert_eq!(adapter.active(), Some(false));
    }

    #[test]
    fn test_names_are_overwritable() {
        let mut adapter = UserAdapter::default();
        adapter.set_given_name(Some("Jane".to_string()));
        adapter.set_given_name(Some("Janet".to_string()));
        assert_eq!(adapter.given_name(), Some("Janet"));
    }
}
