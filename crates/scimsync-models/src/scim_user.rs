//! SCIM User resource schema (RFC 7643 Section 4.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SCIM User name component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    /// Formatted full name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,

    /// Family name (last name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    /// Given name (first name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
}

/// SCIM Email value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimEmail {
    /// Email address.
    pub value: String,

    /// Email type (e.g., "work", "home").
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub email_type: Option<String>,

    /// Whether this is the primary email.
    #[serde(default)]
    pub primary: bool,
}

/// SCIM role value (multi-valued `roles` attribute).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimRole {
    pub value: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// SCIM Resource metadata.
///
/// Outbound resources only carry `resourceType` and `location`; the
/// timestamps are populated by service providers on inbound resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimMeta {
    /// Resource type (User or Group).
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    /// Resource location URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Resource version (`ETag`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ScimMeta {
    /// Metadata carrying only a resource type and location.
    pub fn located(resource_type: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            created: None,
            last_modified: None,
            location: Some(location.into()),
            version: None,
        }
    }
}

/// SCIM User resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    /// SCIM schemas.
    #[serde(default = "default_user_schemas")]
    pub schemas: Vec<String>,

    /// Identifier assigned by the service provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Identifier assigned by the provisioning client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Unique username.
    pub user_name: String,

    /// User's name components.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<ScimName>,

    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Whether the user is active.
    #[serde(default = "default_active")]
    pub active: bool,

    /// User's email addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<ScimEmail>,

    /// Roles granted to the user.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<ScimRole>,

    /// Resource metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ScimMeta>,
}

fn default_active() -> bool {
    true
}

fn default_user_schemas() -> Vec<String> {
    vec![ScimUser::SCHEMA.to_string()]
}

impl ScimUser {
    /// SCIM Core User schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:schemas:core:2.0:User";

    /// Create a new SCIM User with required fields.
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            schemas: default_user_schemas(),
            id: None,
            external_id: None,
            user_name: user_name.into(),
            name: None,
            display_name: None,
            active: true,
            emails: vec![],
            roles: vec![],
            meta: None,
        }
    }

    /// Get the primary email address, falling back to the first one.
    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|e| e.primary)
            .or_else(|| self.emails.first())
            .map(|e| e.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scim_user_new() {
        let user = ScimUser::new("john@example.com");

        assert_eq!(user.schemas, vec![ScimUser::SCHEMA.to_string()]);
        assert_eq!(user.user_name, "john@example.com");
        assert!(user.active);
        assert!(user.emails.is_empty());
        assert!(user.roles.is_empty());
    }

    #[test]
    fn test_primary_email_prefers_primary_flag() {
        let mut user = ScimUser::new("john");
        user.emails = vec![
            ScimEmail {
                value: "home@example.com".to_string(),
                email_type: Some("home".to_string()),
                primary: false,
            },
            ScimEmail {
                value: "work@example.com".to_string(),
                email_type: Some("work".to_string()),
                primary: true,
            },
        ];

        assert_eq!(user.primary_email(), Some("work@example.com"));
    }

    #[test]
    fn test_deserialize_scim_user_with_opaque_id() {
        let json = r#"{
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "id": "2819c223-7f76-453a-919d-413861904646",
            "externalId": "kc-user-1",
            "userName": "bjensen",
            "name": {"givenName": "Barbara", "familyName": "Jensen"},
            "emails": [{"value": "bjensen@example.com", "primary": true}],
            "roles": [{"value": "auditor"}]
        }"#;

        let user: ScimUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.id.as_deref(), Some("2819c223-7f76-453a-919d-413861904646"));
        assert_eq!(user.external_id.as_deref(), Some("kc-user-1"));
        assert!(user.active, "active defaults to true when absent");
        assert_eq!(user.roles[0].value, "auditor");
        assert_eq!(
            user.name.unwrap().given_name.as_deref(),
            Some("Barbara")
        );
    }

    #[test]
    fn test_serialize_omits_empty_collections() {
        let user = ScimUser::new("bob");
        let value = serde_json::to_value(&user).unwrap();

        assert_eq!(value["userName"], "bob");
        assert!(value.get("emails").is_none());
        assert!(value.get("roles").is_none());
        assert!(value.get("meta").is_none());
    }
}
