//! SCIM Group resource schema (RFC 7643 Section 4.2).

use serde::{Deserialize, Serialize};

use super::scim_user::ScimMeta;

/// SCIM Group member reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroupMember {
    /// Service-provider identifier of the member.
    pub value: String,

    /// Member display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Member type (typically "User").
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub member_type: Option<String>,

    /// Reference URI.
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub ref_uri: Option<String>,
}

impl ScimGroupMember {
    /// A `User` member reference pointing at `Users/{value}`.
    pub fn user(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            ref_uri: Some(format!("Users/{value}")),
            value,
            display: None,
            member_type: Some("User".to_string()),
        }
    }
}

/// SCIM Group resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroup {
    /// SCIM schemas.
    #[serde(default = "default_group_schemas")]
    pub schemas: Vec<String>,

    /// Identifier assigned by the service provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Identifier assigned by the provisioning client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Group display name.
    pub display_name: String,

    /// Group members.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ScimGroupMember>,

    /// Resource metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ScimMeta>,
}

fn default_group_schemas() -> Vec<String> {
    vec![ScimGroup::SCHEMA.to_string()]
}

impl ScimGroup {
    /// SCIM Core Group schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:schemas:core:2.0:Group";

    /// Create a new SCIM Group with required fields.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            schemas: default_group_schemas(),
            id: None,
            external_id: None,
            display_name: display_name.into(),
            members: vec![],
            meta: None,
        }
    }
}
