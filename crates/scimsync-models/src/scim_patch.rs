//! SCIM PATCH messages (RFC 7644 Section 3.5.2).

use serde::{Deserialize, Serialize};

/// SCIM PATCH operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimPatchOp {
    /// Operation type: add, remove, or replace.
    pub op: String,

    /// Attribute path (e.g., "displayName", "members").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Value to set (for add/replace operations).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// SCIM PATCH request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimPatchRequest {
    /// SCIM schemas.
    pub schemas: Vec<String>,

    /// Operations to perform.
    #[serde(rename = "Operations")]
    pub operations: Vec<ScimPatchOp>,
}

impl ScimPatchRequest {
    /// SCIM Patch Operation schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

    /// Create a request carrying the given operations.
    pub fn new(operations: Vec<ScimPatchOp>) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            operations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_serializes_without_value() {
        let request = ScimPatchRequest::new(vec![ScimPatchOp {
            op: "remove".to_string(),
            path: Some("members".to_string()),
            value: None,
        }]);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["schemas"][0], ScimPatchRequest::SCHEMA);
        assert_eq!(body["Operations"][0]["op"], "remove");
        assert!(body["Operations"][0].get("value").is_none());
    }
}
