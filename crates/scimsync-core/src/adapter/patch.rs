//! Ordered PATCH plans built by adapters and sent by the remote client.

use scimsync_models::{ScimPatchOp, ScimPatchRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// PATCH operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Replace,
    Remove,
}

impl PatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Replace => "replace",
            PatchOp::Remove => "remove",
        }
    }
}

/// One attribute-level operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    /// Absent for [`PatchOp::Remove`].
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value.into()),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }
}

/// A target location plus the operations to apply there, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchPlan {
    target: String,
    operations: Vec<PatchOperation>,
}

impl PatchPlan {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            operations: Vec::new(),
        }
    }

    pub fn push(&mut self, operation: PatchOperation) {
        self.operations.push(operation);
    }

    /// Resolved location of the resource being patched.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    /// First operation addressing `path`.
    pub fn operation(&self, path: &str) -> Option<&PatchOperation> {
        self.operations.iter().find(|op| op.path == path)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Wire form of the plan (RFC 7644 §3.5.2).
    pub fn to_request(&self) -> ScimPatchRequest {
        ScimPatchRequest::new(
            self.operations
                .iter()
                .map(|op| ScimPatchOp {
                    op: op.op.as_str().to_string(),
                    path: Some(op.path.clone()),
                    value: op.value.clone(),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_keeps_order() {
        let mut plan = PatchPlan::new("Groups/g-1");
        plan.push(PatchOperation::remove("members"));
        plan.push(PatchOperation::replace("displayName", "Admins"));

        let paths: Vec<_> = plan.operations().iter().map(|op| op.path.as_str()).collect();
        assert_eq!(paths, vec!["members", "displayName"]);
        assert_eq!(plan.target(), "Groups/g-1");
        assert!(plan.operation("members").unwrap().value.is_none());
    }

    #[test]
    fn test_to_request_wire_format() {
        let mut plan = PatchPlan::new("Users/u-1");
        plan.push(PatchOperation::replace("active", true));
        plan.push(PatchOperation::remove("members"));

        let request = plan.to_request();
        assert_eq!(request.schemas, vec![ScimPatchRequest::SCHEMA]);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["Operations"][0]["op"], "replace");
        assert_eq!(body["Operations"][0]["value"], json!(true));
        assert_eq!(body["Operations"][1]["op"], "remove");
        assert!(body["Operations"][1].get("value").is_none());
    }
}
