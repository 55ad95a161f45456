//! SCIM 2.0 resource models (RFC 7643 / RFC 7644).
//!
//! Only the attributes exchanged by the reconciliation engine are modelled:
//! core User and Group resources, their metadata, and PATCH messages.

pub mod scim_group;
pub mod scim_patch;
pub mod scim_user;

pub use scim_group::{ScimGroup, ScimGroupMember};
pub use scim_patch::{ScimPatchOp, ScimPatchRequest};
pub use scim_user::{ScimEmail, ScimMeta, ScimName, ScimRole, ScimUser};

/// A top-level SCIM resource.
pub trait ScimResource {
    /// The identifier assigned by the service provider, if known.
    fn resource_id(&self) -> Option<&str>;
}

impl ScimResource for ScimUser {
    fn resource_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl ScimResource for ScimGroup {
    fn resource_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}
