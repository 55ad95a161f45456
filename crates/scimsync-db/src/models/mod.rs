//! Database models.

pub mod scim_mapping;

pub use scim_mapping::{CreateScimMapping, InsertOutcome, ScimMapping, ScimResourceType};
