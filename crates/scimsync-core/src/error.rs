//! Reconciliation error types.
//!
//! Only failures with no local recovery path surface as errors. A mapping
//! that does not exist is not one of them: stores return `Option`.

use scimsync_db::{DbError, ScimResourceType};
use thiserror::Error;

/// Errors raised by a [`MappingStore`](crate::mapping::MappingStore).
#[derive(Debug, Error)]
pub enum MappingError {
    /// Database error.
    #[error("Mapping database error: {0}")]
    Database(#[from] DbError),

    /// One side of the pair is already bound to something else.
    #[error("{resource_type} mapping conflict: cannot map local id {local_id} to external id {external_id}")]
    Conflict {
        resource_type: ScimResourceType,
        local_id: String,
        external_id: String,
    },
}

impl From<sqlx::Error> for MappingError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(DbError::from(err))
    }
}

/// Errors raised by a [`LocalDirectory`](crate::directory::LocalDirectory).
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The entity the operation targets does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The directory refused a write because of a uniqueness rule.
    #[error("Directory conflict: {message}")]
    Conflict { message: String },
}

impl DirectoryError {
    /// Create a not-found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

/// Errors raised by a [`RemoteDirectory`](crate::remote::RemoteDirectory).
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The resource addressed by the request does not exist.
    #[error("Remote resource not found: {location}")]
    NotFound { location: String },

    /// The service provider rejected the request as conflicting.
    #[error("Remote conflict: {message}")]
    Conflict { message: String },

    /// Transport-level failure.
    #[error("Remote transport error: {message}")]
    Transport { message: String },
}

/// Errors that can occur while reconciling one entity.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A field required to create or persist the entity is empty.
    #[error("Cannot create {resource_type}: required field '{field}' is empty")]
    MissingRequiredField {
        resource_type: ScimResourceType,
        field: &'static str,
    },

    /// A location or patch target could not be resolved.
    #[error("Invalid location '{location}': {message}")]
    InvalidLocation { location: String, message: String },

    /// A member or resource reference that cannot be interpreted.
    #[error("Invalid reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },

    /// A mapping points at a local entity that no longer exists.
    #[error("{resource_type} mapping for external id {external_id} points at missing local entity {local_id}")]
    StaleMapping {
        resource_type: ScimResourceType,
        external_id: String,
        local_id: String,
    },

    /// The service provider returned a resource without an id.
    #[error("Remote {resource_type} was created without an id")]
    MissingRemoteId { resource_type: ScimResourceType },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a missing-required-field error.
    pub fn missing_field(resource_type: ScimResourceType, field: &'static str) -> Self {
        Self::MissingRequiredField {
            resource_type,
            field,
        }
    }

    /// Create an invalid-location error.
    pub fn invalid_location(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidLocation {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-reference error.
    pub fn invalid_reference(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            message: message.into(),
        }
    }
}

/// Result type for reconciliation operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for mapping store operations.
pub type MappingResult<T> = Result<T, MappingError>;

/// Result type for local directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Result type for remote directory operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = SyncError::missing_field(ScimResourceType::User, "username");
        assert_eq!(
            err.to_string(),
            "Cannot create User: required field 'username' is empty"
        );
    }

    #[test]
    fn test_directory_error_is_transparent() {
        let err: SyncError = DirectoryError::not_found("User", "u-1").into();
        assert_eq!(err.to_string(), "User not found: u-1");
    }
}
