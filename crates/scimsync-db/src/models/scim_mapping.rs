//! SCIM identity mapping model.
//!
//! One row binds a local directory entity to the resource that represents it
//! on a remote SCIM service provider, scoped by realm and sync component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Kind of entity a mapping refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "scim_resource_type")]
pub enum ScimResourceType {
    User,
    Group,
}

impl ScimResourceType {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ScimResourceType::User => "User",
            ScimResourceType::Group => "Group",
        }
    }

    /// SCIM endpoint serving resources of this type.
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            ScimResourceType::User => "Users",
            ScimResourceType::Group => "Groups",
        }
    }
}

impl std::fmt::Display for ScimResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ScimResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" | "users" => Ok(ScimResourceType::User),
            "group" | "groups" => Ok(ScimResourceType::Group),
            _ => Err(format!("Unknown resource type: {s}")),
        }
    }
}

/// Persisted correspondence between a local id and a remote resource id.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ScimMapping {
    /// Unique identifier.
    pub id: Uuid,

    /// Local directory realm the entity lives in.
    pub realm: String,

    /// Sync component (remote target) the mapping belongs to.
    pub component_id: String,

    pub resource_type: ScimResourceType,

    /// Identifier of the entity in the local directory.
    pub local_id: String,

    /// Identifier of the resource on the remote service provider.
    pub external_id: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateScimMapping {
    pub realm: String,
    pub component_id: String,
    pub resource_type: ScimResourceType,
    pub local_id: String,
    pub external_id: String,
}

/// Result of [`ScimMapping::insert_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was written by this call.
    Inserted(ScimMapping),
    /// A row already held the local id or the external id.
    Existing(ScimMapping),
}

impl ScimMapping {
    /// Find the mapping for a local entity.
    pub async fn find_by_local_id(
        pool: &PgPool,
        realm: &str,
        component_id: &str,
        resource_type: ScimResourceType,
        local_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM scim_mappings
            WHERE realm = $1
              AND component_id = $2
              AND resource_type = $3
              AND local_id = $4
            ",
        )
        .bind(realm)
        .bind(component_id)
        .bind(resource_type)
        .bind(local_id)
        .fetch_optional(pool)
        .await
    }

    /// Find the mapping for a remote resource.
    pub async fn find_by_external_id(
        pool: &PgPool,
        realm: &str,
        component_id: &str,
        resource_type: ScimResourceType,
        external_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM scim_mappings
            WHERE realm = $1
              AND component_id = $2
              AND resource_type = $3
              AND external_id = $4
            ",
        )
        .bind(realm)
        .bind(component_id)
        .bind(resource_type)
        .bind(external_id)
        .fetch_optional(pool)
        .await
    }

    /// Insert a mapping unless either side is already mapped.
    ///
    /// Both unique constraints are covered by `ON CONFLICT DO NOTHING`; on
    /// conflict the row that blocked the insert is read back, preferring the
    /// one holding the same local id.
    pub async fn insert_if_absent(
        pool: &PgPool,
        data: CreateScimMapping,
    ) -> Result<InsertOutcome, sqlx::Error> {
        let inserted = sqlx::query_as::<_, Self>(
            r"
            INSERT INTO scim_mappings
                (realm, component_id, resource_type, local_id, external_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            RETURNING *
            ",
        )
        .bind(&data.realm)
        .bind(&data.component_id)
        .bind(data.resource_type)
        .bind(&data.local_id)
        .bind(&data.external_id)
        .fetch_optional(pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome::Inserted(row));
        }

        if let Some(existing) = Self::find_by_local_id(
            pool,
            &data.realm,
            &data.component_id,
            data.resource_type,
            &data.local_id,
        )
        .await?
        {
            return Ok(InsertOutcome::Existing(existing));
        }

        // Not held by the local id, so the external id blocked the insert.
        let existing = Self::find_by_external_id(
            pool,
            &data.realm,
            &data.component_id,
            data.resource_type,
            &data.external_id,
        )
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

        Ok(InsertOutcome::Existing(existing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_round_trip() {
        for rt in [ScimResourceType::User, ScimResourceType::Group] {
            assert_eq!(rt.as_str().parse::<ScimResourceType>().unwrap(), rt);
        }
        assert_eq!("users".parse::<ScimResourceType>().unwrap(), ScimResourceType::User);
        assert!("device".parse::<ScimResourceType>().is_err());
    }

    #[test]
    fn test_resource_type_endpoint() {
        assert_eq!(ScimResourceType::User.endpoint(), "Users");
        assert_eq!(ScimResourceType::Group.endpoint(), "Groups");
        assert_eq!(ScimResourceType::Group.to_string(), "Group");
    }
}
