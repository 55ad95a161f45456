//! Sync settings loaded from environment variables.
//!
//! Every setting has a default matching the conventional attribute names
//! (`scim-skip`, `scim`) so an unconfigured deployment behaves predictably.
//! Malformed values fail fast instead of silently falling back.

use serde::Deserialize;
use std::env;
use thiserror::Error;
use url::Url;

/// Environment variable names.
pub const ENV_SKIP_ATTRIBUTE: &str = "SCIMSYNC_SKIP_ATTRIBUTE";
pub const ENV_EXPORT_ROLE_ATTRIBUTE: &str = "SCIMSYNC_EXPORT_ROLE_ATTRIBUTE";
pub const ENV_REFRESH_PROTECTED_USERNAMES: &str = "SCIMSYNC_REFRESH_PROTECTED_USERNAMES";
pub const ENV_ENABLED_USERS_ONLY: &str = "SCIMSYNC_ENABLED_USERS_ONLY";
pub const ENV_REMOTE_BASE_URL: &str = "SCIMSYNC_REMOTE_BASE_URL";

/// Configuration loading errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: &'static str, message: String },

    #[error("Invalid setting '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

/// Settings that shape how local entities are read and exported.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Entity attribute whose first value `"true"` excludes it from sync.
    pub skip_attribute: String,

    /// Role attribute whose first value `"true"` exports the role.
    pub export_role_attribute: String,

    /// Usernames that an outbound refresh must never overwrite.
    pub refresh_protected_usernames: Vec<String>,

    /// Only stream enabled users on outbound passes.
    pub enabled_users_only: bool,

    /// Base URL of the remote service provider, used to absolutize
    /// meta locations and patch targets.
    pub remote_base_url: Option<Url>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            skip_attribute: "scim-skip".to_string(),
            export_role_attribute: "scim".to_string(),
            refresh_protected_usernames: vec!["admin".to_string()],
            enabled_users_only: true,
            remote_base_url: None,
        }
    }
}

impl SyncSettings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(value) = lookup(ENV_SKIP_ATTRIBUTE) {
            settings.skip_attribute = value.trim().to_string();
        }

        if let Some(value) = lookup(ENV_EXPORT_ROLE_ATTRIBUTE) {
            settings.export_role_attribute = value.trim().to_string();
        }

        if let Some(value) = lookup(ENV_REFRESH_PROTECTED_USERNAMES) {
            settings.refresh_protected_usernames = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(value) = lookup(ENV_ENABLED_USERS_ONLY) {
            settings.enabled_users_only = parse_bool(ENV_ENABLED_USERS_ONLY, &value)?;
        }

        if let Some(value) = lookup(ENV_REMOTE_BASE_URL) {
            let value = value.trim();
            if !value.is_empty() {
                let url = Url::parse(value).map_err(|e| ConfigError::InvalidValue {
                    var: ENV_REMOTE_BASE_URL,
                    message: e.to_string(),
                })?;
                settings.remote_base_url = Some(with_trailing_slash(url));
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.skip_attribute.is_empty() {
            return Err(ConfigError::Invalid {
                field: "skip_attribute",
                message: "attribute name must not be empty".to_string(),
            });
        }
        if self.export_role_attribute.is_empty() {
            return Err(ConfigError::Invalid {
                field: "export_role_attribute",
                message: "attribute name must not be empty".to_string(),
            });
        }
        if let Some(url) = &self.remote_base_url {
            if url.cannot_be_a_base() {
                return Err(ConfigError::Invalid {
                    field: "remote_base_url",
                    message: format!("{url} cannot be used as a base URL"),
                });
            }
        }
        Ok(())
    }

    /// Whether an outbound refresh must leave this username untouched.
    #[must_use]
    pub fn is_refresh_protected(&self, username: &str) -> bool {
        self.refresh_protected_usernames
            .iter()
            .any(|protected| protected == username)
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            var,
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = SyncSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert!(settings.is_refresh_protected("admin"));
        assert!(!settings.is_refresh_protected("alice"));
    }

    #[test]
    fn test_overrides_from_env() {
        let settings = SyncSettings::from_lookup(lookup(&[
            (ENV_SKIP_ATTRIBUTE, "no-sync"),
            (ENV_EXPORT_ROLE_ATTRIBUTE, "export"),
            (ENV_REFRESH_PROTECTED_USERNAMES, "admin, root ,"),
            (ENV_ENABLED_USERS_ONLY, "false"),
            (ENV_REMOTE_BASE_URL, "https://scim.example.com/v2"),
        ]))
        .unwrap();

        assert_eq!(settings.skip_attribute, "no-sync");
        assert_eq!(settings.export_role_attribute, "export");
        assert_eq!(settings.refresh_protected_usernames, vec!["admin", "root"]);
        assert!(!settings.enabled_users_only);
        assert_eq!(
            settings.remote_base_url.unwrap().as_str(),
            "https://scim.example.com/v2/"
        );
    }

    #[test]
    fn test_malformed_bool_fails() {
        let err = SyncSettings::from_lookup(lookup(&[(ENV_ENABLED_USERS_ONLY, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == ENV_ENABLED_USERS_ONLY));
    }

    #[test]
    fn test_malformed_url_fails() {
        let err = SyncSettings::from_lookup(lookup(&[(ENV_REMOTE_BASE_URL, "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == ENV_REMOTE_BASE_URL));
    }

    #[test]
    fn test_empty_attribute_rejected() {
        let err = SyncSettings::from_lookup(lookup(&[(ENV_SKIP_ATTRIBUTE, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "skip_attribute", .. }));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let settings: SyncSettings =
            serde_json::from_str(r#"{"export_role_attribute": "sync-role"}"#).unwrap();
        assert_eq!(settings.export_role_attribute, "sync-role");
        assert_eq!(settings.skip_attribute, "scim-skip");
    }
}
