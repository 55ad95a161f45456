//! Explicit per-pass context handed to every adapter operation.

use std::sync::Arc;
use url::Url;

use crate::config::SyncSettings;
use crate::directory::LocalDirectory;
use crate::error::{SyncError, SyncResult};
use crate::mapping::{MappingScope, MappingStore};

/// Everything an adapter needs to reach its collaborators.
///
/// Cloning is cheap; all collaborators are shared behind `Arc`.
#[derive(Clone)]
pub struct SyncContext {
    scope: MappingScope,
    directory: Arc<dyn LocalDirectory>,
    mappings: Arc<dyn MappingStore>,
    settings: Arc<SyncSettings>,
}

impl SyncContext {
    pub fn new(
        realm: impl Into<String>,
        component_id: impl Into<String>,
        directory: Arc<dyn LocalDirectory>,
        mappings: Arc<dyn MappingStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            scope: MappingScope::new(realm, component_id),
            directory,
            mappings,
            settings: Arc::new(settings),
        }
    }

    /// Realm of the local directory being synchronized.
    pub fn realm(&self) -> &str {
        &self.scope.realm
    }

    /// Sync component (remote target) id.
    pub fn component_id(&self) -> &str {
        &self.scope.component_id
    }

    pub fn scope(&self) -> &MappingScope {
        &self.scope
    }

    pub fn directory(&self) -> &dyn LocalDirectory {
        self.directory.as_ref()
    }

    pub fn mappings(&self) -> &dyn MappingStore {
        self.mappings.as_ref()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Resolve a remote path such as `Users/abc` against the configured
    /// base URL. Without a base URL the path is kept as a relative reference.
    pub fn resolve_location(&self, path: &str) -> SyncResult<String> {
        if path.is_empty() || path.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(SyncError::invalid_location(
                path,
                "path is empty or contains whitespace",
            ));
        }

        match &self.settings.remote_base_url {
            Some(base) => join_location(base, path),
            None => Ok(path.to_string()),
        }
    }
}

fn join_location(base: &Url, path: &str) -> SyncResult<String> {
    base.join(path)
        .map(String::from)
        .map_err(|e| SyncError::invalid_location(path, e.to_string()))
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("realm", &self.scope.realm)
            .field("component_id", &self.scope.component_id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
