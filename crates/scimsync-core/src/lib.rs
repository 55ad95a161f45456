//! Entity reconciliation between a local identity directory and a remote
//! SCIM 2.0 service provider.
//!
//! Users and groups are exchanged through per-type [`adapter`]s. The
//! [`mapping`] store records which local id corresponds to which remote id
//! so repeated passes update instead of duplicating. The [`engine`] walks
//! the local directory (outbound) or the remote listing (inbound) and
//! reconciles one entity at a time.
//!
//! ```text
//! LocalDirectory ──► adapter ──► RemoteDirectory
//!        ▲              │
//!        └──────── MappingStore
//! ```

pub mod adapter;
pub mod config;
pub mod context;
pub mod directory;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod remote;

pub use adapter::{
    ensure_user_mapping, EntityAdapter, GroupAdapter, MembershipDiff, PatchOp, PatchOperation,
    PatchPlan, UserAdapter,
};
pub use config::{ConfigError, SyncSettings};
pub use context::SyncContext;
pub use directory::{InMemoryDirectory, LocalDirectory, LocalGroup, LocalRole, LocalUser};
pub use engine::{EntityFailure, EntityOutcome, SyncDirection, SyncEngine, SyncReport};
pub use error::{DirectoryError, MappingError, RemoteError, SyncError, SyncResult};
pub use mapping::{
    InMemoryMappingStore, MappingLookup, MappingRecord, MappingScope, MappingStore, PgMappingStore,
};
pub use remote::RemoteDirectory;
pub use scimsync_db::ScimResourceType;
