//! Persistence layer for NutriZone auth
//!
//! Durable key-value storage backends, the records kept in them,
//! and the versioned snapshot of the credential directory.

pub mod models;
pub mod operations;
pub mod storage;

pub use models::{CredentialEntry, PersistedAuth, Role, SessionRecord, UserRecord};
pub use operations::{DirectoryStore, SCHEMA_VERSION};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
