use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::models::{PersistedAuth, Versioned};
use crate::db::storage::KeyValueStore;
use crate::error::StorageError;

pub const SCHEMA_VERSION: u32 = 1;

/// Reads and writes the versioned auth snapshot under one storage key.
pub struct DirectoryStore {
    storage: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl DirectoryStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
        }
    }

    /// `Ok(None)` when nothing usable is stored: absent, unreadable, or written by another schema version.
    pub fn load(&self) -> Result<Option<PersistedAuth>, StorageError> {
        let Some(raw) = self.storage.get_item(&self.namespace)? else {
            debug!("No persisted auth state under {}", self.namespace);
            return Ok(None);
        };

        let versioned: Versioned<PersistedAuth> = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!("Discarding unreadable auth state under {}: {}", self.namespace, e);
                return Ok(None);
            }
        };

        if versioned.version != SCHEMA_VERSION {
            warn!(
                "Discarding auth state with schema version {} (expected {})",
                versioned.version, SCHEMA_VERSION
            );
            return Ok(None);
        }

        Ok(Some(versioned.state))
    }

    pub fn save(&self, state: &PersistedAuth) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&Versioned {
            state,
            version: SCHEMA_VERSION,
        })?;
        self.storage.set_item(&self.namespace, &raw)
    }
}
