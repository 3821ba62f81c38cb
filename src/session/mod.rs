//! Session token store
//!
//! Holds "am I logged in and as whom" as a bearer token plus a user
//! snapshot, under a caller-chosen pair of storage keys.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::db::{KeyValueStore, SessionRecord};
use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub token_key: String,
    pub user_key: String,
}

impl SessionKeys {
    pub fn new(token_key: impl Into<String>, user_key: impl Into<String>) -> Self {
        Self {
            token_key: token_key.into(),
            user_key: user_key.into(),
        }
    }
}

impl From<&SessionConfig> for SessionKeys {
    fn from(config: &SessionConfig) -> Self {
        Self::new(&config.token_key, &config.user_key)
    }
}

pub struct SessionStore<U> {
    storage: Arc<dyn KeyValueStore>,
    keys: SessionKeys,
    _user: PhantomData<fn() -> U>,
}

impl<U> Clone for SessionStore<U> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            keys: self.keys.clone(),
            _user: PhantomData,
        }
    }
}

impl<U> SessionStore<U>
where
    U: Serialize + DeserializeOwned,
{
    pub fn configure(storage: Arc<dyn KeyValueStore>, keys: SessionKeys) -> Self {
        Self {
            storage,
            keys,
            _user: PhantomData,
        }
    }

    pub fn get_token(&self) -> Result<Option<String>, StorageError> {
        self.storage.get_item(&self.keys.token_key)
    }

    pub fn get_user(&self) -> Result<Option<U>, StorageError> {
        match self.storage.get_item(&self.keys.user_key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Both halves or nothing; a lone token or lone user reads as logged out.
    pub fn get_session(&self) -> Result<Option<SessionRecord<U>>, StorageError> {
        match (self.get_token()?, self.get_user()?) {
            (Some(token), Some(user)) => Ok(Some(SessionRecord { token, user })),
            (None, None) => Ok(None),
            _ => {
                warn!("Ignoring partial session under {:?}", self.keys);
                Ok(None)
            }
        }
    }

    pub fn set_session(&self, token: &str, user: &U) -> Result<(), StorageError> {
        let raw = serde_json::to_string(user)?;
        self.storage.set_item(&self.keys.token_key, token)?;
        if let Err(e) = self.storage.set_item(&self.keys.user_key, &raw) {
            // do not leave a token without its user behind
            if let Err(rollback) = self.storage.remove_item(&self.keys.token_key) {
                warn!("Failed to remove orphaned token {}: {}", self.keys.token_key, rollback);
            }
            return Err(e);
        }
        debug!("Session stored under {}", self.keys.token_key);
        Ok(())
    }

    pub fn clear_session(&self) -> Result<(), StorageError> {
        self.storage.remove_item(&self.keys.token_key)?;
        self.storage.remove_item(&self.keys.user_key)?;
        debug!("Session cleared");
        Ok(())
    }
}
