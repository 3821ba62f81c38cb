pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod session;

use std::sync::Arc;
use tracing::info;

pub use error::{AppError, ErrorKind};
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, AuthSnapshot, AuthStatus, Delay, GuardDecision, RouteGuard};
pub use client::{ApiClient, AuthApi};
pub use db::{CredentialEntry, KeyValueStore, UserRecord};
pub use session::{SessionKeys, SessionStore};

use auth::TokioDelay;
use config::StorageBackend;
use db::{DirectoryStore, FileStorage, MemoryStorage};

/// Everything the application needs, constructed once and passed around explicitly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub storage: Arc<dyn KeyValueStore>,
    pub auth: Arc<AuthService>,
    pub api: Arc<AuthApi>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let storage: Arc<dyn KeyValueStore> = match config.storage.backend {
            StorageBackend::File => Arc::new(FileStorage::open(&config.storage.path)?),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        };
        Self::with_components(config, storage, Arc::new(TokioDelay)).await
    }

    /// Wires the given storage and latency source, then rehydrates auth state.
    pub async fn with_components(
        config: Settings,
        storage: Arc<dyn KeyValueStore>,
        delay: Arc<dyn Delay>,
    ) -> Result<Self> {
        let session: SessionStore<UserRecord> =
            SessionStore::configure(storage.clone(), SessionKeys::from(&config.session));

        let auth = AuthService::new(
            DirectoryStore::new(storage.clone(), config.storage.namespace.clone()),
            session.clone(),
            delay,
            config.auth.clone(),
        );
        auth.init().await?;

        let api = AuthApi::new(ApiClient::new(&config.api, session)?);

        info!("Application state ready ({} environment)", config.environment);
        Ok(Self {
            config: Arc::new(config),
            storage,
            auth: Arc::new(auth),
            api: Arc::new(api),
        })
    }

    pub async fn guard(&self, guard: RouteGuard) -> GuardDecision {
        let snapshot = self.auth.snapshot().await;
        guard.evaluate(&snapshot, &self.config.routes)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.auth.dispose().await?;
        info!("Application state shut down");
        Ok(())
    }
}
