use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
    pub namespace: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub token_key: String,
    pub user_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub login_delay_ms: u64,
    pub register_delay_ms: u64,
}

impl AuthConfig {
    pub fn login_delay(&self) -> Duration {
        Duration::from_millis(self.login_delay_ms)
    }

    pub fn register_delay(&self) -> Duration {
        Duration::from_millis(self.register_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutesConfig {
    pub login: String,
    pub home: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub routes: RoutesConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Self::with_defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // `APP_API__BASE_URL=http://api.local` sets `Settings.api.base_url`
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Built-in defaults only; no files, no environment.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::with_defaults()?.build()?.try_deserialize()
    }

    /// In-memory storage and no simulated latency.
    pub fn new_for_test() -> Result<Self, ConfigError> {
        Self::with_defaults()?
            .set_override("environment", "test")?
            .set_override("storage.backend", "memory")?
            .set_override("auth.login_delay_ms", 0)?
            .set_override("auth.register_delay_ms", 0)?
            .build()?
            .try_deserialize()
    }

    fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", "development")?
            .set_default("api.base_url", "http://localhost:4000")?
            .set_default("api.timeout_secs", 10)?
            .set_default("storage.backend", "file")?
            .set_default("storage.path", ".nutrizone/storage.json")?
            .set_default("storage.namespace", "nutrizone-auth-storage")?
            .set_default("session.token_key", "auth_token")?
            .set_default("session.user_key", "auth_user")?
            .set_default("auth.login_delay_ms", 1500)?
            .set_default("auth.register_delay_ms", 2000)?
            .set_default("routes.login", "/auth/login")?
            .set_default("routes.home", "/dashboard")
    }
}
