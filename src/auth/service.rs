use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, error, info, warn};

use crate::auth::delay::Delay;
use crate::config::AuthConfig;
use crate::db::models::ADMIN_EMAIL;
use crate::db::{CredentialEntry, DirectoryStore, PersistedAuth, SessionRecord, UserRecord};
use crate::error::{AppError, AuthError};
use crate::session::SessionStore;
use crate::Result;

const LOGIN_FAILED: &str = "Unexpected error during login";
const REGISTER_FAILED: &str = "Unexpected error during registration";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    LoggedOut,
    Authenticating,
    LoggedIn(UserRecord),
}

/// What the UI observes: the current user plus the transient flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub user: Option<UserRecord>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthSnapshot {
    pub fn status(&self) -> AuthStatus {
        match (&self.user, self.loading) {
            (_, true) => AuthStatus::Authenticating,
            (Some(user), false) => AuthStatus::LoggedIn(user.clone()),
            (None, false) => AuthStatus::LoggedOut,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthResponse {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Debug, Clone)]
struct AuthState {
    user: Option<UserRecord>,
    users: Vec<CredentialEntry>,
    loading: bool,
    error: Option<String>,
    ready: bool,
}

impl AuthState {
    fn persisted(&self) -> PersistedAuth {
        PersistedAuth {
            user: self.user.clone(),
            users: self.users.clone(),
            is_authenticated: self.user.is_some(),
        }
    }

    fn find(&self, email: &str) -> Option<&CredentialEntry> {
        self.users.iter().find(|entry| entry.user.email_matches(email))
    }
}

/// The credential directory and the login/register/logout state machine over it.
pub struct AuthService {
    state: RwLock<AuthState>,
    directory: DirectoryStore,
    session: SessionStore<UserRecord>,
    delay: Arc<dyn Delay>,
    config: AuthConfig,
    in_flight: Semaphore,
}

impl AuthService {
    pub fn new(
        directory: DirectoryStore,
        session: SessionStore<UserRecord>,
        delay: Arc<dyn Delay>,
        config: AuthConfig,
    ) -> Self {
        let defaults = PersistedAuth::default();
        Self {
            state: RwLock::new(AuthState {
                user: None,
                users: defaults.users,
                loading: true,
                error: None,
                ready: false,
            }),
            directory,
            session,
            delay,
            config,
            in_flight: Semaphore::new(1),
        }
    }

    /// Rehydrates persisted state and clears the initial loading flag.
    pub async fn init(&self) -> Result<()> {
        let mut restored = self.directory.load()?.unwrap_or_default();

        if !restored.users.iter().any(|entry| entry.user.email_matches(ADMIN_EMAIL)) {
            warn!("Persisted directory has no administrator, seeding it again");
            restored.users.insert(0, CredentialEntry::admin());
        }
        if restored.is_authenticated != restored.user.is_some() {
            warn!("Persisted authenticated flag disagrees with the stored user, trusting the user");
        }

        let mut state = self.state.write().await;
        state.user = restored.user;
        state.users = restored.users;
        state.loading = false;
        state.error = None;
        state.ready = true;

        info!(
            "Auth state loaded: {} known users, authenticated: {}",
            state.users.len(),
            state.user.is_some()
        );
        Ok(())
    }

    /// Flushes the persisted state; transitions fail afterwards until `init` runs again.
    pub async fn dispose(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.ready {
            return Ok(());
        }
        self.directory.save(&state.persisted())?;
        state.ready = false;
        debug!("Auth state disposed");
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let _permit = self.in_flight.try_acquire().map_err(|_| {
            warn!("Rejected login for {} while another request is in flight", email);
            AuthError::InFlight
        })?;
        self.begin().await?;

        self.delay.wait(self.config.login_delay()).await;

        let found = {
            let state = self.state.read().await;
            state
                .users
                .iter()
                .find(|entry| entry.matches(email, password))
                .map(|entry| entry.user.clone())
        };

        let Some(user) = found else {
            info!("Login rejected for {}", email);
            let err = AuthError::InvalidCredentials;
            return Err(self.fail(err.clone().into(), err.to_string()).await);
        };

        match self.sign_in(user, None).await {
            Ok(response) => {
                info!("Login successful for {}", response.user.email);
                Ok(response)
            }
            Err(e) => {
                error!("Login failed for {}: {}", email, e);
                Err(self.fail(e, LOGIN_FAILED.to_string()).await)
            }
        }
    }

    /// Terms acceptance and field rules belong to the form layer, not here.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse> {
        let _permit = self.in_flight.try_acquire().map_err(|_| {
            warn!("Rejected registration for {} while another request is in flight", email);
            AuthError::InFlight
        })?;
        self.begin().await?;

        self.delay.wait(self.config.register_delay()).await;

        if self.is_email_taken(email).await {
            info!("Registration rejected, {} is already registered", email);
            let err = AuthError::EmailTaken;
            return Err(self.fail(err.clone().into(), err.to_string()).await);
        }

        let user = UserRecord::new(name, email);
        let entry = CredentialEntry::new(user.clone(), password);

        match self.sign_in(user, Some(entry)).await {
            Ok(response) => {
                info!("Registration successful for {}", response.user.email);
                Ok(response)
            }
            Err(e) => {
                error!("Registration failed for {}: {}", email, e);
                Err(self.fail(e, REGISTER_FAILED.to_string()).await)
            }
        }
    }

    /// Ends the session; the credential directory is left as it is.
    pub async fn logout(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.ready {
            return Err(AuthError::NotReady.into());
        }

        let previous = state.user.take();
        state.error = None;

        let cleared = self.session.clear_session();
        let saved = self.directory.save(&state.persisted());

        match previous {
            Some(user) => info!("Logged out {}", user.email),
            None => debug!("Logout without an active session"),
        }
        cleared?;
        saved?;
        Ok(())
    }

    pub async fn clear_error(&self) {
        self.state.write().await.error = None;
    }

    pub async fn is_email_taken(&self, email: &str) -> bool {
        self.state.read().await.find(email).is_some()
    }

    /// The full directory entry, password included.
    pub async fn find_by_email(&self, email: &str) -> Option<CredentialEntry> {
        self.state.read().await.find(email).cloned()
    }

    pub async fn snapshot(&self) -> AuthSnapshot {
        let state = self.state.read().await;
        AuthSnapshot {
            user: state.user.clone(),
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    pub async fn status(&self) -> AuthStatus {
        self.snapshot().await.status()
    }

    pub async fn current_user(&self) -> Option<UserRecord> {
        self.state.read().await.user.clone()
    }

    /// Known users in registration order, without passwords.
    pub async fn users(&self) -> Vec<UserRecord> {
        self.state
            .read()
            .await
            .users
            .iter()
            .map(|entry| entry.user.clone())
            .collect()
    }

    pub fn session(&self) -> &SessionStore<UserRecord> {
        &self.session
    }

    async fn begin(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.ready {
            return Err(AuthError::NotReady.into());
        }
        state.loading = true;
        state.error = None;
        Ok(())
    }

    async fn fail(&self, err: AppError, message: String) -> AppError {
        let mut state = self.state.write().await;
        state.loading = false;
        state.error = Some(message);
        err
    }

    /// Writes the session and the directory, then commits in memory. On
    /// failure the stored session goes back to whatever it was before.
    async fn sign_in(
        &self,
        user: UserRecord,
        new_entry: Option<CredentialEntry>,
    ) -> Result<AuthResponse> {
        let previous = self.session.get_session()?;
        let token = issue_token(&user);
        if let Err(e) = self.session.set_session(&token, &user) {
            self.restore_session(previous);
            return Err(e.into());
        }

        let mut state = self.state.write().await;
        if let Some(entry) = &new_entry {
            if state.find(&entry.user.email).is_some() {
                self.restore_session(previous);
                return Err(AuthError::EmailTaken.into());
            }
        }

        let mut next = state.clone();
        next.users.extend(new_entry);
        next.user = Some(user.clone());
        next.loading = false;
        next.error = None;

        if let Err(e) = self.directory.save(&next.persisted()) {
            self.restore_session(previous);
            return Err(e.into());
        }

        *state = next;
        Ok(AuthResponse { user, token })
    }

    fn restore_session(&self, previous: Option<SessionRecord<UserRecord>>) {
        let restored = match &previous {
            Some(session) => self.session.set_session(&session.token, &session.user),
            None => self.session.clear_session(),
        };
        if let Err(e) = restored {
            error!("Failed to restore the previous session: {}", e);
        }
    }
}

fn issue_token(user: &UserRecord) -> String {
    format!("token-{}-{}", user.id, Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::delay::NoDelay;
    use crate::db::models::{ADMIN_PASSWORD, Role};
    use crate::db::storage::{KeyValueStore, MemoryStorage, MockKeyValueStore};
    use crate::error::{ErrorKind, StorageError};
    use crate::session::SessionKeys;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    const NAMESPACE: &str = "nutrizone-auth-storage";

    fn config() -> AuthConfig {
        AuthConfig {
            login_delay_ms: 1500,
            register_delay_ms: 2000,
        }
    }

    fn service_with(storage: Arc<dyn KeyValueStore>, delay: Arc<dyn Delay>) -> AuthService {
        AuthService::new(
            DirectoryStore::new(storage.clone(), NAMESPACE),
            SessionStore::configure(storage, SessionKeys::new("auth_token", "auth_user")),
            delay,
            config(),
        )
    }

    async fn ready_service() -> (Arc<MemoryStorage>, AuthService) {
        let storage = Arc::new(MemoryStorage::new());
        let service = service_with(storage.clone(), Arc::new(NoDelay));
        service.init().await.unwrap();
        (storage, service)
    }

    fn persisted(storage: &MemoryStorage) -> serde_json::Value {
        let raw = storage.get_item(NAMESPACE).unwrap().expect("state persisted");
        serde_json::from_str(&raw).unwrap()
    }

    #[derive(Default)]
    struct RecordingDelay {
        waits: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Delay for RecordingDelay {
        async fn wait(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    #[derive(Default)]
    struct GateDelay {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Delay for GateDelay {
        async fn wait(&self, _duration: Duration) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    #[tokio::test]
    async fn test_starts_loading_until_init() {
        let storage = Arc::new(MemoryStorage::new());
        let service = service_with(storage, Arc::new(NoDelay));
        assert_eq!(service.status().await, AuthStatus::Authenticating);

        let err = service.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::NotReady)));
        assert!(service.logout().await.is_err());

        service.init().await.unwrap();
        assert_eq!(service.status().await, AuthStatus::LoggedOut);
    }

    #[tokio::test]
    async fn test_admin_login() {
        let (storage, service) = ready_service().await;

        let response = service
            .login("admin@nutrizone.com", "@adminNutrizone")
            .await
            .unwrap();
        assert_eq!(response.user.role, Role::Admin);
        assert!(response.token.starts_with("token-admin-001-"));

        let snapshot = service.snapshot().await;
        assert!(snapshot.is_authenticated());
        assert!(!snapshot.loading);
        assert_eq!(snapshot.error, None);
        assert!(matches!(snapshot.status(), AuthStatus::LoggedIn(ref u) if u.id == "admin-001"));

        let session = service.session().get_session().unwrap().unwrap();
        assert_eq!(session.token, response.token);
        assert_eq!(session.user, response.user);

        let json = persisted(&storage);
        assert_eq!(json["state"]["isAuthenticated"], true);
        assert_eq!(json["state"]["user"]["email"], "admin@nutrizone.com");
    }

    #[tokio::test]
    async fn test_login_email_is_case_insensitive() {
        let (_, service) = ready_service().await;
        let response = service
            .login("Admin@NutriZone.com", ADMIN_PASSWORD)
            .await
            .unwrap();
        assert_eq!(response.user.email, "admin@nutrizone.com");
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let (_, service) = ready_service().await;
        let before = service.users().await;

        let err = service
            .login(ADMIN_EMAIL, "@adminnutrizone")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);

        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.status(), AuthStatus::LoggedOut);
        assert_eq!(snapshot.error.as_deref(), Some("Invalid email or password"));
        assert_eq!(service.users().await, before);
        assert!(service.session().get_session().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_email_is_invalid_credentials() {
        let (_, service) = ready_service().await;
        let err = service.login("ghost@x.com", "Secret123").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_register_logs_in_new_user() {
        let (storage, service) = ready_service().await;

        let response = service
            .register("  Ana López ", "Ana@Example.com", "Secret123")
            .await
            .unwrap();
        assert_eq!(response.user.email, "ana@example.com");
        assert_eq!(response.user.name, "Ana López");
        assert_eq!(response.user.role, Role::User);
        assert!(response.token.starts_with(&format!("token-{}-", response.user.id)));

        let users = service.users().await;
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].email, ADMIN_EMAIL);
        assert_eq!(users[1], response.user);

        let entry = service.find_by_email("ANA@example.com").await.unwrap();
        assert_eq!(entry.password, "Secret123");
        assert!(service.is_email_taken("ana@EXAMPLE.com").await);

        let json = persisted(&storage);
        assert_eq!(json["state"]["users"][1]["password"], "Secret123");
        assert!(json["state"]["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_differing_in_case() {
        let (_, service) = ready_service().await;
        service.register("Ana", "a@b.com", "Secret123").await.unwrap();
        service.logout().await.unwrap();

        let err = service
            .register("Otra Ana", "A@B.com", "Secret456")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmailTaken);

        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.status(), AuthStatus::LoggedOut);
        assert_eq!(
            snapshot.error.as_deref(),
            Some("This email is already registered")
        );
        assert_eq!(service.users().await.len(), 2);
    }

    #[tokio::test]
    async fn test_logout_keeps_directory() {
        let (storage, service) = ready_service().await;
        service.register("Ana", "ana@x.com", "Secret123").await.unwrap();
        let known = service.users().await.len();

        service.logout().await.unwrap();

        assert_eq!(service.status().await, AuthStatus::LoggedOut);
        assert_eq!(service.users().await.len(), known);
        assert!(storage.get_item("auth_token").unwrap().is_none());
        assert!(storage.get_item("auth_user").unwrap().is_none());

        let json = persisted(&storage);
        assert!(json["state"]["user"].is_null());
        assert_eq!(json["state"]["isAuthenticated"], false);
        assert_eq!(json["state"]["users"].as_array().unwrap().len(), known);

        // a second logout is harmless
        service.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_error() {
        let (_, service) = ready_service().await;
        let _ = service.login(ADMIN_EMAIL, "wrong").await;
        assert!(service.snapshot().await.error.is_some());

        service.clear_error().await;
        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.status(), AuthStatus::LoggedOut);
    }

    #[tokio::test]
    async fn test_rehydrates_from_storage() {
        let (storage, service) = ready_service().await;
        service.register("Bea", "bea@x.com", "Secret123").await.unwrap();
        service.register("Cid", "cid@x.com", "Secret123").await.unwrap();
        let users = service.users().await;
        service.dispose().await.unwrap();

        let reloaded = service_with(storage.clone(), Arc::new(NoDelay));
        reloaded.init().await.unwrap();
        assert_eq!(reloaded.users().await, users);
        let snapshot = reloaded.snapshot().await;
        assert!(snapshot.is_authenticated());
        assert_eq!(snapshot.user.unwrap().email, "cid@x.com");
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn test_init_reseeds_missing_admin() {
        let storage = Arc::new(MemoryStorage::new());
        let stored = serde_json::json!({
            "state": {
                "user": null,
                "users": [{
                    "id": "user-1",
                    "email": "bea@x.com",
                    "name": "Bea",
                    "role": "user",
                    "createdAt": "2024-05-01T10:00:00Z",
                    "password": "Secret123"
                }],
                "isAuthenticated": true
            },
            "version": 1
        });
        storage.set_item(NAMESPACE, &stored.to_string()).unwrap();

        let service = service_with(storage, Arc::new(NoDelay));
        service.init().await.unwrap();

        let emails: Vec<_> = service.users().await.into_iter().map(|u| u.email).collect();
        assert_eq!(emails, [ADMIN_EMAIL, "bea@x.com"]);
        // the flag follows the (absent) user
        assert!(!service.snapshot().await.is_authenticated());
        assert!(service.login("bea@x.com", "Secret123").await.is_ok());
    }

    #[tokio::test]
    async fn test_uses_configured_latency() {
        let storage = Arc::new(MemoryStorage::new());
        let delay = Arc::new(RecordingDelay::default());
        let service = service_with(storage, delay.clone());
        service.init().await.unwrap();

        service.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
        service.register("Ana", "ana@x.com", "Secret123").await.unwrap();

        assert_eq!(
            *delay.waits.lock().unwrap(),
            [Duration::from_millis(1500), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn test_second_request_while_in_flight_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let gate = Arc::new(GateDelay::default());
        let service = Arc::new(service_with(storage, gate.clone()));
        service.init().await.unwrap();

        let first = tokio::spawn({
            let service = service.clone();
            async move { service.login(ADMIN_EMAIL, ADMIN_PASSWORD).await }
        });
        gate.entered.notified().await;

        assert_eq!(service.status().await, AuthStatus::Authenticating);
        let err = service
            .register("Ana", "ana@x.com", "Secret123")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InFlight)));
        assert_eq!(err.kind(), ErrorKind::Busy);

        gate.release.notify_one();
        let response = first.await.unwrap().unwrap();
        assert_eq!(response.user.email, ADMIN_EMAIL);
        // the rejected registration left nothing behind
        assert_eq!(service.users().await.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_as_unavailable() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get_item().returning(|_| Ok(None));
        mock.expect_set_item().returning(|key, _| {
            if key == NAMESPACE {
                Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed: 6000,
                    limit: 5000,
                })
            } else {
                Ok(())
            }
        });
        mock.expect_remove_item().returning(|_| Ok(()));

        let service = service_with(Arc::new(mock), Arc::new(NoDelay));
        service.init().await.unwrap();

        let err = service.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);

        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.status(), AuthStatus::LoggedOut);
        assert_eq!(snapshot.error.as_deref(), Some(LOGIN_FAILED));
    }

    #[tokio::test]
    async fn test_failed_register_keeps_current_session() {
        let storage = Arc::new(MemoryStorage::with_quota(1600));
        let service = service_with(storage.clone(), Arc::new(NoDelay));
        service.init().await.unwrap();
        let admin = service.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();

        let long_name = "A".repeat(300);
        let err = service
            .register(&long_name, "ana@x.com", "Secret123")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);

        let snapshot = service.snapshot().await;
        assert!(matches!(snapshot.status(), AuthStatus::LoggedIn(ref u) if u.id == "admin-001"));
        assert_eq!(snapshot.error.as_deref(), Some(REGISTER_FAILED));

        let session = service.session().get_session().unwrap().expect("session kept");
        assert_eq!(session.token, admin.token);
        assert_eq!(session.user, admin.user);
        assert!(!service.is_email_taken("ana@x.com").await);
    }

    #[tokio::test]
    async fn test_failed_login_without_session_leaves_none() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get_item().returning(|_| Ok(None));
        mock.expect_set_item().returning(|key, _| {
            if key == "auth_user" {
                Err(StorageError::Unavailable("disabled".into()))
            } else {
                Ok(())
            }
        });
        // the orphaned token and then the empty session are both removed
        mock.expect_remove_item()
            .withf(|key| key == "auth_token" || key == "auth_user")
            .returning(|_| Ok(()));

        let service = service_with(Arc::new(mock), Arc::new(NoDelay));
        service.init().await.unwrap();

        let err = service.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(service.status().await, AuthStatus::LoggedOut);
    }
}
