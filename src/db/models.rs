use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ADMIN_ID: &str = "admin-001";
pub const ADMIN_EMAIL: &str = "admin@nutrizone.com";
pub const ADMIN_PASSWORD: &str = "@adminNutrizone";
pub const ADMIN_NAME: &str = "Administrador NutriZone";

const AVATAR_BASE_URL: &str = "https://ui-avatars.com/api/";
const AVATAR_BACKGROUND: &str = "42A7A7";
const AVATAR_COLOR: &str = "fff";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// A user as the rest of the application sees it. Never carries a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// A freshly registered user. The email is stored lower-cased and the name trimmed;
    /// the avatar is generated from the name as entered.
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            id: format!("user-{}", Uuid::new_v4()),
            email: email.to_lowercase(),
            name: name.trim().to_string(),
            avatar: Some(avatar_url(name)),
            role: Role::User,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn email_matches(&self, email: &str) -> bool {
        self.email.to_lowercase() == email.to_lowercase()
    }
}

/// Generated avatar reference derived from a display name. The name is
/// percent-encoded, so spaces become `%20` rather than `+`.
pub fn avatar_url(name: &str) -> String {
    format!(
        "{}?name={}&background={}&color={}",
        AVATAR_BASE_URL,
        urlencoding::encode(name),
        AVATAR_BACKGROUND,
        AVATAR_COLOR
    )
}

/// A directory entry: the user plus the plaintext password the mock backend compares against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    #[serde(flatten)]
    pub user: UserRecord,
    pub password: String,
}

impl CredentialEntry {
    pub fn new(user: UserRecord, password: impl Into<String>) -> Self {
        Self {
            user,
            password: password.into(),
        }
    }

    /// The seeded administrator present on first run.
    pub fn admin() -> Self {
        Self {
            user: UserRecord {
                id: ADMIN_ID.to_string(),
                email: ADMIN_EMAIL.to_string(),
                name: ADMIN_NAME.to_string(),
                avatar: Some(avatar_url("Admin")),
                role: Role::Admin,
                created_at: Utc::now(),
                updated_at: None,
            },
            password: ADMIN_PASSWORD.to_string(),
        }
    }

    pub fn matches(&self, email: &str, password: &str) -> bool {
        self.user.email_matches(email) && self.password == password
    }
}

/// The persisted subset of the auth state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAuth {
    pub user: Option<UserRecord>,
    pub users: Vec<CredentialEntry>,
    pub is_authenticated: bool,
}

impl Default for PersistedAuth {
    fn default() -> Self {
        Self {
            user: None,
            users: vec![CredentialEntry::admin()],
            is_authenticated: false,
        }
    }
}

/// Versioned wrapper written under the storage namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub state: T,
    pub version: u32,
}

/// Token and user, always together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord<U> {
    pub token: String,
    pub user: U,
}
