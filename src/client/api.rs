use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::ApiClient;
use crate::db::UserRecord;
use crate::Result;

pub const LOGIN: &str = "/auth/login";
pub const REGISTER: &str = "/auth/register";
pub const ME: &str = "/auth/me";
pub const CHANGE_PASSWORD: &str = "/auth/change-password";
pub const REQUEST_PASSWORD_RESET: &str = "/auth/request-password-reset";
pub const RESET_PASSWORD: &str = "/auth/reset-password";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub code: String,
    pub email: String,
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Typed calls against a real backend's auth endpoints.
#[derive(Clone)]
pub struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Stores the returned session on success.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse> {
        let response: LoginResponse = self
            .client
            .request_envelope(Method::POST, LOGIN, Some(credentials))
            .await?;
        self.client
            .session()
            .set_session(&response.token, &response.user)?;
        info!("Backend login successful for {}", response.user.email);
        Ok(response)
    }

    /// Stores the returned session on success.
    pub async fn register(&self, request: &RegisterRequest) -> Result<LoginResponse> {
        let response: LoginResponse = self
            .client
            .request_envelope(Method::POST, REGISTER, Some(request))
            .await?;
        self.client
            .session()
            .set_session(&response.token, &response.user)?;
        info!("Backend registration successful for {}", response.user.email);
        Ok(response)
    }

    pub async fn current_user(&self) -> Result<UserRecord> {
        self.client
            .request_envelope(Method::GET, ME, None::<&()>)
            .await
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<MessageResponse> {
        self.client
            .request_envelope(Method::POST, CHANGE_PASSWORD, Some(request))
            .await
    }

    pub async fn request_password_reset(
        &self,
        request: &RequestPasswordResetRequest,
    ) -> Result<MessageResponse> {
        self.client
            .request_envelope(Method::POST, REQUEST_PASSWORD_RESET, Some(request))
            .await
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<MessageResponse> {
        self.client
            .request_envelope(Method::POST, RESET_PASSWORD, Some(request))
            .await
    }
}
