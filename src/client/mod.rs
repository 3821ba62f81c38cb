//! HTTP client for the NutriZone backend
//!
//! Attaches the stored bearer token to every request and drops the
//! session when the backend answers 401.

pub mod api;
pub mod error_messages;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::db::UserRecord;
use crate::error::{AuthError, ClientError};
use crate::session::SessionStore;
use crate::Result;

pub use api::AuthApi;

/// Uniform response wrapper used by every backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status_code: u16,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> std::result::Result<T, ClientError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(ClientError::Api {
                status: self.status_code,
                error: self.error,
                message: Some(self.message),
            }),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: SessionStore<UserRecord>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, session: SessionStore<UserRecord>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(ClientError::from)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(ClientError::from)?;

        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &SessionStore<UserRecord> {
        &self.session
    }

    /// `path` is appended to the base URL's own path.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url
    }

    pub async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let mut request = self.http.request(method.clone(), url);

        match self.session.get_token()? {
            Some(token) => request = request.bearer_auth(token),
            None => debug!("No token available for {} {}", method, path),
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("{} {} failed: {}", method, path, e);
            ClientError::from(e)
        })?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("{} {} returned 401, clearing session", method, path);
            if let Err(e) = self.session.clear_session() {
                error!("Failed to clear session after 401: {}", e);
            }
            return Err(AuthError::Unauthorized.into());
        }

        if !status.is_success() {
            let text = response.text().await.map_err(ClientError::from)?;
            let envelope = serde_json::from_str::<ApiResponse<serde_json::Value>>(&text).ok();
            warn!("{} {} returned {}", method, path, status);
            return Err(ClientError::Api {
                status: status.as_u16(),
                error: envelope.as_ref().and_then(|e| e.error.clone()),
                message: envelope.map(|e| e.message),
            }
            .into());
        }

        debug!("{} {} returned {}", method, path, status);
        Ok(response.json::<T>().await.map_err(ClientError::from)?)
    }

    /// Like `request`, but unwraps the `ApiResponse` envelope.
    pub async fn request_envelope<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let envelope: ApiResponse<T> = self.request(method, path, body).await?;
        Ok(envelope.into_result()?)
    }
}
