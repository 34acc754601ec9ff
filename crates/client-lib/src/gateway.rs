// ============================
// crates/client-lib/src/gateway.rs
// ============================
//! HTTP gateway to the QuickBite REST API.
//!
//! Every successful response arrives wrapped in the `{ "result": ... }`
//! envelope; failures map to typed errors, with HTTP 401 singled out as
//! [`AppError::Unauthorized`] so the session layer can run its refresh path.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::Settings;
use crate::error::AppError;
use quickbite_common::{ApiEnvelope, ApiErrorBody, AuthPayload, NewAccount, ProfilePatch, UserProfile};

const USER_AGENT: &str = concat!("quickbite-client/", env!("CARGO_PKG_VERSION"));

/// Typed surface of the REST API as the client core consumes it.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    /// Exchange credentials for a token pair and, usually, a profile
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, AppError>;
    /// Create an account; behaves like `login` on success
    async fn register(&self, account: &NewAccount) -> Result<AuthPayload, AppError>;
    /// Ask the server to send a password-reset email
    async fn request_password_reset(&self, email: &str) -> Result<(), AppError>;
    /// Exchange the refresh token for a fresh pair
    async fn refresh(&self, refresh_token: &str) -> Result<AuthPayload, AppError>;
    /// Invalidate the refresh token server-side
    async fn invalidate(&self, refresh_token: &str) -> Result<(), AppError>;
    /// Fetch the signed-in user's profile
    async fn me(&self, access_token: &str) -> Result<UserProfile, AppError>;
    /// Apply a partial profile update
    async fn update_profile(
        &self,
        access_token: &str,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, AppError>;
    /// Report a courier position
    async fn upload_courier_location(
        &self,
        access_token: &str,
        lat: f64,
        lng: f64,
    ) -> Result<(), AppError>;
}

/// `ApiGateway` over HTTP.
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(settings: &Settings) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(settings.http_timeout())
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Map a non-2xx response to a typed error
async fn failure(response: reqwest::Response) -> AppError {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return AppError::Unauthorized;
    }
    let message = response
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    AppError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Unwrap the `{ result }` envelope of a successful response
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AppError> {
    if response.status().is_success() {
        Ok(response.json::<ApiEnvelope<T>>().await?.result)
    } else {
        Err(failure(response).await)
    }
}

/// Check the status of a response whose payload the client does not need
async fn decode_empty(response: reqwest::Response) -> Result<(), AppError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(failure(response).await)
    }
}

#[async_trait]
impl ApiGateway for HttpGateway {
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, AppError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        decode(response).await
    }

    async fn register(&self, account: &NewAccount) -> Result<AuthPayload, AppError> {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(account)
            .send()
            .await?;
        decode(response).await
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url("/auth/password-reset"))
            .json(&json!({ "email": email }))
            .send()
            .await?;
        decode_empty(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthPayload, AppError> {
        let response = self
            .client
            .post(self.url("/auth/refresh"))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;
        decode(response).await
    }

    async fn invalidate(&self, refresh_token: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url("/auth/logout"))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;
        decode_empty(response).await
    }

    async fn me(&self, access_token: &str) -> Result<UserProfile, AppError> {
        let response = self
            .client
            .get(self.url("/users/me"))
            .bearer_auth(access_token)
            .send()
            .await?;
        decode(response).await
    }

    async fn update_profile(
        &self,
        access_token: &str,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, AppError> {
        let response = self
            .client
            .patch(self.url("/users/me"))
            .bearer_auth(access_token)
            .json(patch)
            .send()
            .await?;
        decode(response).await
    }

    async fn upload_courier_location(
        &self,
        access_token: &str,
        lat: f64,
        lng: f64,
    ) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url("/delivery/location"))
            .bearer_auth(access_token)
            .json(&json!({ "lat": lat, "lng": lng }))
            .send()
            .await?;
        decode_empty(response).await
    }
}
