//! Exact Online authentication with refresh-token rotation
//!
//! Exact Online hands out short-lived access tokens and rotates the refresh
//! token on every refresh. The provider keeps both in memory; the tenant
//! runner reads the rotated refresh token back and persists it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use koppeling_domain::constants::EXACT_TOKEN_PATH;
use koppeling_domain::utils::odata;
use koppeling_domain::{ApiError, ExactConfig, KoppelingError};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::errors::{decode_json, expect_status};
use crate::http::HttpClient;

/// Refresh when the access token expires within this window.
const REFRESH_MARGIN_SECS: i64 = 30;

/// Trait for providing access tokens
///
/// This trait allows dependency injection and testing with mock providers.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get a valid access token, refreshing it when needed.
    async fn access_token(&self) -> Result<String, ApiError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(with = "odata::string_int", default)]
    expires_in: i64,
}

struct TokenState {
    access_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    refresh_token: String,
}

impl TokenState {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.access_token, self.expires_at) {
            (Some(token), Some(expires_at)) => {
                !token.is_empty() && expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
            }
            _ => false,
        }
    }
}

/// Token provider for one Exact Online connection.
pub struct ExactTokenProvider {
    http: HttpClient,
    token_url: String,
    client_id: String,
    client_secret: String,
    state: Mutex<TokenState>,
}

impl ExactTokenProvider {
    /// Create a provider that refreshes with `refresh_token` on first use.
    ///
    /// # Errors
    /// [`KoppelingError::Config`] when the client secret is not configured.
    pub fn new(
        http: HttpClient,
        config: &ExactConfig,
        refresh_token: impl Into<String>,
    ) -> Result<Self, KoppelingError> {
        if config.client_secret.is_empty() {
            return Err(KoppelingError::Config(
                "Exact Online client secret is missing, set EXACT_CLIENT_SECRET".into(),
            ));
        }

        Ok(Self {
            http,
            token_url: format!("{}{}", config.base_url.trim_end_matches('/'), EXACT_TOKEN_PATH),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            state: Mutex::new(TokenState {
                access_token: None,
                expires_at: None,
                refresh_token: refresh_token.into(),
            }),
        })
    }

    /// Seed a known access token and its expiry.
    #[must_use]
    pub fn with_access_token(
        mut self,
        access_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let state = self.state.get_mut();
        state.access_token = Some(access_token.into());
        state.expires_at = Some(expires_at);
        self
    }

    /// Current refresh token, rotated by every successful refresh.
    pub async fn refresh_token(&self) -> String {
        self.state.lock().await.refresh_token.clone()
    }

    /// Current access token, if one was obtained.
    pub async fn current_access_token(&self) -> Option<String> {
        self.state.lock().await.access_token.clone()
    }

    async fn refresh(&self, state: &mut TokenState) -> Result<(), ApiError> {
        if state.refresh_token.is_empty() {
            return Err(ApiError::Auth("no Exact Online refresh token stored".into()));
        }

        debug!(url = %self.token_url, "refreshing Exact Online access token");
        let form = [
            ("refresh_token", state.refresh_token.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let request = self
            .http
            .request(Method::POST, &self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form);

        let response = self.http.send(request).await.map_err(ApiError::from)?;
        let response = expect_status(response, StatusCode::OK, &Method::POST)
            .await
            .map_err(|err| {
                warn!(error = %err, "Exact Online token refresh rejected");
                ApiError::Auth(format!("token refresh failed: {err}"))
            })?;
        let token: TokenResponse = decode_json(response)
            .await
            .map_err(|err| ApiError::Auth(format!("token refresh returned an unreadable body: {err}")))?;

        if token.access_token.is_empty() {
            return Err(ApiError::Auth("token refresh returned no access token".into()));
        }

        state.expires_at = Some(Utc::now() + Duration::seconds(token.expires_in));
        state.access_token = Some(token.access_token);
        if !token.refresh_token.is_empty() {
            state.refresh_token = token.refresh_token;
        }
        info!(expires_in = token.expires_in, "Exact Online access token refreshed");
        Ok(())
    }
}

#[async_trait]
impl AccessTokenProvider for ExactTokenProvider {
    async fn access_token(&self) -> Result<String, ApiError> {
        let mut state = self.state.lock().await;
        if !state.is_fresh(Utc::now()) {
            self.refresh(&mut state).await?;
        }
        state.access_token.clone().ok_or_else(|| ApiError::Auth("no access token".into()))
    }
}
