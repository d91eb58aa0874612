use std::time::Duration;

use koppeling_domain::{KoppelingError, Result};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::{debug, warn};

use crate::errors::InfraError;

const USER_AGENT: &str = concat!("koppeling/", env!("CARGO_PKG_VERSION"));

/// Shared transport for the Exact Online and Recras clients.
///
/// GET and HEAD requests are resent after a connect error, a timeout or a
/// 5xx response, with exponential backoff. Every other method is sent
/// exactly once: a POST that timed out may already have been committed by
/// the server.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Number of attempts allowed for `method`.
    fn attempts_for(&self, method: &Method) -> usize {
        if is_replayable(method) {
            self.max_attempts
        } else {
            1
        }
    }

    /// Send `builder`, resending replayable requests on transient failures.
    ///
    /// # Errors
    /// [`KoppelingError::Network`] when no response was received.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build().map_err(|err| KoppelingError::from(InfraError::from(err)))?;
        let attempts = self.attempts_for(request.method());
        let mut pending = Some(request);
        let mut attempt = 0;

        while let Some(request) = pending.take() {
            attempt += 1;
            let last = attempt >= attempts;
            // Keep a copy only while another attempt is still allowed.
            let retry = if last { None } else { request.try_clone() };

            let method = request.method().clone();
            let path = request.url().path().to_string();
            debug!(attempt, %method, %path, "sending HTTP request");

            match self.client.execute(request).await {
                Ok(response) if response.status().is_server_error() && retry.is_some() => {
                    warn!(attempt, %method, %path, status = %response.status(), "server error, retrying");
                }
                Ok(response) => {
                    debug!(attempt, %method, %path, status = %response.status(), "received HTTP response");
                    return Ok(response);
                }
                Err(err) if is_transient(&err) && retry.is_some() => {
                    warn!(attempt, %method, %path, error = %err, "HTTP request failed, retrying");
                }
                Err(err) => return Err(InfraError::from(err).into()),
            }

            self.backoff(attempt).await;
            pending = retry;
        }

        Err(KoppelingError::Internal("HTTP request could not be resent".into()))
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        let shift = u32::try_from(attempt.saturating_sub(1).min(8)).unwrap_or(8);
        self.base_backoff.saturating_mul(1u32 << shift)
    }

    async fn backoff(&self, attempt: usize) {
        let delay = self.backoff_delay(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), max_attempts: 3, base_backoff: Duration::from_millis(200) }
    }
}

impl HttpClientBuilder {
    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts for GET and HEAD requests, first try included.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// # Errors
    /// When the TLS backend cannot be initialised.
    pub fn build(self) -> Result<HttpClient> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .no_proxy()
            .build()
            .map_err(|err| KoppelingError::from(InfraError::from(err)))?;

        Ok(HttpClient { client, max_attempts: self.max_attempts, base_backoff: self.base_backoff })
    }
}

fn is_replayable(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
