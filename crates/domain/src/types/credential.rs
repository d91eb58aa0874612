//! Per-tenant credentials for both systems

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Whether the tenant has linked an Exact Online administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// No refresh token stored yet.
    Pending,
    Linked,
}

impl_domain_status_conversions!(LinkState {
    Pending => "pending",
    Linked => "linked",
});

/// Credentials of one Recras tenant, keyed on its hostname.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantCredential {
    pub recras_hostname: String,
    pub recras_username: String,
    pub recras_password: String,
    pub exact_access_token: Option<String>,
    pub exact_refresh_token: Option<String>,
    /// Invoices dated before this day are never synchronized.
    pub start_sync_date: NaiveDate,
}

impl TenantCredential {
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        start_sync_date: NaiveDate,
    ) -> Self {
        Self {
            recras_hostname: hostname.into(),
            recras_username: username.into(),
            recras_password: password.into(),
            exact_access_token: None,
            exact_refresh_token: None,
            start_sync_date,
        }
    }

    #[must_use]
    pub fn link_state(&self) -> LinkState {
        match self.exact_refresh_token.as_deref() {
            Some(token) if !token.is_empty() => LinkState::Linked,
            _ => LinkState::Pending,
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for TenantCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantCredential")
            .field("recras_hostname", &self.recras_hostname)
            .field("recras_username", &self.recras_username)
            .field("recras_password", &"***")
            .field("link_state", &self.link_state())
            .field("start_sync_date", &self.start_sync_date)
            .finish()
    }
}
