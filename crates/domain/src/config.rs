//! Application configuration structures

use serde::{Deserialize, Serialize};

use crate::constants::EXACT_BASE_URL_NL;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub exact: ExactConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Exact Online OAuth application
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_url: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    EXACT_BASE_URL_NL.to_string()
}

impl std::fmt::Debug for ExactConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("redirect_url", &self.redirect_url)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Credential database configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub encryption_key: Option<String>,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("path", &self.path)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Scheduler and synchronization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_secs: u64,
    /// Ticks firing later than this are skipped.
    pub max_lateness_secs: u64,
    pub request_timeout_secs: u64,
    pub tenant_timeout_secs: u64,
    pub http_max_attempts: u32,
    /// Fail a company up front when the `recras` journal is missing.
    pub require_journal: bool,
    pub run_at_start: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 86_400,
            max_lateness_secs: 3_600,
            request_timeout_secs: 30,
            tenant_timeout_secs: 3_600,
            http_max_attempts: 3,
            require_journal: true,
            run_at_start: true,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
