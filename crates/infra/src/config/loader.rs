//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If a required variable is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `EXACT_CLIENT_ID`, `EXACT_CLIENT_SECRET`: Exact Online OAuth application
//! - `KOPPELING_DB_PATH`: Credential database file path
//!
//! Optional:
//! - `EXACT_REDIRECT_URL`, `EXACT_BASE_URL` (default `https://start.exactonline.nl`)
//! - `KOPPELING_DB_ENCRYPTION_KEY`: SQLCipher key
//! - `KOPPELING_SYNC_INTERVAL_SECS`, `KOPPELING_SYNC_MAX_LATENESS_SECS`
//! - `KOPPELING_REQUEST_TIMEOUT_SECS`, `KOPPELING_TENANT_TIMEOUT_SECS`
//! - `KOPPELING_HTTP_MAX_ATTEMPTS`
//! - `KOPPELING_REQUIRE_JOURNAL`, `KOPPELING_RUN_AT_START` (true/false)
//! - `KOPPELING_LOG_LEVEL`, `KOPPELING_LOG_JSON`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.{json,toml}` or `./koppeling.{json,toml}` (current working directory)
//! 2. `../config.{json,toml}` (parent directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use koppeling_domain::constants::EXACT_BASE_URL_NL;
use koppeling_domain::{
    Config, DatabaseConfig, ExactConfig, KoppelingError, LoggingConfig, Result, SyncConfig,
};

const CONFIG_FILE_NAMES: [&str; 4] = ["config.toml", "config.json", "koppeling.toml", "koppeling.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `KoppelingError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `KoppelingError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let defaults = SyncConfig::default();
    let logging_defaults = LoggingConfig::default();

    let exact = ExactConfig {
        client_id: env_var("EXACT_CLIENT_ID")?,
        client_secret: env_var("EXACT_CLIENT_SECRET")?,
        redirect_url: std::env::var("EXACT_REDIRECT_URL").unwrap_or_default(),
        base_url: std::env::var("EXACT_BASE_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| EXACT_BASE_URL_NL.to_string()),
    };

    let database = DatabaseConfig {
        path: env_var("KOPPELING_DB_PATH")?,
        encryption_key: std::env::var("KOPPELING_DB_ENCRYPTION_KEY").ok().filter(|k| !k.is_empty()),
    };

    let sync = SyncConfig {
        interval_secs: env_parse("KOPPELING_SYNC_INTERVAL_SECS", defaults.interval_secs)?,
        max_lateness_secs: env_parse("KOPPELING_SYNC_MAX_LATENESS_SECS", defaults.max_lateness_secs)?,
        request_timeout_secs: env_parse(
            "KOPPELING_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout_secs,
        )?,
        tenant_timeout_secs: env_parse("KOPPELING_TENANT_TIMEOUT_SECS", defaults.tenant_timeout_secs)?,
        http_max_attempts: env_parse("KOPPELING_HTTP_MAX_ATTEMPTS", defaults.http_max_attempts)?,
        require_journal: env_bool("KOPPELING_REQUIRE_JOURNAL", defaults.require_journal),
        run_at_start: env_bool("KOPPELING_RUN_AT_START", defaults.run_at_start),
    };

    let logging = LoggingConfig {
        level: std::env::var("KOPPELING_LOG_LEVEL").unwrap_or(logging_defaults.level),
        json: env_bool("KOPPELING_LOG_JSON", logging_defaults.json),
    };

    let config = Config { exact, database, sync, logging };
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `KoppelingError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(KoppelingError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            KoppelingError::Config(
                "No complete environment and no config file found in any of the standard locations"
                    .to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| KoppelingError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from string content, by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| KoppelingError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| KoppelingError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(KoppelingError::Config(format!("Unsupported config format: {extension}"))),
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.exact.client_id.is_empty() {
        return Err(KoppelingError::Config("exact.client_id must not be empty".into()));
    }
    if config.database.path.is_empty() {
        return Err(KoppelingError::Config("database.path must not be empty".into()));
    }
    if config.sync.interval_secs == 0 {
        return Err(KoppelingError::Config("sync.interval_secs must be positive".into()));
    }
    if config.sync.http_max_attempts == 0 {
        return Err(KoppelingError::Config("sync.http_max_attempts must be at least 1".into()));
    }
    Ok(())
}

/// Probe the working directory, its parent and the executable directory for
/// a config file.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        KoppelingError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional numeric environment variable.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| KoppelingError::Config(format!("Invalid value for {key}: {e}"))),
        _ => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
