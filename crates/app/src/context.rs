//! Application context - dependency wiring for the CLI commands

use std::sync::Arc;

use koppeling_core::CredentialStore;
use koppeling_domain::{Config, Result};
use koppeling_infra::{DbManager, SqlCipherCredentialStore, TenantSyncRunner};
use tracing::info;

/// Services shared by all subcommands
pub struct AppContext {
    pub config: Config,
    pub credentials: Arc<dyn CredentialStore>,
    pub runner: Arc<TenantSyncRunner>,
}

impl AppContext {
    /// Open the credential database and build the tenant runner.
    ///
    /// # Errors
    /// When the database cannot be opened or migrated.
    pub fn new(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::open(&config.database)?);
        info!(db_path = %db.path().display(), "Credential store ready");

        let credentials: Arc<dyn CredentialStore> = Arc::new(SqlCipherCredentialStore::new(db));
        let runner = Arc::new(TenantSyncRunner::new(config.clone(), Arc::clone(&credentials)));

        Ok(Self { config, credentials, runner })
    }
}
