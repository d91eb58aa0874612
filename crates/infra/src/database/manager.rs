//! Database connection manager backed by the SQLCipher pool.

use std::path::{Path, PathBuf};

use koppeling_domain::{DatabaseConfig, KoppelingError, Result};
use rusqlite::params;
use tracing::info;

use super::sqlcipher_pool::{
    create_sqlcipher_pool, SqlCipherConnection, SqlCipherPool, SqlCipherPoolConfig,
};
use crate::errors::InfraError;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database manager that wraps an [`SqlCipherPool`].
pub struct DbManager {
    pool: SqlCipherPool,
    path: PathBuf,
}

impl DbManager {
    /// Create a new manager with the given pool size and SQLCipher key.
    ///
    /// # Errors
    /// [`KoppelingError::Config`] when no key is given or the key is wrong.
    pub fn new<P: AsRef<Path>>(
        db_path: P,
        pool_size: u32,
        encryption_key: Option<&str>,
    ) -> Result<Self> {
        let key = encryption_key
            .filter(|key| !key.is_empty())
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                KoppelingError::Config(
                    "database encryption key not provided, set KOPPELING_DB_ENCRYPTION_KEY".into(),
                )
            })?;

        let path = db_path.as_ref().to_path_buf();
        let config = SqlCipherPoolConfig { max_size: pool_size.max(1), ..SqlCipherPoolConfig::default() };
        let pool = create_sqlcipher_pool(&path, key, config)?;

        info!(db_path = %path.display(), "credential database opened");
        Ok(Self { pool, path })
    }

    /// Open the database described by `config` and bring its schema up to date.
    ///
    /// # Errors
    /// See [`DbManager::new`] and [`DbManager::run_migrations`].
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let manager = Self::new(&config.path, 4, config.encryption_key.as_deref())?;
        manager.run_migrations()?;
        Ok(manager)
    }

    /// Acquire a connection from the pool.
    ///
    /// # Errors
    /// When the pool times out waiting for a connection.
    pub fn get_connection(&self) -> Result<SqlCipherConnection> {
        self.pool.get().map_err(|err| InfraError::from(err).into())
    }

    /// Ensure the full schema exists on the current database.
    ///
    /// # Errors
    /// When a schema statement fails.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
            params![SCHEMA_VERSION],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify the database is accessible and responding.
    ///
    /// # Errors
    /// When no connection can be acquired or the probe query fails.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0)).map_err(map_sql_error)?;
        Ok(())
    }
}

pub(crate) fn map_sql_error(err: rusqlite::Error) -> KoppelingError {
    KoppelingError::from(InfraError::from(err))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const TEST_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn migrations_create_schema_version() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4, Some(TEST_KEY)).expect("manager created");
        manager.run_migrations().expect("migrations run");
        manager.run_migrations().expect("migrations are idempotent");

        let conn = manager.get_connection().expect("connection acquired");
        let version: i32 =
            conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'credential'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn open_uses_database_config() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let config = DatabaseConfig {
            path: temp_dir.path().join("koppeling.db").display().to_string(),
            encryption_key: Some(TEST_KEY.into()),
        };

        let manager = DbManager::open(&config).expect("manager opened");
        manager.health_check().expect("health check passed");
        assert_eq!(manager.path(), temp_dir.path().join("koppeling.db"));
    }

    #[test]
    fn missing_encryption_key_is_a_config_error() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("test.db");

        assert!(matches!(DbManager::new(&db_path, 4, None), Err(KoppelingError::Config(_))));
        assert!(matches!(DbManager::new(&db_path, 4, Some("")), Err(KoppelingError::Config(_))));
    }
}
