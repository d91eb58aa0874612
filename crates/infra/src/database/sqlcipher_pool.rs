//! SQLCipher connection pool
//!
//! Every pooled connection is keyed and tuned in the r2d2 init hook, so a
//! connection handed out by the pool is always ready to query. The key is
//! checked on a standalone connection before the pool is built.

use std::path::Path;
use std::time::Duration;

use koppeling_domain::{KoppelingError, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use crate::errors::InfraError;

pub type SqlCipherPool = Pool<SqliteConnectionManager>;
pub type SqlCipherConnection = PooledConnection<SqliteConnectionManager>;

/// Pool tuning.
#[derive(Debug, Clone)]
pub struct SqlCipherPoolConfig {
    pub max_size: u32,
    pub connection_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for SqlCipherPoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

fn configure_connection(
    conn: &Connection,
    key: &str,
    busy_timeout: Duration,
) -> std::result::Result<(), rusqlite::Error> {
    conn.pragma_update(None, "key", key)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;\n\
         PRAGMA synchronous=NORMAL;\n\
         PRAGMA foreign_keys=ON;",
    )?;
    conn.busy_timeout(busy_timeout)
}

/// Open an encrypted pool at `path`.
///
/// # Errors
/// [`KoppelingError::Config`] when the key does not open the database, or
/// [`KoppelingError::Database`] when the pool cannot be built.
#[instrument(skip_all, fields(db_path = %path.as_ref().display()))]
pub fn create_sqlcipher_pool<P: AsRef<Path>>(
    path: P,
    encryption_key: String,
    config: SqlCipherPoolConfig,
) -> Result<SqlCipherPool> {
    let busy_timeout = config.busy_timeout;

    // Key one plain connection first: a failing init hook would only make
    // r2d2 retry until the connection timeout.
    {
        let conn = Connection::open(path.as_ref()).map_err(|err| KoppelingError::from(InfraError::from(err)))?;
        configure_connection(&conn, &encryption_key, busy_timeout)
            .map_err(|err| KoppelingError::from(InfraError::from(err)))?;
        verify_encryption(&conn)?;
        debug!("encryption verified");
    }

    let manager = SqliteConnectionManager::file(path.as_ref())
        .with_init(move |conn| configure_connection(conn, &encryption_key, busy_timeout));

    let pool = Pool::builder()
        .max_size(config.max_size.max(1))
        .connection_timeout(config.connection_timeout)
        .build(manager)
        .map_err(|err| {
            warn!(error = %err, "failed to create SQLCipher pool");
            KoppelingError::from(InfraError::from(err))
        })?;

    info!(max_connections = config.max_size.max(1), "SQLCipher pool created");
    Ok(pool)
}

/// Read the header and the schema table, which forces decryption.
fn verify_encryption(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA user_version", [], |_| Ok(()))
        .and_then(|()| conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(())))
        .map_err(|err| KoppelingError::from(InfraError::from(err)))
}
