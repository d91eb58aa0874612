//! Tenant credential repository implementation using SQLCipher

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use koppeling_core::CredentialStore;
use koppeling_domain::{KoppelingError, Result as DomainResult, TenantCredential};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;
use tracing::debug;

use super::manager::{map_sql_error, DbManager};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_COLUMNS: &str = "SELECT recras_hostname, recras_username, recras_password,
        exact_access_token, exact_refresh_token, start_sync_date
 FROM credential";

/// SQLCipher-backed implementation of [`CredentialStore`]
pub struct SqlCipherCredentialStore {
    db: Arc<DbManager>,
}

impl SqlCipherCredentialStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for SqlCipherCredentialStore {
    async fn list_all(&self) -> DomainResult<Vec<TenantCredential>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<TenantCredential>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!("{SELECT_COLUMNS} ORDER BY recras_hostname"))
                .map_err(map_sql_error)?;
            let rows = stmt.query_map([], map_credential_row).map_err(map_sql_error)?;

            rows.map(|row| row.map_err(map_sql_error).and_then(RawCredential::into_domain))
                .collect()
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_by_hostname(&self, hostname: &str) -> DomainResult<Option<TenantCredential>> {
        let db = Arc::clone(&self.db);
        let hostname = hostname.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<TenantCredential>> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE recras_hostname = ?1"),
                params![&hostname],
                map_credential_row,
            )
            .optional()
            .map_err(map_sql_error)?
            .map(RawCredential::into_domain)
            .transpose()
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert(&self, credential: &TenantCredential) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let credential = credential.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO credential (recras_hostname, recras_username, recras_password,
                        exact_access_token, exact_refresh_token, start_sync_date, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(recras_hostname) DO UPDATE SET
                    recras_username = excluded.recras_username,
                    recras_password = excluded.recras_password,
                    exact_access_token = COALESCE(excluded.exact_access_token, credential.exact_access_token),
                    exact_refresh_token = COALESCE(excluded.exact_refresh_token, credential.exact_refresh_token),
                    start_sync_date = excluded.start_sync_date,
                    updated_at = excluded.updated_at",
                params![
                    credential.recras_hostname,
                    credential.recras_username,
                    credential.recras_password,
                    credential.exact_access_token,
                    credential.exact_refresh_token,
                    credential.start_sync_date.format(DATE_FORMAT).to_string(),
                    Utc::now().timestamp(),
                ],
            )
            .map_err(map_sql_error)?;
            debug!(hostname = %credential.recras_hostname, "credential stored");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_exact_tokens(
        &self,
        hostname: &str,
        access_token: Option<&str>,
        refresh_token: &str,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let hostname = hostname.to_string();
        let access_token = access_token.map(ToOwned::to_owned);
        let refresh_token = refresh_token.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE credential
                     SET exact_access_token = ?2, exact_refresh_token = ?3, updated_at = ?4
                     WHERE recras_hostname = ?1",
                    params![hostname, access_token, refresh_token, Utc::now().timestamp()],
                )
                .map_err(map_sql_error)?;

            if updated == 0 {
                return Err(KoppelingError::NotFound(format!("no credential for `{hostname}`")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

struct RawCredential {
    hostname: String,
    username: String,
    password: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    start_sync_date: String,
}

impl RawCredential {
    fn into_domain(self) -> DomainResult<TenantCredential> {
        let start_sync_date = NaiveDate::parse_from_str(&self.start_sync_date, DATE_FORMAT)
            .map_err(|err| {
                KoppelingError::Database(format!(
                    "invalid start_sync_date `{}` for `{}`: {err}",
                    self.start_sync_date, self.hostname
                ))
            })?;

        Ok(TenantCredential {
            recras_hostname: self.hostname,
            recras_username: self.username,
            recras_password: self.password,
            exact_access_token: self.access_token,
            exact_refresh_token: self.refresh_token,
            start_sync_date,
        })
    }
}

fn map_credential_row(row: &Row<'_>) -> rusqlite::Result<RawCredential> {
    Ok(RawCredential {
        hostname: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        access_token: row.get(3)?,
        refresh_token: row.get(4)?,
        start_sync_date: row.get(5)?,
    })
}

fn map_join_error(err: task::JoinError) -> KoppelingError {
    if err.is_cancelled() {
        KoppelingError::Internal("blocking database task cancelled".into())
    } else {
        KoppelingError::Internal(format!("blocking database task failed: {err}"))
    }
}
