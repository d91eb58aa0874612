//! Port interfaces for credential storage

use async_trait::async_trait;
use koppeling_domain::{Result, TenantCredential};

/// Trait for storing per-tenant credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// All stored tenants, ordered by hostname
    async fn list_all(&self) -> Result<Vec<TenantCredential>>;

    /// Get the credential of one tenant
    async fn find_by_hostname(&self, hostname: &str) -> Result<Option<TenantCredential>>;

    /// Insert or replace a tenant's Recras credentials and start date
    ///
    /// Stored Exact Online tokens are kept when the new value has none.
    async fn upsert(&self, credential: &TenantCredential) -> Result<()>;

    /// Persist rotated Exact Online tokens
    async fn update_exact_tokens(
        &self,
        hostname: &str,
        access_token: Option<&str>,
        refresh_token: &str,
    ) -> Result<()>;
}
