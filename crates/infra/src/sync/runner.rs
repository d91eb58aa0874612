//! Tenant runner
//!
//! Walks the stored tenants one after another. Every tenant run builds its
//! own HTTP client, token provider and API clients, so nothing is shared
//! between runs. After each run the rotated Exact Online tokens are written
//! back to the credential store.

use std::sync::Arc;
use std::time::Duration;

use koppeling_core::{
    check_status, AdministrationStatus, CredentialStore, RecrasApi, SyncError, SyncOptions,
    SyncReport, SyncService,
};
use koppeling_domain::constants::JOURNAL_CODE;
use koppeling_domain::{ApiResult, Config, KoppelingError, LinkState, Result, TenantCredential};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::api::{AccessTokenProvider, ExactTokenProvider};
use crate::http::HttpClient;
use crate::integrations::exact::ExactClient;
use crate::integrations::recras::RecrasClient;

/// How one tenant run ended.
#[derive(Debug)]
pub enum TenantOutcome {
    /// No Exact Online administration linked yet.
    Skipped,
    Completed(SyncReport),
    /// A fatal error stopped the run; `report` holds what was collected first.
    Aborted { report: SyncReport, error: SyncError },
}

/// Result of running one tenant.
#[derive(Debug)]
pub struct TenantRun {
    pub hostname: String,
    pub outcome: TenantOutcome,
}

struct TenantClients {
    tokens: Arc<ExactTokenProvider>,
    exact: Arc<ExactClient>,
    recras: Arc<RecrasClient>,
}

/// Runs synchronizations for the tenants in a [`CredentialStore`].
pub struct TenantSyncRunner {
    config: Config,
    store: Arc<dyn CredentialStore>,
}

impl TenantSyncRunner {
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Self {
        Self { config, store }
    }

    /// Run every stored tenant in hostname order.
    ///
    /// A tenant that cannot be started is logged and skipped; the pass
    /// continues with the next one.
    ///
    /// # Errors
    /// Only when the tenant list cannot be read.
    #[instrument(skip_all, fields(run_id = %Uuid::now_v7()))]
    pub async fn run_all(&self, cancel: &CancellationToken) -> Result<Vec<TenantRun>> {
        let credentials = self.store.list_all().await?;
        info!(tenants = credentials.len(), "Starting synchronization pass");

        let mut runs = Vec::with_capacity(credentials.len());
        for credential in credentials {
            if cancel.is_cancelled() {
                warn!("Synchronization pass cancelled");
                break;
            }

            let hostname = credential.recras_hostname.clone();
            match self.run_credential(credential, cancel).await {
                Ok(run) => runs.push(run),
                Err(err) => error!(tenant = %hostname, error = %err, "Tenant run failed"),
            }
        }

        info!(tenants = runs.len(), "Synchronization pass finished");
        Ok(runs)
    }

    /// Run a single tenant.
    ///
    /// # Errors
    /// [`KoppelingError::NotFound`] for an unknown hostname, plus the errors
    /// of building the clients or persisting the tokens.
    pub async fn run_tenant(&self, hostname: &str, cancel: &CancellationToken) -> Result<TenantRun> {
        let credential = self.credential(hostname).await?;
        self.run_credential(credential, cancel).await
    }

    /// Diagnose the Exact Online configuration of every company of a tenant.
    ///
    /// # Errors
    /// Unknown or unlinked tenants, and failures reading the current
    /// division or the company list.
    #[instrument(skip(self))]
    pub async fn status_for(&self, hostname: &str) -> Result<Vec<AdministrationStatus>> {
        let credential = self.credential(hostname).await?;
        if credential.link_state() == LinkState::Pending {
            return Err(KoppelingError::InvalidInput(format!(
                "tenant `{hostname}` has no Exact Online administration linked"
            )));
        }

        let clients = self.connect(&credential)?;
        let statuses = check_status(clients.exact.as_ref(), clients.recras.as_ref()).await;
        self.persist_tokens(&credential.recras_hostname, &clients.tokens).await?;
        Ok(statuses?)
    }

    /// Check a set of Recras credentials against the tenant.
    ///
    /// # Errors
    /// [`koppeling_domain::ApiError::Auth`] when Recras rejects them.
    pub async fn validate_recras(&self, credential: &TenantCredential) -> ApiResult<()> {
        let http = self.http_client()?;
        RecrasClient::new(
            http,
            &credential.recras_hostname,
            credential.recras_username.as_str(),
            credential.recras_password.as_str(),
        )
        .validate_credentials()
        .await
    }

    async fn credential(&self, hostname: &str) -> Result<TenantCredential> {
        self.store
            .find_by_hostname(hostname)
            .await?
            .ok_or_else(|| KoppelingError::NotFound(format!("no credential for `{hostname}`")))
    }

    #[instrument(skip_all, fields(tenant = %credential.recras_hostname))]
    async fn run_credential(
        &self,
        credential: TenantCredential,
        cancel: &CancellationToken,
    ) -> Result<TenantRun> {
        let hostname = credential.recras_hostname.clone();
        if credential.link_state() == LinkState::Pending {
            warn!("No Exact Online administration linked, skipping tenant");
            return Ok(TenantRun { hostname, outcome: TenantOutcome::Skipped });
        }

        let clients = self.connect(&credential)?;
        let service = SyncService::new(clients.exact.clone(), clients.recras.clone()).with_options(
            SyncOptions {
                journal_code: JOURNAL_CODE.to_string(),
                require_journal: self.config.sync.require_journal,
            },
        );

        let run_cancel = cancel.child_token();
        let limit = Duration::from_secs(self.config.sync.tenant_timeout_secs);
        let mut report = SyncReport::new();
        let result = match tokio::time::timeout(
            limit,
            service.run_into(&mut report, credential.start_sync_date, &run_cancel),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                run_cancel.cancel();
                error!(timeout_secs = limit.as_secs(), "Tenant run timed out");
                Err(SyncError::Cancelled)
            }
        };

        if let Err(err) = &result {
            error!(error = %err, "Tenant run aborted");
        }
        if let Err(err) = service.post_report_note(&report, result.as_ref().err()).await {
            warn!(error = %err, "Could not post the synchronization note");
        }

        self.persist_tokens(&hostname, &clients.tokens).await?;

        let counters = report.counters;
        info!(
            companies = counters.companies_processed,
            companies_skipped = counters.companies_skipped,
            products_created = counters.products_created,
            invoices_created = counters.invoices_created,
            invoices_existing = counters.invoices_existing,
            invoices_failed = counters.invoices_failed,
            messages = report.messages().len(),
            "Tenant run finished"
        );

        let outcome = match result {
            Ok(()) => TenantOutcome::Completed(report),
            Err(error) => TenantOutcome::Aborted { report, error },
        };
        Ok(TenantRun { hostname, outcome })
    }

    fn http_client(&self) -> Result<HttpClient> {
        HttpClient::builder()
            .timeout(Duration::from_secs(self.config.sync.request_timeout_secs))
            .max_attempts(usize::try_from(self.config.sync.http_max_attempts).unwrap_or(1))
            .build()
    }

    fn connect(&self, credential: &TenantCredential) -> Result<TenantClients> {
        let http = self.http_client()?;
        let refresh_token = credential.exact_refresh_token.clone().unwrap_or_default();
        let tokens = Arc::new(ExactTokenProvider::new(http.clone(), &self.config.exact, refresh_token)?);
        let auth: Arc<dyn AccessTokenProvider> = tokens.clone();

        let exact = Arc::new(ExactClient::new(http.clone(), self.config.exact.base_url.as_str(), auth));
        let recras = Arc::new(RecrasClient::new(
            http,
            &credential.recras_hostname,
            credential.recras_username.as_str(),
            credential.recras_password.as_str(),
        ));
        Ok(TenantClients { tokens, exact, recras })
    }

    async fn persist_tokens(&self, hostname: &str, tokens: &ExactTokenProvider) -> Result<()> {
        let refresh_token = tokens.refresh_token().await;
        if refresh_token.is_empty() {
            return Ok(());
        }
        let access_token = tokens.current_access_token().await;
        self.store
            .update_exact_tokens(hostname, access_token.as_deref(), &refresh_token)
            .await
            .inspect_err(|err| error!(tenant = %hostname, error = %err, "Could not persist Exact Online tokens"))
    }
}
