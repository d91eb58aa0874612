//! Subcommand handlers

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use koppeling_core::AdministrationStatus;
use koppeling_domain::{ApiError, TenantCredential};
use koppeling_infra::scheduling::ScheduledJob;
use koppeling_infra::{DailyScheduler, DailySchedulerConfig, TenantOutcome, TenantRun};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::AppContext;

/// Run the daily scheduler until Ctrl-C.
pub async fn run_daemon(ctx: &AppContext) -> anyhow::Result<()> {
    let job: Arc<dyn ScheduledJob> = ctx.runner.clone();
    let mut scheduler =
        DailyScheduler::new(DailySchedulerConfig::from_sync_config(&ctx.config.sync), job);

    scheduler.start().await?;
    tokio::signal::ctrl_c().await.context("could not listen for Ctrl-C")?;

    info!("Shutdown requested");
    scheduler.stop().await?;
    Ok(())
}

/// One synchronization pass over all tenants, or over `tenant` only.
pub async fn sync_once(ctx: &AppContext, tenant: Option<&str>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, cancelling synchronization");
            on_signal.cancel();
        }
    });

    let runs = match tenant {
        Some(hostname) => vec![ctx.runner.run_tenant(hostname, &cancel).await?],
        None => ctx.runner.run_all(&cancel).await?,
    };

    for run in &runs {
        println!("{}", describe_run(run));
    }
    if runs.iter().any(|run| matches!(run.outcome, TenantOutcome::Aborted { .. })) {
        bail!("one or more tenant runs were aborted");
    }
    Ok(())
}

/// Print the Status Check of every company of `tenant`.
pub async fn status(ctx: &AppContext, tenant: &str) -> anyhow::Result<()> {
    let statuses = ctx.runner.status_for(tenant).await?;
    if statuses.is_empty() {
        println!("{tenant}: no companies");
    }
    for status in &statuses {
        println!("{}", describe_status(status));
    }
    Ok(())
}

/// Validate and store Recras credentials for a tenant.
pub async fn add_credentials(
    ctx: &AppContext,
    hostname: &str,
    username: &str,
    password: &str,
    start_sync: NaiveDate,
) -> anyhow::Result<()> {
    let credential = TenantCredential::new(hostname, username, password, start_sync);

    match ctx.runner.validate_recras(&credential).await {
        Ok(()) => {}
        Err(ApiError::Auth(_)) => bail!("Recras rejected the credentials for {hostname}"),
        Err(err) => return Err(err).context("could not validate the Recras credentials"),
    }

    ctx.credentials.upsert(&credential).await?;
    println!("{hostname}: credentials stored");
    Ok(())
}

/// Store the Exact Online refresh token of a tenant.
pub async fn link(ctx: &AppContext, hostname: &str, refresh_token: &str) -> anyhow::Result<()> {
    if refresh_token.trim().is_empty() {
        bail!("refresh token must not be empty");
    }
    ctx.credentials
        .update_exact_tokens(hostname, None, refresh_token.trim())
        .await
        .with_context(|| format!("could not link {hostname}, add its credentials first"))?;
    println!("{hostname}: Exact Online linked");
    Ok(())
}

/// List tenants and their link state; passwords are never printed.
pub async fn list(ctx: &AppContext) -> anyhow::Result<()> {
    let credentials = ctx.credentials.list_all().await?;
    if credentials.is_empty() {
        println!("no tenants stored");
    }
    for credential in &credentials {
        println!(
            "{}\tuser={}\t{}\tsince={}",
            credential.recras_hostname,
            credential.recras_username,
            credential.link_state(),
            credential.start_sync_date
        );
    }
    Ok(())
}

fn describe_run(run: &TenantRun) -> String {
    match &run.outcome {
        TenantOutcome::Skipped => format!("{}: skipped, Exact Online not linked", run.hostname),
        TenantOutcome::Completed(report) => format!(
            "{}: {} invoices created, {} already present, {} failed, {} messages",
            run.hostname,
            report.counters.invoices_created,
            report.counters.invoices_existing,
            report.counters.invoices_failed,
            report.messages().len()
        ),
        TenantOutcome::Aborted { error, .. } => format!("{}: aborted: {error}", run.hostname),
    }
}

fn check(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "MISSING"
    }
}

fn describe_status(status: &AdministrationStatus) -> String {
    let company = &status.company.name;
    let Some(division) = status.division else {
        return format!(
            "{company}: {}",
            status.error.as_deref().unwrap_or("no matching Exact Online administration")
        );
    };

    let vat_codes = status
        .vat_codes
        .iter()
        .map(|(code, ok)| format!("{code}={}", check(*ok)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{company} (division {division}): item group {} [{}], journal {} [{}], VAT codes {} [{vat_codes}], payment condition {}, overall {}",
        status.item_group_code,
        check(status.item_group_ok),
        status.journal_description,
        check(status.journal_ok),
        check(status.vat_codes_ok),
        check(status.payment_condition_ok),
        check(status.everything_ok),
    )
}
