//! Fixed-cadence scheduler for synchronization passes.
//!
//! Runs a [`ScheduledJob`] once at start (optional) and then every
//! `interval`. A tick that fires more than `max_lateness` after its
//! scheduled instant is skipped with a warning; the following tick keeps
//! the original cadence.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use koppeling_domain::SyncConfig;
//! use koppeling_infra::scheduling::{DailyScheduler, DailySchedulerConfig, ScheduledJob};
//!
//! # async fn example(job: Arc<dyn ScheduledJob>) -> Result<(), koppeling_infra::scheduling::SchedulerError> {
//! let config = DailySchedulerConfig::from_sync_config(&SyncConfig::default());
//! let mut scheduler = DailyScheduler::new(config, job);
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use koppeling_domain::SyncConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::InfraError;
use crate::scheduling::error::{SchedulerError, SchedulerResult};
use crate::sync::TenantSyncRunner;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Work executed on every tick.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Execute the job; `cancel` fires when the scheduler stops.
    async fn run(&self, cancel: &CancellationToken) -> Result<(), InfraError>;
}

#[async_trait]
impl ScheduledJob for TenantSyncRunner {
    async fn run(&self, cancel: &CancellationToken) -> Result<(), InfraError> {
        self.run_all(cancel).await.map(|_| ()).map_err(InfraError::from)
    }
}

/// Configuration for the daily scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedulerConfig {
    pub interval: Duration,
    /// Ticks handled later than this are skipped.
    pub max_lateness: Duration,
    /// Run one pass immediately on start.
    pub run_at_start: bool,
}

impl DailySchedulerConfig {
    pub fn from_sync_config(config: &SyncConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs.max(1)),
            max_lateness: Duration::from_secs(config.max_lateness_secs),
            run_at_start: config.run_at_start,
        }
    }
}

impl Default for DailySchedulerConfig {
    fn default() -> Self {
        Self::from_sync_config(&SyncConfig::default())
    }
}

/// What to do with a tick handled at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    Run,
    Skip { late_by: Duration },
}

/// Decide whether a tick scheduled for `scheduled` still runs at `now`.
#[must_use]
pub fn tick_decision(scheduled: Instant, now: Instant, max_lateness: Duration) -> TickDecision {
    let late_by = now.saturating_duration_since(scheduled);
    if late_by > max_lateness {
        TickDecision::Skip { late_by }
    } else {
        TickDecision::Run
    }
}

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Scheduler with explicit start/stop lifecycle
pub struct DailyScheduler {
    config: DailySchedulerConfig,
    job: Arc<dyn ScheduledJob>,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl DailyScheduler {
    pub fn new(config: DailySchedulerConfig, job: Arc<dyn ScheduledJob>) -> Self {
        Self {
            config,
            job,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduler
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        // Fresh token so a stopped scheduler can be restarted.
        self.cancellation_token = CancellationToken::new();

        let job = Arc::clone(&self.job);
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();
        let handle = tokio::spawn(async move {
            Self::schedule_loop(job, config, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);
        info!(
            interval_secs = self.config.interval.as_secs(),
            run_at_start = self.config.run_at_start,
            "Daily scheduler started"
        );
        Ok(())
    }

    /// Stop the scheduler, cancelling an in-flight run.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running or the task does not stop
    /// in time
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping daily scheduler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            tokio::time::timeout(STOP_TIMEOUT, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: STOP_TIMEOUT.as_secs() })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }

        info!("Daily scheduler stopped");
        Ok(())
    }

    /// Whether the background task is alive.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    async fn schedule_loop(
        job: Arc<dyn ScheduledJob>,
        config: DailySchedulerConfig,
        cancel: CancellationToken,
    ) {
        let mut next = Instant::now() + config.interval;
        if config.run_at_start {
            Self::run_job(job.as_ref(), &cancel).await;
        }

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Schedule loop cancelled");
                    break;
                }
                () = tokio::time::sleep_until(next) => {}
            }

            let scheduled = next;
            next += config.interval;

            match tick_decision(scheduled, Instant::now(), config.max_lateness) {
                TickDecision::Run => Self::run_job(job.as_ref(), &cancel).await,
                TickDecision::Skip { late_by } => {
                    warn!(late_by_secs = late_by.as_secs(), "Scheduled run is too late, skipping");
                }
            }
        }
    }

    async fn run_job(job: &dyn ScheduledJob, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }
        if let Err(err) = job.run(cancel).await {
            error!(error = %err.0, "Scheduled synchronization failed");
        }
    }
}
