//! Maintenance jobs run by cron (`POST /api/cron/{job}`) or the CLI.
//!
//! A job works through fixed-size batches until a batch comes back short or
//! the wall-clock deadline passes, so one run stays inside the platform's
//! request timeout. Work left over is picked up by the next run.

mod anonymization;
mod cleanup;
mod stale_orders;

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::JobsConfig;
use crate::db::RepositoryError;
use crate::services::email::EmailService;
use crate::services::stripe::StripeClient;

/// Errors that stop a job run.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for JobError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// The maintenance jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    CleanupWebhookEvents,
    ProcessAccountDeletions,
    CleanupExpiredCarts,
    ReleaseStaleOrders,
}

impl Job {
    pub const ALL: [Self; 4] = [
        Self::CleanupWebhookEvents,
        Self::ProcessAccountDeletions,
        Self::CleanupExpiredCarts,
        Self::ReleaseStaleOrders,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CleanupWebhookEvents => "cleanup-webhook-events",
            Self::ProcessAccountDeletions => "process-account-deletions",
            Self::CleanupExpiredCarts => "cleanup-expired-carts",
            Self::ReleaseStaleOrders => "release-stale-orders",
        }
    }

    /// Rows handled per batch.
    #[must_use]
    pub const fn batch_size(self) -> i64 {
        match self {
            Self::CleanupWebhookEvents | Self::CleanupExpiredCarts => 500,
            Self::ProcessAccountDeletions => 25,
            Self::ReleaseStaleOrders => 50,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Job {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|job| job.as_str() == s)
            .ok_or_else(|| JobError::UnknownJob(s.to_string()))
    }
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub job: &'static str,
    pub processed: u64,
    pub batches: u32,
    pub timed_out: bool,
    pub duration_ms: u64,
}

/// Rows seen and rows handled by one batch.
///
/// A batch that fetched fewer rows than the batch size was the last one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Batch {
    pub fetched: u64,
    pub processed: u64,
}

impl Batch {
    /// A batch where every fetched row was handled.
    #[must_use]
    pub const fn all(count: u64) -> Self {
        Self {
            fetched: count,
            processed: count,
        }
    }
}

/// Progress of one run: counts batches and decides when to stop.
///
/// A run stops after a short batch or once the deadline has passed.
#[derive(Debug)]
pub struct BatchLoop {
    started: Instant,
    deadline: Duration,
    full: u64,
    done: bool,
    report: JobReport,
}

impl BatchLoop {
    #[must_use]
    pub fn new(job: Job, deadline: Duration) -> Self {
        Self {
            started: Instant::now(),
            deadline,
            full: u64::try_from(job.batch_size()).unwrap_or(0),
            done: false,
            report: JobReport {
                job: job.as_str(),
                processed: 0,
                batches: 0,
                timed_out: false,
                duration_ms: 0,
            },
        }
    }

    /// Whether another batch should run.
    pub fn proceed(&mut self) -> bool {
        if self.done {
            return false;
        }
        if self.started.elapsed() >= self.deadline {
            self.report.timed_out = true;
            self.done = true;
            return false;
        }
        true
    }

    /// Count a finished batch.
    pub fn record(&mut self, batch: Batch) {
        self.report.batches += 1;
        self.report.processed += batch.processed;
        if batch.fetched < self.full {
            self.done = true;
        }
    }

    #[must_use]
    pub fn finish(mut self) -> JobReport {
        self.report.duration_ms =
            u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.report
    }
}

/// What a job run needs.
#[derive(Clone, Copy)]
pub struct JobContext<'a> {
    pub pool: &'a PgPool,
    pub stripe: &'a StripeClient,
    pub email: &'a EmailService,
    pub config: JobsConfig,
}

/// Run one job to completion or deadline.
///
/// # Errors
///
/// Returns `JobError` if a batch fails.
#[instrument(skip_all, fields(job = %job))]
pub async fn run(job: Job, ctx: JobContext<'_>) -> Result<JobReport, JobError> {
    let batch_size = job.batch_size();

    let mut progress = BatchLoop::new(job, ctx.config.deadline);

    match job {
        Job::CleanupWebhookEvents => {
            let cutoff = cleanup::retention_cutoff(ctx.config.webhook_retention_days);
            while progress.proceed() {
                let batch = cleanup::delete_webhook_events(ctx.pool, cutoff, batch_size).await?;
                progress.record(batch);
            }
        }
        Job::CleanupExpiredCarts => {
            while progress.proceed() {
                progress.record(cleanup::delete_expired_carts(ctx.pool, batch_size).await?);
            }
        }
        Job::ProcessAccountDeletions => {
            let cutoff = cleanup::retention_cutoff(ctx.config.account_deletion_grace_days);
            let mut failed = Vec::new();
            while progress.proceed() {
                let batch = anonymization::process_batch(
                    ctx.pool, ctx.email, cutoff, batch_size, &mut failed,
                )
                .await?;
                progress.record(batch);
            }
        }
        Job::ReleaseStaleOrders => {
            let cutoff = stale_orders::cutoff();
            while progress.proceed() {
                let batch =
                    stale_orders::release_batch(ctx.pool, ctx.stripe, cutoff, batch_size).await?;
                progress.record(batch);
            }
        }
    }

    let report = progress.finish();
    info!(
        processed = report.processed,
        batches = report.batches,
        timed_out = report.timed_out,
        duration_ms = report.duration_ms,
        "Job finished"
    );
    Ok(report)
}
