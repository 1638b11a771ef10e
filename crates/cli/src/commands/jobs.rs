//! Maintenance jobs from a shell.
//!
//! Runs the same code as `POST /api/cron/{job}` on the storefront, with the
//! same batch sizes and deadline, and prints the report as JSON.
//!
//! # Usage
//!
//! ```bash
//! synclune-cli jobs list
//! synclune-cli jobs run release-stale-orders
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string
//! - `STRIPE_SECRET_KEY` - Needed to expire abandoned checkout sessions
//! - `SMTP_*` - Optional, for account deletion notices
//! - `WEBHOOK_RETENTION_DAYS`, `ACCOUNT_DELETION_GRACE_DAYS`, `JOB_DEADLINE_SECONDS`

use synclune_storefront::config::{ConfigError, EmailConfig, JobsConfig, StripeConfig, get_database_url};
use synclune_storefront::db::create_pool;
use synclune_storefront::services::email::EmailService;
use synclune_storefront::services::jobs::{self, Job, JobContext, JobError, JobReport};
use synclune_storefront::services::stripe::StripeClient;
use thiserror::Error;

/// Errors that can occur while running a job.
#[derive(Debug, Error)]
pub enum JobCommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Could not encode report: {0}")]
    Report(#[from] serde_json::Error),
}

/// Names accepted by `jobs run`.
#[must_use]
pub fn names() -> Vec<&'static str> {
    Job::ALL.iter().map(|job| job.as_str()).collect()
}

/// Run one job and return its report as pretty JSON.
///
/// # Errors
///
/// Returns `JobError::UnknownJob` for an unknown name, or the first error a
/// batch hits.
pub async fn run(name: &str) -> Result<String, JobCommandError> {
    dotenvy::dotenv().ok();

    let job: Job = name.parse()?;

    let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
    let stripe_config = StripeConfig::from_env(false)?;
    let email_config = EmailConfig::from_env()?;
    let config = JobsConfig::from_env()?;

    let pool = create_pool(&database_url).await?;
    let stripe = StripeClient::new(&stripe_config);
    let email = EmailService::new(email_config.as_ref())?;
    if !email.is_enabled() {
        tracing::warn!("SMTP not configured, job emails disabled");
    }

    tracing::info!(%job, "Running job");
    let report: JobReport = jobs::run(
        job,
        JobContext {
            pool: &pool,
            stripe: &stripe,
            email: &email,
            config,
        },
    )
    .await?;

    if report.timed_out {
        tracing::warn!(processed = report.processed, "Job stopped at its deadline");
    }
    Ok(serde_json::to_string_pretty(&report)?)
}
