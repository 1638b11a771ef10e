//! Scheduler entry point for the maintenance jobs.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, header},
};
use secrecy::ExposeSecret;

use crate::error::{AppError, Result};
use crate::services::constant_time_compare;
use crate::services::jobs::{self, Job, JobContext, JobReport};
use crate::state::AppState;

/// Whether the `Authorization` header carries the cron bearer secret.
fn is_authorized(headers: &HeaderMap, secret: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| constant_time_compare(token, secret))
}

/// Run one job and return its report.
///
/// # Errors
///
/// Returns 401 without the cron secret, 404 for an unknown job, or the
/// database error that stopped the run.
#[tracing::instrument(skip(state, headers))]
pub async fn run(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<JobReport>> {
    if !is_authorized(&headers, state.config().cron_secret.expose_secret()) {
        tracing::warn!("Cron call without valid secret");
        return Err(AppError::Unauthorized("cron secret".to_string()));
    }

    let job: Job = name.parse()?;
    let report = jobs::run(
        job,
        JobContext {
            pool: state.pool(),
            stripe: state.stripe(),
            email: state.email(),
            config: state.config().jobs,
        },
    )
    .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(header::AUTHORIZATION, value);
        }
        headers
    }

    #[test]
    fn test_bearer_secret_required() {
        let secret = "k3J9xQ2mV8pL5nR7";
        assert!(is_authorized(&headers("Bearer k3J9xQ2mV8pL5nR7"), secret));
        assert!(!is_authorized(&headers("Bearer wrong"), secret));
        assert!(!is_authorized(&headers("k3J9xQ2mV8pL5nR7"), secret));
        assert!(!is_authorized(&HeaderMap::new(), secret));
    }
}
