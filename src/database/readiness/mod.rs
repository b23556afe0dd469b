//! Readiness probing: retry a cheap connectivity check under exponential
//! backoff until the server accepts connections or the time budget runs out.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use sqlx::Connection;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use tracing::{info, trace};

use crate::config::ReadinessConfig;
use crate::error::{DatabaseError, FixtureError};

/// Growth factor applied to the retry interval after each failed probe.
const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Randomization applied to each interval when jitter is enabled.
const JITTER_FACTOR: f64 = 0.5;

/// Boxed future type returned by [`ReadinessProbe::probe`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>>;

/// A single connectivity check against the database.
///
/// Failures are described as plain strings: they are only ever traced,
/// never inspected.
pub trait ReadinessProbe {
    /// Attempt one check.
    fn probe(&self) -> ProbeFuture<'_>;
}

/// Probe that opens a fresh MySQL connection and pings it.
#[derive(Debug, Clone)]
pub struct MySqlProbe {
    options: MySqlConnectOptions,
}

impl MySqlProbe {
    /// Create a probe connecting with `options`.
    #[must_use]
    pub const fn new(options: MySqlConnectOptions) -> Self {
        Self { options }
    }
}

impl ReadinessProbe for MySqlProbe {
    fn probe(&self) -> ProbeFuture<'_> {
        Box::pin(async move {
            let mut connection = MySqlConnection::connect_with(&self.options)
                .await
                .map_err(|error| error.to_string())?;
            connection.ping().await.map_err(|error| error.to_string())?;
            connection.close().await.map_err(|error| error.to_string())
        })
    }
}

/// Build the retry policy described by `config`.
#[must_use]
pub fn policy_from_config(config: &ReadinessConfig) -> ExponentialBackoff {
    let randomization = if config.jitter { JITTER_FACTOR } else { 0.0 };

    ExponentialBackoffBuilder::new()
        .with_initial_interval(config.initial_interval())
        .with_max_interval(config.max_interval())
        .with_multiplier(BACKOFF_MULTIPLIER)
        .with_randomization_factor(randomization)
        .with_max_elapsed_time(Some(config.max_elapsed()))
        .build()
}

/// Retry `probe` under `policy` until it succeeds.
///
/// Individual failures are discarded after being traced. The policy's
/// `max_elapsed_time` also bounds the wall-clock wait, so a probe that
/// hangs cannot stall the caller past the budget.
///
/// # Errors
///
/// Returns `DatabaseError::ReadinessTimeout` once the budget is exhausted.
pub async fn wait_ready<P: ReadinessProbe + Sync>(
    probe: &P,
    mut policy: ExponentialBackoff,
) -> Result<(), FixtureError> {
    let budget = policy.max_elapsed_time;
    policy.reset();

    let mut attempts: u32 = 0;
    let retrying = backoff::future::retry_notify(
        policy,
        || {
            attempts = attempts.saturating_add(1);
            async { probe.probe().await.map_err(backoff::Error::transient) }
        },
        |error: String, next: Duration| {
            trace!(%error, retry_in_ms = next.as_millis(), "database not ready");
        },
    );

    let outcome = match budget {
        Some(limit) => tokio::time::timeout(limit, retrying)
            .await
            .unwrap_or_else(|_| Err(String::from("probe did not complete"))),
        None => retrying.await,
    };

    match outcome {
        Ok(()) => {
            info!(attempts, "database ready");
            Ok(())
        }
        Err(error) => {
            trace!(%error, "final readiness probe failed");
            Err(FixtureError::from(DatabaseError::ReadinessTimeout {
                seconds: budget.map_or(0, |limit| limit.as_secs()),
            }))
        }
    }
}
