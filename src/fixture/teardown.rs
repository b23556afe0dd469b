//! Diagnostics capture and teardown of a provisioned container.
//!
//! Teardown never fails: every problem becomes a [`TeardownWarning`],
//! logged and collected in the returned [`TeardownReport`], so cleanup can
//! not mask the result of the test that owned the container.

use tokio::io::AsyncWrite;
use tracing::{info, warn};

use super::container::ERROR_LOG_PATH;
use super::lifecycle::LifecycleState;
use crate::config::TeardownConfig;
use crate::engine::{
    ContainerExecClient, ContainerHandle, ContainerRemover, ContainerStopper, EngineConnector,
    StopOutcome,
};
use crate::error::TeardownWarning;

/// What happened while tearing an instance down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    log_bytes: Option<u64>,
    outcome: Option<StopOutcome>,
    warnings: Vec<TeardownWarning>,
}

impl TeardownReport {
    /// Bytes of error log copied to the diagnostic sink, if capture ran and
    /// succeeded.
    #[must_use]
    pub const fn log_bytes(&self) -> Option<u64> {
        self.log_bytes
    }

    /// How the final stop or remove concluded, if it succeeded.
    #[must_use]
    pub const fn outcome(&self) -> Option<StopOutcome> {
        self.outcome
    }

    /// Problems observed along the way.
    #[must_use]
    pub fn warnings(&self) -> &[TeardownWarning] {
        &self.warnings
    }

    /// Whether teardown finished without warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn record(&mut self, warning: TeardownWarning) {
        warn!(%warning, "teardown warning");
        self.warnings.push(warning);
    }
}

/// Tear down the container behind `handle`.
///
/// For a started container, the error log is first copied to `sink` (when
/// enabled in `config`), then the container is stopped with the configured
/// grace period; the engine removes it once stopped. A container that never
/// started is force-removed instead. "No such container" counts as
/// success.
pub async fn teardown<C, W>(
    client: &C,
    handle: &ContainerHandle,
    state: LifecycleState,
    config: &TeardownConfig,
    sink: &mut W,
) -> TeardownReport
where
    C: ContainerExecClient + ContainerStopper + ContainerRemover,
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let mut report = TeardownReport::default();

    if !state.was_started() {
        match EngineConnector::remove_container_async(client, handle).await {
            Ok(outcome) => report.outcome = Some(outcome),
            Err(warning) => report.record(warning),
        }
        return report;
    }

    if config.capture_error_log {
        let command = [String::from("cat"), String::from(ERROR_LOG_PATH)];
        match EngineConnector::capture_exec_output_async(client, handle.id(), &command, sink).await
        {
            Ok(bytes) => report.log_bytes = Some(bytes),
            Err(error) => report.record(TeardownWarning::LogCaptureFailed {
                container_id: String::from(handle.id()),
                message: error.to_string(),
            }),
        }
    }

    info!(container = %handle.name(), "stopping container");
    match EngineConnector::stop_container_async(client, handle, config.stop_timeout_secs).await {
        Ok(outcome) => report.outcome = Some(outcome),
        Err(warning) => report.record(warning),
    }

    report
}
