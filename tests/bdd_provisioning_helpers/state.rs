//! Shared behavioural-test state for provisioning scenarios.

use mysql_fixture::engine::StopOutcome;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

/// Step result type for provisioning BDD tests.
pub(crate) type StepResult<T> = Result<T, String>;

/// How the mocked engine behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineBehaviour {
    /// Every call succeeds and MySQL is published on the given host port.
    Healthy(u16),
    /// Starting the container fails.
    StartFails,
    /// The container runs but publishes no host port.
    NoPublishedPort,
}

/// Categorised provisioning failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureKind {
    /// The database never answered the readiness probe.
    ReadinessTimeout,
    /// The engine refused to start the container.
    StartFailed,
    /// No host endpoint was published for MySQL.
    EndpointNotFound,
    /// Anything else.
    Other,
}

/// What a provisioning attempt produced.
#[derive(Debug, Clone)]
pub(crate) enum ProvisionOutcome {
    /// The instance was ready and then torn down.
    Provisioned {
        /// Connection URI including credentials.
        uri: String,
        /// Schema version after bootstrap.
        schema_version: i64,
        /// Error log bytes captured during teardown.
        log_bytes: Option<u64>,
        /// How the final stop concluded.
        stop_outcome: Option<StopOutcome>,
        /// Whether teardown finished without warnings.
        clean: bool,
    },
    /// Provisioning failed.
    Failed {
        /// The failure category.
        kind: FailureKind,
        /// Human-readable error message.
        message: String,
    },
}

/// Shared scenario state for provisioning behavioural tests.
#[derive(Default, ScenarioState)]
pub(crate) struct ProvisioningState {
    pub(crate) engine: Slot<EngineBehaviour>,
    pub(crate) stop_reports_gone: Slot<bool>,
    pub(crate) database_ready: Slot<bool>,
    pub(crate) outcome: Slot<ProvisionOutcome>,
    pub(crate) stop_calls: Slot<usize>,
    pub(crate) remove_calls: Slot<usize>,
}

/// Fixture providing fresh state for each provisioning scenario.
#[fixture]
pub(crate) fn provisioning_state() -> ProvisioningState {
    let state = ProvisioningState::default();
    state.engine.set(EngineBehaviour::Healthy(49153));
    state.stop_reports_gone.set(false);
    state.database_ready.set(true);
    state.stop_calls.set(0);
    state.remove_calls.set(0);
    state
}
