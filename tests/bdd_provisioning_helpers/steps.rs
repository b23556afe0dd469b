//! Given/when step definitions for provisioning scenarios.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use backoff::ExponentialBackoff;
use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, CreateExecResults, StartExecOptions, StartExecResults};
use bollard::models::{
    ContainerCreateBody, ContainerCreateResponse, ContainerInspectResponse, ContainerState,
    ImageSummary, NetworkSettings, PortBinding,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, ListImagesOptions, RemoveContainerOptions,
    StopContainerOptions,
};
use futures_util::stream;
use mockall::mock;
use mysql_fixture::config::FixtureConfig;
use mysql_fixture::database::{BootstrapFuture, DatabaseBootstrapper, SchemaState};
use mysql_fixture::engine::{
    ContainerCreator, ContainerExecClient, ContainerInspector, ContainerRemover, ContainerStopper,
    CreateContainerFuture, CreateExecFuture, CreateImageStream, ImageClient,
    InspectContainerFuture, ListImagesFuture, RemoveContainerFuture, StartContainerFuture,
    StartExecFuture, StopContainerFuture,
};
use mysql_fixture::error::{ContainerError, DatabaseError, FixtureError};
use mysql_fixture::fixture::MySqlFixture;
use rstest_bdd_macros::{given, when};
use sqlx::migrate::Migrator;
use sqlx::mysql::MySqlConnectOptions;

use super::state::{
    EngineBehaviour, FailureKind, ProvisionOutcome, ProvisioningState, StepResult,
};

/// Version reported by the scripted bootstrapper.
const BOOTSTRAPPED_VERSION: i64 = 20_240_101_000_002;

mock! {
    Engine {}

    impl ImageClient for Engine {
        fn list_images<'a>(&'a self, options: Option<ListImagesOptions>) -> ListImagesFuture<'a>;
        fn create_image<'a>(&'a self, options: Option<CreateImageOptions>) -> CreateImageStream<'a>;
    }

    impl ContainerCreator for Engine {
        fn create_container<'a>(
            &'a self,
            options: Option<CreateContainerOptions>,
            config: ContainerCreateBody,
        ) -> CreateContainerFuture<'a>;
        fn start_container<'a>(&'a self, container_id: &str) -> StartContainerFuture<'a>;
    }

    impl ContainerInspector for Engine {
        fn inspect_container<'a>(&'a self, container_id: &str) -> InspectContainerFuture<'a>;
    }

    impl ContainerExecClient for Engine {
        fn create_exec<'a>(
            &'a self,
            container_id: &str,
            options: CreateExecOptions<String>,
        ) -> CreateExecFuture<'a>;
        fn start_exec<'a>(
            &'a self,
            exec_id: &str,
            options: Option<StartExecOptions>,
        ) -> StartExecFuture<'a>;
    }

    impl ContainerStopper for Engine {
        fn stop_container<'a>(
            &'a self,
            container_id: &str,
            options: Option<StopContainerOptions>,
        ) -> StopContainerFuture<'a>;
    }

    impl ContainerRemover for Engine {
        fn remove_container<'a>(
            &'a self,
            container_id: &str,
            options: Option<RemoveContainerOptions>,
        ) -> RemoveContainerFuture<'a>;
    }
}

/// Counts the teardown calls observed by the mocked engine.
#[derive(Default)]
struct TeardownCalls {
    stops: Arc<AtomicUsize>,
    removes: Arc<AtomicUsize>,
}

struct ScriptedBootstrapper {
    ready: bool,
}

impl DatabaseBootstrapper for ScriptedBootstrapper {
    fn wait_ready(
        &self,
        _options: MySqlConnectOptions,
        _policy: ExponentialBackoff,
    ) -> BootstrapFuture<'_, ()> {
        let ready = self.ready;
        Box::pin(async move {
            if ready {
                Ok(())
            } else {
                Err(DatabaseError::ReadinessTimeout { seconds: 120 }.into())
            }
        })
    }

    fn migrate(
        &self,
        _options: MySqlConnectOptions,
        _migrator: &'static Migrator,
    ) -> BootstrapFuture<'_, SchemaState> {
        Box::pin(async { Ok(SchemaState::new(BOOTSTRAPPED_VERSION)) })
    }
}

#[given("a container engine publishing MySQL on host port {port}")]
fn engine_publishing_port(provisioning_state: &ProvisioningState, port: u16) {
    provisioning_state.engine.set(EngineBehaviour::Healthy(port));
}

#[given("a container engine that cannot start containers")]
fn engine_that_cannot_start(provisioning_state: &ProvisioningState) {
    provisioning_state.engine.set(EngineBehaviour::StartFails);
}

#[given("a container engine that publishes no host port")]
fn engine_without_published_port(provisioning_state: &ProvisioningState) {
    provisioning_state
        .engine
        .set(EngineBehaviour::NoPublishedPort);
}

#[given("the container disappears before teardown")]
fn container_disappears(provisioning_state: &ProvisioningState) {
    provisioning_state.stop_reports_gone.set(true);
}

#[given("a database that becomes ready")]
fn database_becomes_ready(provisioning_state: &ProvisioningState) {
    provisioning_state.database_ready.set(true);
}

#[given("a database that never becomes ready")]
fn database_never_ready(provisioning_state: &ProvisioningState) {
    provisioning_state.database_ready.set(false);
}

#[when("a fixture is provisioned and torn down")]
fn fixture_provisioned_and_torn_down(provisioning_state: &ProvisioningState) -> StepResult<()> {
    let behaviour = provisioning_state
        .engine
        .get()
        .ok_or_else(|| String::from("engine behaviour should be configured"))?;
    let stop_reports_gone = provisioning_state.stop_reports_gone.get().unwrap_or(false);
    let ready = provisioning_state.database_ready.get().unwrap_or(true);

    let calls = TeardownCalls::default();
    let engine = scripted_engine(behaviour, stop_reports_gone, &calls);
    let fixture = MySqlFixture::new(FixtureConfig::default())
        .with_bootstrapper(ScriptedBootstrapper { ready });

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("failed to create runtime: {e}"))?;
    let outcome = runtime.block_on(async {
        match fixture.start_with(Arc::new(engine)).await {
            Ok(guard) => {
                let uri = guard.container().connection_uri(true);
                let schema_version = guard.container().schema_version();
                let mut diagnostics = Vec::new();
                let report = guard.teardown_into(&mut diagnostics).await;
                ProvisionOutcome::Provisioned {
                    uri,
                    schema_version,
                    log_bytes: report.log_bytes(),
                    stop_outcome: report.outcome(),
                    clean: report.is_clean(),
                }
            }
            Err(error) => ProvisionOutcome::Failed {
                kind: classify(&error),
                message: error.to_string(),
            },
        }
    });

    provisioning_state.outcome.set(outcome);
    provisioning_state
        .stop_calls
        .set(calls.stops.load(Ordering::SeqCst));
    provisioning_state
        .remove_calls
        .set(calls.removes.load(Ordering::SeqCst));
    Ok(())
}

const fn classify(error: &FixtureError) -> FailureKind {
    match error {
        FixtureError::Database(DatabaseError::ReadinessTimeout { .. }) => {
            FailureKind::ReadinessTimeout
        }
        FixtureError::Container(ContainerError::StartFailed { .. }) => FailureKind::StartFailed,
        FixtureError::Container(ContainerError::EndpointNotFound { .. }) => {
            FailureKind::EndpointNotFound
        }
        _ => FailureKind::Other,
    }
}

fn engine_error(status_code: u16) -> BollardError {
    BollardError::DockerResponseServerError {
        status_code,
        message: String::from("scripted engine failure"),
    }
}

fn scripted_engine(
    behaviour: EngineBehaviour,
    stop_reports_gone: bool,
    calls: &TeardownCalls,
) -> MockEngine {
    let mut engine = MockEngine::new();

    engine.expect_list_images().returning(|_| {
        Box::pin(async {
            Ok(vec![ImageSummary {
                repo_tags: vec![String::from("mysql:8")],
                ..ImageSummary::default()
            }])
        })
    });
    engine.expect_create_container().returning(|_, _| {
        Box::pin(async {
            Ok(ContainerCreateResponse {
                id: String::from("bdd-mysql"),
                warnings: vec![],
            })
        })
    });

    let start_fails = behaviour == EngineBehaviour::StartFails;
    engine.expect_start_container().returning(move |_| {
        Box::pin(async move {
            if start_fails {
                Err(engine_error(500))
            } else {
                Ok(())
            }
        })
    });

    let host_port = match behaviour {
        EngineBehaviour::Healthy(port) => Some(port.to_string()),
        EngineBehaviour::StartFails | EngineBehaviour::NoPublishedPort => None,
    };
    engine
        .expect_inspect_container()
        .returning(move |_| {
            let response = inspect_response(host_port.clone());
            Box::pin(async move { Ok(response) })
        });

    engine.expect_create_exec().returning(|_, _| {
        Box::pin(async {
            Ok(CreateExecResults {
                id: String::from("bdd-exec"),
            })
        })
    });
    engine.expect_start_exec().returning(|_, _| {
        Box::pin(async {
            Ok(StartExecResults::Attached {
                output: Box::pin(stream::iter(vec![Ok(LogOutput::StdErr {
                    message: "[Note] ready for connections\n".into(),
                })])),
                input: Box::pin(tokio::io::sink()),
            })
        })
    });

    let stops = Arc::clone(&calls.stops);
    engine.expect_stop_container().returning(move |_, _| {
        stops.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if stop_reports_gone {
                Err(engine_error(404))
            } else {
                Ok(())
            }
        })
    });

    let removes = Arc::clone(&calls.removes);
    engine.expect_remove_container().returning(move |_, _| {
        removes.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    });

    engine
}

fn inspect_response(host_port: Option<String>) -> ContainerInspectResponse {
    let bindings = host_port.map(|port| {
        vec![PortBinding {
            host_ip: Some(String::from("0.0.0.0")),
            host_port: Some(port),
        }]
    });
    let ports = HashMap::from([(String::from("3306/tcp"), bindings)]);

    ContainerInspectResponse {
        state: Some(ContainerState {
            running: Some(true),
            ..ContainerState::default()
        }),
        network_settings: Some(NetworkSettings {
            ports: Some(ports),
            ..NetworkSettings::default()
        }),
        ..ContainerInspectResponse::default()
    }
}
