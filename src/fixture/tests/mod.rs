//! Unit tests for the provisioning flow and teardown, driven by a mocked
//! container engine and a scripted database bootstrapper.


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
use rstest::fixture;
use sqlx::migrate::Migrator;
use sqlx::mysql::MySqlConnectOptions;

use crate::database::{BootstrapFuture, DatabaseBootstrapper, SchemaState};
use crate::engine::{
    ContainerCreator, ContainerExecClient, ContainerInspector, ContainerRemover, ContainerStopper,
    CreateContainerFuture, CreateExecFuture, CreateImageStream, ImageClient,
    InspectContainerFuture, ListImagesFuture, RemoveContainerFuture, StartContainerFuture,
    StartExecFuture, StopContainerFuture,
};
use crate::error::{DatabaseError, FixtureError};

pub(super) const ERROR_LOG: &str = "[Note] [MY-010931] ready for connections\n";

mock! {
    pub Engine {}

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

pub(super) fn engine_error(status_code: u16) -> BollardError {
    BollardError::DockerResponseServerError {
        status_code,
        message: String::from("scripted engine failure"),
    }
}

#[fixture]
pub(super) fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("runtime should be created")
}

pub(super) fn expect_cached_image(engine: &mut MockEngine) {
    engine.expect_list_images().times(1).returning(|_| {
        Box::pin(async {
            Ok(vec![ImageSummary {
                repo_tags: vec![String::from("mysql:8")],
                ..ImageSummary::default()
            }])
        })
    });
    engine.expect_create_image().never();
}

pub(super) fn expect_create(engine: &mut MockEngine, container_id: &'static str) {
    engine
        .expect_create_container()
        .times(1)
        .returning(move |_, _| {
            Box::pin(async move {
                Ok(ContainerCreateResponse {
                    id: String::from(container_id),
                    warnings: vec![],
                })
            })
        });
}

pub(super) fn expect_start(engine: &mut MockEngine, failure: Option<u16>) {
    engine.expect_start_container().times(1).returning(move |_| {
        Box::pin(async move { failure.map_or(Ok(()), |code| Err(engine_error(code))) })
    });
}

pub(super) fn expect_inspect(engine: &mut MockEngine, host_port: Option<&'static str>) {
    engine
        .expect_inspect_container()
        .times(1)
        .returning(move |_| {
            let bindings = host_port.map(|port| {
                vec![PortBinding {
                    host_ip: Some(String::from("0.0.0.0")),
                    host_port: Some(String::from(port)),
                }]
            });
            let mut ports = HashMap::new();
            ports.insert(String::from("3306/tcp"), bindings);
            let response = ContainerInspectResponse {
                state: Some(ContainerState {
                    running: Some(true),
                    ..ContainerState::default()
                }),
                network_settings: Some(NetworkSettings {
                    ports: Some(ports),
                    ..NetworkSettings::default()
                }),
                ..ContainerInspectResponse::default()
            };
            Box::pin(async move { Ok(response) })
        });
}

pub(super) fn expect_log_capture(engine: &mut MockEngine) {
    engine
        .expect_create_exec()
        .times(1)
        .returning(|_, _| {
            Box::pin(async {
                Ok(CreateExecResults {
                    id: String::from("exec-log"),
                })
            })
        });
    engine.expect_start_exec().times(1).returning(|_, _| {
        Box::pin(async {
            Ok(StartExecResults::Attached {
                output: Box::pin(stream::iter(vec![Ok(LogOutput::StdOut {
                    message: ERROR_LOG.into(),
                })])),
                input: Box::pin(tokio::io::sink()),
            })
        })
    });
}

pub(super) fn expect_stop(engine: &mut MockEngine, failure: Option<u16>) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_mock = Arc::clone(&calls);
    engine
        .expect_stop_container()
        .times(1)
        .returning(move |_, _| {
            calls_for_mock.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { failure.map_or(Ok(()), |code| Err(engine_error(code))) })
        });
    engine.expect_remove_container().never();
    calls
}

/// An engine that provisions successfully and expects a full teardown.
pub(super) fn healthy_engine(
    container_id: &'static str,
    host_port: &'static str,
) -> (MockEngine, Arc<AtomicUsize>) {
    let mut engine = MockEngine::new();
    expect_cached_image(&mut engine);
    expect_create(&mut engine, container_id);
    expect_start(&mut engine, None);
    expect_inspect(&mut engine, Some(host_port));
    expect_log_capture(&mut engine);
    let stops = expect_stop(&mut engine, None);
    (engine, stops)
}

/// Scripted stand-in for the database-side steps.
pub(super) struct FakeBootstrapper {
    ready: bool,
    migration: Result<i64, &'static str>,
    migrations: Arc<AtomicUsize>,
}

impl FakeBootstrapper {
    pub(super) fn migrating_to(version: i64) -> Self {
        Self {
            ready: true,
            migration: Ok(version),
            migrations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(super) fn never_ready() -> Self {
        Self {
            ready: false,
            ..Self::migrating_to(1)
        }
    }

    pub(super) fn failing_migration(message: &'static str) -> Self {
        Self {
            migration: Err(message),
            ..Self::migrating_to(1)
        }
    }

    pub(super) fn migration_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.migrations)
    }
}

impl DatabaseBootstrapper for FakeBootstrapper {
    fn wait_ready(
        &self,
        _options: MySqlConnectOptions,
        policy: ExponentialBackoff,
    ) -> BootstrapFuture<'_, ()> {
        let ready = self.ready;
        let budget = policy.max_elapsed_time.map_or(0, |limit| limit.as_secs());
        Box::pin(async move {
            if ready {
                Ok(())
            } else {
                Err(FixtureError::from(DatabaseError::ReadinessTimeout { seconds: budget }))
            }
        })
    }

    fn migrate(
        &self,
        _options: MySqlConnectOptions,
        _migrator: &'static Migrator,
    ) -> BootstrapFuture<'_, SchemaState> {
        self.migrations.fetch_add(1, Ordering::SeqCst);
        let migration = self.migration;
        Box::pin(async move {
            migration.map(SchemaState::new).map_err(|message| {
                FixtureError::from(DatabaseError::MigrationFailed {
                    message: String::from(message),
                })
            })
        })
    }
}
