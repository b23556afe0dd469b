//! Container engine connection and management.
//!
//! The engine socket is resolved through a priority-based fallback chain:
//!
//! 1. `FixtureConfig::engine_socket`
//! 2. `DOCKER_HOST` environment variable
//! 3. `CONTAINER_HOST` environment variable
//! 4. `PODMAN_HOST` environment variable
//! 5. Platform default (`/var/run/docker.sock` on Unix)
//!
//! `MYSQL_FIXTURE_ENGINE_SOCKET` and the `engine_socket` TOML key only take
//! part when the configuration is built with [`crate::config::load_config`]
//! or [`crate::config::load_config_from_env`], which fold them into step 1.
//!
//! Every operation is an associated function on [`EngineConnector`] that
//! takes the engine client as an argument, so the provisioning flow can be
//! driven against `bollard::Docker` or a test double.

mod connection;

pub use connection::{
    ConnectionEndpoint, ContainerCreator, ContainerEngine, ContainerExecClient, ContainerHandle,
    ContainerInspector, ContainerRemover, ContainerSpec, ContainerStopper, CreateContainerFuture,
    CreateExecFuture, CreateImageStream, EngineConnector, ImageClient, InspectContainerFuture,
    ListImagesFuture, RemoveContainerFuture, SocketResolver, StartContainerFuture,
    StartExecFuture, StopContainerFuture, StopOutcome, generate_container_name,
};
