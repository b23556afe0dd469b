//! Container provisioning: declarative specs, unique naming, create and
//! start.
//!
//! Creation and starting are separate steps so the caller can take
//! ownership of a created container (and arrange its cleanup) before start
//! is attempted. Neither step is retried: a failure signals environment
//! misconfiguration, not transience.

use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, ContainerCreateResponse, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, CreateContainerOptionsBuilder, StartContainerOptions,
};
use tracing::info;
use uuid::Uuid;

use super::EngineConnector;
use crate::error::{ConfigError, ContainerError, FixtureError};

/// Boxed future type returned by [`ContainerCreator::create_container`].
pub type CreateContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ContainerCreateResponse, BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerCreator::start_container`].
pub type StartContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), BollardError>> + Send + 'a>>;

/// Behaviour required to create and start containers.
pub trait ContainerCreator {
    /// Create a container from `Bollard` options and body payload.
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> CreateContainerFuture<'_>;

    /// Start a previously created container.
    fn start_container(&self, container_id: &str) -> StartContainerFuture<'_>;
}

impl ContainerCreator for Docker {
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> CreateContainerFuture<'_> {
        Box::pin(async move { Self::create_container(self, options, config).await })
    }

    fn start_container(&self, container_id: &str) -> StartContainerFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::start_container(self, &container_id_owned, None::<StartContainerOptions>).await
        })
    }
}

/// Declarative description of a container to provision.
///
/// Immutable once built; the builder methods consume and return `self`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    image: String,
    name_prefix: String,
    env: Vec<String>,
    exposed_ports: Vec<String>,
    cmd: Vec<String>,
    tmpfs: Vec<String>,
}

impl ContainerSpec {
    /// Create a spec for `image` whose container names start with
    /// `name_prefix`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `image` or `name_prefix`
    /// is empty or whitespace-only.
    pub fn new(image: &str, name_prefix: &str) -> Result<Self, FixtureError> {
        Ok(Self {
            image: String::from(validate_required("image", image)?),
            name_prefix: String::from(validate_required("name_prefix", name_prefix)?),
            env: Vec::new(),
            exposed_ports: Vec::new(),
            cmd: Vec::new(),
            tmpfs: Vec::new(),
        })
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{key}={value}"));
        self
    }

    /// Expose a port in `port/protocol` form, e.g. `3306/tcp`.
    #[must_use]
    pub fn with_exposed_port(mut self, port: &str) -> Self {
        self.exposed_ports.push(String::from(port));
        self
    }

    /// Set the startup command arguments.
    #[must_use]
    pub fn with_cmd(mut self, cmd: Vec<String>) -> Self {
        self.cmd = cmd;
        self
    }

    /// Mount a memory-backed filesystem at `path`.
    #[must_use]
    pub fn with_tmpfs(mut self, path: &str) -> Self {
        self.tmpfs.push(String::from(path));
        self
    }

    /// Return the image reference.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Return the container name prefix.
    #[must_use]
    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Return environment entries in `KEY=value` form.
    #[must_use]
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Return exposed ports.
    #[must_use]
    pub fn exposed_ports(&self) -> &[String] {
        &self.exposed_ports
    }

    /// Return the startup command.
    #[must_use]
    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    /// Return tmpfs mount paths.
    #[must_use]
    pub fn tmpfs(&self) -> &[String] {
        &self.tmpfs
    }
}

/// A created container, identified by its engine ID and generated name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    id: String,
    name: String,
}

impl ContainerHandle {
    /// Build a handle for an existing container.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Return the engine-assigned container ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Return the generated container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Generate a unique, time-sortable container name: `<prefix>-<uuid v7>`.
#[must_use]
pub fn generate_container_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7())
}

impl EngineConnector {
    /// Create a container from `spec` under a freshly generated name.
    ///
    /// The container is configured to be removed by the engine once it
    /// stops, to publish every exposed port on an arbitrary free host port,
    /// and to mount each tmpfs path in memory.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::CreateFailed` when the engine rejects the
    /// create request.
    pub async fn create_container_async<C: ContainerCreator>(
        creator: &C,
        spec: &ContainerSpec,
    ) -> Result<ContainerHandle, FixtureError> {
        let name = generate_container_name(spec.name_prefix());
        let options = CreateContainerOptionsBuilder::new().name(&name).build();

        let response = creator
            .create_container(Some(options), build_create_body(spec))
            .await
            .map_err(|error| {
                FixtureError::from(ContainerError::CreateFailed {
                    name: name.clone(),
                    message: error.to_string(),
                })
            })?;

        info!(container = %name, id = %response.id, "container created");
        Ok(ContainerHandle::new(response.id, name))
    }

    /// Start a created container.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::StartFailed` when the engine refuses to
    /// start the container.
    pub async fn start_container_async<C: ContainerCreator>(
        creator: &C,
        handle: &ContainerHandle,
    ) -> Result<(), FixtureError> {
        creator
            .start_container(handle.id())
            .await
            .map_err(|error| {
                FixtureError::from(ContainerError::StartFailed {
                    container_id: String::from(handle.id()),
                    message: error.to_string(),
                })
            })?;

        info!(container = %handle.name(), "container started");
        Ok(())
    }
}

fn validate_required<'a>(field: &str, value: &'a str) -> Result<&'a str, FixtureError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(FixtureError::from(ConfigError::MissingRequired {
            field: String::from(field),
        }));
    }

    Ok(trimmed)
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

fn build_create_body(spec: &ContainerSpec) -> ContainerCreateBody {
    ContainerCreateBody {
        image: Some(String::from(spec.image())),
        env: non_empty(spec.env()),
        cmd: non_empty(spec.cmd()),
        exposed_ports: non_empty(spec.exposed_ports()),
        host_config: Some(build_host_config(spec)),
        ..ContainerCreateBody::default()
    }
}

fn build_host_config(spec: &ContainerSpec) -> HostConfig {
    let tmpfs = (!spec.tmpfs().is_empty()).then(|| {
        spec.tmpfs()
            .iter()
            .map(|path| (path.clone(), String::new()))
            .collect()
    });

    HostConfig {
        auto_remove: Some(true),
        publish_all_ports: Some(true),
        tmpfs,
        ..HostConfig::default()
    }
}
