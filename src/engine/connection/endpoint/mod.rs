//! Endpoint resolution: discover the host address at which a running
//! container's internal port is published.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerInspectResponse, PortBinding};
use bollard::query_parameters::InspectContainerOptions;
use tracing::info;

use super::{ContainerHandle, EngineConnector};
use crate::error::{ContainerError, FixtureError};

/// Host used when the engine publishes on a wildcard address.
const LOCAL_HOST: &str = "localhost";

/// Boxed future type returned by [`ContainerInspector::inspect_container`].
pub type InspectContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ContainerInspectResponse, BollardError>> + Send + 'a>>;

/// Behaviour required to inspect a container's state and network settings.
pub trait ContainerInspector {
    /// Inspect a container.
    fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_>;
}

impl ContainerInspector for Docker {
    fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::inspect_container(self, &container_id_owned, None::<InspectContainerOptions>)
                .await
        })
    }
}

/// Host and published port at which a database accepts connections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionEndpoint {
    host: String,
    port: u16,
}

impl ConnectionEndpoint {
    pub(crate) fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Return the host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Return the published host port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

/// Formats as `host:port`, bracketing IPv6 literals (`[::1]:3307`) so the
/// result can be embedded in a URI authority.
impl fmt::Display for ConnectionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl EngineConnector {
    /// Resolve the host endpoint for `internal_port` (e.g. `3306/tcp`).
    ///
    /// The container must report running and have a published mapping for
    /// the port. Missing mappings are not retried: they indicate a broken
    /// engine environment rather than one that needs more time.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::InspectFailed` if inspection fails and
    /// `ContainerError::EndpointNotFound` if no usable mapping exists.
    pub async fn resolve_endpoint_async<C: ContainerInspector>(
        inspector: &C,
        handle: &ContainerHandle,
        internal_port: &str,
    ) -> Result<ConnectionEndpoint, FixtureError> {
        let response = inspector
            .inspect_container(handle.id())
            .await
            .map_err(|error| {
                FixtureError::from(ContainerError::InspectFailed {
                    container_id: String::from(handle.id()),
                    message: error.to_string(),
                })
            })?;

        let endpoint = endpoint_from_inspect(&response, internal_port).ok_or_else(|| {
            FixtureError::from(ContainerError::EndpointNotFound {
                container_id: String::from(handle.id()),
                port: String::from(internal_port),
            })
        })?;

        info!(container = %handle.name(), %endpoint, "endpoint resolved");
        Ok(endpoint)
    }
}

fn endpoint_from_inspect(
    response: &ContainerInspectResponse,
    internal_port: &str,
) -> Option<ConnectionEndpoint> {
    let running = response
        .state
        .as_ref()
        .and_then(|state| state.running)
        .unwrap_or(false);
    if !running {
        return None;
    }

    response
        .network_settings
        .as_ref()?
        .ports
        .as_ref()?
        .get(internal_port)?
        .as_ref()?
        .iter()
        .find_map(endpoint_from_binding)
}

fn endpoint_from_binding(binding: &PortBinding) -> Option<ConnectionEndpoint> {
    let port = binding.host_port.as_deref()?.parse::<u16>().ok()?;
    let host = match binding.host_ip.as_deref() {
        None | Some("" | "0.0.0.0" | "::") => LOCAL_HOST,
        Some(ip) => ip,
    };
    Some(ConnectionEndpoint::new(host, port))
}
