//! Health check and connect-and-verify functionality.

use std::time::Duration;

use bollard::Docker;

use super::{EngineConnector, HEALTH_CHECK_TIMEOUT_SECS};
use crate::error::{ContainerError, FixtureError};

impl EngineConnector {
    /// Verify the container engine is responsive.
    ///
    /// Sends a ping request and waits for a response, confirming the engine
    /// is operational rather than merely that the socket is reachable.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::HealthCheckFailed` if the engine does not
    /// respond correctly.
    ///
    /// Returns `ContainerError::HealthCheckTimeout` if the check times out.
    pub async fn health_check_async(docker: &Docker) -> Result<(), FixtureError> {
        let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

        tokio::time::timeout(timeout, docker.ping())
            .await
            .map_err(|_| {
                FixtureError::from(ContainerError::HealthCheckTimeout {
                    seconds: HEALTH_CHECK_TIMEOUT_SECS,
                })
            })?
            .map_err(|e| {
                FixtureError::from(ContainerError::HealthCheckFailed {
                    message: e.to_string(),
                })
            })?;
        Ok(())
    }

    /// Connect to `socket` and verify the engine responds.
    ///
    /// # Errors
    ///
    /// Returns connection errors from [`Self::connect`] and health check
    /// errors from [`Self::health_check_async`].
    pub async fn connect_and_verify_async(socket: &str) -> Result<Docker, FixtureError> {
        let docker = Self::connect(socket)?;
        Self::health_check_async(&docker).await?;
        Ok(docker)
    }

    /// Create a dedicated Tokio runtime for blocking operations.
    ///
    /// Used where no async context is available, such as guard drop.
    pub(crate) fn create_runtime() -> Result<tokio::runtime::Runtime, FixtureError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                FixtureError::from(ContainerError::RuntimeCreationFailed {
                    message: e.to_string(),
                })
            })
    }
}
