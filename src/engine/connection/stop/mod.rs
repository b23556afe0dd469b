//! Container stop and removal for teardown.
//!
//! Provisioned containers are auto-removed by the engine once stopped, so a
//! "no such container" response means the work is already done. A container
//! that was created but never started is not auto-removed and has to be
//! removed explicitly.

use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::errors::Error as BollardError;
use bollard::query_parameters::{
    RemoveContainerOptions, RemoveContainerOptionsBuilder, StopContainerOptions,
    StopContainerOptionsBuilder,
};
use tracing::{debug, info};

use super::error_classification::is_not_found;
use super::{ContainerHandle, EngineConnector};
use crate::error::TeardownWarning;

/// Boxed future type returned by [`ContainerStopper::stop_container`].
pub type StopContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), BollardError>> + Send + 'a>>;

/// Behaviour required to stop containers.
pub trait ContainerStopper {
    /// Stop a container, waiting up to the grace period in `options`.
    fn stop_container(
        &self,
        container_id: &str,
        options: Option<StopContainerOptions>,
    ) -> StopContainerFuture<'_>;
}

impl ContainerStopper for Docker {
    fn stop_container(
        &self,
        container_id: &str,
        options: Option<StopContainerOptions>,
    ) -> StopContainerFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::stop_container(self, &container_id_owned, options).await })
    }
}

/// Boxed future type returned by [`ContainerRemover::remove_container`].
pub type RemoveContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), BollardError>> + Send + 'a>>;

/// Behaviour required to remove containers.
pub trait ContainerRemover {
    /// Remove a container.
    fn remove_container(
        &self,
        container_id: &str,
        options: Option<RemoveContainerOptions>,
    ) -> RemoveContainerFuture<'_>;
}

impl ContainerRemover for Docker {
    fn remove_container(
        &self,
        container_id: &str,
        options: Option<RemoveContainerOptions>,
    ) -> RemoveContainerFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::remove_container(self, &container_id_owned, options).await })
    }
}

/// How a stop or remove request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The engine stopped the container.
    Stopped,
    /// The engine removed the container.
    Removed,
    /// The container no longer existed.
    AlreadyGone,
}

impl EngineConnector {
    /// Stop a container, allowing `timeout_secs` for a graceful shutdown.
    ///
    /// # Errors
    ///
    /// Returns `TeardownWarning::StopFailed` for any engine failure other
    /// than "no such container".
    pub async fn stop_container_async<C: ContainerStopper>(
        stopper: &C,
        handle: &ContainerHandle,
        timeout_secs: u64,
    ) -> Result<StopOutcome, TeardownWarning> {
        let grace = i32::try_from(timeout_secs).unwrap_or(i32::MAX);
        let options = StopContainerOptionsBuilder::new().t(grace).build();

        match stopper.stop_container(handle.id(), Some(options)).await {
            Ok(()) => {
                info!(container = %handle.name(), "container stopped");
                Ok(StopOutcome::Stopped)
            }
            Err(error) if is_not_found(&error) => {
                debug!(container = %handle.name(), "container already gone");
                Ok(StopOutcome::AlreadyGone)
            }
            Err(error) => Err(TeardownWarning::StopFailed {
                container_id: String::from(handle.id()),
                message: error.to_string(),
            }),
        }
    }

    /// Force-remove a container that was never started.
    ///
    /// # Errors
    ///
    /// Returns `TeardownWarning::StopFailed` for any engine failure other
    /// than "no such container".
    pub async fn remove_container_async<C: ContainerRemover>(
        remover: &C,
        handle: &ContainerHandle,
    ) -> Result<StopOutcome, TeardownWarning> {
        let options = RemoveContainerOptionsBuilder::new().force(true).v(true).build();

        match remover.remove_container(handle.id(), Some(options)).await {
            Ok(()) => {
                info!(container = %handle.name(), "container removed");
                Ok(StopOutcome::Removed)
            }
            Err(error) if is_not_found(&error) => {
                debug!(container = %handle.name(), "container already gone");
                Ok(StopOutcome::AlreadyGone)
            }
            Err(error) => Err(TeardownWarning::StopFailed {
                container_id: String::from(handle.id()),
                message: error.to_string(),
            }),
        }
    }
}
