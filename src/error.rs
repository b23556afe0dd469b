//! Semantic error types for the fixture.
//!
//! Conditions a caller might inspect are modelled as `thiserror` enums and
//! aggregated into [`FixtureError`]. Every provisioning error is fatal: the
//! flow aborts and the calling test fails. Teardown problems are never
//! errors; they surface as [`TeardownWarning`] values instead.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found at the expected path.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path where the configuration file was expected.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error while merging layers.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors that can occur while driving the container engine.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Failed to connect to the container engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// Health check failed - engine did not respond correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// Listing or pulling the image failed.
    #[error("failed to pull image '{image}': {message}")]
    ImagePullFailed {
        /// The image reference that could not be made available.
        image: String,
        /// A description of the pull failure.
        message: String,
    },

    /// Failed to create a container.
    #[error("failed to create container '{name}': {message}")]
    CreateFailed {
        /// The generated name of the container.
        name: String,
        /// A description of the creation failure.
        message: String,
    },

    /// Failed to start a container.
    #[error("failed to start container '{container_id}': {message}")]
    StartFailed {
        /// The ID of the container that failed to start.
        container_id: String,
        /// A description of the start failure.
        message: String,
    },

    /// Failed to inspect a container.
    #[error("failed to inspect container '{container_id}': {message}")]
    InspectFailed {
        /// The ID of the inspected container.
        container_id: String,
        /// A description of the inspect failure.
        message: String,
    },

    /// The container has no published host mapping for the expected port.
    #[error("no published host port for {port} on container '{container_id}'")]
    EndpointNotFound {
        /// The ID of the inspected container.
        container_id: String,
        /// The internal port, in `port/protocol` form.
        port: String,
    },

    /// Failed to execute a command in a container.
    #[error("failed to execute command in container '{container_id}': {message}")]
    ExecFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the execution failure.
        message: String,
    },

    /// A dedicated runtime for blocking teardown could not be created.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the runtime failure.
        message: String,
    },
}

/// Errors raised while bringing the database inside the container online.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The database never accepted connections within the time budget.
    #[error("database did not become ready within {seconds} seconds")]
    ReadinessTimeout {
        /// The elapsed-time budget in seconds.
        seconds: u64,
    },

    /// Applying migrations or reading the schema version failed.
    #[error("failed to apply schema migrations: {message}")]
    MigrationFailed {
        /// A description of the migration failure.
        message: String,
    },
}

/// Non-fatal problems observed during teardown.
///
/// These are logged and reported, never propagated, so cleanup cannot mask
/// the outcome of the test that owned the container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TeardownWarning {
    /// The engine error log could not be captured.
    #[error("failed to capture error log from '{container_id}': {message}")]
    LogCaptureFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the capture failure.
        message: String,
    },

    /// The stop request failed for a reason other than "not found".
    #[error("failed to stop container '{container_id}': {message}")]
    StopFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the stop failure.
        message: String,
    },
}

/// Top-level error type for the fixture.
///
/// At a test boundary these errors are typically converted into
/// `eyre::Report` for human-readable output.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred during container operations.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// An error occurred while preparing the database.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A specialised `Result` type for fixture operations.
pub type Result<T> = std::result::Result<T, FixtureError>;
