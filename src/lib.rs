//! Ephemeral, isolated MySQL instances for integration tests.
//!
//! `mysql-fixture` provisions a throwaway MySQL server in a container, waits
//! until it accepts connections, applies a schema migration bundle, and hands
//! the test a connection endpoint and credentials. When the test is done the
//! server's error log is copied to a diagnostic stream and the container is
//! stopped and removed.
//!
//! # Flow
//!
//! 1. Make sure the image is available locally, pulling it if needed.
//! 2. Create and start a uniquely named container whose MySQL port is
//!    published on a free host port.
//! 3. Resolve the published endpoint.
//! 4. Probe the server under exponential backoff until it answers or the
//!    time budget runs out.
//! 5. Apply migrations and record the schema version.
//! 6. Hand over a guard that tears everything down exactly once.
//!
//! Any failure after the container exists tears it down before the error is
//! returned.
//!
//! ```rust,no_run
//! # async fn run() -> mysql_fixture::error::Result<()> {
//! use mysql_fixture::config::FixtureConfig;
//!
//! let rows = mysql_fixture::with_mysql_fixture(FixtureConfig::default(), |db| async move {
//!     // Connect with any MySQL client using `db.connection_uri(true)`.
//!     db.schema_version()
//! })
//! .await?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Layered configuration (defaults, file, environment)
//! - [`database`]: Readiness probing and schema bootstrap
//! - [`engine`]: Container engine connection and container operations
//! - [`error`]: Semantic error types
//! - [`fixture`]: The provisioning flow and its guard

pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod fixture;

pub use config::FixtureConfig;
pub use error::{FixtureError, Result};
pub use fixture::{
    LifecycleState, MySqlFixture, MySqlFixtureGuard, MySqlTestContainer, TeardownReport,
    with_mysql_fixture,
};
