//! Ephemeral MySQL instances for integration tests.
//!
//! [`MySqlFixture`] drives the whole flow: resolve the image, create and
//! start a container, resolve its published endpoint, wait for the server
//! under exponential backoff, bootstrap the schema, and hand back a
//! [`MySqlFixtureGuard`]. The guard owns the container exclusively and
//! guarantees teardown, either explicitly, through
//! [`with_mysql_fixture`], or on drop.
//!
//! Every instance gets a unique container name and a dynamically published
//! host port, so independent tests can provision concurrently.

mod container;
mod lifecycle;
mod orchestrator;
mod teardown;

pub use container::{ERROR_LOG_PATH, MYSQL_PORT, MySqlTestContainer, mysql_container_spec};
pub use lifecycle::LifecycleState;
pub use orchestrator::{MySqlFixture, MySqlFixtureGuard, with_mysql_fixture};
pub use teardown::{TeardownReport, teardown};

#[cfg(test)]
mod tests;
