//! Database-side steps of the fixture: waiting for the server to accept
//! connections and bootstrapping its schema.
//!
//! Both steps talk to MySQL through `sqlx`. Statement logging is switched
//! off on each connection's options rather than through any process-wide
//! logger, so the fixture never changes logging for the rest of the test
//! binary.

mod bootstrap;
mod migrations;
mod readiness;

use sqlx::ConnectOptions;
use sqlx::mysql::MySqlConnectOptions;

use crate::engine::ConnectionEndpoint;

pub use bootstrap::{BootstrapFuture, DatabaseBootstrapper, MySqlBootstrapper};
pub use migrations::{MIGRATOR, SchemaState, apply_migrations};
pub use readiness::{MySqlProbe, ProbeFuture, ReadinessProbe, policy_from_config, wait_ready};

/// Account the fixture connects as.
pub const ROOT_USERNAME: &str = "root";

/// Username and password for one database instance.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Credentials for the root account.
    #[must_use]
    pub fn root(password: impl Into<String>) -> Self {
        Self {
            username: String::from(ROOT_USERNAME),
            password: password.into(),
        }
    }

    /// Return the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Return the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Build `sqlx` connect options for a database at `endpoint`.
#[must_use]
pub fn connect_options(
    endpoint: &ConnectionEndpoint,
    credentials: &Credentials,
    database: &str,
) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(endpoint.host())
        .port(endpoint.port())
        .username(credentials.username())
        .password(credentials.password())
        .database(database)
        .disable_statement_logging()
}
