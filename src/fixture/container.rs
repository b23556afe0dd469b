//! The handle a test receives for a ready database, and the container spec
//! that produces it.

use sqlx::mysql::MySqlConnectOptions;

use crate::config::FixtureConfig;
use crate::database::{Credentials, SchemaState, connect_options};
use crate::engine::{ConnectionEndpoint, ContainerSpec};
use crate::error::FixtureError;

/// Port the server listens on inside the container.
pub const MYSQL_PORT: &str = "3306/tcp";

/// Path of the server error log inside the container.
pub const ERROR_LOG_PATH: &str = "/var/lib/mysql/error.log";

/// Data directory, mounted in memory.
const DATA_DIR: &str = "/var/lib/mysql";

/// Prefix of generated container names.
const NAME_PREFIX: &str = "mysql";

/// Build the container spec for a MySQL instance described by `config`.
///
/// # Errors
///
/// Returns `ConfigError::MissingRequired` if the configured image is blank.
pub fn mysql_container_spec(config: &FixtureConfig) -> Result<ContainerSpec, FixtureError> {
    Ok(ContainerSpec::new(config.image(), NAME_PREFIX)?
        .with_env("MYSQL_DATABASE", &config.database.name)
        .with_env("MYSQL_ROOT_PASSWORD", &config.database.root_password)
        .with_exposed_port(MYSQL_PORT)
        .with_cmd(vec![
            format!("--log-error={ERROR_LOG_PATH}"),
            String::from("--log-error-verbosity=3"),
        ])
        .with_tmpfs(DATA_DIR))
}

/// A running, reachable and bootstrapped MySQL instance.
///
/// Read-only: every value is fixed when provisioning completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlTestContainer {
    endpoint: ConnectionEndpoint,
    credentials: Credentials,
    database: String,
    schema: SchemaState,
}

impl MySqlTestContainer {
    pub(crate) fn new(
        endpoint: ConnectionEndpoint,
        credentials: Credentials,
        database: impl Into<String>,
        schema: SchemaState,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            database: database.into(),
            schema,
        }
    }

    /// Return a `mysql://` URI for the database, optionally embedding the
    /// percent-encoded credentials.
    #[must_use]
    pub fn connection_uri(&self, include_credentials: bool) -> String {
        let userinfo = if include_credentials {
            format!(
                "{}:{}@",
                urlencoding::encode(self.credentials.username()),
                urlencoding::encode(self.credentials.password())
            )
        } else {
            String::new()
        };

        format!("mysql://{userinfo}{}/{}", self.endpoint, self.database)
    }

    /// Return `sqlx` connect options for the database.
    #[must_use]
    pub fn connect_options(&self) -> MySqlConnectOptions {
        connect_options(&self.endpoint, &self.credentials, &self.database)
    }

    /// Return the username.
    #[must_use]
    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    /// Return the password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.credentials.password()
    }

    /// Return the database name.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Return the published endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &ConnectionEndpoint {
        &self.endpoint
    }

    /// Return the schema version reached by bootstrap, `0` if none ran.
    #[must_use]
    pub const fn schema_version(&self) -> i64 {
        self.schema.version()
    }
}
