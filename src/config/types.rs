//! Configuration data types for the fixture.

use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::error::{ConfigError, Result};

/// Image used when no image is configured.
pub const DEFAULT_IMAGE: &str = "mysql:8";

/// Database created inside the container and its root credentials.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Name of the database created at container start (`MYSQL_DATABASE`).
    #[default(String::from("defaultdb"))]
    pub name: String,

    /// Password for the `root` account (`MYSQL_ROOT_PASSWORD`).
    #[default(String::from("secret"))]
    pub root_password: String,
}

/// Retry policy for the database readiness probe.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Total time budget for the probe, in seconds.
    #[default(120)]
    pub max_elapsed_secs: u64,

    /// Delay before the second attempt, in milliseconds.
    #[default(500)]
    pub initial_interval_ms: u64,

    /// Upper bound for a single delay, in milliseconds.
    #[default(10_000)]
    pub max_interval_ms: u64,

    /// Randomise delays so concurrently starting fixtures do not retry in
    /// lockstep.
    #[default(true)]
    pub jitter: bool,
}

impl ReadinessConfig {
    /// Returns the total time budget.
    #[must_use]
    pub const fn max_elapsed(&self) -> Duration {
        Duration::from_secs(self.max_elapsed_secs)
    }

    /// Returns the initial delay between attempts.
    #[must_use]
    pub const fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    /// Returns the maximum delay between attempts.
    #[must_use]
    pub const fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }
}

/// Teardown behaviour.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct TeardownConfig {
    /// Seconds the engine waits for a graceful stop.
    #[default(5)]
    pub stop_timeout_secs: u64,

    /// Copy the MySQL error log to the diagnostic stream before stopping.
    #[default(true)]
    pub capture_error_log: bool,
}

/// Root fixture configuration.
///
/// Loaded with layered precedence (lowest to highest): defaults,
/// configuration file, environment variables.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `MYSQL_FIXTURE_CONFIG_PATH`
/// 2. `.mysql-fixture.toml` in the current working directory
/// 3. `.mysql-fixture.toml` in the home directory
/// 4. `~/.config/mysql-fixture/config.toml` (XDG default)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "MYSQL_FIXTURE",
    post_merge_hook,
    discovery(
        app_name = "mysql-fixture",
        env_var = "MYSQL_FIXTURE_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".mysql-fixture.toml",
        config_cli_long = "config",
        config_cli_visible = false,
    )
)]
pub struct FixtureConfig {
    /// The container engine socket path or URL.
    pub engine_socket: Option<String>,

    /// The MySQL image to run. Defaults to [`DEFAULT_IMAGE`].
    pub image: Option<String>,

    /// Database name and credentials.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub database: DatabaseConfig,

    /// Readiness probe policy.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub readiness: ReadinessConfig,

    /// Teardown behaviour.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub teardown: TeardownConfig,
}

impl FixtureConfig {
    /// Returns the configured image, or [`DEFAULT_IMAGE`] when unset.
    #[must_use]
    pub fn image(&self) -> &str {
        self.image.as_deref().unwrap_or(DEFAULT_IMAGE)
    }

    /// Validates values the fixture cannot run without.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an empty image or database
    /// name, a zero readiness budget or interval, or an initial interval
    /// larger than the maximum interval.
    pub fn validate(&self) -> Result<()> {
        if self.image().trim().is_empty() {
            return Err(invalid("image", "cannot be empty"));
        }
        if self.database.name.trim().is_empty() {
            return Err(invalid("database.name", "cannot be empty"));
        }
        if self.readiness.max_elapsed_secs == 0 {
            return Err(invalid(
                "readiness.max_elapsed_secs",
                "must be greater than zero",
            ));
        }
        if self.readiness.initial_interval_ms == 0 {
            return Err(invalid(
                "readiness.initial_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.readiness.initial_interval_ms > self.readiness.max_interval_ms {
            return Err(invalid(
                "readiness.initial_interval_ms",
                "must not exceed readiness.max_interval_ms",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> crate::error::FixtureError {
    ConfigError::InvalidValue {
        field: String::from(field),
        reason: String::from(reason),
    }
    .into()
}

impl PostMergeHook for FixtureConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        // Blank values from files or the environment mean "use the default".
        self.image = self
            .image
            .take()
            .map(|image| image.trim().to_owned())
            .filter(|image| !image.is_empty());
        self.engine_socket = self
            .engine_socket
            .take()
            .filter(|socket| !socket.trim().is_empty());
        Ok(())
    }
}
