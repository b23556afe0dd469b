//! Configuration system for the fixture.
//!
//! Configuration structures are merged by the `ortho_config` crate with the
//! precedence: environment variables override configuration files, which
//! override defaults. Every field has a default, so most test suites need no
//! configuration at all.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///run/user/1000/podman/podman.sock"
//! image = "mysql:8.4"
//!
//! [database]
//! name = "defaultdb"
//! root_password = "secret"
//!
//! [readiness]
//! max_elapsed_secs = 120
//! initial_interval_ms = 500
//! max_interval_ms = 10000
//! jitter = true
//!
//! [teardown]
//! stop_timeout_secs = 5
//! capture_error_log = true
//! ```

mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use loader::{env_var_names, load_config, load_config_from_env};
pub use types::{DEFAULT_IMAGE, DatabaseConfig, FixtureConfig, ReadinessConfig, TeardownConfig};
