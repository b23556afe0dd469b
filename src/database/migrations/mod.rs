//! Schema bootstrap: apply an embedded migration bundle and record the
//! resulting version.

use sqlx::migrate::Migrator;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use tracing::info;

use crate::error::{DatabaseError, FixtureError};

/// Migrations bundled with the crate, embedded at compile time from
/// `migrations/`.
///
/// Used when no other migrator is supplied to the fixture.
pub static MIGRATOR: Migrator = sqlx::migrate!();

const SCHEMA_VERSION_QUERY: &str =
    "SELECT COALESCE(MAX(version), 0) FROM _sqlx_migrations WHERE success = TRUE";

/// The schema version reached by a bootstrap.
///
/// `0` means no migration has been applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaState {
    version: i64,
}

impl SchemaState {
    /// State of a database that was never bootstrapped.
    pub const UNINITIALIZED: Self = Self { version: 0 };

    /// State at `version`.
    #[must_use]
    pub const fn new(version: i64) -> Self {
        Self { version }
    }

    /// Return the highest applied migration version.
    #[must_use]
    pub const fn version(self) -> i64 {
        self.version
    }

    /// Whether at least one migration has been applied.
    #[must_use]
    pub const fn is_bootstrapped(self) -> bool {
        self.version > 0
    }
}

/// Apply every pending migration in `migrator`, in ascending version order,
/// and read back the highest applied version.
///
/// A single connection is used, so migrations never race each other.
///
/// # Errors
///
/// Returns `DatabaseError::MigrationFailed` if connecting, migrating or
/// reading the version fails.
pub async fn apply_migrations(
    options: &MySqlConnectOptions,
    migrator: &Migrator,
) -> Result<SchemaState, FixtureError> {
    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .connect_with(options.clone())
        .await
        .map_err(|error| migration_failed(format!("connect failed: {error}")))?;

    let outcome = run_and_read_version(&pool, migrator).await;
    pool.close().await;

    let state = outcome?;
    info!(version = state.version(), "schema migrated");
    Ok(state)
}

async fn run_and_read_version(
    pool: &sqlx::MySqlPool,
    migrator: &Migrator,
) -> Result<SchemaState, FixtureError> {
    migrator
        .run(pool)
        .await
        .map_err(|error| migration_failed(error.to_string()))?;

    let version: i64 = sqlx::query_scalar(SCHEMA_VERSION_QUERY)
        .fetch_one(pool)
        .await
        .map_err(|error| migration_failed(format!("reading schema version failed: {error}")))?;

    Ok(SchemaState::new(version))
}

fn migration_failed(message: impl Into<String>) -> FixtureError {
    FixtureError::from(DatabaseError::MigrationFailed {
        message: message.into(),
    })
}
