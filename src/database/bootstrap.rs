//! Seam over the database-side steps of provisioning.

use std::future::Future;
use std::pin::Pin;

use backoff::ExponentialBackoff;
use sqlx::migrate::Migrator;
use sqlx::mysql::MySqlConnectOptions;

use super::{MySqlProbe, SchemaState, apply_migrations, wait_ready};
use crate::error::FixtureError;

/// Boxed future type returned by [`DatabaseBootstrapper`] methods.
pub type BootstrapFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, FixtureError>> + Send + 'a>>;

/// Behaviour required to bring a freshly started database online.
pub trait DatabaseBootstrapper: Send + Sync {
    /// Wait until the database accepts connections.
    fn wait_ready(
        &self,
        options: MySqlConnectOptions,
        policy: ExponentialBackoff,
    ) -> BootstrapFuture<'_, ()>;

    /// Apply `migrator` and report the resulting schema state.
    fn migrate(
        &self,
        options: MySqlConnectOptions,
        migrator: &'static Migrator,
    ) -> BootstrapFuture<'_, SchemaState>;
}

/// Bootstrapper talking to a real MySQL server through `sqlx`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlBootstrapper;

impl DatabaseBootstrapper for MySqlBootstrapper {
    fn wait_ready(
        &self,
        options: MySqlConnectOptions,
        policy: ExponentialBackoff,
    ) -> BootstrapFuture<'_, ()> {
        Box::pin(async move { wait_ready(&MySqlProbe::new(options), policy).await })
    }

    fn migrate(
        &self,
        options: MySqlConnectOptions,
        migrator: &'static Migrator,
    ) -> BootstrapFuture<'_, SchemaState> {
        Box::pin(async move { apply_migrations(&options, migrator).await })
    }
}
