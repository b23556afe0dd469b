//! The provisioning flow and the guard that owns its result.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bollard::Docker;
use futures_util::FutureExt;
use sqlx::migrate::Migrator;
use tokio::io::AsyncWrite;
use tracing::{debug, error, info, warn};

use super::container::{MYSQL_PORT, MySqlTestContainer, mysql_container_spec};
use super::lifecycle::LifecycleState;
use super::teardown::{TeardownReport, teardown};
use crate::config::{FixtureConfig, TeardownConfig};
use crate::database::{
    Credentials, DatabaseBootstrapper, MIGRATOR, MySqlBootstrapper, SchemaState, connect_options,
    policy_from_config,
};
use crate::engine::{ContainerEngine, ContainerHandle, EngineConnector, SocketResolver};
use crate::error::FixtureError;

/// Produces an engine client for teardown from a dropped guard.
///
/// Drop-time teardown runs on its own thread and runtime, so a client that
/// can be rebuilt there is preferred over one shared with the test's
/// runtime.
type EngineFactory<C> = Arc<dyn Fn() -> Result<Arc<C>, FixtureError> + Send + Sync>;

/// Provisions one ephemeral MySQL instance.
///
/// ```rust,no_run
/// # async fn run() -> mysql_fixture::error::Result<()> {
/// use mysql_fixture::config::FixtureConfig;
/// use mysql_fixture::fixture::MySqlFixture;
///
/// let guard = MySqlFixture::new(FixtureConfig::default()).start().await?;
/// let uri = guard.container().connection_uri(true);
/// // ... run the test against `uri` ...
/// let report = guard.teardown().await;
/// assert!(report.is_clean());
/// # Ok(())
/// # }
/// ```
pub struct MySqlFixture {
    config: FixtureConfig,
    migrator: Option<&'static Migrator>,
    bootstrapper: Arc<dyn DatabaseBootstrapper>,
}

impl MySqlFixture {
    /// Create a fixture using the bundled migrations and a `sqlx`-backed
    /// bootstrapper.
    #[must_use]
    pub fn new(config: FixtureConfig) -> Self {
        Self {
            config,
            migrator: Some(&MIGRATOR),
            bootstrapper: Arc::new(MySqlBootstrapper),
        }
    }

    /// Bootstrap the schema with `migrator` instead of the bundled one.
    #[must_use]
    pub fn with_migrator(mut self, migrator: &'static Migrator) -> Self {
        self.migrator = Some(migrator);
        self
    }

    /// Skip schema bootstrap; the instance reports schema version `0`.
    #[must_use]
    pub fn without_migrations(mut self) -> Self {
        self.migrator = None;
        self
    }

    /// Replace the database-side steps.
    #[must_use]
    pub fn with_bootstrapper(mut self, bootstrapper: impl DatabaseBootstrapper + 'static) -> Self {
        self.bootstrapper = Arc::new(bootstrapper);
        self
    }

    /// Return the configuration.
    #[must_use]
    pub const fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Connect to the container engine and provision an instance.
    ///
    /// The socket comes from `engine_socket` in the held configuration, then
    /// the engine environment variables. `MYSQL_FIXTURE_*` variables are not
    /// read here; load the configuration with
    /// [`crate::config::load_config_from_env`] to honour them.
    ///
    /// # Errors
    ///
    /// Returns configuration errors, engine connection errors, and every
    /// error of [`Self::start_with`].
    pub async fn start(self) -> Result<MySqlFixtureGuard<Docker>, FixtureError> {
        self.config.validate()?;

        let socket = {
            let env = mockable::DefaultEnv::new();
            let resolver = SocketResolver::new(&env);
            EngineConnector::resolve_socket(self.config.engine_socket.as_deref(), &resolver)
        };
        let docker = EngineConnector::connect_and_verify_async(&socket).await?;
        info!(%socket, "connected to container engine");

        let reconnect: EngineFactory<Docker> =
            Arc::new(move || EngineConnector::connect(&socket).map(Arc::new));
        self.provision(Arc::new(docker), reconnect).await
    }

    /// Provision an instance through an existing engine client.
    ///
    /// Any container created along the way is torn down before an error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError` variants for image, create, start and
    /// endpoint failures, and `DatabaseError` variants for readiness and
    /// migration failures.
    pub async fn start_with<C>(self, client: Arc<C>) -> Result<MySqlFixtureGuard<C>, FixtureError>
    where
        C: ContainerEngine + Send + Sync + 'static,
    {
        self.config.validate()?;

        let shared = Arc::clone(&client);
        let reuse: EngineFactory<C> = Arc::new(move || Ok(Arc::clone(&shared)));
        self.provision(client, reuse).await
    }

    async fn provision<C>(
        self,
        client: Arc<C>,
        fallback_engine: EngineFactory<C>,
    ) -> Result<MySqlFixtureGuard<C>, FixtureError>
    where
        C: ContainerEngine + Send + Sync + 'static,
    {
        let spec = mysql_container_spec(&self.config)?;
        EngineConnector::ensure_image_async(client.as_ref(), spec.image()).await?;
        let handle = EngineConnector::create_container_async(client.as_ref(), &spec).await?;
        let mut state = LifecycleState::Created;

        match self.bring_up(client.as_ref(), &handle, &mut state).await {
            Ok(container) => {
                state.advance(LifecycleState::InUse);
                info!(
                    container = %handle.name(),
                    endpoint = %container.endpoint(),
                    schema_version = container.schema_version(),
                    "fixture ready"
                );
                Ok(MySqlFixtureGuard {
                    client,
                    fallback_engine,
                    handle,
                    container,
                    teardown_config: self.config.teardown,
                    state,
                })
            }
            Err(provision_error) => {
                error!(
                    container = %handle.name(),
                    %state,
                    error = %provision_error,
                    "provisioning failed, tearing down"
                );
                let mut sink = tokio::io::stderr();
                let report =
                    teardown(client.as_ref(), &handle, state, &self.config.teardown, &mut sink)
                        .await;
                debug!(clean = report.is_clean(), "teardown after failed provisioning");
                Err(provision_error)
            }
        }
    }

    async fn bring_up<C: ContainerEngine>(
        &self,
        client: &C,
        handle: &ContainerHandle,
        state: &mut LifecycleState,
    ) -> Result<MySqlTestContainer, FixtureError> {
        EngineConnector::start_container_async(client, handle).await?;
        state.advance(LifecycleState::Started);

        let endpoint = EngineConnector::resolve_endpoint_async(client, handle, MYSQL_PORT).await?;
        state.advance(LifecycleState::EndpointResolved);

        let database = &self.config.database;
        let credentials = Credentials::root(database.root_password.clone());
        let options = connect_options(&endpoint, &credentials, &database.name);

        self.bootstrapper
            .wait_ready(options.clone(), policy_from_config(&self.config.readiness))
            .await?;

        let schema = match self.migrator {
            Some(migrator) => self.bootstrapper.migrate(options, migrator).await?,
            None => SchemaState::UNINITIALIZED,
        };
        state.advance(LifecycleState::Ready);

        Ok(MySqlTestContainer::new(
            endpoint,
            credentials,
            database.name.clone(),
            schema,
        ))
    }
}

/// Exclusive owner of a provisioned instance.
///
/// Call [`Self::teardown`] when the test is done. A guard dropped without
/// it (including while unwinding from a panic) tears the container down on
/// a dedicated thread, with diagnostics written to stderr.
pub struct MySqlFixtureGuard<C = Docker>
where
    C: ContainerEngine + Send + Sync + 'static,
{
    client: Arc<C>,
    fallback_engine: EngineFactory<C>,
    handle: ContainerHandle,
    container: MySqlTestContainer,
    teardown_config: TeardownConfig,
    state: LifecycleState,
}

impl<C> MySqlFixtureGuard<C>
where
    C: ContainerEngine + Send + Sync + 'static,
{
    /// Return the ready instance.
    #[must_use]
    pub const fn container(&self) -> &MySqlTestContainer {
        &self.container
    }

    /// Return the underlying container handle.
    #[must_use]
    pub const fn handle(&self) -> &ContainerHandle {
        &self.handle
    }

    /// Return the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Tear the instance down, writing diagnostics to stderr.
    pub async fn teardown(self) -> TeardownReport {
        let mut sink = tokio::io::stderr();
        self.teardown_into(&mut sink).await
    }

    /// Tear the instance down, writing diagnostics to `sink`.
    pub async fn teardown_into<W>(mut self, sink: &mut W) -> TeardownReport
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let report = teardown(
            self.client.as_ref(),
            &self.handle,
            self.state,
            &self.teardown_config,
            sink,
        )
        .await;
        self.state.advance(LifecycleState::TornDown);
        report
    }
}

impl<C> Drop for MySqlFixtureGuard<C>
where
    C: ContainerEngine + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.state == LifecycleState::TornDown {
            return;
        }

        warn!(container = %self.handle.name(), "fixture dropped without teardown");
        let engine = Arc::clone(&self.fallback_engine);
        let handle = self.handle.clone();
        let state = self.state;
        let config = self.teardown_config.clone();

        let worker = std::thread::spawn(move || {
            teardown_on_dedicated_runtime(&engine, &handle, state, &config);
        });
        if worker.join().is_err() {
            warn!(container = %self.handle.name(), "teardown thread panicked");
        }
        self.state.advance(LifecycleState::TornDown);
    }
}

fn teardown_on_dedicated_runtime<C>(
    engine: &EngineFactory<C>,
    handle: &ContainerHandle,
    state: LifecycleState,
    config: &TeardownConfig,
) where
    C: ContainerEngine + Send + Sync + 'static,
{
    let runtime = match EngineConnector::create_runtime() {
        Ok(runtime) => runtime,
        Err(runtime_error) => {
            warn!(
                container = %handle.name(),
                error = %runtime_error,
                "cannot tear down dropped fixture"
            );
            return;
        }
    };

    runtime.block_on(async {
        let client = match engine() {
            Ok(client) => client,
            Err(connect_error) => {
                warn!(
                    container = %handle.name(),
                    error = %connect_error,
                    "cannot reach engine for teardown"
                );
                return;
            }
        };
        let mut sink = tokio::io::stderr();
        let report = teardown(client.as_ref(), handle, state, config, &mut sink).await;
        debug!(clean = report.is_clean(), "dropped fixture torn down");
    });
}

/// Provision an instance, run `body` against it, then tear it down.
///
/// Teardown also runs when `body` panics; the panic is then resumed.
///
/// # Errors
///
/// Returns any provisioning error from [`MySqlFixture::start`]. Errors
/// produced by `body` are part of `T`.
pub async fn with_mysql_fixture<F, Fut, T>(
    config: FixtureConfig,
    body: F,
) -> Result<T, FixtureError>
where
    F: FnOnce(MySqlTestContainer) -> Fut,
    Fut: Future<Output = T>,
{
    let guard = MySqlFixture::new(config).start().await?;
    Ok(run_then_teardown(guard, body).await)
}

pub(crate) async fn run_then_teardown<C, F, Fut, T>(guard: MySqlFixtureGuard<C>, body: F) -> T
where
    C: ContainerEngine + Send + Sync + 'static,
    F: FnOnce(MySqlTestContainer) -> Fut,
    Fut: Future<Output = T>,
{
    let container = guard.container().clone();
    let outcome = AssertUnwindSafe(async move { body(container).await })
        .catch_unwind()
        .await;

    let report = guard.teardown().await;
    debug!(clean = report.is_clean(), "scoped fixture torn down");

    match outcome {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
