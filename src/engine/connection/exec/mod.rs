//! Run a command inside a container and copy its output to a sink.
//!
//! Teardown uses this to dump the database error log before the container
//! is stopped and removed.

use std::future::Future;
use std::pin::Pin;

use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, CreateExecResults, StartExecOptions, StartExecResults};
use bollard::{Docker, errors::Error as BollardError};
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::EngineConnector;
use crate::error::{ContainerError, FixtureError};

/// Boxed future type returned by [`ContainerExecClient::create_exec`].
pub type CreateExecFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CreateExecResults, BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerExecClient::start_exec`].
pub type StartExecFuture<'a> =
    Pin<Box<dyn Future<Output = Result<StartExecResults, BollardError>> + Send + 'a>>;

/// Behaviour required to run exec sessions.
pub trait ContainerExecClient {
    /// Create an exec session in a running container.
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_>;

    /// Start a previously created exec session.
    fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_>;
}

impl ContainerExecClient for Docker {
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::create_exec(self, &container_id_owned, options).await })
    }

    fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::start_exec(self, &exec_id_owned, options).await })
    }
}

impl EngineConnector {
    /// Run `command` in a container and write everything it prints to
    /// `sink`, returning the number of bytes copied.
    ///
    /// Standard output and standard error are interleaved in arrival order.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ExecFailed` when the session cannot be
    /// created or started, the output stream fails, or the sink rejects a
    /// write.
    pub async fn capture_exec_output_async<C, W>(
        client: &C,
        container_id: &str,
        command: &[String],
        sink: &mut W,
    ) -> Result<u64, FixtureError>
    where
        C: ContainerExecClient,
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let create_result = client
            .create_exec(container_id, build_create_exec_options(command))
            .await
            .map_err(|error| exec_failed(container_id, format!("create exec failed: {error}")))?;

        let start_options = StartExecOptions {
            detach: false,
            tty: false,
            output_capacity: None,
        };
        let start_result = client
            .start_exec(&create_result.id, Some(start_options))
            .await
            .map_err(|error| exec_failed(container_id, format!("start exec failed: {error}")))?;

        let StartExecResults::Attached { mut output, input } = start_result else {
            return Err(exec_failed(
                container_id,
                "daemon returned detached start result for an output capture",
            ));
        };
        drop(input);

        let mut copied: u64 = 0;
        while let Some(item) = output.next().await {
            let chunk = item.map_err(|error| {
                exec_failed(container_id, format!("exec stream failed: {error}"))
            })?;
            let bytes = chunk_bytes(&chunk);
            sink.write_all(bytes)
                .await
                .map_err(|error| exec_failed(container_id, format!("sink write failed: {error}")))?;
            copied = copied.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
        }
        sink.flush()
            .await
            .map_err(|error| exec_failed(container_id, format!("sink flush failed: {error}")))?;

        debug!(container_id, bytes = copied, "exec output captured");
        Ok(copied)
    }
}

fn build_create_exec_options(command: &[String]) -> CreateExecOptions<String> {
    CreateExecOptions::<String> {
        attach_stdin: Some(false),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(false),
        cmd: Some(command.to_vec()),
        ..CreateExecOptions::default()
    }
}

fn chunk_bytes(chunk: &LogOutput) -> &[u8] {
    match chunk {
        LogOutput::StdOut { message }
        | LogOutput::StdErr { message }
        | LogOutput::Console { message }
        | LogOutput::StdIn { message } => message.as_ref(),
    }
}

fn exec_failed(container_id: &str, message: impl Into<String>) -> FixtureError {
    FixtureError::from(ContainerError::ExecFailed {
        container_id: String::from(container_id),
        message: message.into(),
    })
}
