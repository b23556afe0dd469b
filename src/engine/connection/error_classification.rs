//! Error classification helpers for container engine failures.
//!
//! Converts low-level `Bollard` errors into semantic `ContainerError`
//! variants, and recognises "no such container" responses that teardown
//! treats as success.

use std::path::Path;

use crate::error::ContainerError;

/// Filesystem path behind a `unix://` or `npipe://` socket URI.
///
/// HTTP endpoints and bare paths yield `None`.
fn extract_socket_path(socket_uri: &str) -> Option<&Path> {
    ["unix://", "npipe://"]
        .iter()
        .find_map(|scheme| socket_uri.strip_prefix(scheme))
        .map(Path::new)
}

fn connection_failed(message: &str) -> ContainerError {
    ContainerError::ConnectionFailed {
        message: message.to_owned(),
    }
}

/// Map an I/O failure on the engine socket to the most specific variant.
///
/// Only socket URIs with a filesystem path can report `PermissionDenied` or
/// `SocketNotFound`; everything else is `ConnectionFailed`.
fn classify_io_error_kind(
    kind: std::io::ErrorKind,
    socket_path: Option<&Path>,
    message: &str,
) -> ContainerError {
    match (kind, socket_path) {
        (std::io::ErrorKind::PermissionDenied, Some(path)) => ContainerError::PermissionDenied {
            path: path.to_path_buf(),
        },
        (std::io::ErrorKind::NotFound, Some(path)) => ContainerError::SocketNotFound {
            path: path.to_path_buf(),
        },
        _ => connection_failed(message),
    }
}

/// Classify a failure to create an engine client for `socket_uri`.
pub(super) fn classify_connection_error(
    bollard_error: &bollard::errors::Error,
    socket_uri: &str,
) -> ContainerError {
    let socket_path = extract_socket_path(socket_uri);
    let message = bollard_error.to_string();

    let io_kind = match bollard_error {
        bollard::errors::Error::SocketNotFoundError(_) if socket_path.is_some() => {
            Some(std::io::ErrorKind::NotFound)
        }
        // A wrapped cause is more specific than the outer error's kind.
        bollard::errors::Error::IOError { err } => {
            io_error_kind_in_chain(err).or_else(|| Some(err.kind()))
        }
        _ => io_error_kind_in_chain(bollard_error),
    };

    io_kind.map_or_else(
        || connection_failed(&message),
        |kind| classify_io_error_kind(kind, socket_path, &message),
    )
}

/// HTTP status the engine returns for an unknown container.
const STATUS_NOT_FOUND: u16 = 404;

/// Returns true when the engine reported that the target no longer exists.
///
/// Auto-removed containers disappear as soon as they stop, so a stop or
/// exec against them yields this response.
pub(super) const fn is_not_found(bollard_error: &bollard::errors::Error) -> bool {
    matches!(
        bollard_error,
        bollard::errors::Error::DockerResponseServerError {
            status_code: STATUS_NOT_FOUND,
            ..
        }
    )
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn std::error::Error) -> Option<std::io::ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
