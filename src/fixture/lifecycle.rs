//! Forward-only lifecycle of a provisioned instance.

use std::fmt;

use tracing::debug;

/// Where a provisioned instance is in its life.
///
/// States are ordered; an instance only ever moves forward. Teardown may be
/// reached from any earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    /// The container exists but has not been started.
    Created,
    /// The container is running.
    Started,
    /// The published host endpoint is known.
    EndpointResolved,
    /// The database accepts connections and its schema is bootstrapped.
    Ready,
    /// The instance has been handed to a test.
    InUse,
    /// Teardown has run.
    TornDown,
}

impl LifecycleState {
    /// Whether moving from `self` to `next` goes forward.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        next > self
    }

    /// Move to `next` if that goes forward, returning whether it did.
    pub fn advance(&mut self, next: Self) -> bool {
        if !self.can_advance_to(next) {
            debug!(from = %self, to = %next, "rejected lifecycle transition");
            return false;
        }
        debug!(from = %self, to = %next, "lifecycle transition");
        *self = next;
        true
    }

    /// Whether the container was ever started.
    #[must_use]
    pub fn was_started(self) -> bool {
        self >= Self::Started
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::EndpointResolved => "endpoint-resolved",
            Self::Ready => "ready",
            Self::InUse => "in-use",
            Self::TornDown => "torn-down",
        };
        f.write_str(label)
    }
}
