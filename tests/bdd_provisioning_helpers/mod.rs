//! Behavioural step helpers for provisioning scenarios.

mod state;
mod steps;

pub(crate) use state::{ProvisioningState, provisioning_state};
