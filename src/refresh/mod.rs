//! Credential refresh: the network call and the single-flight coordinator.

pub mod client;
pub mod coordinator;

pub use client::{HttpRefreshClient, RefreshClient};
pub use coordinator::RefreshCoordinator;

use crate::error::RefreshFailure;

/// Result of one refresh cycle, shared by every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    NewAccessToken(String),
    Failed(RefreshFailure),
}
