//! Library exports for authgate, shared between the binary and tests.

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod refresh;
pub mod session;
pub mod startup;
pub mod store;
pub mod transport;
pub mod utils;

pub use error::{GatewayError, RefreshFailure};
pub use gateway::AuthGateway;
pub use models::{SessionState, TokenPair};
pub use transport::{ApiRequest, ApiResponse};
