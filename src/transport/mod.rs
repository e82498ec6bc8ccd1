//! Wire access for the gateway.
//!
//! The gateway only talks to the network through [`HttpTransport`], which
//! keeps the refresh logic testable without sockets.

pub mod request;
pub mod reqwest_transport;

use async_trait::async_trait;

pub use request::{ApiRequest, ApiResponse};
pub use reqwest_transport::ReqwestTransport;

use crate::error::TransportError;

/// Sends one request and reads the whole response. Non-2xx statuses are not
/// errors at this level.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
