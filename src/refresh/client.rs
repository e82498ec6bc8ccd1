use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::RefreshFailure;
use crate::models::TokenPair;
use crate::transport::{ApiRequest, HttpTransport};

/// Exchanges a refresh token for a new credential pair.
#[async_trait]
pub trait RefreshClient: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshFailure>;
}

/// Body of a successful `POST /auth/token/refresh/`.
///
/// The backend rotates the refresh token; a server configured without
/// rotation omits it, in which case the old one stays valid.
#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    refresh: Option<String>,
}

/// [`RefreshClient`] calling the backend's refresh endpoint.
pub struct HttpRefreshClient {
    transport: Arc<dyn HttpTransport>,
    refresh_path: String,
}

impl HttpRefreshClient {
    pub fn new(transport: Arc<dyn HttpTransport>, refresh_path: impl Into<String>) -> Self {
        HttpRefreshClient {
            transport,
            refresh_path: refresh_path.into(),
        }
    }
}

#[async_trait]
impl RefreshClient for HttpRefreshClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshFailure> {
        debug!("Requesting new credentials at '{}'", self.refresh_path);

        let request = ApiRequest::post(self.refresh_path.as_str())
            .with_json(json!({ "refresh": refresh_token }));
        let response = self.transport.send(&request).await?;

        if !response.is_success() {
            warn!(
                status = response.status().as_u16(),
                "Refresh endpoint rejected the refresh token"
            );
            return Err(RefreshFailure::Rejected {
                status: response.status().as_u16(),
            });
        }

        let body: RefreshResponse = response
            .json()
            .map_err(|e| RefreshFailure::Malformed(e.to_string()))?;
        let rotated = body.refresh.unwrap_or_else(|| refresh_token.to_string());
        let pair = TokenPair::new(body.access, rotated);

        if !pair.is_complete() {
            return Err(RefreshFailure::Malformed(
                "refresh response carried an empty token".into(),
            ));
        }
        Ok(pair)
    }
}
