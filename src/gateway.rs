//! The authenticated request gateway.
//!
//! Every API call of the client goes through [`AuthGateway::execute`], which:
//! 1) attaches the current bearer token,
//! 2) sends the request,
//! 3) on a 401, asks the [`RefreshCoordinator`] for a new token and retries once.
//!
//! Login, registration and refresh endpoints bypass all of this.

use std::sync::Arc;

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::GatewayError;
use crate::models::{SessionState, TokenPair};
use crate::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::session::SessionStream;
use crate::store::TokenStore;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};

/// Endpoints that must never carry a bearer token nor trigger a refresh.
pub fn bypasses_auth(path: &str) -> bool {
    path.contains("/auth/token") || path.contains("/register")
}

/// Paths of the unauthenticated account endpoints.
#[derive(Debug, Clone)]
pub struct AccountPaths {
    pub login: String,
    pub register: String,
}

impl From<&ApiConfig> for AccountPaths {
    fn from(config: &ApiConfig) -> Self {
        AccountPaths {
            login: config.login_path.clone(),
            register: config.register_path.clone(),
        }
    }
}

impl Default for AccountPaths {
    fn default() -> Self {
        AccountPaths {
            login: "/auth/token/".to_string(),
            register: "/auth/register/".to_string(),
        }
    }
}

pub struct AuthGateway {
    transport: Arc<dyn HttpTransport>,
    store: Arc<TokenStore>,
    coordinator: RefreshCoordinator,
    paths: AccountPaths,
}

impl AuthGateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<TokenStore>,
        coordinator: RefreshCoordinator,
        paths: AccountPaths,
    ) -> Self {
        AuthGateway {
            transport,
            store,
            coordinator,
            paths,
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn session(&self) -> SessionState {
        self.store.session()
    }

    /// Stream of the "is authenticated" flag for the UI layer.
    pub fn subscribe(&self) -> SessionStream {
        self.store.subscribe()
    }

    /// Sends `request` with credentials, refreshing them at most once.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let span = info_span!(
            "gateway_request",
            request_id = %Uuid::new_v4(),
            method = %request.method(),
            path = request.path(),
        );
        self.execute_authorized(request).instrument(span).await
    }

    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, GatewayError> {
        self.execute(request).await?.json()
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, GatewayError> {
        self.execute(ApiRequest::post(path).with_json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse, GatewayError> {
        self.execute(ApiRequest::put(path).with_json(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<ApiResponse, GatewayError> {
        self.execute(ApiRequest::patch(path).with_json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.execute(ApiRequest::delete(path)).await
    }

    /// Exchanges credentials for a token pair and starts a session.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionState, GatewayError> {
        let request = ApiRequest::post(self.paths.login.as_str())
            .with_json(json!({ "username": username, "password": password }));
        let pair: TokenPair = self.send_unauthenticated(&request).await?.json()?;
        if !pair.is_complete() {
            return Err(GatewayError::Decode("login response carried an empty token".into()));
        }

        self.store.set(pair).await?;
        let session = self.store.session();
        info!(user_id = ?session.user_id, "Logged in");
        Ok(session)
    }

    /// Creates an account. Does not sign in.
    pub async fn register(&self, body: Value) -> Result<ApiResponse, GatewayError> {
        let request = ApiRequest::post(self.paths.register.as_str()).with_json(body);
        self.send_unauthenticated(&request).await
    }

    /// Ends the session locally; observers see `false`.
    pub async fn logout(&self) -> Result<(), GatewayError> {
        self.store.clear().await?;
        info!("Logged out");
        Ok(())
    }

    async fn execute_authorized(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        if bypasses_auth(request.path()) {
            debug!("Path bypasses authentication");
            return self.send_unauthenticated(&request).await;
        }

        let token = self.store.access_token();
        let outgoing = match &token {
            Some(token) => request.with_bearer(token)?,
            None => request.clone(),
        };
        let response = self.transport.send(&outgoing).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return into_result(response);
        }

        let Some(token) = token else {
            debug!("401 without a session, nothing to refresh");
            return Err(GatewayError::Unauthorized);
        };
        if request.is_retried() {
            warn!("Request rejected after a refresh; not retrying again");
            return Err(GatewayError::Unauthorized);
        }

        match self.coordinator.request_refresh(&token).await {
            RefreshOutcome::NewAccessToken(new_token) => {
                let retry = request.mark_retried().with_bearer(&new_token)?;
                let response = self.transport.send(&retry).await?;
                if response.status() == StatusCode::UNAUTHORIZED {
                    warn!("Request rejected after a refresh; not retrying again");
                    return Err(GatewayError::Unauthorized);
                }
                into_result(response)
            }
            RefreshOutcome::Failed(failure) => Err(GatewayError::AuthExpired(failure)),
        }
    }

    async fn send_unauthenticated(
        &self,
        request: &ApiRequest,
    ) -> Result<ApiResponse, GatewayError> {
        let response = self.transport.send(&request.without_authorization()).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthorized);
        }
        into_result(response)
    }
}

fn into_result(response: ApiResponse) -> Result<ApiResponse, GatewayError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(GatewayError::Http {
            status: response.status(),
            body: response.text(),
        })
    }
}
