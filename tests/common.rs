#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use authgate::config::{extract_config, ConfigV1};
use authgate::error::TransportError;
use authgate::gateway::{bypasses_auth, AccountPaths, AuthGateway};
use authgate::models::TokenPair;
use authgate::refresh::{HttpRefreshClient, RefreshCoordinator};
use authgate::store::TokenStore;
use authgate::transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use http::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::Barrier;

pub fn load_test_config(base_url: &str) -> ConfigV1 {
    let yaml = format!(
        r#"
version: "1.0.0"
logging:
  level: "warn"
  format: "json"
api:
  base_url: "{base_url}"
  request_timeout_in_ms: 5000
  refresh_timeout_in_ms: 2000
storage:
  type: memory
"#
    );

    extract_config(Figment::new().merge(Yaml::string(&yaml)))
        .expect("Failed to parse test config YAML")
}

/// Base URL of a local port that was just released, so connections are refused.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind an ephemeral port");
    let port = listener.local_addr().expect("listener address").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// Holds every 401 response back until `parties` of them arrived, so that a
/// burst of requests is guaranteed to have been rejected with the same token
/// before any of them starts refreshing.
pub struct GatedTransport {
    inner: Arc<dyn HttpTransport>,
    barrier: Barrier,
}

impl GatedTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, parties: usize) -> Self {
        GatedTransport {
            inner,
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl HttpTransport for GatedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let response = self.inner.send(request).await?;
        if response.status() == StatusCode::UNAUTHORIZED && !bypasses_auth(request.path()) {
            self.barrier.wait().await;
        }
        Ok(response)
    }
}

pub struct TestGateway {
    pub gateway: Arc<AuthGateway>,
    pub store: Arc<TokenStore>,
    pub coordinator: RefreshCoordinator,
}

/// Assembles a gateway over an in-memory store holding `initial`.
/// With `gate = Some(n)`, the first `n` 401 responses are synchronised.
pub async fn build_test_gateway(
    config: &ConfigV1,
    initial: Option<TokenPair>,
    gate: Option<usize>,
) -> TestGateway {
    let store = Arc::new(TokenStore::in_memory());
    if let Some(pair) = initial {
        store.set(pair).await.expect("memory store accepts writes");
    }

    let reqwest: Arc<dyn HttpTransport> = Arc::new(
        ReqwestTransport::new(config.api.base_url.as_str(), config.api.request_timeout())
            .expect("client builds"),
    );
    let transport: Arc<dyn HttpTransport> = match gate {
        Some(parties) => Arc::new(GatedTransport::new(reqwest, parties)),
        None => reqwest,
    };

    let coordinator = RefreshCoordinator::new(
        store.clone(),
        Arc::new(HttpRefreshClient::new(
            transport.clone(),
            config.api.refresh_path.as_str(),
        )),
        config.api.refresh_timeout(),
    );
    let gateway = AuthGateway::new(
        transport,
        store.clone(),
        coordinator.clone(),
        AccountPaths::from(&config.api),
    );

    TestGateway {
        gateway: Arc::new(gateway),
        store,
        coordinator,
    }
}
