//! Gateway assembly.
//!
//! Wires storage, token store, transport, refresh coordinator and gateway
//! together from a loaded configuration. Every component is created here and
//! handed down explicitly; there is no global instance.

use std::sync::Arc;

use tracing::info;

use crate::config::ConfigV1;
use crate::gateway::{AccountPaths, AuthGateway};
use crate::refresh::{HttpRefreshClient, RefreshCoordinator};
use crate::store::{create_storage, TokenStore};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Builds a ready-to-use gateway, resuming any persisted session.
///
/// # Errors
///
/// Returns an error if the configuration is inconsistent, the HTTP client
/// cannot be created, or the persisted session cannot be read.
pub async fn build_gateway(config: &ConfigV1) -> Result<AuthGateway, Box<dyn std::error::Error>> {
    config.api.validate()?;

    let storage = create_storage(&config.storage);
    let store = Arc::new(TokenStore::open(storage).await?);

    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
        config.api.base_url.as_str(),
        config.api.request_timeout(),
    )?);
    let refresh_client =
        HttpRefreshClient::new(transport.clone(), config.api.refresh_path.as_str());
    let coordinator = RefreshCoordinator::new(
        store.clone(),
        Arc::new(refresh_client),
        config.api.refresh_timeout(),
    );

    info!(
        "Gateway ready for '{}' (authenticated: {})",
        config.api.base_url,
        store.is_authenticated()
    );

    Ok(AuthGateway::new(
        transport,
        store,
        coordinator,
        AccountPaths::from(&config.api),
    ))
}
