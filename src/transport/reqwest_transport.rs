use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ApiRequest, ApiResponse, HttpTransport};
use crate::error::TransportError;

/// [`HttpTransport`] over a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    default_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(
        base_url: impl Into<String>,
        default_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("authgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(ReqwestTransport {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_timeout,
        })
    }

    /// Absolute URLs are used as-is, anything else is joined to the base URL.
    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(request.path());
        let timeout = request.timeout().unwrap_or(self.default_timeout);

        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(request.headers().clone())
            .timeout(timeout);
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        debug!(
            method = %request.method(),
            url = url.as_str(),
            status = status.as_u16(),
            "Received response"
        );

        Ok(ApiResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Instant;
    use tokio::net::TcpListener;

    #[test]
    fn test_url_joining() {
        let transport =
            ReqwestTransport::new("https://api.example.com/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            transport.url_for("/orders/"),
            "https://api.example.com/v1/orders/"
        );
        assert_eq!(
            transport.url_for("orders/"),
            "https://api.example.com/v1/orders/"
        );
        assert_eq!(
            transport.url_for("https://cdn.example.com/x"),
            "https://cdn.example.com/x"
        );
    }

    #[tokio::test]
    async fn test_send_passes_method_headers_and_body() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/collections/")
            .match_header("x-trace", "abc")
            .match_body(Matcher::Json(json!({"name": "shoes"})))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 9}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(server.url(), Duration::from_secs(5)).unwrap();
        let request = ApiRequest::post("/collections/")
            .with_header(
                http::header::HeaderName::from_static("x-trace"),
                http::HeaderValue::from_static("abc"),
            )
            .with_json(json!({"name": "shoes"}));

        let response = transport.send(&request).await.unwrap();
        m.assert_async().await;
        assert_eq!(response.status().as_u16(), 201);
        assert_eq!(response.json::<serde_json::Value>().unwrap(), json!({"id": 9}));
    }

    /// Address of a port that was just released, so connecting is refused.
    async fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }

    #[tokio::test]
    async fn test_per_request_timeout_overrides_default() {
        // Accepts the connection and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let transport =
            ReqwestTransport::new(format!("http://{addr}"), Duration::from_secs(30)).unwrap();
        let request = ApiRequest::get("/slow/").with_timeout(Duration::from_millis(100));

        let started = Instant::now();
        let err = transport.send(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout), "unexpected error: {err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
        silent.abort();
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        let transport =
            ReqwestTransport::new(closed_port_url().await, Duration::from_secs(2)).unwrap();
        let err = transport.send(&ApiRequest::get("/")).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Network(_) | TransportError::Timeout
        ));
    }
}
