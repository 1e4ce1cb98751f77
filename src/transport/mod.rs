//! Outbound HTTP plumbing shared by the token fetcher, the forward path and replays.

use std::time::{Duration, Instant};

use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::debug;

use crate::config::endpoints::HttpServiceConfig;
use crate::error::{ConfigError, TransportError};
use crate::observability::metrics::get_metrics;
use crate::utils::constants::{DEFAULT_HTTP_TIMEOUT_MS, JSON_CONTENT_TYPES};

/// Connection-scoped headers that must not travel through the proxy.
pub const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

/// Client shared by every configured service. Redirects are never followed:
/// a 3xx from a service is a response like any other.
pub fn build_client() -> Result<Client, TransportError> {
    Client::builder()
        .redirect(Policy::none())
        .build()
        .map_err(TransportError::Http)
}

/// A request ready to be sent to one of the configured services.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// path and query, always starting with `/`
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl OutboundRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_owned(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    /// Locally synthesized `text/plain` response.
    pub fn plain_text(status: StatusCode, message: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Self {
            status,
            headers,
            body: message.as_bytes().to_vec(),
        }
    }

    /// Only bodies labelled exactly as JSON are inspected for token rejection.
    pub fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| JSON_CONTENT_TYPES.contains(&value))
            .unwrap_or(false)
    }
}

/// One configured service: resolved base URL plus a shared client.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    name: String,
    base_url: String,
    timeout_ms: u32,
    client: Client,
}

impl ServiceClient {
    pub fn new(name: &str, base_url: &str, timeout_ms: u32, client: Client) -> Self {
        Self {
            name: name.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout_ms,
            client,
        }
    }

    pub fn from_config(name: &str, cfg: &HttpServiceConfig, client: Client) -> Result<Self, ConfigError> {
        let base_url = cfg.endpoint.base_url()?;
        let timeout_ms = cfg.timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS);
        debug!("service '{}' resolved to {}", name, base_url);
        Ok(Self::new(name, &base_url, timeout_ms, client))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Timeout from the service's own config section.
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub async fn call(&self, request: &OutboundRequest, timeout_ms: u32) -> Result<UpstreamResponse, TransportError> {
        if !request.path.starts_with('/') {
            return Err(TransportError::Request(format!("path '{}' must start with '/'", request.path)));
        }
        let url = format!("{}{}", self.base_url, request.path);

        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(HOST);
        headers.remove(CONTENT_LENGTH);

        let timeout = u64::from(timeout_ms);
        let started = Instant::now();
        let result = self.send(request.method.clone(), &url, headers, request.body.clone(), timeout).await;

        get_metrics()
            .await
            .upstream_duration
            .with_label_values(&[self.name.as_str()])
            .observe(started.elapsed().as_secs_f64());
        debug!(service = %self.name, method = %request.method, url = %url, "outbound call finished in {:?}", started.elapsed());

        result
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
        timeout: u64,
    ) -> Result<UpstreamResponse, TransportError> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Http(e)
            }
        };

        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .timeout(Duration::from_millis(timeout))
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify)?.to_vec();

        Ok(UpstreamResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::Method::POST;
    use httpmock::MockServer;

    use super::*;

    fn json_response(content_type: &'static str) -> UpstreamResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        UpstreamResponse {
            status: StatusCode::OK,
            headers,
            body: b"{}".to_vec(),
        }
    }

    #[test]
    fn json_detection_is_exact() {
        assert!(json_response("application/json").is_json());
        assert!(json_response("application/json; charset=utf-8").is_json());
        assert!(!json_response("application/json;charset=UTF-8").is_json());
        assert!(!json_response("text/json").is_json());
        assert!(!UpstreamResponse::plain_text(StatusCode::OK, "x").is_json());
    }

    #[tokio::test]
    async fn call_sends_body_and_drops_connection_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/orders")
                    .query_param("page", "2")
                    .header("x-trace", "abc")
                    .header_missing("connection")
                    .body("a=1");
                then.status(201).header("content-type", "application/json").body(r#"{"ok":true}"#);
            })
            .await;

        let service = ServiceClient::new("upstream", &server.base_url(), 1000, Client::new());
        let mut request = OutboundRequest::new(Method::POST, "/api/orders?page=2");
        request.headers.insert("x-trace", HeaderValue::from_static("abc"));
        request.headers.insert("connection", HeaderValue::from_static("keep-alive"));
        request.body = b"a=1".to_vec();

        let response = service.call(&request, 1000).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert!(response.is_json());
        assert_eq!(response.body, br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn redirects_are_returned_not_followed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/old");
                then.status(302).header("location", "/new");
            })
            .await;
        let landing = server
            .mock_async(|when, then| {
                when.path("/new");
                then.status(200).body("landing");
            })
            .await;

        let service = ServiceClient::new("upstream", &server.base_url(), 1000, build_client().unwrap());
        let response = service.call(&OutboundRequest::new(Method::GET, "/old"), 1000).await.unwrap();

        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.headers.get("location").unwrap(), "/new");
        assert_eq!(landing.hits_async().await, 0);
    }

    #[tokio::test]
    async fn slow_service_is_a_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/slow");
                then.status(200).delay(Duration::from_millis(500));
            })
            .await;

        let service = ServiceClient::new("upstream", &server.base_url(), 1000, Client::new());
        let result = service.call(&OutboundRequest::new(Method::GET, "/slow"), 50).await;

        assert!(matches!(result, Err(TransportError::Timeout(50))));
    }

    #[tokio::test]
    async fn relative_path_is_rejected() {
        let service = ServiceClient::new("upstream", "http://127.0.0.1:9", 1000, Client::new());
        let result = service.call(&OutboundRequest::new(Method::GET, "relative"), 50).await;
        assert!(matches!(result, Err(TransportError::Request(_))));
    }
}
