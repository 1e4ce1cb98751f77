/// Token endpoint client
///
/// Presents the configured credential as a form POST and extracts the token
/// from the JSON answer.

use std::collections::BTreeMap;
use std::time::Instant;

use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, Method, StatusCode};
use tracing::{debug, warn};

use crate::config::token::TokenConfig;
use crate::error::{FetchError, TransportError};
use crate::observability::metrics::get_metrics;
use crate::parser::response::extract_token;
use crate::transport::{OutboundRequest, ServiceClient};
use crate::utils::constants::FORM_CONTENT_TYPE;

pub trait FetchToken {
    fn fetch_token(&self) -> impl std::future::Future<Output = Result<String, FetchError>> + Send;
}

/// Everything needed to call the token endpoint, frozen at startup.
#[derive(Debug, Clone)]
pub struct CredentialSpec {
    pub form_fields: BTreeMap<String, String>,
    pub head_fields: BTreeMap<String, String>,
    pub token_path: String,
    pub extraction_path: String,
    pub timeout_ms: u32,
}

impl CredentialSpec {
    pub fn from_config(cfg: &TokenConfig) -> Self {
        Self {
            form_fields: cfg.credential.form_fields.clone(),
            head_fields: cfg.credential.head_fields.clone(),
            token_path: cfg.token_path.clone(),
            extraction_path: cfg.token_extraction.response_path.clone(),
            timeout_ms: cfg.timeout,
        }
    }

    fn to_request(&self) -> Result<OutboundRequest, TransportError> {
        let mut request = OutboundRequest::new(Method::POST, &self.token_path);
        for (key, value) in &self.head_fields {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| TransportError::Request(format!("header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Request(format!("header '{}' value: {}", key, e)))?;
            request.headers.append(name, value);
        }
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        request.body = serde_urlencoded::to_string(&self.form_fields)
            .map_err(|e| TransportError::Request(format!("form body: {}", e)))?
            .into_bytes();
        Ok(request)
    }
}

#[derive(Debug, Clone)]
pub struct HttpTokenFetcher {
    client: ServiceClient,
    spec: CredentialSpec,
}

impl HttpTokenFetcher {
    pub fn new(client: ServiceClient, spec: CredentialSpec) -> Self {
        Self { client, spec }
    }

    async fn request_token(&self) -> Result<String, FetchError> {
        let request = self.spec.to_request()?;
        let response = self.client.call(&request, self.spec.timeout_ms).await?;

        if response.status != StatusCode::OK {
            warn!(
                "token endpoint {}{} answered {}",
                self.client.base_url(),
                self.spec.token_path,
                response.status
            );
            return Err(FetchError::Status(response.status.as_u16()));
        }

        let token = extract_token(&response.body, &self.spec.extraction_path)?;
        if token.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(token)
    }
}

impl FetchToken for HttpTokenFetcher {
    async fn fetch_token(&self) -> Result<String, FetchError> {
        let metrics = get_metrics().await;
        metrics.token_fetch_requests.inc();
        let started = Instant::now();

        let result = self.request_token().await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics
            .token_fetch_duration
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        match &result {
            Ok(token) => debug!("token fetched, length {}", token.len()),
            Err(e) => {
                metrics.token_fetch_failures.with_label_values(&[e.reason()]).inc();
                warn!("token fetch failed: {}", e);
            }
        }
        result
    }
}
