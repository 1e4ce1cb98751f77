//! Per-exchange flow: obtain a token, forward, judge the answer, replay on rejection.

use std::sync::Arc;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use http::header::{CONTENT_LENGTH, HOST};
use http::HeaderValue;
use http::request::Parts;
use http::StatusCode;
use tracing::{debug, error, warn};

use crate::cache::token_cache::TokenCache;
use crate::config::service::ServiceConfig;
use crate::config::token::RetryTarget;
use crate::error::ConfigError;
use crate::injection::Injector;
use crate::observability::metrics::get_metrics;
use crate::parser::condition::InvalidityEvaluator;
use crate::resilience::context::{CapturedHeaders, RetryContext, PSEUDO_AUTHORITY, PSEUDO_METHOD, PSEUDO_PATH, PSEUDO_SCHEME};
use crate::resilience::retry::{RetryCoordinator, RetryOutcome};
use crate::server::server::AppState;
use crate::sources::fetch::{CredentialSpec, FetchToken, HttpTokenFetcher};
use crate::transport::{build_client, strip_hop_by_hop, OutboundRequest, ServiceClient, UpstreamResponse};
use crate::utils::constants::{BODY_TOO_LARGE, FAILED_TO_FETCH_TOKEN, INVALID_REQUEST, UPSTREAM_UNAVAILABLE};

struct TokenHandling<F> {
    coordinator: RetryCoordinator<F>,
    evaluator: InvalidityEvaluator,
    max_retries: u32,
}

pub struct Relay<F = HttpTokenFetcher> {
    upstream: ServiceClient,
    token: Option<TokenHandling<F>>,
}

impl Relay<HttpTokenFetcher> {
    /// Wire services, cache and coordinator from the loaded configuration.
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self> {
        let client = build_client()?;
        let upstream = ServiceClient::from_config("upstream", &cfg.upstream, client.clone())?;

        let token_cfg = &cfg.token_config;
        if !token_cfg.enabled {
            return Ok(Self::passthrough(upstream));
        }

        let token_service = cfg
            .token_service
            .as_ref()
            .ok_or(ConfigError::MissingService("token_service"))?;
        let token_client = ServiceClient::from_config("token_service", token_service, client.clone())?;

        let target = match token_cfg.retry_target {
            RetryTarget::Upstream => upstream.clone(),
            RetryTarget::TokenService => token_client.clone(),
            RetryTarget::GatewayService => {
                let gateway = cfg
                    .gateway_service
                    .as_ref()
                    .ok_or(ConfigError::MissingService("gateway_service"))?;
                ServiceClient::from_config("gateway_service", gateway, client)?
            }
        };

        let fetcher = HttpTokenFetcher::new(token_client, CredentialSpec::from_config(token_cfg));
        let coordinator = RetryCoordinator::new(
            Arc::new(TokenCache::new()),
            Arc::new(fetcher),
            Injector::new(token_cfg.token_injection.clone()),
            target,
            token_cfg.retry_timeout,
        );

        Ok(Self::with_token_handling(
            upstream,
            coordinator,
            InvalidityEvaluator::new(&token_cfg.invalid_token_condition),
            token_cfg.retry_send_times,
        ))
    }
}

impl<F> Relay<F>
where
    F: FetchToken + Send + Sync,
{
    pub fn passthrough(upstream: ServiceClient) -> Self {
        Self { upstream, token: None }
    }

    pub fn with_token_handling(
        upstream: ServiceClient,
        coordinator: RetryCoordinator<F>,
        evaluator: InvalidityEvaluator,
        max_retries: u32,
    ) -> Self {
        Self {
            upstream,
            token: Some(TokenHandling { coordinator, evaluator, max_retries }),
        }
    }

    pub fn is_token_handling_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Run one exchange. `headers` include the `:method`, `:path`, `:authority`
    /// and `:scheme` pseudo-headers. Always produces a response.
    pub async fn exchange(&self, headers: CapturedHeaders, body: Vec<u8>) -> UpstreamResponse {
        let max_retries = self.token.as_ref().map(|t| t.max_retries).unwrap_or(0);
        let mut ctx = RetryContext::initialize(headers, max_retries);
        ctx.attach_body(&body);

        let mut request = match ctx.forward_request() {
            Ok(request) => request,
            Err(e) => {
                warn!("cannot build forward request: {}", e);
                return UpstreamResponse::plain_text(StatusCode::INTERNAL_SERVER_ERROR, INVALID_REQUEST);
            }
        };

        let Some(handling) = &self.token else {
            return self.forward(&request).await;
        };

        let token = match handling.coordinator.ensure_token().await {
            Ok(token) => token,
            Err(e) => {
                error!("failed to fetch token: {}", e);
                return UpstreamResponse::plain_text(StatusCode::INTERNAL_SERVER_ERROR, FAILED_TO_FETCH_TOKEN);
            }
        };
        handling.coordinator.injector().inject(&token, &mut request);

        let mut response = self.forward(&request).await;
        loop {
            if !handling.evaluator.is_enabled() || !response.is_json() {
                return response;
            }
            if !handling.evaluator.is_invalid(&response.body) {
                return response;
            }
            get_metrics().await.invalid_token_verdicts.inc();

            match handling.coordinator.on_invalid_response(&mut ctx).await {
                RetryOutcome::Forward => return response,
                RetryOutcome::Replayed(next) => response = next,
                RetryOutcome::Terminal(synthesized) => return synthesized,
            }
        }
    }

    async fn forward(&self, request: &OutboundRequest) -> UpstreamResponse {
        match self.upstream.call(request, self.upstream.timeout_ms()).await {
            Ok(response) => response,
            Err(e) => {
                error!("forward to {} failed: {}", self.upstream.base_url(), e);
                UpstreamResponse::plain_text(StatusCode::BAD_GATEWAY, UPSTREAM_UNAVAILABLE)
            }
        }
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut headers = self.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(CONTENT_LENGTH);
        (self.status, headers, self.body).into_response()
    }
}

/// Fallback handler: every request that is not served locally goes through the relay.
pub async fn relay_handler(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body): (Parts, Body) = request.into_parts();
    let headers = capture_headers(&parts);

    let body = match to_bytes(body, state.body_limit).await {
        Ok(body) => body,
        Err(e) => {
            warn!("request body rejected: {}", e);
            return UpstreamResponse::plain_text(StatusCode::PAYLOAD_TOO_LARGE, BODY_TOO_LARGE).into_response();
        }
    };

    state.relay.exchange(headers, body.to_vec()).await.into_response()
}

/// Flatten the inbound request head into ordered pairs, pseudo-headers first.
pub fn capture_headers(parts: &Parts) -> CapturedHeaders {
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let authority = parts
        .uri
        .authority()
        .map(|a| a.as_str())
        .or_else(|| parts.headers.get(HOST).and_then(|h| h.to_str().ok()))
        .unwrap_or_default();
    let scheme = parts.uri.scheme_str().unwrap_or("http");

    let mut headers = CapturedHeaders::with_capacity(parts.headers.len() + 4);
    for (name, value) in [
        (PSEUDO_METHOD, parts.method.as_str()),
        (PSEUDO_PATH, path),
        (PSEUDO_AUTHORITY, authority),
        (PSEUDO_SCHEME, scheme),
    ] {
        match HeaderValue::from_str(value) {
            Ok(value) => headers.push((name.to_owned(), value)),
            Err(_) => debug!("pseudo-header '{}' is not a valid header value, not captured", name),
        }
    }
    headers.extend(
        parts
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_owned(), value.clone())),
    );
    headers
}
