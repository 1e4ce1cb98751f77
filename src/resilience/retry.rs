use std::sync::Arc;

use http::header::AUTHORIZATION;
use http::{HeaderValue, StatusCode};
use tracing::{error, info, warn};

use crate::cache::token_cache::TokenCache;
use crate::error::FetchError;
use crate::injection::Injector;
use crate::observability::metrics::get_metrics;
use crate::resilience::context::{RetryContext, RetryState};
use crate::sources::fetch::{FetchToken, HttpTokenFetcher};
use crate::transport::{OutboundRequest, ServiceClient, UpstreamResponse};
use crate::utils::constants::{FAILED_TO_FETCH_TOKEN, INVALID_REQUEST, REQUEST_FAILED};

#[derive(Debug)]
pub enum RetryOutcome {
    /// budget spent, the response at hand goes to the client unchanged
    Forward,
    /// replay went through; its response replaces the current one
    Replayed(UpstreamResponse),
    /// locally synthesized failure, no further retries
    Terminal(UpstreamResponse),
}

/// Drives token refresh and request replay after the upstream rejected a token.
pub struct RetryCoordinator<F = HttpTokenFetcher> {
    cache: Arc<TokenCache>,
    fetcher: Arc<F>,
    injector: Injector,
    target: ServiceClient,
    timeout_ms: u32,
}

impl<F> RetryCoordinator<F>
where
    F: FetchToken + Send + Sync,
{
    pub fn new(cache: Arc<TokenCache>, fetcher: Arc<F>, injector: Injector, target: ServiceClient, timeout_ms: u32) -> Self {
        Self { cache, fetcher, injector, target, timeout_ms }
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn target(&self) -> &ServiceClient {
        &self.target
    }

    /// Cached credential, fetched through the shared single-flight path when unset.
    pub async fn ensure_token(&self) -> Result<String, FetchError> {
        self.cache.ensure_token(self.fetcher.as_ref()).await
    }

    pub async fn on_invalid_response(&self, ctx: &mut RetryContext) -> RetryOutcome {
        let metrics = get_metrics().await;

        if !ctx.begin_retry() {
            info!("max retries reached ({}), returning response as is", ctx.max_retries());
            metrics.exchange_retries.with_label_values(&["exhausted"]).inc();
            return RetryOutcome::Forward;
        }
        info!("retrying {} {}, attempt {}/{}", ctx.method(), ctx.url(), ctx.retry_count(), ctx.max_retries());

        self.cache.clear_token().await;
        let token = match self.ensure_token().await {
            Ok(token) => token,
            Err(e) => {
                error!("failed to fetch token for retry: {}", e);
                return terminal(ctx, "fetch_failed", FAILED_TO_FETCH_TOKEN).await;
            }
        };
        info!("token fetched for retry, length {}", token.len());
        ctx.set_state(RetryState::Replaying);

        let mut request = match ctx.replay_request() {
            Ok(request) => request,
            Err(e) => {
                warn!("cannot rebuild request: {}", e);
                return terminal(ctx, "invalid_request", INVALID_REQUEST).await;
            }
        };
        self.apply_token(&token, &mut request);

        match self.target.call(&request, self.timeout_ms).await {
            Ok(response) => {
                info!("retry {} completed with status {}", ctx.retry_count(), response.status);
                ctx.set_state(RetryState::Done);
                metrics.exchange_retries.with_label_values(&["replayed"]).inc();
                RetryOutcome::Replayed(response)
            }
            Err(e) => {
                error!("failed to send retry request to {}: {}", self.target.name(), e);
                terminal(ctx, "request_failed", REQUEST_FAILED).await
            }
        }
    }

    /// Configured rules, or a bearer `Authorization` header when there are none.
    fn apply_token(&self, token: &str, request: &mut OutboundRequest) {
        if !self.injector.is_empty() {
            self.injector.inject(token, request);
            return;
        }
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => {
                request.headers.append(AUTHORIZATION, value);
            }
            Err(e) => warn!("token cannot be sent as a bearer header: {}", e),
        }
    }
}

async fn terminal(ctx: &mut RetryContext, outcome: &str, message: &str) -> RetryOutcome {
    ctx.set_state(RetryState::Done);
    get_metrics().await.exchange_retries.with_label_values(&[outcome]).inc();
    RetryOutcome::Terminal(UpstreamResponse::plain_text(StatusCode::INTERNAL_SERVER_ERROR, message))
}
