use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the process-wide `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token endpoint metrics
    pub token_fetch_requests: IntCounter,
    pub token_fetch_failures: IntCounterVec,
    pub token_fetch_duration: HistogramVec,

    // Cache metrics
    pub token_cache_clears: IntCounter,

    // Exchange metrics
    pub invalid_token_verdicts: IntCounter,
    pub exchange_retries: IntCounterVec,
    pub upstream_duration: HistogramVec,

    // Config/runtime
    pub config_parse_failures: IntCounter,
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        // metric names and label sets below are constants, registration cannot collide
        let registry = Registry::new_custom(Some("tokenrelay".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Token endpoint
            token_fetch_requests: IntCounter::new("token_fetch_requests_total", "Total token endpoint calls").unwrap(),
            token_fetch_failures: IntCounterVec::new(Opts::new("token_fetch_failures_total", "Token fetch failures by reason"),&["reason"],).unwrap(),
            token_fetch_duration: HistogramVec::new(HistogramOpts::new("token_fetch_duration_seconds", "Token fetch duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["result"],).unwrap(),

            // Cache
            token_cache_clears: IntCounter::new("token_cache_clears_total", "Times the shared token was dropped after an invalid verdict").unwrap(),

            // Exchange
            invalid_token_verdicts: IntCounter::new("invalid_token_verdicts_total", "Upstream responses judged as a rejected token").unwrap(),
            exchange_retries: IntCounterVec::new(Opts::new("exchange_retries_total", "Retry attempts by outcome"),&["outcome"],).unwrap(),
            upstream_duration: HistogramVec::new(HistogramOpts::new("upstream_request_duration_seconds", "Outbound request duration").buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["service"],).unwrap(),

            // Config/runtime
            config_parse_failures: IntCounter::new("config_parse_failures_total", "Config sections that failed to parse").unwrap(),
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_fetch_requests.clone())).unwrap();
        reg.register(Box::new(metrics.token_fetch_failures.clone())).unwrap();
        reg.register(Box::new(metrics.token_fetch_duration.clone())).unwrap();
        reg.register(Box::new(metrics.token_cache_clears.clone())).unwrap();
        reg.register(Box::new(metrics.invalid_token_verdicts.clone())).unwrap();
        reg.register(Box::new(metrics.exchange_retries.clone())).unwrap();
        reg.register(Box::new(metrics.upstream_duration.clone())).unwrap();
        reg.register(Box::new(metrics.config_parse_failures.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}

#[cfg(test)]
mod tests {
    use prometheus::Encoder;

    use super::*;

    #[tokio::test]
    async fn registry_is_shared_and_prefixed() {
        let metrics = get_metrics().await;
        metrics.token_fetch_failures.with_label_values(&["timeout"]).inc();
        metrics.up.set(1);

        let families = get_metrics().await.registry.gather();
        let mut buffer = Vec::new();
        prometheus::TextEncoder::new().encode(&families, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("tokenrelay_token_fetch_failures_total{reason=\"timeout\"}"));
        assert!(text.contains("tokenrelay_up 1"));
    }
}
