// tests/common/mod.rs
pub use axum::{Router, body::Body};
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::Arc;
use reqwest::Client;

use crate::config::proc_loader::{parse_config, ConfigMode};
use crate::config::service::ServiceConfig;
use crate::observability::metrics::get_metrics;
use crate::server::proxy::Relay;
use crate::server::server::{router, AppState};

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Relay config pointing at local test servers.
pub async fn relay_config(token_addr: SocketAddr, upstream_addr: SocketAddr, retry_send_times: u32, extra: &str) -> ServiceConfig {
    let yaml = format!(
        r#"
settings:
  server:
    host: 127.0.0.1
    port: "0"
  metrics:
    is_enabled: true
upstream:
  endpoint:
    service_source: ip
    service_name: 127.0.0.1
    service_port: {upstream_port}
  timeout: 2000
token_service:
  endpoint:
    service_source: ip
    service_name: 127.0.0.1
    service_port: {token_port}
token_config:
  enabled: true
  credential:
    form_fields:
      username: svc
      password: secret
  token_path: /auth/getToken
  timeout: 2000
  token_extraction:
    response_path: datas
  token_injection:
    - type: header
      key: Authorization
      format: "Bearer {{token}}"
  invalid_token_condition: "code != 0"
  retry_send_times: {retry_send_times}
{extra}
"#,
        upstream_port = upstream_addr.port(),
        token_port = token_addr.port(),
        retry_send_times = retry_send_times,
        extra = extra,
    );
    parse_config(yaml, ConfigMode::Strict).await.expect("test config must be valid")
}

/// Serve the full relay router for `cfg` and return its address.
pub async fn spawn_relay(cfg: &ServiceConfig) -> (JoinHandle<()>, SocketAddr) {
    let relay = Arc::new(Relay::from_config(cfg).expect("relay"));
    let state = AppState::new(get_metrics().await, relay, cfg.settings.body_limit_bytes);
    spawn_axum(router(state, &cfg.settings.metrics)).await
}
