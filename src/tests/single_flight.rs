#[cfg(test)]
mod tests {

    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use axum::{routing::post, Json, Router};
    use http::StatusCode;
    use serde_json::json;
    use tokio::time::sleep;

    use crate::tests::common::{build_reqwest_client, relay_config, spawn_axum, spawn_relay};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_exchanges_share_one_token_fetch() {
        let token_hits = Arc::new(AtomicUsize::new(0));
        let token_hits_clone = token_hits.clone();
        let token_router = Router::new().route(
            "/auth/getToken",
            post(move || {
                let hits = token_hits_clone.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(200)).await;
                    Json(json!({"datas": "shared"}))
                }
            }),
        );
        let (_token_h, token_addr) = spawn_axum(token_router).await;

        let upstream_router = Router::new().fallback(|headers: http::HeaderMap| async move {
            let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default();
            assert_eq!(auth, "Bearer shared");
            Json(json!({"code": 0}))
        });
        let (_upstream_h, upstream_addr) = spawn_axum(upstream_router).await;

        let cfg = relay_config(token_addr, upstream_addr, 1, "").await;
        let (_relay_h, relay_addr) = spawn_relay(&cfg).await;

        let client = build_reqwest_client();
        let mut handles = Vec::new();
        for i in 0..20 {
            let client = client.clone();
            let url = format!("http://{}/api/items/{}", relay_addr, i);
            handles.push(tokio::spawn(async move { client.get(url).send().await }));
        }
        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(token_hits.load(Ordering::SeqCst), 1);
    }
}
