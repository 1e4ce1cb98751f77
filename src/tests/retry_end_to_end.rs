// Simulates:
//  - token endpoint (POST, form) -> issues tok-1, tok-2, ...
//  - upstream -> rejects tok-1 with a JSON error, accepts any later token
// A client request through the relay must come back with the second upstream answer.

#[cfg(test)]
mod test {

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use axum::{routing::post, Json, Router};
    use http::{HeaderMap, StatusCode};
    use serde_json::{json, Value};

    use crate::tests::common::{build_reqwest_client, relay_config, spawn_axum, spawn_relay};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rejected_token_is_refreshed_and_request_replayed() {
        // token endpoint
        let token_hits = Arc::new(AtomicUsize::new(0));
        let token_hits_clone = token_hits.clone();
        let token_router = Router::new().route(
            "/auth/getToken",
            post(move |headers: HeaderMap, body: String| {
                let hits = token_hits_clone.clone();
                async move {
                    assert_eq!(headers.get("content-type").unwrap(), "application/x-www-form-urlencoded");
                    assert_eq!(body, "password=secret&username=svc");
                    let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
                    Json(json!({"code": 0, "datas": format!("tok-{}", n)}))
                }
            }),
        );
        let (_token_h, token_addr) = spawn_axum(token_router).await;

        // upstream: only the first token is rejected
        let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let upstream_router = Router::new().route(
            "/api/orders",
            post(move |headers: HeaderMap, body: String| {
                let seen = seen_clone.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_owned();
                    seen.lock().unwrap().push((auth.clone(), body));
                    if auth == "Bearer tok-1" {
                        Json(json!({"code": 401, "msg": "token expired"}))
                    } else {
                        Json(json!({"code": 0, "data": "second"}))
                    }
                }
            }),
        );
        let (_upstream_h, upstream_addr) = spawn_axum(upstream_router).await;

        let cfg = relay_config(token_addr, upstream_addr, 1, "").await;
        let (_relay_h, relay_addr) = spawn_relay(&cfg).await;

        let client = build_reqwest_client();
        let response = client
            .post(format!("http://{}/api/orders", relay_addr))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("item=42")
            .send()
            .await
            .expect("relay request");

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"code": 0, "data": "second"}));

        assert_eq!(token_hits.load(Ordering::SeqCst), 2);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("Bearer tok-1".to_owned(), "item=42".to_owned()),
                ("Bearer tok-2".to_owned(), "item=42".to_owned()),
            ]
        );

        // the refreshed token is reused by the next exchange
        let response = client
            .post(format!("http://{}/api/orders", relay_addr))
            .body("item=43")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(token_hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_endpoint_failure_returns_500() {
        let token_router = Router::new().route(
            "/auth/getToken",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let (_token_h, token_addr) = spawn_axum(token_router).await;

        let upstream_hits = Arc::new(AtomicUsize::new(0));
        let upstream_hits_clone = upstream_hits.clone();
        let upstream_router = Router::new().fallback(move || {
            let hits = upstream_hits_clone.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "ok"
            }
        });
        let (_upstream_h, upstream_addr) = spawn_axum(upstream_router).await;

        let cfg = relay_config(token_addr, upstream_addr, 1, "").await;
        let (_relay_h, relay_addr) = spawn_relay(&cfg).await;

        let response = build_reqwest_client()
            .get(format!("http://{}/anything", relay_addr))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/plain");
        assert_eq!(response.text().await.unwrap(), "Failed to fetch token");
        assert_eq!(upstream_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn metrics_route_is_served_locally() {
        let (_token_h, token_addr) = spawn_axum(Router::new()).await;
        let (_upstream_h, upstream_addr) = spawn_axum(Router::new()).await;

        let cfg = relay_config(token_addr, upstream_addr, 0, "").await;
        let (_relay_h, relay_addr) = spawn_relay(&cfg).await;

        let response = build_reqwest_client()
            .get(format!("http://{}/metrics", relay_addr))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.text().await.unwrap().contains("tokenrelay_"));
    }
}
