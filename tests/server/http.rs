//! HTTP transport tests.
//!
//! Starts an axum server and exercises it with reqwest.

use std::sync::Arc;

use serde_json::json;
use sups_rust::{http, Server};

use crate::support::{server, PASSWORD};

/// Bind to port 0 and return the actual address.
async fn start_server(server: Server) -> String {
    let app = http::router(Arc::new(server));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn preflight_over_http() {
    let base = start_server(server()).await;
    let client = reqwest::Client::new();

    let resp = client
        .request(reqwest::Method::OPTIONS, format!("{base}/data/recipes"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        resp.headers()["access-control-allow-headers"],
        "X-Requested-With, X-HTTP-Method-Override, Content-Type, Accept, X-Authorization, X-Admin"
    );
}

#[tokio::test]
async fn login_and_create_over_http() {
    let base = start_server(server()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/users/login"))
        .json(&json!({ "email": "john@abv.bg", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let user: serde_json::Value = resp.json().await.unwrap();
    let token = user["accessToken"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{base}/data/recipes"))
        .header("X-Authorization", &token)
        .json(&json!({ "name": "Omelette" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let created: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(created["_ownerId"], user["_id"]);

    let resp = client
        .get(format!("{base}/data/recipes?where=name%3D%22Omelette%22"))
        .send()
        .await
        .unwrap();
    let found: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(found, json!([created]));
}

#[tokio::test]
async fn errors_and_empty_results_over_http() {
    let base = start_server(server()).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/data/nothing")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers()["content-type"], "application/json");
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "code": 404, "message": "Resource not found" }));

    let resp = client
        .get(format!("{base}/users/logout"))
        .header("X-Authorization", "stale")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client.get(format!("{base}/util/unknown")).send().await.unwrap();
    assert_eq!(resp.status(), 204);
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn throttled_responses_are_delayed() {
    let base = start_server(server()).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/util"))
        .json(&json!({ "throttle": true }))
        .send()
        .await
        .unwrap();

    let started = std::time::Instant::now();
    let resp = client.get(format!("{base}/data")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(started.elapsed() >= std::time::Duration::from_millis(500));
}
