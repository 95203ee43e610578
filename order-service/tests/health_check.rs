mod common;

use common::spawn_app;

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn health_check_works() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "order-service");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn readiness_check_works() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/ready"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn metrics_endpoint_returns_prometheus_format() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/metrics"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let content_type = response
        .headers()
        .get("content-type")
        .expect("Missing content-type header")
        .to_str()
        .expect("Invalid content-type")
        .to_string();
    assert!(content_type.starts_with("text/plain"));
}
