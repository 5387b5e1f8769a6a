mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn health_returns_ok() {
    let app = common::test_app();
    let response = common::send(&app, "GET", "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let text = common::text_body(response).await;
    assert!(text.contains("\"status\":\"ok\""));
    assert!(text.contains("\"routes\":2"));
}
