#![allow(dead_code)]

use axum::{body::to_bytes, http::Request, response::Response, Router};
use routeplay_rs::{app, config::Config, pipeline::load, state::AppState};
use serde_json::Value;
use tower::ServiceExt;

pub const SAMPLE_CSV: &str = "\"route_id\",\"from_port\",\"to_port\",\"leg_duration\",\"points\"\r\n\
\"1\",\"Rotterdam\",\"Hamburg\",\"20\",\"[[4.47,51.92,0,0],[6.5,53.5,10,2],[9.97,53.54,20,3]]\"\r\n\
\"2\",\"Hamburg\",\"Oslo\",\"30\",\"\"\r\n\
\"3\",\"Oslo\",\"Bergen\",\"12\",\"[[10.75,59.91,0,5],[5.32,60.39,60,10]]\"\r\n";

pub fn state_with_routes() -> AppState {
    let state = AppState::new(Config::default());
    let routes = load::parse_routes(SAMPLE_CSV).expect("sample csv");
    state.catalog().replace(routes);
    state.catalog().enrich();
    state
}

pub fn test_app() -> Router {
    app(state_with_routes())
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().uri(uri).method(method);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(json.to_string())),
        None => builder.body(axum::body::Body::empty()),
    }
    .expect("request");
    app.clone().oneshot(request).await.expect("response")
}

pub async fn json_body(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&body).expect("json body")
}

pub async fn text_body(response: Response) -> String {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    String::from_utf8(body.to_vec()).expect("utf8")
}
