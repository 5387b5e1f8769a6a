pub mod config;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod routes;
pub mod session;
pub mod state;
pub mod types;

use axum::Router;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::catalog::router())
        .merge(routes::sessions::router())
        .with_state(state)
}
