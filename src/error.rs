use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("Read failed: {0}")]
    Io(String),
    #[error("Invalid CSV: {0}")]
    Csv(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Route {0} has no points to draw")]
    EmptyRoute(i64),
    #[error("Cannot lay out drawing: {0}")]
    Canvas(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("Rasterizing failed: {0}")]
    RenderFailed(String),
    #[error("Traversal animation failed: {0}")]
    AnimationFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("Route not found: {0}")]
    RouteNotFound(i64),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RouteNotFound(_) | AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            // the routes file lives upstream
            AppError::Load(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) | AppError::Render(_) | AppError::Raster(_) => {
                tracing::error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
