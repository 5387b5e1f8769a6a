use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::pipeline::progress::{distance_from_point_index, point_index_from_distance};
use crate::pipeline::{animate, render};
use crate::state::AppState;
use crate::types::route::{Route, RouteSummary};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/routes", get(list_routes))
        .route("/api/routes/reload", post(reload_routes))
        .route("/api/routes/:route_id", get(get_route))
        .route("/api/routes/:route_id/progress", get(progress))
        .route("/api/routes/:route_id/chart", get(chart))
        .route("/api/routes/:route_id/animation", get(animation))
}

async fn list_routes(State(state): State<AppState>) -> Json<Vec<RouteSummary>> {
    Json(
        state
            .catalog()
            .all()
            .iter()
            .map(|route| route.summary())
            .collect(),
    )
}

/// Re-reads the routes source. Distances follow after the usual delay.
async fn reload_routes(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = state.refresh_catalog().await?;
    let enrich_state = state.clone();
    tokio::spawn(async move {
        enrich_state.enrich_after_delay().await;
    });
    Ok(Json(serde_json::json!({ "routes": count })))
}

async fn get_route(
    State(state): State<AppState>,
    Path(route_id): Path<i64>,
) -> Result<Json<Route>, AppError> {
    let route = state.route(route_id)?;
    Ok(Json((*route).clone()))
}

#[derive(Deserialize)]
struct ProgressQuery {
    distance: Option<f64>,
    point_index: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct ProgressResponse {
    route_id: i64,
    distance: f64,
    point_index: usize,
}

async fn progress(
    State(state): State<AppState>,
    Path(route_id): Path<i64>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<ProgressResponse>, AppError> {
    let route = state.route(route_id)?;
    let (distance, point_index) = match (query.distance, query.point_index) {
        (Some(distance), None) => {
            if !(0.0..=1.0).contains(&distance) {
                return Err(AppError::BadRequest(format!(
                    "Invalid distance: {}. Must be between 0 and 1",
                    distance
                )));
            }
            let idx = point_index_from_distance(distance, &route.points, route.all_distance);
            (distance, idx)
        }
        (None, Some(point_index)) => {
            if point_index >= route.points.len() {
                return Err(AppError::BadRequest(format!(
                    "Invalid point_index: {}. Route has {} points",
                    point_index,
                    route.points.len()
                )));
            }
            let distance = distance_from_point_index(point_index, &route.points, route.all_distance);
            (distance, point_index)
        }
        _ => {
            return Err(AppError::BadRequest(
                "Provide exactly one of distance or point_index".to_string(),
            ))
        }
    };

    Ok(Json(ProgressResponse {
        route_id,
        distance,
        point_index,
    }))
}

async fn chart(
    State(state): State<AppState>,
    Path(route_id): Path<i64>,
) -> Result<Json<render::ChartData>, AppError> {
    let route = state.route(route_id)?;
    Ok(Json(render::chart_data(&route)))
}

#[derive(Deserialize)]
struct AnimationQuery {
    frames: Option<u32>,
}

async fn animation(
    State(state): State<AppState>,
    Path(route_id): Path<i64>,
    Query(query): Query<AnimationQuery>,
) -> Result<impl IntoResponse, AppError> {
    let route = state.route(route_id)?;
    let options = state.map_options();
    let frames = query.frames.unwrap_or(60);
    let speed = state.config().animation_speed;

    tracing::info!(
        "Generating marker animation for route {} ({}x{}, {} frames)",
        route_id,
        options.width,
        options.height,
        frames
    );

    let bytes = tokio::task::spawn_blocking(move || animate::render_apng(&route, &options, frames, speed))
        .await
        .map_err(|e| AppError::Internal(format!("Animation task failed: {}", e)))??;

    tracing::info!("Generated APNG: {} bytes", bytes.len());

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/apng")], bytes))
}
