use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::pipeline::rasterize;
use crate::playback::PlaybackSnapshot;
use crate::session::SeekTarget;
use crate::state::AppState;
use crate::types::viz::{Coordinate, OutputConfig};

const MAX_WAIT_MS: u64 = 30_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:session_id/playback", get(playback))
        .route("/api/sessions/:session_id/active", put(select_route))
        .route("/api/sessions/:session_id/animation/toggle", post(toggle_animation))
        .route("/api/sessions/:session_id/seek", post(seek))
        .route("/api/sessions/:session_id/chart/click", post(chart_click))
        .route("/api/sessions/:session_id/location", put(report_location))
        .route("/api/sessions/:session_id/map.svg", get(map_svg))
        .route("/api/sessions/:session_id/map.png", get(map_png))
        .route("/api/sessions/:session_id/chart.svg", get(chart_svg))
        .route("/api/sessions/:session_id/chart.png", get(chart_png))
}

#[derive(Serialize)]
struct SessionResponse {
    session_id: String,
    center: Coordinate,
    playback: PlaybackSnapshot,
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionResponse>) {
    let (session_id, handle) = state.create_session();
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id,
            center: handle.center(),
            playback: handle.snapshot(),
        }),
    )
}

#[derive(Deserialize)]
struct PlaybackQuery {
    since: Option<u64>,
    wait_ms: Option<u64>,
}

/// Returns the current snapshot, or with `since` waits (bounded) for a newer one.
async fn playback(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<PlaybackQuery>,
) -> Result<Json<PlaybackSnapshot>, AppError> {
    let handle = state.session(&session_id)?;
    let Some(since) = query.since else {
        return Ok(Json(handle.snapshot()));
    };

    let mut rx = handle.subscribe();
    let wait = Duration::from_millis(query.wait_ms.unwrap_or(MAX_WAIT_MS).min(MAX_WAIT_MS));
    let newer = tokio::time::timeout(wait, rx.wait_for(|snapshot| snapshot.version > since)).await;
    let snapshot = match newer {
        Ok(Ok(snapshot)) => *snapshot,
        Ok(Err(_)) | Err(_) => handle.snapshot(),
    };
    Ok(Json(snapshot))
}

#[derive(Deserialize)]
struct SelectRouteRequest {
    route_id: Option<i64>,
}

async fn select_route(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SelectRouteRequest>,
) -> Result<Json<PlaybackSnapshot>, AppError> {
    let handle = state.session(&session_id)?;
    let snapshot = handle.select_route(req.route_id)?;
    tracing::info!("Session {} selected route {:?}", session_id, req.route_id);
    Ok(Json(snapshot))
}

async fn toggle_animation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<PlaybackSnapshot>, AppError> {
    let handle = state.session(&session_id)?;
    Ok(Json(handle.toggle_animation()?))
}

async fn seek(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(target): Json<SeekTarget>,
) -> Result<Json<PlaybackSnapshot>, AppError> {
    let handle = state.session(&session_id)?;
    Ok(Json(handle.seek(target)?))
}

#[derive(Deserialize)]
struct ChartClickRequest {
    x: f64,
}

#[derive(Serialize)]
struct ChartClickResponse {
    hit: bool,
    playback: PlaybackSnapshot,
}

async fn chart_click(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<ChartClickRequest>,
) -> Result<Json<ChartClickResponse>, AppError> {
    let handle = state.session(&session_id)?;
    let response = match handle.chart_click(req.x, &state.chart_options())? {
        Some(playback) => ChartClickResponse { hit: true, playback },
        None => ChartClickResponse {
            hit: false,
            playback: handle.snapshot(),
        },
    };
    Ok(Json(response))
}

async fn report_location(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(location): Json<Coordinate>,
) -> Result<Json<Coordinate>, AppError> {
    let handle = state.session(&session_id)?;
    Ok(Json(handle.report_location(location)))
}

async fn map_svg(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.session(&session_id)?;
    let svg = handle.render_map(&state.map_options())?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

async fn map_png(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.session(&session_id)?;
    let options = state.map_options();
    let svg = handle.render_map(&options)?;
    png_response(svg, OutputConfig::for_map(&options)).await
}

async fn chart_svg(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.session(&session_id)?;
    let svg = handle
        .render_chart(&state.chart_options())?
        .ok_or_else(|| AppError::BadRequest("No active route".to_string()))?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

async fn chart_png(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.session(&session_id)?;
    let options = state.chart_options();
    let svg = handle
        .render_chart(&options)?
        .ok_or_else(|| AppError::BadRequest("No active route".to_string()))?;
    png_response(svg, OutputConfig::for_chart(&options)).await
}

async fn png_response(svg: String, output: OutputConfig) -> Result<impl IntoResponse, AppError> {
    let png = tokio::task::spawn_blocking(move || rasterize::rasterize(&svg, &output))
        .await
        .map_err(|e| AppError::Internal(format!("Rasterize task failed: {}", e)))??;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], png))
}
