//! HTTP request handlers

use crate::alarm::AlarmSettings;
use crate::api::AppState;
use crate::audio::BackendKind;
use crate::error::Error;
use crate::playback::PlaybackSnapshot;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use wub_common::human_time::format_clock;
use wub_common::RoutineCatalog;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    backend: BackendKind,
}

#[derive(Debug, Serialize)]
pub struct BuildInfoResponse {
    version: String,
    git_hash: String,
    build_timestamp: String,
    build_profile: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayRequest {
    /// Routine to play; the catalog's first routine when omitted
    #[serde(default)]
    routine_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlayResponse {
    success: bool,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    position_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct SkipRequest {
    offset_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    position_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct PlaybackStatusResponse {
    #[serde(flatten)]
    snapshot: PlaybackSnapshot,
    position_display: String,
    duration_display: String,
}

#[derive(Debug, Deserialize)]
pub struct AlarmRequest {
    hour: u32,
    minute: u32,
    #[serde(default)]
    routine_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AlarmResponse {
    alarm: Option<AlarmSettings>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) | Error::Common(wub_common::Error::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Error::BadRequest(_) | Error::Common(wub_common::Error::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            Error::InvalidState(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(StatusResponse {
                status: format!("error: {}", self),
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Service Endpoints
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "wub-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.player.backend_kind(),
    })
}

/// GET /build_info
pub async fn build_info() -> Json<BuildInfoResponse> {
    Json(BuildInfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("WUB_GIT_HASH").to_string(),
        build_timestamp: env!("WUB_BUILD_TIMESTAMP").to_string(),
        build_profile: env!("WUB_BUILD_PROFILE").to_string(),
    })
}

/// GET /routines
pub async fn list_routines(State(state): State<AppState>) -> Json<RoutineCatalog> {
    Json(state.catalog.as_ref().clone())
}

// ============================================================================
// Playback Endpoints
// ============================================================================

/// POST /playback/play
///
/// Body is optional; `{"routine_id": "..."}` selects a routine.
pub async fn play(State(state): State<AppState>, body: Bytes) -> Result<Json<PlayResponse>, Error> {
    let request: PlayRequest = if body.is_empty() {
        PlayRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::BadRequest(format!("Invalid play request: {}", e)))?
    };

    let routine = match request.routine_id.as_deref() {
        Some(id) => state.catalog.require(id)?,
        None => state.catalog.first(),
    };

    let success = state.player.play_routine(routine).await;
    if success {
        info!("Play command succeeded for routine '{}'", routine.id);
    } else {
        error!("Play command failed for routine '{}'", routine.id);
    }

    Ok(Json(PlayResponse { success }))
}

/// POST /playback/pause
pub async fn pause(State(state): State<AppState>) -> Json<PlaybackSnapshot> {
    state.player.pause().await;
    Json(state.player.snapshot().await)
}

/// POST /playback/resume
pub async fn resume(State(state): State<AppState>) -> Json<PlaybackSnapshot> {
    state.player.resume().await;
    Json(state.player.snapshot().await)
}

/// POST /playback/stop
pub async fn stop(State(state): State<AppState>) -> Json<PlaybackSnapshot> {
    state.player.stop().await;
    Json(state.player.snapshot().await)
}

/// POST /playback/seek - absolute position on the routine timeline
pub async fn seek(
    State(state): State<AppState>,
    Json(request): Json<SeekRequest>,
) -> Result<Json<PositionResponse>, Error> {
    let position_ms = state
        .player
        .set_position(request.position_ms)
        .await
        .ok_or_else(|| Error::InvalidState("No seekable stage is playing".to_string()))?;

    Ok(Json(PositionResponse { position_ms }))
}

/// POST /playback/skip - relative seek (negative skips back)
pub async fn skip(
    State(state): State<AppState>,
    Json(request): Json<SkipRequest>,
) -> Result<Json<PositionResponse>, Error> {
    let position_ms = state
        .player
        .seek_by(request.offset_ms)
        .await
        .ok_or_else(|| Error::InvalidState("No seekable stage is playing".to_string()))?;

    Ok(Json(PositionResponse { position_ms }))
}

/// GET /playback/status
pub async fn status(State(state): State<AppState>) -> Json<PlaybackStatusResponse> {
    let snapshot = state.player.snapshot().await;

    Json(PlaybackStatusResponse {
        position_display: format_clock(snapshot.status.position_ms),
        duration_display: format_clock(snapshot.status.duration_ms),
        snapshot,
    })
}

// ============================================================================
// Alarm Endpoints
// ============================================================================

/// GET /alarm
pub async fn get_alarm(State(state): State<AppState>) -> Json<AlarmResponse> {
    Json(AlarmResponse {
        alarm: state.alarm.settings(),
    })
}

/// POST /alarm - schedule the daily alarm
pub async fn set_alarm(
    State(state): State<AppState>,
    Json(request): Json<AlarmRequest>,
) -> Result<Json<AlarmResponse>, Error> {
    let time = NaiveTime::from_hms_opt(request.hour, request.minute, 0).ok_or_else(|| {
        Error::BadRequest(format!(
            "Invalid alarm time {:02}:{:02}",
            request.hour, request.minute
        ))
    })?;

    let routine = match request.routine_id.as_deref() {
        Some(id) => state.catalog.require(id)?,
        None => state.catalog.first(),
    };

    if !state.alarm.schedule(time, routine.clone()) {
        warn!("Alarm scheduling failed");
        return Err(Error::Internal("Failed to schedule alarm".to_string()));
    }

    Ok(Json(AlarmResponse {
        alarm: state.alarm.settings(),
    }))
}

/// DELETE /alarm
pub async fn cancel_alarm(State(state): State<AppState>) -> Json<AlarmResponse> {
    state.alarm.cancel();
    Json(AlarmResponse {
        alarm: state.alarm.settings(),
    })
}
