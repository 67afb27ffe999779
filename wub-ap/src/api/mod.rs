//! HTTP control API
//!
//! REST endpoints for routine playback and the alarm, plus an SSE stream of
//! `WubEvent`s.

pub mod handlers;
pub mod server;
pub mod sse;

use crate::alarm::AlarmScheduler;
use crate::playback::SequencedAudioPlayer;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use wub_common::events::EventBus;
use wub_common::RoutineCatalog;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub player: Arc<SequencedAudioPlayer>,
    pub alarm: Arc<AlarmScheduler>,
    pub catalog: Arc<RoutineCatalog>,
    pub events: EventBus,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/build_info", get(handlers::build_info))
        .route("/routines", get(handlers::list_routines))
        // Playback control
        .route("/playback/play", post(handlers::play))
        .route("/playback/pause", post(handlers::pause))
        .route("/playback/resume", post(handlers::resume))
        .route("/playback/stop", post(handlers::stop))
        .route("/playback/seek", post(handlers::seek))
        .route("/playback/skip", post(handlers::skip))
        .route("/playback/status", get(handlers::status))
        // Alarm
        .route(
            "/alarm",
            get(handlers::get_alarm)
                .post(handlers::set_alarm)
                .delete(handlers::cancel_alarm),
        )
        // SSE event stream
        .route("/events", get(sse::event_stream))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
