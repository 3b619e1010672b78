//! HTTP server for cueclock-td
//!
//! The in-process subscription hub is the primary contract; this surface
//! exposes the same snapshots to remote consumers, plus the input endpoints
//! the business layer uses to feed the rundown in.

use crate::scheduler::TickScheduler;
use crate::sources::SharedRundown;
use crate::sse::{snapshot_stream, EventBroadcaster};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{KeepAlive, Sse},
    response::Json,
    routing::{get, put},
    Router,
};
use cueclock_common::events::TimingEvent;
use cueclock_common::model::{Part, PartInstance, PlaylistState};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<TickScheduler>,
    pub rundown: SharedRundown,
    pub events: EventBroadcaster,
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
        .route("/timing", get(latest_timing))
        .route("/events", get(timing_events))
        .route("/notifications", get(notifications))
        .route("/rundown", put(put_rundown))
        .route("/playlist", put(put_playlist))
        .route("/instances", put(put_instances))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("HTTP server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Status endpoint
async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "service": "cueclock-td",
        "version": env!("CARGO_PKG_VERSION"),
        "running": state.scheduler.is_running(),
        "parts": state.rundown.part_count(),
        "subscribers": state.scheduler.hub().subscriber_count(),
        "notificationClients": state.events.client_count(),
    }))
}

/// Latest timing snapshot; 404 until the first tick has resolved
async fn latest_timing(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.scheduler.latest() {
        Some(ctx) => Ok(Json(
            serde_json::to_value(ctx.as_ref()).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
        )),
        None => Err(StatusCode::NOT_FOUND),
    }
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    cadence: Option<String>,
}

/// SSE stream of timing snapshots on the requested cadence (default low)
async fn timing_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>>, StatusCode>
{
    let rx = match query.cadence.as_deref() {
        Some("high") => state.scheduler.subscribe_high_channel(),
        Some("low") | None => state.scheduler.subscribe_low_channel(),
        Some(_) => return Err(StatusCode::BAD_REQUEST),
    };

    Ok(Sse::new(snapshot_stream(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    ))
}

/// SSE stream of out-of-band notification events
async fn notifications(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    state.events.handle_sse_connection()
}

/// Replace the part list wholesale
async fn put_rundown(
    State(state): State<AppState>,
    Json(parts): Json<Vec<Part>>,
) -> StatusCode {
    let part_count = parts.len();
    state.rundown.replace_parts(parts);
    state.events.broadcast_lossy(TimingEvent::RundownReplaced {
        part_count,
        timestamp: chrono::Utc::now(),
    });
    state.scheduler.force_resync();
    StatusCode::NO_CONTENT
}

/// Replace the live playlist state
async fn put_playlist(
    State(state): State<AppState>,
    Json(playlist): Json<PlaylistState>,
) -> StatusCode {
    state.rundown.set_playlist_state(playlist.clone());
    state
        .events
        .broadcast_lossy(TimingEvent::PlaylistStateChanged {
            state: playlist,
            timestamp: chrono::Utc::now(),
        });
    state.scheduler.force_resync();
    StatusCode::NO_CONTENT
}

/// Replace the active part-instance map
async fn put_instances(
    State(state): State<AppState>,
    Json(instances): Json<Vec<PartInstance>>,
) -> StatusCode {
    let instance_count = instances.len();
    state.rundown.set_instances(instances);
    state.events.broadcast_lossy(TimingEvent::InstancesReplaced {
        instance_count,
        timestamp: chrono::Utc::now(),
    });
    state.scheduler.force_resync();
    StatusCode::NO_CONTENT
}
