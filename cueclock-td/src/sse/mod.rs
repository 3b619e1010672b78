//! SSE support for remote timing consumers

pub mod broadcaster;

pub use broadcaster::EventBroadcaster;

use axum::response::sse::Event;
use cueclock_common::timing::TimingContext;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

/// Map a snapshot channel onto an SSE stream
///
/// Each snapshot serializes flat, so remote consumers see the documented
/// camelCase field names directly in the event payload.
pub fn snapshot_stream(
    rx: broadcast::Receiver<Arc<TimingContext>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(ctx) => Event::default()
                .event("timing_update")
                .json_data(ctx.as_ref())
                .ok()
                .map(Ok),
            Err(e) => {
                // Lagged receivers just skip ahead to current snapshots
                warn!("SSE timing client lagged: {:?}", e);
                None
            }
        }
    })
}
