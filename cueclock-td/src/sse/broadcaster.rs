//! SSE broadcaster for out-of-band notification events

use axum::response::sse::{Event, KeepAlive, Sse};
use cueclock_common::events::TimingEvent;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

/// Broadcaster managing notification distribution to SSE clients
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<TimingEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer per lagging client
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Broadcast an event, ignoring if no clients are connected
    pub fn broadcast_lossy(&self, event: TimingEvent) {
        debug!("Broadcasting {}", event.event_name());
        let _ = self.tx.send(event);
    }

    /// Get current number of connected clients
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Create an SSE stream for a new client connection
    pub fn subscribe_stream(&self) -> impl Stream<Item = Result<Event, Infallible>> {
        let rx = self.tx.subscribe();
        let stream = BroadcastStream::new(rx);

        stream.filter_map(|result| async move {
            match result {
                Ok(timing_event) => Event::default()
                    .event(timing_event.event_name())
                    .json_data(&timing_event)
                    .ok()
                    .map(Ok),
                Err(e) => {
                    warn!("SSE notification client lagged: {:?}", e);
                    None
                }
            }
        })
    }

    /// Create an Axum SSE response for GET /notifications
    pub fn handle_sse_connection(&self) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        info!(
            "New notification client connected, total clients: {}",
            self.client_count() + 1
        );

        Sse::new(self.subscribe_stream()).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("keep-alive"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn broadcast_reaches_subscriber() {
        let broadcaster = EventBroadcaster::new(8);
        let mut rx = broadcaster.tx.subscribe();

        broadcaster.broadcast_lossy(TimingEvent::SchedulerStopped {
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_name(), "scheduler_stopped");
    }

    #[test]
    fn broadcast_without_clients_is_fine() {
        let broadcaster = EventBroadcaster::new(8);
        assert_eq!(broadcaster.client_count(), 0);
        broadcaster.broadcast_lossy(TimingEvent::SchedulerStopped {
            timestamp: Utc::now(),
        });
    }
}
