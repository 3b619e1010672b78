//! Event types for the CueClock notification stream
//!
//! Timing snapshots themselves travel on the high/low cadence channels; the
//! events here are the out-of-band notifications (input replacement,
//! scheduler lifecycle) a remote consumer needs to re-read state promptly.

use crate::model::PlaylistState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CueClock notification event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TimingEvent {
    /// The part list was replaced wholesale
    RundownReplaced {
        part_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The live playlist state (current/next pointers, flags) changed
    PlaylistStateChanged {
        state: PlaylistState,
        timestamp: DateTime<Utc>,
    },

    /// The active part-instance map was replaced
    InstancesReplaced {
        instance_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The tick scheduler started producing snapshots
    SchedulerStarted {
        tick_interval_us: u64,
        timestamp: DateTime<Utc>,
    },

    /// The tick scheduler stopped; the last snapshot stays readable
    SchedulerStopped { timestamp: DateTime<Utc> },
}

impl TimingEvent {
    /// Event type name as used on the SSE wire
    pub fn event_name(&self) -> &'static str {
        match self {
            TimingEvent::RundownReplaced { .. } => "rundown_replaced",
            TimingEvent::PlaylistStateChanged { .. } => "playlist_state_changed",
            TimingEvent::InstancesReplaced { .. } => "instances_replaced",
            TimingEvent::SchedulerStarted { .. } => "scheduler_started",
            TimingEvent::SchedulerStopped { .. } => "scheduler_stopped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn events_tag_by_type() {
        let event = TimingEvent::RundownReplaced {
            part_count: 12,
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "RundownReplaced");
        assert_eq!(value["part_count"], 12);
        assert_eq!(event.event_name(), "rundown_replaced");
    }
}
