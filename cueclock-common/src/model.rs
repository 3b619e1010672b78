//! Rundown data model
//!
//! Parts, part instances, and the live playlist state are owned by the
//! business layer and replicated here read-only. The timing resolver never
//! mutates them; it only derives per-tick timing quantities from them.
//!
//! All durations and timestamps are signed 64-bit milliseconds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Stable identifier of a part (the smallest schedulable unit of a rundown)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartId(pub Uuid);

impl PartId {
    /// Generate a fresh random part id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PartId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a concrete on-air occurrence of a part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartInstanceId(pub Uuid);

impl PartInstanceId {
    /// Generate a fresh random instance id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PartInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One part of a rundown, as authored
///
/// `expected_duration` is the planned duration and may be absent or 0 for
/// untimed parts. `display_duration` is an operator override for the on-air
/// clock. Parts sharing a `display_duration_group` key pool their planned
/// durations into a shared on-screen budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: PartId,

    /// Planned duration in ms (absent or 0 for untimed parts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_duration: Option<i64>,

    /// Operator override for the displayed duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_duration: Option<i64>,

    /// Opaque key shared by sibling parts pooling their display budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_duration_group: Option<String>,

    /// Placeholder part absorbing schedule slack
    #[serde(default)]
    pub gap: bool,

    /// Part cannot be played as authored
    #[serde(default)]
    pub invalid: bool,

    /// Part is parked outside the running order
    #[serde(default)]
    pub floated: bool,

    /// Automatically take the next part when this one reaches its planned end
    #[serde(default)]
    pub auto_next: bool,
}

impl Part {
    /// Minimal part with only an id, everything else defaulted
    pub fn untimed(id: PartId) -> Self {
        Self {
            id,
            expected_duration: None,
            display_duration: None,
            display_duration_group: None,
            gap: false,
            invalid: false,
            floated: false,
            auto_next: false,
        }
    }

    /// Minimal part with a planned duration
    pub fn timed(id: PartId, expected_duration: i64) -> Self {
        Self {
            expected_duration: Some(expected_duration),
            ..Self::untimed(id)
        }
    }
}

/// Playback timestamps recorded on a part instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackTimings {
    /// Wall-clock ms at which playback of this instance started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_playback: Option<i64>,

    /// As-played total in ms, set once the instance has finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,

    /// Offset into the part content at which playback entered, in ms
    #[serde(default)]
    pub play_offset: i64,
}

/// A concrete on-air occurrence of a part
///
/// Parts without a live instance get a synthesized temporary instance with
/// empty timings, so the resolver always works on a uniform shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartInstance {
    pub id: PartInstanceId,
    pub part_id: PartId,

    #[serde(default)]
    pub timings: PlaybackTimings,
}

impl PartInstance {
    /// Live instance with empty timings
    pub fn new(id: PartInstanceId, part_id: PartId) -> Self {
        Self {
            id,
            part_id,
            timings: PlaybackTimings::default(),
        }
    }

    /// Synthesized stand-in for a part without a live instance
    ///
    /// The instance id is derived from the part id so repeated synthesis is
    /// deterministic and cacheable.
    pub fn temporary(part_id: PartId) -> Self {
        Self {
            id: PartInstanceId(part_id.0),
            part_id,
            timings: PlaybackTimings::default(),
        }
    }
}

/// Live state of the playlist driving a rundown
///
/// The pointers refer to part *instances*, not parts; a pointer whose
/// instance cannot be found in the rundown is treated as unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_part_instance: Option<PartInstanceId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_part_instance: Option<PartInstanceId>,

    /// Whether skipped parts still count toward planned/remaining totals
    #[serde(default)]
    pub out_of_order_timing: bool,

    /// Playlist is on air
    #[serde(default)]
    pub active: bool,

    /// Rundown wraps around after the last part
    #[serde(default, rename = "loop")]
    pub loop_enabled: bool,
}

/// Immutable view of one rundown, assembled once per tick
///
/// The `Arc` identity of `parts` doubles as the invalidation key for the
/// resolver's temporary-instance cache: replacing the part list yields a new
/// allocation, mutating-in-place is not supported.
#[derive(Debug, Clone)]
pub struct RundownView {
    /// Parts in running order
    pub parts: Arc<Vec<Part>>,

    /// Live instances by part id; parts not present get temporary instances
    pub instances: HashMap<PartId, PartInstance>,

    /// Live playlist state
    pub state: PlaylistState,
}

impl RundownView {
    /// View of an empty, inactive rundown
    pub fn empty() -> Self {
        Self {
            parts: Arc::new(Vec::new()),
            instances: HashMap::new(),
            state: PlaylistState::default(),
        }
    }
}
