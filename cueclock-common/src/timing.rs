//! Per-tick rundown timing snapshot
//!
//! A [`TimingContext`] is produced by the resolver once per tick and handed
//! to consumers as an immutable value. Countdown clocks, over/under
//! indicators and auto-advance logic all read from the same snapshot, so
//! every display derives from identical numbers.
//!
//! # Conventions
//!
//! - All quantities are signed 64-bit milliseconds.
//! - Per-part maps contain an entry for **every** part of the input rundown;
//!   consumers reading a part that is somehow missing must default to 0
//!   (or absent, for countdowns). The accessors on this type do exactly that.
//! - `remaining_time_on_current_part` is a "time past deadline" signal:
//!   negative while there is time left, and ≥ 0 from the planned end onward.
//! - `part_countdown` maps to `None` for parts that are unreachable in the
//!   current linear order (before the next part, no looping).
//!
//! Snapshots serialize flat, camelCase, so a remote consumer sees the field
//! names `partDurations`, `remainingTimeOnCurrentPart`, `isLowResolution`
//! and so on verbatim.

use crate::model::PartId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete timing state of one rundown at one instant
///
/// Created by the resolver, owned by the tick scheduler, and shared with
/// subscribers behind an `Arc`. Never mutated after creation; each tick
/// replaces the previous snapshot wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingContext {
    /// Wall-clock ms this snapshot was computed at
    pub current_time: i64,

    /// True for snapshots published on the low-frequency cadence
    pub is_low_resolution: bool,

    /// Sum of planned durations over all parts
    pub total_rundown_duration: i64,

    /// Planned time left: not-yet-started counted parts plus the positive
    /// remainder of the running current part
    pub remaining_rundown_duration: i64,

    /// Rundown total with as-played values where known, planned values only
    /// for parts that count under the play-counting policy
    pub as_played_rundown_duration: i64,

    /// Rundown total with as-played values where known, planned values
    /// everywhere else
    pub as_displayed_rundown_duration: i64,

    /// Signed ms relative to the current part's planned end (negative =
    /// time left); absent when nothing is on air
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_time_on_current_part: Option<i64>,

    /// True when the current part will advance on its own at its planned end
    pub current_part_will_auto_next: bool,

    /// Effective duration of each part along the timeline
    pub part_durations: HashMap<PartId, i64>,

    /// As-played duration where final, else planned duration, per part
    pub part_expected_durations: HashMap<PartId, i64>,

    /// On-air display duration of each part (group pooling applied, ≥ 0)
    pub part_display_durations: HashMap<PartId, i64>,

    /// Timeline offset of each part, from summed part durations
    pub part_starts_at: HashMap<PartId, i64>,

    /// Timeline offset of each part, from summed display durations
    pub part_display_starts_at: HashMap<PartId, i64>,

    /// Milliseconds already played of each part
    pub part_played: HashMap<PartId, i64>,

    /// Signed ms from now until each part is expected on air along the
    /// current linear order; `None` = unreachable
    pub part_countdown: HashMap<PartId, Option<i64>>,
}

impl TimingContext {
    /// Effective duration of a part, 0 when unknown
    pub fn part_duration(&self, id: &PartId) -> i64 {
        self.part_durations.get(id).copied().unwrap_or(0)
    }

    /// Planned (or as-played, once final) duration of a part, 0 when unknown
    pub fn part_expected_duration(&self, id: &PartId) -> i64 {
        self.part_expected_durations.get(id).copied().unwrap_or(0)
    }

    /// Display duration of a part, 0 when unknown
    pub fn part_display_duration(&self, id: &PartId) -> i64 {
        self.part_display_durations.get(id).copied().unwrap_or(0)
    }

    /// Timeline offset of a part, 0 when unknown
    pub fn part_starts_at(&self, id: &PartId) -> i64 {
        self.part_starts_at.get(id).copied().unwrap_or(0)
    }

    /// Display-timeline offset of a part, 0 when unknown
    pub fn part_display_starts_at(&self, id: &PartId) -> i64 {
        self.part_display_starts_at.get(id).copied().unwrap_or(0)
    }

    /// Milliseconds played of a part, 0 when unknown
    pub fn part_played(&self, id: &PartId) -> i64 {
        self.part_played.get(id).copied().unwrap_or(0)
    }

    /// Countdown to a part, `None` when unreachable or unknown
    pub fn part_countdown(&self, id: &PartId) -> Option<i64> {
        self.part_countdown.get(id).copied().flatten()
    }

    /// Number of parts covered by this snapshot
    pub fn part_count(&self) -> usize {
        self.part_durations.len()
    }
}
