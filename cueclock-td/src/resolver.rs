//! Part timeline resolver
//!
//! Derives the complete [`TimingContext`] for a rundown from the ordered
//! part list, the live instance pointers, and the wall clock. Invoked once
//! per tick, up to 60 times a second, so the whole computation is a single
//! forward pass plus one linearization pass — no allocation beyond the
//! output maps, no I/O.
//!
//! **Algorithm:**
//! 1. Resolve each part's effective instance (live, or a cached temporary).
//! 2. Decide whether the part still counts toward planned totals.
//! 3. Pool display durations across sibling parts sharing a group key.
//! 4. Compute the duration variants, branching on "playing right now".
//! 5. Accumulate the rundown-level totals.
//! 6. Record timeline offsets, then advance the accumulators.
//! 7. Linearize countdown offsets around the next part, wrapping when the
//!    rundown loops.

use cueclock_common::model::{Part, PartId, PartInstance, RundownView};
use cueclock_common::timing::TimingContext;
use std::collections::HashMap;
use std::sync::Arc;

/// Floor for a gap part's pooled display share: compresses toward zero but
/// never reaches it
pub const MINIMAL_DISPLAY_DURATION_MS: i64 = 1;

/// Cache of synthesized instances for parts that have no live instance
///
/// Evicted wholesale whenever the part list identity changes, so repeated
/// ticks over an unchanged rundown reuse the same entries.
#[derive(Debug, Default)]
struct TempInstanceCache {
    parts_identity: Option<Arc<Vec<Part>>>,
    instances: HashMap<PartId, PartInstance>,
}

impl TempInstanceCache {
    fn sync(&mut self, parts: &Arc<Vec<Part>>, live: &HashMap<PartId, PartInstance>) {
        let same_parts = self
            .parts_identity
            .as_ref()
            .map_or(false, |known| Arc::ptr_eq(known, parts));
        if !same_parts {
            self.instances.clear();
            self.parts_identity = Some(Arc::clone(parts));
        }

        for part in parts.iter() {
            if !live.contains_key(&part.id) {
                self.instances
                    .entry(part.id)
                    .or_insert_with(|| PartInstance::temporary(part.id));
            }
        }
    }

    fn get(&self, id: &PartId) -> Option<&PartInstance> {
        self.instances.get(id)
    }

    fn len(&self) -> usize {
        self.instances.len()
    }
}

/// Part timeline resolver
///
/// Holds only the temporary-instance cache between ticks; results are
/// identical with a cold cache, the cache just keeps repeated ticks cheap.
/// One resolver per scheduler, never shared.
#[derive(Debug, Default)]
pub struct TimingResolver {
    temp_instances: TempInstanceCache,
}

impl TimingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached temporary instances (diagnostics and tests)
    pub fn cached_temporary_instances(&self) -> usize {
        self.temp_instances.len()
    }

    /// Compute the timing snapshot for `rundown` at wall-clock `now`
    ///
    /// `default_duration` is the fallback display duration for parts with no
    /// usable planned duration. `low_resolution` only tags the snapshot; it
    /// does not change any computed value.
    pub fn resolve(
        &mut self,
        rundown: &RundownView,
        now: i64,
        default_duration: i64,
        low_resolution: bool,
    ) -> TimingContext {
        let parts: &[Part] = &rundown.parts;
        let n = parts.len();

        self.temp_instances.sync(&rundown.parts, &rundown.instances);
        let effective: Vec<&PartInstance> = parts
            .iter()
            .map(|part| {
                rundown
                    .instances
                    .get(&part.id)
                    .or_else(|| self.temp_instances.get(&part.id))
                    .expect("temporary instance cache is synced with the part list")
            })
            .collect();

        let state = &rundown.state;
        let mut current_index = None;
        let mut next_index = None;
        for (i, instance) in effective.iter().enumerate() {
            if state.current_part_instance == Some(instance.id) {
                current_index = Some(i);
            }
            if state.next_part_instance == Some(instance.id) {
                next_index = Some(i);
            }
        }
        // The counting cutoff: the current part when known, the next part
        // only when no current is known.
        let cutoff = current_index.or(next_index);

        let mut part_durations = HashMap::with_capacity(n);
        let mut part_expected_durations = HashMap::with_capacity(n);
        let mut part_display_durations = HashMap::with_capacity(n);
        let mut part_starts_at = HashMap::with_capacity(n);
        let mut part_display_starts_at = HashMap::with_capacity(n);
        let mut part_played = HashMap::with_capacity(n);

        let mut total_rundown_duration = 0i64;
        let mut as_played_rundown_duration = 0i64;
        let mut as_displayed_rundown_duration = 0i64;
        let mut remaining_rundown_duration = 0i64;

        let mut wait_accumulator = 0i64;
        let mut starts_at_accumulator = 0i64;
        let mut display_starts_at_accumulator = 0i64;
        let mut display_duration_groups: HashMap<&str, i64> = HashMap::new();
        let mut linear_parts: Vec<(PartId, i64)> = Vec::with_capacity(n);

        let mut current_remaining = 0i64;
        // (started_playback, final duration, no-playback display duration)
        let mut current_on_air: Option<(Option<i64>, Option<i64>, i64)> = None;

        for (index, part) in parts.iter().enumerate() {
            let timings = &effective[index].timings;
            let started = timings.started_playback;
            let duration = timings.duration;
            let play_offset = timings.play_offset;
            let expected = part.expected_duration;
            let is_current = current_index == Some(index);

            let part_counts = state.out_of_order_timing
                || !state.active
                || cutoff.map_or(false, |c| index >= c);

            // Group pooling: join only if an earlier sibling started the
            // pool or a later sibling shares the key, and never while
            // floated. Joining contributes this part's planned duration.
            let mut group_display_duration: Option<i64> = None;
            if let Some(group) = part.display_duration_group.as_deref() {
                if !part.floated {
                    let pool_started = display_duration_groups.contains_key(group);
                    let joins_pool = pool_started
                        || parts[index + 1..]
                            .iter()
                            .any(|p| p.display_duration_group.as_deref() == Some(group));
                    if joins_pool {
                        let budget = display_duration_groups.entry(group).or_insert(0);
                        *budget += expected.unwrap_or(0);
                        let floor = if part.gap {
                            MINIMAL_DISPLAY_DURATION_MS
                        } else {
                            default_duration
                        };
                        group_display_duration = Some(
                            part.display_duration
                                .unwrap_or_else(|| (*budget).max(floor).max(0)),
                        );
                    }
                }
            }
            let member_of_group = group_display_duration.is_some();

            let playing = started.is_some() && duration.is_none();
            let pooled_or_expected = if member_of_group {
                group_display_duration
            } else {
                expected
            };

            let part_duration;
            let mut display_duration;
            let display_duration_no_playback;
            let mut played;

            if playing {
                let since_start = now - started.unwrap_or(now);
                part_duration =
                    duration.or(expected).unwrap_or(0).max(since_start) - play_offset;
                display_duration_no_playback =
                    duration.or(pooled_or_expected).unwrap_or(default_duration);
                display_duration = display_duration_no_playback.max(since_start);
                played = since_start;
                if is_current {
                    current_remaining =
                        (duration.or(pooled_or_expected).unwrap_or(0) - since_start).max(0);
                }
            } else {
                part_duration = duration.or(expected).unwrap_or(0) - play_offset;
                display_duration = duration
                    .map(|d| d + play_offset)
                    .or(group_display_duration)
                    .or(expected)
                    .unwrap_or(default_duration)
                    .max(0);
                display_duration_no_playback = display_duration;
                played = duration.unwrap_or(0) - play_offset;
            }

            // Pre-roll: the current part is cued but has not started yet
            if is_current && started.is_none() {
                current_remaining = display_duration;
            }

            if part.invalid && !part.gap {
                display_duration = default_duration;
                played = 0;
            }

            // Charge the pool for members that actually consume budget
            if member_of_group
                && !part.floated
                && !part.invalid
                && (duration.is_some() || part_counts)
            {
                if let Some(group) = part.display_duration_group.as_deref() {
                    if let Some(budget) = display_duration_groups.get_mut(group) {
                        *budget -= display_duration;
                    }
                }
            }

            if is_current {
                current_on_air = Some((started, duration, display_duration_no_playback));
            }

            total_rundown_duration += expected.unwrap_or(0);
            let displayed_base = duration.or(expected).unwrap_or(0);
            if playing {
                let playing_max = displayed_base.max(now - started.unwrap_or(now));
                as_displayed_rundown_duration += playing_max;
                as_played_rundown_duration += playing_max;
            } else {
                as_displayed_rundown_duration += displayed_base;
                as_played_rundown_duration += match duration {
                    Some(d) => d,
                    None if part_counts => expected.unwrap_or(0),
                    None => 0,
                };
            }

            if is_current && playing {
                remaining_rundown_duration += current_remaining;
            } else if started.is_none() && !part.floated && part_counts {
                remaining_rundown_duration += expected.unwrap_or(0);
            }

            part_starts_at.insert(part.id, starts_at_accumulator);
            part_display_starts_at.insert(part.id, display_starts_at_accumulator);
            starts_at_accumulator += part_duration;
            display_starts_at_accumulator += display_duration;

            part_durations.insert(part.id, part_duration);
            part_expected_durations.insert(part.id, duration.or(expected).unwrap_or(0));
            part_display_durations.insert(part.id, display_duration);
            part_played.insert(part.id, played);

            linear_parts.push((part.id, wait_accumulator));
            wait_accumulator += if member_of_group {
                duration.unwrap_or(display_duration)
            } else {
                duration.or(expected).unwrap_or(0)
            };
        }

        let part_countdown = linearize_countdowns(
            &linear_parts,
            next_index,
            current_remaining,
            wait_accumulator,
            state.loop_enabled,
        );

        let remaining_time_on_current_part =
            current_on_air.map(|(started, duration, no_playback)| {
                let on_air_duration = duration.unwrap_or(no_playback);
                match started {
                    Some(started_at) => now - (started_at + on_air_duration),
                    None => -on_air_duration,
                }
            });

        let current_part_will_auto_next = current_index.map_or(false, |i| {
            parts[i].auto_next && parts[i].expected_duration.map_or(false, |d| d != 0)
        });

        TimingContext {
            current_time: now,
            is_low_resolution: low_resolution,
            total_rundown_duration,
            remaining_rundown_duration,
            as_played_rundown_duration,
            as_displayed_rundown_duration,
            remaining_time_on_current_part,
            current_part_will_auto_next,
            part_durations,
            part_expected_durations,
            part_display_durations,
            part_starts_at,
            part_display_starts_at,
            part_played,
            part_countdown,
        }
    }
}

/// Second pass: rebase recorded wait offsets around the next part
///
/// Parts before the next part are unreachable in linear order unless the
/// rundown loops, in which case they come around after the tail. Without a
/// known next part every offset stands as recorded.
fn linearize_countdowns(
    linear_parts: &[(PartId, i64)],
    next_index: Option<usize>,
    current_remaining: i64,
    total_wait: i64,
    loop_enabled: bool,
) -> HashMap<PartId, Option<i64>> {
    let mut countdowns = HashMap::with_capacity(linear_parts.len());

    match next_index {
        Some(next_i) => {
            let offset_at_next = linear_parts[next_i].1;
            for (i, (id, offset)) in linear_parts.iter().enumerate() {
                let value = if i < next_i {
                    if loop_enabled {
                        Some(offset + total_wait - offset_at_next + current_remaining)
                    } else {
                        None
                    }
                } else if i == next_i {
                    Some(current_remaining)
                } else {
                    Some(offset - offset_at_next + current_remaining)
                };
                countdowns.insert(*id, value);
            }
        }
        None => {
            for (id, offset) in linear_parts {
                countdowns.insert(*id, Some(offset + current_remaining));
            }
        }
    }

    countdowns
}
