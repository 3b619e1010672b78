//! Collaborator interfaces feeding the tick scheduler
//!
//! The business layer owns the rundown content and the live pointers; the
//! timing daemon only reads them. `RundownSource` and `ClockSource` are the
//! seams, with an in-memory implementation for each. Reads never block on
//! I/O; implementations keep their data resident.

use cueclock_common::model::{Part, PartId, PartInstance, PlaylistState, RundownView};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Read access to one rundown's parts, live instances, and playlist state
///
/// `ordered_parts` must return the same `Arc` until the part list is
/// replaced; the scheduler uses the allocation identity to invalidate its
/// temporary-instance cache.
pub trait RundownSource: Send + Sync {
    /// Parts in running order
    fn ordered_parts(&self) -> Arc<Vec<Part>>;

    /// Live part instances keyed by part id
    fn active_part_instances(&self) -> HashMap<PartId, PartInstance>;

    /// Live playlist state
    fn playlist_state(&self) -> PlaylistState;

    /// Assemble the per-tick immutable view
    fn view(&self) -> RundownView {
        RundownView {
            parts: self.ordered_parts(),
            instances: self.active_part_instances(),
            state: self.playlist_state(),
        }
    }
}

/// Timestamp supplier, ms since the Unix epoch
///
/// Two calls within one tick must not disagree by more than the tick period.
pub trait ClockSource: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock source backed by the system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> i64 {
        cueclock_common::time::now_ms()
    }
}

/// Manually advanced clock for tests and offline resolution
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct RundownData {
    parts: Arc<Vec<Part>>,
    instances: HashMap<PartId, PartInstance>,
    state: PlaylistState,
}

/// In-memory rundown store shared between the business layer and scheduler
///
/// Cloning shares the underlying store. Writers replace values wholesale;
/// the part list in particular is swapped as a fresh `Arc` so readers keep a
/// consistent snapshot and the scheduler sees the identity change.
#[derive(Debug, Clone, Default)]
pub struct SharedRundown {
    data: Arc<RwLock<RundownData>>,
}

impl SharedRundown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the part list wholesale
    pub fn replace_parts(&self, parts: Vec<Part>) {
        let mut data = self.data.write().expect("rundown store poisoned");
        debug!("Replacing rundown parts: {} -> {}", data.parts.len(), parts.len());
        data.parts = Arc::new(parts);
    }

    /// Replace the live instance map wholesale
    pub fn set_instances(&self, instances: Vec<PartInstance>) {
        let mut data = self.data.write().expect("rundown store poisoned");
        data.instances = instances.into_iter().map(|i| (i.part_id, i)).collect();
    }

    /// Replace the live playlist state
    pub fn set_playlist_state(&self, state: PlaylistState) {
        let mut data = self.data.write().expect("rundown store poisoned");
        data.state = state;
    }

    /// Number of parts currently stored
    pub fn part_count(&self) -> usize {
        self.data.read().expect("rundown store poisoned").parts.len()
    }
}

impl RundownSource for SharedRundown {
    fn ordered_parts(&self) -> Arc<Vec<Part>> {
        Arc::clone(&self.data.read().expect("rundown store poisoned").parts)
    }

    fn active_part_instances(&self) -> HashMap<PartId, PartInstance> {
        self.data
            .read()
            .expect("rundown store poisoned")
            .instances
            .clone()
    }

    fn playlist_state(&self) -> PlaylistState {
        self.data.read().expect("rundown store poisoned").state.clone()
    }
}
