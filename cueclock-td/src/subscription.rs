//! Subscription hub with per-subscriber change filtering
//!
//! Consumers register on one of the two refresh cadences, optionally with a
//! projection. Projected subscribers are only notified when the projected
//! value actually changes, so a display bound to a single field does not
//! redraw sixty times a second.
//!
//! One exception keeps filtered views honest: after a subscriber has seen a
//! snapshot of the *other* resolution on its channel (the decimated
//! low-resolution tick on the high channel, or a forced resync on the low
//! channel), the next tick matching its cadence is delivered unfiltered,
//! exactly once.

use cueclock_common::timing::TimingContext;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Refresh cadence a subscriber registers on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Every tick (default ≈60 Hz)
    High,
    /// Every Nth tick (default ≈4 Hz)
    Low,
}

/// Projection applied to each snapshot before change comparison
///
/// Resolved once at subscribe time; there is no duck typing at dispatch.
pub enum Projection {
    /// No filtering: notify on every tick of the chosen cadence
    None,
    /// Project a field of the serialized (camelCase) snapshot
    FieldPath(Vec<String>),
    /// Arbitrary projection of the snapshot
    Custom(Box<dyn Fn(&TimingContext) -> Value + Send + Sync>),
}

impl Projection {
    /// Parse a dotted path such as `"currentPartWillAutoNext"` or
    /// `"partCountdown.<part id>"`
    pub fn field_path(path: &str) -> Self {
        Self::FieldPath(path.split('.').map(str::to_string).collect())
    }

    /// Pre-split path segments
    pub fn segments(segments: Vec<String>) -> Self {
        Self::FieldPath(segments)
    }

    /// Custom projection function
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&TimingContext) -> Value + Send + Sync + 'static,
    {
        Self::Custom(Box::new(f))
    }
}

impl std::fmt::Debug for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Projection::None => write!(f, "Projection::None"),
            Projection::FieldPath(segments) => {
                write!(f, "Projection::FieldPath({})", segments.join("."))
            }
            Projection::Custom(_) => write!(f, "Projection::Custom(..)"),
        }
    }
}

struct Subscriber {
    cadence: Cadence,
    projection: Projection,
    last_value: Option<Value>,
    pending_resync: bool,
    tx: mpsc::UnboundedSender<Arc<TimingContext>>,
}

/// Fan-out hub dispatching snapshots to registered subscribers
///
/// Cloning shares the subscriber table. Dispatch runs inside the scheduler's
/// tick task; projections are fast by contract, and a panicking projection
/// is isolated to its own subscriber.
#[derive(Clone, Default)]
pub struct SubscriptionHub {
    inner: Arc<Mutex<HashMap<Uuid, Subscriber>>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber on a cadence
    pub fn subscribe(&self, cadence: Cadence, projection: Projection) -> TimingSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let subscriber = Subscriber {
            cadence,
            projection,
            last_value: None,
            pending_resync: false,
            tx,
        };
        self.inner
            .lock()
            .expect("subscriber table poisoned")
            .insert(id, subscriber);
        debug!("Subscriber {} registered on {:?} cadence", id, cadence);

        TimingSubscription {
            id,
            hub: self.clone(),
            rx,
        }
    }

    /// Current number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("subscriber table poisoned").len()
    }

    /// Deliver one snapshot on one channel
    ///
    /// Called by the scheduler for every tick (high channel) and for every
    /// decimated tick (low channel). Subscribers whose receiver is gone are
    /// pruned here, so an un-dropped handle cannot leak dispatch work.
    pub fn dispatch(&self, ctx: &Arc<TimingContext>, channel: Cadence) {
        let mut table = self.inner.lock().expect("subscriber table poisoned");
        // Serialized form shared by all field-path subscribers on this tick
        let mut serialized: Option<Value> = None;
        let mut dead = Vec::new();

        for (id, subscriber) in table.iter_mut() {
            if subscriber.cadence != channel {
                continue;
            }

            let delivered = match &subscriber.projection {
                Projection::None => subscriber.tx.send(Arc::clone(ctx)).is_ok(),
                projection => {
                    let value = match project(projection, ctx, &mut serialized) {
                        Some(value) => value,
                        None => {
                            warn!("Subscriber {} projection panicked, skipping this tick", id);
                            continue;
                        }
                    };

                    let matches_resolution = match subscriber.cadence {
                        Cadence::High => !ctx.is_low_resolution,
                        Cadence::Low => ctx.is_low_resolution,
                    };
                    let force = matches_resolution && subscriber.pending_resync;
                    let changed = subscriber.last_value.as_ref() != Some(&value);

                    if force || changed {
                        subscriber.last_value = Some(value);
                        subscriber.pending_resync = false;
                        subscriber.tx.send(Arc::clone(ctx)).is_ok()
                    } else {
                        if !matches_resolution {
                            subscriber.pending_resync = true;
                        }
                        true
                    }
                }
            };

            if !delivered {
                dead.push(*id);
            }
        }

        for id in dead {
            debug!("Pruning subscriber {} with closed receiver", id);
            table.remove(&id);
        }
    }

    fn remove(&self, id: Uuid) {
        self.inner
            .lock()
            .expect("subscriber table poisoned")
            .remove(&id);
    }
}

fn project(
    projection: &Projection,
    ctx: &Arc<TimingContext>,
    serialized: &mut Option<Value>,
) -> Option<Value> {
    match projection {
        Projection::None => Some(Value::Null),
        Projection::FieldPath(segments) => {
            let root = serialized
                .get_or_insert_with(|| serde_json::to_value(ctx.as_ref()).unwrap_or(Value::Null));
            let mut value: &Value = root;
            for segment in segments {
                value = value.get(segment).unwrap_or(&Value::Null);
            }
            Some(value.clone())
        }
        Projection::Custom(f) => catch_unwind(AssertUnwindSafe(|| f(ctx.as_ref()))).ok(),
    }
}

/// Handle owned by a subscriber
///
/// Receives snapshots via [`recv`](Self::recv). Dropping the handle (or
/// calling [`unsubscribe`](Self::unsubscribe), idempotently) removes the
/// subscriber from the hub.
pub struct TimingSubscription {
    id: Uuid,
    hub: SubscriptionHub,
    rx: mpsc::UnboundedReceiver<Arc<TimingContext>>,
}

impl TimingSubscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next notification; `None` once unsubscribed and drained
    pub async fn recv(&mut self) -> Option<Arc<TimingContext>> {
        self.rx.recv().await
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Option<Arc<TimingContext>> {
        self.rx.try_recv().ok()
    }

    /// Remove this subscriber from the hub; safe to call repeatedly
    pub fn unsubscribe(&self) {
        self.hub.remove(self.id);
    }
}

impl Drop for TimingSubscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}
