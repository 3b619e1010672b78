//! Tick scheduler
//!
//! Drives the resolver at a fixed period and decimates every Nth tick into
//! the low-frequency stream. The scheduler owns the current snapshot, the
//! resolver (and with it the temporary-instance cache), and the fan-out
//! channels; one scheduler runs per active playlist.
//!
//! The timer callback, resolve step, and subscriber fan-out all run on one
//! cooperative task. Stopping awaits that task, so no tick can fire after
//! `stop()` returns; the last snapshot stays readable.

use crate::error::{Error, Result};
use crate::resolver::TimingResolver;
use crate::sources::{ClockSource, RundownSource};
use crate::subscription::{Cadence, Projection, SubscriptionHub, TimingSubscription};
use cueclock_common::config::TimingConfig;
use cueclock_common::model::{PartInstanceId, RundownView};
use cueclock_common::timing::TimingContext;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Scheduler tuning, validated at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Tick period (default ≈60 Hz)
    pub tick_interval: Duration,

    /// Every Nth tick is flagged low-resolution and fed to the low channel
    pub low_resolution_every: u32,

    /// Fallback display duration handed to the resolver
    pub default_part_duration_ms: i64,

    /// Broadcast buffer size for the snapshot channels
    pub channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let defaults = TimingConfig::default();
        Self::from(&defaults)
    }
}

impl From<&TimingConfig> for SchedulerConfig {
    fn from(config: &TimingConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            low_resolution_every: config.low_resolution_every,
            default_part_duration_ms: config.default_part_duration_ms,
            channel_capacity: config.event_buffer,
        }
    }
}

impl SchedulerConfig {
    fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(Error::Config("tick interval must be > 0".to_string()));
        }
        if self.low_resolution_every == 0 {
            return Err(Error::Config("low_resolution_every must be > 0".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be > 0".to_string()));
        }
        Ok(())
    }
}

enum Command {
    SetInterval(Duration),
    Stop,
}

struct Control {
    cmd_tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

/// Per-playlist tick scheduler
///
/// `Stopped → Running → Stopped`; restartable. All mutable tick state
/// (resolver cache, tick counter) lives on the tick task.
pub struct TickScheduler {
    config: Mutex<SchedulerConfig>,
    source: Arc<dyn RundownSource>,
    clock: Arc<dyn ClockSource>,
    resolver: Arc<Mutex<TimingResolver>>,
    hub: SubscriptionHub,
    latest: Arc<RwLock<Option<Arc<TimingContext>>>>,
    high_tx: broadcast::Sender<Arc<TimingContext>>,
    low_tx: broadcast::Sender<Arc<TimingContext>>,
    control: Mutex<Option<Control>>,
}

impl TickScheduler {
    /// Create a stopped scheduler; misconfiguration is fatal here
    pub fn new(
        config: SchedulerConfig,
        source: Arc<dyn RundownSource>,
        clock: Arc<dyn ClockSource>,
    ) -> Result<Self> {
        config.validate()?;
        let (high_tx, _) = broadcast::channel(config.channel_capacity);
        let (low_tx, _) = broadcast::channel(config.channel_capacity);

        Ok(Self {
            config: Mutex::new(config),
            source,
            clock,
            resolver: Arc::new(Mutex::new(TimingResolver::new())),
            hub: SubscriptionHub::new(),
            latest: Arc::new(RwLock::new(None)),
            high_tx,
            low_tx,
            control: Mutex::new(None),
        })
    }

    /// Start ticking; an already-running scheduler is an error
    pub fn start(&self) -> Result<()> {
        let mut control = self.control.lock().expect("scheduler control poisoned");
        if control.is_some() {
            return Err(Error::Scheduler("scheduler already running".to_string()));
        }

        let config = self.config.lock().expect("scheduler config poisoned").clone();
        info!(
            "Starting tick scheduler: period {:?}, low-resolution every {} ticks",
            config.tick_interval, config.low_resolution_every
        );

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = TickTask {
            source: Arc::clone(&self.source),
            clock: Arc::clone(&self.clock),
            resolver: Arc::clone(&self.resolver),
            hub: self.hub.clone(),
            latest: Arc::clone(&self.latest),
            high_tx: self.high_tx.clone(),
            low_tx: self.low_tx.clone(),
            config,
        };
        let handle = tokio::spawn(task.run(cmd_rx));
        *control = Some(Control { cmd_tx, handle });
        Ok(())
    }

    /// Stop ticking; returns once the tick task has fully wound down
    ///
    /// The latest snapshot remains readable. Stopping a stopped scheduler
    /// is a no-op.
    pub async fn stop(&self) {
        let control = self
            .control
            .lock()
            .expect("scheduler control poisoned")
            .take();
        if let Some(control) = control {
            let _ = control.cmd_tx.send(Command::Stop);
            if control.handle.await.is_err() {
                warn!("Tick task terminated abnormally");
            }
            info!("Tick scheduler stopped");
        }
    }

    /// Whether the tick task is currently running
    pub fn is_running(&self) -> bool {
        self.control
            .lock()
            .expect("scheduler control poisoned")
            .is_some()
    }

    /// Change the tick period; restarts the running timer in place without
    /// losing the latest snapshot
    pub fn set_tick_interval(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::Config("tick interval must be > 0".to_string()));
        }
        self.config
            .lock()
            .expect("scheduler config poisoned")
            .tick_interval = interval;

        if let Some(control) = self
            .control
            .lock()
            .expect("scheduler control poisoned")
            .as_ref()
        {
            let _ = control.cmd_tx.send(Command::SetInterval(interval));
        }
        Ok(())
    }

    /// Latest snapshot, also available after stop
    pub fn latest(&self) -> Option<Arc<TimingContext>> {
        self.latest.read().expect("snapshot slot poisoned").clone()
    }

    /// Register a filtered subscriber on a cadence
    pub fn subscribe(&self, cadence: Cadence, projection: Projection) -> TimingSubscription {
        self.hub.subscribe(cadence, projection)
    }

    /// Subscription hub (diagnostics, direct hub access)
    pub fn hub(&self) -> &SubscriptionHub {
        &self.hub
    }

    /// Raw high-frequency snapshot channel (every tick)
    pub fn subscribe_high_channel(&self) -> broadcast::Receiver<Arc<TimingContext>> {
        self.high_tx.subscribe()
    }

    /// Raw low-frequency snapshot channel (every Nth tick)
    pub fn subscribe_low_channel(&self) -> broadcast::Receiver<Arc<TimingContext>> {
        self.low_tx.subscribe()
    }

    /// Push the latest snapshot to both channels immediately
    ///
    /// Used after an input replacement so consumers re-read promptly. The
    /// snapshot keeps whatever resolution flag it was computed with, which
    /// arms the one-shot unfiltered resync for mismatched subscribers.
    pub fn force_resync(&self) {
        if let Some(ctx) = self.latest() {
            let _ = self.high_tx.send(Arc::clone(&ctx));
            self.hub.dispatch(&ctx, Cadence::High);
            let _ = self.low_tx.send(Arc::clone(&ctx));
            self.hub.dispatch(&ctx, Cadence::Low);
        }
    }
}

struct TickTask {
    source: Arc<dyn RundownSource>,
    clock: Arc<dyn ClockSource>,
    resolver: Arc<Mutex<TimingResolver>>,
    hub: SubscriptionHub,
    latest: Arc<RwLock<Option<Arc<TimingContext>>>>,
    high_tx: broadcast::Sender<Arc<TimingContext>>,
    low_tx: broadcast::Sender<Arc<TimingContext>>,
    config: SchedulerConfig,
}

impl TickTask {
    async fn run(self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        let mut interval = new_interval(self.config.tick_interval);
        let mut counter: u64 = 0;
        let mut unknown_next: Option<PartInstanceId> = None;

        loop {
            tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(Command::SetInterval(period)) => {
                        debug!("Tick interval changed to {:?}", period);
                        interval = new_interval(period);
                    }
                    Some(Command::Stop) | None => break,
                },
                _ = interval.tick() => {
                    counter += 1;
                    self.tick(counter, &mut unknown_next);
                }
            }
        }
        debug!("Tick task wound down after {} ticks", counter);
    }

    fn tick(&self, counter: u64, unknown_next: &mut Option<PartInstanceId>) {
        let view = self.source.view();
        check_next_pointer(&view, unknown_next);

        let now = self.clock.now_ms();
        let low_resolution = counter % self.config.low_resolution_every as u64 == 0;

        let ctx = {
            let mut resolver = self.resolver.lock().expect("resolver poisoned");
            Arc::new(resolver.resolve(
                &view,
                now,
                self.config.default_part_duration_ms,
                low_resolution,
            ))
        };

        *self.latest.write().expect("snapshot slot poisoned") = Some(Arc::clone(&ctx));

        let _ = self.high_tx.send(Arc::clone(&ctx));
        self.hub.dispatch(&ctx, Cadence::High);

        if low_resolution {
            let _ = self.low_tx.send(Arc::clone(&ctx));
            self.hub.dispatch(&ctx, Cadence::Low);
        }
    }
}

fn new_interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    // Ticks carry no history; catching up on missed ones is pointless
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Log an unresolvable next pointer once per distinct value
fn check_next_pointer(view: &RundownView, last_unknown: &mut Option<PartInstanceId>) {
    match view.state.next_part_instance {
        Some(next) => {
            let known = view.instances.values().any(|instance| instance.id == next)
                || view.parts.iter().any(|part| PartInstanceId(part.id.0) == next);
            if known {
                *last_unknown = None;
            } else if *last_unknown != Some(next) {
                warn!(
                    "Next part instance {} not found in rundown, treating as unknown",
                    next
                );
                *last_unknown = Some(next);
            }
        }
        None => *last_unknown = None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{ManualClock, SharedRundown};

    fn scheduler(config: SchedulerConfig) -> Result<TickScheduler> {
        TickScheduler::new(
            config,
            Arc::new(SharedRundown::new()),
            Arc::new(ManualClock::new(0)),
        )
    }

    #[test]
    fn zero_tick_interval_rejected_at_construction() {
        let config = SchedulerConfig {
            tick_interval: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        assert!(matches!(scheduler(config), Err(Error::Config(_))));
    }

    #[test]
    fn zero_decimation_rejected_at_construction() {
        let config = SchedulerConfig {
            low_resolution_every: 0,
            ..SchedulerConfig::default()
        };
        assert!(matches!(scheduler(config), Err(Error::Config(_))));
    }

    #[test]
    fn zero_interval_rejected_at_runtime() {
        let scheduler = scheduler(SchedulerConfig::default()).unwrap();
        assert!(scheduler.set_tick_interval(Duration::ZERO).is_err());
        assert!(scheduler
            .set_tick_interval(Duration::from_millis(10))
            .is_ok());
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let scheduler = scheduler(SchedulerConfig::default()).unwrap();
        assert!(!scheduler.is_running());
        scheduler.stop().await;
        assert!(scheduler.latest().is_none());
    }

    #[tokio::test]
    async fn double_start_is_an_error() {
        let scheduler = scheduler(SchedulerConfig::default()).unwrap();
        scheduler.start().unwrap();
        assert!(scheduler.start().is_err());
        scheduler.stop().await;
        // Restartable after a clean stop
        scheduler.start().unwrap();
        scheduler.stop().await;
    }
}
