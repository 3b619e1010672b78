//! Tick scheduler integration tests
//!
//! Uses short tick periods and a manually driven clock; assertions stay
//! loose where wall-clock scheduling is involved.

use cueclock_common::model::{Part, PartId, PlaylistState};
use cueclock_td::scheduler::{SchedulerConfig, TickScheduler};
use cueclock_td::sources::{ClockSource, ManualClock, SharedRundown};
use cueclock_td::subscription::{Cadence, Projection};
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        tick_interval: Duration::from_millis(5),
        low_resolution_every: 3,
        default_part_duration_ms: 3_000,
        channel_capacity: 256,
    }
}

fn three_part_rundown() -> SharedRundown {
    let rundown = SharedRundown::new();
    rundown.replace_parts(vec![
        Part::timed(PartId::new(), 10_000),
        Part::timed(PartId::new(), 20_000),
        Part::timed(PartId::new(), 15_000),
    ]);
    rundown
}

fn scheduler_with(rundown: &SharedRundown, clock: &Arc<ManualClock>) -> TickScheduler {
    let clock: Arc<dyn ClockSource> = clock.clone();
    TickScheduler::new(test_config(), Arc::new(rundown.clone()), clock)
        .expect("valid scheduler config")
}

#[tokio::test]
async fn produces_snapshots_once_started() {
    let rundown = three_part_rundown();
    let clock = Arc::new(ManualClock::new(50_000));
    let scheduler = scheduler_with(&rundown, &clock);

    assert!(scheduler.latest().is_none());
    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let ctx = scheduler.latest().expect("snapshot after ticking");
    assert_eq!(ctx.total_rundown_duration, 45_000);
    assert_eq!(ctx.current_time, 50_000);
    assert_eq!(ctx.part_count(), 3);

    scheduler.stop().await;
}

#[tokio::test]
async fn decimates_every_nth_tick_to_the_low_channel() {
    let rundown = three_part_rundown();
    let clock = Arc::new(ManualClock::new(0));
    let scheduler = scheduler_with(&rundown, &clock);

    let mut high_rx = scheduler.subscribe_high_channel();
    let mut low_rx = scheduler.subscribe_low_channel();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.stop().await;

    let mut high_count = 0usize;
    let mut low_flagged_on_high = 0usize;
    while let Ok(ctx) = high_rx.try_recv() {
        high_count += 1;
        if ctx.is_low_resolution {
            low_flagged_on_high += 1;
        }
    }

    let mut low_count = 0usize;
    while let Ok(ctx) = low_rx.try_recv() {
        low_count += 1;
        assert!(ctx.is_low_resolution, "low channel only carries flagged ticks");
    }

    assert!(high_count > low_count, "high cadence outpaces low cadence");
    assert!(low_count >= 1, "at least one decimated tick in 200 ms");
    // Decimated ticks also appear, flagged, on the high channel
    assert_eq!(low_flagged_on_high, low_count);
}

#[tokio::test]
async fn stop_is_deterministic_and_keeps_last_snapshot() {
    let rundown = three_part_rundown();
    let clock = Arc::new(ManualClock::new(1_000));
    let scheduler = scheduler_with(&rundown, &clock);

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.stop().await;

    let after_stop = scheduler.latest().expect("snapshot survives stop");

    // No tick may fire once stop() has returned
    clock.set(2_000);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let later = scheduler.latest().expect("snapshot still readable");
    assert!(Arc::ptr_eq(&after_stop, &later));
    assert_eq!(later.current_time, 1_000);
}

#[tokio::test]
async fn changing_tick_interval_keeps_ticking_and_snapshot() {
    let rundown = three_part_rundown();
    let clock = Arc::new(ManualClock::new(1_000));
    let scheduler = scheduler_with(&rundown, &clock);

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(scheduler.latest().unwrap().current_time, 1_000);

    scheduler.set_tick_interval(Duration::from_millis(2)).unwrap();
    // Snapshot survives the timer restart untouched
    assert!(scheduler.latest().is_some());

    clock.set(2_000);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        scheduler.latest().unwrap().current_time,
        2_000,
        "ticking continues on the new period"
    );

    scheduler.stop().await;
}

#[tokio::test]
async fn hub_subscribers_are_fed_from_the_tick_task() {
    let rundown = three_part_rundown();
    let clock = Arc::new(ManualClock::new(0));
    let scheduler = scheduler_with(&rundown, &clock);

    let mut sub = scheduler.subscribe(Cadence::High, Projection::None);

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.stop().await;

    let ctx = sub.try_recv().expect("hub delivered at least one snapshot");
    assert_eq!(ctx.total_rundown_duration, 45_000);
}

#[tokio::test]
async fn steady_projected_low_subscriber_hears_only_the_first_tick() {
    let rundown = three_part_rundown();
    let clock = Arc::new(ManualClock::new(0));
    let scheduler = scheduler_with(&rundown, &clock);

    let mut sub = scheduler.subscribe(
        Cadence::Low,
        Projection::field_path("currentPartWillAutoNext"),
    );

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.stop().await;

    // Value never changes and every low-channel tick matches the cadence,
    // so exactly the initial notification arrives.
    let mut notifications = 0;
    while sub.try_recv().is_some() {
        notifications += 1;
    }
    assert_eq!(notifications, 1);
}

#[tokio::test]
async fn force_resync_pushes_latest_snapshot_immediately() {
    let rundown = three_part_rundown();
    let clock = Arc::new(ManualClock::new(7_777));
    let scheduler = scheduler_with(&rundown, &clock);

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.stop().await;

    // Stopped: no ticks are flowing, only the resync can deliver
    let mut low_rx = scheduler.subscribe_low_channel();
    scheduler.force_resync();

    let ctx = low_rx.try_recv().expect("resync reaches the low channel");
    assert_eq!(ctx.current_time, 7_777);
}

#[tokio::test]
async fn rundown_replacement_is_picked_up_mid_run() {
    let rundown = three_part_rundown();
    let clock = Arc::new(ManualClock::new(0));
    let scheduler = scheduler_with(&rundown, &clock);

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(scheduler.latest().unwrap().total_rundown_duration, 45_000);

    rundown.replace_parts(vec![Part::timed(PartId::new(), 99_000)]);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let ctx = scheduler.latest().unwrap();
    assert_eq!(ctx.total_rundown_duration, 99_000);
    assert_eq!(ctx.part_count(), 1);

    scheduler.stop().await;
}

#[tokio::test]
async fn unknown_next_pointer_is_tolerated() {
    let rundown = three_part_rundown();
    rundown.set_playlist_state(PlaylistState {
        active: true,
        next_part_instance: Some(cueclock_common::model::PartInstanceId::new()),
        ..PlaylistState::default()
    });
    let clock = Arc::new(ManualClock::new(0));
    let scheduler = scheduler_with(&rundown, &clock);

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.stop().await;

    // Resolves gracefully: snapshots keep flowing, countdowns fall back
    let ctx = scheduler.latest().expect("snapshot despite dangling pointer");
    assert_eq!(ctx.part_count(), 3);
}
