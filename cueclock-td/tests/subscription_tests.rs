//! Subscription hub integration tests
//!
//! Drives the hub with hand-built snapshots, the way the scheduler does,
//! and checks the delivery contract end to end.

use cueclock_common::model::PartId;
use cueclock_common::timing::TimingContext;
use cueclock_td::subscription::{Cadence, Projection, SubscriptionHub};
use serde_json::Value;
use std::sync::Arc;

fn snapshot(low_resolution: bool, auto_next: bool) -> Arc<TimingContext> {
    Arc::new(TimingContext {
        is_low_resolution: low_resolution,
        current_part_will_auto_next: auto_next,
        ..TimingContext::default()
    })
}

#[test]
fn low_subscriber_gets_change_notifications_plus_one_resync() {
    let hub = SubscriptionHub::new();
    let mut sub = hub.subscribe(
        Cadence::Low,
        Projection::field_path("currentPartWillAutoNext"),
    );

    // Initial low tick: first value always notifies
    hub.dispatch(&snapshot(true, false), Cadence::Low);
    assert!(sub.try_recv().is_some());

    // Steady state: filtered
    for _ in 0..4 {
        hub.dispatch(&snapshot(true, false), Cadence::Low);
    }
    assert!(sub.try_recv().is_none());

    // Value change: notified
    hub.dispatch(&snapshot(true, true), Cadence::Low);
    assert!(sub.try_recv().is_some());
    hub.dispatch(&snapshot(true, true), Cadence::Low);
    assert!(sub.try_recv().is_none());

    // Forced resync pushes a high-resolution snapshot onto the low channel;
    // unchanged value, so nothing is delivered yet, but the resync is armed
    hub.dispatch(&snapshot(false, true), Cadence::Low);
    assert!(sub.try_recv().is_none());

    // Exactly one unfiltered delivery on the next matching tick
    hub.dispatch(&snapshot(true, true), Cadence::Low);
    assert!(sub.try_recv().is_some());
    hub.dispatch(&snapshot(true, true), Cadence::Low);
    assert!(sub.try_recv().is_none());
}

#[test]
fn cadences_are_independent() {
    let hub = SubscriptionHub::new();
    let mut high_plain = hub.subscribe(Cadence::High, Projection::None);
    let mut low_plain = hub.subscribe(Cadence::Low, Projection::None);
    let mut high_filtered = hub.subscribe(
        Cadence::High,
        Projection::field_path("totalRundownDuration"),
    );

    // Three high ticks, one decimated to low as well
    hub.dispatch(&snapshot(false, false), Cadence::High);
    hub.dispatch(&snapshot(false, false), Cadence::High);
    let decimated = snapshot(true, false);
    hub.dispatch(&decimated, Cadence::High);
    hub.dispatch(&decimated, Cadence::Low);

    let mut high_seen = 0;
    while high_plain.try_recv().is_some() {
        high_seen += 1;
    }
    assert_eq!(high_seen, 3);

    let mut low_seen = 0;
    while low_plain.try_recv().is_some() {
        low_seen += 1;
    }
    assert_eq!(low_seen, 1);

    // Filtered high subscriber: the initial notification only
    let mut filtered_seen = 0;
    while high_filtered.try_recv().is_some() {
        filtered_seen += 1;
    }
    assert_eq!(filtered_seen, 1);
}

#[test]
fn field_path_reaches_into_per_part_maps() {
    let part = PartId::new();
    let hub = SubscriptionHub::new();
    let mut sub = hub.subscribe(
        Cadence::High,
        Projection::field_path(&format!("partCountdown.{}", part)),
    );

    let mut ctx = TimingContext::default();
    ctx.part_countdown.insert(part, Some(10_000));
    hub.dispatch(&Arc::new(ctx.clone()), Cadence::High);
    assert!(sub.try_recv().is_some());

    // Same countdown: filtered
    hub.dispatch(&Arc::new(ctx.clone()), Cadence::High);
    assert!(sub.try_recv().is_none());

    // Countdown moved: notified
    ctx.part_countdown.insert(part, Some(9_000));
    hub.dispatch(&Arc::new(ctx.clone()), Cadence::High);
    assert!(sub.try_recv().is_some());

    // Part dropped from the rundown projects to null: one more notification
    ctx.part_countdown.clear();
    hub.dispatch(&Arc::new(ctx), Cadence::High);
    assert!(sub.try_recv().is_some());
}

#[test]
fn custom_projection_sees_the_whole_snapshot() {
    let hub = SubscriptionHub::new();
    let mut sub = hub.subscribe(
        Cadence::High,
        Projection::custom(|ctx| {
            Value::from(ctx.remaining_rundown_duration.min(ctx.total_rundown_duration))
        }),
    );

    let mut ctx = TimingContext::default();
    ctx.total_rundown_duration = 30_000;
    ctx.remaining_rundown_duration = 30_000;
    hub.dispatch(&Arc::new(ctx.clone()), Cadence::High);
    assert!(sub.try_recv().is_some());

    ctx.remaining_rundown_duration = 25_000;
    hub.dispatch(&Arc::new(ctx), Cadence::High);
    assert!(sub.try_recv().is_some());
}

#[test]
fn unsubscribed_handles_stop_receiving() {
    let hub = SubscriptionHub::new();
    let mut keeper = hub.subscribe(Cadence::High, Projection::None);
    let mut leaver = hub.subscribe(Cadence::High, Projection::None);

    hub.dispatch(&snapshot(false, false), Cadence::High);
    assert!(keeper.try_recv().is_some());
    assert!(leaver.try_recv().is_some());

    leaver.unsubscribe();
    hub.dispatch(&snapshot(false, false), Cadence::High);
    assert!(keeper.try_recv().is_some());
    assert!(leaver.try_recv().is_none());
    assert_eq!(hub.subscriber_count(), 1);
}
