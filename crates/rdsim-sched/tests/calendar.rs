//! Bucket and calendar ordering, growth and barrier lookup.

use rdsim_core::error::{ScheduleError, SimError};
use rdsim_sched::{Bucket, Calendar, Event};
use rdsim_test_utils::MockEvent;

fn keys(b: &Bucket<MockEvent>) -> Vec<(u32, u32)> {
    b.iter().map(|e| (e.type_index().0, e.tag)).collect()
}

fn drain(cal: &mut Calendar<MockEvent>) -> Vec<(f64, u32, u32)> {
    std::iter::from_fn(|| cal.pop_next())
        .map(|e| (e.header.event_time.unwrap_or(f64::NAN), e.type_index().0, e.tag))
        .collect()
}

// ── Bucket ──────────────────────────────────────────────────────

#[test]
fn type_key_breaks_time_ties() {
    let mut b = Bucket::new(0.0);
    b.insert(MockEvent::at(500, 0.0).tagged(1));
    b.insert(MockEvent::at(200, 0.0).tagged(2));
    b.insert(MockEvent::at(100, 0.5).tagged(3));
    assert_eq!(keys(&b), vec![(200, 2), (500, 1), (100, 3)]);
}

#[test]
fn equal_keys_stay_fifo() {
    let mut b = Bucket::new(0.0);
    for tag in 0..5 {
        b.insert(MockEvent::at(100, 0.25).tagged(tag));
    }
    let tags: Vec<u32> = b.iter().map(|e| e.tag).collect();
    assert_eq!(tags, vec![0, 1, 2, 3, 4]);
}

#[test]
fn accumulated_time_error_does_not_reorder_kinds() {
    let mut t = 0.0;
    for _ in 0..10 {
        t += 0.1;
    }
    let mut b = Bucket::new(1.0);
    b.insert(MockEvent::at(500, 1.0).tagged(0));
    b.insert(MockEvent::at(200, t).tagged(1));
    assert_eq!(keys(&b), vec![(200, 1), (500, 0)]);
}

#[test]
fn secondary_value_orders_same_kind() {
    let mut b = Bucket::new(0.0);
    b.insert(MockEvent::at(100, 0.0).with_secondary(3.0).tagged(0));
    b.insert(MockEvent::at(100, 0.0).with_secondary(1.0).tagged(1));
    b.insert(MockEvent::at(100, 0.0).with_secondary(2.0).tagged(2));
    let tags: Vec<u32> = b.iter().map(|e| e.tag).collect();
    assert_eq!(tags, vec![1, 2, 0]);
}

// ── Calendar ────────────────────────────────────────────────────

#[test]
fn pops_in_time_then_type_order() {
    let mut cal = Calendar::new();
    cal.insert(MockEvent::at(10, 5.0)).unwrap();
    cal.insert(MockEvent::at(3, 5.0)).unwrap();
    cal.insert(MockEvent::at(99, 4.0)).unwrap();
    let order: Vec<(f64, u32)> = drain(&mut cal).into_iter().map(|(t, k, _)| (t, k)).collect();
    assert_eq!(order, vec![(4.0, 99), (5.0, 3), (5.0, 10)]);
}

#[test]
fn fractional_time_is_retrievable() {
    let mut cal = Calendar::new();
    cal.insert(MockEvent::at(1, 2.3).tagged(7)).unwrap();
    assert_eq!(cal.get_next_time(), Some(2.3));
    let e = cal.pop_next().unwrap();
    assert_eq!(e.tag, 7);
    assert!(cal.is_empty());
    assert!(cal.pop_next().is_none());
}

#[test]
fn spanning_insert_creates_every_intermediate_bucket() {
    let mut cal = Calendar::new();
    cal.insert(MockEvent::at(1, 0.1)).unwrap();
    cal.insert(MockEvent::at(1, 100.1)).unwrap();
    assert_eq!(cal.bucket_count(), 101);
    assert_eq!(cal.len(), 2);
}

#[test]
fn earlier_event_creates_buckets_in_front() {
    let mut cal = Calendar::new();
    cal.insert(MockEvent::at(1, 5.5).tagged(1)).unwrap();
    cal.insert(MockEvent::at(1, 2.0).tagged(2)).unwrap();
    assert_eq!(cal.bucket_count(), 4);
    let tags: Vec<u32> = drain(&mut cal).into_iter().map(|(_, _, tag)| tag).collect();
    assert_eq!(tags, vec![2, 1]);
}

#[test]
fn rejects_unset_past_and_contradictory_events() {
    let mut cal = Calendar::new();
    assert!(matches!(
        cal.insert(MockEvent::unscheduled(1)),
        Err(SimError::Schedule(ScheduleError::InvalidState { .. }))
    ));
    assert!(cal
        .insert(MockEvent::at(1, 0.0).barrier().blockable(1.0))
        .is_err());
    cal.insert(MockEvent::at(1, 3.0)).unwrap();
    cal.pop_next().unwrap();
    assert!(cal.insert(MockEvent::at(1, 2.0)).is_err());
    // Same instant as the present is still allowed.
    assert!(cal.insert(MockEvent::at(1, 3.0)).is_ok());
    assert!(cal.insert(MockEvent::at(1, f64::NAN)).is_err());
}

#[test]
fn far_future_events_are_parked_and_recovered() {
    let mut cal = Calendar::new();
    cal.insert(MockEvent::at(400, 1.0e6).tagged(9)).unwrap();
    cal.insert(MockEvent::at(1, 0.0).tagged(1)).unwrap();
    cal.insert(MockEvent::at(200, 2.0e6).barrier().tagged(8)).unwrap();
    assert!(cal.bucket_count() <= 2);
    assert_eq!(cal.len(), 3);
    assert_eq!(cal.get_time_up_to_next_barrier(0.0, 1.0e9), 2.0e6);
    let order: Vec<u32> = drain(&mut cal).into_iter().map(|(_, _, tag)| tag).collect();
    assert_eq!(order, vec![1, 9, 8]);
}

#[test]
fn far_future_keeps_fifo_for_equal_keys() {
    let mut cal = Calendar::new();
    cal.insert(MockEvent::at(1, 0.0).tagged(0)).unwrap();
    for tag in 1..4 {
        cal.insert(MockEvent::at(5, 9000.0).tagged(tag)).unwrap();
    }
    let tags: Vec<u32> = drain(&mut cal).into_iter().map(|(_, _, tag)| tag).collect();
    assert_eq!(tags, vec![0, 1, 2, 3]);
}

// ── Barrier lookup ──────────────────────────────────────────────

#[test]
fn barrier_caps_budget() {
    let mut cal = Calendar::new();
    cal.insert(MockEvent::at(200, 7.0).barrier()).unwrap();
    assert_eq!(cal.get_time_up_to_next_barrier(0.0, 100.0), 7.0);
    assert_eq!(cal.get_time_up_to_next_barrier(0.0, 3.0), 3.0);
}

#[test]
fn no_barrier_leaves_budget_uncapped() {
    let mut cal = Calendar::new();
    cal.insert(MockEvent::at(500, 0.0)).unwrap();
    assert_eq!(cal.get_time_up_to_next_barrier(0.0, 100.0), 100.0);
    cal.insert(MockEvent::at(200, 40.0).barrier()).unwrap();
    assert_eq!(cal.get_time_up_to_next_barrier(0.0, 100.0), 40.0);
}

#[test]
fn popped_barrier_does_not_leave_stale_cache() {
    let mut cal = Calendar::new();
    cal.insert(MockEvent::at(200, 7.0).barrier()).unwrap();
    cal.insert(MockEvent::at(200, 20.0).barrier()).unwrap();
    assert_eq!(cal.get_time_up_to_next_barrier(0.0, 100.0), 7.0);
    let popped = cal.pop_next().unwrap();
    assert_eq!(popped.header.event_time, Some(7.0));
    assert_eq!(cal.get_time_up_to_next_barrier(7.0, 100.0), 13.0);
}

#[test]
fn barrier_at_the_current_instant_does_not_zero_the_budget() {
    let mut cal = Calendar::new();
    cal.insert(MockEvent::at(600, 3.0).barrier()).unwrap();
    cal.insert(MockEvent::at(600, 5.0).barrier()).unwrap();
    assert_eq!(cal.get_time_up_to_next_barrier(3.0, 10.0), 2.0);
    assert_eq!(cal.get_time_up_to_next_barrier(5.0, 10.0), 10.0);
}
