//! Scheduler behavior through the public API with mock events.

use proptest::prelude::*;
use rdsim_core::error::{ScheduleError, SimError};
use rdsim_core::id::EventTypeIndex;
use rdsim_sched::{Calendar, Scheduler};
use rdsim_test_utils::{MockEvent, MockRecord};

// ── Helpers ─────────────────────────────────────────────────────

fn run(sched: &mut Scheduler<MockEvent>, steps: usize) -> Vec<MockRecord> {
    let mut log = Vec::new();
    for _ in 0..steps {
        sched.handle_next_event(&mut log).unwrap();
    }
    log
}

// ── Ordering ────────────────────────────────────────────────────

#[test]
fn releases_at_same_instant_follow_secondary_value() {
    let mut sched = Scheduler::new();
    sched
        .schedule_event(MockEvent::at(100, 0.0).with_secondary(0.75).tagged(1))
        .unwrap();
    sched
        .schedule_event(MockEvent::at(100, 0.0).with_secondary(0.25).tagged(2))
        .unwrap();
    sched.schedule_event(MockEvent::at(0, 0.0).tagged(3)).unwrap();
    let tags: Vec<u32> = run(&mut sched, 3).iter().map(|r| r.tag).collect();
    assert_eq!(tags, vec![3, 2, 1]);
}

#[test]
fn barrier_observes_state_before_diffusion_at_same_instant() {
    let mut sched = Scheduler::new();
    sched
        .schedule_event(MockEvent::at(500, 0.0).periodic(1.0).blockable(1.0))
        .unwrap();
    sched
        .schedule_event(MockEvent::at(200, 0.0).periodic(10.0).barrier())
        .unwrap();
    let log = run(&mut sched, 13);
    let kinds: Vec<(f64, u32)> = log.iter().map(|r| (r.time, r.type_index)).collect();
    assert_eq!(kinds[0], (0.0, 200));
    assert_eq!(kinds[1], (0.0, 500));
    let barrier_pos = kinds.iter().position(|&k| k == (10.0, 200)).unwrap();
    assert_eq!(kinds[barrier_pos + 1], (10.0, 500));
}

#[test]
fn async_event_without_time_runs_next_iteration() {
    let mut sched = Scheduler::new();
    sched
        .schedule_event(MockEvent::at(500, 0.0).periodic(1.0))
        .unwrap();
    let mut log = run(&mut sched, 2);

    let handle = sched.async_handle();
    std::thread::spawn(move || handle.schedule(MockEvent::unscheduled(600).tagged(42)))
        .join()
        .unwrap()
        .unwrap();

    assert_eq!(sched.get_next_event_time().unwrap(), Some(2.0));
    let pending = sched.scheduled_events_of_type(EventTypeIndex(600));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].header.event_time, Some(2.0));

    sched.handle_next_event(&mut log).unwrap();
    sched.handle_next_event(&mut log).unwrap();
    // Same instant: the lower type key runs first.
    assert_eq!((log[2].time, log[2].tag), (2.0, 0));
    assert_eq!((log[3].time, log[3].tag), (2.0, 42));
}

// ── Barrier budgets ─────────────────────────────────────────────

#[test]
fn blockable_event_is_capped_by_barrier() {
    let mut sched = Scheduler::new();
    sched
        .schedule_event(MockEvent::at(500, 0.0).periodic(100.0).blockable(100.0))
        .unwrap();
    sched
        .schedule_event(MockEvent::at(200, 7.0).barrier().tagged(1))
        .unwrap();
    let mut log = run(&mut sched, 1);
    assert_eq!(log[0].budget, Some(7.0));

    // The barrier runs first at t = 7, then the blockable event resumes.
    let info = sched.handle_next_event(&mut log).unwrap();
    assert_eq!(info.type_index, EventTypeIndex(200));
    let info = sched.handle_next_event(&mut log).unwrap();
    assert_eq!(info.time, 7.0);
    assert_eq!(log[2].budget, Some(100.0));
}

#[test]
fn barrier_sorting_after_blockable_at_same_instant_does_not_stall() {
    let mut sched = Scheduler::new();
    sched
        .schedule_event(MockEvent::at(500, 0.0).periodic(1.0).blockable(1.0))
        .unwrap();
    sched
        .schedule_event(MockEvent::at(600, 0.0).periodic(1.0).barrier())
        .unwrap();
    let log = run(&mut sched, 6);
    let kinds: Vec<(f64, u32, Option<f64>)> = log
        .iter()
        .map(|r| (r.time, r.type_index, r.budget))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (0.0, 500, Some(1.0)),
            (0.0, 600, None),
            (1.0, 500, Some(1.0)),
            (1.0, 600, None),
            (2.0, 500, Some(1.0)),
            (2.0, 600, None),
        ]
    );
}

#[test]
fn fractional_barrier_shortens_one_window() {
    let mut sched = Scheduler::new();
    sched
        .schedule_event(MockEvent::at(500, 0.0).periodic(1.0).blockable(1.0))
        .unwrap();
    sched
        .schedule_event(MockEvent::at(200, 2.5).barrier())
        .unwrap();
    let log = run(&mut sched, 6);
    let diffusion: Vec<(f64, Option<f64>)> = log
        .iter()
        .filter(|r| r.type_index == 500)
        .map(|r| (r.time, r.budget))
        .collect();
    assert_eq!(
        diffusion,
        vec![
            (0.0, Some(1.0)),
            (1.0, Some(1.0)),
            (2.0, Some(0.5)),
            (2.5, Some(1.0)),
            (3.5, Some(1.0)),
        ]
    );
}

// ── Failure and control flow ────────────────────────────────────

#[test]
fn step_error_propagates() {
    let mut sched = Scheduler::new();
    sched
        .schedule_event(
            MockEvent::at(500, 0.0)
                .periodic(1.0)
                .failing_on(2, SimError::AllocationFailed { what: "molecules" }),
        )
        .unwrap();
    let mut log = Vec::new();
    sched.handle_next_event(&mut log).unwrap();
    sched.handle_next_event(&mut log).unwrap();
    assert_eq!(
        sched.handle_next_event(&mut log),
        Err(SimError::AllocationFailed { what: "molecules" })
    );
}

#[test]
fn one_shot_event_leaves_calendar() {
    let mut sched = Scheduler::new();
    sched.schedule_event(MockEvent::at(100, 0.0)).unwrap();
    let mut log = run(&mut sched, 1);
    assert!(sched.is_empty());
    assert_eq!(
        sched.handle_next_event(&mut log),
        Err(SimError::EmptyCalendar)
    );
}

#[test]
fn return_flag_is_reported() {
    let mut sched = Scheduler::new();
    sched
        .schedule_event(MockEvent::at(450, 1.0).returning())
        .unwrap();
    let info = sched.handle_next_event(&mut Vec::new()).unwrap();
    assert!(info.return_from_run);
}

#[test]
fn handle_reports_dropped_scheduler() {
    let sched: Scheduler<MockEvent> = Scheduler::new();
    let handle = sched.async_handle();
    drop(sched);
    assert_eq!(
        handle.schedule(MockEvent::unscheduled(450)),
        Err(ScheduleError::SchedulerGone)
    );
}

#[test]
fn checkpoint_requests_from_many_threads_are_all_scheduled() {
    let mut sched: Scheduler<MockEvent> = Scheduler::new();
    sched
        .schedule_event(MockEvent::at(400, 100.0))
        .unwrap();
    let handles: Vec<_> = (0..4)
        .map(|tag| {
            let h = sched.async_handle();
            std::thread::spawn(move || h.schedule(MockEvent::unscheduled(450).tagged(tag).returning()))
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }
    sched.drain_async().unwrap();
    assert_eq!(sched.scheduled_events_of_type(EventTypeIndex(450)).len(), 4);
    let info = sched.handle_next_event(&mut Vec::new()).unwrap();
    assert_eq!(info.time, 1.0);
    assert!(info.return_from_run);
}

// ── Properties ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn calendar_pops_in_composite_key_order(
        entries in prop::collection::vec(
            (0u32..60, 0u32..4, prop::option::of(0u32..3)),
            1..80,
        )
    ) {
        let mut cal = Calendar::new();
        for (tag, (half_steps, kind, secondary)) in entries.iter().enumerate() {
            let t = f64::from(*half_steps) * 0.5;
            let mut e = MockEvent::at(kind * 100, t).tagged(tag as u32);
            if let Some(s) = secondary {
                e = e.with_secondary(f64::from(*s));
            }
            cal.insert(e).unwrap();
        }
        let mut prev: Option<MockEvent> = None;
        while let Some(e) = cal.pop_next() {
            if let Some(p) = &prev {
                let (tp, te) = (p.header.event_time.unwrap(), e.header.event_time.unwrap());
                prop_assert!(tp <= te);
                if tp == te && p.header.type_index == e.header.type_index {
                    if let (Some(a), Some(b)) = (p.secondary, e.secondary) {
                        prop_assert!(a <= b);
                        if a == b {
                            prop_assert!(p.tag < e.tag);
                        }
                    }
                }
                if tp == te {
                    prop_assert!(p.header.type_index <= e.header.type_index);
                }
            }
            prev = Some(e);
        }
        prop_assert!(cal.is_empty());
    }

    #[test]
    fn periodic_event_hits_every_whole_iteration(n in 1usize..300) {
        let mut sched = Scheduler::new();
        sched.schedule_event(MockEvent::at(500, 0.0).periodic(1.0)).unwrap();
        let log = run(&mut sched, n + 1);
        for (i, r) in log.iter().enumerate() {
            prop_assert_eq!(r.time, i as f64);
        }
    }
}
