//! A fixed-width slice of simulated time holding events in execution order.

use std::cmp::Ordering;
use std::collections::VecDeque;

use rdsim_core::time::{cmp_eq, EPS};

use crate::event::Event;

/// Execution order of two events.
///
/// Times closer than [`EPS`] compare equal, then the type key decides,
/// then the secondary ordering value when both events supply one.
/// `Equal` means the events keep insertion order.
pub fn execution_order<E: Event>(a: &E, b: &E) -> Ordering {
    let ta = a.event_time().unwrap_or(f64::NEG_INFINITY);
    let tb = b.event_time().unwrap_or(f64::NEG_INFINITY);
    if (ta - tb).abs() > EPS {
        return ta.total_cmp(&tb);
    }
    match a.type_index().cmp(&b.type_index()) {
        Ordering::Equal => {}
        other => return other,
    }
    match (a.secondary_ordering_value(), b.secondary_ordering_value()) {
        (Some(sa), Some(sb)) if !cmp_eq(sa, sb) => sa.total_cmp(&sb),
        _ => Ordering::Equal,
    }
}

/// Events whose times fall in `[start_time, start_time + width)`.
#[derive(Debug)]
pub struct Bucket<E> {
    start_time: f64,
    events: VecDeque<E>,
}

impl<E: Event> Bucket<E> {
    /// An empty bucket starting at `start_time`.
    pub fn new(start_time: f64) -> Self {
        Self {
            start_time,
            events: VecDeque::new(),
        }
    }

    /// Start of the bucket's interval.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Number of events held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the bucket holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Insert after every event that does not execute strictly later.
    ///
    /// Scans from the back: periodic events are usually re-inserted at the
    /// end of their bucket.
    pub fn insert(&mut self, event: E) {
        let mut idx = self.events.len();
        while idx > 0 && execution_order(&self.events[idx - 1], &event) == Ordering::Greater {
            idx -= 1;
        }
        self.events.insert(idx, event);
    }

    /// The first event to execute, if any.
    pub fn front(&self) -> Option<&E> {
        self.events.front()
    }

    /// Remove the first event to execute.
    pub fn pop_front(&mut self) -> Option<E> {
        self.events.pop_front()
    }

    /// Events in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.events.iter()
    }
}
