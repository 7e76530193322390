//! The [`Event`] trait and the scheduling data every event carries.

use rdsim_core::error::SimError;
use rdsim_core::id::EventTypeIndex;

/// Scheduling data shared by every event kind.
#[derive(Clone, Debug, PartialEq)]
pub struct EventHeader {
    /// Absolute simulated time of the next execution; `None` until scheduled.
    pub event_time: Option<f64>,
    /// Repeat interval in iterations. `0.0` means fire once.
    pub periodicity_interval: f64,
    /// Fixed ordering key of the event kind.
    pub type_index: EventTypeIndex,
}

impl EventHeader {
    /// Header for a one-shot event with no time assigned yet.
    pub fn new(type_index: EventTypeIndex) -> Self {
        Self {
            event_time: None,
            periodicity_interval: 0.0,
            type_index,
        }
    }

    /// Header for a one-shot event at `time`.
    pub fn at(type_index: EventTypeIndex, time: f64) -> Self {
        Self {
            event_time: Some(time),
            ..Self::new(type_index)
        }
    }

    /// Set the repeat interval.
    pub fn with_periodicity(mut self, interval: f64) -> Self {
        self.periodicity_interval = interval;
        self
    }

    /// Advance a periodic event by its interval.
    ///
    /// Returns `false` for one-shot events, which leave the calendar.
    pub fn advance_periodic(&mut self) -> bool {
        if self.periodicity_interval <= 0.0 {
            return false;
        }
        match self.event_time.as_mut() {
            Some(t) => {
                *t += self.periodicity_interval;
                true
            }
            None => false,
        }
    }
}

/// A schedulable unit of work.
///
/// # Contract
///
/// - `is_barrier()` and `may_be_blocked_by_barrier()` are never both true;
///   the calendar rejects such events at insertion.
/// - The barrier-budget methods are only called on blockable events; the
///   default implementations panic because reaching them is a logic defect
///   in the caller.
/// - `step()` runs to completion. Returning an error abandons the
///   simulation.
pub trait Event {
    /// State the event mutates when it runs.
    type Context;

    /// Scheduling data.
    fn header(&self) -> &EventHeader;

    /// Mutable scheduling data.
    fn header_mut(&mut self) -> &mut EventHeader;

    /// Scheduled time, if any.
    fn event_time(&self) -> Option<f64> {
        self.header().event_time
    }

    /// Ordering key of the event kind.
    fn type_index(&self) -> EventTypeIndex {
        self.header().type_index
    }

    /// Orders same-time events of the same kind. `None` keeps insertion order.
    fn secondary_ordering_value(&self) -> Option<f64> {
        None
    }

    /// Whether no blockable event may run past this event's time.
    fn is_barrier(&self) -> bool {
        false
    }

    /// Whether this event must be given a budget up to the next barrier.
    fn may_be_blocked_by_barrier(&self) -> bool {
        false
    }

    /// The longest span this event would run for without a barrier.
    fn max_time_up_to_next_barrier(&self) -> f64 {
        panic!(
            "event type {} is not blockable by barriers",
            self.type_index()
        )
    }

    /// Receive the budget computed by the scheduler before `step()`.
    fn set_time_up_to_next_barrier(&mut self, _time_step: f64) {
        panic!(
            "event type {} is not blockable by barriers",
            self.type_index()
        )
    }

    /// Execute the event.
    fn step(&mut self, ctx: &mut Self::Context) -> Result<(), SimError>;

    /// Move the event to its next execution time.
    ///
    /// Returns `false` when the event should be dropped.
    fn update_event_time_for_next_execute(&mut self) -> bool {
        self.header_mut().advance_periodic()
    }

    /// Whether the run loop should return to its caller after this event.
    fn return_from_run_after_execution(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_header_does_not_advance() {
        let mut h = EventHeader::at(EventTypeIndex(1), 3.0);
        assert!(!h.advance_periodic());
        assert_eq!(h.event_time, Some(3.0));
    }

    #[test]
    fn periodic_header_advances_by_interval() {
        let mut h = EventHeader::at(EventTypeIndex(1), 0.0).with_periodicity(2.5);
        assert!(h.advance_periodic());
        assert!(h.advance_periodic());
        assert_eq!(h.event_time, Some(5.0));
    }

    #[test]
    fn unscheduled_periodic_header_does_not_advance() {
        let mut h = EventHeader::new(EventTypeIndex(1)).with_periodicity(1.0);
        assert!(!h.advance_periodic());
    }
}
