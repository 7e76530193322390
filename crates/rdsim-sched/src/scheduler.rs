//! The scheduler: a calendar plus an asynchronous submission queue.
//!
//! ```text
//!   host thread                     simulation thread
//!   -----------                     -----------------
//!   AsyncScheduler::schedule() --> [unbounded channel] --> drain_async()
//!                                                              |
//!                                  Scheduler::schedule_event() v
//!                                  ------------------------> Calendar
//!                                                              |
//!                                  handle_next_event() <-------+
//!                                     pop, cap by barrier, step, reinsert
//! ```
//!
//! The asynchronous queue is drained before every query whose answer
//! depends on the set of pending events, so a submission made before a
//! call is always visible to it.

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use rdsim_core::error::{ScheduleError, SimError};
use rdsim_core::id::EventTypeIndex;
use rdsim_core::time::next_iteration_start;

use crate::calendar::Calendar;
use crate::event::Event;

/// What happened in one [`Scheduler::handle_next_event`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventExecutionInfo {
    /// Time the event ran at.
    pub time: f64,
    /// Kind of the event.
    pub type_index: EventTypeIndex,
    /// Whether the run loop should return to its caller.
    pub return_from_run: bool,
}

/// A cloneable handle for submitting events from other threads.
///
/// Events submitted without a time are scheduled at the start of the
/// iteration after the one the simulation is in when they are drained.
pub struct AsyncScheduler<E> {
    tx: Sender<E>,
}

impl<E> Clone for AsyncScheduler<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> std::fmt::Debug for AsyncScheduler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncScheduler")
            .field("pending", &self.tx.len())
            .finish()
    }
}

impl<E> AsyncScheduler<E> {
    /// Queue an event for the scheduler.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::SchedulerGone`] when the scheduler has been dropped.
    pub fn schedule(&self, event: E) -> Result<(), ScheduleError> {
        self.tx.send(event).map_err(|_| ScheduleError::SchedulerGone)
    }
}

/// Owns the calendar and executes events one at a time.
#[derive(Debug)]
pub struct Scheduler<E> {
    calendar: Calendar<E>,
    async_tx: Sender<E>,
    async_rx: Receiver<E>,
    current_time: f64,
}

impl<E: Event> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> Scheduler<E> {
    /// A scheduler with an empty one-iteration-bucket calendar.
    pub fn new() -> Self {
        Self::with_calendar(Calendar::new())
    }

    /// A scheduler over an existing calendar.
    pub fn with_calendar(calendar: Calendar<E>) -> Self {
        let (async_tx, async_rx) = crossbeam_channel::unbounded();
        Self {
            calendar,
            async_tx,
            async_rx,
            current_time: 0.0,
        }
    }

    /// A handle other threads can submit events through.
    pub fn async_handle(&self) -> AsyncScheduler<E> {
        AsyncScheduler {
            tx: self.async_tx.clone(),
        }
    }

    /// Time of the most recently executed event (0 before the first).
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// The underlying calendar.
    pub fn calendar(&self) -> &Calendar<E> {
        &self.calendar
    }

    /// Number of events in the calendar, excluding undrained submissions.
    pub fn len(&self) -> usize {
        self.calendar.len()
    }

    /// Whether the calendar is empty, ignoring undrained submissions.
    pub fn is_empty(&self) -> bool {
        self.calendar.is_empty()
    }

    /// Insert an event synchronously.
    ///
    /// # Errors
    ///
    /// See [`Calendar::insert`].
    pub fn schedule_event(&mut self, event: E) -> Result<(), SimError> {
        self.calendar.insert(event)
    }

    /// Move every asynchronous submission into the calendar.
    ///
    /// # Errors
    ///
    /// See [`Calendar::insert`].
    pub fn drain_async(&mut self) -> Result<(), SimError> {
        while let Ok(mut event) = self.async_rx.try_recv() {
            if event.event_time().is_none() {
                event.header_mut().event_time = Some(next_iteration_start(self.current_time));
            }
            debug!(
                type_index = event.type_index().0,
                time = event.event_time(),
                "scheduled asynchronous event"
            );
            self.calendar.insert(event)?;
        }
        Ok(())
    }

    /// Time of the earliest pending event.
    ///
    /// # Errors
    ///
    /// Errors from draining asynchronous submissions.
    pub fn get_next_event_time(&mut self) -> Result<Option<f64>, SimError> {
        self.drain_async()?;
        Ok(self.calendar.get_next_time())
    }

    /// Pending events of one kind, in calendar order.
    ///
    /// Call [`drain_async()`](Self::drain_async) first to include
    /// asynchronous submissions.
    pub fn scheduled_events_of_type(&self, type_index: EventTypeIndex) -> Vec<&E> {
        self.calendar
            .iter()
            .filter(|e| e.type_index() == type_index)
            .collect()
    }

    /// Pop the earliest event, cap it by the next barrier if it is
    /// blockable, run it, and put it back if it wants another turn.
    ///
    /// # Errors
    ///
    /// [`SimError::EmptyCalendar`] when nothing is pending, and any error
    /// returned by the event's `step()` or by re-insertion.
    pub fn handle_next_event(
        &mut self,
        ctx: &mut E::Context,
    ) -> Result<EventExecutionInfo, SimError> {
        self.drain_async()?;
        let Some(mut event) = self.calendar.pop_next() else {
            return Err(if self.calendar.is_empty() {
                SimError::EmptyCalendar
            } else {
                SimError::AllocationFailed {
                    what: "calendar buckets",
                }
            });
        };

        let time = event.event_time().unwrap_or(self.current_time);
        self.current_time = time;
        let type_index = event.type_index();

        if event.may_be_blocked_by_barrier() {
            let max_step = event.max_time_up_to_next_barrier();
            let budget = self.calendar.get_time_up_to_next_barrier(time, max_step);
            event.set_time_up_to_next_barrier(budget);
        }

        debug!(time, type_index = type_index.0, "executing event");
        event.step(ctx)?;

        let info = EventExecutionInfo {
            time,
            type_index,
            return_from_run: event.return_from_run_after_execution(),
        };
        if event.update_event_time_for_next_execute() {
            self.calendar.insert(event)?;
        }
        Ok(info)
    }
}
