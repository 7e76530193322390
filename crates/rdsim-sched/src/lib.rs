//! Deterministic discrete-event scheduling for rdsim.
//!
//! Events live in a [`Calendar`]: a contiguous run of fixed-width
//! [`Bucket`]s, each holding its events in strict execution order. The
//! [`Scheduler`] owns the calendar, accepts events synchronously or from
//! other threads through an [`AsyncScheduler`] handle, and executes one
//! event per [`handle_next_event()`](Scheduler::handle_next_event) call.
//!
//! # Ordering
//!
//! Events are ordered by the composite key
//! `(event_time, type_index, secondary_ordering_value, insertion order)`,
//! with times closer than [`EPS`](rdsim_core::time::EPS) treated as equal.
//!
//! # Barriers
//!
//! A barrier event (counting, visualization) marks an instant that no
//! blockable event may run past. Before stepping a blockable event the
//! scheduler computes the time left up to the next barrier and hands it
//! to the event as its budget.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bucket;
pub mod calendar;
pub mod event;
pub mod scheduler;

pub use bucket::Bucket;
pub use calendar::Calendar;
pub use event::{Event, EventHeader};
pub use scheduler::{AsyncScheduler, EventExecutionInfo, Scheduler};
