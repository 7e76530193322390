//! The bucketed event calendar.
//!
//! A [`Calendar`] is a contiguous run of equal-width [`Bucket`]s. The
//! bucket owning time `t` has integer key `floor((t + EPS) / width)`;
//! buckets are created on demand at either end, and empty leading buckets
//! are discarded as soon as they are passed. Events more than
//! [`FAR_FUTURE_HORIZON`] buckets ahead of the first bucket are parked in
//! an unsorted side list and moved into buckets once the calendar catches
//! up with them, so a single far-off event (the end-of-run check) does
//! not force millions of empty buckets into existence.

use std::collections::VecDeque;

use rdsim_core::error::{ScheduleError, SimError};
use rdsim_core::time::{cmp_eq, cmp_lt, EPS};

use crate::bucket::Bucket;
use crate::event::Event;

/// Width of a bucket when none is given: one iteration.
pub const DEFAULT_BUCKET_WIDTH: f64 = 1.0;

/// Number of buckets the calendar materializes ahead of its first bucket.
pub const FAR_FUTURE_HORIZON: i64 = 4096;

#[derive(Clone, Copy, Debug, PartialEq)]
enum BarrierCache {
    Unknown,
    Never,
    At(f64),
}

/// Time-ordered storage for pending events.
#[derive(Debug)]
pub struct Calendar<E> {
    buckets: VecDeque<Bucket<E>>,
    first_key: i64,
    bucket_width: f64,
    present: f64,
    barrier_cache: BarrierCache,
    far_future: Vec<E>,
    len: usize,
}

impl<E: Event> Default for Calendar<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> Calendar<E> {
    /// An empty calendar with one-iteration buckets.
    pub fn new() -> Self {
        Self::with_bucket_width(DEFAULT_BUCKET_WIDTH)
    }

    /// An empty calendar with the given bucket width.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_width` is not a positive finite number.
    pub fn with_bucket_width(bucket_width: f64) -> Self {
        assert!(
            bucket_width.is_finite() && bucket_width > 0.0,
            "bucket width must be positive and finite, got {bucket_width}"
        );
        Self {
            buckets: VecDeque::new(),
            first_key: 0,
            bucket_width,
            present: f64::NEG_INFINITY,
            barrier_cache: BarrierCache::Never,
            far_future: Vec::new(),
            len: 0,
        }
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no events are pending.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of materialized buckets, including empty interior ones.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Width of every bucket.
    pub fn bucket_width(&self) -> f64 {
        self.bucket_width
    }

    /// Time of the most recently popped event.
    pub fn present(&self) -> f64 {
        self.present
    }

    /// Add an event.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidState`] when the event has no time, a
    /// non-finite time, a time before [`present()`](Self::present), or is
    /// flagged both barrier and blockable. [`SimError::AllocationFailed`]
    /// when new buckets cannot be allocated.
    pub fn insert(&mut self, event: E) -> Result<(), SimError> {
        let time = self.check_insertable(&event)?;
        let key = self.key_of(time);
        let is_barrier = event.is_barrier();

        let mut spilled = false;
        if self.buckets.is_empty() {
            self.first_key = key;
        } else if key < self.first_key {
            if self.first_key - key > FAR_FUTURE_HORIZON {
                self.spill_buckets();
                self.first_key = key;
                spilled = true;
            } else {
                self.grow_front(key)?;
            }
        } else if key > self.last_key() && key - self.first_key >= FAR_FUTURE_HORIZON {
            self.far_future.push(event);
            self.len += 1;
            if is_barrier {
                self.note_barrier(time);
            }
            return Ok(());
        }

        self.place(key, event)?;
        self.len += 1;
        if is_barrier {
            self.note_barrier(time);
        }
        if spilled {
            self.refill_from_far_future()?;
        }
        Ok(())
    }

    /// Remove and return the earliest event.
    ///
    /// Returns `None` when the calendar is empty.
    pub fn pop_next(&mut self) -> Option<E> {
        let event = self.buckets.iter_mut().find_map(|b| b.pop_front())?;
        self.len -= 1;
        if let Some(t) = event.event_time() {
            self.present = t;
            if event.is_barrier() {
                if let BarrierCache::At(cached) = self.barrier_cache {
                    if cmp_eq(cached, t) {
                        self.barrier_cache = BarrierCache::Unknown;
                    }
                }
            }
        }
        self.trim_front();
        Some(event)
    }

    /// Time of the earliest pending event.
    pub fn get_next_time(&self) -> Option<f64> {
        self.buckets
            .iter()
            .find_map(|b| b.front())
            .and_then(|e| e.event_time())
    }

    /// Time a blockable event starting at `current_time` may run for.
    ///
    /// Returns `min(max_time_step, next_barrier - current_time)`, or
    /// `max_time_step` when no barrier is pending. Only barriers strictly
    /// after `current_time` count: a barrier at the same instant that sorts
    /// after the blockable event cannot stop it, and a zero budget would
    /// never advance. A cached barrier that is no longer ahead triggers one
    /// scan of the calendar.
    pub fn get_time_up_to_next_barrier(&mut self, current_time: f64, max_time_step: f64) -> f64 {
        let nearest = match self.barrier_cache {
            BarrierCache::At(t) if cmp_lt(current_time, t) => Some(t),
            BarrierCache::Never => None,
            _ => {
                let found = self.scan_for_barrier(current_time);
                self.barrier_cache = found.map_or(BarrierCache::Never, BarrierCache::At);
                found
            }
        };
        match nearest {
            Some(t) => max_time_step.min((t - current_time).max(0.0)),
            None => max_time_step,
        }
    }

    /// Pending events: bucketed ones in execution order, then far-future
    /// ones in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.buckets
            .iter()
            .flat_map(|b| b.iter())
            .chain(self.far_future.iter())
    }

    fn check_insertable(&self, event: &E) -> Result<f64, ScheduleError> {
        let invalid = |reason: String| ScheduleError::InvalidState {
            type_index: event.type_index(),
            reason,
        };
        let time = event
            .event_time()
            .ok_or_else(|| invalid("event time is not set".into()))?;
        if !time.is_finite() {
            return Err(invalid(format!("event time {time} is not finite")));
        }
        if cmp_lt(time, self.present) {
            return Err(invalid(format!(
                "event time {time} precedes the current time {}",
                self.present
            )));
        }
        if event.is_barrier() && event.may_be_blocked_by_barrier() {
            return Err(invalid(
                "event cannot be both a barrier and blockable by barriers".into(),
            ));
        }
        Ok(time)
    }

    fn key_of(&self, time: f64) -> i64 {
        ((time + EPS) / self.bucket_width).floor() as i64
    }

    fn start_of(&self, key: i64) -> f64 {
        key as f64 * self.bucket_width
    }

    fn last_key(&self) -> i64 {
        self.first_key + self.buckets.len() as i64 - 1
    }

    fn reserve(&mut self, additional: usize) -> Result<(), SimError> {
        self.buckets
            .try_reserve(additional)
            .map_err(|_| SimError::AllocationFailed {
                what: "calendar buckets",
            })
    }

    fn grow_front(&mut self, key: i64) -> Result<(), SimError> {
        self.reserve((self.first_key - key) as usize)?;
        while self.first_key > key {
            self.first_key -= 1;
            let start = self.start_of(self.first_key);
            self.buckets.push_front(Bucket::new(start));
        }
        Ok(())
    }

    /// Index of the bucket for `key`, creating trailing buckets as needed.
    /// `key` must not be below `first_key`.
    fn ensure_bucket(&mut self, key: i64) -> Result<usize, SimError> {
        let idx = (key - self.first_key) as usize;
        if idx >= self.buckets.len() {
            self.reserve(idx + 1 - self.buckets.len())?;
            while self.buckets.len() <= idx {
                let start = self.start_of(self.first_key + self.buckets.len() as i64);
                self.buckets.push_back(Bucket::new(start));
            }
        }
        Ok(idx)
    }

    fn place(&mut self, key: i64, event: E) -> Result<(), SimError> {
        let idx = self.ensure_bucket(key)?;
        self.buckets[idx].insert(event);
        Ok(())
    }

    /// Move every bucketed event to the far-future list, keeping order.
    fn spill_buckets(&mut self) {
        for mut bucket in self.buckets.drain(..) {
            while let Some(event) = bucket.pop_front() {
                self.far_future.push(event);
            }
        }
    }

    /// Bucket far-future events that are now within the horizon.
    fn refill_from_far_future(&mut self) -> Result<(), SimError> {
        if self.far_future.is_empty() {
            return Ok(());
        }
        if self.buckets.is_empty() {
            let min_key = self
                .far_future
                .iter()
                .filter_map(|e| e.event_time())
                .map(|t| self.key_of(t))
                .min();
            match min_key {
                Some(k) => self.first_key = k,
                None => return Ok(()),
            }
        }
        let limit = self.first_key + FAR_FUTURE_HORIZON;
        let pending = std::mem::take(&mut self.far_future);
        let mut result = Ok(());
        for event in pending {
            let key = event.event_time().map_or(i64::MAX, |t| self.key_of(t));
            if result.is_ok() && key < limit {
                match self.ensure_bucket(key) {
                    Ok(idx) => self.buckets[idx].insert(event),
                    Err(e) => {
                        result = Err(e);
                        self.far_future.push(event);
                    }
                }
            } else {
                self.far_future.push(event);
            }
        }
        result
    }

    fn trim_front(&mut self) {
        let mut advanced = false;
        while self.buckets.front().is_some_and(|b| b.is_empty()) {
            self.buckets.pop_front();
            self.first_key += 1;
            advanced = true;
        }
        if advanced || self.buckets.is_empty() {
            if let Err(e) = self.refill_from_far_future() {
                tracing::warn!(error = %e, "far-future events stay parked");
            }
        }
    }

    fn note_barrier(&mut self, time: f64) {
        self.barrier_cache = match self.barrier_cache {
            BarrierCache::Unknown => BarrierCache::Unknown,
            BarrierCache::Never => BarrierCache::At(time),
            BarrierCache::At(t) => BarrierCache::At(t.min(time)),
        };
    }

    fn scan_for_barrier(&self, current_time: f64) -> Option<f64> {
        let bucketed = self
            .buckets
            .iter()
            .flat_map(|b| b.iter())
            .filter(|e| e.is_barrier())
            .filter_map(|e| e.event_time())
            .find(|&t| cmp_lt(current_time, t));
        if bucketed.is_some() {
            return bucketed;
        }
        self.far_future
            .iter()
            .filter(|e| e.is_barrier())
            .filter_map(|e| e.event_time())
            .filter(|&t| cmp_lt(current_time, t))
            .min_by(f64::total_cmp)
    }
}
