use rdsim_core::error::SimError;
use rdsim_core::id::EventTypeIndex;
use rdsim_sched::{Event, EventHeader};

/// One execution of a [`MockEvent`].
#[derive(Clone, Debug, PartialEq)]
pub struct MockRecord {
    pub time: f64,
    pub type_index: u32,
    pub tag: u32,
    /// Budget handed in by the scheduler, for blockable events.
    pub budget: Option<f64>,
}

/// Configurable event that logs every execution.
///
/// Blockable mock events advance by the budget they were given, the way
/// a diffusion event does.
#[derive(Clone, Debug)]
pub struct MockEvent {
    pub header: EventHeader,
    pub tag: u32,
    pub secondary: Option<f64>,
    pub barrier: bool,
    pub blockable: bool,
    pub max_step: f64,
    pub budget: Option<f64>,
    pub returns: bool,
    /// Fail with this error on the n-th execution (0-based).
    pub fail_on: Option<(usize, SimError)>,
    runs: usize,
}

impl MockEvent {
    pub fn at(type_index: u32, time: f64) -> Self {
        Self {
            header: EventHeader::at(EventTypeIndex(type_index), time),
            tag: 0,
            secondary: None,
            barrier: false,
            blockable: false,
            max_step: 1.0,
            budget: None,
            returns: false,
            fail_on: None,
            runs: 0,
        }
    }

    pub fn unscheduled(type_index: u32) -> Self {
        Self {
            header: EventHeader::new(EventTypeIndex(type_index)),
            ..Self::at(type_index, 0.0)
        }
    }

    pub fn tagged(mut self, tag: u32) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_secondary(mut self, value: f64) -> Self {
        self.secondary = Some(value);
        self
    }

    pub fn periodic(mut self, interval: f64) -> Self {
        self.header.periodicity_interval = interval;
        self
    }

    pub fn barrier(mut self) -> Self {
        self.barrier = true;
        self
    }

    pub fn blockable(mut self, max_step: f64) -> Self {
        self.blockable = true;
        self.max_step = max_step;
        self
    }

    pub fn returning(mut self) -> Self {
        self.returns = true;
        self
    }

    pub fn failing_on(mut self, run: usize, err: SimError) -> Self {
        self.fail_on = Some((run, err));
        self
    }
}

impl Event for MockEvent {
    type Context = Vec<MockRecord>;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EventHeader {
        &mut self.header
    }

    fn secondary_ordering_value(&self) -> Option<f64> {
        self.secondary
    }

    fn is_barrier(&self) -> bool {
        self.barrier
    }

    fn may_be_blocked_by_barrier(&self) -> bool {
        self.blockable
    }

    fn max_time_up_to_next_barrier(&self) -> f64 {
        self.max_step
    }

    fn set_time_up_to_next_barrier(&mut self, time_step: f64) {
        self.budget = Some(time_step);
    }

    fn step(&mut self, ctx: &mut Self::Context) -> Result<(), SimError> {
        let run = self.runs;
        self.runs += 1;
        if let Some((n, err)) = &self.fail_on {
            if *n == run {
                return Err(err.clone());
            }
        }
        ctx.push(MockRecord {
            time: self.header.event_time.unwrap_or(f64::NAN),
            type_index: self.header.type_index.0,
            tag: self.tag,
            budget: self.budget,
        });
        Ok(())
    }

    fn update_event_time_for_next_execute(&mut self) -> bool {
        match self.budget.take() {
            Some(budget) if self.header.periodicity_interval > 0.0 => {
                if let Some(t) = self.header.event_time.as_mut() {
                    *t += budget;
                }
                true
            }
            _ => self.header.advance_periodic(),
        }
    }

    fn return_from_run_after_execution(&self) -> bool {
        self.returns
    }
}
