//! Run counters.
//!
//! [`RunStats`] accumulates over the whole run; hosts read it between
//! calls to [`World::run()`](crate::World::run).

use indexmap::IndexMap;

use rdsim_core::id::EventTypeIndex;

/// Counters collected while the simulation runs.
///
/// Durations are in microseconds of wall-clock time.
#[derive(Clone, Debug, Default)]
pub struct RunStats {
    /// Events executed.
    pub events_executed: u64,
    /// Molecule sub-steps taken (volume and surface).
    pub diffusion_steps: u64,
    /// Volume molecules reflected off walls.
    pub wall_hits: u64,
    /// Degenerate collision tests that were perturbed and retried.
    pub redo_count: u64,
    /// Subpartition faces crossed.
    pub subpart_crossings: u64,
    /// Unimolecular reactions fired.
    pub unimol_reactions: u64,
    /// Volume-volume reactions fired.
    pub bimol_reactions: u64,
    /// Wall reactions fired, absorptions included.
    pub wall_reactions: u64,
    /// Molecules that could not be placed.
    pub placement_failures: u64,
    /// Molecules that left the partition.
    pub lost_molecules: u64,
    /// Compaction passes that removed at least one record.
    pub defragmentations: u64,
    /// Wall-clock time per event kind.
    pub event_us: IndexMap<EventTypeIndex, u64>,
}

impl RunStats {
    pub(crate) fn record_event(&mut self, type_index: EventTypeIndex, micros: u64) {
        self.events_executed += 1;
        *self.event_us.entry(type_index).or_insert(0) += micros;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let s = RunStats::default();
        assert_eq!(s.events_executed, 0);
        assert_eq!(s.redo_count, 0);
        assert!(s.event_us.is_empty());
    }

    #[test]
    fn event_time_accumulates_per_kind() {
        let mut s = RunStats::default();
        s.record_event(EventTypeIndex(500), 3);
        s.record_event(EventTypeIndex(500), 4);
        s.record_event(EventTypeIndex(200), 1);
        assert_eq!(s.events_executed, 3);
        assert_eq!(s.event_us[&EventTypeIndex(500)], 7);
        assert_eq!(s.event_us.len(), 2);
    }
}
