//! The simulation world: a scheduler plus the state its events mutate.
//!
//! [`World`] is the user-facing entry point. It validates the model,
//! schedules the always-present events (diffusion, compaction, end check)
//! and drives the calendar until an event asks to return.
//!
//! # Ownership model
//!
//! `World` is [`Send`]: it can be built on one thread and run on another.
//! Other threads talk to a running world only through the
//! [`AsyncScheduler`] returned by [`async_scheduler()`](World::async_scheduler).
//! Accessors borrow from `self`, so state cannot be inspected while
//! [`run()`](World::run) holds `&mut self`.

use std::time::Instant;

use tracing::info;

use rdsim_core::error::SimError;
use rdsim_core::id::{EventTypeIndex, SpeciesId};
use rdsim_core::species::Species;
use rdsim_geometry::Geometry;
use rdsim_sched::{AsyncScheduler, Event, EventExecutionInfo, Scheduler};

use crate::config::{ConfigError, SimulationConfig};
use crate::diffuse_react::DiffuseReactEvent;
use crate::events::{
    event_type, CountEvent, DefragmentEvent, ReleaseEvent, ReleaseShape, SimulationEndCheckEvent,
    VizOutputEvent, WorldEvent,
};
use crate::molecule::Molecule;
use crate::output::{CountRecord, CountRegion, VizFrame};
use crate::partition::Partition;
use crate::reactions::ReactionTable;
use crate::state::SimulationState;
use crate::stats::RunStats;

const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<World>();
    }
};

// ── RunOutcome ─────────────────────────────────────────────────────

/// Why [`World::run()`] returned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RunOutcome {
    /// The configured number of iterations has elapsed.
    Finished {
        /// Simulation time of the end check.
        time: f64,
    },
    /// A checkpoint event paused the run; call `run()` again to resume.
    Checkpoint {
        /// Simulation time of the checkpoint.
        time: f64,
    },
}

// ── World ──────────────────────────────────────────────────────────

/// A particle reaction-diffusion simulation.
///
/// # Example
///
/// ```ignore
/// let mut world = World::new(config, species, geometry, reactions)?;
/// world.add_release(ReleaseEvent::new(a, 100, shape, 0.0))?;
/// world.add_count(CountEvent::new(vec![CountTerm::world("A", a)], 10.0))?;
/// while let RunOutcome::Checkpoint { .. } = world.run()? {
///     snapshot(world.molecules());
/// }
/// ```
#[derive(Debug)]
pub struct World {
    scheduler: Scheduler<WorldEvent>,
    state: SimulationState,
}

impl World {
    /// Validate the model and schedule the built-in events.
    ///
    /// Diffusion and compaction start at time 0; the end check fires at
    /// `config.iterations`.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from [`SimulationState::new`], or
    /// [`ConfigError::InvalidEvent`] if a built-in event cannot be
    /// scheduled.
    pub fn new(
        config: SimulationConfig,
        species: Vec<Species>,
        geometry: Geometry,
        reactions: ReactionTable,
    ) -> Result<Self, ConfigError> {
        let final_iteration = config.iterations as f64;
        let state = SimulationState::new(config, species, geometry, reactions)?;
        let mut world = Self {
            scheduler: Scheduler::new(),
            state,
        };
        world.schedule(WorldEvent::DiffuseReact(DiffuseReactEvent::new(0.0)))?;
        world.schedule(WorldEvent::Defragment(DefragmentEvent::new(0.0)))?;
        world.schedule(WorldEvent::SimulationEndCheck(
            SimulationEndCheckEvent::new(final_iteration),
        ))?;
        Ok(world)
    }

    fn schedule(&mut self, event: WorldEvent) -> Result<(), ConfigError> {
        self.scheduler
            .schedule_event(event)
            .map_err(|e| ConfigError::InvalidEvent {
                reason: e.to_string(),
            })
    }

    /// Schedule a molecule release.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEvent`] if the species is unknown, a surface
    /// species is released into a volume shape (or the reverse), a wall
    /// index is out of range, or the release time is negative.
    pub fn add_release(&mut self, release: ReleaseEvent) -> Result<(), ConfigError> {
        let species = self.species_checked(release.species())?;
        let invalid = |reason: String| ConfigError::InvalidEvent { reason };
        match release.shape() {
            ReleaseShape::Walls { walls, .. } => {
                if !species.is_surface {
                    return Err(invalid(format!(
                        "volume species {} released onto walls",
                        species.name
                    )));
                }
                if walls.is_empty() {
                    return Err(invalid("wall release without walls".into()));
                }
                if let Some(w) = walls
                    .iter()
                    .find(|w| w.0 as usize >= self.state.geometry.wall_count())
                {
                    return Err(invalid(format!("wall {w} does not exist")));
                }
            }
            ReleaseShape::Sphere { radius, .. } => {
                if species.is_surface {
                    return Err(invalid(format!(
                        "surface species {} released into a volume",
                        species.name
                    )));
                }
                if !(*radius >= 0.0) {
                    return Err(invalid(format!("release radius {radius} is negative")));
                }
            }
            ReleaseShape::Box { lo, hi } => {
                if species.is_surface {
                    return Err(invalid(format!(
                        "surface species {} released into a volume",
                        species.name
                    )));
                }
                if (0..3).any(|a| lo.axis(a) > hi.axis(a)) {
                    return Err(invalid("release box has lo > hi".into()));
                }
            }
        }
        match release.event_time() {
            Some(t) if t >= 0.0 => {}
            t => return Err(invalid(format!("release time {t:?} is not a time"))),
        }
        self.schedule(release.into())
    }

    /// Schedule a periodic count barrier.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEvent`] for unknown species or wall indices
    /// in any term.
    pub fn add_count(&mut self, count: CountEvent) -> Result<(), ConfigError> {
        for term in count.terms() {
            self.species_checked(term.species)?;
            if let CountRegion::Walls(walls) = &term.region {
                if let Some(w) = walls
                    .iter()
                    .find(|w| w.0 as usize >= self.state.geometry.wall_count())
                {
                    return Err(ConfigError::InvalidEvent {
                        reason: format!("count term {} names missing wall {w}", term.label),
                    });
                }
            }
        }
        self.schedule(count.into())
    }

    /// Schedule a periodic visualization barrier.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEvent`] if the event cannot be scheduled.
    pub fn add_viz(&mut self, viz: VizOutputEvent) -> Result<(), ConfigError> {
        self.schedule(viz.into())
    }

    fn species_checked(&self, id: SpeciesId) -> Result<&Species, ConfigError> {
        self.state
            .species
            .get(id.0 as usize)
            .ok_or_else(|| ConfigError::InvalidEvent {
                reason: format!("species {id} does not exist"),
            })
    }

    /// A handle other threads can submit events through, typically
    /// [`CheckpointEvent::request()`](crate::CheckpointEvent::request).
    pub fn async_scheduler(&self) -> AsyncScheduler<WorldEvent> {
        self.scheduler.async_handle()
    }

    /// Execute exactly one event.
    ///
    /// # Errors
    ///
    /// Whatever the scheduler or the event reports; see
    /// [`Scheduler::handle_next_event`].
    pub fn step(&mut self) -> Result<EventExecutionInfo, SimError> {
        let started = Instant::now();
        let info = self.scheduler.handle_next_event(&mut self.state)?;
        let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.state.stats.record_event(info.type_index, micros);
        Ok(info)
    }

    /// Run events until the end check or a checkpoint asks to return.
    ///
    /// Calling `run()` again after [`RunOutcome::Finished`] returns the
    /// same outcome without executing anything.
    ///
    /// # Errors
    ///
    /// The first error any event reports. The world is left at the
    /// failing event and should not be resumed.
    pub fn run(&mut self) -> Result<RunOutcome, SimError> {
        if self.state.finished {
            return Ok(RunOutcome::Finished {
                time: self.scheduler.current_time(),
            });
        }
        info!(
            time = self.scheduler.current_time(),
            iterations = self.state.config.iterations,
            "run started"
        );
        loop {
            let info = self.step()?;
            if !info.return_from_run {
                continue;
            }
            if info.type_index == event_type::SIMULATION_END_CHECK {
                info!(
                    time = info.time,
                    events = self.state.stats.events_executed,
                    molecules = self.molecules().count(),
                    "run finished"
                );
                return Ok(RunOutcome::Finished { time: info.time });
            }
            info!(time = info.time, "run paused");
            return Ok(RunOutcome::Checkpoint { time: info.time });
        }
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// The full simulation state.
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Molecule storage, one entry per partition.
    pub fn partitions(&self) -> &[Partition] {
        &self.state.partitions
    }

    /// Every live molecule across all partitions.
    pub fn molecules(&self) -> impl Iterator<Item = &Molecule> {
        self.state.partitions.iter().flat_map(Partition::live_molecules)
    }

    /// Live molecules of one species.
    pub fn count_species(&self, species: SpeciesId) -> usize {
        self.state.count_species(species)
    }

    /// Records written by count events so far.
    pub fn counts(&self) -> &[CountRecord] {
        &self.state.counts
    }

    /// Frames written by visualization events so far.
    pub fn viz_frames(&self) -> &[VizFrame] {
        &self.state.viz_frames
    }

    /// Run counters.
    pub fn stats(&self) -> &RunStats {
        &self.state.stats
    }

    /// Times at which checkpoints executed.
    pub fn checkpoints(&self) -> &[f64] {
        &self.state.checkpoints
    }

    /// Whether the end check has run.
    pub fn is_finished(&self) -> bool {
        self.state.finished
    }

    /// Time of the most recently executed event.
    pub fn current_time(&self) -> f64 {
        self.scheduler.current_time()
    }

    /// Pending events of one kind, asynchronous submissions included.
    ///
    /// # Errors
    ///
    /// Errors from draining the asynchronous queue into the calendar.
    pub fn scheduled_events_of_type(
        &mut self,
        type_index: EventTypeIndex,
    ) -> Result<Vec<&WorldEvent>, SimError> {
        self.scheduler.drain_async()?;
        Ok(self.scheduler.scheduled_events_of_type(type_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CheckpointEvent;
    use crate::output::CountTerm;
    use rdsim_core::id::WallIndex;
    use rdsim_core::vec::Vec3;
    use rdsim_test_utils::{box_geometry, reflective_class, volume_species};

    fn world(iterations: u64) -> World {
        let geometry = box_geometry(Vec3::splat(-0.5), Vec3::splat(0.5), reflective_class());
        let config = SimulationConfig {
            iterations,
            partition_origin: Vec3::splat(-1.0),
            partition_edge_length: 2.0,
            subpartitions_per_axis: 4,
            ..SimulationConfig::default()
        };
        let species = vec![volume_species(0, 0.0)];
        World::new(config, species, geometry, ReactionTable::new()).unwrap()
    }

    fn sphere() -> ReleaseShape {
        ReleaseShape::Sphere {
            center: Vec3::zero(),
            radius: 0.1,
        }
    }

    #[test]
    fn builtin_events_are_scheduled() {
        let mut w = world(5);
        for kind in [
            event_type::DIFFUSE_REACT,
            event_type::DEFRAGMENT,
            event_type::SIMULATION_END_CHECK,
        ] {
            assert_eq!(w.scheduled_events_of_type(kind).unwrap().len(), 1);
        }
    }

    #[test]
    fn run_finishes_at_final_iteration() {
        let mut w = world(5);
        w.add_release(ReleaseEvent::new(SpeciesId(0), 3, sphere(), 0.0))
            .unwrap();
        assert_eq!(w.run().unwrap(), RunOutcome::Finished { time: 5.0 });
        assert!(w.is_finished());
        assert_eq!(w.count_species(SpeciesId(0)), 3);
        assert!(w.molecules().all(|m| m.diffusion_time == 5.0));
        assert!(w.stats().events_executed > 0);
        // Finished worlds do not run again.
        let executed = w.stats().events_executed;
        assert_eq!(w.run().unwrap(), RunOutcome::Finished { time: 5.0 });
        assert_eq!(w.stats().events_executed, executed);
    }

    #[test]
    fn zero_iterations_finish_immediately() {
        let mut w = world(0);
        assert_eq!(w.run().unwrap(), RunOutcome::Finished { time: 0.0 });
    }

    #[test]
    fn checkpoint_pauses_and_resumes() {
        let mut w = world(10);
        w.async_scheduler()
            .schedule(CheckpointEvent::at(4.0).into())
            .unwrap();
        w.add_release(ReleaseEvent::new(SpeciesId(0), 3, sphere(), 0.0))
            .unwrap();
        assert_eq!(w.run().unwrap(), RunOutcome::Checkpoint { time: 4.0 });
        assert_eq!(w.checkpoints(), &[4.0]);
        assert!(!w.is_finished());
        assert!(w.molecules().all(|m| m.diffusion_time == 4.0));
        assert_eq!(w.run().unwrap(), RunOutcome::Finished { time: 10.0 });
        assert!(w.molecules().all(|m| m.diffusion_time == 10.0));
    }

    #[test]
    fn fractional_release_is_counted_from_the_next_barrier() {
        let mut w = world(4);
        w.add_release(ReleaseEvent::new(SpeciesId(0), 1, sphere(), 2.75))
            .unwrap();
        w.add_count(CountEvent::new(vec![CountTerm::world("A", SpeciesId(0))], 1.0))
            .unwrap();
        assert_eq!(w.run().unwrap(), RunOutcome::Finished { time: 4.0 });
        let counts: Vec<(f64, usize)> = w.counts().iter().map(|r| (r.time, r.count)).collect();
        assert_eq!(
            counts,
            vec![(0.0, 0), (1.0, 0), (2.0, 0), (3.0, 1), (4.0, 1)]
        );
    }

    #[test]
    fn invalid_releases_are_rejected() {
        let mut w = world(1);
        assert!(matches!(
            w.add_release(ReleaseEvent::new(SpeciesId(7), 1, sphere(), 0.0)),
            Err(ConfigError::InvalidEvent { .. })
        ));
        let onto_walls = ReleaseShape::Walls {
            walls: vec![WallIndex(0)],
            orientation: 1,
        };
        assert!(matches!(
            w.add_release(ReleaseEvent::new(SpeciesId(0), 1, onto_walls, 0.0)),
            Err(ConfigError::InvalidEvent { .. })
        ));
        assert!(matches!(
            w.add_release(ReleaseEvent::new(SpeciesId(0), 1, sphere(), -2.0)),
            Err(ConfigError::InvalidEvent { .. })
        ));
    }

    #[test]
    fn count_with_missing_wall_is_rejected() {
        let mut w = world(1);
        let term = CountTerm::in_region("A", SpeciesId(0), CountRegion::Walls(vec![WallIndex(99)]));
        assert!(w.add_count(CountEvent::new(vec![term], 1.0)).is_err());
    }

    #[test]
    fn step_records_event_time() {
        let mut w = world(3);
        let info = w.step().unwrap();
        assert_eq!(info.time, 0.0);
        assert_eq!(w.stats().events_executed, 1);
        assert!(w.stats().event_us.contains_key(&info.type_index));
    }
}
