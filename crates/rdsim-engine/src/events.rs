//! Every event kind the world schedules, and the [`WorldEvent`] sum type.
//!
//! Same-instant events run in ascending [`event_type`] order: releases,
//! then compaction, then counts and snapshots (both barriers), then the
//! end-of-run check and checkpoints, and diffusion last. A run that stops
//! at time `t` therefore leaves every molecule at `t`.

use tracing::{debug, info};

use rdsim_core::error::SimError;
use rdsim_core::id::{MoleculeId, SpeciesId, WallIndex};
use rdsim_core::time::{cmp_le, EPS};
use rdsim_core::vec::Vec3;
use rdsim_sched::{Event, EventHeader};

use crate::diffuse_react::DiffuseReactEvent;
use crate::output::{world_position, CountRecord, CountTerm, VizFrame, VizMolecule};
use crate::state::{classify_placement, SimulationState};

/// Fixed ordering keys, one per event kind.
pub mod event_type {
    use rdsim_core::id::EventTypeIndex;

    /// Molecule release.
    pub const RELEASE: EventTypeIndex = EventTypeIndex(100);
    /// Storage compaction.
    pub const DEFRAGMENT: EventTypeIndex = EventTypeIndex(150);
    /// Molecule counting (barrier).
    pub const COUNT: EventTypeIndex = EventTypeIndex(200);
    /// Visualization snapshot (barrier).
    pub const VIZ_OUTPUT: EventTypeIndex = EventTypeIndex(300);
    /// End of the configured iterations.
    pub const SIMULATION_END_CHECK: EventTypeIndex = EventTypeIndex(400);
    /// Host-requested pause.
    pub const CHECKPOINT: EventTypeIndex = EventTypeIndex(450);
    /// Diffusion and reactions (blockable).
    pub const DIFFUSE_REACT: EventTypeIndex = EventTypeIndex(500);
}

// ── ReleaseEvent ───────────────────────────────────────────────────

/// Where released molecules are placed.
#[derive(Clone, Debug, PartialEq)]
pub enum ReleaseShape {
    /// Uniformly inside a ball.
    Sphere {
        /// Center.
        center: Vec3,
        /// Radius in µm; zero releases every molecule at the center.
        radius: f64,
    },
    /// Uniformly inside an axis-aligned box.
    Box {
        /// Lower corner.
        lo: Vec3,
        /// Upper corner.
        hi: Vec3,
    },
    /// Uniformly over the area of a set of walls.
    Walls {
        /// Walls to cover.
        walls: Vec<WallIndex>,
        /// Orientation of the released surface molecules.
        orientation: i8,
    },
}

/// Release `count` molecules of one species, optionally repeating.
///
/// The event fires at the start of the iteration containing the release
/// time; molecules get the exact release time as their `diffusion_time`.
/// Several releases in one iteration run in release-time order.
#[derive(Clone, Debug)]
pub struct ReleaseEvent {
    header: EventHeader,
    species: SpeciesId,
    count: usize,
    shape: ReleaseShape,
    release_time: f64,
    repeat_interval: f64,
    repeats_left: u32,
}

impl ReleaseEvent {
    /// One release at `release_time` (in iterations).
    pub fn new(species: SpeciesId, count: usize, shape: ReleaseShape, release_time: f64) -> Self {
        Self {
            header: EventHeader::at(event_type::RELEASE, iteration_of(release_time)),
            species,
            count,
            shape,
            release_time,
            repeat_interval: 0.0,
            repeats_left: 0,
        }
    }

    /// Repeat the release `times` more times, `interval` iterations apart.
    pub fn repeating(mut self, interval: f64, times: u32) -> Self {
        self.repeat_interval = interval;
        self.repeats_left = times;
        self
    }

    /// Released species.
    pub fn species(&self) -> SpeciesId {
        self.species
    }

    /// Placement shape.
    pub fn shape(&self) -> &ReleaseShape {
        &self.shape
    }

    fn place_one(&self, state: &mut SimulationState) -> Result<Option<MoleculeId>, SimError> {
        let time = self.release_time;
        let result = match &self.shape {
            ReleaseShape::Sphere { center, radius } => {
                let offset = random_in_unit_ball(state) * *radius;
                state.place_volume(self.species, *center + offset, time)
            }
            ReleaseShape::Box { lo, hi } => {
                let pos = Vec3::new(
                    lo.x + (hi.x - lo.x) * state.rng.uniform(),
                    lo.y + (hi.y - lo.y) * state.rng.uniform(),
                    lo.z + (hi.z - lo.z) * state.rng.uniform(),
                );
                state.place_volume(self.species, pos, time)
            }
            ReleaseShape::Walls { walls, orientation } => {
                let Some(wall) = pick_by_area(state, walls) else {
                    return Ok(None);
                };
                let uv = state.geometry.wall(wall).random_local_point(&mut state.rng);
                state.place_surface(self.species, wall, uv, *orientation, time)
            }
        };
        classify_placement(state.config.warnings.placement_failure, &mut state.stats, result)
    }
}

fn iteration_of(time: f64) -> f64 {
    (time + EPS).floor()
}

fn random_in_unit_ball(state: &mut SimulationState) -> Vec3 {
    loop {
        let p = Vec3::new(
            state.rng.uniform_signed(),
            state.rng.uniform_signed(),
            state.rng.uniform_signed(),
        );
        if p.length_squared() <= 1.0 {
            return p;
        }
    }
}

fn pick_by_area(state: &mut SimulationState, walls: &[WallIndex]) -> Option<WallIndex> {
    let total: f64 = walls.iter().map(|&w| state.geometry.wall(w).area).sum();
    if walls.is_empty() || total <= 0.0 {
        return None;
    }
    let mut x = state.rng.uniform() * total;
    for &w in walls {
        x -= state.geometry.wall(w).area;
        if x < 0.0 {
            return Some(w);
        }
    }
    walls.last().copied()
}

impl Event for ReleaseEvent {
    type Context = SimulationState;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EventHeader {
        &mut self.header
    }

    fn secondary_ordering_value(&self) -> Option<f64> {
        Some(self.release_time)
    }

    fn step(&mut self, state: &mut SimulationState) -> Result<(), SimError> {
        let mut placed = 0;
        for _ in 0..self.count {
            if self.place_one(state)?.is_some() {
                placed += 1;
            }
        }
        info!(
            species = self.species.0,
            requested = self.count,
            placed,
            time = self.release_time,
            "released molecules"
        );
        Ok(())
    }

    fn update_event_time_for_next_execute(&mut self) -> bool {
        if self.repeats_left == 0 || self.repeat_interval <= 0.0 {
            return false;
        }
        self.repeats_left -= 1;
        self.release_time += self.repeat_interval;
        self.header.event_time = Some(iteration_of(self.release_time));
        true
    }
}

// ── DefragmentEvent ────────────────────────────────────────────────

/// Compacts partition storage every iteration it has something to do.
#[derive(Clone, Debug)]
pub struct DefragmentEvent {
    header: EventHeader,
}

impl DefragmentEvent {
    /// Periodic compaction starting at `start`.
    pub fn new(start: f64) -> Self {
        Self {
            header: EventHeader::at(event_type::DEFRAGMENT, start).with_periodicity(1.0),
        }
    }
}

impl Event for DefragmentEvent {
    type Context = SimulationState;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EventHeader {
        &mut self.header
    }

    fn step(&mut self, state: &mut SimulationState) -> Result<(), SimError> {
        for (i, partition) in state.partitions.iter_mut().enumerate() {
            if partition.defunct_count() == 0 {
                continue;
            }
            let removed = partition.defragment();
            state.stats.defragmentations += 1;
            debug!(partition = i, removed, remaining = partition.len(), "defragmented");
        }
        Ok(())
    }
}

// ── CountEvent ─────────────────────────────────────────────────────

/// Barrier that records molecule counts.
///
/// Molecules released later in the current iteration already sit in
/// storage with their future release time; they are not counted yet.
#[derive(Clone, Debug)]
pub struct CountEvent {
    header: EventHeader,
    terms: Vec<CountTerm>,
}

impl CountEvent {
    /// Count `terms` at time 0 and then every `every` iterations. An
    /// interval of zero counts once.
    pub fn new(terms: Vec<CountTerm>, every: f64) -> Self {
        Self::starting_at(terms, 0.0, every)
    }

    /// Count `terms` at `start` and then every `every` iterations.
    pub fn starting_at(terms: Vec<CountTerm>, start: f64, every: f64) -> Self {
        Self {
            header: EventHeader::at(event_type::COUNT, start).with_periodicity(every),
            terms,
        }
    }

    /// The observables.
    pub fn terms(&self) -> &[CountTerm] {
        &self.terms
    }
}

impl Event for CountEvent {
    type Context = SimulationState;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EventHeader {
        &mut self.header
    }

    fn is_barrier(&self) -> bool {
        true
    }

    fn step(&mut self, state: &mut SimulationState) -> Result<(), SimError> {
        let time = self.header.event_time.unwrap_or(0.0);
        state
            .counts
            .try_reserve(self.terms.len())
            .map_err(|_| SimError::AllocationFailed {
                what: "count records",
            })?;
        for term in &self.terms {
            let count = state
                .partitions
                .iter()
                .flat_map(|p| p.live_molecules())
                .filter(|m| cmp_le(m.diffusion_time, time))
                .filter(|m| m.species == term.species && term.region.contains(m, &state.geometry))
                .count();
            state.counts.push(CountRecord {
                time,
                label: term.label.clone(),
                count,
            });
        }
        Ok(())
    }
}

// ── VizOutputEvent ─────────────────────────────────────────────────

/// Barrier that records a snapshot of every live molecule that exists
/// at the frame time.
#[derive(Clone, Debug)]
pub struct VizOutputEvent {
    header: EventHeader,
}

impl VizOutputEvent {
    /// Snapshot at time 0 and then every `every` iterations.
    pub fn new(every: f64) -> Self {
        Self {
            header: EventHeader::at(event_type::VIZ_OUTPUT, 0.0).with_periodicity(every),
        }
    }
}

impl Event for VizOutputEvent {
    type Context = SimulationState;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EventHeader {
        &mut self.header
    }

    fn is_barrier(&self) -> bool {
        true
    }

    fn step(&mut self, state: &mut SimulationState) -> Result<(), SimError> {
        let time = self.header.event_time.unwrap_or(0.0);
        let mut molecules = Vec::new();
        for m in state
            .partitions
            .iter()
            .flat_map(|p| p.live_molecules())
            .filter(|m| cmp_le(m.diffusion_time, time))
        {
            molecules.push(VizMolecule {
                id: m.id,
                species: m.species,
                position: world_position(m, &state.geometry),
                wall: m.wall(),
            });
        }
        state
            .viz_frames
            .try_reserve(1)
            .map_err(|_| SimError::AllocationFailed { what: "viz frames" })?;
        debug!(time, molecules = molecules.len(), "visualization frame");
        state.viz_frames.push(VizFrame { time, molecules });
        Ok(())
    }
}

// ── SimulationEndCheckEvent ────────────────────────────────────────

/// Stops the run after the configured number of iterations.
#[derive(Clone, Debug)]
pub struct SimulationEndCheckEvent {
    header: EventHeader,
}

impl SimulationEndCheckEvent {
    /// Fires once at `final_iteration`.
    pub fn new(final_iteration: f64) -> Self {
        Self {
            header: EventHeader::at(event_type::SIMULATION_END_CHECK, final_iteration),
        }
    }
}

impl Event for SimulationEndCheckEvent {
    type Context = SimulationState;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EventHeader {
        &mut self.header
    }

    fn step(&mut self, state: &mut SimulationState) -> Result<(), SimError> {
        state.finished = true;
        Ok(())
    }

    fn return_from_run_after_execution(&self) -> bool {
        true
    }
}

// ── CheckpointEvent ────────────────────────────────────────────────

/// Pauses the run so the host can snapshot state through accessors.
///
/// Usually submitted from another thread through an
/// [`AsyncScheduler`](rdsim_sched::AsyncScheduler) without a time, in
/// which case it runs at the start of the next iteration.
#[derive(Clone, Debug)]
pub struct CheckpointEvent {
    header: EventHeader,
}

impl CheckpointEvent {
    /// Checkpoint at the next iteration boundary.
    pub fn request() -> Self {
        Self {
            header: EventHeader::new(event_type::CHECKPOINT),
        }
    }

    /// Checkpoint at a fixed time.
    pub fn at(time: f64) -> Self {
        Self {
            header: EventHeader::at(event_type::CHECKPOINT, time),
        }
    }
}

impl Event for CheckpointEvent {
    type Context = SimulationState;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EventHeader {
        &mut self.header
    }

    fn step(&mut self, state: &mut SimulationState) -> Result<(), SimError> {
        let time = self.header.event_time.unwrap_or(0.0);
        info!(time, "checkpoint requested");
        state.checkpoints.push(time);
        Ok(())
    }

    fn return_from_run_after_execution(&self) -> bool {
        true
    }
}

// ── WorldEvent ─────────────────────────────────────────────────────

/// Every event kind the world schedules.
#[derive(Clone, Debug)]
pub enum WorldEvent {
    /// See [`ReleaseEvent`].
    Release(ReleaseEvent),
    /// See [`DefragmentEvent`].
    Defragment(DefragmentEvent),
    /// See [`CountEvent`].
    Count(CountEvent),
    /// See [`VizOutputEvent`].
    VizOutput(VizOutputEvent),
    /// See [`DiffuseReactEvent`].
    DiffuseReact(DiffuseReactEvent),
    /// See [`SimulationEndCheckEvent`].
    SimulationEndCheck(SimulationEndCheckEvent),
    /// See [`CheckpointEvent`].
    Checkpoint(CheckpointEvent),
}

type Dyn = dyn Event<Context = SimulationState>;

impl WorldEvent {
    fn inner(&self) -> &Dyn {
        match self {
            Self::Release(e) => e,
            Self::Defragment(e) => e,
            Self::Count(e) => e,
            Self::VizOutput(e) => e,
            Self::DiffuseReact(e) => e,
            Self::SimulationEndCheck(e) => e,
            Self::Checkpoint(e) => e,
        }
    }

    fn inner_mut(&mut self) -> &mut Dyn {
        match self {
            Self::Release(e) => e,
            Self::Defragment(e) => e,
            Self::Count(e) => e,
            Self::VizOutput(e) => e,
            Self::DiffuseReact(e) => e,
            Self::SimulationEndCheck(e) => e,
            Self::Checkpoint(e) => e,
        }
    }
}

impl Event for WorldEvent {
    type Context = SimulationState;

    fn header(&self) -> &EventHeader {
        self.inner().header()
    }

    fn header_mut(&mut self) -> &mut EventHeader {
        self.inner_mut().header_mut()
    }

    fn secondary_ordering_value(&self) -> Option<f64> {
        self.inner().secondary_ordering_value()
    }

    fn is_barrier(&self) -> bool {
        self.inner().is_barrier()
    }

    fn may_be_blocked_by_barrier(&self) -> bool {
        self.inner().may_be_blocked_by_barrier()
    }

    fn max_time_up_to_next_barrier(&self) -> f64 {
        self.inner().max_time_up_to_next_barrier()
    }

    fn set_time_up_to_next_barrier(&mut self, time_step: f64) {
        self.inner_mut().set_time_up_to_next_barrier(time_step);
    }

    fn step(&mut self, ctx: &mut SimulationState) -> Result<(), SimError> {
        self.inner_mut().step(ctx)
    }

    fn update_event_time_for_next_execute(&mut self) -> bool {
        self.inner_mut().update_event_time_for_next_execute()
    }

    fn return_from_run_after_execution(&self) -> bool {
        self.inner().return_from_run_after_execution()
    }
}

impl From<ReleaseEvent> for WorldEvent {
    fn from(e: ReleaseEvent) -> Self {
        Self::Release(e)
    }
}

impl From<CountEvent> for WorldEvent {
    fn from(e: CountEvent) -> Self {
        Self::Count(e)
    }
}

impl From<VizOutputEvent> for WorldEvent {
    fn from(e: VizOutputEvent) -> Self {
        Self::VizOutput(e)
    }
}

impl From<CheckpointEvent> for WorldEvent {
    fn from(e: CheckpointEvent) -> Self {
        Self::Checkpoint(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::output::CountRegion;
    use crate::reactions::ReactionTable;
    use rdsim_core::species::Species;
    use rdsim_test_utils::{box_geometry, reflective_class, volume_species};

    fn state() -> SimulationState {
        let geometry = box_geometry(Vec3::splat(-0.5), Vec3::splat(0.5), reflective_class());
        let config = SimulationConfig {
            partition_origin: Vec3::splat(-1.0),
            partition_edge_length: 2.0,
            subpartitions_per_axis: 4,
            ..SimulationConfig::default()
        };
        SimulationState::new(
            config,
            vec![
                volume_species(0, 0.0),
                Species::surface(SpeciesId(1), "R", 0.0),
            ],
            geometry,
            ReactionTable::new(),
        )
        .unwrap()
    }

    fn small_box() -> ReleaseShape {
        ReleaseShape::Box {
            lo: Vec3::zero(),
            hi: Vec3::splat(0.1),
        }
    }

    #[test]
    fn release_orders_by_exact_time_within_iteration() {
        let late = ReleaseEvent::new(SpeciesId(0), 1, small_box(), 2.75);
        let early = ReleaseEvent::new(SpeciesId(0), 1, small_box(), 2.25);
        assert_eq!(late.header().event_time, Some(2.0));
        assert_eq!(early.header().event_time, Some(2.0));
        assert!(early.secondary_ordering_value() < late.secondary_ordering_value());
    }

    #[test]
    fn sphere_release_places_inside_radius() {
        let mut s = state();
        let mut e = ReleaseEvent::new(
            SpeciesId(0),
            50,
            ReleaseShape::Sphere {
                center: Vec3::splat(0.1),
                radius: 0.2,
            },
            0.5,
        );
        e.step(&mut s).unwrap();
        assert_eq!(s.count_species(SpeciesId(0)), 50);
        for m in s.partitions[0].live_molecules() {
            let d = m.volume_pos().unwrap() - Vec3::splat(0.1);
            assert!(d.length() <= 0.2 + 1e-12);
            assert_eq!(m.diffusion_time, 0.5);
        }
    }

    #[test]
    fn release_outside_partition_is_counted_not_fatal() {
        let mut s = state();
        let mut e = ReleaseEvent::new(
            SpeciesId(0),
            3,
            ReleaseShape::Sphere {
                center: Vec3::splat(10.0),
                radius: 0.0,
            },
            0.0,
        );
        e.step(&mut s).unwrap();
        assert_eq!(s.count_species(SpeciesId(0)), 0);
        assert_eq!(s.stats.placement_failures, 3);
    }

    #[test]
    fn wall_release_puts_molecules_on_listed_walls() {
        let mut s = state();
        let walls = vec![WallIndex(0), WallIndex(1)];
        let mut e = ReleaseEvent::new(
            SpeciesId(1),
            20,
            ReleaseShape::Walls {
                walls: walls.clone(),
                orientation: 1,
            },
            0.0,
        );
        e.step(&mut s).unwrap();
        let on_walls = s.partitions[0]
            .live_molecules()
            .filter(|m| m.wall().is_some_and(|w| walls.contains(&w)))
            .count();
        assert_eq!(on_walls, 20);
    }

    #[test]
    fn repeating_release_advances_release_time() {
        let mut e = ReleaseEvent::new(SpeciesId(0), 1, small_box(), 0.5).repeating(1.5, 2);
        assert!(e.update_event_time_for_next_execute());
        assert_eq!(e.header().event_time, Some(2.0));
        assert_eq!(e.secondary_ordering_value(), Some(2.0));
        assert!(e.update_event_time_for_next_execute());
        assert_eq!(e.header().event_time, Some(3.0));
        assert!(!e.update_event_time_for_next_execute());
    }

    #[test]
    fn count_records_one_value_per_term() {
        let mut s = state();
        s.partitions[0]
            .add_volume_molecule(SpeciesId(0), Vec3::splat(0.1), 0.0)
            .unwrap();
        s.partitions[0]
            .add_volume_molecule(SpeciesId(0), Vec3::splat(-0.3), 0.0)
            .unwrap();
        let mut e = CountEvent::new(
            vec![
                CountTerm::world("all", SpeciesId(0)),
                CountTerm::in_region(
                    "positive",
                    SpeciesId(0),
                    CountRegion::Box {
                        lo: Vec3::zero(),
                        hi: Vec3::splat(1.0),
                    },
                ),
            ],
            10.0,
        );
        assert!(e.is_barrier());
        e.step(&mut s).unwrap();
        let values: Vec<(&str, usize)> = s
            .counts
            .iter()
            .map(|r| (r.label.as_str(), r.count))
            .collect();
        assert_eq!(values, vec![("all", 2), ("positive", 1)]);
    }

    #[test]
    fn count_and_viz_skip_molecules_released_later_in_the_iteration() {
        let mut s = state();
        ReleaseEvent::new(SpeciesId(0), 1, small_box(), 2.0)
            .step(&mut s)
            .unwrap();
        ReleaseEvent::new(SpeciesId(0), 1, small_box(), 2.75)
            .step(&mut s)
            .unwrap();
        let mut count = CountEvent::starting_at(vec![CountTerm::world("A", SpeciesId(0))], 2.0, 1.0);
        count.step(&mut s).unwrap();
        assert_eq!(s.counts[0].count, 1);
        let mut viz = VizOutputEvent::new(1.0);
        viz.header_mut().event_time = Some(2.0);
        viz.step(&mut s).unwrap();
        assert_eq!(s.viz_frames[0].molecules.len(), 1);
    }

    #[test]
    fn defragment_event_compacts_partitions() {
        let mut s = state();
        let a = s.partitions[0]
            .add_volume_molecule(SpeciesId(0), Vec3::zero(), 0.0)
            .unwrap();
        s.partitions[0]
            .add_volume_molecule(SpeciesId(0), Vec3::zero(), 0.0)
            .unwrap();
        s.partitions[0].mark_defunct(a);
        DefragmentEvent::new(0.0).step(&mut s).unwrap();
        assert_eq!(s.partitions[0].len(), 1);
        assert_eq!(s.stats.defragmentations, 1);
        DefragmentEvent::new(0.0).step(&mut s).unwrap();
        assert_eq!(s.stats.defragmentations, 1);
    }

    #[test]
    fn world_event_delegates_flags() {
        let diffuse = WorldEvent::DiffuseReact(DiffuseReactEvent::new(0.0));
        assert!(diffuse.may_be_blocked_by_barrier());
        assert!(!diffuse.is_barrier());
        let count = WorldEvent::from(CountEvent::new(Vec::new(), 1.0));
        assert!(count.is_barrier());
        assert_eq!(count.type_index(), event_type::COUNT);
        let checkpoint = WorldEvent::from(CheckpointEvent::request());
        assert!(checkpoint.return_from_run_after_execution());
        assert_eq!(checkpoint.event_time(), None);
    }

    #[test]
    fn run_control_precedes_diffusion_and_follows_observers() {
        assert!(event_type::VIZ_OUTPUT < event_type::SIMULATION_END_CHECK);
        assert!(event_type::SIMULATION_END_CHECK < event_type::CHECKPOINT);
        assert!(event_type::CHECKPOINT < event_type::DIFFUSE_REACT);
    }
}
