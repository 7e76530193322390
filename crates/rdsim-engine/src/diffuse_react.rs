//! The per-iteration diffusion and reaction pass.
//!
//! [`DiffuseReactEvent`] fires once per iteration and advances every
//! molecule whose `diffusion_time` lies inside the window
//! `[event_time, event_time + budget)`. The budget is handed in by the
//! scheduler and never runs past the next barrier, so counts and
//! snapshots observe every molecule at exactly the barrier time.
//!
//! Molecules are processed in ascending id order. Each one moves in
//! sub-steps bounded by its species' time step, the window end, and its
//! next unimolecular reaction. A volume sub-step is a ray-march: collect
//! every wall, reaction partner and subpartition face the displacement
//! meets, sort by distance, and resolve the first one that changes the
//! trajectory. Products created inside the window are queued and
//! advanced with what is left of it once the selected set is done.

use std::cmp::Ordering;
use std::collections::VecDeque;

use smallvec::SmallVec;
use tracing::{debug, trace};

use rdsim_core::error::SimError;
use rdsim_core::id::{MoleculeId, SubpartIndex, SurfaceClassId, WallIndex};
use rdsim_core::rng::SimRng;
use rdsim_core::species::Species;
use rdsim_core::time::{cmp_le, cmp_lt, EPS_C};
use rdsim_core::vec::{Vec2, Vec3};
use rdsim_geometry::collision::{
    collide_sphere, collide_wall, exit_box, find_edge_crossing, reflect, reflect_off_edge,
};
use rdsim_geometry::{CollisionOutcome, EdgeCrossing, Geometry, WallInteraction};
use rdsim_sched::{Event, EventHeader};

use crate::config::SimulationConfig;
use crate::events::event_type;
use crate::molecule::{Location, Molecule};
use crate::partition::Partition;
use crate::reactions::{Product, ReactionTable};
use crate::state::{classify_placement, report_lost, SimulationState};
use crate::stats::RunStats;

/// Upper bound on marches per sub-step. Reached only by trajectories
/// trapped between nearly coincident walls; the molecule stops where it is.
const MARCH_LIMIT: usize = 10_000;

/// Offset, relative to coordinate magnitude, that keeps a reflected or
/// wall-born molecule strictly on one side of the wall plane.
const SIDE_NUDGE: f64 = 1e3 * EPS_C;

fn nudge(p: Vec3) -> f64 {
    SIDE_NUDGE * (1.0 + p.max_abs())
}

// ── DiffuseReactEvent ──────────────────────────────────────────────

/// Periodic event advancing every molecule through one window.
#[derive(Clone, Debug)]
pub struct DiffuseReactEvent {
    header: EventHeader,
    budget: Option<f64>,
}

impl DiffuseReactEvent {
    /// Event starting at `start`, repeating every iteration.
    pub fn new(start: f64) -> Self {
        Self {
            header: EventHeader::at(event_type::DIFFUSE_REACT, start).with_periodicity(1.0),
            budget: None,
        }
    }
}

impl Event for DiffuseReactEvent {
    type Context = SimulationState;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EventHeader {
        &mut self.header
    }

    fn may_be_blocked_by_barrier(&self) -> bool {
        true
    }

    fn max_time_up_to_next_barrier(&self) -> f64 {
        self.header.periodicity_interval
    }

    fn set_time_up_to_next_barrier(&mut self, time_step: f64) {
        self.budget = Some(time_step);
    }

    fn step(&mut self, state: &mut SimulationState) -> Result<(), SimError> {
        let start = self.header.event_time.unwrap_or(0.0);
        let budget = self.budget.unwrap_or(self.header.periodicity_interval);
        diffuse_window(state, start, start + budget)
    }

    fn update_event_time_for_next_execute(&mut self) -> bool {
        let advance = self
            .budget
            .take()
            .unwrap_or(self.header.periodicity_interval);
        match self.header.event_time.as_mut() {
            Some(t) => {
                *t += advance;
                true
            }
            None => false,
        }
    }
}

/// Advance every partition to `window_end`.
pub(crate) fn diffuse_window(
    state: &mut SimulationState,
    window_start: f64,
    window_end: f64,
) -> Result<(), SimError> {
    let SimulationState {
        config,
        species,
        geometry,
        reactions,
        partitions,
        rng,
        stats,
        ..
    } = state;
    for partition in partitions.iter_mut() {
        let mut walker = Walker {
            config: &*config,
            species: species.as_slice(),
            geometry: &*geometry,
            reactions: &*reactions,
            rng: &mut *rng,
            stats: &mut *stats,
            partition,
            window_end,
            queue: VecDeque::new(),
        };
        let (selected, queued) = walker.run()?;
        debug!(
            window_start,
            window_end, selected, queued, "diffusion window complete"
        );
    }
    Ok(())
}

// ── Walker ─────────────────────────────────────────────────────────

/// A molecule created mid-window, advanced after the selected set.
#[derive(Clone, Copy, Debug)]
struct DiffuseAction {
    id: MoleculeId,
    birth_wall: Option<WallIndex>,
}

/// Where reaction products appear.
#[derive(Clone, Copy, Debug)]
enum Site {
    Volume(Vec3),
    Wall { wall: WallIndex, uv: Vec2, side: i8 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Partner {
    Boundary { axis: usize, positive: bool },
    Wall { wall: WallIndex, front: bool },
    Molecule(MoleculeId),
}

impl Partner {
    /// Equal-distance order: boundary, then wall, then molecule, then index.
    fn order(&self) -> (u8, u32) {
        match *self {
            Self::Boundary { axis, .. } => (0, axis as u32),
            Self::Wall { wall, .. } => (1, wall.0),
            Self::Molecule(id) => (2, id.0),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Collision {
    t: f64,
    point: Vec3,
    partner: Partner,
}

fn collision_order(a: &Collision, b: &Collision) -> Ordering {
    a.t.total_cmp(&b.t)
        .then_with(|| a.partner.order().cmp(&b.partner.order()))
}

/// The straight segment currently being marched.
struct Segment {
    pos: Vec3,
    subpart: SubpartIndex,
    /// Wall just left; it cannot be hit again before the next turn.
    ignore: Option<WallIndex>,
    /// Distance already covered in earlier cells of this segment.
    floor: f64,
}

/// What stopped a march.
enum Stop {
    Boundary(Collision, usize, bool),
    Wall(Collision, WallIndex, bool),
}

struct Walker<'a> {
    config: &'a SimulationConfig,
    species: &'a [Species],
    geometry: &'a Geometry,
    reactions: &'a ReactionTable,
    rng: &'a mut SimRng,
    stats: &'a mut RunStats,
    partition: &'a mut Partition,
    window_end: f64,
    queue: VecDeque<DiffuseAction>,
}

impl Walker<'_> {
    /// Returns how many molecules were selected and how many products were
    /// queued behind them.
    fn run(&mut self) -> Result<(usize, usize), SimError> {
        let end = self.window_end;
        let mut selected: Vec<MoleculeId> = self
            .partition
            .live_molecules()
            .filter(|m| cmp_lt(m.diffusion_time, end))
            .map(|m| m.id)
            .collect();
        selected.sort_unstable();
        for &id in &selected {
            self.advance(id, None)?;
        }
        let mut queued = 0;
        while let Some(action) = self.queue.pop_front() {
            queued += 1;
            self.advance(action.id, action.birth_wall)?;
        }
        Ok((selected.len(), queued))
    }

    /// Move one molecule in sub-steps until it reaches the window end or
    /// is destroyed.
    fn advance(&mut self, id: MoleculeId, birth_wall: Option<WallIndex>) -> Result<(), SimError> {
        let mut ignore = birth_wall;
        loop {
            let Some(m) = self.partition.get(id).copied() else {
                return Ok(());
            };
            if m.defunct {
                return Ok(());
            }
            if !cmp_lt(m.diffusion_time, self.window_end) {
                break;
            }
            if ignore.is_none() {
                ignore = m.birth_wall;
            }

            let now = m.diffusion_time;
            let rxn_time = self.unimol_time(&m);
            if cmp_le(rxn_time, now) {
                return self.fire_unimol(&m, now);
            }

            let species = &self.species[m.species.0 as usize];
            let dt = species
                .time_step
                .min(self.window_end - now)
                .min(rxn_time - now);
            if species.can_diffuse() {
                self.stats.diffusion_steps += 1;
                let alive = match m.location {
                    Location::Volume { pos, subpart } => {
                        self.diffuse_volume(&m, pos, subpart, now, dt, ignore.take())?
                    }
                    Location::Surface { wall, pos2d, .. } => {
                        self.diffuse_surface(&m, wall, pos2d, dt);
                        true
                    }
                };
                if !alive {
                    return Ok(());
                }
            }
            ignore = None;

            // Snap to the window end so repeated windows do not drift.
            let reached = if cmp_le(self.window_end, now + dt) {
                self.window_end
            } else {
                now + dt
            };
            if let Some(mm) = self.partition.get_mut(id) {
                mm.diffusion_time = reached;
                mm.birth_wall = None;
            }
            if cmp_le(rxn_time, reached) {
                let Some(moved) = self.partition.get(id).copied() else {
                    return Ok(());
                };
                return self.fire_unimol(&moved, rxn_time);
            }
        }
        if let Some(mm) = self.partition.get_mut(id) {
            mm.birth_wall = None;
        }
        Ok(())
    }

    /// Scheduled unimolecular reaction time, drawn on first use.
    fn unimol_time(&mut self, m: &Molecule) -> f64 {
        if let Some(t) = m.unimol_rxn_time {
            return t;
        }
        let Some(class) = self.reactions.unimol(m.species) else {
            return f64::INFINITY;
        };
        let t = m.diffusion_time + self.rng.exponential(class.max_fixed_p() * self.config.time_unit);
        if let Some(mm) = self.partition.get_mut(m.id) {
            mm.unimol_rxn_time = Some(t);
        }
        t
    }

    fn fire_unimol(&mut self, m: &Molecule, time: f64) -> Result<(), SimError> {
        let reactions = self.reactions;
        let Some(class) = reactions.unimol(m.species) else {
            return Ok(());
        };
        let pathway = class.pick_pathway(self.rng);
        self.partition.mark_defunct(m.id);
        self.stats.unimol_reactions += 1;
        trace!(
            molecule = m.id.0,
            species = m.species.0,
            time,
            pathway,
            "unimolecular reaction"
        );
        let site = match m.location {
            Location::Volume { pos, .. } => Site::Volume(pos),
            Location::Surface {
                wall,
                pos2d,
                orientation,
            } => Site::Wall {
                wall,
                uv: pos2d,
                side: orientation,
            },
        };
        self.place_products(&class.pathways()[pathway].products, site, time)
    }

    // ── Volume ─────────────────────────────────────────────────────

    /// One volume sub-step. Returns `false` if the molecule was destroyed.
    fn diffuse_volume(
        &mut self,
        m: &Molecule,
        start: Vec3,
        start_subpart: SubpartIndex,
        now: f64,
        dt: f64,
        ignore: Option<WallIndex>,
    ) -> Result<bool, SimError> {
        let geometry = self.geometry;
        let species = &self.species[m.species.0 as usize];
        let sigma = species.step_sigma(dt, self.config.time_unit);
        let mut disp = Vec3::new(
            self.rng.gaussian() * sigma,
            self.rng.gaussian() * sigma,
            self.rng.gaussian() * sigma,
        );
        let seek_partners = !species.target_only
            && self.config.rx_radius_3d > 0.0
            && self.reactions.has_bimol(m.species);

        let mut seg = Segment {
            pos: start,
            subpart: start_subpart,
            ignore,
            floor: 0.0,
        };
        // Fraction of the sub-step not yet travelled when `seg` started.
        let mut remaining = 1.0;
        let mut redo_left = self.config.max_redo_attempts;

        for _ in 0..MARCH_LIMIT {
            let Some(hits) = self.gather(m, &seg, &mut disp, redo_left > 0, seek_partners) else {
                redo_left -= 1;
                self.stats.redo_count += 1;
                continue;
            };

            let mut stop = None;
            for hit in &hits {
                match hit.partner {
                    Partner::Molecule(other) => {
                        let time = now + dt * (1.0 - remaining * (1.0 - hit.t));
                        if self.try_bimol(m, other, hit.point, time)? {
                            return Ok(false);
                        }
                    }
                    Partner::Boundary { axis, positive } => {
                        stop = Some(Stop::Boundary(*hit, axis, positive));
                        break;
                    }
                    Partner::Wall { wall, front } => {
                        stop = Some(Stop::Wall(*hit, wall, front));
                        break;
                    }
                }
            }

            match stop {
                None => return self.commit_volume(m, seg.pos + disp),
                Some(Stop::Boundary(hit, axis, positive)) => {
                    // The segment is kept; only the cell whose walls and
                    // faces are tested changes.
                    match self.partition.grid().neighbor(seg.subpart, axis, positive) {
                        Some(next) => {
                            seg.subpart = next;
                            seg.floor = hit.t;
                            self.stats.subpart_crossings += 1;
                        }
                        None => {
                            self.partition.mark_defunct(m.id);
                            report_lost(
                                self.config.warnings.lost_molecule,
                                self.stats,
                                m.species,
                                hit.point,
                            )?;
                            return Ok(false);
                        }
                    }
                }
                Some(Stop::Wall(hit, wall_index, front)) => {
                    let wall = geometry.wall(wall_index);
                    let side: i8 = if front { 1 } else { -1 };
                    let time = now + dt * (1.0 - remaining * (1.0 - hit.t));
                    let interaction = geometry
                        .surface_class(wall.surface_class)
                        .map(|c| c.interaction_for(m.species))
                        .unwrap_or_default();
                    let rest = disp * (1.0 - hit.t);

                    match interaction {
                        WallInteraction::Transparent => {
                            remaining *= 1.0 - hit.t;
                            disp = rest;
                            seg = Segment {
                                pos: hit.point,
                                subpart: seg.subpart,
                                ignore: Some(wall_index),
                                floor: 0.0,
                            };
                            continue;
                        }
                        WallInteraction::Absorb => {
                            self.partition.mark_defunct(m.id);
                            self.stats.wall_reactions += 1;
                            trace!(molecule = m.id.0, wall = wall_index.0, time, "absorbed");
                            return Ok(false);
                        }
                        WallInteraction::React => {
                            let site = Site::Wall {
                                wall: wall_index,
                                uv: wall.to_local(hit.point),
                                side,
                            };
                            if self.try_wall_reaction(m, wall.surface_class, site, time)? {
                                return Ok(false);
                            }
                        }
                        WallInteraction::Reflect => {}
                    }

                    self.stats.wall_hits += 1;
                    remaining *= 1.0 - hit.t;
                    disp = reflect(rest, wall.normal);
                    let pos = hit.point + wall.normal * (f64::from(side) * nudge(hit.point));
                    seg = Segment {
                        pos,
                        subpart: self.partition.grid().subpart_index(pos).unwrap_or(seg.subpart),
                        ignore: Some(wall_index),
                        floor: 0.0,
                    };
                }
            }
        }
        debug!(molecule = m.id.0, "march limit reached, stopping in place");
        self.commit_volume(m, seg.pos)
    }

    /// Collect everything the segment `seg.pos -> seg.pos + disp` meets
    /// inside `seg.subpart`, sorted by distance. Walls and partners before
    /// `seg.floor` were already handled in a previous cell. `None` means a
    /// degenerate wall test perturbed `disp` and the march must start over.
    fn gather(
        &mut self,
        m: &Molecule,
        seg: &Segment,
        disp: &mut Vec3,
        redo: bool,
        seek_partners: bool,
    ) -> Option<SmallVec<[Collision; 8]>> {
        let mut hits: SmallVec<[Collision; 8]> = SmallVec::new();
        let grid = self.partition.grid();
        let pos = seg.pos;

        for &w in grid.walls_in(seg.subpart) {
            if Some(w) == seg.ignore {
                continue;
            }
            let (impact, front) = match collide_wall(pos, disp, self.geometry.wall(w), self.rng, redo) {
                CollisionOutcome::Redo => return None,
                CollisionOutcome::Miss => continue,
                CollisionOutcome::Front(i) => (i, true),
                CollisionOutcome::Back(i) => (i, false),
            };
            if impact.t < seg.floor {
                continue;
            }
            hits.push(Collision {
                t: impact.t,
                point: impact.point,
                partner: Partner::Wall { wall: w, front },
            });
        }

        let (lo, hi) = grid.subpart_bounds(seg.subpart);
        if let Some(exit) = exit_box(pos, *disp, lo, hi) {
            hits.push(Collision {
                t: exit.t.max(seg.floor),
                point: pos + *disp * exit.t,
                partner: Partner::Boundary {
                    axis: exit.axis,
                    positive: exit.positive,
                },
            });
        }

        if seek_partners {
            let r = self.config.rx_radius_3d;
            let end = pos + *disp;
            let reach = Vec3::splat(r);
            for sp in grid.subparts_overlapping(pos.min(end) - reach, pos.max(end) + reach) {
                for &other in self.partition.molecules_in_subpart(sp) {
                    if other == m.id {
                        continue;
                    }
                    let Some(o) = self.partition.get(other) else {
                        continue;
                    };
                    if self.reactions.bimol(m.species, o.species).is_none() {
                        continue;
                    }
                    let Some(target) = o.volume_pos() else {
                        continue;
                    };
                    // Inclusive: a partner exactly at the face sorts after
                    // the boundary, so the previous cell never tested it.
                    match collide_sphere(pos, *disp, target, r) {
                        Some(impact) if impact.t >= seg.floor => {
                            hits.push(Collision {
                                t: impact.t,
                                point: impact.point,
                                partner: Partner::Molecule(other),
                            });
                        }
                        _ => {}
                    }
                }
            }
        }

        hits.sort_by(collision_order);
        Some(hits)
    }

    fn commit_volume(&mut self, m: &Molecule, pos: Vec3) -> Result<bool, SimError> {
        match self.partition.grid().subpart_index(pos) {
            Some(subpart) => {
                self.partition.move_volume(m.id, pos, subpart);
                Ok(true)
            }
            None => {
                self.partition.mark_defunct(m.id);
                report_lost(self.config.warnings.lost_molecule, self.stats, m.species, pos)?;
                Ok(false)
            }
        }
    }

    fn try_bimol(
        &mut self,
        m: &Molecule,
        other: MoleculeId,
        point: Vec3,
        time: f64,
    ) -> Result<bool, SimError> {
        let reactions = self.reactions;
        let Some(o) = self.partition.get(other).copied() else {
            return Ok(false);
        };
        if o.defunct {
            return Ok(false);
        }
        let Some(class) = reactions.bimol(m.species, o.species) else {
            return Ok(false);
        };
        let Some(pathway) = class.test_collision(self.rng) else {
            return Ok(false);
        };
        self.partition.mark_defunct(m.id);
        self.partition.mark_defunct(other);
        self.stats.bimol_reactions += 1;
        trace!(
            molecule = m.id.0,
            partner = other.0,
            time,
            pathway,
            "bimolecular reaction"
        );
        self.place_products(&class.pathways()[pathway].products, Site::Volume(point), time)?;
        Ok(true)
    }

    fn try_wall_reaction(
        &mut self,
        m: &Molecule,
        class_id: SurfaceClassId,
        site: Site,
        time: f64,
    ) -> Result<bool, SimError> {
        let reactions = self.reactions;
        let Some(class) = reactions.surface(m.species, class_id) else {
            return Ok(false);
        };
        let Some(pathway) = class.test_collision(self.rng) else {
            return Ok(false);
        };
        self.partition.mark_defunct(m.id);
        self.stats.wall_reactions += 1;
        trace!(molecule = m.id.0, time, pathway, "wall reaction");
        self.place_products(&class.pathways()[pathway].products, site, time)?;
        Ok(true)
    }

    // ── Surface ────────────────────────────────────────────────────

    /// One surface sub-step in the wall's 2-D frame, following shared
    /// edges onto neighboring walls. A move onto a full wall is rejected.
    fn diffuse_surface(&mut self, m: &Molecule, start_wall: WallIndex, start: Vec2, dt: f64) {
        let species = &self.species[m.species.0 as usize];
        let sigma = species.step_sigma(dt, self.config.time_unit);
        let mut disp = Vec2::new(self.rng.gaussian() * sigma, self.rng.gaussian() * sigma);
        let mut wall_index = start_wall;
        let mut uv = start;
        let mut redo_left = self.config.max_redo_attempts;

        for _ in 0..MARCH_LIMIT {
            let wall = self.geometry.wall(wall_index);
            match find_edge_crossing(wall, uv, &mut disp, self.rng, redo_left > 0) {
                EdgeCrossing::Inside => {
                    uv += disp;
                    break;
                }
                EdgeCrossing::Redo => {
                    redo_left -= 1;
                    self.stats.redo_count += 1;
                }
                EdgeCrossing::Cross { edge, t, point } => {
                    let rest = disp * (1.0 - t);
                    let e = &wall.edges[edge];
                    match e.neighbor {
                        Some(next) => {
                            uv = e.map_point(point);
                            disp = e.map_direction(rest);
                            wall_index = next;
                        }
                        None => {
                            uv = point;
                            disp = reflect_off_edge(wall, edge, rest);
                        }
                    }
                }
            }
        }

        if wall_index != start_wall && !self.partition.has_room(self.geometry.wall(wall_index)) {
            return;
        }
        self.partition.move_surface(m.id, wall_index, uv);
    }

    // ── Products ───────────────────────────────────────────────────

    fn place_products(&mut self, products: &[Product], site: Site, time: f64) -> Result<(), SimError> {
        for product in products {
            let species = &self.species[product.species.0 as usize];
            let (result, birth_wall) = match site {
                Site::Volume(pos) => {
                    if species.is_surface {
                        continue;
                    }
                    let r = self.partition.add_volume_molecule(product.species, pos, time);
                    (r, None)
                }
                Site::Wall { wall, uv, side } => {
                    let w = self.geometry.wall(wall);
                    let r = if species.is_surface {
                        let orientation = match (product.orientation, side) {
                            (0, 0) => 1,
                            (0, s) => s,
                            (o, _) => o,
                        };
                        self.partition
                            .add_surface_molecule(product.species, w, uv, orientation, time)
                    } else {
                        let s = if product.orientation != 0 {
                            product.orientation
                        } else {
                            side
                        };
                        let sign = if s < 0 { -1.0 } else { 1.0 };
                        let p = w.to_world(uv);
                        let pos = p + w.normal * (sign * nudge(p));
                        self.partition.add_volume_molecule(product.species, pos, time)
                    };
                    (r, Some(wall))
                }
            };
            let Some(id) =
                classify_placement(self.config.warnings.placement_failure, self.stats, result)?
            else {
                continue;
            };
            if let Some(mm) = self.partition.get_mut(id) {
                mm.birth_wall = birth_wall;
            }
            if cmp_lt(time, self.window_end) {
                self.queue.push_back(DiffuseAction { id, birth_wall });
            }
        }
        Ok(())
    }
}
