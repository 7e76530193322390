//! Read-only collision predicates used while ray-marching.
//!
//! None of these report errors. Degenerate configurations (a segment
//! landing exactly on a plane, crossing exactly through an edge or a
//! vertex) come back as a `Redo` outcome after the displacement has been
//! perturbed by a small random offset scaled to the operands; the caller
//! repeats the whole march with the perturbed displacement.

use rdsim_core::rng::SimRng;
use rdsim_core::time::EPS_C;
use rdsim_core::vec::{Vec2, Vec3};

use crate::wall::Wall;

/// Relative size of the perturbation applied before a redo. Much larger
/// than the tolerance band so one perturbation almost always escapes it.
pub const REDO_JITTER: f64 = 100.0 * EPS_C;

/// Where a segment meets something.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Impact {
    /// Fraction of the displacement travelled, in `[0, 1]`.
    pub t: f64,
    /// The point of impact.
    pub point: Vec3,
}

/// Result of testing a displacement against one wall.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CollisionOutcome {
    /// The segment does not touch the triangle.
    Miss,
    /// The segment crosses from the normal side.
    Front(Impact),
    /// The segment crosses from behind.
    Back(Impact),
    /// The test was degenerate; the displacement has been perturbed.
    Redo,
}

impl CollisionOutcome {
    /// The impact, for either side.
    pub fn impact(&self) -> Option<Impact> {
        match self {
            Self::Front(i) | Self::Back(i) => Some(*i),
            Self::Miss | Self::Redo => None,
        }
    }
}

/// Test the segment `pos -> pos + disp` against `wall`.
///
/// With `redo` set, degenerate hits perturb `disp` and return
/// [`CollisionOutcome::Redo`]. Without it they resolve deterministically:
/// edge hits count as hits, and in-plane or touching segments as misses.
pub fn collide_wall(
    pos: Vec3,
    disp: &mut Vec3,
    wall: &Wall,
    rng: &mut SimRng,
    redo: bool,
) -> CollisionOutcome {
    let dp = wall.signed_distance(pos);
    let dv = wall.normal.dot(*disp);
    let end = dp + dv;

    if (dp > 0.0 && end > 0.0) || (dp < 0.0 && end < 0.0) {
        return CollisionOutcome::Miss;
    }
    if dv == 0.0 || end == 0.0 {
        // Moving within the plane, or stopping exactly on it.
        if redo {
            jitter(pos, disp, rng);
            return CollisionOutcome::Redo;
        }
        return CollisionOutcome::Miss;
    }

    let t = (dp / -dv).clamp(0.0, 1.0);
    let point = pos + *disp * t;
    let uv = wall.to_local(point);
    let tol = EPS_C * (1.0 + point.max_abs());
    let dist = wall.edge_distances(uv);
    if dist.iter().any(|&d| d < -tol) {
        return CollisionOutcome::Miss;
    }
    if dist.iter().any(|&d| d <= tol) && redo {
        jitter(pos, disp, rng);
        return CollisionOutcome::Redo;
    }

    let impact = Impact { t, point };
    if dv < 0.0 {
        CollisionOutcome::Front(impact)
    } else {
        CollisionOutcome::Back(impact)
    }
}

/// Closest approach of the segment to a sphere's center.
///
/// Returns the closest-approach point when it lies on the segment and
/// within `radius` of `target`.
pub fn collide_sphere(pos: Vec3, disp: Vec3, target: Vec3, radius: f64) -> Option<Impact> {
    let len2 = disp.length_squared();
    if len2 == 0.0 {
        return None;
    }
    let t = (target - pos).dot(disp) / len2;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let point = pos + disp * t;
    if (target - point).length_squared() > radius * radius {
        return None;
    }
    Some(Impact { t, point })
}

/// Where a segment leaves an axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryExit {
    /// Fraction of the displacement travelled.
    pub t: f64,
    /// Axis of the face crossed.
    pub axis: usize,
    /// Whether the upper face was crossed.
    pub positive: bool,
}

/// First face of `[lo, hi)` the segment `pos -> pos + disp` crosses, if
/// it leaves the box before its end.
pub fn exit_box(pos: Vec3, disp: Vec3, lo: Vec3, hi: Vec3) -> Option<BoundaryExit> {
    let mut best: Option<BoundaryExit> = None;
    for axis in 0..3 {
        let d = disp.axis(axis);
        if d == 0.0 {
            continue;
        }
        let positive = d > 0.0;
        let face = if positive { hi.axis(axis) } else { lo.axis(axis) };
        let t = ((face - pos.axis(axis)) / d).max(0.0);
        if t > 1.0 {
            continue;
        }
        if best.is_none_or(|b| t < b.t) {
            best = Some(BoundaryExit { t, axis, positive });
        }
    }
    best
}

/// Mirror a displacement about a plane with unit normal `normal`.
pub fn reflect(disp: Vec3, normal: Vec3) -> Vec3 {
    disp - normal * (2.0 * disp.dot(normal))
}

/// Result of moving a surface molecule within its wall.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EdgeCrossing {
    /// The whole displacement stays on the wall.
    Inside,
    /// The displacement leaves through `edge` after fraction `t`.
    Cross {
        /// Edge slot `0..3`.
        edge: usize,
        /// Fraction of the displacement travelled.
        t: f64,
        /// Crossing point in the wall's frame.
        point: Vec2,
    },
    /// The path passes exactly through a vertex; the displacement has
    /// been perturbed.
    Redo,
}

/// Find where `uv -> uv + disp` first leaves `wall`'s triangle.
pub fn find_edge_crossing(
    wall: &Wall,
    uv: Vec2,
    disp: &mut Vec2,
    rng: &mut SimRng,
    redo: bool,
) -> EdgeCrossing {
    let start = wall.edge_distances(uv);
    let end = wall.edge_distances(uv + *disp);
    if end.iter().all(|&d| d >= 0.0) {
        return EdgeCrossing::Inside;
    }

    let mut hits: [(f64, usize); 3] = [(f64::INFINITY, 0), (f64::INFINITY, 1), (f64::INFINITY, 2)];
    for (i, hit) in hits.iter_mut().enumerate() {
        if end[i] < 0.0 {
            let d0 = start[i].max(0.0);
            hit.0 = d0 / (d0 - end[i]);
        }
    }
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (t, edge) = hits[0];
    let tol = EPS_C * (1.0 + uv.max_abs() + disp.max_abs());
    if redo && hits[1].0.is_finite() && (hits[1].0 - t) * disp.length() <= tol {
        let scale = REDO_JITTER * (uv.max_abs() + disp.max_abs());
        *disp += Vec2::new(rng.uniform_signed() * scale, rng.uniform_signed() * scale);
        return EdgeCrossing::Redo;
    }
    EdgeCrossing::Cross {
        edge,
        t,
        point: uv + *disp * t,
    }
}

/// Reflect a 2-D displacement off edge `edge` of `wall`.
pub fn reflect_off_edge(wall: &Wall, edge: usize, disp: Vec2) -> Vec2 {
    let a = wall.uv_vertices[edge];
    let b = wall.uv_vertices[(edge + 1) % 3];
    let dir = b - a;
    let len = dir.length();
    let n = Vec2::new(-dir.v / len, dir.u / len);
    disp - n * (2.0 * disp.dot(n))
}

fn jitter(pos: Vec3, disp: &mut Vec3, rng: &mut SimRng) {
    let scale = REDO_JITTER * (pos.max_abs() + disp.max_abs());
    *disp += Vec3::new(
        rng.uniform_signed() * scale,
        rng.uniform_signed() * scale,
        rng.uniform_signed() * scale,
    );
}
