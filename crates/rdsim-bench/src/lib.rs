//! Benchmark profiles for the rdsim reaction-diffusion engine.
//!
//! - [`reference_world`]: 1 000 diffusing molecules in a reflective box
//!   with a reversible dimerization, counted every iteration
//! - [`stress_world`]: the same model at 10 000 molecules

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rdsim_core::id::SpeciesId;
use rdsim_core::vec::Vec3;
use rdsim_engine::{
    CountEvent, CountTerm, Pathway, ReactionClass, ReactionTable, ReleaseEvent, ReleaseShape,
    SimulationConfig, World,
};
use rdsim_test_utils::{box_geometry, reflective_class, volume_species};

/// Half the box edge, in µm.
pub const BOX_HALF_EDGE: f64 = 1.0;

/// `A + A -> B`, `B -> 2A` in a reflective box holding `molecules` A.
///
/// # Panics
///
/// Panics if the hard-coded model fails validation.
pub fn build_world(seed: u64, molecules: usize, iterations: u64) -> World {
    let config = SimulationConfig {
        seed,
        iterations,
        partition_origin: Vec3::splat(-2.0 * BOX_HALF_EDGE),
        partition_edge_length: 4.0 * BOX_HALF_EDGE,
        subpartitions_per_axis: 20,
        rx_radius_3d: 0.01,
        ..SimulationConfig::default()
    };
    let a = SpeciesId(0);
    let b = SpeciesId(1);
    let reactions = ReactionTable::new()
        .with(ReactionClass::bimolecular(
            a,
            a,
            vec![Pathway::new(0.5).with_product(b)],
        ))
        .and_then(|t| {
            t.with(ReactionClass::unimolecular(
                b,
                vec![Pathway::new(1e5).with_product(a).with_product(a)],
            ))
        })
        .expect("benchmark reactions are valid");
    let geometry = box_geometry(
        Vec3::splat(-BOX_HALF_EDGE),
        Vec3::splat(BOX_HALF_EDGE),
        reflective_class(),
    );
    let species = vec![volume_species(0, 10.0), volume_species(1, 5.0)];
    let mut world =
        World::new(config, species, geometry, reactions).expect("benchmark model is valid");

    let fill = ReleaseShape::Box {
        lo: Vec3::splat(-0.9 * BOX_HALF_EDGE),
        hi: Vec3::splat(0.9 * BOX_HALF_EDGE),
    };
    world
        .add_release(ReleaseEvent::new(a, molecules, fill, 0.0))
        .expect("release is valid");
    world
        .add_count(CountEvent::new(
            vec![CountTerm::world("A", a), CountTerm::world("B", b)],
            1.0,
        ))
        .expect("count is valid");
    world
}

/// 1 000 molecules for 100 iterations.
pub fn reference_world(seed: u64) -> World {
    build_world(seed, 1_000, 100)
}

/// 10 000 molecules for 100 iterations.
pub fn stress_world(seed: u64) -> World {
    build_world(seed, 10_000, 100)
}
