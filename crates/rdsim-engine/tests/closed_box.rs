//! Integration test: molecules released into a closed reflective box.
//!
//! Counts run as barriers every iteration and a visualization frame is
//! taken alongside, so every assertion sees the population exactly at an
//! iteration boundary.

use rdsim_core::id::{SpeciesId, WallIndex};
use rdsim_core::species::Species;
use rdsim_core::vec::Vec3;
use rdsim_engine::{
    CountEvent, CountRegion, CountTerm, ReactionTable, ReleaseEvent, ReleaseShape, RunOutcome,
    SimulationConfig, VizOutputEvent, World,
};
use rdsim_test_utils::{box_geometry, reflective_class, volume_species};

const HALF: f64 = 0.5;

fn config(iterations: u64) -> SimulationConfig {
    SimulationConfig {
        seed: 11,
        iterations,
        partition_origin: Vec3::splat(-1.0),
        partition_edge_length: 2.0,
        subpartitions_per_axis: 5,
        ..SimulationConfig::default()
    }
}

fn boxed_world(species: Vec<Species>, iterations: u64) -> World {
    let geometry = box_geometry(Vec3::splat(-HALF), Vec3::splat(HALF), reflective_class());
    World::new(config(iterations), species, geometry, ReactionTable::new()).unwrap()
}

fn inside_box(p: Vec3, tolerance: f64) -> bool {
    p.max_abs() <= HALF + tolerance
}

#[test]
fn immobile_molecule_is_counted_once_at_every_barrier() {
    let mut world = boxed_world(vec![volume_species(0, 0.0)], 20);
    let center = ReleaseShape::Sphere {
        center: Vec3::zero(),
        radius: 0.0,
    };
    world
        .add_release(ReleaseEvent::new(SpeciesId(0), 1, center, 0.0))
        .unwrap();
    world
        .add_count(CountEvent::new(vec![CountTerm::world("A", SpeciesId(0))], 1.0))
        .unwrap();
    world.add_viz(VizOutputEvent::new(1.0)).unwrap();

    assert_eq!(world.run().unwrap(), RunOutcome::Finished { time: 20.0 });

    let counts = world.counts();
    assert_eq!(counts.len(), 21);
    for (i, record) in counts.iter().enumerate() {
        assert_eq!(record.time, i as f64);
        assert_eq!(record.count, 1, "count at {}", record.time);
    }
    for frame in world.viz_frames() {
        assert_eq!(frame.molecules.len(), 1);
        assert_eq!(frame.molecules[0].position, Vec3::zero());
    }
    assert_eq!(world.stats().lost_molecules, 0);
}

#[test]
fn diffusing_molecules_never_leave_the_box() {
    let mut world = boxed_world(vec![volume_species(0, 1e5)], 100);
    let cube = ReleaseShape::Box {
        lo: Vec3::splat(-0.4),
        hi: Vec3::splat(0.4),
    };
    world
        .add_release(ReleaseEvent::new(SpeciesId(0), 20, cube, 0.0))
        .unwrap();
    let inside = CountRegion::Box {
        lo: Vec3::splat(-HALF),
        hi: Vec3::splat(HALF),
    };
    world
        .add_count(CountEvent::new(
            vec![CountTerm::in_region("inside", SpeciesId(0), inside)],
            1.0,
        ))
        .unwrap();
    world.add_viz(VizOutputEvent::new(5.0)).unwrap();

    world.run().unwrap();

    assert!(world.counts().iter().all(|r| r.count == 20));
    for frame in world.viz_frames() {
        for m in &frame.molecules {
            assert!(
                inside_box(m.position, 0.0),
                "molecule {} at {:?} outside the box at {}",
                m.id,
                m.position,
                frame.time
            );
        }
    }
    assert!(world.stats().wall_hits > 0);
    assert_eq!(world.stats().lost_molecules, 0);
}

#[test]
fn surface_molecules_stay_on_the_walls() {
    let surface = Species::surface(SpeciesId(1), "R", 1e3);
    let mut world = boxed_world(vec![volume_species(0, 0.0), surface], 30);
    let all_walls: Vec<WallIndex> = (0..12).map(WallIndex).collect();
    world
        .add_release(ReleaseEvent::new(
            SpeciesId(1),
            40,
            ReleaseShape::Walls {
                walls: all_walls.clone(),
                orientation: 1,
            },
            0.0,
        ))
        .unwrap();
    world
        .add_count(CountEvent::new(
            vec![CountTerm::in_region(
                "R",
                SpeciesId(1),
                CountRegion::Walls(all_walls),
            )],
            1.0,
        ))
        .unwrap();
    world.add_viz(VizOutputEvent::new(10.0)).unwrap();

    world.run().unwrap();

    assert!(world.counts().iter().all(|r| r.count == 40));
    for frame in world.viz_frames() {
        for m in &frame.molecules {
            assert!(m.wall.is_some());
            assert!(inside_box(m.position, 1e-6), "{:?}", m.position);
        }
    }
}
