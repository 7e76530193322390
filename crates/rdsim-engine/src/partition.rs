//! Dense molecule storage for one partition.
//!
//! [`Partition`] keeps every molecule in a single `Vec` and maps stable
//! [`MoleculeId`]s to storage indices. Removing a molecule only marks it
//! defunct; [`defragment()`](Partition::defragment) later compacts the
//! storage in one forward pass and rewrites the id map.
//!
//! Volume molecules are also indexed by subpartition, and surface
//! molecules by wall, so collision and capacity queries stay local.

use indexmap::IndexSet;

use rdsim_core::error::{PlacementError, SimError};
use rdsim_core::id::{MoleculeId, SpeciesId, SubpartIndex, WallIndex};
use rdsim_core::vec::{Vec2, Vec3};
use rdsim_geometry::{SubpartGrid, Wall};

use crate::molecule::{Location, Molecule};

/// Molecule storage for one cubic partition.
#[derive(Clone, Debug)]
pub struct Partition {
    grid: SubpartGrid,
    molecules: Vec<Molecule>,
    /// `MoleculeId -> index into molecules`; `None` once compacted away.
    id_to_index: Vec<Option<usize>>,
    /// Live volume molecules per subpartition.
    subpart_molecules: Vec<IndexSet<MoleculeId>>,
    /// Live surface molecules per wall.
    wall_molecules: Vec<IndexSet<MoleculeId>>,
    defunct_count: usize,
}

impl Partition {
    /// Empty partition over `grid`, able to hold surface molecules on
    /// `wall_count` walls.
    pub fn new(grid: SubpartGrid, wall_count: usize) -> Self {
        let subparts = grid.len();
        Self {
            grid,
            molecules: Vec::new(),
            id_to_index: Vec::new(),
            subpart_molecules: vec![IndexSet::new(); subparts],
            wall_molecules: vec![IndexSet::new(); wall_count],
            defunct_count: 0,
        }
    }

    /// The subpartition grid.
    pub fn grid(&self) -> &SubpartGrid {
        &self.grid
    }

    /// All stored molecules, defunct ones included, in storage order.
    pub fn molecules(&self) -> &[Molecule] {
        &self.molecules
    }

    /// Live molecules in storage order.
    pub fn live_molecules(&self) -> impl Iterator<Item = &Molecule> {
        self.molecules.iter().filter(|m| !m.defunct)
    }

    /// Number of stored records, defunct ones included.
    pub fn len(&self) -> usize {
        self.molecules.len()
    }

    /// Whether storage is empty.
    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }

    /// Number of records marked defunct since the last compaction.
    pub fn defunct_count(&self) -> usize {
        self.defunct_count
    }

    /// Storage index of `id`, or `None` if it was never issued or has been
    /// compacted away.
    pub fn index_of(&self, id: MoleculeId) -> Option<usize> {
        self.id_to_index.get(id.0 as usize).copied().flatten()
    }

    /// Molecule by id. Defunct molecules are returned until compaction.
    pub fn get(&self, id: MoleculeId) -> Option<&Molecule> {
        self.index_of(id).map(|i| &self.molecules[i])
    }

    /// Mutable molecule by id. Location changes must go through
    /// [`move_volume()`](Self::move_volume) or
    /// [`move_surface()`](Self::move_surface) to keep the indices current.
    pub fn get_mut(&mut self, id: MoleculeId) -> Option<&mut Molecule> {
        self.index_of(id).map(|i| &mut self.molecules[i])
    }

    /// Live volume molecules in a subpartition.
    pub fn molecules_in_subpart(&self, subpart: SubpartIndex) -> &IndexSet<MoleculeId> {
        &self.subpart_molecules[subpart.0 as usize]
    }

    /// Live molecules of one species.
    pub fn count_species(&self, species: SpeciesId) -> usize {
        self.live_molecules().filter(|m| m.species == species).count()
    }

    /// Add a volume molecule at `pos`.
    ///
    /// # Errors
    ///
    /// [`PlacementError::OutsidePartition`] when `pos` is not inside this
    /// partition; [`SimError::AllocationFailed`] when storage cannot grow.
    pub fn add_volume_molecule(
        &mut self,
        species: SpeciesId,
        pos: Vec3,
        diffusion_time: f64,
    ) -> Result<MoleculeId, SimError> {
        let Some(subpart) = self.grid.subpart_index(pos) else {
            return Err(PlacementError::OutsidePartition {
                position: pos,
                species,
            }
            .into());
        };
        let id = self.push(species, Location::Volume { pos, subpart }, diffusion_time)?;
        self.subpart_molecules[subpart.0 as usize].insert(id);
        Ok(id)
    }

    /// Add a surface molecule on `wall` at local position `pos2d`.
    ///
    /// # Errors
    ///
    /// [`PlacementError::WallSaturated`] when the wall is at capacity;
    /// [`SimError::AllocationFailed`] when storage cannot grow.
    pub fn add_surface_molecule(
        &mut self,
        species: SpeciesId,
        wall: &Wall,
        pos2d: Vec2,
        orientation: i8,
        diffusion_time: f64,
    ) -> Result<MoleculeId, SimError> {
        if !self.has_room(wall) {
            return Err(PlacementError::WallSaturated {
                wall: wall.index,
                species,
            }
            .into());
        }
        let location = Location::Surface {
            wall: wall.index,
            pos2d,
            orientation,
        };
        let id = self.push(species, location, diffusion_time)?;
        self.wall_molecules[wall.index.0 as usize].insert(id);
        Ok(id)
    }

    /// Whether `wall` can take one more surface molecule.
    pub fn has_room(&self, wall: &Wall) -> bool {
        self.wall_molecules[wall.index.0 as usize].len() < wall.capacity
    }

    /// Mark a molecule defunct and drop it from the spatial indices.
    /// Returns `false` if it was already defunct or unknown.
    pub fn mark_defunct(&mut self, id: MoleculeId) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        let m = &mut self.molecules[i];
        if m.defunct {
            return false;
        }
        m.defunct = true;
        match m.location {
            Location::Volume { subpart, .. } => {
                self.subpart_molecules[subpart.0 as usize].shift_remove(&id);
            }
            Location::Surface { wall, .. } => {
                self.wall_molecules[wall.0 as usize].shift_remove(&id);
            }
        }
        self.defunct_count += 1;
        true
    }

    /// Move a live volume molecule to `pos` in `subpart`.
    pub fn move_volume(&mut self, id: MoleculeId, pos: Vec3, subpart: SubpartIndex) {
        let Some(i) = self.index_of(id) else {
            return;
        };
        let m = &mut self.molecules[i];
        if let Location::Volume { subpart: old, .. } = m.location {
            if old != subpart {
                self.subpart_molecules[old.0 as usize].shift_remove(&id);
                self.subpart_molecules[subpart.0 as usize].insert(id);
            }
            m.location = Location::Volume { pos, subpart };
        }
    }

    /// Move a live surface molecule to `pos2d` on `wall`, keeping its
    /// orientation.
    pub fn move_surface(&mut self, id: MoleculeId, wall: WallIndex, pos2d: Vec2) {
        let Some(i) = self.index_of(id) else {
            return;
        };
        let m = &mut self.molecules[i];
        if let Location::Surface {
            wall: old,
            orientation,
            ..
        } = m.location
        {
            if old != wall {
                self.wall_molecules[old.0 as usize].shift_remove(&id);
                self.wall_molecules[wall.0 as usize].insert(id);
            }
            m.location = Location::Surface {
                wall,
                pos2d,
                orientation,
            };
        }
    }

    /// Compact storage in a single forward pass.
    ///
    /// Live molecules keep their relative order and their `id -> index`
    /// entries are rewritten; entries of removed molecules become `None`.
    /// Returns the number of records removed.
    pub fn defragment(&mut self) -> usize {
        if self.defunct_count == 0 {
            return 0;
        }
        let before = self.molecules.len();
        let mut write = 0;
        for read in 0..before {
            let m = self.molecules[read];
            let slot = &mut self.id_to_index[m.id.0 as usize];
            if m.defunct {
                *slot = None;
                continue;
            }
            if write != read {
                self.molecules[write] = m;
                *slot = Some(write);
            }
            write += 1;
        }
        self.molecules.truncate(write);
        self.defunct_count = 0;
        before - write
    }

    fn push(
        &mut self,
        species: SpeciesId,
        location: Location,
        diffusion_time: f64,
    ) -> Result<MoleculeId, SimError> {
        let id = MoleculeId(u32::try_from(self.id_to_index.len()).map_err(|_| {
            SimError::AllocationFailed {
                what: "molecule ids",
            }
        })?);
        self.molecules
            .try_reserve(1)
            .map_err(|_| SimError::AllocationFailed { what: "molecules" })?;
        self.id_to_index
            .try_reserve(1)
            .map_err(|_| SimError::AllocationFailed {
                what: "molecule id map",
            })?;
        self.id_to_index.push(Some(self.molecules.len()));
        self.molecules.push(Molecule {
            id,
            species,
            location,
            diffusion_time,
            unimol_rxn_time: None,
            defunct: false,
            birth_wall: None,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdsim_geometry::Geometry;
    use rdsim_test_utils::{box_geometry, reflective_class};

    fn empty_partition() -> Partition {
        let geometry = Geometry::empty(vec![reflective_class()]);
        let grid = SubpartGrid::new(Vec3::splat(-1.0), 2.0, 4, &geometry).unwrap();
        Partition::new(grid, 0)
    }

    fn add_five(p: &mut Partition) -> Vec<MoleculeId> {
        (0..5)
            .map(|i| {
                p.add_volume_molecule(SpeciesId(i), Vec3::splat(-0.9 + 0.3 * i as f64), 0.0)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn defragment_without_defunct_is_noop() {
        let mut p = empty_partition();
        let ids = add_five(&mut p);
        let before: Vec<Molecule> = p.molecules().to_vec();
        assert_eq!(p.defragment(), 0);
        assert_eq!(p.molecules(), before.as_slice());
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(p.index_of(*id), Some(i));
        }
    }

    #[test]
    fn defragment_compacts_and_rewrites_ids() {
        let mut p = empty_partition();
        let ids = add_five(&mut p);
        let (a, b, c, d, e) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
        assert!(p.mark_defunct(b));
        assert!(p.mark_defunct(d));
        assert_eq!(p.defunct_count(), 2);

        assert_eq!(p.defragment(), 2);
        let order: Vec<MoleculeId> = p.molecules().iter().map(|m| m.id).collect();
        assert_eq!(order, vec![a, c, e]);
        assert_eq!(p.index_of(a), Some(0));
        assert_eq!(p.index_of(c), Some(1));
        assert_eq!(p.index_of(e), Some(2));
        assert_eq!(p.index_of(b), None);
        assert_eq!(p.index_of(d), None);
        assert_eq!(p.defunct_count(), 0);
    }

    #[test]
    fn ids_are_not_reused_after_compaction() {
        let mut p = empty_partition();
        let ids = add_five(&mut p);
        p.mark_defunct(ids[4]);
        p.defragment();
        let next = p
            .add_volume_molecule(SpeciesId(0), Vec3::zero(), 0.0)
            .unwrap();
        assert_eq!(next, MoleculeId(5));
        assert_eq!(p.index_of(next), Some(4));
    }

    #[test]
    fn defunct_molecules_leave_spatial_index() {
        let mut p = empty_partition();
        let id = p
            .add_volume_molecule(SpeciesId(0), Vec3::splat(0.1), 0.0)
            .unwrap();
        let sp = p.grid().subpart_index(Vec3::splat(0.1)).unwrap();
        assert!(p.molecules_in_subpart(sp).contains(&id));
        assert!(p.mark_defunct(id));
        assert!(!p.mark_defunct(id));
        assert!(p.molecules_in_subpart(sp).is_empty());
        assert_eq!(p.count_species(SpeciesId(0)), 0);
    }

    #[test]
    fn move_volume_updates_subpart_membership() {
        let mut p = empty_partition();
        let id = p
            .add_volume_molecule(SpeciesId(0), Vec3::splat(-0.9), 0.0)
            .unwrap();
        let from = p.grid().subpart_index(Vec3::splat(-0.9)).unwrap();
        let to = p.grid().subpart_index(Vec3::splat(0.9)).unwrap();
        p.move_volume(id, Vec3::splat(0.9), to);
        assert!(p.molecules_in_subpart(from).is_empty());
        assert!(p.molecules_in_subpart(to).contains(&id));
    }

    #[test]
    fn outside_position_is_a_placement_error() {
        let mut p = empty_partition();
        let err = p
            .add_volume_molecule(SpeciesId(3), Vec3::splat(5.0), 0.0)
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::Placement(PlacementError::OutsidePartition { .. })
        ));
        assert!(p.is_empty());
    }

    #[test]
    fn saturated_wall_rejects_surface_molecule() {
        let geometry = box_geometry(Vec3::splat(-0.5), Vec3::splat(0.5), reflective_class());
        let grid = SubpartGrid::new(Vec3::splat(-1.0), 2.0, 2, &geometry).unwrap();
        let mut p = Partition::new(grid, geometry.wall_count());
        let wall = geometry.wall(WallIndex(0));
        let uv = wall.local_centroid();
        for _ in 0..wall.capacity {
            p.add_surface_molecule(SpeciesId(1), wall, uv, 1, 0.0)
                .unwrap();
        }
        let err = p
            .add_surface_molecule(SpeciesId(1), wall, uv, 1, 0.0)
            .unwrap_err();
        assert_eq!(
            err,
            SimError::Placement(PlacementError::WallSaturated {
                wall: WallIndex(0),
                species: SpeciesId(1),
            })
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn compaction_keeps_survivors_in_order(mask in prop::collection::vec(any::<bool>(), 0..40)) {
                let mut p = empty_partition();
                let ids: Vec<MoleculeId> = mask
                    .iter()
                    .enumerate()
                    .map(|(i, _)| {
                        let x = -0.95 + 1.9 * (i as f64 / 40.0);
                        p.add_volume_molecule(SpeciesId(0), Vec3::new(x, 0.1, -0.1), 0.0)
                            .unwrap()
                    })
                    .collect();
                for (id, &dead) in ids.iter().zip(&mask) {
                    if dead {
                        p.mark_defunct(*id);
                    }
                }
                let dead = mask.iter().filter(|&&d| d).count();
                prop_assert_eq!(p.defragment(), dead);

                let survivors: Vec<MoleculeId> = ids
                    .iter()
                    .zip(&mask)
                    .filter(|&(_, &d)| !d)
                    .map(|(id, _)| *id)
                    .collect();
                let order: Vec<MoleculeId> = p.molecules().iter().map(|m| m.id).collect();
                prop_assert_eq!(&order, &survivors);
                for (i, id) in survivors.iter().enumerate() {
                    prop_assert_eq!(p.index_of(*id), Some(i));
                }
                prop_assert_eq!(p.count_species(SpeciesId(0)), survivors.len());
            }
        }
    }
}
