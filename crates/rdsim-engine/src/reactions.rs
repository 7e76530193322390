//! Reaction classes and the table-driven reaction provider.
//!
//! A [`ReactionClass`] groups every pathway sharing the same reactants.
//! Unimolecular pathways carry rates in s⁻¹; bimolecular and wall
//! pathways carry per-collision probabilities. Cumulative values are
//! computed once at construction so pathway selection is a single scan.

use indexmap::IndexMap;
use smallvec::SmallVec;

use rdsim_core::id::{SpeciesId, SurfaceClassId};
use rdsim_core::rng::SimRng;

use crate::config::ConfigError;

/// One product of a pathway.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Product {
    /// Species created.
    pub species: SpeciesId,
    /// For surface products, `+1`/`-1` relative to the wall normal. For
    /// volume products created at a wall, the side to place them on; `0`
    /// keeps the reactant's side.
    pub orientation: i8,
}

/// One outcome of a reaction class.
#[derive(Clone, Debug, PartialEq)]
pub struct Pathway {
    /// Rate (s⁻¹) or per-collision probability, depending on the class.
    pub rate: f64,
    /// Products created when this pathway fires.
    pub products: SmallVec<[Product; 2]>,
}

impl Pathway {
    /// Pathway with no products.
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            products: SmallVec::new(),
        }
    }

    /// Add a volume product.
    pub fn with_product(self, species: SpeciesId) -> Self {
        self.with_oriented_product(species, 0)
    }

    /// Add a product with an orientation.
    pub fn with_oriented_product(mut self, species: SpeciesId, orientation: i8) -> Self {
        self.products.push(Product {
            species,
            orientation,
        });
        self
    }
}

/// What triggers a reaction class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReactionKind {
    /// A single molecule reacting spontaneously.
    Unimolecular,
    /// Two volume molecules colliding.
    Bimolecular,
    /// A volume molecule hitting a wall of a surface class.
    Surface,
}

/// All pathways for one reactant combination.
#[derive(Clone, Debug, PartialEq)]
pub struct ReactionClass {
    kind: ReactionKind,
    reactants: SmallVec<[SpeciesId; 2]>,
    surface_class: Option<SurfaceClassId>,
    pathways: SmallVec<[Pathway; 2]>,
    cumulative: SmallVec<[f64; 2]>,
    max_fixed_p: f64,
}

impl ReactionClass {
    /// Spontaneous reaction of `reactant`; pathway rates in s⁻¹.
    pub fn unimolecular(reactant: SpeciesId, pathways: Vec<Pathway>) -> Self {
        Self::build(
            ReactionKind::Unimolecular,
            SmallVec::from_slice(&[reactant]),
            None,
            pathways,
        )
    }

    /// Collision of `a` with `b`; pathway values are probabilities.
    pub fn bimolecular(a: SpeciesId, b: SpeciesId, pathways: Vec<Pathway>) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self::build(
            ReactionKind::Bimolecular,
            SmallVec::from_slice(&[lo, hi]),
            None,
            pathways,
        )
    }

    /// `reactant` hitting a wall of `class`; pathway values are probabilities.
    pub fn surface(reactant: SpeciesId, class: SurfaceClassId, pathways: Vec<Pathway>) -> Self {
        Self::build(
            ReactionKind::Surface,
            SmallVec::from_slice(&[reactant]),
            Some(class),
            pathways,
        )
    }

    fn build(
        kind: ReactionKind,
        reactants: SmallVec<[SpeciesId; 2]>,
        surface_class: Option<SurfaceClassId>,
        pathways: Vec<Pathway>,
    ) -> Self {
        let mut acc = 0.0;
        let cumulative = pathways
            .iter()
            .map(|p| {
                acc += p.rate;
                acc
            })
            .collect();
        Self {
            kind,
            reactants,
            surface_class,
            pathways: pathways.into(),
            cumulative,
            max_fixed_p: acc,
        }
    }

    /// Trigger kind.
    pub fn kind(&self) -> ReactionKind {
        self.kind
    }

    /// Reactant species; bimolecular reactants are sorted.
    pub fn reactants(&self) -> &[SpeciesId] {
        &self.reactants
    }

    /// Surface class of a wall reaction.
    pub fn surface_class(&self) -> Option<SurfaceClassId> {
        self.surface_class
    }

    /// Pathways in declaration order.
    pub fn pathways(&self) -> &[Pathway] {
        &self.pathways
    }

    /// Sum over all pathways: the total rate, or the total per-collision
    /// probability.
    pub fn max_fixed_p(&self) -> f64 {
        self.max_fixed_p
    }

    /// Decide whether a collision reacts, and through which pathway.
    ///
    /// A total probability above one always reacts.
    pub fn test_collision(&self, rng: &mut SimRng) -> Option<usize> {
        if self.max_fixed_p <= 0.0 {
            return None;
        }
        let p = rng.uniform();
        if p >= self.max_fixed_p {
            return None;
        }
        Some(self.pathway_at(p))
    }

    /// Pick a pathway with probability proportional to its rate.
    pub fn pick_pathway(&self, rng: &mut SimRng) -> usize {
        self.pathway_at(rng.uniform() * self.max_fixed_p)
    }

    fn pathway_at(&self, x: f64) -> usize {
        self.cumulative
            .iter()
            .position(|&c| x < c)
            .unwrap_or(self.cumulative.len().saturating_sub(1))
    }
}

/// Lookup tables from reactants to reaction classes.
///
/// Backed by `IndexMap` so iteration (and therefore validation order and
/// diagnostics) is deterministic.
#[derive(Clone, Debug, Default)]
pub struct ReactionTable {
    unimol: IndexMap<SpeciesId, ReactionClass>,
    bimol: IndexMap<(SpeciesId, SpeciesId), ReactionClass>,
    surface: IndexMap<(SpeciesId, SurfaceClassId), ReactionClass>,
    bimol_partners: IndexMap<SpeciesId, SmallVec<[SpeciesId; 4]>>,
}

impl ReactionTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reaction class.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidReaction`] if a class for the same reactants
    /// is already present or a value is negative or not finite.
    pub fn add(&mut self, class: ReactionClass) -> Result<(), ConfigError> {
        if class.pathways.is_empty() {
            return Err(ConfigError::InvalidReaction {
                reason: format!("{:?} class for {:?} has no pathways", class.kind, class.reactants),
            });
        }
        if let Some(p) = class
            .pathways
            .iter()
            .find(|p| !p.rate.is_finite() || p.rate < 0.0)
        {
            return Err(ConfigError::InvalidReaction {
                reason: format!("pathway value {} must be finite and non-negative", p.rate),
            });
        }
        let duplicate = || ConfigError::InvalidReaction {
            reason: format!("duplicate {:?} class for {:?}", class.kind, class.reactants),
        };
        match (class.kind, class.surface_class) {
            (ReactionKind::Unimolecular, _) => {
                let key = class.reactants[0];
                if self.unimol.contains_key(&key) {
                    return Err(duplicate());
                }
                self.unimol.insert(key, class);
            }
            (ReactionKind::Bimolecular, _) => {
                let key = (class.reactants[0], class.reactants[1]);
                if self.bimol.contains_key(&key) {
                    return Err(duplicate());
                }
                self.bimol_partners.entry(key.0).or_default().push(key.1);
                if key.0 != key.1 {
                    self.bimol_partners.entry(key.1).or_default().push(key.0);
                }
                self.bimol.insert(key, class);
            }
            (ReactionKind::Surface, Some(sc)) => {
                let key = (class.reactants[0], sc);
                if self.surface.contains_key(&key) {
                    return Err(duplicate());
                }
                self.surface.insert(key, class);
            }
            (ReactionKind::Surface, None) => {
                return Err(ConfigError::InvalidReaction {
                    reason: "surface reaction without a surface class".into(),
                });
            }
        }
        Ok(())
    }

    /// Builder form of [`add()`](Self::add).
    pub fn with(mut self, class: ReactionClass) -> Result<Self, ConfigError> {
        self.add(class)?;
        Ok(self)
    }

    /// Spontaneous reactions of `species`.
    pub fn unimol(&self, species: SpeciesId) -> Option<&ReactionClass> {
        self.unimol.get(&species)
    }

    /// Collision reactions between `a` and `b`, in either order.
    pub fn bimol(&self, a: SpeciesId, b: SpeciesId) -> Option<&ReactionClass> {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.bimol.get(&key)
    }

    /// Reactions of `species` hitting a wall of `class`.
    pub fn surface(&self, species: SpeciesId, class: SurfaceClassId) -> Option<&ReactionClass> {
        self.surface.get(&(species, class))
    }

    /// Whether `species` takes part in any volume collision reaction.
    pub fn has_bimol(&self, species: SpeciesId) -> bool {
        self.bimol_partners.contains_key(&species)
    }

    /// Every class, unimolecular first, then bimolecular, then wall.
    pub fn iter(&self) -> impl Iterator<Item = &ReactionClass> {
        self.unimol
            .values()
            .chain(self.bimol.values())
            .chain(self.surface.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: SpeciesId = SpeciesId(0);
    const B: SpeciesId = SpeciesId(1);
    const C: SpeciesId = SpeciesId(2);

    #[test]
    fn bimol_lookup_is_symmetric() {
        let table = ReactionTable::new()
            .with(ReactionClass::bimolecular(
                B,
                A,
                vec![Pathway::new(0.5).with_product(C)],
            ))
            .unwrap();
        assert!(table.bimol(A, B).is_some());
        assert!(table.bimol(B, A).is_some());
        assert!(table.has_bimol(A));
        assert!(table.has_bimol(B));
        assert!(!table.has_bimol(C));
        assert_eq!(table.bimol(A, B).unwrap().reactants(), &[A, B]);
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let mut table = ReactionTable::new();
        table
            .add(ReactionClass::unimolecular(A, vec![Pathway::new(1.0)]))
            .unwrap();
        assert!(matches!(
            table.add(ReactionClass::unimolecular(A, vec![Pathway::new(2.0)])),
            Err(ConfigError::InvalidReaction { .. })
        ));
    }

    #[test]
    fn negative_rate_is_rejected() {
        let mut table = ReactionTable::new();
        assert!(table
            .add(ReactionClass::unimolecular(A, vec![Pathway::new(-1.0)]))
            .is_err());
    }

    #[test]
    fn cumulative_probabilities_are_precomputed() {
        let class = ReactionClass::bimolecular(
            A,
            B,
            vec![Pathway::new(0.2), Pathway::new(0.3)],
        );
        assert!((class.max_fixed_p() - 0.5).abs() < 1e-15);
        assert_eq!(class.pathway_at(0.1), 0);
        assert_eq!(class.pathway_at(0.25), 1);
    }

    #[test]
    fn certain_collision_always_reacts() {
        let class = ReactionClass::bimolecular(A, B, vec![Pathway::new(1.0)]);
        let mut rng = SimRng::new(3);
        for _ in 0..100 {
            assert_eq!(class.test_collision(&mut rng), Some(0));
        }
    }

    #[test]
    fn zero_probability_never_reacts() {
        let class = ReactionClass::surface(A, SurfaceClassId(0), vec![Pathway::new(0.0)]);
        let mut rng = SimRng::new(3);
        assert!((0..100).all(|_| class.test_collision(&mut rng).is_none()));
    }

    #[test]
    fn pathway_frequencies_follow_rates() {
        let class = ReactionClass::unimolecular(A, vec![Pathway::new(1.0), Pathway::new(3.0)]);
        let mut rng = SimRng::new(17);
        let n = 20_000;
        let second = (0..n).filter(|_| class.pick_pathway(&mut rng) == 1).count();
        let frac = second as f64 / n as f64;
        assert!((frac - 0.75).abs() < 0.02, "fraction {frac}");
    }
}
