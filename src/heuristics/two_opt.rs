//! 2-opt local search on a single itinerary.
//!
//! The constrained variant only exchanges destinations between positions of
//! the same category slot (heavy meal 0/3/6, snack 1/5, attraction 2/4), so a
//! valid order stays valid. The unconstrained variant reverses arbitrary
//! segments and is not used by the evolution loop.
//!
//! Both use first improvement: the first move that strictly shortens the route
//! is applied and the scan restarts, until a full scan finds nothing or the
//! iteration budget runs out.

use crate::destination::{Category, Destination, ITINERARY_LENGTH};
use crate::itinerary::Itinerary;

type Genes<'a> = [&'a Destination; ITINERARY_LENGTH];

/// Trait for single-candidate improvement methods
pub trait LocalSearch {
    fn improve<'a>(&self, candidate: &Itinerary<'a>) -> Itinerary<'a>;
    fn name(&self) -> &str;
}

/// 2-Opt local search
pub struct TwoOptRefiner {
    /// Maximum number of improving moves applied
    pub max_iterations: usize,
    /// Restrict moves to same-category positions
    pub constrained: bool,
}

impl TwoOptRefiner {
    pub fn new(max_iterations: usize) -> Self {
        TwoOptRefiner {
            max_iterations,
            constrained: true,
        }
    }

    pub fn unconstrained(max_iterations: usize) -> Self {
        TwoOptRefiner {
            max_iterations,
            constrained: false,
        }
    }

    /// Pairs of positions that share a category slot, in scan order.
    fn same_category_pairs() -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for category in Category::ALL {
            let slots = category.slots();
            for i in 0..slots.len() {
                for j in (i + 1)..slots.len() {
                    pairs.push((slots[i], slots[j]));
                }
            }
        }
        pairs
    }

    /// Repeated first-improvement search over the moves produced by `moves`.
    fn descend<'a, F>(&self, candidate: &Itinerary<'a>, moves: F) -> Itinerary<'a>
    where
        F: Fn(&Genes<'a>) -> Vec<Genes<'a>>,
    {
        let mut current = candidate.clone();
        let mut current_distance = current.route_distance_km();
        let mut iteration = 0;

        while iteration < self.max_iterations {
            iteration += 1;
            let improvement = moves(current.genes())
                .into_iter()
                .map(|genes| current.with_genes(genes))
                .map(|next| {
                    let distance = next.route_distance_km();
                    (next, distance)
                })
                .find(|(_, distance)| *distance < current_distance);

            match improvement {
                Some((next, distance)) => {
                    current = next;
                    current_distance = distance;
                }
                None => break,
            }
        }
        current
    }

    /// Swap destinations between same-category positions only.
    pub fn optimize_with_constraints<'a>(&self, candidate: &Itinerary<'a>) -> Itinerary<'a> {
        let pairs = Self::same_category_pairs();
        self.descend(candidate, |genes| {
            pairs
                .iter()
                .map(|&(i, j)| {
                    let mut next = *genes;
                    next.swap(i, j);
                    next
                })
                .collect()
        })
    }

    /// Reverse segments `[i..=j]` with `j >= i + 2`.
    pub fn optimize<'a>(&self, candidate: &Itinerary<'a>) -> Itinerary<'a> {
        self.descend(candidate, |genes| {
            let mut moves = Vec::new();
            for i in 0..ITINERARY_LENGTH - 1 {
                for j in (i + 2)..ITINERARY_LENGTH {
                    let mut next = *genes;
                    next[i..=j].reverse();
                    moves.push(next);
                }
            }
            moves
        })
    }
}

impl Default for TwoOptRefiner {
    fn default() -> Self {
        Self::new(50)
    }
}

impl LocalSearch for TwoOptRefiner {
    fn improve<'a>(&self, candidate: &Itinerary<'a>) -> Itinerary<'a> {
        if self.constrained {
            self.optimize_with_constraints(candidate)
        } else {
            self.optimize(candidate)
        }
    }

    fn name(&self) -> &str {
        if self.constrained {
            "2-Opt-Constrained"
        } else {
            "2-Opt"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::fixtures::{catalog_with_counts, COSTS, START};
    use crate::heuristics::population::Population;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_same_category_pairs() {
        assert_eq!(
            TwoOptRefiner::same_category_pairs(),
            vec![(0, 3), (0, 6), (3, 6), (1, 5), (2, 4)]
        );
    }

    #[test]
    fn test_constrained_preserves_validity_and_never_worsens() {
        let catalog = catalog_with_counts(6, 4, 4, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let population = Population::initialize_random(&catalog, START, &COSTS, 30, &mut rng).unwrap();
        let refiner = TwoOptRefiner::new(500);

        for candidate in population.candidates() {
            let refined = refiner.optimize_with_constraints(candidate);
            assert!(refined.is_valid_order());
            assert!(refined.total_distance_km() <= candidate.total_distance_km());
        }
    }

    #[test]
    fn test_constrained_is_idempotent() {
        let catalog = catalog_with_counts(6, 4, 4, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let population = Population::initialize_random(&catalog, START, &COSTS, 30, &mut rng).unwrap();
        let refiner = TwoOptRefiner::new(500);

        for candidate in population.candidates() {
            let once = refiner.optimize_with_constraints(candidate);
            let twice = refiner.optimize_with_constraints(&once);
            assert_eq!(once.gene_ids(), twice.gene_ids());
        }
    }

    #[test]
    fn test_zero_budget_returns_input() {
        let catalog = catalog_with_counts(6, 4, 4, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let population = Population::initialize_random(&catalog, START, &COSTS, 5, &mut rng).unwrap();
        let refiner = TwoOptRefiner::new(0);
        for candidate in population.candidates() {
            assert_eq!(refiner.improve(candidate).gene_ids(), candidate.gene_ids());
        }
    }

    #[test]
    fn test_unconstrained_shortens_route() {
        let catalog = catalog_with_counts(6, 4, 4, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let population = Population::initialize_random(&catalog, START, &COSTS, 10, &mut rng).unwrap();
        let refiner = TwoOptRefiner::unconstrained(500);
        assert_eq!(refiner.name(), "2-Opt");

        for candidate in population.candidates() {
            let refined = refiner.improve(candidate);
            assert!(refined.total_distance_km() <= candidate.total_distance_km());
            let once = refined.gene_ids();
            assert_eq!(refiner.improve(&refined).gene_ids(), once);
        }
    }
}
