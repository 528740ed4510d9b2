//! Population of candidate itineraries.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use rand::Rng;

use crate::catalog::group_by_category;
use crate::costs::TravelCost;
use crate::destination::{Category, Coord, Destination, CATEGORY_PATTERN};
use crate::error::OptimizerError;
use crate::itinerary::Itinerary;

/// Catalog split by category, checked against the per-category minimums.
#[derive(Debug, Clone)]
pub struct CategoryPools<'a> {
    pools: BTreeMap<Category, Vec<&'a Destination>>,
}

impl<'a> CategoryPools<'a> {
    /// Fails on the first category (in pattern order) with fewer distinct
    /// destinations than it has slots.
    pub fn new(catalog: &'a [Destination]) -> Result<Self, OptimizerError> {
        let mut pools = group_by_category(catalog);
        for (category, pool) in pools.iter_mut() {
            pool.sort_by_key(|d| d.id);
            pool.dedup_by_key(|d| d.id);
            let required = category.minimum_required();
            if pool.len() < required {
                return Err(OptimizerError::InsufficientCatalog {
                    category: *category,
                    required,
                    available: pool.len(),
                });
            }
        }
        Ok(CategoryPools { pools })
    }

    pub fn pool(&self, category: Category) -> &[&'a Destination] {
        self.pools.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Uniform draw from `category`, avoiding the ids in `taken`.
    fn draw<R: Rng + ?Sized>(&self, category: Category, taken: &[usize], rng: &mut R) -> &'a Destination {
        let pool = self.pool(category);
        let open: Vec<&'a Destination> = pool
            .iter()
            .copied()
            .filter(|d| !taken.contains(&d.id))
            .collect();
        if open.is_empty() {
            pool[rng.gen_range(0..pool.len())]
        } else {
            open[rng.gen_range(0..open.len())]
        }
    }

    /// A structurally valid itinerary: every slot holds its category and no
    /// destination repeats within a category.
    pub fn random_itinerary<R: Rng + ?Sized>(
        &self,
        start: Coord,
        costs: &'a dyn TravelCost,
        rng: &mut R,
    ) -> Itinerary<'a> {
        let mut taken: Vec<(Category, usize)> = Vec::with_capacity(CATEGORY_PATTERN.len());
        let genes = std::array::from_fn(|slot| {
            let category = CATEGORY_PATTERN[slot];
            let same_category: Vec<usize> = taken
                .iter()
                .filter(|(c, _)| *c == category)
                .map(|&(_, id)| id)
                .collect();
            let destination = self.draw(category, &same_category, rng);
            taken.push((category, destination.id));
            destination
        });
        Itinerary::new(genes, start, costs)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Population<'a> {
    candidates: Vec<Itinerary<'a>>,
}

impl<'a> Population<'a> {
    pub fn new(candidates: Vec<Itinerary<'a>>) -> Self {
        Population { candidates }
    }

    /// `size` random valid itineraries drawn from `catalog`.
    pub fn initialize_random<R: Rng + ?Sized>(
        catalog: &'a [Destination],
        start: Coord,
        costs: &'a dyn TravelCost,
        size: usize,
        rng: &mut R,
    ) -> Result<Self, OptimizerError> {
        let pools = CategoryPools::new(catalog)?;
        Ok(Self::from_pools(&pools, start, costs, size, rng))
    }

    pub fn from_pools<R: Rng + ?Sized>(
        pools: &CategoryPools<'a>,
        start: Coord,
        costs: &'a dyn TravelCost,
        size: usize,
        rng: &mut R,
    ) -> Self {
        let candidates = (0..size)
            .map(|_| pools.random_itinerary(start, costs, rng))
            .collect();
        Population { candidates }
    }

    pub fn evaluate_all(&self) {
        for candidate in &self.candidates {
            candidate.evaluate();
        }
    }

    /// Sort by descending fitness. Stable, so equal-fitness candidates keep
    /// their relative order.
    pub fn rank(&mut self) {
        self.candidates
            .sort_by_key(|c| Reverse(OrderedFloat(c.fitness())));
    }

    pub fn best(&self) -> Option<&Itinerary<'a>> {
        // first maximum wins on ties
        self.candidates.iter().fold(None, |best, c| match best {
            Some(b) if OrderedFloat(b.fitness()) >= OrderedFloat(c.fitness()) => Some(b),
            _ => Some(c),
        })
    }

    /// The `k` fittest candidates, ranking the population first.
    pub fn best_n(&mut self, k: usize) -> &[Itinerary<'a>] {
        self.rank();
        &self.candidates[..k.min(self.candidates.len())]
    }

    pub fn average_fitness(&self) -> f64 {
        if self.candidates.is_empty() {
            return 0.0;
        }
        self.candidates.iter().map(|c| c.fitness()).sum::<f64>() / self.candidates.len() as f64
    }

    pub fn candidates(&self) -> &[Itinerary<'a>] {
        &self.candidates
    }

    pub fn push(&mut self, candidate: Itinerary<'a>) {
        self.candidates.push(candidate);
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
