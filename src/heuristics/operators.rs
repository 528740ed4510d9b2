//! Genetic operators: tournament selection, four-parent order crossover and
//! swap mutation.
//!
//! Crossover and mutation may place a destination in a slot of the wrong
//! category. The evolution loop always passes their output through the
//! category-constrained 2-opt refiner, which never breaks a valid order.

use std::collections::HashSet;

use ordered_float::OrderedFloat;
use rand::seq::index;
use rand::Rng;

use crate::destination::ITINERARY_LENGTH;
use crate::itinerary::Itinerary;

/// Best of `k` distinct candidates sampled uniformly without replacement.
///
/// `k` is capped at the pool size. Returns `None` for an empty pool.
pub fn tournament_select<'p, 'a, R: Rng + ?Sized>(
    pool: &'p [Itinerary<'a>],
    k: usize,
    rng: &mut R,
) -> Option<&'p Itinerary<'a>> {
    if pool.is_empty() {
        return None;
    }
    let size = k.clamp(1, pool.len());
    index::sample(rng, pool.len(), size)
        .into_iter()
        .map(|i| &pool[i])
        .max_by_key(|c| OrderedFloat(c.fitness()))
}

fn fill_child<'a>(
    base: &Itinerary<'a>,
    donors: [&Itinerary<'a>; 3],
    cut1: usize,
    cut2: usize,
) -> Itinerary<'a> {
    let base_genes = base.genes();
    let segment: HashSet<usize> = base_genes[cut1..cut2].iter().map(|d| d.id).collect();

    let genes = std::array::from_fn(|i| {
        if (cut1..cut2).contains(&i) {
            return base_genes[i];
        }
        donors
            .iter()
            .map(|donor| donor.genes()[i])
            .find(|d| !segment.contains(&d.id))
            .unwrap_or(base_genes[i])
    });
    base.with_genes(genes)
}

/// Four-parent order crossover with explicit cut points.
///
/// Child 1 keeps `p1[cut1..cut2]`; every other position takes the gene at the
/// same position in `p2`, `p3`, then `p4`, skipping destinations already in
/// the kept segment, and falls back to `p1`'s own gene. Child 2 is built the
/// same way from base `p2` with donors `p1`, `p3`, `p4`.
///
/// Cuts are clamped to `0..=8` and may be given in either order; an empty
/// segment is allowed.
pub fn order_crossover_with_cuts<'a>(
    p1: &Itinerary<'a>,
    p2: &Itinerary<'a>,
    p3: &Itinerary<'a>,
    p4: &Itinerary<'a>,
    cut1: usize,
    cut2: usize,
) -> (Itinerary<'a>, Itinerary<'a>) {
    let a = cut1.min(ITINERARY_LENGTH);
    let b = cut2.min(ITINERARY_LENGTH);
    let (cut1, cut2) = if a <= b { (a, b) } else { (b, a) };

    let child1 = fill_child(p1, [p2, p3, p4], cut1, cut2);
    let child2 = fill_child(p2, [p1, p3, p4], cut1, cut2);
    (child1, child2)
}

/// Four-parent order crossover with two random cut points.
pub fn order_crossover<'a, R: Rng + ?Sized>(
    parents: [&Itinerary<'a>; 4],
    rng: &mut R,
) -> (Itinerary<'a>, Itinerary<'a>) {
    let cut1 = rng.gen_range(0..ITINERARY_LENGTH);
    let cut2 = rng.gen_range(0..ITINERARY_LENGTH);
    let [p1, p2, p3, p4] = parents;
    order_crossover_with_cuts(p1, p2, p3, p4, cut1, cut2)
}

/// With probability `rate`, exchange two random positions (possibly the same
/// one). Always returns a new candidate; the input is never touched.
pub fn swap_mutation<'a, R: Rng + ?Sized>(candidate: &Itinerary<'a>, rate: f64, rng: &mut R) -> Itinerary<'a> {
    if rng.gen::<f64>() >= rate {
        return candidate.clone();
    }
    let i = rng.gen_range(0..ITINERARY_LENGTH);
    let j = rng.gen_range(0..ITINERARY_LENGTH);
    candidate.swapped(i, j)
}
