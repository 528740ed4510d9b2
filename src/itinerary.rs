//! Candidate itinerary (chromosome).
//!
//! An itinerary is an ordered list of eight destinations visited from a fixed
//! start point. The route is open: it ends at the last stop and does not return
//! to the start.
//!
//! Derived values (distance, time, penalty, fitness) are computed on the first
//! call to [`Itinerary::evaluate`] and cached. Genes are never modified in
//! place; every operator builds a new `Itinerary`, so the cache can never go
//! stale and parents stay intact while their offspring are evaluated.

use std::cell::OnceCell;
use std::fmt;

use serde::Serialize;

use crate::costs::TravelCost;
use crate::destination::{Coord, Destination, CATEGORY_PATTERN, ITINERARY_LENGTH};
use crate::penalty::{apply_penalty, total_penalty, ConstraintReport};

/// Evaluation result cached on an itinerary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub total_distance_km: f64,
    pub total_time_min: f64,
    pub penalty: f64,
    /// `1 / total_distance_km`, infinite for a zero-length route
    pub base_fitness: f64,
    pub fitness: f64,
    pub feasible: bool,
}

impl Evaluation {
    pub fn new(total_distance_km: f64, total_time_min: f64) -> Self {
        let base_fitness = if total_distance_km <= 0.0 {
            f64::INFINITY
        } else {
            1.0 / total_distance_km
        };
        let penalty = total_penalty(total_distance_km, total_time_min);
        Evaluation {
            total_distance_km,
            total_time_min,
            penalty,
            base_fitness,
            fitness: apply_penalty(base_fitness, penalty),
            feasible: penalty == 0.0,
        }
    }
}

/// True when every position holds a destination tagged with that slot's category.
pub fn is_valid_order(genes: &[&Destination]) -> bool {
    genes.len() == ITINERARY_LENGTH
        && genes
            .iter()
            .zip(CATEGORY_PATTERN.iter())
            .all(|(d, &category)| d.has_category(category))
}

#[derive(Clone)]
pub struct Itinerary<'a> {
    genes: [&'a Destination; ITINERARY_LENGTH],
    start: Coord,
    costs: &'a dyn TravelCost,
    evaluation: OnceCell<Evaluation>,
}

impl<'a> Itinerary<'a> {
    pub fn new(genes: [&'a Destination; ITINERARY_LENGTH], start: Coord, costs: &'a dyn TravelCost) -> Self {
        Itinerary {
            genes,
            start,
            costs,
            evaluation: OnceCell::new(),
        }
    }

    /// New unevaluated itinerary sharing this one's start point and costs.
    pub fn with_genes(&self, genes: [&'a Destination; ITINERARY_LENGTH]) -> Self {
        Itinerary::new(genes, self.start, self.costs)
    }

    /// Copy with positions `i` and `j` exchanged.
    pub fn swapped(&self, i: usize, j: usize) -> Self {
        let mut genes = self.genes;
        genes.swap(i, j);
        self.with_genes(genes)
    }

    pub fn genes(&self) -> &[&'a Destination; ITINERARY_LENGTH] {
        &self.genes
    }

    pub fn gene_ids(&self) -> [usize; ITINERARY_LENGTH] {
        self.genes.map(|d| d.id)
    }

    pub fn start(&self) -> Coord {
        self.start
    }

    pub fn costs(&self) -> &'a dyn TravelCost {
        self.costs
    }

    /// Start point followed by every stop.
    fn points(&self) -> impl Iterator<Item = Coord> + '_ {
        std::iter::once(self.start).chain(self.genes.iter().map(|d| d.location))
    }

    fn legs(&self) -> impl Iterator<Item = (Coord, Coord)> + '_ {
        self.points().zip(self.points().skip(1))
    }

    /// Total route distance in km. Recomputed on every call.
    pub fn route_distance_km(&self) -> f64 {
        self.legs()
            .map(|(from, to)| self.costs.distance_km(from, to))
            .sum()
    }

    /// Total travel time in minutes; legs without a known duration add nothing.
    pub fn route_time_min(&self) -> f64 {
        self.legs()
            .filter_map(|(from, to)| self.costs.duration_min(from, to))
            .sum()
    }

    pub fn evaluate(&self) -> &Evaluation {
        self.evaluation
            .get_or_init(|| Evaluation::new(self.route_distance_km(), self.route_time_min()))
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluation.get().is_some()
    }

    pub fn fitness(&self) -> f64 {
        self.evaluate().fitness
    }

    pub fn total_distance_km(&self) -> f64 {
        self.evaluate().total_distance_km
    }

    pub fn total_time_min(&self) -> f64 {
        self.evaluate().total_time_min
    }

    pub fn penalty(&self) -> f64 {
        self.evaluate().penalty
    }

    pub fn is_feasible(&self) -> bool {
        self.evaluate().feasible
    }

    pub fn is_valid_order(&self) -> bool {
        is_valid_order(&self.genes)
    }

    pub fn constraint_report(&self) -> ConstraintReport {
        let evaluation = self.evaluate();
        ConstraintReport::new(evaluation.total_distance_km, evaluation.total_time_min)
    }
}

impl fmt::Debug for Itinerary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Itinerary")
            .field("genes", &self.gene_ids())
            .field("start", &self.start)
            .field("evaluation", &self.evaluation.get())
            .finish()
    }
}

impl fmt::Display for Itinerary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Itinerary(genes={:?}, fitness={:.6}, distance={:.2}km)",
            self.gene_ids(),
            self.fitness(),
            self.total_distance_km()
        )
    }
}
