//! Hybrid Genetic Algorithm: genetic search refined by category-constrained 2-opt.
//!
//! ```text
//! Initializing --> Evolving --+--> Converged
//!                    ^   |    |
//!                    +---+    +--> BudgetExhausted
//! ```
//!
//! Each generation ranks the population, records best and average fitness,
//! checks convergence, then builds the next population. With the default
//! [`GenerationStrategy::SingleOffspring`] the next population is the elites,
//! one evolved offspring (four tournament parents, crossover, mutation, 2-opt)
//! and fresh random itineraries for the rest.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{debug, info};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::costs::TravelCost;
use crate::destination::{Coord, Destination, ITINERARY_LENGTH};
use crate::error::{ConfigError, OptimizerError};
use crate::heuristics::operators::{order_crossover, swap_mutation, tournament_select};
use crate::heuristics::population::{CategoryPools, Population};
use crate::heuristics::two_opt::{LocalSearch, TwoOptRefiner};
use crate::itinerary::Itinerary;

/// How the non-elite part of the next generation is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// One evolved offspring, the rest random itineraries.
    #[default]
    SingleOffspring,
    /// Offspring pairs until the population is full.
    FullOffspring,
}

/// HGA configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HgaConfig {
    /// Population size
    pub population_size: usize,
    /// Generation budget
    pub generations: usize,
    /// Crossover probability
    pub crossover_rate: f64,
    /// Mutation probability
    pub mutation_rate: f64,
    /// Elite count (best candidates carried over unchanged)
    pub elitism_count: usize,
    /// Tournament size for selection
    pub tournament_size: usize,
    /// Refine offspring with constrained 2-opt
    pub use_two_opt: bool,
    /// Maximum improving moves per 2-opt refinement
    pub two_opt_iterations: usize,
    /// Generations before convergence is checked, and the window size
    pub convergence_patience: usize,
    /// Relative best-fitness change below which the run has converged
    pub convergence_threshold: f64,
    /// Log progress every this many generations (0 disables)
    pub progress_interval: usize,
    /// Random seed
    pub seed: u64,
    pub strategy: GenerationStrategy,
}

impl Default for HgaConfig {
    fn default() -> Self {
        HgaConfig {
            population_size: 100,
            generations: 200,
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            elitism_count: 2,
            tournament_size: 5,
            use_two_opt: true,
            two_opt_iterations: 50,
            convergence_patience: 2500,
            convergence_threshold: 0.001,
            progress_interval: 20,
            seed: 42,
            strategy: GenerationStrategy::SingleOffspring,
        }
    }
}

impl HgaConfig {
    pub const PRESETS: [&'static str; 4] = ["fast", "balanced", "quality", "production"];

    fn sized(population_size: usize, generations: usize, two_opt_iterations: usize) -> Self {
        HgaConfig {
            population_size,
            generations,
            two_opt_iterations,
            ..Default::default()
        }
    }

    /// Named configuration, or `None` for an unknown name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "fast" => Some(Self::sized(30, 50, 20)),
            "balanced" => Some(Self::sized(100, 200, 50)),
            "quality" => Some(Self::sized(200, 500, 100)),
            "production" => Some(Self::sized(150, 300, 75)),
            _ => None,
        }
    }

    /// Read a JSON config; missing fields take their default values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: HgaConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.population_size == 0 {
            return invalid("population_size must be positive".to_string());
        }
        if self.elitism_count >= self.population_size {
            return invalid(format!(
                "elitism_count ({}) must be smaller than population_size ({})",
                self.elitism_count, self.population_size
            ));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return invalid(format!("crossover_rate {} outside [0, 1]", self.crossover_rate));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return invalid(format!("mutation_rate {} outside [0, 1]", self.mutation_rate));
        }
        if self.tournament_size == 0 {
            return invalid("tournament_size must be positive".to_string());
        }
        if self.convergence_patience == 0 {
            return invalid("convergence_patience must be positive".to_string());
        }
        if self.convergence_threshold < 0.0 {
            return invalid(format!("convergence_threshold {} is negative", self.convergence_threshold));
        }
        Ok(())
    }
}

/// Decides when the best-fitness history has stopped moving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceMonitor {
    pub patience: usize,
    pub threshold: f64,
}

impl ConvergenceMonitor {
    pub fn new(patience: usize, threshold: f64) -> Self {
        ConvergenceMonitor { patience, threshold }
    }

    /// Checked only from generation `patience` on, over the last `patience`
    /// best-fitness values: converged when they are all equal or when the
    /// relative change from the oldest to the newest is below the threshold.
    pub fn is_converged(&self, generation: usize, best_history: &[f64]) -> bool {
        if self.patience == 0 || generation < self.patience || best_history.len() < self.patience {
            return false;
        }
        let window = &best_history[best_history.len() - self.patience..];
        let oldest = window[0];
        let newest = window[window.len() - 1];

        if window.iter().all(|&v| v == oldest) {
            return true;
        }
        if oldest == 0.0 || !oldest.is_finite() {
            return false;
        }
        ((newest - oldest) / oldest).abs() < self.threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Initializing,
    Evolving,
    Converged,
    BudgetExhausted,
}

#[derive(Debug, Clone)]
pub struct EvolutionStatistics<'a> {
    pub generation_count: usize,
    pub best_fitness_history: Vec<f64>,
    pub average_fitness_history: Vec<f64>,
    pub best_distance: Option<f64>,
    pub best_candidate: Option<Itinerary<'a>>,
    pub converged_at: Option<usize>,
    pub state: RunState,
}

pub struct HybridGeneticAlgorithm<'a> {
    config: HgaConfig,
    catalog: &'a [Destination],
    start: Coord,
    costs: &'a dyn TravelCost,
    refiner: TwoOptRefiner,
    monitor: ConvergenceMonitor,
    rng: ChaCha8Rng,
    state: RunState,
    best: Option<Itinerary<'a>>,
    best_history: Vec<f64>,
    average_history: Vec<f64>,
    converged_at: Option<usize>,
    final_population: Population<'a>,
}

impl<'a> HybridGeneticAlgorithm<'a> {
    pub fn new(config: HgaConfig, catalog: &'a [Destination], start: Coord, costs: &'a dyn TravelCost) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let refiner = TwoOptRefiner::new(config.two_opt_iterations);
        let monitor = ConvergenceMonitor::new(config.convergence_patience, config.convergence_threshold);

        HybridGeneticAlgorithm {
            config,
            catalog,
            start,
            costs,
            refiner,
            monitor,
            rng,
            state: RunState::Initializing,
            best: None,
            best_history: Vec::new(),
            average_history: Vec::new(),
            converged_at: None,
            final_population: Population::default(),
        }
    }

    pub fn config(&self) -> &HgaConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Best candidate seen over the whole run.
    pub fn best(&self) -> Option<&Itinerary<'a>> {
        self.best.as_ref()
    }

    pub fn final_population(&self) -> &Population<'a> {
        &self.final_population
    }

    /// Evolve and return up to `num_solutions` distinct itineraries from the
    /// final population, fittest first. Fails before any work on a config
    /// that [`HgaConfig::validate`] rejects or a catalog short of a category.
    pub fn run(&mut self, num_solutions: usize) -> Result<Vec<Itinerary<'a>>, OptimizerError> {
        self.config.validate()?;
        self.state = RunState::Initializing;
        self.best = None;
        self.best_history.clear();
        self.average_history.clear();
        self.converged_at = None;

        info!(
            "[HGA] population {}, generations {}, crossover {}, mutation {}, elitism {}, 2-opt {}",
            self.config.population_size,
            self.config.generations,
            self.config.crossover_rate,
            self.config.mutation_rate,
            self.config.elitism_count,
            self.config.use_two_opt
        );

        let pools = CategoryPools::new(self.catalog)?;
        let mut population = Population::from_pools(
            &pools,
            self.start,
            self.costs,
            self.config.population_size,
            &mut self.rng,
        );
        population.evaluate_all();
        self.best = population.best().cloned();
        if let Some(best) = &self.best {
            info!("[HGA] initial best distance {:.2} km", best.total_distance_km());
        }

        self.state = RunState::Evolving;
        for generation in 0..self.config.generations {
            population.evaluate_all();
            population.rank();

            let Some(current_best) = population.best().cloned() else {
                break;
            };
            self.best_history.push(current_best.fitness());
            self.average_history.push(population.average_fitness());

            let improved = self
                .best
                .as_ref()
                .map_or(true, |best| current_best.fitness() > best.fitness());
            if improved {
                self.best = Some(current_best.clone());
            }

            if self.config.progress_interval > 0 && generation % self.config.progress_interval == 0 {
                info!(
                    "[HGA] Gen {:4}  Best {:.2} km  Avg fitness {:.6}",
                    generation,
                    current_best.total_distance_km(),
                    population.average_fitness()
                );
            }

            if self.monitor.is_converged(generation, &self.best_history) {
                info!("[HGA] converged at generation {}", generation);
                self.state = RunState::Converged;
                self.converged_at = Some(generation);
                break;
            }

            population = self.next_generation(&mut population, &pools);
        }

        if self.state == RunState::Evolving {
            self.state = RunState::BudgetExhausted;
        }

        population.evaluate_all();
        population.rank();
        let solutions = distinct_top(population.candidates(), num_solutions);
        self.final_population = population;

        if let Some(best) = &self.best {
            info!(
                "[HGA] done ({:?}) after {} generations, best {:.2} km",
                self.state,
                self.best_history.len(),
                best.total_distance_km()
            );
        }
        Ok(solutions)
    }

    /// Four tournament parents, crossover (or copies), mutation and 2-opt.
    fn breed(&mut self, pool: &[Itinerary<'a>], both: bool) -> Vec<Itinerary<'a>> {
        let mut parents = Vec::with_capacity(4);
        for _ in 0..4 {
            match tournament_select(pool, self.config.tournament_size, &mut self.rng) {
                Some(parent) => parents.push(parent),
                None => return Vec::new(),
            }
        }

        let (first, second) = if self.rng.gen::<f64>() < self.config.crossover_rate {
            order_crossover([parents[0], parents[1], parents[2], parents[3]], &mut self.rng)
        } else {
            (parents[0].clone(), parents[1].clone())
        };

        let children = if both { vec![first, second] } else { vec![first] };
        children
            .iter()
            .map(|child| {
                let mutated = swap_mutation(child, self.config.mutation_rate, &mut self.rng);
                if self.config.use_two_opt {
                    self.refiner.improve(&mutated)
                } else {
                    mutated
                }
            })
            .collect()
    }

    /// Elites, then offspring per the configured strategy, then random fill.
    pub(crate) fn next_generation(
        &mut self,
        population: &mut Population<'a>,
        pools: &CategoryPools<'a>,
    ) -> Population<'a> {
        let size = self.config.population_size;
        let mut next: Vec<Itinerary<'a>> = population.best_n(self.config.elitism_count).to_vec();

        match self.config.strategy {
            GenerationStrategy::SingleOffspring => {
                next.extend(self.breed(population.candidates(), false));
            }
            GenerationStrategy::FullOffspring => {
                while next.len() < size {
                    let children = self.breed(population.candidates(), true);
                    if children.is_empty() {
                        break;
                    }
                    next.extend(children);
                }
            }
        }

        while next.len() < size {
            next.push(pools.random_itinerary(self.start, self.costs, &mut self.rng));
        }
        next.truncate(size);
        debug!("[HGA] next generation of {}", next.len());

        let next = Population::new(next);
        next.evaluate_all();
        next
    }

    pub fn evolution_statistics(&self) -> EvolutionStatistics<'a> {
        EvolutionStatistics {
            generation_count: self.best_history.len(),
            best_fitness_history: self.best_history.clone(),
            average_fitness_history: self.average_history.clone(),
            best_distance: self.best.as_ref().map(|b| b.total_distance_km()),
            best_candidate: self.best.clone(),
            converged_at: self.converged_at,
            state: self.state,
        }
    }
}

/// Up to `k` candidates with distinct gene sequences, in input order.
fn distinct_top<'a>(ranked: &[Itinerary<'a>], k: usize) -> Vec<Itinerary<'a>> {
    let mut seen: HashSet<[usize; ITINERARY_LENGTH]> = HashSet::new();
    ranked
        .iter()
        .filter(|c| seen.insert(c.gene_ids()))
        .take(k)
        .cloned()
        .collect()
}

/// Result of one run in a multi-seed batch.
#[derive(Debug, Clone)]
pub struct IndependentRun<'a> {
    pub seed: u64,
    pub solutions: Vec<Itinerary<'a>>,
    pub statistics: EvolutionStatistics<'a>,
}

/// One HGA per seed, run in parallel. Runs share only the catalog and the
/// read-only travel costs. Results come back in seed order.
pub fn run_independent<'a>(
    config: &HgaConfig,
    catalog: &'a [Destination],
    start: Coord,
    costs: &'a dyn TravelCost,
    seeds: &[u64],
    num_solutions: usize,
) -> Result<Vec<IndependentRun<'a>>, OptimizerError> {
    seeds
        .par_iter()
        .map(|&seed| {
            let run_config = HgaConfig { seed, ..config.clone() };
            let mut hga = HybridGeneticAlgorithm::new(run_config, catalog, start, costs);
            let solutions = hga.run(num_solutions)?;
            Ok(IndependentRun {
                seed,
                solutions,
                statistics: hga.evolution_statistics(),
            })
        })
        .collect()
}
