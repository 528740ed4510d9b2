//! Search heuristics for itinerary recommendation.
//!
//! This module exports the population, the genetic operators, the 2-opt
//! refiner and the hybrid genetic algorithm that drives them.

pub mod population;
pub mod operators;
pub mod two_opt;
pub mod hga;

pub use population::*;
pub use operators::*;
pub use two_opt::*;
pub use hga::*;
