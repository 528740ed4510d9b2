//! Itinerary HGA Library
//!
//! Recommends eight-stop city itineraries (heavy meal, snack, attraction,
//! heavy meal, attraction, snack, heavy meal, souvenir) with a Hybrid Genetic
//! Algorithm refined by category-constrained 2-opt.
//!
//! # Features
//!
//! - Constrained random initialization from a CSV catalog
//! - Tournament selection, four-parent order crossover, swap mutation
//! - Distance and time budgets enforced through quadratic fitness penalties
//! - Routed distance/duration matrices with retry and great-circle fallback
//! - Parallel independent runs over several seeds
//!
//! # Example
//!
//! ```no_run
//! use itinerary_hga::catalog::load_catalog;
//! use itinerary_hga::costs::GreatCircleCosts;
//! use itinerary_hga::destination::Coord;
//! use itinerary_hga::heuristics::hga::{HgaConfig, HybridGeneticAlgorithm};
//!
//! let catalog = load_catalog("destinations.csv").unwrap();
//! let costs = GreatCircleCosts::new();
//! let config = HgaConfig::preset("fast").unwrap();
//!
//! let mut hga = HybridGeneticAlgorithm::new(config, &catalog, Coord::new(-7.2575, 112.7521), &costs);
//! let routes = hga.run(3).unwrap();
//!
//! println!("Best distance: {:.2} km", routes[0].total_distance_km());
//! ```

pub mod destination;
pub mod catalog;
pub mod geo;
pub mod penalty;
pub mod routing;
pub mod cache;
pub mod matrix;
pub mod costs;
pub mod itinerary;
pub mod heuristics;
pub mod summary;
pub mod error;

pub use destination::{Category, Coord, Destination};
pub use itinerary::Itinerary;
pub use heuristics::hga::{HgaConfig, HybridGeneticAlgorithm};
