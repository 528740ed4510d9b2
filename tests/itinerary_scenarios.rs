//! End-to-end itinerary scenarios
//!
//! Catalog loading, the HGA run loop and the cached cost path, without any
//! network access.

use itinerary_hga::cache::{CostEntry, PairCache};
use itinerary_hga::catalog::{check_minimums, from_reader};
use itinerary_hga::costs::{CachedTravelCosts, GreatCircleCosts, TravelCost};
use itinerary_hga::destination::{Category, Coord, Destination, CATEGORY_PATTERN};
use itinerary_hga::error::OptimizerError;
use itinerary_hga::geo::haversine_km;
use itinerary_hga::heuristics::hga::{HgaConfig, HybridGeneticAlgorithm, RunState};
use itinerary_hga::heuristics::population::Population;
use itinerary_hga::summary::RouteSummary;
use itinerary_hga::Itinerary;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ============================================================================
// Test Fixtures
// ============================================================================

const START: Coord = Coord { lat: -7.2575, lon: 112.7521 };

/// Catalog CSV with the exact minimum per category (3/2/2/1), within a few
/// km of `START`.
const MINIMUM_CSV: &str = "\
id,name,categories,latitude,longitude
1,Rawon Setan,makanan_berat,-7.2612,112.7389
2,Bebek Sinjay,heavy_meal,-7.2701,112.7482
3,Soto Ayam Lamongan,heavy_meal,-7.2480,112.7535
4,Lapis Surabaya,snack,-7.2655,112.7420
5,Rujak Cingur,makanan_ringan,-7.2550,112.7610
6,House of Sampoerna,attraction,-7.2308,112.7340
7,Tugu Pahlawan,non_kuliner,-7.2456,112.7378
8,Pasar Genteng,souvenir,-7.2589,112.7453
";

fn quick_config(seed: u64) -> HgaConfig {
    HgaConfig {
        population_size: 10,
        generations: 5,
        elitism_count: 2,
        tournament_size: 3,
        two_opt_iterations: 20,
        progress_interval: 0,
        seed,
        ..Default::default()
    }
}

/// `per_category` single-category destinations per category.
fn spread_catalog(per_category: usize) -> Vec<Destination> {
    let mut catalog = Vec::new();
    for category in Category::ALL {
        for k in 0..per_category {
            let id = catalog.len();
            let lat = START.lat + 0.005 * ((id * 3) % 7) as f64 - 0.015;
            let lon = START.lon + 0.004 * ((id * 5) % 9) as f64 - 0.016;
            catalog.push(Destination::new(id, &format!("{} {}", category, k), &[category], lat, lon));
        }
    }
    catalog
}

fn assert_follows_pattern(itinerary: &Itinerary<'_>) {
    for (slot, stop) in itinerary.genes().iter().enumerate() {
        assert!(
            stop.has_category(CATEGORY_PATTERN[slot]),
            "slot {} holds {} which is not {}",
            slot,
            stop.name,
            CATEGORY_PATTERN[slot]
        );
    }
    assert!(itinerary.is_valid_order());
}

// ============================================================================
// Catalog boundaries
// ============================================================================

#[test]
fn test_minimum_catalog_initializes() {
    let catalog = from_reader(MINIMUM_CSV.as_bytes()).unwrap();
    assert_eq!(catalog.len(), 8);
    assert!(check_minimums(&catalog).is_ok());

    let costs = GreatCircleCosts::new();

    // initialization only draws slot by slot, so every candidate is valid and
    // uses each of the eight destinations once
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let population = Population::initialize_random(&catalog, START, &costs, 20, &mut rng).unwrap();
    for candidate in population.candidates() {
        assert_follows_pattern(candidate);
        let mut ids = candidate.gene_ids().to_vec();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }

    // evolved offspring may break the pattern; the run reports them as they are
    let mut hga = HybridGeneticAlgorithm::new(quick_config(11), &catalog, START, &costs);
    let routes = hga.run(3).unwrap();
    assert!(!routes.is_empty() && routes.len() <= 3);
    for route in &routes {
        assert!(route.fitness() > 0.0);
        assert_eq!(RouteSummary::new(1, route).is_valid_order, route.is_valid_order());
    }
    assert!(hga.best().is_some());
}

#[test]
fn test_catalog_without_some_ids_initializes() {
    let csv = MINIMUM_CSV.replacen("\n2,", "\n,", 1).replacen("\n6,", "\n,", 1);
    let catalog = from_reader(csv.as_bytes()).unwrap();
    assert_eq!(catalog.len(), 8);

    let mut ids: Vec<usize> = catalog.iter().map(|d| d.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8);

    let costs = GreatCircleCosts::new();
    let mut hga = HybridGeneticAlgorithm::new(quick_config(5), &catalog, START, &costs);
    assert!(hga.run(1).is_ok());
}

#[test]
fn test_missing_heavy_meal_fails() {
    let csv: String = MINIMUM_CSV
        .lines()
        .filter(|line| !line.starts_with("3,"))
        .map(|line| format!("{}\n", line))
        .collect();
    let catalog = from_reader(csv.as_bytes()).unwrap();

    let costs = GreatCircleCosts::new();
    let mut hga = HybridGeneticAlgorithm::new(quick_config(11), &catalog, START, &costs);
    let err = hga.run(3).unwrap_err();

    assert_eq!(
        err,
        OptimizerError::InsufficientCatalog {
            category: Category::HeavyMeal,
            required: 3,
            available: 2,
        }
    );
    assert!(err.to_string().contains("heavy_meal"));
}

// ============================================================================
// Run loop
// ============================================================================

#[test]
fn test_best_fitness_never_regresses() {
    let catalog = spread_catalog(5);
    let costs = GreatCircleCosts::new();
    let mut hga = HybridGeneticAlgorithm::new(quick_config(4), &catalog, START, &costs);
    let routes = hga.run(2).unwrap();

    let stats = hga.evolution_statistics();
    assert_eq!(stats.generation_count, 5);
    assert_eq!(stats.best_fitness_history.len(), 5);
    for pair in stats.best_fitness_history.windows(2) {
        assert!(pair[1] >= pair[0], "best fitness dropped: {:?}", stats.best_fitness_history);
    }
    assert_eq!(stats.state, RunState::BudgetExhausted);
    assert_eq!(routes.len(), 2);
    assert!(routes[0].fitness() >= routes[1].fitness());
}

#[test]
fn test_convergence_on_flat_tail() {
    // all stops on the start point: every candidate scores the same
    let catalog: Vec<Destination> = CATEGORY_PATTERN
        .iter()
        .enumerate()
        .map(|(i, &category)| Destination::new(i, "plaza", &[category], START.lat, START.lon))
        .collect();
    let costs = CachedTravelCosts::new(PairCache::new(), PairCache::new());
    let config = HgaConfig {
        generations: 50,
        convergence_patience: 4,
        ..quick_config(9)
    };

    let mut hga = HybridGeneticAlgorithm::new(config, &catalog, START, &costs);
    hga.run(1).unwrap();

    let stats = hga.evolution_statistics();
    assert_eq!(stats.state, RunState::Converged);
    assert_eq!(stats.converged_at, Some(4));
    assert_eq!(stats.generation_count, 5);
    assert_eq!(costs.live_lookups(), 0);
}

#[test]
fn test_same_seed_same_itineraries() {
    let catalog = spread_catalog(4);
    let costs = GreatCircleCosts::new();

    let run = |seed| {
        let mut hga = HybridGeneticAlgorithm::new(quick_config(seed), &catalog, START, &costs);
        hga.run(3)
            .unwrap()
            .iter()
            .map(|route| route.gene_ids())
            .collect::<Vec<_>>()
    };

    assert_eq!(run(21), run(21));
}

#[test]
fn test_misordered_itinerary_is_reported_not_repaired() {
    let catalog = from_reader(MINIMUM_CSV.as_bytes()).unwrap();
    // snack first, heavy meal second
    let genes: [&Destination; 8] = [
        &catalog[3], &catalog[0], &catalog[5], &catalog[1],
        &catalog[6], &catalog[4], &catalog[2], &catalog[7],
    ];
    let costs = GreatCircleCosts::distance_only();
    let itinerary = Itinerary::new(genes, START, &costs);

    assert!(!itinerary.is_valid_order());
    let expected: f64 = haversine_km(START, genes[0].location)
        + genes
            .windows(2)
            .map(|pair| haversine_km(pair[0].location, pair[1].location))
            .sum::<f64>();
    assert!((itinerary.total_distance_km() - expected).abs() < 1e-9);
    assert!(itinerary.fitness() > 0.0 && itinerary.fitness().is_finite());
    assert_eq!(
        itinerary.gene_ids(),
        genes.map(|d| d.id),
        "genes are kept in the given order"
    );

    let summary = RouteSummary::new(1, &itinerary);
    assert!(!summary.is_valid_order);
    assert_eq!(summary.stops[0].name, "Lapis Surabaya");
}

// ============================================================================
// Cached costs
// ============================================================================

#[test]
fn test_unseen_pair_falls_back_to_great_circle() {
    let catalog = from_reader(MINIMUM_CSV.as_bytes()).unwrap();
    let genes: [&Destination; 8] = [
        &catalog[0], &catalog[3], &catalog[5], &catalog[1],
        &catalog[6], &catalog[4], &catalog[2], &catalog[7],
    ];

    let mut distances = PairCache::new();
    let routed_first_leg = CostEntry::routed(4.2, 11.0);
    distances.set(START, genes[0].location, routed_first_leg);
    let mut durations = PairCache::new();
    durations.set(START, genes[0].location, routed_first_leg);

    assert!(distances.get(genes[1].location, genes[2].location).is_none());

    let costs = CachedTravelCosts::new(distances, durations);
    let itinerary = Itinerary::new(genes, START, &costs);
    assert_follows_pattern(&itinerary);

    let expected: f64 = 4.2
        + genes
            .windows(2)
            .map(|pair| haversine_km(pair[0].location, pair[1].location))
            .sum::<f64>();
    assert!((itinerary.total_distance_km() - expected).abs() < 1e-9);

    // only the cached leg has a duration
    assert_eq!(itinerary.total_time_min(), 11.0);
    assert_eq!(costs.duration_min(genes[1].location, genes[2].location), None);
    assert_eq!(costs.live_lookups(), 0);
}
