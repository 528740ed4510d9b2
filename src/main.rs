//! Itinerary HGA - Command Line Interface
//!
//! Recommends eight-stop food and sightseeing itineraries from a destination catalog.

use clap::{Parser, Subcommand, ValueEnum};
use itinerary_hga::cache::PairCache;
use itinerary_hga::catalog::{category_counts, load_catalog};
use itinerary_hga::costs::CachedTravelCosts;
use itinerary_hga::destination::{Category, Coord, Destination};
use itinerary_hga::geo::haversine_km;
use itinerary_hga::heuristics::hga::{run_independent, HgaConfig, HybridGeneticAlgorithm};
use itinerary_hga::matrix::{BuildMode, BuildSummary, MatrixBuilder};
use itinerary_hga::routing::{OsrmClient, RetryPolicy, RoutingConfig};
use itinerary_hga::summary::RouteSummary;
use itinerary_hga::Itinerary;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "itinerary-hga")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Hybrid Genetic Algorithm for eight-stop city itineraries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend itineraries from a starting point
    Solve {
        /// Destination catalog (CSV)
        #[arg(short, long)]
        catalog: PathBuf,

        /// Start latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Start longitude
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Parameter preset
        #[arg(short, long, value_enum, default_value = "balanced")]
        preset: Preset,

        /// JSON config file (overrides the preset)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Random seed (overrides preset/config)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of independent runs with consecutive seeds
        #[arg(short, long, default_value = "1")]
        restarts: usize,

        /// Number of itineraries to return
        #[arg(short, long, default_value = "3")]
        num_solutions: usize,

        /// Pre-built distance matrix
        #[arg(long, default_value = "data/distance_matrix.json")]
        distance_matrix: PathBuf,

        /// Pre-built travel time matrix
        #[arg(long, default_value = "data/travel_time_matrix.json")]
        duration_matrix: PathBuf,

        /// Query the routing service for pairs missing from the matrix
        #[arg(long)]
        live_routing: bool,

        #[command(flatten)]
        routing: RoutingArgs,

        /// Write the itineraries as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Build (or resume) the distance and travel time matrices
    BuildMatrix {
        /// Destination catalog (CSV)
        #[arg(short, long)]
        catalog: PathBuf,

        /// Which matrix to build
        #[arg(short, long, value_enum, default_value = "both")]
        target: MatrixTarget,

        #[arg(long, default_value = "data/distance_matrix.json")]
        distance_matrix: PathBuf,

        #[arg(long, default_value = "data/travel_time_matrix.json")]
        duration_matrix: PathBuf,

        /// Extra point (e.g. a usual start location) included in the matrix, as "lat,lon"
        #[arg(long, allow_hyphen_values = true)]
        include_point: Option<String>,

        /// Attempts per pair before giving up
        #[arg(long, default_value = "3")]
        retries: u32,

        /// Save after this many new pairs
        #[arg(long, default_value = "50")]
        save_every: usize,

        /// Estimate travel times from distance instead of routing
        #[arg(long)]
        estimate_durations: bool,

        #[command(flatten)]
        routing: RoutingArgs,
    },

    /// Analyze a catalog and the cached matrices
    Analyze {
        /// Destination catalog (CSV)
        #[arg(short, long)]
        catalog: PathBuf,

        #[arg(long, default_value = "data/distance_matrix.json")]
        distance_matrix: PathBuf,

        #[arg(long, default_value = "data/travel_time_matrix.json")]
        duration_matrix: PathBuf,
    },
}

#[derive(clap::Args, Clone, Debug)]
struct RoutingArgs {
    /// Routing service base URL
    #[arg(long, default_value = "http://router.project-osrm.org")]
    routing_url: String,

    /// Travel profile
    #[arg(long, value_enum, default_value = "driving")]
    profile: Profile,

    /// Request timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,
}

impl RoutingArgs {
    fn to_config(&self) -> RoutingConfig {
        RoutingConfig {
            base_url: self.routing_url.clone(),
            profile: match self.profile {
                Profile::Driving => itinerary_hga::routing::Profile::Driving,
                Profile::Bike => itinerary_hga::routing::Profile::Bike,
                Profile::Foot => itinerary_hga::routing::Profile::Foot,
            },
            timeout_secs: self.timeout,
        }
    }

    fn client(&self) -> OsrmClient {
        match OsrmClient::new(self.to_config()) {
            Ok(client) => client,
            Err(e) => {
                eprintln!("Error creating routing client: {}", e);
                std::process::exit(1);
            }
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Preset {
    /// 30 candidates, 50 generations
    Fast,
    /// 100 candidates, 200 generations
    Balanced,
    /// 200 candidates, 500 generations
    Quality,
    /// 150 candidates, 300 generations
    Production,
}

impl Preset {
    fn name(&self) -> &'static str {
        match self {
            Preset::Fast => "fast",
            Preset::Balanced => "balanced",
            Preset::Quality => "quality",
            Preset::Production => "production",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Profile {
    Driving,
    Bike,
    Foot,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum MatrixTarget {
    Distance,
    Duration,
    Both,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            catalog,
            lat,
            lon,
            preset,
            config,
            seed,
            restarts,
            num_solutions,
            distance_matrix,
            duration_matrix,
            live_routing,
            routing,
            output,
            verbose,
        } => {
            let hga_config = resolve_config(preset, config.as_deref(), seed);
            let costs = open_costs(&distance_matrix, &duration_matrix, live_routing.then_some(&routing));
            solve(
                &catalog,
                Coord::new(lat, lon),
                hga_config,
                &costs,
                restarts,
                num_solutions,
                output,
                verbose,
            );
        }

        Commands::BuildMatrix {
            catalog,
            target,
            distance_matrix,
            duration_matrix,
            include_point,
            retries,
            save_every,
            estimate_durations,
            routing,
        } => {
            let extra = include_point.map(|p| match parse_point(&p) {
                Some(point) => point,
                None => {
                    eprintln!("Invalid point '{}', expected \"lat,lon\"", p);
                    std::process::exit(1);
                }
            });
            build_matrices(
                &catalog,
                target,
                &distance_matrix,
                &duration_matrix,
                extra,
                retries,
                save_every,
                estimate_durations,
                &routing,
            );
        }

        Commands::Analyze {
            catalog,
            distance_matrix,
            duration_matrix,
        } => {
            analyze_catalog(&catalog, &distance_matrix, &duration_matrix);
        }
    }
}

fn parse_point(s: &str) -> Option<Coord> {
    let (lat, lon) = s.split_once(',')?;
    Some(Coord::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

fn load_or_exit(path: &Path) -> Vec<Destination> {
    println!("Loading catalog from {:?}...", path);
    match load_catalog(path) {
        Ok(destinations) => destinations,
        Err(e) => {
            eprintln!("Error loading catalog: {}", e);
            std::process::exit(1);
        }
    }
}

fn open_cache_or_exit(path: &Path) -> PairCache {
    match PairCache::open(path) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("Error loading matrix {:?}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn resolve_config(preset: Preset, config_path: Option<&Path>, seed: Option<u64>) -> HgaConfig {
    let mut config = match config_path {
        Some(path) => match HgaConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        },
        None => HgaConfig::preset(preset.name()).unwrap_or_default(),
    };
    if let Some(seed) = seed {
        config.seed = seed;
    }
    config
}

fn open_costs(distance_matrix: &Path, duration_matrix: &Path, routing: Option<&RoutingArgs>) -> CachedTravelCosts {
    let distances = open_cache_or_exit(distance_matrix);
    let durations = open_cache_or_exit(duration_matrix);
    let costs = CachedTravelCosts::new(distances, durations);
    match routing {
        Some(args) => costs
            .with_router(Box::new(args.client()))
            .with_policy(RetryPolicy::live()),
        None => costs,
    }
}

#[allow(clippy::too_many_arguments)]
fn solve(
    catalog_path: &Path,
    start: Coord,
    config: HgaConfig,
    costs: &CachedTravelCosts,
    restarts: usize,
    num_solutions: usize,
    output: Option<PathBuf>,
    verbose: bool,
) {
    let catalog = load_or_exit(catalog_path);
    println!("Loaded {} destinations", catalog.len());

    if verbose {
        println!("Config: {:?}", config);
        println!(
            "Distance matrix: {} pairs, travel time matrix: {} pairs",
            costs.distances().len(),
            costs.durations().len()
        );
    }

    println!("Running HGA from {} ({} run(s))...", start, restarts.max(1));
    let timer = Instant::now();

    let (routes, generations) = if restarts <= 1 {
        let seed = config.seed;
        let mut hga = HybridGeneticAlgorithm::new(config, &catalog, start, costs);
        let routes = match hga.run(num_solutions) {
            Ok(routes) => routes,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        };
        let generation_count = hga.evolution_statistics().generation_count;
        (routes, vec![(seed, generation_count)])
    } else {
        let seeds: Vec<u64> = (0..restarts as u64).map(|i| config.seed.wrapping_add(i)).collect();
        match run_independent(&config, &catalog, start, costs, &seeds, num_solutions) {
            Ok(runs) => {
                let generations = runs
                    .iter()
                    .map(|r| (r.seed, r.statistics.generation_count))
                    .collect();
                (merge_runs(runs.into_iter().flat_map(|r| r.solutions), num_solutions), generations)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    };
    let elapsed = timer.elapsed();

    print_results(&routes, &generations, elapsed);
    if costs.live_lookups() > 0 {
        println!("Live routing lookups: {}", costs.live_lookups());
    }

    if let Some(out_path) = output {
        let summaries = RouteSummary::ranked(&routes);
        let written = serde_json::to_string_pretty(&summaries)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(&out_path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => println!("\nItineraries saved to {:?}", out_path),
            Err(e) => eprintln!("Error writing {:?}: {}", out_path, e),
        }
    }
}

/// Fittest distinct itineraries across several runs.
fn merge_runs<'a>(solutions: impl Iterator<Item = Itinerary<'a>>, k: usize) -> Vec<Itinerary<'a>> {
    let mut all: Vec<Itinerary<'a>> = solutions.collect();
    all.sort_by_key(|s| std::cmp::Reverse(ordered_float::OrderedFloat(s.fitness())));
    let mut seen = std::collections::HashSet::new();
    all.into_iter()
        .filter(|s| seen.insert(s.gene_ids()))
        .take(k)
        .collect()
}

fn print_results(routes: &[Itinerary<'_>], generations: &[(u64, usize)], elapsed: Duration) {
    println!("\n========== Results ==========");
    for (seed, count) in generations {
        println!("Seed {}: {} generations", seed, count);
    }
    println!("Time: {:.4}s", elapsed.as_secs_f64());

    for (rank, route) in routes.iter().enumerate() {
        let report = route.constraint_report();
        println!("\n--- Itinerary #{} ---", rank + 1);
        println!(
            "Distance: {:.2} km{}",
            route.total_distance_km(),
            if report.distance_km.violated { "  (over budget)" } else { "" }
        );
        println!(
            "Travel time: {:.1} min{}",
            route.total_time_min(),
            if report.time_min.violated { "  (over budget)" } else { "" }
        );
        println!("Fitness: {:.6}  Penalty: {:.4}  Valid order: {}", route.fitness(), report.total_penalty, route.is_valid_order());
        println!("{:<4} {:<12} {:<40} {:>10} {:>11}", "#", "Category", "Name", "Lat", "Lon");
        for (i, stop) in route.genes().iter().enumerate() {
            println!(
                "{:<4} {:<12} {:<40} {:>10.5} {:>11.5}",
                i + 1,
                itinerary_hga::destination::CATEGORY_PATTERN[i].as_str(),
                truncate(&stop.name, 40),
                stop.location.lat,
                stop.location.lon
            );
        }
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width - 3).collect();
        out.push_str("...");
        out
    }
}

#[allow(clippy::too_many_arguments)]
fn build_matrices(
    catalog_path: &Path,
    target: MatrixTarget,
    distance_path: &Path,
    duration_path: &Path,
    extra: Option<Coord>,
    retries: u32,
    save_every: usize,
    estimate_durations: bool,
    routing: &RoutingArgs,
) {
    let catalog = load_or_exit(catalog_path);
    let mut coords: Vec<Coord> = catalog.iter().map(|d| d.location).collect();
    if let Some(point) = extra {
        coords.push(point);
    }
    println!("Building matrices for {} points...", coords.len());

    let client = routing.client();
    let policy = RetryPolicy::new(retries, RetryPolicy::batch().backoff);

    let mut distances = open_cache_or_exit(distance_path);
    if matches!(target, MatrixTarget::Distance | MatrixTarget::Both) {
        let builder = MatrixBuilder::new(&client, BuildMode::RoutedOnly)
            .with_policy(policy)
            .with_save_every(save_every);
        report_build("Distance matrix", distance_path, builder.build(&mut distances, &coords));
    }

    if matches!(target, MatrixTarget::Duration | MatrixTarget::Both) {
        let mut durations = open_cache_or_exit(duration_path);
        let builder = if estimate_durations {
            MatrixBuilder::estimate_only()
        } else {
            MatrixBuilder::new(&client, BuildMode::EstimateOnFailure).with_policy(policy)
        };
        let builder = builder
            .with_save_every(save_every)
            .with_distance_hint(&distances);
        report_build("Travel time matrix", duration_path, builder.build(&mut durations, &coords));
    }
}

fn report_build(label: &str, path: &Path, result: Result<BuildSummary, itinerary_hga::error::CacheError>) {
    match result {
        Ok(summary) => {
            println!("\n========== {} ==========", label);
            println!("Total pairs: {}", summary.total_pairs);
            println!("Already cached: {}", summary.already_cached);
            println!("Routed: {}", summary.routed);
            println!("Estimated: {}", summary.estimated);
            println!("Failed (left absent): {}", summary.failed);
            println!("Retry successes: {}", summary.retried_successes);
            println!("Saved to {:?}", path);
        }
        Err(e) => {
            eprintln!("Error building {}: {}", label, e);
            std::process::exit(1);
        }
    }
}

fn analyze_catalog(catalog_path: &Path, distance_path: &Path, duration_path: &Path) {
    let catalog = load_or_exit(catalog_path);

    println!("========== Catalog Analysis ==========\n");
    println!("Destinations: {}", catalog.len());

    println!("\nCategories:");
    let counts = category_counts(&catalog);
    for category in Category::ALL {
        let count = counts.get(&category).copied().unwrap_or(0);
        let required = category.minimum_required();
        println!(
            "  {:<12} {:>5}  (minimum {}){}",
            category.as_str(),
            count,
            required,
            if count < required { "  SHORT" } else { "" }
        );
    }
    let multi = catalog.iter().filter(|d| d.categories.len() > 1).count();
    println!("  Multi-category destinations: {}", multi);

    let mut distances = Vec::new();
    for i in 0..catalog.len() {
        for j in (i + 1)..catalog.len() {
            distances.push(haversine_km(catalog[i].location, catalog[j].location));
        }
    }
    if !distances.is_empty() {
        let avg = distances.iter().sum::<f64>() / distances.len() as f64;
        let min = distances.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = distances.iter().cloned().fold(0.0, f64::max);
        println!("\nGreat-circle distances ({} pairs):", distances.len());
        println!("  Average: {:.2} km", avg);
        println!("  Min: {:.2} km", min);
        println!("  Max: {:.2} km", max);
    }

    for (label, path) in [("Distance matrix", distance_path), ("Travel time matrix", duration_path)] {
        let cache = open_cache_or_exit(path);
        println!("\n{} ({:?}):", label, path);
        match cache.statistics() {
            Some(stats) => {
                println!("  Pairs: {} (routed {}, estimated {})", stats.total_pairs, stats.routed_pairs, stats.estimated_pairs);
                println!(
                    "  Distance km: min {:.2}, avg {:.2}, max {:.2}",
                    stats.min_distance_km, stats.avg_distance_km, stats.max_distance_km
                );
                println!(
                    "  Duration min: min {:.1}, avg {:.1}, max {:.1}",
                    stats.min_duration_min, stats.avg_duration_min, stats.max_duration_min
                );
                if let Some(updated) = &cache.metadata().last_updated {
                    println!("  Last updated: {}", updated);
                }
            }
            None => println!("  empty"),
        }
    }
}
