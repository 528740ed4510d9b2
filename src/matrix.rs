//! Offline construction of the pairwise distance and duration matrices.
//!
//! A build enumerates every unordered pair of the given coordinates, skips the
//! pairs already present in the target cache, and resolves the rest through
//! the routing service with retries. Progress is saved every `save_every`
//! stored entries so an interrupted build resumes where it stopped.

use std::collections::HashSet;

use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde::Serialize;

use crate::cache::{CostEntry, PairCache, PairKey};
use crate::destination::Coord;
use crate::error::CacheError;
use crate::geo::{estimate_minutes, haversine_km, AVERAGE_SPEED_KMH, ROAD_FACTOR};
use crate::routing::{route_with_retry, RetryPolicy, RoutingService};

/// What to do with a pair the routing service cannot resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Leave the pair absent; lookups fall back to great-circle at run time.
    RoutedOnly,
    /// Store an estimate derived from distance and average speed.
    EstimateOnFailure,
    /// Never call the routing service, estimate every pair.
    EstimateOnly,
}

/// Counters reported at the end of a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub total_pairs: usize,
    pub already_cached: usize,
    pub routed: usize,
    pub estimated: usize,
    pub failed: usize,
    /// Pairs routed successfully after at least one failed attempt.
    pub retried_successes: usize,
}

impl BuildSummary {
    pub fn computed(&self) -> usize {
        self.routed + self.estimated
    }
}

pub struct MatrixBuilder<'a> {
    router: Option<&'a dyn RoutingService>,
    mode: BuildMode,
    policy: RetryPolicy,
    save_every: usize,
    speed_kmh: f64,
    /// Distances to reuse when estimating durations.
    distance_hint: Option<&'a PairCache>,
    show_progress: bool,
}

impl<'a> MatrixBuilder<'a> {
    pub fn new(router: &'a dyn RoutingService, mode: BuildMode) -> Self {
        MatrixBuilder {
            router: Some(router),
            mode,
            policy: RetryPolicy::batch(),
            save_every: 50,
            speed_kmh: AVERAGE_SPEED_KMH,
            distance_hint: None,
            show_progress: true,
        }
    }

    /// Builder that estimates every pair without any network access.
    pub fn estimate_only() -> Self {
        MatrixBuilder {
            router: None,
            mode: BuildMode::EstimateOnly,
            policy: RetryPolicy::batch(),
            save_every: 100,
            speed_kmh: AVERAGE_SPEED_KMH,
            distance_hint: None,
            show_progress: true,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_save_every(mut self, save_every: usize) -> Self {
        self.save_every = save_every.max(1);
        self
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = speed_kmh;
        self
    }

    pub fn with_distance_hint(mut self, distances: &'a PairCache) -> Self {
        self.distance_hint = Some(distances);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Distinct unordered pairs of `coords`, in enumeration order.
    fn pairs(coords: &[Coord]) -> Vec<(Coord, Coord)> {
        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for i in 0..coords.len() {
            for j in (i + 1)..coords.len() {
                let key = PairKey::new(coords[i], coords[j]);
                if key.is_degenerate() || !seen.insert(key) {
                    continue;
                }
                pairs.push((coords[i], coords[j]));
            }
        }
        pairs
    }

    fn estimate(&self, from: Coord, to: Coord) -> CostEntry {
        let distance = self
            .distance_hint
            .and_then(|hint| hint.get(from, to))
            .map(|e| e.distance_km)
            .unwrap_or_else(|| haversine_km(from, to) * ROAD_FACTOR);
        CostEntry::estimated(distance, estimate_minutes(distance, self.speed_kmh))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        let style = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} pairs ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    }

    /// Fill `cache` with every missing pair of `coords`, saving periodically.
    pub fn build(&self, cache: &mut PairCache, coords: &[Coord]) -> Result<BuildSummary, CacheError> {
        let pairs = Self::pairs(coords);
        let mut summary = BuildSummary {
            total_pairs: pairs.len(),
            ..Default::default()
        };

        let todo: Vec<(Coord, Coord)> = pairs
            .into_iter()
            .filter(|&(a, b)| !cache.contains(a, b))
            .collect();
        summary.already_cached = summary.total_pairs - todo.len();

        info!(
            "Matrix build: {} pairs, {} cached, {} to compute ({:?})",
            summary.total_pairs,
            summary.already_cached,
            todo.len(),
            self.mode
        );

        cache.metadata_mut().total_destinations = coords.len();
        cache.metadata_mut().average_speed_kmh = self.speed_kmh;

        if todo.is_empty() {
            info!("All pairs already cached");
            return Ok(summary);
        }

        let bar = self.progress_bar(todo.len());
        let mut unsaved = 0;

        for (from, to) in todo {
            let routed = match (self.mode, self.router) {
                (BuildMode::EstimateOnly, _) | (_, None) => None,
                (_, Some(router)) => {
                    let outcome = route_with_retry(router, from, to, &self.policy);
                    if outcome.retried() {
                        summary.retried_successes += 1;
                    }
                    if outcome.leg.is_none() {
                        warn!(
                            "No route {} -> {} after {} attempts",
                            from, to, outcome.attempts
                        );
                    }
                    outcome.leg
                }
            };

            let entry = match routed {
                Some(leg) => {
                    summary.routed += 1;
                    Some(CostEntry::routed(leg.distance_km, leg.duration_min))
                }
                None if self.mode == BuildMode::RoutedOnly => {
                    summary.failed += 1;
                    None
                }
                None => {
                    summary.estimated += 1;
                    Some(self.estimate(from, to))
                }
            };

            if let Some(entry) = entry {
                cache.set(from, to, entry);
                unsaved += 1;
                if unsaved >= self.save_every {
                    cache.save()?;
                    unsaved = 0;
                }
            }
            bar.inc(1);
        }

        bar.finish_and_clear();
        cache.save()?;

        info!(
            "Matrix build done: routed {}, estimated {}, failed {}, retry successes {}, {} pairs cached",
            summary.routed,
            summary.estimated,
            summary.failed,
            summary.retried_successes,
            cache.len()
        );
        Ok(summary)
    }
}
