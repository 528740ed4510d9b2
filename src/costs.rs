//! Travel costs as seen by itinerary evaluation.
//!
//! Distance lookups always resolve: pre-built matrix, then a live routing
//! call (with retries), then great-circle distance. Duration lookups resolve
//! from the duration matrix or a live route already fetched for the pair, and
//! are otherwise absent; an absent duration contributes 0 minutes to an
//! itinerary's travel time.

use std::collections::HashMap;
use std::sync::RwLock;

use log::debug;

use crate::cache::{PairCache, PairKey};
use crate::destination::Coord;
use crate::geo::{estimate_minutes, haversine_km, AVERAGE_SPEED_KMH};
use crate::routing::{route_with_retry, RetryPolicy, RouteLeg, RoutingService};

/// Pairwise travel cost between two coordinates. Symmetric.
pub trait TravelCost: Send + Sync {
    fn distance_km(&self, from: Coord, to: Coord) -> f64;

    fn duration_min(&self, from: Coord, to: Coord) -> Option<f64>;
}

/// Great-circle costs with durations at a fixed speed. Needs no I/O.
#[derive(Debug, Clone, Copy)]
pub struct GreatCircleCosts {
    speed_kmh: Option<f64>,
}

impl GreatCircleCosts {
    pub const fn new() -> Self {
        GreatCircleCosts { speed_kmh: Some(AVERAGE_SPEED_KMH) }
    }

    pub const fn with_speed(speed_kmh: f64) -> Self {
        GreatCircleCosts { speed_kmh: Some(speed_kmh) }
    }

    /// Distances only; every duration lookup is absent.
    pub const fn distance_only() -> Self {
        GreatCircleCosts { speed_kmh: None }
    }
}

impl Default for GreatCircleCosts {
    fn default() -> Self {
        Self::new()
    }
}

impl TravelCost for GreatCircleCosts {
    fn distance_km(&self, from: Coord, to: Coord) -> f64 {
        haversine_km(from, to)
    }

    fn duration_min(&self, from: Coord, to: Coord) -> Option<f64> {
        self.speed_kmh
            .map(|speed| estimate_minutes(haversine_km(from, to), speed))
    }
}

/// Matrix-backed costs with optional live routing.
///
/// Live results are kept in memory for the lifetime of the value and never
/// written back to the matrices.
pub struct CachedTravelCosts {
    distances: PairCache,
    durations: PairCache,
    router: Option<Box<dyn RoutingService>>,
    policy: RetryPolicy,
    live: RwLock<HashMap<PairKey, Option<RouteLeg>>>,
}

impl CachedTravelCosts {
    pub fn new(distances: PairCache, durations: PairCache) -> Self {
        CachedTravelCosts {
            distances,
            durations,
            router: None,
            policy: RetryPolicy::live(),
            live: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_router(mut self, router: Box<dyn RoutingService>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn distances(&self) -> &PairCache {
        &self.distances
    }

    pub fn durations(&self) -> &PairCache {
        &self.durations
    }

    /// Number of pairs resolved (or given up on) through live routing.
    pub fn live_lookups(&self) -> usize {
        self.live.read().map(|memo| memo.len()).unwrap_or(0)
    }

    fn memoised(&self, key: &PairKey) -> Option<Option<RouteLeg>> {
        self.live.read().ok().and_then(|memo| memo.get(key).copied())
    }

    fn live_route(&self, key: PairKey, from: Coord, to: Coord) -> Option<RouteLeg> {
        if let Some(hit) = self.memoised(&key) {
            return hit;
        }
        let router = self.router.as_deref()?;
        let outcome = route_with_retry(router, from, to, &self.policy);
        if outcome.leg.is_none() {
            debug!("Live route {} -> {} unavailable, using great-circle", from, to);
        }
        if let Ok(mut memo) = self.live.write() {
            memo.insert(key, outcome.leg);
        }
        outcome.leg
    }
}

impl TravelCost for CachedTravelCosts {
    fn distance_km(&self, from: Coord, to: Coord) -> f64 {
        let key = PairKey::new(from, to);
        if key.is_degenerate() {
            return 0.0;
        }
        if let Some(entry) = self.distances.get_key(&key) {
            return entry.distance_km;
        }
        match self.live_route(key, from, to) {
            Some(leg) => leg.distance_km,
            None => haversine_km(from, to),
        }
    }

    fn duration_min(&self, from: Coord, to: Coord) -> Option<f64> {
        let key = PairKey::new(from, to);
        if key.is_degenerate() {
            return Some(0.0);
        }
        if let Some(entry) = self.durations.get_key(&key) {
            return Some(entry.duration_min);
        }
        self.memoised(&key).flatten().map(|leg| leg.duration_min)
    }
}
