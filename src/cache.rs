//! Persistent pairwise distance/duration cache.
//!
//! Keys are unordered coordinate pairs: both coordinates are rounded to six
//! decimals and sorted, so `(A, B)` and `(B, A)` map to the same entry. The
//! on-disk format is one JSON document holding a flat `matrix` object keyed
//! by `"lat,lon|lat,lon"` plus a `metadata` block.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::info;
use serde::{Deserialize, Serialize};

use crate::destination::Coord;
use crate::error::CacheError;

const MICRO_DEGREES: f64 = 1_000_000.0;

/// Canonical key for an unordered coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PairKey {
    /// (lat, lon) in micro-degrees, lower point first
    a: (i64, i64),
    b: (i64, i64),
}

fn quantize(c: Coord) -> (i64, i64) {
    (
        (c.lat * MICRO_DEGREES).round() as i64,
        (c.lon * MICRO_DEGREES).round() as i64,
    )
}

impl PairKey {
    pub fn new(from: Coord, to: Coord) -> Self {
        let p = quantize(from);
        let q = quantize(to);
        if p <= q {
            PairKey { a: p, b: q }
        } else {
            PairKey { a: q, b: p }
        }
    }

    /// Both ends round to the same point.
    pub fn is_degenerate(&self) -> bool {
        self.a == self.b
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6},{:.6}|{:.6},{:.6}",
            self.a.0 as f64 / MICRO_DEGREES,
            self.a.1 as f64 / MICRO_DEGREES,
            self.b.0 as f64 / MICRO_DEGREES,
            self.b.1 as f64 / MICRO_DEGREES
        )
    }
}

fn parse_coord(s: &str) -> Option<Coord> {
    let (lat, lon) = s.split_once(',')?;
    Some(Coord::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

impl FromStr for PairKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CacheError::InvalidKey(s.to_string());
        let (left, right) = s.split_once('|').ok_or_else(invalid)?;
        let from = parse_coord(left).ok_or_else(invalid)?;
        let to = parse_coord(right).ok_or_else(invalid)?;
        Ok(PairKey::new(from, to))
    }
}

impl TryFrom<String> for PairKey {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PairKey> for String {
    fn from(key: PairKey) -> Self {
        key.to_string()
    }
}

/// Where a cached value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostSource {
    /// Returned by the routing service.
    Routed,
    /// Derived from great-circle distance and an assumed speed.
    Estimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub distance_km: f64,
    pub duration_min: f64,
    pub source: CostSource,
}

impl CostEntry {
    pub fn routed(distance_km: f64, duration_min: f64) -> Self {
        CostEntry { distance_km, duration_min, source: CostSource::Routed }
    }

    pub fn estimated(distance_km: f64, duration_min: f64) -> Self {
        CostEntry { distance_km, duration_min, source: CostSource::Estimated }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheMetadata {
    pub total_destinations: usize,
    pub total_pairs: usize,
    pub routed_count: usize,
    pub estimated_count: usize,
    pub average_speed_kmh: f64,
    pub last_updated: Option<String>,
}

impl Default for CacheMetadata {
    fn default() -> Self {
        CacheMetadata {
            total_destinations: 0,
            total_pairs: 0,
            routed_count: 0,
            estimated_count: 0,
            average_speed_kmh: crate::geo::AVERAGE_SPEED_KMH,
            last_updated: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    matrix: HashMap<PairKey, CostEntry>,
    #[serde(default)]
    metadata: CacheMetadata,
}

/// Min/max/average summary of cached values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStatistics {
    pub total_pairs: usize,
    pub routed_pairs: usize,
    pub estimated_pairs: usize,
    pub min_distance_km: f64,
    pub max_distance_km: f64,
    pub avg_distance_km: f64,
    pub min_duration_min: f64,
    pub max_duration_min: f64,
    pub avg_duration_min: f64,
}

/// Keyed pair cache with optional backing file.
///
/// Reads take `&self` and are safe from many threads at once; writes need
/// `&mut self` and happen only while building a matrix.
#[derive(Debug, Default)]
pub struct PairCache {
    entries: HashMap<PairKey, CostEntry>,
    metadata: CacheMetadata,
    path: Option<PathBuf>,
}

impl PairCache {
    /// Empty in-memory cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache that saves to `path`.
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        PairCache {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Load the cache stored at `path`, or start empty if the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No cache at {}, starting empty", path.display());
            return Ok(Self::with_path(path));
        }
        let mut cache = Self::with_path(path);
        cache.load()?;
        Ok(cache)
    }

    /// Replace the in-memory contents with the backing file.
    pub fn load(&mut self) -> Result<(), CacheError> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let reader = BufReader::new(File::open(&path)?);
        let file: CacheFile = serde_json::from_reader(reader)?;
        self.entries = file.matrix;
        self.metadata = file.metadata;
        info!(
            "Loaded {} cached pairs from {} (routed: {}, estimated: {}, last updated: {})",
            self.entries.len(),
            path.display(),
            self.metadata.routed_count,
            self.metadata.estimated_count,
            self.metadata.last_updated.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    /// Write the cache to its backing file, refreshing the metadata block.
    ///
    /// Does nothing for an in-memory cache.
    pub fn save(&mut self) -> Result<(), CacheError> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        self.refresh_metadata();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = CacheFile {
            matrix: self.entries.clone(),
            metadata: self.metadata.clone(),
        };
        let tmp_path = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, &file)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &path)?;

        info!("Saved {} pairs to {}", self.entries.len(), path.display());
        Ok(())
    }

    fn refresh_metadata(&mut self) {
        let routed = self
            .entries
            .values()
            .filter(|e| e.source == CostSource::Routed)
            .count();
        self.metadata.total_pairs = self.entries.len();
        self.metadata.routed_count = routed;
        self.metadata.estimated_count = self.entries.len() - routed;
        self.metadata.last_updated = Some(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
    }

    pub fn get(&self, from: Coord, to: Coord) -> Option<&CostEntry> {
        self.entries.get(&PairKey::new(from, to))
    }

    pub fn get_key(&self, key: &PairKey) -> Option<&CostEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, from: Coord, to: Coord) -> bool {
        self.get(from, to).is_some()
    }

    /// Store an entry. A routed entry is never replaced by an estimated one;
    /// returns whether the value was stored.
    pub fn set(&mut self, from: Coord, to: Coord, entry: CostEntry) -> bool {
        let key = PairKey::new(from, to);
        if let Some(existing) = self.entries.get(&key) {
            if existing.source == CostSource::Routed && entry.source == CostSource::Estimated {
                return false;
            }
        }
        self.entries.insert(key, entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn metadata(&self) -> &CacheMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut CacheMetadata {
        &mut self.metadata
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.metadata = CacheMetadata::default();
    }

    pub fn statistics(&self) -> Option<CacheStatistics> {
        if self.entries.is_empty() {
            return None;
        }
        let n = self.entries.len() as f64;
        let distances = self.entries.values().map(|e| e.distance_km);
        let durations = self.entries.values().map(|e| e.duration_min);
        let routed = self
            .entries
            .values()
            .filter(|e| e.source == CostSource::Routed)
            .count();

        Some(CacheStatistics {
            total_pairs: self.entries.len(),
            routed_pairs: routed,
            estimated_pairs: self.entries.len() - routed,
            min_distance_km: distances.clone().fold(f64::INFINITY, f64::min),
            max_distance_km: distances.clone().fold(0.0, f64::max),
            avg_distance_km: distances.sum::<f64>() / n,
            min_duration_min: durations.clone().fold(f64::INFINITY, f64::min),
            max_duration_min: durations.clone().fold(0.0, f64::max),
            avg_duration_min: durations.sum::<f64>() / n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("itinerary-hga-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_key_is_symmetric() {
        let a = Coord::new(-7.2575, 112.7521);
        let b = Coord::new(-7.2891, 112.7342);
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        assert_eq!(PairKey::new(a, b).to_string(), "-7.289100,112.734200|-7.257500,112.752100");
    }

    #[test]
    fn test_key_round_trips_through_string() {
        let key = PairKey::new(Coord::new(-7.25, 112.75), Coord::new(-7.3, 112.7));
        let parsed: PairKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
        assert!("not a key".parse::<PairKey>().is_err());
    }

    #[test]
    fn test_get_set_symmetric() {
        let mut cache = PairCache::new();
        let a = Coord::new(-7.25, 112.75);
        let b = Coord::new(-7.30, 112.70);
        assert!(cache.get(a, b).is_none());

        cache.set(a, b, CostEntry::routed(4.2, 11.0));
        assert_eq!(cache.get(a, b), cache.get(b, a));
        assert_eq!(cache.get(b, a).map(|e| e.distance_km), Some(4.2));
    }

    #[test]
    fn test_routed_entry_never_downgraded() {
        let mut cache = PairCache::new();
        let a = Coord::new(-7.25, 112.75);
        let b = Coord::new(-7.30, 112.70);

        assert!(cache.set(a, b, CostEntry::routed(4.2, 11.0)));
        assert!(!cache.set(b, a, CostEntry::estimated(9.9, 20.0)));
        assert_eq!(cache.get(a, b).map(|e| e.source), Some(CostSource::Routed));

        // estimated may be upgraded
        let c = Coord::new(-7.31, 112.71);
        assert!(cache.set(a, c, CostEntry::estimated(5.0, 6.0)));
        assert!(cache.set(a, c, CostEntry::routed(4.0, 8.0)));
        assert_eq!(cache.get(c, a).map(|e| e.source), Some(CostSource::Routed));
    }

    #[test]
    fn test_save_and_reload() {
        let path = temp_path("reload");
        let _ = fs::remove_file(&path);

        let a = Coord::new(-7.25, 112.75);
        let b = Coord::new(-7.30, 112.70);
        let c = Coord::new(-7.28, 112.79);

        let mut cache = PairCache::open(&path).unwrap();
        assert!(cache.is_empty());
        cache.set(a, b, CostEntry::routed(4.2, 11.0));
        cache.set(a, c, CostEntry::estimated(6.5, 7.8));
        cache.save().unwrap();

        let reloaded = PairCache::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(b, a), Some(&CostEntry::routed(4.2, 11.0)));
        assert_eq!(reloaded.metadata().routed_count, 1);
        assert_eq!(reloaded.metadata().estimated_count, 1);
        assert!(reloaded.metadata().last_updated.is_some());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_statistics() {
        let mut cache = PairCache::new();
        assert!(cache.statistics().is_none());
        cache.set(Coord::new(0.0, 0.0), Coord::new(0.0, 0.1), CostEntry::routed(2.0, 4.0));
        cache.set(Coord::new(0.0, 0.0), Coord::new(0.0, 0.2), CostEntry::estimated(4.0, 8.0));
        let stats = cache.statistics().unwrap();
        assert_eq!(stats.total_pairs, 2);
        assert_eq!(stats.routed_pairs, 1);
        assert_eq!(stats.min_distance_km, 2.0);
        assert_eq!(stats.max_duration_min, 8.0);
        assert!((stats.avg_distance_km - 3.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_lookup_symmetric(
            lat1 in -80.0f64..80.0, lon1 in -179.0f64..179.0,
            lat2 in -80.0f64..80.0, lon2 in -179.0f64..179.0,
            km in 0.0f64..500.0,
        ) {
            let a = Coord::new(lat1, lon1);
            let b = Coord::new(lat2, lon2);
            let mut cache = PairCache::new();
            cache.set(a, b, CostEntry::routed(km, km));
            prop_assert_eq!(cache.get(a, b), cache.get(b, a));
            prop_assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        }
    }
}
