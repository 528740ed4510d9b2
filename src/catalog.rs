//! Destination catalog loading and per-category bookkeeping.
//!
//! CSV columns: `id,name,categories,latitude,longitude,address,image_url,description`.
//! `categories` may hold several tags separated by `;` or `,`. Coordinates
//! written with a decimal comma (`-7,2575`) are accepted.
//!
//! Ids must be unique. Rows without an id are numbered after the largest
//! explicit id in the file.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::destination::{Category, Destination};
use crate::error::{CatalogError, OptimizerError};

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(default)]
    id: Option<usize>,
    name: String,
    categories: String,
    latitude: String,
    longitude: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

fn parse_degrees(raw: &str, field: &str, line: usize) -> Result<f64, CatalogError> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| CatalogError::InvalidRow {
            line,
            reason: format!("{} '{}' is not a number", field, raw),
        })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CatalogRow {
    fn into_destination(self, id: usize, line: usize) -> Result<Destination, CatalogError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::InvalidRow { line, reason: "empty name".to_string() });
        }

        let mut categories = Vec::new();
        for tag in self.categories.split([';', ',']).map(str::trim).filter(|t| !t.is_empty()) {
            match tag.parse::<Category>() {
                Ok(c) if !categories.contains(&c) => categories.push(c),
                Ok(_) => {}
                Err(e) => debug!("line {}: ignoring {}", line, e),
            }
        }
        if categories.is_empty() {
            return Err(CatalogError::InvalidRow {
                line,
                reason: format!("no known category in '{}'", self.categories),
            });
        }

        let lat = parse_degrees(&self.latitude, "latitude", line)?;
        let lon = parse_degrees(&self.longitude, "longitude", line)?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(CatalogError::InvalidRow {
                line,
                reason: format!("coordinate ({}, {}) out of range", lat, lon),
            });
        }

        let mut destination = Destination::new(id, &name, &categories, lat, lon);
        destination.address = non_empty(self.address);
        destination.image_url = non_empty(self.image_url);
        destination.description = non_empty(self.description);
        Ok(destination)
    }
}

/// Read destinations from CSV. Malformed rows and rows repeating an id are
/// skipped with a warning.
pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Destination>, CatalogError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    // header is line 1
    let rows: Vec<(usize, Result<CatalogRow, csv::Error>)> = csv_reader
        .deserialize::<CatalogRow>()
        .enumerate()
        .map(|(index, row)| (index + 2, row))
        .collect();

    let mut next_id = rows
        .iter()
        .filter_map(|(_, row)| row.as_ref().ok().and_then(|r| r.id))
        .max()
        .map_or(0, |max| max + 1);

    let mut destinations = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut skipped = 0;

    for (line, row) in rows {
        let parsed = row.map_err(CatalogError::from).and_then(|r| {
            let id = r.id.unwrap_or_else(|| {
                next_id += 1;
                next_id - 1
            });
            r.into_destination(id, line)
        });
        let parsed = parsed.and_then(|destination| {
            if seen_ids.insert(destination.id) {
                Ok(destination)
            } else {
                Err(CatalogError::InvalidRow {
                    line,
                    reason: format!("duplicate id {}", destination.id),
                })
            }
        });
        match parsed {
            Ok(destination) => destinations.push(destination),
            Err(e) => {
                warn!("Skipping catalog row: {}", e);
                skipped += 1;
            }
        }
    }

    info!("Loaded {} destinations ({} rows skipped)", destinations.len(), skipped);
    Ok(destinations)
}

pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Vec<Destination>, CatalogError> {
    let file = std::fs::File::open(path)?;
    from_reader(file)
}

/// Destinations carrying each category. A multi-tag destination appears in
/// every matching group.
pub fn group_by_category(destinations: &[Destination]) -> BTreeMap<Category, Vec<&Destination>> {
    let mut groups: BTreeMap<Category, Vec<&Destination>> =
        Category::ALL.iter().map(|&c| (c, Vec::new())).collect();
    for destination in destinations {
        for category in &destination.categories {
            if let Some(group) = groups.get_mut(category) {
                group.push(destination);
            }
        }
    }
    groups
}

pub fn category_counts(destinations: &[Destination]) -> BTreeMap<Category, usize> {
    group_by_category(destinations)
        .into_iter()
        .map(|(c, group)| (c, group.len()))
        .collect()
}

/// First category whose member count is below its slot minimum, if any.
pub fn check_minimums(destinations: &[Destination]) -> Result<(), OptimizerError> {
    let counts = category_counts(destinations);
    for category in Category::ALL {
        let available = counts.get(&category).copied().unwrap_or(0);
        let required = category.minimum_required();
        if available < required {
            return Err(OptimizerError::InsufficientCatalog { category, required, available });
        }
    }
    Ok(())
}
