//! Serializable description of a recommended itinerary.

use serde::{Serialize, Serializer};

use crate::destination::{Category, Coord};
use crate::itinerary::Itinerary;
use crate::penalty::ConstraintReport;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopSummary {
    pub order: usize,
    pub id: usize,
    pub name: String,
    pub categories: Vec<Category>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub rank: usize,
    pub start: Coord,
    pub total_distance_km: f64,
    pub total_travel_time_minutes: f64,
    pub total_travel_time_hours: f64,
    /// Written as `f64::MAX` for a zero-length route, whose fitness is
    /// infinite and has no JSON number.
    #[serde(serialize_with = "finite_or_max")]
    pub fitness: f64,
    pub constraints: ConstraintReport,
    pub is_valid_order: bool,
    pub stops: Vec<StopSummary>,
}

fn finite_or_max<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if *value == f64::INFINITY {
        serializer.serialize_f64(f64::MAX)
    } else {
        serializer.serialize_f64(*value)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl RouteSummary {
    /// `rank` is 1-based.
    pub fn new(rank: usize, itinerary: &Itinerary<'_>) -> Self {
        let evaluation = itinerary.evaluate();
        let stops = itinerary
            .genes()
            .iter()
            .enumerate()
            .map(|(i, d)| StopSummary {
                order: i + 1,
                id: d.id,
                name: d.name.clone(),
                categories: d.categories.clone(),
                latitude: d.location.lat,
                longitude: d.location.lon,
                address: d.address.clone(),
                image_url: d.image_url.clone(),
                description: d.description.clone(),
            })
            .collect();

        RouteSummary {
            rank,
            start: itinerary.start(),
            total_distance_km: round2(evaluation.total_distance_km),
            total_travel_time_minutes: round2(evaluation.total_time_min),
            total_travel_time_hours: round2(evaluation.total_time_min / 60.0),
            fitness: evaluation.fitness,
            constraints: itinerary.constraint_report(),
            is_valid_order: itinerary.is_valid_order(),
            stops,
        }
    }

    /// Summaries for a ranked list of itineraries.
    pub fn ranked(itineraries: &[Itinerary<'_>]) -> Vec<Self> {
        itineraries
            .iter()
            .enumerate()
            .map(|(i, it)| RouteSummary::new(i + 1, it))
            .collect()
    }
}
