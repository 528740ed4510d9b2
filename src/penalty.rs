//! Budget penalties applied to itinerary fitness.
//!
//! Each budget contributes an independent quadratic term that is zero at or
//! below its limit:
//!
//! ```text
//! penalty = weight * ((value - limit) / limit)^2   when value > limit
//! ```
//!
//! The penalized fitness is `base_fitness / (1 + total_penalty)`.

use serde::{Deserialize, Serialize};

/// Maximum total distance of a feasible itinerary (km).
pub const MAX_ROUTE_DISTANCE_KM: f64 = 20.0;

/// Maximum total travel time of a feasible itinerary (minutes).
pub const MAX_ROUTE_TIME_MIN: f64 = 300.0;

pub const DISTANCE_PENALTY_WEIGHT: f64 = 0.5;

pub const TIME_PENALTY_WEIGHT: f64 = 0.3;

fn quadratic_excess(value: f64, limit: f64, weight: f64) -> f64 {
    if value <= limit {
        return 0.0;
    }
    let ratio = (value - limit) / limit;
    weight * ratio * ratio
}

pub fn distance_penalty(total_distance_km: f64) -> f64 {
    quadratic_excess(total_distance_km, MAX_ROUTE_DISTANCE_KM, DISTANCE_PENALTY_WEIGHT)
}

pub fn time_penalty(total_time_min: f64) -> f64 {
    quadratic_excess(total_time_min, MAX_ROUTE_TIME_MIN, TIME_PENALTY_WEIGHT)
}

pub fn total_penalty(total_distance_km: f64, total_time_min: f64) -> f64 {
    distance_penalty(total_distance_km) + time_penalty(total_time_min)
}

pub fn apply_penalty(base_fitness: f64, penalty: f64) -> f64 {
    if penalty <= 0.0 {
        return base_fitness;
    }
    base_fitness / (1.0 + penalty)
}

/// One budget's contribution to the penalty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetCheck {
    pub value: f64,
    pub limit: f64,
    pub violated: bool,
    pub excess: f64,
    pub penalty: f64,
}

impl BudgetCheck {
    fn new(value: f64, limit: f64, penalty: f64) -> Self {
        BudgetCheck {
            value,
            limit,
            violated: value > limit,
            excess: (value - limit).max(0.0),
            penalty,
        }
    }
}

/// Detailed view of both budgets for a finished itinerary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintReport {
    pub distance_km: BudgetCheck,
    pub time_min: BudgetCheck,
    pub total_penalty: f64,
    pub feasible: bool,
}

impl ConstraintReport {
    pub fn new(total_distance_km: f64, total_time_min: f64) -> Self {
        let distance = BudgetCheck::new(
            total_distance_km,
            MAX_ROUTE_DISTANCE_KM,
            distance_penalty(total_distance_km),
        );
        let time = BudgetCheck::new(total_time_min, MAX_ROUTE_TIME_MIN, time_penalty(total_time_min));

        ConstraintReport {
            distance_km: distance,
            time_min: time,
            total_penalty: distance.penalty + time.penalty,
            feasible: !distance.violated && !time.violated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_penalty_within_budget() {
        assert_eq!(distance_penalty(0.0), 0.0);
        assert_eq!(distance_penalty(20.0), 0.0);
        assert_eq!(time_penalty(300.0), 0.0);
        assert_eq!(total_penalty(19.9, 299.0), 0.0);
    }

    #[test]
    fn test_distance_penalty_values() {
        // 30 km: excess ratio 0.5, 0.5 * 0.25
        assert!((distance_penalty(30.0) - 0.125).abs() < 1e-12);
        // 40 km: excess ratio 1.0
        assert!((distance_penalty(40.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_time_penalty_values() {
        // 600 min: excess ratio 1.0, weight 0.3
        assert!((time_penalty(600.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_distance_penalty_strictly_increasing_above_limit() {
        let mut previous = distance_penalty(20.0);
        for step in 1..200 {
            let d = 20.0 + step as f64 * 0.25;
            let p = distance_penalty(d);
            assert!(p > previous, "penalty must grow at {} km", d);
            previous = p;
        }
    }

    #[test]
    fn test_apply_penalty() {
        assert_eq!(apply_penalty(0.1, 0.0), 0.1);
        assert!((apply_penalty(0.1, 1.0) - 0.05).abs() < 1e-12);
        assert_eq!(apply_penalty(f64::INFINITY, 0.0), f64::INFINITY);
    }

    #[test]
    fn test_constraint_report() {
        let report = ConstraintReport::new(25.0, 120.0);
        assert!(report.distance_km.violated);
        assert!(!report.time_min.violated);
        assert!((report.distance_km.excess - 5.0).abs() < 1e-12);
        assert_eq!(report.time_min.excess, 0.0);
        assert!(!report.feasible);
        assert_eq!(report.total_penalty, distance_penalty(25.0));

        let ok = ConstraintReport::new(12.0, 90.0);
        assert!(ok.feasible);
        assert_eq!(ok.total_penalty, 0.0);
    }
}
