//! Destination records and the fixed itinerary category pattern.
//!
//! A destination is an immutable point of interest loaded from the catalog.
//! Itineraries reference destinations, they never copy them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of stops in every itinerary.
pub const ITINERARY_LENGTH: usize = 8;

/// Category required at each itinerary position.
pub const CATEGORY_PATTERN: [Category; ITINERARY_LENGTH] = [
    Category::HeavyMeal,
    Category::Snack,
    Category::Attraction,
    Category::HeavyMeal,
    Category::Attraction,
    Category::Snack,
    Category::HeavyMeal,
    Category::Souvenir,
];

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coord { lat, lon }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Category tag carried by a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    HeavyMeal,
    Snack,
    Attraction,
    Souvenir,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::HeavyMeal,
        Category::Snack,
        Category::Attraction,
        Category::Souvenir,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::HeavyMeal => "heavy_meal",
            Category::Snack => "snack",
            Category::Attraction => "attraction",
            Category::Souvenir => "souvenir",
        }
    }

    /// Minimum number of distinct catalog members needed to fill the pattern.
    pub fn minimum_required(&self) -> usize {
        match self {
            Category::HeavyMeal => 3,
            Category::Snack => 2,
            Category::Attraction => 2,
            Category::Souvenir => 1,
        }
    }

    /// Pattern positions that require this category.
    pub fn slots(&self) -> Vec<usize> {
        CATEGORY_PATTERN
            .iter()
            .enumerate()
            .filter(|(_, c)| *c == self)
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "heavy_meal" | "makanan_berat" => Ok(Category::HeavyMeal),
            "snack" | "makanan_ringan" => Ok(Category::Snack),
            "attraction" | "non_kuliner" => Ok(Category::Attraction),
            "souvenir" | "oleh_oleh" => Ok(Category::Souvenir),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// A point of interest that can appear in an itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// Catalog identifier, unique within a catalog
    pub id: usize,
    /// Display name
    pub name: String,
    /// Category tags (a destination may carry several)
    pub categories: Vec<Category>,
    pub location: Coord,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

impl Destination {
    pub fn new(id: usize, name: &str, categories: &[Category], lat: f64, lon: f64) -> Self {
        Destination {
            id,
            name: name.to_string(),
            categories: categories.to_vec(),
            location: Coord::new(lat, lon),
            address: None,
            image_url: None,
            description: None,
        }
    }

    pub fn has_category(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_slots() {
        assert_eq!(Category::HeavyMeal.slots(), vec![0, 3, 6]);
        assert_eq!(Category::Snack.slots(), vec![1, 5]);
        assert_eq!(Category::Attraction.slots(), vec![2, 4]);
        assert_eq!(Category::Souvenir.slots(), vec![7]);
    }

    #[test]
    fn test_minimums_match_pattern() {
        for category in Category::ALL {
            assert_eq!(category.minimum_required(), category.slots().len());
        }
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("heavy_meal".parse::<Category>(), Ok(Category::HeavyMeal));
        assert_eq!(" Heavy-Meal ".parse::<Category>(), Ok(Category::HeavyMeal));
        assert_eq!("souvenir".parse::<Category>(), Ok(Category::Souvenir));
        assert_eq!("oleh-oleh".parse::<Category>(), Ok(Category::Souvenir));
        assert!("museum".parse::<Category>().is_err());
        assert_eq!(Category::HeavyMeal.to_string(), "heavy_meal");
    }
}
