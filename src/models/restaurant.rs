//! Restaurant model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Restaurant as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    /// WGS84 degrees
    pub latitude: f64,
    pub longitude: f64,
    pub phone: Option<String>,
    /// 0.0 - 5.0
    pub rating: Option<f32>,
    /// 1 (cheap) - 4 (expensive)
    pub price_level: Option<i16>,
    pub cuisine: Option<String>,
    pub is_active: bool,
    /// Stable identifier from the external place provider
    pub external_id: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A restaurant admitted to a round, annotated with its distance from the player.
///
/// `distance_meters` is `0.0` for entries admitted without a computed distance
/// (favorites outside the search, ad-substituted results).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantCandidate {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub distance_meters: f64,
}

impl RestaurantCandidate {
    pub fn new(restaurant: Restaurant, distance_meters: f64) -> Self {
        Self { restaurant, distance_meters }
    }

    /// Candidate with the sentinel distance
    pub fn unranked(restaurant: Restaurant) -> Self {
        Self { restaurant, distance_meters: 0.0 }
    }

    pub fn id(&self) -> i64 {
        self.restaurant.id
    }
}

/// Create restaurant request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewRestaurant {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: Option<String>,
    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: Option<f32>,
    #[validate(range(min = 1, max = 4))]
    pub price_level: Option<i16>,
    pub cuisine: Option<String>,
    pub external_id: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

/// Partial restaurant update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRestaurant {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: Option<f32>,
    #[validate(range(min = 1, max = 4))]
    pub price_level: Option<i16>,
    pub cuisine: Option<String>,
    pub is_active: Option<bool>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

/// Optional filters for proximity searches
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NearbyFilter {
    /// Case-insensitive substring match on the cuisine tag
    pub cuisine: Option<String>,
    pub min_rating: Option<f32>,
}

impl NearbyFilter {
    pub fn matches(&self, restaurant: &Restaurant) -> bool {
        if let Some(ref cuisine) = self.cuisine {
            let wanted = cuisine.to_lowercase();
            let found = restaurant
                .cuisine
                .as_deref()
                .map(|c| c.to_lowercase().contains(&wanted))
                .unwrap_or(false);
            if !found {
                return false;
            }
        }
        if let Some(min) = self.min_rating {
            if restaurant.rating.unwrap_or(0.0) < min {
                return false;
            }
        }
        true
    }
}

/// Restaurant search request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RestaurantSearchParams {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: u32,
    pub cuisine: Option<String>,
    #[validate(range(min = 0.0, max = 5.0))]
    pub min_rating: Option<f32>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}

impl RestaurantSearchParams {
    pub fn filter(&self) -> NearbyFilter {
        NearbyFilter {
            cuisine: self.cuisine.clone(),
            min_rating: self.min_rating,
        }
    }
}
