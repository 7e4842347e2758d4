//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use food_roulette::{
    geo::Coordinates,
    models::{
        advertisement::{Advertisement, NewAdvertisement},
        game::{GameType, StartGameRequest},
        restaurant::{NewRestaurant, Restaurant},
    },
    services::{places::ExternalPlaceFinder, Services},
    AppConfig, AppError, AppResult, AppState,
};

/// Taipei, Xinyi district
pub const ORIGIN_LAT: f64 = 25.03;
pub const ORIGIN_LON: f64 = 121.56;

pub fn state() -> AppState {
    AppState::in_memory(AppConfig::default(), None)
}

pub fn state_with_finder(finder: impl ExternalPlaceFinder + 'static) -> AppState {
    AppState::in_memory(AppConfig::default(), Some(Arc::new(finder)))
}

pub fn new_restaurant(name: &str, latitude: f64, longitude: f64) -> NewRestaurant {
    NewRestaurant {
        name: name.to_string(),
        latitude,
        longitude,
        rating: Some(4.2),
        price_level: Some(2),
        ..Default::default()
    }
}

/// Restaurant `meters_north` of the origin (one thousandth of a degree is ~111 m)
pub async fn seed_restaurant(services: &Services, name: &str, meters_north: f64) -> Restaurant {
    let latitude = ORIGIN_LAT + meters_north / 111_195.0;
    services
        .restaurants
        .create_restaurant(new_restaurant(name, latitude, ORIGIN_LON))
        .await
        .expect("Failed to seed restaurant")
}

pub fn new_ad(restaurant_id: i64, priority: i32) -> NewAdvertisement {
    let now = Utc::now();
    NewAdvertisement {
        restaurant_id,
        title: format!("Priority {} special", priority),
        content: "Show this screen for a free drink".to_string(),
        image_url: None,
        target_url: Some("https://example.com/deal".to_string()),
        start_date: now - Duration::hours(1),
        end_date: now + Duration::days(7),
        priority,
    }
}

pub async fn seed_ad(services: &Services, restaurant_id: i64, priority: i32) -> Advertisement {
    services
        .advertisements
        .create_ad(new_ad(restaurant_id, priority))
        .await
        .expect("Failed to seed advertisement")
}

pub fn roulette() -> StartGameRequest {
    StartGameRequest {
        game_type: GameType::Roulette,
        latitude: ORIGIN_LAT,
        longitude: ORIGIN_LON,
        radius: Some(1_000),
    }
}

/// Place finder serving a fixed list of places
pub struct StaticPlaceFinder {
    pub places: Vec<NewRestaurant>,
}

impl StaticPlaceFinder {
    pub fn around_origin(count: usize) -> Self {
        let places = (0..count)
            .map(|i| NewRestaurant {
                external_id: Some(format!("place-{}", i)),
                cuisine: Some("ramen".to_string()),
                ..new_restaurant(
                    &format!("External {}", i),
                    ORIGIN_LAT + 0.001 * (i as f64 + 1.0),
                    ORIGIN_LON,
                )
            })
            .collect();
        Self { places }
    }
}

#[async_trait]
impl ExternalPlaceFinder for StaticPlaceFinder {
    async fn search_nearby(&self, _origin: Coordinates, _radius_meters: u32) -> AppResult<Vec<NewRestaurant>> {
        Ok(self.places.clone())
    }

    async fn details(&self, external_id: &str) -> AppResult<NewRestaurant> {
        self.places
            .iter()
            .find(|p| p.external_id.as_deref() == Some(external_id))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Place {} not found", external_id)))
    }
}
