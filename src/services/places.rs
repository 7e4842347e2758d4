//! External place lookup used to backfill sparse local results

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    config::PlacesConfig,
    error::{AppError, AppResult},
    geo::Coordinates,
    models::restaurant::NewRestaurant,
};

/// Third-party directory of places.
///
/// Results are not yet persisted, so they carry no local id; `external_id`
/// is always set and is the upsert key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExternalPlaceFinder: Send + Sync {
    async fn search_nearby(&self, origin: Coordinates, radius_meters: u32) -> AppResult<Vec<NewRestaurant>>;

    async fn details(&self, external_id: &str) -> AppResult<NewRestaurant>;
}

const PHOTO_MAX_WIDTH: u32 = 400;

const DETAIL_FIELDS: &str =
    "place_id,name,formatted_address,formatted_phone_number,geometry,types,rating,price_level,photos";

/// Google place types mapped to the cuisine tag stored on restaurants
const CUISINE_BY_TYPE: &[(&str, &str)] = &[
    ("chinese_restaurant", "chinese"),
    ("japanese_restaurant", "japanese"),
    ("korean_restaurant", "korean"),
    ("italian_restaurant", "italian"),
    ("american_restaurant", "american"),
    ("thai_restaurant", "thai"),
    ("indian_restaurant", "indian"),
    ("mexican_restaurant", "mexican"),
    ("french_restaurant", "french"),
    ("vietnamese_restaurant", "vietnamese"),
    ("fast_food_restaurant", "fast food"),
    ("pizza_restaurant", "pizza"),
    ("seafood_restaurant", "seafood"),
    ("steakhouse", "steakhouse"),
    ("bakery", "bakery"),
    ("cafe", "cafe"),
    ("bar", "bar"),
];

const DEFAULT_CUISINE: &str = "restaurant";

fn cuisine_for(types: &[String]) -> String {
    types
        .iter()
        .find_map(|t| {
            CUISINE_BY_TYPE
                .iter()
                .find(|(place_type, _)| place_type == t)
                .map(|(_, cuisine)| *cuisine)
        })
        .unwrap_or(DEFAULT_CUISINE)
        .to_string()
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<Place>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<Place>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Place {
    place_id: String,
    name: String,
    formatted_address: Option<String>,
    /// Nearby search returns the short address here
    vicinity: Option<String>,
    formatted_phone_number: Option<String>,
    geometry: Geometry,
    #[serde(default)]
    types: Vec<String>,
    rating: Option<f32>,
    price_level: Option<i16>,
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Photo {
    photo_reference: String,
}

fn check_status(status: &str, error_message: Option<String>) -> AppResult<()> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        other => Err(AppError::ExternalService(format!(
            "Google Places returned {}{}",
            other,
            error_message.map(|m| format!(": {}", m)).unwrap_or_default()
        ))),
    }
}

/// Client for the Google Places web service
#[derive(Clone)]
pub struct GooglePlacesFinder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GooglePlacesFinder {
    pub fn new(api_key: String, config: &PlacesConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a finder when an API key is configured
    pub fn from_config(config: &PlacesConfig) -> AppResult<Option<Self>> {
        match config.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Self::new(key.to_string(), config).map(Some),
            None => Ok(None),
        }
    }

    fn photo_url(&self, photo_reference: &str) -> String {
        format!(
            "{}/photo?maxwidth={}&photo_reference={}&key={}",
            self.base_url, PHOTO_MAX_WIDTH, photo_reference, self.api_key
        )
    }

    fn to_restaurant(&self, place: Place) -> NewRestaurant {
        let image_url = place.photos.first().map(|p| self.photo_url(&p.photo_reference));
        let cuisine = cuisine_for(&place.types);

        NewRestaurant {
            name: place.name,
            address: place.formatted_address.or(place.vicinity),
            latitude: place.geometry.location.lat,
            longitude: place.geometry.location.lng,
            phone: place.formatted_phone_number,
            rating: place.rating,
            price_level: place.price_level.filter(|p| (1..=4).contains(p)),
            cuisine: Some(cuisine),
            external_id: Some(place.place_id),
            image_url,
            description: None,
        }
    }
}

#[async_trait]
impl ExternalPlaceFinder for GooglePlacesFinder {
    async fn search_nearby(&self, origin: Coordinates, radius_meters: u32) -> AppResult<Vec<NewRestaurant>> {
        let location = format!("{},{}", origin.latitude, origin.longitude);
        let radius = radius_meters.to_string();

        let response: NearbyResponse = self
            .client
            .get(format!("{}/nearbysearch/json", self.base_url))
            .query(&[
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("type", "restaurant"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        check_status(&response.status, response.error_message)?;

        let restaurants: Vec<NewRestaurant> = response
            .results
            .into_iter()
            .map(|place| self.to_restaurant(place))
            .collect();

        tracing::info!(
            "Google Places returned {} restaurants around ({}, {}) within {} m",
            restaurants.len(),
            origin.latitude,
            origin.longitude,
            radius_meters
        );

        Ok(restaurants)
    }

    async fn details(&self, external_id: &str) -> AppResult<NewRestaurant> {
        let response: DetailsResponse = self
            .client
            .get(format!("{}/details/json", self.base_url))
            .query(&[
                ("place_id", external_id),
                ("fields", DETAIL_FIELDS),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.status == "NOT_FOUND" || response.status == "INVALID_REQUEST" {
            return Err(AppError::NotFound(format!("Place {} not found", external_id)));
        }
        check_status(&response.status, response.error_message)?;

        response
            .result
            .map(|place| self.to_restaurant(place))
            .ok_or_else(|| AppError::NotFound(format!("Place {} not found", external_id)))
    }
}
