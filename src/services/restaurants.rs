//! Restaurant catalog and favorites

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    geo::Coordinates,
    models::{
        favorite::{AddFavorite, FavoriteRestaurant},
        restaurant::{NewRestaurant, Restaurant, RestaurantCandidate, RestaurantSearchParams, UpdateRestaurant},
    },
    repository::Repository,
    services::places::ExternalPlaceFinder,
};

const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(Clone)]
pub struct RestaurantsService {
    repository: Repository,
    finder: Option<Arc<dyn ExternalPlaceFinder>>,
}

impl RestaurantsService {
    pub fn new(repository: Repository, finder: Option<Arc<dyn ExternalPlaceFinder>>) -> Self {
        Self { repository, finder }
    }

    pub async fn create_restaurant(&self, data: NewRestaurant) -> AppResult<Restaurant> {
        data.validate()?;
        Coordinates::new(data.latitude, data.longitude)?;

        let restaurant = self.repository.restaurants.create(&data).await?;
        tracing::info!("Restaurant {} created: {}", restaurant.id, restaurant.name);
        Ok(restaurant)
    }

    pub async fn get_restaurant(&self, id: i64) -> AppResult<Restaurant> {
        self.repository.restaurants.get_by_id(id).await
    }

    pub async fn list_restaurants(&self, limit: i64, offset: i64) -> AppResult<Vec<Restaurant>> {
        self.repository.restaurants.list_all(limit.max(0), offset.max(0)).await
    }

    pub async fn update_restaurant(&self, id: i64, data: UpdateRestaurant) -> AppResult<Restaurant> {
        data.validate()?;
        self.repository.restaurants.update(id, &data).await
    }

    /// Active restaurants around a point, nearest first, with optional cuisine and rating filters
    pub async fn search_nearby(&self, params: RestaurantSearchParams) -> AppResult<Vec<RestaurantCandidate>> {
        params.validate()?;
        let origin = Coordinates::new(params.latitude, params.longitude)?;

        self.repository
            .restaurants
            .search_nearby(
                origin,
                f64::from(params.radius),
                &params.filter(),
                params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            )
            .await
    }

    /// Fetch one place from the external directory and store it by its external id
    pub async fn import_external(&self, external_id: &str) -> AppResult<Restaurant> {
        let finder = self
            .finder
            .as_ref()
            .ok_or_else(|| AppError::ExternalService("No place finder configured".to_string()))?;

        let place = finder.details(external_id).await?;
        let restaurant = self.repository.restaurants.upsert_external(&place).await?;

        tracing::info!("Imported place {} as restaurant {}", external_id, restaurant.id);
        Ok(restaurant)
    }

    pub async fn add_favorite(&self, user_id: i64, data: AddFavorite) -> AppResult<FavoriteRestaurant> {
        data.validate()?;
        self.repository.restaurants.get_by_id(data.restaurant_id).await?;
        self.repository.favorites.add(user_id, &data).await
    }

    pub async fn remove_favorite(&self, user_id: i64, restaurant_id: i64) -> AppResult<()> {
        self.repository.favorites.remove(user_id, restaurant_id).await
    }

    pub async fn list_favorites(&self, user_id: i64) -> AppResult<Vec<FavoriteRestaurant>> {
        self.repository.favorites.list_by_user(user_id).await
    }

    pub async fn is_favorite(&self, user_id: i64, restaurant_id: i64) -> AppResult<bool> {
        self.repository.favorites.exists(user_id, restaurant_id).await
    }
}
