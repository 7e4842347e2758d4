//! Repository layer: store contracts and their Postgres / in-memory backends

pub mod advertisements;
pub mod favorites;
pub mod game_sessions;
pub mod memory;
pub mod restaurants;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    geo::Coordinates,
    models::{
        advertisement::{
            AdClick, AdEventCounts, AdView, Advertisement, NewAdvertisement, StatsPeriod,
            UpdateAdvertisement,
        },
        favorite::{AddFavorite, FavoriteRestaurant},
        game::{GameSession, SessionCompletion},
        restaurant::{NearbyFilter, NewRestaurant, Restaurant, RestaurantCandidate, UpdateRestaurant},
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RestaurantStore: Send + Sync {
    async fn create(&self, restaurant: &NewRestaurant) -> AppResult<Restaurant>;

    /// Returns the restaurant whether active or not; `NotFound` when absent
    async fn get_by_id(&self, id: i64) -> AppResult<Restaurant>;

    /// Active restaurants within `radius_meters`, nearest first, at most `limit`
    async fn search_nearby(
        &self,
        origin: Coordinates,
        radius_meters: f64,
        filter: &NearbyFilter,
        limit: usize,
    ) -> AppResult<Vec<RestaurantCandidate>>;

    async fn list_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Restaurant>>;

    async fn update(&self, id: i64, data: &UpdateRestaurant) -> AppResult<Restaurant>;

    /// Insert or refresh a restaurant keyed by its external id.
    ///
    /// Known metadata survives: a mutable field is only overwritten when the
    /// incoming value is present.
    async fn upsert_external(&self, restaurant: &NewRestaurant) -> AppResult<Restaurant>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FavoriteStore: Send + Sync {
    /// `Conflict` when the pair already exists
    async fn add(&self, user_id: i64, data: &AddFavorite) -> AppResult<FavoriteRestaurant>;

    /// `NotFound` when the pair does not exist
    async fn remove(&self, user_id: i64, restaurant_id: i64) -> AppResult<()>;

    /// Most recent first
    async fn list_by_user(&self, user_id: i64) -> AppResult<Vec<FavoriteRestaurant>>;

    async fn exists(&self, user_id: i64, restaurant_id: i64) -> AppResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdvertisementStore: Send + Sync {
    async fn create(&self, data: &NewAdvertisement) -> AppResult<Advertisement>;

    async fn get_by_id(&self, id: i64) -> AppResult<Advertisement>;

    /// Ads flagged active whose window contains the current time
    async fn list_active(&self, limit: usize) -> AppResult<Vec<Advertisement>>;

    /// Every ad, active or not, newest first
    async fn list_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Advertisement>>;

    async fn update(&self, id: i64, data: &UpdateAdvertisement) -> AppResult<Advertisement>;

    /// Insert the event and bump `view_count` in one unit of work
    async fn insert_view(&self, view: &AdView) -> AppResult<()>;

    /// Insert the event and bump `click_count` in one unit of work
    async fn insert_click(&self, click: &AdClick) -> AppResult<()>;

    async fn aggregate_stats(&self, ad_id: i64, period: StatsPeriod) -> AppResult<AdEventCounts>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameSessionStore: Send + Sync {
    /// `Conflict` when the id is already taken
    async fn create(&self, session: &GameSession) -> AppResult<()>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<GameSession>>;

    /// Apply the completion only if the session is still `playing`.
    ///
    /// Returns `false` when the session was not in `playing` (or does not exist).
    async fn update_if_playing(&self, id: Uuid, completion: &SessionCompletion) -> AppResult<bool>;

    /// Most recent first
    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> AppResult<Vec<GameSession>>;
}

/// Container for all stores
#[derive(Clone)]
pub struct Repository {
    pub restaurants: Arc<dyn RestaurantStore>,
    pub favorites: Arc<dyn FavoriteStore>,
    pub advertisements: Arc<dyn AdvertisementStore>,
    pub game_sessions: Arc<dyn GameSessionStore>,
}

impl Repository {
    /// Create a Postgres-backed repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            restaurants: Arc::new(restaurants::RestaurantsRepository::new(pool.clone())),
            favorites: Arc::new(favorites::FavoritesRepository::new(pool.clone())),
            advertisements: Arc::new(advertisements::AdvertisementsRepository::new(pool.clone())),
            game_sessions: Arc::new(game_sessions::GameSessionsRepository::new(pool)),
        }
    }

    /// Process-local repository; state is lost on drop
    pub fn in_memory() -> Self {
        let restaurants = Arc::new(memory::MemoryRestaurantStore::default());
        Self {
            favorites: Arc::new(memory::MemoryFavoriteStore::new(restaurants.clone())),
            advertisements: Arc::new(memory::MemoryAdvertisementStore::default()),
            game_sessions: Arc::new(memory::MemoryGameSessionStore::default()),
            restaurants,
        }
    }
}
