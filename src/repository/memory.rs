//! In-memory stores for tests and local development.
//!
//! Each store guards its state with a single lock, which gives the same
//! atomicity the Postgres implementations get from transactions and
//! conditional updates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{AdvertisementStore, FavoriteStore, GameSessionStore, RestaurantStore};
use crate::{
    error::{AppError, AppResult},
    geo::{self, Coordinates},
    models::{
        advertisement::{
            AdClick, AdEventCounts, AdView, Advertisement, NewAdvertisement, StatsPeriod,
            UpdateAdvertisement,
        },
        favorite::{AddFavorite, FavoriteRestaurant},
        game::{GameSession, SessionCompletion, SessionStatus},
        restaurant::{NearbyFilter, NewRestaurant, Restaurant, RestaurantCandidate, UpdateRestaurant},
    },
};

/// Overwrite `slot` only when `incoming` carries a non-empty value
fn merge_present(slot: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming.as_ref().filter(|v| !v.is_empty()) {
        *slot = Some(value.clone());
    }
}

fn paginate<T: Clone>(rows: &[T], limit: i64, offset: i64) -> Vec<T> {
    rows.iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Restaurants
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRestaurantStore {
    inner: Mutex<RestaurantTable>,
}

#[derive(Default)]
struct RestaurantTable {
    next_id: i64,
    rows: HashMap<i64, Restaurant>,
}

impl RestaurantTable {
    fn insert(&mut self, data: &NewRestaurant, now: DateTime<Utc>) -> Restaurant {
        self.next_id += 1;
        let restaurant = Restaurant {
            id: self.next_id,
            name: data.name.clone(),
            address: data.address.clone(),
            latitude: data.latitude,
            longitude: data.longitude,
            phone: data.phone.clone(),
            rating: data.rating,
            price_level: data.price_level,
            cuisine: data.cuisine.clone(),
            is_active: true,
            external_id: data.external_id.clone(),
            image_url: data.image_url.clone(),
            description: data.description.clone(),
            created_at: now,
            updated_at: now,
        };
        self.rows.insert(restaurant.id, restaurant.clone());
        restaurant
    }
}

#[async_trait]
impl RestaurantStore for MemoryRestaurantStore {
    async fn create(&self, restaurant: &NewRestaurant) -> AppResult<Restaurant> {
        let mut table = self.inner.lock();
        if let Some(ref external_id) = restaurant.external_id {
            if table.rows.values().any(|r| r.external_id.as_ref() == Some(external_id)) {
                return Err(AppError::Conflict(format!(
                    "Restaurant with external id {} already exists",
                    external_id
                )));
            }
        }
        Ok(table.insert(restaurant, Utc::now()))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Restaurant> {
        self.inner
            .lock()
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Restaurant with id {} not found", id)))
    }

    async fn search_nearby(
        &self,
        origin: Coordinates,
        radius_meters: f64,
        filter: &NearbyFilter,
        limit: usize,
    ) -> AppResult<Vec<RestaurantCandidate>> {
        let bbox = geo::BoundingBox::around(origin, radius_meters);
        let rows: Vec<Restaurant> = self
            .inner
            .lock()
            .rows
            .values()
            .filter(|r| r.is_active && filter.matches(r))
            .filter(|r| Coordinates::of(r).is_ok_and(|position| bbox.contains(position)))
            .cloned()
            .collect();

        let mut ranked = geo::rank_within_radius(origin, radius_meters, rows);
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn list_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Restaurant>> {
        let table = self.inner.lock();
        let mut rows: Vec<Restaurant> = table.rows.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(&rows, limit, offset))
    }

    async fn update(&self, id: i64, data: &UpdateRestaurant) -> AppResult<Restaurant> {
        let mut table = self.inner.lock();
        let row = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Restaurant with id {} not found", id)))?;

        if let Some(ref name) = data.name {
            row.name = name.clone();
        }
        merge_present(&mut row.address, &data.address);
        merge_present(&mut row.phone, &data.phone);
        merge_present(&mut row.cuisine, &data.cuisine);
        merge_present(&mut row.image_url, &data.image_url);
        merge_present(&mut row.description, &data.description);
        row.rating = data.rating.or(row.rating);
        row.price_level = data.price_level.or(row.price_level);
        row.is_active = data.is_active.unwrap_or(row.is_active);
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn upsert_external(&self, restaurant: &NewRestaurant) -> AppResult<Restaurant> {
        let external_id = restaurant
            .external_id
            .as_ref()
            .ok_or_else(|| AppError::InvalidInput("external_id is required for upsert".to_string()))?;

        let mut table = self.inner.lock();
        let existing = table
            .rows
            .values_mut()
            .find(|r| r.external_id.as_ref() == Some(external_id));

        match existing {
            Some(row) => {
                if !restaurant.name.is_empty() {
                    row.name = restaurant.name.clone();
                }
                row.latitude = restaurant.latitude;
                row.longitude = restaurant.longitude;
                merge_present(&mut row.address, &restaurant.address);
                merge_present(&mut row.phone, &restaurant.phone);
                merge_present(&mut row.cuisine, &restaurant.cuisine);
                merge_present(&mut row.image_url, &restaurant.image_url);
                merge_present(&mut row.description, &restaurant.description);
                row.rating = restaurant.rating.or(row.rating);
                row.price_level = restaurant.price_level.or(row.price_level);
                row.updated_at = Utc::now();
                Ok(row.clone())
            }
            None => Ok(table.insert(restaurant, Utc::now())),
        }
    }
}

// ---------------------------------------------------------------------------
// Favorites
// ---------------------------------------------------------------------------

/// Favorites joined against a restaurant store, so listings skip inactive restaurants
pub struct MemoryFavoriteStore {
    inner: Mutex<FavoriteTable>,
    restaurants: Arc<MemoryRestaurantStore>,
}

impl MemoryFavoriteStore {
    pub fn new(restaurants: Arc<MemoryRestaurantStore>) -> Self {
        Self {
            inner: Mutex::new(FavoriteTable::default()),
            restaurants,
        }
    }
}

#[derive(Default)]
struct FavoriteTable {
    next_id: i64,
    rows: Vec<FavoriteRestaurant>,
}

#[async_trait]
impl FavoriteStore for MemoryFavoriteStore {
    async fn add(&self, user_id: i64, data: &AddFavorite) -> AppResult<FavoriteRestaurant> {
        let mut table = self.inner.lock();
        if table
            .rows
            .iter()
            .any(|f| f.user_id == user_id && f.restaurant_id == data.restaurant_id)
        {
            return Err(AppError::Conflict(format!(
                "Restaurant {} is already in the favorites of user {}",
                data.restaurant_id, user_id
            )));
        }

        table.next_id += 1;
        let favorite = FavoriteRestaurant {
            id: table.next_id,
            user_id,
            restaurant_id: data.restaurant_id,
            notes: data.notes.clone(),
            created_at: Utc::now(),
        };
        table.rows.push(favorite.clone());
        Ok(favorite)
    }

    async fn remove(&self, user_id: i64, restaurant_id: i64) -> AppResult<()> {
        let mut table = self.inner.lock();
        let before = table.rows.len();
        table
            .rows
            .retain(|f| !(f.user_id == user_id && f.restaurant_id == restaurant_id));

        if table.rows.len() == before {
            return Err(AppError::NotFound(format!(
                "Restaurant {} is not a favorite of user {}",
                restaurant_id, user_id
            )));
        }
        Ok(())
    }

    async fn list_by_user(&self, user_id: i64) -> AppResult<Vec<FavoriteRestaurant>> {
        let active: HashSet<i64> = self
            .restaurants
            .inner
            .lock()
            .rows
            .values()
            .filter(|r| r.is_active)
            .map(|r| r.id)
            .collect();

        let table = self.inner.lock();
        let mut rows: Vec<FavoriteRestaurant> = table
            .rows
            .iter()
            .filter(|f| f.user_id == user_id && active.contains(&f.restaurant_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn exists(&self, user_id: i64, restaurant_id: i64) -> AppResult<bool> {
        Ok(self
            .inner
            .lock()
            .rows
            .iter()
            .any(|f| f.user_id == user_id && f.restaurant_id == restaurant_id))
    }
}

// ---------------------------------------------------------------------------
// Advertisements
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryAdvertisementStore {
    inner: Mutex<AdvertisementTable>,
}

#[derive(Default)]
struct AdvertisementTable {
    next_id: i64,
    ads: HashMap<i64, Advertisement>,
    views: Vec<AdView>,
    clicks: Vec<AdClick>,
}

impl AdvertisementTable {
    fn get_mut(&mut self, id: i64) -> AppResult<&mut Advertisement> {
        self.ads
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Advertisement with id {} not found", id)))
    }
}

/// (events, distinct users) for a stream of event user ids
fn count_events(users: impl Iterator<Item = i64>) -> (i64, i64) {
    let mut users: Vec<i64> = users.collect();
    let total = users.len() as i64;
    users.sort_unstable();
    users.dedup();
    (total, users.len() as i64)
}

#[async_trait]
impl AdvertisementStore for MemoryAdvertisementStore {
    async fn create(&self, data: &NewAdvertisement) -> AppResult<Advertisement> {
        let mut table = self.inner.lock();
        table.next_id += 1;
        let now = Utc::now();
        let ad = Advertisement {
            id: table.next_id,
            restaurant_id: data.restaurant_id,
            title: data.title.clone(),
            content: data.content.clone(),
            image_url: data.image_url.clone(),
            target_url: data.target_url.clone(),
            is_active: true,
            start_date: data.start_date,
            end_date: data.end_date,
            priority: data.priority,
            view_count: 0,
            click_count: 0,
            created_at: now,
            updated_at: now,
        };
        table.ads.insert(ad.id, ad.clone());
        Ok(ad)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Advertisement> {
        self.inner
            .lock()
            .ads
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Advertisement with id {} not found", id)))
    }

    async fn list_active(&self, limit: usize) -> AppResult<Vec<Advertisement>> {
        let now = Utc::now();
        let mut ads: Vec<Advertisement> = self
            .inner
            .lock()
            .ads
            .values()
            .filter(|ad| ad.is_eligible(now))
            .cloned()
            .collect();
        ads.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        ads.truncate(limit);
        Ok(ads)
    }

    async fn list_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Advertisement>> {
        let table = self.inner.lock();
        let mut ads: Vec<Advertisement> = table.ads.values().cloned().collect();
        ads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(&ads, limit, offset))
    }

    async fn update(&self, id: i64, data: &UpdateAdvertisement) -> AppResult<Advertisement> {
        let mut table = self.inner.lock();
        let ad = table.get_mut(id)?;

        ad.restaurant_id = data.restaurant_id.unwrap_or(ad.restaurant_id);
        if let Some(ref title) = data.title {
            ad.title = title.clone();
        }
        if let Some(ref content) = data.content {
            ad.content = content.clone();
        }
        merge_present(&mut ad.image_url, &data.image_url);
        merge_present(&mut ad.target_url, &data.target_url);
        ad.is_active = data.is_active.unwrap_or(ad.is_active);
        ad.start_date = data.start_date.unwrap_or(ad.start_date);
        ad.end_date = data.end_date.unwrap_or(ad.end_date);
        ad.priority = data.priority.unwrap_or(ad.priority);
        ad.updated_at = Utc::now();
        Ok(ad.clone())
    }

    async fn insert_view(&self, view: &AdView) -> AppResult<()> {
        let mut table = self.inner.lock();
        table.get_mut(view.advertisement_id)?.view_count += 1;
        table.views.push(view.clone());
        Ok(())
    }

    async fn insert_click(&self, click: &AdClick) -> AppResult<()> {
        let mut table = self.inner.lock();
        table.get_mut(click.advertisement_id)?.click_count += 1;
        table.clicks.push(click.clone());
        Ok(())
    }

    async fn aggregate_stats(&self, ad_id: i64, period: StatsPeriod) -> AppResult<AdEventCounts> {
        let since = period.since(Utc::now());
        let in_window = |at: DateTime<Utc>| since.map_or(true, |s| at >= s);

        let table = self.inner.lock();
        let (view_count, unique_viewers) = count_events(
            table
                .views
                .iter()
                .filter(|v| v.advertisement_id == ad_id && in_window(v.viewed_at))
                .map(|v| v.user_id),
        );
        let (click_count, unique_clickers) = count_events(
            table
                .clicks
                .iter()
                .filter(|c| c.advertisement_id == ad_id && in_window(c.clicked_at))
                .map(|c| c.user_id),
        );

        Ok(AdEventCounts {
            view_count,
            click_count,
            unique_viewers,
            unique_clickers,
        })
    }
}

// ---------------------------------------------------------------------------
// Game sessions
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryGameSessionStore {
    inner: Mutex<HashMap<Uuid, GameSession>>,
}

#[async_trait]
impl GameSessionStore for MemoryGameSessionStore {
    async fn create(&self, session: &GameSession) -> AppResult<()> {
        let mut sessions = self.inner.lock();
        if sessions.contains_key(&session.id) {
            return Err(AppError::Conflict(format!(
                "Game session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<GameSession>> {
        Ok(self.inner.lock().get(&id).cloned())
    }

    async fn update_if_playing(&self, id: Uuid, completion: &SessionCompletion) -> AppResult<bool> {
        let mut sessions = self.inner.lock();
        match sessions.get_mut(&id) {
            Some(session) if session.status == SessionStatus::Playing => {
                session.status = SessionStatus::Completed;
                session.result = Some(completion.result.clone());
                session.clicked_ad_id = completion.clicked_ad_id;
                session.completed_at = Some(completion.completed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> AppResult<Vec<GameSession>> {
        let sessions = self.inner.lock();
        let mut rows: Vec<GameSession> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(paginate(&rows, limit, offset))
    }
}
