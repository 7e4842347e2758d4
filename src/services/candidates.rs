//! Candidate assembly for a round: proximity search, backfill, favorites merge, shuffle

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::{
    config::GameConfig,
    error::{AppError, AppResult},
    geo::Coordinates,
    models::restaurant::{NearbyFilter, Restaurant, RestaurantCandidate},
    repository::Repository,
    services::places::ExternalPlaceFinder,
};

#[derive(Clone)]
pub struct CandidateAggregator {
    repository: Repository,
    finder: Option<Arc<dyn ExternalPlaceFinder>>,
    config: GameConfig,
}

impl CandidateAggregator {
    pub fn new(
        repository: Repository,
        finder: Option<Arc<dyn ExternalPlaceFinder>>,
        config: GameConfig,
    ) -> Self {
        Self {
            repository,
            finder,
            config,
        }
    }

    /// Build the shuffled candidate list for one round, at most `limit` entries.
    ///
    /// Fails `NoCandidatesFound` when neither the search nor the user's
    /// favorites yield a restaurant.
    pub async fn build_candidates(
        &self,
        user_id: i64,
        origin: Coordinates,
        radius_meters: u32,
        limit: usize,
    ) -> AppResult<Vec<RestaurantCandidate>> {
        let mut nearby = self.search(origin, radius_meters).await?;

        if nearby.len() < self.config.backfill_threshold {
            if let Some(ref finder) = self.finder {
                if self.backfill(finder.as_ref(), origin, radius_meters).await > 0 {
                    nearby = self.search(origin, radius_meters).await?;
                }
            }
        }

        let favorites = self.active_favorites(user_id).await?;
        let merged = merge_candidates(nearby, favorites, limit);

        if merged.is_empty() {
            return Err(AppError::NoCandidatesFound);
        }

        Ok(shuffled(merged))
    }

    async fn search(&self, origin: Coordinates, radius_meters: u32) -> AppResult<Vec<RestaurantCandidate>> {
        self.repository
            .restaurants
            .search_nearby(
                origin,
                f64::from(radius_meters),
                &NearbyFilter::default(),
                self.config.nearby_query_limit,
            )
            .await
    }

    /// Import places from the external finder. Returns how many were stored.
    async fn backfill(&self, finder: &dyn ExternalPlaceFinder, origin: Coordinates, radius_meters: u32) -> usize {
        let places = match finder.search_nearby(origin, radius_meters).await {
            Ok(places) => places,
            Err(e) => {
                tracing::warn!("Place backfill skipped: {}", e);
                return 0;
            }
        };

        let mut stored = 0;
        for place in &places {
            match self.repository.restaurants.upsert_external(place).await {
                Ok(_) => stored += 1,
                Err(e) => tracing::warn!(
                    "Failed to store external place {:?}: {}",
                    place.external_id,
                    e
                ),
            }
        }

        tracing::info!("Backfilled {}/{} external places", stored, places.len());
        stored
    }

    async fn active_favorites(&self, user_id: i64) -> AppResult<Vec<Restaurant>> {
        let favorites = self.repository.favorites.list_by_user(user_id).await?;

        let mut restaurants = Vec::with_capacity(favorites.len());
        for favorite in favorites {
            match self.repository.restaurants.get_by_id(favorite.restaurant_id).await {
                Ok(r) if r.is_active => restaurants.push(r),
                Ok(_) | Err(AppError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(restaurants)
    }
}

/// Merge favorites into the nearby set, deduplicated by restaurant id.
///
/// Favorites are admitted first: one found nearby keeps its distance, one
/// outside the search gets the sentinel distance 0. Nearby restaurants then
/// fill the remaining slots in their ranked order.
pub fn merge_candidates(
    nearby: Vec<RestaurantCandidate>,
    favorites: Vec<Restaurant>,
    limit: usize,
) -> Vec<RestaurantCandidate> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(limit.min(nearby.len() + favorites.len()));

    for favorite in favorites {
        if !seen.insert(favorite.id) {
            continue;
        }
        let candidate = nearby
            .iter()
            .find(|c| c.id() == favorite.id)
            .cloned()
            .unwrap_or_else(|| RestaurantCandidate::unranked(favorite));
        merged.push(candidate);
    }

    for candidate in nearby {
        if seen.insert(candidate.id()) {
            merged.push(candidate);
        }
    }

    merged.truncate(limit);
    merged
}

fn shuffled(mut candidates: Vec<RestaurantCandidate>) -> Vec<RestaurantCandidate> {
    candidates.shuffle(&mut rand::thread_rng());
    candidates
}
