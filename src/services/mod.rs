//! Business logic services

pub mod advertisements;
pub mod auth;
pub mod candidates;
pub mod cooldown;
pub mod game;
pub mod places;
pub mod restaurants;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub restaurants: restaurants::RestaurantsService,
    pub advertisements: advertisements::AdvertisementCoordinator,
    pub games: game::GameSessionEngine,
    auth: Option<Arc<dyn auth::AuthService>>,
}

impl Services {
    /// Wire all services over one repository.
    ///
    /// `finder` enables backfill and imports; without `auth`, `authenticate`
    /// rejects every token.
    pub fn new(
        repository: Repository,
        config: &AppConfig,
        cooldowns: Arc<dyn cooldown::CooldownStore>,
        finder: Option<Arc<dyn places::ExternalPlaceFinder>>,
        auth: Option<Arc<dyn auth::AuthService>>,
    ) -> Self {
        let advertisements = advertisements::AdvertisementCoordinator::new(
            repository.clone(),
            cooldowns,
            config.advertisement.clone(),
        );
        let candidates =
            candidates::CandidateAggregator::new(repository.clone(), finder.clone(), config.game.clone());

        Self {
            restaurants: restaurants::RestaurantsService::new(repository.clone(), finder),
            games: game::GameSessionEngine::new(
                repository,
                candidates,
                advertisements.clone(),
                config.game.clone(),
            ),
            advertisements,
            auth,
        }
    }

    /// Resolve a bearer token to a user id
    pub async fn authenticate(&self, token: &str) -> AppResult<i64> {
        match self.auth {
            Some(ref auth) => auth.validate_token(token).await,
            None => Err(AppError::Authentication(
                "No authentication service configured".to_string(),
            )),
        }
    }
}
