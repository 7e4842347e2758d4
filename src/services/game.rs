//! Game session engine: round creation, completion with the ad override rule, history

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::GameConfig,
    error::{AppError, AppResult},
    geo::Coordinates,
    models::{
        advertisement::Advertisement,
        game::{
            CompleteGameRequest, GameResult, GameSession, SessionCompletion, SessionStatus,
            SessionView, StartGameRequest,
        },
        restaurant::RestaurantCandidate,
    },
    repository::Repository,
    services::{advertisements::AdvertisementCoordinator, candidates::CandidateAggregator},
};

#[derive(Clone)]
pub struct GameSessionEngine {
    repository: Repository,
    candidates: CandidateAggregator,
    advertisements: AdvertisementCoordinator,
    config: GameConfig,
}

impl GameSessionEngine {
    pub fn new(
        repository: Repository,
        candidates: CandidateAggregator,
        advertisements: AdvertisementCoordinator,
        config: GameConfig,
    ) -> Self {
        Self {
            repository,
            candidates,
            advertisements,
            config,
        }
    }

    /// Start a round: build candidates and ads, persist the session in `playing`.
    ///
    /// Ad views are recorded after the session is stored, outside the request
    /// timeout, and never fail the round.
    pub async fn start_game(&self, user_id: i64, request: StartGameRequest) -> AppResult<GameSession> {
        let session = with_timeout(self.config.request_timeout(), self.start(user_id, request)).await?;
        self.record_views(&session).await;
        Ok(session)
    }

    /// Finish a round with the player's pick, applying the ad override when an ad was clicked
    pub async fn complete_game(&self, user_id: i64, request: CompleteGameRequest) -> AppResult<GameResult> {
        let result = with_timeout(self.config.request_timeout(), self.complete(user_id, request)).await?;
        if let Some(ref ad) = result.clicked_ad {
            self.record_click(ad.id, user_id, result.session_id).await;
        }
        Ok(result)
    }

    /// The user's sessions, most recent first
    pub async fn get_history(&self, user_id: i64, limit: i64, offset: i64) -> AppResult<Vec<SessionView>> {
        let limit = limit.clamp(1, self.config.history_page_limit.max(1));
        let sessions = self
            .repository
            .game_sessions
            .list_by_user(user_id, limit, offset.max(0))
            .await?;

        let now = Utc::now();
        let timeout = self.config.session_timeout();
        Ok(sessions
            .into_iter()
            .map(|session| SessionView {
                expired: session.is_expired(now, timeout),
                session,
            })
            .collect())
    }

    /// Owner-only read of a single session
    pub async fn get_session(&self, user_id: i64, session_id: Uuid) -> AppResult<SessionView> {
        let session = self.load_owned(user_id, session_id).await?;
        Ok(SessionView {
            expired: session.is_expired(Utc::now(), self.config.session_timeout()),
            session,
        })
    }

    async fn start(&self, user_id: i64, request: StartGameRequest) -> AppResult<GameSession> {
        let radius = request.radius.unwrap_or(self.config.default_radius_meters);
        if !(self.config.min_radius_meters..=self.config.max_radius_meters).contains(&radius) {
            return Err(AppError::InvalidInput(format!(
                "radius must be between {} and {} meters, got {}",
                self.config.min_radius_meters, self.config.max_radius_meters, radius
            )));
        }
        let origin = Coordinates::new(request.latitude, request.longitude)?;

        let candidates = self
            .candidates
            .build_candidates(user_id, origin, radius, self.config.max_restaurants_per_round)
            .await?;
        let advertisements = self
            .advertisements
            .select_for_round(self.config.max_ads_per_round)
            .await?;

        let mut session = GameSession {
            id: Uuid::new_v4(),
            user_id,
            game_type: request.game_type,
            status: SessionStatus::Playing,
            candidates,
            advertisements,
            result: None,
            clicked_ad_id: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.persist_new(&mut session).await?;

        tracing::info!(
            "Game {} ({}) started for user {} with {} candidates and {} ads",
            session.id,
            session.game_type,
            user_id,
            session.candidates.len(),
            session.advertisements.len()
        );
        Ok(session)
    }

    async fn record_views(&self, session: &GameSession) {
        let limit = self.config.ad_event_timeout();
        for ad in &session.advertisements {
            let view = self.advertisements.record_view(ad.id, session.user_id, session.id);
            match tokio::time::timeout(limit, view).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!("Failed to record view of ad {} in session {}: {}", ad.id, session.id, e)
                }
                Err(_) => tracing::warn!(
                    "Recording view of ad {} in session {} timed out after {:?}",
                    ad.id,
                    session.id,
                    limit
                ),
            }
        }
    }

    async fn record_click(&self, ad_id: i64, user_id: i64, session_id: Uuid) {
        let limit = self.config.ad_event_timeout();
        let click = self.advertisements.record_click(ad_id, user_id, session_id);
        match tokio::time::timeout(limit, click).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!("Failed to record click on ad {} in session {}: {}", ad_id, session_id, e)
            }
            Err(_) => tracing::warn!(
                "Recording click on ad {} in session {} timed out after {:?}",
                ad_id,
                session_id,
                limit
            ),
        }
    }

    /// Insert the session, retrying once with a fresh id on an id collision
    async fn persist_new(&self, session: &mut GameSession) -> AppResult<()> {
        match self.repository.game_sessions.create(session).await {
            Err(AppError::Conflict(_)) => {
                tracing::warn!("Session id {} already taken, retrying with a new id", session.id);
                session.id = Uuid::new_v4();
                self.repository
                    .game_sessions
                    .create(session)
                    .await
                    .map_err(|e| match e {
                        AppError::Conflict(msg) => AppError::Internal(msg),
                        other => other,
                    })
            }
            other => other,
        }
    }

    async fn complete(&self, user_id: i64, request: CompleteGameRequest) -> AppResult<GameResult> {
        let session = self.load_owned(user_id, request.session_id).await?;
        if session.status != SessionStatus::Playing {
            return Err(AppError::GameAlreadyComplete(session.id.to_string()));
        }

        let selected = session
            .candidate(request.selected_restaurant_id)
            .cloned()
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "Restaurant {} was not offered in session {}",
                    request.selected_restaurant_id, session.id
                ))
            })?;

        let clicked_ad = match request.clicked_ad_id {
            Some(ad_id) => Some(session.advertisement(ad_id).cloned().ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "Advertisement {} was not shown in session {}",
                    ad_id, session.id
                ))
            })?),
            None => None,
        };

        let result = match clicked_ad {
            Some(ref ad) => self.resolve_override(ad, selected).await,
            None => selected,
        };

        let completion = SessionCompletion {
            result,
            clicked_ad_id: clicked_ad.as_ref().map(|ad| ad.id),
            completed_at: Utc::now(),
        };
        let applied = self
            .repository
            .game_sessions
            .update_if_playing(session.id, &completion)
            .await?;
        if !applied {
            return Err(AppError::GameAlreadyComplete(session.id.to_string()));
        }

        tracing::info!(
            "Game {} completed by user {} with restaurant {}",
            session.id,
            user_id,
            completion.result.id()
        );

        Ok(GameResult {
            session_id: session.id,
            selected_restaurant: completion.result,
            clicked_ad,
            completed_at: completion.completed_at,
        })
    }

    /// The clicked ad's restaurant replaces the pick; the pick stands if that
    /// restaurant is gone or inactive
    async fn resolve_override(&self, ad: &Advertisement, selected: RestaurantCandidate) -> RestaurantCandidate {
        match self.repository.restaurants.get_by_id(ad.restaurant_id).await {
            Ok(restaurant) if restaurant.is_active => RestaurantCandidate::unranked(restaurant),
            Ok(_) => {
                tracing::info!(
                    "Restaurant {} of ad {} is inactive, keeping selection {}",
                    ad.restaurant_id,
                    ad.id,
                    selected.id()
                );
                selected
            }
            Err(e) => {
                tracing::warn!(
                    "Could not resolve restaurant {} of ad {}, keeping selection {}: {}",
                    ad.restaurant_id,
                    ad.id,
                    selected.id(),
                    e
                );
                selected
            }
        }
    }

    async fn load_owned(&self, user_id: i64, session_id: Uuid) -> AppResult<GameSession> {
        let session = self
            .repository
            .game_sessions
            .get_by_id(session_id)
            .await?
            .ok_or_else(|| AppError::GameSessionNotFound(session_id.to_string()))?;

        if session.user_id != user_id {
            return Err(AppError::Forbidden(format!(
                "Game session {} belongs to another user",
                session_id
            )));
        }
        Ok(session)
    }
}

/// Bound `operation` by `limit`; dropping the future aborts any in-flight store call
async fn with_timeout<T, F>(limit: Duration, operation: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| AppError::Timeout(limit))?
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use crate::config::AdvertisementConfig;
    use crate::models::advertisement::NewAdvertisement;
    use crate::models::game::GameType;
    use crate::models::restaurant::NewRestaurant;
    use crate::repository::{MockAdvertisementStore, MockGameSessionStore};
    use crate::services::cooldown::{CooldownStore, MemoryCooldownStore};
    use crate::services::places::ExternalPlaceFinder;

    const STALL: Duration = Duration::from_secs(60);

    /// Cooldown backend that hangs on every call
    struct StalledCooldowns;

    #[async_trait]
    impl CooldownStore for StalledCooldowns {
        async fn try_acquire(&self, _key: &str, _window: Duration) -> AppResult<bool> {
            tokio::time::sleep(STALL).await;
            Ok(true)
        }

        async fn release(&self, _key: &str) -> AppResult<()> {
            tokio::time::sleep(STALL).await;
            Ok(())
        }
    }

    /// Place finder that hangs on every call
    struct StalledFinder;

    #[async_trait]
    impl ExternalPlaceFinder for StalledFinder {
        async fn search_nearby(&self, _origin: Coordinates, _radius_meters: u32) -> AppResult<Vec<NewRestaurant>> {
            tokio::time::sleep(STALL).await;
            Ok(Vec::new())
        }

        async fn details(&self, external_id: &str) -> AppResult<NewRestaurant> {
            tokio::time::sleep(STALL).await;
            Err(AppError::NotFound(external_id.to_string()))
        }
    }

    fn engine(repository: Repository) -> GameSessionEngine {
        engine_with(
            repository,
            Arc::new(MemoryCooldownStore::default()),
            None,
            GameConfig::default(),
        )
    }

    fn engine_with(
        repository: Repository,
        cooldowns: Arc<dyn CooldownStore>,
        finder: Option<Arc<dyn ExternalPlaceFinder>>,
        config: GameConfig,
    ) -> GameSessionEngine {
        GameSessionEngine::new(
            repository.clone(),
            CandidateAggregator::new(repository.clone(), finder, config.clone()),
            AdvertisementCoordinator::new(repository.clone(), cooldowns, AdvertisementConfig::default()),
            config,
        )
    }

    async fn seed_ad(repository: &Repository, restaurant_id: i64) -> Advertisement {
        let now = Utc::now();
        repository
            .advertisements
            .create(&NewAdvertisement {
                restaurant_id,
                title: "Sponsored".into(),
                content: "Free dessert".into(),
                image_url: None,
                target_url: None,
                start_date: now - ChronoDuration::hours(1),
                end_date: now + ChronoDuration::hours(1),
                priority: 5,
            })
            .await
            .unwrap()
    }

    fn live_ad(id: i64, restaurant_id: i64) -> Advertisement {
        let now = Utc::now();
        Advertisement {
            id,
            restaurant_id,
            title: "Sponsored".into(),
            content: "Free dessert".into(),
            image_url: None,
            target_url: None,
            is_active: true,
            start_date: now - ChronoDuration::hours(1),
            end_date: now + ChronoDuration::hours(1),
            priority: 5,
            view_count: 0,
            click_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seed_restaurant(repository: &Repository) -> i64 {
        repository
            .restaurants
            .create(&NewRestaurant {
                name: "Beef noodles".into(),
                latitude: 25.031,
                longitude: 121.56,
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    fn start_request() -> StartGameRequest {
        StartGameRequest {
            game_type: GameType::Roulette,
            latitude: 25.03,
            longitude: 121.56,
            radius: None,
        }
    }

    #[tokio::test]
    async fn view_recording_failure_does_not_fail_start() {
        let base = Repository::in_memory();
        seed_restaurant(&base).await;

        let mut ads = MockAdvertisementStore::new();
        ads.expect_list_active().returning(|_| Ok(vec![live_ad(1, 1)]));
        ads.expect_insert_view()
            .times(1)
            .returning(|_| Err(AppError::Internal("event table unavailable".into())));

        let repository = Repository {
            advertisements: Arc::new(ads),
            ..base
        };
        let session = engine(repository).start_game(7, start_request()).await.unwrap();

        assert_eq!(session.status, SessionStatus::Playing);
        assert_eq!(session.advertisements.len(), 1);
    }

    #[tokio::test]
    async fn radius_outside_policy_is_rejected() {
        let repository = Repository::in_memory();
        seed_restaurant(&repository).await;

        let request = StartGameRequest {
            radius: Some(50),
            ..start_request()
        };
        let result = engine(repository).start_game(7, request).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn id_collision_is_retried_once() {
        let base = Repository::in_memory();
        seed_restaurant(&base).await;

        let mut sessions = MockGameSessionStore::new();
        let mut attempts = 0;
        sessions.expect_create().times(2).returning(move |s| {
            attempts += 1;
            if attempts == 1 {
                Err(AppError::Conflict(format!("Game session {} already exists", s.id)))
            } else {
                Ok(())
            }
        });

        let repository = Repository {
            game_sessions: Arc::new(sessions),
            ..base
        };
        assert!(engine(repository).start_game(7, start_request()).await.is_ok());
    }

    #[tokio::test]
    async fn losing_completion_records_no_click() {
        let base = Repository::in_memory();
        let restaurant_id = seed_restaurant(&base).await;
        let restaurant = base.restaurants.get_by_id(restaurant_id).await.unwrap();

        let session = GameSession {
            id: Uuid::new_v4(),
            user_id: 7,
            game_type: GameType::Dice,
            status: SessionStatus::Playing,
            candidates: vec![RestaurantCandidate::new(restaurant, 111.0)],
            advertisements: vec![live_ad(4, restaurant_id)],
            result: None,
            clicked_ad_id: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        let session_id = session.id;

        let mut sessions = MockGameSessionStore::new();
        sessions
            .expect_get_by_id()
            .returning(move |_| Ok(Some(session.clone())));
        sessions.expect_update_if_playing().returning(|_, _| Ok(false));

        let mut ads = MockAdvertisementStore::new();
        ads.expect_insert_click().times(0);

        let repository = Repository {
            game_sessions: Arc::new(sessions),
            advertisements: Arc::new(ads),
            ..base
        };
        let result = engine(repository)
            .complete_game(
                7,
                CompleteGameRequest {
                    session_id,
                    selected_restaurant_id: restaurant_id,
                    clicked_ad_id: Some(4),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::GameAlreadyComplete(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_operation_times_out() {
        let limit = Duration::from_secs(10);
        let result = with_timeout(limit, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, AppError>(())
        })
        .await;
        assert!(matches!(result, Err(AppError::Timeout(d)) if d == limit));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_candidate_lookup_times_out_without_storing_a_session() {
        let repository = Repository::in_memory();
        let engine = engine_with(
            repository.clone(),
            Arc::new(MemoryCooldownStore::default()),
            Some(Arc::new(StalledFinder)),
            GameConfig::default(),
        );

        let result = engine.start_game(7, start_request()).await;
        assert!(matches!(result, Err(AppError::Timeout(d)) if d == Duration::from_secs(10)));
        assert!(engine.get_history(7, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_view_recording_still_returns_the_session() {
        let repository = Repository::in_memory();
        let restaurant_id = seed_restaurant(&repository).await;
        let ad = seed_ad(&repository, restaurant_id).await;
        let engine = engine_with(
            repository.clone(),
            Arc::new(StalledCooldowns),
            None,
            GameConfig::default(),
        );

        let session = engine.start_game(7, start_request()).await.unwrap();
        assert_eq!(session.advertisements.len(), 1);

        let history = engine.get_history(7, 10, 0).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].session.id, session.id);
        assert_eq!(repository.advertisements.get_by_id(ad.id).await.unwrap().view_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_click_recording_still_completes_the_round() {
        let repository = Repository::in_memory();
        let restaurant_id = seed_restaurant(&repository).await;
        let ad = seed_ad(&repository, restaurant_id).await;
        let engine = engine_with(
            repository.clone(),
            Arc::new(StalledCooldowns),
            None,
            GameConfig::default(),
        );

        let session = engine.start_game(7, start_request()).await.unwrap();
        let result = engine
            .complete_game(
                7,
                CompleteGameRequest {
                    session_id: session.id,
                    selected_restaurant_id: restaurant_id,
                    clicked_ad_id: Some(ad.id),
                },
            )
            .await
            .unwrap();
        assert_eq!(result.clicked_ad.map(|a| a.id), Some(ad.id));

        let stored = engine.get_session(7, session.id).await.unwrap();
        assert_eq!(stored.session.status, SessionStatus::Completed);
        assert_eq!(repository.advertisements.get_by_id(ad.id).await.unwrap().click_count, 0);
    }

    #[tokio::test]
    async fn zero_history_page_limit_still_returns_one_session() {
        let repository = Repository::in_memory();
        seed_restaurant(&repository).await;
        let config = GameConfig {
            history_page_limit: 0,
            ..GameConfig::default()
        };
        let engine = engine_with(
            repository,
            Arc::new(MemoryCooldownStore::default()),
            None,
            config,
        );

        engine.start_game(7, start_request()).await.unwrap();
        engine.start_game(7, start_request()).await.unwrap();
        assert_eq!(engine.get_history(7, 50, 0).await.unwrap().len(), 1);
    }
}
