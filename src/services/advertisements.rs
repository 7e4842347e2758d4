//! Advertisement coordination: round selection, view/click bookkeeping, statistics

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AdvertisementConfig,
    error::{AppError, AppResult},
    models::advertisement::{
        AdClick, AdStatistics, AdView, Advertisement, NewAdvertisement, StatsPeriod,
        UpdateAdvertisement,
    },
    repository::Repository,
    services::cooldown::{CooldownKind, CooldownStore},
};

#[derive(Clone)]
pub struct AdvertisementCoordinator {
    repository: Repository,
    cooldowns: Arc<dyn CooldownStore>,
    config: AdvertisementConfig,
}

impl AdvertisementCoordinator {
    pub fn new(
        repository: Repository,
        cooldowns: Arc<dyn CooldownStore>,
        config: AdvertisementConfig,
    ) -> Self {
        Self {
            repository,
            cooldowns,
            config,
        }
    }

    /// Eligible ads for a round, highest priority first, at most `max_ads`
    pub async fn select_for_round(&self, max_ads: usize) -> AppResult<Vec<Advertisement>> {
        if max_ads == 0 {
            return Ok(Vec::new());
        }
        let ads = self.repository.advertisements.list_active(max_ads).await?;
        Ok(rank_for_round(ads, Utc::now(), max_ads))
    }

    /// Record an impression.
    ///
    /// Returns `false` without writing anything when the same user saw the
    /// same ad within the view cooldown.
    pub async fn record_view(&self, ad_id: i64, user_id: i64, session_id: Uuid) -> AppResult<bool> {
        let key = CooldownKind::View.key(ad_id, user_id);
        if !self.claim(&key, self.config.view_cooldown()).await? {
            tracing::debug!("View of ad {} by user {} suppressed by cooldown", ad_id, user_id);
            return Ok(false);
        }

        let view = AdView {
            advertisement_id: ad_id,
            user_id,
            game_session_id: session_id,
            viewed_at: Utc::now(),
        };
        if let Err(e) = self.repository.advertisements.insert_view(&view).await {
            self.unclaim(&key).await;
            return Err(e);
        }
        Ok(true)
    }

    /// Record a click. Same contract as [`Self::record_view`] with the click cooldown.
    pub async fn record_click(&self, ad_id: i64, user_id: i64, session_id: Uuid) -> AppResult<bool> {
        let key = CooldownKind::Click.key(ad_id, user_id);
        if !self.claim(&key, self.config.click_cooldown()).await? {
            tracing::debug!("Click on ad {} by user {} suppressed by cooldown", ad_id, user_id);
            return Ok(false);
        }

        let click = AdClick {
            advertisement_id: ad_id,
            user_id,
            game_session_id: session_id,
            clicked_at: Utc::now(),
        };
        if let Err(e) = self.repository.advertisements.insert_click(&click).await {
            self.unclaim(&key).await;
            return Err(e);
        }

        tracing::info!("Ad {} clicked by user {}", ad_id, user_id);
        Ok(true)
    }

    /// View/click totals, distinct users and CTR over `period`
    /// (`day`, `week`, `month` or `all`)
    pub async fn statistics(&self, ad_id: i64, period: &str) -> AppResult<AdStatistics> {
        let period: StatsPeriod = period.parse()?;

        // Unknown ads are reported, not silently zeroed
        self.repository.advertisements.get_by_id(ad_id).await?;

        let counts = self.repository.advertisements.aggregate_stats(ad_id, period).await?;
        let stats = AdStatistics::from_counts(ad_id, period, counts);

        tracing::info!(
            "Statistics for ad {} ({}): {} views, {} clicks",
            ad_id,
            period,
            stats.view_count,
            stats.click_count
        );
        Ok(stats)
    }

    /// Create an ad; it starts active with zeroed counters
    pub async fn create_ad(&self, data: NewAdvertisement) -> AppResult<Advertisement> {
        data.validate()?;
        self.repository.restaurants.get_by_id(data.restaurant_id).await?;

        let ad = self.repository.advertisements.create(&data).await?;
        tracing::info!("Advertisement {} created: {}", ad.id, ad.title);
        Ok(ad)
    }

    pub async fn update_ad(&self, id: i64, data: UpdateAdvertisement) -> AppResult<Advertisement> {
        data.validate()?;

        let existing = self.repository.advertisements.get_by_id(id).await?;
        let start = data.start_date.unwrap_or(existing.start_date);
        let end = data.end_date.unwrap_or(existing.end_date);
        if end <= start {
            return Err(AppError::InvalidInput(
                "end_date must be after start_date".to_string(),
            ));
        }
        if let Some(restaurant_id) = data.restaurant_id {
            self.repository.restaurants.get_by_id(restaurant_id).await?;
        }

        self.repository.advertisements.update(id, &data).await
    }

    /// Soft delete: the ad stays for statistics but is never selected again
    pub async fn deactivate_ad(&self, id: i64) -> AppResult<Advertisement> {
        let update = UpdateAdvertisement {
            is_active: Some(false),
            ..Default::default()
        };
        let ad = self.repository.advertisements.update(id, &update).await?;
        tracing::info!("Advertisement {} deactivated", id);
        Ok(ad)
    }

    pub async fn get_ad(&self, id: i64) -> AppResult<Advertisement> {
        self.repository.advertisements.get_by_id(id).await
    }

    /// All ads including inactive ones, newest first
    pub async fn list_ads(&self, limit: i64, offset: i64) -> AppResult<Vec<Advertisement>> {
        self.repository.advertisements.list_all(limit, offset).await
    }

    async fn claim(&self, key: &str, window: Duration) -> AppResult<bool> {
        self.cooldowns.try_acquire(key, window).await
    }

    /// Give the slot back so a failed write does not suppress the next attempt
    async fn unclaim(&self, key: &str) {
        if let Err(e) = self.cooldowns.release(key).await {
            tracing::warn!("Failed to release cooldown {}: {}", key, e);
        }
    }
}

/// Keep ads eligible at `now`, order by priority then recency, cap at `max_ads`
pub fn rank_for_round(
    mut ads: Vec<Advertisement>,
    now: DateTime<Utc>,
    max_ads: usize,
) -> Vec<Advertisement> {
    ads.retain(|ad| ad.is_eligible(now));
    ads.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    });
    ads.truncate(max_ads);
    ads
}
