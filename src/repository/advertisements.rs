//! Advertisements repository: ads, view/click events and their aggregates

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::AdvertisementStore;
use crate::{
    error::{AppError, AppResult},
    models::advertisement::{
        AdClick, AdEventCounts, AdView, Advertisement, NewAdvertisement, StatsPeriod,
        UpdateAdvertisement,
    },
};

#[derive(Clone)]
pub struct AdvertisementsRepository {
    pool: Pool<Postgres>,
}

impl AdvertisementsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdvertisementStore for AdvertisementsRepository {
    async fn create(&self, data: &NewAdvertisement) -> AppResult<Advertisement> {
        let row = sqlx::query_as::<_, Advertisement>(
            r#"
            INSERT INTO advertisements (
                restaurant_id, title, content, image_url, target_url,
                is_active, start_date, end_date, priority
            )
            VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(data.restaurant_id)
        .bind(&data.title)
        .bind(&data.content)
        .bind(&data.image_url)
        .bind(&data.target_url)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.priority)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Advertisement> {
        sqlx::query_as::<_, Advertisement>("SELECT * FROM advertisements WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Advertisement with id {} not found", id)))
    }

    async fn list_active(&self, limit: usize) -> AppResult<Vec<Advertisement>> {
        let rows = sqlx::query_as::<_, Advertisement>(
            r#"
            SELECT * FROM advertisements
            WHERE is_active = TRUE
              AND start_date <= NOW()
              AND end_date > NOW()
            ORDER BY priority DESC, created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Advertisement>> {
        let rows = sqlx::query_as::<_, Advertisement>(
            "SELECT * FROM advertisements ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update(&self, id: i64, data: &UpdateAdvertisement) -> AppResult<Advertisement> {
        sqlx::query_as::<_, Advertisement>(
            r#"
            UPDATE advertisements SET
                restaurant_id = COALESCE($2, restaurant_id),
                title = COALESCE($3, title),
                content = COALESCE($4, content),
                image_url = COALESCE($5, image_url),
                target_url = COALESCE($6, target_url),
                is_active = COALESCE($7, is_active),
                start_date = COALESCE($8, start_date),
                end_date = COALESCE($9, end_date),
                priority = COALESCE($10, priority),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.restaurant_id)
        .bind(&data.title)
        .bind(&data.content)
        .bind(&data.image_url)
        .bind(&data.target_url)
        .bind(data.is_active)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.priority)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Advertisement with id {} not found", id)))
    }

    async fn insert_view(&self, view: &AdView) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Counter first: an unknown ad aborts before the event row is written
        let result = sqlx::query(
            "UPDATE advertisements SET view_count = view_count + 1 WHERE id = $1",
        )
        .bind(view.advertisement_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Advertisement with id {} not found",
                view.advertisement_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO ad_views (advertisement_id, user_id, game_session_id, viewed_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(view.advertisement_id)
        .bind(view.user_id)
        .bind(view.game_session_id)
        .bind(view.viewed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_click(&self, click: &AdClick) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Counter first: an unknown ad aborts before the event row is written
        let result = sqlx::query(
            "UPDATE advertisements SET click_count = click_count + 1 WHERE id = $1",
        )
        .bind(click.advertisement_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Advertisement with id {} not found",
                click.advertisement_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO ad_clicks (advertisement_id, user_id, game_session_id, clicked_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(click.advertisement_id)
        .bind(click.user_id)
        .bind(click.game_session_id)
        .bind(click.clicked_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn aggregate_stats(&self, ad_id: i64, period: StatsPeriod) -> AppResult<AdEventCounts> {
        let since = period.since(Utc::now());

        let counts = sqlx::query_as::<_, AdEventCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM ad_views
                  WHERE advertisement_id = $1 AND ($2::timestamptz IS NULL OR viewed_at >= $2)) AS view_count,
                (SELECT COUNT(*) FROM ad_clicks
                  WHERE advertisement_id = $1 AND ($2::timestamptz IS NULL OR clicked_at >= $2)) AS click_count,
                (SELECT COUNT(DISTINCT user_id) FROM ad_views
                  WHERE advertisement_id = $1 AND ($2::timestamptz IS NULL OR viewed_at >= $2)) AS unique_viewers,
                (SELECT COUNT(DISTINCT user_id) FROM ad_clicks
                  WHERE advertisement_id = $1 AND ($2::timestamptz IS NULL OR clicked_at >= $2)) AS unique_clickers
            "#,
        )
        .bind(ad_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}
