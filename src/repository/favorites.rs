//! Favorites repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::FavoriteStore;
use crate::{
    error::{AppError, AppResult},
    models::favorite::{AddFavorite, FavoriteRestaurant},
};

#[derive(Clone)]
pub struct FavoritesRepository {
    pool: Pool<Postgres>,
}

impl FavoritesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FavoriteStore for FavoritesRepository {
    async fn add(&self, user_id: i64, data: &AddFavorite) -> AppResult<FavoriteRestaurant> {
        let row = sqlx::query_as::<_, FavoriteRestaurant>(
            r#"
            INSERT INTO favorite_restaurants (user_id, restaurant_id, notes)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, restaurant_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(data.restaurant_id)
        .bind(&data.notes)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| {
            AppError::Conflict(format!(
                "Restaurant {} is already in the favorites of user {}",
                data.restaurant_id, user_id
            ))
        })
    }

    async fn remove(&self, user_id: i64, restaurant_id: i64) -> AppResult<()> {
        let result = sqlx::query(
            "DELETE FROM favorite_restaurants WHERE user_id = $1 AND restaurant_id = $2",
        )
        .bind(user_id)
        .bind(restaurant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Restaurant {} is not a favorite of user {}",
                restaurant_id, user_id
            )));
        }
        Ok(())
    }

    async fn list_by_user(&self, user_id: i64) -> AppResult<Vec<FavoriteRestaurant>> {
        let rows = sqlx::query_as::<_, FavoriteRestaurant>(
            r#"
            SELECT fr.*
            FROM favorite_restaurants fr
            JOIN restaurants r ON fr.restaurant_id = r.id
            WHERE fr.user_id = $1 AND r.is_active = TRUE
            ORDER BY fr.created_at DESC, fr.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn exists(&self, user_id: i64, restaurant_id: i64) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM favorite_restaurants WHERE user_id = $1 AND restaurant_id = $2)",
        )
        .bind(user_id)
        .bind(restaurant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
