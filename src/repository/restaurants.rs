//! Restaurants repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::RestaurantStore;
use crate::{
    error::{AppError, AppResult},
    geo::{self, BoundingBox, Coordinates},
    models::restaurant::{NearbyFilter, NewRestaurant, Restaurant, RestaurantCandidate, UpdateRestaurant},
};

#[derive(Clone)]
pub struct RestaurantsRepository {
    pool: Pool<Postgres>,
}

impl RestaurantsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RestaurantStore for RestaurantsRepository {
    async fn create(&self, restaurant: &NewRestaurant) -> AppResult<Restaurant> {
        let row = sqlx::query_as::<_, Restaurant>(
            r#"
            INSERT INTO restaurants (
                name, address, latitude, longitude, phone, rating, price_level,
                cuisine, is_active, external_id, image_url, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&restaurant.name)
        .bind(&restaurant.address)
        .bind(restaurant.latitude)
        .bind(restaurant.longitude)
        .bind(&restaurant.phone)
        .bind(restaurant.rating)
        .bind(restaurant.price_level)
        .bind(&restaurant.cuisine)
        .bind(&restaurant.external_id)
        .bind(&restaurant.image_url)
        .bind(&restaurant.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::from(e).or_conflict(|| {
                format!(
                    "Restaurant with external id {} already exists",
                    restaurant.external_id.as_deref().unwrap_or_default()
                )
            })
        })?;

        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Restaurant> {
        sqlx::query_as::<_, Restaurant>("SELECT * FROM restaurants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Restaurant with id {} not found", id)))
    }

    async fn search_nearby(
        &self,
        origin: Coordinates,
        radius_meters: f64,
        filter: &NearbyFilter,
        limit: usize,
    ) -> AppResult<Vec<RestaurantCandidate>> {
        // Coarse box in SQL, exact great-circle distance in Rust
        let bbox = BoundingBox::around(origin, radius_meters);

        let mut conditions = vec![
            "is_active = TRUE".to_string(),
            "latitude BETWEEN $1 AND $2".to_string(),
            "longitude BETWEEN $3 AND $4".to_string(),
        ];
        let mut idx = 5;

        if filter.cuisine.is_some() {
            conditions.push(format!("cuisine ILIKE ${}", idx));
            idx += 1;
        }
        if filter.min_rating.is_some() {
            conditions.push(format!("rating >= ${}", idx));
        }

        let query = format!("SELECT * FROM restaurants WHERE {}", conditions.join(" AND "));

        let mut builder = sqlx::query_as::<_, Restaurant>(&query)
            .bind(bbox.min_latitude)
            .bind(bbox.max_latitude)
            .bind(bbox.min_longitude)
            .bind(bbox.max_longitude);
        if let Some(ref cuisine) = filter.cuisine {
            builder = builder.bind(format!("%{}%", cuisine));
        }
        if let Some(min_rating) = filter.min_rating {
            builder = builder.bind(min_rating);
        }

        let rows = builder.fetch_all(&self.pool).await?;

        let mut ranked = geo::rank_within_radius(origin, radius_meters, rows);
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn list_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Restaurant>> {
        let rows = sqlx::query_as::<_, Restaurant>(
            "SELECT * FROM restaurants ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update(&self, id: i64, data: &UpdateRestaurant) -> AppResult<Restaurant> {
        sqlx::query_as::<_, Restaurant>(
            r#"
            UPDATE restaurants SET
                name = COALESCE($2, name),
                address = COALESCE($3, address),
                phone = COALESCE($4, phone),
                rating = COALESCE($5, rating),
                price_level = COALESCE($6, price_level),
                cuisine = COALESCE($7, cuisine),
                is_active = COALESCE($8, is_active),
                image_url = COALESCE($9, image_url),
                description = COALESCE($10, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.address)
        .bind(&data.phone)
        .bind(data.rating)
        .bind(data.price_level)
        .bind(&data.cuisine)
        .bind(data.is_active)
        .bind(&data.image_url)
        .bind(&data.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Restaurant with id {} not found", id)))
    }

    async fn upsert_external(&self, restaurant: &NewRestaurant) -> AppResult<Restaurant> {
        let external_id = restaurant
            .external_id
            .as_deref()
            .ok_or_else(|| AppError::InvalidInput("external_id is required for upsert".to_string()))?;

        // Empty incoming strings never clobber known values; is_active stays local
        let row = sqlx::query_as::<_, Restaurant>(
            r#"
            INSERT INTO restaurants (
                name, address, latitude, longitude, phone, rating, price_level,
                cuisine, is_active, external_id, image_url, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10, $11)
            ON CONFLICT (external_id) DO UPDATE SET
                name = COALESCE(NULLIF(EXCLUDED.name, ''), restaurants.name),
                address = COALESCE(NULLIF(EXCLUDED.address, ''), restaurants.address),
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                phone = COALESCE(NULLIF(EXCLUDED.phone, ''), restaurants.phone),
                rating = COALESCE(EXCLUDED.rating, restaurants.rating),
                price_level = COALESCE(EXCLUDED.price_level, restaurants.price_level),
                cuisine = COALESCE(NULLIF(EXCLUDED.cuisine, ''), restaurants.cuisine),
                image_url = COALESCE(NULLIF(EXCLUDED.image_url, ''), restaurants.image_url),
                description = COALESCE(NULLIF(EXCLUDED.description, ''), restaurants.description),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&restaurant.name)
        .bind(&restaurant.address)
        .bind(restaurant.latitude)
        .bind(restaurant.longitude)
        .bind(&restaurant.phone)
        .bind(restaurant.rating)
        .bind(restaurant.price_level)
        .bind(&restaurant.cuisine)
        .bind(external_id)
        .bind(&restaurant.image_url)
        .bind(&restaurant.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}
