//! Favorite restaurant model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A restaurant a user marked as favorite; unique per (user, restaurant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FavoriteRestaurant {
    pub id: i64,
    pub user_id: i64,
    pub restaurant_id: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Add favorite request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddFavorite {
    pub restaurant_id: i64,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}
