//! Advertisement model, view/click events and statistics

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::AppError;

/// Sponsored advertisement affiliated with a restaurant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Advertisement {
    pub id: i64,
    pub restaurant_id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub target_url: Option<String>,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    /// Exclusive end of the display window
    pub end_date: DateTime<Utc>,
    /// Higher is shown first
    pub priority: i32,
    pub view_count: i64,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Advertisement {
    /// Active and `now` inside `[start_date, end_date)`
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && now < self.end_date
    }
}

/// Create advertisement request
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_window"))]
pub struct NewAdvertisement {
    pub restaurant_id: i64,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub content: String,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(url)]
    pub target_url: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[validate(range(min = 1, max = 10))]
    pub priority: i32,
}

fn validate_window(ad: &NewAdvertisement) -> Result<(), ValidationError> {
    if ad.end_date <= ad.start_date {
        return Err(ValidationError::new("end_date_before_start_date"));
    }
    Ok(())
}

/// Partial advertisement update
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAdvertisement {
    pub restaurant_id: Option<i64>,
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub content: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(url)]
    pub target_url: Option<String>,
    pub is_active: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 10))]
    pub priority: Option<i32>,
}

/// Append-only impression event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AdView {
    pub advertisement_id: i64,
    pub user_id: i64,
    pub game_session_id: Uuid,
    pub viewed_at: DateTime<Utc>,
}

/// Append-only click event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AdClick {
    pub advertisement_id: i64,
    pub user_id: i64,
    pub game_session_id: Uuid,
    pub clicked_at: DateTime<Utc>,
}

/// Statistics window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Day,
    Week,
    Month,
    All,
}

impl StatsPeriod {
    /// Lower bound of the window, `None` for all time
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .unwrap_or(now);
        match self {
            StatsPeriod::Day => Some(midnight),
            StatsPeriod::Week => Some(midnight - Duration::days(7)),
            StatsPeriod::Month => Some(midnight - Duration::days(30)),
            StatsPeriod::All => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatsPeriod::Day => "day",
            StatsPeriod::Week => "week",
            StatsPeriod::Month => "month",
            StatsPeriod::All => "all",
        }
    }
}

impl FromStr for StatsPeriod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(StatsPeriod::Day),
            "week" => Ok(StatsPeriod::Week),
            "month" => Ok(StatsPeriod::Month),
            "all" => Ok(StatsPeriod::All),
            other => Err(AppError::InvalidPeriod(other.to_string())),
        }
    }
}

impl fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw event counts aggregated by the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct AdEventCounts {
    pub view_count: i64,
    pub click_count: i64,
    pub unique_viewers: i64,
    pub unique_clickers: i64,
}

/// Derived statistics for one advertisement over a period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdStatistics {
    pub advertisement_id: i64,
    pub view_count: i64,
    pub click_count: i64,
    pub unique_viewers: i64,
    pub unique_clickers: i64,
    /// Click-through rate in percent
    pub ctr: f64,
    pub period: StatsPeriod,
}

impl AdStatistics {
    pub fn from_counts(advertisement_id: i64, period: StatsPeriod, counts: AdEventCounts) -> Self {
        Self {
            advertisement_id,
            view_count: counts.view_count,
            click_count: counts.click_count,
            unique_viewers: counts.unique_viewers,
            unique_clickers: counts.unique_clickers,
            ctr: click_through_rate(counts.click_count, counts.view_count),
            period,
        }
    }
}

/// clicks / views * 100, `0.0` when there are no views
pub fn click_through_rate(clicks: i64, views: i64) -> f64 {
    if views <= 0 {
        return 0.0;
    }
    clicks as f64 / views as f64 * 100.0
}
