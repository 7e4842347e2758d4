//! Game session model and related types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{advertisement::Advertisement, restaurant::RestaurantCandidate};
use crate::error::AppError;

/// Game played to pick a restaurant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Roulette,
    Dice,
    Tarot,
    Puzzle,
    Map,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Roulette => "roulette",
            GameType::Dice => "dice",
            GameType::Tarot => "tarot",
            GameType::Puzzle => "puzzle",
            GameType::Map => "map",
        }
    }
}

impl FromStr for GameType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roulette" => Ok(GameType::Roulette),
            "dice" => Ok(GameType::Dice),
            "tarot" => Ok(GameType::Tarot),
            "puzzle" => Ok(GameType::Puzzle),
            "map" => Ok(GameType::Map),
            other => Err(AppError::InvalidInput(format!("Unknown game type '{}'", other))),
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle. `Pending` is reserved: sessions are created in `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Playing,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Playing => "playing",
            SessionStatus::Completed => "completed",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "playing" => Ok(SessionStatus::Playing),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(AppError::Internal(format!("Unknown session status '{}'", other))),
        }
    }
}

/// One round of a game, from start to completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: Uuid,
    pub user_id: i64,
    pub game_type: GameType,
    pub status: SessionStatus,
    /// Snapshot fixed at creation
    pub candidates: Vec<RestaurantCandidate>,
    /// Snapshot fixed at creation
    pub advertisements: Vec<Advertisement>,
    pub result: Option<RestaurantCandidate>,
    pub clicked_ad_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GameSession {
    /// Still `playing` after `timeout`. Derived on read, never stored.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.status == SessionStatus::Playing && now - self.started_at > timeout
    }

    pub fn candidate(&self, restaurant_id: i64) -> Option<&RestaurantCandidate> {
        self.candidates.iter().find(|c| c.id() == restaurant_id)
    }

    pub fn advertisement(&self, ad_id: i64) -> Option<&Advertisement> {
        self.advertisements.iter().find(|a| a.id == ad_id)
    }
}

/// Fields written by the single `playing -> completed` transition
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCompletion {
    pub result: RestaurantCandidate,
    pub clicked_ad_id: Option<i64>,
    pub completed_at: DateTime<Utc>,
}

/// Start game request
#[derive(Debug, Clone, Deserialize)]
pub struct StartGameRequest {
    pub game_type: GameType,
    pub latitude: f64,
    pub longitude: f64,
    /// Search radius in meters; the configured default applies when absent
    pub radius: Option<u32>,
}

/// Complete game request
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteGameRequest {
    pub session_id: Uuid,
    pub selected_restaurant_id: i64,
    pub clicked_ad_id: Option<i64>,
}

/// Outcome of a completed round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameResult {
    pub session_id: Uuid,
    pub selected_restaurant: RestaurantCandidate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clicked_ad: Option<Advertisement>,
    pub completed_at: DateTime<Utc>,
}

/// Session as returned by read paths, with the derived expiry flag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: GameSession,
    pub expired: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(status: SessionStatus, started_at: DateTime<Utc>) -> GameSession {
        GameSession {
            id: Uuid::new_v4(),
            user_id: 7,
            game_type: GameType::Dice,
            status,
            candidates: Vec::new(),
            advertisements: Vec::new(),
            result: None,
            clicked_ad_id: None,
            started_at,
            completed_at: None,
        }
    }

    #[test]
    fn game_type_round_trips_through_its_name() {
        for t in [GameType::Roulette, GameType::Dice, GameType::Tarot, GameType::Puzzle, GameType::Map] {
            assert_eq!(t.as_str().parse::<GameType>().unwrap(), t);
        }
        assert!(matches!("poker".parse::<GameType>(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn only_stale_playing_sessions_expire() {
        let now = Utc::now();
        let timeout = Duration::minutes(30);
        assert!(session(SessionStatus::Playing, now - Duration::minutes(31)).is_expired(now, timeout));
        assert!(!session(SessionStatus::Playing, now - Duration::minutes(5)).is_expired(now, timeout));
        assert!(!session(SessionStatus::Completed, now - Duration::hours(5)).is_expired(now, timeout));
    }
}
