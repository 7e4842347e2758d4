//! Data models for Food Roulette

pub mod advertisement;
pub mod favorite;
pub mod game;
pub mod restaurant;

// Re-export commonly used types
pub use advertisement::{AdClick, AdStatistics, AdView, Advertisement, StatsPeriod};
pub use favorite::FavoriteRestaurant;
pub use game::{GameResult, GameSession, GameType, SessionStatus};
pub use restaurant::{Restaurant, RestaurantCandidate};
