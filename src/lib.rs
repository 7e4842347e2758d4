//! Food Roulette game engine
//!
//! Picks a restaurant through a game round: candidates come from a proximity
//! search merged with the player's favorites, sponsored ads are shown and
//! tracked, and a clicked ad can redirect the outcome.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

pub mod config;
pub mod error;
pub mod geo;
pub mod models;
pub mod repository;
pub mod services;
pub mod telemetry;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use repository::Repository;
use services::{
    auth::AuthService,
    cooldown::{CooldownStore, MemoryCooldownStore, RedisCooldownStore},
    places::{ExternalPlaceFinder, GooglePlacesFinder},
    Services,
};

/// Application state shared with the transport layer
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<Services>,
}

impl AppState {
    /// Connect Postgres and Redis, run migrations and wire the services
    pub async fn bootstrap(config: AppConfig, auth: Option<Arc<dyn AuthService>>) -> anyhow::Result<Self> {
        tracing::info!("Starting Food Roulette engine v{}", env!("CARGO_PKG_VERSION"));

        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect(&config.database.url)
            .await?;
        tracing::info!("Connected to database");

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations completed");

        let cooldowns: Arc<dyn CooldownStore> = Arc::new(RedisCooldownStore::new(&config.redis.url).await?);
        tracing::info!("Connected to Redis");

        let finder = GooglePlacesFinder::from_config(&config.places)?
            .map(|f| Arc::new(f) as Arc<dyn ExternalPlaceFinder>);
        if finder.is_none() {
            tracing::warn!("No Google Places API key configured, backfill disabled");
        }

        let services = Services::new(Repository::new(pool), &config, cooldowns, finder, auth);
        Ok(Self {
            config: Arc::new(config),
            services: Arc::new(services),
        })
    }

    /// Fully in-process state with no external dependencies
    pub fn in_memory(config: AppConfig, finder: Option<Arc<dyn ExternalPlaceFinder>>) -> Self {
        let services = Services::new(
            Repository::in_memory(),
            &config,
            Arc::new(MemoryCooldownStore::default()),
            finder,
            None,
        );
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
