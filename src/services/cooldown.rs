//! Per-(user, ad) cooldown windows for view and click events

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::Client;
use tokio::time::Instant;

use crate::error::{AppError, AppResult};

/// Which event a cooldown slot guards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownKind {
    View,
    Click,
}

impl CooldownKind {
    pub fn key(&self, ad_id: i64, user_id: i64) -> String {
        let kind = match self {
            CooldownKind::View => "view",
            CooldownKind::Click => "click",
        };
        format!("cooldown:ad_{}:{}:{}", kind, ad_id, user_id)
    }
}

/// Shared store of cooldown slots.
///
/// `try_acquire` must be atomic: of two concurrent callers for the same key
/// inside one window, exactly one gets `true`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// Claim `key` for `window`. `false` when the key is still cooling down.
    async fn try_acquire(&self, key: &str, window: Duration) -> AppResult<bool>;

    /// Drop a claimed slot, e.g. when the guarded write failed
    async fn release(&self, key: &str) -> AppResult<()>;
}

/// Redis-backed cooldowns, shared across engine instances
#[derive(Clone)]
pub struct RedisCooldownStore {
    client: Client,
}

impl RedisCooldownStore {
    /// Open a client and check the server answers
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::ExternalService(format!("Failed to create Redis client: {}", e)))?;

        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::ExternalService(format!("Redis connection test failed: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl CooldownStore for RedisCooldownStore {
    async fn try_acquire(&self, key: &str, window: Duration) -> AppResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // SET NX EX answers OK when the key was free, nil otherwise
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(window.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("DEL").arg(key).query_async::<_, i64>(&mut conn).await?;
        Ok(())
    }
}

/// Expired slots are swept once the map grows past this many keys
const PRUNE_THRESHOLD: usize = 1024;

/// Process-local cooldowns on tokio's clock, so tests can pause and advance time
#[derive(Default)]
pub struct MemoryCooldownStore {
    slots: Mutex<HashMap<String, Instant>>,
}

#[async_trait]
impl CooldownStore for MemoryCooldownStore {
    async fn try_acquire(&self, key: &str, window: Duration) -> AppResult<bool> {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        if slots.len() >= PRUNE_THRESHOLD {
            slots.retain(|_, expires_at| *expires_at > now);
        }

        if let Some(expires_at) = slots.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }

        slots.insert(key.to_string(), now + window);
        Ok(true)
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        self.slots.lock().remove(key);
        Ok(())
    }
}
