//! Game sessions repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, Pool, Postgres};
use uuid::Uuid;

use super::GameSessionStore;
use crate::{
    error::{AppError, AppResult},
    models::{
        advertisement::Advertisement,
        game::{GameSession, SessionCompletion, SessionStatus},
        restaurant::RestaurantCandidate,
    },
};

/// Row shape of `game_sessions`; snapshots live in JSONB columns
#[derive(FromRow)]
struct GameSessionRow {
    id: Uuid,
    user_id: i64,
    game_type: String,
    status: String,
    candidates: Json<Vec<RestaurantCandidate>>,
    advertisements: Json<Vec<Advertisement>>,
    result: Option<Json<RestaurantCandidate>>,
    clicked_ad_id: Option<i64>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<GameSessionRow> for GameSession {
    type Error = AppError;

    fn try_from(row: GameSessionRow) -> Result<Self, Self::Error> {
        Ok(GameSession {
            id: row.id,
            user_id: row.user_id,
            game_type: row
                .game_type
                .parse()
                .map_err(|_| AppError::Internal(format!("Corrupt game_type '{}'", row.game_type)))?,
            status: row.status.parse()?,
            candidates: row.candidates.0,
            advertisements: row.advertisements.0,
            result: row.result.map(|r| r.0),
            clicked_ad_id: row.clicked_ad_id,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Clone)]
pub struct GameSessionsRepository {
    pool: Pool<Postgres>,
}

impl GameSessionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GameSessionStore for GameSessionsRepository {
    async fn create(&self, session: &GameSession) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO game_sessions (
                id, user_id, game_type, status, candidates, advertisements,
                result, clicked_ad_id, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.game_type.as_str())
        .bind(session.status.as_str())
        .bind(Json(&session.candidates))
        .bind(Json(&session.advertisements))
        .bind(session.result.as_ref().map(Json))
        .bind(session.clicked_ad_id)
        .bind(session.started_at)
        .bind(session.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::from(e).or_conflict(|| format!("Game session {} already exists", session.id))
        })?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<GameSession>> {
        let row = sqlx::query_as::<_, GameSessionRow>("SELECT * FROM game_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(GameSession::try_from).transpose()
    }

    async fn update_if_playing(&self, id: Uuid, completion: &SessionCompletion) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE game_sessions
            SET status = $2, result = $3, clicked_ad_id = $4, completed_at = $5
            WHERE id = $1 AND status = $6
            "#,
        )
        .bind(id)
        .bind(SessionStatus::Completed.as_str())
        .bind(Json(&completion.result))
        .bind(completion.clicked_ad_id)
        .bind(completion.completed_at)
        .bind(SessionStatus::Playing.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> AppResult<Vec<GameSession>> {
        let rows = sqlx::query_as::<_, GameSessionRow>(
            r#"
            SELECT * FROM game_sessions
            WHERE user_id = $1
            ORDER BY started_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GameSession::try_from).collect()
    }
}
