//! Durable leaderboard of retired players
//!
//! The repository is the only component allowed to outlive the process:
//! retirement stats go into a relational store and come back sorted. The
//! trait keeps the application independent of the concrete store; the
//! shipped implementation talks to Postgres through a connection pool.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("leaderboard store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// One leaderboard entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    pub name: String,
    pub score: u32,
    #[serde(skip)]
    pub play_time: Duration,
}

pub type RepoFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RecordsError>> + Send + 'a>>;

/// Durable, ordered store of retired players
///
/// `get_records` returns entries in the canonical leaderboard order:
/// score descending, then play time ascending, then name ascending.
pub trait RecordsRepository: Send + Sync {
    fn add_record(&self, record: PlayerRecord) -> RepoFuture<'_, ()>;
    fn get_records(&self, start: u64, max_items: u64) -> RepoFuture<'_, Vec<PlayerRecord>>;
}

/// Postgres-backed leaderboard
pub struct PgRecordsRepository {
    pool: PgPool,
}

impl PgRecordsRepository {
    /// Connects a pool of the given size and creates the schema if needed
    pub async fn connect(db_url: &str, pool_size: u32) -> Result<Self, RecordsError> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(db_url)
            .await?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    async fn ensure_schema(&self) -> Result<(), RecordsError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS retired_players (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                score INTEGER NOT NULL,
                play_time_ms BIGINT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS retired_players_score_time_name_idx
                ON retired_players (score DESC, play_time_ms ASC, name ASC)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl RecordsRepository for PgRecordsRepository {
    fn add_record(&self, record: PlayerRecord) -> RepoFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO retired_players (id, name, score, play_time_ms)
                    VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(&record.name)
            .bind(record.score as i32)
            .bind(record.play_time.as_millis() as i64)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn get_records(&self, start: u64, max_items: u64) -> RepoFuture<'_, Vec<PlayerRecord>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;
            sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
            let rows = sqlx::query(
                "SELECT name, score, play_time_ms FROM retired_players
                    ORDER BY score DESC, play_time_ms ASC, name ASC
                    OFFSET $1 LIMIT $2",
            )
            .bind(start as i64)
            .bind(max_items as i64)
            .fetch_all(&mut *tx)
            .await?;
            tx.commit().await?;

            Ok(rows
                .into_iter()
                .map(|row| PlayerRecord {
                    name: row.get("name"),
                    score: row.get::<i32, _>("score").max(0) as u32,
                    play_time: Duration::from_millis(row.get::<i64, _>("play_time_ms").max(0) as u64),
                })
                .collect())
        })
    }
}
