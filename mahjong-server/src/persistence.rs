//! Concrete persistence adapters (`spec.md` §4.12, §6 "Persisted state
//! layout"). `mahjong-shared` only knows the `LiveStateStore` /
//! `GameRecordStore` seams; this module provides the fast in-process KV
//! adapter used for live state and a relational adapter (grounded on the
//! sea-orm lobby store in the wider example pack, since the teacher never
//! needed durable storage) for sealed game records.

use std::collections::HashMap;
use std::time::Duration;

use mahjong::game::GameState;
use mahjong::log::GameRecord;
pub use mahjong::persistence::{GameRecordStore as RecordStore, LiveStateStore, PersistenceError};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement, TransactionTrait};
use tokio::sync::RwLock;
use tracing::warn;

/// Fast write-through store for `game:<roomId>` live state. A real
/// deployment backs this with a keyed cache that supports TTL refresh; this
/// in-process map plays that role for a single server instance, which is
/// all the single-writer-per-room model needs (`spec.md` §4.12 "Live state
/// ... is owned by the room actor").
#[derive(Default)]
pub struct InMemoryLiveStore {
    games: RwLock<HashMap<String, GameState>>,
}

impl InMemoryLiveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LiveStateStore for InMemoryLiveStore {
    async fn put_game_state(&self, room_id: &str, state: &GameState) -> Result<(), PersistenceError> {
        self.games.write().await.insert(room_id.to_owned(), state.clone());
        Ok(())
    }

    async fn get_game_state(&self, room_id: &str) -> Result<Option<GameState>, PersistenceError> {
        Ok(self.games.read().await.get(room_id).cloned())
    }

    async fn delete_game_state(&self, room_id: &str) -> Result<(), PersistenceError> {
        self.games.write().await.remove(room_id);
        Ok(())
    }
}

/// Wraps an inner [`LiveStateStore`] with bounded exponential backoff, per
/// `spec.md` §4.12: live-state write failures retry before the room is
/// tagged `DEGRADED`. Reads and deletes pass straight through — only the
/// write path is blocking-critical enough to retry.
pub struct RetryingLiveStore<S> {
    inner: S,
    max_attempts: u32,
    base_delay: Duration,
}

impl<S: LiveStateStore> RetryingLiveStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, max_attempts: 4, base_delay: Duration::from_millis(25) }
    }
}

#[async_trait::async_trait]
impl<S: LiveStateStore> LiveStateStore for RetryingLiveStore<S> {
    async fn put_game_state(&self, room_id: &str, state: &GameState) -> Result<(), PersistenceError> {
        let mut attempt = 0;
        loop {
            match self.inner.put_game_state(room_id, state).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt + 1 < self.max_attempts => {
                    attempt += 1;
                    warn!(room_id, attempt, %err, "live-state write failed, retrying with backoff");
                    tokio::time::sleep(self.base_delay * 2u32.pow(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get_game_state(&self, room_id: &str) -> Result<Option<GameState>, PersistenceError> {
        self.inner.get_game_state(room_id).await
    }

    async fn delete_game_state(&self, room_id: &str) -> Result<(), PersistenceError> {
        self.inner.delete_game_state(room_id).await
    }
}

/// Dev/test record store: holds sealed records in memory. Never loses a
/// write, but nothing survives a restart — swap for [`SeaOrmRecordStore`]
/// in a real deployment.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Vec<GameRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<GameRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn put_record(&self, record: &GameRecord) -> Result<(), PersistenceError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }
}

/// Write-once relational store for `GameRecord` / `GamePlayerRecord`
/// (`spec.md` §6). Modeled on the lobby storage seam in the wider example
/// pack's sea-orm-backed poker ledger: issue plain parameterized SQL
/// against the connection rather than generated entities, since this
/// adapter only ever inserts.
pub struct SeaOrmRecordStore {
    connection: DatabaseConnection,
}

impl SeaOrmRecordStore {
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    /// Creates the two tables this adapter writes to, if they don't already
    /// exist. Intended for local/dev bring-up; a real deployment manages
    /// schema through migrations instead.
    pub async fn ensure_schema(&self) -> Result<(), sea_orm::DbErr> {
        self.connection
            .execute(Statement::from_string(
                DbBackend::Postgres,
                "CREATE TABLE IF NOT EXISTS game_records (
                    game_id BIGINT PRIMARY KEY,
                    room_id TEXT NOT NULL,
                    seed BIGINT NOT NULL,
                    config JSONB NOT NULL,
                    actions JSONB NOT NULL,
                    final_hands JSONB NOT NULL,
                    settlement JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )"
                .to_owned(),
            ))
            .await?;

        self.connection
            .execute(Statement::from_string(
                DbBackend::Postgres,
                "CREATE TABLE IF NOT EXISTS game_player_records (
                    game_id BIGINT NOT NULL,
                    seat SMALLINT NOT NULL,
                    score BIGINT NOT NULL,
                    PRIMARY KEY (game_id, seat)
                )"
                .to_owned(),
            ))
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn put_record(&self, record: &GameRecord) -> Result<(), PersistenceError> {
        self.insert(record).await.map_err(|err| PersistenceError(err.to_string()))
    }
}

impl SeaOrmRecordStore {
    async fn insert(&self, record: &GameRecord) -> Result<(), sea_orm::DbErr> {
        let txn = self.connection.begin().await?;

        let config_json = serde_json::to_value(&record.config).unwrap_or_default();
        let actions_json = serde_json::to_value(&record.actions).unwrap_or_default();
        let hands_json = serde_json::to_value(&record.final_hands).unwrap_or_default();
        let settlement_json = serde_json::to_value(&record.settlement).unwrap_or_default();

        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "INSERT INTO game_records (game_id, room_id, seed, config, actions, final_hands, settlement)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (game_id) DO NOTHING",
            [
                (record.game_id as i64).into(),
                record.room_id.clone().into(),
                (record.seed as i64).into(),
                config_json.into(),
                actions_json.into(),
                hands_json.into(),
                settlement_json.into(),
            ],
        ))
        .await?;

        for (&seat, &score) in &record.settlement {
            txn.execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "INSERT INTO game_player_records (game_id, seat, score)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (game_id, seat) DO NOTHING",
                [(record.game_id as i64).into(), (seat as i16).into(), score.into()],
            ))
            .await?;
        }

        txn.commit().await
    }
}
