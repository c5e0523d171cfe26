//! Persistence seam (`spec.md` §4.12, §6 "Persisted state layout"). The
//! core crate only depends on these traits; concrete KV/relational adapters
//! live in the server crate.

use crate::game::GameState;
use crate::log::GameRecord;

#[derive(Debug, Clone, thiserror::Error)]
#[error("persistence backend unavailable: {0}")]
pub struct PersistenceError(pub String);

/// Write-through store for live state: `game:<roomId>` → serialized
/// `GameState`. Failures here must not lose a game — callers retry with
/// backoff and otherwise keep playing in memory, tagging the room
/// `DEGRADED` (`spec.md` §4.12).
#[async_trait::async_trait]
pub trait LiveStateStore: Send + Sync {
    async fn put_game_state(&self, room_id: &str, state: &GameState) -> Result<(), PersistenceError>;
    async fn get_game_state(&self, room_id: &str) -> Result<Option<GameState>, PersistenceError>;
    async fn delete_game_state(&self, room_id: &str) -> Result<(), PersistenceError>;
}

/// Write-once store for completed games. Unlike [`LiveStateStore`], failure
/// here blocks the `FINISHED` transition (`spec.md` §4.12) until it
/// succeeds or an operator intervenes.
#[async_trait::async_trait]
pub trait GameRecordStore: Send + Sync {
    async fn put_record(&self, record: &GameRecord) -> Result<(), PersistenceError>;
}
