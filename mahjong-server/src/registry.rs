//! Cross-room and cross-user registries (`spec.md` §4.10): `userId →
//! connection`/session and `roomId → room actor` maps. These are the
//! "concurrent maps" `SPEC_FULL.md` §9 calls for in place of the teacher's
//! single ambient `GameState` actor — join/leave and connection
//! attach/detach are serialized per `userId`, matching `spec.md` §5's
//! "coarser granularity per userId" guarantee, by taking the registry's own
//! lock only for the duration of a single map mutation.

use std::collections::HashMap;
use std::sync::Arc;

use mahjong::config::Config;
use mahjong::error::ErrorKind;
use mahjong::room::{Room, RoomError};
use mahjong::time::Timestamp;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

use crate::persistence::{LiveStateStore, RecordStore};
use crate::room_actor::{RoomActor, RoomCommand};

/// Lightweight, registry-visible summary of a room, kept in sync by the
/// room actor's own lifecycle transitions so HTTP listing doesn't need to
/// round-trip through the actor's command queue.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub room_id: String,
    pub owner_user_id: u64,
    pub sender: mpsc::Sender<RoomCommand>,
}

/// A user's reconnection bookkeeping (`spec.md` §4.10 protocol): which room
/// they're seated in, and — once disconnected — when, so a later reconnect
/// can check it against `maxReconnectMinutes`.
#[derive(Debug, Clone, Default)]
pub struct SessionRecord {
    pub room_id: Option<String>,
    pub disconnected_at: Option<Timestamp>,
}

pub struct Registry {
    rooms: RwLock<HashMap<String, RoomHandle>>,
    sessions: RwLock<HashMap<u64, SessionRecord>>,
    live_store: Arc<dyn LiveStateStore>,
    record_store: Arc<dyn RecordStore>,
    max_reconnect_minutes: u64,
}

impl Registry {
    pub fn new(
        live_store: Arc<dyn LiveStateStore>,
        record_store: Arc<dyn RecordStore>,
        max_reconnect_minutes: u64,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            live_store,
            record_store,
            max_reconnect_minutes,
        }
    }

    /// Enforces `maxActiveRoomsPerOwner` (`spec.md` §4.9) and creates a new
    /// room actor, registering its handle for lookup.
    pub async fn create_room(&self, owner_user_id: u64, config: Config, now: Timestamp) -> Result<String, RoomError> {
        let rooms = self.rooms.read().await;
        let active_for_owner =
            rooms.values().filter(|r| r.owner_user_id == owner_user_id).count() as u32;
        if active_for_owner >= mahjong::room::MAX_ACTIVE_ROOMS_PER_OWNER {
            return Err(RoomError::TooManyActiveRooms);
        }
        let taken: std::collections::HashSet<&String> = rooms.keys().collect();
        drop(rooms);

        let mut rng = rand::thread_rng();
        let room_id = Room::generate_room_id(&mut rng, |id| taken.contains(&id.to_owned()))?;
        let room = Room::create(room_id.clone(), owner_user_id, config, now);

        let sender = RoomActor::spawn(room, self.live_store.clone(), self.record_store.clone());
        self.rooms.write().await.insert(
            room_id.clone(),
            RoomHandle { room_id: room_id.clone(), owner_user_id, sender },
        );

        info!(room_id = %room_id, owner_user_id, "room created");
        Ok(room_id)
    }

    pub async fn room_sender(&self, room_id: &str) -> Option<mpsc::Sender<RoomCommand>> {
        self.rooms.read().await.get(room_id).map(|h| h.sender.clone())
    }

    pub async fn remove_room(&self, room_id: &str) {
        self.rooms.write().await.remove(room_id);
    }

    pub async fn rooms_for_user(&self, user_id: u64) -> Vec<String> {
        self.rooms
            .read()
            .await
            .values()
            .filter(|h| h.owner_user_id == user_id)
            .map(|h| h.room_id.clone())
            .collect()
    }

    /// Records that `user_id` is now seated in `room_id`, replacing any
    /// prior session entry (idempotent reconnect per `spec.md` §5).
    pub async fn attach(&self, user_id: u64, room_id: String) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(user_id, SessionRecord { room_id: Some(room_id), disconnected_at: None });
    }

    /// Peeks the room a user is currently attached to, without touching
    /// their disconnection record (unlike [`Self::try_reconnect`], which is
    /// a mutating probe gated on the grace window).
    pub async fn current_room(&self, user_id: u64) -> Option<String> {
        self.sessions.read().await.get(&user_id).and_then(|r| r.room_id.clone())
    }

    pub async fn mark_disconnected(&self, user_id: u64, now: Timestamp) {
        let mut sessions = self.sessions.write().await;
        if let Some(record) = sessions.get_mut(&user_id) {
            record.disconnected_at = Some(now);
        }
    }

    /// `spec.md` §4.10 reconnection protocol step 2/3: resumes only if the
    /// user has a disconnection record within `maxReconnectMinutes`, else
    /// rejects with `RECONNECT_WINDOW_EXPIRED` (`spec.md` §8 P10).
    pub async fn try_reconnect(&self, user_id: u64, now: Timestamp) -> Result<String, ErrorKind> {
        let mut sessions = self.sessions.write().await;
        let record = sessions.get_mut(&user_id).ok_or(ErrorKind::ReconnectWindowExpired)?;
        let room_id = record.room_id.clone().ok_or(ErrorKind::ReconnectWindowExpired)?;

        if let Some(disconnected_at) = record.disconnected_at {
            let elapsed_minutes = now.saturating_sub(disconnected_at) / 60;
            if elapsed_minutes > self.max_reconnect_minutes {
                return Err(ErrorKind::ReconnectWindowExpired);
            }
        }

        record.disconnected_at = None;
        Ok(room_id)
    }

    /// `spec.md` §4.9 inactivity sweep: probes every known room actor with
    /// `CheckInactivity`, letting each decide (from its own `Room`) whether
    /// `lastActivityAt + inactiveThreshold` has passed while still
    /// `WAITING`/`READY`. Senders whose room actor has already shut down
    /// (dissolved or crashed) are pruned from the registry.
    pub async fn sweep_inactive(&self, now: Timestamp, inactive_threshold_secs: u64) {
        let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();
        let mut dead = Vec::new();
        for handle in handles {
            if handle
                .sender
                .send(RoomCommand::CheckInactivity { now, inactive_threshold_secs })
                .await
                .is_err()
            {
                dead.push(handle.room_id);
            }
        }
        if !dead.is_empty() {
            let mut rooms = self.rooms.write().await;
            for room_id in dead {
                rooms.remove(&room_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryLiveStore, InMemoryRecordStore};

    fn registry(max_reconnect_minutes: u64) -> Registry {
        Registry::new(Arc::new(InMemoryLiveStore::new()), Arc::new(InMemoryRecordStore::new()), max_reconnect_minutes)
    }

    #[tokio::test]
    async fn reconnect_within_grace_resumes_the_room_and_clears_the_disconnect_record() {
        let registry = registry(5);
        registry.attach(1, "100001".into()).await;
        registry.mark_disconnected(1, Timestamp(100)).await;

        let room_id = registry.try_reconnect(1, Timestamp(125)).await.unwrap();
        assert_eq!(room_id, "100001");
        assert!(registry.sessions.read().await.get(&1).unwrap().disconnected_at.is_none());
    }

    #[tokio::test]
    async fn reconnect_past_the_window_is_always_rejected() {
        let registry = registry(5);
        registry.attach(1, "100001".into()).await;
        registry.mark_disconnected(1, Timestamp(0)).await;

        let err = registry.try_reconnect(1, Timestamp(5 * 61)).await.unwrap_err();
        assert!(matches!(err, ErrorKind::ReconnectWindowExpired));
    }

    #[tokio::test]
    async fn reconnect_with_no_session_record_is_rejected() {
        let registry = registry(5);
        let err = registry.try_reconnect(42, Timestamp(0)).await.unwrap_err();
        assert!(matches!(err, ErrorKind::ReconnectWindowExpired));
    }
}
