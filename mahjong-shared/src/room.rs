//! Room lifecycle (`spec.md` §4.9): creation with a unique 6-digit ID,
//! join/leave/ready, ownership transfer, inactivity dissolution.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::time::Timestamp;

pub const MAX_ACTIVE_ROOMS_PER_OWNER: u32 = 3;
const ROOM_ID_GENERATION_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    Ready,
    Playing,
    Dissolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub owner_user_id: u64,
    pub config: Config,
    pub player_slots: [Option<u64>; 3],
    pub status: RoomStatus,
    pub last_activity_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room id space exhausted after {0} attempts")]
    RoomIdExhausted(u32),
    #[error("owner already has {MAX_ACTIVE_ROOMS_PER_OWNER} active rooms")]
    TooManyActiveRooms,
    #[error("room is not accepting joins")]
    NotJoinable,
    #[error("room has no free seat")]
    RoomFull,
    #[error("user is already seated in this room")]
    AlreadySeated,
}

impl Room {
    /// Generates a 6-digit numeric ID by repeated random draw, retrying on
    /// collision up to `ROOM_ID_GENERATION_ATTEMPTS` times.
    pub fn generate_room_id(
        rng: &mut impl Rng,
        is_taken: impl Fn(&str) -> bool,
    ) -> Result<String, RoomError> {
        for _ in 0..ROOM_ID_GENERATION_ATTEMPTS {
            let candidate = format!("{:06}", rng.gen_range(0..1_000_000u32));
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
        }
        Err(RoomError::RoomIdExhausted(ROOM_ID_GENERATION_ATTEMPTS))
    }

    /// Creates a room with the owner seated at index 0.
    pub fn create(room_id: String, owner_user_id: u64, config: Config, now: Timestamp) -> Self {
        let mut player_slots = [None; 3];
        player_slots[0] = Some(owner_user_id);
        Self {
            room_id,
            owner_user_id,
            config,
            player_slots,
            status: RoomStatus::Waiting,
            last_activity_at: now,
        }
    }

    pub fn join(&mut self, user_id: u64, now: Timestamp) -> Result<u8, RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::NotJoinable);
        }
        if self.player_slots.iter().flatten().any(|&u| u == user_id) {
            return Err(RoomError::AlreadySeated);
        }

        let seat = self
            .player_slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(RoomError::RoomFull)? as u8;

        self.player_slots[seat as usize] = Some(user_id);
        self.last_activity_at = now;

        if self.player_slots.iter().all(|slot| slot.is_some()) {
            self.status = RoomStatus::Ready;
        }

        Ok(seat)
    }

    /// Leaves the room. If the game is underway, the seat is left in place
    /// for the room actor to mark `DISCONNECTED` (subject to trustee); here
    /// we only handle the lobby case (`WAITING`/`READY`), including owner
    /// transfer and empty-room dissolution.
    pub fn leave_lobby(&mut self, user_id: u64, now: Timestamp) {
        if self.status == RoomStatus::Playing {
            return;
        }

        for slot in self.player_slots.iter_mut() {
            if *slot == Some(user_id) {
                *slot = None;
            }
        }
        self.last_activity_at = now;

        if self.status == RoomStatus::Ready {
            self.status = RoomStatus::Waiting;
        }

        if self.player_slots.iter().all(|slot| slot.is_none()) {
            self.status = RoomStatus::Dissolved;
            return;
        }

        if self.owner_user_id == user_id {
            if let Some(new_owner) = self.player_slots.iter().flatten().next() {
                self.owner_user_id = *new_owner;
            }
        }
    }

    pub fn is_inactive(&self, now: Timestamp, inactive_threshold_secs: u64) -> bool {
        matches!(self.status, RoomStatus::Waiting | RoomStatus::Ready)
            && now.saturating_sub(self.last_activity_at) >= inactive_threshold_secs
    }

    pub fn dissolve(&mut self) {
        self.status = RoomStatus::Dissolved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn owner_occupies_seat_zero() {
        let room = Room::create("123456".into(), 7, Config::default(), Timestamp(0));
        assert_eq!(room.player_slots[0], Some(7));
        assert_eq!(room.status, RoomStatus::Waiting);
    }

    #[test]
    fn room_becomes_ready_when_full() {
        let mut room = Room::create("123456".into(), 7, Config::default(), Timestamp(0));
        room.join(8, Timestamp(1)).unwrap();
        room.join(9, Timestamp(2)).unwrap();
        assert_eq!(room.status, RoomStatus::Ready);
    }

    #[test]
    fn join_rejects_full_room() {
        let mut room = Room::create("123456".into(), 7, Config::default(), Timestamp(0));
        room.join(8, Timestamp(1)).unwrap();
        room.join(9, Timestamp(2)).unwrap();
        assert_eq!(room.join(10, Timestamp(3)), Err(RoomError::NotJoinable));
    }

    #[test]
    fn leave_transfers_ownership() {
        let mut room = Room::create("123456".into(), 7, Config::default(), Timestamp(0));
        room.join(8, Timestamp(1)).unwrap();
        room.leave_lobby(7, Timestamp(2));
        assert_eq!(room.owner_user_id, 8);
    }

    #[test]
    fn leave_dissolves_empty_room() {
        let mut room = Room::create("123456".into(), 7, Config::default(), Timestamp(0));
        room.leave_lobby(7, Timestamp(1));
        assert_eq!(room.status, RoomStatus::Dissolved);
    }

    #[test]
    fn generate_room_id_is_six_digits() {
        let mut rng = StepRng::new(123456, 1);
        let id = Room::generate_room_id(&mut rng, |_| false).unwrap();
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }
}
