//! Append-only action log and replay (`spec.md` §4.11).

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::time::Timestamp;

/// The kind of action recorded, mirroring the mutating `GameState` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionPayload {
    Draw,
    Discard { tile: crate::tile::TileId },
    Claim { decision: Option<crate::player::ActionKind> },
    ConcealedGang { tile: crate::tile::Tile },
    BuGang { tile: crate::tile::Tile },
    SelfDrawWin,
    Dissolve,
}

/// One append-only log entry (`spec.md` §3 `ActionLogEntry`). `seq`
/// increments from 1 and is gapless within a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub seq: u64,
    pub seat: Option<u8>,
    pub payload: ActionPayload,
    pub timestamp: Timestamp,
}

/// Append-only action log for one game. Sealed into a [`GameRecord`] at
/// `FINISHED`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionLog {
    entries: Vec<ActionLogEntry>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, seat: Option<u8>, payload: ActionPayload, timestamp: Timestamp) -> u64 {
        let seq = self.entries.len() as u64 + 1;
        self.entries.push(ActionLogEntry { seq, seat, payload, timestamp });
        seq
    }

    pub fn entries(&self) -> &[ActionLogEntry] {
        &self.entries
    }

    /// `spec.md` §8 P4: sequence numbers start at 1 and have no gaps.
    pub fn is_gapless(&self) -> bool {
        self.entries.iter().enumerate().all(|(i, e)| e.seq == i as u64 + 1)
    }
}

/// Sealed record of a finished game (`spec.md` §3 `Room`/`GameRecord`,
/// §6 "Durable store").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: u64,
    pub room_id: String,
    pub seed: u64,
    pub config: Config,
    pub actions: Vec<ActionLogEntry>,
    pub final_hands: Vec<Vec<crate::tile::Tile>>,
    pub settlement: std::collections::HashMap<u8, i64>,
}

/// Reconstructs a `GameState` by re-seeding, re-dealing, and re-applying
/// every action in sequence (`spec.md` §4.11, §8 P5 replay determinism).
///
/// Deterministic because `GameState`'s mutating methods never read the wall
/// clock — every timestamp in this function comes from the recorded log,
/// not `Instant::now()` (`SPEC_FULL.md` §4.7).
pub fn replay(
    record: &GameRecord,
    dealer_seat: u8,
    round_index: u32,
    user_ids: [u64; 3],
) -> Result<crate::game::GameState, crate::error::ErrorKind> {
    let mut state = crate::game::GameState::deal(
        record.room_id.clone(),
        record.game_id,
        record.config,
        record.seed,
        dealer_seat,
        round_index,
        user_ids,
        record.actions.first().map(|e| e.timestamp).unwrap_or(Timestamp(0)),
    )?;

    for entry in &record.actions {
        apply_logged_action(&mut state, entry)?;
    }

    Ok(state)
}

fn apply_logged_action(
    state: &mut crate::game::GameState,
    entry: &ActionLogEntry,
) -> Result<(), crate::error::ErrorKind> {
    let seat = entry.seat;
    match &entry.payload {
        ActionPayload::Draw => {
            state.draw(seat.expect("draw entries carry a seat"))?;
        }
        ActionPayload::Discard { tile } => {
            state.discard(seat.expect("discard entries carry a seat"), *tile, entry.timestamp)?;
        }
        ActionPayload::Claim { decision } => {
            state.submit_claim(seat.expect("claim entries carry a seat"), *decision, entry.timestamp)?;
        }
        ActionPayload::ConcealedGang { tile } => {
            state.declare_concealed_gang(seat.expect("gang entries carry a seat"), *tile)?;
        }
        ActionPayload::BuGang { tile } => {
            state.declare_bu_gang(seat.expect("gang entries carry a seat"), *tile)?;
        }
        ActionPayload::SelfDrawWin => {
            state.declare_self_draw_win(seat.expect("win entries carry a seat"))?;
        }
        ActionPayload::Dissolve => {
            state.phase = crate::game::Phase::Finished;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_log_is_gapless() {
        let mut log = ActionLog::new();
        log.append(Some(0), ActionPayload::Draw, Timestamp(0));
        log.append(Some(0), ActionPayload::Discard { tile: crate::tile::TileId::new(1) }, Timestamp(1));
        assert!(log.is_gapless());
        assert_eq!(log.entries()[0].seq, 1);
        assert_eq!(log.entries()[1].seq, 2);
    }
}
