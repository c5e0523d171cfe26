//! Stable error codes surfaced to clients (`spec.md` §7).
//!
//! `spec.md` §9 maps "exception-driven control flow" onto a `Result` type
//! whose error kinds are exactly this table. Infrastructure errors
//! (`STORAGE_UNAVAILABLE`) and the internal-only `WALL_EXHAUSTED` signal live
//! alongside the game-rule errors so that call sites can match on a single
//! enum, matching how the teacher keeps `DiscardError`/`InvalidDiscard` as
//! flat, matchable enums rather than splitting "client" vs "internal" error
//! types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tile::TileId;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ErrorKind {
    #[error("malformed request: {0}")]
    InvalidInput(String),

    #[error("it is not seat {actual}'s turn (expected {expected})")]
    NotYourTurn { expected: u8, actual: u8 },

    #[error("action is not currently available to this seat")]
    ActionNotAvailable,

    #[error("tile {0} is not in the player's hand")]
    TileNotInHand(TileId),

    #[error("declared hand does not form a legal win")]
    InvalidWin,

    #[error("claim decision arrived after the window closed")]
    ClaimWindowClosed,

    #[error("room not found")]
    RoomNotFound,

    #[error("room is full")]
    RoomFull,

    #[error("room is closed")]
    RoomClosed,

    #[error("user is banned")]
    UserBanned,

    #[error("reconnection grace period has expired")]
    ReconnectWindowExpired,

    #[error("wall exhausted, round draws out")]
    WallExhausted,

    #[error("deck of {deck_size} tiles cannot supply the fixed opening deal")]
    InsufficientTiles { deck_size: usize },

    #[error("state invariant violated: {0}")]
    StateInvariantViolated(String),

    #[error("storage backend unavailable")]
    StorageUnavailable,
}

impl ErrorKind {
    /// The stable wire code for this error (`spec.md` §7's `Code` column).
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput(_) => "INVALID_INPUT",
            ErrorKind::NotYourTurn { .. } => "NOT_YOUR_TURN",
            ErrorKind::ActionNotAvailable => "ACTION_NOT_AVAILABLE",
            ErrorKind::TileNotInHand(_) => "TILE_NOT_IN_HAND",
            ErrorKind::InvalidWin => "INVALID_WIN",
            ErrorKind::ClaimWindowClosed => "CLAIM_WINDOW_CLOSED",
            ErrorKind::RoomNotFound => "ROOM_NOT_FOUND",
            ErrorKind::RoomFull => "ROOM_FULL",
            ErrorKind::RoomClosed => "ROOM_CLOSED",
            ErrorKind::UserBanned => "USER_BANNED",
            ErrorKind::ReconnectWindowExpired => "RECONNECT_WINDOW_EXPIRED",
            ErrorKind::WallExhausted => "WALL_EXHAUSTED",
            ErrorKind::InsufficientTiles { .. } => "INSUFFICIENT_TILES",
            ErrorKind::StateInvariantViolated(_) => "STATE_INVARIANT_VIOLATED",
            ErrorKind::StorageUnavailable => "STORAGE_UNAVAILABLE",
        }
    }
}

pub type Result<T> = std::result::Result<T, ErrorKind>;
