//! Wire message shapes (`spec.md` §6): the WebSocket frame envelope, game
//! action payloads, and the JWT claims the session layer extracts a
//! `userId` from. HTTP request/response framing and token issuance
//! themselves stay external (`spec.md` §1 Out of scope); these are the
//! fixed DTOs both sides of that boundary agree on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::claim::ClaimKind;
use crate::player::GangKind;
use crate::tile::Tile;

/// One WebSocket frame (`spec.md` §6). `requestId` is required on
/// `REQUEST`/`RESPONSE` frames and carried through so a client can match a
/// response to its request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    pub cmd: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FrameError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameType {
    #[serde(rename = "REQUEST")]
    Request,
    #[serde(rename = "RESPONSE")]
    Response,
    #[serde(rename = "EVENT")]
    Event,
    #[serde(rename = "ERROR")]
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameError {
    pub code: String,
    pub message: String,
}

impl FrameError {
    pub fn from_kind(kind: &crate::error::ErrorKind) -> Self {
        Self { code: kind.code().to_owned(), message: kind.to_string() }
    }
}

/// `data` payload of a `/game/action` `play` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayAction {
    pub tile: Tile,
}

/// `data` payload of a `peng` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PengAction {
    pub tile: Tile,
    #[serde(rename = "claimedFrom")]
    pub claimed_from: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GangType {
    #[serde(rename = "MING")]
    Ming,
    #[serde(rename = "AN")]
    An,
    #[serde(rename = "BU")]
    Bu,
}

impl From<GangType> for GangKind {
    fn from(value: GangType) -> Self {
        match value {
            GangType::Ming => GangKind::Ming,
            GangType::An => GangKind::An,
            GangType::Bu => GangKind::Bu,
        }
    }
}

/// `data` payload of a `gang` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GangAction {
    pub tile: Tile,
    #[serde(rename = "gangType")]
    pub gang_type: GangType,
    #[serde(rename = "claimedFrom", skip_serializing_if = "Option::is_none")]
    pub claimed_from: Option<u8>,
}

/// `data` payload of a `chi` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChiAction {
    pub tile: Tile,
    pub sequence: [Tile; 3],
}

/// `data` payload of a `hu` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuAction {
    #[serde(rename = "winningTile")]
    pub winning_tile: Tile,
    #[serde(rename = "selfDraw")]
    pub self_draw: bool,
}

/// `data` payload of a `pass` command — intentionally empty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PassAction {}

/// Events the server broadcasts to a room (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum RoomEvent {
    UserJoined { seat: u8, user_id: u64 },
    UserLeft { seat: u8 },
    YourTurn { seat: u8, deadline_secs: u32 },
    TurnChanged { seat: u8 },
    PlayerAction { seat: u8, kind: ActionEventKind },
    GameStateUpdate,
    PlayerDisconnected { seat: u8 },
    PlayerReconnected { seat: u8 },
    PlayerTrusteeActivated { seat: u8 },
    GameEnd { winners: Vec<u8> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActionEventKind {
    Discard(Tile),
    Claim(ClaimKind),
    Pass,
}

/// JWT claims payload (`spec.md` §6): `{ userId, role, type, exp }`, signed
/// HS512. Validation and issuance are external; the session layer only
/// decodes an already-validated token to extract `userId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    #[serde(rename = "userId")]
    pub user_id: u64,
    pub role: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub exp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}
