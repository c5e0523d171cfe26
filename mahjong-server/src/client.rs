//! Per-connection WebSocket session handling (`spec.md` §6's message bus).
//! Each accepted socket gets one `ClientSession`: it authenticates the
//! bearer token carried on the upgrade request, then pumps `Frame`s in both
//! directions — incoming frames are decoded and routed to the addressed
//! room's actor via the registry; a room's broadcast `Frame`s arrive on an
//! per-connection `mpsc` channel and are written back out in order, which is
//! what gives `spec.md` §5 its "per-user connection FIFO delivery"
//! guarantee (nothing else ever writes to this socket's sink).
//!
//! This replaces the teacher's `thespian`-actor `ClientController` (a
//! single ambient `GameState` actor reached through a bincode-ish
//! handshake) with a plain per-connection task reading/writing JSON
//! `Frame`s against the room registry, matching `spec.md` §6's actual wire
//! format.

use std::sync::Arc;

use futures::{stream::SplitSink, SinkExt, StreamExt};
use mahjong::error::ErrorKind;
use mahjong::messages::{Frame, FrameType};
use mahjong::room::RoomError;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, instrument, warn};
use warp::ws::{Message as WsMessage, WebSocket};

use crate::clock;
use crate::registry::Registry;
use crate::room_actor::{claim_action_kind, error_frame, GameCommand, RoomCommand};

/// Handles one authenticated socket end to end: reads frames until the
/// client disconnects, forwarding each to [`dispatch`]; concurrently drains
/// the per-connection outbox into the socket's write half.
#[instrument(skip(socket, registry), fields(user_id))]
pub async fn run_session(user_id: u64, socket: WebSocket, registry: Arc<Registry>) {
    let (sink, mut stream) = socket.split();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel::<Frame>();

    let pump = tokio::spawn(pump_outbox(sink, outbox_rx));

    info!(user_id, "client session started");

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                warn!(user_id, %err, "socket read error, ending session");
                break;
            }
        };

        if message.is_close() {
            break;
        }
        if !message.is_text() {
            continue;
        }

        let text = message.to_str().unwrap_or_default();
        let frame: Frame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                let _ = outbox_tx.send(error_frame(
                    "",
                    None,
                    &ErrorKind::InvalidInput(format!("malformed frame: {err}")),
                ));
                continue;
            }
        };

        dispatch(user_id, frame, &registry, &outbox_tx).await;
    }

    if let Some(room_id) = registry.current_room(user_id).await {
        if let Some(sender) = registry.room_sender(&room_id).await {
            let _ = sender.send(RoomCommand::Disconnect { user_id }).await;
        }
    }
    registry.mark_disconnected(user_id, clock::now()).await;

    pump.abort();
    info!(user_id, "client session ended");
}

async fn pump_outbox(
    mut sink: SplitSink<WebSocket, WsMessage>,
    mut outbox_rx: mpsc::UnboundedReceiver<Frame>,
) {
    while let Some(frame) = outbox_rx.recv().await {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "failed to serialize outgoing frame");
                continue;
            }
        };
        if sink.send(WsMessage::text(text)).await.is_err() {
            break;
        }
    }
}

/// Decodes one incoming frame's `cmd` and routes it to the room registry,
/// replying on the same connection's outbox with a `RESPONSE` or `ERROR`
/// frame carrying the original `requestId`.
#[instrument(skip(registry, outbox), fields(cmd = %frame.cmd))]
async fn dispatch(user_id: u64, frame: Frame, registry: &Registry, outbox: &mpsc::UnboundedSender<Frame>) {
    let room_id = frame.room_id.clone();
    let request_id = frame.request_id.clone();

    let result = match frame.cmd.as_str() {
        "ping" => {
            let _ = outbox.send(reply(&room_id, request_id, json!({"pong": true})));
            return;
        }
        "reconnect" => handle_reconnect(user_id, registry, outbox).await,
        "join" => handle_join(user_id, &room_id, registry, outbox).await,
        "leave" => handle_leave(user_id, &room_id, registry).await,
        "snapshot" => handle_snapshot(user_id, &room_id, registry).await,
        "play" | "peng" | "gang" | "chi" | "hu" | "pass" => {
            handle_game_action(user_id, &frame, registry).await
        }
        other => Err(ErrorKind::InvalidInput(format!("unknown cmd: {other}"))),
    };

    match result {
        Ok(()) => {
            let _ = outbox.send(reply(&room_id, request_id, json!({"ok": true})));
        }
        Err(kind) => {
            let _ = outbox.send(error_frame(&room_id, request_id, &kind));
        }
    }
}

async fn handle_reconnect(
    user_id: u64,
    registry: &Registry,
    outbox: &mpsc::UnboundedSender<Frame>,
) -> Result<(), ErrorKind> {
    let resolved_room_id = registry.try_reconnect(user_id, clock::now()).await?;
    let sender = registry.room_sender(&resolved_room_id).await.ok_or(ErrorKind::RoomNotFound)?;

    let (respond_to, response) = oneshot::channel();
    sender
        .send(RoomCommand::Reconnect { user_id, outbox: outbox.clone(), respond_to })
        .await
        .map_err(|_| ErrorKind::RoomNotFound)?;
    response.await.map_err(|_| ErrorKind::RoomNotFound)??;

    registry.attach(user_id, resolved_room_id).await;
    Ok(())
}

/// `/room/join` over the live channel (`spec.md` §6): attaches this
/// connection's outbox to the room actor directly, which is the properly
/// live-connected way to join — unlike the HTTP `POST /rooms/:id/join`
/// convenience endpoint, which seats the player but leaves event delivery
/// to a later `reconnect`.
async fn handle_join(
    user_id: u64,
    room_id: &str,
    registry: &Registry,
    outbox: &mpsc::UnboundedSender<Frame>,
) -> Result<(), ErrorKind> {
    let sender = registry.room_sender(room_id).await.ok_or(ErrorKind::RoomNotFound)?;
    let (respond_to, response) = oneshot::channel();
    sender
        .send(RoomCommand::Join { user_id, outbox: outbox.clone(), respond_to })
        .await
        .map_err(|_| ErrorKind::RoomNotFound)?;
    response.await.map_err(|_| ErrorKind::RoomNotFound)?.map_err(room_error_to_error_kind)?;
    registry.attach(user_id, room_id.to_owned()).await;
    Ok(())
}

async fn handle_leave(user_id: u64, room_id: &str, registry: &Registry) -> Result<(), ErrorKind> {
    let sender = registry.room_sender(room_id).await.ok_or(ErrorKind::RoomNotFound)?;
    sender.send(RoomCommand::Leave { user_id }).await.map_err(|_| ErrorKind::RoomNotFound)
}

async fn handle_snapshot(user_id: u64, room_id: &str, registry: &Registry) -> Result<(), ErrorKind> {
    let sender = registry.room_sender(room_id).await.ok_or(ErrorKind::RoomNotFound)?;
    sender.send(RoomCommand::Snapshot { user_id }).await.map_err(|_| ErrorKind::RoomNotFound)
}

async fn handle_game_action(user_id: u64, frame: &Frame, registry: &Registry) -> Result<(), ErrorKind> {
    let sender = registry.room_sender(&frame.room_id).await.ok_or(ErrorKind::RoomNotFound)?;

    let command = decode_game_command(&frame.cmd, &frame.data)?;

    let (respond_to, response) = oneshot::channel();
    sender
        .send(RoomCommand::GameAction { user_id, command, respond_to })
        .await
        .map_err(|_| ErrorKind::RoomNotFound)?;
    response.await.map_err(|_| ErrorKind::RoomNotFound)?
}

fn decode_game_command(cmd: &str, data: &serde_json::Value) -> Result<GameCommand, ErrorKind> {
    use mahjong::messages::PlayAction;

    match cmd {
        "play" => {
            let action: PlayAction = serde_json::from_value(data.clone())
                .map_err(|err| ErrorKind::InvalidInput(err.to_string()))?;
            Ok(GameCommand::Play { tile: action.tile })
        }
        "peng" | "chi" => {
            // `allowChi`/`allowPeng` gating and the specific tiles claimed
            // are validated inside `GameState::submit_claim` against the
            // open `ClaimWindow`'s candidate set; the wire payload only
            // needs to carry which kind of claim this seat is making.
            Ok(GameCommand::Claim { decision: claim_action_kind(cmd) })
        }
        "gang" => {
            #[derive(serde::Deserialize)]
            struct GangPayload {
                tile: mahjong::tile::Tile,
                #[serde(rename = "gangType")]
                gang_type: String,
            }
            let payload: GangPayload = serde_json::from_value(data.clone())
                .map_err(|err| ErrorKind::InvalidInput(err.to_string()))?;
            match payload.gang_type.as_str() {
                "AN" => Ok(GameCommand::ConcealedGang { tile: payload.tile }),
                "BU" => Ok(GameCommand::BuGang { tile: payload.tile }),
                "MING" => Ok(GameCommand::Claim { decision: Some(mahjong::player::ActionKind::Gang) }),
                other => Err(ErrorKind::InvalidInput(format!("unknown gangType: {other}"))),
            }
        }
        "hu" => {
            #[derive(serde::Deserialize)]
            struct HuPayload {
                #[serde(rename = "selfDraw")]
                self_draw: bool,
            }
            let payload: HuPayload = serde_json::from_value(data.clone())
                .map_err(|err| ErrorKind::InvalidInput(err.to_string()))?;
            if payload.self_draw {
                Ok(GameCommand::Hu)
            } else {
                Ok(GameCommand::Claim { decision: Some(mahjong::player::ActionKind::Hu) })
            }
        }
        "pass" => Ok(GameCommand::Claim { decision: None }),
        other => Err(ErrorKind::InvalidInput(format!("unknown game action cmd: {other}"))),
    }
}

fn reply(room_id: &str, request_id: Option<String>, data: serde_json::Value) -> Frame {
    Frame { frame_type: FrameType::Response, cmd: "ok".into(), room_id: room_id.to_owned(), request_id, data, error: None }
}

/// `RoomError` and `ErrorKind` are both defined in `mahjong-shared`, so a
/// `From` impl between them here would violate the orphan rule — this is a
/// plain conversion function instead.
pub fn room_error_to_error_kind(err: RoomError) -> ErrorKind {
    match err {
        RoomError::RoomIdExhausted(_) => ErrorKind::InvalidInput(err.to_string()),
        RoomError::TooManyActiveRooms => ErrorKind::InvalidInput(err.to_string()),
        RoomError::NotJoinable => ErrorKind::RoomClosed,
        RoomError::RoomFull => ErrorKind::RoomFull,
        RoomError::AlreadySeated => ErrorKind::InvalidInput(err.to_string()),
    }
}
