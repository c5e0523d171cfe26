//! The per-room single-writer actor (`spec.md` §5): one serialized `mpsc`
//! queue per room through which every mutation — player actions, timer
//! fires, reconnect/disconnect, dissolve — passes in enqueue order. This
//! replaces the teacher's `thespian`-actor `MatchController` with a plain
//! `tokio::sync::mpsc` command loop, which maps directly onto §5's
//! "serialized queue owned by that room" model without an actor-framework
//! dependency (see `DESIGN.md`).

use std::collections::HashMap;

use mahjong::claim::ClaimKind;
use mahjong::config::Config;
use mahjong::error::ErrorKind;
use mahjong::game::GameState;
use mahjong::log::{ActionLog, ActionPayload, GameRecord};
use mahjong::messages::{ActionEventKind, Frame, FrameError, FrameType, RoomEvent};
use mahjong::player::{ActionKind, PlayerStatus};
use mahjong::room::{Room, RoomStatus};
use mahjong::scheduler::{Scheduler, TimeoutEvent, TimeoutKind};
use mahjong::time::Timestamp;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, instrument, trace, warn};

use crate::clock;
use crate::persistence::{LiveStateStore, RecordStore};
use crate::scheduler::TokioScheduler;

pub type Outbox = mpsc::UnboundedSender<Frame>;

/// One incoming `/game/action` command, already decoded from its `Frame`.
/// `Play` carries the wire-format `Tile` face (`spec.md` §6: `{ tile }`),
/// not a `TileId` — the client only ever sees faces, so `handle_game_action`
/// resolves it to the specific concealed instance before calling
/// `GameState::discard`.
#[derive(Debug, Clone)]
pub enum GameCommand {
    Play { tile: mahjong::tile::Tile },
    Claim { decision: Option<ActionKind> },
    ConcealedGang { tile: mahjong::tile::Tile },
    BuGang { tile: mahjong::tile::Tile },
    Hu,
}

#[derive(Debug)]
pub enum RoomCommand {
    Join { user_id: u64, outbox: Outbox, respond_to: oneshot::Sender<Result<u8, mahjong::room::RoomError>> },
    Leave { user_id: u64 },
    Disconnect { user_id: u64 },
    Reconnect { user_id: u64, outbox: Outbox, respond_to: oneshot::Sender<Result<(), ErrorKind>> },
    GameAction { user_id: u64, command: GameCommand, respond_to: oneshot::Sender<Result<(), ErrorKind>> },
    Snapshot { user_id: u64 },
    TimeoutFired(TimeoutEvent),
    /// Periodic inactivity sweep probe (`spec.md` §4.9): the room checks
    /// its own `Room::is_inactive` and dissolves itself if past threshold,
    /// rather than the registry reaching into lobby state it doesn't own.
    CheckInactivity { now: Timestamp, inactive_threshold_secs: u64 },
    Dissolve,
    /// Read path for the HTTP `GET /rooms/:id` lifecycle endpoint
    /// (`spec.md` §6) — a point-in-time summary, not a live subscription.
    Describe { respond_to: oneshot::Sender<RoomSummary> },
}

/// Lightweight, serializable room/game summary for HTTP reads (`spec.md`
/// §6's "fetch room state"). Deliberately smaller than the full
/// `GameState`/`Room` — own-hand redaction happens at the WebSocket
/// `GameSnapshot` layer (`send_snapshot`), not here.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoomSummary {
    pub room_id: String,
    pub owner_user_id: u64,
    pub status: RoomStatus,
    pub player_slots: [Option<u64>; 3],
    pub phase: Option<mahjong::game::Phase>,
    pub current_seat: Option<u8>,
}

struct Connection {
    seat: u8,
    outbox: Outbox,
}

/// Owns one room's lobby metadata, its active `GameState` (once playing),
/// and the append-only action log for the current game.
pub struct RoomActor {
    room: Room,
    game: Option<GameState>,
    log: ActionLog,
    game_id: u64,
    round_index: u32,
    connections: HashMap<u64, Connection>,
    live_store: std::sync::Arc<dyn LiveStateStore>,
    record_store: std::sync::Arc<dyn RecordStore>,
    scheduler: TokioScheduler,
}

impl RoomActor {
    pub fn spawn(
        room: Room,
        live_store: std::sync::Arc<dyn LiveStateStore>,
        record_store: std::sync::Arc<dyn RecordStore>,
    ) -> mpsc::Sender<RoomCommand> {
        let (tx, rx) = mpsc::channel(256);
        let scheduler = TokioScheduler::new(tx.clone());
        let actor = RoomActor {
            room,
            game: None,
            log: ActionLog::new(),
            game_id: 1,
            round_index: 0,
            connections: HashMap::new(),
            live_store,
            record_store,
            scheduler,
        };
        tokio::spawn(actor.run(rx));
        tx
    }

    #[instrument(skip(self, rx), fields(room_id = %self.room.room_id))]
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                RoomCommand::Join { user_id, outbox, respond_to } => {
                    let result = self.handle_join(user_id, outbox).await;
                    let _ = respond_to.send(result);
                }
                RoomCommand::Leave { user_id } => self.handle_leave(user_id).await,
                RoomCommand::Disconnect { user_id } => self.handle_disconnect(user_id).await,
                RoomCommand::Reconnect { user_id, outbox, respond_to } => {
                    let result = self.handle_reconnect(user_id, outbox).await;
                    let _ = respond_to.send(result);
                }
                RoomCommand::GameAction { user_id, command, respond_to } => {
                    let result = self.handle_game_action(user_id, command).await;
                    let _ = respond_to.send(result);
                }
                RoomCommand::Snapshot { user_id } => {
                    if let Some(seat) = self.connections.get(&user_id).map(|c| c.seat) {
                        self.send_snapshot(user_id, seat).await;
                    }
                }
                RoomCommand::TimeoutFired(event) => self.handle_timeout(event).await,
                RoomCommand::CheckInactivity { now, inactive_threshold_secs } => {
                    if self.room.is_inactive(now, inactive_threshold_secs) {
                        info!(room_id = %self.room.room_id, "dissolving inactive room");
                        self.room.dissolve();
                        self.broadcast(RoomEvent::GameEnd { winners: Vec::new() }).await;
                        break;
                    }
                }
                RoomCommand::Describe { respond_to } => {
                    let summary = RoomSummary {
                        room_id: self.room.room_id.clone(),
                        owner_user_id: self.room.owner_user_id,
                        status: self.room.status,
                        player_slots: self.room.player_slots,
                        phase: self.game.as_ref().map(|g| g.phase),
                        current_seat: self.game.as_ref().map(|g| g.current_seat),
                    };
                    let _ = respond_to.send(summary);
                }
                RoomCommand::Dissolve => {
                    self.log.append(None, ActionPayload::Dissolve, clock::now());
                    if let Some(game) = self.game.as_mut() {
                        game.phase = mahjong::game::Phase::Finished;
                    }
                    self.broadcast(RoomEvent::GameEnd { winners: Vec::new() }).await;
                    break;
                }
            }
        }

        trace!("room actor shutting down");
    }

    async fn handle_join(&mut self, user_id: u64, outbox: Outbox) -> Result<u8, mahjong::room::RoomError> {
        let now = clock::now();
        let seat = self.room.join(user_id, now)?;
        self.connections.insert(user_id, Connection { seat, outbox });
        self.broadcast(RoomEvent::UserJoined { seat, user_id }).await;

        if self.room.status == RoomStatus::Ready {
            self.start_game().await;
        }

        self.persist_live().await;
        Ok(seat)
    }

    async fn handle_leave(&mut self, user_id: u64) {
        let now = clock::now();
        self.room.leave_lobby(user_id, now);
        if let Some(conn) = self.connections.remove(&user_id) {
            self.broadcast(RoomEvent::UserLeft { seat: conn.seat }).await;
        }
        self.persist_live().await;
    }

    async fn handle_disconnect(&mut self, user_id: u64) {
        let Some(conn) = self.connections.get(&user_id) else { return };
        let seat = conn.seat;
        if let Some(game) = self.game.as_mut() {
            game.players[seat as usize].status = PlayerStatus::Disconnected;
            game.players[seat as usize].disconnected_at = Some(clock::now());
        }
        self.broadcast(RoomEvent::PlayerDisconnected { seat }).await;
        self.persist_live().await;
    }

    async fn handle_reconnect(&mut self, user_id: u64, outbox: Outbox) -> Result<(), ErrorKind> {
        let seat = self
            .room
            .player_slots
            .iter()
            .position(|slot| *slot == Some(user_id))
            .ok_or(ErrorKind::RoomNotFound)? as u8;

        self.connections.insert(user_id, Connection { seat, outbox });

        if let Some(game) = self.game.as_mut() {
            let player = &mut game.players[seat as usize];
            player.disconnected_at = None;
            player.timeout_count = 0;
            if matches!(player.status, PlayerStatus::Disconnected | PlayerStatus::Trustee) {
                player.status = PlayerStatus::Playing;
            }
        }

        self.broadcast(RoomEvent::PlayerReconnected { seat }).await;
        self.send_snapshot(user_id, seat).await;
        Ok(())
    }

    #[instrument(skip(self, command))]
    async fn handle_game_action(&mut self, user_id: u64, command: GameCommand) -> Result<(), ErrorKind> {
        let seat = self.connections.get(&user_id).map(|c| c.seat).ok_or(ErrorKind::ActionNotAvailable)?;
        let now = clock::now();
        let game = self.game.as_mut().ok_or(ErrorKind::ActionNotAvailable)?;

        match command {
            GameCommand::Play { tile } => {
                let tile_id = resolve_concealed_tile(game, seat, tile)
                    .ok_or_else(|| ErrorKind::InvalidInput(format!("seat {seat} does not hold {tile}")))?;
                game.discard(seat, tile_id, now)?;
                self.log.append(Some(seat), ActionPayload::Discard { tile: tile_id }, now);
                self.after_discard(seat, now).await;
            }
            GameCommand::Claim { decision } => {
                game.submit_claim(seat, decision, now)?;
                self.log.append(Some(seat), ActionPayload::Claim { decision }, now);
                self.after_claim(now).await;
            }
            GameCommand::ConcealedGang { tile } => {
                game.declare_concealed_gang(seat, tile)?;
                self.log.append(Some(seat), ActionPayload::ConcealedGang { tile }, now);
            }
            GameCommand::BuGang { tile } => {
                game.declare_bu_gang(seat, tile)?;
                self.log.append(Some(seat), ActionPayload::BuGang { tile }, now);
            }
            GameCommand::Hu => {
                game.declare_self_draw_win(seat)?;
                self.log.append(Some(seat), ActionPayload::SelfDrawWin, now);
                self.finish_game().await;
            }
        }

        self.broadcast(RoomEvent::GameStateUpdate).await;
        self.persist_live().await;
        Ok(())
    }

    async fn after_discard(&mut self, discarder: u8, now: Timestamp) {
        let Some(game) = self.game.as_mut() else { return };

        self.broadcast(RoomEvent::PlayerAction { seat: discarder, kind: ActionEventKind::Pass }).await;

        if game.phase == mahjong::game::Phase::Settlement {
            self.finish_game().await;
            return;
        }

        if let Some(window) = &game.claim_window {
            self.scheduler.arm(TimeoutKind::ClaimWindow, self.room_id_hash(), window.deadline);
        } else {
            self.arm_turn_timer(now).await;
            self.broadcast(RoomEvent::TurnChanged { seat: game.current_seat }).await;
        }
    }

    async fn after_claim(&mut self, now: Timestamp) {
        let Some(game) = self.game.as_mut() else { return };
        if game.phase == mahjong::game::Phase::Settlement {
            self.finish_game().await;
            return;
        }
        if game.claim_window.is_none() {
            self.arm_turn_timer(now).await;
            self.broadcast(RoomEvent::TurnChanged { seat: game.current_seat }).await;
        }
    }

    /// Arms the next seat's turn deadline. `spec.md` §4.5's `TurnStart(seat
    /// s)` begins with an automatic `DRAW(s)` before the seat can act, so a
    /// freshly-advanced turn (`turn_phase == AwaitingDraw`) draws here,
    /// before the deadline is armed — the deadline covers the seat's
    /// discard decision, not the (automatic, instantaneous) draw itself. A
    /// wall-exhausted draw flips the round to draw-out settlement.
    async fn arm_turn_timer(&mut self, now: Timestamp) {
        let Some(game) = self.game.as_mut() else { return };
        let seat = game.current_seat;

        if game.turn_phase == mahjong::game::TurnPhase::AwaitingDraw {
            match game.draw(seat) {
                Ok(_) => self.log.append(Some(seat), ActionPayload::Draw, now),
                Err(_) => {
                    self.finish_game().await;
                    return;
                }
            };
        }

        let Some(game) = self.game.as_ref() else { return };
        let deadline_secs = game.config.turn.turn_seconds;
        self.scheduler.arm(TimeoutKind::Turn, self.room_id_hash(), now.plus_secs(deadline_secs));
        self.broadcast(RoomEvent::YourTurn { seat, deadline_secs }).await;
    }

    async fn handle_timeout(&mut self, event: TimeoutEvent) {
        let Some(game) = self.game.as_ref() else { return };

        let live_deadline = match event.kind {
            TimeoutKind::Turn => game.turn_deadline,
            TimeoutKind::ClaimWindow => match &game.claim_window {
                Some(window) => window.deadline,
                None => return,
            },
        };

        if mahjong::scheduler::is_stale(&event, live_deadline) {
            return;
        }

        match event.kind {
            TimeoutKind::Turn => self.handle_turn_timeout().await,
            TimeoutKind::ClaimWindow => self.handle_claim_window_timeout().await,
        }
    }

    async fn handle_turn_timeout(&mut self) {
        let now = clock::now();
        let Some(game) = self.game.as_mut() else { return };
        let seat = game.current_seat;

        game.players[seat as usize].timeout_count += 1;

        if mahjong::trustee::should_trustee(game, seat, now) {
            self.run_trustee_turn(seat, now).await;
        }
    }

    async fn handle_claim_window_timeout(&mut self) {
        let now = clock::now();
        let Some(game) = self.game.as_mut() else { return };
        let Some(window) = game.claim_window.clone() else { return };

        for &seat in window.candidates.keys() {
            if !window.decisions.contains_key(&seat) {
                let _ = game.submit_claim(seat, None, now);
            }
        }

        self.after_claim(now).await;
    }

    async fn run_trustee_turn(&mut self, seat: u8, now: Timestamp) {
        let entering_trustee = {
            let Some(game) = self.game.as_mut() else { return };
            let player = &mut game.players[seat as usize];
            let entering = mahjong::trustee::enters_trustee(player.status);
            if entering {
                player.status = PlayerStatus::Trustee;
            }
            entering
        };

        if entering_trustee {
            self.broadcast(RoomEvent::PlayerTrusteeActivated { seat }).await;
        }

        let Some(game) = self.game.as_mut() else { return };
        if game.turn_phase == mahjong::game::TurnPhase::AwaitingDraw {
            if game.draw(seat).is_err() {
                self.finish_game().await;
                return;
            }
        }

        let Some(game) = self.game.as_ref() else { return };
        match mahjong::trustee::choose_action(game, seat) {
            mahjong::trustee::TrusteeAction::DeclareSelfDrawWin => {
                let Some(game) = self.game.as_mut() else { return };
                if game.declare_self_draw_win(seat).is_ok() {
                    self.log.append(Some(seat), ActionPayload::SelfDrawWin, now);
                    self.finish_game().await;
                }
            }
            mahjong::trustee::TrusteeAction::Discard(tile_id) => {
                let Some(game) = self.game.as_mut() else { return };
                if game.discard(seat, tile_id, now).is_ok() {
                    self.log.append(Some(seat), ActionPayload::Discard { tile: tile_id }, now);
                    self.after_discard(seat, now).await;
                }
            }
            mahjong::trustee::TrusteeAction::Pass => {}
        }
    }

    async fn start_game(&mut self) {
        let user_ids: [u64; 3] = [
            self.room.player_slots[0].expect("room became READY, all seats filled"),
            self.room.player_slots[1].expect("room became READY, all seats filled"),
            self.room.player_slots[2].expect("room became READY, all seats filled"),
        ];

        let seed = rand::random::<u64>();
        let dealer_seat = (self.round_index % 3) as u8;
        let now = clock::now();

        match GameState::deal(
            self.room.room_id.clone(),
            self.game_id,
            self.room.config,
            seed,
            dealer_seat,
            self.round_index,
            user_ids,
            now,
        ) {
            Ok(game) => {
                self.room.status = RoomStatus::Playing;
                self.game = Some(game);
                self.log = ActionLog::new();
                self.arm_turn_timer(now).await;
                info!(room_id = %self.room.room_id, "dealt a new round");
            }
            Err(err) => {
                warn!(%err, "room's config cannot back a live deal");
            }
        }
    }

    async fn finish_game(&mut self) {
        let Some(game) = self.game.as_ref() else { return };
        let winners: Vec<u8> = game
            .players
            .iter()
            .filter(|p| p.score > 0 && game.phase == mahjong::game::Phase::Settlement)
            .map(|p| p.seat_index)
            .collect();

        let final_hands: Vec<Vec<mahjong::tile::Tile>> =
            game.players.iter().map(|p| p.hand().iter().map(|t| t.tile).collect()).collect();
        let settlement: HashMap<u8, i64> = game.players.iter().map(|p| (p.seat_index, p.score)).collect();

        let record = GameRecord {
            game_id: self.game_id,
            room_id: self.room.room_id.clone(),
            seed: game.seed,
            config: game.config,
            actions: self.log.entries().to_vec(),
            final_hands,
            settlement,
        };

        if self.record_store.put_record(&record).await.is_err() {
            warn!("record store write failed, game held in SETTLEMENT until it succeeds");
            return;
        }

        if let Some(game) = self.game.as_mut() {
            game.phase = mahjong::game::Phase::Finished;
        }
        self.game_id += 1;
        self.round_index += 1;
        self.broadcast(RoomEvent::GameEnd { winners }).await;
    }

    async fn send_snapshot(&mut self, user_id: u64, seat: u8) {
        let Some(game) = self.game.as_ref() else { return };
        let Some(conn) = self.connections.get(&user_id) else { return };

        // Personalized snapshot: own hand visible, others redacted to counts
        // (`spec.md` §4.10 reconnection protocol).
        let snapshot = json!({
            "seat": seat,
            "phase": format!("{:?}", game.phase),
            "currentSeat": game.current_seat,
            "ownHand": game.players[seat as usize].hand().iter().map(|t| t.tile.to_string()).collect::<Vec<_>>(),
            "otherHandCounts": game.players.iter()
                .map(|p| p.hand().len())
                .collect::<Vec<_>>(),
            "discardPile": game.discard_pile.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
        });

        let frame = Frame {
            frame_type: FrameType::Event,
            cmd: "snapshot".into(),
            room_id: self.room.room_id.clone(),
            request_id: None,
            data: snapshot,
            error: None,
        };
        let _ = conn.outbox.send(frame);
    }

    async fn broadcast(&mut self, event: RoomEvent) {
        let data = serde_json::to_value(&event).unwrap_or(json!({}));
        let cmd = match &event {
            RoomEvent::UserJoined { .. } => "userJoined",
            RoomEvent::UserLeft { .. } => "userLeft",
            RoomEvent::YourTurn { .. } => "yourTurn",
            RoomEvent::TurnChanged { .. } => "turnChanged",
            RoomEvent::PlayerAction { .. } => "playerAction",
            RoomEvent::GameStateUpdate => "gameStateUpdate",
            RoomEvent::PlayerDisconnected { .. } => "playerDisconnected",
            RoomEvent::PlayerReconnected { .. } => "playerReconnected",
            RoomEvent::PlayerTrusteeActivated { .. } => "playerTrusteeActivated",
            RoomEvent::GameEnd { .. } => "gameEnd",
        };

        let frame = Frame {
            frame_type: FrameType::Event,
            cmd: cmd.into(),
            room_id: self.room.room_id.clone(),
            request_id: None,
            data,
            error: None,
        };

        trace!(room_id = %self.room.room_id, cmd, "broadcasting event");
        for conn in self.connections.values() {
            let _ = conn.outbox.send(frame.clone());
        }
    }

    async fn persist_live(&mut self) {
        if let Some(game) = &self.game {
            if self.live_store.put_game_state(&self.room.room_id, game).await.is_err() {
                warn!(room_id = %self.room.room_id, "live-state write failed, continuing in memory (DEGRADED)");
            }
        }
    }

    fn room_id_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.room.room_id.hash(&mut hasher);
        hasher.finish()
    }
}

/// Builds the stable wire error reply for a rejected `/game/action` frame
/// (`spec.md` §7).
pub fn error_frame(room_id: &str, request_id: Option<String>, kind: &ErrorKind) -> Frame {
    Frame {
        frame_type: FrameType::Error,
        cmd: "error".into(),
        room_id: room_id.to_owned(),
        request_id,
        data: json!({}),
        error: Some(FrameError::from_kind(kind)),
    }
}

/// Resolves a wire-format `Tile` face to the specific concealed `TileId`
/// holding it, preferring the seat's current draw (so discarding the tile
/// just drawn doesn't require folding it into the hand first).
fn resolve_concealed_tile(game: &GameState, seat: u8, face: mahjong::tile::Tile) -> Option<mahjong::tile::TileId> {
    let player = &game.players[seat as usize];
    if let Some(draw) = player.current_draw {
        if draw.tile == face {
            return Some(draw.id);
        }
    }
    player.hand().iter().find(|t| t.tile == face).map(|t| t.id)
}

pub fn claim_action_kind(action: &str) -> Option<ActionKind> {
    match action {
        "peng" => Some(ActionKind::Peng),
        "gang" => Some(ActionKind::Gang),
        "chi" => Some(ActionKind::Chi),
        "hu" => Some(ActionKind::Hu),
        "pass" => None,
        _ => None,
    }
}

pub fn claim_kind_for_event(action: ActionKind) -> ClaimKind {
    match action {
        ActionKind::Peng => ClaimKind::Peng,
        ActionKind::Gang => ClaimKind::Gang,
        ActionKind::Chi => ClaimKind::Chi,
        _ => ClaimKind::Hu,
    }
}
