//! Process entry point: wires the two transport channels `spec.md` §6
//! describes — HTTP/JSON for room lifecycle, WebSocket for live play — onto
//! the room registry, and starts the background inactivity sweep
//! (`spec.md` §4.9). Replaces the teacher's single ambient `GameState`
//! actor + `thespian`-handshake socket pump with the registry/room-actor
//! architecture described in `DESIGN.md`.

use std::convert::Infallible;
use std::sync::Arc;

use mahjong::config::Config;
use mahjong::error::ErrorKind;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{info, warn, Level};
use warp::http::StatusCode;
use warp::{reject, Filter, Rejection, Reply};

mod auth;
mod client;
mod clock;
mod persistence;
mod registry;
mod room_actor;
mod scheduler;

use auth::Authenticator;
use persistence::{InMemoryLiveStore, InMemoryRecordStore, RetryingLiveStore};
use registry::Registry;
use room_actor::RoomCommand;

/// Knobs that live outside any one room's [`Config`] because they govern
/// the session/registry layer rather than game rules (`spec.md` §4.9/§4.10):
/// the inactivity sweep cadence and the reconnection grace window.
struct DeploymentConfig {
    cleanup_interval_minutes: u64,
    inactive_threshold_secs: u64,
    max_reconnect_minutes: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self { cleanup_interval_minutes: 5, inactive_threshold_secs: 30 * 60, max_reconnect_minutes: 5 }
    }
}

#[tokio::main]
async fn main() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let jwt_secret = std::env::var("MAHJONG_JWT_SECRET").unwrap_or_else(|_| {
        warn!("MAHJONG_JWT_SECRET not set, using an insecure development default");
        "dev-secret-do-not-use-in-production".to_owned()
    });
    let authenticator = Arc::new(Authenticator::new(jwt_secret.into_bytes()));

    let live_store = Arc::new(RetryingLiveStore::new(InMemoryLiveStore::new()));
    let record_store = Arc::new(InMemoryRecordStore::new());
    let deployment = DeploymentConfig::default();
    let registry =
        Arc::new(Registry::new(live_store, record_store.clone(), deployment.max_reconnect_minutes));

    spawn_cleanup_task(registry.clone(), deployment.cleanup_interval_minutes, deployment.inactive_threshold_secs);

    let routes = http_routes(registry.clone(), authenticator.clone(), record_store)
        .or(ws_route(registry, authenticator));

    info!("mahjong-server listening on 127.0.0.1:3030");
    warp::serve(routes).run(([127, 0, 0, 1], 3030)).await;
}

fn spawn_cleanup_task(registry: Arc<Registry>, interval_minutes: u64, inactive_threshold_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_minutes * 60));
        loop {
            ticker.tick().await;
            registry.sweep_inactive(clock::now(), inactive_threshold_secs).await;
        }
    });
}

fn with_registry(
    registry: Arc<Registry>,
) -> impl Filter<Extract = (Arc<Registry>,), Error = Infallible> + Clone {
    warp::any().map(move || registry.clone())
}

fn with_auth(
    authenticator: Arc<Authenticator>,
) -> impl Filter<Extract = (Arc<Authenticator>,), Error = Infallible> + Clone {
    warp::any().map(move || authenticator.clone())
}

/// Extracts and authenticates the `Authorization: Bearer <token>` header
/// (`spec.md` §6), rejecting with [`AuthRejection`] on failure.
fn authenticated_user(
    authenticator: Arc<Authenticator>,
) -> impl Filter<Extract = (u64,), Error = Rejection> + Clone {
    warp::header::<String>("authorization").and(with_auth(authenticator)).and_then(
        |header: String, authenticator: Arc<Authenticator>| async move {
            let token = Authenticator::strip_bearer(&header).map_err(|_| reject::custom(AuthRejection))?;
            authenticator.authenticate(token).map_err(|_| reject::custom(AuthRejection))
        },
    )
}

#[derive(Debug)]
struct AuthRejection;
impl reject::Reject for AuthRejection {}

fn http_routes(
    registry: Arc<Registry>,
    authenticator: Arc<Authenticator>,
    record_store: Arc<InMemoryRecordStore>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let create_room = warp::path!("rooms")
        .and(warp::post())
        .and(warp::body::json())
        .and(authenticated_user(authenticator.clone()))
        .and(with_registry(registry.clone()))
        .and_then(handle_create_room);

    let join_room = warp::path!("rooms" / String / "join")
        .and(warp::post())
        .and(authenticated_user(authenticator.clone()))
        .and(with_registry(registry.clone()))
        .and_then(handle_join_room);

    let leave_room = warp::path!("rooms" / String / "leave")
        .and(warp::post())
        .and(authenticated_user(authenticator.clone()))
        .and(with_registry(registry.clone()))
        .and_then(handle_leave_room);

    let dissolve_room = warp::path!("rooms" / String / "dissolve")
        .and(warp::post())
        .and(authenticated_user(authenticator.clone()))
        .and(with_registry(registry.clone()))
        .and_then(handle_dissolve_room);

    let get_room = warp::path!("rooms" / String)
        .and(warp::get())
        .and(authenticated_user(authenticator.clone()))
        .and(with_registry(registry.clone()))
        .and_then(handle_get_room);

    let list_user_rooms = warp::path!("users" / u64 / "rooms")
        .and(warp::get())
        .and(authenticated_user(authenticator.clone()))
        .and(with_registry(registry.clone()))
        .and_then(handle_list_user_rooms);

    let room_history = warp::path!("rooms" / String / "history")
        .and(warp::get())
        .and(authenticated_user(authenticator))
        .and(with_record_store(record_store))
        .and_then(handle_room_history);

    create_room
        .or(join_room)
        .or(leave_room)
        .or(dissolve_room)
        .or(get_room)
        .or(list_user_rooms)
        .or(room_history)
        .recover(handle_rejection)
}

fn with_record_store(
    record_store: Arc<InMemoryRecordStore>,
) -> impl Filter<Extract = (Arc<InMemoryRecordStore>,), Error = Infallible> + Clone {
    warp::any().map(move || record_store.clone())
}

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    #[serde(default)]
    config: Option<Config>,
}

async fn handle_create_room(
    body: CreateRoomRequest,
    user_id: u64,
    registry: Arc<Registry>,
) -> Result<impl Reply, Rejection> {
    let config = body.config.unwrap_or_default();
    if config.validate().is_err() {
        return Ok(warp::reply::with_status(
            warp::reply::json(&json!({"error": {"code": "INVALID_INPUT", "message": "invalid config"}})),
            StatusCode::BAD_REQUEST,
        ));
    }

    match registry.create_room(user_id, config, clock::now()).await {
        Ok(room_id) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({"roomId": room_id})),
            StatusCode::CREATED,
        )),
        Err(err) => Ok(error_reply(&client::room_error_to_error_kind(err))),
    }
}

async fn handle_join_room(
    room_id: String,
    user_id: u64,
    registry: Arc<Registry>,
) -> Result<impl Reply, Rejection> {
    let Some(sender) = registry.room_sender(&room_id).await else {
        return Ok(error_reply(&ErrorKind::RoomNotFound));
    };

    let (tx, rx) = mpsc_outbox();
    let (respond_to, response) = oneshot::channel();
    if sender.send(RoomCommand::Join { user_id, outbox: tx, respond_to }).await.is_err() {
        return Ok(error_reply(&ErrorKind::RoomNotFound));
    }
    drop(rx);

    match response.await {
        Ok(Ok(seat)) => {
            registry.attach(user_id, room_id).await;
            Ok(warp::reply::with_status(warp::reply::json(&json!({"seat": seat})), StatusCode::OK))
        }
        Ok(Err(room_err)) => Ok(error_reply(&client::room_error_to_error_kind(room_err))),
        Err(_) => Ok(error_reply(&ErrorKind::RoomNotFound)),
    }
}

async fn handle_leave_room(
    room_id: String,
    user_id: u64,
    registry: Arc<Registry>,
) -> Result<impl Reply, Rejection> {
    let Some(sender) = registry.room_sender(&room_id).await else {
        return Ok(error_reply(&ErrorKind::RoomNotFound));
    };
    let _ = sender.send(RoomCommand::Leave { user_id }).await;
    Ok(warp::reply::with_status(warp::reply::json(&json!({"ok": true})), StatusCode::OK))
}

async fn handle_dissolve_room(
    room_id: String,
    _user_id: u64,
    registry: Arc<Registry>,
) -> Result<impl Reply, Rejection> {
    let Some(sender) = registry.room_sender(&room_id).await else {
        return Ok(error_reply(&ErrorKind::RoomNotFound));
    };
    let _ = sender.send(RoomCommand::Dissolve).await;
    registry.remove_room(&room_id).await;
    Ok(warp::reply::with_status(warp::reply::json(&json!({"ok": true})), StatusCode::OK))
}

async fn handle_get_room(
    room_id: String,
    _user_id: u64,
    registry: Arc<Registry>,
) -> Result<impl Reply, Rejection> {
    let Some(sender) = registry.room_sender(&room_id).await else {
        return Ok(error_reply(&ErrorKind::RoomNotFound));
    };
    let (respond_to, response) = oneshot::channel();
    if sender.send(RoomCommand::Describe { respond_to }).await.is_err() {
        return Ok(error_reply(&ErrorKind::RoomNotFound));
    }
    match response.await {
        Ok(summary) => Ok(warp::reply::with_status(warp::reply::json(&summary), StatusCode::OK)),
        Err(_) => Ok(error_reply(&ErrorKind::RoomNotFound)),
    }
}

async fn handle_list_user_rooms(
    target_user_id: u64,
    _user_id: u64,
    registry: Arc<Registry>,
) -> Result<impl Reply, Rejection> {
    let rooms = registry.rooms_for_user(target_user_id).await;
    Ok(warp::reply::with_status(warp::reply::json(&json!({"rooms": rooms})), StatusCode::OK))
}

async fn handle_room_history(
    room_id: String,
    _user_id: u64,
    record_store: Arc<InMemoryRecordStore>,
) -> Result<impl Reply, Rejection> {
    let records = record_store.records().await;
    let matching: Vec<_> = records.into_iter().filter(|r| r.room_id == room_id).collect();
    Ok(warp::reply::with_status(warp::reply::json(&matching), StatusCode::OK))
}

fn error_reply(kind: &ErrorKind) -> warp::reply::WithStatus<warp::reply::Json> {
    let status = match kind {
        ErrorKind::RoomNotFound => StatusCode::NOT_FOUND,
        ErrorKind::RoomFull | ErrorKind::RoomClosed => StatusCode::CONFLICT,
        ErrorKind::UserBanned => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_REQUEST,
    };
    warp::reply::with_status(
        warp::reply::json(&json!({"error": {"code": kind.code(), "message": kind.to_string()}})),
        status,
    )
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if err.find::<AuthRejection>().is_some() {
        return Ok(warp::reply::with_status(
            warp::reply::json(&json!({"error": {"code": "USER_BANNED", "message": "invalid or missing bearer token"}})),
            StatusCode::UNAUTHORIZED,
        ));
    }
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({"error": {"code": "INVALID_INPUT", "message": "not found"}})),
        StatusCode::NOT_FOUND,
    ))
}

/// The WebSocket upgrade carries its bearer token as a query parameter
/// (`?token=`) rather than an `Authorization` header: browsers' WebSocket
/// API cannot set custom headers on the handshake request, so this is the
/// conventional workaround the rest of the ecosystem uses for the live-play
/// channel; the HTTP/JSON lifecycle endpoints keep the header form
/// `spec.md` §6 specifies.
#[derive(Debug, Deserialize)]
struct WsAuthQuery {
    token: String,
}

fn ws_route(
    registry: Arc<Registry>,
    authenticator: Arc<Authenticator>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("ws")
        .and(warp::ws())
        .and(warp::query::<WsAuthQuery>())
        .and(with_registry(registry))
        .and(with_auth(authenticator))
        .and_then(|ws: warp::ws::Ws, query: WsAuthQuery, registry: Arc<Registry>, authenticator: Arc<Authenticator>| async move {
            match authenticator.authenticate(&query.token) {
                Ok(user_id) => Ok(ws.on_upgrade(move |socket| client::run_session(user_id, socket, registry))),
                Err(_) => Err(reject::custom(AuthRejection)),
            }
        })
}

fn mpsc_outbox() -> (room_actor::Outbox, tokio::sync::mpsc::UnboundedReceiver<mahjong::messages::Frame>) {
    tokio::sync::mpsc::unbounded_channel()
}
