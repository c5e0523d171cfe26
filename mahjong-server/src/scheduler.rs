//! Real-clock implementation of `mahjong::scheduler::Scheduler` (`spec.md`
//! §4.7): each `arm()` call spawns a `tokio::time::sleep` that posts the
//! fired `TimeoutEvent` back onto the owning room's command queue. The room
//! actor is the only thing that ever reads the event; arming a second timer
//! for the same kind does not cancel the first — staleness is handled by
//! `mahjong::scheduler::is_stale` comparing `as_of_deadline` against the
//! live deadline when the event is dequeued.

use mahjong::scheduler::{Scheduler, TimeoutEvent, TimeoutKind};
use mahjong::time::Timestamp;
use tokio::sync::mpsc;

use crate::clock;
use crate::room_actor::RoomCommand;

pub struct TokioScheduler {
    room: mpsc::Sender<RoomCommand>,
}

impl TokioScheduler {
    pub fn new(room: mpsc::Sender<RoomCommand>) -> Self {
        Self { room }
    }
}

impl Scheduler for TokioScheduler {
    fn arm(&self, kind: TimeoutKind, room_id_hash: u64, deadline: Timestamp) {
        let room = self.room.clone();
        let delay = delay_until(deadline);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let event = TimeoutEvent { kind, room_id_hash, as_of_deadline: deadline };
            let _ = room.send(RoomCommand::TimeoutFired(event)).await;
        });
    }
}

/// `Timestamp` is seconds since the epoch (`mahjong::time`); convert the
/// absolute deadline into a `tokio::time`-relative duration, clamping to
/// zero for deadlines already in the past so a late `arm()` fires promptly
/// instead of panicking on `Duration` underflow.
fn delay_until(deadline: Timestamp) -> std::time::Duration {
    let now = clock::now();
    if deadline.0 <= now.0 {
        std::time::Duration::ZERO
    } else {
        std::time::Duration::from_secs(deadline.0 - now.0)
    }
}
