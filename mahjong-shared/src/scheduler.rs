//! The scheduler seam (`spec.md` §4.7): one logical timer per active
//! deadline, firing a `TimeoutEvent` back through the owning room's
//! single-writer queue.
//!
//! This trait is the one place the core crate admits it doesn't own time —
//! concrete scheduling (real timers, real queues) is the server crate's job
//! (`SPEC_FULL.md` §4.7); the core only needs to *ask* for a deadline and
//! later compare the fired event's `as_of_deadline` against the live one,
//! ignoring anything stale.

use crate::time::Timestamp;

/// Which deadline fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Turn,
    ClaimWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutEvent {
    pub kind: TimeoutKind,
    pub room_id_hash: u64,
    pub as_of_deadline: Timestamp,
}

/// Arms a single deadline for a room. Implementors own the actual timer
/// (e.g. `tokio::time::sleep`) and are responsible for posting the
/// resulting `TimeoutEvent` back onto the room's serialized queue once it
/// fires — scheduling itself never mutates `GameState` directly.
pub trait Scheduler {
    fn arm(&self, kind: TimeoutKind, room_id_hash: u64, deadline: Timestamp);
}

/// A scheduler that never fires, for tests and replay where deadlines are
/// driven explicitly rather than by a real clock.
#[derive(Debug, Default)]
pub struct NullScheduler;

impl Scheduler for NullScheduler {
    fn arm(&self, _kind: TimeoutKind, _room_id_hash: u64, _deadline: Timestamp) {}
}

/// A stale `TimeoutEvent` is one whose `as_of_deadline` no longer matches
/// the live deadline — the deadline moved since the timer was armed, so the
/// event is ignored rather than cancelled (`spec.md` §4.7).
pub fn is_stale(event: &TimeoutEvent, live_deadline: Timestamp) -> bool {
    event.as_of_deadline != live_deadline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_deadline_is_not_stale() {
        let event = TimeoutEvent { kind: TimeoutKind::Turn, room_id_hash: 1, as_of_deadline: Timestamp(10) };
        assert!(!is_stale(&event, Timestamp(10)));
    }

    #[test]
    fn shifted_deadline_is_stale() {
        let event = TimeoutEvent { kind: TimeoutKind::Turn, room_id_hash: 1, as_of_deadline: Timestamp(10) };
        assert!(is_stale(&event, Timestamp(20)));
    }
}
