//! Deterministic trustee autoplay (`spec.md` §4.8): takes over a seat that
//! has been disconnected past the grace period, or has timed out too many
//! times in a row.

use crate::game::GameState;
use crate::player::{ActionKind, PlayerStatus};
use crate::time::Timestamp;

/// Whether `seat` should be placed under trustee control right now.
pub fn should_trustee(game: &GameState, seat: u8, now: Timestamp) -> bool {
    let player = &game.players[seat as usize];

    if let Some(disconnected_at) = player.disconnected_at {
        if now.saturating_sub(disconnected_at) >= game.config.turn.grace_period_seconds as u64 {
            return true;
        }
    }

    player.timeout_count >= game.config.turn.trustee_timeout_count
}

/// A single trustee-chosen action for `seat`, applied through the same
/// `GameState` methods a live client would use (`spec.md` §4.8 policy: take
/// Hu if available; otherwise discard the rightmost tile; otherwise pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrusteeAction {
    DeclareSelfDrawWin,
    Discard(crate::tile::TileId),
    Pass,
}

/// Chooses the trustee's next action for `seat`. Never claims on someone
/// else's discard beyond taking an available `Hu`.
pub fn choose_action(game: &GameState, seat: u8) -> TrusteeAction {
    let player = &game.players[seat as usize];

    if player.available_actions.contains(&ActionKind::Hu) {
        return TrusteeAction::DeclareSelfDrawWin;
    }

    if game.claim_window.is_some() {
        return TrusteeAction::Pass;
    }

    if player.available_actions.contains(&ActionKind::Discard) {
        // "Rightmost" = most recently drawn/held tile; the hand is kept
        // sorted by draw order is not guaranteed, so fall back to the
        // highest-sorting tile as a deterministic stand-in for "newest".
        if let Some(current_draw) = player.current_draw {
            return TrusteeAction::Discard(current_draw.id);
        }
        if let Some(last) = player.hand().last() {
            return TrusteeAction::Discard(last.id);
        }
    }

    TrusteeAction::Pass
}

pub fn enters_trustee(status: PlayerStatus) -> bool {
    matches!(status, PlayerStatus::Disconnected | PlayerStatus::Playing | PlayerStatus::WaitingTurn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TileSet};
    use crate::game::GameState;

    /// `WAN_ONLY` can't back a live deal (`DESIGN.md` "WAN_ONLY deal size").
    fn dealable_config() -> Config {
        Config { tiles: TileSet::AllSuits, ..Config::default() }
    }

    #[test]
    fn grace_period_triggers_trustee() {
        let mut game = GameState::deal("123456".into(), 1, dealable_config(), 1, 0, 0, [1, 2, 3], Timestamp(0)).unwrap();
        game.players[1].disconnected_at = Some(Timestamp(0));
        assert!(should_trustee(&game, 1, Timestamp(31)));
        assert!(!should_trustee(&game, 1, Timestamp(10)));
    }

    #[test]
    fn repeated_timeouts_trigger_trustee() {
        let mut game = GameState::deal("123456".into(), 1, dealable_config(), 1, 0, 0, [1, 2, 3], Timestamp(0)).unwrap();
        game.players[2].timeout_count = 3;
        assert!(should_trustee(&game, 2, Timestamp(0)));
    }

    #[test]
    fn trustee_discards_current_draw_when_holding_one() {
        let game = GameState::deal("123456".into(), 1, dealable_config(), 1, 0, 0, [1, 2, 3], Timestamp(0)).unwrap();
        match choose_action(&game, 0) {
            TrusteeAction::Discard(id) => assert_eq!(id, game.players[0].current_draw.unwrap().id),
            other => panic!("expected a discard, got {other:?}"),
        }
    }
}
