//! Immutable per-room rule configuration (`spec.md` §3 `Config`, §9 "Builder/
//! config-object DTOs become a single immutable `Config` struct validated at
//! room creation").

use serde::{Deserialize, Serialize};

/// Which suits are in play. `WAN_ONLY` plays a 36-tile deck, `ALL_SUITS` a
/// 108-tile deck (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileSet {
    WanOnly,
    AllSuits,
}

impl TileSet {
    pub fn deck_size(self) -> usize {
        match self {
            TileSet::WanOnly => 36,
            TileSet::AllSuits => 108,
        }
    }
}

/// Which hand-type fan bonuses are enabled for this room, per `spec.md`
/// §4.3's fan table. Each flag gates the corresponding row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HuTypes {
    pub seven_pairs: bool,
    pub all_same_suit: bool,
    pub mixed_one_suit: bool,
    pub all_terminals: bool,
    pub no_terminals: bool,
    pub all_pungs: bool,
    pub all_concealed: bool,
    pub edge_wait: bool,
    pub concealed_pungs: bool,
    pub concealed_gangs: bool,
}

impl HuTypes {
    /// Only the flags exercised by the spec's seeded end-to-end scenarios
    /// (`spec.md` §8): `SevenPairs`, `AllPungs`, `SelfDraw`, `EdgeWait`.
    /// Self-draw itself is not a flag — it's always scored, per the fan
    /// table's unconditional `+1` row.
    pub fn scenario_suite() -> Self {
        Self {
            seven_pairs: true,
            all_same_suit: false,
            mixed_one_suit: false,
            all_terminals: false,
            no_terminals: false,
            all_pungs: true,
            all_concealed: false,
            edge_wait: true,
            concealed_pungs: false,
            concealed_gangs: false,
        }
    }

    pub fn all_enabled() -> Self {
        Self {
            seven_pairs: true,
            all_same_suit: true,
            mixed_one_suit: true,
            all_terminals: true,
            no_terminals: true,
            all_pungs: true,
            all_concealed: true,
            edge_wait: true,
            concealed_pungs: true,
            concealed_gangs: true,
        }
    }
}

/// Scoring knobs (`spec.md` §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub base_score: u32,
    pub dealer_mult: f64,
    pub self_draw_bonus: f64,
    pub gang_bonus: u32,
    pub cap: u32,
    pub multi_winner: bool,
    /// Fraction of `winnerScore` a non-discarder pays when the hand was won
    /// on a discard; defaults to `0.25` per `spec.md` §4.3 and §9's open
    /// question resolution (see `DESIGN.md`).
    pub discard_loser_share: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            base_score: 10,
            dealer_mult: 2.0,
            self_draw_bonus: 0.5,
            gang_bonus: 5,
            cap: 1000,
            multi_winner: true,
            discard_loser_share: 0.25,
        }
    }
}

/// Turn/deadline knobs (`spec.md` §4.7, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnConfig {
    pub turn_seconds: u32,
    pub action_seconds: u32,
    pub auto_trustee: bool,
    pub trustee_timeout_count: u32,
    pub grace_period_seconds: u32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            turn_seconds: 20,
            action_seconds: 8,
            auto_trustee: true,
            trustee_timeout_count: 3,
            grace_period_seconds: 30,
        }
    }
}

/// Dealer rotation policy (`spec.md` §3 `Config.dealer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealerRotation {
    /// The dealer seat rotates to the next seat every round regardless of
    /// outcome.
    Rotating,
    /// The dealer stays dealer as long as they win or the round draws out.
    WinnerKeepsDeal,
}

/// Vote threshold for early room dissolution (`spec.md` §3 `Config.dismiss`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DismissConfig {
    pub vote_threshold: u8,
}

impl Default for DismissConfig {
    fn default() -> Self {
        Self { vote_threshold: 2 }
    }
}

/// The full, immutable per-room rule set (`spec.md` §3 `Config`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub players: u8,
    pub tiles: TileSet,
    pub allow_peng: bool,
    pub allow_gang: bool,
    pub allow_chi: bool,
    pub hu_types: HuTypes,
    pub score: ScoreConfig,
    pub turn: TurnConfig,
    pub dealer: DealerRotation,
    pub dismiss: DismissConfig,
}

impl Config {
    /// Validates the invariants `spec.md` assumes of every `Config`: exactly
    /// three players, and fan flags that don't silently no-op (e.g.
    /// `mixed_one_suit` only makes sense with `ALL_SUITS`).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.players != 3 {
            return Err(ConfigError::UnsupportedPlayerCount(self.players));
        }

        if self.tiles == TileSet::WanOnly && self.hu_types.mixed_one_suit {
            return Err(ConfigError::MixedOneSuitRequiresAllSuits);
        }

        if self.score.discard_loser_share < 0.0 || self.score.discard_loser_share > 1.0 {
            return Err(ConfigError::InvalidDiscardLoserShare(
                self.score.discard_loser_share,
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            players: 3,
            tiles: TileSet::WanOnly,
            allow_peng: true,
            allow_gang: true,
            allow_chi: true,
            hu_types: HuTypes::scenario_suite(),
            score: ScoreConfig::default(),
            turn: TurnConfig::default(),
            dealer: DealerRotation::Rotating,
            dismiss: DismissConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("this variant only supports 3 players, got {0}")]
    UnsupportedPlayerCount(u8),

    #[error("MixedOneSuit requires ALL_SUITS tiles")]
    MixedOneSuitRequiresAllSuits,

    #[error("discard_loser_share must be in [0, 1], got {0}")]
    InvalidDiscardLoserShare(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_mixed_one_suit_with_wan_only() {
        let mut config = Config::default();
        config.hu_types.mixed_one_suit = true;
        assert_eq!(
            config.validate(),
            Err(ConfigError::MixedOneSuitRequiresAllSuits)
        );
    }

    #[test]
    fn rejects_non_three_player_counts() {
        let mut config = Config::default();
        config.players = 4;
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnsupportedPlayerCount(4))
        );
    }
}
