//! Settlement scoring (`spec.md` §4.3): turns a [`HandShape`] into a fan
//! count, then a per-player score delta balanced to zero-sum.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analyzer::{HandShape, WaitKind};
use crate::config::{HuTypes, ScoreConfig};

/// How a hand was completed, for the self-draw bonus and payment shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinSource {
    SelfDraw,
    Discard { discarder_seat: u8 },
}

/// One player's win, ready for settlement.
#[derive(Debug, Clone, Copy)]
pub struct Win {
    pub winner_seat: u8,
    pub shape: HandShape,
    pub source: WinSource,
    pub is_dealer: bool,
}

/// Additive fan contributions, in the exact order `spec.md` §4.3 lists them.
/// Seven Pairs is terminal: once it applies, nothing below it in the table
/// is evaluated.
pub fn compute_fan(shape: &HandShape, self_draw: bool, hu: &HuTypes) -> u32 {
    let mut fan = 1u32;

    if self_draw {
        fan += 1;
    }

    if shape.seven_pairs && hu.seven_pairs {
        fan += 4;
        return fan.min(13);
    }

    if shape.all_same_suit && hu.all_same_suit {
        fan += 8;
    }
    if shape.mixed_one_suit && hu.mixed_one_suit {
        fan += 3;
    }
    if shape.all_terminals_only && hu.all_terminals {
        fan += 10;
    }
    // The honor-inclusive "mixed" chanta variant (+2) never fires in this
    // dialect, since there are no honor tiles to mix with — see
    // `DESIGN.md`. Only the honors-free "pure" junchan variant applies.
    if shape.every_set_has_terminal && hu.all_terminals {
        fan += 4;
    }
    if shape.no_terminals && hu.no_terminals {
        fan += 1;
    }
    if shape.all_pungs && hu.all_pungs {
        fan += 6;
    }
    if shape.all_concealed && hu.all_concealed {
        fan += 2;
    }

    match shape.wait_kind {
        WaitKind::Pair => fan += 1,
        WaitKind::Edge if hu.edge_wait => fan += 1,
        _ => {}
    }

    if hu.concealed_pungs {
        if shape.concealed_pungs_count >= 4 {
            fan += 13;
        } else if shape.concealed_pungs_count == 3 {
            fan += 2;
        }
    }

    if hu.concealed_gangs && shape.concealed_gangs_count >= 3 {
        fan += 2;
    }

    fan.min(13)
}

/// Base score for one win, before the zero-sum payment split (`spec.md`
/// §4.3): `baseScore * fan`, multiplied again for a dealer win, capped at
/// `config.cap`. Gang bonuses are a separate, win/loss-independent payment
/// (see [`gang_bonus_deltas`]) and never enter this formula.
fn base_points(fan: u32, is_dealer: bool, config: &ScoreConfig) -> u32 {
    let mut points = config.base_score as f64 * fan as f64;
    if is_dealer {
        points *= config.dealer_mult;
    }
    (points.round() as u32).min(config.cap)
}

/// Picks the fan each of a simultaneous group of Hu declarations on the same
/// discard actually scores with (`spec.md` §4.3 "multi-winner handling").
///
/// When `config.multi_winner` is set, every winner keeps their win but each
/// fan is scaled by `max(0.5, 1/winnersCount)`, floored, minimum 1. When it
/// is unset, only one winner is kept: self-draw beats a discard win, then
/// higher raw fan, then proximity to `dealer_seat` in seat order.
fn resolve_multi_winner(
    wins: &[Win],
    hu: &HuTypes,
    config: &ScoreConfig,
    dealer_seat: u8,
) -> Vec<(Win, u32)> {
    let raw_fans: Vec<u32> = wins
        .iter()
        .map(|w| compute_fan(&w.shape, matches!(w.source, WinSource::SelfDraw), hu))
        .collect();

    if wins.len() <= 1 {
        return wins.iter().copied().zip(raw_fans).collect();
    }

    if config.multi_winner {
        let scale = (1.0_f64 / wins.len() as f64).max(0.5);
        wins.iter()
            .copied()
            .zip(raw_fans)
            .map(|(w, fan)| (w, ((fan as f64 * scale).floor() as u32).max(1)))
            .collect()
    } else {
        let best = wins
            .iter()
            .copied()
            .zip(raw_fans)
            .max_by_key(|(w, fan)| {
                let self_draw = matches!(w.source, WinSource::SelfDraw);
                let distance = (w.winner_seat as i32 - dealer_seat as i32).rem_euclid(3);
                (self_draw, *fan, std::cmp::Reverse(distance))
            })
            .expect("non-empty wins");
        vec![best]
    }
}

/// Settles a round's wins into per-seat score deltas. Every entry sums to
/// zero across all three seats, for every win processed (`spec.md` §4.3
/// invariant, §9 "multi-winner" open question resolved above).
///
/// Multiple simultaneous winners (`config.multi_winner`) each settle
/// independently against the discarder (or, on a self-draw, against both
/// other seats) — deltas accumulate rather than overwrite.
pub fn settle(
    wins: &[Win],
    hu: &HuTypes,
    config: &ScoreConfig,
    all_seats: [u8; 3],
    dealer_seat: u8,
) -> HashMap<u8, i64> {
    let mut deltas: HashMap<u8, i64> = all_seats.iter().map(|&s| (s, 0i64)).collect();

    for (win, fan) in resolve_multi_winner(wins, hu, config, dealer_seat) {
        let points = base_points(fan, win.is_dealer, config) as i64;

        match win.source {
            WinSource::SelfDraw => {
                // Winner's full score after the self-draw multiplier; split
                // equally between the two losers (`spec.md` §4.3). An odd
                // winner score leaves a 1-point remainder, absorbed by the
                // dealer if one of the losers is the dealer, else by the
                // lowest-seated loser.
                let bonus = (points as f64 * config.self_draw_bonus).round() as i64;
                let winner_score = points + bonus;
                let half = winner_score / 2;
                let remainder = winner_score - half * 2;

                let mut loser_seats: Vec<u8> =
                    all_seats.iter().copied().filter(|&s| s != win.winner_seat).collect();
                loser_seats.sort_unstable();
                let remainder_seat = if loser_seats.contains(&dealer_seat) {
                    dealer_seat
                } else {
                    loser_seats[0]
                };

                for &seat in &loser_seats {
                    let pay = if seat == remainder_seat { half + remainder } else { half };
                    *deltas.get_mut(&seat).unwrap() -= pay;
                }
                *deltas.get_mut(&win.winner_seat).unwrap() += winner_score;
            }
            WinSource::Discard { discarder_seat } => {
                let loser_share = (points as f64 * config.discard_loser_share).round() as i64;
                for &seat in &all_seats {
                    if seat == win.winner_seat {
                        *deltas.get_mut(&seat).unwrap() += points + loser_share;
                    } else if seat == discarder_seat {
                        *deltas.get_mut(&seat).unwrap() -= points;
                    } else {
                        *deltas.get_mut(&seat).unwrap() -= loser_share;
                    }
                }
            }
        }
    }

    deltas
}

/// Per-gang bonus payments (`spec.md` §4.3), independent of who wins or
/// loses the round: every other seat pays the gang's owner.
pub fn gang_bonus_deltas(
    gangs: &[(u8, crate::player::GangKind)],
    config: &ScoreConfig,
    all_seats: [u8; 3],
) -> HashMap<u8, i64> {
    use crate::player::GangKind;

    let mut deltas: HashMap<u8, i64> = all_seats.iter().map(|&s| (s, 0i64)).collect();

    for &(owner, kind) in gangs {
        let per_opponent = match kind {
            GangKind::An => config.gang_bonus as i64 * 4,
            GangKind::Ming | GangKind::Bu => config.gang_bonus as i64 * 2,
        };
        for &seat in &all_seats {
            if seat == owner {
                *deltas.get_mut(&seat).unwrap() += per_opponent * 2;
            } else {
                *deltas.get_mut(&seat).unwrap() -= per_opponent;
            }
        }
    }

    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::HandShape;

    fn shape(wait_kind: WaitKind) -> HandShape {
        HandShape {
            seven_pairs: false,
            all_pungs: false,
            all_same_suit: false,
            mixed_one_suit: false,
            all_terminals_only: false,
            every_set_has_terminal: false,
            no_terminals: false,
            all_concealed: false,
            concealed_pungs_count: 0,
            concealed_gangs_count: 0,
            wait_kind,
        }
    }

    #[test]
    fn base_fan_is_one_plus_self_draw() {
        let hu = HuTypes::scenario_suite();
        assert_eq!(compute_fan(&shape(WaitKind::Middle), false, &hu), 1);
        assert_eq!(compute_fan(&shape(WaitKind::Middle), true, &hu), 2);
    }

    #[test]
    fn seven_pairs_skips_remaining_bonuses() {
        let hu = HuTypes::all_enabled();
        let mut s = shape(WaitKind::Pair);
        s.seven_pairs = true;
        s.all_pungs = true;
        assert_eq!(compute_fan(&s, false, &hu), 5);
    }

    #[test]
    fn settlement_is_zero_sum_on_discard_win() {
        let win = Win {
            winner_seat: 0,
            shape: shape(WaitKind::Edge),
            source: WinSource::Discard { discarder_seat: 1 },
            is_dealer: false,
        };
        let deltas = settle(&[win], &HuTypes::scenario_suite(), &ScoreConfig::default(), [0, 1, 2], 0);
        let total: i64 = deltas.values().sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn settlement_is_zero_sum_on_self_draw() {
        let win = Win {
            winner_seat: 2,
            shape: shape(WaitKind::Pair),
            source: WinSource::SelfDraw,
            is_dealer: true,
        };
        let deltas = settle(&[win], &HuTypes::scenario_suite(), &ScoreConfig::default(), [0, 1, 2], 0);
        let total: i64 = deltas.values().sum();
        assert_eq!(total, 0);
    }

    /// `spec.md` §8 scenario 1: dealer self-draw, fan = 1 (base) + 1
    /// (self-draw) = 2. `10*2=20 -> x2.0 dealer -> 40 -> x1.5 self-draw ->
    /// 60`; A +60, B -30, C -30.
    #[test]
    fn spec_scenario_one_basic_self_draw() {
        let win = Win {
            winner_seat: 0,
            shape: shape(WaitKind::Middle),
            source: WinSource::SelfDraw,
            is_dealer: true,
        };
        let deltas = settle(&[win], &HuTypes::scenario_suite(), &ScoreConfig::default(), [0, 1, 2], 0);
        assert_eq!(deltas[&0], 60);
        assert_eq!(deltas[&1], -30);
        assert_eq!(deltas[&2], -30);
    }

    /// `spec.md` §8 scenario 2: won on discard with an edge wait, fan =
    /// 1 + 1 = 2, winner score 20, no dealer. C (discarder) pays 20, A pays
    /// 20/4=5, B (winner) receives 25.
    #[test]
    fn spec_scenario_two_discard_edge_wait() {
        let win = Win {
            winner_seat: 1,
            shape: shape(WaitKind::Edge),
            source: WinSource::Discard { discarder_seat: 2 },
            is_dealer: false,
        };
        let deltas = settle(&[win], &HuTypes::scenario_suite(), &ScoreConfig::default(), [0, 1, 2], 0);
        assert_eq!(deltas[&0], -5);
        assert_eq!(deltas[&1], 25);
        assert_eq!(deltas[&2], -20);
    }

    /// `spec.md` §8 scenario 3: seven pairs self-draw by a non-dealer. Fan
    /// = 1 + 1 (self-draw) + 4 (SevenPairs) = 6. `10*6=60 x1 x1.5=90`; A and
    /// B each pay 45.
    #[test]
    fn spec_scenario_three_seven_pairs_self_draw() {
        let mut s = shape(WaitKind::Pair);
        s.seven_pairs = true;
        let win = Win {
            winner_seat: 2,
            shape: s,
            source: WinSource::SelfDraw,
            is_dealer: false,
        };
        let deltas = settle(&[win], &HuTypes::scenario_suite(), &ScoreConfig::default(), [0, 1, 2], 0);
        assert_eq!(deltas[&0], -45);
        assert_eq!(deltas[&1], -45);
        assert_eq!(deltas[&2], 90);
    }
}
