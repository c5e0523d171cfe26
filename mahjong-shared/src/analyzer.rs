//! The hand analyzer (`spec.md` §4.2): decides whether a declared winning
//! tile completes a legal hand, and derives the hand-shape facts the score
//! calculator (`crate::score`) turns into a fan count.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::player::Meld;
use crate::player::MeldKind;
use crate::tile::Tile;

/// The kind of wait the winning tile completed (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitKind {
    /// Completes a pair (either the hand's head pair, or the third tile of
    /// what would otherwise be a triplet — both are "waiting on a match").
    Pair,
    /// Completes a sequence only because the hand lacks the tile on the
    /// outer end: `1-2` waiting on `3`, or `8-9` waiting on `7`.
    Edge,
    /// Completes the middle of a sequence (`3-5` waiting on `4`), or an
    /// otherwise two-sided sequence wait that isn't one of the two `Edge`
    /// shapes above. This dialect's glossary only names four wait kinds, so
    /// ordinary two-sided ("ryanmen") waits are folded into `Middle` here —
    /// both carry no fan bonus, so the distinction is cosmetic. See
    /// `DESIGN.md` for this open-question resolution.
    Middle,
    /// The winning tile completes the hand in more than one structurally
    /// distinct way.
    Multiple,
}

/// Facts about a decomposed winning hand that the score calculator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandShape {
    pub seven_pairs: bool,
    pub all_pungs: bool,
    pub all_same_suit: bool,
    pub mixed_one_suit: bool,
    /// Every physical tile (hand + melds) is a terminal (rank 1 or 9).
    pub all_terminals_only: bool,
    /// Every set, including the pair, contains at least one terminal tile,
    /// but not every tile is a terminal (junchan-style; honors don't exist
    /// in this dialect so the honor-inclusive "mixed" variant never fires —
    /// see `DESIGN.md`).
    pub every_set_has_terminal: bool,
    pub no_terminals: bool,
    pub all_concealed: bool,
    pub concealed_pungs_count: u32,
    pub concealed_gangs_count: u32,
    pub wait_kind: WaitKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupShape {
    Pair(Tile),
    Triplet(Tile),
    Sequence(Tile),
}

/// Analyzes a declared win. `concealed_hand` must NOT already include
/// `winning_tile` — it is added internally, matching `spec.md` §4.2 step 1.
/// Returns `None` if the tiles do not form a legal win under this dialect's
/// rules (caller maps that to `ErrorKind::InvalidWin`).
pub fn analyze_win(concealed_hand: &[Tile], melds: &[Meld], winning_tile: Tile) -> Option<HandShape> {
    let mut working: Vec<Tile> = concealed_hand.to_vec();
    working.push(winning_tile);

    let gang_count = melds.iter().filter(|m| m.is_gang()).count();
    let non_gang_melds = melds.len() - gang_count;
    let meld_tile_count = non_gang_melds * 3 + gang_count * 4;

    if working.len() + meld_tile_count != 14 + gang_count {
        return None;
    }

    if melds.is_empty() && working.len() == 14 {
        if let Some(shape) = try_seven_pairs(&working) {
            return Some(shape);
        }
    }

    let sets_needed = 4 - melds.len();
    let counts = to_counts(&working);
    let decompositions = decompose_all(counts, sets_needed);
    if decompositions.is_empty() {
        return None;
    }

    Some(build_hand_shape(&decompositions, melds, winning_tile))
}

fn try_seven_pairs(working: &[Tile]) -> Option<HandShape> {
    let counts = to_counts(working);
    if counts.len() != 7 || counts.values().any(|&c| c != 2) {
        return None;
    }

    Some(HandShape {
        seven_pairs: true,
        all_pungs: false,
        all_same_suit: suit_count(working) == 1,
        mixed_one_suit: suit_count(working) == 2,
        all_terminals_only: working.iter().all(|t| t.is_terminal()),
        every_set_has_terminal: false,
        no_terminals: working.iter().all(|t| !t.is_terminal()),
        all_concealed: true,
        concealed_pungs_count: 0,
        concealed_gangs_count: 0,
        wait_kind: WaitKind::Pair,
    })
}

fn to_counts(tiles: &[Tile]) -> BTreeMap<Tile, u8> {
    let mut counts = BTreeMap::new();
    for &t in tiles {
        *counts.entry(t).or_insert(0) += 1;
    }
    counts
}

fn suit_count(tiles: &[Tile]) -> usize {
    tiles
        .iter()
        .map(|t| t.suit)
        .collect::<std::collections::HashSet<_>>()
        .len()
}

/// Canonical left-to-right backtracking decomposition (`spec.md` §4.2 step
/// 4): at the lowest remaining tile, try pair / triplet / sequence in that
/// order, recursing into every branch (not just the first success) so that
/// wait-kind ambiguity (`MULTIPLE`) can be detected across all valid shapes.
fn decompose_all(counts: BTreeMap<Tile, u8>, sets_needed: usize) -> Vec<Vec<GroupShape>> {
    let mut results = Vec::new();
    let mut current = Vec::new();
    let mut counts = counts;
    decompose_rec(&mut counts, sets_needed, false, &mut current, &mut results);
    results
}

fn decompose_rec(
    counts: &mut BTreeMap<Tile, u8>,
    sets_needed: usize,
    pair_used: bool,
    current: &mut Vec<GroupShape>,
    results: &mut Vec<Vec<GroupShape>>,
) {
    let head = counts.iter().find(|&(_, &c)| c > 0).map(|(&t, _)| t);

    let Some(t) = head else {
        if sets_needed == 0 && pair_used {
            results.push(current.clone());
        }
        return;
    };

    let count_t = counts[&t];

    if !pair_used && count_t >= 2 {
        *counts.get_mut(&t).unwrap() -= 2;
        current.push(GroupShape::Pair(t));
        decompose_rec(counts, sets_needed, true, current, results);
        current.pop();
        *counts.get_mut(&t).unwrap() += 2;
    }

    if sets_needed > 0 && count_t >= 3 {
        *counts.get_mut(&t).unwrap() -= 3;
        current.push(GroupShape::Triplet(t));
        decompose_rec(counts, sets_needed - 1, pair_used, current, results);
        current.pop();
        *counts.get_mut(&t).unwrap() += 3;
    }

    if sets_needed > 0 {
        if let Some(t1) = t.succ() {
            if let Some(t2) = t1.succ() {
                let c1 = *counts.get(&t1).unwrap_or(&0);
                let c2 = *counts.get(&t2).unwrap_or(&0);
                if c1 >= 1 && c2 >= 1 {
                    *counts.get_mut(&t).unwrap() -= 1;
                    *counts.entry(t1).or_insert(0) -= 1;
                    *counts.entry(t2).or_insert(0) -= 1;
                    current.push(GroupShape::Sequence(t));
                    decompose_rec(counts, sets_needed - 1, pair_used, current, results);
                    current.pop();
                    *counts.get_mut(&t).unwrap() += 1;
                    *counts.get_mut(&t1).unwrap() += 1;
                    *counts.get_mut(&t2).unwrap() += 1;
                }
            }
        }
    }
}

fn build_hand_shape(
    decompositions: &[Vec<GroupShape>],
    melds: &[Meld],
    winning_tile: Tile,
) -> HandShape {
    let canonical = &decompositions[0];

    let all_tiles: Vec<Tile> = canonical_tiles(canonical, melds);

    let all_pungs = canonical
        .iter()
        .all(|g| !matches!(g, GroupShape::Sequence(_)))
        && melds.iter().all(|m| !m.is_sequence());

    let all_same_suit = suit_count(&all_tiles) == 1;
    let mixed_one_suit = suit_count(&all_tiles) == 2;
    let all_terminals_only = all_tiles.iter().all(|t| t.is_terminal());
    let no_terminals = all_tiles.iter().all(|t| !t.is_terminal());

    let every_set_has_terminal = canonical.iter().all(|g| group_has_terminal(g))
        && melds.iter().all(|m| meld_has_terminal(m));

    let all_concealed = melds.iter().all(|m| m.concealed);

    let concealed_pungs_count = canonical
        .iter()
        .filter(|g| matches!(g, GroupShape::Triplet(_)))
        .count() as u32;
    let concealed_gangs_count = melds
        .iter()
        .filter(|m| matches!(m.gang_kind, Some(crate::player::GangKind::An)))
        .count() as u32;

    let wait_kind = classify_wait(decompositions, winning_tile);

    HandShape {
        seven_pairs: false,
        all_pungs,
        all_same_suit,
        mixed_one_suit,
        all_terminals_only,
        every_set_has_terminal,
        no_terminals,
        all_concealed,
        concealed_pungs_count,
        concealed_gangs_count,
        wait_kind,
    }
}

fn canonical_tiles(decomposition: &[GroupShape], melds: &[Meld]) -> Vec<Tile> {
    let mut tiles = Vec::new();
    for group in decomposition {
        match *group {
            GroupShape::Pair(t) => {
                tiles.push(t);
                tiles.push(t);
            }
            GroupShape::Triplet(t) => tiles.extend([t, t, t]),
            GroupShape::Sequence(t) => {
                tiles.push(t);
                tiles.push(t.succ().unwrap());
                tiles.push(t.succ().unwrap().succ().unwrap());
            }
        }
    }
    for meld in melds {
        tiles.extend(meld.tiles.iter().map(|ti| ti.tile));
    }
    tiles
}

fn group_has_terminal(group: &GroupShape) -> bool {
    match *group {
        GroupShape::Pair(t) => t.is_terminal(),
        GroupShape::Triplet(t) => t.is_terminal(),
        GroupShape::Sequence(t) => t.is_terminal() || t.succ().unwrap().succ().unwrap().is_terminal(),
    }
}

fn meld_has_terminal(meld: &Meld) -> bool {
    meld.tiles.iter().any(|t| t.tile.is_terminal())
}

fn classify_wait(decompositions: &[Vec<GroupShape>], winning_tile: Tile) -> WaitKind {
    let mut kinds = std::collections::HashSet::new();

    for decomposition in decompositions {
        for group in decomposition {
            match *group {
                GroupShape::Pair(t) if t == winning_tile => {
                    kinds.insert(WaitKind::Pair);
                }
                GroupShape::Triplet(t) if t == winning_tile => {
                    kinds.insert(WaitKind::Pair);
                }
                GroupShape::Sequence(t) if contains_tile(t, winning_tile) => {
                    kinds.insert(classify_sequence_wait(t, winning_tile));
                }
                _ => {}
            }
        }
    }

    match kinds.len() {
        0 => WaitKind::Middle,
        1 => kinds.into_iter().next().unwrap(),
        _ => WaitKind::Multiple,
    }
}

fn contains_tile(seq_start: Tile, tile: Tile) -> bool {
    let mid = seq_start.succ().unwrap();
    let end = mid.succ().unwrap();
    tile == seq_start || tile == mid || tile == end
}

fn classify_sequence_wait(seq_start: Tile, winning_tile: Tile) -> WaitKind {
    let mid = seq_start.succ().unwrap();
    let end = mid.succ().unwrap();

    if winning_tile == end && seq_start.rank == 1 {
        WaitKind::Edge
    } else if winning_tile == seq_start && end.rank == 9 {
        WaitKind::Edge
    } else if winning_tile == mid {
        WaitKind::Middle
    } else {
        WaitKind::Middle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::Suit;

    fn t(rank: u8, suit: Suit) -> Tile {
        Tile::new(suit, rank)
    }

    #[test]
    fn basic_self_draw_hand_from_spec_scenario_one() {
        // 13-tile concealed hand 1W 1W 2W 2W 3W 4W 5W 6W 7W 8W 9W 9W 9W,
        // self-drawing the 14th tile 2W: pair(1,1) + pung(2,2,2) +
        // seq(3,4,5) + seq(6,7,8) + pung(9,9,9), all one suit.
        let hand = vec![
            t(1, Suit::Wan),
            t(1, Suit::Wan),
            t(2, Suit::Wan),
            t(3, Suit::Wan),
            t(4, Suit::Wan),
            t(5, Suit::Wan),
            t(6, Suit::Wan),
            t(7, Suit::Wan),
            t(8, Suit::Wan),
            t(9, Suit::Wan),
            t(9, Suit::Wan),
            t(9, Suit::Wan),
            t(2, Suit::Wan),
        ];
        let shape = analyze_win(&hand, &[], t(2, Suit::Wan)).expect("should be a legal win");
        assert!(!shape.seven_pairs);
        assert!(shape.all_same_suit);
    }

    #[test]
    fn seven_pairs_recognized() {
        let hand = vec![
            t(1, Suit::Wan),
            t(1, Suit::Wan),
            t(2, Suit::Wan),
            t(2, Suit::Wan),
            t(3, Suit::Wan),
            t(3, Suit::Wan),
            t(4, Suit::Wan),
            t(4, Suit::Wan),
            t(5, Suit::Wan),
            t(5, Suit::Wan),
            t(6, Suit::Wan),
            t(6, Suit::Wan),
            t(7, Suit::Wan),
        ];
        let shape = analyze_win(&hand, &[], t(7, Suit::Wan)).expect("seven pairs should win");
        assert!(shape.seven_pairs);
    }

    #[test]
    fn edge_wait_classified() {
        // 1W 2W waiting on 3W to complete 1-2-3, plus 4-5-6W, 7-8-9W,
        // a pung of 9T, and a 6T pair — 13 concealed tiles + the winning 3W.
        let hand = vec![
            t(1, Suit::Wan),
            t(2, Suit::Wan),
            t(4, Suit::Wan),
            t(5, Suit::Wan),
            t(6, Suit::Wan),
            t(7, Suit::Wan),
            t(8, Suit::Wan),
            t(9, Suit::Wan),
            t(9, Suit::Tong),
            t(9, Suit::Tong),
            t(9, Suit::Tong),
            t(6, Suit::Tong),
            t(6, Suit::Tong),
        ];
        let shape = analyze_win(&hand, &[], t(3, Suit::Wan)).expect("should win");
        assert_eq!(shape.wait_kind, WaitKind::Edge);
    }

    #[test]
    fn non_decomposable_hand_rejected() {
        let hand = vec![
            t(1, Suit::Wan),
            t(2, Suit::Wan),
            t(4, Suit::Wan),
            t(5, Suit::Wan),
            t(7, Suit::Wan),
            t(8, Suit::Wan),
            t(1, Suit::Tong),
            t(1, Suit::Tong),
            t(1, Suit::Tong),
            t(2, Suit::Tong),
            t(2, Suit::Tong),
            t(2, Suit::Tong),
            t(4, Suit::Tiao),
        ];
        assert!(analyze_win(&hand, &[], t(9, Suit::Tiao)).is_none());
    }
}
