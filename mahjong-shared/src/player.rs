//! Per-seat state: concealed hand, melds, status, and the available-action
//! predicates of `spec.md` §4.4.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::time::Timestamp;
use crate::tile::{Tile, TileId, TileInstance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeldKind {
    Peng,
    Chi,
    Gang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GangKind {
    /// Concealed kong, built entirely from the player's own hand.
    An,
    /// Open kong, claimed directly off a discard.
    Ming,
    /// Upgrade kong: the fourth copy added to an existing `Peng`.
    Bu,
}

/// A completed meld: a `Peng` (pung), `Chi` (chow), or `Gang` (kong).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meld {
    pub kind: MeldKind,
    pub gang_kind: Option<GangKind>,
    pub tiles: Vec<TileInstance>,
    /// Seat the meld was claimed from; `None` for a concealed (`An`) gang.
    pub claimed_from: Option<u8>,
    pub concealed: bool,
}

impl Meld {
    pub fn peng(tiles: [TileInstance; 3], claimed_from: u8) -> Self {
        Self {
            kind: MeldKind::Peng,
            gang_kind: None,
            tiles: tiles.to_vec(),
            claimed_from: Some(claimed_from),
            concealed: false,
        }
    }

    pub fn chi(tiles: [TileInstance; 3], claimed_from: u8) -> Self {
        Self {
            kind: MeldKind::Chi,
            gang_kind: None,
            tiles: tiles.to_vec(),
            claimed_from: Some(claimed_from),
            concealed: false,
        }
    }

    pub fn gang(tiles: [TileInstance; 4], gang_kind: GangKind, claimed_from: Option<u8>) -> Self {
        Self {
            kind: MeldKind::Gang,
            gang_kind: Some(gang_kind),
            tiles: tiles.to_vec(),
            claimed_from,
            concealed: gang_kind == GangKind::An,
        }
    }

    pub fn face(&self) -> Tile {
        self.tiles[0].tile
    }

    pub fn is_sequence(&self) -> bool {
        self.kind == MeldKind::Chi
    }

    pub fn is_gang(&self) -> bool {
        self.kind == MeldKind::Gang
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerStatus {
    Waiting,
    Ready,
    Playing,
    WaitingTurn,
    Disconnected,
    Trustee,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Discard,
    Peng,
    Gang,
    Chi,
    Hu,
    Pass,
}

/// Full per-seat state (`spec.md` §3 `PlayerState`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub seat_index: u8,
    pub user_id: u64,
    hand: Vec<TileInstance>,
    pub current_draw: Option<TileInstance>,
    pub melds: Vec<Meld>,
    pub status: PlayerStatus,
    pub available_actions: HashSet<ActionKind>,
    pub timeout_count: u32,
    pub score: i64,
    pub disconnected_at: Option<Timestamp>,
}

impl PlayerState {
    pub fn new(seat_index: u8, user_id: u64, starting_hand: Vec<TileInstance>) -> Self {
        Self {
            seat_index,
            user_id,
            hand: starting_hand,
            current_draw: None,
            melds: Vec::new(),
            status: PlayerStatus::Waiting,
            available_actions: HashSet::new(),
            timeout_count: 0,
            score: 0,
            disconnected_at: None,
        }
    }

    pub fn hand(&self) -> &[TileInstance] {
        &self.hand
    }

    /// All concealed tiles, including a current draw if present — the
    /// working multiset used by the hand analyzer.
    pub fn concealed_tiles(&self) -> Vec<Tile> {
        let mut tiles: Vec<Tile> = self.hand.iter().map(|t| t.tile).collect();
        if let Some(draw) = self.current_draw {
            tiles.push(draw.tile);
        }
        tiles
    }

    pub fn is_dealer(&self, dealer_seat: u8) -> bool {
        self.seat_index == dealer_seat
    }

    /// Total physical tile count, per `spec.md` §3 invariant 5: 13 between
    /// turns (+1 per concealed gang), 14 while holding the current draw.
    pub fn physical_tile_count(&self) -> usize {
        self.hand.len()
            + self.current_draw.map_or(0, |_| 1)
            + self.melds.iter().map(|m| m.tiles.len()).sum::<usize>()
    }

    pub fn count_of(&self, tile: Tile) -> usize {
        self.hand.iter().filter(|t| t.tile == tile).count()
    }

    pub fn receive_draw(&mut self, tile: TileInstance) {
        debug_assert!(self.current_draw.is_none());
        self.current_draw = Some(tile);
    }

    /// Removes `id` from the hand or the current draw, whichever has it, and
    /// folds any remaining draw back into the hand (`spec.md` §4.5 discard
    /// semantics, mirroring the teacher's `Hand::discard_tile`).
    pub fn remove_tile(&mut self, id: TileId) -> Option<TileInstance> {
        let from_hand = self
            .hand
            .iter()
            .position(|t| t.id == id)
            .map(|idx| self.hand.remove(idx));

        let removed = from_hand.or_else(|| match self.current_draw {
            Some(draw) if draw.id == id => self.current_draw.take(),
            _ => None,
        });

        if removed.is_some() {
            if let Some(draw) = self.current_draw.take() {
                self.hand.push(draw);
            }
        }

        removed
    }

    /// Removes `count` concealed copies of `tile`, preferring hand tiles
    /// over the current draw, for meld formation.
    pub fn remove_concealed(&mut self, tile: Tile, count: usize) -> Vec<TileInstance> {
        let mut removed = Vec::with_capacity(count);

        while removed.len() < count {
            if let Some(idx) = self.hand.iter().position(|t| t.tile == tile) {
                removed.push(self.hand.remove(idx));
            } else if self.current_draw.map(|t| t.tile) == Some(tile) {
                removed.push(self.current_draw.take().unwrap());
            } else {
                break;
            }
        }

        removed
    }

    pub fn push_hand(&mut self, tile: TileInstance) {
        self.hand.push(tile);
    }

    // --- Available-action predicates (`spec.md` §4.4) ---

    pub fn can_peng(&self, tile: Tile) -> bool {
        self.count_of(tile) >= 2
    }

    pub fn can_chi(&self, tile: Tile, using: (Tile, Tile), is_next_seat: bool) -> bool {
        if !is_next_seat {
            return false;
        }

        let (a, b) = using;
        if self.count_of(a) == 0 || self.count_of(b) == 0 {
            return false;
        }
        if a == b && self.count_of(a) < 2 {
            return false;
        }

        crate::tile::is_sequence(tile, a, b)
    }

    pub fn can_ming_gang(&self, tile: Tile) -> bool {
        self.count_of(tile) >= 3
    }

    /// Returns every rank the player holds all four copies of concealed.
    pub fn concealed_gang_candidates(&self) -> Vec<Tile> {
        let mut seen = HashSet::new();
        self.hand
            .iter()
            .map(|t| t.tile)
            .filter(|&tile| seen.insert(tile))
            .filter(|&tile| self.count_of(tile) + self.drawn_count(tile) >= 4)
            .collect()
    }

    fn drawn_count(&self, tile: Tile) -> usize {
        self.current_draw
            .filter(|t| t.tile == tile)
            .map_or(0, |_| 1)
    }

    pub fn can_upgrade_gang(&self, tile: Tile) -> bool {
        let has_peng = self
            .melds
            .iter()
            .any(|m| m.kind == MeldKind::Peng && m.face() == tile);
        has_peng && (self.count_of(tile) > 0 || self.drawn_count(tile) > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::Suit;

    fn inst(rank: u8, suit: Suit, id: u8) -> TileInstance {
        TileInstance {
            id: TileId::new(id),
            tile: Tile::new(suit, rank),
        }
    }

    #[test]
    fn can_peng_requires_two_copies() {
        let player = PlayerState::new(
            0,
            1,
            vec![inst(5, Suit::Wan, 0), inst(5, Suit::Wan, 1), inst(1, Suit::Wan, 2)],
        );
        assert!(player.can_peng(Tile::new(Suit::Wan, 5)));
        assert!(!player.can_peng(Tile::new(Suit::Wan, 1)));
    }

    #[test]
    fn can_chi_only_for_next_seat() {
        let player = PlayerState::new(
            0,
            1,
            vec![inst(4, Suit::Wan, 0), inst(5, Suit::Wan, 1)],
        );
        let discard = Tile::new(Suit::Wan, 6);
        let using = (Tile::new(Suit::Wan, 4), Tile::new(Suit::Wan, 5));
        assert!(player.can_chi(discard, using, true));
        assert!(!player.can_chi(discard, using, false));
    }

    #[test]
    fn remove_tile_folds_draw_back_into_hand() {
        let mut player = PlayerState::new(0, 1, vec![inst(1, Suit::Wan, 0)]);
        player.receive_draw(inst(9, Suit::Wan, 1));
        let removed = player.remove_tile(TileId::new(0)).unwrap();
        assert_eq!(removed.tile, Tile::new(Suit::Wan, 1));
        assert!(player.current_draw.is_none());
        assert_eq!(player.hand().len(), 1);
        assert_eq!(player.hand()[0].tile, Tile::new(Suit::Wan, 9));
    }
}
