//! Tile identity and deck/wall construction for the three-player variant.
//!
//! Unlike riichi mahjong, this variant has no honor tiles: a `Tile` is just a
//! `(suit, rank)` pair, and the deck shape depends on the room's
//! [`TileSet`](crate::config::TileSet) (`WAN_ONLY` drops `Bamboo`/`Characters`
//! entirely rather than excluding a separate honor set).

use derive_more::Display;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::config::TileSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Suit {
    /// "W" - wan / characters.
    Wan,
    /// "T" - tong / dots.
    Tong,
    /// "C" - tiao / bamboo.
    Tiao,
}

impl Suit {
    fn wire_char(self) -> char {
        match self {
            Suit::Wan => 'W',
            Suit::Tong => 'T',
            Suit::Tiao => 'C',
        }
    }

    fn from_wire_char(c: char) -> Option<Self> {
        match c {
            'W' => Some(Suit::Wan),
            'T' => Some(Suit::Tong),
            'C' => Some(Suit::Tiao),
            _ => None,
        }
    }

    fn all_for(tiles: TileSet) -> &'static [Suit] {
        match tiles {
            TileSet::WanOnly => &[Suit::Wan],
            TileSet::AllSuits => &[Suit::Wan, Suit::Tong, Suit::Tiao],
        }
    }
}

/// A single tile identity. Tiles are value-equal: two `Tile`s with the same
/// suit and rank are indistinguishable, as required by `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "{}{}", rank, "suit.wire_char()")]
pub struct Tile {
    pub suit: Suit,
    pub rank: u8,
}

impl Tile {
    pub fn new(suit: Suit, rank: u8) -> Self {
        debug_assert!((1..=9).contains(&rank), "rank out of range: {rank}");
        Self { suit, rank }
    }

    pub fn is_terminal(self) -> bool {
        self.rank == 1 || self.rank == 9
    }

    /// Returns the next tile in sequence within the same suit, if any.
    pub fn succ(self) -> Option<Tile> {
        (self.rank < 9).then(|| Tile::new(self.suit, self.rank + 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("invalid tile string: {0:?}")]
pub struct ParseTileError(String);

impl FromStr for Tile {
    type Err = ParseTileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let rank_char = chars.next().ok_or_else(|| ParseTileError(s.to_owned()))?;
        let suit_char = chars.next().ok_or_else(|| ParseTileError(s.to_owned()))?;
        if chars.next().is_some() {
            return Err(ParseTileError(s.to_owned()));
        }

        let rank = rank_char
            .to_digit(10)
            .filter(|&r| (1..=9).contains(&r))
            .ok_or_else(|| ParseTileError(s.to_owned()))? as u8;
        let suit = Suit::from_wire_char(suit_char).ok_or_else(|| ParseTileError(s.to_owned()))?;

        Ok(Tile::new(suit, rank))
    }
}

impl Serialize for Tile {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Tile {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_char())
    }
}

/// Unique identifier for a tile within a game. There are up to four physical
/// copies of each [`Tile`] identity; `TileId` distinguishes the copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(u8);

impl TileId {
    /// Constructs a `TileId` directly. Only meant for tests and for code
    /// that already has an authoritative tile mapping (e.g. replay);
    /// ordinary gameplay code obtains `TileId`s from the wall.
    pub fn new(raw: u8) -> Self {
        TileId(raw)
    }
}

/// A physical tile in play: a copy identity paired with its face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileInstance {
    pub id: TileId,
    pub tile: Tile,
}

impl TileInstance {
    fn new(tile: Tile, id: u8) -> Self {
        Self {
            id: TileId(id),
            tile,
        }
    }
}

/// Builds the full deck for the given tile set: 4 copies of every rank in
/// every suit (`spec.md` §4.1 — 36 tiles for `WAN_ONLY`, 108 for `ALL_SUITS`).
pub fn generate_deck(tiles: TileSet) -> Vec<TileInstance> {
    let mut deck = Vec::with_capacity(tiles.deck_size());
    let mut next_id: u8 = 0;

    for &suit in Suit::all_for(tiles) {
        for rank in 1..=9 {
            for _ in 0..4 {
                deck.push(TileInstance::new(Tile::new(suit, rank), next_id));
                next_id += 1;
            }
        }
    }

    deck
}

/// The live wall: an ordered draw sequence with a cursor, built once per
/// round from a seeded Fisher-Yates shuffle so that `(seed, tile_set)`
/// always reproduces the same wall (`spec.md` §4.1, §4.11, §8 "replay
/// determinism").
///
/// Draws come off the front of the wall; gang replacement draws come off the
/// back, since this variant has no separate dead wall (`spec.md` §4.1 /
/// GLOSSARY "Wall").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wall {
    tiles: Vec<TileInstance>,
    front: usize,
}

impl Wall {
    /// Shuffles a freshly generated deck with a PCG RNG seeded from `seed`.
    pub fn shuffled(tiles: TileSet, seed: u64) -> Self {
        let mut deck = generate_deck(tiles);
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        fisher_yates(&mut deck, &mut rng);

        Self {
            tiles: deck,
            front: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.tiles.len() - self.front
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Draws the next tile for a turn. Returns `None` ("WallExhausted" per
    /// `spec.md` §7) when the wall is empty.
    pub fn draw(&mut self) -> Option<TileInstance> {
        if self.front >= self.tiles.len() {
            return None;
        }

        let tile = self.tiles[self.front];
        self.front += 1;
        Some(tile)
    }

    /// Draws a gang replacement tile from the back of the wall.
    pub fn draw_replacement(&mut self) -> Option<TileInstance> {
        if self.front >= self.tiles.len() {
            return None;
        }

        self.tiles.pop()
    }
}

fn fisher_yates<T>(slice: &mut [T], rng: &mut impl Rng) {
    for i in (1..slice.len()).rev() {
        let j = rng.gen_range(0..=i);
        slice.swap(i, j);
    }
}

/// Determines if the given tiles form a sequence (chi/run) in the same suit.
/// Returns `true` if any permutation of the three tiles forms a consecutive
/// run (`spec.md` §4.4 `canChi`).
pub fn is_sequence(a: Tile, b: Tile, c: Tile) -> bool {
    if a.suit != b.suit || a.suit != c.suit {
        return false;
    }

    let mut ranks = [a.rank, b.rank, c.rank];
    ranks.sort_unstable();
    ranks[0] + 1 == ranks[1] && ranks[1] + 1 == ranks[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_format() {
        assert_eq!("5W".parse::<Tile>().unwrap(), Tile::new(Suit::Wan, 5));
        assert_eq!("3T".parse::<Tile>().unwrap(), Tile::new(Suit::Tong, 3));
        assert_eq!("7C".parse::<Tile>().unwrap(), Tile::new(Suit::Tiao, 7));
        assert!("0W".parse::<Tile>().is_err());
        assert!("5X".parse::<Tile>().is_err());
        assert!("55W".parse::<Tile>().is_err());
    }

    #[test]
    fn round_trips_display() {
        let tile = Tile::new(Suit::Tong, 9);
        assert_eq!(tile.to_string(), "9T");
        assert_eq!(tile.to_string().parse::<Tile>().unwrap(), tile);
    }

    #[test]
    fn deck_sizes_match_spec() {
        assert_eq!(generate_deck(TileSet::WanOnly).len(), 36);
        assert_eq!(generate_deck(TileSet::AllSuits).len(), 108);
    }

    #[test]
    fn deck_has_four_copies_of_each_tile() {
        let deck = generate_deck(TileSet::AllSuits);
        for &suit in Suit::all_for(TileSet::AllSuits) {
            for rank in 1..=9 {
                let count = deck
                    .iter()
                    .filter(|t| t.tile == Tile::new(suit, rank))
                    .count();
                assert_eq!(count, 4);
            }
        }
    }

    #[test]
    fn same_seed_gives_identical_wall() {
        let a = Wall::shuffled(TileSet::WanOnly, 42);
        let b = Wall::shuffled(TileSet::WanOnly, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let a = Wall::shuffled(TileSet::AllSuits, 1);
        let b = Wall::shuffled(TileSet::AllSuits, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn draw_and_replacement_draw_from_opposite_ends() {
        let mut wall = Wall::shuffled(TileSet::WanOnly, 7);
        let total = wall.remaining();
        let front = wall.draw().unwrap();
        let back = wall.draw_replacement().unwrap();
        assert_ne!(front.id, back.id);
        assert_eq!(wall.remaining(), total - 2);
    }

    #[test]
    fn wall_exhausts_cleanly() {
        let mut wall = Wall::shuffled(TileSet::WanOnly, 1);
        let mut count = 0;
        while wall.draw().is_some() {
            count += 1;
        }
        assert_eq!(count, 36);
        assert!(wall.is_empty());
        assert!(wall.draw().is_none());
    }

    #[test]
    fn recognizes_sequences_in_any_order() {
        let a = Tile::new(Suit::Wan, 3);
        let b = Tile::new(Suit::Wan, 4);
        let c = Tile::new(Suit::Wan, 5);
        assert!(is_sequence(a, b, c));
        assert!(is_sequence(c, a, b));
        assert!(!is_sequence(a, b, Tile::new(Suit::Tong, 5)));
        assert!(!is_sequence(a, a, c));
    }
}
