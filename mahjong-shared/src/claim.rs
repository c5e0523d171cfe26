//! Concurrent claim arbitration on a discard (`spec.md` §4.6): every seat
//! other than the discarder may simultaneously declare a claim against the
//! same discarded tile; exactly one wins the bounded claim window.

use serde::{Deserialize, Serialize};

/// The kind of claim a seat declared against a discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClaimKind {
    /// Ascending priority order matches `spec.md` §4.6: `Hu` beats `Gang`
    /// beats `Peng` beats `Chi`. `Ord` is derived in declaration order
    /// below, so comparisons read backwards from priority — `priority()`
    /// is the one callers should use.
    Chi,
    Peng,
    Gang,
    Hu,
}

impl ClaimKind {
    /// Higher wins ties against a different kind.
    fn priority(self) -> u8 {
        match self {
            ClaimKind::Chi => 0,
            ClaimKind::Peng => 1,
            ClaimKind::Gang => 2,
            ClaimKind::Hu => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub seat: u8,
    pub kind: ClaimKind,
}

/// Resolves the set of claims declared within one discard's window.
///
/// `spec.md` §4.6 priority: `Hu` > `Gang` > `Peng` > `Chi`. A `Chi` claim is
/// only ever eligible from the discarder's immediate next seat, which callers
/// must enforce before submitting it here — by the time a claim reaches this
/// function it is assumed legal. Multiple simultaneous `Hu` claims (multi-
/// winner) all win together; any other tie (two `Peng`, two `Gang`, etc.) is
/// a state invariant violation, since only one seat can hold the tiles for a
/// given meld kind on a single discard, so arbitrarily keeping the
/// lowest-seat claim is a safe, deterministic tie-break rather than a real
/// contention case.
pub fn arbitrate(claims: &[Claim]) -> Vec<Claim> {
    let Some(&best_priority) = claims.iter().map(|c| c.kind.priority()).max().as_ref() else {
        return Vec::new();
    };

    let winners: Vec<Claim> = claims
        .iter()
        .copied()
        .filter(|c| c.kind.priority() == best_priority)
        .collect();

    if winners.first().map(|c| c.kind) == Some(ClaimKind::Hu) {
        return winners;
    }

    let mut winners = winners;
    winners.sort_by_key(|c| c.seat);
    winners.truncate(1);
    winners
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hu_beats_everything() {
        let claims = [
            Claim { seat: 0, kind: ClaimKind::Gang },
            Claim { seat: 1, kind: ClaimKind::Hu },
            Claim { seat: 2, kind: ClaimKind::Peng },
        ];
        let winners = arbitrate(&claims);
        assert_eq!(winners, vec![Claim { seat: 1, kind: ClaimKind::Hu }]);
    }

    #[test]
    fn multiple_hu_claims_all_win() {
        let claims = [
            Claim { seat: 0, kind: ClaimKind::Hu },
            Claim { seat: 2, kind: ClaimKind::Hu },
        ];
        let winners = arbitrate(&claims);
        assert_eq!(winners.len(), 2);
    }

    #[test]
    fn gang_beats_peng_and_chi() {
        let claims = [
            Claim { seat: 0, kind: ClaimKind::Chi },
            Claim { seat: 1, kind: ClaimKind::Gang },
            Claim { seat: 2, kind: ClaimKind::Peng },
        ];
        assert_eq!(arbitrate(&claims), vec![Claim { seat: 1, kind: ClaimKind::Gang }]);
    }

    #[test]
    fn no_claims_resolves_empty() {
        assert!(arbitrate(&[]).is_empty());
    }
}
