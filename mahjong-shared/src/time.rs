//! A logical clock type used throughout the core crate.
//!
//! The core crate must stay runtime-agnostic (`SPEC_FULL.md` §4.7): it
//! cannot call `std::time::Instant::now()` directly, since replay (`spec.md`
//! §4.11) needs deadlines to be deterministic function-of-state rather than
//! function-of-wall-clock. Callers (the server crate, or a test) supply the
//! current time explicitly; `Timestamp` itself is just seconds since an
//! arbitrary epoch.

use serde::{Deserialize, Serialize};
use std::ops::Add;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn plus_secs(self, secs: u32) -> Self {
        Timestamp(self.0 + secs as u64)
    }

    pub fn saturating_sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl Add<u32> for Timestamp {
    type Output = Timestamp;

    fn add(self, secs: u32) -> Timestamp {
        self.plus_secs(secs)
    }
}
