//! The one place this crate is allowed to read the wall clock. Everything
//! downstream of here (the core crate, the action log) only ever sees a
//! [`Timestamp`], never `SystemTime`/`Instant` directly (`spec.md` §4.7,
//! `SPEC_FULL.md`'s replay-determinism requirement).

use mahjong::time::Timestamp;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now() -> Timestamp {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs();
    Timestamp(secs)
}
