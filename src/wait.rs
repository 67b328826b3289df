//! `wait_until`/`wait` (spec §4.5): spinning on a local symmetric `long`
//! until a remote atomic update becomes visible.
//!
//! No progress call is required — the transport advances passively, and the
//! spin itself only needs an acquire load so the remote write "happens
//! before" whatever the caller does next (spec §4.5, §5 ordering guarantee
//! (d)). The loop backs off to a cooperative yield after a short burst of
//! pure spinning; that's purely a scheduling courtesy to whatever else is
//! running on the box and changes nothing about when the wait is allowed to
//! return.

use std::sync::atomic::{AtomicI64, Ordering};

/// Comparators `wait_until` can spin on (spec §4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    #[inline]
    fn test(self, observed: i64, value: i64) -> bool {
        match self {
            Comparator::Eq => observed == value,
            Comparator::Ne => observed != value,
            Comparator::Lt => observed < value,
            Comparator::Le => observed <= value,
            Comparator::Gt => observed > value,
            Comparator::Ge => observed >= value,
        }
    }
}

/// Spins in this PE's memory until `*word` satisfies `cmp value`.
pub fn wait_until(word: &AtomicI64, cmp: Comparator, value: i64) {
    const SPIN_BURST: u32 = 1024;
    let mut spins: u32 = 0;
    loop {
        let observed = word.load(Ordering::Acquire);
        if cmp.test(observed, value) {
            return;
        }
        spins = spins.wrapping_add(1);
        if spins < SPIN_BURST {
            std::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}

/// Spins until `*word != value` — shorthand for `wait_until(word, Ne, value)`
/// (spec §4.5).
pub fn wait(word: &AtomicI64, value: i64) {
    wait_until(word, Comparator::Ne, value)
}
