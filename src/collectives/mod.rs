//! Barrier, broadcast, op-to-all, collect, and fcollect (spec §4.7), all
//! built from [`crate::transfer`], [`crate::ordering`], [`crate::wait`], and
//! [`crate::tree`] against a [`crate::runtime::Runtime`].
//!
//! Every symmetric scratch/target/source buffer a collective touches is
//! modeled as a slice of `long`-sized words (spec's `pSync` is explicitly an
//! array of `long`; the handful of testable scenarios in spec §8 likewise
//! move `long`s), represented here as [`SymWords`]: a symmetric address
//! (used to compute the matching offset on a remote PE) paired with this
//! PE's own backing storage for that same memory, which is read and written
//! locally with no RMA at all.

pub mod barrier;
pub mod broadcast;
pub mod collect;
pub mod fcollect;
pub mod reduce;

use std::sync::atomic::{AtomicI64, Ordering};

use crate::runtime::Runtime;
use crate::transfer;
use crate::transport::{AtomicOp, Datatype, Pe};
use crate::tree::TreeNode;
use crate::wait::{self, Comparator};

pub use barrier::barrier;
pub use broadcast::broadcast;
pub use collect::collect;
pub use fcollect::fcollect;
pub use reduce::op_to_all;

/// A symmetric array of 8-byte words: `addr` is the local symmetric address
/// used when this PE issues an RMA call that targets the same relative
/// location on another PE; `words` is this PE's own backing storage at that
/// address.
pub struct SymWords<'a> {
    addr: usize,
    words: &'a [AtomicI64],
}

impl<'a> SymWords<'a> {
    pub fn new(addr: usize, words: &'a [AtomicI64]) -> Self {
        Self { addr, words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn word_addr(&self, i: usize) -> usize {
        self.addr + i * 8
    }

    pub fn word(&self, i: usize) -> &AtomicI64 {
        &self.words[i]
    }

    pub fn load(&self, i: usize) -> i64 {
        self.words[i].load(Ordering::Acquire)
    }

    pub fn load_range(&self, start: usize, len: usize) -> Vec<i64> {
        self.words[start..start + len].iter().map(|w| w.load(Ordering::Acquire)).collect()
    }

    pub fn store(&self, i: usize, v: i64) {
        self.words[i].store(v, Ordering::Release);
    }

    /// A view of this array starting at word `start`, for a collective that
    /// reserves a prefix of `pSync` for its own bookkeeping and hands the
    /// rest down to a sub-call (e.g. op-to-all's broadcast phase).
    pub fn sub(&self, start: usize) -> SymWords<'a> {
        SymWords { addr: self.addr + start * 8, words: &self.words[start..] }
    }
}

/// Resolve the tree for a `(start, stride, size)` subgroup rooted at logical
/// `root`, reusing the full-tree cache when the subgroup is the entire world
/// rooted at PE 0 (spec §3 "Full-tree cache").
fn tree_for(rt: &Runtime, start: Pe, stride: Pe, size: i32, root: i32) -> TreeNode {
    if root == 0 && start == 0 && stride == 1 && size == rt.n_pes() {
        rt.full_tree().node().clone()
    } else {
        crate::tree::build_kary_tree(start, stride, size, root, rt.config().tree_radix, rt.my_pe())
    }
}

/// Overwrite word `i` of a remote PE's `words` array with `value` (a plain
/// put, not an atomic — used for "go"/arrival signals, spec §4.7).
fn signal_put(rt: &Runtime, pe: Pe, target_addr: usize, value: i64) {
    transfer::put(rt.layout(), rt.transport(), rt.tracker(), rt.my_pe(), pe, target_addr, &value.to_ne_bytes());
}

/// Atomically add `delta` to word `i` of a remote PE's `words` array (a
/// fan-in counter bump, spec §4.7).
fn signal_add(rt: &Runtime, pe: Pe, target_addr: usize, delta: i64) {
    transfer::atomic(
        rt.layout(),
        rt.transport(),
        rt.tracker(),
        rt.my_pe(),
        pe,
        target_addr,
        &delta.to_ne_bytes(),
        AtomicOp::Sum,
        Datatype::I64,
    );
}

/// The standard pSync clear discipline (spec §4.7): put 0 to this PE's own
/// word, then spin until it is visible, so a later reuse of the same word
/// never observes a stale value from this round.
fn clear_word(rt: &Runtime, words: &SymWords, i: usize) {
    let my_pe = rt.my_pe();
    signal_put(rt, my_pe, words.word_addr(i), 0);
    wait::wait_until(words.word(i), Comparator::Eq, 0);
}

/// Drain exactly `n` puts just issued, using the event queue when
/// event-completion is enabled and the crate was built with the feature,
/// else falling back to the counter (spec §4.2 "Event-based", §9
/// "Completion discipline").
fn drain_put_batch(rt: &Runtime, n: usize) {
    if cfg!(feature = "event-completion") && rt.config().event_completion {
        rt.tracker().drain_put_events(rt.my_pe(), rt.transport(), n);
    } else {
        rt.tracker().drain_puts(rt.my_pe(), rt.transport());
    }
}
