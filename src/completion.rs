//! Local bookkeeping for outstanding puts/gets (spec §4.2, §3 "Counters").
//!
//! The counters here are *local* to the issuing PE — they count how many
//! ack-requested transport calls this PE has issued, independent of the
//! transport's own `put_ct`/`get_ct`, which count how many have completed.
//! `quiet`/`get_wait` compare the two.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::remote_completion_abort;
use crate::transport::Transport;

/// Tracks `pending_put_counter` and `pending_get_counter` (spec §3).
///
/// A PE is single-threaded (spec §5), so these only need to be monotonic and
/// observable, not contended; `Ordering::Relaxed` is enough for the counter
/// updates themselves; the acquire/release pairing that matters is between
/// *this PE's* writes and the *transport's* counting-event delivery, which
/// the transport implementation is responsible for.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    pending_put_counter: AtomicU64,
    pending_get_counter: AtomicU64,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `n` ack-requested put-family transport calls were just
    /// issued (one per segment, spec §4.3 step 3).
    pub fn record_puts(&self, n: u64) {
        self.pending_put_counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Record that one get-family transport call was just issued (spec
    /// §4.2: "Each Get-family call increments `pending_get_counter` by
    /// exactly 1").
    pub fn record_get(&self) {
        self.pending_get_counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pending_puts(&self) -> u64 {
        self.pending_put_counter.load(Ordering::Relaxed)
    }

    pub fn pending_gets(&self) -> u64 {
        self.pending_get_counter.load(Ordering::Relaxed)
    }

    /// Block until the transport's `put_ct` reaches `pending_put_counter`.
    /// Aborts the PE on a non-OK completion failure (spec §4.2, §7 kind 3).
    pub fn drain_puts(&self, my_pe: i32, transport: &dyn Transport) {
        let target = self.pending_puts();
        if let Err(failure) = transport.wait_put_completed_at_least(target) {
            remote_completion_abort(my_pe, failure);
        }
    }

    /// Block until the transport's `get_ct` reaches `pending_get_counter`.
    /// Aborts the PE on a non-OK completion failure.
    pub fn drain_gets(&self, my_pe: i32, transport: &dyn Transport) {
        let target = self.pending_gets();
        if let Err(failure) = transport.wait_get_completed_at_least(target) {
            remote_completion_abort(my_pe, failure);
        }
    }

    /// Dequeue `n` events from the put event queue (event-completion mode
    /// only). Aborts the PE on the first non-OK event.
    pub fn drain_put_events(&self, my_pe: i32, transport: &dyn Transport, n: usize) {
        if let Err(failure) = transport.drain_put_events(n) {
            remote_completion_abort(my_pe, failure);
        }
    }
}
