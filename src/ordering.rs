//! `fence` and `quiet` (spec §4.4): the two ordering primitives every
//! collective is built from.

use crate::completion::CompletionTracker;
use crate::error::transport_abort;
use crate::transport::Transport;

/// Global drain: block until `put_ct == pending_put_counter` and `get_ct ==
/// pending_get_counter`. After this returns, every operation issued by this
/// PE before the call has committed at its target (spec §4.4).
#[track_caller]
pub fn quiet(my_pe: i32, transport: &dyn Transport, tracker: &CompletionTracker) {
    tracker.drain_puts(my_pe, transport);
    tracker.drain_gets(my_pe, transport);
}

/// Remote-per-target ordering: operations issued to `pe` before this call
/// are ordered before any issued after it. When `fence_is_quiet` is set
/// (the transport only provides global ordering), this degrades to a full
/// [`quiet`] (spec §4.4).
#[track_caller]
pub fn fence(
    my_pe: i32,
    transport: &dyn Transport,
    tracker: &CompletionTracker,
    pe: i32,
    fence_is_quiet: bool,
) {
    if fence_is_quiet {
        quiet(my_pe, transport, tracker);
        return;
    }
    if let Err(code) = transport.fence(pe) {
        transport_abort(my_pe, code);
    }
}
