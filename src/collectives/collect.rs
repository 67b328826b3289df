//! Collect: variable-length concatenating gather (spec §4.7 "Collect
//! (variable-length concatenation)").
//!
//! Unlike every other collective in this module, `collect` always anchors
//! its root at logical rank 0 of the subgroup (`PE_start`) — there is no
//! caller-supplied root, since the offset-propagation chain below only
//! makes sense relative to a fixed starting point.

use crate::transfer;
use crate::transport::Pe;
use crate::tree::to_logical;
use crate::wait::{self, Comparator};
use crate::runtime::Runtime;

use super::{clear_word, signal_add, signal_put, SymWords};

/// Gather `source` from every participant in `{start, start+stride, ...,
/// start+(size-1)*stride}` into `target_addr` on every participant, in
/// ascending PE order within the subgroup, via a chained offset handoff
/// (spec §4.7).
///
/// `psync` needs at least 4 words: 0 and 1 carry the offset handoff (and,
/// at the end, the final total back to `PE_start`), 2 is the fan-in
/// counter once every contribution has landed, and 3 is handed to the
/// closing broadcast.
pub fn collect(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: &[u8], psync: &SymWords) {
    let my_pe = rt.my_pe();
    let start_pe = start;

    if size <= 1 {
        transfer::put(rt.layout(), rt.transport(), rt.tracker(), my_pe, my_pe, target_addr, source);
        rt.quiet();
        return;
    }

    let my_logical = to_logical(start, stride, size, 0, my_pe);
    let my_len = source.len() as i64;

    let my_offset: i64 = if my_logical == 0 {
        0
    } else {
        wait::wait(psync.word(1), 0);
        let offset = psync.load(0);
        clear_word(rt, psync, 0);
        clear_word(rt, psync, 1);
        offset
    };

    let offset_after = my_offset + my_len;
    if my_logical < size - 1 {
        let next_pe = start + (my_logical + 1) * stride;
        signal_put(rt, next_pe, psync.word_addr(0), offset_after);
        signal_put(rt, next_pe, psync.word_addr(1), 1);
    } else {
        signal_put(rt, start_pe, psync.word_addr(0), offset_after);
        signal_put(rt, start_pe, psync.word_addr(1), 1);
    }

    let mut total_len: usize = 0;
    if my_pe == start_pe {
        wait::wait(psync.word(1), 0);
        total_len = psync.load(0) as usize;
        clear_word(rt, psync, 0);
        clear_word(rt, psync, 1);
    }

    transfer::put(
        rt.layout(),
        rt.transport(),
        rt.tracker(),
        my_pe,
        start_pe,
        target_addr + my_offset as usize,
        source,
    );
    rt.fence(start_pe);
    signal_add(rt, start_pe, psync.word_addr(2), 1);

    if my_pe == start_pe {
        wait::wait_until(psync.word(2), Comparator::Eq, size as i64);
        clear_word(rt, psync, 2);
    }

    // The closing fan-out forces the flat algorithm regardless of
    // `tree_crossover`: only `PE_start` knows `total_len` at this point, and
    // the tree broadcast needs every relaying PE to know the payload length
    // up front to size its own relay read. Propagating `total_len` through
    // a tree ahead of the fan-out would need an extra round trip the spec
    // doesn't describe, so this crate always uses the flat fan-out here
    // (see DESIGN.md).
    let payload = if my_pe == start_pe {
        let mut buf = vec![0u8; total_len];
        transfer::get(rt.layout(), rt.transport(), rt.tracker(), my_pe, my_pe, target_addr, &mut buf);
        buf
    } else {
        Vec::new()
    };
    super::broadcast::broadcast_flat_forced(rt, start, stride, size, 0, target_addr, &payload, &psync.sub(3), false);
}
