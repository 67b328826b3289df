//! Fcollect: fixed-length gather (spec §4.7 "Fcollect (fixed-length)").
//!
//! Simpler than [`super::collect::collect`]: since every contribution is
//! exactly `len` bytes, each participant's slot in the concatenated result
//! is known from its logical rank alone, with no offset handoff needed.

use crate::transfer;
use crate::transport::Pe;
use crate::tree::to_logical;
use crate::wait::{self, Comparator};
use crate::runtime::Runtime;

use super::{clear_word, signal_add, SymWords};

/// Gather `source` (exactly `len` bytes on every participant) into
/// `target_addr` on every participant, in ascending PE order within the
/// subgroup `{start, start+stride, ..., start+(size-1)*stride}` (spec
/// §4.7).
///
/// `psync` needs at least 2 words: 0 is the fan-in counter, 1 is handed to
/// the closing broadcast.
pub fn fcollect(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: &[u8], len: usize, psync: &SymWords) {
    let my_pe = rt.my_pe();
    let root_pe = start;

    if size <= 1 {
        transfer::put(rt.layout(), rt.transport(), rt.tracker(), my_pe, my_pe, target_addr, source);
        rt.quiet();
        return;
    }

    let my_logical = to_logical(start, stride, size, 0, my_pe);
    let slot_addr = target_addr + (my_logical as usize) * len;

    transfer::put(rt.layout(), rt.transport(), rt.tracker(), my_pe, root_pe, slot_addr, source);
    rt.fence(root_pe);
    signal_add(rt, root_pe, psync.word_addr(0), 1);

    if my_pe == root_pe {
        wait::wait_until(psync.word(0), Comparator::Eq, size as i64);
        clear_word(rt, psync, 0);
    }

    let total_len = len * size as usize;
    let payload = if my_pe == root_pe {
        let mut buf = vec![0u8; total_len];
        transfer::get(rt.layout(), rt.transport(), rt.tracker(), my_pe, my_pe, target_addr, &mut buf);
        buf
    } else {
        Vec::new()
    };
    super::broadcast::broadcast(rt, start, stride, size, 0, target_addr, &payload, total_len, &psync.sub(1), false);
}
