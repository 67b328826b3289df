//! Barrier / barrier_all (spec §4.7 "Barrier").

use crate::runtime::Runtime;
use crate::transport::Pe;
use crate::wait::{self, Comparator};

use super::{clear_word, signal_add, signal_put, tree_for, SymWords};

/// Barrier over the subgroup `{start, start+stride, ..., start+(size-1)*stride}`.
/// Begins with a [`Runtime::quiet`] so the barrier implies completion of any
/// RMA issued by this PE before it (spec §4.7).
///
/// `psync` must be a single-word symmetric array, zero on entry, and is zero
/// again on return.
pub fn barrier(rt: &Runtime, start: Pe, stride: Pe, size: i32, psync: &SymWords) {
    rt.quiet();
    if size <= 1 {
        return;
    }

    if (size as usize) < rt.config().tree_crossover {
        barrier_flat(rt, start, stride, size, psync);
    } else {
        barrier_tree(rt, start, stride, size, psync);
    }
}

/// Convenience over the full PE world rooted at PE 0.
pub fn barrier_all(rt: &Runtime, psync: &SymWords) {
    barrier(rt, 0, 1, rt.n_pes(), psync)
}

fn barrier_flat(rt: &Runtime, start: Pe, stride: Pe, size: i32, psync: &SymWords) {
    let my_pe = rt.my_pe();

    if my_pe == start {
        wait::wait_until(psync.word(0), Comparator::Eq, (size - 1) as i64);
        clear_word(rt, psync, 0);
        for i in 1..size {
            signal_put(rt, start + i * stride, psync.word_addr(0), 1);
        }
    } else {
        signal_add(rt, start, psync.word_addr(0), 1);
        wait::wait(psync.word(0), 0);
        clear_word(rt, psync, 0);
    }
}

fn barrier_tree(rt: &Runtime, start: Pe, stride: Pe, size: i32, psync: &SymWords) {
    let node = tree_for(rt, start, stride, size, 0);
    let my_pe = rt.my_pe();
    let is_root = node.is_root(my_pe);
    let child_count = node.children.len() as i64;

    wait::wait_until(psync.word(0), Comparator::Eq, child_count);

    if !is_root {
        signal_add(rt, node.parent, psync.word_addr(0), 1);
        wait::wait_until(psync.word(0), Comparator::Eq, child_count + 1);
    }

    for &child in &node.children {
        signal_add(rt, child, psync.word_addr(0), 1);
    }

    clear_word(rt, psync, 0);
}
