//! Broadcast (spec §4.7 "Broadcast").

use crate::transfer;
use crate::transport::Pe;
use crate::tree::to_physical;
use crate::wait::{self, Comparator};
use crate::runtime::Runtime;

use super::{clear_word, drain_put_batch, signal_add, signal_put, tree_for, SymWords};

/// Broadcast `source` (meaningful only on the root) to `target_addr` on
/// every other participant in `{start, start+stride, ..., start+(size-1)*stride}`.
///
/// `root` is the *logical* rank of the root within the subgroup (physical PE
/// `to_physical(start, stride, size, root, 0)`). When `complete`, every
/// non-root PE acks back and the root does not return until every ack has
/// arrived (spec §4.7).
///
/// `psync` needs 1 word in tree mode, 2 in flat mode (word 0: arrival
/// signal; word 1: ack fan-in, only used when `complete`).
///
/// `len` is the payload length in bytes; `source` is only read on the root
/// (non-root callers may pass an empty slice) and must be at least `len`
/// bytes long there.
#[allow(clippy::too_many_arguments)]
pub fn broadcast(
    rt: &Runtime,
    start: Pe,
    stride: Pe,
    size: i32,
    root: i32,
    target_addr: usize,
    source: &[u8],
    len: usize,
    psync: &SymWords,
    complete: bool,
) {
    if size <= 1 {
        return;
    }

    if (size as usize) < rt.config().tree_crossover {
        broadcast_flat(rt, start, stride, size, root, target_addr, source, psync, complete);
    } else {
        broadcast_tree(rt, start, stride, size, root, target_addr, source, len, psync, complete);
    }
}

/// Force the flat algorithm regardless of `tree_crossover`. Used by
/// [`crate::collectives::collect::collect`], whose closing fan-out cannot
/// size a tree relay (the tree broadcast needs every relaying PE to already
/// know the payload length, but only `PE_start` knows it at that point —
/// see DESIGN.md).
pub(crate) fn broadcast_flat_forced(
    rt: &Runtime,
    start: Pe,
    stride: Pe,
    size: i32,
    root: i32,
    target_addr: usize,
    source: &[u8],
    psync: &SymWords,
    complete: bool,
) {
    if size <= 1 {
        return;
    }
    broadcast_flat(rt, start, stride, size, root, target_addr, source, psync, complete)
}

fn put_payload(rt: &Runtime, peers: &[Pe], target_addr: usize, payload: &[u8]) {
    let mut issued = 0usize;
    for &peer in peers {
        issued += transfer::put(rt.layout(), rt.transport(), rt.tracker(), rt.my_pe(), peer, target_addr, payload);
    }
    if issued > 0 {
        drain_put_batch(rt, issued);
        for &peer in peers {
            rt.fence(peer);
        }
    }
}

fn read_own_target(rt: &Runtime, target_addr: usize, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    transfer::get(rt.layout(), rt.transport(), rt.tracker(), rt.my_pe(), rt.my_pe(), target_addr, &mut buf);
    buf
}

#[allow(clippy::too_many_arguments)]
fn broadcast_flat(
    rt: &Runtime,
    start: Pe,
    stride: Pe,
    size: i32,
    root: i32,
    target_addr: usize,
    source: &[u8],
    psync: &SymWords,
    complete: bool,
) {
    let my_pe = rt.my_pe();
    let root_pe = to_physical(start, stride, size, root, 0);
    let peers: Vec<Pe> = (0..size).map(|l| to_physical(start, stride, size, root, l)).filter(|&p| p != root_pe).collect();

    if my_pe == root_pe {
        put_payload(rt, &peers, target_addr, source);
        for &peer in &peers {
            signal_put(rt, peer, psync.word_addr(0), 1);
        }
        if complete {
            wait::wait_until(psync.word(1), Comparator::Eq, peers.len() as i64);
            clear_word(rt, psync, 1);
        }
    } else {
        wait::wait(psync.word(0), 0);
        clear_word(rt, psync, 0);
        if complete {
            signal_add(rt, root_pe, psync.word_addr(1), 1);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn broadcast_tree(
    rt: &Runtime,
    start: Pe,
    stride: Pe,
    size: i32,
    root: i32,
    target_addr: usize,
    source: &[u8],
    len: usize,
    psync: &SymWords,
    complete: bool,
) {
    let my_pe = rt.my_pe();
    let node = tree_for(rt, start, stride, size, root);
    let is_root = node.is_root(my_pe);

    if !is_root {
        wait::wait(psync.word(0), 0);
        if complete {
            signal_add(rt, node.parent, psync.word_addr(1), 1);
        }
    }

    if !node.children.is_empty() {
        let payload = if is_root { source[..len].to_vec() } else { read_own_target(rt, target_addr, len) };
        put_payload(rt, &node.children, target_addr, &payload);
        for &child in &node.children {
            signal_put(rt, child, psync.word_addr(0), 1);
        }
        if complete {
            wait::wait_until(psync.word(1), Comparator::Eq, node.children.len() as i64);
            clear_word(rt, psync, 1);
        }
    }

    if !is_root {
        clear_word(rt, psync, 0);
    }
}
