//! The segmented one-sided transfer engine (spec §4.3): put, get, atomic,
//! fetch-atomic, and the swap family, all built on [`crate::transport::Transport`]
//! plus the address resolver and completion tracker.
//!
//! This module takes its collaborators as plain references rather than a
//! `Runtime` so it stays unit-testable against [`crate::loopback`] without
//! pulling in tree-building or collective state; [`crate::runtime::Runtime`]
//! is the thin facade that threads its own fields through these functions.

use crate::address::resolve;
use crate::completion::CompletionTracker;
use crate::error::{transport_abort, usage_abort};
use crate::region::SymmetricLayout;
use crate::transport::{AtomicOp, Datatype, SwapKind, Transport, MAX_SCALAR_BYTES};

/// Produces `(local_offset, remote_offset, chunk_len)` triples for a
/// transfer of `len` bytes starting at remote `offset`, capped at
/// `max_size` per chunk (spec §9 "Segmentation loop"). Keeping this as one
/// small iterator is what keeps the counter-bumping in a single place in
/// `put`/`atomic` below.
fn segments(len: usize, max_size: usize) -> impl Iterator<Item = (usize, usize, usize)> {
    let max_size = max_size.max(1);
    let mut sent = 0;
    std::iter::from_fn(move || {
        if sent >= len {
            return None;
        }
        let chunk = (len - sent).min(max_size);
        let item = (sent, sent, chunk);
        sent += chunk;
        Some(item)
    })
}

/// One-sided write of `src` to the symmetric address `target` on `pe`.
///
/// Segments the transfer if `src.len() > max_put_size` (spec §4.3 step 2).
/// Returns the number of transport calls issued, for collectives that need
/// to drain a specific batch (spec §4.3 step 4).
#[track_caller]
pub fn put(
    layout: &SymmetricLayout,
    transport: &dyn Transport,
    tracker: &CompletionTracker,
    my_pe: i32,
    pe: i32,
    target: usize,
    src: &[u8],
) -> usize {
    let (region, offset) = resolve(layout, my_pe, target);
    let max = transport.max_put_size();
    let mut issued = 0usize;

    for (local_off, remote_off, chunk) in segments(src.len(), max) {
        if let Err(code) = transport.put(pe, region, offset + remote_off, &src[local_off..local_off + chunk]) {
            transport_abort(my_pe, code);
        }
        issued += 1;
    }
    tracker.record_puts(issued as u64);
    issued
}

/// One-sided read of `dst.len()` bytes from the symmetric address `source`
/// on `pe`. Gets are never segmented (spec §4.3: "Every other op ... is
/// latency-bound"); they block for completion immediately (spec §4.2).
#[track_caller]
pub fn get(
    layout: &SymmetricLayout,
    transport: &dyn Transport,
    tracker: &CompletionTracker,
    my_pe: i32,
    pe: i32,
    source: usize,
    dst: &mut [u8],
) {
    let (region, offset) = resolve(layout, my_pe, source);
    if let Err(code) = transport.get(pe, region, offset, dst) {
        transport_abort(my_pe, code);
    }
    tracker.record_get();
    tracker.drain_gets(my_pe, transport);
}

/// Atomic reduction of `src` into the symmetric address `target` on `pe`.
/// Segments the transfer if `src.len() > max_atomic_size` (spec §4.3 step
/// 2). Returns the number of transport calls issued.
#[track_caller]
pub fn atomic(
    layout: &SymmetricLayout,
    transport: &dyn Transport,
    tracker: &CompletionTracker,
    my_pe: i32,
    pe: i32,
    target: usize,
    src: &[u8],
    op: AtomicOp,
    dtype: Datatype,
) -> usize {
    let (region, offset) = resolve(layout, my_pe, target);
    let max = transport.max_atomic_size();
    let mut issued = 0usize;

    for (local_off, remote_off, chunk) in segments(src.len(), max) {
        if let Err(code) = transport.atomic(
            pe,
            region,
            offset + remote_off,
            &src[local_off..local_off + chunk],
            op,
            dtype,
        ) {
            transport_abort(my_pe, code);
        }
        issued += 1;
    }
    tracker.record_puts(issued as u64);
    issued
}

/// Checks a scalar-sized operation's length against [`MAX_SCALAR_BYTES`]
/// (spec §4.3 step 2: "checked by assertion").
#[track_caller]
fn assert_scalar_len(my_pe: i32, len: usize) {
    if len > MAX_SCALAR_BYTES {
        usage_abort(my_pe, "operand exceeds the widest supported scalar");
    }
}

/// Atomic reduction that also fetches the pre-operation value into `dst`.
/// `src.len()` must not exceed [`MAX_SCALAR_BYTES`] (spec §4.3 step 2).
#[track_caller]
pub fn fetch_atomic(
    layout: &SymmetricLayout,
    transport: &dyn Transport,
    tracker: &CompletionTracker,
    my_pe: i32,
    pe: i32,
    target: usize,
    src: &[u8],
    dst: &mut [u8],
    op: AtomicOp,
    dtype: Datatype,
) {
    assert_scalar_len(my_pe, src.len());
    let (region, offset) = resolve(layout, my_pe, target);
    if let Err(code) = transport.fetch_atomic(pe, region, offset, src, dst, op, dtype) {
        transport_abort(my_pe, code);
    }
    tracker.record_get();
    tracker.drain_gets(my_pe, transport);
}

/// Unconditional swap: write `src` to `target` on `pe`, return the prior
/// value in `dst`.
#[track_caller]
pub fn swap(
    layout: &SymmetricLayout,
    transport: &dyn Transport,
    tracker: &CompletionTracker,
    my_pe: i32,
    pe: i32,
    target: usize,
    src: &[u8],
    dst: &mut [u8],
    dtype: Datatype,
) {
    swap_impl(layout, transport, tracker, my_pe, pe, target, src, dst, SwapKind::Unconditional, dtype)
}

/// Compare-and-swap: write `src` to `target` on `pe` only if its current
/// value equals `operand`; return the prior value in `dst` either way.
#[track_caller]
pub fn cswap(
    layout: &SymmetricLayout,
    transport: &dyn Transport,
    tracker: &CompletionTracker,
    my_pe: i32,
    pe: i32,
    target: usize,
    src: &[u8],
    dst: &mut [u8],
    operand: &[u8],
    dtype: Datatype,
) {
    swap_impl(
        layout,
        transport,
        tracker,
        my_pe,
        pe,
        target,
        src,
        dst,
        SwapKind::CompareAndSwap { operand },
        dtype,
    )
}

/// Masked swap: overwrite only the bits set in `mask` of `target` on `pe`
/// with the corresponding bits of `src`; return the prior value in `dst`.
#[track_caller]
pub fn mswap(
    layout: &SymmetricLayout,
    transport: &dyn Transport,
    tracker: &CompletionTracker,
    my_pe: i32,
    pe: i32,
    target: usize,
    src: &[u8],
    dst: &mut [u8],
    mask: &[u8],
    dtype: Datatype,
) {
    swap_impl(
        layout,
        transport,
        tracker,
        my_pe,
        pe,
        target,
        src,
        dst,
        SwapKind::MaskedSwap { mask },
        dtype,
    )
}

#[track_caller]
#[allow(clippy::too_many_arguments)]
fn swap_impl(
    layout: &SymmetricLayout,
    transport: &dyn Transport,
    tracker: &CompletionTracker,
    my_pe: i32,
    pe: i32,
    target: usize,
    src: &[u8],
    dst: &mut [u8],
    kind: SwapKind<'_>,
    dtype: Datatype,
) {
    assert_scalar_len(my_pe, src.len());
    let (region, offset) = resolve(layout, my_pe, target);
    if let Err(code) = transport.swap(pe, region, offset, src, dst, kind, dtype) {
        transport_abort(my_pe, code);
    }
    tracker.record_get();
    tracker.drain_gets(my_pe, transport);
}
