//! The transport contract consumed by this crate (spec §6 "Transport
//! contract"). A real implementation sits on top of a Portals4-like network
//! library; [`crate::loopback`] provides an in-process stand-in for tests.
//!
//! The trait is expressed over plain byte slices rather than raw pointers:
//! the original C runtime hands `void*` to `PtlPut`/`PtlGet`/etc. because its
//! memory descriptors cover the whole address space, but in Rust the
//! transfer engine (`crate::transfer`) is the only caller, and it already
//! holds typed, bounds-checked slices by the time it reaches the transport.
//! Pushing `unsafe` pointer arithmetic down into every `Transport` impl would
//! just duplicate the bounds checking the slice already gives us for free.

use crate::region::RegionId;

/// A processing element identifier, `0 <= pe < num_pes()`.
pub type Pe = i32;

/// Scalar datatypes the transport can move and, where noted, reduce.
///
/// `LongDouble`/`ComplexF32`/`ComplexF64` participate in put/get/swap but
/// never in [`AtomicOp`] reductions, matching Portals4 (and the original
/// runtime), which defines no arithmetic atomics over those types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Datatype {
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    LongDouble,
    ComplexF32,
    ComplexF64,
}

impl Datatype {
    /// Size in bytes of one scalar of this type.
    pub const fn byte_len(self) -> usize {
        match self {
            Datatype::I16 => 2,
            Datatype::I32 => 4,
            Datatype::I64 => 8,
            Datatype::I128 => 16,
            Datatype::F32 => 4,
            Datatype::F64 => 8,
            Datatype::LongDouble => 16,
            Datatype::ComplexF32 => 8,
            Datatype::ComplexF64 => 16,
        }
    }

    /// Whether this type admits [`AtomicOp`] reductions.
    pub const fn is_arithmetic(self) -> bool {
        !matches!(
            self,
            Datatype::LongDouble | Datatype::ComplexF32 | Datatype::ComplexF64
        )
    }
}

/// The widest scalar this runtime moves; every non-segmenting operation
/// (get, fetch-atomic, swap family) is checked against this bound (spec
/// §4.3 step 2).
pub const MAX_SCALAR_BYTES: usize = 16;

/// Reduction operator selecting the transport's compound atomic primitive
/// (spec §4.7 "Op-to-all" and §6's `{sum,prod,and,or,xor,min,max}_to_all`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AtomicOp {
    Sum,
    Prod,
    Band,
    Bor,
    Bxor,
    Min,
    Max,
}

/// Which of the transport's compound Swap primitives to invoke (spec §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwapKind<'a> {
    /// Unconditional swap: always overwrite, always return the prior value.
    Unconditional,
    /// Compare-and-swap: overwrite only if the target equals `operand`.
    CompareAndSwap { operand: &'a [u8] },
    /// Masked swap: overwrite only the bits set in `mask`.
    MaskedSwap { mask: &'a [u8] },
}

/// A one-sided RDMA transport providing Put/Get/Atomic/FetchAtomic/Swap with
/// ack-requested completion, plus fence/quiet-equivalent primitives and the
/// segmentation thresholds negotiated at `NIInit` time (spec §6).
///
/// All methods take `&self`: a PE is single-threaded (spec §5), so the
/// transport never needs interior locking on the issuing side, only the
/// monotonic counters a concurrent remote PE might be advancing underneath
/// it (event/counting-event delivery is inherently concurrent with the
/// issuing PE's program order).
pub trait Transport: Send + Sync {
    /// Segmentation threshold for plain puts (spec §4.3 step 2).
    fn max_put_size(&self) -> usize;
    /// Segmentation threshold for plain atomics (spec §4.3 step 2).
    fn max_atomic_size(&self) -> usize;

    /// Ack-requested one-sided write of `src` into `(pe, region, offset)`.
    /// Bumps the transport's put counting event on completion.
    fn put(&self, pe: Pe, region: RegionId, offset: usize, src: &[u8]) -> Result<(), i32>;

    /// One-sided read of `len` bytes from `(pe, region, offset)` into `dst`.
    /// Bumps the transport's get counting event on completion.
    fn get(&self, pe: Pe, region: RegionId, offset: usize, dst: &mut [u8]) -> Result<(), i32>;

    /// Ack-requested atomic reduction of `src` into `(pe, region, offset)`.
    /// Bumps the put counting event on completion.
    fn atomic(
        &self,
        pe: Pe,
        region: RegionId,
        offset: usize,
        src: &[u8],
        op: AtomicOp,
        dtype: Datatype,
    ) -> Result<(), i32>;

    /// Atomic reduction that also fetches the pre-operation value into
    /// `dst`. Bumps the get counting event on completion.
    fn fetch_atomic(
        &self,
        pe: Pe,
        region: RegionId,
        offset: usize,
        src: &[u8],
        dst: &mut [u8],
        op: AtomicOp,
        dtype: Datatype,
    ) -> Result<(), i32>;

    /// Compound swap (unconditional / compare-and-swap / masked-swap).
    /// `src` is the new value to write; the prior value is returned in
    /// `dst`. Bumps the get counting event on completion.
    fn swap(
        &self,
        pe: Pe,
        region: RegionId,
        offset: usize,
        src: &[u8],
        dst: &mut [u8],
        kind: SwapKind<'_>,
        dtype: Datatype,
    ) -> Result<(), i32>;

    /// Remote-per-target ordering: operations issued to `pe` before this
    /// call are ordered before any issued after it (spec §4.4). A transport
    /// with only global ordering may implement this as a full drain; see
    /// [`crate::config::RuntimeConfig::fence_is_quiet`].
    fn fence(&self, pe: Pe) -> Result<(), i32>;

    /// Current value of the put counting event (`put_ct`).
    fn put_completed(&self) -> u64;
    /// Current value of the get counting event (`get_ct`).
    fn get_completed(&self) -> u64;

    /// Block until `put_ct >= target`. Returns the failure type on a
    /// non-zero completion failure (spec §4.2).
    fn wait_put_completed_at_least(&self, target: u64) -> Result<(), i32>;
    /// Block until `get_ct >= target`. Returns the failure type on a
    /// non-zero completion failure (spec §4.2).
    fn wait_get_completed_at_least(&self, target: u64) -> Result<(), i32>;

    /// Dequeue `n` events from the put event queue, failing on the first
    /// non-OK one (spec §4.2 "Event-based"). Only meaningful when built with
    /// the `event-completion` feature and enabled in [`crate::config::RuntimeConfig`];
    /// a transport that never generates per-put events may implement this as
    /// a no-op returning `Ok(())`.
    fn drain_put_events(&self, n: usize) -> Result<(), i32>;
}
