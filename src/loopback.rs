//! An in-process, test-only [`Transport`] + [`ProcessGroup`] pair that
//! simulates an N-PE job inside a single OS process: one OS thread per PE,
//! sharing one [`LoopbackWorld`] arena (spec §1 "Test tooling", GLOSSARY
//! "Loopback transport"). Every put/get/atomic/swap completes synchronously
//! — there is no asynchronous network latency to simulate — so the
//! counting-event bookkeeping in [`crate::completion::CompletionTracker`] is
//! exercised faithfully (pending vs. completed still matter for ordering)
//! without needing to model real async completion races.
//!
//! Arithmetic atomics (`atomic`/`fetch_atomic`) only support scalars up to
//! 8 bytes (`i16`, `i32`, `i64`, `f32`, `f64`); a wider operand fails with a
//! transport error rather than silently truncating — nothing in this
//! crate's collectives reduces over a wider type. The swap family has no
//! such limit: `i128`/`LongDouble`/`ComplexF64` (up to
//! [`crate::transport::MAX_SCALAR_BYTES`]) route through
//! [`LoopbackTransport::swap_wide`], which trades the
//! single-word lock-free CAS for a coarse lock since nothing wider than a
//! word has a stable-Rust atomic to CAS against.
//!
//! Only reachable under `#[cfg(test)]`.

use std::panic;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use crate::completion::CompletionTracker;
use crate::config::RuntimeConfig;
use crate::error::InitError;
use crate::process_group::ProcessGroup;
use crate::region::{RegionId, SymmetricLayout};
use crate::runtime::Runtime;
use crate::transport::{AtomicOp, Datatype, Pe, SwapKind, Transport};

const DATA_BASE: usize = 0;
const HEAP_BASE: usize = 0x1_0000;
const MAX_TRANSFER_CHUNK: usize = 64;

struct Arena {
    data: Box<[AtomicI64]>,
    heap: Box<[AtomicI64]>,
}

impl Arena {
    fn new(data_len: usize, heap_len: usize) -> Self {
        Self {
            data: (0..data_len.div_ceil(8)).map(|_| AtomicI64::new(0)).collect(),
            heap: (0..heap_len.div_ceil(8)).map(|_| AtomicI64::new(0)).collect(),
        }
    }

    fn region(&self, id: RegionId) -> &[AtomicI64] {
        match id {
            RegionId::Data => &self.data,
            RegionId::Heap => &self.heap,
        }
    }
}

/// Shared state for a simulated N-PE job: one [`Arena`] per PE plus the
/// per-PE put/get completion counters and the pre-RMA bootstrap barrier.
pub struct LoopbackWorld {
    num_pes: i32,
    arenas: Vec<Arena>,
    put_completed: Vec<AtomicU64>,
    get_completed: Vec<AtomicU64>,
    bootstrap_barrier: Barrier,
    data_len: usize,
    heap_len: usize,
    /// Coarse-grained lock guarding swap-family operations wider than one
    /// 8-byte word (`i128`/`LongDouble`/`ComplexF64`, spec §3 "Supported
    /// scalar types"). The single-word fast path above takes none of this —
    /// a lock-free CAS on one `AtomicI64` already gives atomicity for
    /// everything `sizeof(i64)` or narrower; this only exists for the wider
    /// scalars a real NIC's compound Swap primitive would still execute
    /// atomically in hardware, which plain `AtomicI64` can't express in
    /// stable Rust.
    wide_swap_lock: Mutex<()>,
}

impl LoopbackWorld {
    pub fn new(num_pes: i32, data_len: usize, heap_len: usize) -> Arc<Self> {
        let arenas = (0..num_pes).map(|_| Arena::new(data_len, heap_len)).collect();
        Arc::new(Self {
            num_pes,
            arenas,
            put_completed: (0..num_pes).map(|_| AtomicU64::new(0)).collect(),
            get_completed: (0..num_pes).map(|_| AtomicU64::new(0)).collect(),
            bootstrap_barrier: Barrier::new(num_pes.max(1) as usize),
            data_len,
            heap_len,
            wide_swap_lock: Mutex::new(()),
        })
    }

    /// The symmetric layout shared by every PE: same region bases and
    /// lengths, the precondition for symmetric addressing (spec §3).
    pub fn layout(&self) -> SymmetricLayout {
        SymmetricLayout::new(DATA_BASE, self.data_len, HEAP_BASE, self.heap_len)
    }

    fn region_words(&self, pe: Pe, region: RegionId) -> &[AtomicI64] {
        self.arenas[pe as usize].region(region)
    }

    fn bump_put_completed(&self, pe: Pe) {
        self.put_completed[pe as usize].fetch_add(1, Ordering::AcqRel);
    }

    fn bump_get_completed(&self, pe: Pe) {
        self.get_completed[pe as usize].fetch_add(1, Ordering::AcqRel);
    }
}

/// Write `src` into `words` (an 8-byte-word-granular array) at `byte_offset`,
/// via a per-word compare-exchange loop so a write that straddles word
/// boundaries, or doesn't cover a whole word, still lands atomically word by
/// word.
fn write_bytes(words: &[AtomicI64], byte_offset: usize, src: &[u8]) {
    let mut pos = 0;
    while pos < src.len() {
        let word_idx = (byte_offset + pos) / 8;
        let byte_in_word = (byte_offset + pos) % 8;
        let n = (8 - byte_in_word).min(src.len() - pos);
        let word = &words[word_idx];
        let mut cur = word.load(Ordering::Acquire);
        loop {
            let mut bytes = cur.to_ne_bytes();
            bytes[byte_in_word..byte_in_word + n].copy_from_slice(&src[pos..pos + n]);
            let new = i64::from_ne_bytes(bytes);
            match word.compare_exchange_weak(cur, new, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
        pos += n;
    }
}

fn read_bytes(words: &[AtomicI64], byte_offset: usize, dst: &mut [u8]) {
    let mut pos = 0;
    while pos < dst.len() {
        let word_idx = (byte_offset + pos) / 8;
        let byte_in_word = (byte_offset + pos) % 8;
        let n = (8 - byte_in_word).min(dst.len() - pos);
        let bytes = words[word_idx].load(Ordering::Acquire).to_ne_bytes();
        dst[pos..pos + n].copy_from_slice(&bytes[byte_in_word..byte_in_word + n]);
        pos += n;
    }
}

/// Apply `op` to the word at `byte_offset`, returning the pre-operation
/// bytes. `byte_offset` must be 8-byte aligned and `operand.len()` must be
/// at most 8; callers enforce this since every arithmetic atomic in this
/// crate operates on scalars that small.
fn atomic_word_op(words: &[AtomicI64], byte_offset: usize, op: AtomicOp, dtype: Datatype, operand: &[u8]) -> Vec<u8> {
    let word_idx = byte_offset / 8;
    let word = &words[word_idx];
    let mut cur = word.load(Ordering::Acquire);
    loop {
        let new = apply_op(op, dtype, cur, operand);
        match word.compare_exchange_weak(cur, new, Ordering::AcqRel, Ordering::Acquire) {
            Ok(prev) => return prev.to_ne_bytes()[..operand.len()].to_vec(),
            Err(actual) => cur = actual,
        }
    }
}

fn apply_op(op: AtomicOp, dtype: Datatype, cur: i64, operand: &[u8]) -> i64 {
    match dtype {
        Datatype::F32 => {
            let a = f32::from_ne_bytes(cur.to_ne_bytes()[..4].try_into().unwrap());
            let b = f32::from_ne_bytes(operand.try_into().unwrap());
            let r = apply_float_op(op, a, b);
            let mut bytes = cur.to_ne_bytes();
            bytes[..4].copy_from_slice(&r.to_ne_bytes());
            i64::from_ne_bytes(bytes)
        }
        Datatype::F64 => {
            let a = f64::from_ne_bytes(cur.to_ne_bytes());
            let b = f64::from_ne_bytes(operand.try_into().unwrap());
            i64::from_ne_bytes(apply_float_op(op, a, b).to_ne_bytes())
        }
        _ => {
            let a = cur;
            let mut padded = [0u8; 8];
            padded[..operand.len()].copy_from_slice(operand);
            let b = i64::from_ne_bytes(padded);
            apply_int_op(op, a, b)
        }
    }
}

fn apply_int_op(op: AtomicOp, a: i64, b: i64) -> i64 {
    match op {
        AtomicOp::Sum => a.wrapping_add(b),
        AtomicOp::Prod => a.wrapping_mul(b),
        AtomicOp::Band => a & b,
        AtomicOp::Bor => a | b,
        AtomicOp::Bxor => a ^ b,
        AtomicOp::Min => a.min(b),
        AtomicOp::Max => a.max(b),
    }
}

fn apply_float_op<F: PartialOrd + std::ops::Add<Output = F> + std::ops::Mul<Output = F>>(op: AtomicOp, a: F, b: F) -> F {
    match op {
        AtomicOp::Sum => a + b,
        AtomicOp::Prod => a * b,
        AtomicOp::Min => {
            if a < b {
                a
            } else {
                b
            }
        }
        AtomicOp::Max => {
            if a > b {
                a
            } else {
                b
            }
        }
        AtomicOp::Band | AtomicOp::Bor | AtomicOp::Bxor => a,
    }
}

/// Tracks init-time resource acquisition in order so it can release in
/// reverse on a simulated failure (spec §7 kind 4, §9 resolved open
/// question). A real transport's `connect` would push a guard per
/// `PtlMDBind`/`PtlPTAlloc`/`PtlCTAlloc`/`PtlEQAlloc`; this stands in with
/// plain labels since the loopback never really allocates OS resources.
struct ResourceGuards(Vec<&'static str>);

impl ResourceGuards {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn acquire(&mut self, label: &'static str) {
        log::debug!("loopback: acquired {label}");
        self.0.push(label);
    }

    fn release_all(&mut self) {
        while let Some(label) = self.0.pop() {
            log::debug!("loopback: released {label}");
        }
    }
}

/// The test-only [`Transport`] implementation backed by a [`LoopbackWorld`].
pub struct LoopbackTransport {
    world: Arc<LoopbackWorld>,
    my_pe: Pe,
}

impl LoopbackTransport {
    /// Simulate the MD/PT/CT/EQ acquisition sequence (spec §6 "Transport
    /// contract"), always succeeding.
    pub fn connect(world: Arc<LoopbackWorld>, my_pe: Pe) -> Result<Self, InitError> {
        Self::connect_injecting_failure(world, my_pe, None)
    }

    /// Same acquisition sequence, but fails at acquisition step `fail_at`
    /// (0-indexed over `[put_md, get_md, counting_events, event_queue]`)
    /// after releasing everything acquired so far in reverse order. Exists
    /// to exercise the resolved open question on init cleanup ordering.
    pub fn connect_injecting_failure(world: Arc<LoopbackWorld>, my_pe: Pe, fail_at: Option<u8>) -> Result<Self, InitError> {
        let steps = ["put_md", "get_md", "counting_events", "event_queue"];
        let mut guards = ResourceGuards::new();

        for (i, label) in steps.iter().enumerate() {
            if fail_at == Some(i as u8) {
                guards.release_all();
                return Err(InitError::MemoryDescriptor { which: label, code: -1 });
            }
            guards.acquire(label);
        }

        Ok(Self { world, my_pe })
    }

    /// Swap-family path for operands wider than one 8-byte word (`i128`,
    /// `LongDouble`, `ComplexF64`, spec §3). Holds `wide_swap_lock` for the
    /// read-modify-write instead of a lock-free CAS, since there is no
    /// atomic wider than a word on stable Rust to CAS against.
    fn swap_wide(&self, pe: Pe, region: RegionId, offset: usize, src: &[u8], dst: &mut [u8], kind: SwapKind<'_>) -> Result<(), i32> {
        let _guard = self.world.wide_swap_lock.lock().expect("wide_swap_lock poisoned");
        let words = self.world.region_words(pe, region);

        let mut prior = vec![0u8; src.len()];
        read_bytes(words, offset, &mut prior);

        let should_write = match kind {
            SwapKind::Unconditional => true,
            SwapKind::CompareAndSwap { operand } => prior == operand,
            SwapKind::MaskedSwap { .. } => true,
        };

        if should_write {
            match kind {
                SwapKind::MaskedSwap { mask } => {
                    let mut new_bytes = prior.clone();
                    for i in 0..src.len() {
                        new_bytes[i] = (new_bytes[i] & !mask[i]) | (src[i] & mask[i]);
                    }
                    write_bytes(words, offset, &new_bytes);
                }
                _ => write_bytes(words, offset, src),
            }
        }

        dst.copy_from_slice(&prior);
        self.world.bump_get_completed(self.my_pe);
        Ok(())
    }
}

impl Transport for LoopbackTransport {
    fn max_put_size(&self) -> usize {
        MAX_TRANSFER_CHUNK
    }

    fn max_atomic_size(&self) -> usize {
        MAX_TRANSFER_CHUNK
    }

    fn put(&self, pe: Pe, region: RegionId, offset: usize, src: &[u8]) -> Result<(), i32> {
        write_bytes(self.world.region_words(pe, region), offset, src);
        self.world.bump_put_completed(self.my_pe);
        Ok(())
    }

    fn get(&self, pe: Pe, region: RegionId, offset: usize, dst: &mut [u8]) -> Result<(), i32> {
        read_bytes(self.world.region_words(pe, region), offset, dst);
        self.world.bump_get_completed(self.my_pe);
        Ok(())
    }

    fn atomic(&self, pe: Pe, region: RegionId, offset: usize, src: &[u8], op: AtomicOp, dtype: Datatype) -> Result<(), i32> {
        if src.len() > 8 {
            return Err(-1);
        }
        atomic_word_op(self.world.region_words(pe, region), offset, op, dtype, src);
        self.world.bump_put_completed(self.my_pe);
        Ok(())
    }

    fn fetch_atomic(
        &self,
        pe: Pe,
        region: RegionId,
        offset: usize,
        src: &[u8],
        dst: &mut [u8],
        op: AtomicOp,
        dtype: Datatype,
    ) -> Result<(), i32> {
        if src.len() > 8 {
            return Err(-1);
        }
        let prior = atomic_word_op(self.world.region_words(pe, region), offset, op, dtype, src);
        dst.copy_from_slice(&prior);
        self.world.bump_get_completed(self.my_pe);
        Ok(())
    }

    fn swap(
        &self,
        pe: Pe,
        region: RegionId,
        offset: usize,
        src: &[u8],
        dst: &mut [u8],
        kind: SwapKind<'_>,
        _dtype: Datatype,
    ) -> Result<(), i32> {
        if src.len() > 8 {
            return self.swap_wide(pe, region, offset, src, dst, kind);
        }
        let words = self.world.region_words(pe, region);
        let word_idx = offset / 8;
        let word = &words[word_idx];

        let mut cur = word.load(Ordering::Acquire);
        loop {
            let cur_bytes = cur.to_ne_bytes();
            let prior = cur_bytes[..src.len()].to_vec();

            let should_write = match kind {
                SwapKind::Unconditional => true,
                SwapKind::CompareAndSwap { operand } => prior == operand,
                SwapKind::MaskedSwap { .. } => true,
            };

            let new = if !should_write {
                cur
            } else {
                let mut new_bytes = cur_bytes;
                match kind {
                    SwapKind::MaskedSwap { mask } => {
                        for i in 0..src.len() {
                            new_bytes[i] = (new_bytes[i] & !mask[i]) | (src[i] & mask[i]);
                        }
                    }
                    _ => new_bytes[..src.len()].copy_from_slice(src),
                }
                i64::from_ne_bytes(new_bytes)
            };

            match word.compare_exchange_weak(cur, new, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    dst.copy_from_slice(&prior);
                    self.world.bump_get_completed(self.my_pe);
                    return Ok(());
                }
                Err(actual) => cur = actual,
            }
        }
    }

    fn fence(&self, _pe: Pe) -> Result<(), i32> {
        Ok(())
    }

    fn put_completed(&self) -> u64 {
        self.world.put_completed[self.my_pe as usize].load(Ordering::Acquire)
    }

    fn get_completed(&self) -> u64 {
        self.world.get_completed[self.my_pe as usize].load(Ordering::Acquire)
    }

    fn wait_put_completed_at_least(&self, target: u64) -> Result<(), i32> {
        while self.put_completed() < target {
            std::thread::yield_now();
        }
        Ok(())
    }

    fn wait_get_completed_at_least(&self, target: u64) -> Result<(), i32> {
        while self.get_completed() < target {
            std::thread::yield_now();
        }
        Ok(())
    }

    fn drain_put_events(&self, _n: usize) -> Result<(), i32> {
        Ok(())
    }
}

/// The test-only [`ProcessGroup`] implementation backed by a [`LoopbackWorld`].
pub struct LoopbackProcessGroup {
    world: Arc<LoopbackWorld>,
    my_pe: Pe,
}

impl LoopbackProcessGroup {
    pub fn new(world: Arc<LoopbackWorld>, my_pe: Pe) -> Self {
        Self { world, my_pe }
    }
}

impl ProcessGroup for LoopbackProcessGroup {
    fn my_pe(&self) -> i32 {
        self.my_pe
    }

    fn num_pes(&self) -> i32 {
        self.world.num_pes
    }

    fn bootstrap_barrier(&self) {
        self.world.bootstrap_barrier.wait();
    }
}

/// Drives the loopback harness: one OS thread per simulated PE, all sharing
/// one [`LoopbackWorld`], each with its own [`Runtime`] (spec §5 "the PE is
/// the unit of concurrency" — each thread here stands in for a whole PE
/// process).
pub mod harness {
    use super::*;
    use crate::collectives::SymWords;
    use std::cell::RefCell;

    thread_local! {
        static CURRENT: RefCell<Option<(Arc<LoopbackWorld>, Pe)>> = const { RefCell::new(None) };
    }

    /// Run `f` once per simulated PE and join every thread. If any PE's `f`
    /// panics, the first panic observed is re-raised after every thread has
    /// been joined (so a hang on another PE doesn't silently swallow it).
    pub fn run<F>(num_pes: i32, f: F)
    where
        F: Fn(&Runtime) + Send + Sync + 'static,
    {
        let _ = env_logger::try_init();
        let world = LoopbackWorld::new(num_pes, 4096, 4096);
        let f = Arc::new(f);

        let handles: Vec<_> = (0..num_pes)
            .map(|pe| {
                let world = world.clone();
                let f = f.clone();
                std::thread::spawn(move || {
                    CURRENT.with(|c| *c.borrow_mut() = Some((world.clone(), pe)));
                    let transport = LoopbackTransport::connect(world.clone(), pe).expect("loopback connect");
                    let pg = LoopbackProcessGroup::new(world.clone(), pe);
                    let layout = world.layout();
                    let rt = Runtime::init(Box::new(transport), Box::new(pg), layout, RuntimeConfig::default())
                        .expect("loopback runtime init");
                    f(&rt);
                })
            })
            .collect();

        let mut first_panic = None;
        for h in handles {
            if let Err(e) = h.join() {
                if first_panic.is_none() {
                    first_panic = Some(e);
                }
            }
        }
        if let Some(e) = first_panic {
            panic::resume_unwind(e);
        }
    }

    /// A fixed, collision-free symmetric heap address for scratch slot
    /// `slot`: the same relative offset on every PE, satisfying the
    /// symmetric-memory precondition without any cross-thread coordination.
    pub fn symmetric_scratch_addr(_rt: &Runtime, slot: usize) -> usize {
        const SLOT_BYTES: usize = 256;
        HEAP_BASE + slot * SLOT_BYTES
    }

    /// Borrow `n` words of this PE's own backing storage at
    /// `symmetric_scratch_addr(rt, slot)`, for direct local access (a
    /// `pSync` array, or any buffer a collective needs to spin-wait on).
    ///
    /// The returned slice aliases the shared [`LoopbackWorld`] arena kept
    /// alive by this thread's own `Arc` for the remainder of [`run`]; the
    /// widened lifetime is sound as long as the caller (a test body running
    /// inside `run`) never lets it outlive that scope.
    pub fn scratch_words(rt: &Runtime, slot: usize, n: usize) -> SymWords<'static> {
        let addr = symmetric_scratch_addr(rt, slot);
        let (_region, offset) = rt.layout().classify(addr).expect("scratch slot outside heap region");

        let slice: &'static [AtomicI64] = CURRENT.with(|c| {
            let guard = c.borrow();
            let (world, pe) = guard.as_ref().expect("scratch_words called outside harness::run");
            let words = world.region_words(*pe, RegionId::Heap);
            let word_idx = offset / 8;
            let slice = &words[word_idx..word_idx + n];
            unsafe { std::mem::transmute::<&[AtomicI64], &'static [AtomicI64]>(slice) }
        });

        SymWords::new(addr, slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let world = LoopbackWorld::new(2, 256, 256);
        let t0 = LoopbackTransport::connect(world.clone(), 0).unwrap();
        t0.put(1, RegionId::Heap, 8, &42i64.to_ne_bytes()).unwrap();

        let t1 = LoopbackTransport::connect(world, 1).unwrap();
        let mut buf = [0u8; 8];
        t1.get(1, RegionId::Heap, 8, &mut buf).unwrap();
        assert_eq!(i64::from_ne_bytes(buf), 42);
    }

    #[test]
    fn atomic_sum_accumulates() {
        let world = LoopbackWorld::new(1, 256, 256);
        let t = LoopbackTransport::connect(world, 0).unwrap();
        for _ in 0..3 {
            t.atomic(0, RegionId::Heap, 0, &1i64.to_ne_bytes(), AtomicOp::Sum, Datatype::I64).unwrap();
        }
        let mut buf = [0u8; 8];
        t.get(0, RegionId::Heap, 0, &mut buf).unwrap();
        assert_eq!(i64::from_ne_bytes(buf), 3);
    }

    #[test]
    fn connect_injecting_failure_releases_acquired_guards_in_reverse() {
        let world = LoopbackWorld::new(1, 256, 256);
        let err = LoopbackTransport::connect_injecting_failure(world, 0, Some(2)).unwrap_err();
        assert!(matches!(err, InitError::MemoryDescriptor { which: "counting_events", .. }));
    }

    #[test]
    fn cswap_only_writes_when_operand_matches() {
        let world = LoopbackWorld::new(1, 256, 256);
        let t = LoopbackTransport::connect(world, 0).unwrap();

        let mut prior = [0u8; 8];
        t.swap(
            0,
            RegionId::Heap,
            0,
            &7i64.to_ne_bytes(),
            &mut prior,
            SwapKind::CompareAndSwap { operand: &99i64.to_ne_bytes() },
            Datatype::I64,
        )
        .unwrap();
        let mut cur = [0u8; 8];
        t.get(0, RegionId::Heap, 0, &mut cur).unwrap();
        assert_eq!(i64::from_ne_bytes(cur), 0, "mismatched operand must not write");

        t.swap(
            0,
            RegionId::Heap,
            0,
            &7i64.to_ne_bytes(),
            &mut prior,
            SwapKind::CompareAndSwap { operand: &0i64.to_ne_bytes() },
            Datatype::I64,
        )
        .unwrap();
        t.get(0, RegionId::Heap, 0, &mut cur).unwrap();
        assert_eq!(i64::from_ne_bytes(cur), 7, "matching operand must write");
    }
}
