//! The typed, per-datatype public surface (spec §6 "Public surface"): the
//! put/get/atomic/swap family for every supported scalar, plus named
//! collectives wrappers, all built directly on [`crate::transfer`] and
//! [`crate::collectives`].
//!
//! A layer above this crate (an ABI shim, a Fortran binding, a generated C
//! header) calls into these named functions rather than the generic
//! byte-oriented engine underneath — the naming and per-type duplication
//! here mirror the C SHMEM API this runtime implements the core of,
//! generated with one macro per call shape instead of hand-written once
//! per type.
//!
//! `long double` and the complex types participate in put/get/swap (spec
//! §3) but never in reductions — [`ShmemScalar::IS_ARITHMETIC`] gates the
//! atomic-family wrappers the `typed_scalar_api!` macro generates.

use crate::collectives::{self, SymWords};
use crate::runtime::Runtime;
use crate::transfer;
use crate::transport::{AtomicOp, Datatype, Pe};

/// A scalar type the typed surface moves. Implemented for every Rust type
/// with a direct [`Datatype`] counterpart; `to_bytes`/`from_bytes` go
/// through native-endian byte arrays since [`crate::transport::Transport`]
/// moves plain bytes (spec §4.3 doc comment on why the trait is
/// byte-oriented rather than pointer-oriented).
pub trait ShmemScalar: Copy {
    const DATATYPE: Datatype;
    const IS_ARITHMETIC: bool;
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default;

    fn to_bytes(self) -> Self::Bytes;
    fn from_bytes(bytes: &[u8]) -> Self;
}

macro_rules! impl_shmem_scalar_int {
    ($ty:ty, $dtype:expr, $n:expr) => {
        impl ShmemScalar for $ty {
            const DATATYPE: Datatype = $dtype;
            const IS_ARITHMETIC: bool = true;
            type Bytes = [u8; $n];

            fn to_bytes(self) -> Self::Bytes {
                self.to_ne_bytes()
            }
            fn from_bytes(bytes: &[u8]) -> Self {
                <$ty>::from_ne_bytes(bytes.try_into().expect("scalar byte length mismatch"))
            }
        }
    };
}

impl_shmem_scalar_int!(i16, Datatype::I16, 2);
impl_shmem_scalar_int!(i32, Datatype::I32, 4);
impl_shmem_scalar_int!(i64, Datatype::I64, 8);
impl_shmem_scalar_int!(f32, Datatype::F32, 4);
impl_shmem_scalar_int!(f64, Datatype::F64, 8);

impl ShmemScalar for i128 {
    const DATATYPE: Datatype = Datatype::I128;
    const IS_ARITHMETIC: bool = false;
    type Bytes = [u8; 16];

    fn to_bytes(self) -> Self::Bytes {
        self.to_ne_bytes()
    }
    fn from_bytes(bytes: &[u8]) -> Self {
        i128::from_ne_bytes(bytes.try_into().expect("scalar byte length mismatch"))
    }
}

/// Opaque fixed-size payloads for the scalar types Portals4 never defines
/// arithmetic atomics over (spec §3 "Supported scalar types"): `long
/// double`, and the single/double-precision complex types. Each wraps a
/// plain byte array so put/get/swap move it like any other scalar while
/// [`ShmemScalar::IS_ARITHMETIC`] keeps it out of the atomic-family wrappers
/// the [`typed_scalar_api!`] macro generates.
macro_rules! impl_shmem_scalar_opaque {
    ($name:ident, $dtype:expr, $n:expr) => {
        #[doc = concat!("An opaque ", stringify!($n), "-byte payload (", stringify!($dtype), ").")]
        #[derive(Clone, Copy, Debug, PartialEq)]
        pub struct $name(pub [u8; $n]);

        impl ShmemScalar for $name {
            const DATATYPE: Datatype = $dtype;
            const IS_ARITHMETIC: bool = false;
            type Bytes = [u8; $n];

            fn to_bytes(self) -> Self::Bytes {
                self.0
            }
            fn from_bytes(bytes: &[u8]) -> Self {
                let mut buf = [0u8; $n];
                buf.copy_from_slice(bytes);
                Self(buf)
            }
        }
    };
}

impl_shmem_scalar_opaque!(LongDouble, Datatype::LongDouble, 16);
impl_shmem_scalar_opaque!(ComplexF32, Datatype::ComplexF32, 8);
impl_shmem_scalar_opaque!(ComplexF64, Datatype::ComplexF64, 16);

/// One-sided write of `value` to the symmetric address `dest` on `pe`.
/// Always "blocking" in the OpenSHMEM sense (the source is copied into the
/// transport call before this returns, so `value` is always reusable
/// afterward) — `put`/`put_nbi` are the same call here since
/// [`crate::transfer::put`] never defers the copy; a caller that wants the
/// non-blocking-implicit completion discipline simply does not follow up
/// with [`quiet`] until it's ready.
pub fn put<T: ShmemScalar>(rt: &Runtime, pe: Pe, dest: usize, value: T) {
    transfer::put(rt.layout(), rt.transport(), rt.tracker(), rt.my_pe(), pe, dest, value.to_bytes().as_ref());
}

/// See [`put`]: identical completion discipline, kept as a separate name to
/// match the spec's "non-blocking variants" surface.
pub fn put_nbi<T: ShmemScalar>(rt: &Runtime, pe: Pe, dest: usize, value: T) {
    put(rt, pe, dest, value)
}

/// One-sided read of the symmetric address `src` on `pe`.
pub fn get<T: ShmemScalar>(rt: &Runtime, pe: Pe, src: usize) -> T {
    let mut bytes = T::Bytes::default();
    transfer::get(rt.layout(), rt.transport(), rt.tracker(), rt.my_pe(), pe, src, bytes.as_mut());
    T::from_bytes(bytes.as_ref())
}

/// Atomic reduction of `value` into the symmetric address `dest` on `pe`.
pub fn atomic<T: ShmemScalar>(rt: &Runtime, pe: Pe, dest: usize, value: T, op: AtomicOp) {
    debug_assert!(T::IS_ARITHMETIC, "atomic reductions are undefined for this datatype");
    transfer::atomic(rt.layout(), rt.transport(), rt.tracker(), rt.my_pe(), pe, dest, value.to_bytes().as_ref(), op, T::DATATYPE);
}

/// Atomic reduction that also fetches the pre-operation value.
pub fn fetch_atomic<T: ShmemScalar>(rt: &Runtime, pe: Pe, dest: usize, value: T, op: AtomicOp) -> T {
    debug_assert!(T::IS_ARITHMETIC, "atomic reductions are undefined for this datatype");
    let mut bytes = T::Bytes::default();
    transfer::fetch_atomic(
        rt.layout(),
        rt.transport(),
        rt.tracker(),
        rt.my_pe(),
        pe,
        dest,
        value.to_bytes().as_ref(),
        bytes.as_mut(),
        op,
        T::DATATYPE,
    );
    T::from_bytes(bytes.as_ref())
}

/// Atomic fetch-and-add: `fetch_atomic(.., AtomicOp::Sum)`.
pub fn fetch_add<T: ShmemScalar>(rt: &Runtime, pe: Pe, dest: usize, value: T) -> T {
    fetch_atomic(rt, pe, dest, value, AtomicOp::Sum)
}

/// Unconditional swap: write `value` to `dest` on `pe`, return the prior
/// value.
pub fn swap<T: ShmemScalar>(rt: &Runtime, pe: Pe, dest: usize, value: T) -> T {
    let mut bytes = T::Bytes::default();
    transfer::swap(
        rt.layout(),
        rt.transport(),
        rt.tracker(),
        rt.my_pe(),
        pe,
        dest,
        value.to_bytes().as_ref(),
        bytes.as_mut(),
        T::DATATYPE,
    );
    T::from_bytes(bytes.as_ref())
}

/// Compare-and-swap: write `value` to `dest` on `pe` only if its current
/// value equals `cond`; return the prior value either way.
pub fn cswap<T: ShmemScalar>(rt: &Runtime, pe: Pe, dest: usize, cond: T, value: T) -> T {
    let mut bytes = T::Bytes::default();
    transfer::cswap(
        rt.layout(),
        rt.transport(),
        rt.tracker(),
        rt.my_pe(),
        pe,
        dest,
        value.to_bytes().as_ref(),
        bytes.as_mut(),
        cond.to_bytes().as_ref(),
        T::DATATYPE,
    );
    T::from_bytes(bytes.as_ref())
}

/// Generates one `pub mod $name { .. }` per scalar type with the named
/// wrappers the C SHMEM API exposes (spec §6): `put`, `get`, `atomic_add`
/// (plus `atomic_and`/`atomic_or`/`atomic_xor` for `int_only` types),
/// `fetch_add`, `fetch_inc`, `swap`, `cswap`. `non_arithmetic` types (no
/// native Rust `Add`/bitwise ops, e.g. `long double`) only get
/// `put`/`get`/`swap`/`cswap` — no atomic-family wrappers — matching spec
/// §3's note that those types participate in put/get/swap but never in
/// reductions.
macro_rules! typed_scalar_api {
    ($name:ident, $ty:ty, non_arithmetic) => {
        #[doc = concat!("Put/get/swap for `", stringify!($ty), "` (non-arithmetic: no atomic family).")]
        pub mod $name {
            use super::*;

            pub fn put(rt: &Runtime, pe: Pe, dest: usize, value: $ty) {
                super::put(rt, pe, dest, value)
            }
            pub fn get(rt: &Runtime, pe: Pe, src: usize) -> $ty {
                super::get(rt, pe, src)
            }
            pub fn swap(rt: &Runtime, pe: Pe, dest: usize, value: $ty) -> $ty {
                super::swap(rt, pe, dest, value)
            }
            pub fn cswap(rt: &Runtime, pe: Pe, dest: usize, cond: $ty, value: $ty) -> $ty {
                super::cswap(rt, pe, dest, cond, value)
            }
        }
    };
    ($name:ident, $ty:ty, $( $extra:ident ),*) => {
        #[doc = concat!("The typed surface for `", stringify!($ty), "`.")]
        pub mod $name {
            use super::*;

            pub fn put(rt: &Runtime, pe: Pe, dest: usize, value: $ty) {
                super::put(rt, pe, dest, value)
            }
            pub fn put_nbi(rt: &Runtime, pe: Pe, dest: usize, value: $ty) {
                super::put_nbi(rt, pe, dest, value)
            }
            pub fn get(rt: &Runtime, pe: Pe, src: usize) -> $ty {
                super::get(rt, pe, src)
            }
            pub fn atomic_add(rt: &Runtime, pe: Pe, dest: usize, value: $ty) {
                super::atomic(rt, pe, dest, value, AtomicOp::Sum)
            }
            pub fn fetch_add(rt: &Runtime, pe: Pe, dest: usize, value: $ty) -> $ty {
                super::fetch_add(rt, pe, dest, value)
            }
            pub fn fetch_inc(rt: &Runtime, pe: Pe, dest: usize) -> $ty
            where
                $ty: From<u8>,
            {
                super::fetch_add(rt, pe, dest, <$ty>::from(1u8))
            }
            pub fn swap(rt: &Runtime, pe: Pe, dest: usize, value: $ty) -> $ty {
                super::swap(rt, pe, dest, value)
            }
            pub fn cswap(rt: &Runtime, pe: Pe, dest: usize, cond: $ty, value: $ty) -> $ty {
                super::cswap(rt, pe, dest, cond, value)
            }

            $(
                typed_scalar_api!(@extra $extra, $ty);
            )*
        }
    };
    (@extra int, $ty:ty) => {
        pub fn atomic_and(rt: &Runtime, pe: Pe, dest: usize, value: $ty) {
            super::atomic(rt, pe, dest, value, AtomicOp::Band)
        }
        pub fn atomic_or(rt: &Runtime, pe: Pe, dest: usize, value: $ty) {
            super::atomic(rt, pe, dest, value, AtomicOp::Bor)
        }
        pub fn atomic_xor(rt: &Runtime, pe: Pe, dest: usize, value: $ty) {
            super::atomic(rt, pe, dest, value, AtomicOp::Bxor)
        }
    };
}

typed_scalar_api!(short, i16, int);
typed_scalar_api!(int, i32, int);
typed_scalar_api!(long, i64, int);
typed_scalar_api!(float, f32,);
typed_scalar_api!(double, f64,);
typed_scalar_api!(longlong, i128, non_arithmetic);
typed_scalar_api!(longdouble, LongDouble, non_arithmetic);
typed_scalar_api!(complexf, ComplexF32, non_arithmetic);
typed_scalar_api!(complexd, ComplexF64, non_arithmetic);

/// Reduction wrappers over every supported arithmetic numeric type (spec
/// §6: `{sum,prod,and,or,xor,min,max}_to_all`). `source`/`target` are
/// native-endian scalars of `T`; `psync` must satisfy the layout
/// [`crate::collectives::reduce::op_to_all`] documents.
pub fn op_to_all<T: ShmemScalar>(
    rt: &Runtime,
    start: Pe,
    stride: Pe,
    size: i32,
    target_addr: usize,
    source: T,
    op: AtomicOp,
    psync: &SymWords,
) {
    collectives::op_to_all(rt, start, stride, size, target_addr, source.to_bytes().as_ref(), op, T::DATATYPE, psync);
}

macro_rules! to_all_ops {
    ($name:ident, $ty:ty $(, $extra:ident )?) => {
        pub mod $name {
            use super::*;

            pub fn sum_to_all(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: $ty, psync: &SymWords) {
                super::op_to_all(rt, start, stride, size, target_addr, source, AtomicOp::Sum, psync)
            }
            pub fn prod_to_all(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: $ty, psync: &SymWords) {
                super::op_to_all(rt, start, stride, size, target_addr, source, AtomicOp::Prod, psync)
            }
            pub fn min_to_all(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: $ty, psync: &SymWords) {
                super::op_to_all(rt, start, stride, size, target_addr, source, AtomicOp::Min, psync)
            }
            pub fn max_to_all(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: $ty, psync: &SymWords) {
                super::op_to_all(rt, start, stride, size, target_addr, source, AtomicOp::Max, psync)
            }

            $( to_all_ops!(@extra $extra, $ty); )?
        }
    };
    (@extra int, $ty:ty) => {
        pub fn and_to_all(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: $ty, psync: &SymWords) {
            super::op_to_all(rt, start, stride, size, target_addr, source, AtomicOp::Band, psync)
        }
        pub fn or_to_all(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: $ty, psync: &SymWords) {
            super::op_to_all(rt, start, stride, size, target_addr, source, AtomicOp::Bor, psync)
        }
        pub fn xor_to_all(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: $ty, psync: &SymWords) {
            super::op_to_all(rt, start, stride, size, target_addr, source, AtomicOp::Bxor, psync)
        }
    };
}

to_all_ops!(short_to_all, i16, int);
to_all_ops!(int_to_all, i32, int);
to_all_ops!(long_to_all, i64, int);
to_all_ops!(float_to_all, f32);
to_all_ops!(double_to_all, f64);

/// `broadcast32`/`broadcast64` (spec §6): broadcast `nelems` elements of
/// `width` bytes each from `root`'s `source` to every other participant's
/// `target_addr`.
fn broadcast_fixed_width(
    rt: &Runtime,
    start: Pe,
    stride: Pe,
    size: i32,
    root: i32,
    target_addr: usize,
    source: &[u8],
    nelems: usize,
    width: usize,
    psync: &SymWords,
) {
    collectives::broadcast(rt, start, stride, size, root, target_addr, source, nelems * width, psync, false)
}

pub fn broadcast32(rt: &Runtime, start: Pe, stride: Pe, size: i32, root: i32, target_addr: usize, source: &[u8], nelems: usize, psync: &SymWords) {
    broadcast_fixed_width(rt, start, stride, size, root, target_addr, source, nelems, 4, psync)
}

pub fn broadcast64(rt: &Runtime, start: Pe, stride: Pe, size: i32, root: i32, target_addr: usize, source: &[u8], nelems: usize, psync: &SymWords) {
    broadcast_fixed_width(rt, start, stride, size, root, target_addr, source, nelems, 8, psync)
}

/// `collect32`/`collect64` (spec §6): the width only constrains what a
/// caller may concatenate (each contribution must itself be a whole number
/// of `width`-byte elements); the gather underneath is already
/// byte-granular, so these simply forward to [`collectives::collect`].
pub fn collect32(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: &[u8], psync: &SymWords) {
    debug_assert_eq!(source.len() % 4, 0, "collect32 requires whole 32-bit elements");
    collectives::collect(rt, start, stride, size, target_addr, source, psync)
}

pub fn collect64(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: &[u8], psync: &SymWords) {
    debug_assert_eq!(source.len() % 8, 0, "collect64 requires whole 64-bit elements");
    collectives::collect(rt, start, stride, size, target_addr, source, psync)
}

/// `fcollect32`/`fcollect64` (spec §6).
pub fn fcollect32(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: &[u8], psync: &SymWords) {
    collectives::fcollect(rt, start, stride, size, target_addr, source, 4, psync)
}

pub fn fcollect64(rt: &Runtime, start: Pe, stride: Pe, size: i32, target_addr: usize, source: &[u8], psync: &SymWords) {
    collectives::fcollect(rt, start, stride, size, target_addr, source, 8, psync)
}

/// `barrier`/`barrier_all` (spec §6), re-exported at the typed-surface
/// level so a caller never needs to reach into [`crate::collectives`]
/// directly.
pub fn barrier(rt: &Runtime, start: Pe, stride: Pe, size: i32, psync: &SymWords) {
    collectives::barrier(rt, start, stride, size, psync)
}

pub fn barrier_all(rt: &Runtime, psync: &SymWords) {
    collectives::barrier_all(rt, psync)
}

/// `fence`/`quiet` (spec §6).
pub fn fence(rt: &Runtime, pe: Pe) {
    rt.fence(pe)
}

pub fn quiet(rt: &Runtime) {
    rt.quiet()
}

/// `my_pe`/`n_pes`/`pe_accessible`/`addr_accessible`/`ptr` (spec §6).
pub fn my_pe(rt: &Runtime) -> Pe {
    rt.my_pe()
}

pub fn n_pes(rt: &Runtime) -> i32 {
    rt.n_pes()
}

pub fn pe_accessible(rt: &Runtime, pe: Pe) -> bool {
    rt.pe_accessible(pe)
}

pub fn addr_accessible(rt: &Runtime, addr: usize, pe: Pe) -> bool {
    rt.addr_accessible(addr, pe)
}

pub fn ptr(rt: &Runtime, sym_addr: usize, pe: Pe) -> Option<usize> {
    rt.ptr(sym_addr, pe)
}
