//! # symmrt
//!
//! A one-sided partitioned-global-address-space (PGAS) communication
//! runtime providing the core of the SHMEM programming model over a
//! Portals-like RDMA transport.
//!
//! A fixed set of processing elements (PEs), numbered `0 .. N-1`, each
//! expose a *symmetric heap* plus a *symmetric data segment*; every PE may
//! read, write, atomically update, and swap words in the symmetric regions
//! of any other PE without that PE's active participation.
//!
//! This crate is the core only — two tightly-coupled subsystems:
//!
//! 1. **The RDMA data-movement layer** ([`address`], [`completion`],
//!    [`transfer`], [`ordering`], [`wait`]) — address translation from a
//!    local symmetric pointer to a `(PE, region, offset)` triple,
//!    segmentation of large transfers, and asynchronous completion
//!    tracking using counting events.
//! 2. **The collectives engine** ([`collectives`], [`tree`]) — barrier,
//!    broadcast, reduction, concatenating gather, and fixed-length gather,
//!    built solely from one-sided puts and atomics on per-operation
//!    `pSync` arrays.
//!
//! PE bootstrap and rank discovery ([`process_group::ProcessGroup`]), the
//! symmetric-heap allocator, the user-visible SHMEM C API, and the
//! underlying transport library itself are external collaborators — this
//! crate consumes them through the [`process_group::ProcessGroup`] and
//! [`transport::Transport`] traits and the [`region::SymmetricLayout`]
//! descriptor, all threaded through a per-PE [`runtime::Runtime`].
//!
//! [`api`] exposes the typed, per-datatype surface a layer above the core
//! (an ABI shim, a Fortran binding, a C header) would call into.

pub mod address;
pub mod api;
pub mod collectives;
pub mod completion;
pub mod config;
pub mod error;
pub mod ordering;
pub mod process_group;
pub mod region;
pub mod runtime;
pub mod transfer;
pub mod transport;
pub mod tree;
pub mod wait;

#[cfg(test)]
pub(crate) mod loopback;

pub use config::RuntimeConfig;
pub use error::{InitError, RuntimeError};
pub use region::{RegionId, SymmetricLayout};
pub use runtime::{finalize_global, global, init_global, is_finalized, is_initialized, Runtime};
pub use transport::{AtomicOp, Datatype, Pe, SwapKind, Transport};
