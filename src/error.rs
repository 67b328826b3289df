//! Error kinds (spec §7) and the fail-stop abort path.
//!
//! Only [`InitError`] is ever returned to a caller (init can fail before any
//! RMA has been issued, so there is nothing unsafe about unwinding out of
//! it). Every other kind is fail-stop: the call site logs a [`RuntimeError`]
//! and calls [`abort`], it never returns one. The enum still exists for the
//! runtime path so the log line and the type have one shared shape instead
//! of each call site hand-rolling its own `log::error!` format string.

use std::panic::Location;

/// The four error kinds from spec §7, minus the "no propagation" rule for the
/// three that are fail-stop; see module docs.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// A symmetric pointer fell outside both regions, or an operation that
    /// must fit in one scalar (swap, atomic, fetch-atomic) was given a
    /// larger length.
    #[error("[{pe:03}] usage error at {site}: {detail}")]
    Usage {
        pe: i32,
        site: &'static Location<'static>,
        detail: &'static str,
    },

    /// A transport primitive (Put/Get/Atomic/FetchAtomic/Swap/...) returned a
    /// non-OK code.
    #[error("[{pe:03}] transport error at {site}: return code {code}")]
    Transport {
        pe: i32,
        site: &'static Location<'static>,
        code: i32,
    },

    /// A counting event or completion event reported a non-OK failure type.
    #[error("[{pe:03}] remote completion failure at {site}: failure type {failure}")]
    RemoteCompletion {
        pe: i32,
        site: &'static Location<'static>,
        failure: i32,
    },
}

/// Failures that can occur while acquiring init-time resources (MDs, PT
/// entries, counting events, event queues). Unlike [`RuntimeError`], this one
/// *is* returned to the caller of [`crate::runtime::Runtime::init`] — no PE
/// state has been published yet, so the caller can retry or report up
/// without violating the fail-stop contract described in spec §7.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum InitError {
    #[error("process-group bootstrap failed: {0}")]
    ProcessGroup(String),

    #[error("transport network interface initialization failed: return code {0}")]
    TransportInit(i32),

    #[error("failed to bind memory descriptor {which}: return code {code}")]
    MemoryDescriptor { which: &'static str, code: i32 },

    #[error("failed to allocate portal table entry for region {region:?}: return code {code}")]
    PortalTableEntry { region: crate::region::RegionId, code: i32 },

    #[error("failed to allocate counting event {which}: return code {code}")]
    CountingEvent { which: &'static str, code: i32 },

    #[error("already initialized")]
    AlreadyInitialized,
}

/// Log `err` at error level and abort the process.
///
/// This is the single fail-stop exit used by every runtime-path error. It
/// never returns, matching "no error is propagated to the caller" (spec §7).
#[track_caller]
pub fn abort_with(err: RuntimeError) -> ! {
    log::error!("{err}");
    std::process::abort();
}

/// Convenience for the usage-error fail-stop path, capturing the call site.
#[track_caller]
pub fn usage_abort(pe: i32, detail: &'static str) -> ! {
    abort_with(RuntimeError::Usage {
        pe,
        site: Location::caller(),
        detail,
    })
}

/// Convenience for the transport fail-stop path, capturing the call site.
#[track_caller]
pub fn transport_abort(pe: i32, code: i32) -> ! {
    abort_with(RuntimeError::Transport {
        pe,
        site: Location::caller(),
        code,
    })
}

/// Convenience for the remote-completion fail-stop path, capturing the call
/// site.
#[track_caller]
pub fn remote_completion_abort(pe: i32, failure: i32) -> ! {
    abort_with(RuntimeError::RemoteCompletion {
        pe,
        site: Location::caller(),
        failure,
    })
}
