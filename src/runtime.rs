//! The runtime shell (spec §9 "Process-wide state"): the per-PE singleton
//! that threads the symmetric layout, transport, process group, completion
//! tracker, config, and full-tree cache through every public operation.
//!
//! [`Runtime::init`] builds an owned value directly — this is what tests and
//! the [`crate::loopback`] harness use, since a single test process hosts
//! many simulated PEs (one OS thread each) and therefore many `Runtime`
//! values. [`init_global`]/[`finalize_global`] wrap that constructor behind a
//! process-wide [`OnceLock`], matching the common case of one real OS
//! process per PE, with the two-flag idempotence the spec calls for: the
//! `OnceLock` itself stands in for "initialized", and `FINALIZED` is tracked
//! separately since a `OnceLock` cannot be un-set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use crate::completion::CompletionTracker;
use crate::config::RuntimeConfig;
use crate::error::InitError;
use crate::ordering;
use crate::process_group::ProcessGroup;
use crate::region::SymmetricLayout;
use crate::transport::{Pe, Transport};
use crate::tree::FullTreeCache;

/// The per-PE runtime context (spec §9). Not `Clone`: there is exactly one
/// of these per PE, referenced by shared reference from every operation.
pub struct Runtime {
    my_pe: Pe,
    num_pes: i32,
    layout: SymmetricLayout,
    transport: Box<dyn Transport>,
    process_group: Box<dyn ProcessGroup>,
    tracker: CompletionTracker,
    config: RuntimeConfig,
    full_tree: FullTreeCache,
}

impl Runtime {
    /// Construct the runtime shell: runs the pre-RMA bootstrap barrier,
    /// reads rank/size from the process group, and precomputes the
    /// full-group tree (spec §3 "Full-tree cache", §9).
    ///
    /// `transport` must already be fully bound (MDs, PT entries, counting
    /// events, event queues) — that acquisition sequence is the transport's
    /// own construction-time contract; see [`crate::loopback::LoopbackTransport::connect`]
    /// for a worked example of the ordered-acquire/reverse-release discipline
    /// spec §7 kind 4 and §9's resolved open question call for.
    pub fn init(
        transport: Box<dyn Transport>,
        process_group: Box<dyn ProcessGroup>,
        layout: SymmetricLayout,
        config: RuntimeConfig,
    ) -> anyhow::Result<Self> {
        let num_pes = process_group.num_pes();
        if num_pes < 1 {
            return Err(InitError::ProcessGroup("num_pes must be positive".into()).into());
        }
        let my_pe = process_group.my_pe();
        if !(0..num_pes).contains(&my_pe) {
            return Err(InitError::ProcessGroup("my_pe out of range".into()).into());
        }
        if config.tree_radix < 1 {
            return Err(InitError::ProcessGroup("tree_radix must be at least 1".into()).into());
        }

        process_group.bootstrap_barrier();

        let full_tree = FullTreeCache::build(num_pes, config.tree_radix, my_pe);

        Ok(Self {
            my_pe,
            num_pes,
            layout,
            transport,
            process_group,
            tracker: CompletionTracker::new(),
            config,
            full_tree,
        })
    }

    #[inline]
    pub fn my_pe(&self) -> Pe {
        self.my_pe
    }

    #[inline]
    pub fn n_pes(&self) -> i32 {
        self.num_pes
    }

    #[inline]
    pub fn layout(&self) -> &SymmetricLayout {
        &self.layout
    }

    #[inline]
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    #[inline]
    pub fn process_group(&self) -> &dyn ProcessGroup {
        self.process_group.as_ref()
    }

    #[inline]
    pub fn tracker(&self) -> &CompletionTracker {
        &self.tracker
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[inline]
    pub fn full_tree(&self) -> &FullTreeCache {
        &self.full_tree
    }

    /// Corrected predicate (spec §9 resolved open question): `0 <= pe <
    /// n_pes`. The original source's `pe > 0 && pe < n_pes` excludes PE 0,
    /// which is a bug, not an intentional restriction.
    #[inline]
    pub fn pe_accessible(&self, pe: Pe) -> bool {
        (0..self.num_pes).contains(&pe)
    }

    /// Best-effort accessibility of a symmetric address on `pe` (spec §9
    /// resolved open question): `addr` must resolve to a symmetric region
    /// locally (a non-symmetric pointer is never accessible, regardless of
    /// `pe`), and `pe` itself must be in range.
    pub fn addr_accessible(&self, addr: usize, pe: Pe) -> bool {
        self.layout.classify(addr).is_some() && self.pe_accessible(pe)
    }

    /// Translate a symmetric address to a directly-dereferenceable pointer
    /// on `pe`, when `pe` is on the same node. On-node shared-memory
    /// optimization is an external collaborator (spec §1 "Out of scope"),
    /// so the core always reports "not on this node".
    pub fn ptr(&self, _sym_addr: usize, _pe: Pe) -> Option<usize> {
        None
    }

    /// Global drain (spec §4.4).
    pub fn quiet(&self) {
        ordering::quiet(self.my_pe, self.transport(), &self.tracker);
    }

    /// Remote-per-target ordering (spec §4.4).
    pub fn fence(&self, pe: Pe) {
        ordering::fence(self.my_pe, self.transport(), &self.tracker, pe, self.config.fence_is_quiet);
    }
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static FINALIZED: AtomicBool = AtomicBool::new(false);

/// Install a [`Runtime`] behind the process-wide singleton. Idempotent:
/// a second call returns [`InitError::AlreadyInitialized`] rather than
/// panicking or silently replacing the first runtime.
pub fn init_global(
    transport: Box<dyn Transport>,
    process_group: Box<dyn ProcessGroup>,
    layout: SymmetricLayout,
    config: RuntimeConfig,
) -> anyhow::Result<&'static Runtime> {
    let rt = Runtime::init(transport, process_group, layout, config)?;
    RUNTIME.set(rt).map_err(|_| InitError::AlreadyInitialized)?;
    Ok(RUNTIME.get().expect("just initialized"))
}

/// Access the process-wide [`Runtime`].
///
/// # Panics
/// Panics if [`init_global`] has not been called. This is a programmer
/// error, not one of the four fail-stop kinds from spec §7 — it can only
/// happen before any RMA is possible.
pub fn global() -> &'static Runtime {
    RUNTIME
        .get()
        .expect("symmrt::runtime::init_global was not called")
}

/// Whether [`init_global`] has successfully installed a runtime.
pub fn is_initialized() -> bool {
    RUNTIME.get().is_some()
}

/// Mark the process-wide runtime as finalized. Idempotent. There is
/// currently nothing to release here beyond what `Drop` on the installed
/// `Runtime` already does at process exit — see module docs.
pub fn finalize_global() {
    let _ = FINALIZED.swap(true, Ordering::AcqRel);
}

/// Whether [`finalize_global`] has been called.
pub fn is_finalized() -> bool {
    FINALIZED.load(Ordering::Acquire)
}
