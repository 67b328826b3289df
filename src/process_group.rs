//! The process-group contract consumed by this crate (spec §6). Rank
//! discovery and a pre-RMA bootstrap barrier live here; everything after
//! `init()` uses RMA-based synchronization instead (spec §4.7, §5).

/// Rank discovery and the one collective available before RMA is set up.
pub trait ProcessGroup: Send + Sync {
    /// This process's rank, `0 <= my_pe() < num_pes()`.
    fn my_pe(&self) -> i32;
    /// Total number of PEs in the job.
    fn num_pes(&self) -> i32;
    /// A barrier usable during `init()`, before any symmetric memory or
    /// transport resource exists.
    fn bootstrap_barrier(&self);
}
