//! `resolve(ptr) -> (region, offset)` (spec §4.1), the fast-path lookup every
//! transfer-engine call goes through before it can issue a single transport
//! primitive.

use crate::error::usage_abort;
use crate::region::{RegionId, SymmetricLayout};

/// Resolve a local symmetric pointer into `(region, offset)`.
///
/// Aborts the PE with a usage error if `addr` lies outside both regions —
/// this is the "target outside of symmetric areas" diagnostic from the
/// original runtime, now carrying the PE id through [`crate::error::RuntimeError`].
#[track_caller]
pub fn resolve(layout: &SymmetricLayout, my_pe: i32, addr: usize) -> (RegionId, usize) {
    match layout.classify(addr) {
        Some(hit) => hit,
        None => usage_abort(my_pe, "target outside of symmetric areas"),
    }
}
