//! Tunables for the runtime: tree shape, segmentation thresholds, and the
//! completion discipline, with environment-variable overrides.
//!
//! Mirrors the defaults the original Portals SHMEM runtime shipped (radix 4,
//! crossover 8) so collectives behave the same way out of the box. A layer
//! above the core that wants different values should build a [`RuntimeConfig`]
//! by hand rather than relying on the environment, since the environment is
//! process-wide and this runtime has no story for per-instance isolation.

use std::env;

/// Default branching factor for the k-ary collectives tree.
pub const DEFAULT_TREE_RADIX: usize = 4;
/// Default PE-count threshold below which collectives use the flat algorithm.
pub const DEFAULT_TREE_CROSSOVER: usize = 8;

/// Tunable parameters threaded into every [`crate::runtime::Runtime`].
///
/// `max_put_size` and `max_atomic_size` are not environment-overridable: the
/// spec treats them as transport-reported segmentation thresholds, so they
/// are supplied by whatever [`crate::transport::Transport`] the embedder
/// constructs the runtime with, not guessed at here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Branching factor of the k-ary tree used above `tree_crossover`.
    pub tree_radix: usize,
    /// PE-count threshold below which collectives use the flat algorithm.
    pub tree_crossover: usize,
    /// Whether the transport only provides global ordering, in which case
    /// `fence(pe)` degrades to a full `quiet()`.
    pub fence_is_quiet: bool,
    /// Whether per-put completion events are drained in addition to the
    /// counting-event discipline. Only takes effect when this crate is built
    /// with the `event-completion` feature; otherwise counter-only.
    pub event_completion: bool,
    /// Recorded for downstream layers; the core itself performs no on-node
    /// shared-memory optimization (out of scope, see spec §1).
    pub on_node_comms: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tree_radix: DEFAULT_TREE_RADIX,
            tree_crossover: DEFAULT_TREE_CROSSOVER,
            fence_is_quiet: false,
            event_completion: cfg!(feature = "event-completion"),
            on_node_comms: false,
        }
    }
}

impl RuntimeConfig {
    /// Build a config from defaults overridden by environment variables.
    ///
    /// A present-but-unparsable variable is logged as a warning and the
    /// default is kept; this path never fails, since a malformed tunable is
    /// not a reason to abort a whole PE before `init()` has even opened a
    /// network interface.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = parse_env_usize("SHMEM_RT_TREE_RADIX") {
            cfg.tree_radix = v.max(1);
        }
        if let Some(v) = parse_env_usize("SHMEM_RT_TREE_CROSSOVER") {
            cfg.tree_crossover = v;
        }
        if let Some(v) = parse_env_bool("SHMEM_RT_ON_NODE_COMMS") {
            cfg.on_node_comms = v;
        }
        if let Some(v) = parse_env_bool("SHMEM_RT_EVENT_COMPLETION") {
            cfg.event_completion = v && cfg!(feature = "event-completion");
        }

        cfg
    }
}

fn parse_env_usize(key: &str) -> Option<usize> {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!("{key}={raw:?} is not a valid usize, keeping default");
                None
            }
        },
        Err(_) => None,
    }
}

fn parse_env_bool(key: &str) -> Option<bool> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => {
                log::warn!("{key}={raw:?} is not a valid boolean, keeping default");
                None
            }
        },
        Err(_) => None,
    }
}
