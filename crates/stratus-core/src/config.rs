//! Scheduler configuration

use serde::{Deserialize, Serialize};

/// Number of lowest-id machines kept always-on as a warm pool
pub const DEFAULT_MIN_ACTIVE_MACHINES: usize = 16;

/// Fractional memory-utilization threshold above which a host is full
pub const DEFAULT_MAX_UTIL: f64 = 1.0;

/// Memory overhead charged per VM, in MB
pub const DEFAULT_VM_OVERHEAD_MB: u64 = 8;

/// Which placement policy the scheduler runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Best-fit by remaining projected memory (highest utilization that
    /// still fits)
    #[default]
    Greedy,
    /// First candidate in iteration order
    FirstFit,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::Greedy => write!(f, "greedy"),
            PolicyKind::FirstFit => write!(f, "first-fit"),
        }
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(PolicyKind::Greedy),
            "first-fit" | "firstfit" => Ok(PolicyKind::FirstFit),
            other => Err(format!("unknown policy '{other}'")),
        }
    }
}

/// Tunable knobs of the scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Machines with id below this floor are never powered off
    pub min_active_machines: usize,
    /// A placement must keep projected utilization strictly below this
    pub max_util: f64,
    /// Memory charged per VM on top of its tasks, in MB
    pub vm_overhead_mb: u64,
    /// Placement policy variant
    pub policy: PolicyKind,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            min_active_machines: DEFAULT_MIN_ACTIVE_MACHINES,
            max_util: DEFAULT_MAX_UTIL,
            vm_overhead_mb: DEFAULT_VM_OVERHEAD_MB,
            policy: PolicyKind::default(),
        }
    }
}
