//! Placement policies
//!
//! The shared skeleton (placement, consolidation, drainer, warning handlers)
//! computes candidate lists that are already filtered for stability,
//! compatibility and capacity; the policy object only picks among them. Two
//! variants are provided behind the [`PolicyKind`] tag:
//!
//! - Greedy: best-fit by remaining projected memory (pack the fullest host
//!   that still fits)
//! - FirstFit: first candidate in iteration order

use stratus_core::{MachineId, PolicyKind, VmId};

/// A VM that could absorb the task (reuse step)
#[derive(Debug, Clone, Copy)]
pub struct VmCandidate {
    pub vm: VmId,
    pub host: MachineId,
    /// Projected memory left on the host after the placement, in MB
    pub remaining_mb: u64,
}

/// A machine that could host a new VM or a migrated VM
#[derive(Debug, Clone, Copy)]
pub struct HostCandidate {
    pub machine: MachineId,
    /// Projected memory left on the machine after the placement, in MB
    pub remaining_mb: u64,
}

/// Selection functions a policy variant supplies. Candidate slices are in
/// iteration order: VM-list insertion order for VMs, machine id order for
/// hosts, utilization-rank order for migration targets.
pub trait PlacementPolicy {
    fn name(&self) -> &'static str;

    /// Pick a VM for task reuse
    fn choose_vm(&self, candidates: &[VmCandidate]) -> Option<VmId>;

    /// Pick a machine for a new VM
    fn choose_host(&self, candidates: &[HostCandidate]) -> Option<MachineId>;

    /// Pick a consolidation target among machines ranked above the source
    fn choose_migration_target(&self, candidates: &[HostCandidate]) -> Option<MachineId>;
}

/// Build the policy object for a variant tag
pub fn make_policy(kind: PolicyKind) -> Box<dyn PlacementPolicy> {
    match kind {
        PolicyKind::Greedy => Box::new(GreedyPolicy),
        PolicyKind::FirstFit => Box::new(FirstFitPolicy),
    }
}

/// Best-fit-decreasing-utilization: minimize remaining memory, so work
/// packs onto the fullest compatible host and empty hosts stay empty.
/// Ties go to the earliest candidate in iteration order.
pub struct GreedyPolicy;

impl PlacementPolicy for GreedyPolicy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn choose_vm(&self, candidates: &[VmCandidate]) -> Option<VmId> {
        let mut best: Option<VmCandidate> = None;
        for c in candidates {
            if best.map_or(true, |b| c.remaining_mb < b.remaining_mb) {
                best = Some(*c);
            }
        }
        best.map(|c| c.vm)
    }

    fn choose_host(&self, candidates: &[HostCandidate]) -> Option<MachineId> {
        let mut best: Option<HostCandidate> = None;
        for c in candidates {
            if best.map_or(true, |b| c.remaining_mb < b.remaining_mb) {
                best = Some(*c);
            }
        }
        best.map(|c| c.machine)
    }

    fn choose_migration_target(&self, candidates: &[HostCandidate]) -> Option<MachineId> {
        // Consolidation walks targets in ascending utilization rank and
        // takes the first that fits; the rank ordering already encodes the
        // packing preference.
        candidates.first().map(|c| c.machine)
    }
}

/// First candidate that fits, in iteration order. The realized fragment of
/// the second algorithm variant; useful as a baseline against greedy.
pub struct FirstFitPolicy;

impl PlacementPolicy for FirstFitPolicy {
    fn name(&self) -> &'static str {
        "first-fit"
    }

    fn choose_vm(&self, candidates: &[VmCandidate]) -> Option<VmId> {
        candidates.first().map(|c| c.vm)
    }

    fn choose_host(&self, candidates: &[HostCandidate]) -> Option<MachineId> {
        candidates.first().map(|c| c.machine)
    }

    fn choose_migration_target(&self, candidates: &[HostCandidate]) -> Option<MachineId> {
        candidates.first().map(|c| c.machine)
    }
}
