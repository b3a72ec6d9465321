//! In-flight VM migration bookkeeping
//!
//! A migration exists as a pending record from the moment the scheduler
//! issues the migrate request until the runtime reports it done. While
//! pending, the VM must not be re-migrated, shut down, or chosen as a
//! placement candidate, and the memory accounting of both endpoints must
//! reflect the move before it physically completes (see
//! [`crate::accounting`]).

use serde::{Deserialize, Serialize};
use stratus_core::{MachineId, Result, StratusError, VmId};

/// A migration that has been issued but not yet reported complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMigration {
    pub vm: VmId,
    pub source: MachineId,
    pub target: MachineId,
    /// Memory the VM carries (overhead plus its tasks), in MB
    pub memory_mb: u64,
}

/// The set of in-flight migrations. A VM id appears at most once.
#[derive(Debug, Default)]
pub struct MigrationTracker {
    pending: Vec<PendingMigration>,
}

impl MigrationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly issued migration. Refuses a VM that is already
    /// migrating and a degenerate source==target move.
    pub fn begin(
        &mut self,
        vm: VmId,
        source: MachineId,
        target: MachineId,
        memory_mb: u64,
    ) -> Result<()> {
        if source == target {
            return Err(StratusError::runtime(format!(
                "migration of {vm} has identical source and target {source}"
            )));
        }
        if self.is_migrating(vm) {
            return Err(StratusError::VmMigrating {
                vm,
                operation: "re-migrated",
            });
        }
        self.pending.push(PendingMigration {
            vm,
            source,
            target,
            memory_mb,
        });
        Ok(())
    }

    /// Remove the pending record for `vm`. Returns `None` for an unknown VM
    /// (stale completion reports are tolerated).
    pub fn complete(&mut self, vm: VmId) -> Option<PendingMigration> {
        let idx = self.pending.iter().position(|m| m.vm == vm)?;
        Some(self.pending.swap_remove(idx))
    }

    pub fn is_migrating(&self, vm: VmId) -> bool {
        self.pending.iter().any(|m| m.vm == vm)
    }

    /// Whether any pending migration targets `machine`
    pub fn targets(&self, machine: MachineId) -> bool {
        self.pending.iter().any(|m| m.target == machine)
    }

    /// Total memory of migrations inbound to `machine`, in MB
    pub fn inbound_mb(&self, machine: MachineId) -> u64 {
        self.pending
            .iter()
            .filter(|m| m.target == machine)
            .map(|m| m.memory_mb)
            .sum()
    }

    /// Total memory of migrations outbound from `machine`, in MB
    pub fn outbound_mb(&self, machine: MachineId) -> u64 {
        self.pending
            .iter()
            .filter(|m| m.source == machine)
            .map(|m| m.memory_mb)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingMigration> {
        self.pending.iter()
    }
}
