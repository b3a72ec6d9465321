//! Projected memory accounting
//!
//! Issuing a migration does not immediately change the runtime's memory
//! figures, so two back-to-back decisions in the same tick would otherwise
//! double-commit the target or over-free the source. The projected figure -
//! runtime-reported usage adjusted for in-flight migrations into and out of
//! the machine - is the canonical one; every placement decision goes through
//! these functions, never through raw `memory_used_mb`.

use crate::migration::MigrationTracker;
use stratus_core::MachineSnapshot;

/// Runtime-reported usage plus inbound migration memory, minus outbound.
/// At steady state (no pending migrations) this equals the raw figure.
pub fn projected_memory_mb(snapshot: &MachineSnapshot, migrations: &MigrationTracker) -> u64 {
    snapshot
        .memory_used_mb
        .saturating_add(migrations.inbound_mb(snapshot.id))
        .saturating_sub(migrations.outbound_mb(snapshot.id))
}

/// Projected fraction of installed memory in use
pub fn projected_utilization(snapshot: &MachineSnapshot, migrations: &MigrationTracker) -> f64 {
    if snapshot.memory_mb == 0 {
        return 0.0;
    }
    projected_memory_mb(snapshot, migrations) as f64 / snapshot.memory_mb as f64
}

/// Whether committing `extra_mb` more memory keeps the machine strictly
/// below `max_util`. With `max_util == 1.0` a placement that lands exactly
/// on capacity is rejected.
pub fn fits(projected_mb: u64, extra_mb: u64, memory_mb: u64, max_util: f64) -> bool {
    if memory_mb == 0 {
        return false;
    }
    ((projected_mb + extra_mb) as f64) / (memory_mb as f64) < max_util
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::{CpuKind, MachineId, PowerState, VmId};

    fn snapshot(id: usize, memory_mb: u64, memory_used_mb: u64) -> MachineSnapshot {
        MachineSnapshot {
            id: MachineId(id),
            cpu: CpuKind::X86,
            gpus: false,
            memory_mb,
            memory_used_mb,
            s_state: PowerState::S0,
            active_vms: 0,
            active_tasks: 0,
        }
    }

    #[test]
    fn test_steady_state_matches_runtime() {
        let migrations = MigrationTracker::new();
        let snap = snapshot(0, 100, 42);
        assert_eq!(projected_memory_mb(&snap, &migrations), 42);
    }

    // A 50 MB VM migrating from machine 0 to a machine 1 that already
    // holds 40 MB.
    #[test]
    fn test_in_flight_migration_moves_memory_immediately() {
        let mut migrations = MigrationTracker::new();
        migrations
            .begin(VmId(0), MachineId(0), MachineId(1), 50)
            .unwrap();

        let source = snapshot(0, 100, 50);
        let target = snapshot(1, 100, 40);
        assert_eq!(projected_memory_mb(&source, &migrations), 0);
        assert_eq!(projected_memory_mb(&target, &migrations), 90);

        // After completion the runtime's own figures take over identically.
        migrations.complete(VmId(0)).unwrap();
        let source = snapshot(0, 100, 0);
        let target = snapshot(1, 100, 90);
        assert_eq!(projected_memory_mb(&source, &migrations), 0);
        assert_eq!(projected_memory_mb(&target, &migrations), 90);
    }

    #[test]
    fn test_projected_utilization() {
        let mut migrations = MigrationTracker::new();
        migrations
            .begin(VmId(0), MachineId(1), MachineId(0), 25)
            .unwrap();
        let snap = snapshot(0, 100, 25);
        assert_eq!(projected_utilization(&snap, &migrations), 0.5);
    }

    #[test]
    fn test_fits_is_strict_at_capacity() {
        assert!(fits(40, 30, 100, 1.0));
        // Exactly full is rejected under MAX_UTIL = 1.0
        assert!(!fits(70, 30, 100, 1.0));
        assert!(!fits(0, 10, 0, 1.0));
        assert!(fits(0, 79, 100, 0.8));
        assert!(!fits(0, 80, 100, 0.8));
    }
}
