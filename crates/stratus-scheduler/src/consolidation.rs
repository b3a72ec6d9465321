//! Consolidation engine: the task-completion path
//!
//! Packs VMs toward highly utilized hosts and powers off hosts that empty
//! out. Machines in S0 are ranked by projected utilization ascending; each
//! lightly used machine tries to push its VMs onto the first fitting
//! machine ranked above it. Projected accounting keeps the loop from
//! picking the same target until it is physically full.

use tracing::{debug, info};

use crate::accounting::{fits, projected_memory_mb, projected_utilization};
use crate::policy::HostCandidate;
use crate::scheduler::Scheduler;
use stratus_core::{ClusterRuntime, MachineId, PowerState, Result};

impl Scheduler {
    pub(crate) fn consolidate(&mut self, rt: &mut dyn ClusterRuntime) -> Result<()> {
        // Rank powered-on machines by projected utilization, lightest first.
        // Machine-id iteration order makes the sort's tie-break the id.
        let mut ranked: Vec<(MachineId, f64)> = Vec::new();
        for &machine in self.inventory.machines() {
            let snapshot = rt.machine_info(machine)?;
            if snapshot.s_state != PowerState::S0 {
                continue;
            }
            ranked.push((machine, projected_utilization(&snapshot, &self.migrations)));
        }
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        for rank in 0..ranked.len() {
            let (machine, utilization) = ranked[rank];
            // A machine that is receiving a migration is left alone: moving
            // its VMs away now would invalidate the memory bookkeeping and
            // can oscillate.
            if self.migrations.targets(machine) {
                continue;
            }

            // An already empty machine has nothing to move but still goes
            // through the power-off check below.
            if utilization > 0.0 {
                let residents = self.vms_on(rt, machine)?;
                for vm in residents {
                    if self.migrations.is_migrating(vm) {
                        continue;
                    }
                    let load = self.vm_load(rt, vm)?;

                    // Candidate targets are the machines ranked above the
                    // source, in rank order; the first that fits wins.
                    let mut candidates = Vec::new();
                    for &(target, _) in &ranked[rank + 1..] {
                        let snapshot = rt.machine_info(target)?;
                        if !self.transitions.is_stable(&snapshot) {
                            continue;
                        }
                        if snapshot.cpu != load.cpu {
                            continue;
                        }
                        if load.needs_gpu && !snapshot.gpus {
                            continue;
                        }
                        let projected = projected_memory_mb(&snapshot, &self.migrations);
                        if !fits(
                            projected,
                            load.memory_mb,
                            snapshot.memory_mb,
                            self.config.max_util,
                        ) {
                            continue;
                        }
                        candidates.push(HostCandidate {
                            machine: target,
                            remaining_mb: snapshot
                                .memory_mb
                                .saturating_sub(projected + load.memory_mb),
                        });
                    }

                    if let Some(target) = self.policy.choose_migration_target(&candidates) {
                        rt.vm_migrate(vm, target)?;
                        self.migrations.begin(vm, machine, target, load.memory_mb)?;
                        info!(
                            %vm,
                            source = %machine,
                            %target,
                            memory_mb = load.memory_mb,
                            "consolidating VM"
                        );
                    }
                }
            }

            // With the outbound migrations recorded, an emptied machine
            // above the warm-pool floor can be powered off.
            let snapshot = rt.machine_info(machine)?;
            let projected = projected_memory_mb(&snapshot, &self.migrations);
            if projected == 0
                && machine.0 >= self.config.min_active_machines
                && self.transitions.pending(machine) == 0
            {
                self.transition(rt, machine, PowerState::S5)?;
                debug!(%machine, "powering off emptied machine");
            }
        }
        Ok(())
    }
}
