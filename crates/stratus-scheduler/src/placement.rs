//! Placement engine: the task-arrival path
//!
//! For each new task, in order: reuse an existing VM on a stable machine,
//! create a new VM on a stable machine, or queue the task and wake a
//! standby machine. Capacity checks go through projected memory so that
//! decisions made in the same tick see each other.

use tracing::{debug, info, warn};

use crate::accounting::{fits, projected_memory_mb};
use crate::policy::{HostCandidate, VmCandidate};
use crate::scheduler::Scheduler;
use stratus_core::{
    ClusterRuntime, MachineId, PowerState, Result, StratusError, TaskId, TaskSpec, VmId,
};

impl Scheduler {
    pub(crate) fn place_new_task(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        task: TaskId,
    ) -> Result<()> {
        let spec = rt.task_info(task)?;
        let priority = spec.sla.priority();

        // 1. Reuse an existing VM of the right kind on a stable machine.
        if let Some(vm) = self.reuse_candidate(rt, &spec)? {
            self.admit(rt, vm, task, priority)?;
            debug!(%task, %vm, "task placed on existing VM");
            return Ok(());
        }

        // 2. New VM on a stable machine with capacity.
        if let Some(machine) = self.host_candidate(rt, &spec)? {
            let vm = self.create_vm_on(rt, machine, &spec)?;
            self.admit(rt, vm, task, priority)?;
            debug!(%task, %vm, %machine, "task placed on new VM");
            return Ok(());
        }

        // 3. Nothing stable fits: queue the task and wake a standby machine.
        if self.wake_compatible(rt, &spec)? {
            self.pending_tasks.push_back(task);
            info!(%task, queued = self.pending_tasks.len(), "task queued pending wake-up");
            return Ok(());
        }

        // 4. No compatible host exists anywhere.
        warn!(%task, "no compatible host exists or can be woken");
        Err(StratusError::UnsatisfiablePlacement { task })
    }

    /// Best reuse candidate per the policy: VMs of matching kind and CPU on
    /// stable hosts that keep projected utilization under the threshold.
    /// Migrating VMs are never candidates.
    pub(crate) fn reuse_candidate(
        &self,
        rt: &dyn ClusterRuntime,
        spec: &TaskSpec,
    ) -> Result<Option<VmId>> {
        let mut candidates = Vec::new();
        for &vm in self.inventory.vms() {
            if self.migrations.is_migrating(vm) {
                continue;
            }
            let info = rt.vm_info(vm)?;
            if info.vm_kind != spec.vm_kind || info.cpu != spec.cpu {
                continue;
            }
            let host = rt.machine_info(info.host)?;
            if !self.transitions.is_stable(&host) {
                continue;
            }
            if spec.gpu_capable && !host.gpus {
                continue;
            }
            let projected = projected_memory_mb(&host, &self.migrations);
            if !fits(projected, spec.memory_mb, host.memory_mb, self.config.max_util) {
                continue;
            }
            candidates.push(VmCandidate {
                vm,
                host: host.id,
                remaining_mb: host.memory_mb.saturating_sub(projected + spec.memory_mb),
            });
        }
        Ok(self.policy.choose_vm(&candidates))
    }

    /// Best machine for a new VM per the policy: stable, CPU (and GPU where
    /// required) compatible, with room for the VM overhead plus the task.
    pub(crate) fn host_candidate(
        &self,
        rt: &dyn ClusterRuntime,
        spec: &TaskSpec,
    ) -> Result<Option<MachineId>> {
        let extra = self.config.vm_overhead_mb + spec.memory_mb;
        let mut candidates = Vec::new();
        for &machine in self.inventory.machines() {
            let snapshot = rt.machine_info(machine)?;
            if !self.transitions.is_stable(&snapshot) {
                continue;
            }
            if snapshot.cpu != spec.cpu {
                continue;
            }
            if spec.gpu_capable && !snapshot.gpus {
                continue;
            }
            let projected = projected_memory_mb(&snapshot, &self.migrations);
            if !fits(projected, extra, snapshot.memory_mb, self.config.max_util) {
                continue;
            }
            candidates.push(HostCandidate {
                machine,
                remaining_mb: snapshot.memory_mb.saturating_sub(projected + extra),
            });
        }
        Ok(self.policy.choose_host(&candidates))
    }

    /// Create a VM matching `spec` and attach it to `machine`
    pub(crate) fn create_vm_on(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        machine: MachineId,
        spec: &TaskSpec,
    ) -> Result<VmId> {
        let vm = rt.vm_create(spec.vm_kind, spec.cpu)?;
        rt.vm_attach(vm, machine)?;
        self.inventory.register_vm(vm);
        Ok(vm)
    }

    /// Find a compatible standby machine and make sure it is coming up.
    /// Scans in id order; the first match wins:
    ///
    /// - S5 with nothing in flight: request S0.
    /// - S5 already waking: piggyback on the in-flight transition rather
    ///   than issuing a duplicate wake-up, which risks oscillation.
    /// - S0 with exactly one transition in flight (waking, or shutting
    ///   down and worth calling back): request S0.
    ///
    /// Returns whether a machine is now expected to become stable; the
    /// caller queues the task either way.
    pub(crate) fn wake_compatible(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        spec: &TaskSpec,
    ) -> Result<bool> {
        let machines = self.inventory.machines().to_vec();
        for machine in machines {
            let snapshot = rt.machine_info(machine)?;
            if snapshot.cpu != spec.cpu {
                continue;
            }
            if spec.gpu_capable && !snapshot.gpus {
                continue;
            }
            let in_flight = self.transitions.pending(machine);
            match (snapshot.s_state, in_flight) {
                (PowerState::S5, 0) => {
                    self.transition(rt, machine, PowerState::S0)?;
                    info!(%machine, "waking standby machine");
                    return Ok(true);
                }
                (PowerState::S0, 1) => {
                    self.transition(rt, machine, PowerState::S0)?;
                    info!(%machine, "calling back machine with transition in flight");
                    return Ok(true);
                }
                (_, pending) if pending > 0 => {
                    debug!(%machine, pending, "machine already transitioning, not re-waking");
                    return Ok(true);
                }
                _ => {}
            }
        }
        Ok(false)
    }
}
