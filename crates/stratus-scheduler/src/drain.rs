//! Wake-up drainer: the power-transition-completion path
//!
//! When a machine finishes transitioning and is stable, the pending-task
//! queue is walked once. Each queued task is retried as a reuse placement
//! anywhere, then as a new VM on the freshly stable machine, then as a new
//! VM on any other stable machine. Tasks that still fit nowhere stay queued
//! for the next completion. The drainer never issues wake-ups itself -
//! that is the placement engine's job on fresh arrivals - so identical
//! wake-ups cannot cascade.

use tracing::{debug, info};

use crate::accounting::{fits, projected_memory_mb};
use crate::scheduler::Scheduler;
use stratus_core::{ClusterRuntime, MachineId, Result, TaskId};

impl Scheduler {
    pub(crate) fn handle_state_change(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        machine: MachineId,
    ) -> Result<()> {
        if !self.transitions.complete(machine) {
            debug!(%machine, "stale state-change report, ignoring");
        }

        let snapshot = rt.machine_info(machine)?;
        if !self.transitions.is_stable(&snapshot) {
            return Ok(());
        }

        if self.pending_tasks.is_empty() {
            return Ok(());
        }

        let queued: Vec<TaskId> = self.pending_tasks.iter().copied().collect();
        let mut placed = 0usize;
        for task in queued {
            if self.try_place_queued(rt, machine, task)? {
                self.pending_tasks.retain(|t| *t != task);
                placed += 1;
            }
        }
        info!(
            %machine,
            placed,
            still_queued = self.pending_tasks.len(),
            "drained pending-task queue"
        );
        Ok(())
    }

    /// One drain attempt for one queued task. Returns whether it was placed.
    fn try_place_queued(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        woken: MachineId,
        task: TaskId,
    ) -> Result<bool> {
        let spec = rt.task_info(task)?;
        let priority = spec.sla.priority();

        // (a) Reuse on any stable, matching VM.
        if let Some(vm) = self.reuse_candidate(rt, &spec)? {
            self.admit(rt, vm, task, priority)?;
            debug!(%task, %vm, "queued task placed on existing VM");
            return Ok(true);
        }

        // (b) New VM on the machine that just became stable.
        let snapshot = rt.machine_info(woken)?;
        if self.transitions.is_stable(&snapshot)
            && snapshot.cpu == spec.cpu
            && (!spec.gpu_capable || snapshot.gpus)
        {
            let projected = projected_memory_mb(&snapshot, &self.migrations);
            let extra = self.config.vm_overhead_mb + spec.memory_mb;
            if fits(projected, extra, snapshot.memory_mb, self.config.max_util) {
                let vm = self.create_vm_on(rt, woken, &spec)?;
                self.admit(rt, vm, task, priority)?;
                debug!(%task, %vm, machine = %woken, "queued task placed on woken machine");
                return Ok(true);
            }
        }

        // (c) New VM on any other stable machine. Covers queued tasks whose
        // CPU does not match the woken machine but does match a machine
        // that became viable since arrival.
        if let Some(machine) = self.host_candidate(rt, &spec)? {
            let vm = self.create_vm_on(rt, machine, &spec)?;
            self.admit(rt, vm, task, priority)?;
            debug!(%task, %vm, %machine, "queued task placed on other stable machine");
            return Ok(true);
        }

        Ok(false)
    }
}
