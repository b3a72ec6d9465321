//! Reactive handlers for SLA and memory-overcommit warnings
//!
//! An SLA warning re-homes the offending task to the least utilized stable
//! compatible host, waking a standby machine when nothing running accepts
//! it. A memory warning evacuates the heaviest resident VM task-by-task
//! through the same path. MemoryWarning calls the SLA handler
//! synchronously, so task ids are collected before any mutation.

use tracing::{debug, info, warn};

use crate::accounting::{fits, projected_memory_mb, projected_utilization};
use crate::scheduler::Scheduler;
use stratus_core::{ClusterRuntime, MachineId, Result, StratusError, TaskId, TaskSpec, VmId};

impl Scheduler {
    pub(crate) fn handle_sla_warning(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        task: TaskId,
    ) -> Result<()> {
        let Some(current_vm) = self.inventory.host_of(task) else {
            // Arrives for tasks still in the pending queue, or after
            // completion raced the warning.
            debug!(%task, "SLA warning for a task without a placement, ignoring");
            return Ok(());
        };
        if self.migrations.is_migrating(current_vm) {
            debug!(%task, vm = %current_vm, "host VM is migrating, leaving task in place");
            return Ok(());
        }

        let spec = rt.task_info(task)?;
        let current_host = rt.vm_info(current_vm)?.host;

        // Stable machines other than the current host, least utilized first.
        let mut hosts: Vec<(MachineId, f64)> = Vec::new();
        for &machine in self.inventory.machines() {
            if machine == current_host {
                continue;
            }
            let snapshot = rt.machine_info(machine)?;
            if !self.transitions.is_stable(&snapshot) {
                continue;
            }
            hosts.push((machine, projected_utilization(&snapshot, &self.migrations)));
        }
        hosts.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        for (machine, _) in hosts {
            let snapshot = rt.machine_info(machine)?;
            if snapshot.cpu != spec.cpu {
                continue;
            }
            if spec.gpu_capable && !snapshot.gpus {
                continue;
            }
            let projected = projected_memory_mb(&snapshot, &self.migrations);
            let extra = spec.memory_mb + self.config.vm_overhead_mb;
            if !fits(projected, extra, snapshot.memory_mb, self.config.max_util) {
                continue;
            }

            rt.vm_remove_task(current_vm, task)?;
            self.inventory.forget_task(task);

            let target_vm = match self.resident_vm_matching(rt, machine, &spec)? {
                Some(vm) => vm,
                None => self.create_vm_on(rt, machine, &spec)?,
            };
            self.admit(rt, target_vm, task, spec.sla.priority())?;
            info!(
                %task,
                from = %current_host,
                to = %machine,
                vm = %target_vm,
                "task re-homed after SLA warning"
            );
            return Ok(());
        }

        // Nothing running accepts the task: wake a standby machine and
        // queue the task for the drainer.
        if self.wake_compatible(rt, &spec)? {
            rt.vm_remove_task(current_vm, task)?;
            self.inventory.forget_task(task);
            self.pending_tasks.push_back(task);
            info!(%task, "task queued for a waking machine after SLA warning");
            return Ok(());
        }

        warn!(%task, "SLA warning could not be resolved anywhere");
        Err(StratusError::UnsatisfiablePlacement { task })
    }

    pub(crate) fn handle_memory_warning(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        machine: MachineId,
    ) -> Result<()> {
        // Evacuating the heaviest resident resolves the overcommit in one
        // move instead of many small ones. Migrating VMs are untouchable.
        let mut heaviest: Option<(VmId, u64)> = None;
        for vm in self.vms_on(rt, machine)? {
            if self.migrations.is_migrating(vm) {
                continue;
            }
            let load = self.vm_load(rt, vm)?;
            if heaviest.map_or(true, |(_, mem)| load.memory_mb > mem) {
                heaviest = Some((vm, load.memory_mb));
            }
        }
        let Some((vm, memory_mb)) = heaviest else {
            debug!(%machine, "memory warning on a machine with no movable VMs");
            return Ok(());
        };

        info!(%machine, %vm, memory_mb, "evacuating heaviest VM after memory warning");
        let tasks: Vec<TaskId> = rt.vm_info(vm)?.tasks;
        for task in tasks {
            self.handle_sla_warning(rt, task)?;
        }
        Ok(())
    }

    /// An existing non-migrating VM on `machine` matching the task's kind
    /// and CPU, if any. First match in VM-list order.
    fn resident_vm_matching(
        &self,
        rt: &dyn ClusterRuntime,
        machine: MachineId,
        spec: &TaskSpec,
    ) -> Result<Option<VmId>> {
        for &vm in self.inventory.vms() {
            if self.migrations.is_migrating(vm) {
                continue;
            }
            let info = rt.vm_info(vm)?;
            if info.host == machine && info.vm_kind == spec.vm_kind && info.cpu == spec.cpu {
                return Ok(Some(vm));
            }
        }
        Ok(None)
    }
}
