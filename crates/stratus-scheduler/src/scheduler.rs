//! The scheduler instance and its simulator-driven entry points
//!
//! One owned [`Scheduler`] value holds every piece of scheduler state: the
//! inventory, the pending-transition counters, the in-flight migration
//! records and the pending-task queue. The simulator invokes the entry
//! points single-threadedly with a nondecreasing timestamp; each call runs
//! to completion before the next event is delivered. The runtime is shared
//! with the simulator, so it is borrowed per call rather than owned.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::inventory::Inventory;
use crate::migration::{MigrationTracker, PendingMigration};
use crate::policy::{make_policy, PlacementPolicy};
use crate::transition::TransitionTracker;
use stratus_core::{
    ClusterRuntime, CpuKind, MachineId, PowerState, Priority, Result, SchedulerConfig, SimTime,
    SlaClass, TaskId, VmId,
};

/// Memory and compatibility footprint of a live VM, derived from its tasks
#[derive(Debug, Clone, Copy)]
pub(crate) struct VmLoad {
    /// VM overhead plus the memory of every resident task, in MB
    pub memory_mb: u64,
    pub cpu: CpuKind,
    /// Whether any resident task is GPU-capable, which pins the VM to
    /// GPU-equipped hosts
    pub needs_gpu: bool,
}

/// Summary emitted once at simulation end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    /// Violation percentages for the classes with SLA guarantees
    pub sla0_violations_pct: f64,
    pub sla1_violations_pct: f64,
    pub sla2_violations_pct: f64,
    /// Total cluster energy in KW-Hour
    pub total_energy_kwh: f64,
    /// Simulated wall-clock seconds
    pub elapsed_secs: f64,
}

impl std::fmt::Display for FinalReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SLA violation report")?;
        writeln!(f, "SLA0: {}%", self.sla0_violations_pct)?;
        writeln!(f, "SLA1: {}%", self.sla1_violations_pct)?;
        writeln!(f, "SLA2: {}%", self.sla2_violations_pct)?;
        writeln!(f, "Total Energy {}KW-Hour", self.total_energy_kwh)?;
        write!(
            f,
            "Simulation run finished in {} seconds",
            self.elapsed_secs
        )
    }
}

/// The placement and consolidation engine
pub struct Scheduler {
    pub(crate) config: SchedulerConfig,
    pub(crate) policy: Box<dyn PlacementPolicy>,
    pub(crate) inventory: Inventory,
    pub(crate) transitions: TransitionTracker,
    pub(crate) migrations: MigrationTracker,
    pub(crate) pending_tasks: VecDeque<TaskId>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let policy = make_policy(config.policy);
        Scheduler {
            config,
            policy,
            inventory: Inventory::default(),
            transitions: TransitionTracker::default(),
            migrations: MigrationTracker::new(),
            pending_tasks: VecDeque::new(),
        }
    }

    /// Build the inventory and drive machines to their initial states: the
    /// lowest `min_active_machines` ids on, everything else off.
    pub fn init(&mut self, rt: &mut dyn ClusterRuntime) -> Result<()> {
        let count = rt.machine_count();
        self.inventory = Inventory::with_machines(count);
        self.transitions = TransitionTracker::new(count);

        info!(
            machines = count,
            policy = self.policy.name(),
            floor = self.config.min_active_machines,
            "initializing scheduler"
        );

        for i in 0..count {
            let machine = MachineId(i);
            let snapshot = rt.machine_info(machine)?;
            if i < self.config.min_active_machines {
                if snapshot.s_state != PowerState::S0 {
                    self.transition(rt, machine, PowerState::S0)?;
                }
            } else if snapshot.s_state == PowerState::S0 {
                self.transition(rt, machine, PowerState::S5)?;
            }
        }
        Ok(())
    }

    /// Task arrival: place on an existing VM, a new VM, or queue with a
    /// wake-up. Fails loudly when no compatible host exists or can be woken.
    pub fn new_task(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        now: SimTime,
        task: TaskId,
    ) -> Result<()> {
        debug!(%task, %now, "task arrival");
        self.place_new_task(rt, task)
    }

    /// Task completion: drop the task from the index, then consolidate.
    pub fn task_complete(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        now: SimTime,
        task: TaskId,
    ) -> Result<()> {
        if let Some(vm) = self.inventory.forget_task(task) {
            debug!(%task, %vm, %now, "task complete");
        }
        self.consolidate(rt)
    }

    /// Migration completion report. Unknown VMs are tolerated as no-ops.
    pub fn migration_done(
        &mut self,
        _rt: &mut dyn ClusterRuntime,
        now: SimTime,
        vm: VmId,
    ) -> Result<()> {
        match self.migrations.complete(vm) {
            Some(done) => {
                debug!(
                    %vm,
                    source = %done.source,
                    target = %done.target,
                    %now,
                    "migration complete"
                );
            }
            None => debug!(%vm, "stale migration-done report, ignoring"),
        }
        Ok(())
    }

    /// Power-transition completion report: settle the counter and, if the
    /// machine came up stable, drain the pending-task queue onto it.
    pub fn state_change_complete(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        now: SimTime,
        machine: MachineId,
    ) -> Result<()> {
        debug!(%machine, %now, "state change complete");
        self.handle_state_change(rt, machine)
    }

    /// Host overcommit signal: evacuate the heaviest resident VM.
    pub fn memory_warning(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        now: SimTime,
        machine: MachineId,
    ) -> Result<()> {
        warn!(%machine, %now, "memory overcommit reported");
        self.handle_memory_warning(rt, machine)
    }

    /// SLA breach risk for a task: re-home it to a less loaded host.
    pub fn sla_warning(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        now: SimTime,
        task: TaskId,
    ) -> Result<()> {
        warn!(%task, %now, "SLA warning reported");
        self.handle_sla_warning(rt, task)
    }

    /// Periodic housekeeping: retire idle VMs and power off emptied machines.
    pub fn periodic_tick(&mut self, rt: &mut dyn ClusterRuntime, now: SimTime) -> Result<()> {
        debug!(%now, "periodic check");
        self.periodic_check(rt)
    }

    /// End of simulation: shut every VM down and assemble the final report.
    pub fn simulation_complete(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        now: SimTime,
    ) -> Result<FinalReport> {
        let vms: Vec<VmId> = self.inventory.vms().to_vec();
        for vm in vms {
            // A VM whose migration never completed stays with the runtime;
            // it must not be shut down while the migration is pending.
            if self.migrations.is_migrating(vm) {
                debug!(%vm, "leaving migrating VM to the runtime at shutdown");
                continue;
            }
            rt.vm_shutdown(vm)?;
            self.inventory.remove_vm(vm);
        }

        let report = FinalReport {
            sla0_violations_pct: rt.sla_report(SlaClass::Sla0),
            sla1_violations_pct: rt.sla_report(SlaClass::Sla1),
            sla2_violations_pct: rt.sla_report(SlaClass::Sla2),
            total_energy_kwh: rt.cluster_energy(),
            elapsed_secs: now.as_secs_f64(),
        };
        info!(
            energy_kwh = report.total_energy_kwh,
            elapsed_secs = report.elapsed_secs,
            "simulation complete"
        );
        Ok(report)
    }

    // ---- read-only views, mainly for tests and the harness ----

    /// Transitions in flight for `machine`
    pub fn pending_transitions(&self, machine: MachineId) -> u32 {
        self.transitions.pending(machine)
    }

    /// Tasks waiting for a machine to wake
    pub fn queued_tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.pending_tasks.iter().copied()
    }

    /// In-flight migrations
    pub fn pending_migrations(&self) -> impl Iterator<Item = &PendingMigration> {
        self.migrations.iter()
    }

    /// Live VMs the scheduler owns
    pub fn live_vms(&self) -> &[VmId] {
        self.inventory.vms()
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    // ---- helpers shared by the component modules ----

    /// Issue a power-state change and record it in the transition tracker
    pub(crate) fn transition(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        machine: MachineId,
        state: PowerState,
    ) -> Result<()> {
        rt.set_machine_state(machine, state)?;
        self.transitions.request(machine);
        debug!(%machine, ?state, "power transition requested");
        Ok(())
    }

    /// Admit a task on a VM and index it
    pub(crate) fn admit(
        &mut self,
        rt: &mut dyn ClusterRuntime,
        vm: VmId,
        task: TaskId,
        priority: Priority,
    ) -> Result<()> {
        rt.vm_add_task(vm, task, priority)?;
        self.inventory.record_task(task, vm);
        Ok(())
    }

    /// VMs currently resident on `machine`. A migrating VM counts as
    /// resident on its source until the migration completes.
    pub(crate) fn vms_on(
        &self,
        rt: &dyn ClusterRuntime,
        machine: MachineId,
    ) -> Result<Vec<VmId>> {
        let mut resident = Vec::new();
        for &vm in self.inventory.vms() {
            if rt.vm_info(vm)?.host == machine {
                resident.push(vm);
            }
        }
        Ok(resident)
    }

    /// Memory and compatibility footprint of a VM
    pub(crate) fn vm_load(&self, rt: &dyn ClusterRuntime, vm: VmId) -> Result<VmLoad> {
        let info = rt.vm_info(vm)?;
        let mut memory_mb = self.config.vm_overhead_mb;
        let mut needs_gpu = false;
        for &task in &info.tasks {
            let spec = rt.task_info(task)?;
            memory_mb += spec.memory_mb;
            needs_gpu |= spec.gpu_capable;
        }
        Ok(VmLoad {
            memory_mb,
            cpu: info.cpu,
            needs_gpu,
        })
    }
}
