//! Simulated cluster runtime
//!
//! Implements the runtime-primitive interface the scheduler is linked
//! against: machines with power-transition latency, VMs with migration
//! latency proportional to their memory, per-class SLA measurement and
//! per-state energy integration. Requests that complete asynchronously
//! (transitions, migrations) land in an outbox of future events the engine
//! feeds back through the scheduler's completion entry points. Memory moves
//! between migration endpoints only when the migration completes, exactly
//! as the scheduler's projected accounting assumes.

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::engine::SimEvent;
use stratus_core::{
    ClusterRuntime, CpuKind, MachineId, MachineSnapshot, PowerState, Priority, Result, SimTime,
    SlaClass, StratusError, TaskId, TaskSpec, VmId, VmKind, VmSnapshot,
};

/// How long a power-state change takes
pub const TRANSITION_LATENCY_US: u64 = 500_000;

/// Migration latency per MB of VM memory
pub const MIGRATION_US_PER_MB: u64 = 2_000;

/// Delay before a warning generated by an admission is delivered
pub const WARNING_DELAY_US: u64 = 1_000;

/// Machine power draw per state, in watts
fn watts(state: PowerState) -> f64 {
    match state {
        PowerState::S0 => 200.0,
        PowerState::S5 => 10.0,
        // Intermediate sleep states draw less than running, more than off.
        _ => 120.0,
    }
}

/// Completion slack allowed per SLA class, as a multiple of task duration
fn sla_slack(class: SlaClass) -> f64 {
    match class {
        SlaClass::Sla0 => 1.2,
        SlaClass::Sla1 => 1.5,
        SlaClass::Sla2 => 2.0,
        SlaClass::Sla3 => f64::INFINITY,
    }
}

#[derive(Debug, Clone)]
pub struct SimMachine {
    pub cpu: CpuKind,
    pub gpus: bool,
    pub memory_mb: u64,
    pub memory_used_mb: u64,
    pub s_state: PowerState,
    /// Requested-but-unfinished state changes, oldest first
    pending_targets: VecDeque<PowerState>,
}

#[derive(Debug, Clone)]
struct SimVm {
    kind: VmKind,
    cpu: CpuKind,
    host: Option<MachineId>,
    tasks: Vec<TaskId>,
    migrating_to: Option<MachineId>,
    alive: bool,
}

#[derive(Debug, Clone)]
struct SimTask {
    spec: TaskSpec,
    arrival: SimTime,
    duration_us: u64,
    admitted: Option<SimTime>,
    completed: Option<SimTime>,
}

impl SimTask {
    /// Latest completion time that still honors the SLA
    fn deadline_us(&self) -> f64 {
        self.arrival.0 as f64 + sla_slack(self.spec.sla) * self.duration_us as f64
    }
}

/// The simulated machine/VM runtime
pub struct SimCluster {
    machines: Vec<SimMachine>,
    vms: HashMap<VmId, SimVm>,
    tasks: HashMap<TaskId, SimTask>,
    next_vm: u64,
    now: SimTime,
    outbox: Vec<(SimTime, SimEvent)>,
    vm_overhead_mb: u64,
    /// Integrated watt-microseconds across all machines
    watt_us: f64,
    completed_per_class: [u32; 4],
    violations_per_class: [u32; 4],
}

impl SimCluster {
    pub fn new(vm_overhead_mb: u64) -> Self {
        SimCluster {
            machines: Vec::new(),
            vms: HashMap::new(),
            tasks: HashMap::new(),
            next_vm: 0,
            now: SimTime::ZERO,
            outbox: Vec::new(),
            vm_overhead_mb,
            watt_us: 0.0,
            completed_per_class: [0; 4],
            violations_per_class: [0; 4],
        }
    }

    pub fn add_machine(&mut self, cpu: CpuKind, gpus: bool, memory_mb: u64) -> MachineId {
        self.machines.push(SimMachine {
            cpu,
            gpus,
            memory_mb,
            memory_used_mb: 0,
            s_state: PowerState::S0,
            pending_targets: VecDeque::new(),
        });
        MachineId(self.machines.len() - 1)
    }

    /// Register a task the workload will deliver later
    pub fn insert_task(&mut self, task: TaskId, spec: TaskSpec, arrival: SimTime, duration_us: u64) {
        self.tasks.insert(
            task,
            SimTask {
                spec,
                arrival,
                duration_us,
                admitted: None,
                completed: None,
            },
        );
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Advance the clock, integrating energy over the elapsed interval
    pub fn advance(&mut self, to: SimTime) {
        if to <= self.now {
            return;
        }
        let dt = (to.0 - self.now.0) as f64;
        for machine in &self.machines {
            self.watt_us += watts(machine.s_state) * dt;
        }
        self.now = to;
    }

    /// Future events produced by runtime requests since the last call
    pub fn take_outbox(&mut self) -> Vec<(SimTime, SimEvent)> {
        std::mem::take(&mut self.outbox)
    }

    /// Apply the oldest in-flight state change for `machine`
    pub fn apply_state_change(&mut self, machine: MachineId) {
        let m = &mut self.machines[machine.0];
        if let Some(target) = m.pending_targets.pop_front() {
            trace!(%machine, ?target, "machine reached requested state");
            m.s_state = target;
        }
    }

    /// Run a task to completion: remove it from its VM, free the memory and
    /// record the SLA outcome.
    pub fn complete_task(&mut self, task: TaskId) {
        let now = self.now;
        let Some(state) = self.tasks.get_mut(&task) else {
            return;
        };
        if state.completed.is_some() {
            return;
        }
        state.completed = Some(now);
        let late = (now.0 as f64) > state.deadline_us();
        let class = state.spec.sla as usize;
        let memory_mb = state.spec.memory_mb;
        self.completed_per_class[class] += 1;
        if late {
            self.violations_per_class[class] += 1;
        }

        for vm in self.vms.values_mut() {
            if let Some(pos) = vm.tasks.iter().position(|t| *t == task) {
                vm.tasks.remove(pos);
                if let Some(host) = vm.host {
                    self.machines[host.0].memory_used_mb -= memory_mb;
                }
                break;
            }
        }
    }

    /// Physically complete a migration: move the VM's memory from source to
    /// target and re-host it.
    pub fn apply_migration(&mut self, vm: VmId) {
        let total = self.vm_total_mb(vm);
        let Some(entry) = self.vms.get_mut(&vm) else {
            return;
        };
        let Some(target) = entry.migrating_to.take() else {
            return;
        };
        let Some(source) = entry.host else {
            return;
        };
        entry.host = Some(target);
        self.machines[source.0].memory_used_mb -= total;
        self.machines[target.0].memory_used_mb += total;
    }

    pub fn energy_kwh(&self) -> f64 {
        // watt-microseconds -> joules -> KW-Hour
        self.watt_us / 1_000_000.0 / 3_600_000.0
    }

    pub fn completed_tasks(&self) -> u32 {
        self.completed_per_class.iter().sum()
    }

    fn vm_total_mb(&self, vm: VmId) -> u64 {
        let Some(entry) = self.vms.get(&vm) else {
            return 0;
        };
        self.vm_overhead_mb
            + entry
                .tasks
                .iter()
                .filter_map(|t| self.tasks.get(t))
                .map(|t| t.spec.memory_mb)
                .sum::<u64>()
    }

    fn check_overcommit(&mut self, machine: MachineId) {
        let m = &self.machines[machine.0];
        if m.memory_used_mb > m.memory_mb {
            let at = self.now.saturating_add(WARNING_DELAY_US);
            self.outbox.push((at, SimEvent::MemoryWarning(machine)));
        }
    }
}

impl ClusterRuntime for SimCluster {
    fn machine_count(&self) -> usize {
        self.machines.len()
    }

    fn machine_info(&self, machine: MachineId) -> Result<MachineSnapshot> {
        let m = self
            .machines
            .get(machine.0)
            .ok_or(StratusError::MachineOutOfRange(machine))?;
        let active_vms = self
            .vms
            .values()
            .filter(|vm| vm.alive && vm.host == Some(machine))
            .count();
        let active_tasks = self
            .vms
            .values()
            .filter(|vm| vm.alive && vm.host == Some(machine))
            .map(|vm| vm.tasks.len())
            .sum();
        Ok(MachineSnapshot {
            id: machine,
            cpu: m.cpu,
            gpus: m.gpus,
            memory_mb: m.memory_mb,
            memory_used_mb: m.memory_used_mb,
            s_state: m.s_state,
            active_vms,
            active_tasks,
        })
    }

    fn set_machine_state(&mut self, machine: MachineId, state: PowerState) -> Result<()> {
        let at = self.now.saturating_add(TRANSITION_LATENCY_US);
        let m = self
            .machines
            .get_mut(machine.0)
            .ok_or(StratusError::MachineOutOfRange(machine))?;
        m.pending_targets.push_back(state);
        self.outbox.push((at, SimEvent::StateChangeComplete(machine)));
        Ok(())
    }

    fn vm_create(&mut self, kind: VmKind, cpu: CpuKind) -> Result<VmId> {
        let id = VmId(self.next_vm);
        self.next_vm += 1;
        self.vms.insert(
            id,
            SimVm {
                kind,
                cpu,
                host: None,
                tasks: Vec::new(),
                migrating_to: None,
                alive: true,
            },
        );
        Ok(id)
    }

    fn vm_attach(&mut self, vm: VmId, machine: MachineId) -> Result<()> {
        let overhead = self.vm_overhead_mb;
        let entry = self.vms.get_mut(&vm).ok_or(StratusError::UnknownVm(vm))?;
        entry.host = Some(machine);
        self.machines[machine.0].memory_used_mb += overhead;
        self.check_overcommit(machine);
        Ok(())
    }

    fn vm_add_task(&mut self, vm: VmId, task: TaskId, _priority: Priority) -> Result<()> {
        let now = self.now;
        let (memory_mb, first_admission, completes_at, late_risk, sla) = {
            let state = self.tasks.get_mut(&task).ok_or(StratusError::UnknownTask(task))?;
            let first = state.admitted.is_none();
            if first {
                state.admitted = Some(now);
            }
            let completes_at = now.saturating_add(state.duration_us);
            let late_risk = (completes_at.0 as f64) > state.deadline_us();
            (state.spec.memory_mb, first, completes_at, late_risk, state.spec.sla)
        };

        let entry = self.vms.get_mut(&vm).ok_or(StratusError::UnknownVm(vm))?;
        if entry.migrating_to.is_some() {
            return Err(StratusError::VmMigrating {
                vm,
                operation: "given new tasks",
            });
        }
        let host = entry
            .host
            .ok_or_else(|| StratusError::runtime("VM not attached"))?;
        entry.tasks.push(task);
        self.machines[host.0].memory_used_mb += memory_mb;

        if first_admission {
            self.outbox.push((completes_at, SimEvent::TaskCompletion(task)));
            // A task admitted too late to make its deadline gets flagged so
            // the scheduler can react before the violation lands.
            if late_risk && sla == SlaClass::Sla0 {
                let at = now.saturating_add(WARNING_DELAY_US);
                self.outbox.push((at, SimEvent::SlaWarning(task)));
            }
        }
        self.check_overcommit(host);
        Ok(())
    }

    fn vm_remove_task(&mut self, vm: VmId, task: TaskId) -> Result<()> {
        let memory_mb = self
            .tasks
            .get(&task)
            .ok_or(StratusError::UnknownTask(task))?
            .spec
            .memory_mb;
        let entry = self.vms.get_mut(&vm).ok_or(StratusError::UnknownVm(vm))?;
        let pos = entry
            .tasks
            .iter()
            .position(|t| *t == task)
            .ok_or(StratusError::UnknownTask(task))?;
        entry.tasks.remove(pos);
        let host = entry
            .host
            .ok_or_else(|| StratusError::runtime("VM not attached"))?;
        self.machines[host.0].memory_used_mb -= memory_mb;
        Ok(())
    }

    fn vm_migrate(&mut self, vm: VmId, target: MachineId) -> Result<()> {
        let total = self.vm_total_mb(vm);
        let entry = self.vms.get_mut(&vm).ok_or(StratusError::UnknownVm(vm))?;
        if entry.migrating_to.is_some() {
            return Err(StratusError::VmMigrating {
                vm,
                operation: "re-migrated",
            });
        }
        if entry.host.is_none() {
            return Err(StratusError::runtime("VM not attached"));
        }
        entry.migrating_to = Some(target);
        let at = self.now.saturating_add(total * MIGRATION_US_PER_MB);
        self.outbox.push((at, SimEvent::MigrationDone(vm)));
        Ok(())
    }

    fn vm_shutdown(&mut self, vm: VmId) -> Result<()> {
        let total = self.vm_total_mb(vm);
        let entry = self.vms.get_mut(&vm).ok_or(StratusError::UnknownVm(vm))?;
        if entry.migrating_to.is_some() {
            return Err(StratusError::VmMigrating {
                vm,
                operation: "shut down",
            });
        }
        if let Some(host) = entry.host.take() {
            self.machines[host.0].memory_used_mb -= total;
        }
        entry.alive = false;
        Ok(())
    }

    fn vm_info(&self, vm: VmId) -> Result<VmSnapshot> {
        let entry = self.vms.get(&vm).ok_or(StratusError::UnknownVm(vm))?;
        Ok(VmSnapshot {
            id: vm,
            vm_kind: entry.kind,
            cpu: entry.cpu,
            host: entry
                .host
                .ok_or_else(|| StratusError::runtime("VM not attached"))?,
            tasks: entry.tasks.clone(),
        })
    }

    fn task_info(&self, task: TaskId) -> Result<TaskSpec> {
        self.tasks
            .get(&task)
            .map(|t| t.spec)
            .ok_or(StratusError::UnknownTask(task))
    }

    fn sla_report(&self, class: SlaClass) -> f64 {
        let idx = class as usize;
        let completed = self.completed_per_class[idx];
        if completed == 0 {
            return 0.0;
        }
        self.violations_per_class[idx] as f64 / completed as f64 * 100.0
    }

    fn cluster_energy(&self) -> f64 {
        self.energy_kwh()
    }
}
