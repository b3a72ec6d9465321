#![allow(dead_code)]
//! Scripted in-memory runtime for integration tests
//!
//! Power transitions and migrations complete only when the test says so
//! (`finish_transition` / `finish_migration`), which lets each scenario
//! interleave events exactly the way the spec scenarios describe.

use std::collections::HashMap;

use stratus_core::{
    ClusterRuntime, CpuKind, MachineId, MachineSnapshot, PowerState, Priority, Result, SlaClass,
    StratusError, TaskId, TaskSpec, VmId, VmKind,
};

#[derive(Debug, Clone)]
pub struct MockMachine {
    pub cpu: CpuKind,
    pub gpus: bool,
    pub memory_mb: u64,
    pub memory_used_mb: u64,
    pub s_state: PowerState,
}

#[derive(Debug, Clone)]
pub struct MockVm {
    pub kind: VmKind,
    pub cpu: CpuKind,
    pub host: Option<MachineId>,
    pub tasks: Vec<TaskId>,
    pub migrating_to: Option<MachineId>,
    pub alive: bool,
}

#[derive(Default)]
pub struct MockCluster {
    pub machines: Vec<MockMachine>,
    pub vms: HashMap<VmId, MockVm>,
    pub tasks: HashMap<TaskId, TaskSpec>,
    pub vm_overhead_mb: u64,
    next_vm: u64,
    next_task: u64,
    /// Every state change the scheduler requested, in order
    pub state_requests: Vec<(MachineId, PowerState)>,
    /// Requested-but-unfinished state changes
    inflight_states: Vec<(MachineId, PowerState)>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_machine(
        &mut self,
        cpu: CpuKind,
        gpus: bool,
        memory_mb: u64,
        memory_used_mb: u64,
        s_state: PowerState,
    ) -> MachineId {
        self.machines.push(MockMachine {
            cpu,
            gpus,
            memory_mb,
            memory_used_mb,
            s_state,
        });
        MachineId(self.machines.len() - 1)
    }

    pub fn add_task(&mut self, spec: TaskSpec) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        self.tasks.insert(id, spec);
        id
    }

    /// Apply the oldest in-flight state change for `machine`. The caller
    /// then reports it through the scheduler's entry point.
    pub fn finish_transition(&mut self, machine: MachineId) {
        let idx = self
            .inflight_states
            .iter()
            .position(|(m, _)| *m == machine)
            .expect("no in-flight transition for machine");
        let (_, state) = self.inflight_states.remove(idx);
        self.machines[machine.0].s_state = state;
    }

    /// Physically complete a migration: move the VM's memory from source to
    /// target and re-host it. The caller then reports migration-done.
    pub fn finish_migration(&mut self, vm: VmId) {
        let entry = self.vms.get_mut(&vm).expect("unknown VM");
        let target = entry.migrating_to.take().expect("VM not migrating");
        let source = entry.host.expect("migrating VM has no host");
        let total = self.vm_total_mb(vm);
        let entry = self.vms.get_mut(&vm).unwrap();
        entry.host = Some(target);
        self.machines[source.0].memory_used_mb -= total;
        self.machines[target.0].memory_used_mb += total;
    }

    /// Simulate a task running to completion: the runtime removes it from
    /// its VM before the scheduler hears about it.
    pub fn finish_task(&mut self, task: TaskId) {
        let spec = self.tasks[&task];
        for (_, vm) in self.vms.iter_mut() {
            if let Some(pos) = vm.tasks.iter().position(|t| *t == task) {
                vm.tasks.remove(pos);
                let host = vm.host.expect("VM with tasks has no host");
                self.machines[host.0].memory_used_mb -= spec.memory_mb;
                return;
            }
        }
        panic!("task {task} not running on any VM");
    }

    pub fn vm_total_mb(&self, vm: VmId) -> u64 {
        let entry = &self.vms[&vm];
        self.vm_overhead_mb
            + entry
                .tasks
                .iter()
                .map(|t| self.tasks[t].memory_mb)
                .sum::<u64>()
    }

    pub fn used(&self, machine: usize) -> u64 {
        self.machines[machine].memory_used_mb
    }

    pub fn state_requests_for(&self, machine: MachineId) -> Vec<PowerState> {
        self.state_requests
            .iter()
            .filter(|(m, _)| *m == machine)
            .map(|(_, s)| *s)
            .collect()
    }
}

impl ClusterRuntime for MockCluster {
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
        if machine.0 >= self.machines.len() {
            return Err(StratusError::MachineOutOfRange(machine));
        }
        self.state_requests.push((machine, state));
        self.inflight_states.push((machine, state));
        Ok(())
    }

    fn vm_create(&mut self, kind: VmKind, cpu: CpuKind) -> Result<VmId> {
        let id = VmId(self.next_vm);
        self.next_vm += 1;
        self.vms.insert(
            id,
            MockVm {
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
        Ok(())
    }

    fn vm_add_task(&mut self, vm: VmId, task: TaskId, _priority: Priority) -> Result<()> {
        let spec = *self.tasks.get(&task).ok_or(StratusError::UnknownTask(task))?;
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
        self.machines[host.0].memory_used_mb += spec.memory_mb;
        Ok(())
    }

    fn vm_remove_task(&mut self, vm: VmId, task: TaskId) -> Result<()> {
        let spec = *self.tasks.get(&task).ok_or(StratusError::UnknownTask(task))?;
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
        self.machines[host.0].memory_used_mb -= spec.memory_mb;
        Ok(())
    }

    fn vm_migrate(&mut self, vm: VmId, target: MachineId) -> Result<()> {
        let entry = self.vms.get_mut(&vm).ok_or(StratusError::UnknownVm(vm))?;
        if entry.migrating_to.is_some() {
            return Err(StratusError::VmMigrating {
                vm,
                operation: "re-migrated",
            });
        }
        entry.migrating_to = Some(target);
        Ok(())
    }

    fn vm_shutdown(&mut self, vm: VmId) -> Result<()> {
        if !self.vms.contains_key(&vm) {
            return Err(StratusError::UnknownVm(vm));
        }
        let total = self.vm_total_mb(vm);
        let entry = self.vms.get_mut(&vm).expect("checked above");
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

    fn vm_info(&self, vm: VmId) -> Result<stratus_core::VmSnapshot> {
        let entry = self.vms.get(&vm).ok_or(StratusError::UnknownVm(vm))?;
        Ok(stratus_core::VmSnapshot {
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
            .copied()
            .ok_or(StratusError::UnknownTask(task))
    }

    fn sla_report(&self, _class: SlaClass) -> f64 {
        0.0
    }

    fn cluster_energy(&self) -> f64 {
        0.0
    }
}

/// Task spec shorthand used across the scenarios
pub fn task(cpu: CpuKind, kind: VmKind, memory_mb: u64, sla: SlaClass) -> TaskSpec {
    TaskSpec {
        vm_kind: kind,
        cpu,
        gpu_capable: false,
        memory_mb,
        sla,
    }
}
