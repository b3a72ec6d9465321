//! The scheduler's view of the cluster: machine ids, the live VM list, and
//! the task-to-VM index maintained on every admit/remove path so warning
//! handlers never have to search the VM list linearly.

use std::collections::HashMap;
use stratus_core::{MachineId, TaskId, VmId};

#[derive(Debug, Default)]
pub struct Inventory {
    machines: Vec<MachineId>,
    /// Live VMs in insertion order. The order matters: it is the placement
    /// tie-break among candidates with equal remaining memory.
    vms: Vec<VmId>,
    task_hosts: HashMap<TaskId, VmId>,
}

impl Inventory {
    pub fn with_machines(count: usize) -> Self {
        Inventory {
            machines: (0..count).map(MachineId).collect(),
            vms: Vec::new(),
            task_hosts: HashMap::new(),
        }
    }

    pub fn machines(&self) -> &[MachineId] {
        &self.machines
    }

    pub fn vms(&self) -> &[VmId] {
        &self.vms
    }

    pub fn register_vm(&mut self, vm: VmId) {
        self.vms.push(vm);
    }

    /// Drop a VM from the live list, e.g. after shutdown
    pub fn remove_vm(&mut self, vm: VmId) {
        self.vms.retain(|v| *v != vm);
    }

    /// Record where a task was admitted
    pub fn record_task(&mut self, task: TaskId, vm: VmId) {
        self.task_hosts.insert(task, vm);
    }

    /// Forget a task on completion or removal; returns its former VM
    pub fn forget_task(&mut self, task: TaskId) -> Option<VmId> {
        self.task_hosts.remove(&task)
    }

    /// The VM currently hosting `task`, if the scheduler placed it
    pub fn host_of(&self, task: TaskId) -> Option<VmId> {
        self.task_hosts.get(&task).copied()
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }
}
