//! Core traits for Stratus
//!
//! The ClusterRuntime trait defines the interface to the machine/VM runtime
//! the scheduler is linked into. The scheduler works through this interface
//! ONLY - never concrete types. Every call is synchronous: the simulated
//! asynchronous operations (power transitions, migrations) are requested
//! here and reported later through the scheduler's completion entry points.

use crate::error::Result;
use crate::types::{
    CpuKind, MachineId, MachineSnapshot, PowerState, Priority, SlaClass, TaskId, TaskSpec, VmId,
    VmKind, VmSnapshot,
};

/// The machine/VM runtime primitives consumed by the scheduler.
///
/// Machines are owned by the runtime and never created or destroyed; the
/// scheduler observes them via [`ClusterRuntime::machine_info`] and mutates
/// them only through [`ClusterRuntime::set_machine_state`]. VMs are
/// scheduler-owned entities the runtime hosts.
pub trait ClusterRuntime {
    /// Number of machines in the cluster, fixed for the whole run
    fn machine_count(&self) -> usize;

    /// Snapshot of one machine's attributes and state
    fn machine_info(&self, machine: MachineId) -> Result<MachineSnapshot>;

    /// Request an asynchronous power-state change. Completion is reported
    /// through the scheduler's state-change-complete entry point.
    fn set_machine_state(&mut self, machine: MachineId, state: PowerState) -> Result<()>;

    /// Create a new, unattached VM of the given kind
    fn vm_create(&mut self, kind: VmKind, cpu: CpuKind) -> Result<VmId>;

    /// Attach a freshly created VM to a machine
    fn vm_attach(&mut self, vm: VmId, machine: MachineId) -> Result<()>;

    /// Admit a task on a VM at the given priority
    fn vm_add_task(&mut self, vm: VmId, task: TaskId, priority: Priority) -> Result<()>;

    /// Remove a task from the VM currently hosting it
    fn vm_remove_task(&mut self, vm: VmId, task: TaskId) -> Result<()>;

    /// Request an asynchronous migration of a VM to a target machine.
    /// Completion is reported through the migration-done entry point; until
    /// then the runtime keeps accounting the VM's memory on the source.
    fn vm_migrate(&mut self, vm: VmId, target: MachineId) -> Result<()>;

    /// Shut a VM down and detach it from its host
    fn vm_shutdown(&mut self, vm: VmId) -> Result<()>;

    /// Snapshot of one VM's attributes
    fn vm_info(&self, vm: VmId) -> Result<VmSnapshot>;

    /// Requirements of a task
    fn task_info(&self, task: TaskId) -> Result<TaskSpec>;

    /// Percentage of tasks in the class that violated their SLA so far
    fn sla_report(&self, class: SlaClass) -> f64;

    /// Total cluster energy consumed so far, in KW-Hour
    fn cluster_energy(&self) -> f64;
}
