//! Core types shared across Stratus components

use serde::{Deserialize, Serialize};

/// Identifier of a physical machine, a small integer in `[0, machine_count)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineId(pub usize);

impl std::fmt::Display for MachineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Identifier of a scheduler-owned virtual machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VmId(pub u64);

impl std::fmt::Display for VmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vm{}", self.0)
    }
}

/// Identifier of a simulator-owned task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Simulated time in microseconds, monotonically nondecreasing across events
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub fn saturating_add(self, micros: u64) -> SimTime {
        SimTime(self.0.saturating_add(micros))
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// CPU architecture of a machine or required by a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuKind {
    Arm,
    Power,
    Riscv,
    X86,
}

/// Kind of virtual machine a task requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmKind {
    Aix,
    Linux,
    LinuxRt,
    Win,
}

/// Service-level agreement class, strictest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SlaClass {
    Sla0,
    Sla1,
    Sla2,
    Sla3,
}

impl SlaClass {
    /// Admission priority derived from the SLA class
    pub fn priority(self) -> Priority {
        match self {
            SlaClass::Sla0 => Priority::High,
            SlaClass::Sla1 => Priority::Mid,
            SlaClass::Sla2 | SlaClass::Sla3 => Priority::Low,
        }
    }
}

impl std::fmt::Display for SlaClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlaClass::Sla0 => write!(f, "SLA0"),
            SlaClass::Sla1 => write!(f, "SLA1"),
            SlaClass::Sla2 => write!(f, "SLA2"),
            SlaClass::Sla3 => write!(f, "SLA3"),
        }
    }
}

/// Task admission priority passed to the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Mid,
    Low,
}

/// ACPI-style machine power state. The scheduler only ever requests S0 and
/// S5; reports may carry any intermediate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    S0,
    S0i1,
    S1,
    S2,
    S3,
    S4,
    S5,
}

/// Static and runtime attributes of a machine, as reported by the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub id: MachineId,
    pub cpu: CpuKind,
    pub gpus: bool,
    /// Installed memory in MB
    pub memory_mb: u64,
    /// Memory currently committed in MB, as the runtime accounts it
    pub memory_used_mb: u64,
    pub s_state: PowerState,
    pub active_vms: usize,
    pub active_tasks: usize,
}

impl MachineSnapshot {
    /// Fraction of installed memory currently committed
    pub fn utilization(&self) -> f64 {
        if self.memory_mb == 0 {
            0.0
        } else {
            self.memory_used_mb as f64 / self.memory_mb as f64
        }
    }
}

/// Attributes of a live VM, as reported by the runtime. While a migration is
/// in flight, `host` remains the source machine until completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSnapshot {
    pub id: VmId,
    pub vm_kind: VmKind,
    pub cpu: CpuKind,
    pub host: MachineId,
    pub tasks: Vec<TaskId>,
}

/// Requirements of a task, queried from the runtime. Read-only to the
/// scheduler; only the task's placement ever changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskSpec {
    pub vm_kind: VmKind,
    pub cpu: CpuKind,
    pub gpu_capable: bool,
    pub memory_mb: u64,
    pub sla: SlaClass,
}
