//! Error types for Stratus

use crate::types::{MachineId, TaskId, VmId};
use thiserror::Error;

/// Result type for scheduler and runtime operations
pub type Result<T> = std::result::Result<T, StratusError>;

/// Errors that can occur while scheduling or talking to the runtime
#[derive(Error, Debug)]
pub enum StratusError {
    /// No machine with a matching CPU exists anywhere in the cluster, or
    /// nothing can be woken. Fatal for the affected task.
    #[error("unsatisfiable placement for {task}: no compatible host")]
    UnsatisfiablePlacement { task: TaskId },

    /// The runtime was asked about a machine outside `[0, machine_count)`
    #[error("machine {0} out of range")]
    MachineOutOfRange(MachineId),

    /// The runtime was asked about a VM it does not know
    #[error("unknown VM {0}")]
    UnknownVm(VmId),

    /// The runtime was asked about a task it does not know
    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    /// A VM operation was rejected because a migration is in flight
    #[error("{vm} is migrating and cannot be {operation}")]
    VmMigrating { vm: VmId, operation: &'static str },

    /// The runtime rejected an operation for its own reasons
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl StratusError {
    /// Create a runtime error from anything displayable
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
