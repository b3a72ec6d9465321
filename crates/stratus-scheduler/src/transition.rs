//! Pending power-state transition bookkeeping
//!
//! Power transitions are asynchronous and slow. Without this tracker the
//! engine could enqueue a second wake-up for a machine that is already
//! waking, or try to shut down a machine mid-wake. A machine is *stable*
//! only when its reported state is S0 and no transition is in flight.

use stratus_core::{MachineId, MachineSnapshot, PowerState};

/// Per-machine counters of power-state change requests that have not yet
/// been reported complete.
#[derive(Debug, Default)]
pub struct TransitionTracker {
    pending: Vec<u32>,
}

impl TransitionTracker {
    pub fn new(machine_count: usize) -> Self {
        TransitionTracker {
            pending: vec![0; machine_count],
        }
    }

    /// Record that a state change was requested for `machine`
    pub fn request(&mut self, machine: MachineId) {
        if let Some(count) = self.pending.get_mut(machine.0) {
            *count += 1;
        }
    }

    /// Record a state-change-complete report. Returns `false` for a spurious
    /// report (counter already zero); the counter never goes negative.
    pub fn complete(&mut self, machine: MachineId) -> bool {
        match self.pending.get_mut(machine.0) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Number of transitions in flight for `machine`
    pub fn pending(&self, machine: MachineId) -> u32 {
        self.pending.get(machine.0).copied().unwrap_or(0)
    }

    /// A machine is stable iff it reports S0 and has no transition in flight
    pub fn is_stable(&self, snapshot: &MachineSnapshot) -> bool {
        snapshot.s_state == PowerState::S0 && self.pending(snapshot.id) == 0
    }
}
