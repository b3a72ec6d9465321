//! Discrete-event engine
//!
//! A min-heap of timed events drives the scheduler through its entry
//! points. Runtime requests that complete later (transitions, migrations,
//! task completions, warnings) surface as new events via the cluster's
//! outbox after every dispatch.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::cluster::SimCluster;
use stratus_core::{MachineId, Result, SchedulerConfig, SimTime, TaskId, TaskSpec, VmId};
use stratus_scheduler::{FinalReport, Scheduler};

/// Everything the simulator can deliver to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    TaskArrival(TaskId),
    TaskCompletion(TaskId),
    MigrationDone(VmId),
    StateChangeComplete(MachineId),
    MemoryWarning(MachineId),
    SlaWarning(TaskId),
    PeriodicTick,
    SimulationEnd,
}

/// Heap entry ordering by time, earliest first; the sequence number keeps
/// same-time events in insertion order.
#[derive(Debug, Clone)]
struct TimedEvent {
    time: SimTime,
    seq: u64,
    event: SimEvent,
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for min-heap (BinaryHeap is max-heap by default)
        (other.time, other.seq).cmp(&(self.time, self.seq))
    }
}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for TimedEvent {}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

/// Owns the cluster, the scheduler and the event queue for one run
pub struct SimulationEngine {
    cluster: SimCluster,
    scheduler: Scheduler,
    queue: BinaryHeap<TimedEvent>,
    seq: u64,
    horizon: SimTime,
    tick_interval_us: u64,
}

impl SimulationEngine {
    pub fn new(
        cluster: SimCluster,
        config: SchedulerConfig,
        horizon: SimTime,
        tick_interval_us: u64,
    ) -> Self {
        SimulationEngine {
            cluster,
            scheduler: Scheduler::new(config),
            queue: BinaryHeap::new(),
            seq: 0,
            horizon,
            tick_interval_us,
        }
    }

    pub fn schedule(&mut self, time: SimTime, event: SimEvent) {
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(TimedEvent { time, seq, event });
    }

    /// Register a task and schedule its arrival
    pub fn add_task(&mut self, task: TaskId, spec: TaskSpec, arrival: SimTime, duration_us: u64) {
        self.cluster.insert_task(task, spec, arrival, duration_us);
        self.schedule(arrival, SimEvent::TaskArrival(task));
    }

    pub fn cluster(&self) -> &SimCluster {
        &self.cluster
    }

    /// Run to the horizon and return the final report
    pub fn run(&mut self) -> Result<FinalReport> {
        self.scheduler.init(&mut self.cluster)?;
        self.pump_outbox();

        if self.tick_interval_us > 0 && self.tick_interval_us < self.horizon.0 {
            self.schedule(SimTime(self.tick_interval_us), SimEvent::PeriodicTick);
        }
        self.schedule(self.horizon, SimEvent::SimulationEnd);

        while let Some(entry) = self.queue.pop() {
            if entry.time > self.horizon {
                continue;
            }
            let now = entry.time;
            self.cluster.advance(now);
            debug!(%now, event = ?entry.event, "dispatching");

            match entry.event {
                SimEvent::TaskArrival(task) => {
                    self.scheduler.new_task(&mut self.cluster, now, task)?;
                }
                SimEvent::TaskCompletion(task) => {
                    self.cluster.complete_task(task);
                    self.scheduler.task_complete(&mut self.cluster, now, task)?;
                }
                SimEvent::MigrationDone(vm) => {
                    self.cluster.apply_migration(vm);
                    self.scheduler.migration_done(&mut self.cluster, now, vm)?;
                }
                SimEvent::StateChangeComplete(machine) => {
                    self.cluster.apply_state_change(machine);
                    self.scheduler
                        .state_change_complete(&mut self.cluster, now, machine)?;
                }
                SimEvent::MemoryWarning(machine) => {
                    self.scheduler.memory_warning(&mut self.cluster, now, machine)?;
                }
                SimEvent::SlaWarning(task) => {
                    self.scheduler.sla_warning(&mut self.cluster, now, task)?;
                }
                SimEvent::PeriodicTick => {
                    self.scheduler.periodic_tick(&mut self.cluster, now)?;
                    let next = now.saturating_add(self.tick_interval_us);
                    if next < self.horizon {
                        self.schedule(next, SimEvent::PeriodicTick);
                    }
                }
                SimEvent::SimulationEnd => {
                    return self.scheduler.simulation_complete(&mut self.cluster, now);
                }
            }
            self.pump_outbox();
        }

        // Unreachable with the end event on the queue, but don't panic.
        let now = self.cluster.now();
        self.scheduler.simulation_complete(&mut self.cluster, now)
    }

    fn pump_outbox(&mut self) {
        for (time, event) in self.cluster.take_outbox() {
            self.schedule(time, event);
        }
    }
}
