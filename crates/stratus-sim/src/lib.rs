//! Stratus Sim
//!
//! Reference discrete-event simulator for exercising the Stratus scheduler.
//! Models machines with power-transition latency, VMs with migration
//! latency, per-class SLA measurement and cluster energy accounting, and
//! drives the scheduler through its nine entry points.

pub mod cluster;
pub mod engine;
pub mod workload;

pub use cluster::{SimCluster, SimMachine};
pub use engine::{SimEvent, SimulationEngine};
pub use workload::{ClusterShape, WorkloadGenerator};
