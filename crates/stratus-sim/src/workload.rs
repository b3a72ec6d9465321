//! Synthetic cluster and workload generation
//!
//! Machine kinds are assigned deterministically from the machine index so
//! that task CPU requirements can be drawn from kinds that actually exist
//! in the cluster. Task attributes come from a seeded RNG, so a run is
//! reproducible from its seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal};

use crate::cluster::SimCluster;
use stratus_core::{CpuKind, Result, SimTime, SlaClass, StratusError, TaskId, TaskSpec, VmKind};

/// Shape of the simulated cluster
#[derive(Debug, Clone)]
pub struct ClusterShape {
    pub machines: usize,
    pub memory_mb: u64,
}

impl Default for ClusterShape {
    fn default() -> Self {
        ClusterShape {
            machines: 32,
            memory_mb: 16_384,
        }
    }
}

/// CPU kind for a machine index: mostly x86 with a Power and an ARM slice
fn cpu_for_index(index: usize) -> CpuKind {
    match index % 10 {
        8 => CpuKind::Power,
        9 => CpuKind::Arm,
        _ => CpuKind::X86,
    }
}

/// Every fifth machine carries GPUs
fn gpus_for_index(index: usize) -> bool {
    index % 5 == 0
}

/// Build the simulated cluster for a shape
pub fn build_cluster(shape: &ClusterShape, vm_overhead_mb: u64) -> SimCluster {
    let mut cluster = SimCluster::new(vm_overhead_mb);
    for i in 0..shape.machines {
        cluster.add_machine(cpu_for_index(i), gpus_for_index(i), shape.memory_mb);
    }
    cluster
}

/// A generated task ready to feed into the engine
#[derive(Debug, Clone)]
pub struct GeneratedTask {
    pub id: TaskId,
    pub spec: TaskSpec,
    pub arrival: SimTime,
    pub duration_us: u64,
}

/// Seeded task generator
pub struct WorkloadGenerator {
    rng: StdRng,
    machine_count: usize,
    /// Log-normal durations: lots of short tasks, a long tail
    duration_dist: LogNormal<f64>,
}

impl WorkloadGenerator {
    pub fn new(seed: u64, machine_count: usize) -> Result<Self> {
        let duration_dist = LogNormal::new(0.0, 0.8)
            .map_err(|err| StratusError::config(format!("log-normal duration parameters: {err}")))?;
        Ok(WorkloadGenerator {
            rng: StdRng::seed_from_u64(seed),
            machine_count,
            duration_dist,
        })
    }

    /// Generate `count` tasks arriving over the first 80% of the horizon
    pub fn generate(&mut self, count: usize, horizon: SimTime) -> Vec<GeneratedTask> {
        let arrival_window = (horizon.0 as f64) * 0.8;

        (0..count)
            .map(|i| {
                let arrival = SimTime((self.rng.gen::<f64>() * arrival_window) as u64);
                let duration_secs: f64 = self.duration_dist.sample(&mut self.rng);
                let duration_us = ((duration_secs * 1_000_000.0) as u64).clamp(100_000, 60_000_000);

                // Draw the CPU from a machine index so the requirement is
                // always satisfiable somewhere in the cluster. GPU tasks
                // must land on GPU machines, which are all x86 here.
                let cpu = cpu_for_index(self.rng.gen_range(0..self.machine_count));
                let gpu_capable = self.machine_count >= 5 && self.rng.gen::<f64>() < 0.1;
                let cpu = if gpu_capable { CpuKind::X86 } else { cpu };

                let sla = match self.rng.gen_range(0..10) {
                    0 => SlaClass::Sla0,
                    1 | 2 => SlaClass::Sla1,
                    3..=5 => SlaClass::Sla2,
                    _ => SlaClass::Sla3,
                };
                let vm_kind = match self.rng.gen_range(0..10) {
                    0 => VmKind::Win,
                    1 => VmKind::Aix,
                    2 => VmKind::LinuxRt,
                    _ => VmKind::Linux,
                };

                GeneratedTask {
                    id: TaskId(i as u64),
                    spec: TaskSpec {
                        vm_kind,
                        cpu,
                        gpu_capable,
                        memory_mb: self.rng.gen_range(256..4096),
                        sla,
                    },
                    arrival,
                    duration_us,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::ClusterRuntime;

    #[test]
    fn test_generation_is_deterministic_per_seed() {
        let horizon = SimTime(600_000_000);
        let a = WorkloadGenerator::new(7, 32).unwrap().generate(50, horizon);
        let b = WorkloadGenerator::new(7, 32).unwrap().generate(50, horizon);

        assert_eq!(a.len(), 50);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.arrival, y.arrival);
            assert_eq!(x.duration_us, y.duration_us);
            assert_eq!(x.spec.memory_mb, y.spec.memory_mb);
            assert_eq!(x.spec.cpu, y.spec.cpu);
        }
    }

    #[test]
    fn test_task_cpus_exist_in_cluster() {
        let shape = ClusterShape {
            machines: 8,
            memory_mb: 4096,
        };
        let cluster = build_cluster(&shape, 8);
        assert_eq!(cluster.machine_count(), 8);

        // With eight machines the index formula yields only x86.
        let tasks = WorkloadGenerator::new(3, shape.machines)
            .unwrap()
            .generate(40, SimTime(600_000_000));
        for task in &tasks {
            assert_eq!(task.spec.cpu, CpuKind::X86);
        }
    }

    #[test]
    fn test_durations_are_clamped() {
        let tasks = WorkloadGenerator::new(11, 32)
            .unwrap()
            .generate(200, SimTime(600_000_000));
        for task in &tasks {
            assert!(task.duration_us >= 100_000);
            assert!(task.duration_us <= 60_000_000);
        }
    }
}
