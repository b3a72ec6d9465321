//! End-to-end scenarios for the greedy policy, driven through the
//! simulator-facing entry points against the scripted mock runtime.
//! Floor of 2, MAX_UTIL 1.0, zero VM overhead throughout.

mod common;

use common::{task, MockCluster};
use stratus_core::{
    CpuKind, MachineId, PolicyKind, PowerState, SchedulerConfig, SimTime, SlaClass, VmKind,
};
use stratus_scheduler::Scheduler;

fn config() -> SchedulerConfig {
    SchedulerConfig {
        min_active_machines: 2,
        max_util: 1.0,
        vm_overhead_mb: 0,
        policy: PolicyKind::Greedy,
    }
}

fn t(micros: u64) -> SimTime {
    SimTime(micros)
}

/// Every VM must sit on a machine of its own CPU kind.
fn assert_cpu_compatible(cluster: &MockCluster) {
    for (id, vm) in &cluster.vms {
        if !vm.alive {
            continue;
        }
        let host = vm.host.expect("live VM without host");
        assert_eq!(
            cluster.machines[host.0].cpu, vm.cpu,
            "{id} sits on a CPU-incompatible machine"
        );
    }
}

// A second fitting task reuses the VM on the most utilized fitting host.
#[test]
fn reuse_packs_the_highest_utilization_host() {
    let mut cluster = MockCluster::new();
    cluster.add_machine(CpuKind::X86, false, 100, 0, PowerState::S0);
    cluster.add_machine(CpuKind::X86, false, 100, 0, PowerState::S0);

    let mut sched = Scheduler::new(config());
    sched.init(&mut cluster).unwrap();

    let a = cluster.add_task(task(CpuKind::X86, VmKind::Linux, 40, SlaClass::Sla2));
    sched.new_task(&mut cluster, t(1), a).unwrap();
    // Tie between the empty machines breaks to the lowest id.
    assert_eq!(cluster.used(0), 40);
    assert_eq!(cluster.used(1), 0);
    assert_eq!(sched.live_vms().len(), 1);

    let b = cluster.add_task(task(CpuKind::X86, VmKind::Linux, 30, SlaClass::Sla2));
    sched.new_task(&mut cluster, t(2), b).unwrap();
    // B reuses the existing VM rather than spreading.
    assert_eq!(cluster.used(0), 70);
    assert_eq!(cluster.used(1), 0);
    assert_eq!(sched.live_vms().len(), 1);
    assert_cpu_compatible(&cluster);
}

// With every stable machine full, the task is queued behind a wake-up
// and placed when the standby machine comes up.
#[test]
fn wake_path_places_queued_task_on_drain() {
    let mut cluster = MockCluster::new();
    cluster.add_machine(CpuKind::X86, false, 10, 10, PowerState::S0);
    cluster.add_machine(CpuKind::X86, false, 10, 10, PowerState::S0);
    let m2 = cluster.add_machine(CpuKind::X86, false, 100, 0, PowerState::S5);

    let mut sched = Scheduler::new(config());
    sched.init(&mut cluster).unwrap();

    let a = cluster.add_task(task(CpuKind::X86, VmKind::Linux, 5, SlaClass::Sla1));
    sched.new_task(&mut cluster, t(1), a).unwrap();

    assert_eq!(cluster.state_requests_for(m2), vec![PowerState::S0]);
    assert_eq!(sched.pending_transitions(m2), 1);
    assert_eq!(sched.queued_tasks().collect::<Vec<_>>(), vec![a]);
    // Nothing was placed while the machine is unstable.
    assert_eq!(sched.live_vms().len(), 0);

    cluster.finish_transition(m2);
    sched.state_change_complete(&mut cluster, t(2), m2).unwrap();

    assert_eq!(sched.pending_transitions(m2), 0);
    assert_eq!(sched.queued_tasks().count(), 0);
    assert_eq!(cluster.used(2), 5);
    assert_eq!(sched.live_vms().len(), 1);
    assert_cpu_compatible(&cluster);
}

// Machines that empty out on task completion are powered off; floor
// machines never are.
#[test]
fn consolidation_powers_off_emptied_machines() {
    let mut cluster = MockCluster::new();
    // Floor machines carry a different CPU so the work lands above the floor.
    cluster.add_machine(CpuKind::Arm, false, 100, 0, PowerState::S0);
    cluster.add_machine(CpuKind::Arm, false, 100, 0, PowerState::S0);
    let m2 = cluster.add_machine(CpuKind::X86, false, 100, 0, PowerState::S5);
    let m3 = cluster.add_machine(CpuKind::Power, false, 100, 0, PowerState::S5);

    let mut sched = Scheduler::new(config());
    sched.init(&mut cluster).unwrap();
    // Machines 2 and 3 were woken earlier in the run and are now stable.
    cluster.machines[2].s_state = PowerState::S0;
    cluster.machines[3].s_state = PowerState::S0;

    let a = cluster.add_task(task(CpuKind::X86, VmKind::Linux, 10, SlaClass::Sla2));
    let b = cluster.add_task(task(CpuKind::Power, VmKind::Linux, 10, SlaClass::Sla2));
    sched.new_task(&mut cluster, t(1), a).unwrap();
    sched.new_task(&mut cluster, t(1), b).unwrap();
    assert_eq!(cluster.used(2), 10);
    assert_eq!(cluster.used(3), 10);

    cluster.finish_task(a);
    sched.task_complete(&mut cluster, t(2), a).unwrap();
    assert_eq!(cluster.state_requests_for(m2), vec![PowerState::S5]);

    cluster.finish_task(b);
    sched.task_complete(&mut cluster, t(3), b).unwrap();
    assert_eq!(cluster.state_requests_for(m3), vec![PowerState::S5]);

    // The warm pool is never powered off.
    assert!(cluster.state_requests_for(MachineId(0)).is_empty());
    assert!(cluster.state_requests_for(MachineId(1)).is_empty());
}

// Projected accounting reflects an issued migration immediately; the
// runtime's own figures take over identically at completion.
#[test]
fn migration_bookkeeping_stays_projected_until_done() {
    let mut cluster = MockCluster::new();
    cluster.add_machine(CpuKind::Arm, false, 100, 0, PowerState::S0);
    cluster.add_machine(CpuKind::Arm, false, 100, 0, PowerState::S0);
    let m2 = cluster.add_machine(CpuKind::X86, false, 100, 0, PowerState::S5);
    // Machine 3 starts full so placement pins the VM to machine 2.
    let m3 = cluster.add_machine(CpuKind::X86, false, 100, 100, PowerState::S5);

    let mut sched = Scheduler::new(config());
    sched.init(&mut cluster).unwrap();
    // Both working machines were woken earlier in the run.
    cluster.machines[2].s_state = PowerState::S0;
    cluster.machines[3].s_state = PowerState::S0;

    let a = cluster.add_task(task(CpuKind::X86, VmKind::Linux, 10, SlaClass::Sla2));
    sched.new_task(&mut cluster, t(1), a).unwrap();
    assert_eq!(cluster.used(2), 10);
    let vm = sched.live_vms()[0];

    // External load on machine 3 drains to 40 MB; a short-lived second task
    // then triggers consolidation, packing machine 2 (10%) onto machine 3
    // (40%).
    cluster.machines[3].memory_used_mb = 40;
    let b = cluster.add_task(task(CpuKind::X86, VmKind::Linux, 5, SlaClass::Sla3));
    sched.new_task(&mut cluster, t(2), b).unwrap();
    cluster.finish_task(b);
    sched.task_complete(&mut cluster, t(3), b).unwrap();

    let pending: Vec<_> = sched.pending_migrations().copied().collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].vm, vm);
    assert_eq!(pending[0].source, m2);
    assert_eq!(pending[0].target, m3);
    assert_eq!(pending[0].memory_mb, 10);

    // The runtime still accounts the VM on the source until completion.
    assert_eq!(cluster.used(2), 10);
    assert_eq!(cluster.used(3), 40);
    // The emptied-by-projection source is already being powered off.
    assert_eq!(cluster.state_requests_for(m2), vec![PowerState::S5]);

    cluster.finish_migration(vm);
    sched.migration_done(&mut cluster, t(4), vm).unwrap();

    assert_eq!(sched.pending_migrations().count(), 0);
    assert_eq!(cluster.used(2), 0);
    assert_eq!(cluster.used(3), 50);
    assert_cpu_compatible(&cluster);
}

// An SLA warning re-homes the task onto the least loaded running host.
#[test]
fn sla_warning_moves_task_to_emptier_host() {
    let mut cluster = MockCluster::new();
    cluster.add_machine(CpuKind::X86, false, 100, 0, PowerState::S0);
    cluster.add_machine(CpuKind::X86, false, 100, 0, PowerState::S0);

    let mut sched = Scheduler::new(config());
    sched.init(&mut cluster).unwrap();

    let task_t = cluster.add_task(task(CpuKind::X86, VmKind::Linux, 95, SlaClass::Sla0));
    sched.new_task(&mut cluster, t(1), task_t).unwrap();
    assert_eq!(cluster.used(0), 95);
    assert_eq!(cluster.used(1), 0);

    sched.sla_warning(&mut cluster, t(2), task_t).unwrap();
    assert_eq!(cluster.used(0), 0);
    assert_eq!(cluster.used(1), 95);
    assert_cpu_compatible(&cluster);
}

// A second arrival while the standby machine is waking queues behind
// the same wake-up instead of issuing another one.
#[test]
fn no_duplicate_wakeups_while_machine_is_waking() {
    let mut cluster = MockCluster::new();
    cluster.add_machine(CpuKind::X86, false, 100, 100, PowerState::S0);
    cluster.add_machine(CpuKind::X86, false, 100, 100, PowerState::S0);
    let m2 = cluster.add_machine(CpuKind::X86, false, 100, 0, PowerState::S5);

    let mut sched = Scheduler::new(config());
    sched.init(&mut cluster).unwrap();

    let a = cluster.add_task(task(CpuKind::X86, VmKind::Linux, 5, SlaClass::Sla1));
    let b = cluster.add_task(task(CpuKind::X86, VmKind::Linux, 5, SlaClass::Sla1));

    sched.new_task(&mut cluster, t(1), a).unwrap();
    assert_eq!(sched.pending_transitions(m2), 1);

    sched.new_task(&mut cluster, t(2), b).unwrap();
    // Still exactly one wake-up in flight, both tasks queued behind it.
    assert_eq!(cluster.state_requests_for(m2), vec![PowerState::S0]);
    assert_eq!(sched.pending_transitions(m2), 1);
    assert_eq!(sched.queued_tasks().collect::<Vec<_>>(), vec![a, b]);

    cluster.finish_transition(m2);
    sched.state_change_complete(&mut cluster, t(3), m2).unwrap();

    assert_eq!(sched.queued_tasks().count(), 0);
    assert_eq!(cluster.used(2), 10);
    // A fits on the fresh VM and B reuses it.
    assert_eq!(sched.live_vms().len(), 1);
    assert_cpu_compatible(&cluster);
}
