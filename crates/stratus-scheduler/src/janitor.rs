//! Periodic janitor: the tick path
//!
//! On every tick, VMs whose task set has emptied are shut down, and a
//! machine left with no resident VMs is powered off, subject to the
//! warm-pool floor. A VM mid-migration is never shut down in this pass.
//! Whether the machine really emptied is re-checked quietly from the
//! scheduler's own post-shutdown view; a machine that still hosts VMs is
//! simply left on.

use tracing::{debug, info};

use crate::scheduler::Scheduler;
use stratus_core::{ClusterRuntime, PowerState, Result};

impl Scheduler {
    pub(crate) fn periodic_check(&mut self, rt: &mut dyn ClusterRuntime) -> Result<()> {
        let machines = self.inventory.machines().to_vec();
        for machine in machines {
            let snapshot = rt.machine_info(machine)?;
            if snapshot.s_state != PowerState::S0 || self.transitions.pending(machine) > 0 {
                continue;
            }

            let mut remaining = 0usize;
            for vm in self.vms_on(rt, machine)? {
                if self.migrations.is_migrating(vm) {
                    remaining += 1;
                    continue;
                }
                if rt.vm_info(vm)?.tasks.is_empty() {
                    rt.vm_shutdown(vm)?;
                    self.inventory.remove_vm(vm);
                    debug!(%vm, %machine, "shut down idle VM");
                } else {
                    remaining += 1;
                }
            }

            if remaining == 0 && machine.0 >= self.config.min_active_machines {
                self.transition(rt, machine, PowerState::S5)?;
                info!(%machine, "powering off idle machine");
            }
        }
        Ok(())
    }
}
