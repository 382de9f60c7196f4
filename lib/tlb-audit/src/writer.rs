use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use crate::{sync_start, CpuId, Machine, RoundSync, TraceWriter, VirtPage};

/// A writer CPU: every round, writes a timestamp per iteration to its stable
/// page and through its dynamic page.
pub struct Writer {
    cpu: CpuId,
    page: VirtPage,
    stable: TraceWriter,
    iterations: usize,
    rounds: u32,
    sync_start: bool,
    sync: Arc<RoundSync>,
}

impl Writer {
    pub(crate) fn new(
        cpu: CpuId,
        page: VirtPage,
        stable: TraceWriter,
        iterations: usize,
        rounds: u32,
        sync_start: bool,
        sync: Arc<RoundSync>,
    ) -> Self {
        Self {
            cpu,
            page,
            stable,
            iterations,
            rounds,
            sync_start,
            sync,
        }
    }

    pub fn cpu(&self) -> CpuId {
        self.cpu
    }

    pub fn page(&self) -> VirtPage {
        self.page
    }

    /// Runs all rounds. Never touches the audit log; cannot detect anything.
    pub fn run<M: Machine>(mut self, machine: &M) {
        let cpu = self.cpu;
        log::debug!(
            "CPU{cpu}: ready, stable frame {:?}, page {:?} @ {:#010x}",
            self.stable.frame(),
            self.page,
            machine.tick()
        );

        for run in 0..self.rounds {
            self.sync.ready.wait(cpu, || machine.cpu_relax());
            // Ticks must not be read ahead of the rendezvous.
            crate::fence(Ordering::Acquire);

            let run_start = if self.sync_start {
                sync_start(machine)
            } else {
                machine.tick()
            };

            for idx in 0..self.iterations {
                let stable = &mut self.stable;
                machine.write_through(cpu, self.page, idx, || {
                    let ts = machine.tick();
                    stable.record(idx, ts);
                    ts
                });
            }

            let run_end = machine.tick();
            log::info!(
                "CPU{cpu}: run {run} {run_start:#x}->{run_end:#x} ({} cycles)",
                run_end - run_start
            );

            // Released by the controller once it has stopped remapping.
            self.sync.complete.wait(cpu, || machine.cpu_relax());
        }
    }
}
