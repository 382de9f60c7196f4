// The controller CPU: remaps every writer's dynamic page back and forth
// while the writers run, then checks where their writes actually landed.
//
// This isn't the recommended way to update a page table (break-before-make
// would let in-flight accesses fault cleanly); it is meant to race.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::Ordering;

use crate::{
    check_frame, check_stable, fence, sync_start, AuditConfig, AuditHistory, AuditLog,
    AuditRecord, CpuId, FlushScope, FrameId, FrameTable, Machine, PageTally, Reporter,
    RoundPhase, RoundSync, VirtPage, CONTROLLER_CPU,
};

/// The controller's view of one writer.
pub(crate) struct WriterSlot {
    pub cpu: CpuId,
    pub page: VirtPage,
    pub stable: FrameId,
    /// `pool[0]` is the page's home frame.
    pub pool: Vec<FrameId>,
    pub audit: AuditLog,
}

impl WriterSlot {
    pub fn home(&self) -> FrameId {
        self.pool[0]
    }

    fn next_frame(&self) -> FrameId {
        let pool_size = self.pool.len() as u64;
        self.pool[((self.audit.remaps() + 1) % pool_size) as usize]
    }

    fn frames(&self) -> impl Iterator<Item = FrameId> + '_ {
        core::iter::once(self.stable).chain(self.pool.iter().copied())
    }
}

/// What one writer's round looked like.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterVerdict {
    pub round: u32,
    pub cpu: CpuId,
    /// Written slots of the stable page.
    pub stable_writes: usize,
    pub iterations: usize,
    /// Dynamic frames, summed.
    pub tally: PageTally,
    pub audited: usize,
    pub remaps: u64,
    /// The audit records came out in time order.
    pub audit_ordered: bool,
}

impl WriterVerdict {
    pub fn lost_writes(&self) -> bool {
        self.stable_writes != self.iterations
    }

    pub fn errors(&self) -> u64 {
        self.tally.weird + self.lost_writes() as u64
    }

    pub fn passed(&self) -> bool {
        self.errors() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.remaps - self.audited as u64
    }
}

#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub rounds: u32,
    /// Remaps done over all rounds, audited or not.
    pub remaps: u64,
    /// One per writer per round, in order.
    pub verdicts: Vec<WriterVerdict>,
}

impl RunSummary {
    pub fn weird(&self) -> u64 {
        self.verdicts.iter().map(|v| v.tally.weird).sum()
    }

    pub fn late(&self) -> u64 {
        self.verdicts.iter().map(|v| v.tally.late).sum()
    }

    /// Writer rounds with missing stable page writes.
    pub fn lost_write_failures(&self) -> usize {
        self.verdicts.iter().filter(|v| v.lost_writes()).count()
    }

    pub fn passed(&self) -> bool {
        self.verdicts.iter().all(WriterVerdict::passed)
    }

    pub fn round(&self, round: u32) -> impl Iterator<Item = &WriterVerdict> + '_ {
        self.verdicts.iter().filter(move |v| v.round == round)
    }
}

pub struct Controller {
    config: AuditConfig,
    frames: Arc<FrameTable>,
    sync: Arc<RoundSync>,
    slots: Vec<WriterSlot>,
    phase: RoundPhase,
}

impl Controller {
    pub(crate) fn new(
        config: AuditConfig,
        frames: Arc<FrameTable>,
        sync: Arc<RoundSync>,
        slots: Vec<WriterSlot>,
    ) -> Self {
        Self {
            config,
            frames,
            sync,
            slots,
            phase: RoundPhase::Setup,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn num_writers(&self) -> usize {
        self.slots.len()
    }

    fn enter(&mut self, phase: RoundPhase) {
        debug_assert_eq!(self.phase.next(), phase);
        log::trace!("CPU{CONTROLLER_CPU}: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Runs all rounds on the calling CPU. Writers must be running (or about
    /// to run) on their own CPUs.
    pub fn run<M: Machine, R: Reporter>(mut self, machine: &M, reporter: &mut R) -> RunSummary {
        log::debug!("CPU{CONTROLLER_CPU}: ready @ {:#010x}", machine.tick());

        let mut summary = RunSummary {
            rounds: self.config.rounds,
            ..Default::default()
        };

        for round in 0..self.config.rounds {
            if round > 0 {
                self.enter(RoundPhase::Setup);
            }

            let run_start = self.open_round(machine);
            self.enter(RoundPhase::WritersActive);

            let remaps = self.remap_until_complete(machine);
            let run_end = machine.tick();
            log::info!(
                "CPU{CONTROLLER_CPU}: run {round} {run_start:#x}->{run_end:#x} ({} cycles, {remaps} flushes)",
                run_end - run_start
            );
            summary.remaps += remaps;

            self.close_round(machine);
            self.enter(RoundPhase::Reconciling);

            for idx in 0..self.slots.len() {
                let verdict = self.audit_writer(round, idx);
                reporter.report(
                    verdict.passed(),
                    format_args!("CPU{}: checked, errors: {}", verdict.cpu, verdict.errors()),
                );
                summary.verdicts.push(verdict);
            }

            self.restore(machine);
            self.enter(RoundPhase::Reported);
        }

        summary
    }

    // Returns the tick the run starts at.
    fn open_round<M: Machine>(&mut self, machine: &M) -> u64 {
        // Writers leave `complete` before coming back to `ready`; once they
        // are all back nobody polls `complete` and it can be reset.
        while !self.sync.ready.is_full_except(CONTROLLER_CPU) {
            machine.cpu_relax();
        }
        self.sync.complete.clear();

        for slot in self.slots.iter_mut() {
            slot.audit.clear();
        }
        fence(Ordering::Release);

        self.sync.ready.wait(CONTROLLER_CPU, || machine.cpu_relax());
        fence(Ordering::Acquire);

        if self.config.sync_start {
            sync_start(machine)
        } else {
            machine.tick()
        }
    }

    // Returns the number of remaps done.
    fn remap_until_complete<M: Machine>(&mut self, machine: &M) -> u64 {
        let num_writers = self.slots.len() as u32;
        let mut passes: u64 = 0;

        loop {
            for idx in 0..self.slots.len() {
                self.remap_one(machine, idx);
            }
            passes += 1;

            if passes >= self.config.remaps_per_round as u64
                && self.sync.complete.weight() >= num_writers
            {
                break;
            }
        }

        passes * num_writers as u64
    }

    fn remap_one<M: Machine>(&mut self, machine: &M, idx: usize) {
        let scope = self.config.flush_scope;
        let slot = &mut self.slots[idx];
        let frame = slot.next_frame();

        let time_before = machine.tick();
        machine.remap(slot.page, frame);
        // Until the invalidation completes, writes may still go to the old frame.
        match scope {
            FlushScope::Page => machine.invalidate_page(slot.page),
            FlushScope::All => machine.invalidate_all(),
        }
        let time_after = machine.tick();

        slot.audit.push(AuditRecord {
            frame,
            time_before,
            time_after,
        });
        fence(Ordering::Release);
    }

    fn close_round<M: Machine>(&mut self, machine: &M) {
        // Every writer is past `ready`, and won't look at it again before
        // `complete` fills up.
        self.sync.ready.clear();
        fence(Ordering::SeqCst);

        self.sync.complete.wait(CONTROLLER_CPU, || machine.cpu_relax());
        fence(Ordering::Acquire);
    }

    fn audit_writer(&self, round: u32, idx: usize) -> WriterVerdict {
        let slot = &self.slots[idx];
        let cpu = slot.cpu;

        let stable_writes = check_stable(self.frames.get(slot.stable));
        if self.config.verbose {
            log::info!("CPU{cpu}: stable frame {:?} {stable_writes} writes", slot.stable);
        }

        let history = AuditHistory {
            home: slot.home(),
            records: slot.audit.records(),
            overflowed: slot.audit.overflowed(),
        };
        let audit_ordered = slot.audit.is_ordered();
        if !audit_ordered {
            log::error!("CPU{cpu}: audit records out of order");
        }
        if self.config.verbose {
            log::info!(
                "CPU{cpu}: {} remaps, final frame {:?}",
                slot.audit.remaps(),
                slot.audit.final_frame(history.home)
            );
        }
        if history.overflowed {
            log::warn!(
                "CPU{cpu}: audit log full, {} of {} remaps not recorded",
                slot.audit.dropped(),
                slot.audit.remaps()
            );
        }

        let mut tally = PageTally::default();
        for frame in slot.pool.iter().copied() {
            let page_tally = check_frame(frame, self.frames.get(frame), &history);
            if self.config.verbose {
                log::info!(
                    "CPU{cpu}: dynamic frame {:?} => {:?} {}/{}/{}/{} (0/OK/L/?) = {} total",
                    frame,
                    history.home,
                    page_tally.empty,
                    page_tally.consistent,
                    page_tally.late,
                    page_tally.weird,
                    page_tally.total()
                );
            } else {
                log::debug!("CPU{cpu}: dynamic frame {:?}: {:?}", frame, page_tally);
            }
            tally += page_tally;
        }

        WriterVerdict {
            round,
            cpu,
            stable_writes,
            iterations: self.config.iterations,
            tally,
            audited: slot.audit.records().len(),
            remaps: slot.audit.remaps(),
            audit_ordered,
        }
    }

    // Puts every dynamic page back on its home frame so no stale mapping
    // leaks into the next round, and zeroes all frames.
    fn restore<M: Machine>(&mut self, machine: &M) {
        for slot in self.slots.iter() {
            machine.remap(slot.page, slot.home());
        }
        machine.invalidate_all();

        for slot in self.slots.iter() {
            for frame in slot.frames() {
                self.frames.get(frame).clear();
            }
        }
        fence(Ordering::SeqCst);
    }
}
