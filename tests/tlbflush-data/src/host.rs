//! Runs the test on host threads: one thread per writer CPU, the controller
//! on the calling thread, all sharing one software MMU.
use tlb_audit::{LogReporter, Reporter, RunSummary, Setup, SoftMmu};

use crate::config::RunConfig;

pub struct RunOutcome {
    pub summary: RunSummary,
    /// 0 if every writer passed every round.
    pub exit_code: i32,
}

pub fn run(config: &RunConfig) -> anyhow::Result<RunOutcome> {
    config.validate()?;

    let setup = Setup::new(config.audit.clone(), config.num_writers())?;
    // Writer threads get preempted; spinning CPUs must let them run.
    let mut mmu = SoftMmu::new(
        setup.frames(),
        &setup.initial_mappings(),
        setup.num_cpus(),
        config.flush_mode,
    )
    .with_relax(std::thread::yield_now);
    if config.lockstep {
        mmu = mmu.with_lockstep();
    }

    log::info!(
        "tlbflush-data: {} writers, {} rounds x {} iterations, pool {}, flush {} ({:?}){}",
        config.num_writers(),
        config.audit.rounds,
        config.audit.iterations,
        config.audit.pool_size,
        config.audit.flush_scope.as_str(),
        mmu.flush_mode(),
        if mmu.lockstep() { ", lockstep" } else { "" },
    );

    let (controller, writers) = setup.into_roles();
    let mut reporter = LogReporter::new(config.audit.report_prefix());

    let summary = std::thread::scope(|s| {
        for writer in writers {
            let mmu = &mmu;
            s.spawn(move || writer.run(mmu));
        }
        controller.run(&mmu, &mut reporter)
    });

    log::info!(
        "tlbflush-data: {} remaps ({} invalidations), {} weird, {} late, {} rounds with lost writes",
        summary.remaps,
        mmu.invalidations(),
        summary.weird(),
        summary.late(),
        summary.lost_write_failures(),
    );

    let exit_code = reporter.summary();
    Ok(RunOutcome { summary, exit_code })
}
