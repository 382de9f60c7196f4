use core::sync::atomic::Ordering;

use crate::{CpuMask, Machine};

#[inline(never)]
pub fn fence(order: Ordering) {
    core::sync::atomic::compiler_fence(order);
    core::sync::atomic::fence(order);
}

/// The two rendezvous points of a round.
///
/// `ready` opens a round: writers mark themselves present and spin until the
/// controller does too. `complete` closes it: writers mark themselves done
/// and spin until the controller has stopped remapping. Only the controller
/// clears either mask, and only when nobody can be polling it.
pub struct RoundSync {
    pub ready: CpuMask,
    pub complete: CpuMask,
}

impl RoundSync {
    pub fn new(num_cpus: usize) -> Self {
        Self {
            ready: CpuMask::new(num_cpus),
            complete: CpuMask::new(num_cpus),
        }
    }
}

/// Where the controller is within a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundPhase {
    Setup,
    WritersActive,
    Reconciling,
    Reported,
}

impl RoundPhase {
    pub fn next(self) -> Self {
        match self {
            Self::Setup => Self::WritersActive,
            Self::WritersActive => Self::Reconciling,
            Self::Reconciling => Self::Reported,
            Self::Reported => Self::Setup,
        }
    }
}

/// Spins until the tick counter crosses the next gate boundary, so that CPUs
/// leaving a rendezvous at slightly different times start work together.
pub fn sync_start<M: Machine>(machine: &M) -> u64 {
    const GATE_MASK: u64 = !0x7ff;

    let gate = machine.tick() & GATE_MASK;
    loop {
        let now = machine.tick();
        if now & GATE_MASK != gate {
            return now;
        }
    }
}
