// CPU masks used as spin rendezvous points.

use core::sync::atomic::*;

pub type CpuId = u32;

/// The controller is always CPU 0; writers are CPUs 1..num_cpus.
pub const CONTROLLER_CPU: CpuId = 0;

// We use u64 as cpumask, so we don't support more than 64 CPUs.
pub const MAX_CPUS: usize = 64;

/// A set of CPUs that have reached some point.
///
/// Each CPU only ever sets or clears its own bit, so no lock is needed.
/// Setting a bit is a release, testing for fullness is an acquire: whatever a
/// CPU wrote before arriving is visible to whoever observes the mask full.
pub struct CpuMask {
    bits: AtomicU64,
    full: u64,
}

impl CpuMask {
    pub const fn new(num_cpus: usize) -> Self {
        assert!(num_cpus > 0 && num_cpus <= MAX_CPUS);
        let full = if num_cpus == MAX_CPUS {
            u64::MAX
        } else {
            (1_u64 << num_cpus) - 1
        };

        Self {
            bits: AtomicU64::new(0),
            full,
        }
    }

    fn bit(&self, cpu: CpuId) -> u64 {
        let bit = 1_u64 << cpu;
        debug_assert_ne!(0, bit & self.full, "cpu {cpu} is not a participant");
        bit
    }

    pub fn mark_present(&self, cpu: CpuId) {
        self.bits.fetch_or(self.bit(cpu), Ordering::Release);
    }

    pub fn is_full(&self) -> bool {
        self.bits.load(Ordering::Acquire) == self.full
    }

    /// True if everyone but `cpu` is present.
    pub fn is_full_except(&self, cpu: CpuId) -> bool {
        (self.bits.load(Ordering::Acquire) | self.bit(cpu)) == self.full
    }

    pub fn weight(&self) -> u32 {
        self.bits.load(Ordering::Acquire).count_ones()
    }

    /// Must not race with anyone polling the mask.
    pub fn clear(&self) {
        self.bits.store(0, Ordering::Release);
    }

    /// Marks `cpu` present and spins until everyone is.
    pub fn wait<F: Fn()>(&self, cpu: CpuId, relax: F) {
        self.mark_present(cpu);
        while !self.is_full() {
            relax();
        }
    }
}
