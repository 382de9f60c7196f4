//! A software MMU: page table, per-CPU TLBs and a global tick counter.
//!
//! A CPU writing through a virtual page first looks its TLB up and, on a
//! miss, walks the page table and caches the result. Nothing but
//! `invalidate` evicts a cached translation, so after a `remap` CPUs keep
//! writing to the old frame until the page is invalidated, as on hardware.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::*;

use crate::{CpuId, FrameId, FrameTable, Machine, VirtPage};

/// Whether `invalidate` does its job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushMode {
    Honor,
    /// `invalidate` is a no-op: translations are never evicted.
    Ignore,
}

// A TLB entry: generation in the high half, frame (or NO_FRAME) in the low
// half. Eviction bumps the generation, so a fill that raced with an eviction
// fails instead of caching a translation that was already invalidated.
const NO_FRAME: u64 = u32::MAX as u64;
const GENERATION_ONE: u64 = 1 << 32;

fn entry_frame(entry: u64) -> Option<FrameId> {
    let frame = entry & NO_FRAME;
    if frame == NO_FRAME {
        None
    } else {
        Some(FrameId(frame as usize))
    }
}

fn evicted(entry: u64) -> u64 {
    ((entry & !NO_FRAME).wrapping_add(GENERATION_ONE)) | NO_FRAME
}

struct SoftTlb {
    entries: Box<[AtomicU64]>,
    // Per page: the remap count this CPU last accessed it at (lockstep).
    seen_remaps: Box<[AtomicU64]>,
    // Odd while the CPU is between looking a translation up and finishing
    // the store through it.
    access_seq: AtomicU64,
}

impl SoftTlb {
    fn new(num_pages: usize) -> Self {
        let mut entries = Vec::with_capacity(num_pages);
        entries.resize_with(num_pages, || AtomicU64::new(NO_FRAME));
        let mut seen_remaps = Vec::with_capacity(num_pages);
        seen_remaps.resize_with(num_pages, || AtomicU64::new(0));
        Self {
            entries: entries.into_boxed_slice(),
            seen_remaps: seen_remaps.into_boxed_slice(),
            access_seq: AtomicU64::new(0),
        }
    }

    fn evict(&self, page: VirtPage) {
        let _ = self.entries[page.0].fetch_update(Ordering::SeqCst, Ordering::SeqCst, |entry| {
            Some(evicted(entry))
        });
    }

    fn evict_all(&self) {
        for idx in 0..self.entries.len() {
            self.evict(VirtPage(idx));
        }
    }
}

pub struct SoftMmu {
    frames: Arc<FrameTable>,
    page_table: Box<[AtomicUsize]>,
    // Per page: how many times it was remapped.
    remaps: Box<[AtomicU64]>,
    tlbs: Box<[SoftTlb]>,
    clock: AtomicU64,
    flush_mode: FlushMode,
    invalidations: AtomicU64,
    lockstep: bool,
    relax: fn(),
}

impl SoftMmu {
    /// `mappings[page]` is the frame `VirtPage(page)` initially maps to.
    pub fn new(
        frames: Arc<FrameTable>,
        mappings: &[FrameId],
        num_cpus: usize,
        flush_mode: FlushMode,
    ) -> Self {
        assert!(frames.len() < NO_FRAME as usize);
        for frame in mappings {
            assert!(frame.0 < frames.len());
        }

        let page_table: Vec<AtomicUsize> = mappings
            .iter()
            .map(|frame| AtomicUsize::new(frame.0))
            .collect();
        let remaps: Vec<AtomicU64> = mappings.iter().map(|_| AtomicU64::new(0)).collect();
        let tlbs: Vec<SoftTlb> = (0..num_cpus).map(|_| SoftTlb::new(mappings.len())).collect();

        Self {
            frames,
            page_table: page_table.into_boxed_slice(),
            remaps: remaps.into_boxed_slice(),
            tlbs: tlbs.into_boxed_slice(),
            clock: AtomicU64::new(0),
            flush_mode,
            invalidations: AtomicU64::new(0),
            lockstep: false,
            relax: core::hint::spin_loop,
        }
    }

    /// What spinning CPUs do between polls; hosts where "CPUs" are
    /// preemptible threads should yield here.
    pub fn with_relax(mut self, relax: fn()) -> Self {
        self.relax = relax;
        self
    }

    /// Every access through a page waits until the page has been remapped
    /// since the CPU's previous access to it. Guarantees remaps interleave
    /// with writes however the host schedules the CPUs.
    pub fn with_lockstep(mut self) -> Self {
        self.lockstep = true;
        self
    }

    pub fn lockstep(&self) -> bool {
        self.lockstep
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    /// The page table's current translation of `page`.
    pub fn translation(&self, page: VirtPage) -> FrameId {
        FrameId(self.page_table[page.0].load(Ordering::SeqCst))
    }

    /// The translation `cpu` has cached for `page`, if any.
    pub fn cached_translation(&self, cpu: CpuId, page: VirtPage) -> Option<FrameId> {
        entry_frame(self.tlbs[cpu as usize].entries[page.0].load(Ordering::SeqCst))
    }

    /// Completed `invalidate` calls, not counting ignored ones.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    // Waits for a remap of `page` newer than the last one `tlb`'s CPU saw.
    fn await_remap(&self, tlb: &SoftTlb, page: VirtPage) {
        let seen = tlb.seen_remaps[page.0].load(Ordering::Relaxed);
        loop {
            let remaps = self.remaps[page.0].load(Ordering::SeqCst);
            if remaps != seen {
                tlb.seen_remaps[page.0].store(remaps, Ordering::Relaxed);
                return;
            }
            (self.relax)();
        }
    }

    fn translate(&self, tlb: &SoftTlb, page: VirtPage) -> FrameId {
        let entry = tlb.entries[page.0].load(Ordering::SeqCst);
        if let Some(frame) = entry_frame(entry) {
            return frame;
        }

        let frame = self.page_table[page.0].load(Ordering::SeqCst);
        // If an eviction got in between, use the walked translation for
        // this access only.
        let _ = tlb.entries[page.0].compare_exchange(
            entry,
            (entry & !NO_FRAME) | frame as u64,
            Ordering::SeqCst,
            Ordering::Relaxed,
        );
        FrameId(frame)
    }

    fn invalidate<F: Fn(&SoftTlb)>(&self, evict: F) {
        if self.flush_mode == FlushMode::Ignore {
            return;
        }

        for tlb in self.tlbs.iter() {
            evict(tlb);
        }

        // Like a barrier after a broadcast invalidate: accesses that
        // may have used an evicted translation must complete first.
        for tlb in self.tlbs.iter() {
            self.drain(tlb);
        }

        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    // Waits until a CPU caught mid-access has finished that access.
    fn drain(&self, tlb: &SoftTlb) {
        let seq = tlb.access_seq.load(Ordering::SeqCst);
        if seq & 1 == 0 {
            return;
        }
        while tlb.access_seq.load(Ordering::SeqCst) == seq {
            (self.relax)();
        }
    }
}

impl Machine for SoftMmu {
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn remap(&self, page: VirtPage, frame: FrameId) {
        debug_assert!(frame.0 < self.frames.len());
        self.page_table[page.0].store(frame.0, Ordering::SeqCst);
        self.remaps[page.0].fetch_add(1, Ordering::SeqCst);
    }

    fn invalidate_page(&self, page: VirtPage) {
        self.invalidate(|tlb| tlb.evict(page));
    }

    fn invalidate_all(&self) {
        self.invalidate(SoftTlb::evict_all);
    }

    fn write_through(&self, cpu: CpuId, page: VirtPage, slot: usize, value: impl FnOnce() -> u64) {
        let tlb = &self.tlbs[cpu as usize];
        if self.lockstep {
            self.await_remap(tlb, page);
        }

        tlb.access_seq.fetch_add(1, Ordering::SeqCst);
        let frame = self.translate(tlb, page);
        let val = value();
        self.frames.get(frame).store(slot, val);
        tlb.access_seq.fetch_add(1, Ordering::SeqCst);
    }

    fn cpu_relax(&self) {
        (self.relax)();
    }
}
