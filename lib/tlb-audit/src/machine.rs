use crate::{CpuId, FrameId};

/// A virtual page under test. Each writer owns one dynamic virtual page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VirtPage(pub usize);

/// The hardware the test runs on.
///
/// `remap` only updates the page table; a CPU may keep using a cached
/// translation until the page has been invalidated.
pub trait Machine: Sync {
    /// Free running counter, comparable across CPUs. Never zero.
    fn tick(&self) -> u64;

    /// Points `page` at `frame` in the page table.
    fn remap(&self, page: VirtPage, frame: FrameId);

    /// Evicts cached translations of `page` on all CPUs. Returns once no
    /// CPU can use an evicted translation anymore.
    fn invalidate_page(&self, page: VirtPage);

    /// Like `invalidate_page`, for every page.
    fn invalidate_all(&self);

    /// Stores `value()` through `page` at `slot`, as seen from `cpu`.
    ///
    /// `value` is called exactly once, right before the store.
    fn write_through(&self, cpu: CpuId, page: VirtPage, slot: usize, value: impl FnOnce() -> u64);

    fn cpu_relax(&self) {
        core::hint::spin_loop();
    }
}
