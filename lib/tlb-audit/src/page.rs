use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::*;

use crate::SetupError;

/// Index of a physical frame in a [`FrameTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

/// A page worth of tick values, one slot per writer iteration.
///
/// Zero means "not written yet": tick sources never return zero.
pub struct TimestampPage {
    slots: Box<[AtomicU64]>,
}

impl TimestampPage {
    pub fn try_new(len: usize) -> Option<Self> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(len).ok()?;
        slots.resize_with(len, || AtomicU64::new(0));

        Some(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn load(&self, idx: usize) -> u64 {
        self.slots[idx].load(Ordering::Relaxed)
    }

    /// The physical store. Only the CPU owning the frame during a round (via
    /// its [`TraceWriter`] or through its dynamic page) may call this.
    pub fn store(&self, idx: usize, val: u64) {
        self.slots[idx].store(val, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.store(0, Ordering::Relaxed);
        }
    }
}

/// Read access to a sequence of timestamps.
pub trait Timestamps {
    fn len(&self) -> usize;
    fn get(&self, idx: usize) -> u64;
}

impl Timestamps for TimestampPage {
    fn len(&self) -> usize {
        TimestampPage::len(self)
    }

    fn get(&self, idx: usize) -> u64 {
        self.load(idx)
    }
}

impl Timestamps for [u64] {
    fn len(&self) -> usize {
        <[u64]>::len(self)
    }

    fn get(&self, idx: usize) -> u64 {
        self[idx]
    }
}

/// All physical frames the test writes to.
pub struct FrameTable {
    frames: Vec<TimestampPage>,
}

impl FrameTable {
    pub fn try_new(num_frames: usize, frame_len: usize) -> Result<Self, SetupError> {
        let mut frames = Vec::new();
        frames
            .try_reserve_exact(num_frames)
            .map_err(|_| SetupError::OutOfMemory { frames: 0 })?;

        for _ in 0..num_frames {
            let Some(frame) = TimestampPage::try_new(frame_len) else {
                return Err(SetupError::OutOfMemory {
                    frames: frames.len(),
                });
            };
            frames.push(frame);
        }

        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, frame: FrameId) -> &TimestampPage {
        &self.frames[frame.0]
    }
}

/// The only handle through which a writer fills its stable page.
///
/// Not `Clone`: one per writer, handed out once by [`crate::Setup`].
pub struct TraceWriter {
    frames: Arc<FrameTable>,
    frame: FrameId,
}

impl TraceWriter {
    pub(crate) fn new(frames: Arc<FrameTable>, frame: FrameId) -> Self {
        Self { frames, frame }
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    #[inline]
    pub fn record(&mut self, idx: usize, val: u64) {
        self.frames.get(self.frame).store(idx, val);
    }
}
