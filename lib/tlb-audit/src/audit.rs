use alloc::vec::Vec;

use crate::{FrameId, SetupError};

/// One remap of a writer's dynamic page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuditRecord {
    /// The frame the page maps to from now on.
    pub frame: FrameId,
    /// Tick read just before the page table update.
    pub time_before: u64,
    /// Tick read just after the invalidation completed.
    pub time_after: u64,
}

/// Remaps done during one round, oldest first.
///
/// Bounded: once full, remaps are counted but not recorded.
pub struct AuditLog {
    records: Vec<AuditRecord>,
    capacity: usize,
    remaps: u64,
}

impl AuditLog {
    pub fn try_with_capacity(capacity: usize) -> Result<Self, SetupError> {
        let mut records = Vec::new();
        records
            .try_reserve_exact(capacity)
            .map_err(|_| SetupError::OutOfMemory { frames: 0 })?;

        Ok(Self {
            records,
            capacity,
            remaps: 0,
        })
    }

    /// Counts the remap and records it if there is room.
    pub fn push(&mut self, record: AuditRecord) -> bool {
        debug_assert!(record.time_before <= record.time_after);
        debug_assert!(self
            .records
            .last()
            .map_or(true, |prev| prev.time_before <= record.time_before));

        self.remaps += 1;
        if self.records.len() < self.capacity {
            self.records.push(record);
            true
        } else {
            false
        }
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remaps done this round, recorded or not.
    pub fn remaps(&self) -> u64 {
        self.remaps
    }

    pub fn dropped(&self) -> u64 {
        self.remaps - self.records.len() as u64
    }

    pub fn overflowed(&self) -> bool {
        self.dropped() > 0
    }

    /// Every record's window is well formed and windows start in order.
    pub fn is_ordered(&self) -> bool {
        self.records
            .iter()
            .all(|rec| rec.time_before <= rec.time_after)
            && self
                .records
                .windows(2)
                .all(|pair| pair[0].time_before <= pair[1].time_before)
    }

    /// The frame mapped after the last recorded remap.
    pub fn final_frame(&self, home: FrameId) -> FrameId {
        self.records.last().map_or(home, |rec| rec.frame)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.remaps = 0;
    }
}
