//! Replays a frame's timestamps against the audit log of its page.
//!
//! Both sequences are ordered by time, so one cursor into the frame is
//! enough: for every audit record, consume the timestamps that are not newer
//! than the record's window, and classify each against the frames that could
//! legitimately have been mapped at that time.

use core::ops::AddAssign;

use crate::{AuditRecord, FrameId, Timestamps};

/// How the slots of a frame were classified.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageTally {
    /// Slots not written to this frame.
    pub empty: u64,
    pub consistent: u64,
    /// Older than a timestamp the cursor already consumed on this frame:
    /// the windows that could judge it are behind the cursor. Not an error.
    pub late: u64,
    /// Landed on a frame that could not have been mapped at that time.
    pub weird: u64,
    /// Newer than the last audit record of an overflowed log: there is
    /// nothing to check these against.
    pub unaudited: u64,
}

impl PageTally {
    pub fn total(&self) -> u64 {
        self.empty + self.consistent + self.late + self.weird + self.unaudited
    }

    pub fn written(&self) -> u64 {
        self.total() - self.empty
    }
}

impl AddAssign for PageTally {
    fn add_assign(&mut self, other: Self) {
        self.empty += other.empty;
        self.consistent += other.consistent;
        self.late += other.late;
        self.weird += other.weird;
        self.unaudited += other.unaudited;
    }
}

/// What happened to one dynamic page during a round.
#[derive(Clone, Copy, Debug)]
pub struct AuditHistory<'a> {
    /// The frame mapped when the round started.
    pub home: FrameId,
    pub records: &'a [AuditRecord],
    /// More remaps happened than `records` holds.
    pub overflowed: bool,
}

/// Classifies every slot of `frame`, whose contents are `trace`.
pub fn check_frame<T: Timestamps + ?Sized>(
    frame: FrameId,
    trace: &T,
    history: &AuditHistory<'_>,
) -> PageTally {
    let mut tally = PageTally::default();
    let mut prev = history.home;
    let mut cursor = 0;
    // Newest timestamp consumed so far.
    let mut newest = 0;

    for rec in history.records {
        while cursor < trace.len() {
            let ts = trace.get(cursor);

            if ts == 0 {
                tally.empty += 1;
            } else if ts < newest {
                tally.late += 1;
            } else if ts < rec.time_before {
                // Only the predecessor was mapped; anything else, including
                // the frame about to be installed, used a bad translation.
                if frame == prev {
                    tally.consistent += 1;
                } else {
                    tally.weird += 1;
                }
            } else if ts <= rec.time_after {
                // Mid-remap: either mapping may still be in flight.
                if frame == prev || frame == rec.frame {
                    tally.consistent += 1;
                } else {
                    tally.weird += 1;
                }
            } else {
                // Ahead of this record; look at it again against the next.
                break;
            }

            newest = newest.max(ts);
            cursor += 1;
        }

        prev = rec.frame;
    }

    // Past the last record only its frame may be written to.
    while cursor < trace.len() {
        let ts = trace.get(cursor);
        if ts == 0 {
            tally.empty += 1;
        } else if ts < newest {
            tally.late += 1;
        } else if history.overflowed {
            tally.unaudited += 1;
        } else if frame == prev {
            tally.consistent += 1;
        } else {
            tally.weird += 1;
        }
        newest = newest.max(ts);
        cursor += 1;
    }

    tally
}

/// Counts the written slots of a page that is never remapped. Anything less
/// than `trace.len()` means writes went missing.
pub fn check_stable<T: Timestamps + ?Sized>(trace: &T) -> usize {
    (0..trace.len()).filter(|idx| trace.get(*idx) != 0).count()
}
