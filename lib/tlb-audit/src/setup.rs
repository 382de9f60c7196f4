use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::controller::WriterSlot;
use crate::{
    AuditConfig, AuditLog, Controller, CpuId, FrameId, FrameTable, RoundSync, SetupError,
    TraceWriter, VirtPage, Writer, MAX_CPUS,
};

/// Everything allocated before the first round.
///
/// Writer `n` runs on CPU `n + 1` and owns `VirtPage(n)`, one stable frame
/// and `pool_size` dynamic frames, the first of which is the page's home.
pub struct Setup {
    config: AuditConfig,
    frames: Arc<FrameTable>,
    sync: Arc<RoundSync>,
    slots: Vec<WriterSlot>,
}

impl Setup {
    pub fn new(config: AuditConfig, num_writers: usize) -> Result<Self, SetupError> {
        config.validate()?;
        if num_writers == 0 {
            return Err(SetupError::InvalidConfig("at least one writer is needed"));
        }
        let num_cpus = num_writers + 1;
        if num_cpus > MAX_CPUS {
            return Err(SetupError::TooManyCpus {
                requested: num_cpus,
                max: MAX_CPUS,
            });
        }

        let frames_per_writer = 1 + config.pool_size;
        let frames = FrameTable::try_new(num_writers * frames_per_writer, config.iterations)?;

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(num_writers)
            .map_err(|_| SetupError::OutOfMemory {
                frames: frames.len(),
            })?;
        for writer in 0..num_writers {
            let first = writer * frames_per_writer;
            slots.push(WriterSlot {
                cpu: (writer + 1) as CpuId,
                page: VirtPage(writer),
                stable: FrameId(first),
                pool: (0..config.pool_size)
                    .map(|idx| FrameId(first + 1 + idx))
                    .collect(),
                audit: AuditLog::try_with_capacity(config.audit_capacity)?,
            });
        }

        Ok(Self {
            config,
            frames: Arc::new(frames),
            sync: Arc::new(RoundSync::new(num_cpus)),
            slots,
        })
    }

    pub fn num_cpus(&self) -> usize {
        self.slots.len() + 1
    }

    pub fn frames(&self) -> Arc<FrameTable> {
        self.frames.clone()
    }

    /// Home frame of every dynamic page, indexed by page.
    pub fn initial_mappings(&self) -> Vec<FrameId> {
        self.slots.iter().map(|slot| slot.home()).collect()
    }

    /// Splits the setup into the controller and one writer per writer CPU.
    pub fn into_roles(self) -> (Controller, Vec<Writer>) {
        let writers = self
            .slots
            .iter()
            .map(|slot| {
                Writer::new(
                    slot.cpu,
                    slot.page,
                    TraceWriter::new(self.frames.clone(), slot.stable),
                    self.config.iterations,
                    self.config.rounds,
                    self.config.sync_start,
                    self.sync.clone(),
                )
            })
            .collect();

        let controller = Controller::new(self.config, self.frames, self.sync, self.slots);
        (controller, writers)
    }
}
