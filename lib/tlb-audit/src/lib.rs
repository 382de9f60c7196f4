//! TLB flush race detector.
//!
//! One CPU (the controller) keeps remapping a virtual page that other CPUs
//! (the writers) are writing timestamps through. Every remap is recorded in
//! an audit log together with the tick values read just before the page
//! table update and just after the invalidation completed. Once a round is
//! over, each physical frame's timestamps are replayed against the audit log:
//! a timestamp that landed on a frame that was neither the old nor the new
//! mapping at that time means a stale (or premature) translation was used.
//!
//! Hardware access (tick counter, page tables, TLB invalidation, stores
//! through a virtual address) goes through the [`Machine`] trait.
//! [`SoftMmu`] is a software model of it with per-CPU TLBs.

#![no_std]

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

mod audit;
mod config;
mod controller;
mod cpumask;
mod error;
mod machine;
mod page;
mod reconcile;
mod report;
mod round;
mod setup;
mod soft_mmu;
mod writer;


pub use audit::{AuditLog, AuditRecord};
pub use config::{AuditConfig, FlushScope};
pub use controller::{Controller, RunSummary, WriterVerdict};
pub use cpumask::{CpuId, CpuMask, CONTROLLER_CPU, MAX_CPUS};
pub use error::SetupError;
pub use machine::{Machine, VirtPage};
pub use page::{FrameId, FrameTable, TimestampPage, Timestamps, TraceWriter};
pub use reconcile::{check_frame, check_stable, AuditHistory, PageTally};
pub use report::{LogReporter, Reporter};
pub use round::{fence, sync_start, RoundPhase, RoundSync};
pub use setup::Setup;
pub use soft_mmu::{FlushMode, SoftMmu};
pub use writer::Writer;
