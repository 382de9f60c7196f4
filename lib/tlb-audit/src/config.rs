use crate::SetupError;

pub const PAGE_SIZE_SMALL: usize = 4096;

/// What a remap invalidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushScope {
    /// Only the remapped virtual page.
    Page,
    /// The whole translation cache.
    All,
}

impl FlushScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::All => "all",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditConfig {
    /// Rounds to run; writer traces and audit logs do not survive a round.
    pub rounds: u32,
    /// Timestamps each writer writes per round.
    pub iterations: usize,
    /// Physical frames each writer's dynamic page rotates through: 1 (no
    /// real remaps) or at least 3. Frame 0 of the pool is the page's home
    /// frame.
    pub pool_size: usize,
    /// Minimum number of remap passes per round. The controller keeps
    /// remapping past this until every writer is done.
    pub remaps_per_round: u32,
    /// Audit records kept per writer per round. Remaps past this still
    /// happen, they are just not recorded.
    pub audit_capacity: usize,
    pub flush_scope: FlushScope,
    pub verbose: bool,
    /// Align the start of every run on a tick gate.
    pub sync_start: bool,
}

impl AuditConfig {
    pub const DEFAULT_ROUNDS: u32 = 3;
    pub const DEFAULT_ITERATIONS: usize = (PAGE_SIZE_SMALL / core::mem::size_of::<u64>()) << 2;
    pub const DEFAULT_POOL_SIZE: usize = 3;
    pub const DEFAULT_AUDIT_CAPACITY: usize = 16384;

    pub const fn new() -> Self {
        Self {
            rounds: Self::DEFAULT_ROUNDS,
            iterations: Self::DEFAULT_ITERATIONS,
            pool_size: Self::DEFAULT_POOL_SIZE,
            remaps_per_round: 0,
            audit_capacity: Self::DEFAULT_AUDIT_CAPACITY,
            flush_scope: FlushScope::All,
            verbose: false,
            sync_start: true,
        }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.rounds == 0 {
            return Err(SetupError::InvalidConfig("rounds must be at least 1"));
        }
        if self.iterations == 0 {
            return Err(SetupError::InvalidConfig("iterations must be at least 1"));
        }
        // Two frames only ever swap: a stale translation to the older
        // mapping is indistinguishable from the next one. One frame is the
        // degenerate case where every remap reinstalls the home frame.
        if self.pool_size != 1 && self.pool_size < 3 {
            return Err(SetupError::InvalidConfig("pool size must be 1 or at least 3"));
        }
        if self.audit_capacity == 0 {
            return Err(SetupError::InvalidConfig("audit capacity must be at least 1"));
        }

        Ok(())
    }

    /// Applies one bare command line word, e.g. `page`, `verbose` or
    /// `cycles=10`. Returns false if the word is not ours; the word may well
    /// belong to the enclosing harness.
    pub fn apply_arg(&mut self, arg: &str) -> Result<bool, SetupError> {
        match arg {
            "page" => self.flush_scope = FlushScope::Page,
            "all" => self.flush_scope = FlushScope::All,
            "verbose" => self.verbose = true,
            "nosync" => self.sync_start = false,
            _ => {
                let Some((param, value)) = arg.split_once('=') else {
                    return Ok(false);
                };
                match param {
                    "cycles" | "rounds" => self.rounds = decode_arg(value, "bad round count")?,
                    "iterations" => self.iterations = decode_arg(value, "bad iteration count")?,
                    "pool" => self.pool_size = decode_arg(value, "bad pool size")?,
                    "remaps" => self.remaps_per_round = decode_arg(value, "bad remap count")?,
                    "audit" => self.audit_capacity = decode_arg(value, "bad audit capacity")?,
                    _ => return Ok(false),
                }
            }
        }

        Ok(true)
    }

    /// Report prefix, e.g. `tlbflush_data_page`.
    pub fn report_prefix(&self) -> &'static str {
        match self.flush_scope {
            FlushScope::Page => "tlbflush_data_page",
            FlushScope::All => "tlbflush_data_all",
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_arg<F: core::str::FromStr>(value: &str, err: &'static str) -> Result<F, SetupError> {
    value.parse::<F>().map_err(|_| SetupError::InvalidConfig(err))
}
