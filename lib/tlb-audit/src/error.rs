use core::fmt;

/// Failures that abort the test before any round runs.
///
/// Everything found while the rounds run (weird writes, lost writes, audit
/// log overflow) is an ordinary classified result, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    InvalidConfig(&'static str),
    TooManyCpus { requested: usize, max: usize },
    OutOfMemory { frames: usize },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(what) => write!(f, "invalid config: {what}"),
            Self::TooManyCpus { requested, max } => {
                write!(f, "{requested} CPUs requested, at most {max} supported")
            }
            Self::OutOfMemory { frames } => {
                write!(f, "out of memory after allocating {frames} frames")
            }
        }
    }
}

impl core::error::Error for SetupError {}
