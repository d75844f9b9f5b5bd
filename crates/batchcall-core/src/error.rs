//! Error types for batchcall-core.

use std::any::Any;

use thiserror::Error;

use crate::types::StepId;

/// Result type for batchcall-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in batchcall-core.
///
/// `Clone` so that a resolved future can hand the same outcome to every
/// reader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A step's invocation returned an error. Later steps were skipped.
    #[error("step {step} ({name}) failed: {message}")]
    StepFailed {
        step: StepId,
        name: String,
        message: String,
    },

    /// A step's invocation panicked. Later steps were skipped.
    #[error("step {step} ({name}) panicked: {message}")]
    StepPanicked {
        step: StepId,
        name: String,
        message: String,
    },

    /// A result assembler panicked while folding step values.
    #[error("result assembler panicked: {0}")]
    AssemblerPanicked(String),

    /// Execution was cancelled through its handle.
    #[error("batch call cancelled")]
    Cancelled,

    /// Misuse detected at the call site (missing tree, delegate, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A future was resolved a second time.
    #[error("result already resolved")]
    AlreadyResolved,

    /// A worker thread or pool could not be started.
    #[error("failed to start worker: {0}")]
    Spawn(String),

    /// A lock was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// Processor configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The step that caused this error, if any.
    pub fn step(&self) -> Option<StepId> {
        match self {
            Self::StepFailed { step, .. } | Self::StepPanicked { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Whether this error is the cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Format the error with a short recovery hint for end users.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Self::StepFailed { .. } => "the batch call stopped at this step; resubmit to retry",
            Self::StepPanicked { .. } => "a step panicked; check the invocation for unwrap() or indexing bugs",
            Self::AssemblerPanicked(_) => "a custom ResultAssembler panicked; fix the assembler and resubmit",
            Self::Cancelled => "the call was cancelled before it finished",
            Self::InvalidArgument(_) => "check the arguments passed to the call site",
            Self::AlreadyResolved => "only the execution engine may resolve a future",
            Self::Spawn(_) => "the system may be out of threads; try the sync processor",
            Self::Poisoned(_) => "a previous panic left shared state unusable",
            Self::Config(_) => "check the configuration file path and JSON syntax",
        };
        format!("{self}\n  hint: {hint}")
    }
}

/// Error returned by a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// The step could not produce a value.
    #[error("{0}")]
    Failed(String),

    /// The step observed a cancellation request and stopped early.
    #[error("step cancelled")]
    Cancelled,
}

impl StepError {
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self::Failed(message)
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::Failed(message.to_string())
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
