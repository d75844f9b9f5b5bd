//! Cooperative cancellation for batch call execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Token for cooperative cancellation of a batch call.
///
/// `CancelToken` is a thread-safe flag. It can be cloned and shared across
/// threads, and a cancel from any clone is visible to all other clones.
/// The executing job checks it before each step, and long-running
/// invocations receive it so they can stop early.
///
/// # Example
///
/// ```
/// use batchcall_core::execute::CancelToken;
///
/// let token = CancelToken::new();
/// let worker_side = token.clone();
///
/// assert!(!worker_side.is_cancelled());
/// token.cancel();
/// assert!(worker_side.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation.
    ///
    /// Returns `true` only for the call that flipped the flag, so repeated
    /// requests can be told apart from the first one.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }
}
