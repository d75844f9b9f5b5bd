//! Caller-facing handle for a running execution.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::types::CallId;

use super::cancel::CancelToken;
use super::future::{NullFuture, ResultFuture};

/// Handle returned by a processor for one execution.
///
/// Gives the caller cancellation and read access to the outcome. It never
/// exposes the future's setters. Cloning shares the same execution.
pub struct ExecHandle<R> {
    call_id: CallId,
    future: Arc<dyn ResultFuture<R>>,
    token: CancelToken,
}

impl<R: 'static> ExecHandle<R> {
    pub(crate) fn new(call_id: CallId, future: Arc<dyn ResultFuture<R>>, token: CancelToken) -> Self {
        Self {
            call_id,
            future,
            token,
        }
    }

    /// Handle backed by a [`NullFuture`]: already done, resolves to
    /// `R::default()`, and cancelling it does nothing.
    pub fn null() -> Self
    where
        R: Default,
    {
        Self::new(CallId::new(), Arc::new(NullFuture::new()), CancelToken::new())
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Request cooperative cancellation.
    ///
    /// No step starts after the request is seen; the step in flight is not
    /// interrupted but receives the flag through its token. Returns `true`
    /// only for the first request made while the execution was unresolved.
    /// Later calls, and calls after resolution, do nothing.
    pub fn cancel(&self) -> bool {
        if self.future.is_resolved() {
            return false;
        }
        let first = self.token.cancel();
        if first {
            tracing::debug!("{} cancellation requested", self.call_id);
        }
        first
    }

    /// Whether cancellation was requested through any clone of this handle.
    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the outcome is available.
    pub fn is_done(&self) -> bool {
        self.future.is_resolved()
    }

    /// Block until the execution resolves.
    pub fn get_result(&self) -> Result<R> {
        self.future.get_result()
    }

    /// Block for at most `timeout`; `None` means not available yet.
    ///
    /// Timing out does not stop the execution. Call [`ExecHandle::cancel`]
    /// for that.
    pub fn get_result_timeout(&self, timeout: Duration) -> Option<Result<R>> {
        self.future.get_result_timeout(timeout)
    }
}

impl<R> Clone for ExecHandle<R> {
    fn clone(&self) -> Self {
        Self {
            call_id: self.call_id,
            future: Arc::clone(&self.future),
            token: self.token.clone(),
        }
    }
}

impl<R> std::fmt::Debug for ExecHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecHandle")
            .field("call_id", &self.call_id)
            .field("done", &self.future.is_resolved())
            .field("cancel_requested", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::execute::ExecFuture;

    fn pending() -> (Arc<ExecFuture<u32>>, ExecHandle<u32>) {
        let future = Arc::new(ExecFuture::new());
        let handle = ExecHandle::new(CallId::new(), future.clone(), CancelToken::new());
        (future, handle)
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (_future, handle) = pending();
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(!handle.clone().cancel());
        assert!(handle.is_cancel_requested());
    }

    #[test]
    fn test_cancel_after_resolution_is_noop() {
        let (future, handle) = pending();
        future.set_result(1).unwrap();

        assert!(!handle.cancel());
        assert!(!handle.is_cancel_requested());
        assert_eq!(handle.get_result(), Ok(1));
    }

    #[test]
    fn test_timeout_does_not_resolve() {
        let (future, handle) = pending();
        assert!(handle.get_result_timeout(Duration::from_millis(5)).is_none());
        assert!(!handle.is_done());

        future.set_exception(Error::Cancelled).unwrap();
        assert!(handle.is_done());
        assert_eq!(handle.get_result(), Err(Error::Cancelled));
    }

    #[test]
    fn test_null_handle() {
        let handle = ExecHandle::<Vec<u8>>::null();
        assert!(handle.is_done());
        assert!(!handle.cancel());
        assert_eq!(handle.get_result(), Ok(Vec::new()));
    }

    #[test]
    fn test_clones_share_execution() {
        let (future, handle) = pending();
        let other = handle.clone();
        assert_eq!(handle.call_id(), other.call_id());

        future.set_result(8).unwrap();
        assert_eq!(other.get_result_timeout(Duration::ZERO), Some(Ok(8)));
    }
}
