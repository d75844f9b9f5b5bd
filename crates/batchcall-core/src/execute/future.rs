//! Single-slot result containers.
//!
//! An [`ExecFuture`] moves from unset to resolved exactly once, either with a
//! value or with an error. Readers block until that happens, optionally with
//! a timeout. [`NullFuture`] satisfies the same interface without ever
//! blocking, for code paths that have no asynchronous result to report.

use std::marker::PhantomData;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{Error, Result};

/// Interface shared by every result container.
///
/// The setters are meant for the execution engine only; caller-facing
/// handles expose the getters and nothing else.
pub trait ResultFuture<R>: Send + Sync {
    /// Resolve with a value.
    fn set_result(&self, value: R) -> Result<()>;

    /// Resolve with an error.
    fn set_exception(&self, error: Error) -> Result<()>;

    /// Block until resolved and return the outcome.
    fn get_result(&self) -> Result<R>;

    /// Block for at most `timeout`.
    ///
    /// Returns `None` if the outcome is not available yet. The timeout only
    /// bounds the wait; it has no effect on the running execution.
    fn get_result_timeout(&self, timeout: Duration) -> Option<Result<R>>;

    /// Whether an outcome is available without blocking.
    fn is_resolved(&self) -> bool;
}

/// Slot states. `Unset` is the only non-terminal state.
#[derive(Debug)]
enum Slot<R> {
    Unset,
    Value(R),
    Error(Error),
}

impl<R: Clone> Slot<R> {
    fn outcome(&self) -> Option<Result<R>> {
        match self {
            Slot::Unset => None,
            Slot::Value(value) => Some(Ok(value.clone())),
            Slot::Error(error) => Some(Err(error.clone())),
        }
    }
}

/// Helper to convert PoisonError to our Error type.
fn lock_error<T>(e: PoisonError<T>) -> Error {
    Error::Poisoned(format!("result slot lock poisoned: {}", e))
}

/// Thread-safe, resolve-once result container.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use batchcall_core::execute::{ExecFuture, ResultFuture};
///
/// let future = Arc::new(ExecFuture::<u32>::new());
/// assert!(future.get_result_timeout(Duration::from_millis(1)).is_none());
///
/// let writer = Arc::clone(&future);
/// std::thread::spawn(move || writer.set_result(7).unwrap());
///
/// assert_eq!(future.get_result().unwrap(), 7);
/// ```
#[derive(Debug)]
pub struct ExecFuture<R> {
    slot: Mutex<Slot<R>>,
    resolved: Condvar,
}

impl<R> Default for ExecFuture<R> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(Slot::Unset),
            resolved: Condvar::new(),
        }
    }
}

impl<R: Clone + Send> ExecFuture<R> {
    /// Create an unresolved future.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a future that is already resolved with `value`.
    pub fn resolved_value(value: R) -> Self {
        Self {
            slot: Mutex::new(Slot::Value(value)),
            resolved: Condvar::new(),
        }
    }

    /// Create a future that is already resolved with `error`.
    pub fn resolved_error(error: Error) -> Self {
        Self {
            slot: Mutex::new(Slot::Error(error)),
            resolved: Condvar::new(),
        }
    }

    fn acquire_lock(&self) -> Result<MutexGuard<'_, Slot<R>>> {
        self.slot.lock().map_err(lock_error)
    }

    fn resolve(&self, outcome: Slot<R>) -> Result<()> {
        let mut slot = self.acquire_lock()?;
        if !matches!(*slot, Slot::Unset) {
            return Err(Error::AlreadyResolved);
        }
        *slot = outcome;
        drop(slot);

        self.resolved.notify_all();
        Ok(())
    }
}

impl<R: Clone + Send> ResultFuture<R> for ExecFuture<R> {
    fn set_result(&self, value: R) -> Result<()> {
        self.resolve(Slot::Value(value))
    }

    fn set_exception(&self, error: Error) -> Result<()> {
        self.resolve(Slot::Error(error))
    }

    fn get_result(&self) -> Result<R> {
        let guard = self.acquire_lock()?;
        let slot = self
            .resolved
            .wait_while(guard, |slot| matches!(slot, Slot::Unset))
            .map_err(lock_error)?;

        slot.outcome()
            .unwrap_or_else(|| Err(Error::Poisoned("woke with an unset slot".to_string())))
    }

    fn get_result_timeout(&self, timeout: Duration) -> Option<Result<R>> {
        let guard = match self.acquire_lock() {
            Ok(guard) => guard,
            Err(e) => return Some(Err(e)),
        };

        match self
            .resolved
            .wait_timeout_while(guard, timeout, |slot| matches!(slot, Slot::Unset))
        {
            Ok((slot, _)) => slot.outcome(),
            Err(e) => Some(Err(lock_error(e))),
        }
    }

    fn is_resolved(&self) -> bool {
        self.acquire_lock()
            .map(|slot| !matches!(*slot, Slot::Unset))
            .unwrap_or(true)
    }
}

/// No-op result container.
///
/// Setters succeed without storing anything and getters return
/// `R::default()` immediately.
#[derive(Debug)]
pub struct NullFuture<R> {
    _marker: PhantomData<fn() -> R>,
}

impl<R> NullFuture<R> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<R> Default for NullFuture<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Default> ResultFuture<R> for NullFuture<R> {
    fn set_result(&self, _value: R) -> Result<()> {
        Ok(())
    }

    fn set_exception(&self, _error: Error) -> Result<()> {
        Ok(())
    }

    fn get_result(&self) -> Result<R> {
        Ok(R::default())
    }

    fn get_result_timeout(&self, _timeout: Duration) -> Option<Result<R>> {
        Some(Ok(R::default()))
    }

    fn is_resolved(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_future_is_unset() {
        let future = ExecFuture::<i32>::new();
        assert!(!future.is_resolved());
        assert!(future.get_result_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_set_result() {
        let future = ExecFuture::new();
        future.set_result(5).unwrap();
        assert!(future.is_resolved());
        assert_eq!(future.get_result(), Ok(5));
        // Repeated reads see the same outcome.
        assert_eq!(future.get_result(), Ok(5));
    }

    #[test]
    fn test_set_exception() {
        let future = ExecFuture::<i32>::new();
        future.set_exception(Error::Cancelled).unwrap();
        assert_eq!(future.get_result(), Err(Error::Cancelled));
        assert_eq!(
            future.get_result_timeout(Duration::from_millis(1)),
            Some(Err(Error::Cancelled))
        );
    }

    #[test]
    fn test_second_setter_is_rejected() {
        let future = ExecFuture::new();
        future.set_result(1).unwrap();

        assert_eq!(future.set_result(2), Err(Error::AlreadyResolved));
        assert_eq!(future.set_exception(Error::Cancelled), Err(Error::AlreadyResolved));
        assert_eq!(future.get_result(), Ok(1));
    }

    #[test]
    fn test_error_then_value_is_rejected() {
        let future = ExecFuture::<i32>::new();
        future.set_exception(Error::Cancelled).unwrap();
        assert_eq!(future.set_result(2), Err(Error::AlreadyResolved));
        assert_eq!(future.get_result(), Err(Error::Cancelled));
    }

    #[test]
    fn test_blocking_get_wakes_on_resolve() {
        let future = Arc::new(ExecFuture::<String>::new());
        let reader = {
            let future = Arc::clone(&future);
            thread::spawn(move || future.get_result())
        };

        thread::sleep(Duration::from_millis(20));
        future.set_result("done".to_string()).unwrap();

        assert_eq!(reader.join().unwrap(), Ok("done".to_string()));
    }

    #[test]
    fn test_timed_get_returns_once_resolved() {
        let future = Arc::new(ExecFuture::<u8>::new());
        let writer = Arc::clone(&future);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.set_result(9).unwrap();
        });

        let outcome = future.get_result_timeout(Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(outcome, Some(Ok(9)));
    }

    #[test]
    fn test_pre_resolved_constructors() {
        assert_eq!(ExecFuture::resolved_value(3).get_result(), Ok(3));
        assert_eq!(
            ExecFuture::<u8>::resolved_error(Error::Cancelled).get_result(),
            Err(Error::Cancelled)
        );
    }

    #[test]
    fn test_null_future() {
        let future = NullFuture::<Option<u32>>::new();
        assert!(future.is_resolved());
        future.set_result(Some(4)).unwrap();
        future.set_exception(Error::Cancelled).unwrap();
        assert_eq!(future.get_result(), Ok(None));
        assert_eq!(future.get_result_timeout(Duration::ZERO), Some(Ok(None)));
    }

    #[test]
    fn test_futures_behind_trait_object() {
        let futures: Vec<Box<dyn ResultFuture<u32>>> =
            vec![Box::new(ExecFuture::resolved_value(1)), Box::new(NullFuture::new())];
        let values: Vec<u32> = futures.iter().map(|f| f.get_result().unwrap()).collect();
        assert_eq!(values, vec![1, 0]);
    }
}
