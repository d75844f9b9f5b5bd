//! Execution engine: processors, result futures and cancellation.
//!
//! A processor takes ownership of a [`BatchCallTree`](crate::call::BatchCallTree),
//! schedules one job for it and immediately returns an [`ExecHandle`]. The
//! job walks the tree, resolves the [`ExecFuture`] exactly once and then
//! reports the outcome to the monitor.

mod cancel;
mod future;
mod handle;
mod processor;

pub use cancel::CancelToken;
pub use future::{ExecFuture, NullFuture, ResultFuture};
pub use handle::ExecHandle;
pub use processor::{CmdProcessor, Job, PoolProcessor, SyncProcessor, ThreadProcessor};
