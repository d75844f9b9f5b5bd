//! Execution notifications.
//!
//! [`ExecMonitor`] is the engine-side observer, called on the worker thread.
//! [`BatchCallMonitor`] adapts it to an [`AgentEventListener`] that only ever
//! runs on the [`EventLoop`].

mod adapter;
mod dispatch;
mod monitor;

pub use adapter::{
    AgentEventListener, BatchCallMonitor, CallEvent, CompletionHandler, ListenerError,
    MonitorFactory,
};
pub use dispatch::{BACKLOG_WARN_THRESHOLD, Dispatch, EventLoop, EventQueue, event_loop};
pub use monitor::{ExecMonitor, NullMonitor};
