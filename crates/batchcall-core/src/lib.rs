//! Core engine for asynchronous batch calls.
//!
//! This crate provides:
//! - Batch call trees: ordered steps feeding a result assembler
//! - Processors that run a tree inline, on a thread, or on a pool
//! - Write-once result futures and cooperative cancellation
//! - Execution monitors and an adapter that replays them on an event loop
//!
//! # Example
//!
//! ```
//! use batchcall_core::{BatchCallTree, CmdProcessor, SyncProcessor};
//!
//! let mut tree = BatchCallTree::new("thumbnail");
//! tree.add("load", |_| Ok(64u32)).unwrap();
//! tree.add("scale", |_| Ok(32u32)).unwrap();
//!
//! let handle = SyncProcessor.exec(tree).unwrap();
//! assert_eq!(handle.get_result(), Ok(Some(32)));
//! ```

pub mod call;
pub mod config;
pub mod error;
pub mod execute;
pub mod notify;
pub mod types;
pub mod view;

pub use call::{
    BatchCall, BatchCallTree, CollectAssembler, FoldAssembler, Invocation, PlainAssembler,
    ResultAssembler, StepInfo,
};
pub use config::{ProcessorConfig, ProcessorKind};
pub use error::{Error, Result, StepError};
pub use execute::{
    CancelToken, CmdProcessor, ExecFuture, ExecHandle, NullFuture, PoolProcessor, ResultFuture,
    SyncProcessor, ThreadProcessor,
};
pub use notify::{
    AgentEventListener, BatchCallMonitor, CallEvent, CompletionHandler, EventLoop, EventQueue,
    ExecMonitor, MonitorFactory, NullMonitor, event_loop,
};
pub use types::{CallId, Progress, StepId};
pub use view::{CallHandle, Cancellable, DataServiceView};
