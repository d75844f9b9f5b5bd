//! Processors decide where a batch call runs.
//!
//! Every processor shares the same [`CmdProcessor::exec`] logic: it builds the
//! future, the cancellation token and one job that owns the tree, its
//! assembler and the monitor. Only [`CmdProcessor::do_exec`] differs.
//!
//! - **`SyncProcessor`** - Runs the job on the calling thread before `exec`
//!   returns. Deterministic; used in tests and for very short calls.
//! - **`ThreadProcessor`** - One dedicated, named thread per call.
//! - **`PoolProcessor`** - A bounded Rayon thread pool shared by all calls.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::call::{BatchCallTree, ResultAssembler};
use crate::error::{Error, Result, panic_message};
use crate::notify::{ExecMonitor, NullMonitor};

use super::cancel::CancelToken;
use super::future::{ExecFuture, ResultFuture};
use super::handle::ExecHandle;

/// A boxed unit of work handed to [`CmdProcessor::do_exec`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Execution-context strategy for batch calls.
pub trait CmdProcessor: Send + Sync {
    /// Run `job` in this processor's execution context.
    ///
    /// Errors must be reported synchronously; a job that was accepted must
    /// eventually run.
    fn do_exec(&self, job: Job) -> Result<()>;

    /// Submit a tree without a monitor.
    fn exec<T, A>(&self, tree: BatchCallTree<T, A>) -> Result<ExecHandle<A::Output>>
    where
        Self: Sized,
        T: Send + 'static,
        A: ResultAssembler<T> + 'static,
    {
        self.exec_with_monitor(tree, NullMonitor)
    }

    /// Submit a tree observed by `monitor`.
    ///
    /// The tree, its assembler and the monitor move into a single job, so
    /// only the thread running that job ever touches them or writes the
    /// future.
    fn exec_with_monitor<T, A, M>(
        &self,
        tree: BatchCallTree<T, A>,
        monitor: M,
    ) -> Result<ExecHandle<A::Output>>
    where
        Self: Sized,
        T: Send + 'static,
        A: ResultAssembler<T> + 'static,
        M: ExecMonitor<T, A::Output> + 'static,
    {
        let call_id = tree.call_id();
        let future = Arc::new(ExecFuture::new());
        let token = CancelToken::new();

        let job = execution_job(tree, Arc::clone(&future), token.clone(), monitor);
        self.do_exec(job)?;

        Ok(ExecHandle::new(call_id, future, token))
    }

    /// Like [`CmdProcessor::exec_with_monitor`], but for call sites where the
    /// tree may be missing. A missing tree is rejected here, before anything
    /// is scheduled.
    fn try_exec<T, A, M>(
        &self,
        tree: Option<BatchCallTree<T, A>>,
        monitor: M,
    ) -> Result<ExecHandle<A::Output>>
    where
        Self: Sized,
        T: Send + 'static,
        A: ResultAssembler<T> + 'static,
        M: ExecMonitor<T, A::Output> + 'static,
    {
        let tree = tree.ok_or_else(|| {
            Error::InvalidArgument("no batch call tree to execute".to_string())
        })?;
        self.exec_with_monitor(tree, monitor)
    }
}

impl<P: CmdProcessor + ?Sized> CmdProcessor for Box<P> {
    fn do_exec(&self, job: Job) -> Result<()> {
        (**self).do_exec(job)
    }
}

impl<P: CmdProcessor + ?Sized> CmdProcessor for Arc<P> {
    fn do_exec(&self, job: Job) -> Result<()> {
        (**self).do_exec(job)
    }
}

/// Build the job that drives one execution to completion.
fn execution_job<T, A, M>(
    tree: BatchCallTree<T, A>,
    future: Arc<ExecFuture<A::Output>>,
    token: CancelToken,
    mut monitor: M,
) -> Job
where
    T: Send + 'static,
    A: ResultAssembler<T> + 'static,
    M: ExecMonitor<T, A::Output> + 'static,
{
    Box::new(move || {
        let call_id = tree.call_id();

        // Step, monitor and assembler panics are all contained by `run`.
        let outcome = tree.run(&token, &mut monitor);

        let resolved = match &outcome {
            Ok(value) => future.set_result(value.clone()),
            Err(e) => future.set_exception(e.clone()),
        };
        if let Err(e) = resolved {
            tracing::error!("{} could not resolve its future: {}", call_id, e);
        }

        if panic::catch_unwind(AssertUnwindSafe(|| monitor.on_end(&outcome))).is_err() {
            tracing::error!("{} monitor panicked in on_end", call_id);
        }

        match &outcome {
            Ok(_) => tracing::debug!("{} finished", call_id),
            Err(e) => tracing::debug!("{} ended: {}", call_id, e),
        }
    })
}

/// Runs every call inline on the caller's thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncProcessor;

impl SyncProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl CmdProcessor for SyncProcessor {
    fn do_exec(&self, job: Job) -> Result<()> {
        job();
        Ok(())
    }
}

/// Runs every call on its own dedicated thread.
#[derive(Debug)]
pub struct ThreadProcessor {
    name_prefix: String,
    spawned: AtomicUsize,
}

impl ThreadProcessor {
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            spawned: AtomicUsize::new(0),
        }
    }

    /// Number of worker threads started so far.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl Default for ThreadProcessor {
    fn default() -> Self {
        Self::new("batchcall")
    }
}

impl CmdProcessor for ThreadProcessor {
    fn do_exec(&self, job: Job) -> Result<()> {
        let index = self.spawned.fetch_add(1, Ordering::Relaxed);
        std::thread::Builder::new()
            .name(format!("{}-{}", self.name_prefix, index))
            .spawn(job)
            .map(|_detached| ())
            .map_err(|e| Error::Spawn(format!("thread {}-{}: {}", self.name_prefix, index, e)))
    }
}

/// Runs calls on a bounded Rayon thread pool.
pub struct PoolProcessor {
    pool: rayon::ThreadPool,
}

impl PoolProcessor {
    /// Build a pool with `threads` workers named `{name_prefix}-{index}`.
    pub fn new(threads: usize, name_prefix: impl Into<String>) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InvalidArgument(
                "pool needs at least one thread".to_string(),
            ));
        }

        let name_prefix = name_prefix.into();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |index| format!("{}-{}", name_prefix, index))
            .panic_handler(|payload| {
                tracing::error!("pool worker panicked: {}", panic_message(payload.as_ref()));
            })
            .build()
            .map_err(|e| Error::Spawn(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl std::fmt::Debug for PoolProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolProcessor")
            .field("threads", &self.threads())
            .finish()
    }
}

impl CmdProcessor for PoolProcessor {
    fn do_exec(&self, job: Job) -> Result<()> {
        self.pool.spawn(job);
        Ok(())
    }
}
