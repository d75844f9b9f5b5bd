//! Caller-facing façade: submit a tree, get back something to cancel.

use std::sync::Arc;

use crate::call::{BatchCallTree, ResultAssembler};
use crate::error::{Error, Result};
use crate::execute::{CancelToken, CmdProcessor, ExecHandle};
use crate::notify::{AgentEventListener, EventQueue, MonitorFactory};

/// Anything that can request cancellation of a running call.
pub trait Cancellable: Send + Sync {
    fn cancel(&self);
}

impl<R: 'static> Cancellable for ExecHandle<R> {
    fn cancel(&self) {
        ExecHandle::cancel(self);
    }
}

impl Cancellable for CancelToken {
    fn cancel(&self) {
        CancelToken::cancel(self);
    }
}

/// Opaque handle given to the code that started a call.
///
/// Its only operation is [`CallHandle::cancel`]; results arrive through the
/// listener.
#[derive(Clone)]
pub struct CallHandle {
    delegate: Arc<dyn Cancellable>,
}

impl CallHandle {
    pub fn new(delegate: Arc<dyn Cancellable>) -> Self {
        Self { delegate }
    }

    /// Forward a cancellation request. Safe to call any number of times.
    pub fn cancel(&self) {
        self.delegate.cancel();
    }
}

impl<R: 'static> From<ExecHandle<R>> for CallHandle {
    fn from(handle: ExecHandle<R>) -> Self {
        Self::new(Arc::new(handle))
    }
}

impl<R: 'static> TryFrom<Option<ExecHandle<R>>> for CallHandle {
    type Error = Error;

    fn try_from(handle: Option<ExecHandle<R>>) -> Result<Self> {
        handle.map(Self::from).ok_or_else(|| {
            Error::InvalidArgument("call handle needs an execution to delegate to".to_string())
        })
    }
}

impl std::fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle").finish_non_exhaustive()
    }
}

/// Entry point used by service code to run batch calls.
///
/// Owns the processor and the [`MonitorFactory`] for one event loop. Every
/// call gets its own adapter, so each listener only sees its own events.
pub struct DataServiceView<P> {
    processor: P,
    monitors: MonitorFactory,
}

impl<P: CmdProcessor> DataServiceView<P> {
    pub fn new(processor: P, queue: EventQueue) -> Self {
        Self {
            processor,
            monitors: MonitorFactory::new(queue),
        }
    }

    /// Submit `tree`; `listener` receives its events on the event loop.
    pub fn call<T, A, L>(&self, tree: BatchCallTree<T, A>, listener: L) -> Result<CallHandle>
    where
        T: Clone + Send + 'static,
        A: ResultAssembler<T> + 'static,
        L: AgentEventListener<T, A::Output>,
    {
        self.call_with_handle(tree, listener)
            .map(|(handle, _exec)| handle)
    }

    /// Like [`DataServiceView::call`], but also returns the [`ExecHandle`]
    /// for callers that want to wait on the result directly.
    pub fn call_with_handle<T, A, L>(
        &self,
        tree: BatchCallTree<T, A>,
        listener: L,
    ) -> Result<(CallHandle, ExecHandle<A::Output>)>
    where
        T: Clone + Send + 'static,
        A: ResultAssembler<T> + 'static,
        L: AgentEventListener<T, A::Output>,
    {
        let monitor = self.monitors.make_new(&tree, listener);
        let exec = self.processor.exec_with_monitor(tree, monitor)?;
        tracing::debug!("{} submitted", exec.call_id());
        Ok((CallHandle::from(exec.clone()), exec))
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for DataServiceView<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataServiceView")
            .field("processor", &self.processor)
            .finish_non_exhaustive()
    }
}
