//! Bridge from worker-thread notifications to an event-loop listener.
//!
//! A [`BatchCallMonitor`] is the execution's [`ExecMonitor`]. It never calls
//! the listener itself: every notification is turned into a [`CallEvent`]
//! and posted to the [`EventQueue`], and the listener runs later on the
//! loop's thread. Because the queue is FIFO and one execution posts from one
//! thread, a listener sees `Started`, then the step events in step order,
//! then `Outcome` last.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::call::{BatchCallTree, StepInfo};
use crate::error::Result;
use crate::types::{CallId, Progress};

use super::dispatch::EventQueue;
use super::monitor::ExecMonitor;

/// Error a listener may return. It is logged and otherwise ignored.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Event delivered to a listener on the event loop.
#[derive(Debug, Clone)]
pub enum CallEvent<T, R> {
    /// The execution began.
    Started {
        call_id: CallId,
        description: String,
        total_steps: usize,
    },
    /// A step began running.
    StepStarted { call_id: CallId, step: StepInfo },
    /// A step completed; `partial` is the value it produced.
    Feedback {
        call_id: CallId,
        step: StepInfo,
        progress: Progress,
        partial: T,
    },
    /// The final response. Always the last event of an execution.
    Outcome { call_id: CallId, result: Result<R> },
}

impl<T, R> CallEvent<T, R> {
    pub fn call_id(&self) -> CallId {
        match self {
            Self::Started { call_id, .. }
            | Self::StepStarted { call_id, .. }
            | Self::Feedback { call_id, .. }
            | Self::Outcome { call_id, .. } => *call_id,
        }
    }

    /// Short name of the event kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::StepStarted { .. } => "step-started",
            Self::Feedback { .. } => "feedback",
            Self::Outcome { .. } => "outcome",
        }
    }
}

/// Receiver of [`CallEvent`]s. Only ever invoked from the event loop.
pub trait AgentEventListener<T, R>: Send + 'static {
    fn event_fired(&mut self, event: CallEvent<T, R>) -> std::result::Result<(), ListenerError>;
}

impl<T, R, F> AgentEventListener<T, R> for F
where
    F: FnMut(CallEvent<T, R>) + Send + 'static,
{
    fn event_fired(&mut self, event: CallEvent<T, R>) -> std::result::Result<(), ListenerError> {
        self(event);
        Ok(())
    }
}

/// Listener that only cares about the final response.
///
/// Progress events are ignored and `handler` runs once with the outcome.
pub struct CompletionHandler<F> {
    handler: Option<F>,
}

impl<F> CompletionHandler<F> {
    pub fn new(handler: F) -> Self {
        Self {
            handler: Some(handler),
        }
    }
}

impl<T, R, F> AgentEventListener<T, R> for CompletionHandler<F>
where
    F: FnOnce(CallId, Result<R>) + Send + 'static,
{
    fn event_fired(&mut self, event: CallEvent<T, R>) -> std::result::Result<(), ListenerError> {
        if let CallEvent::Outcome { call_id, result } = event {
            match self.handler.take() {
                Some(handler) => handler(call_id, result),
                None => return Err(format!("{call_id} delivered a second outcome").into()),
            }
        }
        Ok(())
    }
}

/// Builds notification adapters bound to one event queue.
#[derive(Debug, Clone)]
pub struct MonitorFactory {
    queue: EventQueue,
}

impl MonitorFactory {
    pub fn new(queue: EventQueue) -> Self {
        Self { queue }
    }

    /// Create the adapter for one execution of `tree`.
    ///
    /// The listener is moved into the adapter; from then on only dispatches
    /// running on the event loop can reach it.
    pub fn make_new<T, A, L>(&self, tree: &BatchCallTree<T, A>, listener: L) -> BatchCallMonitor<L> {
        BatchCallMonitor {
            call_id: tree.call_id(),
            description: tree.description().to_string(),
            queue: self.queue.clone(),
            listener: Arc::new(Mutex::new(listener)),
        }
    }
}

/// [`ExecMonitor`] that forwards notifications to a listener through the
/// event queue.
pub struct BatchCallMonitor<L> {
    call_id: CallId,
    description: String,
    queue: EventQueue,
    listener: Arc<Mutex<L>>,
}

impl<L> BatchCallMonitor<L> {
    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    fn post<T, R>(&self, event: CallEvent<T, R>)
    where
        L: AgentEventListener<T, R>,
        T: Send + 'static,
        R: Send + 'static,
    {
        let listener = Arc::clone(&self.listener);
        self.queue.post(move || deliver(&listener, event));
    }
}

impl<T, R, L> ExecMonitor<T, R> for BatchCallMonitor<L>
where
    L: AgentEventListener<T, R>,
    T: Clone + Send + 'static,
    R: Clone + Send + 'static,
{
    fn on_start(&mut self, call_id: CallId, total_steps: usize) {
        self.post::<T, R>(CallEvent::Started {
            call_id,
            description: self.description.clone(),
            total_steps,
        });
    }

    fn on_step_started(&mut self, step: &StepInfo) {
        self.post::<T, R>(CallEvent::StepStarted {
            call_id: self.call_id,
            step: step.clone(),
        });
    }

    fn on_step_completed(&mut self, step: &StepInfo, value: &T, progress: Progress) {
        self.post::<T, R>(CallEvent::Feedback {
            call_id: self.call_id,
            step: step.clone(),
            progress,
            partial: value.clone(),
        });
    }

    fn on_end(&mut self, outcome: &Result<R>) {
        self.post::<T, R>(CallEvent::Outcome {
            call_id: self.call_id,
            result: outcome.clone(),
        });
    }
}

/// Hand one event to the listener, containing any failure it raises.
fn deliver<T, R, L>(listener: &Mutex<L>, event: CallEvent<T, R>)
where
    L: AgentEventListener<T, R>,
{
    let call_id = event.call_id();
    let kind = event.kind();

    // Panics are caught below while the guard is held, so poisoning only
    // happens if the listener's Drop panics; recover the listener anyway.
    let mut guard = listener
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    match panic::catch_unwind(AssertUnwindSafe(|| guard.event_fired(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!("{} listener failed on {} event: {}", call_id, kind, e);
        }
        Err(_) => {
            tracing::error!("{} listener panicked on {} event", call_id, kind);
        }
    }
}
