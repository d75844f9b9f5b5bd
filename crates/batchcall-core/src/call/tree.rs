//! Batch call trees: ordered steps feeding one assembler.
//!
//! A [`BatchCallTree`] is built by the caller, handed to a processor, and
//! consumed by exactly one execution. Steps run strictly in the order they
//! were added. The first failing step aborts the traversal.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{Error, Result, StepError, panic_message};
use crate::execute::CancelToken;
use crate::notify::ExecMonitor;
use crate::types::{CallId, Progress, StepId};

use super::assembler::{PlainAssembler, ResultAssembler};
use super::invocation::Invocation;

/// Identity of a step, as seen by monitors and listeners.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StepInfo {
    /// Position in the tree.
    pub id: StepId,
    /// Unique name within the tree.
    pub name: String,
    /// Human-readable status text shown while the step runs.
    pub description: Option<String>,
}

impl StepInfo {
    /// Status text for progress reporting, falling back to the step name.
    pub fn status(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }
}

/// One node of a batch call tree.
pub struct BatchCall<T> {
    name: String,
    description: Option<String>,
    invocation: Box<dyn Invocation<T>>,
}

impl<T> BatchCall<T> {
    /// Create a step from a closure.
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(&CancelToken) -> std::result::Result<T, StepError> + Send + 'static,
    {
        Self::from_invocation(name, f)
    }

    /// Create a step from any [`Invocation`].
    pub fn from_invocation(name: impl Into<String>, invocation: impl Invocation<T> + 'static) -> Self {
        Self {
            name: name.into(),
            description: None,
            invocation: Box::new(invocation),
        }
    }

    /// Attach status text reported while this step runs.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> std::fmt::Debug for BatchCall<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCall")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// An ordered composition of steps representing one logical service call.
///
/// # Example
///
/// ```
/// use batchcall_core::call::BatchCallTree;
///
/// let mut tree = BatchCallTree::new("load thumbnails");
/// tree.add("fetch ids", |_| Ok(vec![1u32, 2, 3])).unwrap();
/// tree.add("render", |_| Ok(vec![10u32, 20, 30])).unwrap();
///
/// assert_eq!(tree.len(), 2);
/// assert!(tree.add("render", |_| Ok(vec![])).is_err());
/// ```
pub struct BatchCallTree<T, A = PlainAssembler<T>> {
    call_id: CallId,
    description: String,
    calls: Vec<BatchCall<T>>,
    names: HashSet<String>,
    assembler: A,
}

impl<T> BatchCallTree<T, PlainAssembler<T>> {
    /// Create an empty tree with the last-value-wins assembler.
    pub fn new(description: impl Into<String>) -> Self {
        Self::with_assembler(description, PlainAssembler::new())
    }
}

impl<T, A> BatchCallTree<T, A> {
    /// Create an empty tree with a custom assembler.
    pub fn with_assembler(description: impl Into<String>, assembler: A) -> Self {
        Self {
            call_id: CallId::new(),
            description: description.into(),
            calls: Vec::new(),
            names: HashSet::new(),
            assembler,
        }
    }

    /// Append a closure step. Returns its id.
    pub fn add<F>(&mut self, name: impl Into<String>, f: F) -> Result<StepId>
    where
        F: FnOnce(&CancelToken) -> std::result::Result<T, StepError> + Send + 'static,
    {
        self.push(BatchCall::new(name, f))
    }

    /// Append a step.
    ///
    /// Rejects empty and duplicate names so every notification can be
    /// traced back to exactly one step.
    pub fn push(&mut self, call: BatchCall<T>) -> Result<StepId> {
        if call.name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "step name must not be empty".to_string(),
            ));
        }
        if !self.names.insert(call.name.clone()) {
            return Err(Error::InvalidArgument(format!(
                "duplicate step name '{}'",
                call.name
            )));
        }

        let id = StepId::new(self.calls.len());
        self.calls.push(call);
        Ok(id)
    }

    /// Id of the execution this tree will drive.
    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Step identities in execution order.
    pub fn steps(&self) -> impl Iterator<Item = StepInfo> + '_ {
        self.calls.iter().enumerate().map(|(index, call)| StepInfo {
            id: StepId::new(index),
            name: call.name.clone(),
            description: call.description.clone(),
        })
    }
}

impl<T, A: ResultAssembler<T>> BatchCallTree<T, A> {
    /// Run every step in order, feeding the assembler and the monitor.
    ///
    /// `on_end` is not called here: the caller resolves the future first
    /// and then reports the outcome. A panicking monitor is logged and
    /// otherwise ignored; it never changes the outcome.
    pub(crate) fn run<M>(self, cancel: &CancelToken, monitor: &mut M) -> Result<A::Output>
    where
        M: ExecMonitor<T, A::Output> + ?Sized,
    {
        let Self {
            call_id,
            description,
            calls,
            mut assembler,
            ..
        } = self;
        let total = calls.len();

        tracing::debug!("{} starting '{}' with {} steps", call_id, description, total);
        observe(call_id, "on_start", || monitor.on_start(call_id, total));

        for (index, call) in calls.into_iter().enumerate() {
            // Check for cancellation before each step
            if cancel.is_cancelled() {
                tracing::debug!("{} cancelled before step {}", call_id, index);
                return Err(Error::Cancelled);
            }

            let BatchCall {
                name,
                description,
                invocation,
            } = call;
            let info = StepInfo {
                id: StepId::new(index),
                name,
                description,
            };

            observe(call_id, "on_step_started", || monitor.on_step_started(&info));

            let value = match panic::catch_unwind(AssertUnwindSafe(|| invocation.call(cancel))) {
                Ok(Ok(value)) => value,
                Ok(Err(StepError::Cancelled)) => {
                    tracing::debug!("{} step '{}' stopped on cancellation", call_id, info.name);
                    return Err(Error::Cancelled);
                }
                Ok(Err(StepError::Failed(message))) => {
                    tracing::debug!("{} step '{}' failed: {}", call_id, info.name, message);
                    return Err(Error::StepFailed {
                        step: info.id,
                        name: info.name,
                        message,
                    });
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!("{} step '{}' panicked: {}", call_id, info.name, message);
                    return Err(Error::StepPanicked {
                        step: info.id,
                        name: info.name,
                        message,
                    });
                }
            };

            let progress = Progress::new(index + 1, total);
            observe(call_id, "on_step_completed", || {
                monitor.on_step_completed(&info, &value, progress)
            });

            panic::catch_unwind(AssertUnwindSafe(|| assembler.add(value)))
                .map_err(|payload| assembler_panicked(call_id, payload))?;
        }

        panic::catch_unwind(AssertUnwindSafe(|| assembler.assemble()))
            .map_err(|payload| assembler_panicked(call_id, payload))
    }
}

/// Run one monitor notification, containing any panic it raises.
fn observe(call_id: CallId, hook: &str, notify: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(notify)) {
        tracing::error!(
            "{} monitor panicked in {}: {}",
            call_id,
            hook,
            panic_message(payload.as_ref())
        );
    }
}

fn assembler_panicked(call_id: CallId, payload: Box<dyn std::any::Any + Send>) -> Error {
    let message = panic_message(payload.as_ref());
    tracing::error!("{} assembler panicked: {}", call_id, message);
    Error::AssemblerPanicked(message)
}

impl<T, A> std::fmt::Debug for BatchCallTree<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCallTree")
            .field("call_id", &self.call_id)
            .field("description", &self.description)
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}
