//! Execution lifecycle observers.

use crate::call::StepInfo;
use crate::error::Result;
use crate::types::{CallId, Progress};

/// Observer for the lifecycle of one batch call execution.
///
/// Methods are called from the thread running the execution, in this order:
/// `on_start`, then `on_step_started`/`on_step_completed` for each step that
/// runs, then `on_end` exactly once. `on_end` sees the same outcome the
/// future was resolved with.
pub trait ExecMonitor<T, R>: Send {
    /// Called before the first step.
    fn on_start(&mut self, _call_id: CallId, _total_steps: usize) {}

    /// Called when a step starts executing.
    fn on_step_started(&mut self, _step: &StepInfo) {}

    /// Called when a step produced a value, before it reaches the assembler.
    fn on_step_completed(&mut self, _step: &StepInfo, _value: &T, _progress: Progress) {}

    /// Called once the execution finished, failed, or was cancelled.
    fn on_end(&mut self, outcome: &Result<R>);
}

impl<T, R, M> ExecMonitor<T, R> for Box<M>
where
    M: ExecMonitor<T, R> + ?Sized,
{
    fn on_start(&mut self, call_id: CallId, total_steps: usize) {
        (**self).on_start(call_id, total_steps)
    }

    fn on_step_started(&mut self, step: &StepInfo) {
        (**self).on_step_started(step)
    }

    fn on_step_completed(&mut self, step: &StepInfo, value: &T, progress: Progress) {
        (**self).on_step_completed(step, value, progress)
    }

    fn on_end(&mut self, outcome: &Result<R>) {
        (**self).on_end(outcome)
    }
}

/// Monitor that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMonitor;

impl<T, R> ExecMonitor<T, R> for NullMonitor {
    fn on_end(&mut self, _outcome: &Result<R>) {}
}
