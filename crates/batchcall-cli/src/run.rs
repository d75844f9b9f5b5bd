//! Run command implementation for the batchcall CLI.
//!
//! Builds a demo tree of timed steps, submits it through a
//! [`DataServiceView`] and drives the event loop on the main task, printing
//! each event as its dispatch runs.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use batchcall_core::{
    BatchCallTree, CallEvent, CollectAssembler, DataServiceView, ProcessorConfig, ProcessorKind,
    ResultAssembler, StepError, event_loop,
};

/// Granularity at which a demo step checks for cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(5);

/// Upper bound for every millisecond option (30 days).
const MAX_MILLIS: u64 = 30 * 24 * 60 * 60 * 1000;

/// Options for `batchcall run`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub steps: usize,
    pub step_ms: u64,
    pub fail_at: Option<usize>,
    pub cancel_after: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub processor: Option<ProcessorKind>,
    pub collect: bool,
}

/// Execute a demo batch call.
pub async fn execute(config_path: Option<&Path>, options: RunOptions) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => ProcessorConfig::from_json_file(path)?,
        None => ProcessorConfig::default(),
    };
    if let Some(kind) = options.processor {
        config.kind = kind;
    }

    if options.collect {
        let tree = demo_tree(
            BatchCallTree::with_assembler("demo batch call", CollectAssembler::new()),
            &options,
        )?;
        drive(&config, tree, &options).await
    } else {
        let tree = demo_tree(BatchCallTree::new("demo batch call"), &options)?;
        drive(&config, tree, &options).await
    }
}

/// Fill `tree` with `options.steps` timed steps.
fn demo_tree<A>(
    mut tree: BatchCallTree<u64, A>,
    options: &RunOptions,
) -> anyhow::Result<BatchCallTree<u64, A>> {
    let step_time = millis("--step-ms", options.step_ms)?;
    if Instant::now().checked_add(step_time).is_none() {
        anyhow::bail!("--step-ms {} is too large", options.step_ms);
    }

    for index in 0..options.steps {
        let fail = options.fail_at == Some(index);
        tree.add(format!("step-{index}"), move |cancel| {
            let deadline = Instant::now() + step_time;
            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                if cancel.is_cancelled() {
                    return Err(StepError::Cancelled);
                }
                std::thread::sleep(CANCEL_POLL.min(deadline - now));
            }

            if fail {
                return Err(StepError::failed(format!("step {index} was asked to fail")));
            }
            Ok((index as u64 + 1) * 10)
        })?;
    }

    Ok(tree)
}

async fn drive<A>(
    config: &ProcessorConfig,
    tree: BatchCallTree<u64, A>,
    options: &RunOptions,
) -> anyhow::Result<()>
where
    A: ResultAssembler<u64> + 'static,
    A::Output: Debug,
{
    let deadline = options
        .timeout_ms
        .map(|ms| {
            tokio::time::Instant::now()
                .checked_add(millis("--timeout-ms", ms)?)
                .ok_or_else(|| anyhow::anyhow!("--timeout-ms {} is too large", ms))
        })
        .transpose()?;
    let cancel_after = options
        .cancel_after
        .map(|ms| millis("--cancel-after", ms))
        .transpose()?;

    let (queue, mut events) = event_loop();
    let view = DataServiceView::new(config.build()?, queue);

    let finished = Arc::new(AtomicBool::new(false));
    let seen_outcome = Arc::clone(&finished);
    let listener = move |event: CallEvent<u64, A::Output>| {
        print_event(&event);
        if matches!(event, CallEvent::Outcome { .. }) {
            seen_outcome.store(true, Ordering::SeqCst);
        }
    };

    tracing::debug!("submitting {} steps to the {:?} processor", options.steps, config.kind);
    let (call, exec) = view.call_with_handle(tree, listener)?;

    if let Some(delay) = cancel_after {
        let call = call.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!("cancelling after {:?}", delay);
            call.cancel();
        });
    }

    while !finished.load(Ordering::SeqCst) {
        let dispatched = match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, events.dispatch_next()).await {
                    Ok(dispatched) => dispatched,
                    Err(_) => {
                        call.cancel();
                        anyhow::bail!(
                            "no result within {} ms; the call was cancelled",
                            options.timeout_ms.unwrap_or_default()
                        );
                    }
                }
            }
            None => events.dispatch_next().await,
        };
        if !dispatched {
            anyhow::bail!("event loop closed before the call finished");
        }
    }

    let outcome = exec
        .get_result_timeout(Duration::ZERO)
        .ok_or_else(|| anyhow::anyhow!("outcome event arrived before the result"))?;
    let value = outcome?;

    println!("Result: {:?}", value);
    Ok(())
}

/// Convert a millisecond option, rejecting values past [`MAX_MILLIS`].
fn millis(flag: &str, ms: u64) -> anyhow::Result<Duration> {
    if ms > MAX_MILLIS {
        anyhow::bail!("{} {} is too large (at most {})", flag, ms, MAX_MILLIS);
    }
    Ok(Duration::from_millis(ms))
}

fn print_event<R: Debug>(event: &CallEvent<u64, R>) {
    match event {
        CallEvent::Started {
            call_id,
            description,
            total_steps,
        } => println!("{} started '{}' ({} steps)", call_id, description, total_steps),
        CallEvent::StepStarted { step, .. } => println!("  {} ...", step.status()),
        CallEvent::Feedback {
            step,
            progress,
            partial,
            ..
        } => println!("  [{:>3}%] {} -> {}", progress.percent(), step.name, partial),
        CallEvent::Outcome { call_id, result } => match result {
            Ok(_) => println!("{} finished", call_id),
            Err(e) => println!("{} ended: {}", call_id, e),
        },
    }
}
