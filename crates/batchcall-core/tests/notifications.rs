//! Integration tests for event-loop notification delivery.
//!
//! Listeners must only run on the thread that drives the event loop, see
//! their own call's events in step order, and get the outcome last.

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use batchcall_core::{
    BatchCallTree, CallEvent, CallHandle, CallId, CmdProcessor, CollectAssembler,
    CompletionHandler, DataServiceView, Error, ExecHandle, NullMonitor, PoolProcessor,
    StepError, SyncProcessor, ThreadProcessor, event_loop,
};

type Log = Arc<Mutex<Vec<(String, ThreadId)>>>;

fn numbered_tree(label: &str, steps: u32) -> BatchCallTree<u32, CollectAssembler<u32>> {
    let mut tree = BatchCallTree::with_assembler(label, CollectAssembler::new());
    for n in 0..steps {
        tree.add(format!("{label}-{n}"), move |_| {
            thread::sleep(Duration::from_millis(2));
            Ok(n)
        })
        .unwrap();
    }
    tree
}

fn recorder(log: &Log) -> impl FnMut(CallEvent<u32, Vec<u32>>) + Send + 'static {
    let log = Arc::clone(log);
    move |event: CallEvent<u32, Vec<u32>>| {
        let line = match &event {
            CallEvent::Started { total_steps, .. } => format!("started {total_steps}"),
            CallEvent::StepStarted { step, .. } => format!("begin {}", step.name),
            CallEvent::Feedback { step, partial, .. } => format!("feedback {} {}", step.name, partial),
            CallEvent::Outcome { result, .. } => format!("outcome {result:?}"),
        };
        log.lock().unwrap().push((line, thread::current().id()));
    }
}

#[test]
fn test_concurrent_calls_keep_their_own_order() {
    let (queue, mut events) = event_loop();
    let view = DataServiceView::new(ThreadProcessor::new("notify-test"), queue);

    let first: Log = Arc::default();
    let second: Log = Arc::default();
    let (_h1, e1) = view
        .call_with_handle(numbered_tree("a", 4), recorder(&first))
        .unwrap();
    let (_h2, e2) = view
        .call_with_handle(numbered_tree("b", 3), recorder(&second))
        .unwrap();

    assert_eq!(e1.get_result(), Ok(vec![0, 1, 2, 3]));
    assert_eq!(e2.get_result(), Ok(vec![0, 1, 2]));

    // Both outcomes have been posted once both futures resolved and the
    // monitors returned; drain until both listeners have seen them.
    let done = |log: &Log| {
        log.lock()
            .unwrap()
            .last()
            .is_some_and(|(line, _)| line.starts_with("outcome"))
    };
    while !(done(&first) && done(&second)) {
        assert!(events.blocking_dispatch_next());
    }

    let loop_thread = thread::current().id();
    for (log, label, steps) in [(&first, "a", 4u32), (&second, "b", 3)] {
        let log = log.lock().unwrap();
        assert!(log.iter().all(|(_, id)| *id == loop_thread));

        let mut expected = vec![format!("started {steps}")];
        for n in 0..steps {
            expected.push(format!("begin {label}-{n}"));
            expected.push(format!("feedback {label}-{n} {n}"));
        }
        expected.push(format!(
            "outcome Ok({:?})",
            (0..steps).collect::<Vec<_>>()
        ));

        let lines: Vec<_> = log.iter().map(|(line, _)| line.clone()).collect();
        assert_eq!(lines, expected);
    }
}

#[tokio::test]
async fn test_async_loop_receives_outcome() {
    let (queue, mut events) = event_loop();
    let view = DataServiceView::new(PoolProcessor::new(2, "async-test").unwrap(), queue);

    let outcome = Arc::new(Mutex::new(None::<(CallId, batchcall_core::Result<Vec<u32>>)>));
    let sink = Arc::clone(&outcome);
    let mut tree = numbered_tree("c", 2);
    tree.add("c-fail", |_| Err(StepError::failed("quota exceeded")))
        .unwrap();
    let call_id = tree.call_id();

    view.call(
        tree,
        CompletionHandler::new(move |id: CallId, result: batchcall_core::Result<Vec<u32>>| {
            *sink.lock().unwrap() = Some((id, result));
        }),
    )
    .unwrap();

    while outcome.lock().unwrap().is_none() {
        assert!(events.dispatch_next().await);
    }

    let (id, result) = outcome.lock().unwrap().take().unwrap();
    assert_eq!(id, call_id);
    assert!(matches!(result, Err(Error::StepFailed { ref message, .. }) if message == "quota exceeded"));
}

#[test]
fn test_listener_panic_does_not_stop_delivery() {
    let (queue, mut events) = event_loop();
    let view = DataServiceView::new(SyncProcessor, queue);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let exec = view
        .call_with_handle(numbered_tree("p", 2), move |event: CallEvent<u32, Vec<u32>>| {
            if let CallEvent::Feedback { partial: 0, .. } = event {
                panic!("listener cannot handle zero");
            }
            sink.lock().unwrap().push(event.kind());
        })
        .unwrap()
        .1;

    assert_eq!(exec.get_result(), Ok(vec![0, 1]));
    assert_eq!(events.run_pending(), 6);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["started", "step-started", "step-started", "feedback", "outcome"]
    );
}

#[test]
fn test_dropped_loop_does_not_break_execution() {
    let (queue, events) = event_loop();
    drop(events);

    let view = DataServiceView::new(SyncProcessor, queue);
    let (_handle, exec) = view
        .call_with_handle(numbered_tree("d", 1), |_: CallEvent<u32, Vec<u32>>| {})
        .unwrap();
    assert_eq!(exec.get_result(), Ok(vec![0]));
}

#[test]
fn test_empty_tree_reports_start_then_outcome() {
    let (queue, mut events) = event_loop();
    let view = DataServiceView::new(ThreadProcessor::new("empty-test"), queue);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let (_handle, exec) = view
        .call_with_handle(
            BatchCallTree::<u32>::new("nothing to do"),
            move |event: CallEvent<u32, Option<u32>>| {
                let line = match event {
                    CallEvent::Started { total_steps, .. } => format!("started {total_steps}"),
                    CallEvent::Outcome { result, .. } => format!("outcome {result:?}"),
                    other => format!("unexpected {}", other.kind()),
                };
                sink.lock().unwrap().push(line);
            },
        )
        .unwrap();

    assert_eq!(exec.get_result(), Ok(None));
    while seen.lock().unwrap().len() < 2 {
        assert!(events.blocking_dispatch_next());
    }
    assert_eq!(events.run_pending(), 0);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["started 0".to_string(), "outcome Ok(None)".to_string()]
    );

    // The same through the inline processor, without a listener.
    let handle = SyncProcessor.exec(BatchCallTree::<u32>::new("inline")).unwrap();
    assert!(handle.is_done());
    assert_eq!(handle.get_result(), Ok(None));
}

// =============================================================================
// Missing arguments
// =============================================================================

#[test]
fn test_missing_tree_is_rejected_synchronously() {
    let outcome = SyncProcessor.try_exec(None::<BatchCallTree<u32>>, NullMonitor);
    assert!(matches!(outcome, Err(Error::InvalidArgument(_))));

    let processor = ThreadProcessor::new("never");
    let outcome = processor.try_exec(None::<BatchCallTree<u32>>, NullMonitor);
    assert!(matches!(outcome, Err(Error::InvalidArgument(_))));
    assert_eq!(processor.spawned(), 0);
}

#[test]
fn test_missing_delegate_is_rejected_synchronously() {
    let outcome = CallHandle::try_from(None::<ExecHandle<Vec<u32>>>);
    assert!(matches!(outcome, Err(Error::InvalidArgument(_))));
}
