//! Single-consumer event queue.
//!
//! Worker threads post dispatches through an [`EventQueue`]; the thread that
//! owns the [`EventLoop`] runs them one at a time, in the order they were
//! posted. Code that must not run concurrently with itself (listeners,
//! UI-facing state) is only ever touched from inside a dispatch.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

/// A unit of work posted to the event loop.
pub type Dispatch = Box<dyn FnOnce() + Send + 'static>;

/// Backlog size at which a stalled loop is reported.
pub const BACKLOG_WARN_THRESHOLD: usize = 10_000;

/// Create a connected queue/loop pair.
///
/// The queue is unbounded: posting never blocks a worker, so a loop that
/// stops draining lets the backlog grow. Crossing
/// [`BACKLOG_WARN_THRESHOLD`] pending dispatches logs a warning.
///
/// # Example
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use batchcall_core::notify::event_loop;
///
/// let (queue, mut events) = event_loop();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&seen);
/// std::thread::spawn(move || {
///     for n in 0..3 {
///         let sink = Arc::clone(&sink);
///         queue.post(move || sink.lock().unwrap().push(n));
///     }
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(events.blocking_run(), 3);
/// assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
/// ```
pub fn event_loop() -> (EventQueue, EventLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));
    (
        EventQueue {
            tx,
            pending: Arc::clone(&pending),
        },
        EventLoop { rx, pending },
    )
}

/// Producer side of the event loop. Cheap to clone and `Send`.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<Dispatch>,
    pending: Arc<AtomicUsize>,
}

impl EventQueue {
    /// Post a dispatch. Never blocks.
    ///
    /// Returns `false` if the loop has been dropped; the dispatch is
    /// discarded in that case.
    pub fn post(&self, dispatch: impl FnOnce() + Send + 'static) -> bool {
        // Counted before sending so the loop never decrements first.
        let backlog = self.pending.fetch_add(1, Ordering::Relaxed) + 1;
        if self.tx.send(Box::new(dispatch)).is_err() {
            self.pending.fetch_sub(1, Ordering::Relaxed);
            tracing::warn!("event loop is gone, dropping dispatch");
            return false;
        }
        if backlog == BACKLOG_WARN_THRESHOLD {
            tracing::warn!("event loop backlog reached {} dispatches", backlog);
        }
        true
    }

    /// Whether the consuming loop has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the event loop.
///
/// Owned by exactly one thread. The `blocking_*` methods must not be called
/// from inside an async runtime; use [`EventLoop::run`] or
/// [`EventLoop::dispatch_next`] there.
#[derive(Debug)]
pub struct EventLoop {
    rx: mpsc::UnboundedReceiver<Dispatch>,
    pending: Arc<AtomicUsize>,
}

impl EventLoop {
    /// Dispatches posted but not yet run.
    pub fn backlog(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Run everything already queued without waiting. Returns how many
    /// dispatches ran.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(dispatch) = self.rx.try_recv() {
            self.execute(dispatch);
            count += 1;
        }
        count
    }

    /// Wait for one dispatch and run it.
    ///
    /// Returns `false` once every queue has been dropped and nothing is left.
    pub fn blocking_dispatch_next(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(dispatch) => {
                self.execute(dispatch);
                true
            }
            None => false,
        }
    }

    /// Run dispatches until every queue has been dropped.
    pub fn blocking_run(&mut self) -> usize {
        let mut count = 0;
        while self.blocking_dispatch_next() {
            count += 1;
        }
        count
    }

    /// Async variant of [`EventLoop::blocking_dispatch_next`].
    pub async fn dispatch_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(dispatch) => {
                self.execute(dispatch);
                true
            }
            None => false,
        }
    }

    /// Async variant of [`EventLoop::blocking_run`].
    pub async fn run(&mut self) -> usize {
        let mut count = 0;
        while self.dispatch_next().await {
            count += 1;
        }
        count
    }

    /// Run one dispatch; a panic is logged and the loop keeps going.
    fn execute(&self, dispatch: Dispatch) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
        if panic::catch_unwind(AssertUnwindSafe(dispatch)).is_err() {
            tracing::error!("event dispatch panicked; continuing with the next one");
        }
    }
}
