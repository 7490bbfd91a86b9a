//! Feed - Connector Layer
//!
//! Abstracts the event source driving a projector.
//!
//! ```text
//!   Feed::start(sink) ──▶ EventSink ──▶ mpsc queue ──▶ Session ──▶ GraphStateProjector
//!        │
//!        └──▶ FeedHandle (teardown: cancel flag + abort timer task)
//! ```

mod demo;
mod scripted;

pub use demo::{DemoFeed, DemoFeedOptions};
pub use scripted::ScriptedFeed;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::PipelineEvent;

// ─────────────────────────────────────────────────────────────────────────────
// Feed Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Event source for one session
pub trait Feed: Send + 'static {
    /// Short name for logging
    fn name(&self) -> &str;

    /// Start emitting into `sink`. Timer-driven feeds must be started from
    /// inside a tokio runtime.
    fn start(self: Box<Self>, sink: EventSink) -> FeedHandle;
}

// ─────────────────────────────────────────────────────────────────────────────
// Event Sink
// ─────────────────────────────────────────────────────────────────────────────

/// Write end of a session's event queue
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
    cancelled: Arc<AtomicBool>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<PipelineEvent>, cancelled: Arc<AtomicBool>) -> Self {
        Self { tx, cancelled }
    }

    /// Queue an event in arrival order
    ///
    /// Returns false (queuing nothing) once the feed is torn down or the
    /// session is gone.
    pub fn emit(&self, event: PipelineEvent) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.tx.is_closed()
    }

    /// Handle sharing this sink's cancel flag
    pub fn handle(&self) -> FeedHandle {
        FeedHandle::new(Arc::clone(&self.cancelled))
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Feed Handle
// ─────────────────────────────────────────────────────────────────────────────

struct HandleState {
    cancelled: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HandleState {
    fn teardown(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for HandleState {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Teardown handle for a started feed
///
/// `teardown` is idempotent and synchronous: the cancel flag is set and any
/// timer task is aborted before it returns. Clones share one feed; dropping
/// the last clone tears down.
#[derive(Clone)]
pub struct FeedHandle {
    state: Arc<HandleState>,
}

impl FeedHandle {
    fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            state: Arc::new(HandleState {
                cancelled,
                task: Mutex::new(None),
            }),
        }
    }

    /// Attach the background task driving this feed
    pub fn with_task(self, task: JoinHandle<()>) -> Self {
        *self.state.task.lock() = Some(task);
        self
    }

    pub fn teardown(&self) {
        self.state.teardown();
    }

    pub fn is_torn_down(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// True once the feed's task (if any) has exited
    pub fn is_finished(&self) -> bool {
        self.state
            .task
            .lock()
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(true)
    }
}

impl fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedHandle")
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}
