//! Session - one projector driven by one feed
//!
//! Events are applied strictly in arrival order. Teardown is checked before
//! every application, so nothing queued is applied once it returns.
//!
//! Subscriber callbacks cannot call back into the projector. They queue
//! follow-up events through [`Session::sink`]; those are applied right after
//! the event that triggered them, before the next feed event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::config::LensConfig;
use crate::error::Result;
use crate::event::PipelineEvent;
use crate::feed::{EventSink, Feed, FeedHandle};
use crate::observer::Subscription;
use crate::projector::GraphStateProjector;
use crate::snapshot::Snapshot;

/// What to do when the projector rejects an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectPolicy {
    /// Log the rejection and keep going
    #[default]
    Skip,
    /// Tear the feed down and return the error
    Halt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub applied: u64,
    pub rejected: u64,
    /// Events still queued when the feed was torn down
    pub dropped: u64,
}

pub struct Session {
    projector: GraphStateProjector,
    events: UnboundedReceiverStream<PipelineEvent>,
    followups_tx: mpsc::UnboundedSender<PipelineEvent>,
    followups: mpsc::UnboundedReceiver<PipelineEvent>,
    cancelled: Arc<AtomicBool>,
    handle: FeedHandle,
    policy: RejectPolicy,
    stats: SessionStats,
    feed_name: String,
    closed: bool,
}

impl Session {
    /// Start `feed` against a fresh projector
    pub fn start<F: Feed>(feed: F, policy: RejectPolicy) -> Self {
        Self::start_boxed(Box::new(feed), policy)
    }

    pub fn start_boxed(feed: Box<dyn Feed>, policy: RejectPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (followups_tx, followups) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let feed_name = feed.name().to_string();

        info!(feed = %feed_name, ?policy, "Session started");
        let handle = feed.start(EventSink::new(tx, Arc::clone(&cancelled)));

        Self {
            projector: GraphStateProjector::new(),
            events: UnboundedReceiverStream::new(rx),
            followups_tx,
            followups,
            cancelled,
            handle,
            policy,
            stats: SessionStats::default(),
            feed_name,
            closed: false,
        }
    }

    /// Build the configured feed and start it
    ///
    /// A demo feed needs a tokio runtime; without one this returns a
    /// config error.
    pub fn from_config(config: &LensConfig) -> Result<Self> {
        let feed = config.build_feed()?;
        Ok(Self::start_boxed(feed, config.on_reject))
    }

    /// Apply every event already queued, without waiting
    ///
    /// Returns how many were applied.
    pub fn pump(&mut self) -> Result<usize> {
        let mut applied = 0;
        loop {
            if self.check_torn_down() {
                break;
            }
            match feed_queue(&mut self.events).try_recv() {
                Ok(event) => applied += self.process(event)?,
                Err(_) => break,
            }
        }
        Ok(applied)
    }

    /// Apply events until the feed finishes or is torn down
    ///
    /// A timer feed runs until teardown unless it has a tick limit.
    pub async fn run(&mut self) -> Result<SessionStats> {
        loop {
            if self.check_torn_down() {
                break;
            }
            match feed_queue(&mut self.events).try_recv() {
                Ok(event) => {
                    self.process(event)?;
                    continue;
                }
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
            if self.handle.is_finished() {
                break;
            }
            match self.events.next().await {
                Some(event) => {
                    if self.check_torn_down() {
                        self.stats.dropped += 1;
                        break;
                    }
                    self.process(event)?;
                }
                None => break,
            }
        }

        debug!(feed = %self.feed_name, stats = ?self.stats, "Session run finished");
        Ok(self.stats)
    }

    /// Stop the feed and drop anything still queued. Idempotent.
    pub fn teardown(&mut self) {
        self.handle.teardown();
        self.check_torn_down();
    }

    /// Sink for follow-up events, typically captured by a subscriber
    /// callback. Emits are refused after teardown.
    pub fn sink(&self) -> EventSink {
        EventSink::new(self.followups_tx.clone(), Arc::clone(&self.cancelled))
    }

    /// Shared teardown handle for the running feed
    pub fn handle(&self) -> FeedHandle {
        self.handle.clone()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> Subscription
    where
        F: FnMut(&Arc<Snapshot>) + Send + 'static,
    {
        self.projector.subscribe(callback)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.projector.snapshot()
    }

    pub fn projector(&self) -> &GraphStateProjector {
        &self.projector
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn policy(&self) -> RejectPolicy {
        self.policy
    }

    pub fn is_torn_down(&self) -> bool {
        self.handle.is_torn_down()
    }

    // ─────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────

    /// Returns whether the feed is torn down; on the first observation,
    /// counts and discards queued events and closes the queue.
    fn check_torn_down(&mut self) -> bool {
        if !self.cancelled.load(Ordering::Acquire) {
            return false;
        }
        if !self.closed {
            self.closed = true;
            let rx = feed_queue(&mut self.events);
            rx.close();
            while rx.try_recv().is_ok() {
                self.stats.dropped += 1;
            }
            self.followups.close();
            while self.followups.try_recv().is_ok() {
                self.stats.dropped += 1;
            }
            info!(feed = %self.feed_name, dropped = self.stats.dropped, "Session torn down");
        }
        true
    }

    /// Apply one feed event plus any follow-ups it triggers; returns how
    /// many were applied
    fn process(&mut self, event: PipelineEvent) -> Result<usize> {
        let mut applied = 0;
        let mut next = Some(event);
        while let Some(event) = next.take() {
            if self.check_torn_down() {
                self.stats.dropped += 1;
                break;
            }
            if self.apply_one(event)? {
                applied += 1;
            }
            next = self.followups.try_recv().ok();
        }
        Ok(applied)
    }

    /// Apply one event. `Ok(false)` means it was rejected and skipped.
    fn apply_one(&mut self, event: PipelineEvent) -> Result<bool> {
        let kind = event.kind_name();
        match self.projector.apply_event(event) {
            Ok(()) => {
                self.stats.applied += 1;
                Ok(true)
            }
            Err(err) => {
                self.stats.rejected += 1;
                warn!(
                    feed = %self.feed_name,
                    event = kind,
                    code = err.code().unwrap_or("-"),
                    error = %err,
                    "Rejected event"
                );
                match self.policy {
                    RejectPolicy::Skip => Ok(false),
                    RejectPolicy::Halt => {
                        self.teardown();
                        Err(err)
                    }
                }
            }
        }
    }
}

fn feed_queue(
    events: &mut UnboundedReceiverStream<PipelineEvent>,
) -> &mut mpsc::UnboundedReceiver<PipelineEvent> {
    events.as_mut()
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("feed", &self.feed_name)
            .field("policy", &self.policy)
            .field("stats", &self.stats)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}
