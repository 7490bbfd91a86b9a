//! Demo Feed - timer-driven sample pipeline
//!
//! Seeds a four-step pipeline, then logs one batch per tick. After
//! `handoff_after` batches `oracle_ask` completes and `reply_merge` starts.

use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, warn};

use super::{EventSink, Feed, FeedHandle};
use crate::event::PipelineEvent;
use crate::types::{LogLevel, StepState};

/// Timing knobs for [`DemoFeed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoFeedOptions {
    /// Period between batches; the first batch fires one period after start
    pub interval: Duration,
    /// Batch number that completes `oracle_ask`
    pub handoff_after: u64,
    /// Stop after this many batches (runs until teardown if `None`)
    pub max_ticks: Option<u64>,
}

impl Default for DemoFeedOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1500),
            handoff_after: 5,
            max_ticks: None,
        }
    }
}

/// Sample feed for demos and UI work
#[derive(Debug, Clone, Default)]
pub struct DemoFeed {
    options: DemoFeedOptions,
}

impl DemoFeed {
    pub fn new(mut options: DemoFeedOptions) -> Self {
        // tokio intervals reject a zero period
        options.interval = options.interval.max(Duration::from_millis(1));
        Self { options }
    }

    pub fn options(&self) -> &DemoFeedOptions {
        &self.options
    }

    /// Initial graph, states and memo table (dependencies first)
    pub fn seed_events() -> Vec<PipelineEvent> {
        vec![
            PipelineEvent::declare("md2segments", &[]),
            PipelineEvent::declare("oracle_ask", &["md2segments"]),
            PipelineEvent::declare("reply_merge", &["oracle_ask"]),
            PipelineEvent::declare("rotate_merged", &["reply_merge"]),
            PipelineEvent::state("md2segments", StepState::Completed),
            PipelineEvent::state("oracle_ask", StepState::Running),
            PipelineEvent::waiting("reply_merge", &["done:oracle_ask"]),
            PipelineEvent::waiting("rotate_merged", &["done:reply_merge"]),
            PipelineEvent::memo("done:md2segments", json!(true), true),
            PipelineEvent::memo("done:oracle_ask", Value::Null, false),
            PipelineEvent::memo("stories.jsonl", json!(4821), true),
        ]
    }

    /// Events for batch number `batch` (1-based)
    pub fn tick_events(batch: u64, handoff_after: u64) -> Vec<PipelineEvent> {
        let mut events = vec![PipelineEvent::log(
            "oracle_ask",
            LogLevel::Info,
            format!("Processed batch {}", batch),
        )];
        if batch == handoff_after {
            events.push(PipelineEvent::state("oracle_ask", StepState::Completed));
            events.push(PipelineEvent::memo("done:oracle_ask", json!(true), true));
            events.push(PipelineEvent::state("reply_merge", StepState::Running));
        }
        events
    }

    async fn run(sink: EventSink, options: DemoFeedOptions) {
        let mut ticker = time::interval_at(Instant::now() + options.interval, options.interval);
        let mut batch: u64 = 0;

        loop {
            if options.max_ticks.is_some_and(|max| batch >= max) {
                break;
            }
            ticker.tick().await;
            batch += 1;

            for event in Self::tick_events(batch, options.handoff_after) {
                if !sink.emit(event) {
                    debug!(batch, "Demo feed cancelled");
                    return;
                }
            }
        }

        debug!(batches = batch, "Demo feed finished");
    }
}

impl Feed for DemoFeed {
    fn name(&self) -> &str {
        "demo"
    }

    /// Outside a tokio runtime nothing is emitted and the returned handle
    /// is already torn down.
    fn start(self: Box<Self>, sink: EventSink) -> FeedHandle {
        let handle = sink.handle();
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "Demo feed started outside a tokio runtime");
                handle.teardown();
                return handle;
            }
        };

        for event in Self::seed_events() {
            if !sink.emit(event) {
                return handle;
            }
        }

        let task = runtime.spawn(Self::run(sink, self.options));
        handle.with_task(task)
    }
}
