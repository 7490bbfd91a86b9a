//! # Session Tests
//!
//! Feed to projector wiring:
//! - DemoFeed timing under paused tokio time
//! - teardown stops delivery, even for events already queued
//! - follow-up events queued from subscriber callbacks
//! - config-driven sessions

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use pipelens::{
    DemoFeed, DemoFeedOptions, EventSink, Feed, FeedHandle, LensConfig, LogLevel,
    PipelineEvent, RejectPolicy, ScriptedFeed, Session, StepState,
};

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Feed that hands its sink to the test, so events can be pushed by hand
struct ManualFeed {
    slot: Arc<Mutex<Option<EventSink>>>,
}

impl Feed for ManualFeed {
    fn name(&self) -> &str {
        "manual"
    }

    fn start(self: Box<Self>, sink: EventSink) -> FeedHandle {
        let handle = sink.handle();
        *self.slot.lock() = Some(sink);
        handle
    }
}

fn manual_session() -> (Session, EventSink) {
    let slot = Arc::new(Mutex::new(None));
    let session = Session::start(
        ManualFeed {
            slot: Arc::clone(&slot),
        },
        RejectPolicy::Skip,
    );
    let sink = slot.lock().take().unwrap();
    (session, sink)
}

fn counting(session: &mut Session) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    session
        .subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .detach();
    calls
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// TEARDOWN
// ============================================================================

#[test]
fn no_delivery_after_teardown() {
    let (mut session, sink) = manual_session();
    let calls = counting(&mut session);

    assert!(sink.emit(PipelineEvent::declare("A", &[])));
    assert_eq!(session.pump().unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Queued but not yet applied
    assert!(sink.emit(PipelineEvent::log("A", LogLevel::Info, "late")));
    session.teardown();

    assert!(!sink.emit(PipelineEvent::log("A", LogLevel::Info, "later")));
    assert_eq!(session.pump().unwrap(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.stats().dropped, 1);
    assert!(session.snapshot().logs.is_empty());
}

#[test]
fn teardown_from_callback_stops_remaining_events() {
    let (mut session, sink) = manual_session();
    let handle = session.handle();
    let calls = counting(&mut session);

    let trigger = handle.clone();
    session
        .subscribe(move |snap| {
            if snap.logs.len() == 2 {
                trigger.teardown();
            }
        })
        .detach();

    for i in 0..5 {
        sink.emit(PipelineEvent::log("feed", LogLevel::Info, format!("{i}")));
    }
    assert_eq!(session.pump().unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.stats().dropped, 3);

    handle.teardown();
    assert!(session.is_torn_down());
}

#[test]
fn dropping_session_cancels_feed() {
    let (session, sink) = manual_session();
    drop(session);
    assert!(sink.is_cancelled());
    assert!(!sink.emit(PipelineEvent::declare("A", &[])));
}

// ============================================================================
// FOLLOW-UP EVENTS
// ============================================================================

#[test]
fn callbacks_queue_followups_instead_of_reentering() {
    let mut session = Session::start(
        ScriptedFeed::new(vec![
            PipelineEvent::declare("A", &[]),
            PipelineEvent::state("A", StepState::Running),
            PipelineEvent::state("A", StepState::Completed),
            PipelineEvent::log("A", LogLevel::Info, "after completion"),
        ]),
        RejectPolicy::Skip,
    );

    // Resolve done:<id> whenever a node completes
    let followups = session.sink();
    let resolved = Arc::new(Mutex::new(Vec::<String>::new()));
    let marks = Arc::clone(&resolved);
    session
        .subscribe(move |snap| {
            for (id, status) in &snap.states {
                let key = format!("done:{id}");
                if status.state == StepState::Completed
                    && !snap.memo.contains_key(&key)
                    && !marks.lock().contains(&key)
                {
                    marks.lock().push(key.clone());
                    followups.emit(PipelineEvent::memo(&key, json!(true), true));
                }
            }
        })
        .detach();

    assert_eq!(session.pump().unwrap(), 5);

    let snap = session.snapshot();
    assert!(snap.is_resolved("done:A"));
    // The follow-up lands right after the event that triggered it
    assert_eq!(snap.sequence, 5);
    assert_eq!(snap.logs.len(), 1);
}

// ============================================================================
// DEMO FEED
// ============================================================================

#[tokio::test(start_paused = true)]
async fn demo_feed_reproduces_mock_timeline() {
    let mut session = Session::start(
        DemoFeed::new(DemoFeedOptions {
            max_ticks: Some(6),
            ..DemoFeedOptions::default()
        }),
        RejectPolicy::Halt,
    );

    // Seed is emitted synchronously on start
    assert_eq!(session.pump().unwrap(), 11);
    let seeded = session.snapshot();
    assert_eq!(seeded.state_of("md2segments"), Some(StepState::Completed));
    assert_eq!(seeded.state_of("oracle_ask"), Some(StepState::Running));
    assert_eq!(seeded.blocked_on("reply_merge"), vec!["done:oracle_ask"]);
    assert!(seeded.logs.is_empty());

    let stats = session.run().await.unwrap();
    assert_eq!(stats.rejected, 0);
    assert_eq!(stats.applied, 11 + 6 + 3);

    let snap = session.snapshot();
    let messages: Vec<&str> = snap.logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(
        messages,
        (1..=6)
            .map(|i| format!("Processed batch {i}"))
            .collect::<Vec<_>>()
    );
    assert_eq!(snap.state_of("oracle_ask"), Some(StepState::Completed));
    assert_eq!(snap.state_of("reply_merge"), Some(StepState::Running));
    assert_eq!(snap.state_of("rotate_merged"), Some(StepState::Waiting));
    assert!(snap.is_resolved("done:oracle_ask"));
    assert_eq!(snap.wait_edges.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn demo_feed_ticks_on_interval() {
    let mut session = Session::start(DemoFeed::default(), RejectPolicy::Skip);
    session.pump().unwrap();
    settle().await;

    tokio::time::advance(Duration::from_millis(1499)).await;
    settle().await;
    session.pump().unwrap();
    assert!(session.snapshot().logs.is_empty());

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    session.pump().unwrap();
    assert_eq!(session.snapshot().logs.len(), 1);

    session.teardown();
    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(session.pump().unwrap(), 0);
    assert_eq!(session.snapshot().logs.len(), 1);
    assert!(session.handle().is_finished());
}

// ============================================================================
// CONFIG
// ============================================================================

#[tokio::test(start_paused = true)]
async fn session_from_config() {
    let config = LensConfig::from_yaml_str(
        r#"
feed:
  kind: demo
  interval_ms: 100
  handoff_after: 2
  max_ticks: 3
on_reject: halt
"#,
    )
    .unwrap();

    let mut session = Session::from_config(&config).unwrap();
    assert_eq!(session.policy(), RejectPolicy::Halt);

    let stats = session.run().await.unwrap();
    assert_eq!(stats.applied, 11 + 3 + 3);
    assert_eq!(
        session.snapshot().state_of("reply_merge"),
        Some(StepState::Running)
    );
}

#[test]
fn demo_config_without_runtime_is_an_error() {
    let config = LensConfig::default();
    let err = Session::from_config(&config).unwrap_err();
    assert_eq!(err.code(), Some("LENS-040"));
}

#[test]
fn demo_feed_without_runtime_starts_torn_down() {
    let mut session = Session::start(DemoFeed::default(), RejectPolicy::Skip);
    assert!(session.is_torn_down());
    assert_eq!(session.pump().unwrap(), 0);
    assert_eq!(session.snapshot().sequence, 0);
}
