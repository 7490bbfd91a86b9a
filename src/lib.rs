//! pipelens - graph-state projector for pipeline visualization
//!
//! Consumes an ordered stream of pipeline events and maintains the views a
//! front end renders: dependency graph, per-step run state, memo table,
//! wait edges and an append-only log.
//!
//! ```text
//! Feed ──▶ Session ──▶ GraphStateProjector ──▶ Arc<Snapshot> ──▶ subscribers
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod flow_graph;
pub mod log_buffer;
mod observer;
pub mod projector;
pub mod session;
pub mod snapshot;
pub mod types;

pub use config::{FeedConfig, LensConfig};
pub use error::{FixSuggestion, LensError, TransitionViolation};
pub use event::PipelineEvent;
pub use feed::{DemoFeed, DemoFeedOptions, EventSink, Feed, FeedHandle, ScriptedFeed};
pub use flow_graph::{Declared, FlowGraph};
pub use log_buffer::LogBuffer;
pub use observer::Subscription;
pub use projector::GraphStateProjector;
pub use session::{RejectPolicy, Session, SessionStats};
pub use snapshot::Snapshot;
pub use types::{LogLevel, LogLine, MemoEntry, NodeId, NodeSpec, StepState, StepStatus, WaitEdge};
