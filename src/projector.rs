//! GraphStateProjector - pipeline events to observable graph state
//!
//! Single writer. Every event is validated against the current snapshot
//! before anything is mutated, so a rejected event leaves all views (and
//! the sequence counter) untouched and notifies nobody.
//!
//! Snapshots are shared as `Arc<Snapshot>`; the projector writes through
//! `Arc::make_mut`, so a snapshot handed out earlier never changes.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{LensError, Result, TransitionViolation};
use crate::event::PipelineEvent;
use crate::flow_graph::Declared;
use crate::observer::{ObserverList, Subscription};
use crate::snapshot::Snapshot;
use crate::types::{LogLevel, LogLine, MemoEntry, NodeId, StepState, StepStatus, WaitEdge};

/// Projects an ordered event sequence into graph, states, memo, wait edges
/// and logs
#[derive(Debug, Default)]
pub struct GraphStateProjector {
    current: Arc<Snapshot>,
    observers: ObserverList,
}

impl GraphStateProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event atomically and notify subscribers on success
    pub fn apply_event(&mut self, event: PipelineEvent) -> Result<()> {
        let kind = event.kind_name();
        match event {
            PipelineEvent::NodeDeclared { id, depends_on } => {
                self.declare(&id, &depends_on)?;
            }
            PipelineEvent::StateChanged {
                id,
                state,
                waiting_for,
            } => {
                self.change_state(&id, state, waiting_for)?;
            }
            PipelineEvent::MemoUpdated {
                key,
                value,
                resolved,
            } => {
                self.update_memo(key, value, resolved)?;
            }
            PipelineEvent::LogEmitted {
                source,
                level,
                message,
            } => {
                self.append_log(source, level, message);
            }
        }

        let snapshot = Arc::make_mut(&mut self.current);
        snapshot.sequence += 1;
        debug!(event = kind, sequence = snapshot.sequence, "Applied event");

        self.observers.notify(&self.current);
        Ok(())
    }

    /// Apply events in order, stopping at the first rejection
    ///
    /// Returns the number applied, or the index and error of the rejected
    /// event. Events before it stay applied.
    pub fn apply_all<I>(&mut self, events: I) -> std::result::Result<usize, (usize, LensError)>
    where
        I: IntoIterator<Item = PipelineEvent>,
    {
        let mut applied = 0;
        for (index, event) in events.into_iter().enumerate() {
            self.apply_event(event).map_err(|e| (index, e))?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Consistent point-in-time read (O(1) clone of an Arc)
    ///
    /// While a reader holds the returned snapshot, the next event copies
    /// the graph, state and memo maps. The log buffer copies only its chunk
    /// pointers and open tail, see [`crate::LogBuffer`].
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current)
    }

    /// Register a callback invoked with the new snapshot after every
    /// successful `apply_event`
    ///
    /// The callback cannot reach the projector mutably; to react with more
    /// events, send them through an `EventSink` instead.
    pub fn subscribe<F>(&mut self, callback: F) -> Subscription
    where
        F: FnMut(&Arc<Snapshot>) + Send + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }

    // ─────────────────────────────────────────────────────────────
    // Event handlers
    // ─────────────────────────────────────────────────────────────

    fn declare(&mut self, id: &str, depends_on: &[NodeId]) -> Result<()> {
        if self.current.graph.check(id, depends_on)? == Declared::Unchanged {
            return Ok(());
        }
        let snapshot = Arc::make_mut(&mut self.current);
        snapshot.graph.declare(id, depends_on)?;
        Ok(())
    }

    fn change_state(&mut self, id: &str, to: StepState, waiting_for: Vec<String>) -> Result<()> {
        let current = &self.current;
        let node: NodeId = match current.graph.key(id) {
            Some(key) => NodeId::clone(key),
            None => return Err(LensError::UnknownNode { id: id.to_string() }),
        };
        let from = current.state_of(id);

        let reject = |reason| LensError::InvalidTransition {
            id: id.to_string(),
            from,
            to,
            reason,
        };

        if to != StepState::Waiting && !waiting_for.is_empty() {
            return Err(reject(TransitionViolation::WaitKeysOutsideWaiting {
                count: waiting_for.len(),
            }));
        }

        if let Some(from) = from {
            if !from.can_transition_to(to) {
                return Err(reject(TransitionViolation::IllegalStep));
            }
        }

        if to.requires_dependencies() {
            if let Some(dep) = current
                .graph
                .dependencies(id)
                .iter()
                .find(|dep| current.state_of(dep) != Some(StepState::Completed))
            {
                return Err(reject(TransitionViolation::DependencyNotCompleted {
                    dependency: dep.to_string(),
                }));
            }
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(waiting_for.len());
        let keys: Vec<String> = waiting_for
            .iter()
            .filter(|key| seen.insert(key.as_str()))
            .cloned()
            .collect();

        let snapshot = Arc::make_mut(&mut self.current);
        snapshot.wait_edges.retain(|edge| edge.from != node);
        snapshot
            .wait_edges
            .extend(keys.iter().map(|key| WaitEdge {
                from: NodeId::clone(&node),
                to: key.clone(),
            }));
        trace!(node = id, from = ?from, to = %to, waits = keys.len(), "State changed");
        snapshot.states.insert(
            node,
            StepStatus {
                state: to,
                waiting_for: keys,
            },
        );
        Ok(())
    }

    fn update_memo(&mut self, key: String, value: Value, resolved: bool) -> Result<()> {
        if !resolved && !value.is_null() {
            return Err(LensError::InvalidMemo { key });
        }
        let snapshot = Arc::make_mut(&mut self.current);
        snapshot.memo.insert(key, MemoEntry { value, resolved });
        Ok(())
    }

    fn append_log(&mut self, source: String, level: LogLevel, message: String) {
        if !self.current.graph.contains(&source) {
            trace!(source = %source, "Log from undeclared source");
        }
        let snapshot = Arc::make_mut(&mut self.current);
        snapshot.logs.push(LogLine {
            source,
            level,
            message,
        });
    }
}
