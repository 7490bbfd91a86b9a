//! Snapshot - point-in-time read of every projected view
//!
//! Selectors derive presentation data (progress, blocked steps, ready steps)
//! without touching the projector.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::flow_graph::FlowGraph;
use crate::log_buffer::LogBuffer;
use crate::types::{LogLine, MemoEntry, NodeId, StepState, StepStatus, WaitEdge};

/// Immutable view handed to readers and subscribers
///
/// Serialized shape:
/// `{ graph, states, memo, waitEdges, logs, sequence }`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub graph: FlowGraph,
    pub states: BTreeMap<NodeId, StepStatus>,
    pub memo: BTreeMap<String, MemoEntry>,
    #[serde(rename = "waitEdges")]
    pub wait_edges: Vec<WaitEdge>,
    pub logs: LogBuffer,
    /// Number of events applied so far
    pub sequence: u64,
}

impl Snapshot {
    pub fn state_of(&self, id: &str) -> Option<StepState> {
        self.states.get(id).map(|status| status.state)
    }

    pub fn is_resolved(&self, key: &str) -> bool {
        self.memo.get(key).map(|entry| entry.resolved).unwrap_or(false)
    }

    /// Get completed node count
    pub fn completed_count(&self) -> usize {
        self.states
            .values()
            .filter(|status| status.state == StepState::Completed)
            .count()
    }

    /// Completed nodes as a percentage of declared nodes
    pub fn progress(&self) -> f32 {
        if self.graph.is_empty() {
            return 0.0;
        }
        (self.completed_count() as f32 / self.graph.len() as f32) * 100.0
    }

    /// Wait-keys of `id` that have no resolved memo entry yet
    pub fn blocked_on(&self, id: &str) -> Vec<&str> {
        match self.states.get(id) {
            Some(status) if status.state == StepState::Waiting => status
                .waiting_for
                .iter()
                .map(String::as_str)
                .filter(|key| !self.is_resolved(key))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn unresolved_wait_edges(&self) -> Vec<&WaitEdge> {
        self.wait_edges
            .iter()
            .filter(|edge| !self.is_resolved(&edge.to))
            .collect()
    }

    /// Declared nodes that could start now: not started (or waiting), all
    /// dependencies completed and every wait-key resolved
    pub fn ready_nodes(&self) -> Vec<NodeId> {
        self.graph
            .iter()
            .filter(|(id, _)| match self.state_of(id) {
                None => true,
                Some(StepState::Waiting) => self.blocked_on(id).is_empty(),
                Some(_) => false,
            })
            .filter(|(_, spec)| {
                spec.depends_on
                    .iter()
                    .all(|dep| self.state_of(dep) == Some(StepState::Completed))
            })
            .map(|(id, _)| NodeId::clone(id))
            .collect()
    }

    pub fn logs_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a LogLine> + 'a {
        self.logs.iter().filter(move |line| line.source == source)
    }

    /// Presentation JSON
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
