//! Domain types for the projected views
//!
//! Node ids use `Arc<str>` so the graph, the state table and the wait edges
//! can share one allocation per id.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LensError, Result};

/// Identifier of a declared pipeline step
pub type NodeId = Arc<str>;

/// Any non-empty string is a valid node id
pub fn validate_node_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(LensError::InvalidNodeId { id: id.to_string() });
    }
    Ok(())
}

// ============================================================================
// NODE
// ============================================================================

/// Graph entry for one node: `{ depends_on: [id] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub depends_on: Vec<NodeId>,
}

// ============================================================================
// STEP STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Waiting,
    Running,
    Completed,
    Failed,
}

impl StepState {
    /// `completed` and `failed` have no outgoing transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// States that require every dependency to be completed
    pub fn requires_dependencies(self) -> bool {
        matches!(self, Self::Running | Self::Completed)
    }

    /// Edge check for the per-node state machine
    ///
    /// `waiting -> waiting` and `running -> running` are accepted so that a
    /// wait list can be updated and a repeated delivery is harmless.
    pub fn can_transition_to(self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (Waiting, Waiting)
                | (Waiting, Running)
                | (Waiting, Failed)
                | (Running, Running)
                | (Running, Completed)
                | (Running, Failed)
        )
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Per-node run state: `{ state, waiting_for: [key] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    pub state: StepState,
    #[serde(default)]
    pub waiting_for: Vec<String>,
}

impl StepStatus {
    pub fn new(state: StepState) -> Self {
        Self {
            state,
            waiting_for: Vec::new(),
        }
    }

    pub fn waiting(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            state: StepState::Waiting,
            waiting_for: keys.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// MEMO
// ============================================================================

/// Memo table entry: `{ value, resolved }`
///
/// `resolved == false` implies `value == null`. A resolved entry may still
/// hold `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoEntry {
    #[serde(default)]
    pub value: Value,
    pub resolved: bool,
}

impl MemoEntry {
    pub fn pending() -> Self {
        Self {
            value: Value::Null,
            resolved: false,
        }
    }

    pub fn resolved(value: Value) -> Self {
        Self {
            value,
            resolved: true,
        }
    }
}

// ============================================================================
// WAIT EDGE
// ============================================================================

/// `from` node is blocked on wait-key `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaitEdge {
    pub from: NodeId,
    pub to: String,
}

// ============================================================================
// LOGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub source: String,
    pub level: LogLevel,
    pub message: String,
}
