//! Pipeline events consumed by the projector
//!
//! - PipelineEvent: 4 variants (graph / state / memo / log)
//! - Serialized as internally tagged JSON or YAML (`type: node_declared`)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{LogLevel, NodeId, StepState};

/// One event from a feed
///
/// Uses Arc<str> for node ids to enable zero-cost cloning into the views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    NodeDeclared {
        id: NodeId,
        #[serde(default)]
        depends_on: Vec<NodeId>,
    },
    StateChanged {
        id: NodeId,
        state: StepState,
        #[serde(default)]
        waiting_for: Vec<String>,
    },
    MemoUpdated {
        key: String,
        #[serde(default)]
        value: Value,
        resolved: bool,
    },
    /// `source` need not be a declared node
    LogEmitted {
        source: String,
        level: LogLevel,
        message: String,
    },
}

impl PipelineEvent {
    pub fn declare(id: &str, depends_on: &[&str]) -> Self {
        Self::NodeDeclared {
            id: id.into(),
            depends_on: depends_on.iter().map(|d| NodeId::from(*d)).collect(),
        }
    }

    pub fn state(id: &str, state: StepState) -> Self {
        Self::StateChanged {
            id: id.into(),
            state,
            waiting_for: Vec::new(),
        }
    }

    pub fn waiting(id: &str, keys: &[&str]) -> Self {
        Self::StateChanged {
            id: id.into(),
            state: StepState::Waiting,
            waiting_for: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn memo(key: &str, value: Value, resolved: bool) -> Self {
        Self::MemoUpdated {
            key: key.to_string(),
            value,
            resolved,
        }
    }

    pub fn log(source: &str, level: LogLevel, message: impl Into<String>) -> Self {
        Self::LogEmitted {
            source: source.to_string(),
            level,
            message: message.into(),
        }
    }

    /// Snake-case tag of the variant (matches the serialized `type`)
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::NodeDeclared { .. } => "node_declared",
            Self::StateChanged { .. } => "state_changed",
            Self::MemoUpdated { .. } => "memo_updated",
            Self::LogEmitted { .. } => "log_emitted",
        }
    }

    /// Extract node id if event targets a declared node
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeDeclared { id, .. } | Self::StateChanged { id, .. } => Some(id),
            Self::MemoUpdated { .. } | Self::LogEmitted { .. } => None,
        }
    }
}
