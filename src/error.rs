//! Error types with fix suggestions
//!
//! Every projector failure is a caller error: it is returned synchronously
//! from `apply_event` and leaves the projected views untouched.

use std::fmt;

use thiserror::Error;

use crate::types::StepState;

/// Result alias used across the crate
pub type Result<T, E = LensError> = std::result::Result<T, E>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Why a `StateChanged` event was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionViolation {
    /// The state machine has no edge from the current state to the target
    IllegalStep,
    /// `running`/`completed` requested while a dependency is not completed
    DependencyNotCompleted { dependency: String },
    /// A wait list was supplied for a state other than `waiting`
    WaitKeysOutsideWaiting { count: usize },
}

impl fmt::Display for TransitionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalStep => write!(f, "no such transition"),
            Self::DependencyNotCompleted { dependency } => {
                write!(f, "dependency '{}' is not completed", dependency)
            }
            Self::WaitKeysOutsideWaiting { count } => {
                write!(f, "{} wait key(s) given outside the waiting state", count)
            }
        }
    }
}

/// Renders an optional previous state for error messages
fn from_label(from: &Option<StepState>) -> String {
    match from {
        Some(state) => state.to_string(),
        None => "(none)".to_string(),
    }
}

#[derive(Error, Debug)]
pub enum LensError {
    // ─────────────────────────────────────────────────────────────
    // Graph errors (LENS-010 to LENS-014)
    // ─────────────────────────────────────────────────────────────

    #[error("LENS-010: Node '{id}' already declared with dependencies {existing:?}, got {requested:?}")]
    DuplicateNode {
        id: String,
        existing: Vec<String>,
        requested: Vec<String>,
    },

    #[error("LENS-011: Node '{id}' is not declared")]
    UnknownNode { id: String },

    #[error("LENS-012: Node id must not be empty")]
    InvalidNodeId { id: String },

    #[error("LENS-013: Node '{id}' depends on undeclared node '{dependency}'")]
    DanglingDependency { id: String, dependency: String },

    #[error("LENS-014: Node '{id}' depending on '{dependency}' would create a cycle")]
    CyclicDependency { id: String, dependency: String },

    // ─────────────────────────────────────────────────────────────
    // State errors (LENS-020)
    // ─────────────────────────────────────────────────────────────

    #[error("LENS-020: Node '{id}' cannot move from {} to {to}: {reason}", from_label(.from))]
    InvalidTransition {
        id: String,
        from: Option<StepState>,
        to: StepState,
        reason: TransitionViolation,
    },

    // ─────────────────────────────────────────────────────────────
    // Memo errors (LENS-030)
    // ─────────────────────────────────────────────────────────────

    #[error("LENS-030: Memo '{key}' is unresolved but carries a value")]
    InvalidMemo { key: String },

    // ─────────────────────────────────────────────────────────────
    // Config / feed input errors (LENS-040 to LENS-041)
    // ─────────────────────────────────────────────────────────────

    #[error("LENS-040: Config error: {reason}")]
    Config { reason: String },

    #[error("LENS-041: Event script parse error: {0}")]
    ScriptParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LensError {
    /// Stable error code (e.g. `LENS-020`), `None` for wrapped IO errors
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::DuplicateNode { .. } => Some("LENS-010"),
            Self::UnknownNode { .. } => Some("LENS-011"),
            Self::InvalidNodeId { .. } => Some("LENS-012"),
            Self::DanglingDependency { .. } => Some("LENS-013"),
            Self::CyclicDependency { .. } => Some("LENS-014"),
            Self::InvalidTransition { .. } => Some("LENS-020"),
            Self::InvalidMemo { .. } => Some("LENS-030"),
            Self::Config { .. } => Some("LENS-040"),
            Self::ScriptParse(_) => Some("LENS-041"),
            Self::Io(_) => None,
        }
    }

    /// True for errors raised by the projector while applying an event
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::DuplicateNode { .. }
                | Self::UnknownNode { .. }
                | Self::InvalidNodeId { .. }
                | Self::DanglingDependency { .. }
                | Self::CyclicDependency { .. }
                | Self::InvalidTransition { .. }
                | Self::InvalidMemo { .. }
        )
    }
}

impl FixSuggestion for LensError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            LensError::DuplicateNode { .. } => {
                Some("Declare each node once, or re-declare it with the same dependencies")
            }
            LensError::UnknownNode { .. } => {
                Some("Emit node_declared for this id before any state_changed")
            }
            LensError::InvalidNodeId { .. } => Some("Give every node a non-empty id"),
            LensError::DanglingDependency { .. } => {
                Some("Declare dependencies before the nodes that depend on them")
            }
            LensError::CyclicDependency { .. } => Some("Remove the dependency on the node itself"),
            LensError::InvalidTransition { reason, .. } => match reason {
                TransitionViolation::IllegalStep => {
                    Some("Follow waiting -> running -> completed; completed and failed are final")
                }
                TransitionViolation::DependencyNotCompleted { .. } => {
                    Some("Complete every dependency before running or completing this node")
                }
                TransitionViolation::WaitKeysOutsideWaiting { .. } => {
                    Some("Only send waiting_for together with state: waiting")
                }
            },
            LensError::InvalidMemo { .. } => {
                Some("Send value: null while resolved is false")
            }
            LensError::Config { .. } => Some("Check pipelens.yaml syntax and values"),
            LensError::ScriptParse(_) => {
                Some("Each entry needs a type: node_declared | state_changed | memo_updated | log_emitted")
            }
            LensError::Io(_) => Some("Check file path and permissions"),
        }
    }
}
