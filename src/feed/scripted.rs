//! Scripted Feed - deterministic, timer-free event replay
//!
//! Emits a fixed event list synchronously on start. Scripts are YAML (or
//! JSON) sequences of tagged events:
//!
//! ```yaml
//! - type: node_declared
//!   id: fetch
//! - type: state_changed
//!   id: fetch
//!   state: running
//! ```

use std::path::Path;

use super::{EventSink, Feed, FeedHandle};
use crate::error::Result;
use crate::event::PipelineEvent;

#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    events: Vec<PipelineEvent>,
}

impl ScriptedFeed {
    pub fn new(events: Vec<PipelineEvent>) -> Self {
        Self { events }
    }

    pub fn from_yaml_str(script: &str) -> Result<Self> {
        let events: Vec<PipelineEvent> = serde_yaml::from_str(script)?;
        Ok(Self::new(events))
    }

    /// Load a script file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let script = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&script)
    }

    pub fn events(&self) -> &[PipelineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl From<Vec<PipelineEvent>> for ScriptedFeed {
    fn from(events: Vec<PipelineEvent>) -> Self {
        Self::new(events)
    }
}

impl Feed for ScriptedFeed {
    fn name(&self) -> &str {
        "scripted"
    }

    fn start(self: Box<Self>, sink: EventSink) -> FeedHandle {
        let handle = sink.handle();
        for event in self.events {
            if !sink.emit(event) {
                break;
            }
        }
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogLevel, StepState};
    use serde_json::json;
    use std::io::Write;

    const SCRIPT: &str = r#"
- type: node_declared
  id: fetch
- type: node_declared
  id: merge
  depends_on: [fetch]
- type: state_changed
  id: fetch
  state: running
- type: memo_updated
  key: "done:fetch"
  value: null
  resolved: false
- type: log_emitted
  source: fetch
  level: warn
  message: retrying
"#;

    #[test]
    fn parses_yaml_script() {
        let feed = ScriptedFeed::from_yaml_str(SCRIPT).unwrap();
        assert_eq!(feed.len(), 5);
        assert_eq!(feed.events()[1], PipelineEvent::declare("merge", &["fetch"]));
        assert_eq!(
            feed.events()[2],
            PipelineEvent::state("fetch", StepState::Running)
        );
        assert_eq!(
            feed.events()[4],
            PipelineEvent::log("fetch", LogLevel::Warn, "retrying")
        );
    }

    #[test]
    fn parses_json_script() {
        let json = json!([
            {"type": "memo_updated", "key": "x", "value": true, "resolved": true}
        ])
        .to_string();
        let feed = ScriptedFeed::from_yaml_str(&json).unwrap();
        assert_eq!(feed.events()[0], PipelineEvent::memo("x", json!(true), true));
    }

    #[test]
    fn rejects_malformed_script() {
        let err = ScriptedFeed::from_yaml_str("- type: teleport\n  id: a\n").unwrap_err();
        assert_eq!(err.code(), Some("LENS-041"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCRIPT.as_bytes()).unwrap();

        let feed = ScriptedFeed::load(file.path()).unwrap();
        assert_eq!(feed.len(), 5);
        assert!(ScriptedFeed::load("/definitely/not/here.yaml").is_err());
    }
}
