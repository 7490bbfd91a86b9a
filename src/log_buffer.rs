//! Append-only log buffer with shared chunks
//!
//! Lines are stored in sealed `Arc<[LogLine]>` chunks of `LOG_CHUNK` lines
//! plus one open tail. Cloning copies the chunk pointers and the tail only,
//! so a snapshot copy-on-write does not duplicate the whole history.

use std::fmt;
use std::mem;
use std::ops::Index;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::types::LogLine;

/// Lines per sealed chunk
pub const LOG_CHUNK: usize = 256;

#[derive(Clone, Default)]
pub struct LogBuffer {
    sealed: Vec<Arc<[LogLine]>>,
    tail: Vec<LogLine>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: LogLine) {
        self.tail.push(line);
        if self.tail.len() == LOG_CHUNK {
            let full = mem::replace(&mut self.tail, Vec::with_capacity(LOG_CHUNK));
            self.sealed.push(Arc::from(full));
        }
    }

    pub fn len(&self) -> usize {
        self.sealed.len() * LOG_CHUNK + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sealed.is_empty() && self.tail.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LogLine> {
        let chunk = index / LOG_CHUNK;
        match self.sealed.get(chunk) {
            Some(lines) => lines.get(index % LOG_CHUNK),
            None if chunk == self.sealed.len() => self.tail.get(index % LOG_CHUNK),
            None => None,
        }
    }

    pub fn last(&self) -> Option<&LogLine> {
        self.tail
            .last()
            .or_else(|| self.sealed.last().and_then(|lines| lines.last()))
    }

    /// Lines in emit order
    pub fn iter(&self) -> impl Iterator<Item = &LogLine> + '_ {
        self.iter_from(0)
    }

    /// Lines from `start` on, skipping whole chunks without visiting them
    pub fn iter_from(&self, start: usize) -> impl Iterator<Item = &LogLine> + '_ {
        let remaining = self.len().saturating_sub(start);
        self.sealed
            .iter()
            .skip(start / LOG_CHUNK)
            .flat_map(|lines| lines.iter())
            .chain(self.tail.iter())
            .skip(start % LOG_CHUNK)
            .take(remaining)
    }
}

impl Index<usize> for LogBuffer {
    type Output = LogLine;

    fn index(&self, index: usize) -> &LogLine {
        match self.get(index) {
            Some(line) => line,
            None => panic!(
                "log index {} out of range for buffer of {} lines",
                index,
                self.len()
            ),
        }
    }
}

impl<'a> IntoIterator for &'a LogBuffer {
    type Item = &'a LogLine;
    type IntoIter = Box<dyn Iterator<Item = &'a LogLine> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl PartialEq for LogBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for LogBuffer {}

impl fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Serializes as a flat array of lines
impl Serialize for LogBuffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogLevel;
    use serde_json::json;

    fn line(n: usize) -> LogLine {
        LogLine {
            source: "oracle_ask".to_string(),
            level: LogLevel::Info,
            message: format!("Processed batch {}", n),
        }
    }

    fn filled(count: usize) -> LogBuffer {
        let mut logs = LogBuffer::new();
        for n in 0..count {
            logs.push(line(n));
        }
        logs
    }

    #[test]
    fn indexing_across_chunks() {
        let logs = filled(LOG_CHUNK * 2 + 3);
        assert_eq!(logs.len(), LOG_CHUNK * 2 + 3);
        assert_eq!(logs.sealed.len(), 2);
        assert_eq!(logs[0], line(0));
        assert_eq!(logs[LOG_CHUNK], line(LOG_CHUNK));
        assert_eq!(logs[LOG_CHUNK * 2 + 2], line(LOG_CHUNK * 2 + 2));
        assert_eq!(logs.last(), Some(&line(LOG_CHUNK * 2 + 2)));
        assert!(logs.get(LOG_CHUNK * 2 + 3).is_none());
        assert!(logs.get(LOG_CHUNK * 9).is_none());
    }

    #[test]
    fn last_of_exactly_full_chunk() {
        let logs = filled(LOG_CHUNK);
        assert!(logs.tail.is_empty());
        assert_eq!(logs.last(), Some(&line(LOG_CHUNK - 1)));
        assert_eq!(LogBuffer::new().last(), None);
    }

    #[test]
    fn iter_from_skips_prefix() {
        let logs = filled(LOG_CHUNK + 10);
        let from: Vec<&LogLine> = logs.iter_from(LOG_CHUNK - 2).collect();
        assert_eq!(from.len(), 12);
        assert_eq!(*from[0], line(LOG_CHUNK - 2));
        assert_eq!(logs.iter_from(LOG_CHUNK + 10).count(), 0);
        assert_eq!(logs.iter_from(LOG_CHUNK * 5).count(), 0);
        assert_eq!(logs.iter().count(), LOG_CHUNK + 10);
    }

    #[test]
    fn clone_shares_sealed_chunks() {
        let logs = filled(LOG_CHUNK * 3 + 1);
        let mut copy = logs.clone();
        copy.push(line(0));

        for (a, b) in logs.sealed.iter().zip(copy.sealed.iter()) {
            assert!(Arc::ptr_eq(a, b));
        }
        assert_eq!(logs.len() + 1, copy.len());
        assert_ne!(logs, copy);
    }

    #[test]
    fn serializes_as_flat_array() {
        let logs = filled(2);
        assert_eq!(
            serde_json::to_value(&logs).unwrap(),
            json!([
                {"source": "oracle_ask", "level": "info", "message": "Processed batch 0"},
                {"source": "oracle_ask", "level": "info", "message": "Processed batch 1"},
            ])
        );
    }
}
