//! Session configuration
//!
//! Loaded from a YAML file (conventionally `pipelens.yaml`):
//!
//! ```yaml
//! feed:
//!   kind: demo          # or: script
//!   interval_ms: 1500
//!   handoff_after: 5
//!   max_ticks: 20
//! on_reject: skip       # or: halt
//! ```
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`PIPELENS_TICK_MS`, `PIPELENS_ON_REJECT`)
//! 2. Config file
//! 3. Defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::time::Duration;

use crate::error::{LensError, Result};
use crate::feed::{DemoFeed, DemoFeedOptions, Feed, ScriptedFeed};
use crate::session::RejectPolicy;

pub const ENV_TICK_MS: &str = "PIPELENS_TICK_MS";
pub const ENV_ON_REJECT: &str = "PIPELENS_ON_REJECT";

fn default_interval_ms() -> u64 {
    1500
}

fn default_handoff_after() -> u64 {
    5
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LensConfig {
    /// Which feed drives the session
    #[serde(default)]
    pub feed: FeedConfig,

    /// What the session does with a rejected event
    #[serde(default)]
    pub on_reject: RejectPolicy,
}

/// Feed selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedConfig {
    Demo {
        #[serde(default = "default_interval_ms")]
        interval_ms: u64,
        #[serde(default = "default_handoff_after")]
        handoff_after: u64,
        #[serde(default)]
        max_ticks: Option<u64>,
    },
    Script {
        path: PathBuf,
    },
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::Demo {
            interval_ms: default_interval_ms(),
            handoff_after: default_handoff_after(),
            max_ticks: None,
        }
    }
}

impl LensConfig {
    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| LensError::Config {
            reason: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| LensError::Config {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Merge with environment variables
    pub fn with_env(self) -> Result<Self> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Merge with variables from `lookup` (environment in production)
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TICK_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| LensError::Config {
                reason: format!("{} must be a whole number of milliseconds, got '{}'", ENV_TICK_MS, raw),
            })?;
            if let FeedConfig::Demo { interval_ms, .. } = &mut self.feed {
                *interval_ms = ms;
            }
        }

        if let Some(raw) = lookup(ENV_ON_REJECT) {
            self.on_reject = match raw.trim().to_ascii_lowercase().as_str() {
                "skip" => RejectPolicy::Skip,
                "halt" => RejectPolicy::Halt,
                _ => {
                    return Err(LensError::Config {
                        reason: format!("{} must be 'skip' or 'halt', got '{}'", ENV_ON_REJECT, raw),
                    })
                }
            };
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if let FeedConfig::Demo {
            interval_ms,
            handoff_after,
            ..
        } = &self.feed
        {
            if *interval_ms == 0 {
                return Err(LensError::Config {
                    reason: "feed.interval_ms must be greater than 0".to_string(),
                });
            }
            if *handoff_after == 0 {
                return Err(LensError::Config {
                    reason: "feed.handoff_after must be greater than 0".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Instantiate the configured feed
    ///
    /// A demo feed must be built inside a tokio runtime.
    pub fn build_feed(&self) -> Result<Box<dyn Feed>> {
        match &self.feed {
            FeedConfig::Demo {
                interval_ms,
                handoff_after,
                max_ticks,
            } => {
                if let Err(e) = Handle::try_current() {
                    return Err(LensError::Config {
                        reason: format!("demo feed needs a running tokio runtime: {}", e),
                    });
                }
                Ok(Box::new(DemoFeed::new(DemoFeedOptions {
                    interval: Duration::from_millis(*interval_ms),
                    handoff_after: *handoff_after,
                    max_ticks: *max_ticks,
                })))
            }
            FeedConfig::Script { path } => Ok(Box::new(ScriptedFeed::load(path)?)),
        }
    }
}
