//! Configuration for evaluation sessions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::DEFAULT_EVENT_CAPACITY;

/// Configuration for an [`EvaluationSession`](super::EvaluationSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the queue event broadcast channel.
    pub event_capacity: usize,

    /// Maximum time a single evaluation may take before it is rejected.
    /// `None` waits indefinitely.
    pub evaluation_timeout_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            evaluation_timeout_ms: None,
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("EVALQ_EVENT_CAPACITY") {
            if let Ok(n) = val.parse() {
                config.event_capacity = n;
            }
        }

        if let Ok(val) = std::env::var("EVALQ_EVALUATION_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                config.evaluation_timeout_ms = Some(n);
            }
        }

        config
    }

    /// Set the per-evaluation timeout, saturating at `u64::MAX` milliseconds.
    pub fn with_evaluation_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.evaluation_timeout_ms = Some(millis);
        self
    }

    pub fn evaluation_timeout(&self) -> Option<Duration> {
        self.evaluation_timeout_ms.map(Duration::from_millis)
    }
}
