//! Ingestion configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::WatchError;

/// Configuration consumed by the index loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Interval between catch-up cycles (milliseconds).
    pub poll_interval_ms: u64,
    /// Deadline for a single chain read, transport retries included (milliseconds).
    /// Kept separate from the tick so a stalled node cannot wedge the loop.
    pub request_timeout_ms: u64,
}

impl IngestConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Both intervals must be non-zero.
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.poll_interval_ms == 0 {
            return Err(WatchError::Internal("poll_interval_ms must be greater than 0".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(WatchError::Internal("request_timeout_ms must be greater than 0".into()));
        }
        Ok(())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 12_000,
            request_timeout_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_follow_millis() {
        let cfg = IngestConfig {
            poll_interval_ms: 250,
            request_timeout_ms: 1_500,
        };
        assert_eq!(cfg.poll_interval(), Duration::from_millis(250));
        assert_eq!(cfg.request_timeout(), Duration::from_millis(1_500));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        assert!(IngestConfig::default().validate().is_ok());
        let no_tick = IngestConfig {
            poll_interval_ms: 0,
            ..IngestConfig::default()
        };
        assert!(matches!(no_tick.validate(), Err(WatchError::Internal(_))));
        let no_deadline = IngestConfig {
            request_timeout_ms: 0,
            ..IngestConfig::default()
        };
        assert!(matches!(no_deadline.validate(), Err(WatchError::Internal(_))));
    }
}
