// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime configuration of a dispatcher.

use crate::error::{EventError, EventResult};
use serde::{Deserialize, Serialize};

/// Default number of queued payloads drained per flush iteration.
pub const DEFAULT_FLUSH_BATCH_SIZE: usize = 64;

/// Tunables for an [`EventDispatcher`](crate::event::EventDispatcher).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use ember_core::DispatchConfig;
///
/// let config = DispatchConfig::from_json_str(r#"{ "flush_batch_size": 16 }"#).unwrap();
/// assert_eq!(config.flush_batch_size, 16);
/// assert!(config.trace_events);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of queued payloads popped per drain iteration of a flush.
    pub flush_batch_size: usize,
    /// Whether every notified payload is rendered to the log.
    pub trace_events: bool,
    /// The level used for payload traces.
    pub trace_level: log::Level,
}

impl DispatchConfig {
    /// Parses a configuration from JSON and validates it.
    pub fn from_json_str(json: &str) -> EventResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EventError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values are usable.
    pub fn validate(&self) -> EventResult<()> {
        if self.flush_batch_size == 0 {
            return Err(EventError::InvalidConfig(
                "flush_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            flush_batch_size: DEFAULT_FLUSH_BATCH_SIZE,
            trace_events: true,
            trace_level: log::Level::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.flush_batch_size, DEFAULT_FLUSH_BATCH_SIZE);
        assert!(config.trace_events);
        assert_eq!(config.trace_level, log::Level::Trace);
    }

    #[test]
    fn test_parse_partial_json() {
        let config = DispatchConfig::from_json_str(r#"{"trace_level": "DEBUG"}"#).unwrap();
        assert_eq!(config.trace_level, log::Level::Debug);
        assert_eq!(config.flush_batch_size, DEFAULT_FLUSH_BATCH_SIZE);
    }

    #[test]
    fn test_rejects_zero_batch() {
        let err = DispatchConfig::from_json_str(r#"{"flush_batch_size": 0}"#).unwrap_err();
        assert!(matches!(err, EventError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(DispatchConfig::from_json_str("{ not json").is_err());
    }
}
