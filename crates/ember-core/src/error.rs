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

//! Error types surfaced by the event system.
//!
//! Almost nothing in dispatch is an error: missing handlers, duplicate
//! registrations and unconsumed payloads are ordinary control flow. What is
//! left is payload validation and configuration.

use std::fmt;

/// An error raised by the event system or by a payload constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// A payload constructor rejected its arguments. No handler ran.
    InvalidPayload {
        /// The short type name of the payload being built.
        payload: &'static str,
        /// Why the arguments were rejected.
        reason: String,
    },
    /// The dispatch configuration could not be parsed or is out of range.
    InvalidConfig(String),
    /// The process-wide dispatcher was already created before a custom
    /// configuration could be installed.
    GlobalAlreadyInstalled,
}

impl EventError {
    /// Shorthand for [`EventError::InvalidPayload`].
    pub fn invalid_payload(payload: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            payload,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::InvalidPayload { payload, reason } => {
                write!(f, "Invalid '{payload}' payload: {reason}")
            }
            EventError::InvalidConfig(details) => {
                write!(f, "Invalid dispatch configuration: {details}")
            }
            EventError::GlobalAlreadyInstalled => {
                write!(f, "The global event dispatcher is already initialized")
            }
        }
    }
}

impl std::error::Error for EventError {}

/// A specialized `Result` type for event system operations.
pub type EventResult<T> = Result<T, EventError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid_payload() {
        let err = EventError::invalid_payload("WindowResized", "width must be non-zero");
        assert_eq!(
            err.to_string(),
            "Invalid 'WindowResized' payload: width must be non-zero"
        );
    }

    #[test]
    fn test_display_config() {
        let err = EventError::InvalidConfig("flush_batch_size must be > 0".to_string());
        assert!(err.to_string().contains("flush_batch_size"));
    }
}
