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

//! Window payloads.

use crate::error::{EventError, EventResult};
use crate::event::Event;

/// Identifies a window across payloads.
pub type WindowId = u64;

/// The inner area of a window changed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Event)]
#[event(debug)]
pub struct WindowResized {
    /// The window that was resized.
    pub window: WindowId,
    /// The new width in physical pixels.
    pub width: u32,
    /// The new height in physical pixels.
    pub height: u32,
}

impl WindowResized {
    /// Validates the new extent. A zero-sized window is reported through
    /// minimization, not resizing.
    pub fn new(window: WindowId, width: u32, height: u32) -> EventResult<Self> {
        if width == 0 || height == 0 {
            return Err(EventError::invalid_payload(
                "WindowResized",
                format!("extent must be non-zero, got {width}x{height}"),
            ));
        }
        Ok(Self {
            window,
            width,
            height,
        })
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// The user asked to close a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Event)]
#[event(debug)]
pub struct WindowClosed {
    /// The window being closed.
    pub window: WindowId,
}

/// A window gained or lost input focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Event)]
#[event(debug)]
pub struct WindowFocusChanged {
    /// The window concerned.
    pub window: WindowId,
    /// `true` if the window gained focus.
    pub focused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resized_rejects_zero_extent() {
        let err = WindowResized::new(1, 0, 600).unwrap_err();
        assert!(matches!(
            err,
            EventError::InvalidPayload {
                payload: "WindowResized",
                ..
            }
        ));
        assert!(WindowResized::new(1, 800, 0).is_err());
    }

    #[test]
    fn test_resized_aspect_ratio() {
        let event = WindowResized::new(1, 1600, 800).unwrap();
        assert_eq!(event.aspect_ratio(), 2.0);
    }
}
