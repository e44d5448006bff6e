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

//! Backend-agnostic user input payloads.

use crate::event::Event;

/// A keyboard key was pressed.
#[derive(Debug, Clone, PartialEq, Eq, Event)]
#[event(debug)]
pub struct KeyPressed {
    /// A string representation of the physical key code.
    pub key_code: String,
    /// Whether this press is an auto-repeat of a held key.
    pub repeat: bool,
}

impl KeyPressed {
    /// A first (non-repeat) press of `key_code`.
    pub fn new(key_code: impl Into<String>) -> Self {
        Self {
            key_code: key_code.into(),
            repeat: false,
        }
    }

    /// An auto-repeat of `key_code`.
    pub fn repeated(key_code: impl Into<String>) -> Self {
        Self {
            key_code: key_code.into(),
            repeat: true,
        }
    }
}

/// A keyboard key was released.
#[derive(Debug, Clone, PartialEq, Eq, Event)]
#[event(debug)]
pub struct KeyReleased {
    /// A string representation of the physical key code.
    pub key_code: String,
}

impl KeyReleased {
    /// A release of `key_code`.
    pub fn new(key_code: impl Into<String>) -> Self {
        Self {
            key_code: key_code.into(),
        }
    }
}

/// An engine-internal representation of a mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// The left mouse button.
    Left,
    /// The right mouse button.
    Right,
    /// The middle mouse button.
    Middle,
    /// The back mouse button (typically on the side).
    Back,
    /// The forward mouse button (typically on the side).
    Forward,
    /// Another mouse button, identified by a numeric code.
    Other(u16),
}

/// A mouse button was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Event)]
#[event(debug)]
pub struct MouseButtonPressed {
    /// The button that was pressed.
    pub button: MouseButton,
}

/// A mouse button was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Event)]
#[event(debug)]
pub struct MouseButtonReleased {
    /// The button that was released.
    pub button: MouseButton,
}

/// The mouse cursor moved. Produced at device rate, so it may be queued.
#[derive(Debug, Clone, Copy, PartialEq, Event)]
#[event(async_dispatch, debug)]
pub struct MouseMoved {
    /// The new x-coordinate of the cursor.
    pub x: f32,
    /// The new y-coordinate of the cursor.
    pub y: f32,
    /// The horizontal motion since the previous sample.
    pub delta_x: f32,
    /// The vertical motion since the previous sample.
    pub delta_y: f32,
}

impl MouseMoved {
    /// A motion sample to `(x, y)`, moved by `(delta_x, delta_y)`.
    pub fn new(x: f32, y: f32, delta_x: f32, delta_y: f32) -> Self {
        Self {
            x,
            y,
            delta_x,
            delta_y,
        }
    }
}

/// The mouse wheel was scrolled.
#[derive(Debug, Clone, Copy, PartialEq, Event)]
#[event(async_dispatch, debug)]
pub struct MouseScrolled {
    /// The horizontal scroll delta.
    pub delta_x: f32,
    /// The vertical scroll delta.
    pub delta_y: f32,
}
