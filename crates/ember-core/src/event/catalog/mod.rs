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

//! The engine's standard payload types.
//!
//! Producers (input devices, windowing, object-lifecycle instrumentation) and
//! listeners (renderers, input state caches, the application context) agree on
//! these types instead of on each other. High-frequency payloads opt into
//! asynchronous dispatch.

mod input;
mod lifecycle;
mod window;

pub use self::input::{
    KeyPressed, KeyReleased, MouseButton, MouseButtonPressed, MouseButtonReleased, MouseMoved,
    MouseScrolled,
};
pub use self::lifecycle::{ObjectCloned, ObjectCreated, ObjectDestroyed, ObjectId, ObjectMoved};
pub use self::window::{WindowClosed, WindowFocusChanged, WindowId, WindowResized};
