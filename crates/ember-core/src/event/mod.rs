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

//! Provides the typed event dispatch system.
//!
//! Every payload type gets its own [`Channel`], created lazily the first time
//! the type is used and kept in a [`ChannelRegistry`]. Producers talk to the
//! [`EventDispatcher`] façade (or the free functions backed by the global
//! dispatcher), and listeners declare their handler methods once through
//! [`EventListener::bind`].
//!
//! ```rust
//! use ember_core::event::{Bindings, EventDispatcher, EventListener};
//! use ember_core::event::catalog::KeyPressed;
//!
//! #[derive(Default)]
//! struct KeyLog {
//!     keys: Vec<String>,
//! }
//!
//! impl KeyLog {
//!     fn on_key(&mut self, event: &mut KeyPressed) {
//!         self.keys.push(event.key_code.clone());
//!     }
//! }
//!
//! impl EventListener for KeyLog {
//!     fn bind(bindings: &mut Bindings<Self>) {
//!         bindings.on(Self::on_key);
//!     }
//! }
//!
//! let dispatcher = EventDispatcher::new();
//! let log = dispatcher.listen(KeyLog::default());
//! dispatcher.notify(KeyPressed::new("KeyA"));
//! assert_eq!(log.lock().keys, vec!["KeyA".to_string()]);
//! ```

pub mod catalog;
pub mod lifecycle;

mod channel;
mod dispatch;
mod handler;
mod listener;
mod payload;
mod registry;

pub use self::channel::Channel;
pub use self::dispatch::{flush_async_events, notify, notify_async, try_notify, EventDispatcher};
pub use self::handler::{Callback, CallbackId, HandlerEntry, HandlerOutcome};
pub use self::listener::{
    Bindings, EventListener, Listener, ListenerHandle, ListenerId, StateGuard,
};
pub use self::payload::{payload_name, AsyncEvent, Event};
pub use self::registry::{ChannelRegistry, ErasedChannel};

/// Derives [`Event`] (and optionally [`AsyncEvent`]) for a payload struct.
pub use ember_macros::Event;
