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

//! # Ember Core
//!
//! The engine's typed event dispatch system. Independent subsystems (input,
//! windowing, renderers, object-lifecycle trackers) talk to each other through
//! payload types instead of holding references to one another.
//!
//! * [`event::notify`] dispatches synchronously: handlers run newest first and
//!   any of them may consume the payload to stop propagation.
//! * [`event::notify_async`] queues payloads that opted in with
//!   [`event::AsyncEvent`]; [`event::flush_async_events`] drains them once per
//!   tick on the flushing thread.
//! * [`event::Listener`] owns the handler registrations of one object and keeps
//!   them consistent when the object is cloned, moved out or dropped.

#![warn(missing_docs)]

// Lets `#[derive(Event)]` refer to `::ember_core` from inside this crate.
extern crate self as ember_core;

pub mod config;
pub mod error;
pub mod event;

pub use config::DispatchConfig;
pub use error::{EventError, EventResult};
pub use event::{
    flush_async_events, notify, notify_async, try_notify, AsyncEvent, Event, EventDispatcher,
    EventListener, Listener,
};
