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

//! The contract every event payload fulfils.

use std::any::type_name;

/// Plain data describing something that happened.
///
/// Payloads are identified at runtime by their `TypeId`, never by a name
/// string. Implement it with `#[derive(Event)]`.
pub trait Event: Send + 'static {
    /// Renders the payload for diagnostic traces.
    ///
    /// The default only prints the short type name; `#[event(debug)]` switches
    /// to the `Debug` rendering.
    fn describe(&self) -> String {
        payload_name::<Self>().to_string()
    }
}

/// Marker opting a payload type into asynchronous dispatch.
///
/// Only types carrying this marker can be given to `notify_async`. The check is
/// a trait bound, so misuse is a compile error:
///
/// ```compile_fail
/// use ember_core::event::EventDispatcher;
/// use ember_core::event::catalog::KeyPressed;
///
/// // `KeyPressed` is synchronous only.
/// EventDispatcher::new().notify_async(KeyPressed::new("KeyA"));
/// ```
///
/// ```compile_fail
/// use ember_core::event::Event;
///
/// struct Plain;
/// impl Event for Plain {}
///
/// ember_core::notify_async(Plain);
/// ```
pub trait AsyncEvent: Event {}

/// Returns the type name of `T` without its module path.
///
/// Generic arguments keep their own paths, e.g. `Option<alloc::string::String>`.
pub fn payload_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}
