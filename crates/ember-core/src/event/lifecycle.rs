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

//! Object-lifecycle instrumentation.
//!
//! [`Tracked`] wraps a value and reports its construction, clones, moves and
//! drop as asynchronous events, so any thread may create or drop tracked
//! objects. Listeners see the reports on the next flush.

use super::catalog::{ObjectCloned, ObjectCreated, ObjectDestroyed, ObjectId, ObjectMoved};
use super::dispatch::EventDispatcher;
use super::payload::payload_name;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// A value whose lifecycle is published as events.
pub struct Tracked<T: 'static> {
    id: ObjectId,
    value: T,
    dispatcher: EventDispatcher,
}

impl<T: 'static> Tracked<T> {
    /// Tracks `value` on the global dispatcher.
    pub fn new(value: T) -> Self {
        Self::with_dispatcher(EventDispatcher::global(), value)
    }

    /// Tracks `value` on `dispatcher`.
    pub fn with_dispatcher(dispatcher: &EventDispatcher, value: T) -> Self {
        let tracked = Self {
            id: ObjectId::next(),
            value,
            dispatcher: dispatcher.clone(),
        };
        tracked.dispatcher.notify_async(ObjectCreated {
            id: tracked.id,
            type_name: payload_name::<T>(),
        });
        tracked
    }

    /// The identity of this instance.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Moves the value into a new instance, leaving a default value behind.
    pub fn take(&mut self) -> Self
    where
        T: Default,
    {
        let moved = Self {
            id: ObjectId::next(),
            value: std::mem::take(&mut self.value),
            dispatcher: self.dispatcher.clone(),
        };
        self.dispatcher.notify_async(ObjectMoved {
            from: self.id,
            to: moved.id,
            type_name: payload_name::<T>(),
        });
        moved
    }
}

impl<T: Clone + 'static> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        let copy = Self {
            id: ObjectId::next(),
            value: self.value.clone(),
            dispatcher: self.dispatcher.clone(),
        };
        self.dispatcher.notify_async(ObjectCloned {
            source: self.id,
            id: copy.id,
            type_name: payload_name::<T>(),
        });
        copy
    }
}

impl<T: 'static> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.dispatcher.notify_async(ObjectDestroyed {
            id: self.id,
            type_name: payload_name::<T>(),
        });
    }
}

impl<T: 'static> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: 'static> DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("id", &self.id)
            .field("value", &self.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Bindings, EventListener};

    #[derive(Default)]
    struct Journal {
        lines: Vec<String>,
    }

    impl Journal {
        fn on_created(&mut self, e: &mut ObjectCreated) {
            self.lines.push(format!("created {} {}", e.id, e.type_name));
        }

        fn on_cloned(&mut self, e: &mut ObjectCloned) {
            self.lines.push(format!("cloned {} -> {}", e.source, e.id));
        }

        fn on_moved(&mut self, e: &mut ObjectMoved) {
            self.lines.push(format!("moved {} -> {}", e.from, e.to));
        }

        fn on_destroyed(&mut self, e: &mut ObjectDestroyed) {
            self.lines.push(format!("destroyed {}", e.id));
        }
    }

    impl EventListener for Journal {
        fn bind(bindings: &mut Bindings<Self>) {
            bindings
                .on(Self::on_created)
                .on(Self::on_cloned)
                .on(Self::on_moved)
                .on(Self::on_destroyed);
        }
    }

    #[test]
    fn test_lifecycle_is_reported_after_flush() {
        let dispatcher = EventDispatcher::new();
        let journal = dispatcher.listen(Journal::default());

        let mut original = Tracked::with_dispatcher(&dispatcher, vec![1u8, 2, 3]);
        let copy = original.clone();
        let moved = original.take();
        let (a, b, c) = (original.id(), copy.id(), moved.id());
        assert!(original.is_empty());
        assert_eq!(*moved, vec![1, 2, 3]);
        drop(copy);

        assert!(journal.lock().lines.is_empty());
        dispatcher.flush_async_events();

        // Channels flush in creation order, FIFO within a channel.
        assert_eq!(
            journal.lock().lines,
            vec![
                format!("created {a} Vec<u8>"),
                format!("cloned {a} -> {b}"),
                format!("moved {a} -> {c}"),
                format!("destroyed {b}"),
            ]
        );
    }
}
