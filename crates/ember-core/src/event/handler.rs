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

//! Type-erased handler callbacks and the entries channels store.

use super::listener::{ActiveGuard, ErasedState, ListenerHandle, ListenerId};
use super::payload::Event;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

mod sealed {
    pub trait Sealed {}
    impl Sealed for () {}
    impl Sealed for bool {}
}

/// The return convention of a handler method.
///
/// Implemented for `()` (the handler never consumes) and `bool` (the value is
/// the consumption signal) only; any other return type does not compile.
pub trait HandlerOutcome: sealed::Sealed {
    /// Returns `true` when dispatch should stop after this handler.
    fn consumed(self) -> bool;
}

impl HandlerOutcome for () {
    fn consumed(self) -> bool {
        false
    }
}

impl HandlerOutcome for bool {
    fn consumed(self) -> bool {
        self
    }
}

/// The identity of a handler method.
///
/// Every function item and closure has its own type, so the `TypeId` of the
/// method is unique per method. Methods must be passed by path
/// (`Self::on_key`), not through a `fn` pointer, or they all share one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(TypeId);

impl CallbackId {
    /// Returns the identity of the method type `F`.
    pub fn of<F: 'static>(_method: &F) -> Self {
        Self(TypeId::of::<F>())
    }
}

type Invoke<E> = dyn Fn(&mut (dyn Any + Send), &mut E) -> bool + Send + Sync;

/// A handler method bound for payload `E`, with the listener type erased.
pub struct Callback<E> {
    id: CallbackId,
    invoke: Arc<Invoke<E>>,
}

impl<E: Event> Callback<E> {
    /// Wraps `method` of listener type `L` so it can be called on erased state.
    pub fn from_method<L, F, R>(method: F) -> Self
    where
        L: 'static,
        F: Fn(&mut L, &mut E) -> R + Send + Sync + 'static,
        R: HandlerOutcome,
    {
        let id = CallbackId::of(&method);
        let invoke = move |state: &mut (dyn Any + Send), event: &mut E| match state
            .downcast_mut::<L>()
        {
            Some(listener) => method(listener, event).consumed(),
            None => false,
        };
        Self {
            id,
            invoke: Arc::new(invoke),
        }
    }

    /// Returns the identity of the wrapped method.
    pub fn id(&self) -> CallbackId {
        self.id
    }
}

impl<E> Clone for Callback<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            invoke: Arc::clone(&self.invoke),
        }
    }
}

impl<E> fmt::Debug for Callback<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("id", &self.id).finish()
    }
}

/// What happened when an entry was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The handler ran, or the listener is gone; dispatch continues.
    Continue,
    /// The handler consumed the payload; dispatch stops.
    Consumed,
    /// The listener is borrowed on this thread; the delivery must be deferred.
    Busy,
}

/// A `(callback, listener)` pair registered against one channel.
pub struct HandlerEntry<E> {
    pub(crate) callback: Callback<E>,
    pub(crate) listener: ListenerHandle,
}

impl<E: Event> HandlerEntry<E> {
    /// Creates an entry.
    pub fn new(callback: Callback<E>, listener: ListenerHandle) -> Self {
        Self { callback, listener }
    }

    /// The identity of the callback.
    pub fn callback_id(&self) -> CallbackId {
        self.callback.id
    }

    /// The listener owning this entry.
    pub fn listener_id(&self) -> ListenerId {
        self.listener.id()
    }

    /// Runs the callback.
    ///
    /// A listener that is gone or poisoned is skipped. A listener already
    /// borrowed on this thread is not called and reported as [`Delivery::Busy`].
    pub(crate) fn invoke(&self, event: &mut E) -> Delivery {
        let Some(state) = self.listener.upgrade() else {
            log::trace!(
                "Skipping handler of dropped listener {}.",
                self.listener.id()
            );
            return Delivery::Continue;
        };
        let Some(_active) = ActiveGuard::enter(self.listener.id()) else {
            return Delivery::Busy;
        };
        let mut guard = match state.lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::error!(
                    "Listener {} is poisoned; '{}' delivery skipped.",
                    self.listener.id(),
                    super::payload_name::<E>()
                );
                return Delivery::Continue;
            }
        };
        let state: &mut ErasedState = &mut *guard;
        if (self.callback.invoke)(state, event) {
            Delivery::Consumed
        } else {
            Delivery::Continue
        }
    }
}

impl<E> Clone for HandlerEntry<E> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            listener: self.listener.clone(),
        }
    }
}

impl<E> fmt::Debug for HandlerEntry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("callback", &self.callback.id)
            .field("listener", &self.listener.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Bindings, EventDispatcher, EventListener};
    use std::panic::{self, AssertUnwindSafe};

    struct Tick(u32);
    impl Event for Tick {}

    struct Counter {
        total: u32,
    }

    impl Counter {
        fn add(&mut self, tick: &mut Tick) {
            self.total += tick.0;
        }

        fn add_and_stop(&mut self, tick: &mut Tick) -> bool {
            self.total += tick.0;
            true
        }
    }

    #[test]
    fn test_outcome_conventions() {
        assert!(!().consumed());
        assert!(true.consumed());
        assert!(!false.consumed());
    }

    #[test]
    fn test_callback_ids_differ_per_method() {
        let a = Callback::<Tick>::from_method(Counter::add);
        let b = Callback::<Tick>::from_method(Counter::add_and_stop);
        let a_again = Callback::<Tick>::from_method(Counter::add);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a_again.id());
    }

    #[test]
    fn test_callback_invokes_on_erased_state() {
        let callback = Callback::<Tick>::from_method(Counter::add_and_stop);
        let mut counter = Counter { total: 1 };
        let consumed = (callback.invoke)(&mut counter, &mut Tick(4));
        assert!(consumed);
        assert_eq!(counter.total, 5);
    }

    #[derive(Default)]
    struct Fragile {
        calls: u32,
    }

    impl Fragile {
        fn on_tick(&mut self, tick: &mut Tick) {
            self.calls += 1;
            if tick.0 == 0 {
                panic!("fragile listener gave up");
            }
        }
    }

    impl EventListener for Fragile {
        fn bind(bindings: &mut Bindings<Self>) {
            bindings.on(Self::on_tick);
        }
    }

    #[derive(Default)]
    struct Steady {
        total: u32,
    }

    impl Steady {
        fn on_tick(&mut self, tick: &mut Tick) {
            self.total += tick.0;
        }
    }

    impl EventListener for Steady {
        fn bind(bindings: &mut Bindings<Self>) {
            bindings.on(Self::on_tick);
        }
    }

    #[test]
    fn test_poisoned_listener_is_skipped_and_others_still_run() {
        let dispatcher = EventDispatcher::new();
        let steady = dispatcher.listen(Steady::default());
        let fragile = dispatcher.listen(Fragile::default());

        // The newest handler panics while holding its state, poisoning it.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| dispatcher.notify(Tick(0))));
        assert!(outcome.is_err());

        dispatcher.notify(Tick(5));
        assert_eq!(fragile.lock().calls, 1);
        assert_eq!(steady.lock().total, 5);
    }

    #[test]
    fn test_busy_listener_is_reported() {
        let dispatcher = EventDispatcher::new();
        let steady = dispatcher.listen(Steady::default());
        let entry = HandlerEntry::new(Callback::from_method(Steady::on_tick), steady.handle());

        let held = steady.lock();
        assert_eq!(entry.invoke(&mut Tick(1)), Delivery::Busy);
        drop(held);
        assert_eq!(entry.invoke(&mut Tick(1)), Delivery::Continue);
        assert_eq!(steady.lock().total, 1);
    }

    #[test]
    fn test_callback_ignores_foreign_state() {
        let callback = Callback::<Tick>::from_method(Counter::add_and_stop);
        let mut wrong = String::from("not a counter");
        assert!(!(callback.invoke)(&mut wrong, &mut Tick(1)));
    }
}
