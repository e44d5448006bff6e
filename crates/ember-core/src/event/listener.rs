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

//! Listener identity: who owns which handler entries.
//!
//! A [`Listener`] wraps the state of one object together with a
//! process-unique [`ListenerId`]. The id is the join key between the object and
//! its handler entries in every channel, and it follows the object through the
//! operations that would change its address in an unmanaged language:
//!
//! | Operation                     | Effect on entries                                   |
//! |-------------------------------|-----------------------------------------------------|
//! | [`Listener::with_dispatcher`] | one entry per binding declared in [`EventListener::bind`] |
//! | `Clone::clone`                | source entries duplicated for the new id            |
//! | `Clone::clone_from`           | target cleared, then source entries duplicated      |
//! | [`Listener::take`]            | entries re-pointed to the new id, none left behind  |
//! | [`Listener::assign_from`]     | target cleared, then source entries re-pointed      |
//! | `Drop`                        | every entry of the id removed from every channel    |
//!
//! All of these mutate handler lists directly. Run them on the thread that
//! dispatches the affected payload types, or synchronize externally.

use super::dispatch::EventDispatcher;
use super::handler::{Callback, HandlerOutcome};
use super::payload::{payload_name, Event};
use super::registry::ChannelRegistry;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique identity of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates a fresh id. Ids are never reused.
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw value, for diagnostics.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Listener state with its concrete type erased.
pub(crate) type ErasedState = dyn Any + Send;

/// The listener half of a handler entry: an id plus a weak reference to the
/// listener's state.
#[derive(Clone)]
pub struct ListenerHandle {
    id: ListenerId,
    state: Weak<Mutex<ErasedState>>,
}

impl ListenerHandle {
    /// The listener's identity.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn upgrade(&self) -> Option<Arc<Mutex<ErasedState>>> {
        self.state.upgrade()
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("alive", &(self.state.strong_count() > 0))
            .finish()
    }
}

/// A delivery postponed until its listener is released.
pub(crate) type DeferredDelivery = Box<dyn FnOnce()>;

#[derive(Default)]
struct Deferred {
    pending: HashMap<ListenerId, VecDeque<DeferredDelivery>>,
    draining: Vec<ListenerId>,
}

impl Deferred {
    fn pop(&mut self, id: ListenerId) -> Option<DeferredDelivery> {
        let queue = self.pending.get_mut(&id)?;
        let next = queue.pop_front();
        if queue.is_empty() {
            self.pending.remove(&id);
        }
        next
    }
}

thread_local! {
    static ACTIVE_LISTENERS: RefCell<Vec<ListenerId>> = const { RefCell::new(Vec::new()) };
    static DEFERRED: RefCell<Deferred> = RefCell::new(Deferred::default());
}

/// Queues `delivery` until the outermost borrow of listener `id` on this thread
/// ends. Deliveries of one listener run in the order they were deferred.
pub(crate) fn defer(id: ListenerId, delivery: DeferredDelivery) {
    DEFERRED.with_borrow_mut(|deferred| {
        deferred.pending.entry(id).or_default().push_back(delivery);
    });
}

/// Clears the draining mark of a listener, also on unwind.
struct Draining(ListenerId);

impl Drop for Draining {
    fn drop(&mut self) {
        DEFERRED.with_borrow_mut(|deferred| deferred.draining.retain(|id| *id != self.0));
    }
}

/// Marks a listener as borrowed on the current thread.
///
/// A second borrow of the same listener on the same thread would deadlock on
/// its mutex, so it is refused; deliveries refused this way are deferred with
/// [`defer`] and run when the guard is dropped.
pub(crate) struct ActiveGuard(ListenerId);

impl ActiveGuard {
    pub(crate) fn enter(id: ListenerId) -> Option<Self> {
        ACTIVE_LISTENERS.with_borrow_mut(|active| {
            if active.contains(&id) {
                None
            } else {
                active.push(id);
                Some(Self(id))
            }
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let id = self.0;
        ACTIVE_LISTENERS.with_borrow_mut(|active| {
            if let Some(pos) = active.iter().rposition(|entry| *entry == id) {
                active.swap_remove(pos);
            }
        });

        if std::thread::panicking() {
            DEFERRED.with_borrow_mut(|deferred| deferred.pending.remove(&id));
            return;
        }
        let drain = DEFERRED.with_borrow_mut(|deferred| {
            if deferred.draining.contains(&id) || !deferred.pending.contains_key(&id) {
                return false;
            }
            deferred.draining.push(id);
            true
        });
        if !drain {
            return;
        }
        let _draining = Draining(id);
        while let Some(delivery) = DEFERRED.with_borrow_mut(|deferred| deferred.pop(id)) {
            delivery();
        }
    }
}

/// A type that receives events through methods of its own.
pub trait EventListener: Send + 'static {
    /// Declares the handler methods of this type.
    ///
    /// The payload type of each binding is deduced from the method parameter.
    /// Methods returning `()` never consume; methods returning `bool` consume
    /// when they return `true`.
    fn bind(bindings: &mut Bindings<Self>)
    where
        Self: Sized;
}

type Attach = Box<dyn Fn(&ChannelRegistry, &ListenerHandle)>;

struct Binding {
    payload: &'static str,
    attach: Attach,
}

/// The handler methods declared by an [`EventListener`].
pub struct Bindings<L> {
    entries: Vec<Binding>,
    _listener: PhantomData<fn(&mut L)>,
}

impl<L: EventListener> Bindings<L> {
    fn collect() -> Self {
        let mut bindings = Self {
            entries: Vec::new(),
            _listener: PhantomData,
        };
        L::bind(&mut bindings);
        bindings
    }

    /// Binds `method` as a handler for the payload type it accepts.
    ///
    /// Binding the same method twice registers two entries; it then fires
    /// twice per event.
    pub fn on<E, F, R>(&mut self, method: F) -> &mut Self
    where
        E: Event,
        F: Fn(&mut L, &mut E) -> R + Send + Sync + 'static,
        R: HandlerOutcome,
    {
        let callback = Callback::<E>::from_method(method);
        self.entries.push(Binding {
            payload: payload_name::<E>(),
            attach: Box::new(move |registry: &ChannelRegistry, handle: &ListenerHandle| {
                registry
                    .channel::<E>()
                    .add_handler(callback.clone(), handle.clone());
            }),
        });
        self
    }

    /// The number of declared bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An object registered with a dispatcher, owning its handler entries.
///
/// Entries are tied to the listener's [`ListenerId`]; the state lives behind a
/// mutex shared with the dispatcher, which only keeps weak references to it.
pub struct Listener<L: EventListener> {
    id: ListenerId,
    state: Arc<Mutex<L>>,
    dispatcher: EventDispatcher,
}

impl<L: EventListener> Listener<L> {
    /// Registers `state` with the global dispatcher.
    pub fn new(state: L) -> Self {
        Self::with_dispatcher(EventDispatcher::global(), state)
    }

    /// Registers `state` with `dispatcher`, adding one entry per binding.
    pub fn with_dispatcher(dispatcher: &EventDispatcher, state: L) -> Self {
        let listener = Self::unregistered(dispatcher.clone(), state);
        let bindings = Bindings::<L>::collect();
        let handle = listener.handle();
        for binding in &bindings.entries {
            (binding.attach)(dispatcher.registry(), &handle);
            log::trace!(
                "Listener {} ({}) bound to '{}'.",
                listener.id,
                payload_name::<L>(),
                binding.payload
            );
        }
        log::debug!(
            "Listener {} ({}) registered {} handler(s).",
            listener.id,
            payload_name::<L>(),
            bindings.len()
        );
        listener
    }

    fn unregistered(dispatcher: EventDispatcher, state: L) -> Self {
        Self {
            id: ListenerId::next(),
            state: Arc::new(Mutex::new(state)),
            dispatcher,
        }
    }

    /// The listener's identity.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// The handle stored in this listener's handler entries.
    pub fn handle(&self) -> ListenerHandle {
        let state = Arc::downgrade(&self.state);
        let state: Weak<Mutex<ErasedState>> = state;
        ListenerHandle { id: self.id, state }
    }

    /// The dispatcher this listener is registered with.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Borrows the state.
    ///
    /// While the guard is alive, events for this listener dispatched on the
    /// same thread are deferred and delivered when the guard is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the listener is already borrowed on this thread, e.g. when
    /// called from one of its own handlers. Use [`try_lock`](Self::try_lock)
    /// where that can happen.
    pub fn lock(&self) -> StateGuard<'_, L> {
        match self.try_lock() {
            Some(guard) => guard,
            None => panic!("Listener {} is already borrowed on this thread", self.id),
        }
    }

    /// Borrows the state, or returns `None` if this thread already holds it.
    ///
    /// Blocks while another thread holds the state.
    pub fn try_lock(&self) -> Option<StateGuard<'_, L>> {
        let active = ActiveGuard::enter(self.id)?;
        Some(StateGuard {
            guard: self.state.lock().unwrap_or_else(PoisonError::into_inner),
            _active: active,
        })
    }

    /// Registers one more `(method, self)` entry after construction.
    pub fn subscribe<E, F, R>(&self, method: F)
    where
        E: Event,
        F: Fn(&mut L, &mut E) -> R + Send + Sync + 'static,
        R: HandlerOutcome,
    {
        self.registry()
            .channel::<E>()
            .add_handler(Callback::from_method(method), self.handle());
    }

    /// Removes the `(method, self)` entries. A no-op if there are none.
    pub fn unsubscribe<E, F, R>(&self, method: F)
    where
        E: Event,
        F: Fn(&mut L, &mut E) -> R + Send + Sync + 'static,
        R: HandlerOutcome,
    {
        let callback = Callback::<E>::from_method(method);
        self.registry()
            .channel::<E>()
            .remove_handler(callback.id(), self.id);
    }

    /// Move construction: moves the state into a new listener and re-points
    /// every entry to it.
    ///
    /// `self` keeps a default state and no entries. Panics like
    /// [`lock`](Self::lock) if called from one of the listener's handlers.
    pub fn take(&mut self) -> Self
    where
        L: Default,
    {
        let state = std::mem::take(&mut *self.state_mut());
        let moved = Self::unregistered(self.dispatcher.clone(), state);
        let count = self
            .registry()
            .replace_handlers_with_listener(&moved.handle(), self.id);
        log::trace!(
            "Listener {} moved into {} ({count} entries).",
            self.id,
            moved.id
        );
        moved
    }

    /// Move assignment: drops this listener's own entries, takes the state of
    /// `source` and re-points the entries of `source` to `self`.
    ///
    /// Panics like [`lock`](Self::lock) if either listener is borrowed on this
    /// thread.
    pub fn assign_from(&mut self, source: &mut Self)
    where
        L: Default,
    {
        self.registry().remove_handlers_with_listener(self.id);
        *self.state_mut() = std::mem::take(&mut *source.state_mut());
        self.dispatcher = source.dispatcher.clone();
        let count = self
            .registry()
            .replace_handlers_with_listener(&self.handle(), source.id);
        log::trace!(
            "Listener {} move-assigned into {} ({count} entries).",
            source.id,
            self.id
        );
    }

    fn state_mut(&self) -> StateGuard<'_, L> {
        self.lock()
    }

    fn registry(&self) -> &ChannelRegistry {
        self.dispatcher.registry()
    }
}

/// Cloning borrows the state, so it panics like [`Listener::lock`] when done
/// from one of the listener's own handlers.
impl<L: EventListener + Clone> Clone for Listener<L> {
    /// Copy construction: both listeners receive events independently.
    fn clone(&self) -> Self {
        let copy = Self::unregistered(self.dispatcher.clone(), self.state_mut().clone());
        let count = self
            .registry()
            .duplicate_handlers_with_listener(&copy.handle(), self.id);
        log::trace!(
            "Listener {} copied into {} ({count} entries).",
            self.id,
            copy.id
        );
        copy
    }

    /// Copy assignment: drops this listener's own entries first.
    fn clone_from(&mut self, source: &Self) {
        self.registry().remove_handlers_with_listener(self.id);
        *self.state_mut() = source.state_mut().clone();
        self.dispatcher = source.dispatcher.clone();
        self.registry()
            .duplicate_handlers_with_listener(&self.handle(), source.id);
    }
}

impl<L: EventListener> Drop for Listener<L> {
    fn drop(&mut self) {
        let removed = self.registry().remove_handlers_with_listener(self.id);
        if removed > 0 {
            log::trace!("Listener {} dropped ({removed} entries removed).", self.id);
        }
    }
}

impl<L: EventListener> fmt::Debug for Listener<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("type", &payload_name::<L>())
            .finish()
    }
}

/// Exclusive access to a listener's state, see [`Listener::lock`].
///
/// Deliveries deferred while the guard was alive run when it is dropped.
pub struct StateGuard<'a, L> {
    // Released before `_active`, whose drop runs the deferred deliveries.
    guard: MutexGuard<'a, L>,
    _active: ActiveGuard,
}

impl<L> Deref for StateGuard<'_, L> {
    type Target = L;

    fn deref(&self) -> &L {
        &self.guard
    }
}

impl<L> DerefMut for StateGuard<'_, L> {
    fn deref_mut(&mut self) -> &mut L {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    impl Event for Ping {}

    #[derive(Default, Clone)]
    struct Pings {
        seen: u32,
    }

    impl Pings {
        fn on_ping(&mut self, _: &mut Ping) {
            self.seen += 1;
        }
    }

    impl EventListener for Pings {
        fn bind(bindings: &mut Bindings<Self>) {
            bindings.on(Self::on_ping);
        }
    }

    #[test]
    fn test_listener_ids_are_unique() {
        let a = ListenerId::next();
        let b = ListenerId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_bindings_collect_declared_methods() {
        let bindings = Bindings::<Pings>::collect();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.entries[0].payload, "Ping");
    }

    #[test]
    fn test_active_guard_refuses_reentry() {
        let id = ListenerId::next();
        let first = ActiveGuard::enter(id);
        assert!(first.is_some());
        assert!(ActiveGuard::enter(id).is_none());
        drop(first);
        assert!(ActiveGuard::enter(id).is_some());
    }

    #[test]
    fn test_locked_listener_defers_same_thread_dispatch() {
        let dispatcher = EventDispatcher::new();
        let listener = dispatcher.listen(Pings::default());
        {
            let held = listener.lock();
            dispatcher.notify(Ping);
            dispatcher.notify(Ping);
            assert_eq!(held.seen, 0);
        }
        assert_eq!(listener.lock().seen, 2);
    }

    #[test]
    fn test_try_lock_refuses_second_borrow_on_same_thread() {
        let dispatcher = EventDispatcher::new();
        let listener = dispatcher.listen(Pings::default());
        let held = listener.lock();
        assert!(listener.try_lock().is_none());
        drop(held);
        assert!(listener.try_lock().is_some());
    }

    #[test]
    #[should_panic(expected = "already borrowed")]
    fn test_lock_panics_on_second_borrow_on_same_thread() {
        let dispatcher = EventDispatcher::new();
        let listener = dispatcher.listen(Pings::default());
        let _held = listener.lock();
        let _again = listener.lock();
    }

    #[test]
    fn test_deferred_deliveries_keep_their_order() {
        let id = ListenerId::next();
        let order = std::rc::Rc::new(RefCell::new(Vec::new()));
        let guard = ActiveGuard::enter(id);
        for n in 0..3 {
            let order = std::rc::Rc::clone(&order);
            defer(id, Box::new(move || order.borrow_mut().push(n)));
        }
        assert!(order.borrow().is_empty());
        drop(guard);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_handle_upgrade_fails_after_drop() {
        let dispatcher = EventDispatcher::new();
        let listener = dispatcher.listen(Pings::default());
        let handle = listener.handle();
        assert!(handle.upgrade().is_some());
        drop(listener);
        assert!(handle.upgrade().is_none());
    }
}
