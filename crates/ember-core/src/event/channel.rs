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

//! The per-payload-type channel: ordered handlers plus an optional async queue.

use super::handler::{Callback, CallbackId, Delivery, HandlerEntry};
use super::listener::{self, ListenerHandle, ListenerId};
use super::payload::{payload_name, AsyncEvent, Event};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, TryLockError};

thread_local! {
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as the one draining queues.
struct FlushGuard;

impl FlushGuard {
    fn enter() -> Option<Self> {
        if FLUSHING.replace(true) {
            None
        } else {
            Some(Self)
        }
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        FLUSHING.set(false);
    }
}

/// The MPSC queue of an async-capable payload type.
///
/// The consumer half is owned once, by the channel, and taken by `close`.
#[derive(Debug)]
struct AsyncQueue<E> {
    sender: flume::Sender<E>,
    consumer: Mutex<Option<flume::Receiver<E>>>,
}

impl<E> AsyncQueue<E> {
    fn new(open: bool) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            consumer: Mutex::new(open.then_some(receiver)),
        }
    }

    /// Disconnects producers and drops every queued payload.
    ///
    /// Cached producer handles keep the queue allocated, so the payloads are
    /// drained here rather than left to the last handle.
    fn disconnect(consumer: &mut Option<flume::Receiver<E>>) -> usize {
        consumer
            .take()
            .map_or(0, |receiver| receiver.drain().count())
    }
}

/// Stores and serves the handlers of exactly one payload type.
///
/// Handlers are kept in registration order and dispatched newest first.
/// Dispatch works on a snapshot of the list, so handlers may register or
/// unregister listeners while an event is being delivered; the change applies
/// from the next dispatch on.
pub struct Channel<E: Event> {
    handlers: RwLock<Arc<Vec<HandlerEntry<E>>>>,
    queue: OnceLock<AsyncQueue<E>>,
    batch_size: usize,
    open: AtomicBool,
}

impl<E: Event> Channel<E> {
    /// Creates an empty channel draining at most `batch_size` payloads per
    /// flush iteration.
    pub fn new(batch_size: usize) -> Self {
        Self {
            handlers: RwLock::new(Arc::new(Vec::new())),
            queue: OnceLock::new(),
            batch_size: batch_size.max(1),
            open: AtomicBool::new(true),
        }
    }

    fn snapshot(&self) -> Arc<Vec<HandlerEntry<E>>> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*handlers)
    }

    /// Applies `edit` to the handler list and returns its result.
    fn edit<T>(&self, edit: impl FnOnce(&mut Vec<HandlerEntry<E>>) -> T) -> T {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        edit(Arc::make_mut(&mut *handlers))
    }

    /// Appends a handler. Duplicates are allowed and all of them fire.
    pub fn add_handler(&self, callback: Callback<E>, listener: ListenerHandle) {
        self.edit(|handlers| handlers.push(HandlerEntry::new(callback, listener)));
    }

    /// Removes the entries matching both `callback` and `listener`.
    ///
    /// Returns how many were removed; zero is not an error.
    pub fn remove_handler(&self, callback: CallbackId, listener: ListenerId) -> usize {
        self.edit(|handlers| {
            let before = handlers.len();
            handlers.retain(|h| !(h.callback_id() == callback && h.listener_id() == listener));
            before - handlers.len()
        })
    }

    /// Delivers `event` to the handlers, newest first, until one consumes it.
    ///
    /// Handlers receive the payload by mutable reference, so later handlers see
    /// the changes of earlier ones. If a handler's listener is already borrowed
    /// on this thread (the event was emitted from one of its own handlers, or
    /// its state is locked), the rest of the delivery is deferred until that
    /// borrow ends.
    pub fn dispatch(&self, event: E) {
        let handlers = self.snapshot();
        let end = handlers.len();
        Self::deliver(handlers, end, event);
    }

    /// Runs `handlers[..end]` in reverse order.
    fn deliver(handlers: Arc<Vec<HandlerEntry<E>>>, end: usize, mut event: E) {
        for index in (0..end).rev() {
            let entry = &handlers[index];
            match entry.invoke(&mut event) {
                Delivery::Continue => {}
                Delivery::Consumed => {
                    log::trace!(
                        "'{}' consumed by listener {}.",
                        payload_name::<E>(),
                        entry.listener_id()
                    );
                    return;
                }
                Delivery::Busy => {
                    let busy = entry.listener_id();
                    log::debug!(
                        "Listener {busy} is busy on this thread; '{}' delivery deferred.",
                        payload_name::<E>()
                    );
                    listener::defer(
                        busy,
                        Box::new(move || Self::deliver(handlers, index + 1, event)),
                    );
                    return;
                }
            }
        }
    }

    /// Appends a copy of every entry owned by `old`, owned by `new` instead.
    ///
    /// Returns the number of entries added.
    pub fn duplicate_handlers_with_listener(
        &self,
        new: &ListenerHandle,
        old: ListenerId,
    ) -> usize {
        self.edit(|handlers| {
            let copies: Vec<_> = handlers
                .iter()
                .filter(|h| h.listener_id() == old)
                .map(|h| HandlerEntry::new(h.callback.clone(), new.clone()))
                .collect();
            let count = copies.len();
            handlers.extend(copies);
            count
        })
    }

    /// Re-points every entry owned by `old` to `new`, in place.
    ///
    /// Returns the number of entries re-pointed.
    pub fn replace_handlers_with_listener(&self, new: &ListenerHandle, old: ListenerId) -> usize {
        self.edit(|handlers| {
            let mut count = 0;
            for entry in handlers.iter_mut().filter(|h| h.listener_id() == old) {
                entry.listener = new.clone();
                count += 1;
            }
            count
        })
    }

    /// Removes every entry owned by `listener`. Idempotent.
    ///
    /// Returns the number of entries removed.
    pub fn remove_handlers_with_listener(&self, listener: ListenerId) -> usize {
        self.edit(|handlers| {
            let before = handlers.len();
            handlers.retain(|h| h.listener_id() != listener);
            before - handlers.len()
        })
    }

    /// The number of registered entries.
    pub fn handler_count(&self) -> usize {
        self.snapshot().len()
    }

    /// The number of entries owned by `listener`.
    pub fn handler_count_for(&self, listener: ListenerId) -> usize {
        self.snapshot()
            .iter()
            .filter(|h| h.listener_id() == listener)
            .count()
    }

    /// The approximate number of queued payloads awaiting a flush.
    pub fn pending_async_events(&self) -> usize {
        self.queue.get().map_or(0, |queue| queue.sender.len())
    }

    /// Drains the async queue into [`dispatch`](Self::dispatch), in pop order.
    ///
    /// Pops at most `batch_size` payloads per iteration and loops until the
    /// queue is observed empty, so producers faster than the handlers keep the
    /// flush running. Concurrent flushes of one channel serialize on the
    /// consumer handle. Returns the number of payloads dispatched.
    pub fn flush_async_events(&self) -> usize {
        let Some(queue) = self.queue.get() else {
            return 0;
        };
        let Some(_flushing) = FlushGuard::enter() else {
            log::warn!(
                "Nested flush of '{}' from inside a handler ignored.",
                payload_name::<E>()
            );
            return 0;
        };
        let mut consumer = queue.consumer.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(receiver) = consumer.as_ref() else {
            return 0;
        };

        let mut batch = Vec::with_capacity(self.batch_size);
        let mut dispatched = 0;
        while self.is_open() && !receiver.is_empty() {
            batch.extend(receiver.try_iter().take(self.batch_size));
            if batch.is_empty() {
                break;
            }
            for event in batch.drain(..) {
                if !self.is_open() {
                    break;
                }
                self.dispatch(event);
                dispatched += 1;
            }
        }
        if !self.is_open() {
            AsyncQueue::<E>::disconnect(&mut *consumer);
        }
        if dispatched > 0 {
            log::trace!(
                "Flushed {dispatched} queued '{}' event(s).",
                payload_name::<E>()
            );
        }
        dispatched
    }

    /// Stops accepting async payloads. Pending ones are dropped.
    ///
    /// Called from a handler while this thread flushes the channel, the queue
    /// is disconnected when that flush returns.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        if let Some(queue) = self.queue.get() {
            let mut consumer = if FLUSHING.get() {
                match queue.consumer.try_lock() {
                    Ok(consumer) => consumer,
                    Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                    Err(TryLockError::WouldBlock) => return,
                }
            } else {
                queue.consumer.lock().unwrap_or_else(PoisonError::into_inner)
            };
            let dropped = AsyncQueue::<E>::disconnect(&mut *consumer);
            if dropped > 0 {
                log::warn!(
                    "Channel '{}' closed with {dropped} unflushed event(s); dropped.",
                    payload_name::<E>()
                );
            }
        }
    }

    /// Returns `true` until [`close`](Self::close) is called.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl<E: AsyncEvent> Channel<E> {
    /// A producer handle for the async queue, creating the queue on first use.
    ///
    /// Handles are cheap to clone; producers cache one per thread.
    pub fn producer(&self) -> flume::Sender<E> {
        self.queue
            .get_or_init(|| AsyncQueue::new(self.is_open()))
            .sender
            .clone()
    }

    /// Enqueues `event` for the next flush. Never blocks.
    pub fn notify_async(&self, event: E) {
        if let Err(e) = self.producer().send(event) {
            log::error!(
                "Failed to queue '{}': {e}. Channel is closed.",
                payload_name::<E>()
            );
        }
    }
}

impl<E: Event> Drop for Channel<E> {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.get_mut() {
            let consumer = queue
                .consumer
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner);
            let dropped = AsyncQueue::<E>::disconnect(consumer);
            if dropped > 0 {
                log::debug!(
                    "Channel '{}' released with {dropped} unflushed event(s).",
                    payload_name::<E>()
                );
            }
        }
    }
}

impl<E: Event> std::fmt::Debug for Channel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("payload", &payload_name::<E>())
            .field("handlers", &self.handler_count())
            .field("pending", &self.pending_async_events())
            .finish()
    }
}
