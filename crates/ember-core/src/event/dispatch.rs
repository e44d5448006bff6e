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

//! The dispatch façade: the entry point producers and listeners use.

use super::listener::{EventListener, Listener};
use super::payload::{payload_name, AsyncEvent, Event};
use super::registry::ChannelRegistry;
use crate::config::DispatchConfig;
use crate::error::{EventError, EventResult};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<EventDispatcher> = OnceLock::new();

/// A cached producer handle with its payload type erased.
trait Producer {
    fn is_disconnected(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<E: Send + 'static> Producer for flume::Sender<E> {
    fn is_disconnected(&self) -> bool {
        flume::Sender::is_disconnected(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

thread_local! {
    /// Producer handles cached per (registry, payload type) on each thread, so
    /// the async hot path skips the registry lookup. Handles whose channel was
    /// closed or released are pruned on every access.
    static PRODUCERS: RefCell<HashMap<(u64, TypeId), Box<dyn Producer>>> = RefCell::new(HashMap::new());
}

/// Emits events and hands out listeners for one [`ChannelRegistry`].
///
/// Cloning is cheap; clones share the registry. Producers on any thread may
/// call [`notify_async`](Self::notify_async). Synchronous
/// [`notify`](Self::notify), listener construction and drop, and
/// [`flush_async_events`](Self::flush_async_events) are meant for the thread
/// that owns dispatch of the affected payload types.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    registry: Arc<ChannelRegistry>,
}

impl EventDispatcher {
    /// Creates a dispatcher with its own, empty registry.
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    /// Creates a dispatcher with its own registry and the given configuration.
    pub fn with_config(config: DispatchConfig) -> Self {
        Self {
            registry: Arc::new(ChannelRegistry::new(config)),
        }
    }

    /// The process-wide dispatcher behind the free functions of this module.
    ///
    /// Created with the default configuration on first use unless
    /// [`install_global`](Self::install_global) ran before.
    pub fn global() -> &'static EventDispatcher {
        GLOBAL.get_or_init(|| {
            log::info!("Global event dispatcher initialized.");
            Self::new()
        })
    }

    /// Creates the process-wide dispatcher with `config`.
    ///
    /// Fails if the global dispatcher is already in use.
    pub fn install_global(config: DispatchConfig) -> EventResult<&'static EventDispatcher> {
        config.validate()?;
        let mut installed = false;
        let global = GLOBAL.get_or_init(|| {
            installed = true;
            Self::with_config(config)
        });
        if installed {
            log::info!("Global event dispatcher installed with custom configuration.");
            Ok(global)
        } else {
            Err(EventError::GlobalAlreadyInstalled)
        }
    }

    /// The registry backing this dispatcher.
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    fn trace<E: Event>(&self, event: &E, mode: &str) {
        let config = self.registry.config();
        if config.trace_events && log::log_enabled!(config.trace_level) {
            log::log!(config.trace_level, "[{mode}] {}", event.describe());
        }
    }

    fn accepting<E: Event>(&self) -> bool {
        if self.registry.is_closed() {
            log::warn!(
                "Dispatcher is shut down; '{}' event dropped.",
                payload_name::<E>()
            );
            return false;
        }
        true
    }

    /// Dispatches `event` synchronously.
    ///
    /// Returns once every interested handler ran or one consumed the event.
    /// Without handlers this is a no-op.
    pub fn notify<E: Event>(&self, event: E) {
        if !self.accepting::<E>() {
            return;
        }
        self.trace(&event, "sync");
        if let Some(channel) = self.registry.lookup::<E>() {
            channel.dispatch(event);
        }
    }

    /// Builds a payload with a fallible constructor and dispatches it.
    ///
    /// A construction error is returned to the caller and no handler runs.
    pub fn try_notify<E, F, Err>(&self, build: F) -> Result<(), Err>
    where
        E: Event,
        F: FnOnce() -> Result<E, Err>,
    {
        let event = build()?;
        self.notify(event);
        Ok(())
    }

    /// Queues `event` for the next [`flush_async_events`](Self::flush_async_events).
    ///
    /// Never blocks; safe from any number of producer threads. Payloads queued
    /// from one thread are delivered in the order they were queued.
    pub fn notify_async<E: AsyncEvent>(&self, event: E) {
        if !self.accepting::<E>() {
            return;
        }
        self.trace(&event, "async");
        let key = (self.registry.id(), TypeId::of::<E>());
        PRODUCERS.with_borrow_mut(|producers| {
            producers.retain(|_, producer| !producer.is_disconnected());
            let producer = producers
                .entry(key)
                .or_insert_with(|| Box::new(self.registry.channel::<E>().producer()));
            let Some(sender) = producer.as_any().downcast_ref::<flume::Sender<E>>() else {
                log::error!("Producer cache holds a foreign handle for '{}'.", payload_name::<E>());
                return;
            };
            if let Err(e) = sender.send(event) {
                log::error!(
                    "Failed to queue '{}': {e}. Receiver likely closed.",
                    payload_name::<E>()
                );
                producers.remove(&key);
            }
        });
    }

    /// Flushes the async queue of every channel, in channel creation order.
    ///
    /// Call once per tick from the single flushing thread. Returns the number
    /// of payloads dispatched.
    pub fn flush_async_events(&self) -> usize {
        self.registry.flush_async_events()
    }

    /// Registers `state` as a listener of this dispatcher.
    pub fn listen<L: EventListener>(&self, state: L) -> Listener<L> {
        Listener::with_dispatcher(self, state)
    }

    /// The number of handler entries registered for payload type `E`.
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.registry.lookup::<E>().map_or(0, |c| c.handler_count())
    }

    /// The number of payloads of type `E` waiting for a flush.
    pub fn pending_async_events<E: AsyncEvent>(&self) -> usize {
        self.registry
            .lookup::<E>()
            .map_or(0, |c| c.pending_async_events())
    }

    /// Stops accepting events, delivers what is queued and releases channels.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatches `event` synchronously through the global dispatcher.
pub fn notify<E: Event>(event: E) {
    EventDispatcher::global().notify(event);
}

/// Builds and dispatches a payload through the global dispatcher; see
/// [`EventDispatcher::try_notify`].
pub fn try_notify<E, F, Err>(build: F) -> Result<(), Err>
where
    E: Event,
    F: FnOnce() -> Result<E, Err>,
{
    EventDispatcher::global().try_notify(build)
}

/// Queues `event` on the global dispatcher.
pub fn notify_async<E: AsyncEvent>(event: E) {
    EventDispatcher::global().notify_async(event);
}

/// Flushes every async queue of the global dispatcher.
pub fn flush_async_events() -> usize {
    EventDispatcher::global().flush_async_events()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Bindings;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Ping(u32);
    impl Event for Ping {}
    impl AsyncEvent for Ping {}

    #[derive(Default)]
    struct Sum(u32);

    impl Sum {
        fn on_ping(&mut self, ping: &mut Ping) {
            self.0 += ping.0;
        }
    }

    impl EventListener for Sum {
        fn bind(bindings: &mut Bindings<Self>) {
            bindings.on(Self::on_ping);
        }
    }

    #[test]
    fn test_notify_without_channel_is_noop() {
        let dispatcher = EventDispatcher::new();
        dispatcher.notify(Ping(1));
        assert_eq!(dispatcher.subscriber_count::<Ping>(), 0);
        assert!(dispatcher.registry().is_empty());
    }

    #[test]
    fn test_try_notify_propagates_construction_error() {
        let dispatcher = EventDispatcher::new();
        let sum = dispatcher.listen(Sum::default());

        let result = dispatcher.try_notify(|| -> Result<Ping, &str> { Err("bad ping") });
        assert_eq!(result, Err("bad ping"));
        assert_eq!(sum.lock().0, 0);

        dispatcher
            .try_notify(|| -> Result<Ping, &str> { Ok(Ping(2)) })
            .unwrap();
        assert_eq!(sum.lock().0, 2);
    }

    #[test]
    fn test_async_waits_for_flush() {
        let dispatcher = EventDispatcher::new();
        let sum = dispatcher.listen(Sum::default());

        dispatcher.notify_async(Ping(5));
        dispatcher.notify_async(Ping(6));
        assert_eq!(dispatcher.pending_async_events::<Ping>(), 2);
        assert_eq!(sum.lock().0, 0);

        assert_eq!(dispatcher.flush_async_events(), 2);
        assert_eq!(sum.lock().0, 11);
    }

    #[test]
    fn test_dispatchers_are_isolated() {
        let a = EventDispatcher::new();
        let b = EventDispatcher::new();
        let sum = a.listen(Sum::default());

        b.notify(Ping(3));
        b.notify_async(Ping(3));
        b.flush_async_events();
        assert_eq!(sum.lock().0, 0);
    }

    #[test]
    fn test_shutdown_rejects_new_events() {
        let dispatcher = EventDispatcher::new();
        let sum = dispatcher.listen(Sum::default());
        dispatcher.notify_async(Ping(1));
        dispatcher.shutdown();
        assert_eq!(sum.lock().0, 1);

        dispatcher.notify(Ping(10));
        dispatcher.notify_async(Ping(10));
        dispatcher.flush_async_events();
        assert_eq!(sum.lock().0, 1);
    }

    struct Heavy(Arc<AtomicUsize>);
    impl Event for Heavy {}
    impl AsyncEvent for Heavy {}

    impl Drop for Heavy {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_dropped_dispatchers_release_queued_payloads() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let mut released = Vec::new();
        for _ in 0..3 {
            let dispatcher = EventDispatcher::new();
            dispatcher.notify_async(Heavy(Arc::clone(&dropped)));
            released.push(dispatcher.registry().id());
        }
        assert_eq!(dropped.load(Ordering::SeqCst), 3);

        // The next access prunes the handles of the released registries.
        let live = EventDispatcher::new();
        live.notify_async(Ping(1));
        PRODUCERS.with_borrow(|producers| {
            assert!(producers.keys().all(|(id, _)| !released.contains(id)));
            assert!(producers.contains_key(&(live.registry().id(), TypeId::of::<Ping>())));
        });
    }

    #[test]
    fn test_install_global_rejects_invalid_config() {
        let config = DispatchConfig {
            flush_batch_size: 0,
            ..DispatchConfig::default()
        };
        assert!(matches!(
            EventDispatcher::install_global(config),
            Err(EventError::InvalidConfig(_))
        ));
    }
}
