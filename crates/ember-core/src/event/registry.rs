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

//! The registry of every live channel, used for payload-agnostic broadcasts.

use super::channel::Channel;
use super::listener::{ListenerHandle, ListenerId};
use super::payload::{payload_name, Event};
use crate::config::DispatchConfig;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// The payload-agnostic view of a [`Channel`].
///
/// A listener's entries may span many payload types, and on clone, move or
/// drop nothing records which ones, so these operations fan out over every
/// channel through this trait.
pub trait ErasedChannel: Send + Sync {
    /// The `TypeId` of the payload type.
    fn payload_type_id(&self) -> TypeId;
    /// The short name of the payload type.
    fn payload_name(&self) -> &'static str;
    /// See [`Channel::handler_count`].
    fn handler_count(&self) -> usize;
    /// See [`Channel::remove_handlers_with_listener`].
    fn remove_handlers_with_listener(&self, listener: ListenerId) -> usize;
    /// See [`Channel::duplicate_handlers_with_listener`].
    fn duplicate_handlers_with_listener(&self, new: &ListenerHandle, old: ListenerId) -> usize;
    /// See [`Channel::replace_handlers_with_listener`].
    fn replace_handlers_with_listener(&self, new: &ListenerHandle, old: ListenerId) -> usize;
    /// See [`Channel::flush_async_events`].
    fn flush_async_events(&self) -> usize;
    /// See [`Channel::close`].
    fn close(&self);
    /// Upcasts for downcasting back to the concrete channel.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<E: Event> ErasedChannel for Channel<E> {
    fn payload_type_id(&self) -> TypeId {
        TypeId::of::<E>()
    }

    fn payload_name(&self) -> &'static str {
        payload_name::<E>()
    }

    fn handler_count(&self) -> usize {
        Channel::handler_count(self)
    }

    fn remove_handlers_with_listener(&self, listener: ListenerId) -> usize {
        Channel::remove_handlers_with_listener(self, listener)
    }

    fn duplicate_handlers_with_listener(&self, new: &ListenerHandle, old: ListenerId) -> usize {
        Channel::duplicate_handlers_with_listener(self, new, old)
    }

    fn replace_handlers_with_listener(&self, new: &ListenerHandle, old: ListenerId) -> usize {
        Channel::replace_handlers_with_listener(self, new, old)
    }

    fn flush_async_events(&self) -> usize {
        Channel::flush_async_events(self)
    }

    fn close(&self) {
        Channel::close(self)
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[derive(Default)]
struct Channels {
    /// Registration order, for deterministic broadcasts.
    ordered: Vec<Arc<dyn ErasedChannel>>,
    by_type: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

/// Owns one [`Channel`] per payload type, created lazily on first reference.
///
/// Broadcasts iterate over a snapshot of the channel list, so handlers running
/// inside a flush may touch new payload types without deadlocking.
pub struct ChannelRegistry {
    id: u64,
    config: DispatchConfig,
    channels: RwLock<Channels>,
    closed: AtomicBool,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            config,
            channels: RwLock::new(Channels::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// A process-unique id for this registry.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The configuration channels are created with.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, Channels> {
        self.channels.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Channels> {
        self.channels.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the channel of payload type `E`, creating it if needed.
    pub fn channel<E: Event>(&self) -> Arc<Channel<E>> {
        if let Some(channel) = self.lookup::<E>() {
            return channel;
        }

        let mut channels = self.write();
        // Another thread may have won the race between the two locks.
        if let Some(existing) = channels.by_type.get(&TypeId::of::<E>()) {
            if let Ok(channel) = Arc::clone(existing).downcast::<Channel<E>>() {
                return channel;
            }
        }
        let channel = Arc::new(Channel::<E>::new(self.config.flush_batch_size));
        if self.is_closed() {
            channel.close();
        }
        channels
            .by_type
            .insert(TypeId::of::<E>(), Arc::clone(&channel).as_any_arc());
        channels.ordered.push(Arc::clone(&channel) as Arc<dyn ErasedChannel>);
        log::debug!(
            "Channel for '{}' created (registry {}).",
            payload_name::<E>(),
            self.id
        );
        channel
    }

    /// Returns the channel of payload type `E` if it exists.
    pub fn lookup<E: Event>(&self) -> Option<Arc<Channel<E>>> {
        let any = Arc::clone(self.read().by_type.get(&TypeId::of::<E>())?);
        any.downcast::<Channel<E>>().ok()
    }

    /// A snapshot of every channel, in creation order.
    pub fn channels(&self) -> Vec<Arc<dyn ErasedChannel>> {
        self.read().ordered.clone()
    }

    /// The number of channels created so far.
    pub fn len(&self) -> usize {
        self.read().ordered.len()
    }

    /// Returns `true` if no channel exists.
    pub fn is_empty(&self) -> bool {
        self.read().ordered.is_empty()
    }

    /// Removes every entry of `listener` in every channel. Idempotent.
    pub fn remove_handlers_with_listener(&self, listener: ListenerId) -> usize {
        self.channels()
            .iter()
            .map(|c| c.remove_handlers_with_listener(listener))
            .sum()
    }

    /// Duplicates the entries of `old` for `new` in every channel.
    pub fn duplicate_handlers_with_listener(&self, new: &ListenerHandle, old: ListenerId) -> usize {
        self.channels()
            .iter()
            .map(|c| c.duplicate_handlers_with_listener(new, old))
            .sum()
    }

    /// Re-points the entries of `old` to `new` in every channel.
    pub fn replace_handlers_with_listener(&self, new: &ListenerHandle, old: ListenerId) -> usize {
        self.channels()
            .iter()
            .map(|c| c.replace_handlers_with_listener(new, old))
            .sum()
    }

    /// Flushes the async queue of every channel. Returns the number of payloads
    /// dispatched.
    pub fn flush_async_events(&self) -> usize {
        self.channels()
            .iter()
            .map(|c| c.flush_async_events())
            .sum()
    }

    /// Total number of handler entries across channels.
    pub fn handler_count(&self) -> usize {
        self.channels().iter().map(|c| c.handler_count()).sum()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops accepting events, delivers what is still queued, and tears the
    /// channels down.
    ///
    /// Listeners dropped afterwards find no entries to remove.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let flushed = self.flush_async_events();
        let channels = std::mem::take(&mut *self.write());
        for channel in &channels.ordered {
            channel.close();
        }
        log::info!(
            "Registry {} shut down: {} channel(s) released, {flushed} queued event(s) delivered.",
            self.id,
            channels.ordered.len()
        );
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.channels().iter().map(|c| c.payload_name()).collect();
        f.debug_struct("ChannelRegistry")
            .field("id", &self.id)
            .field("channels", &names)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AsyncEvent;

    struct Alpha;
    impl Event for Alpha {}
    impl AsyncEvent for Alpha {}

    struct Beta;
    impl Event for Beta {}

    #[test]
    fn test_channels_created_lazily_once() {
        let registry = ChannelRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.lookup::<Alpha>().is_none());

        let a1 = registry.channel::<Alpha>();
        let a2 = registry.channel::<Alpha>();
        assert!(Arc::ptr_eq(&a1, &a2));

        registry.channel::<Beta>();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_channels_are_ordered_by_creation() {
        let registry = ChannelRegistry::default();
        registry.channel::<Beta>();
        registry.channel::<Alpha>();
        let names: Vec<_> = registry
            .channels()
            .iter()
            .map(|c| c.payload_name())
            .collect();
        assert_eq!(names, vec!["Beta", "Alpha"]);
    }

    #[test]
    fn test_channels_use_configured_batch_size() {
        let config = DispatchConfig {
            flush_batch_size: 3,
            ..DispatchConfig::default()
        };
        let registry = ChannelRegistry::new(config);
        assert_eq!(registry.config().flush_batch_size, 3);
        registry.channel::<Alpha>().notify_async(Alpha);
        assert_eq!(registry.flush_async_events(), 1);
    }

    #[test]
    fn test_remove_for_unknown_listener_is_noop() {
        let registry = ChannelRegistry::default();
        registry.channel::<Alpha>();
        let id = ListenerId::next();
        assert_eq!(registry.remove_handlers_with_listener(id), 0);
        assert_eq!(registry.remove_handlers_with_listener(id), 0);
    }

    #[test]
    fn test_shutdown_closes_and_clears() {
        let registry = ChannelRegistry::default();
        let alpha = registry.channel::<Alpha>();
        alpha.notify_async(Alpha);
        registry.shutdown();

        assert!(registry.is_closed());
        assert!(registry.is_empty());
        assert!(!alpha.is_open());

        let late = registry.channel::<Alpha>();
        assert!(!late.is_open());
        registry.shutdown();
    }
}
