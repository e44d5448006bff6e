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

//! Dispatch statistics built from object-lifecycle reports.

use ember_core::event::catalog::{ObjectCloned, ObjectCreated, ObjectDestroyed, ObjectMoved};
use ember_core::event::{Bindings, EventListener};
use std::collections::HashMap;

/// Per-type lifecycle counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleCounts {
    /// Instances constructed directly.
    pub created: u64,
    /// Instances constructed by cloning.
    pub cloned: u64,
    /// Values moved into new instances.
    pub moved: u64,
    /// Instances dropped.
    pub destroyed: u64,
}

impl LifecycleCounts {
    /// Instances currently alive. Moves create an instance without ending one,
    /// since the moved-from instance stays alive until dropped.
    pub fn live(&self) -> u64 {
        (self.created + self.cloned + self.moved).saturating_sub(self.destroyed)
    }
}

/// Aggregates lifecycle payloads by tracked type.
///
/// Register it as a listener; the counters advance on every flush.
#[derive(Debug, Default, Clone)]
pub struct DispatchStats {
    per_type: HashMap<&'static str, LifecycleCounts>,
}

impl DispatchStats {
    /// Creates empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// The counters of one tracked type.
    pub fn counts(&self, type_name: &str) -> LifecycleCounts {
        self.per_type.get(type_name).copied().unwrap_or_default()
    }

    /// Counters summed over every type.
    pub fn totals(&self) -> LifecycleCounts {
        self.per_type
            .values()
            .fold(LifecycleCounts::default(), |acc, c| LifecycleCounts {
                created: acc.created + c.created,
                cloned: acc.cloned + c.cloned,
                moved: acc.moved + c.moved,
                destroyed: acc.destroyed + c.destroyed,
            })
    }

    /// Logs one line per tracked type at `info` level.
    pub fn report(&self) {
        let mut names: Vec<_> = self.per_type.keys().collect();
        names.sort();
        for name in names {
            let c = self.per_type[name];
            log::info!(
                "{name}: {} live ({} created, {} cloned, {} moved, {} destroyed)",
                c.live(),
                c.created,
                c.cloned,
                c.moved,
                c.destroyed
            );
        }
    }

    fn entry(&mut self, type_name: &'static str) -> &mut LifecycleCounts {
        self.per_type.entry(type_name).or_default()
    }

    fn on_created(&mut self, event: &mut ObjectCreated) {
        self.entry(event.type_name).created += 1;
    }

    fn on_cloned(&mut self, event: &mut ObjectCloned) {
        self.entry(event.type_name).cloned += 1;
    }

    fn on_moved(&mut self, event: &mut ObjectMoved) {
        self.entry(event.type_name).moved += 1;
    }

    fn on_destroyed(&mut self, event: &mut ObjectDestroyed) {
        self.entry(event.type_name).destroyed += 1;
    }
}

impl EventListener for DispatchStats {
    fn bind(bindings: &mut Bindings<Self>) {
        bindings
            .on(Self::on_created)
            .on(Self::on_cloned)
            .on(Self::on_moved)
            .on(Self::on_destroyed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::event::lifecycle::Tracked;
    use ember_core::event::EventDispatcher;

    #[derive(Debug, Default, Clone)]
    struct Mesh {
        vertices: usize,
    }

    #[test]
    fn test_counts_follow_tracked_objects() {
        let dispatcher = EventDispatcher::new();
        let stats = dispatcher.listen(DispatchStats::new());

        let mut a = Tracked::with_dispatcher(&dispatcher, Mesh { vertices: 3 });
        let b = a.clone();
        let c = a.take();
        assert_eq!(c.vertices, 3);
        drop(b);
        dispatcher.flush_async_events();

        let counts = stats.lock().counts("Mesh");
        assert_eq!(
            counts,
            LifecycleCounts {
                created: 1,
                cloned: 1,
                moved: 1,
                destroyed: 1,
            }
        );
        assert_eq!(counts.live(), 2);

        drop(a);
        drop(c);
        dispatcher.flush_async_events();
        assert_eq!(stats.lock().totals().live(), 0);
    }

    #[test]
    fn test_unknown_type_has_zero_counts() {
        let stats = DispatchStats::new();
        assert_eq!(stats.counts("Nothing"), LifecycleCounts::default());
        assert_eq!(stats.totals().live(), 0);
    }
}
