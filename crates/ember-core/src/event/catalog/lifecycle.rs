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

//! Object-lifecycle payloads, produced by [`Tracked`](crate::event::lifecycle::Tracked).

use crate::event::Event;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a tracked object instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocates a fresh id. Ids are never reused.
    pub fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// A tracked object was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Event)]
#[event(async_dispatch, debug)]
pub struct ObjectCreated {
    /// The new object.
    pub id: ObjectId,
    /// The type of the tracked value.
    pub type_name: &'static str,
}

/// A tracked object was cloned into a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Event)]
#[event(async_dispatch, debug)]
pub struct ObjectCloned {
    /// The object cloned from.
    pub source: ObjectId,
    /// The new instance.
    pub id: ObjectId,
    /// The type of the tracked value.
    pub type_name: &'static str,
}

/// The value of a tracked object moved into a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Event)]
#[event(async_dispatch, debug)]
pub struct ObjectMoved {
    /// The instance left with a default value.
    pub from: ObjectId,
    /// The instance now holding the value.
    pub to: ObjectId,
    /// The type of the tracked value.
    pub type_name: &'static str,
}

/// A tracked object was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Event)]
#[event(async_dispatch, debug)]
pub struct ObjectDestroyed {
    /// The dropped object.
    pub id: ObjectId,
    /// The type of the tracked value.
    pub type_name: &'static str,
}
