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

//! Strongly typed identifiers and the injected ticket allocator that mints them.
//!
//! There is no process-wide counter: every universe (or test) owns a
//! [`TicketAllocator`] and hands it to whatever creates nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_id {
    ($(#[$attr:meta])* $name:ident, $prefix:literal) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Wraps a ticket issued by a [`TicketAllocator`].
            #[inline]
            pub const fn from_ticket(ticket: u64) -> Self {
                Self(ticket)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identifies a virtual universe. Structures and messages are scoped to one.
    UniverseId,
    "universe"
);
define_id!(
    /// Identifies a behavior node.
    BehaviorId,
    "behavior"
);
define_id!(
    /// Identifies a retained node component (attributes, appearance, ...).
    ComponentId,
    "component"
);
define_id!(
    /// Identifies a sensor fed by an input device.
    SensorId,
    "sensor"
);
define_id!(
    /// Identifies a locale inside a universe.
    LocaleId,
    "locale"
);

/// Hands out monotonically increasing tickets, starting at 1.
#[derive(Debug)]
pub struct TicketAllocator {
    next: AtomicU64,
}

impl TicketAllocator {
    /// Creates an allocator whose first ticket is 1.
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns a fresh ticket.
    #[inline]
    pub fn next_ticket(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Mints a new behavior id.
    pub fn behavior(&self) -> BehaviorId {
        BehaviorId::from_ticket(self.next_ticket())
    }

    /// Mints a new component id.
    pub fn component(&self) -> ComponentId {
        ComponentId::from_ticket(self.next_ticket())
    }

    /// Mints a new sensor id.
    pub fn sensor(&self) -> SensorId {
        SensorId::from_ticket(self.next_ticket())
    }

    /// Mints a new universe id.
    pub fn universe(&self) -> UniverseId {
        UniverseId::from_ticket(self.next_ticket())
    }
}

impl Default for TicketAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn tickets_are_unique_across_threads() {
        let allocator = Arc::new(TicketAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                thread::spawn(move || (0..250).map(|_| allocator.next_ticket()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for ticket in handle.join().expect("allocator thread panicked") {
                assert!(seen.insert(ticket), "ticket {ticket} issued twice");
            }
        }
        assert_eq!(seen.len(), 1000);
        assert!(!seen.contains(&0));
    }

    #[test]
    fn display_carries_the_kind() {
        assert_eq!(BehaviorId(7).to_string(), "behavior#7");
        assert_eq!(UniverseId(2).to_string(), "universe#2");
    }
}
