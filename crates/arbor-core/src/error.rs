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

//! The error type shared by the scheduling core.

use crate::ids::{BehaviorId, ComponentId};
use thiserror::Error;

/// Errors surfaced to callers of the scheduling core.
///
/// Faults inside scheduler threads (callback failures, unknown messages,
/// misuse of the spatial tree) are logged and contained instead of being
/// returned through this type.
#[derive(Debug, Error)]
pub enum ArborError {
    /// A wakeup combinator was built without children.
    #[error("wakeup combinator `{0}` needs at least one child condition")]
    EmptyCombinator(&'static str),

    /// A query that is only meaningful inside a behavior callback was made outside one.
    #[error("`{0}` may only be called from inside a behavior callback")]
    NotInCallback(&'static str),

    /// The behavior is not known to the structure.
    #[error("unknown behavior {0}")]
    UnknownBehavior(BehaviorId),

    /// The component is not known to the structure.
    #[error("unknown component {0}")]
    UnknownComponent(ComponentId),

    /// A scheduling interval outside `0..NUM_SCHEDULING_INTERVALS` was requested.
    #[error("scheduling interval {interval} out of range (0..{max})")]
    InvalidSchedulingInterval {
        /// The rejected interval.
        interval: usize,
        /// The exclusive upper bound.
        max: usize,
    },

    /// Configuration text could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias for results carrying an [`ArborError`].
pub type Result<T> = std::result::Result<T, ArborError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = ArborError::InvalidSchedulingInterval {
            interval: 12,
            max: 10,
        };
        assert_eq!(err.to_string(), "scheduling interval 12 out of range (0..10)");
        assert_eq!(
            ArborError::UnknownBehavior(BehaviorId(3)).to_string(),
            "unknown behavior behavior#3"
        );
    }
}
