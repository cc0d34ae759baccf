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

//! The message bus that carries live-graph mutations to structure-update passes.
//!
//! Application-side edits never touch the renderer's state directly. They are
//! described by a [`Message`], fanned out by the [`MessageBus`] to the private
//! [`MessageQueue`] of every structure named in the message's thread mask, and
//! applied by each structure during its own scheduling turn. A message shared
//! by several structures is freed once the last [`Delivery`] is dropped.

mod bus;
mod envelope;
mod types;

pub use self::bus::{MessageBus, MessageQueue};
pub use self::envelope::{Delivery, Message, MessageArg, MAX_ARGS};
pub use self::types::MessageType;
