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

//! The closed set of message kinds carried by the bus.

/// What changed. Consumers match on this and drop kinds they do not handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    // --- Behavior structure ---
    /// A behavior became live. `object` carries the behavior node.
    InsertBehavior,
    /// A behavior left the live graph. `object` carries the behavior id.
    RemoveBehavior,
    /// A live behavior was enabled.
    BehaviorEnable,
    /// A live behavior was disabled.
    BehaviorDisable,
    /// The scheduling interval of a behavior changed. `args[0]` is the new interval.
    SchedulingIntervalUpdate,
    /// A behavior posted an id. `args[0]` is the post id, `object` the poster.
    BehaviorPost,

    // --- Rendering-attributes structure ---
    /// A component went live; `args[0]` carries its initial attribute snapshot.
    ComponentInserted,
    /// A component left the live graph.
    ComponentRemoved,
    /// An appearance bundle changed.
    AppearanceChanged,
    /// A shader appearance changed.
    ShaderAppearanceChanged,
    /// Coloring attributes changed.
    ColoringAttributesChanged,
    /// Line attributes changed.
    LineAttributesChanged,
    /// Point attributes changed.
    PointAttributesChanged,
    /// Polygon attributes changed.
    PolygonAttributesChanged,
    /// Rendering attributes changed.
    RenderingAttributesChanged,
    /// Transparency attributes changed.
    TransparencyAttributesChanged,
    /// Material changed.
    MaterialChanged,
    /// Texture attributes changed.
    TextureAttributesChanged,
    /// Texture coordinate generation changed.
    TexCoordGenerationChanged,

    // --- Consumed outside this core ---
    /// Fog parameters changed.
    FogChanged,
    /// Geometry data changed.
    GeometryChanged,
    /// A transform changed.
    TransformChanged,
}

impl MessageType {
    /// Returns `true` for the attribute-change kinds handled by the
    /// rendering-attributes structure.
    pub const fn is_attribute_change(self) -> bool {
        matches!(
            self,
            MessageType::AppearanceChanged
                | MessageType::ShaderAppearanceChanged
                | MessageType::ColoringAttributesChanged
                | MessageType::LineAttributesChanged
                | MessageType::PointAttributesChanged
                | MessageType::PolygonAttributesChanged
                | MessageType::RenderingAttributesChanged
                | MessageType::TransparencyAttributesChanged
                | MessageType::MaterialChanged
                | MessageType::TextureAttributesChanged
                | MessageType::TexCoordGenerationChanged
        )
    }
}
