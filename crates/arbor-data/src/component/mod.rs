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

//! Retained attribute components and the structure that mirrors them for
//! the renderer.

mod attributes;
mod retained;
mod structure;

pub use self::attributes::{
    Appearance, AttributeKind, AttributeValue, ColoringAttributes, CullFace, LineAttributes,
    Material, PointAttributes, PolygonAttributes, PolygonMode, RenderingAttributes,
    ShadeModel, ShaderAppearance, TexCoordGeneration, TexGenMode, TestFunction,
    TextureAttributes, TextureMode, TransparencyAttributes, TransparencyMode,
};
pub use self::retained::{
    RetainedComponent, ARG_CHANGES, ARG_FREQUENT, ARG_SNAPSHOT, ATTRIBUTE_CONSUMERS,
};
pub use self::structure::{AttributeMirror, RenderPipeline, RenderingAttributesStructure};
