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

//! Attribute bundles a retained component carries, one per kind.

use arbor_core::math::Vec3;
use arbor_core::message::MessageType;
use arbor_core::ComponentId;

/// Declares an attribute bundle with a per-field change mask.
///
/// `changes` sets bit `n` when the `n`-th declared field differs.
macro_rules! attribute_bundle {
    (
        $(#[$attr:meta])*
        pub struct $name:ident {
            $(
                $(#[$field_attr:meta])*
                $field:ident : $ty:ty = $default:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $(
                $(#[$field_attr])*
                pub $field: $ty,
            )+
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $($field: $default,)+
                }
            }
        }

        impl $name {
            /// One bit per field that differs from `previous`, in declaration order.
            pub fn changes(&self, previous: &Self) -> u64 {
                let mut bits = 0u64;
                let mut bit = 1u64;
                $(
                    if self.$field != previous.$field {
                        bits |= bit;
                    }
                    bit <<= 1;
                )+
                let _ = bit;
                bits
            }
        }
    };
}

/// Per-pixel comparison used by depth and alpha tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestFunction {
    /// Always passes.
    #[default]
    Always,
    /// Never passes.
    Never,
    /// Passes if the incoming value is less.
    Less,
    /// Passes if the incoming value is less or equal.
    LessOrEqual,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the values differ.
    NotEqual,
    /// Passes if the incoming value is greater or equal.
    GreaterOrEqual,
    /// Passes if the incoming value is greater.
    Greater,
}

/// How primitives are shaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadeModel {
    /// One color per primitive.
    Flat,
    /// Colors interpolated across the primitive.
    #[default]
    Gouraud,
}

/// How polygons are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolygonMode {
    /// Vertices only.
    Point,
    /// Edges only.
    Line,
    /// Filled interiors.
    #[default]
    Fill,
}

/// Which faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullFace {
    /// Nothing is culled.
    None,
    /// Back faces are culled.
    #[default]
    Back,
    /// Front faces are culled.
    Front,
}

/// How transparent fragments are blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransparencyMode {
    /// Opaque.
    #[default]
    None,
    /// Fastest method the pipeline has.
    Fastest,
    /// Alpha blending.
    Blended,
    /// Screen-door stippling.
    ScreenDoor,
}

/// How texels combine with the fragment color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureMode {
    /// Texel times fragment.
    #[default]
    Modulate,
    /// Texel blended over the fragment by texel alpha.
    Decal,
    /// Blend with the blend color.
    Blend,
    /// Texel replaces the fragment.
    Replace,
}

/// How texture coordinates are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TexGenMode {
    /// Linear in object space.
    #[default]
    ObjectLinear,
    /// Linear in eye space.
    EyeLinear,
    /// Spherical reflection map.
    SphereMap,
    /// Normal vector map.
    NormalMap,
    /// Reflection vector map.
    ReflectionMap,
}

attribute_bundle! {
    /// Base color and shading.
    pub struct ColoringAttributes {
        /// Color used when lighting is off.
        color: Vec3 = Vec3::ONE,
        /// Shading model.
        shade_model: ShadeModel = ShadeModel::Gouraud,
    }
}

attribute_bundle! {
    /// Line rasterization.
    pub struct LineAttributes {
        /// Width in pixels.
        width: f32 = 1.0,
        /// 16-bit stipple pattern; all ones is solid.
        pattern: u16 = 0xffff,
        /// Line antialiasing.
        antialiasing: bool = false,
    }
}

attribute_bundle! {
    /// Point rasterization.
    pub struct PointAttributes {
        /// Size in pixels.
        size: f32 = 1.0,
        /// Point antialiasing.
        antialiasing: bool = false,
    }
}

attribute_bundle! {
    /// Polygon rasterization.
    pub struct PolygonAttributes {
        /// Fill mode.
        mode: PolygonMode = PolygonMode::Fill,
        /// Face culling.
        cull_face: CullFace = CullFace::Back,
        /// Depth offset in depth units.
        polygon_offset: f32 = 0.0,
        /// Whether back faces get flipped normals.
        back_face_normal_flip: bool = false,
    }
}

attribute_bundle! {
    /// Per-fragment tests and visibility.
    pub struct RenderingAttributes {
        /// Depth test enable.
        depth_test: bool = true,
        /// Depth buffer writes.
        depth_write: bool = true,
        /// Depth comparison.
        depth_test_function: TestFunction = TestFunction::LessOrEqual,
        /// Alpha reference value.
        alpha_test_value: f32 = 0.0,
        /// Alpha comparison.
        alpha_test_function: TestFunction = TestFunction::Always,
        /// Whether the geometry is drawn at all.
        visible: bool = true,
        /// Use material colors instead of per-vertex colors.
        ignore_vertex_colors: bool = false,
    }
}

attribute_bundle! {
    /// Transparency.
    pub struct TransparencyAttributes {
        /// Blending method.
        mode: TransparencyMode = TransparencyMode::None,
        /// Opacity loss, 0 opaque and 1 invisible.
        transparency: f32 = 0.0,
    }
}

attribute_bundle! {
    /// Lighting material.
    pub struct Material {
        /// Ambient reflectance.
        ambient: Vec3 = Vec3::splat(0.2),
        /// Diffuse reflectance.
        diffuse: Vec3 = Vec3::ONE,
        /// Specular reflectance.
        specular: Vec3 = Vec3::ONE,
        /// Emitted color.
        emissive: Vec3 = Vec3::ZERO,
        /// Specular exponent, 1 to 128.
        shininess: f32 = 64.0,
        /// Lighting enable.
        lighting_enabled: bool = true,
    }
}

attribute_bundle! {
    /// Texture application.
    pub struct TextureAttributes {
        /// Combine mode.
        mode: TextureMode = TextureMode::Modulate,
        /// Constant color for [`TextureMode::Blend`].
        blend_color: [f32; 4] = [0.0; 4],
        /// Perspective-correct interpolation.
        perspective_correction: bool = true,
    }
}

attribute_bundle! {
    /// Texture coordinate generation.
    pub struct TexCoordGeneration {
        /// Generation enable.
        enabled: bool = true,
        /// Generation function.
        mode: TexGenMode = TexGenMode::ObjectLinear,
        /// Number of generated coordinates, 2 to 4.
        components: u8 = 2,
    }
}

attribute_bundle! {
    /// A bundle of references to the attribute components a shape uses.
    pub struct Appearance {
        /// Coloring attributes.
        coloring: Option<ComponentId> = None,
        /// Line attributes.
        line: Option<ComponentId> = None,
        /// Point attributes.
        point: Option<ComponentId> = None,
        /// Polygon attributes.
        polygon: Option<ComponentId> = None,
        /// Rendering attributes.
        rendering: Option<ComponentId> = None,
        /// Transparency attributes.
        transparency: Option<ComponentId> = None,
        /// Material.
        material: Option<ComponentId> = None,
        /// Texture attributes.
        texture: Option<ComponentId> = None,
        /// Texture coordinate generation.
        tex_gen: Option<ComponentId> = None,
    }
}

attribute_bundle! {
    /// An appearance whose shading is driven by a shader program.
    pub struct ShaderAppearance {
        /// The fixed-function references.
        appearance: Appearance = Appearance::default(),
        /// Name of the shader program.
        program: Option<String> = None,
    }
}

/// The eleven attribute component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// [`Appearance`]
    Appearance,
    /// [`ShaderAppearance`]
    ShaderAppearance,
    /// [`ColoringAttributes`]
    Coloring,
    /// [`LineAttributes`]
    Line,
    /// [`PointAttributes`]
    Point,
    /// [`PolygonAttributes`]
    Polygon,
    /// [`RenderingAttributes`]
    Rendering,
    /// [`TransparencyAttributes`]
    Transparency,
    /// [`Material`]
    Material,
    /// [`TextureAttributes`]
    Texture,
    /// [`TexCoordGeneration`]
    TexCoordGeneration,
}

impl AttributeKind {
    /// The message announcing a change of this kind.
    pub const fn change_message(self) -> MessageType {
        match self {
            AttributeKind::Appearance => MessageType::AppearanceChanged,
            AttributeKind::ShaderAppearance => MessageType::ShaderAppearanceChanged,
            AttributeKind::Coloring => MessageType::ColoringAttributesChanged,
            AttributeKind::Line => MessageType::LineAttributesChanged,
            AttributeKind::Point => MessageType::PointAttributesChanged,
            AttributeKind::Polygon => MessageType::PolygonAttributesChanged,
            AttributeKind::Rendering => MessageType::RenderingAttributesChanged,
            AttributeKind::Transparency => MessageType::TransparencyAttributesChanged,
            AttributeKind::Material => MessageType::MaterialChanged,
            AttributeKind::Texture => MessageType::TextureAttributesChanged,
            AttributeKind::TexCoordGeneration => MessageType::TexCoordGenerationChanged,
        }
    }

    /// The kind a change message is about.
    pub const fn from_change_message(message: MessageType) -> Option<Self> {
        Some(match message {
            MessageType::AppearanceChanged => AttributeKind::Appearance,
            MessageType::ShaderAppearanceChanged => AttributeKind::ShaderAppearance,
            MessageType::ColoringAttributesChanged => AttributeKind::Coloring,
            MessageType::LineAttributesChanged => AttributeKind::Line,
            MessageType::PointAttributesChanged => AttributeKind::Point,
            MessageType::PolygonAttributesChanged => AttributeKind::Polygon,
            MessageType::RenderingAttributesChanged => AttributeKind::Rendering,
            MessageType::TransparencyAttributesChanged => AttributeKind::Transparency,
            MessageType::MaterialChanged => AttributeKind::Material,
            MessageType::TextureAttributesChanged => AttributeKind::Texture,
            MessageType::TexCoordGenerationChanged => AttributeKind::TexCoordGeneration,
            _ => return None,
        })
    }

    /// Appearance kinds are never deferred: render-bin membership depends on them.
    pub const fn is_appearance(self) -> bool {
        matches!(self, AttributeKind::Appearance | AttributeKind::ShaderAppearance)
    }
}

/// The state of one attribute component.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Appearance bundle.
    Appearance(Appearance),
    /// Shader appearance bundle.
    ShaderAppearance(ShaderAppearance),
    /// Coloring attributes.
    Coloring(ColoringAttributes),
    /// Line attributes.
    Line(LineAttributes),
    /// Point attributes.
    Point(PointAttributes),
    /// Polygon attributes.
    Polygon(PolygonAttributes),
    /// Rendering attributes.
    Rendering(RenderingAttributes),
    /// Transparency attributes.
    Transparency(TransparencyAttributes),
    /// Material.
    Material(Material),
    /// Texture attributes.
    Texture(TextureAttributes),
    /// Texture coordinate generation.
    TexCoordGeneration(TexCoordGeneration),
}

impl AttributeValue {
    /// The kind of this value.
    pub const fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Appearance(_) => AttributeKind::Appearance,
            AttributeValue::ShaderAppearance(_) => AttributeKind::ShaderAppearance,
            AttributeValue::Coloring(_) => AttributeKind::Coloring,
            AttributeValue::Line(_) => AttributeKind::Line,
            AttributeValue::Point(_) => AttributeKind::Point,
            AttributeValue::Polygon(_) => AttributeKind::Polygon,
            AttributeValue::Rendering(_) => AttributeKind::Rendering,
            AttributeValue::Transparency(_) => AttributeKind::Transparency,
            AttributeValue::Material(_) => AttributeKind::Material,
            AttributeValue::Texture(_) => AttributeKind::Texture,
            AttributeValue::TexCoordGeneration(_) => AttributeKind::TexCoordGeneration,
        }
    }

    /// The change mask from `previous` to `self`, or `None` if the kinds differ.
    pub fn changes(&self, previous: &AttributeValue) -> Option<u64> {
        use AttributeValue as V;
        Some(match (self, previous) {
            (V::Appearance(a), V::Appearance(b)) => a.changes(b),
            (V::ShaderAppearance(a), V::ShaderAppearance(b)) => a.changes(b),
            (V::Coloring(a), V::Coloring(b)) => a.changes(b),
            (V::Line(a), V::Line(b)) => a.changes(b),
            (V::Point(a), V::Point(b)) => a.changes(b),
            (V::Polygon(a), V::Polygon(b)) => a.changes(b),
            (V::Rendering(a), V::Rendering(b)) => a.changes(b),
            (V::Transparency(a), V::Transparency(b)) => a.changes(b),
            (V::Material(a), V::Material(b)) => a.changes(b),
            (V::Texture(a), V::Texture(b)) => a.changes(b),
            (V::TexCoordGeneration(a), V::TexCoordGeneration(b)) => a.changes(b),
            _ => return None,
        })
    }
}

macro_rules! impl_from_bundle {
    ($($bundle:ident => $variant:ident),+ $(,)?) => {
        $(
            impl From<$bundle> for AttributeValue {
                fn from(value: $bundle) -> Self {
                    AttributeValue::$variant(value)
                }
            }
        )+
    };
}

impl_from_bundle! {
    Appearance => Appearance,
    ShaderAppearance => ShaderAppearance,
    ColoringAttributes => Coloring,
    LineAttributes => Line,
    PointAttributes => Point,
    PolygonAttributes => Polygon,
    RenderingAttributes => Rendering,
    TransparencyAttributes => Transparency,
    Material => Material,
    TextureAttributes => Texture,
    TexCoordGeneration => TexCoordGeneration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_bits_follow_field_order() {
        let before = RenderingAttributes::default();
        let mut after = before.clone();
        after.depth_write = false;
        after.visible = false;
        assert_eq!(after.changes(&before), 0b10_0010);
        assert_eq!(before.changes(&before), 0);
    }

    #[test]
    fn mismatched_kinds_have_no_change_mask() {
        let coloring = AttributeValue::from(ColoringAttributes::default());
        let line = AttributeValue::from(LineAttributes::default());
        assert_eq!(coloring.changes(&line), None);
        assert_eq!(coloring.changes(&coloring), Some(0));
    }

    #[test]
    fn change_messages_map_back_to_their_kind() {
        let kinds = [
            AttributeKind::Appearance,
            AttributeKind::ShaderAppearance,
            AttributeKind::Coloring,
            AttributeKind::Line,
            AttributeKind::Point,
            AttributeKind::Polygon,
            AttributeKind::Rendering,
            AttributeKind::Transparency,
            AttributeKind::Material,
            AttributeKind::Texture,
            AttributeKind::TexCoordGeneration,
        ];
        for kind in kinds {
            let message = kind.change_message();
            assert!(message.is_attribute_change());
            assert_eq!(AttributeKind::from_change_message(message), Some(kind));
        }
        assert_eq!(AttributeKind::from_change_message(MessageType::FogChanged), None);
    }
}
