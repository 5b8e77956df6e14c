// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Plain argument types shared by the producer API, the command stream and [`crate::Driver`].
//!
//! Everything here is a small value type.  Byte payloads (initial buffer contents, shader
//! blobs, texel data) are borrowed, so a descriptor decoded on the worker points straight
//! into the frame's command stream.

use crate::handle::Handle;
use bytemuck::{Pod, Zeroable};

/// Color attachments a pass may declare.
pub const MAX_COLOR_TARGETS: usize = 4;

/// A pixel rectangle.  The all-zero rect means "unset" wherever a rect is optional.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

bitflags::bitflags! {
    /// How the backend will use a buffer.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u8 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        /// CPU-writable staging memory, the source of uploads.
        const STAGING = 1 << 3;
        /// The CPU will read this buffer back.
        const READBACK = 1 << 4;
    }
}

bitflags::bitflags! {
    /// How the backend will use a texture.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u8 {
        const SAMPLED = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const READBACK = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Which attachments a pass clears when it is prepared.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BufferDesc<'a> {
    pub size: u32,
    pub usage: BufferUsage,
    pub label: &'a str,
}

impl<'a> BufferDesc<'a> {
    pub const fn new(size: u32, usage: BufferUsage, label: &'a str) -> Self {
        BufferDesc { size, usage, label }
    }
}

/**
Texel formats.

The core only needs the texel size, for sizing uploads and readbacks; what the bits
mean is the driver's business.
*/
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8 = 0,
    Rgba8 = 1,
    Rgba32F = 2,
    Depth32F = 3,
}

impl TextureFormat {
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rgba8 | TextureFormat::Depth32F => 4,
            TextureFormat::Rgba32F => 16,
        }
    }

    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => TextureFormat::R8,
            1 => TextureFormat::Rgba8,
            2 => TextureFormat::Rgba32F,
            3 => TextureFormat::Depth32F,
            _ => return None,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureDesc<'a> {
    pub width: u16,
    pub height: u16,
    /// Depth for 3D textures, 1 otherwise.
    pub depth: u16,
    pub layers: u16,
    pub mips: u8,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub label: &'a str,
}

impl<'a> TextureDesc<'a> {
    /// A single-mip 2D texture.
    pub const fn new_2d(
        width: u16,
        height: u16,
        format: TextureFormat,
        usage: TextureUsage,
        label: &'a str,
    ) -> Self {
        TextureDesc {
            width,
            height,
            depth: 1,
            layers: 1,
            mips: 1,
            format,
            usage,
            label,
        }
    }

    /// The region covering all of mip 0, layer 0.
    pub const fn full_region(&self) -> TextureRegion {
        TextureRegion {
            x: 0,
            y: 0,
            z: 0,
            width: self.width,
            height: self.height,
            depth: self.depth,
            mip: 0,
            layer: 0,
        }
    }
}

/// A box inside one mip of one layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct TextureRegion {
    pub x: u16,
    pub y: u16,
    pub z: u16,
    pub width: u16,
    pub height: u16,
    pub depth: u16,
    pub mip: u8,
    pub layer: u16,
}

impl TextureRegion {
    pub const fn new_2d(x: u16, y: u16, width: u16, height: u16) -> Self {
        TextureRegion {
            x,
            y,
            z: 0,
            width,
            height,
            depth: 1,
            mip: 0,
            layer: 0,
        }
    }
    pub const fn texel_count(&self) -> u32 {
        self.width as u32 * self.height as u32 * self.depth as u32
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearState {
    pub flags: ClearFlags,
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u8,
}

impl Default for ClearState {
    fn default() -> Self {
        ClearState {
            flags: ClearFlags::empty(),
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/**
A render pass: where draws land and how the attachments start out.

A pass with no color targets renders to the backbuffer.
*/
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct PassDesc {
    pub colors: [Handle; MAX_COLOR_TARGETS],
    pub depth: Handle,
    pub clear: ClearState,
}

impl PassDesc {
    pub fn backbuffer(clear: ClearState) -> Self {
        PassDesc {
            colors: [Handle::INVALID; MAX_COLOR_TARGETS],
            depth: Handle::INVALID,
            clear,
        }
    }
}

/**
A binding name shared between pipelines and materials.

Semantics are 32-bit FNV-1a hashes of a name, so they can be built in `const` context
and compared cheaply.
*/
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
pub struct Semantic(pub u32);

impl Semantic {
    pub const fn new(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash: u32 = 0x811c_9dc5;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(0x0100_0193);
            i += 1;
        }
        Semantic(hash)
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Texture = 0,
    Uniform = 1,
}

impl BindingKind {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(BindingKind::Texture),
            1 => Some(BindingKind::Uniform),
            _ => None,
        }
    }
}

/// One semantic → slot entry a pipeline declares.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PipelineBinding {
    pub semantic: Semantic,
    pub kind: BindingKind,
    pub slot: u8,
}

impl PipelineBinding {
    pub const fn texture(name: &str, slot: u8) -> Self {
        PipelineBinding {
            semantic: Semantic::new(name),
            kind: BindingKind::Texture,
            slot,
        }
    }
    pub const fn uniform(name: &str, slot: u8) -> Self {
        PipelineBinding {
            semantic: Semantic::new(name),
            kind: BindingKind::Uniform,
            slot,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Primitive {
    #[default]
    TriangleList = 0,
    TriangleStrip = 1,
}

impl Primitive {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Primitive::TriangleList),
            1 => Some(Primitive::TriangleStrip),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Fixed-function state baked into a pipeline.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct PipelineState: u32 {
        const DEPTH_TEST = 1 << 0;
        const DEPTH_WRITE = 1 << 1;
        const ALPHA_BLEND = 1 << 2;
        const CULL_BACK = 1 << 3;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDesc<'a> {
    pub label: &'a str,
    /// Compiled shader blob from the content pipeline; opaque to the core.
    pub shader: &'a [u8],
    pub primitive: Primitive,
    pub state: PipelineState,
    pub bindings: Vec<PipelineBinding>,
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    #[default]
    Linear = 0,
    Nearest = 1,
    Anisotropic = 2,
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Clamp = 0,
    Repeat = 1,
    Border = 2,
}

/**
Packed sampler state: filter in the low byte, address mode in the next.

Zero is linear filtering with clamped addressing, which is what an unset slot uses.
*/
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct SamplerState(u32);

impl SamplerState {
    pub const fn new(filter: Filter, address: AddressMode) -> Self {
        SamplerState(filter as u32 | (address as u32) << 8)
    }
    pub const fn filter(self) -> Filter {
        match self.0 & 0xff {
            1 => Filter::Nearest,
            2 => Filter::Anisotropic,
            _ => Filter::Linear,
        }
    }
    pub const fn address(self) -> AddressMode {
        match (self.0 >> 8) & 0xff {
            1 => AddressMode::Repeat,
            2 => AddressMode::Border,
            _ => AddressMode::Clamp,
        }
    }
}

impl std::fmt::Debug for SamplerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerState")
            .field("filter", &self.filter())
            .field("address", &self.address())
            .finish()
    }
}

/// One texture a material supplies for a semantic.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MaterialEntry {
    pub semantic: Semantic,
    /// [`Handle::INVALID`] leaves the slot unbound.
    pub texture: Handle,
    pub sampler: SamplerState,
}

impl MaterialEntry {
    pub const fn new(name: &str, texture: Handle, sampler: SamplerState) -> Self {
        MaterialEntry {
            semantic: Semantic::new(name),
            texture,
            sampler,
        }
    }
}

/// What the driver reports about itself after initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub name: String,
    pub max_texture_size: u32,
    /// Required alignment for uniform buffer offsets.
    pub uniform_alignment: u32,
    pub instancing: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            name: String::from("unknown"),
            max_texture_size: 8192,
            uniform_alignment: 256,
            instancing: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_is_fnv1a() {
        //reference values for 32-bit FNV-1a
        assert_eq!(Semantic::new("").0, 0x811c_9dc5);
        assert_eq!(Semantic::new("a").0, 0xe40c_292c);
        assert_ne!(Semantic::new("albedo"), Semantic::new("normal"));
    }

    #[test]
    fn sampler_state_packs() {
        let s = SamplerState::new(Filter::Nearest, AddressMode::Border);
        assert_eq!(s.filter(), Filter::Nearest);
        assert_eq!(s.address(), AddressMode::Border);
        assert_eq!(SamplerState::default().filter(), Filter::Linear);
        assert_eq!(SamplerState::default().address(), AddressMode::Clamp);
    }

    #[test]
    fn texel_sizes() {
        assert_eq!(TextureFormat::Rgba8.bytes_per_texel(), 4);
        assert_eq!(TextureFormat::Rgba32F.bytes_per_texel(), 16);
        for raw in 0..4 {
            let format = TextureFormat::from_u8(raw).unwrap();
            assert_eq!(format as u8, raw);
        }
        assert_eq!(TextureFormat::from_u8(4), None);
    }
}
