// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The command stream: one [`Command`] variant per deferred driver operation.

On the wire a command is its [`CommandTag`] byte followed by its fields in declaration
order.  Integers are varints, byte spans and strings are length-prefixed, and a
`Submit` carries its [`Submission`]s as one raw POD array.  Decoding borrows byte spans
and, where alignment allows, the submission array straight out of the stream.

The format is private to one process and unversioned.
*/

use crate::arena::{ArenaLayout, Usage};
use crate::binary::{self, Reader, Writer};
use crate::descriptors::{
    BindingKind, BufferDesc, BufferUsage, ClearFlags, ClearState, MAX_COLOR_TARGETS, PassDesc,
    PipelineBinding, PipelineDesc, PipelineState, Primitive, Rect, Semantic, TextureDesc,
    TextureFormat, TextureRegion, TextureUsage,
};
use crate::driver::Driver;
use crate::encoder::Submission;
use crate::handle::Handle;
use std::borrow::Cow;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("unknown command tag {0:#04x}")]
    UnknownTag(u8),
    #[error(transparent)]
    Binary(#[from] binary::Error),
}

pub(crate) trait Encode {
    fn encode(&self, w: &mut Writer);
}

pub(crate) trait Decode<'a>: Sized {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error>;
}

macro_rules! commands {
    (<$lt:lifetime> $($(#[doc = $doc:literal])* $variant:ident = $tag:literal { $($field:ident : $ty:ty),* $(,)? }),* $(,)?) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum Command<$lt> {
            $($(#[doc = $doc])* $variant { $($field: $ty),* },)*
        }

        #[repr(u8)]
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum CommandTag {
            $($variant = $tag,)*
        }

        impl CommandTag {
            pub const fn from_u8(raw: u8) -> Option<Self> {
                match raw {
                    $($tag => Some(CommandTag::$variant),)*
                    _ => None,
                }
            }
        }

        impl<$lt> Command<$lt> {
            pub fn tag(&self) -> CommandTag {
                match self {
                    $(Command::$variant { .. } => CommandTag::$variant,)*
                }
            }

            /// Appends the tag and the fields.
            pub fn encode(&self, w: &mut Writer) {
                match self {
                    $(Command::$variant { $($field),* } => {
                        w.write_u8(CommandTag::$variant as u8);
                        $(Encode::encode($field, w);)*
                    })*
                }
            }

            /// Reads one command from the front of `r`.
            pub fn decode(r: &mut Reader<$lt>) -> Result<Self, Error> {
                let raw = r.read_u8()?;
                let tag = CommandTag::from_u8(raw).ok_or(Error::UnknownTag(raw))?;
                Ok(match tag {
                    $(CommandTag::$variant => Command::$variant {
                        $($field: <$ty as Decode<$lt>>::decode(r)?),*
                    },)*
                })
            }
        }
    };
}

commands! {<'a>
    /// Brings the driver up and creates every arena buffer.
    Initialize = 0 { arenas: Vec<ArenaLayout> },
    Reset = 1 { width: u16, height: u16, vsync: bool },
    CreateBuffer = 2 { handle: Handle, desc: BufferDesc<'a>, data: &'a [u8] },
    UpdateBuffer = 3 { handle: Handle, offset: u32, data: &'a [u8] },
    ResizeBuffer = 4 { handle: Handle, size: u32 },
    DeleteBuffer = 5 { handle: Handle },
    CopyBuffer = 6 { dst: Handle, dst_offset: u32, src: Handle, src_offset: u32, size: u32 },
    /// Reads a buffer back; the result resolves the frame's readback `ticket`.
    ReadBuffer = 7 { handle: Handle, offset: u32, size: u32, ticket: u32 },
    CreatePass = 8 { handle: Handle, desc: PassDesc },
    DeletePass = 9 { handle: Handle },
    CreatePipeline = 10 { handle: Handle, desc: PipelineDesc<'a> },
    DeletePipeline = 11 { handle: Handle },
    CreateTexture = 12 { handle: Handle, desc: TextureDesc<'a>, data: &'a [u8] },
    UpdateTexture = 13 { handle: Handle, region: TextureRegion, data: &'a [u8] },
    CopyTexture = 14 { dst: Handle, dst_region: TextureRegion, src: Handle, src_region: TextureRegion },
    ReadTexture = 15 { handle: Handle, region: TextureRegion, ticket: u32 },
    DeleteTexture = 16 { handle: Handle },
    Prepare = 17 { pass: Handle, viewport: Rect },
    Submit = 18 { submissions: Cow<'a, [Submission]> },
    Commit = 19 {},
}

/// Bytes produced by a read command, for the frame's readback table.
#[derive(Debug)]
pub(crate) struct Readback {
    pub ticket: u32,
    pub bytes: Vec<u8>,
}

impl Command<'_> {
    /**
    Calls the driver operation this command stands for.

    `Initialize` is the worker's to handle; one that reaches an already running driver
    is logged and dropped.
    */
    pub(crate) fn dispatch(&self, driver: &mut dyn Driver) -> Option<Readback> {
        match self {
            Command::Initialize { .. } => {
                logwise::warn_sync!("driver is already initialized; ignoring Initialize");
            }
            Command::Reset {
                width,
                height,
                vsync,
            } => driver.reset(*width, *height, *vsync),
            Command::CreateBuffer { handle, desc, data } => {
                driver.create_buffer(*handle, desc, data)
            }
            Command::UpdateBuffer {
                handle,
                offset,
                data,
            } => driver.update_buffer(*handle, *offset, data),
            Command::ResizeBuffer { handle, size } => driver.resize_buffer(*handle, *size),
            Command::DeleteBuffer { handle } => driver.delete_buffer(*handle),
            Command::CopyBuffer {
                dst,
                dst_offset,
                src,
                src_offset,
                size,
            } => driver.copy_buffer(*dst, *dst_offset, *src, *src_offset, *size),
            Command::ReadBuffer {
                handle,
                offset,
                size,
                ticket,
            } => {
                return Some(Readback {
                    ticket: *ticket,
                    bytes: driver.read_buffer(*handle, *offset, *size),
                });
            }
            Command::CreatePass { handle, desc } => driver.create_pass(*handle, desc),
            Command::DeletePass { handle } => driver.delete_pass(*handle),
            Command::CreatePipeline { handle, desc } => driver.create_pipeline(*handle, desc),
            Command::DeletePipeline { handle } => driver.delete_pipeline(*handle),
            Command::CreateTexture { handle, desc, data } => {
                driver.create_texture(*handle, desc, data)
            }
            Command::UpdateTexture {
                handle,
                region,
                data,
            } => driver.update_texture(*handle, region, data),
            Command::CopyTexture {
                dst,
                dst_region,
                src,
                src_region,
            } => driver.copy_texture(*dst, dst_region, *src, src_region),
            Command::ReadTexture {
                handle,
                region,
                ticket,
            } => {
                return Some(Readback {
                    ticket: *ticket,
                    bytes: driver.read_texture(*handle, region),
                });
            }
            Command::DeleteTexture { handle } => driver.delete_texture(*handle),
            Command::Prepare { pass, viewport } => driver.prepare(*pass, *viewport),
            Command::Submit { submissions } => driver.submit(submissions),
            Command::Commit {} => driver.commit(),
        }
        None
    }
}

//field codecs

fn invalid(raw: impl Into<u64>) -> binary::Error {
    binary::Error::OutOfRange(raw.into())
}

impl Encode for u8 {
    fn encode(&self, w: &mut Writer) {
        w.write_u8(*self);
    }
}
impl<'a> Decode<'a> for u8 {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        r.read_u8()
    }
}

impl Encode for u16 {
    fn encode(&self, w: &mut Writer) {
        w.write_u16(*self);
    }
}
impl<'a> Decode<'a> for u16 {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        r.read_u16()
    }
}

impl Encode for u32 {
    fn encode(&self, w: &mut Writer) {
        w.write_u32(*self);
    }
}
impl<'a> Decode<'a> for u32 {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        r.read_u32()
    }
}

impl Encode for bool {
    fn encode(&self, w: &mut Writer) {
        w.write_bool(*self);
    }
}
impl<'a> Decode<'a> for bool {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        r.read_bool()
    }
}

impl Encode for f32 {
    fn encode(&self, w: &mut Writer) {
        w.write_f32(*self);
    }
}
impl<'a> Decode<'a> for f32 {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        r.read_f32()
    }
}

impl Encode for &[u8] {
    fn encode(&self, w: &mut Writer) {
        w.write_bytes(self);
    }
}
impl<'a> Decode<'a> for &'a [u8] {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        r.read_bytes()
    }
}

impl Encode for &str {
    fn encode(&self, w: &mut Writer) {
        w.write_str(self);
    }
}
impl<'a> Decode<'a> for &'a str {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        r.read_str()
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, w: &mut Writer) {
        w.write_usize(self.len());
        for item in self {
            item.encode(w);
        }
    }
}
impl<'a, T: Decode<'a>> Decode<'a> for Vec<T> {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        let len = r.read_usize()?;
        //every element takes at least one byte
        if len > r.remaining() {
            return Err(binary::Error::UnexpectedEof {
                wanted: len,
                remaining: r.remaining(),
            });
        }
        (0..len).map(|_| T::decode(r)).collect()
    }
}

impl Encode for Handle {
    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.raw());
    }
}
impl<'a> Decode<'a> for Handle {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        r.read_u32().map(Handle::from_raw)
    }
}

impl Encode for Rect {
    fn encode(&self, w: &mut Writer) {
        w.write_u16(self.x);
        w.write_u16(self.y);
        w.write_u16(self.width);
        w.write_u16(self.height);
    }
}
impl<'a> Decode<'a> for Rect {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        Ok(Rect {
            x: r.read_u16()?,
            y: r.read_u16()?,
            width: r.read_u16()?,
            height: r.read_u16()?,
        })
    }
}

impl Encode for ArenaLayout {
    fn encode(&self, w: &mut Writer) {
        w.write_u8(self.slot);
        w.write_u8(self.usage as u8);
        self.gpu.encode(w);
        self.staging.encode(w);
        w.write_u32(self.size);
    }
}
impl<'a> Decode<'a> for ArenaLayout {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        let slot = r.read_u8()?;
        let raw = r.read_u8()?;
        Ok(ArenaLayout {
            slot,
            usage: Usage::from_u8(raw).ok_or(invalid(raw))?,
            gpu: Handle::decode(r)?,
            staging: Handle::decode(r)?,
            size: r.read_u32()?,
        })
    }
}

impl Encode for BufferDesc<'_> {
    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.size);
        w.write_u8(self.usage.bits());
        w.write_str(self.label);
    }
}
impl<'a> Decode<'a> for BufferDesc<'a> {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        let size = r.read_u32()?;
        let bits = r.read_u8()?;
        Ok(BufferDesc {
            size,
            usage: BufferUsage::from_bits(bits).ok_or(invalid(bits))?,
            label: r.read_str()?,
        })
    }
}

impl Encode for TextureDesc<'_> {
    fn encode(&self, w: &mut Writer) {
        w.write_u16(self.width);
        w.write_u16(self.height);
        w.write_u16(self.depth);
        w.write_u16(self.layers);
        w.write_u8(self.mips);
        w.write_u8(self.format as u8);
        w.write_u8(self.usage.bits());
        w.write_str(self.label);
    }
}
impl<'a> Decode<'a> for TextureDesc<'a> {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        let width = r.read_u16()?;
        let height = r.read_u16()?;
        let depth = r.read_u16()?;
        let layers = r.read_u16()?;
        let mips = r.read_u8()?;
        let format = r.read_u8()?;
        let usage = r.read_u8()?;
        Ok(TextureDesc {
            width,
            height,
            depth,
            layers,
            mips,
            format: TextureFormat::from_u8(format).ok_or(invalid(format))?,
            usage: TextureUsage::from_bits(usage).ok_or(invalid(usage))?,
            label: r.read_str()?,
        })
    }
}

impl Encode for TextureRegion {
    fn encode(&self, w: &mut Writer) {
        w.write_u16(self.x);
        w.write_u16(self.y);
        w.write_u16(self.z);
        w.write_u16(self.width);
        w.write_u16(self.height);
        w.write_u16(self.depth);
        w.write_u8(self.mip);
        w.write_u16(self.layer);
    }
}
impl<'a> Decode<'a> for TextureRegion {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        Ok(TextureRegion {
            x: r.read_u16()?,
            y: r.read_u16()?,
            z: r.read_u16()?,
            width: r.read_u16()?,
            height: r.read_u16()?,
            depth: r.read_u16()?,
            mip: r.read_u8()?,
            layer: r.read_u16()?,
        })
    }
}

impl Encode for ClearState {
    fn encode(&self, w: &mut Writer) {
        w.write_u8(self.flags.bits());
        for channel in self.color {
            w.write_f32(channel);
        }
        w.write_f32(self.depth);
        w.write_u8(self.stencil);
    }
}
impl<'a> Decode<'a> for ClearState {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        let bits = r.read_u8()?;
        Ok(ClearState {
            flags: ClearFlags::from_bits(bits).ok_or(invalid(bits))?,
            color: [r.read_f32()?, r.read_f32()?, r.read_f32()?, r.read_f32()?],
            depth: r.read_f32()?,
            stencil: r.read_u8()?,
        })
    }
}

impl Encode for PassDesc {
    fn encode(&self, w: &mut Writer) {
        for color in self.colors {
            color.encode(w);
        }
        self.depth.encode(w);
        self.clear.encode(w);
    }
}
impl<'a> Decode<'a> for PassDesc {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        let mut colors = [Handle::INVALID; MAX_COLOR_TARGETS];
        for color in &mut colors {
            *color = Handle::decode(r)?;
        }
        Ok(PassDesc {
            colors,
            depth: Handle::decode(r)?,
            clear: ClearState::decode(r)?,
        })
    }
}

impl Encode for PipelineBinding {
    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.semantic.0);
        w.write_u8(self.kind as u8);
        w.write_u8(self.slot);
    }
}
impl<'a> Decode<'a> for PipelineBinding {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        let semantic = Semantic(r.read_u32()?);
        let kind = r.read_u8()?;
        Ok(PipelineBinding {
            semantic,
            kind: BindingKind::from_u8(kind).ok_or(invalid(kind))?,
            slot: r.read_u8()?,
        })
    }
}

impl Encode for PipelineDesc<'_> {
    fn encode(&self, w: &mut Writer) {
        w.write_str(self.label);
        w.write_bytes(self.shader);
        w.write_u8(self.primitive as u8);
        w.write_u32(self.state.bits());
        self.bindings.encode(w);
    }
}
impl<'a> Decode<'a> for PipelineDesc<'a> {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        let label = r.read_str()?;
        let shader = r.read_bytes()?;
        let primitive = r.read_u8()?;
        let state = r.read_u32()?;
        Ok(PipelineDesc {
            label,
            shader,
            primitive: Primitive::from_u8(primitive).ok_or(invalid(primitive))?,
            state: PipelineState::from_bits(state).ok_or(invalid(state))?,
            bindings: Vec::decode(r)?,
        })
    }
}

impl Encode for Cow<'_, [Submission]> {
    fn encode(&self, w: &mut Writer) {
        w.write_slice::<Submission>(self);
    }
}
impl<'a> Decode<'a> for Cow<'a, [Submission]> {
    fn decode(r: &mut Reader<'a>) -> Result<Self, binary::Error> {
        r.read_slice::<Submission>()
    }
}
