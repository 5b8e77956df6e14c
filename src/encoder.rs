// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Builds a frame's draw calls as a list of [`Submission`]s.

An [`Encoder`] accumulates binding state through its `set_*` calls.  Each `draw`
freezes that state into one immutable [`Submission`] and resets it to defaults.  The
encoder knows nothing about the service or the command stream; hand it to
[`crate::Service::submit`] once the frame's draws are recorded.

Encoders are cheap and meant to be kept per calling thread and reused with
[`Encoder::clear`].
*/

use crate::arena::Stream;
use crate::descriptors::{BindingKind, MaterialEntry, PipelineBinding, Rect, SamplerState};
use crate::handle::Handle;
use bytemuck::{Pod, Zeroable};

pub const MAX_TEXTURES: usize = 8;
pub const MAX_UNIFORMS: usize = 4;
pub const MAX_VERTEX_STREAMS: usize = 4;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct DrawCommand {
    /// Vertices, or indices when an index stream is bound.
    pub count: u32,
    /// First vertex or index.
    pub base: u32,
    /// Added to each index before fetching the vertex.
    pub offset: i32,
    pub instances: u32,
}

/// One fully resolved draw call.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Submission {
    pub pipeline: Handle,
    pub textures: [Handle; MAX_TEXTURES],
    pub samplers: [SamplerState; MAX_TEXTURES],
    pub uniforms: [Stream; MAX_UNIFORMS],
    pub vertices: [Stream; MAX_VERTEX_STREAMS],
    pub indices: Stream,
    /// Empty means no scissor.
    pub scissor: Rect,
    pub stencil: u32,
    pub command: DrawCommand,
}

impl Default for Submission {
    fn default() -> Self {
        Submission::zeroed()
    }
}

impl Submission {
    pub fn is_indexed(&self) -> bool {
        self.indices.is_bound()
    }
}

/**
Producer-side record of a pipeline: its handle and the semantic → slot table it was
created with.

Obtained from [`crate::Service::pipeline`] and used by [`Encoder::bind`].
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineLayout {
    pub handle: Handle,
    pub bindings: Vec<PipelineBinding>,
}

/// Producer-side material: which texture and sampler each semantic resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub handle: Handle,
    pub entries: Vec<MaterialEntry>,
}

#[derive(Debug, Default)]
pub struct Encoder {
    current: Submission,
    submissions: Vec<Submission>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pipeline(&mut self, pipeline: Handle) {
        self.current.pipeline = pipeline;
    }

    /// # Panics
    /// Panics if `slot` is not below [`MAX_TEXTURES`].
    pub fn set_texture(&mut self, slot: usize, texture: Handle) {
        assert!(slot < MAX_TEXTURES, "texture slot {slot} out of range");
        self.current.textures[slot] = texture;
    }

    /// # Panics
    /// Panics if `slot` is not below [`MAX_TEXTURES`].
    pub fn set_sampler(&mut self, slot: usize, sampler: SamplerState) {
        assert!(slot < MAX_TEXTURES, "sampler slot {slot} out of range");
        self.current.samplers[slot] = sampler;
    }

    /// # Panics
    /// Panics if `slot` is not below [`MAX_UNIFORMS`].
    pub fn set_uniform(&mut self, slot: usize, stream: Stream) {
        assert!(slot < MAX_UNIFORMS, "uniform slot {slot} out of range");
        self.current.uniforms[slot] = stream;
    }

    /// # Panics
    /// Panics if `slot` is not below [`MAX_VERTEX_STREAMS`].
    pub fn set_vertices(&mut self, slot: usize, stream: Stream) {
        assert!(slot < MAX_VERTEX_STREAMS, "vertex slot {slot} out of range");
        self.current.vertices[slot] = stream;
    }

    pub fn set_indices(&mut self, stream: Stream) {
        self.current.indices = stream;
    }

    pub fn set_scissor(&mut self, scissor: Rect) {
        self.current.scissor = scissor;
    }

    pub fn set_stencil(&mut self, reference: u32) {
        self.current.stencil = reference;
    }

    /**
    Binds `pipeline` and resolves `material`'s textures into the pipeline's texture slots.

    Slots whose semantic the material doesn't mention, or mentions without a texture,
    end up unbound ([`Handle::INVALID`]).  Uniform and vertex semantics come from
    transient streams and are left alone.
    */
    pub fn bind(&mut self, pipeline: &PipelineLayout, material: &Material) {
        self.current.pipeline = pipeline.handle;
        for binding in &pipeline.bindings {
            if binding.kind != BindingKind::Texture {
                continue;
            }
            let slot = binding.slot as usize;
            if slot >= MAX_TEXTURES {
                logwise::warn_sync!(
                    "pipeline {handle} declares texture slot {slot} past the limit",
                    handle = pipeline.handle.raw(),
                    slot = slot
                );
                continue;
            }
            let entry = material
                .entries
                .iter()
                .find(|e| e.semantic == binding.semantic);
            let (texture, sampler) = match entry {
                Some(entry) => (entry.texture, entry.sampler),
                None => (Handle::INVALID, SamplerState::default()),
            };
            self.current.textures[slot] = texture;
            self.current.samplers[slot] = sampler;
        }
    }

    /// Records a single-instance draw.
    pub fn draw(&mut self, count: u32, base: u32, offset: i32) {
        self.draw_instanced(count, base, offset, 1);
    }

    pub fn draw_instanced(&mut self, count: u32, base: u32, offset: i32, instances: u32) {
        let mut submission = std::mem::take(&mut self.current);
        submission.command = DrawCommand {
            count,
            base,
            offset,
            instances,
        };
        self.submissions.push(submission);
    }

    /// Drops every recorded submission and resets the binding state.
    pub fn clear(&mut self) {
        self.submissions.clear();
        self.current = Submission::default();
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{AddressMode, Filter, Semantic};

    #[test]
    fn draw_freezes_state() {
        let mut e = Encoder::new();
        e.set_pipeline(Handle::from_raw(5));
        e.set_texture(0, Handle::from_raw(7));
        e.draw(36, 0, 0);
        assert_eq!(e.submissions().len(), 1);
        let s = &e.submissions()[0];
        assert_eq!(s.pipeline, Handle::from_raw(5));
        assert_eq!(s.textures[0], Handle::from_raw(7));
        assert_eq!(s.command.count, 36);
        assert_eq!(s.command.instances, 1);
        e.clear();
        assert_eq!(e.submissions().len(), 0);
    }

    #[test]
    fn state_resets_between_draws() {
        let mut e = Encoder::new();
        e.set_pipeline(Handle::from_raw(1));
        e.set_scissor(Rect::new(0, 0, 10, 10));
        e.set_stencil(3);
        e.draw_instanced(3, 0, 0, 4);
        e.draw(6, 0, 0);
        let [first, second] = e.submissions() else {
            panic!("expected two submissions");
        };
        assert_eq!(first.command.instances, 4);
        assert_eq!(first.stencil, 3);
        assert_eq!(second.pipeline, Handle::INVALID);
        assert!(second.scissor.is_empty());
        assert_eq!(second.stencil, 0);
    }

    #[test]
    fn bind_resolves_semantics() {
        let pipeline = PipelineLayout {
            handle: Handle::from_raw(2),
            bindings: vec![
                PipelineBinding::texture("albedo", 1),
                PipelineBinding::texture("normal", 3),
                PipelineBinding::texture("shadow", 4),
                PipelineBinding::uniform("camera", 0),
            ],
        };
        let nearest = SamplerState::new(Filter::Nearest, AddressMode::Repeat);
        let material = Material {
            handle: Handle::from_raw(1),
            entries: vec![
                MaterialEntry::new("albedo", Handle::from_raw(10), nearest),
                //present but unbound
                MaterialEntry::new("normal", Handle::INVALID, SamplerState::default()),
            ],
        };
        let mut e = Encoder::new();
        e.set_texture(4, Handle::from_raw(99));
        e.bind(&pipeline, &material);
        e.draw(3, 0, 0);
        let s = &e.submissions()[0];
        assert_eq!(s.pipeline, Handle::from_raw(2));
        assert_eq!(s.textures[1], Handle::from_raw(10));
        assert_eq!(s.samplers[1], nearest);
        assert_eq!(s.textures[3], Handle::INVALID);
        //missing from the material entirely
        assert_eq!(s.textures[4], Handle::INVALID);
        assert_eq!(s.textures[0], Handle::INVALID);
        assert_eq!(Semantic::new("camera"), pipeline.bindings[3].semantic);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn slot_past_limit_panics() {
        Encoder::new().set_texture(MAX_TEXTURES, Handle::from_raw(1));
    }

    #[test]
    fn submission_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Submission>(), 240);
    }
}
