// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Per-frame transient memory for vertex, index and uniform data.

Each [`TransientArena`] pairs a GPU buffer with a CPU-writable staging buffer of the same
committed length.  The producer bump-allocates out of an owned CPU copy of the staging
region; when a frame outgrows it, further allocations land in a scratch [`Writer`] and
are described by a [`Stream`] whose offset lies past the committed length, i.e. where
the bytes will live once the frame is finalized.

Finalization ([`TransientArena::update_frame`]) runs on the worker before the frame's
commands.  It uploads the scratch tail, copies the bump-allocated prefix through the
mapped staging buffer into the GPU buffer, and folds the scratch capacity into the
committed length.  Arenas grow to fit their high-water mark and never shrink.
*/

use crate::binary::Writer;
use crate::descriptors::BufferUsage;
use crate::driver::Driver;
use crate::handle::Handle;
use bytemuck::{Pod, Zeroable};

/// Committed lengths are kept at a multiple of this.
pub const GROWTH_BLOCK: u32 = 256;

/// Round `value` up to a multiple of `alignment`, saturating instead of overflowing.
pub(crate) const fn align_up(value: u32, alignment: u32) -> u32 {
    match checked_align_up(value, alignment) {
        Some(v) => v,
        None => {
            let alignment = if alignment == 0 { 1 } else { alignment };
            u32::MAX / alignment * alignment
        }
    }
}

/// Round `value` up to a multiple of `alignment`, or `None` past `u32::MAX`.
pub(crate) const fn checked_align_up(value: u32, alignment: u32) -> Option<u32> {
    let alignment = if alignment == 0 { 1 } else { alignment };
    match value.checked_add(alignment - 1) {
        Some(v) => Some(v / alignment * alignment),
        None => None,
    }
}

#[cold]
fn too_large(len: u64) -> ! {
    panic!("transient allocation of {len} bytes does not fit a u32 arena offset");
}

/// The usage classes that get an arena of their own in every frame slot.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Usage {
    Vertex = 0,
    Index = 1,
    Uniform = 2,
}

impl Usage {
    pub const ALL: [Usage; 3] = [Usage::Vertex, Usage::Index, Usage::Uniform];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Usage::Vertex),
            1 => Some(Usage::Index),
            2 => Some(Usage::Uniform),
            _ => None,
        }
    }

    pub(crate) const fn buffer_usage(self) -> BufferUsage {
        match self {
            Usage::Vertex => BufferUsage::VERTEX,
            Usage::Index => BufferUsage::INDEX,
            Usage::Uniform => BufferUsage::UNIFORM,
        }
    }

    pub(crate) const fn label(self) -> &'static str {
        match self {
            Usage::Vertex => "transient vertices",
            Usage::Index => "transient indices",
            Usage::Uniform => "transient uniforms",
        }
    }
}

/// A GPU-buffer-relative view of some data: which buffer, where, and how it is strided.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Stream {
    pub buffer: Handle,
    pub offset: u32,
    pub stride: u32,
    pub length: u32,
}

impl Stream {
    pub const NONE: Stream = Stream {
        buffer: Handle::INVALID,
        offset: 0,
        stride: 0,
        length: 0,
    };

    pub fn is_bound(&self) -> bool {
        self.buffer.is_valid()
    }

    /// Number of whole elements in the stream.
    pub fn count(&self) -> u32 {
        if self.stride == 0 {
            0
        } else {
            self.length / self.stride
        }
    }
}

/// A fresh transient allocation: bytes to fill now, and where they will be on the GPU.
#[derive(Debug)]
pub struct Transient<'a> {
    pub bytes: &'a mut [u8],
    pub stream: Stream,
}

impl Transient<'_> {
    /// Copies `values` to the front of the allocation.
    ///
    /// # Panics
    /// Panics if `values` is larger than the allocation.
    pub fn write<T: Pod>(&mut self, values: &[T]) {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        self.bytes[..bytes.len()].copy_from_slice(bytes);
    }
}

/// The buffers backing one arena, as announced to the driver at initialization.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ArenaLayout {
    pub slot: u8,
    pub usage: Usage,
    pub gpu: Handle,
    pub staging: Handle,
    pub size: u32,
}

#[derive(Debug)]
pub struct TransientArena {
    usage: Usage,
    gpu: Handle,
    staging: Handle,
    /// CPU copy of the staging region; its length is the committed length.
    cpu: Vec<u8>,
    committed: u32,
    offset: u32,
    scratch: Option<Writer>,
    uniform_alignment: u32,
}

impl TransientArena {
    pub(crate) fn new(
        usage: Usage,
        gpu: Handle,
        staging: Handle,
        size: u32,
        uniform_alignment: u32,
    ) -> Self {
        let committed = align_up(size.max(1), GROWTH_BLOCK);
        TransientArena {
            usage,
            gpu,
            staging,
            cpu: vec![0; committed as usize],
            committed,
            offset: 0,
            scratch: None,
            uniform_alignment,
        }
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }
    pub fn gpu(&self) -> Handle {
        self.gpu
    }
    pub fn staging(&self) -> Handle {
        self.staging
    }
    pub fn committed(&self) -> u32 {
        self.committed
    }
    /// Bump offset inside the committed region.
    pub fn offset(&self) -> u32 {
        self.offset
    }
    /// Bytes currently sitting in the overflow writer, padding included.
    pub fn scratch_len(&self) -> u32 {
        self.scratch.as_ref().map_or(0, |s| s.len() as u32)
    }
    /// Length of the CPU region the producer writes into.
    pub fn cpu_len(&self) -> usize {
        self.cpu.len()
    }

    pub(crate) fn layout(&self, slot: u8) -> ArenaLayout {
        ArenaLayout {
            slot,
            usage: self.usage,
            gpu: self.gpu,
            staging: self.staging,
            size: self.committed,
        }
    }

    /**
    Reserves `len` bytes of elements `stride` bytes apart.

    Uniform allocations are padded to the uniform alignment and use that padded length as
    their stride, so each one can be bound at its own offset.  Everything else is placed
    at a multiple of `stride`.

    # Panics
    Panics if the allocation would end past `u32::MAX` bytes into the arena.
    */
    pub fn allocate(&mut self, len: u32, stride: u32) -> Transient<'_> {
        let (len, stride, alignment) = match self.usage {
            Usage::Uniform => {
                let Some(padded) = checked_align_up(len.max(1), self.uniform_alignment) else {
                    too_large(u64::from(len));
                };
                (padded, padded, self.uniform_alignment)
            }
            Usage::Vertex | Usage::Index => (len, stride, stride.max(1)),
        };

        let start = align_up(self.offset, alignment);
        if let Some(end) = start.checked_add(len)
            && end <= self.committed
        {
            self.offset = end;
            return Transient {
                bytes: &mut self.cpu[start as usize..end as usize],
                stream: Stream {
                    buffer: self.gpu,
                    offset: start,
                    stride,
                    length: len,
                },
            };
        }

        let committed = self.committed;
        let used = self.scratch.as_ref().map_or(0, Writer::len);
        let absolute = u32::try_from(used)
            .ok()
            .and_then(|used| committed.checked_add(used))
            .and_then(|end| checked_align_up(end, alignment))
            .filter(|absolute| absolute.checked_add(len).is_some());
        let Some(absolute) = absolute else {
            too_large(u64::from(len));
        };
        let padding = absolute as usize - committed as usize - used;
        let scratch = self
            .scratch
            .get_or_insert_with(|| Writer::with_capacity(committed.max(len) as usize));
        scratch.reserve_bytes(padding);
        Transient {
            bytes: scratch.reserve_bytes(len as usize),
            stream: Stream {
                buffer: self.gpu,
                offset: absolute,
                stride,
                length: len,
            },
        }
    }

    /**
    Allocates room for `data` and copies it in.

    # Panics
    Panics under the same conditions as [`TransientArena::allocate`].
    */
    pub fn allocate_data<T: Pod>(&mut self, data: &[T]) -> Stream {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let (Ok(len), Ok(stride)) = (
            u32::try_from(bytes.len()),
            u32::try_from(std::mem::size_of::<T>()),
        ) else {
            too_large(bytes.len() as u64);
        };
        let mut transient = self.allocate(len, stride);
        transient.bytes[..bytes.len()].copy_from_slice(bytes);
        transient.stream
    }

    /// Forgets this frame's allocations without uploading them.
    pub(crate) fn discard(&mut self) {
        self.offset = 0;
        self.scratch = None;
    }

    /**
    Finalizes the frame's allocations.

    With no driver (before initialization, or after it failed) there are no buffers to
    match, so the frame is discarded and the committed length stays put.  Returns the new
    committed length if the arena grew.
    */
    pub(crate) fn update_frame(&mut self, driver: Option<&mut dyn Driver>) -> Option<u32> {
        let Some(driver) = driver else {
            self.discard();
            return None;
        };
        let grown = self.scratch.as_ref().map(|s| {
            let block = align_up(u32::try_from(s.capacity()).unwrap_or(u32::MAX), GROWTH_BLOCK);
            self.committed.saturating_add(block)
        });

        if let (Some(scratch), Some(grown)) = (&self.scratch, grown) {
            driver.resize_buffer(self.gpu, grown);
            driver.update_buffer(self.gpu, self.committed, scratch.as_slice());
        }
        if self.offset > 0 {
            let written = self.offset as usize;
            let cpu = &self.cpu;
            let mapped = driver
                .map_buffer(self.staging)
                .map(|mapped| {
                    let n = written.min(mapped.len());
                    mapped[..n].copy_from_slice(&cpu[..n]);
                })
                .is_some();
            if mapped {
                driver.unmap_buffer(self.staging);
                driver.copy_buffer(self.gpu, 0, self.staging, 0, self.offset);
            } else {
                logwise::trace_sync!(
                    "staging buffer {handle} not mappable; skipped {bytes} transient bytes",
                    handle = self.staging.raw(),
                    bytes = self.offset
                );
            }
        }
        if let Some(grown) = grown {
            driver.resize_buffer(self.staging, grown);
        }

        if let Some(grown) = grown {
            logwise::info_sync!(
                "{label} arena grew from {from} to {to} bytes",
                label = self.usage.label(),
                from = self.committed,
                to = grown
            );
            self.committed = grown;
            self.scratch = None;
            self.cpu.resize(grown as usize, 0);
        }
        self.offset = 0;
        grown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::BufferDesc;
    use crate::imp::software::SoftwareDriver;

    fn arena(usage: Usage, size: u32) -> TransientArena {
        TransientArena::new(usage, Handle::from_raw(1), Handle::from_raw(2), size, 256)
    }

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(5, 12), 12);
        assert_eq!(align_up(255, 256), 256);
        assert_eq!(align_up(u32::MAX, 256), u32::MAX / 256 * 256);
    }

    #[test]
    fn uniform_allocations_use_block_stride() {
        let mut a = arena(Usage::Uniform, 4096);
        let offsets: Vec<Stream> = (0..3)
            .map(|_| a.allocate(4 * std::mem::size_of::<f32>() as u32, 16).stream)
            .collect();
        assert_eq!(offsets[0].offset, 0);
        assert_eq!(offsets[1].offset, 256);
        assert_eq!(offsets[2].offset, 512);
        for stream in &offsets {
            assert_eq!(stream.stride, 256);
            assert_eq!(stream.buffer, Handle::from_raw(1));
        }
    }

    #[test]
    fn vertex_allocations_align_to_stride() {
        let mut a = arena(Usage::Vertex, 1024);
        let first = a.allocate(5, 1).stream;
        assert_eq!(first.offset, 0);
        let second = a.allocate(24, 12).stream;
        assert_eq!(second.offset, 12);
        assert_eq!(second.count(), 2);
        assert_eq!(a.offset(), 36);
    }

    #[test]
    fn overflow_lands_past_committed() {
        let mut a = arena(Usage::Vertex, 256);
        a.allocate(200, 4);
        let overflow = a.allocate(100, 4);
        assert_eq!(overflow.bytes.len(), 100);
        assert_eq!(overflow.stream.offset, 256);
        let next = a.allocate(60, 8).stream;
        //100 bytes in scratch, next multiple of 8 past 256 + 100
        assert_eq!(next.offset, 360);
        assert_eq!(a.scratch_len(), 164);
        //small allocations still fit in the committed region
        let inside = a.allocate(8, 4).stream;
        assert_eq!(inside.offset, 200);
        assert_eq!(a.offset(), 208);
    }

    fn driven(usage: Usage, size: u32) -> (TransientArena, SoftwareDriver) {
        let mut driver = SoftwareDriver::new();
        let a = arena(usage, size);
        driver.create_buffer(a.gpu(), &BufferDesc::new(size, usage.buffer_usage(), "gpu"), &[]);
        driver.create_buffer(
            a.staging(),
            &BufferDesc::new(size, BufferUsage::STAGING, "staging"),
            &[],
        );
        (a, driver)
    }

    #[test]
    fn growth_covers_high_water_mark() {
        let (mut a, mut driver) = driven(Usage::Index, 256);
        let mut requested = 0;
        for _ in 0..10 {
            a.allocate(100, 2);
            requested += 100;
        }
        let before = a.committed();
        let overflowed = a.scratch_len();
        assert!(before + overflowed >= requested);
        let grown = a.update_frame(Some(&mut driver)).expect("arena should grow");
        assert!(grown >= before + overflowed);
        assert_eq!(grown % GROWTH_BLOCK, 0);
        assert_eq!(a.committed(), grown);
        assert!(a.cpu_len() >= grown as usize);
        assert_eq!(a.offset(), 0);
        assert_eq!(a.scratch_len(), 0);
        //the next frame fits without overflowing
        for _ in 0..10 {
            assert!(a.allocate(100, 2).stream.offset < grown);
        }
        assert_eq!(a.update_frame(Some(&mut driver)), None);
        assert_eq!(a.committed(), grown);
    }

    #[test]
    fn update_frame_uploads_prefix_and_scratch() {
        let mut driver = SoftwareDriver::new();
        let gpu = Handle::from_raw(1);
        let staging = Handle::from_raw(2);
        let mut a = TransientArena::new(Usage::Vertex, gpu, staging, 256, 256);
        driver.create_buffer(gpu, &BufferDesc::new(256, BufferUsage::VERTEX, "gpu"), &[]);
        driver.create_buffer(staging, &BufferDesc::new(256, BufferUsage::STAGING, "staging"), &[]);

        let head = a.allocate_data(&[7u8; 200]);
        let tail = a.allocate_data(&[9u8; 100]);
        assert_eq!(head.offset, 0);
        assert_eq!(tail.offset, 256);

        let grown = a.update_frame(Some(&mut driver)).unwrap();
        assert_eq!(driver.buffer(gpu).unwrap().len(), grown as usize);
        assert_eq!(driver.buffer(staging).unwrap().len(), grown as usize);
        let contents = driver.buffer(gpu).unwrap();
        assert!(contents[..200].iter().all(|&b| b == 7));
        assert!(contents[256..356].iter().all(|&b| b == 9));
    }

    #[test]
    fn discard_forgets_the_frame() {
        let mut a = arena(Usage::Vertex, 256);
        a.allocate(300, 4);
        a.allocate(10, 4);
        a.discard();
        assert_eq!(a.offset(), 0);
        assert_eq!(a.scratch_len(), 0);
        assert_eq!(a.update_frame(None), None);
        assert_eq!(a.committed(), 256);
    }

    #[test]
    fn no_driver_means_no_growth() {
        let mut a = arena(Usage::Vertex, 256);
        a.allocate(200, 4);
        a.allocate(300, 4);
        assert_eq!(a.update_frame(None), None);
        assert_eq!(a.committed(), 256);
        assert_eq!(a.cpu_len(), 256);
        assert_eq!(a.offset(), 0);
        assert_eq!(a.scratch_len(), 0);
    }

    #[test]
    #[should_panic(expected = "does not fit a u32 arena offset")]
    fn scratch_offset_past_u32_panics() {
        let mut a = arena(Usage::Vertex, 1024);
        a.allocate(u32::MAX - 512, 1);
    }

    #[test]
    #[should_panic(expected = "does not fit a u32 arena offset")]
    fn uniform_padding_past_u32_panics() {
        let mut a = arena(Usage::Uniform, 1024);
        a.allocate(u32::MAX - 8, 4);
    }

    #[test]
    fn checked_align_up_reports_overflow() {
        assert_eq!(checked_align_up(250, 256), Some(256));
        assert_eq!(checked_align_up(u32::MAX - 8, 256), None);
        assert_eq!(checked_align_up(7, 0), Some(7));
    }
}
