// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A driver that keeps every resource in CPU memory.

Buffers and textures are plain byte vectors, so uploads, copies, maps and reads all
behave; draws are validated and counted but not rasterized.  Counters are shared through
[`SoftwareStats`] so they stay observable after the driver has moved to the worker.
*/

use crate::descriptors::{
    BufferDesc, BufferUsage, Capabilities, PassDesc, PipelineDesc, Rect, TextureDesc,
    TextureFormat, TextureRegion,
};
use crate::driver::{Driver, DriverError};
use crate::encoder::Submission;
use crate::handle::Handle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

const MAX_TEXTURE_SIZE: u32 = 16384;

#[derive(Debug)]
struct Buffer {
    usage: BufferUsage,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct Texture {
    width: u16,
    height: u16,
    depth: u16,
    mips: u8,
    format: TextureFormat,
    /// `layer * mips + mip`
    levels: Vec<Vec<u8>>,
}

impl Texture {
    fn extent(&self, mip: u8) -> (usize, usize, usize) {
        let shrink = |d: u16| ((d as usize) >> mip).max(1);
        (shrink(self.width), shrink(self.height), shrink(self.depth))
    }

    fn level_index(&self, region: &TextureRegion) -> Option<usize> {
        if region.mip >= self.mips {
            return None;
        }
        let index = region.layer as usize * self.mips as usize + region.mip as usize;
        (index < self.levels.len()).then_some(index)
    }

    /// Byte ranges of each row of `region` inside its level, in row-major order.
    fn rows(&self, region: &TextureRegion) -> Option<(usize, Vec<std::ops::Range<usize>>)> {
        let level = self.level_index(region)?;
        let (w, h, d) = self.extent(region.mip);
        let (x, y, z) = (region.x as usize, region.y as usize, region.z as usize);
        let (rw, rh, rd) = (
            region.width as usize,
            region.height as usize,
            region.depth as usize,
        );
        if x + rw > w || y + rh > h || z + rd > d {
            return None;
        }
        let texel = self.format.bytes_per_texel() as usize;
        let mut rows = Vec::with_capacity(rh * rd);
        for slice in z..z + rd {
            for row in y..y + rh {
                let start = ((slice * h + row) * w + x) * texel;
                rows.push(start..start + rw * texel);
            }
        }
        Some((level, rows))
    }
}

/// Counters a [`SoftwareDriver`] keeps while it runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SoftwareStats {
    pub frames: u64,
    pub passes_prepared: u64,
    pub submissions: u64,
    pub draws_skipped: u64,
    pub live_buffers: usize,
    pub live_textures: usize,
}

#[derive(Debug, Default)]
pub struct SoftwareDriver {
    buffers: HashMap<Handle, Buffer>,
    textures: HashMap<Handle, Texture>,
    passes: HashMap<Handle, PassDesc>,
    pipelines: HashMap<Handle, String>,
    surface: (u16, u16),
    current_pass: Option<Handle>,
    stats: Arc<Mutex<SoftwareStats>>,
}

impl SoftwareDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A shared view of the counters.
    pub fn stats(&self) -> Arc<Mutex<SoftwareStats>> {
        self.stats.clone()
    }

    pub fn buffer(&self, handle: Handle) -> Option<&[u8]> {
        self.buffers.get(&handle).map(|b| b.bytes.as_slice())
    }

    pub fn texture_level(&self, handle: Handle, mip: u8, layer: u16) -> Option<&[u8]> {
        let texture = self.textures.get(&handle)?;
        let region = TextureRegion {
            mip,
            layer,
            ..TextureRegion::default()
        };
        let index = texture.level_index(&region)?;
        Some(texture.levels[index].as_slice())
    }

    pub fn surface(&self) -> (u16, u16) {
        self.surface
    }

    fn update_counts(&self) {
        let mut stats = self.stats.lock();
        stats.live_buffers = self.buffers.len();
        stats.live_textures = self.textures.len();
    }

    fn buffer_mut(&mut self, handle: Handle, operation: &str) -> Option<&mut Buffer> {
        let found = self.buffers.get_mut(&handle);
        if found.is_none() {
            logwise::warn_sync!(
                "software driver: {operation} on unknown buffer {handle}",
                operation = operation.to_string(),
                handle = handle.raw()
            );
        }
        found
    }

    fn missing_texture(handle: Handle, operation: &str) {
        logwise::warn_sync!(
            "software driver: {operation} on unknown texture {handle}",
            operation = operation.to_string(),
            handle = handle.raw()
        );
    }

    fn bad_region(handle: Handle, region: &TextureRegion) {
        logwise::warn_sync!(
            "software driver: region {region} is outside texture {handle}",
            region = logwise::privacy::LogIt(region),
            handle = handle.raw()
        );
    }

    fn read_region(&self, handle: Handle, region: &TextureRegion) -> Option<Vec<u8>> {
        let Some(texture) = self.textures.get(&handle) else {
            Self::missing_texture(handle, "read");
            return None;
        };
        let Some((level, rows)) = texture.rows(region) else {
            Self::bad_region(handle, region);
            return None;
        };
        let bytes = &texture.levels[level];
        Some(rows.into_iter().flat_map(|row| &bytes[row]).copied().collect())
    }

    fn write_region(&mut self, handle: Handle, region: &TextureRegion, data: &[u8]) {
        let Some(texture) = self.textures.get_mut(&handle) else {
            Self::missing_texture(handle, "write");
            return;
        };
        let Some((level, rows)) = texture.rows(region) else {
            Self::bad_region(handle, region);
            return;
        };
        let expected: usize = rows.iter().map(|r| r.len()).sum();
        if data.len() != expected {
            logwise::warn_sync!(
                "software driver: texture {handle} upload is {got} bytes, region needs {expected}",
                handle = handle.raw(),
                got = data.len(),
                expected = expected
            );
            return;
        }
        let bytes = &mut texture.levels[level];
        let mut cursor = 0;
        for row in rows {
            let len = row.len();
            bytes[row].copy_from_slice(&data[cursor..cursor + len]);
            cursor += len;
        }
    }
}

impl Driver for SoftwareDriver {
    fn initialize(&mut self) -> Result<Capabilities, DriverError> {
        Ok(Capabilities {
            name: String::from("software"),
            max_texture_size: MAX_TEXTURE_SIZE,
            uniform_alignment: 256,
            instancing: true,
        })
    }

    fn reset(&mut self, width: u16, height: u16, _vsync: bool) {
        self.surface = (width, height);
    }

    fn create_buffer(&mut self, handle: Handle, desc: &BufferDesc<'_>, data: &[u8]) {
        let mut bytes = vec![0; desc.size as usize];
        let n = data.len().min(bytes.len());
        bytes[..n].copy_from_slice(&data[..n]);
        let previous = self.buffers.insert(
            handle,
            Buffer {
                usage: desc.usage,
                bytes,
            },
        );
        if previous.is_some() {
            logwise::warn_sync!(
                "software driver: buffer {handle} created twice",
                handle = handle.raw()
            );
        }
        self.update_counts();
    }

    fn update_buffer(&mut self, handle: Handle, offset: u32, data: &[u8]) {
        let Some(buffer) = self.buffer_mut(handle, "update") else {
            return;
        };
        let start = offset as usize;
        match buffer.bytes.get_mut(start..start + data.len()) {
            Some(dst) => dst.copy_from_slice(data),
            None => {
                logwise::warn_sync!(
                    "software driver: update of {len} bytes at {offset} overruns buffer {handle}",
                    len = data.len(),
                    offset = offset,
                    handle = handle.raw()
                );
            }
        }
    }

    fn resize_buffer(&mut self, handle: Handle, size: u32) {
        if let Some(buffer) = self.buffer_mut(handle, "resize") {
            buffer.bytes.resize(size as usize, 0);
        }
    }

    fn delete_buffer(&mut self, handle: Handle) {
        if self.buffers.remove(&handle).is_none() {
            logwise::warn_sync!(
                "software driver: delete of unknown buffer {handle}",
                handle = handle.raw()
            );
        }
        self.update_counts();
    }

    fn copy_buffer(&mut self, dst: Handle, dst_offset: u32, src: Handle, src_offset: u32, size: u32) {
        let range = src_offset as usize..src_offset as usize + size as usize;
        let Some(bytes) = self
            .buffers
            .get(&src)
            .and_then(|b| b.bytes.get(range))
            .map(<[u8]>::to_vec)
        else {
            logwise::warn_sync!(
                "software driver: copy source {src} is missing or too short",
                src = src.raw()
            );
            return;
        };
        self.update_buffer(dst, dst_offset, &bytes);
    }

    fn read_buffer(&mut self, handle: Handle, offset: u32, size: u32) -> Vec<u8> {
        let Some(buffer) = self.buffer_mut(handle, "read") else {
            return Vec::new();
        };
        let start = (offset as usize).min(buffer.bytes.len());
        let end = (start + size as usize).min(buffer.bytes.len());
        buffer.bytes[start..end].to_vec()
    }

    fn map_buffer(&mut self, handle: Handle) -> Option<&mut [u8]> {
        let buffer = self.buffer_mut(handle, "map")?;
        if !buffer.usage.contains(BufferUsage::STAGING) {
            logwise::warn_sync!(
                "software driver: buffer {handle} is not a staging buffer",
                handle = handle.raw()
            );
            return None;
        }
        Some(buffer.bytes.as_mut_slice())
    }

    fn unmap_buffer(&mut self, _handle: Handle) {}

    fn create_pass(&mut self, handle: Handle, desc: &PassDesc) {
        self.passes.insert(handle, *desc);
    }

    fn delete_pass(&mut self, handle: Handle) {
        self.passes.remove(&handle);
        if self.current_pass == Some(handle) {
            self.current_pass = None;
        }
    }

    fn create_pipeline(&mut self, handle: Handle, desc: &PipelineDesc<'_>) {
        self.pipelines.insert(handle, desc.label.to_string());
    }

    fn delete_pipeline(&mut self, handle: Handle) {
        self.pipelines.remove(&handle);
    }

    fn create_texture(&mut self, handle: Handle, desc: &TextureDesc<'_>, data: &[u8]) {
        if desc.width as u32 > MAX_TEXTURE_SIZE || desc.height as u32 > MAX_TEXTURE_SIZE {
            logwise::warn_sync!(
                "software driver: texture {handle} exceeds the size limit",
                handle = handle.raw()
            );
            return;
        }
        let mut texture = Texture {
            width: desc.width,
            height: desc.height,
            depth: desc.depth.max(1),
            mips: desc.mips.max(1),
            format: desc.format,
            levels: Vec::new(),
        };
        let texel = desc.format.bytes_per_texel() as usize;
        for _layer in 0..desc.layers.max(1) {
            for mip in 0..texture.mips {
                let (w, h, d) = texture.extent(mip);
                texture.levels.push(vec![0; w * h * d * texel]);
            }
        }
        //initial data covers mip 0 of layer 0
        let n = data.len().min(texture.levels[0].len());
        texture.levels[0][..n].copy_from_slice(&data[..n]);
        self.textures.insert(handle, texture);
        self.update_counts();
    }

    fn update_texture(&mut self, handle: Handle, region: &TextureRegion, data: &[u8]) {
        self.write_region(handle, region, data);
    }

    fn copy_texture(
        &mut self,
        dst: Handle,
        dst_region: &TextureRegion,
        src: Handle,
        src_region: &TextureRegion,
    ) {
        if let Some(bytes) = self.read_region(src, src_region) {
            self.write_region(dst, dst_region, &bytes);
        }
    }

    fn read_texture(&mut self, handle: Handle, region: &TextureRegion) -> Vec<u8> {
        self.read_region(handle, region).unwrap_or_default()
    }

    fn delete_texture(&mut self, handle: Handle) {
        if self.textures.remove(&handle).is_none() {
            Self::missing_texture(handle, "delete");
        }
        self.update_counts();
    }

    fn prepare(&mut self, pass: Handle, _viewport: Rect) {
        if pass.is_valid() && !self.passes.contains_key(&pass) {
            logwise::warn_sync!(
                "software driver: prepare of unknown pass {pass}",
                pass = pass.raw()
            );
        }
        self.current_pass = Some(pass);
        self.stats.lock().passes_prepared += 1;
    }

    fn submit(&mut self, submissions: &[Submission]) {
        let mut skipped = 0;
        for submission in submissions {
            let runnable = self.pipelines.contains_key(&submission.pipeline)
                && submission
                    .vertices
                    .iter()
                    .chain(std::iter::once(&submission.indices))
                    .filter(|s| s.is_bound())
                    .all(|s| self.buffers.contains_key(&s.buffer));
            if !runnable {
                skipped += 1;
            }
        }
        let mut stats = self.stats.lock();
        stats.submissions += submissions.len() as u64;
        stats.draws_skipped += skipped;
    }

    fn commit(&mut self) {
        self.current_pass = None;
        self.stats.lock().frames += 1;
    }
}
