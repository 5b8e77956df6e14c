// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::descriptors::{
    BufferDesc, Capabilities, PassDesc, PipelineDesc, Rect, TextureDesc, TextureRegion,
};
use crate::driver::{Driver, DriverError};
use crate::encoder::Submission;
use crate::handle::Handle;

/**
Accepts everything and does nothing.

Reads come back as zeroes of the requested size and staging buffers are never mappable,
so transient uploads are skipped.  Useful for headless runs and benchmarks of the
producer side.
*/
#[derive(Debug, Default, Clone)]
pub struct NopDriver;

impl NopDriver {
    pub fn new() -> Self {
        NopDriver
    }
}

impl Driver for NopDriver {
    fn initialize(&mut self) -> Result<Capabilities, DriverError> {
        Ok(Capabilities {
            name: String::from("nop"),
            ..Capabilities::default()
        })
    }
    fn reset(&mut self, _width: u16, _height: u16, _vsync: bool) {}
    fn create_buffer(&mut self, _handle: Handle, _desc: &BufferDesc<'_>, _data: &[u8]) {}
    fn update_buffer(&mut self, _handle: Handle, _offset: u32, _data: &[u8]) {}
    fn resize_buffer(&mut self, _handle: Handle, _size: u32) {}
    fn delete_buffer(&mut self, _handle: Handle) {}
    fn copy_buffer(&mut self, _dst: Handle, _dst_offset: u32, _src: Handle, _src_offset: u32, _size: u32) {}
    fn read_buffer(&mut self, _handle: Handle, _offset: u32, size: u32) -> Vec<u8> {
        vec![0; size as usize]
    }
    fn map_buffer(&mut self, _handle: Handle) -> Option<&mut [u8]> {
        None
    }
    fn unmap_buffer(&mut self, _handle: Handle) {}
    fn create_pass(&mut self, _handle: Handle, _desc: &PassDesc) {}
    fn delete_pass(&mut self, _handle: Handle) {}
    fn create_pipeline(&mut self, _handle: Handle, _desc: &PipelineDesc<'_>) {}
    fn delete_pipeline(&mut self, _handle: Handle) {}
    fn create_texture(&mut self, _handle: Handle, _desc: &TextureDesc<'_>, _data: &[u8]) {}
    fn update_texture(&mut self, _handle: Handle, _region: &TextureRegion, _data: &[u8]) {}
    fn copy_texture(
        &mut self,
        _dst: Handle,
        _dst_region: &TextureRegion,
        _src: Handle,
        _src_region: &TextureRegion,
    ) {
    }
    fn read_texture(&mut self, _handle: Handle, region: &TextureRegion) -> Vec<u8> {
        //no format to go on; one byte per texel
        vec![0; region.texel_count() as usize]
    }
    fn delete_texture(&mut self, _handle: Handle) {}
    fn prepare(&mut self, _pass: Handle, _viewport: Rect) {}
    fn submit(&mut self, _submissions: &[Submission]) {}
    fn commit(&mut self) {}
}
