// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The backend boundary.

A [`Driver`] is handed to [`crate::Service::new`] and from then on lives on the render
worker; every method is called from that one thread, in command order.  Handles are
chosen by the producer, so a driver keys its objects by [`Handle`] and never allocates
ids of its own.

Methods other than [`Driver::initialize`] have no failure channel.  A driver that hits a
problem it can't recover from should log it and carry on; the core has no way to unwind
a frame that is half-executed.
*/

use crate::descriptors::{
    BufferDesc, Capabilities, PassDesc, PipelineDesc, Rect, TextureDesc, TextureRegion,
};
use crate::encoder::Submission;
use crate::handle::Handle;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("backend does not support {0}")]
    Unsupported(&'static str),
    #[error("backend error: {0}")]
    Backend(String),
}

pub trait Driver: Send {
    /// Brings the backend up.  Called once, before anything else.
    fn initialize(&mut self) -> Result<Capabilities, DriverError>;

    /// Reconfigures the output surface.
    fn reset(&mut self, width: u16, height: u16, vsync: bool);

    /// `data` is either empty or exactly `desc.size` bytes of initial contents.
    fn create_buffer(&mut self, handle: Handle, desc: &BufferDesc<'_>, data: &[u8]);
    fn update_buffer(&mut self, handle: Handle, offset: u32, data: &[u8]);
    /// Grows or shrinks a buffer.  Contents up to the smaller of the two sizes survive.
    fn resize_buffer(&mut self, handle: Handle, size: u32);
    fn delete_buffer(&mut self, handle: Handle);
    fn copy_buffer(&mut self, dst: Handle, dst_offset: u32, src: Handle, src_offset: u32, size: u32);
    fn read_buffer(&mut self, handle: Handle, offset: u32, size: u32) -> Vec<u8>;
    /**
    Maps a staging buffer for CPU writes.

    Returns `None` if the buffer can't be mapped right now; the caller skips the upload.
    Every successful map is followed by [`Driver::unmap_buffer`] before any other call
    touches the buffer.
    */
    fn map_buffer(&mut self, handle: Handle) -> Option<&mut [u8]>;
    fn unmap_buffer(&mut self, handle: Handle);

    fn create_pass(&mut self, handle: Handle, desc: &PassDesc);
    fn delete_pass(&mut self, handle: Handle);

    fn create_pipeline(&mut self, handle: Handle, desc: &PipelineDesc<'_>);
    fn delete_pipeline(&mut self, handle: Handle);

    fn create_texture(&mut self, handle: Handle, desc: &TextureDesc<'_>, data: &[u8]);
    fn update_texture(&mut self, handle: Handle, region: &TextureRegion, data: &[u8]);
    /// `src_region` and `dst_region` have the same extent.
    fn copy_texture(
        &mut self,
        dst: Handle,
        dst_region: &TextureRegion,
        src: Handle,
        src_region: &TextureRegion,
    );
    fn read_texture(&mut self, handle: Handle, region: &TextureRegion) -> Vec<u8>;
    fn delete_texture(&mut self, handle: Handle);

    /// Begins a pass.  An empty `viewport` means the whole target.
    fn prepare(&mut self, pass: Handle, viewport: Rect);
    /// Draws, in order, into the most recently prepared pass.
    fn submit(&mut self, submissions: &[Submission]);
    /// Ends the frame and presents.
    fn commit(&mut self);
}
