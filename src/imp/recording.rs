// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A driver wrapper that logs every call before forwarding it.

The log is a [`CallLog`] shared with whoever created the driver, so tests can watch
exactly which operations reached the backend, and in what order, from the producer
thread.
*/

use crate::descriptors::{
    BufferDesc, BufferUsage, Capabilities, PassDesc, PipelineDesc, Rect, TextureDesc,
    TextureRegion,
};
use crate::driver::{Driver, DriverError};
use crate::encoder::Submission;
use crate::handle::Handle;
use crate::imp::software::SoftwareDriver;
use parking_lot::Mutex;
use std::sync::Arc;

/// One driver call, with its arguments copied out.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Initialize,
    Reset { width: u16, height: u16, vsync: bool },
    CreateBuffer { handle: Handle, size: u32, usage: BufferUsage, label: String, data: Vec<u8> },
    UpdateBuffer { handle: Handle, offset: u32, data: Vec<u8> },
    ResizeBuffer { handle: Handle, size: u32 },
    DeleteBuffer { handle: Handle },
    CopyBuffer { dst: Handle, dst_offset: u32, src: Handle, src_offset: u32, size: u32 },
    ReadBuffer { handle: Handle, offset: u32, size: u32 },
    MapBuffer { handle: Handle },
    UnmapBuffer { handle: Handle },
    CreatePass { handle: Handle, desc: PassDesc },
    DeletePass { handle: Handle },
    CreatePipeline { handle: Handle, label: String },
    DeletePipeline { handle: Handle },
    CreateTexture { handle: Handle, width: u16, height: u16, label: String },
    UpdateTexture { handle: Handle, region: TextureRegion, data: Vec<u8> },
    CopyTexture { dst: Handle, src: Handle },
    ReadTexture { handle: Handle, region: TextureRegion },
    DeleteTexture { handle: Handle },
    Prepare { pass: Handle, viewport: Rect },
    Submit { submissions: Vec<Submission> },
    Commit,
}

impl Call {
    /// Whether this call is the worker moving transient arena memory around rather than
    /// a command the producer recorded.
    pub fn is_arena_traffic(&self) -> bool {
        match self {
            Call::MapBuffer { .. } | Call::UnmapBuffer { .. } => true,
            Call::CreateBuffer { label, .. } => label.starts_with("transient"),
            _ => false,
        }
    }
}

/// Shared, append-only record of driver calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: Call) {
        self.0.lock().push(call);
    }

    /// A copy of everything logged so far.
    pub fn snapshot(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    /// Removes and returns everything logged so far.
    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

#[derive(Debug)]
pub struct RecordingDriver<D: Driver = SoftwareDriver> {
    inner: D,
    log: CallLog,
    fail_initialize: Option<String>,
}

impl RecordingDriver<SoftwareDriver> {
    /// Records in front of a [`SoftwareDriver`].
    pub fn new() -> (Self, CallLog) {
        Self::wrap(SoftwareDriver::new())
    }

    /// A driver whose initialization fails with `message`.
    pub fn failing(message: &str) -> (Self, CallLog) {
        let (mut driver, log) = Self::new();
        driver.fail_initialize = Some(message.to_string());
        (driver, log)
    }
}

impl<D: Driver> RecordingDriver<D> {
    pub fn wrap(inner: D) -> (Self, CallLog) {
        let log = CallLog::new();
        let driver = RecordingDriver {
            inner,
            log: log.clone(),
            fail_initialize: None,
        };
        (driver, log)
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Driver> Driver for RecordingDriver<D> {
    fn initialize(&mut self) -> Result<Capabilities, DriverError> {
        self.log.push(Call::Initialize);
        match &self.fail_initialize {
            Some(message) => Err(DriverError::Backend(message.clone())),
            None => self.inner.initialize(),
        }
    }

    fn reset(&mut self, width: u16, height: u16, vsync: bool) {
        self.log.push(Call::Reset {
            width,
            height,
            vsync,
        });
        self.inner.reset(width, height, vsync);
    }

    fn create_buffer(&mut self, handle: Handle, desc: &BufferDesc<'_>, data: &[u8]) {
        self.log.push(Call::CreateBuffer {
            handle,
            size: desc.size,
            usage: desc.usage,
            label: desc.label.to_string(),
            data: data.to_vec(),
        });
        self.inner.create_buffer(handle, desc, data);
    }

    fn update_buffer(&mut self, handle: Handle, offset: u32, data: &[u8]) {
        self.log.push(Call::UpdateBuffer {
            handle,
            offset,
            data: data.to_vec(),
        });
        self.inner.update_buffer(handle, offset, data);
    }

    fn resize_buffer(&mut self, handle: Handle, size: u32) {
        self.log.push(Call::ResizeBuffer { handle, size });
        self.inner.resize_buffer(handle, size);
    }

    fn delete_buffer(&mut self, handle: Handle) {
        self.log.push(Call::DeleteBuffer { handle });
        self.inner.delete_buffer(handle);
    }

    fn copy_buffer(&mut self, dst: Handle, dst_offset: u32, src: Handle, src_offset: u32, size: u32) {
        self.log.push(Call::CopyBuffer {
            dst,
            dst_offset,
            src,
            src_offset,
            size,
        });
        self.inner.copy_buffer(dst, dst_offset, src, src_offset, size);
    }

    fn read_buffer(&mut self, handle: Handle, offset: u32, size: u32) -> Vec<u8> {
        self.log.push(Call::ReadBuffer {
            handle,
            offset,
            size,
        });
        self.inner.read_buffer(handle, offset, size)
    }

    fn map_buffer(&mut self, handle: Handle) -> Option<&mut [u8]> {
        self.log.push(Call::MapBuffer { handle });
        self.inner.map_buffer(handle)
    }

    fn unmap_buffer(&mut self, handle: Handle) {
        self.log.push(Call::UnmapBuffer { handle });
        self.inner.unmap_buffer(handle);
    }

    fn create_pass(&mut self, handle: Handle, desc: &PassDesc) {
        self.log.push(Call::CreatePass {
            handle,
            desc: *desc,
        });
        self.inner.create_pass(handle, desc);
    }

    fn delete_pass(&mut self, handle: Handle) {
        self.log.push(Call::DeletePass { handle });
        self.inner.delete_pass(handle);
    }

    fn create_pipeline(&mut self, handle: Handle, desc: &PipelineDesc<'_>) {
        self.log.push(Call::CreatePipeline {
            handle,
            label: desc.label.to_string(),
        });
        self.inner.create_pipeline(handle, desc);
    }

    fn delete_pipeline(&mut self, handle: Handle) {
        self.log.push(Call::DeletePipeline { handle });
        self.inner.delete_pipeline(handle);
    }

    fn create_texture(&mut self, handle: Handle, desc: &TextureDesc<'_>, data: &[u8]) {
        self.log.push(Call::CreateTexture {
            handle,
            width: desc.width,
            height: desc.height,
            label: desc.label.to_string(),
        });
        self.inner.create_texture(handle, desc, data);
    }

    fn update_texture(&mut self, handle: Handle, region: &TextureRegion, data: &[u8]) {
        self.log.push(Call::UpdateTexture {
            handle,
            region: *region,
            data: data.to_vec(),
        });
        self.inner.update_texture(handle, region, data);
    }

    fn copy_texture(
        &mut self,
        dst: Handle,
        dst_region: &TextureRegion,
        src: Handle,
        src_region: &TextureRegion,
    ) {
        self.log.push(Call::CopyTexture { dst, src });
        self.inner.copy_texture(dst, dst_region, src, src_region);
    }

    fn read_texture(&mut self, handle: Handle, region: &TextureRegion) -> Vec<u8> {
        self.log.push(Call::ReadTexture {
            handle,
            region: *region,
        });
        self.inner.read_texture(handle, region)
    }

    fn delete_texture(&mut self, handle: Handle) {
        self.log.push(Call::DeleteTexture { handle });
        self.inner.delete_texture(handle);
    }

    fn prepare(&mut self, pass: Handle, viewport: Rect) {
        self.log.push(Call::Prepare { pass, viewport });
        self.inner.prepare(pass, viewport);
    }

    fn submit(&mut self, submissions: &[Submission]) {
        self.log.push(Call::Submit {
            submissions: submissions.to_vec(),
        });
        self.inner.submit(submissions);
    }

    fn commit(&mut self) {
        self.log.push(Call::Commit);
        self.inner.commit();
    }
}
