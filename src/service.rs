// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The producer-facing API.

A [`Service`] owns the render worker and both frame slots.  Every call on it happens on
the producer side: it allocates or frees a handle synchronously and appends a command to
the frame being recorded, or it carves transient memory out of that frame's arenas.
Nothing reaches the driver until [`Service::finish`] hands the frame to the worker.

```text
 producer                 handoff                  worker
 create_buffer ─┐
 submit        ─┼─> slot A ──finish──> pending ──> update_frame, decode, dispatch
 commit        ─┘   slot B <──────── idle <─────── slot A rewound and parked
```

The producer is never more than one frame ahead: `finish` blocks until the worker has
finished the previous frame.
*/

mod handoff;
mod worker;

use crate::arena::{ArenaLayout, Stream, Transient, TransientArena, Usage};
use crate::command::Command;
use crate::config::Config;
use crate::descriptors::{
    BufferDesc, Capabilities, MaterialEntry, PassDesc, PipelineDesc, Rect, TextureDesc,
    TextureRegion,
};
use crate::driver::Driver;
use crate::encoder::{Encoder, Material, PipelineLayout};
use crate::frame::{FrameSlot, Retired, Table};
use crate::handle::{Handle, HandleAllocator, HandleTable};
use bytemuck::Pod;
use handoff::Handoff;
use std::borrow::Cow;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Resolves to the bytes read, or `None` if the frame was aborted or the driver is
/// disabled.
pub type Readback = r#continue::Future<Option<Vec<u8>>>;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("service is already initialized")]
    AlreadyInitialized,
    #[error("driver failed to initialize: {0}")]
    DriverInitialization(String),
    #[error("service is disabled")]
    Disabled,
    #[error("could not start the render worker: {0}")]
    Spawn(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Initialized,
    /// The driver failed to initialize.  Every backend operation is a no-op from here on.
    Disabled,
}

#[derive(Debug)]
pub struct Service {
    config: Config,
    state: State,
    producer: FrameSlot,
    handoff: Arc<Handoff>,
    worker: Option<JoinHandle<()>>,
    buffers: HandleAllocator,
    textures: HandleAllocator,
    passes: HandleAllocator,
    pipelines: HandleTable<PipelineLayout>,
    materials: HandleTable<Material>,
    arena_layouts: Vec<ArenaLayout>,
    capabilities: Option<Capabilities>,
    frames_submitted: u64,
}

fn exhausted(table: &str) -> Handle {
    logwise::warn_sync!("{table} handle table is full", table = table.to_string());
    Handle::INVALID
}

impl Service {
    /**
    Starts the render worker with `driver`.

    The driver is not touched until [`Service::initialize`].
    */
    pub fn new(driver: impl Driver + 'static, config: Config) -> Result<Self, Error> {
        //arena buffers come out of the same table as user buffers
        let mut buffers =
            HandleAllocator::new(config.buffer_capacity + Config::arena_buffer_count());
        let mut slot = |index: usize| {
            let arenas = Usage::ALL.map(|usage| {
                let gpu = buffers.allocate();
                let staging = buffers.allocate();
                TransientArena::new(
                    usage,
                    gpu,
                    staging,
                    config.arena_sizes[usage.index()],
                    config.uniform_alignment,
                )
            });
            FrameSlot::new(index, arenas)
        };
        let producer = slot(0);
        let spare = slot(1);
        //arenas only grow once a driver is ready, so these sizes hold until Initialize
        let arena_layouts: Vec<ArenaLayout> =
            producer.layouts().chain(spare.layouts()).collect();

        let handoff = Arc::new(Handoff::new(spare));
        let worker = {
            let handoff = handoff.clone();
            let driver: Box<dyn Driver> = Box::new(driver);
            let trace = config.trace_commands;
            std::thread::Builder::new()
                .name(config.worker_name.clone())
                .spawn(move || worker::run(handoff, driver, trace))
                .map_err(|e| Error::Spawn(e.to_string()))?
        };

        Ok(Service {
            state: State::Uninitialized,
            producer,
            handoff,
            worker: Some(worker),
            buffers,
            textures: HandleAllocator::new(config.texture_capacity),
            passes: HandleAllocator::new(config.pass_capacity),
            pipelines: HandleTable::new(config.pipeline_capacity),
            materials: HandleTable::new(config.material_capacity),
            arena_layouts,
            capabilities: None,
            frames_submitted: 0,
            config,
        })
    }

    /**
    Initializes the driver on the worker and waits for the outcome.

    On failure the service is permanently disabled: later calls still hand out handles,
    but nothing reaches a backend and readbacks resolve to `None`.
    */
    pub fn initialize(&mut self) -> Result<Capabilities, Error> {
        match self.state {
            State::Initialized => return Err(Error::AlreadyInitialized),
            State::Disabled => return Err(Error::Disabled),
            State::Uninitialized => {}
        }
        self.record(Command::Initialize {
            arenas: self.arena_layouts.clone(),
        });
        //the first flush runs Initialize, the second waits for it to finish
        self.finish(false);
        self.finish(false);
        match self.handoff.take_initialization() {
            Some(Ok(capabilities)) => {
                if capabilities.uniform_alignment > self.config.uniform_alignment {
                    logwise::warn_sync!(
                        "driver wants uniform alignment {wanted}, configured {configured}",
                        wanted = capabilities.uniform_alignment,
                        configured = self.config.uniform_alignment
                    );
                }
                self.state = State::Initialized;
                self.capabilities = Some(capabilities.clone());
                Ok(capabilities)
            }
            Some(Err(err)) => {
                self.state = State::Disabled;
                Err(Error::DriverInitialization(err.to_string()))
            }
            None => {
                self.state = State::Disabled;
                Err(Error::Disabled)
            }
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// What the driver reported at initialization.
    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities.as_ref()
    }

    /// Completed [`Service::finish`] calls, including the two made by initialization.
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Indices of the producer and consumer frame slots.
    pub fn frame_indices(&self) -> (usize, usize) {
        (self.producer.index, 1 - self.producer.index)
    }

    /// Commands recorded into the current frame so far.
    pub fn pending_commands(&self) -> u32 {
        self.producer.command_count
    }

    pub fn buffer_handles(&self) -> &HandleAllocator {
        &self.buffers
    }

    pub fn texture_handles(&self) -> &HandleAllocator {
        &self.textures
    }

    fn record(&mut self, command: Command<'_>) {
        command.encode(&mut self.producer.commands);
        self.producer.command_count += 1;
    }

    fn created(&mut self, table: Table, handle: Handle) {
        self.producer.created.push((table, handle));
    }

    fn retire(&mut self, table: Table, handle: Handle, layout: Option<PipelineLayout>) {
        self.producer.retired.push(Retired {
            table,
            handle,
            layout,
        });
    }

    fn release(&mut self, retired: Vec<Retired>) {
        for Retired { table, handle, .. } in retired {
            match table {
                Table::Buffers => self.buffers.free(handle),
                Table::Textures => self.textures.free(handle),
                Table::Passes => self.passes.free(handle),
                Table::Pipelines => self.pipelines.release(handle),
            }
        }
    }

    /// Undoes deletes whose teardown was aborted: the handle stays live.
    fn restore(&mut self, retired: Vec<Retired>) {
        for entry in retired {
            if let Some(layout) = entry.layout {
                self.pipelines.restore(entry.handle, layout);
            }
        }
    }

    fn ignore_invalid(handle: Handle, operation: &str) -> bool {
        if handle.is_valid() {
            return false;
        }
        logwise::warn_sync!(
            "{operation} called with the invalid handle",
            operation = operation.to_string()
        );
        true
    }

    pub fn reset(&mut self, width: u16, height: u16, vsync: bool) {
        self.record(Command::Reset {
            width,
            height,
            vsync,
        });
    }

    /// `data` is either empty or the buffer's initial contents.
    pub fn create_buffer(&mut self, desc: &BufferDesc<'_>, data: &[u8]) -> Handle {
        let handle = self.buffers.allocate();
        if !handle.is_valid() {
            return exhausted("buffer");
        }
        self.created(Table::Buffers, handle);
        self.record(Command::CreateBuffer {
            handle,
            desc: *desc,
            data,
        });
        handle
    }

    pub fn update_buffer(&mut self, handle: Handle, offset: u32, data: &[u8]) {
        self.record(Command::UpdateBuffer {
            handle,
            offset,
            data,
        });
    }

    pub fn resize_buffer(&mut self, handle: Handle, size: u32) {
        self.record(Command::ResizeBuffer { handle, size });
    }

    pub fn copy_buffer(
        &mut self,
        dst: Handle,
        dst_offset: u32,
        src: Handle,
        src_offset: u32,
        size: u32,
    ) {
        self.record(Command::CopyBuffer {
            dst,
            dst_offset,
            src,
            src_offset,
            size,
        });
    }

    /// Queues the teardown.  The handle is reusable once that has executed.
    pub fn delete_buffer(&mut self, handle: Handle) {
        if Self::ignore_invalid(handle, "delete_buffer") {
            return;
        }
        self.record(Command::DeleteBuffer { handle });
        self.retire(Table::Buffers, handle, None);
    }

    pub fn read_buffer(&mut self, handle: Handle, offset: u32, size: u32) -> Readback {
        let (sender, future) = r#continue::continuation();
        let ticket = self.producer.readbacks.push(sender);
        self.record(Command::ReadBuffer {
            handle,
            offset,
            size,
            ticket,
        });
        future
    }

    pub fn create_texture(&mut self, desc: &TextureDesc<'_>, data: &[u8]) -> Handle {
        let handle = self.textures.allocate();
        if !handle.is_valid() {
            return exhausted("texture");
        }
        self.created(Table::Textures, handle);
        self.record(Command::CreateTexture {
            handle,
            desc: *desc,
            data,
        });
        handle
    }

    pub fn update_texture(&mut self, handle: Handle, region: &TextureRegion, data: &[u8]) {
        self.record(Command::UpdateTexture {
            handle,
            region: *region,
            data,
        });
    }

    pub fn copy_texture(
        &mut self,
        dst: Handle,
        dst_region: &TextureRegion,
        src: Handle,
        src_region: &TextureRegion,
    ) {
        self.record(Command::CopyTexture {
            dst,
            dst_region: *dst_region,
            src,
            src_region: *src_region,
        });
    }

    pub fn delete_texture(&mut self, handle: Handle) {
        if Self::ignore_invalid(handle, "delete_texture") {
            return;
        }
        self.record(Command::DeleteTexture { handle });
        self.retire(Table::Textures, handle, None);
    }

    pub fn read_texture(&mut self, handle: Handle, region: &TextureRegion) -> Readback {
        let (sender, future) = r#continue::continuation();
        let ticket = self.producer.readbacks.push(sender);
        self.record(Command::ReadTexture {
            handle,
            region: *region,
            ticket,
        });
        future
    }

    pub fn create_pass(&mut self, desc: &PassDesc) -> Handle {
        let handle = self.passes.allocate();
        if !handle.is_valid() {
            return exhausted("pass");
        }
        self.created(Table::Passes, handle);
        self.record(Command::CreatePass {
            handle,
            desc: *desc,
        });
        handle
    }

    pub fn delete_pass(&mut self, handle: Handle) {
        if Self::ignore_invalid(handle, "delete_pass") {
            return;
        }
        self.record(Command::DeletePass { handle });
        self.retire(Table::Passes, handle, None);
    }

    /// Creates a pipeline and remembers its semantic table for [`Encoder::bind`].
    pub fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Handle {
        let bindings = desc.bindings.clone();
        let handle = self
            .pipelines
            .insert_with(|handle| PipelineLayout { handle, bindings });
        if !handle.is_valid() {
            return exhausted("pipeline");
        }
        self.created(Table::Pipelines, handle);
        self.record(Command::CreatePipeline {
            handle,
            desc: desc.clone(),
        });
        handle
    }

    pub fn delete_pipeline(&mut self, handle: Handle) {
        if Self::ignore_invalid(handle, "delete_pipeline") {
            return;
        }
        let layout = self.pipelines.take(handle);
        self.record(Command::DeletePipeline { handle });
        self.retire(Table::Pipelines, handle, layout);
    }

    pub fn pipeline(&self, handle: Handle) -> Option<&PipelineLayout> {
        self.pipelines.get(handle)
    }

    /// Materials live on the producer side only; no command is recorded.
    pub fn create_material(&mut self, entries: Vec<MaterialEntry>) -> Handle {
        let handle = self
            .materials
            .insert_with(|handle| Material { handle, entries });
        if !handle.is_valid() {
            return exhausted("material");
        }
        handle
    }

    pub fn delete_material(&mut self, handle: Handle) {
        if Self::ignore_invalid(handle, "delete_material") {
            return;
        }
        self.materials.release(handle);
    }

    pub fn material(&self, handle: Handle) -> Option<&Material> {
        self.materials.get(handle)
    }

    /// Starts drawing into `pass`.  An empty `viewport` covers the whole target.
    pub fn prepare(&mut self, pass: Handle, viewport: Rect) {
        self.record(Command::Prepare { pass, viewport });
    }

    /// Queues the encoder's submissions.  The encoder can be cleared afterwards.
    pub fn submit(&mut self, encoder: &Encoder) {
        if encoder.is_empty() {
            return;
        }
        self.record(Command::Submit {
            submissions: Cow::Borrowed(encoder.submissions()),
        });
    }

    pub fn commit(&mut self) {
        self.record(Command::Commit {});
    }

    /**
    Transient space for `count` values of `T`, valid for this frame only.

    Write through [`Transient::bytes`] (or [`Transient::write`]) and bind
    [`Transient::stream`].  Uniform allocations are padded to the uniform alignment.

    # Panics
    Panics if `count` values of `T` take more than `u32::MAX` bytes, or would end past
    `u32::MAX` bytes into the arena.
    */
    pub fn allocate<T: Pod>(&mut self, usage: Usage, count: usize) -> Transient<'_> {
        let sized = u32::try_from(std::mem::size_of::<T>())
            .ok()
            .and_then(|stride| Some((u32::try_from(count).ok()?.checked_mul(stride)?, stride)));
        let Some((len, stride)) = sized else {
            panic!("transient allocation of {count} elements overflows u32 bytes");
        };
        self.producer.arena_mut(usage).allocate(len, stride)
    }

    /**
    Copies `data` into transient space and returns where it will live.

    # Panics
    Panics under the same conditions as [`Service::allocate`].
    */
    pub fn allocate_data<T: Pod>(&mut self, usage: Usage, data: &[T]) -> Stream {
        self.producer.arena_mut(usage).allocate_data(data)
    }

    /// The arena the current frame allocates `usage` data from.
    pub fn arena(&self, usage: Usage) -> &TransientArena {
        &self.producer.arenas[usage.index()]
    }

    fn flush(&mut self, abort: bool) -> bool {
        if abort {
            let count = self.producer.command_count;
            let discarded = self.producer.discard();
            self.release(discarded.release);
            self.restore(discarded.restore);
            logwise::trace_sync!(
                "aborted frame with {count} commands",
                count = count
            );
        }
        if !self.handoff.exchange(&mut self.producer) {
            return false;
        }
        //the slot coming back has executed its teardowns
        let retired = std::mem::take(&mut self.producer.retired);
        self.release(retired);
        self.frames_submitted += 1;
        true
    }

    /**
    Hands the recorded frame to the worker.

    Blocks until the worker has finished the previous frame.  With `abort`, the
    recorded frame is thrown away first, so none of its commands ever reach the
    driver; the worker's current frame is not interrupted.

    # Panics
    Panics if the render worker has died.
    */
    pub fn finish(&mut self, abort: bool) {
        if !self.flush(abort) {
            logwise::error_sync!("render worker exited with a frame pending");
            panic!("render worker exited with a frame pending");
        }
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.handoff.request_stop();
        //wakes the worker so it sees the stop
        if !self.flush(true) {
            logwise::warn_sync!("render worker was already gone at teardown");
        }
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            logwise::error_sync!("render worker panicked");
        }
        logwise::info_sync!(
            "service torn down after {frames} frames",
            frames = self.frames_submitted
        );
    }
}
