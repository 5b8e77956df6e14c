// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! frame_relay is the command-submission core of a real-time renderer.

Application code records a frame on its own thread: it creates and destroys resources,
carves per-frame vertex, index and uniform data out of transient arenas, and encodes
draw calls.  A dedicated render worker then replays that frame against a [`Driver`]
while the application records the next one.

```text
 application thread                                render worker
 ┌────────────────────────┐   finish()     ┌──────────────────────────┐
 │ frame N+1: record      │ ─────────────> │ frame N: execute         │
 │  create_* / delete_*   │ <───────────── │  arenas -> GPU buffers    │
 │  allocate / Encoder    │   slot swap    │  decode, dispatch        │
 └────────────────────────┘                └──────────────────────────┘
```

| Concern        | Where it happens | Type                                   |
|----------------|------------------|----------------------------------------|
| Handles        | producer, sync   | [`Handle`], [`HandleAllocator`]        |
| Transient data | producer, sync   | [`TransientArena`], [`Stream`]         |
| Draw calls     | producer, sync   | [`Encoder`], [`Submission`]            |
| Backend calls  | worker, deferred | [`Command`], [`Driver`]                |
| Readbacks      | both             | [`service::Readback`] futures          |

# Frames

There are exactly two frame slots.  The producer owns one and records into it;
[`Service::finish`] blocks until the worker is done with the other, then swaps them.
Neither side ever sees the slot the other is using, and the producer is never more than
one frame ahead.

# Drivers

A backend implements [`Driver`].  The crate ships three in [`imp`]: a
[`imp::NopDriver`] that accepts everything, a [`imp::SoftwareDriver`] that keeps
resources in CPU memory, and a [`imp::RecordingDriver`] that logs every call it
forwards.

# Example

```
use frame_relay::{ClearState, Config, Encoder, PassDesc, Rect, Service, Usage};
use frame_relay::imp::NopDriver;

let mut service = Service::new(NopDriver::new(), Config::default()).unwrap();
service.initialize().unwrap();
let pass = service.create_pass(&PassDesc::backbuffer(ClearState::default()));

let triangle = service.allocate_data(Usage::Vertex, &[0.0f32, 1.0, -1.0, -1.0, 1.0, -1.0]);
let mut encoder = Encoder::new();
encoder.set_vertices(0, triangle);
encoder.draw(3, 0, 0);

service.prepare(pass, Rect::default());
service.submit(&encoder);
service.commit();
service.finish(false);
```
*/

mod arena;
pub mod binary;
pub mod command;
pub mod config;
pub mod descriptors;
mod driver;
mod encoder;
mod frame;
pub mod handle;
pub mod imp;
pub mod service;

pub use arena::{ArenaLayout, GROWTH_BLOCK, Stream, Transient, TransientArena, Usage};
pub use command::{Command, CommandTag};
pub use config::Config;
pub use descriptors::{
    AddressMode, BindingKind, BufferDesc, BufferUsage, Capabilities, ClearFlags, ClearState,
    Filter, MAX_COLOR_TARGETS, MaterialEntry, PassDesc, PipelineBinding, PipelineDesc,
    PipelineState, Primitive, Rect, SamplerState, Semantic, TextureDesc, TextureFormat,
    TextureRegion, TextureUsage,
};
pub use driver::{Driver, DriverError};
pub use encoder::{
    DrawCommand, Encoder, MAX_TEXTURES, MAX_UNIFORMS, MAX_VERTEX_STREAMS, Material,
    PipelineLayout, Submission,
};
pub use handle::{Handle, HandleAllocator, HandleTable};
pub use service::{Readback, Service, State};
