// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The render worker: the only thread that ever touches the driver.

For each frame the producer hands over, the worker finalizes the transient arenas,
then decodes and executes the command stream front to back, then rewinds the slot and
hands it back.
*/

use super::handoff::{ExitGuard, Handoff};
use crate::arena::ArenaLayout;
use crate::binary::Reader;
use crate::command::Command;
use crate::descriptors::{BufferDesc, BufferUsage};
use crate::driver::Driver;
use crate::frame::{FrameSlot, Readbacks};
use std::sync::Arc;

enum Backend {
    /// Waiting for the Initialize command.
    Pending(Box<dyn Driver>),
    Ready(Box<dyn Driver>),
    /// Initialization failed; everything is dropped on the floor.
    Disabled,
}

impl Backend {
    fn ready(&mut self) -> Option<&mut dyn Driver> {
        match self {
            Backend::Ready(driver) => Some(driver.as_mut()),
            Backend::Pending(_) | Backend::Disabled => None,
        }
    }
}

struct Worker {
    backend: Backend,
    trace_commands: bool,
    frames: u64,
}

pub(crate) fn run(handoff: Arc<Handoff>, driver: Box<dyn Driver>, trace_commands: bool) {
    let _exit = ExitGuard(&handoff);
    let mut worker = Worker {
        backend: Backend::Pending(driver),
        trace_commands,
        frames: 0,
    };
    logwise::info_sync!("render worker started");
    while let Some(mut slot) = handoff.take_pending() {
        worker.execute(&mut slot, &handoff);
        handoff.park(slot);
    }
    logwise::info_sync!(
        "render worker stopping after {frames} frames",
        frames = worker.frames
    );
}

impl Worker {
    fn execute(&mut self, slot: &mut FrameSlot, handoff: &Handoff) {
        let _interval = logwise::perfwarn_begin!("frame_relay execute frame");
        logwise::trace_sync!(
            "executing slot {slot} with {count} commands",
            slot = slot.index,
            count = slot.command_count
        );
        let FrameSlot {
            commands,
            arenas,
            readbacks,
            ..
        } = slot;
        for arena in arenas.iter_mut() {
            arena.update_frame(self.backend.ready());
        }

        let mut reader = Reader::new(commands.as_slice());
        while !reader.is_empty() {
            let position = reader.position();
            let command = match Command::decode(&mut reader) {
                Ok(command) => command,
                Err(err) => {
                    logwise::error_sync!(
                        "corrupt command stream at byte {position}: {err}",
                        position = position,
                        err = logwise::privacy::LogIt(&err)
                    );
                    panic!("corrupt command stream at byte {position}: {err}");
                }
            };
            if self.trace_commands {
                logwise::trace_sync!(
                    "command {tag}",
                    tag = logwise::privacy::LogIt(&command.tag())
                );
            }
            self.run_command(&command, readbacks, handoff);
        }
        slot.finish_execution();
        self.frames += 1;
    }

    fn run_command(&mut self, command: &Command<'_>, readbacks: &mut Readbacks, handoff: &Handoff) {
        if let Command::Initialize { arenas } = command {
            self.initialize(arenas, handoff);
            return;
        }
        match &mut self.backend {
            Backend::Ready(driver) => {
                if let Some(readback) = command.dispatch(driver.as_mut()) {
                    readbacks.resolve(readback.ticket, Some(readback.bytes));
                }
            }
            Backend::Pending(_) => {
                logwise::warn_sync!(
                    "dropping {tag} recorded before initialization",
                    tag = logwise::privacy::LogIt(&command.tag())
                );
            }
            //pending readbacks resolve to None when the frame finishes
            Backend::Disabled => {}
        }
    }

    fn initialize(&mut self, arenas: &[ArenaLayout], handoff: &Handoff) {
        let mut driver = match std::mem::replace(&mut self.backend, Backend::Disabled) {
            Backend::Pending(driver) => driver,
            other => {
                logwise::warn_sync!("ignoring a second Initialize");
                self.backend = other;
                return;
            }
        };
        match driver.initialize() {
            Ok(capabilities) => {
                for layout in arenas {
                    let label = layout.usage.label();
                    driver.create_buffer(
                        layout.gpu,
                        &BufferDesc::new(layout.size, layout.usage.buffer_usage(), label),
                        &[],
                    );
                    driver.create_buffer(
                        layout.staging,
                        &BufferDesc::new(layout.size, BufferUsage::STAGING, label),
                        &[],
                    );
                }
                logwise::info_sync!(
                    "driver {name} initialized",
                    name = capabilities.name.clone()
                );
                self.backend = Backend::Ready(driver);
                handoff.publish_initialization(Ok(capabilities));
            }
            Err(err) => {
                logwise::error_sync!(
                    "driver failed to initialize: {err}",
                    err = logwise::privacy::LogIt(&err)
                );
                handoff.publish_initialization(Err(err));
            }
        }
    }
}
