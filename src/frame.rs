// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A frame slot: one frame's command stream, its transient arenas, and the bookkeeping that
has to travel with them.

Exactly two slots exist per service.  The producer owns one by value and records into
it; the other is either executing on the worker or parked in the handoff waiting for the
next swap.  Because a slot is moved rather than shared, a role can never see a slot the
other role is using.
*/

use crate::arena::{ArenaLayout, TransientArena, Usage};
use crate::binary::Writer;
use crate::encoder::PipelineLayout;
use crate::handle::Handle;
use r#continue::Sender;

/// Handle tables a deferred release returns to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Table {
    Buffers,
    Textures,
    Passes,
    Pipelines,
}

/// A handle whose teardown is recorded in a frame that has not executed yet.
#[derive(Debug, PartialEq)]
pub(crate) struct Retired {
    pub table: Table,
    pub handle: Handle,
    /// A deleted pipeline's layout, reattached if the delete is aborted.
    pub layout: Option<PipelineLayout>,
}

/// What an aborted frame leaves behind.
#[derive(Debug, PartialEq)]
pub(crate) struct Discarded {
    /// Created and deleted in the discarded frame; the backend never saw them.
    pub release: Vec<Retired>,
    /// Created in an earlier frame; their teardown never ran, so they stay live.
    pub restore: Vec<Retired>,
}

/// Resolves a readback future.
pub(crate) type ReadbackSender = Sender<Option<Vec<u8>>>;

/// A frame's pending readbacks, indexed by ticket.
#[derive(Debug, Default)]
pub(crate) struct Readbacks(Vec<Option<ReadbackSender>>);

impl Readbacks {
    /// Registers a pending readback and returns its ticket.
    pub(crate) fn push(&mut self, sender: ReadbackSender) -> u32 {
        self.0.push(Some(sender));
        (self.0.len() - 1) as u32
    }

    /// Resolves `ticket` if it is still pending.
    pub(crate) fn resolve(&mut self, ticket: u32, bytes: Option<Vec<u8>>) {
        match self.0.get_mut(ticket as usize).and_then(Option::take) {
            Some(sender) => sender.send(bytes),
            None => {
                logwise::warn_sync!(
                    "readback ticket {ticket} is unknown or already resolved",
                    ticket = ticket
                );
            }
        }
    }

    /// Resolves everything still pending with `None`.
    pub(crate) fn cancel(&mut self) {
        for sender in self.0.drain(..).flatten() {
            sender.send(None);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

//a slot dropped mid-frame (worker panic) still answers its readbacks
impl Drop for Readbacks {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug)]
pub(crate) struct FrameSlot {
    /// 0 or 1; which of the two slots this is.
    pub index: usize,
    pub commands: Writer,
    pub command_count: u32,
    pub arenas: [TransientArena; 3],
    pub readbacks: Readbacks,
    /// Handles whose teardown is recorded in this frame.  They go back to their pools
    /// once the slot returns from the worker.
    pub retired: Vec<Retired>,
    /// Handles whose create command is recorded in this frame.
    pub created: Vec<(Table, Handle)>,
}

impl FrameSlot {
    pub(crate) fn new(index: usize, arenas: [TransientArena; 3]) -> Self {
        FrameSlot {
            index,
            commands: Writer::new(),
            command_count: 0,
            arenas,
            readbacks: Readbacks::default(),
            retired: Vec::new(),
            created: Vec::new(),
        }
    }

    pub(crate) fn arena_mut(&mut self, usage: Usage) -> &mut TransientArena {
        &mut self.arenas[usage.index()]
    }

    pub(crate) fn layouts(&self) -> impl Iterator<Item = ArenaLayout> + '_ {
        self.arenas.iter().map(|a| a.layout(self.index as u8))
    }

    /// Rewinds the command stream after execution, keeping its storage.
    pub(crate) fn finish_execution(&mut self) {
        self.commands.clear();
        self.command_count = 0;
        self.created.clear();
        self.readbacks.cancel();
    }

    /**
    Throws the recorded frame away: commands, transient allocations and pending
    readbacks.

    The teardown commands are gone too, so the retired handles split by where their
    create command was: in this frame (nothing exists, release) or earlier (still alive).
    */
    pub(crate) fn discard(&mut self) -> Discarded {
        let created = std::mem::take(&mut self.created);
        self.finish_execution();
        for arena in &mut self.arenas {
            arena.discard();
        }
        let (release, restore): (Vec<Retired>, Vec<Retired>) =
            std::mem::take(&mut self.retired)
                .into_iter()
                .partition(|r| created.contains(&(r.table, r.handle)));
        Discarded { release, restore }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> FrameSlot {
        let arenas = Usage::ALL.map(|usage| {
            let base = usage.index() as u32 * 2;
            TransientArena::new(
                usage,
                Handle::from_raw(base + 1),
                Handle::from_raw(base + 2),
                1024,
                256,
            )
        });
        FrameSlot::new(1, arenas)
    }

    #[test]
    fn readbacks_resolve_by_ticket() {
        let mut s = slot();
        let (first_sender, first) = r#continue::continuation();
        let (second_sender, second) = r#continue::continuation();
        assert_eq!(s.readbacks.push(first_sender), 0);
        assert_eq!(s.readbacks.push(second_sender), 1);
        s.readbacks.resolve(1, Some(vec![1, 2]));
        s.finish_execution();
        assert_eq!(test_executors::spin_on(second), Some(vec![1, 2]));
        assert_eq!(test_executors::spin_on(first), None);
        assert!(s.readbacks.is_empty());
    }

    fn retired(table: Table, raw: u32) -> Retired {
        Retired {
            table,
            handle: Handle::from_raw(raw),
            layout: None,
        }
    }

    #[test]
    fn discard_splits_retired_handles_by_creation_frame() {
        let mut s = slot();
        s.commands.write_u8(1);
        s.command_count = 1;
        s.created.push((Table::Buffers, Handle::from_raw(9)));
        s.retired.push(retired(Table::Buffers, 9));
        s.retired.push(retired(Table::Buffers, 4));
        //same integer, different table: created earlier
        s.retired.push(retired(Table::Textures, 9));
        s.arena_mut(Usage::Vertex).allocate(2000, 4);
        let discarded = s.discard();
        assert_eq!(discarded.release, vec![retired(Table::Buffers, 9)]);
        assert_eq!(
            discarded.restore,
            vec![retired(Table::Buffers, 4), retired(Table::Textures, 9)]
        );
        assert!(s.commands.is_empty());
        assert_eq!(s.command_count, 0);
        assert_eq!(s.arena_mut(Usage::Vertex).scratch_len(), 0);
        assert!(s.retired.is_empty());
        assert!(s.created.is_empty());
    }

    #[test]
    fn layouts_name_the_slot() {
        let s = slot();
        let layouts: Vec<ArenaLayout> = s.layouts().collect();
        assert_eq!(layouts.len(), 3);
        assert!(layouts.iter().all(|l| l.slot == 1));
        assert_eq!(layouts[2].usage, Usage::Uniform);
    }
}
