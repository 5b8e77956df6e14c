// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The one synchronization point between the producer and the worker.

The cell holds whichever frame slot the producer does not own, plus a flag saying
whether that slot is a recorded frame waiting for (or undergoing) execution.  The
producer blocks in [`Handoff::exchange`] until the worker is idle, and the worker blocks
in [`Handoff::take_pending`] until there is a frame to run.  Both wait on one condvar.
*/

use crate::descriptors::Capabilities;
use crate::driver::DriverError;
use crate::frame::FrameSlot;
use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct State {
    /// Set by the producer when it parks a recorded frame; cleared by the worker when it
    /// parks the executed one.
    pending: bool,
    parked: Option<FrameSlot>,
    stop: bool,
    worker_alive: bool,
    initialization: Option<Result<Capabilities, DriverError>>,
}

#[derive(Debug)]
pub(crate) struct Handoff {
    state: Mutex<State>,
    changed: Condvar,
}

impl Handoff {
    pub(crate) fn new(spare: FrameSlot) -> Self {
        Handoff {
            state: Mutex::new(State {
                pending: false,
                parked: Some(spare),
                stop: false,
                worker_alive: true,
                initialization: None,
            }),
            changed: Condvar::new(),
        }
    }

    /**
    Producer side: waits for the worker to go idle, then swaps `frame` for the slot the
    worker just finished and marks the new one pending.

    Returns `false`, leaving `frame` untouched, if the worker died with a frame pending.
    */
    pub(crate) fn exchange(&self, frame: &mut FrameSlot) -> bool {
        let mut state = self.state.lock();
        while state.pending && state.worker_alive {
            self.changed.wait(&mut state);
        }
        if state.pending {
            return false;
        }
        let Some(parked) = state.parked.as_mut() else {
            return false;
        };
        std::mem::swap(parked, frame);
        state.pending = true;
        self.changed.notify_all();
        true
    }

    /// Worker side: the next frame to execute, or `None` once a stop is requested and
    /// nothing is pending.
    pub(crate) fn take_pending(&self) -> Option<FrameSlot> {
        let mut state = self.state.lock();
        loop {
            if state.pending
                && let Some(slot) = state.parked.take()
            {
                return Some(slot);
            }
            if state.stop {
                return None;
            }
            self.changed.wait(&mut state);
        }
    }

    /// Worker side: hands an executed slot back and goes idle.
    pub(crate) fn park(&self, slot: FrameSlot) {
        let mut state = self.state.lock();
        state.parked = Some(slot);
        state.pending = false;
        self.changed.notify_all();
    }

    pub(crate) fn request_stop(&self) {
        self.state.lock().stop = true;
        self.changed.notify_all();
    }

    pub(crate) fn worker_exited(&self) {
        self.state.lock().worker_alive = false;
        self.changed.notify_all();
    }

    pub(crate) fn publish_initialization(&self, outcome: Result<Capabilities, DriverError>) {
        self.state.lock().initialization = Some(outcome);
    }

    pub(crate) fn take_initialization(&self) -> Option<Result<Capabilities, DriverError>> {
        self.state.lock().initialization.take()
    }
}

/// Marks the worker gone when dropped, including during a panic.
pub(crate) struct ExitGuard<'a>(pub &'a Handoff);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.worker_exited();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{TransientArena, Usage};
    use crate::handle::Handle;
    use std::sync::Arc;

    fn slot(index: usize) -> FrameSlot {
        let arenas = Usage::ALL
            .map(|usage| TransientArena::new(usage, Handle::INVALID, Handle::INVALID, 256, 256));
        FrameSlot::new(index, arenas)
    }

    #[test]
    fn slots_alternate() {
        let handoff = Arc::new(Handoff::new(slot(1)));
        let worker = {
            let handoff = handoff.clone();
            std::thread::spawn(move || {
                let mut executed = Vec::new();
                while let Some(slot) = handoff.take_pending() {
                    executed.push(slot.index);
                    handoff.park(slot);
                }
                executed
            })
        };
        let mut producer = slot(0);
        for _ in 0..6 {
            assert!(handoff.exchange(&mut producer));
        }
        //wait for the last frame before stopping
        let spare = producer.index;
        assert!(handoff.exchange(&mut producer));
        assert_ne!(producer.index, spare);
        handoff.request_stop();
        let executed = worker.join().unwrap();
        //the final exchange may or may not run before the stop is seen
        assert!(executed.len() == 6 || executed.len() == 7);
        for pair in executed.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        assert_eq!(executed[0], 0);
    }

    #[test]
    fn dead_worker_does_not_hang_the_producer() {
        let handoff = Handoff::new(slot(1));
        let mut producer = slot(0);
        assert!(handoff.exchange(&mut producer));
        //nobody took the frame; the worker is gone
        handoff.worker_exited();
        assert!(!handoff.exchange(&mut producer));
        assert_eq!(producer.index, 1);
    }

    #[test]
    fn stop_wakes_an_idle_worker() {
        let handoff = Arc::new(Handoff::new(slot(1)));
        let worker = {
            let handoff = handoff.clone();
            std::thread::spawn(move || handoff.take_pending().is_none())
        };
        handoff.request_stop();
        assert!(worker.join().unwrap());
    }
}
