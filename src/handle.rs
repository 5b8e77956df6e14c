// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Small opaque handles for backend-side objects.
//!
//! Every object the worker creates on the backend (buffers, textures, pipelines, passes)
//! and every producer-side material is named by a [`Handle`]. Handles are issued by a
//! fixed-capacity [`HandleAllocator`]: a bump counter plus a LIFO pool of freed values.
//!
//! Allocation is synchronous; the backend object named by the handle is created later,
//! when the worker executes the matching command.

use bytemuck::{Pod, Zeroable};
use std::fmt::{Debug, Display, Formatter};

/// An opaque handle.  `0` is the invalid sentinel.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Pod, Zeroable)]
pub struct Handle(u32);

impl Handle {
    /// The unallocated / invalid handle.
    pub const INVALID: Handle = Handle(0);

    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }
    pub const fn raw(self) -> u32 {
        self.0
    }
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
    /// Zero-based index for handle-indexed tables.
    ///
    /// # Panics
    /// Panics on the invalid handle.
    pub(crate) fn index(self) -> usize {
        assert!(self.is_valid(), "invalid handle has no index");
        (self.0 - 1) as usize
    }
}

impl Debug for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "Handle({})", self.0)
        } else {
            write!(f, "Handle(INVALID)")
        }
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/**
Fixed-capacity id allocator.

`allocate` pops the most recently freed handle if there is one, otherwise bumps the
head.  `free` of the most recently issued handle rewinds the head instead of pooling,
and keeps rewinding while the new head is itself sitting in the pool.
*/
#[derive(Debug, Clone)]
pub struct HandleAllocator {
    head: u32,
    capacity: u32,
    free: Vec<u32>,
}

impl HandleAllocator {
    pub fn new(capacity: u32) -> Self {
        HandleAllocator {
            head: 0,
            capacity,
            free: Vec::new(),
        }
    }

    /// Returns a handle, or [`Handle::INVALID`] when the table is full.
    pub fn allocate(&mut self) -> Handle {
        if let Some(reused) = self.free.pop() {
            return Handle(reused);
        }
        if self.head >= self.capacity {
            return Handle::INVALID;
        }
        self.head += 1;
        Handle(self.head)
    }

    pub fn free(&mut self, handle: Handle) {
        debug_assert!(handle.is_valid(), "freeing the invalid handle");
        debug_assert!(handle.0 <= self.head, "freeing a handle that was never issued");
        debug_assert!(!self.free.contains(&handle.0), "double free of {handle:?}");
        if handle.0 != self.head {
            self.free.push(handle.0);
            return;
        }
        self.head -= 1;
        //coalesce trailing frees
        while self.head > 0 {
            match self.free.iter().position(|&h| h == self.head) {
                Some(position) => {
                    self.free.swap_remove(position);
                    self.head -= 1;
                }
                None => break,
            }
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of handles currently live.
    pub fn live(&self) -> u32 {
        self.head - self.free.len() as u32
    }
}

/**
A [`HandleAllocator`] with producer-side data attached to each live handle.

Used for objects whose description the producer needs again later, such as a
pipeline's semantic slots or a material's texture list.
*/
#[derive(Debug)]
pub struct HandleTable<T> {
    allocator: HandleAllocator,
    entries: Vec<Option<T>>,
}

impl<T> HandleTable<T> {
    pub fn new(capacity: u32) -> Self {
        HandleTable {
            allocator: HandleAllocator::new(capacity),
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, value: T) -> Handle {
        self.insert_with(|_| value)
    }

    /// Like [`HandleTable::insert`], for values that store their own handle.
    /// `make` is not called when the table is full.
    pub fn insert_with(&mut self, make: impl FnOnce(Handle) -> T) -> Handle {
        let handle = self.allocator.allocate();
        if !handle.is_valid() {
            return handle;
        }
        let index = handle.index();
        if self.entries.len() <= index {
            self.entries.resize_with(index + 1, || None);
        }
        self.entries[index] = Some(make(handle));
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        if !handle.is_valid() {
            return None;
        }
        self.entries.get(handle.index()).and_then(Option::as_ref)
    }

    /// Detaches the value without returning the handle to the pool.
    pub fn take(&mut self, handle: Handle) -> Option<T> {
        if !handle.is_valid() {
            return None;
        }
        self.entries.get_mut(handle.index()).and_then(Option::take)
    }

    /// Reattaches a value detached with [`HandleTable::take`].  The handle must still be live.
    pub fn restore(&mut self, handle: Handle, value: T) {
        if !handle.is_valid() {
            return;
        }
        if let Some(entry) = self.entries.get_mut(handle.index()) {
            *entry = Some(value);
        }
    }

    /// Returns a handle to the pool.  Any attached value is dropped.
    pub fn release(&mut self, handle: Handle) {
        self.take(handle);
        self.allocator.free(handle);
    }

    pub fn allocator(&self) -> &HandleAllocator {
        &self.allocator
    }
}
