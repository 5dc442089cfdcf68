//! # Block Access Buffers
//!
//! Sequential block access over an array: a [`DataBuffer`] maps one
//! window of elements at a time into an in-process slice, so callers can
//! process huge arrays with a bounded working set and without per-element
//! call overhead.
//!
//! A read-write buffer writes nothing back on its own; changes to the
//! mapped slice reach the array only on [`force`](DataBuffer::force).

use eyre::{bail, ensure, Result};

use crate::config::{MAX_BIT_BUFFER_CAPACITY, MAX_BUFFER_CAPACITY};
use crate::kind::{ElementKind, Kind};

use super::BufferArray;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

/// A movable element window over one array. Obtained from
/// [`BufferArray::buffer`].
#[derive(Debug)]
pub struct DataBuffer<K: Kind> {
    view: BufferArray<K>,
    mode: AccessMode,
    capacity: u64,
    window: Vec<K::Value>,
    position: u64,
    count: u64,
}

impl<K: Kind> BufferArray<K> {
    /// Creates a block-access buffer of at most `capacity` elements.
    /// `ReadWrite` mode requires an updatable handle with no pending
    /// copy-on-next-write; buffer writes go to shared storage directly.
    pub fn buffer(&self, mode: AccessMode, capacity: u64) -> Result<DataBuffer<K>> {
        if mode == AccessMode::ReadWrite {
            ensure!(
                self.is_updatable(),
                "cannot open a read-write buffer over a read-only {} array",
                K::KIND
            );
            ensure!(
                !self.is_copy_on_next_write(),
                "cannot open a read-write buffer over a copy-on-next-write {} array",
                K::KIND
            );
        }
        ensure!(capacity > 0, "zero buffer capacity");
        let limit = if K::KIND == ElementKind::Bit {
            MAX_BIT_BUFFER_CAPACITY
        } else {
            MAX_BUFFER_CAPACITY
        };
        let capacity = capacity.min(limit).min(self.length().max(1));
        Ok(DataBuffer {
            view: self.shallow_clone(),
            mode,
            capacity,
            window: Vec::new(),
            position: 0,
            count: 0,
        })
    }
}

impl<K: Kind> DataBuffer<K> {
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Position of the currently mapped window.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of elements currently mapped; shorter than the capacity
    /// only at the end of the array.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Maps `min(capacity, length - pos)` elements starting at `pos` and
    /// returns the mapped slice.
    pub fn map(&mut self, pos: u64) -> Result<&[K::Value]> {
        ensure!(
            pos <= self.view.length(),
            "buffer position {} out of bounds (length={})",
            pos,
            self.view.length()
        );
        let count = self.capacity.min(self.view.length() - pos);
        self.window.resize(count as usize, K::Value::default());
        self.view.get_range(pos, &mut self.window[..count as usize])?;
        self.position = pos;
        self.count = count;
        Ok(&self.window[..count as usize])
    }

    /// Maps the window immediately after the current one.
    pub fn map_next(&mut self) -> Result<&[K::Value]> {
        let next = self.position + self.count;
        self.map(next)
    }

    /// True when the mapped window has reached the end of the array.
    pub fn has_data(&self) -> bool {
        self.count > 0
    }

    pub fn data(&self) -> &[K::Value] {
        &self.window[..self.count as usize]
    }

    pub fn data_mut(&mut self) -> &mut [K::Value] {
        &mut self.window[..self.count as usize]
    }

    /// Writes the mapped window back to the array.
    pub fn force(&mut self) -> Result<()> {
        if self.mode != AccessMode::ReadWrite {
            bail!("cannot force a read-only buffer");
        }
        let count = self.count as usize;
        let position = self.position;
        let window = std::mem::take(&mut self.window);
        let result = self.view.set_range(position, &window[..count]);
        self.window = window;
        result
    }
}
