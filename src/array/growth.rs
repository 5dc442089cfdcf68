//! # Length and Capacity Management
//!
//! Resizable-array operations: tiered capacity growth, length changes,
//! stack-style push/pop, and the private reallocation that resolves a
//! pending copy-on-next-write.
//!
//! ## Growth Policy
//!
//! Pool-backed capacities grow by x3 below `POOL_GROWTH_SMALL_LIMIT`, x2
//! below `POOL_GROWTH_MEDIUM_LIMIT`, and x1.5 + 1 above, always clamped to
//! the kind's maximum length and never below the requested minimum.
//! Mapped-backed capacities instead round the request up to
//! `MAPPED_CAPACITY_GRANULARITY` elements; the storage's block rounding
//! already amortizes file growth, so multiplicative over-allocation would
//! only waste disk.
//!
//! ## Ordering Invariant
//!
//! Length changes commit the new length *before* resolving a pending
//! copy-on-next-write, so the reallocation copies exactly the elements the
//! new length keeps. Shrinking zeroes the excluded tail, which preserves
//! the allocation-time invariant that storage beyond the length is zero.

use eyre::{ensure, eyre, Result};

use crate::config::{
    MAPPED_CAPACITY_GRANULARITY, POOL_GROWTH_MEDIUM_LIMIT, POOL_GROWTH_SMALL_LIMIT,
};
use crate::kind::Kind;
use crate::storage::{RootGuard, Storage, StorageCell};

use super::{Access, BufferArray};

impl<K: Kind> BufferArray<K> {
    /// Grows the capacity to at least `min_capacity`, over-allocating per
    /// the growth policy. No-op when the capacity already suffices.
    pub fn ensure_capacity(&mut self, min_capacity: u64) -> Result<()> {
        if min_capacity <= self.capacity {
            return Ok(());
        }
        self.check_resizable()?;
        ensure!(
            min_capacity <= K::max_length(),
            "too large desired capacity ({} {} elements, maximum {})",
            min_capacity,
            K::KIND,
            K::max_length()
        );
        if self.copy_on_next_write {
            // capacity changes touch shared storage; go private first
            self.reallocate_storage()?;
            if min_capacity <= self.capacity {
                return Ok(());
            }
        }

        let new_capacity = if self.cell.is_mapped_backend() {
            let g = MAPPED_CAPACITY_GRANULARITY;
            match min_capacity.checked_add(g - 1) {
                Some(v) => (v & !(g - 1)).min(K::max_length()).max(min_capacity),
                None => min_capacity,
            }
        } else {
            let grown = if self.capacity < POOL_GROWTH_SMALL_LIMIT {
                self.capacity.checked_mul(3)
            } else if self.capacity < POOL_GROWTH_MEDIUM_LIMIT {
                self.capacity.checked_mul(2)
            } else {
                (self.capacity / 2)
                    .checked_add(self.capacity)
                    .and_then(|v| v.checked_add(1))
            };
            match grown {
                Some(g) => g.min(K::max_length()).max(min_capacity),
                // overflow: allocate exactly what was asked for
                None => min_capacity,
            }
        };

        let new_bytes = K::bytes_for(new_capacity)?;
        if let Some(fresh) = self.cell.change_capacity(new_bytes)? {
            self.switch_storage(fresh);
        }
        self.capacity = new_capacity;
        Ok(())
    }

    /// Sets the length. Growing exposes zero elements; shrinking zeroes
    /// the excluded tail.
    pub fn set_length(&mut self, new_length: u64) -> Result<()> {
        self.check_resizable()?;
        ensure!(
            new_length <= K::max_length(),
            "too large desired length ({} {} elements, maximum {})",
            new_length,
            K::KIND,
            K::max_length()
        );
        if new_length > self.capacity {
            self.ensure_capacity(new_length)?;
        }
        let old_length = self.length;
        self.length = new_length;
        if self.copy_on_next_write {
            self.reallocate_storage()?;
        } else if new_length < old_length {
            let start = self.offset + new_length;
            let count = old_length - new_length;
            self.cell.with_bytes_mut(|bytes, order| {
                K::clear(bytes, start, count, order);
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Shrinks the capacity to the current length, returning the excess
    /// to the backend.
    pub fn trim(&mut self) -> Result<()> {
        self.check_resizable()?;
        if self.copy_on_next_write {
            // private reallocation already lands at capacity == length
            return self.reallocate_storage();
        }
        if self.capacity == self.length {
            return Ok(());
        }
        let new_bytes = K::bytes_for(self.length)?;
        if let Some(fresh) = self.cell.change_capacity(new_bytes)? {
            self.switch_storage(fresh);
        }
        self.capacity = self.length;
        Ok(())
    }

    /// Appends one element, growing per the growth policy.
    pub fn push(&mut self, value: K::Value) -> Result<()> {
        self.check_resizable()?;
        let new_length = self
            .length
            .checked_add(1)
            .ok_or_else(|| eyre!("{} array length overflow", K::KIND))?;
        ensure!(
            new_length <= K::max_length(),
            "too large desired length ({} {} elements, maximum {})",
            new_length,
            K::KIND,
            K::max_length()
        );
        if new_length > self.capacity {
            self.ensure_capacity(new_length)?;
        }
        self.length = new_length;
        if self.copy_on_next_write {
            self.reallocate_storage()?;
        }
        let pos = self.offset + new_length - 1;
        self.cell.with_bytes_mut(|bytes, order| {
            K::set(bytes, pos, order, value);
            Ok(())
        })
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Result<K::Value> {
        self.check_resizable()?;
        ensure!(
            self.length > 0,
            "cannot pop from an empty {} array",
            K::KIND
        );
        let index = self.length - 1;
        let pos = self.offset + index;
        let value = self
            .cell
            .with_bytes(|bytes, order| K::get(bytes, pos, order))?;
        self.length = index;
        if self.copy_on_next_write {
            self.reallocate_storage()?;
        } else {
            // keep the beyond-length region zeroed
            self.cell.with_bytes_mut(|bytes, order| {
                K::clear(bytes, pos, 1, order);
                Ok(())
            })?;
        }
        Ok(value)
    }

    /// Resolves a pending copy-on-next-write: copies the window into a
    /// fresh private storage of the same backend kind and switches this
    /// handle over. Other handles keep the old storage untouched.
    pub(super) fn reallocate_storage(&mut self) -> Result<()> {
        let new_bytes = K::bytes_for(self.length)?;
        let mut fresh = self.cell.new_compatible_empty(new_bytes)?;
        {
            let offset = self.offset;
            let length = self.length;
            let dst = fresh.bytes_mut()?;
            self.cell.with_bytes(|src, order| {
                K::transfer(src, offset, dst, 0, length, order);
            })?;
        }
        self.switch_storage(fresh);
        self.offset = 0;
        self.capacity = self.length;
        Ok(())
    }

    /// Points this handle at a replacement storage under a fresh cell and
    /// registration. The old guard stays with whatever views still share
    /// it, so their storage outlives them as usual. The handle becomes an
    /// original allocation again.
    fn switch_storage(&mut self, fresh: Storage) {
        let cell = StorageCell::new(fresh);
        let guard = RootGuard::register(cell.clone());
        self.cell = cell;
        self.guard = guard;
        self.copy_on_next_write = false;
        self.new_status = true;
    }

    fn check_resizable(&self) -> Result<()> {
        ensure!(
            self.resizable,
            "cannot change the length of an unresizable {} array of {} elements",
            K::KIND,
            self.length
        );
        ensure!(
            self.access == Access::Updatable,
            "cannot change the length of a read-only {} array of {} elements",
            K::KIND,
            self.length
        );
        Ok(())
    }
}
