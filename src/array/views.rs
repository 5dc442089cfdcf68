//! # Views and Facets
//!
//! Zero-copy derivations of a handle: positional sub-ranges and
//! capability-narrowing facets. Every method here is a field copy sharing
//! the storage cell and the registration guard; none moves elements.

use eyre::{ensure, Result};

use crate::kind::Kind;

use super::{Access, BufferArray};

impl<K: Kind> BufferArray<K> {
    /// A view of elements `[from, to)`. The view shares storage with this
    /// handle (writes through either are visible in both), inherits its
    /// access capability, and is always unresizable.
    pub fn sub_array(&self, from: u64, to: u64) -> Result<BufferArray<K>> {
        ensure!(
            from <= to && to <= self.length,
            "illegal sub-array range [{}, {}) (length={})",
            from,
            to,
            self.length
        );
        let mut view = self.shallow_clone();
        view.offset = self.offset + from;
        view.length = to - from;
        view.capacity = to - from;
        view.resizable = false;
        view.new_status = false;
        view.new_read_only_view = false;
        if view.access == Access::TrustedReadOnly {
            view.fingerprint = Some(view.content_fingerprint()?);
        }
        Ok(view)
    }

    /// A view of `count` elements starting at `pos`; see
    /// [`sub_array`](Self::sub_array).
    pub fn sub_arr(&self, pos: u64, count: u64) -> Result<BufferArray<K>> {
        let to = pos.checked_add(count).ok_or_else(|| {
            eyre::eyre!("illegal sub-array range [{}, {}+{}) (overflow)", pos, pos, count)
        })?;
        self.sub_array(pos, to)
    }

    /// A read-only facet. Nothing reachable from the result can mutate the
    /// content or be converted back to an updatable handle.
    pub fn as_immutable(&self) -> BufferArray<K> {
        let mut view = self.shallow_clone();
        view.access = Access::ReadOnly;
        view.resizable = false;
        view.new_status = false;
        view.fingerprint = None;
        view
    }

    /// A trusted read-only facet: read-only by contract, with an advisory
    /// content fingerprint that [`Self::check_unallowed_mutation`] later
    /// verifies. An already immutable handle is returned as-is; its
    /// contract is stronger.
    pub fn as_trusted_immutable(&self) -> Result<BufferArray<K>> {
        let mut view = self.shallow_clone();
        view.resizable = false;
        view.new_status = false;
        if view.access == Access::ReadOnly {
            return Ok(view);
        }
        view.access = Access::TrustedReadOnly;
        view.fingerprint = Some(view.content_fingerprint()?);
        Ok(view)
    }

    /// A copy-on-next-write facet: the first mutation through the result
    /// reallocates privately, so this handle and every other view never
    /// observe it. Read-only handles are returned as-is, since no mutation
    /// can reach them anyway.
    pub fn as_copy_on_next_write(&self) -> BufferArray<K> {
        let mut view = self.shallow_clone();
        if view.access == Access::Updatable {
            view.copy_on_next_write = true;
        }
        view.new_status = false;
        view.new_read_only_view = false;
        view
    }

    /// An unresizable facet over the same content.
    pub fn as_unresizable(&self) -> BufferArray<K> {
        let mut view = self.shallow_clone();
        view.resizable = false;
        view.new_status = false;
        view
    }
}
