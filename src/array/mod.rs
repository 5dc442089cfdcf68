//! # Array Core
//!
//! [`BufferArray<K>`] is the one array implementation behind every element
//! kind: a window `[offset, offset + length)` of elements inside a shared
//! storage, plus the capability flags that make up the handle's contract.
//!
//! ## Handles and Views
//!
//! A handle never owns elements; it owns an `Arc<StorageCell>` plus an
//! `Arc<RootGuard>` keeping the allocation registered. Views produced by
//! [`sub_array`](BufferArray::sub_array) and the `as_*` facet methods are
//! cheap field copies sharing both `Arc`s, so creating a view of a
//! multi-gigabyte array costs a few words and no element traffic.
//!
//! ## Capability Flags
//!
//! - `access` — updatable, trusted read-only, or read-only; mutation
//!   through a non-updatable handle is an error, never silent.
//! - `resizable` — only root allocations created resizable may change
//!   length; every derived view is unresizable.
//! - `copy_on_next_write` — the first mutation through the handle
//!   reallocates privately first, so other handles never observe it.
//!
//! Facet conversions only ever narrow capabilities; nothing in this module
//! can widen a read-only handle back to updatable.

mod bits;
mod buffer;
mod growth;
mod views;

pub use buffer::{AccessMode, DataBuffer};

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use crc::Crc;
use eyre::{ensure, eyre, Result};

use crate::config::{COPY_CHUNK_ELEMENTS, TRUSTED_FINGERPRINT_WINDOW};
use crate::context::ArrayContext;
use crate::kind::{Bit, ByteOrder, ElementKind, Kind};
use crate::storage::{RootGuard, Storage, StorageCell};

/// A bit array handle; elements are packed 64 per storage word.
pub type BufferBitArray = BufferArray<Bit>;

const FINGERPRINT: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Mutation capability of one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Updatable,
    /// Read-only by contract, with an advisory content fingerprint taken
    /// at view creation; see [`BufferArray::check_unallowed_mutation`].
    TrustedReadOnly,
    ReadOnly,
}

/// A typed window into a shared storage. See the module docs for the
/// handle/view model.
#[derive(Debug)]
pub struct BufferArray<K: Kind> {
    cell: Arc<StorageCell>,
    guard: Arc<RootGuard>,
    /// Element offset of the window start within the storage.
    offset: u64,
    length: u64,
    capacity: u64,
    access: Access,
    resizable: bool,
    copy_on_next_write: bool,
    /// True for original allocations (including post-reallocation
    /// storage), false for views derived from another handle.
    new_status: bool,
    /// True for read-only windows mapped over caller-supplied files.
    new_read_only_view: bool,
    fingerprint: Option<u32>,
    _kind: PhantomData<K>,
}

impl<K: Kind> Clone for BufferArray<K> {
    fn clone(&self) -> Self {
        self.shallow_clone()
    }
}

impl<K: Kind> BufferArray<K> {
    pub(crate) fn new_root(
        storage: Storage,
        length: u64,
        access: Access,
        resizable: bool,
        new_status: bool,
        new_read_only_view: bool,
    ) -> Self {
        let cell = StorageCell::new(storage);
        let guard = RootGuard::register(cell.clone());
        Self {
            cell,
            guard,
            offset: 0,
            length,
            capacity: length,
            access,
            resizable,
            copy_on_next_write: false,
            new_status,
            new_read_only_view,
            fingerprint: None,
            _kind: PhantomData,
        }
    }

    /// A second handle over the same window, sharing storage and
    /// registration. Field copy only.
    pub fn shallow_clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            guard: self.guard.clone(),
            offset: self.offset,
            length: self.length,
            capacity: self.capacity,
            access: self.access,
            resizable: self.resizable,
            copy_on_next_write: self.copy_on_next_write,
            new_status: self.new_status,
            new_read_only_view: self.new_read_only_view,
            fingerprint: self.fingerprint,
            _kind: PhantomData,
        }
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn element_kind(&self) -> ElementKind {
        K::KIND
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.cell.byte_order()
    }

    pub fn is_immutable(&self) -> bool {
        self.access == Access::ReadOnly
    }

    pub fn is_trusted_immutable(&self) -> bool {
        self.access == Access::TrustedReadOnly
    }

    pub fn is_updatable(&self) -> bool {
        self.access == Access::Updatable
    }

    pub fn is_unresizable(&self) -> bool {
        !self.resizable
    }

    pub fn is_copy_on_next_write(&self) -> bool {
        self.copy_on_next_write
    }

    /// True when this handle is an original allocation rather than a view
    /// of another handle.
    pub fn is_new(&self) -> bool {
        self.new_status
    }

    pub fn is_new_read_only_view(&self) -> bool {
        self.new_read_only_view
    }

    /// Lazy filling is resolved eagerly at allocation time; kept for
    /// contract completeness.
    pub fn is_lazy(&self) -> bool {
        false
    }

    /// The storage cell behind this handle, exposing the deallocation
    /// registry probes (`attached_arrays`, `is_released`).
    pub fn storage_cell(&self) -> Arc<StorageCell> {
        self.cell.clone()
    }

    /// Path of the backing file, for mapped arrays.
    pub fn backing_file_path(&self) -> Option<PathBuf> {
        self.cell.backing_file_path()
    }

    pub fn get(&self, index: u64) -> Result<K::Value> {
        ensure!(
            index < self.length,
            "index {} out of bounds (length={})",
            index,
            self.length
        );
        let pos = self.offset + index;
        self.cell.with_bytes(|bytes, order| K::get(bytes, pos, order))
    }

    pub fn set(&mut self, index: u64, value: K::Value) -> Result<()> {
        ensure!(
            index < self.length,
            "index {} out of bounds (length={})",
            index,
            self.length
        );
        self.prepare_for_write()?;
        let pos = self.offset + index;
        self.cell.with_bytes_mut(|bytes, order| {
            K::set(bytes, pos, order, value);
            Ok(())
        })
    }

    /// Reads `dst.len()` elements starting at `pos`.
    pub fn get_range(&self, pos: u64, dst: &mut [K::Value]) -> Result<()> {
        self.check_range(pos, dst.len() as u64)?;
        let start = self.offset + pos;
        self.cell
            .with_bytes(|bytes, order| K::get_data(bytes, start, dst, order))
    }

    /// Writes `src.len()` elements starting at `pos`.
    pub fn set_range(&mut self, pos: u64, src: &[K::Value]) -> Result<()> {
        self.check_range(pos, src.len() as u64)?;
        self.prepare_for_write()?;
        let start = self.offset + pos;
        self.cell.with_bytes_mut(|bytes, order| {
            K::set_data(bytes, start, src, order);
            Ok(())
        })
    }

    pub fn fill(&mut self, pos: u64, count: u64, value: K::Value) -> Result<()> {
        self.check_range(pos, count)?;
        self.prepare_for_write()?;
        let start = self.offset + pos;
        self.cell.with_bytes_mut(|bytes, order| {
            K::fill(bytes, start, count, order, value);
            Ok(())
        })
    }

    pub fn fill_all(&mut self, value: K::Value) -> Result<()> {
        self.fill(0, self.length, value)
    }

    /// Minimal index in `[low, high)` holding `value`. The range is
    /// clamped to the array length; an empty clamped range finds nothing.
    pub fn index_of(&self, low: u64, high: u64, value: K::Value) -> Result<Option<u64>> {
        let high = high.min(self.length);
        if low >= high {
            return Ok(None);
        }
        let offset = self.offset;
        self.cell.with_bytes(|bytes, order| {
            K::index_of(bytes, offset + low, offset + high, order, value).map(|i| i - offset)
        })
    }

    /// Maximal index in `[low, high)` holding `value`, clamped like
    /// [`index_of`](Self::index_of).
    pub fn last_index_of(&self, low: u64, high: u64, value: K::Value) -> Result<Option<u64>> {
        let high = high.min(self.length);
        if low >= high {
            return Ok(None);
        }
        let offset = self.offset;
        self.cell.with_bytes(|bytes, order| {
            K::last_index_of(bytes, offset + low, offset + high, order, value).map(|i| i - offset)
        })
    }

    /// Copies `count` elements from `src_pos` to `dst_pos` inside this
    /// array. Overlap-safe.
    pub fn copy_within(&mut self, src_pos: u64, dst_pos: u64, count: u64) -> Result<()> {
        self.check_range(src_pos, count)?;
        self.check_range(dst_pos, count)?;
        self.prepare_for_write()?;
        let offset = self.offset;
        self.cell.with_bytes_mut(|bytes, order| {
            K::copy_within(bytes, offset + src_pos, offset + dst_pos, count, order);
            Ok(())
        })
    }

    /// Swaps `count` elements between `first` and `second` inside this
    /// array. Overlap-safe.
    pub fn swap_within(&mut self, first: u64, second: u64, count: u64) -> Result<()> {
        self.check_range(first, count)?;
        self.check_range(second, count)?;
        self.prepare_for_write()?;
        let offset = self.offset;
        self.cell.with_bytes_mut(|bytes, order| {
            K::swap_within(bytes, offset + first, offset + second, count, order);
            Ok(())
        })
    }

    /// Copies `min(self.length, src.length)` elements from the start of
    /// `src` to the start of this array, chunked with interruption checks
    /// and progress reports through `ctx`.
    pub fn copy_from(&mut self, ctx: &dyn ArrayContext, src: &BufferArray<K>) -> Result<()> {
        let count = self.length.min(src.length);
        if count == 0 {
            return Ok(());
        }
        self.prepare_for_write()?;

        if Arc::ptr_eq(&self.cell, &src.cell) {
            // same storage: chunked overlap-safe move. When the windows
            // overlap and the destination starts above the source, chunks
            // run from the tail so unread source elements survive.
            let (src_off, dst_off) = (src.offset, self.offset);
            let backward = dst_off > src_off;
            let mut done = 0u64;
            while done < count {
                ctx.check_interruption()?;
                let n = (count - done).min(COPY_CHUNK_ELEMENTS);
                let pos = if backward { count - done - n } else { done };
                self.cell.with_bytes_mut(|bytes, order| {
                    K::copy_within(bytes, src_off + pos, dst_off + pos, n, order);
                    Ok(())
                })?;
                done += n;
                ctx.update_progress(K::KIND, done, count);
            }
            return Ok(());
        }

        let same_order = self.cell.byte_order() == src.cell.byte_order();
        let mut done = 0u64;
        let mut scratch: Vec<K::Value> = Vec::new();
        while done < count {
            ctx.check_interruption()?;
            let n = (count - done).min(COPY_CHUNK_ELEMENTS);
            let (src_pos, dst_pos) = (src.offset + done, self.offset + done);
            if same_order {
                // distinct cells, so the nested read lock cannot deadlock
                self.cell.with_bytes_mut(|dst, order| {
                    src.cell.with_bytes(|sb, _| {
                        K::transfer(sb, src_pos, dst, dst_pos, n, order);
                    })
                })?;
            } else {
                scratch.resize(n as usize, K::Value::default());
                src.cell
                    .with_bytes(|sb, order| K::get_data(sb, src_pos, &mut scratch[..n as usize], order))?;
                self.cell.with_bytes_mut(|dst, order| {
                    K::set_data(dst, dst_pos, &scratch[..n as usize], order);
                    Ok(())
                })?;
            }
            done += n;
            ctx.update_progress(K::KIND, done, count);
        }
        Ok(())
    }

    /// Exchanges `min(self.length, other.length)` elements between the
    /// starts of the two arrays, chunked with interruption checks and
    /// progress reports through `ctx`.
    pub fn swap_with(&mut self, ctx: &dyn ArrayContext, other: &mut BufferArray<K>) -> Result<()> {
        let count = self.length.min(other.length);
        if count == 0 {
            return Ok(());
        }
        self.prepare_for_write()?;
        other.prepare_for_write()?;

        if Arc::ptr_eq(&self.cell, &other.cell) {
            let (a, b) = (self.offset, other.offset);
            let mut done = 0u64;
            while done < count {
                ctx.check_interruption()?;
                let n = (count - done).min(COPY_CHUNK_ELEMENTS);
                self.cell.with_bytes_mut(|bytes, order| {
                    K::swap_within(bytes, a + done, b + done, n, order);
                    Ok(())
                })?;
                done += n;
                ctx.update_progress(K::KIND, done, count);
            }
            return Ok(());
        }

        let mut done = 0u64;
        let mut mine: Vec<K::Value> = Vec::new();
        let mut theirs: Vec<K::Value> = Vec::new();
        while done < count {
            ctx.check_interruption()?;
            let n = ((count - done).min(COPY_CHUNK_ELEMENTS)) as usize;
            mine.resize(n, K::Value::default());
            theirs.resize(n, K::Value::default());
            let (my_pos, their_pos) = (self.offset + done, other.offset + done);
            self.cell
                .with_bytes(|b, o| K::get_data(b, my_pos, &mut mine[..n], o))?;
            other
                .cell
                .with_bytes(|b, o| K::get_data(b, their_pos, &mut theirs[..n], o))?;
            self.cell.with_bytes_mut(|b, o| {
                K::set_data(b, my_pos, &theirs[..n], o);
                Ok(())
            })?;
            other.cell.with_bytes_mut(|b, o| {
                K::set_data(b, their_pos, &mine[..n], o);
                Ok(())
            })?;
            done += n as u64;
            ctx.update_progress(K::KIND, done, count);
        }
        Ok(())
    }

    /// Hints the OS to prefetch the window's backing pages.
    pub fn load_resources(&self) {
        let (from, to) = K::byte_span(self.offset, self.length);
        self.cell.load_range(from, to);
    }

    /// Flushes the window's backing pages. When `force` is set, blocks
    /// until the OS reports them written.
    pub fn flush_resources(&self, force: bool) -> Result<()> {
        let (from, to) = K::byte_span(self.offset, self.length);
        self.cell.flush_range(from, to, force)
    }

    /// Flushes and releases the storage's transient OS resources (the
    /// mapping, for mapped arrays). The handle stays fully usable; the
    /// next access re-acquires resources lazily. Affects every handle
    /// sharing this storage.
    pub fn free_resources(&self, force: bool) -> Result<()> {
        self.cell.free(force)
    }

    /// Materializes every page of the window, so later accesses do not
    /// fault. Interruptible through `ctx`.
    pub fn actualize_lazy_filling(&self, ctx: &dyn ArrayContext) -> Result<()> {
        let (from, to) = K::byte_span(self.offset, self.length);
        self.cell.actualize(from, to, K::KIND, ctx)
    }

    /// For trusted-immutable handles: verifies the advisory content
    /// fingerprint taken at view creation. A mismatch means some code
    /// mutated the content behind the trusted contract.
    pub fn check_unallowed_mutation(&self) -> Result<()> {
        let Some(expected) = self.fingerprint else {
            return Ok(());
        };
        let actual = self.content_fingerprint()?;
        ensure!(
            actual == expected,
            "unallowed mutation detected through a trusted immutable view of a {} array \
             (fingerprint {:08x}, expected {:08x})",
            K::KIND,
            actual,
            expected
        );
        Ok(())
    }

    /// Digests the canonical serialization of a bounded prefix of the
    /// window. Canonical, so the fingerprint covers exactly the window's
    /// own elements; neighboring elements packed into shared storage
    /// bytes never contribute.
    fn content_fingerprint(&self) -> Result<u32> {
        let count = self
            .length
            .min(K::elements_in_bytes(TRUSTED_FINGERPRINT_WINDOW));
        let offset = self.offset;
        self.cell.with_bytes(|bytes, order| {
            let mut digest = FINGERPRINT.digest();
            K::digest_range(bytes, offset, count, order, &mut |chunk| {
                digest.update(chunk)
            });
            digest.finalize()
        })
    }

    fn check_range(&self, pos: u64, count: u64) -> Result<()> {
        let end = pos
            .checked_add(count)
            .ok_or_else(|| eyre!("range [{}..{}+{}) overflows", pos, pos, count))?;
        ensure!(
            end <= self.length,
            "range [{}, {}) out of bounds (length={})",
            pos,
            end,
            self.length
        );
        Ok(())
    }

    /// Every mutation funnels through here: rejects non-updatable handles
    /// and resolves a pending copy-on-next-write by reallocating privately
    /// before the write happens.
    fn prepare_for_write(&mut self) -> Result<()> {
        ensure!(
            self.access == Access::Updatable,
            "cannot modify {} {} array of {} elements",
            match self.access {
                Access::ReadOnly => "immutable",
                Access::TrustedReadOnly => "trusted immutable",
                Access::Updatable => unreachable!(),
            },
            K::KIND,
            self.length
        );
        if self.copy_on_next_write {
            self.reallocate_storage()?;
        }
        Ok(())
    }
}
