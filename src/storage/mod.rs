//! # Storage Layer
//!
//! Byte-level backends for arrays, plus the shared-ownership plumbing on
//! top of them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  BufferArray<K>  (element semantics, views, growth)     │
//! └──────────────────────────┬──────────────────────────────┘
//!                            │ Arc<StorageCell> + Arc<RootGuard>
//! ┌──────────────────────────▼──────────────────────────────┐
//! │  StorageCell   RwLock<Storage> + deallocation registry  │
//! └──────────────────────────┬──────────────────────────────┘
//!                            │
//!              ┌─────────────┴─────────────┐
//!              ▼                           ▼
//!        PoolStorage                 MappedStorage
//!        (heap bytes)          (memory-mapped file window)
//! ```
//!
//! [`Storage`] is the backend dispatch point. Arrays never touch a backend
//! directly; everything goes through [`StorageCell`], which serializes
//! access, performs lazy remapping after an explicit resource free, and
//! releases the backend exactly once when the last registered allocation
//! is gone.
//!
//! Both backends expose the same contract: a zero-initialized byte region
//! of a fixed current capacity, a prefix-preserving `change_capacity` that
//! either succeeds in place or hands back a replacement storage, and
//! resource hints (`load_range`, `flush_range`, `free`) that are no-ops
//! where the backend has nothing to do.

mod mapped;
mod pool;
mod registry;

pub use mapped::MappedStorage;
pub use pool::PoolStorage;
pub use registry::{RootGuard, StorageCell};

use eyre::Result;

use crate::context::ArrayContext;
use crate::kind::{ByteOrder, ElementKind};

/// One byte-level backend instance.
#[derive(Debug)]
pub enum Storage {
    Pool(PoolStorage),
    Mapped(MappedStorage),
}

impl Storage {
    pub fn bytes(&self) -> Result<&[u8]> {
        match self {
            Storage::Pool(s) => Ok(s.bytes()),
            Storage::Mapped(s) => s.bytes(),
        }
    }

    pub fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        match self {
            Storage::Pool(s) => Ok(s.bytes_mut()),
            Storage::Mapped(s) => s.bytes_mut(),
        }
    }

    pub fn capacity_bytes(&self) -> u64 {
        match self {
            Storage::Pool(s) => s.capacity_bytes(),
            Storage::Mapped(s) => s.capacity_bytes(),
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        match self {
            Storage::Pool(s) => s.byte_order(),
            Storage::Mapped(s) => s.byte_order(),
        }
    }

    /// True when a previous `free` dropped the OS mapping and the next
    /// access must re-establish it first.
    pub fn needs_remap(&self) -> bool {
        match self {
            Storage::Pool(_) => false,
            Storage::Mapped(s) => s.needs_remap(),
        }
    }

    pub fn ensure_mapped(&mut self) -> Result<()> {
        match self {
            Storage::Pool(_) => Ok(()),
            Storage::Mapped(s) => s.ensure_mapped(),
        }
    }

    /// Prefix-preserving capacity change. `Some` means the change could
    /// not happen in place and the returned storage replaces this one.
    pub fn change_capacity(&mut self, new_bytes: u64) -> Result<Option<Storage>> {
        match self {
            Storage::Pool(s) => Ok(s.change_capacity(new_bytes)?.map(Storage::Pool)),
            Storage::Mapped(s) => Ok(s.change_capacity(new_bytes)?.map(Storage::Mapped)),
        }
    }

    /// Empty storage of the same backend kind and byte order, used by
    /// copy-on-write reallocation.
    pub fn new_compatible_empty(&self, capacity_bytes: u64) -> Result<Storage> {
        match self {
            Storage::Pool(s) => Ok(Storage::Pool(PoolStorage::allocate(
                capacity_bytes,
                s.byte_order(),
                false,
            )?)),
            Storage::Mapped(s) => Ok(Storage::Mapped(s.new_compatible_scratch(capacity_bytes)?)),
        }
    }

    pub fn load_range(&self, from_byte: u64, to_byte: u64) {
        match self {
            Storage::Pool(_) => {}
            Storage::Mapped(s) => s.load_range(from_byte, to_byte),
        }
    }

    pub fn flush_range(&self, from_byte: u64, to_byte: u64, force: bool) -> Result<()> {
        match self {
            Storage::Pool(_) => Ok(()),
            Storage::Mapped(s) => s.flush_range(from_byte, to_byte, force),
        }
    }

    pub fn actualize(
        &self,
        from_byte: u64,
        to_byte: u64,
        kind: ElementKind,
        ctx: &dyn ArrayContext,
    ) -> Result<()> {
        match self {
            Storage::Pool(_) => Ok(()),
            Storage::Mapped(s) => s.actualize(from_byte, to_byte, kind, ctx),
        }
    }

    pub fn free(&mut self, force: bool) -> Result<()> {
        match self {
            Storage::Pool(_) => Ok(()),
            Storage::Mapped(s) => s.free(force),
        }
    }

    /// Final release of OS resources; invoked by the registry exactly
    /// once, when no allocation is attached any more.
    pub fn release(&mut self) -> Result<()> {
        match self {
            Storage::Pool(s) => {
                s.release();
                Ok(())
            }
            Storage::Mapped(s) => s.release(),
        }
    }
}
