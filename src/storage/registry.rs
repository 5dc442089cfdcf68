//! # Deallocation-Safety Registry
//!
//! Bookkeeping that releases a storage's OS resources exactly when the
//! last array depending on it is gone.
//!
//! ## Model
//!
//! Every independent allocation registers exactly one id with its
//! storage's registry, represented by a [`RootGuard`]. The root array
//! holds the guard in an `Arc`; every derived view clones that `Arc`
//! instead of registering itself, so registry overhead stays bounded by
//! one entry per allocation no matter how many views exist. When the
//! guard's last clone drops, its `Drop` impl forgets the id; the registry
//! releases the storage once no ids remain, and only once.
//!
//! ## Storage Switches
//!
//! Copy-on-write reallocation and out-of-place capacity growth move an
//! array to a fresh storage. The array then installs a *new* guard bound
//! to the new cell; the old guard is left with whatever views still share
//! it, keeping the old storage registered (and its resources alive) until
//! those views are gone too. The switch itself is transactional: the copy
//! happens before the new cell becomes reachable, so a storage never gains
//! mappings after its registry has emptied.
//!
//! ## Lock Order
//!
//! Registry mutex first, then the storage lock. `forget` is the only path
//! that takes both.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use eyre::Result;
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard, RwLockWriteGuard};
use smallvec::SmallVec;

use crate::context::ArrayContext;
use crate::kind::{ByteOrder, ElementKind};

use super::Storage;

static NEXT_ARRAY_ID: AtomicU64 = AtomicU64::new(1);

fn next_array_id() -> u64 {
    NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Default)]
struct Registry {
    attached: SmallVec<[u64; 4]>,
    released: bool,
}

/// Shared handle to one storage: the byte region behind a lock, plus the
/// registry of attached allocations.
#[derive(Debug)]
pub struct StorageCell {
    storage: RwLock<Storage>,
    registry: Mutex<Registry>,
}

impl StorageCell {
    pub fn new(storage: Storage) -> Arc<Self> {
        Arc::new(Self {
            storage: RwLock::new(storage),
            registry: Mutex::new(Registry::default()),
        })
    }

    fn attach(&self, id: u64) {
        let mut registry = self.registry.lock();
        registry.attached.push(id);
    }

    fn forget(&self, id: u64) {
        let mut registry = self.registry.lock();
        if let Some(pos) = registry.attached.iter().position(|&a| a == id) {
            registry.attached.swap_remove(pos);
        }
        if registry.attached.is_empty() && !registry.released {
            registry.released = true;
            // resource errors during teardown have no caller to surface to
            let _ = self.storage.write().release();
        }
    }

    /// Number of allocations currently attached to this storage.
    pub fn attached_arrays(&self) -> usize {
        self.registry.lock().attached.len()
    }

    /// True once the storage's OS resources have been released.
    pub fn is_released(&self) -> bool {
        self.registry.lock().released
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.storage.read().byte_order()
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.storage.read().capacity_bytes()
    }

    pub fn is_mapped_backend(&self) -> bool {
        matches!(&*self.storage.read(), Storage::Mapped(_))
    }

    /// Runs `f` over the storage bytes, remapping first if resources were
    /// freed earlier.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8], ByteOrder) -> R) -> Result<R> {
        let guard = self.storage.upgradable_read();
        if guard.needs_remap() {
            let mut write = RwLockUpgradableReadGuard::upgrade(guard);
            write.ensure_mapped()?;
            let read = RwLockWriteGuard::downgrade(write);
            let order = read.byte_order();
            return Ok(f(read.bytes()?, order));
        }
        let order = guard.byte_order();
        Ok(f(guard.bytes()?, order))
    }

    /// Runs `f` over the mutable storage bytes, remapping first if needed.
    pub fn with_bytes_mut<R>(
        &self,
        f: impl FnOnce(&mut [u8], ByteOrder) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.storage.write();
        guard.ensure_mapped()?;
        let order = guard.byte_order();
        f(guard.bytes_mut()?, order)
    }

    /// Changes the storage capacity in bytes, preserving the content
    /// prefix. Returns the replacement storage when the change could not
    /// happen in place.
    pub fn change_capacity(&self, new_bytes: u64) -> Result<Option<Storage>> {
        let mut guard = self.storage.write();
        guard.ensure_mapped()?;
        guard.change_capacity(new_bytes)
    }

    /// Creates an empty storage of the same backend kind and byte order.
    pub fn new_compatible_empty(&self, capacity_bytes: u64) -> Result<Storage> {
        self.storage.read().new_compatible_empty(capacity_bytes)
    }

    pub fn load_range(&self, from_byte: u64, to_byte: u64) {
        self.storage.read().load_range(from_byte, to_byte);
    }

    pub fn flush_range(&self, from_byte: u64, to_byte: u64, force: bool) -> Result<()> {
        self.storage.read().flush_range(from_byte, to_byte, force)
    }

    pub fn actualize(
        &self,
        from_byte: u64,
        to_byte: u64,
        kind: ElementKind,
        ctx: &dyn ArrayContext,
    ) -> Result<()> {
        self.storage.read().actualize(from_byte, to_byte, kind, ctx)
    }

    /// Explicit resource free over the whole storage: flush, then drop the
    /// mapping. The next access remaps lazily.
    pub fn free(&self, force: bool) -> Result<()> {
        self.storage.write().free(force)
    }

    /// Path of the backing file for mapped storages.
    pub fn backing_file_path(&self) -> Option<std::path::PathBuf> {
        match &*self.storage.read() {
            Storage::Mapped(m) => Some(m.path().to_path_buf()),
            Storage::Pool(_) => None,
        }
    }
}

/// Registration token for one independent allocation. Dropping the last
/// clone forgets the allocation from its storage's registry.
#[derive(Debug)]
pub struct RootGuard {
    id: u64,
    cell: Arc<StorageCell>,
}

impl RootGuard {
    pub fn register(cell: Arc<StorageCell>) -> Arc<Self> {
        let id = next_array_id();
        cell.attach(id);
        Arc::new(Self { id, cell })
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for RootGuard {
    fn drop(&mut self) {
        self.cell.forget(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PoolStorage;

    fn pool_cell(bytes: u64) -> Arc<StorageCell> {
        StorageCell::new(Storage::Pool(
            PoolStorage::allocate(bytes, ByteOrder::NATIVE, false).unwrap(),
        ))
    }

    #[test]
    fn guard_clones_share_one_registry_entry() {
        let cell = pool_cell(64);
        let guard = RootGuard::register(cell.clone());
        let view_guard = guard.clone();
        assert_eq!(cell.attached_arrays(), 1);
        drop(guard);
        assert_eq!(cell.attached_arrays(), 1);
        assert!(!cell.is_released());
        drop(view_guard);
        assert_eq!(cell.attached_arrays(), 0);
        assert!(cell.is_released());
    }

    #[test]
    fn two_roots_release_after_both_gone() {
        let cell = pool_cell(64);
        let a = RootGuard::register(cell.clone());
        let b = RootGuard::register(cell.clone());
        assert_eq!(cell.attached_arrays(), 2);
        drop(b);
        assert!(!cell.is_released());
        drop(a);
        assert!(cell.is_released());
    }

    #[test]
    fn with_bytes_round_trip() {
        let cell = pool_cell(16);
        let _guard = RootGuard::register(cell.clone());
        cell.with_bytes_mut(|bytes, _| {
            bytes[3] = 0x5A;
            Ok(())
        })
        .unwrap();
        let value = cell.with_bytes(|bytes, _| bytes[3]).unwrap();
        assert_eq!(value, 0x5A);
    }
}
