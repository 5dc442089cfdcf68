//! # Memory Models
//!
//! Factories that decide where a new array's elements live. A memory
//! model carries allocation policy (backend, directory, byte order);
//! arrays created by different models are fully interoperable.
//!
//! - [`PoolMemoryModel`] allocates in process memory; suited to arrays
//!   that fit comfortably in RAM.
//! - [`MappedMemoryModel`] allocates memory-mapped scratch files in a
//!   directory, and can also map windows of caller-supplied files; suited
//!   to arrays far larger than RAM.

use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use hashbrown::HashSet;
use parking_lot::Mutex;

use crate::array::{Access, BufferArray, BufferBitArray};
use crate::kind::{Bit, ByteOrder, Kind};
use crate::storage::{MappedStorage, PoolStorage, Storage};

/// Allocates arrays in pooled process memory.
#[derive(Debug, Clone, Copy)]
pub struct PoolMemoryModel {
    order: ByteOrder,
}

impl PoolMemoryModel {
    pub fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    /// A model using the host platform's byte order.
    pub fn native() -> Self {
        Self::new(ByteOrder::NATIVE)
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// A resizable array of `length` zero elements.
    pub fn new_array<K: Kind>(&self, length: u64) -> Result<BufferArray<K>> {
        self.allocate(length, true)
    }

    /// An unresizable updatable array of `length` zero elements.
    pub fn new_unresizable<K: Kind>(&self, length: u64) -> Result<BufferArray<K>> {
        self.allocate(length, false)
    }

    /// A resizable bit array of `length` zero elements.
    pub fn new_bit_array(&self, length: u64) -> Result<BufferBitArray> {
        self.new_array::<Bit>(length)
    }

    fn allocate<K: Kind>(&self, length: u64, resizable: bool) -> Result<BufferArray<K>> {
        ensure!(
            length <= K::max_length(),
            "too large desired length ({} {} elements, maximum {})",
            length,
            K::KIND,
            K::max_length()
        );
        let bytes = K::bytes_for(length)?;
        let storage = PoolStorage::allocate(bytes, self.order, !resizable)?;
        Ok(BufferArray::new_root(
            Storage::Pool(storage),
            length,
            Access::Updatable,
            resizable,
            true,
            false,
        ))
    }
}

/// Allocates arrays as memory-mapped scratch files in one directory, and
/// maps windows of existing files.
#[derive(Debug)]
pub struct MappedMemoryModel {
    dir: PathBuf,
    order: ByteOrder,
    created: Mutex<HashSet<PathBuf>>,
}

impl MappedMemoryModel {
    /// Creates the model, creating `dir` if needed. Scratch files land in
    /// `dir` and are deleted when their last array handle is gone.
    pub fn new<P: AsRef<Path>>(dir: P, order: ByteOrder) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .wrap_err_with(|| format!("failed to create array directory '{}'", dir.display()))?;
        Ok(Self {
            dir,
            order,
            created: Mutex::new(HashSet::new()),
        })
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Paths of every scratch file this model has created so far,
    /// including files already deleted by the registry.
    pub fn created_files(&self) -> Vec<PathBuf> {
        self.created.lock().iter().cloned().collect()
    }

    /// A resizable array of `length` zero elements in a fresh scratch file.
    pub fn new_array<K: Kind>(&self, length: u64) -> Result<BufferArray<K>> {
        self.allocate(length, true)
    }

    /// An unresizable updatable array of `length` zero elements in a fresh
    /// scratch file.
    pub fn new_unresizable<K: Kind>(&self, length: u64) -> Result<BufferArray<K>> {
        self.allocate(length, false)
    }

    /// A resizable bit array of `length` zero elements.
    pub fn new_bit_array(&self, length: u64) -> Result<BufferBitArray> {
        self.new_array::<Bit>(length)
    }

    /// Maps `length` elements starting at `byte_offset` of an existing
    /// file. The result is unresizable; when `read_only` is set it is an
    /// immutable view and the file is opened without write access.
    pub fn map_existing<K: Kind>(
        &self,
        path: impl AsRef<Path>,
        byte_offset: u64,
        length: u64,
        read_only: bool,
    ) -> Result<BufferArray<K>> {
        ensure!(
            length <= K::max_length(),
            "too large desired length ({} {} elements, maximum {})",
            length,
            K::KIND,
            K::max_length()
        );
        let bytes = K::bytes_for(length)?;
        let storage = MappedStorage::open(path, byte_offset, bytes, self.order, read_only)?;
        let access = if read_only {
            Access::ReadOnly
        } else {
            Access::Updatable
        };
        Ok(BufferArray::new_root(
            Storage::Mapped(storage),
            length,
            access,
            false,
            false,
            read_only,
        ))
    }

    fn allocate<K: Kind>(&self, length: u64, resizable: bool) -> Result<BufferArray<K>> {
        ensure!(
            length <= K::max_length(),
            "too large desired length ({} {} elements, maximum {})",
            length,
            K::KIND,
            K::max_length()
        );
        let bytes = K::bytes_for(length)?;
        let storage = MappedStorage::create_scratch_in(&self.dir, bytes, self.order)?;
        self.created.lock().insert(storage.path().to_path_buf());
        Ok(BufferArray::new_root(
            Storage::Mapped(storage),
            length,
            Access::Updatable,
            resizable,
            true,
            false,
        ))
    }
}
