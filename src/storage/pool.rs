//! # Pooled Heap Storage
//!
//! In-process byte pool backend: a growable, zero-initialized buffer owned
//! by the storage. Growth happens in place through the allocator; the
//! storage only "moves" when it was allocated for an unresizable array,
//! in which case a capacity change must produce a fresh instance.
//!
//! Resource operations are no-ops for this backend except `release`, which
//! drops the buffer so a storage that outlives its last attached array does
//! not pin heap memory.

use eyre::{ensure, Result};

use crate::kind::ByteOrder;

#[derive(Debug)]
pub struct PoolStorage {
    data: Vec<u8>,
    order: ByteOrder,
    unresizable: bool,
}

impl PoolStorage {
    pub fn allocate(capacity_bytes: u64, order: ByteOrder, unresizable: bool) -> Result<Self> {
        ensure!(
            capacity_bytes <= isize::MAX as u64,
            "too large desired pool storage ({} bytes)",
            capacity_bytes
        );
        Ok(Self {
            data: vec![0u8; capacity_bytes as usize],
            order,
            unresizable,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Changes the allocated capacity, preserving the common prefix of the
    /// content. Returns a fresh storage when the change cannot happen in
    /// place (unresizable allocation).
    pub fn change_capacity(&mut self, new_bytes: u64) -> Result<Option<PoolStorage>> {
        if self.unresizable {
            let mut fresh = PoolStorage::allocate(new_bytes, self.order, false)?;
            let n = (new_bytes.min(self.data.len() as u64)) as usize;
            fresh.data[..n].copy_from_slice(&self.data[..n]);
            return Ok(Some(fresh));
        }
        ensure!(
            new_bytes <= isize::MAX as u64,
            "too large desired pool storage ({} bytes)",
            new_bytes
        );
        self.data.resize(new_bytes as usize, 0);
        Ok(None)
    }

    /// Drops the buffer. Called once no array is attached any more.
    pub fn release(&mut self) {
        self.data = Vec::new();
    }
}
