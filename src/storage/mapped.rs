//! # Memory-Mapped File Storage
//!
//! Disk-backed storage: the byte region is a memory-mapped window of a
//! file. Reads and writes go straight through the mapping, so a
//! multi-gigabyte array costs no more process memory than the OS decides
//! to keep resident.
//!
//! ## Block Rounding
//!
//! File lengths are always a multiple of `MAPPED_BLOCK_SIZE`. Capacity
//! growth first rounds the requested byte count up to the block size, so
//! a sequence of small `ensure_capacity` calls extends and remaps the file
//! once per block rather than once per call.
//!
//! ## Growth and Remapping
//!
//! Growing follows flush → `set_len` → remap. The caller holds the
//! storage's write lock for the whole sequence, so no byte slice handed
//! out earlier can still be alive when the old mapping is dropped.
//!
//! ## Resource Operations
//!
//! - `load_range`: `madvise(MADV_WILLNEED)` hint over the window (unix)
//! - `flush_range`: `msync` the window (synchronous when forced)
//! - `free`: flush then drop the mapping; the file stays open and the
//!   next access remaps lazily
//! - `release`: flush, unmap, and delete the backing file if this storage
//!   created it as a scratch allocation. Called exactly once, when the
//!   last attached array is gone.
//!
//! ## Windows Opened on Existing Files
//!
//! `open` maps `[byte_offset, byte_offset + window)` of an existing file.
//! Such a storage can never grow in place; a capacity change moves the
//! content into a fresh scratch-file storage. Read-only opens use an
//! immutable mapping, so even a logic error elsewhere cannot write
//! through them.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use eyre::{bail, ensure, eyre, Result, WrapErr};
use memmap2::{Mmap, MmapMut};

use crate::config::MAPPED_BLOCK_SIZE;
use crate::context::ArrayContext;
use crate::kind::{ByteOrder, ElementKind};

/// OS page granularity used to align msync/madvise ranges.
const PAGE_ALIGN: u64 = 4096;

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
enum Mapping {
    Rw(MmapMut),
    Ro(Mmap),
}

#[derive(Debug)]
pub struct MappedStorage {
    file: File,
    path: PathBuf,
    mapping: Option<Mapping>,
    /// Byte offset of the window start within the file.
    base_offset: u64,
    /// Usable window length in bytes (array capacities live inside this).
    window_bytes: u64,
    /// Current file length; always a multiple of `MAPPED_BLOCK_SIZE` for
    /// storages created by this crate.
    file_bytes: u64,
    order: ByteOrder,
    writable: bool,
    /// True for storages that own their file and may extend it in place.
    growable: bool,
    /// True for scratch files created by this crate; deleted on release.
    delete_on_release: bool,
}

fn round_up_to_block(bytes: u64) -> u64 {
    let rounded = (bytes + (MAPPED_BLOCK_SIZE - 1)) & !(MAPPED_BLOCK_SIZE - 1);
    rounded.max(MAPPED_BLOCK_SIZE)
}

impl MappedStorage {
    /// Creates a fresh file of at least `capacity_bytes` (block-rounded)
    /// and maps it writable.
    pub fn create<P: AsRef<Path>>(
        path: P,
        capacity_bytes: u64,
        order: ByteOrder,
        delete_on_release: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create array file '{}'", path.display()))?;

        let file_bytes = round_up_to_block(capacity_bytes);
        file.set_len(file_bytes)
            .wrap_err_with(|| format!("failed to set file size to {} bytes", file_bytes))?;

        // SAFETY: map_mut is unsafe because the file could be modified
        // externally. The file was just created with truncate=true and is
        // used exclusively through this storage; all access is bounds
        // checked against the window length.
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            file,
            path: path.to_path_buf(),
            mapping: Some(Mapping::Rw(mmap)),
            base_offset: 0,
            window_bytes: capacity_bytes,
            file_bytes,
            order,
            writable: true,
            growable: true,
            delete_on_release,
        })
    }

    /// Maps `[byte_offset, byte_offset + window_bytes)` of an existing file.
    pub fn open<P: AsRef<Path>>(
        path: P,
        byte_offset: u64,
        window_bytes: u64,
        order: ByteOrder,
        read_only: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)
            .wrap_err_with(|| format!("failed to open array file '{}'", path.display()))?;

        let metadata = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?;
        let file_bytes = metadata.len();
        let end = byte_offset
            .checked_add(window_bytes)
            .ok_or_else(|| eyre!("array window overflows the addressable file range"))?;
        ensure!(
            end <= file_bytes,
            "array window [{}, {}) exceeds file '{}' size {}",
            byte_offset,
            end,
            path.display(),
            file_bytes
        );

        let mut storage = Self {
            file,
            path: path.to_path_buf(),
            mapping: None,
            base_offset: byte_offset,
            window_bytes,
            file_bytes,
            order,
            writable: !read_only,
            growable: false,
            delete_on_release: false,
        };
        storage.ensure_mapped()?;
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.window_bytes
    }

    pub fn is_read_only(&self) -> bool {
        !self.writable
    }

    pub fn needs_remap(&self) -> bool {
        self.mapping.is_none()
    }

    /// Re-establishes the mapping after `free` dropped it.
    pub fn ensure_mapped(&mut self) -> Result<()> {
        if self.mapping.is_some() {
            return Ok(());
        }
        let mapping = if self.writable {
            // SAFETY: the file is owned by this storage (or was opened
            // writable on caller request); the mapping is dropped before
            // any file-length change and all access is bounds checked.
            let mmap = unsafe {
                MmapMut::map_mut(&self.file)
                    .wrap_err_with(|| format!("failed to memory-map '{}'", self.path.display()))?
            };
            Mapping::Rw(mmap)
        } else {
            // SAFETY: read-only mapping of a caller-supplied file; external
            // modification would be visible but cannot corrupt this process
            // beyond returning inconsistent element values.
            let mmap = unsafe {
                Mmap::map(&self.file)
                    .wrap_err_with(|| format!("failed to memory-map '{}'", self.path.display()))?
            };
            Mapping::Ro(mmap)
        };
        self.mapping = Some(mapping);
        Ok(())
    }

    pub fn bytes(&self) -> Result<&[u8]> {
        let start = self.base_offset as usize;
        let end = (self.base_offset + self.window_bytes) as usize;
        match &self.mapping {
            Some(Mapping::Rw(m)) => Ok(&m[start..end]),
            Some(Mapping::Ro(m)) => Ok(&m[start..end]),
            None => bail!(
                "mapped storage '{}' has no active mapping; resources were freed",
                self.path.display()
            ),
        }
    }

    pub fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        let start = self.base_offset as usize;
        let end = (self.base_offset + self.window_bytes) as usize;
        match &mut self.mapping {
            Some(Mapping::Rw(m)) => Ok(&mut m[start..end]),
            Some(Mapping::Ro(_)) => bail!(
                "mapped storage '{}' is read-only",
                self.path.display()
            ),
            None => bail!(
                "mapped storage '{}' has no active mapping; resources were freed",
                self.path.display()
            ),
        }
    }

    /// Changes the usable window capacity, preserving existing content.
    /// Grows the file in place when this storage owns it; otherwise moves
    /// the content into a fresh scratch-file storage and returns it.
    pub fn change_capacity(&mut self, new_bytes: u64) -> Result<Option<MappedStorage>> {
        if !self.growable {
            let mut fresh = self.new_compatible_scratch(new_bytes)?;
            self.ensure_mapped()?;
            let n = (new_bytes.min(self.window_bytes)) as usize;
            fresh.bytes_mut()?[..n].copy_from_slice(&self.bytes()?[..n]);
            return Ok(Some(fresh));
        }

        let new_file_bytes = round_up_to_block(new_bytes);
        if new_file_bytes > self.file_bytes {
            if let Some(Mapping::Rw(m)) = &self.mapping {
                m.flush()
                    .wrap_err("failed to flush mapping before growing the file")?;
            }
            // drop the old mapping before changing the file length
            self.mapping = None;
            self.file
                .set_len(new_file_bytes)
                .wrap_err_with(|| format!("failed to extend file to {} bytes", new_file_bytes))?;
            self.file_bytes = new_file_bytes;
            self.ensure_mapped()?;
        }
        // shrinking keeps the block-rounded file length; only the usable
        // window contracts
        self.window_bytes = new_bytes;
        Ok(None)
    }

    /// Creates an empty scratch storage next to this one, with the same
    /// byte order. Used by capacity moves and copy-on-write reallocation.
    pub fn new_compatible_scratch(&self, capacity_bytes: u64) -> Result<MappedStorage> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        MappedStorage::create_scratch_in(dir, capacity_bytes, self.order)
    }

    /// Creates an empty scratch storage in `dir` under a collision-free
    /// name. Scratch files are deleted when released.
    pub fn create_scratch_in(
        dir: &Path,
        capacity_bytes: u64,
        order: ByteOrder,
    ) -> Result<MappedStorage> {
        let name = format!(
            "bigarray-{}-{:06}.bam",
            std::process::id(),
            SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        MappedStorage::create(dir.join(name), capacity_bytes, order, true)
    }

    /// Advises the OS to prefetch the given window byte range.
    pub fn load_range(&self, from_byte: u64, to_byte: u64) {
        let Some(mapping) = &self.mapping else {
            return;
        };
        let to_byte = to_byte.min(self.window_bytes);
        if from_byte >= to_byte {
            return;
        }
        #[cfg(unix)]
        {
            let base = match mapping {
                Mapping::Rw(m) => m.as_ptr(),
                Mapping::Ro(m) => m.as_ptr(),
            };
            let abs_from = (self.base_offset + from_byte) & !(PAGE_ALIGN - 1);
            let abs_to = self.base_offset + to_byte;
            // SAFETY: the range is clamped to the window, which lies inside
            // the mapping; madvise with MADV_WILLNEED is only a hint.
            unsafe {
                libc::madvise(
                    base.add(abs_from as usize) as *mut libc::c_void,
                    (abs_to - abs_from) as usize,
                    libc::MADV_WILLNEED,
                );
            }
        }
        #[cfg(not(unix))]
        {
            let _ = mapping;
        }
    }

    /// Flushes the given window byte range to the file. When `force` is
    /// set the call blocks until the OS reports the pages written.
    pub fn flush_range(&self, from_byte: u64, to_byte: u64, force: bool) -> Result<()> {
        let Some(Mapping::Rw(m)) = &self.mapping else {
            return Ok(());
        };
        let to_byte = to_byte.min(self.window_bytes);
        if from_byte >= to_byte {
            return Ok(());
        }
        let abs_from = (self.base_offset + from_byte) & !(PAGE_ALIGN - 1);
        let abs_to = self.base_offset + to_byte;
        let (offset, len) = (abs_from as usize, (abs_to - abs_from) as usize);
        if force {
            m.flush_range(offset, len)
                .wrap_err_with(|| format!("failed to flush '{}' to disk", self.path.display()))
        } else {
            m.flush_async_range(offset, len)
                .wrap_err_with(|| format!("failed to schedule flush of '{}'", self.path.display()))
        }
    }

    /// Touches every page in the window byte range so lazily-filled pages
    /// are materialized, consulting the context between chunks.
    pub fn actualize(
        &self,
        from_byte: u64,
        to_byte: u64,
        kind: ElementKind,
        ctx: &dyn ArrayContext,
    ) -> Result<()> {
        let bytes = match self.bytes() {
            Ok(b) => b,
            // nothing resident, nothing to actualize
            Err(_) => return Ok(()),
        };
        let to_byte = to_byte.min(bytes.len() as u64);
        let total = to_byte.saturating_sub(from_byte);
        let mut pos = from_byte;
        while pos < to_byte {
            ctx.check_interruption()?;
            let chunk_end = (pos + 1024 * PAGE_ALIGN).min(to_byte);
            let mut p = pos;
            while p < chunk_end {
                // SAFETY: p < chunk_end <= bytes.len(); the volatile read
                // forces the page fault and cannot be optimized away.
                unsafe {
                    std::ptr::read_volatile(bytes.as_ptr().add(p as usize));
                }
                p += PAGE_ALIGN;
            }
            pos = chunk_end;
            ctx.update_progress(kind, pos - from_byte, total);
        }
        Ok(())
    }

    /// Flushes and drops the mapping; the file stays open and the next
    /// access remaps lazily.
    pub fn free(&mut self, force: bool) -> Result<()> {
        self.flush_range(0, self.window_bytes, force)?;
        self.mapping = None;
        Ok(())
    }

    /// Final release: flush, unmap, and delete the backing scratch file.
    /// Safe to call more than once.
    pub fn release(&mut self) -> Result<()> {
        if self.mapping.is_some() {
            self.flush_range(0, self.window_bytes, true)?;
            self.mapping = None;
        }
        if self.delete_on_release {
            match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).wrap_err_with(|| {
                        format!("failed to delete scratch file '{}'", self.path.display())
                    });
                }
            }
            self.delete_on_release = false;
        }
        Ok(())
    }
}
