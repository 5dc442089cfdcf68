//! # bigarray
//!
//! Typed arrays of primitive elements far beyond in-memory sizes, backed
//! by pooled process memory or memory-mapped files, with zero-copy views,
//! copy-on-write, and deterministic release of OS resources.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Memory models (model)                                       │
//! │  PoolMemoryModel · MappedMemoryModel — allocation policy     │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ creates
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │  Array core (array)                                          │
//! │  BufferArray<K> — element ops, views, facets, growth,        │
//! │  DataBuffer block access, packed-bit operations              │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ element semantics via
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │  Element kinds (kind)                                        │
//! │  Element scalars + Bit packing, byte-order aware             │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ bytes via
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │  Storage layer (storage)                                     │
//! │  StorageCell + registry · PoolStorage · MappedStorage        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Handles, Views, Capabilities
//!
//! An array value is a *handle*: a typed window into shared storage plus
//! capability flags (updatable / trusted read-only / read-only,
//! resizable, copy-on-next-write). [`BufferArray::sub_array`] and the
//! `as_*` facet methods derive new handles without copying elements, and
//! capabilities only ever narrow. A copy-on-next-write handle reallocates
//! privately on its first mutation, so sharing stays invisible.
//!
//! ## Resource Lifecycle
//!
//! Mapped arrays hold real OS resources (file handles, mappings, scratch
//! files). [`BufferArray::free_resources`] releases the transient part
//! eagerly while keeping the handle usable; final release is automatic
//! and exactly-once, driven by a per-allocation registry that fires when
//! the root handle and every view derived from it are gone, in any drop
//! order.
//!
//! ## Example
//!
//! ```no_run
//! use bigarray::{MappedMemoryModel, ByteOrder, NoContext};
//!
//! # fn main() -> eyre::Result<()> {
//! let model = MappedMemoryModel::new("/tmp/arrays", ByteOrder::NATIVE)?;
//! let mut a = model.new_array::<i64>(0)?;
//! for i in 0..1_000_000 {
//!     a.push(i)?;
//! }
//! let view = a.sub_array(500_000, 600_000)?.as_immutable();
//! assert_eq!(view.get(0)?, 500_000);
//! a.flush_resources(true)?;
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod config;
pub mod context;
pub mod kind;
pub mod model;
pub mod storage;

pub use array::{Access, AccessMode, BufferArray, BufferBitArray, DataBuffer};
pub use context::{ArrayContext, NoContext};
pub use kind::{Bit, ByteOrder, Element, ElementKind, Kind};
pub use model::{MappedMemoryModel, PoolMemoryModel};
pub use storage::{RootGuard, Storage, StorageCell};
