//! # Configuration Constants
//!
//! All numeric tuning values for bigarray, with their relationships
//! documented. When changing any constant, check the dependency notes.
//!
//! ## Dependency Graph
//!
//! ```text
//! POOL_GROWTH_SMALL_LIMIT (10_000 elements)
//!       │   capacity below this grows x3 per reallocation
//!       │
//! POOL_GROWTH_MEDIUM_LIMIT (500_000 elements)
//!       │   capacity below this grows x2, above x1.5 + 1
//!       │
//!       └─> Growth must stay monotonic and never reallocate more often
//!           than a plain doubling strategy would.
//!
//! MAPPED_BLOCK_SIZE (65_536 bytes)
//!       │
//!       ├─> Mapped file lengths are always a multiple of this block,
//!       │   so small capacity growths do not remap the file every time.
//!       │
//!       └─> MAPPED_CAPACITY_GRANULARITY (256 elements)
//!             Element-level rounding applied before the byte-level block
//!             rounding; keeps repeated ensure_capacity calls cheap.
//!
//! MAX_BUFFER_CAPACITY (2^31 - 1 elements)
//! MAX_BIT_BUFFER_CAPACITY (2^37 - 1 elements)
//!       │
//!       └─> Upper bounds for DataBuffer windows. The bit limit is larger
//!           because a window of packed bits occupies 1/8 of the bytes.
//!
//! COPY_CHUNK_ELEMENTS (65_536)
//!       │
//!       └─> Granularity at which bulk copies consult the ArrayContext
//!           for cancellation and progress reporting.
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `MAPPED_BLOCK_SIZE` is a power of two (block rounding uses masks)
//! 2. `MAPPED_CAPACITY_GRANULARITY` is a power of two
//! 3. `COPY_CHUNK_ELEMENTS` fits in a usize on all supported targets

/// Pool capacities below this grow by a factor of 3.
pub const POOL_GROWTH_SMALL_LIMIT: u64 = 10_000;

/// Pool capacities below this grow by a factor of 2; above, by 1.5x + 1.
pub const POOL_GROWTH_MEDIUM_LIMIT: u64 = 500_000;

/// Mapped-backend capacities are rounded up to a multiple of this many
/// elements before the byte-level block rounding is applied.
pub const MAPPED_CAPACITY_GRANULARITY: u64 = 256;

/// Mapped file lengths are rounded up to a multiple of this many bytes,
/// so repeated small growths do not truncate and remap the file each time.
pub const MAPPED_BLOCK_SIZE: u64 = 65_536;

/// Maximum DataBuffer window capacity for non-bit element kinds.
pub const MAX_BUFFER_CAPACITY: u64 = (1 << 31) - 1;

/// Maximum DataBuffer window capacity for bit arrays.
pub const MAX_BIT_BUFFER_CAPACITY: u64 = (1 << 37) - 1;

/// Bulk copies process this many elements between interruption checks
/// and progress callbacks.
pub const COPY_CHUNK_ELEMENTS: u64 = 65_536;

/// Trusted-immutable views fingerprint at most this many bytes of content.
/// The check is advisory; bounding the window keeps view creation cheap
/// for multi-gigabyte arrays.
pub const TRUSTED_FINGERPRINT_WINDOW: u64 = 65_536;

const _: () = assert!(MAPPED_BLOCK_SIZE.is_power_of_two());
const _: () = assert!(MAPPED_CAPACITY_GRANULARITY.is_power_of_two());
const _: () = assert!(COPY_CHUNK_ELEMENTS <= MAX_BUFFER_CAPACITY);
