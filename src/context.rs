//! # Execution Context
//!
//! Cooperative cancellation and progress reporting for long-running array
//! operations. Bulk copies, fills and resource loads consult the context
//! every [`COPY_CHUNK_ELEMENTS`](crate::config::COPY_CHUNK_ELEMENTS)
//! elements, so a multi-gigabyte copy can be interrupted with bounded
//! latency without the inner loops paying a per-element cost.

use eyre::Result;

use crate::kind::ElementKind;

/// Hooks invoked by chunked array operations.
///
/// Both methods have no-op defaults, so a context only implements what it
/// needs. `check_interruption` returning an error aborts the operation;
/// the array it was working on is left in a valid but partially updated
/// state.
pub trait ArrayContext: Send + Sync {
    /// Returns an error if the current operation should stop.
    fn check_interruption(&self) -> Result<()> {
        Ok(())
    }

    /// Reports that `ready` of `total` elements have been processed.
    fn update_progress(&self, _kind: ElementKind, _ready: u64, _total: u64) {}
}

/// Context that never interrupts and discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl ArrayContext for NoContext {}
