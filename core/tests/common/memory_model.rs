//! A single-cycle flat memory used to drive `RtCore`/`NonBlockingCache`
//! fetches directly in a test, bypassing the full cache/DRAM unit chain.
//!
//! Built on [`arches_core::memory::DramBacking`], the same sparse
//! byte-content store the real `DramController` wrapper uses, so the
//! wire-format assumptions match production exactly.

use arches_core::common::request::{MemoryRequest, MemoryReturn, RequestKind};
use arches_core::memory::DramBacking;

/// Answers `Load` requests against a sparse byte store with zero
/// additional latency; a test's driver loop calls [`Self::serve`] on every
/// request an `RtCore`/`NonBlockingCache` pushes to its miss queue.
#[derive(Default)]
pub struct FlatMemory {
    backing: DramBacking,
}

impl FlatMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `len` bytes at `addr`.
    pub fn write(&mut self, addr: u64, data: &[u8]) {
        self.backing.write(addr, data);
    }

    /// Builds the `MemoryReturn` for a `Load`/`Prefetch` request, as
    /// `DramController::tick` does for a completed read.
    ///
    /// # Panics
    /// Panics if `req.kind` is `Store`/`CommitShadeHit`; those requests
    /// carry no return and a test driver must not forward them here.
    #[must_use]
    pub fn serve(&self, req: &MemoryRequest) -> MemoryReturn {
        assert!(
            !matches!(req.kind, RequestKind::Store | RequestKind::CommitShadeHit),
            "store-like requests produce no return"
        );
        let block = self.backing.read(req.paddr.val(), req.size as usize);
        MemoryReturn::from_request(req, &block)
    }
}
