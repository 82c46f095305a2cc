//! The memory hierarchy: cache base storage, replacement policies, MSHRs,
//! non-blocking caches, and the DRAM controller wrapper.

/// Sparse byte-content store backing [`dram::DramController`]'s reads.
pub mod backing;
/// Tag/data array storage (§4.2).
pub mod cache_base;
/// Replacement policies (LRU, deterministic hash-based random).
pub mod cache_policies;
/// DRAM controller wrapper (§4.6).
pub mod dram;
/// Miss Status Handling Register state machine.
pub mod mshr;
/// Non-blocking cache: MSHR-driven miss handling (§4.3).
pub mod non_blocking_cache;
/// Row-buffer-timed [`DramModel`] implementation.
pub mod timing;

pub use backing::DramBacking;
pub use cache_base::{CacheBase, Victim};
pub use dram::{ControllerRequest, ControllerRequestKind, DramController, DramModel};
pub use mshr::{Mshr, MshrState, MshrType, SubEntry};
pub use non_blocking_cache::{NonBlockingCache, RequestOutcome};
pub use timing::RowBufferModel;
