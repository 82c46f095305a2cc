//! Error taxonomy for the simulator core.
//!
//! The core is a simulator of hardware, so "errors" fall into three
//! disjoint categories rather than one generic `Error`:
//!
//! 1. [`ConfigError`] — detected at construction, before simulation begins.
//!    Always recoverable from the caller's point of view: fix the config
//!    and retry.
//! 2. [`Violation`] — a hardware-level invariant broke at run time (an MSHR
//!    took an illegal transition, a request exceeded the block size, a
//!    destination stack underflowed). These are bugs, not conditions a
//!    caller can meaningfully recover from, so call sites `panic!` with a
//!    `Violation`'s `Display` text; the type still implements
//!    `std::error::Error` for tests that want to catch the payload.
//! 3. [`ExternalFault`] — the black-box DRAM model reported a fault. This is
//!    the one category that is propagated through `Result` rather than
//!    panicking: external faults must surface unchanged rather than be
//!    retried or converted into a panic.

use crate::common::addr::PhysAddr;

/// Errors detected while validating a [`crate::config::Config`], before any
/// unit is constructed.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A numeric option was outside its permitted range.
    #[error("{option}: {value} is out of range (expected {expected})")]
    OutOfRange {
        /// Name of the offending configuration option.
        option: &'static str,
        /// The value that was supplied.
        value: i64,
        /// Human-readable description of the expected range.
        expected: &'static str,
    },
    /// A value must be a power of two for address decomposition to work.
    #[error("{option}: {value} must be a power of two")]
    NotPowerOfTwo {
        /// Name of the offending configuration option.
        option: &'static str,
        /// The value that was supplied.
        value: u64,
    },
    /// A cache's associativity does not evenly divide its size.
    #[error(
        "{option}: size {size} is not a multiple of (block_size {block_size} * associativity {associativity})"
    )]
    InconsistentGeometry {
        /// Name of the offending cache (e.g. `"l1_d"`).
        option: &'static str,
        /// Total cache size in bytes.
        size: usize,
        /// Cache line size in bytes.
        block_size: usize,
        /// Associativity (number of ways).
        associativity: usize,
    },
}

/// A hardware-level invariant violation, tagged with the cycle it was
/// detected on.
///
/// These correspond to assertions in the original hardware model: states
/// that must never occur if every unit is implemented and wired correctly.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Violation {
    /// A `MemoryRequest`'s payload exceeded the cache block size.
    #[error("cycle {cycle}: request size {size} exceeds max block size {max}")]
    RequestTooLarge {
        /// Cycle the violation was detected on.
        cycle: u64,
        /// The offending request's payload size.
        size: usize,
        /// The configured maximum (cache block size).
        max: usize,
    },
    /// An MSHR attempted a transition not present in the permitted state
    /// graph (`INVALID -> EMPTY -> DATA_ARRAY -> MISSED -> FILLED -> RETIRED`,
    /// with `RETIRED -> FILLED` as the lone back-edge for LFB reuse).
    #[error("cycle {cycle}: illegal MSHR transition {from:?} -> {to:?} for block {block_addr:?}")]
    IllegalMshrTransition {
        /// Cycle the violation was detected on.
        cycle: u64,
        /// The state the MSHR was in.
        from: crate::memory::mshr::MshrState,
        /// The state the transition attempted to reach.
        to: crate::memory::mshr::MshrState,
        /// The block address of the offending MSHR.
        block_addr: PhysAddr,
    },
    /// A bucket-complete notification arrived for a segment with zero
    /// outstanding (unretired) buckets.
    #[error("cycle {cycle}: bucket-complete for segment {segment_id} with no outstanding buckets")]
    SpuriousBucketComplete {
        /// Cycle the violation was detected on.
        cycle: u64,
        /// The segment the notification named.
        segment_id: u32,
    },
    /// A destination stack was popped with no bits remaining.
    #[error("cycle {cycle}: destination stack underflow")]
    DestinationStackUnderflow {
        /// Cycle the violation was detected on.
        cycle: u64,
    },
    /// Two non-`INVALID` MSHRs in the same bank claimed the same
    /// `(block_addr, type)` pair.
    #[error("cycle {cycle}: duplicate MSHR for block {block_addr:?}")]
    DuplicateMshr {
        /// Cycle the violation was detected on.
        cycle: u64,
        /// The block address claimed by both MSHRs.
        block_addr: PhysAddr,
    },
}

/// An error surfaced unchanged from the black-box DRAM model.
///
/// Unlike [`Violation`], this is not a bug in the core: it is propagated
/// through `Result` rather than panicking, and is never retried silently.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("DRAM model fault on channel {channel}: {message}")]
pub struct ExternalFault {
    /// The DRAM channel the fault was reported on.
    pub channel: u32,
    /// A human-readable description from the black-box model.
    pub message: String,
}

/// The union of error categories a [`crate::sim::simulator::Simulator`] run
/// can return.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SimError {
    /// Configuration was rejected before simulation began.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The black-box DRAM model reported a fault.
    #[error(transparent)]
    External(#[from] ExternalFault),
}
