//! Wire types carried by the interconnect: memory requests/returns and the
//! ray coalescer's own request type.
//!
//! These mirror `MemoryRequest`/`MemoryReturn`/`StreamSchedulerRequest` from
//! the original hardware model's transaction header, widened slightly (the
//! bypass flag set is a byte rather than a 3-bit field) since this port is
//! not bound to a fixed C struct layout.

use crate::common::addr::{BitStack27, PhysAddr};

/// Maximum payload size of a memory request or return, in bytes.
///
/// Equal to the cache block size for a given build; requests never carry
/// more bytes than fit in one cache line.
pub const MAX_SIZE: usize = 64;

/// Operation carried by a [`MemoryRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Ordinary cached load.
    Load,
    /// Ordinary cached store.
    Store,
    /// Prefetch: install the line, return nothing.
    Prefetch,
    /// Atomic fetch-and-add.
    AmoAdd,
    /// Atomic fetch-and-xor.
    AmoXor,
    /// Atomic fetch-and-or.
    AmoOr,
    /// Atomic fetch-and-and.
    AmoAnd,
    /// Atomic fetch-and-min (signed).
    AmoMin,
    /// Atomic fetch-and-max (signed).
    AmoMax,
    /// Atomic fetch-and-min (unsigned).
    AmoMinu,
    /// Atomic fetch-and-max (unsigned).
    AmoMaxu,
    /// Atomic swap.
    AmoSwap,
    /// Start a new ray path through the RT-core.
    TraceRay,
    /// Atomically fetch and increment a shared thread-id counter.
    FetchThread,
    /// Commit a resolved hit record back to ray state.
    CommitShadeHit,
}

impl RequestKind {
    /// Returns `true` for the three ray-tracing-specific kinds that are
    /// routed to the RT-core / coalescer rather than an ordinary cache.
    #[must_use]
    pub const fn is_ray_intrinsic(self) -> bool {
        matches!(
            self,
            Self::TraceRay | Self::FetchThread | Self::CommitShadeHit
        )
    }
}

/// Per-cache-level bypass flags: bit `i` set means "skip cache level `i`,
/// forward verbatim to the next level".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BypassFlags(pub u8);

impl BypassFlags {
    /// No levels bypassed.
    pub const NONE: Self = Self(0);

    /// Returns `true` if cache level `level` should be bypassed.
    #[must_use]
    pub const fn bypasses(self, level: u8) -> bool {
        (self.0 & (1 << level)) != 0
    }
}

/// A request flowing from a producer (thread processor, RT-core) into the
/// memory hierarchy.
///
/// Invariant: `size <= MAX_SIZE`; for loads the payload bytes are unread,
/// for stores they are consumed at the sink.
#[derive(Clone, Debug)]
pub struct MemoryRequest {
    /// Operation kind.
    pub kind: RequestKind,
    /// Payload size in bytes, `<= MAX_SIZE`.
    pub size: u8,
    /// Per-level cache-bypass flags.
    pub flags: BypassFlags,
    /// Return-path encoding; pushed onto by each routing crossbar hop.
    pub dst: BitStack27,
    /// Port identifier the response must be delivered to.
    pub port: u32,
    /// Physical address being accessed.
    pub paddr: PhysAddr,
    /// Inline payload buffer.
    pub data: [u8; MAX_SIZE],
}

impl MemoryRequest {
    /// Creates a read request (`Load`/`Prefetch`/atomic fetch side) with an
    /// empty payload.
    #[must_use]
    pub fn read(kind: RequestKind, paddr: PhysAddr, size: u8, port: u32) -> Self {
        Self {
            kind,
            size,
            flags: BypassFlags::NONE,
            dst: BitStack27::new(),
            port,
            paddr,
            data: [0; MAX_SIZE],
        }
    }

    /// Creates a store request carrying `payload`.
    ///
    /// # Panics
    ///
    /// Panics if `payload.len() > MAX_SIZE`; callers are expected to have
    /// already validated this against the block size (a violation of this
    /// invariant is [`crate::common::error::Violation::RequestTooLarge`]).
    #[must_use]
    pub fn store(paddr: PhysAddr, payload: &[u8], port: u32) -> Self {
        assert!(payload.len() <= MAX_SIZE, "store payload exceeds MAX_SIZE");
        let mut data = [0u8; MAX_SIZE];
        data[..payload.len()].copy_from_slice(payload);
        Self {
            kind: RequestKind::Store,
            size: payload.len() as u8,
            flags: BypassFlags::NONE,
            dst: BitStack27::new(),
            port,
            paddr,
            data,
        }
    }

    /// Returns the payload bytes actually in use.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.size as usize]
    }
}

/// Operation carried by a [`MemoryReturn`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReturnKind {
    /// No return pending (placeholder / unused slot).
    #[default]
    Na,
    /// A completed load's data has arrived.
    LoadReturn,
}

/// A response flowing back from the memory hierarchy to the requester named
/// by `dst`.
#[derive(Clone, Debug)]
pub struct MemoryReturn {
    /// Operation kind.
    pub kind: ReturnKind,
    /// Payload size in bytes, `<= MAX_SIZE`.
    pub size: u8,
    /// Return-path encoding, popped by each routing crossbar hop.
    pub dst: BitStack27,
    /// Port identifier of the original requester.
    pub port: u32,
    /// Physical address the data corresponds to.
    pub paddr: PhysAddr,
    /// Returned payload bytes.
    pub data: [u8; MAX_SIZE],
}

impl MemoryReturn {
    /// Builds a return from the originating request plus the fetched block
    /// bytes starting at the request's offset within the block.
    #[must_use]
    pub fn from_request(req: &MemoryRequest, block: &[u8]) -> Self {
        let mut data = [0u8; MAX_SIZE];
        let len = req.size as usize;
        data[..len].copy_from_slice(&block[..len]);
        Self {
            kind: ReturnKind::LoadReturn,
            size: req.size,
            dst: req.dst,
            port: req.port,
            paddr: req.paddr,
            data,
        }
    }

    /// Returns the payload bytes actually in use.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.size as usize]
    }
}

/// Operation carried by a [`StreamSchedulerRequest`]: the wire type between
/// RT-cores and the ray coalescer (distinct from [`MemoryRequest`], which
/// only carries ordinary memory traffic).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerRequestKind {
    /// Append a ray id to the segment's open write bucket.
    StoreWorkItem,
    /// Request the next ready bucket for a pinned or unpinned segment.
    LoadBucket,
    /// Notify the coalescer that a bucket has been fully drained.
    BucketComplete,
}

/// A work item: one ray handed off to a child segment by the RT-core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkItem {
    /// Global ray id.
    pub ray_id: u32,
    /// Segment (treelet) the ray is being handed to.
    pub segment_id: u32,
    /// Priority hint in `0..=15`; lower is more urgent.
    pub order_hint: u8,
}

/// A request sent from an RT-core / thread-module to the ray coalescer.
#[derive(Clone, Copy, Debug)]
pub struct StreamSchedulerRequest {
    /// Operation kind.
    pub kind: SchedulerRequestKind,
    /// Requesting thread-module index (used for read-path pinning).
    pub tm_index: u32,
    /// Payload, interpreted according to `kind`.
    pub payload: SchedulerRequestPayload,
}

/// The kind-dependent payload of a [`StreamSchedulerRequest`].
#[derive(Clone, Copy, Debug)]
pub enum SchedulerRequestPayload {
    /// Valid for `StoreWorkItem`.
    WorkItem(WorkItem),
    /// Valid for `LoadBucket`: which segment completed previously on this
    /// TM, if any (used to decide whether the TM stays pinned).
    PreviousSegment(Option<u32>),
    /// Valid for `BucketComplete`.
    SegmentId(u32),
}

/// Opaque payload for the guest thread-processor's special function unit
/// requests.
///
/// The guest ISA and its functional units are out of scope for this crate
/// (see `SPEC_FULL.md` §1); only the existence of this collaborator
/// interface is modeled, so the payload is carried but never interpreted
/// here.
#[derive(Clone, Copy, Debug, Default)]
pub struct SfuRequest {
    /// Opcode understood only by the (external) functional unit.
    pub opcode: u32,
    /// Raw operand words.
    pub operands: [u64; 2],
}
