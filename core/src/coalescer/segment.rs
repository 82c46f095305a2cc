//! Per-treelet scheduling state tracked by the coalescer.

use std::collections::VecDeque;

/// Scheduling state for one treelet segment.
///
/// Invariant: a segment retires when
/// `parent_finished ∧ children_scheduled ∧ retired_buckets == total_buckets`.
#[derive(Clone, Debug, Default)]
pub struct SegmentState {
    /// FIFO of bucket addresses ready to be streamed to an RT-core.
    pub bucket_address_queue: VecDeque<u64>,
    /// Next DRAM channel a newly allocated bucket for this segment should
    /// land on, for striped allocation.
    pub next_channel: u32,
    /// Total buckets ever allocated for this segment.
    pub total_buckets: u32,
    /// Buckets whose drain has been confirmed complete by an RT-core.
    pub retired_buckets: u32,
    /// Set once the parent segment has itself retired.
    pub parent_finished: bool,
    /// Set once this segment's children have been pushed onto the
    /// traversal order (BFS queue / DFS stack).
    pub children_scheduled: bool,
    /// Accumulated priority weight from admitted work items' order hints.
    pub weight: u64,
    /// Number of rays ever routed into this segment.
    pub num_rays: u64,
    /// Depth in the segment tree, root is 0.
    pub depth: u32,
    /// Number of thread-modules currently pinned to this segment for
    /// bucket reads.
    pub num_tms: u32,
}

impl SegmentState {
    /// `true` once every admission and retirement condition for this
    /// segment has been met.
    #[must_use]
    pub fn is_retirable(&self) -> bool {
        self.parent_finished && self.children_scheduled && self.retired_buckets == self.total_buckets
    }
}
