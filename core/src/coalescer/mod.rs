//! Ray coalescer / treelet scheduler: buckets, admission control, and
//! per-channel DRAM bucket I/O.

/// Fixed-size ray bucket wire format.
pub mod bucket;
/// Per-DRAM-channel bucket streaming and the striped allocator.
pub mod channel;
/// Top-level coalescer tying bucket/segment/channel/scheduler together.
pub mod coalescer;
/// Per-treelet scheduling state.
pub mod segment;
/// Admission control and traversal ordering.
pub mod scheduler;

pub use bucket::{BucketHeader, RayBucket, BUCKET_SIZE, MAX_RAYS};
pub use channel::{Channel, ChannelWorkItem, MemoryManager};
pub use coalescer::{Coalescer, CoalescerLog, DeliveredBucket};
pub use scheduler::Scheduler;
pub use segment::SegmentState;
