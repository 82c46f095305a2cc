//! Drives the coalescer alone through a two-segment handoff: a root
//! treelet with one child, one root ray that follows the hand-off into
//! the child, and both segments retiring in order.
//!
//! This exercises admission control (`Scheduler::step`), bucket flush
//! (full and parent-finished triggers), and segment retirement without
//! needing an `RtCore`/DRAM stack — the coalescer's public surface is
//! enough to observe the whole lifecycle.

use arches_core::coalescer::bucket::MAX_RAYS;
use arches_core::coalescer::channel::ChannelWorkItem;
use arches_core::coalescer::Coalescer;
use arches_core::common::request::{SchedulerRequestKind, SchedulerRequestPayload, StreamSchedulerRequest, WorkItem};
use arches_core::config::CoalescerConfig;
use arches_core::rt::treelet::TreeletHeader;

fn headers(id: u32) -> TreeletHeader {
    match id {
        0 => TreeletHeader { bytes: 128, num_children: 1, first_child: 1, depth: 0 },
        1 => TreeletHeader { bytes: 128, num_children: 0, first_child: 0, depth: 1 },
        other => panic!("unexpected segment id {other}"),
    }
}

fn store(coalescer: &mut Coalescer, ray_id: u32, segment_id: u32) {
    coalescer.process_request(StreamSchedulerRequest {
        kind: SchedulerRequestKind::StoreWorkItem,
        tm_index: 0,
        payload: SchedulerRequestPayload::WorkItem(WorkItem { ray_id, segment_id, order_hint: 0 }),
    });
}

fn mark_bucket_complete(coalescer: &mut Coalescer, segment_id: u32) {
    coalescer.process_request(StreamSchedulerRequest {
        kind: SchedulerRequestKind::BucketComplete,
        tm_index: 0,
        payload: SchedulerRequestPayload::SegmentId(segment_id),
    });
}

/// Requests and drains one ready bucket for `segment_id` off `channel`,
/// delivering its ray count back as though a thread-module had decoded it.
fn load_and_deliver(coalescer: &mut Coalescer, channel: usize, segment_id: u32) -> usize {
    coalescer.process_request(StreamSchedulerRequest {
        kind: SchedulerRequestKind::LoadBucket,
        tm_index: 0,
        payload: SchedulerRequestPayload::PreviousSegment(None),
    });
    coalescer.service_bucket_requests();
    let item = coalescer.drain_channel(channel).expect("a ready bucket should have queued a channel read");
    let ChannelWorkItem::ReadBucket { address, dst_tm } = item else {
        panic!("expected a ReadBucket work item");
    };
    coalescer.free_bucket(channel, address);
    let ray_count = if segment_id == 0 { 1 } else { MAX_RAYS };
    coalescer.deliver(dst_tm, segment_id, (0..ray_count as u32).collect());
    ray_count
}

#[test]
fn a_ray_follows_the_hand_off_from_root_into_its_child_segment() {
    let config = CoalescerConfig { num_root_rays: 1, ..CoalescerConfig::default() };
    let mut coalescer = Coalescer::new(&config, 1, 2, 2048, 0, 128);

    // Root ray lands in segment 0's bucket, then the root reports done.
    store(&mut coalescer, 7, 0);
    coalescer.count_root_ray();
    coalescer.drain_flush_queue(); // segment 0's single-ray bucket flushes now, ahead of any retirement check.

    // Admission control reveals segment 0's child and admits it.
    coalescer.update_scheduler(&headers);

    // Segment 0's bucket is read back and reported drained.
    let delivered = load_and_deliver(&mut coalescer, 0, 0);
    assert_eq!(delivered, 1);
    mark_bucket_complete(&mut coalescer, 0);

    // Segment 0 retires; its child (segment 1) becomes eligible for flushes.
    coalescer.update_scheduler(&headers);

    // The ray is handed off into segment 1 and its bucket fills to capacity,
    // triggering an automatic flush.
    for ray_id in 0..MAX_RAYS as u32 {
        store(&mut coalescer, ray_id, 1);
    }

    let delivered = load_and_deliver(&mut coalescer, 1, 1);
    assert_eq!(delivered, MAX_RAYS);
    mark_bucket_complete(&mut coalescer, 1);

    // Segment 1 has no children, so it retires immediately once drained.
    coalescer.update_scheduler(&headers);

    assert!(coalescer.is_complete(), "both segments should have retired");
    assert_eq!(coalescer.log.rays, 1);
    assert_eq!(coalescer.log.work_items, 1 + MAX_RAYS as u64);
    assert_eq!(coalescer.log.buckets_generated, 2);
    assert_eq!(coalescer.log.buckets_launched, 2);
    assert_eq!(coalescer.log.segments_launched, 2);
    assert_eq!(coalescer.log.single_bucket_segments, 2);
    assert_eq!(coalescer.delivered_out.len(), 2);
}
