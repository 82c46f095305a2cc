//! The ray coalescer: batches rays into per-treelet buckets, admits
//! treelets to a working set under a capacity budget, and re-injects
//! buckets when their target treelet becomes active.

use crate::coalescer::bucket::RayBucket;
use crate::coalescer::channel::{Channel, ChannelWorkItem, MemoryManager};
use crate::coalescer::scheduler::Scheduler;
use crate::common::request::{SchedulerRequestKind, SchedulerRequestPayload, StreamSchedulerRequest};
use crate::config::CoalescerConfig;
use crate::rt::treelet::TreeletHeader;
use std::collections::{HashMap, VecDeque};

/// Priority weight contributed by a work item's `order_hint`: lower hints
/// (more urgent) contribute more weight.
#[must_use]
fn order_weight(order_hint: u8) -> u64 {
    1u64 << (15 - order_hint.min(15))
}

/// Bucket delivered to a requesting thread-module/RT-core: which segment
/// it belongs to and the ray ids it carries.
pub struct DeliveredBucket {
    pub tm_index: u32,
    pub segment_id: u32,
    pub ray_ids: Vec<u32>,
}

/// Coalescer counters (the per-treelet access histogram feeds from these,
/// bucketed externally by depth).
#[derive(Clone, Debug, Default)]
pub struct CoalescerLog {
    pub rays: u64,
    pub work_items: u64,
    pub buckets_launched: u64,
    pub buckets_generated: u64,
    pub segments_launched: u64,
    pub single_bucket_segments: u64,
}

/// Distributed scheduler streaming rays between BVH partitions via
/// DRAM-resident bucket queues.
pub struct Coalescer {
    scheduler: Scheduler,
    memory_managers: Vec<MemoryManager>,
    channels: Vec<Channel>,

    open_buckets: HashMap<u32, RayBucket>,
    bucket_flush_queue: VecDeque<u32>,
    bucket_request_queue: VecDeque<u32>,
    last_segment_on_tm: Vec<Option<u32>>,

    pub delivered_out: VecDeque<DeliveredBucket>,
    pub log: CoalescerLog,
}

impl Coalescer {
    /// Creates a coalescer with segment 0 already active.
    #[must_use]
    pub fn new(config: &CoalescerConfig, num_tms: usize, num_channels: usize, row_size: u64, heap_addr: u64, root_bytes: u64) -> Self {
        let memory_managers = (0..num_channels)
            .map(|i| MemoryManager::new(i as u32, num_channels as u32, row_size, heap_addr))
            .collect();
        Self {
            scheduler: Scheduler::new(
                config.traversal_scheme,
                config.weight_scheme,
                config.max_active_set_size,
                config.num_root_rays,
                root_bytes,
            ),
            memory_managers,
            channels: (0..num_channels).map(|_| Channel::new()).collect(),
            open_buckets: HashMap::new(),
            bucket_flush_queue: VecDeque::new(),
            bucket_request_queue: VecDeque::new(),
            last_segment_on_tm: vec![None; num_tms],
            delivered_out: VecDeque::new(),
            log: CoalescerLog::default(),
        }
    }

    /// Called once per root ray admitted into the simulation (before any
    /// segment-0 work item arrives over the wire), to let the scheduler
    /// know when the root segment has finished emitting its rays.
    pub fn count_root_ray(&mut self) {
        self.scheduler.root_rays_counter += 1;
        self.log.rays += 1;
        if self.scheduler.root_rays_counter == self.scheduler.num_root_rays {
            if let Some(state) = self.scheduler.segment_states.get_mut(&0) {
                state.parent_finished = true;
            }
            self.bucket_flush_queue.push_back(0);
        }
    }

    /// Processes one inbound request from an RT-core/thread-module.
    pub fn process_request(&mut self, req: StreamSchedulerRequest) {
        match req.kind {
            SchedulerRequestKind::StoreWorkItem => {
                let SchedulerRequestPayload::WorkItem(item) = req.payload else {
                    return;
                };
                self.log.work_items += 1;
                let weight = order_weight(item.order_hint);
                let channel_index = item.segment_id as usize % self.memory_managers.len();
                let bucket = self
                    .open_buckets
                    .entry(item.segment_id)
                    .or_insert_with(|| RayBucket::new(item.segment_id));
                bucket.write_ray(item.ray_id);
                {
                    let state = self.scheduler.segment_states.entry(item.segment_id).or_default();
                    state.weight += weight;
                    state.num_rays += 1;
                }
                if bucket.is_full() {
                    self.flush_bucket(item.segment_id, channel_index);
                }
            }
            SchedulerRequestKind::BucketComplete => {
                let SchedulerRequestPayload::SegmentId(segment_id) = req.payload else {
                    return;
                };
                if let Some(state) = self.scheduler.segment_states.get_mut(&segment_id) {
                    state.retired_buckets += 1;
                }
            }
            SchedulerRequestKind::LoadBucket => {
                self.bucket_request_queue.push_back(req.tm_index);
            }
        }
    }

    fn flush_bucket(&mut self, segment_id: u32, channel_index: usize) {
        if let Some(bucket) = self.open_buckets.remove(&segment_id) {
            let address = self.memory_managers[channel_index].alloc_bucket();
            let state = self.scheduler.segment_states.entry(segment_id).or_default();
            if state.total_buckets == 0 {
                state.next_channel = channel_index as u32;
            }
            state.total_buckets += 1;
            state.bucket_address_queue.push_back(address);
            self.log.buckets_generated += 1;
            self.channels[channel_index].work_queue.push_back(ChannelWorkItem::WriteBucket {
                address,
                bucket: Box::new(bucket),
            });
        }
    }

    /// Flushes any open (not-yet-full) bucket for segments whose parent has
    /// finished emitting rays into them — further work items for that
    /// segment can still arrive, so this does not retire the segment.
    pub fn drain_flush_queue(&mut self) {
        while let Some(segment_id) = self.bucket_flush_queue.pop_front() {
            if self.open_buckets.contains_key(&segment_id) {
                let channel_index = segment_id as usize % self.memory_managers.len();
                self.flush_bucket(segment_id, channel_index);
            }
        }
    }

    /// Advances admission control and retires segments whose conditions are
    /// fully met, queuing their children's `parent_finished` flag and flush.
    pub fn update_scheduler(&mut self, headers: &impl Fn(u32) -> TreeletHeader) {
        self.scheduler.step(headers);

        let mut retired = Vec::new();
        for &segment in &self.scheduler.active_segments {
            if let Some(state) = self.scheduler.segment_states.get(&segment) {
                if state.is_retirable() {
                    retired.push(segment);
                }
            }
        }
        for segment in retired {
            self.scheduler.active_segments.retain(|&s| s != segment);
            let header = headers(segment);
            for i in 0..header.num_children {
                let child = header.first_child + i;
                let child_state = self.scheduler.segment_states.entry(child).or_default();
                child_state.parent_finished = true;
                self.bucket_flush_queue.push_back(child);
            }
            let total_buckets = self.scheduler.segment_states.get(&segment).map(|s| s.total_buckets).unwrap_or(0);
            if total_buckets == 1 {
                self.log.single_bucket_segments += 1;
            }
            self.log.segments_launched += 1;
            self.scheduler.segment_states.remove(&segment);
        }
        self.drain_flush_queue();
    }

    /// Services one pending bucket-load request, assigning the
    /// highest-priority ready segment to the requesting thread-module and
    /// queuing a channel read.
    pub fn service_bucket_requests(&mut self) {
        let Some(tm_index) = self.bucket_request_queue.pop_front() else {
            return;
        };
        let last = self.last_segment_on_tm[tm_index as usize];
        let Some(segment) = self.scheduler.pick_segment_for_tm(tm_index, last) else {
            self.bucket_request_queue.push_back(tm_index);
            return;
        };
        if last != Some(segment) {
            if let Some(prev) = last {
                if let Some(s) = self.scheduler.segment_states.get_mut(&prev) {
                    s.num_tms = s.num_tms.saturating_sub(1);
                }
            }
            self.last_segment_on_tm[tm_index as usize] = Some(segment);
            if let Some(s) = self.scheduler.segment_states.get_mut(&segment) {
                s.num_tms += 1;
            }
        }
        let state = self.scheduler.segment_states.get_mut(&segment).unwrap();
        let address = state.bucket_address_queue.pop_front().unwrap();
        let channel_index = self.memory_managers[0].channel_of(address) as usize;
        self.channels[channel_index]
            .work_queue
            .push_back(ChannelWorkItem::ReadBucket { address, dst_tm: tm_index });
        self.log.buckets_launched += 1;
    }

    /// Pops one channel's next work item, handing the bucket bytes/address
    /// to the caller to actually move through DRAM (this coalescer owns
    /// bucket scheduling, not the DRAM transfer itself — that belongs to
    /// [`crate::memory::dram::DramController`]). The caller drives a
    /// `ReadBucket` through to completion via [`Self::deliver`], and may
    /// return the address to the free-stack via [`Self::free_bucket`] once
    /// the read completes.
    pub fn drain_channel(&mut self, channel_index: usize) -> Option<ChannelWorkItem> {
        self.channels[channel_index].work_queue.pop_front()
    }

    /// Returns a drained bucket's DRAM address to channel `channel_index`'s
    /// free-stack for reuse once its contents have been fully read back.
    pub fn free_bucket(&mut self, channel_index: usize, address: u64) {
        self.memory_managers[channel_index].free_bucket(address);
    }

    /// Delivers a decoded bucket's ray ids to its requesting thread-module.
    pub fn deliver(&mut self, tm_index: u32, segment_id: u32, ray_ids: Vec<u32>) {
        self.delivered_out.push_back(DeliveredBucket {
            tm_index,
            segment_id,
            ray_ids,
        });
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.scheduler.is_complete()
    }
}
