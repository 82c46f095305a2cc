//! The ray-traversal engine: a fixed-function per-ray state machine that
//! walks a BVH by alternating node-fetch / intersection / stack-push phases
//!.

use crate::common::addr::PhysAddr;
use crate::common::request::{
    MemoryRequest, MemoryReturn, RequestKind, SchedulerRequestKind, SchedulerRequestPayload,
    StreamSchedulerRequest, WorkItem as WireWorkItem,
};
use crate::interconnect::Pipeline;
use crate::rt::ray::{Hit, NodeStackEntry, Phase, Ray, RayState, WorkItem};
use crate::rt::treelet::{intersect_triangle, Node, NodeData, Triangle};
use std::collections::{HashMap, VecDeque};

const NODE_ISECT_LATENCY: u32 = 3;
const TRI_ISECT_LATENCY: u32 = 22;
const TRIANGLE_WIRE_SIZE: usize = 40;

/// Per-treelet bookkeeping an RT-core keeps to know when every ray it
/// admitted for a segment has retired, so it can notify the coalescer that
/// a bucket finished draining.
#[derive(Clone, Copy, Debug, Default)]
struct LocalSegmentState {
    rays: u32,
    buckets: u32,
}

/// Staging area accumulating a multi-beat cache fill before the RT-core can
/// decode the item it describes.
#[derive(Clone, Debug, Default)]
struct StagingBuffer {
    /// Address the fetch started at, used to locate a return's offset
    /// within this buffer.
    start: u64,
    bytes_filled: usize,
    data: Vec<u8>,
    expected: usize,
    num_tris: u32,
}

/// Wire size, in bytes, of a committed hit record (`t`, barycentrics, id).
const HIT_RECORD_SIZE: usize = 16;

/// Per-RT-core traversal counters.
#[derive(Clone, Debug, Default)]
pub struct RtCoreLog {
    pub rays: u64,
    pub nodes: u64,
    pub tris: u64,
    pub hits: u64,
    pub stall_cycles: u64,
}

/// Fixed-function traversal core: `max_rays` concurrently in-flight ray
/// slots, a node-intersect pipeline (latency 3) and a triangle-intersect
/// pipeline (latency 22), each slot driven by the [`Phase`] state machine.
pub struct RtCore {
    index: u32,
    width: usize,
    node_bytes: usize,
    treelet_base_addr: u64,
    ray_state_base_addr: u64,
    hit_base_addr: u64,
    block_size: u64,

    slots: Vec<Option<RayState>>,
    free_slots: VecDeque<usize>,
    node_fetch: HashMap<usize, StagingBuffer>,
    tri_fetch: HashMap<usize, StagingBuffer>,
    pending_nodes: HashMap<usize, Node>,
    ray_fetch_pending: HashMap<usize, StagingBuffer>,

    ray_scheduling_queue: VecDeque<usize>,
    node_isect_queue: VecDeque<usize>,
    tri_isect_queue: VecDeque<usize>,
    node_pipeline: Pipeline<usize>,
    tri_pipeline: Pipeline<usize>,

    cache_fetch_queue: VecDeque<MemoryRequest>,
    pub miss_out: VecDeque<MemoryRequest>,
    pub response_out: VecDeque<MemoryReturn>,

    work_item_return_queue: VecDeque<WorkItem>,
    work_item_store_queue: VecDeque<WorkItem>,
    pub scheduler_request_out: VecDeque<StreamSchedulerRequest>,
    completed_buckets: VecDeque<u32>,
    segment_states: HashMap<u32, LocalSegmentState>,

    pub log: RtCoreLog,
}

impl RtCore {
    /// Creates a core with `max_rays` traversal slots, node width `width`
    /// (6 or 8), and the treelet/ray-state/hit-record base
    /// addresses used to resolve node, ray-geometry, and hit-commit
    /// transfers.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: u32,
        max_rays: usize,
        width: usize,
        treelet_base_addr: u64,
        ray_state_base_addr: u64,
        hit_base_addr: u64,
        block_size: u64,
    ) -> Self {
        Self {
            index,
            width,
            node_bytes: width * 24 + width * 4,
            treelet_base_addr,
            ray_state_base_addr,
            hit_base_addr,
            block_size,
            slots: (0..max_rays).map(|_| None).collect(),
            free_slots: (0..max_rays).collect(),
            node_fetch: HashMap::new(),
            tri_fetch: HashMap::new(),
            pending_nodes: HashMap::new(),
            ray_fetch_pending: HashMap::new(),
            ray_scheduling_queue: VecDeque::new(),
            node_isect_queue: VecDeque::new(),
            tri_isect_queue: VecDeque::new(),
            node_pipeline: Pipeline::new(NODE_ISECT_LATENCY),
            tri_pipeline: Pipeline::new(TRI_ISECT_LATENCY),
            cache_fetch_queue: VecDeque::new(),
            miss_out: VecDeque::new(),
            response_out: VecDeque::new(),
            work_item_return_queue: VecDeque::new(),
            work_item_store_queue: VecDeque::new(),
            scheduler_request_out: VecDeque::new(),
            completed_buckets: VecDeque::new(),
            segment_states: HashMap::new(),
            log: RtCoreLog::default(),
        }
    }

    fn slot_mut(&mut self, slot: usize) -> &mut RayState {
        self.slots[slot].as_mut().expect("ray slot must be occupied")
    }

    fn block_address(&self, addr: u64) -> u64 {
        PhysAddr::new(addr).block_addr(self.block_size)
    }

    /// Admits a bucket's ray ids for draining, associating them with
    /// `segment_id`; called when the coalescer delivers a loaded bucket.
    pub fn admit_bucket(&mut self, segment_id: u32, ray_ids: &[u32]) {
        let state = self.segment_states.entry(segment_id).or_default();
        state.buckets += 1;
        state.rays += ray_ids.len() as u32;
        for &ray_id in ray_ids {
            self.work_item_return_queue.push_back(WorkItem {
                ray_id,
                segment_id,
                order_hint: 0,
            });
        }
    }

    fn try_init_ray(&mut self) {
        if self.free_slots.is_empty() || self.work_item_return_queue.is_empty() {
            return;
        }
        let item = self.work_item_return_queue.pop_front().unwrap();
        let slot = self.free_slots.pop_front().unwrap();
        self.slots[slot] = Some(RayState::from_work_item(item));
        let addr = self.ray_state_base_addr + u64::from(item.ray_id) * 32;
        self.ray_fetch_pending.insert(
            slot,
            StagingBuffer {
                start: addr,
                bytes_filled: 0,
                data: vec![0u8; 32],
                expected: 32,
                num_tris: 0,
            },
        );
        self.split_fetch(addr, 32, slot as u32);
        self.log.rays += 1;
    }

    /// Called when a ray-geometry fetch return arrives for `slot`.
    pub fn on_ray_return(&mut self, slot: usize, offset: usize, data: &[u8]) {
        let Some(buf) = self.ray_fetch_pending.get_mut(&slot) else {
            return;
        };
        buf.data[offset..offset + data.len()].copy_from_slice(data);
        buf.bytes_filled += data.len();
        if buf.bytes_filled != buf.expected {
            return;
        }
        let buf = self.ray_fetch_pending.remove(&slot).unwrap();
        let read_f32 = |off: usize| f32::from_le_bytes(buf.data[off..off + 4].try_into().unwrap());
        let ray = Ray {
            origin: [read_f32(0), read_f32(4), read_f32(8)],
            dir: [read_f32(12), read_f32(16), read_f32(20)],
            t_min: read_f32(24),
            t_max: read_f32(28),
        };
        let state = self.slot_mut(slot);
        state.ray = ray;
        state.hit = Hit::miss(ray.t_max);
        state.phase = Phase::Scheduler;
        self.ray_scheduling_queue.push_back(slot);
    }

    fn try_queue_node(&mut self, slot: usize, node_index: u32) {
        let start = self.treelet_base_addr + u64::from(node_index) * self.node_bytes as u64;
        let node_bytes = self.node_bytes;
        self.node_fetch.insert(
            slot,
            StagingBuffer {
                start,
                bytes_filled: 0,
                data: vec![0u8; node_bytes],
                expected: node_bytes,
                num_tris: 0,
            },
        );
        self.split_fetch(start, node_bytes as u64, slot as u32);
        self.slot_mut(slot).phase = Phase::NodeFetch;
    }

    fn try_queue_tri(&mut self, slot: usize, tri_offset: u32, num_tris: u32) {
        let tri_bytes = num_tris as usize * TRIANGLE_WIRE_SIZE;
        let start = self.treelet_base_addr + u64::from(tri_offset) * TRIANGLE_WIRE_SIZE as u64;
        self.tri_fetch.insert(
            slot,
            StagingBuffer {
                start,
                bytes_filled: 0,
                data: vec![0u8; tri_bytes],
                expected: tri_bytes,
                num_tris,
            },
        );
        self.split_fetch(start, tri_bytes as u64, slot as u32);
        self.slot_mut(slot).phase = Phase::TriFetch;
    }

    fn split_fetch(&mut self, start: u64, len: u64, tag: u32) {
        let mut addr = start;
        let end = start + len;
        while addr < end {
            let next_boundary = (self.block_address(addr) + self.block_size).min(end);
            let size = (next_boundary - addr) as u8;
            self.cache_fetch_queue
                .push_back(MemoryRequest::read(RequestKind::Load, PhysAddr::new(addr), size, tag));
            addr += u64::from(size);
        }
    }

    /// Called when a node-fetch cache return arrives for `slot`.
    pub fn on_node_return(&mut self, slot: usize, offset: usize, data: &[u8]) {
        let Some(buf) = self.node_fetch.get_mut(&slot) else {
            return;
        };
        buf.data[offset..offset + data.len()].copy_from_slice(data);
        buf.bytes_filled += data.len();
        if buf.bytes_filled == buf.expected {
            let buf = self.node_fetch.remove(&slot).unwrap();
            let node = Node::decode(&buf.data, self.width);
            self.pending_nodes.insert(slot, node);
            self.node_isect_queue.push_back(slot);
        }
    }

    /// Called when a triangle-fetch cache return arrives for `slot`.
    pub fn on_tri_return(&mut self, slot: usize, offset: usize, data: &[u8]) {
        let Some(buf) = self.tri_fetch.get_mut(&slot) else {
            return;
        };
        buf.data[offset..offset + data.len()].copy_from_slice(data);
        buf.bytes_filled += data.len();
        if buf.bytes_filled == buf.expected {
            self.tri_isect_queue.push_back(slot);
        }
    }

    /// Dispatches a completed cache return to whichever staging buffer
    /// `ret`'s slot (carried in `ret.port`) and address identify: the
    /// ray-geometry fetch, the node fetch, or the triangle fetch, in that
    /// order of precedence (a slot has at most one outstanding fetch kind
    /// at a time, so the lookup never matches more than one).
    pub fn accept_return(&mut self, ret: &MemoryReturn) {
        let slot = ret.port as usize;
        let addr = ret.paddr.val();
        if let Some(buf) = self.ray_fetch_pending.get(&slot) {
            let offset = (addr - buf.start) as usize;
            self.on_ray_return(slot, offset, ret.payload());
        } else if let Some(buf) = self.node_fetch.get(&slot) {
            let offset = (addr - buf.start) as usize;
            self.on_node_return(slot, offset, ret.payload());
        } else if let Some(buf) = self.tri_fetch.get(&slot) {
            let offset = (addr - buf.start) as usize;
            self.on_tri_return(slot, offset, ret.payload());
        }
    }

    fn schedule_one_ray(&mut self) {
        let Some(slot) = self.ray_scheduling_queue.pop_front() else {
            self.log.stall_cycles += 1;
            return;
        };
        let entry = self.slot_mut(slot).nstack.last().copied();
        let Some(NodeStackEntry { t, data }) = entry else {
            self.retire_ray(slot);
            return;
        };
        if t >= self.slot_mut(slot).hit.t {
            // pop-cull: closer hit already found, discard the entry and try the next cycle.
            self.slot_mut(slot).nstack.pop();
            self.ray_scheduling_queue.push_front(slot);
            return;
        }
        self.slot_mut(slot).nstack.pop();
        match data {
            NodeData::Empty => {
                self.ray_scheduling_queue.push_front(slot);
            }
            NodeData::ChildTreelet { segment_id } => {
                let state = self.slot_mut(slot);
                let order_hint = state.order_hint;
                state.order_hint = state.order_hint.saturating_add(1);
                let global_ray_id = state.global_ray_id;
                self.work_item_store_queue.push_back(WorkItem {
                    ray_id: global_ray_id,
                    segment_id,
                    order_hint,
                });
                self.ray_scheduling_queue.push_front(slot);
            }
            NodeData::Interior { child_index } => {
                self.try_queue_node(slot, child_index);
            }
            NodeData::Leaf {
                triangle_index,
                num_tri,
            } => {
                self.try_queue_tri(slot, triangle_index, num_tri);
            }
        }
    }

    fn retire_ray(&mut self, slot: usize) {
        let state = self.slots[slot].as_ref().unwrap();
        if state.hit_found {
            self.log.hits += 1;
            let mut bytes = [0u8; HIT_RECORD_SIZE];
            bytes[0..4].copy_from_slice(&state.hit.t.to_le_bytes());
            bytes[4..8].copy_from_slice(&state.hit.bc[0].to_le_bytes());
            bytes[8..12].copy_from_slice(&state.hit.bc[1].to_le_bytes());
            bytes[12..16].copy_from_slice(&state.hit.id.to_le_bytes());
            let addr = self.hit_base_addr + u64::from(state.global_ray_id) * HIT_RECORD_SIZE as u64;
            let mut req = MemoryRequest::store(PhysAddr::new(addr), &bytes, slot as u32);
            req.kind = RequestKind::CommitShadeHit;
            self.cache_fetch_queue.push_back(req);
        }
        let treelet_id = state.treelet_id;
        if let Some(seg) = self.segment_states.get_mut(&treelet_id) {
            seg.rays -= 1;
            if seg.rays == 0 {
                for _ in 0..seg.buckets {
                    self.completed_buckets.push_back(treelet_id);
                }
                self.segment_states.remove(&treelet_id);
            }
        }
        self.slots[slot] = None;
        self.free_slots.push_back(slot);
    }

    fn clock_node_pipeline(&mut self) {
        if let Some(&slot) = self.node_isect_queue.front() {
            if let Some(node) = self.pending_nodes.remove(&slot) {
                self.node_isect_queue.pop_front();
                let width = node.aabbs.len();
                let insert_floor = self.slot_mut(slot).nstack.len();
                let (origin, inv_d, t_min, hit_t) = {
                    let state = self.slot_mut(slot);
                    (state.ray.origin, state.ray.inv_dir(), state.ray.t_min, state.hit.t)
                };
                for i in 0..width {
                    if matches!(node.data[i], NodeData::Empty) {
                        continue;
                    }
                    let t = node.aabbs[i].intersect(origin, inv_d, t_min, hit_t);
                    if t.is_finite() {
                        self.slot_mut(slot).insert_child(t, node.data[i], insert_floor);
                    }
                }
                self.node_pipeline.write(slot);
            }
        }
        for slot in self.node_pipeline.clock() {
            self.slot_mut(slot).phase = Phase::Scheduler;
            self.ray_scheduling_queue.push_back(slot);
            self.log.nodes += 1;
        }
    }

    fn clock_tri_pipeline(&mut self) {
        if let Some(&slot) = self.tri_isect_queue.front() {
            if let Some(buf) = self.tri_fetch.remove(&slot) {
                self.tri_isect_queue.pop_front();
                let (origin, dir) = {
                    let state = self.slot_mut(slot);
                    (state.ray.origin, state.ray.dir)
                };
                let mut hit = self.slot_mut(slot).hit;
                for i in 0..buf.num_tris as usize {
                    let base = i * TRIANGLE_WIRE_SIZE;
                    let tri = decode_triangle(&buf.data[base..base + TRIANGLE_WIRE_SIZE]);
                    if let Some((t, u, v)) = intersect_triangle(&tri, origin, dir, hit.t) {
                        hit.t = t;
                        hit.bc = [u, v];
                        hit.id = tri.id;
                        self.slot_mut(slot).hit_found = true;
                    }
                }
                self.slot_mut(slot).hit = hit;
                self.tri_pipeline.write(slot);
            }
        }
        for slot in self.tri_pipeline.clock() {
            self.slot_mut(slot).phase = Phase::Scheduler;
            self.ray_scheduling_queue.push_back(slot);
            self.log.tris += 1;
        }
    }

    /// Rising-edge behavior: admit new rays, schedule one ray pop, advance
    /// both intersection pipelines.
    pub fn clock_rise(&mut self, _cycle: u64) {
        self.try_init_ray();
        self.schedule_one_ray();
        self.clock_node_pipeline();
        self.clock_tri_pipeline();
    }

    /// Falling-edge behavior: drain the cache-fetch queue and coalescer
    /// request queues into their respective output queues.
    pub fn clock_fall(&mut self, _cycle: u64) {
        if let Some(req) = self.cache_fetch_queue.pop_front() {
            self.miss_out.push_back(req);
        }
        if let Some(item) = self.work_item_store_queue.pop_front() {
            self.scheduler_request_out.push_back(StreamSchedulerRequest {
                kind: SchedulerRequestKind::StoreWorkItem,
                tm_index: self.index,
                payload: SchedulerRequestPayload::WorkItem(WireWorkItem {
                    ray_id: item.ray_id,
                    segment_id: item.segment_id,
                    order_hint: item.order_hint,
                }),
            });
        } else if let Some(segment_id) = self.completed_buckets.pop_front() {
            self.scheduler_request_out.push_back(StreamSchedulerRequest {
                kind: SchedulerRequestKind::BucketComplete,
                tm_index: self.index,
                payload: SchedulerRequestPayload::SegmentId(segment_id),
            });
        }
    }
}

fn decode_triangle(bytes: &[u8]) -> Triangle {
    let read = |off: usize| f32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
    Triangle {
        v0: [read(0), read(4), read(8)],
        v1: [read(12), read(16), read(20)],
        v2: [read(24), read(28), read(32)],
        id: u32::from_le_bytes(bytes[36..40].try_into().unwrap()),
    }
}
