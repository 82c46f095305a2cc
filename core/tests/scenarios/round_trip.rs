//! A single ray, a one-node BVH, one triangle: the shortest path through
//! `RtCore`'s fetch → node-isect → tri-isect → retire pipeline.

use arches_core::common::request::{RequestKind, SchedulerRequestKind};
use arches_core::rt::{Aabb, Node, NodeData, Ray, RtCore};

use crate::common::builders::{encode_ray, encode_triangle};
use crate::common::memory_model::FlatMemory;

const RAY_STATE_BASE: u64 = 1 << 20;
const HIT_BASE: u64 = 1 << 24;
const WIDTH: usize = 6;
const BLOCK_SIZE: u64 = 64;

/// Builds a width-6 node whose only occupied slot is a leaf spanning one
/// triangle, with an AABB wide enough to contain it.
fn leaf_node(triangle_index: u32) -> Node {
    let mut aabbs = vec![Aabb::default(); WIDTH];
    let mut data = vec![NodeData::Empty; WIDTH];
    aabbs[0] = Aabb {
        min: [-2.0, -2.0, -2.0],
        max: [2.0, 2.0, 2.0],
    };
    data[0] = NodeData::Leaf {
        triangle_index,
        num_tri: 1,
    };
    Node { aabbs, data }
}

/// Runs `core` to completion against `memory`, forwarding loads and
/// recording the `CommitShadeHit` store (if any). Returns that store's
/// payload bytes, along with the `BucketComplete` notification proving
/// the RT-core reported the bucket drained.
fn drive_to_completion(core: &mut RtCore, memory: &FlatMemory, max_cycles: u64) -> (Option<[u8; 16]>, bool) {
    let mut commit = None;
    let mut bucket_complete = false;
    for cycle in 0..max_cycles {
        core.clock_rise(cycle);
        core.clock_fall(cycle);

        while let Some(req) = core.miss_out.pop_front() {
            if req.kind == RequestKind::CommitShadeHit {
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(req.payload());
                commit = Some(bytes);
            } else {
                let ret = memory.serve(&req);
                core.accept_return(&ret);
            }
        }
        while let Some(req) = core.scheduler_request_out.pop_front() {
            if req.kind == SchedulerRequestKind::BucketComplete {
                bucket_complete = true;
            }
        }
        if commit.is_some() && bucket_complete {
            break;
        }
    }
    (commit, bucket_complete)
}

#[test]
fn single_ray_hits_a_one_node_triangle() {
    let mut memory = FlatMemory::new();

    // Node occupies [0, node_bytes); node_bytes = 6*24 + 6*4 = 168.
    let node = leaf_node(5); // triangle offset 5 -> byte 200, clear of the node.
    memory.write(0, &node.encode());
    let tri = encode_triangle([-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 1.0, 0.0], 42);
    memory.write(5 * 40, &tri);

    let ray = Ray {
        origin: [0.0, 0.0, -5.0],
        dir: [0.0, 0.0, 1.0],
        t_min: 0.0,
        t_max: 1000.0,
    };
    memory.write(RAY_STATE_BASE, &encode_ray(&ray));

    let mut core = RtCore::new(0, 4, WIDTH, 0, RAY_STATE_BASE, HIT_BASE, BLOCK_SIZE);
    core.admit_bucket(0, &[0]);

    let (commit, bucket_complete) = drive_to_completion(&mut core, &memory, 200);

    let commit = commit.expect("a hit should commit a shade-hit store");
    assert!(bucket_complete, "the bucket should be reported complete once the ray retires");

    let t = f32::from_le_bytes(commit[0..4].try_into().unwrap());
    let id = u32::from_le_bytes(commit[12..16].try_into().unwrap());
    assert!((t - 5.0).abs() < 1e-3, "hit distance should be ~5.0, got {t}");
    assert_eq!(id, 42);

    assert_eq!(core.log.rays, 1);
    assert_eq!(core.log.hits, 1);
    assert!(core.log.nodes >= 1);
    assert!(core.log.tris >= 1);
}
