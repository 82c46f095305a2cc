//! A ray whose root node has no occupied child slots: every traversal
//! path dead-ends on the first pop, with no hit and no node/triangle
//! fetch beyond the root.

use arches_core::common::request::SchedulerRequestKind;
use arches_core::rt::{Aabb, Node, NodeData, Ray, RtCore};

use crate::common::builders::encode_ray;
use crate::common::memory_model::FlatMemory;

const RAY_STATE_BASE: u64 = 1 << 20;
const HIT_BASE: u64 = 1 << 24;
const WIDTH: usize = 6;

#[test]
fn ray_against_an_empty_root_node_retires_with_no_hit() {
    let mut memory = FlatMemory::new();

    let empty_node = Node {
        aabbs: vec![Aabb::default(); WIDTH],
        data: vec![NodeData::Empty; WIDTH],
    };
    memory.write(0, &empty_node.encode());

    let ray = Ray {
        origin: [0.0, 0.0, -5.0],
        dir: [0.0, 0.0, 1.0],
        t_min: 0.0,
        t_max: 1000.0,
    };
    memory.write(RAY_STATE_BASE, &encode_ray(&ray));

    let mut core = RtCore::new(0, 4, WIDTH, 0, RAY_STATE_BASE, HIT_BASE, 64);
    core.admit_bucket(0, &[0]);

    let mut bucket_complete = false;
    for cycle in 0..100 {
        core.clock_rise(cycle);
        core.clock_fall(cycle);
        while let Some(req) = core.miss_out.pop_front() {
            let ret = memory.serve(&req);
            core.accept_return(&ret);
        }
        while let Some(req) = core.scheduler_request_out.pop_front() {
            if req.kind == SchedulerRequestKind::BucketComplete {
                bucket_complete = true;
            }
        }
        if bucket_complete {
            break;
        }
    }

    assert!(bucket_complete, "the empty-scene ray should still retire and report its bucket complete");
    assert_eq!(core.log.rays, 1);
    assert_eq!(core.log.hits, 0, "an all-empty node should never produce a hit");
    assert!(core.log.nodes >= 1, "the root node should still have been fetched and intersected once");
}
