//! Drives a line-fill-buffer-backed cache through a full write-combining
//! cycle: scattered partial stores to one block coalesce into a single
//! full-block store with the exact bytes each partial write contributed,
//! and the combined line does not linger once issued.

use arches_core::common::addr::PhysAddr;
use arches_core::common::request::{MemoryRequest, RequestKind};
use arches_core::config::{CacheConfig, ReplacementPolicy};
use arches_core::memory::non_blocking_cache::{NonBlockingCache, RequestOutcome};

const BLOCK_SIZE: usize = 64;

fn write_combining_cache() -> NonBlockingCache {
    let cfg = CacheConfig {
        size_bytes: 4096,
        associativity: 4,
        sector_size: None,
        latency: 1,
        num_banks: 1,
        num_mshr: 4,
        use_lfb: true,
        policy: ReplacementPolicy::Lru,
        in_order: false,
    };
    NonBlockingCache::new(&cfg, BLOCK_SIZE, 0)
}

#[test]
fn scattered_partial_stores_coalesce_into_one_exact_block_write() {
    let mut cache = write_combining_cache();

    // Every 4-byte lane of the block gets its own distinct content, written
    // out of natural order to rule out an implementation that only
    // combines sequential writes correctly.
    let mut expected = [0u8; BLOCK_SIZE];
    let lanes: Vec<usize> = (0..BLOCK_SIZE / 4).rev().collect();
    for &lane in &lanes {
        let offset = lane * 4;
        let payload = [(lane as u8), (lane as u8).wrapping_add(1), (lane as u8).wrapping_add(2), (lane as u8).wrapping_add(3)];
        expected[offset..offset + 4].copy_from_slice(&payload);
        let req = MemoryRequest::store(PhysAddr::new(offset as u64), &payload, 0);
        let outcome = cache.process_request(req, 0);
        let is_last = lane == *lanes.last().unwrap();
        if is_last {
            assert_eq!(outcome, RequestOutcome::Hit, "the write combining line fill buffer should report full once every lane has landed");
        } else {
            assert_eq!(outcome, RequestOutcome::HalfMiss, "a not-yet-full combining buffer should report a half miss");
        }
    }

    cache.issue_misses();
    assert_eq!(cache.miss_out.len(), 1, "a fully combined line should issue exactly one forwarded store");
    let issued = cache.miss_out.pop_front().unwrap();
    assert_eq!(issued.kind, RequestKind::Store);
    assert_eq!(issued.size, BLOCK_SIZE as u8);
    assert_eq!(issued.payload(), &expected[..]);

    // Once issued, the combining buffer must not linger: a second full pass
    // over the same block is an entirely independent combine.
    for &lane in &lanes {
        let offset = lane * 4;
        let req = MemoryRequest::store(PhysAddr::new(offset as u64), &[9, 9, 9, 9], 0);
        cache.process_request(req, 1);
    }
    cache.issue_misses();
    assert_eq!(cache.miss_out.len(), 1, "the retired line-fill buffer should accept a fresh combine for the same block");
}
