//! Warms a cache's tag array, round-trips it through an actual file on
//! disk, and rehydrates the data array from a backing DRAM store the way
//! a simulation run resumed from a checkpoint would.

use std::fs::File;
use std::io::{Seek, SeekFrom};

use arches_core::config::ReplacementPolicy as ReplacementPolicyConfig;
use arches_core::memory::{CacheBase, DramBacking};

const BLOCK_SIZE: usize = 64;

#[test]
fn tag_array_survives_a_round_trip_through_a_file_and_rehydrates_from_dram() {
    let dir = tempfile::tempdir().expect("should create a scratch directory");
    let path = dir.path().join("cache.snapshot");

    let mut backing = DramBacking::default();
    backing.write(0, &[11u8; BLOCK_SIZE]);
    backing.write(4 * BLOCK_SIZE as u64, &[22u8; BLOCK_SIZE]);

    let mut cache = CacheBase::new(1024, BLOCK_SIZE, 4, BLOCK_SIZE, ReplacementPolicyConfig::Lru);
    cache.allocate_block(0);
    cache.write_sector(0, &[11u8; BLOCK_SIZE], true);
    cache.allocate_block(4 * BLOCK_SIZE as u64);
    cache.write_sector(4 * BLOCK_SIZE as u64, &[22u8; BLOCK_SIZE], true);

    {
        let mut file = File::create(&path).expect("should open snapshot file for write");
        cache.serialize(&mut file).expect("serialize should succeed");
    }

    let mut restored = CacheBase::new(1024, BLOCK_SIZE, 4, BLOCK_SIZE, ReplacementPolicyConfig::Lru);
    {
        let mut file = File::open(&path).expect("should reopen the snapshot file");
        restored
            .deserialize(&mut file, |addr, out| {
                let block = backing.read(addr, out.len());
                out.copy_from_slice(&block);
            })
            .expect("deserialize should succeed");
    }

    assert_eq!(restored.read_sector(0).unwrap()[..4], [11, 11, 11, 11]);
    assert_eq!(restored.read_sector(4 * BLOCK_SIZE as u64).unwrap()[..4], [22, 22, 22, 22]);

    // A snapshot taken before any writes round-trips to an empty tag array.
    let cold = CacheBase::new(1024, BLOCK_SIZE, 4, BLOCK_SIZE, ReplacementPolicyConfig::Lru);
    let mut cold_buf = Vec::new();
    cold.serialize(&mut cold_buf).unwrap();
    let warm_len = {
        let mut file = File::open(&path).unwrap();
        file.seek(SeekFrom::End(0)).unwrap();
        file.stream_position().unwrap()
    };
    assert_eq!(cold_buf.len() as u64, warm_len, "snapshot size depends only on set/way count, not on occupancy");
}
