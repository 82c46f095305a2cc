//! Tag/data array storage shared by every cache level.
//!
//! Grounded on the original hardware model's `UnitCacheBase`: a set-
//! associative tag array of [`BlockMetaData`] plus a flat data array,
//! address decomposition by block size and set count, and serialize/
//! deserialize for warming a cache from the DRAM model before timing a run.

use crate::common::data::BlockMetaData;
use crate::config::ReplacementPolicy as ReplacementPolicyConfig;
use crate::memory::cache_policies::{LruPolicy, RandomPolicy, ReplacementPolicy};

/// A replaced block evicted by [`CacheBase::allocate_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Victim {
    /// Physical block address of the evicted line.
    pub addr: u64,
    /// The evicted line's bytes.
    pub data: Vec<u8>,
    /// Per-sector dirty bitmap at eviction time.
    pub dirty: u32,
    /// Per-sector valid bitmap at eviction time.
    pub valid: u32,
}

enum Policy {
    Lru(LruPolicy),
    Random(RandomPolicy),
}

impl Policy {
    fn update(&mut self, set: usize, way: usize) {
        match self {
            Self::Lru(p) => p.update(set, way),
            Self::Random(p) => p.update(set, way),
        }
    }

    fn get_victim(&mut self, set: usize) -> usize {
        match self {
            Self::Lru(p) => p.get_victim(set),
            Self::Random(p) => p.get_victim(set),
        }
    }
}

/// Set-associative tag/data array storage.
pub struct CacheBase {
    sets: usize,
    associativity: usize,
    block_size: usize,
    sector_size: usize,
    sectors_per_block: u32,
    tag_array: Vec<BlockMetaData>,
    data_array: Vec<u8>,
    policy: Policy,
}

impl CacheBase {
    /// Creates a new cache base of `size` bytes, `block_size`-byte lines,
    /// `associativity` ways, and the given `sector_size` (pass `block_size`
    /// for an unsectored cache).
    #[must_use]
    pub fn new(
        size: usize,
        block_size: usize,
        associativity: usize,
        sector_size: usize,
        policy: ReplacementPolicyConfig,
    ) -> Self {
        let sets = size / (block_size * associativity);
        let policy = match policy {
            ReplacementPolicyConfig::Lru => Policy::Lru(LruPolicy::new(sets, associativity)),
            ReplacementPolicyConfig::Random => {
                Policy::Random(RandomPolicy::new(sets, associativity))
            }
        };
        Self {
            sets,
            associativity,
            block_size,
            sector_size,
            sectors_per_block: (block_size / sector_size) as u32,
            tag_array: vec![BlockMetaData::EMPTY; sets * associativity],
            data_array: vec![0u8; sets * associativity * block_size],
            policy,
        }
    }

    fn set_index(&self, block_addr: u64) -> usize {
        ((block_addr / self.block_size as u64) % self.sets as u64) as usize
    }

    fn tag(&self, block_addr: u64) -> u64 {
        block_addr / self.block_size as u64 / self.sets as u64
    }

    fn block_addr_for(&self, tag: u64, set: usize) -> u64 {
        tag * self.block_size as u64 * self.sets as u64 + set as u64 * self.block_size as u64
    }

    fn find_way(&self, set: usize, tag: u64) -> Option<usize> {
        (0..self.associativity).find(|&way| {
            let meta = self.tag_array[set * self.associativity + way];
            meta.any_valid() && meta.tag == tag
        })
    }

    /// Searches the set containing `sector_addr` for a matching tag with
    /// the sector's valid bit set. On hit, updates the replacement policy
    /// and returns the sector's bytes; on miss, returns `None`.
    pub fn read_sector(&mut self, sector_addr: u64) -> Option<&[u8]> {
        let block_addr = self.block_addr_of_sector(sector_addr);
        let set = self.set_index(block_addr);
        let tag = self.tag(block_addr);
        let way = self.find_way(set, tag)?;
        let sector_index = self.sector_index(sector_addr);
        let meta = self.tag_array[set * self.associativity + way];
        if !meta.sector_valid(sector_index) {
            return None;
        }
        self.policy.update(set, way);
        let block_off = way_offset(set, way, self.associativity, self.block_size);
        let sector_off = block_off + (sector_index as usize) * self.sector_size;
        Some(&self.data_array[sector_off..sector_off + self.sector_size])
    }

    /// Finds the matching tag for `sector_addr` and writes `data` into that
    /// sector, marking it valid and (optionally) dirty.
    ///
    /// Returns `false` if no matching tag is resident (caller must
    /// `allocate_block` first).
    pub fn write_sector(&mut self, sector_addr: u64, data: &[u8], set_dirty: bool) -> bool {
        let block_addr = self.block_addr_of_sector(sector_addr);
        let set = self.set_index(block_addr);
        let tag = self.tag(block_addr);
        let Some(way) = self.find_way(set, tag) else {
            return false;
        };
        let sector_index = self.sector_index(sector_addr);
        let idx = set * self.associativity + way;
        self.tag_array[idx].valid |= 1 << sector_index;
        if set_dirty {
            self.tag_array[idx].dirty |= 1 << sector_index;
        }
        let block_off = way_offset(set, way, self.associativity, self.block_size);
        let sector_off = block_off + (sector_index as usize) * self.sector_size;
        self.data_array[sector_off..sector_off + data.len()].copy_from_slice(data);
        self.policy.update(set, way);
        true
    }

    /// If `block_addr` is already present, refreshes its LRU state and
    /// returns `None` (no victim). Otherwise selects a replacement way via
    /// the configured policy, evicts it (returning a [`Victim`] if it held
    /// valid data), and installs fresh (all-invalid) metadata for the new
    /// tag.
    pub fn allocate_block(&mut self, block_addr: u64) -> Option<Victim> {
        let set = self.set_index(block_addr);
        let tag = self.tag(block_addr);
        if let Some(way) = self.find_way(set, tag) {
            self.policy.update(set, way);
            return None;
        }
        let way = self.policy.get_victim(set);
        let idx = set * self.associativity + way;
        let old = self.tag_array[idx];
        let block_off = way_offset(set, way, self.associativity, self.block_size);
        let victim = old.any_valid().then(|| Victim {
            addr: self.block_addr_for(old.tag, set),
            data: self.data_array[block_off..block_off + self.block_size].to_vec(),
            dirty: old.dirty,
            valid: old.valid,
        });
        self.tag_array[idx] = BlockMetaData {
            tag,
            lru: 0,
            dirty: 0,
            valid: 0,
        };
        self.policy.update(set, way);
        victim
    }

    fn block_addr_of_sector(&self, sector_addr: u64) -> u64 {
        (sector_addr / self.block_size as u64) * self.block_size as u64
    }

    fn sector_index(&self, sector_addr: u64) -> u32 {
        ((sector_addr % self.block_size as u64) / self.sector_size as u64) as u32
    }

    /// Dumps the tag array to `writer`, one [`BlockMetaData`] record per
    /// (set, way) slot in scan order. The data array is not serialized: it
    /// is rehydrated from the DRAM model on [`Self::deserialize`], since
    /// DRAM already holds the authoritative bytes for every valid sector.
    pub fn serialize(&self, writer: &mut impl std::io::Write) -> std::io::Result<()> {
        for meta in &self.tag_array {
            writer.write_all(&meta.tag.to_le_bytes())?;
            writer.write_all(&[meta.lru])?;
            writer.write_all(&meta.dirty.to_le_bytes())?;
            writer.write_all(&meta.valid.to_le_bytes())?;
        }
        Ok(())
    }

    /// Rehydrates the tag array from `reader`, then re-reads every valid
    /// sector's bytes via `fetch_from_dram`, keeping the data array
    /// consistent with the restored metadata.
    pub fn deserialize(
        &mut self,
        reader: &mut impl std::io::Read,
        mut fetch_from_dram: impl FnMut(u64, &mut [u8]),
    ) -> std::io::Result<()> {
        for idx in 0..self.tag_array.len() {
            let mut tag_buf = [0u8; 8];
            reader.read_exact(&mut tag_buf)?;
            let mut lru_buf = [0u8; 1];
            reader.read_exact(&mut lru_buf)?;
            let mut dirty_buf = [0u8; 4];
            reader.read_exact(&mut dirty_buf)?;
            let mut valid_buf = [0u8; 4];
            reader.read_exact(&mut valid_buf)?;
            let meta = BlockMetaData {
                tag: u64::from_le_bytes(tag_buf),
                lru: lru_buf[0],
                dirty: u32::from_le_bytes(dirty_buf),
                valid: u32::from_le_bytes(valid_buf),
            };
            self.tag_array[idx] = meta;

            let set = idx / self.associativity;
            let way = idx % self.associativity;
            let block_off = way_offset(set, way, self.associativity, self.block_size);
            let block_addr = self.block_addr_for(meta.tag, set);
            for sector in 0..self.sectors_per_block {
                if meta.sector_valid(sector) {
                    let sector_off = block_off + (sector as usize) * self.sector_size;
                    let sector_addr = block_addr + (sector as u64) * self.sector_size as u64;
                    fetch_from_dram(
                        sector_addr,
                        &mut self.data_array[sector_off..sector_off + self.sector_size],
                    );
                }
            }
        }
        Ok(())
    }

    /// Writes `data` directly into the block's data array without touching
    /// the tag array, for test setup / cache-warming paths.
    pub fn direct_write(&mut self, block_addr: u64, data: &[u8]) {
        let set = self.set_index(block_addr);
        let tag = self.tag(block_addr);
        if let Some(way) = self.find_way(set, tag) {
            let off = way_offset(set, way, self.associativity, self.block_size);
            self.data_array[off..off + data.len()].copy_from_slice(data);
        }
    }
}

fn way_offset(set: usize, way: usize, associativity: usize, block_size: usize) -> usize {
    (set * associativity + way) * block_size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> CacheBase {
        CacheBase::new(1024, 64, 4, 64, ReplacementPolicyConfig::Lru)
    }

    #[test]
    fn allocate_then_write_then_read_round_trips() {
        let mut c = cache();
        assert!(c.allocate_block(0).is_none());
        assert!(c.write_sector(0, &[1, 2, 3, 4], false));
        assert_eq!(c.read_sector(0).unwrap()[..4], [1, 2, 3, 4]);
    }

    #[test]
    fn write_sector_without_allocation_fails() {
        let mut c = cache();
        assert!(!c.write_sector(0, &[1], false));
    }

    #[test]
    fn eviction_produces_victim_with_prior_contents() {
        let mut c = CacheBase::new(256, 64, 1, 64, ReplacementPolicyConfig::Lru);
        // same set, different tags: 256/64/1 = 4 sets, so stride by 4*64 to collide.
        assert!(c.allocate_block(0).is_none());
        c.write_sector(0, &[9; 64], true);
        let victim = c.allocate_block(4 * 64).expect("should evict");
        assert_eq!(victim.addr, 0);
        assert_eq!(victim.data, vec![9u8; 64]);
    }

    #[test]
    fn serialize_deserialize_round_trip_restores_metadata() {
        let mut c = cache();
        c.allocate_block(0);
        c.write_sector(0, &[7; 64], true);
        let mut buf = Vec::new();
        c.serialize(&mut buf).unwrap();

        let mut restored = cache();
        let mut cursor = std::io::Cursor::new(buf);
        restored
            .deserialize(&mut cursor, |_addr, out| out.fill(7))
            .unwrap();
        assert_eq!(restored.read_sector(0).unwrap()[..4], [7, 7, 7, 7]);
    }
}
