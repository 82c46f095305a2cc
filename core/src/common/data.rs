//! Cache block metadata: the per-way record tracked by [`crate::memory::cache_base`].

/// Per-way cache block metadata.
///
/// Sectored caches allow a block to be partially present: `dirty`/`valid`
/// carry one bit per sector. Non-sectored caches (`sector_size == block_size`)
/// only ever use bit 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockMetaData {
    /// Block address tag, shifted right by the set-index and block-offset bits.
    pub tag: u64,
    /// LRU/replacement-policy counter; meaning depends on the active policy.
    pub lru: u8,
    /// One bit per sector: whether that sector holds unwritten-back data.
    pub dirty: u32,
    /// One bit per sector: whether that sector holds valid data.
    pub valid: u32,
}

impl BlockMetaData {
    /// An empty (all-invalid) metadata record.
    pub const EMPTY: Self = Self {
        tag: 0,
        lru: 0,
        dirty: 0,
        valid: 0,
    };

    /// Returns `true` if any sector is valid.
    #[must_use]
    pub const fn any_valid(self) -> bool {
        self.valid != 0
    }

    /// Returns `true` if sector `index` is valid.
    #[must_use]
    pub const fn sector_valid(self, index: u32) -> bool {
        (self.valid & (1 << index)) != 0
    }

    /// Returns `true` if sector `index` is dirty.
    #[must_use]
    pub const fn sector_dirty(self, index: u32) -> bool {
        (self.dirty & (1 << index)) != 0
    }
}
