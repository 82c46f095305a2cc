//! Fixed-size ray bucket: the DRAM-resident unit of work batching between
//! the coalescer and an RT-core.

/// Bucket size in bytes, fixed regardless of configuration.
pub const BUCKET_SIZE: usize = 1024;

const HEADER_SIZE: usize = 16;

/// Maximum ray ids a single bucket can hold.
pub const MAX_RAYS: usize = (BUCKET_SIZE - HEADER_SIZE) / 4;

/// Bucket header: linkage to the next bucket allocated for the same
/// segment, the owning segment id, and the number of ray ids written so
/// far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BucketHeader {
    pub next_bucket: u64,
    pub segment_id: u32,
    pub num_rays: u32,
}

/// A page-aligned, fixed-1024-byte bucket of ray ids destined for one
/// treelet segment.
#[derive(Clone, Debug)]
pub struct RayBucket {
    pub header: BucketHeader,
    pub ray_ids: [u32; MAX_RAYS],
}

impl Default for RayBucket {
    fn default() -> Self {
        Self {
            header: BucketHeader::default(),
            ray_ids: [0; MAX_RAYS],
        }
    }
}

impl RayBucket {
    /// Creates an empty bucket for `segment_id`.
    #[must_use]
    pub fn new(segment_id: u32) -> Self {
        Self {
            header: BucketHeader {
                segment_id,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Returns `true` once `MAX_RAYS` ids have been written.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.header.num_rays as usize == MAX_RAYS
    }

    /// Appends a ray id.
    ///
    /// # Panics
    /// Panics if the bucket is already full; callers must check
    /// [`RayBucket::is_full`] first.
    pub fn write_ray(&mut self, ray_id: u32) {
        assert!(!self.is_full(), "write to a full ray bucket");
        let i = self.header.num_rays as usize;
        self.ray_ids[i] = ray_id;
        self.header.num_rays += 1;
    }

    /// Encodes the bucket to its fixed 1024-byte wire representation.
    #[must_use]
    pub fn encode(&self) -> [u8; BUCKET_SIZE] {
        let mut buf = [0u8; BUCKET_SIZE];
        buf[0..8].copy_from_slice(&self.header.next_bucket.to_le_bytes());
        buf[8..12].copy_from_slice(&self.header.segment_id.to_le_bytes());
        buf[12..16].copy_from_slice(&self.header.num_rays.to_le_bytes());
        for (i, id) in self.ray_ids.iter().enumerate() {
            let off = HEADER_SIZE + i * 4;
            buf[off..off + 4].copy_from_slice(&id.to_le_bytes());
        }
        buf
    }

    /// Decodes a bucket from its wire representation.
    #[must_use]
    pub fn decode(bytes: &[u8; BUCKET_SIZE]) -> Self {
        let header = BucketHeader {
            next_bucket: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            segment_id: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            num_rays: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
        };
        let mut ray_ids = [0u32; MAX_RAYS];
        for (i, id) in ray_ids.iter_mut().enumerate() {
            let off = HEADER_SIZE + i * 4;
            *id = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
        }
        Self { header, ray_ids }
    }
}
