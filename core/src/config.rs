//! Configuration system for the ray-tracing accelerator simulator.
//!
//! Configuration is supplied as JSON (typically produced by a driver
//! program, not by this crate) and deserialized with `serde`. Defaults live
//! in a private `defaults` module supplying `serde(default = "...")`
//! functions, rather than scattering magic numbers across `Default` impls.

use serde::Deserialize;

use crate::common::error::ConfigError;

/// Default configuration constants.
mod defaults {
    /// Cache block size in bytes; bounds `MemoryRequest::size`.
    pub const BLOCK_SIZE: usize = 64;

    /// Default L1 cache size in bytes (32 KiB).
    pub const L1_SIZE: usize = 32 * 1024;
    /// Default L1 associativity.
    pub const L1_ASSOCIATIVITY: usize = 4;
    /// Default L2 cache size in bytes (1 MiB).
    pub const L2_SIZE: usize = 1024 * 1024;
    /// Default L2 associativity.
    pub const L2_ASSOCIATIVITY: usize = 16;

    /// Default MSHR pool size per bank.
    pub const NUM_MSHR: usize = 16;
    /// Default number of banks per non-blocking cache.
    pub const NUM_BANKS: usize = 8;

    /// Default number of thread processors.
    pub const NUM_TPS: usize = 64;
    /// Default number of thread modules (groups of TPs sharing an RT-core/L1).
    pub const NUM_TMS: usize = 8;
    /// Default number of RT-cores.
    pub const NUM_RT_CORES: usize = 8;
    /// Default number of simulated hardware threads per TP.
    pub const NUM_THREADS: usize = 32;

    /// Default framebuffer width in pixels.
    pub const FRAMEBUFFER_WIDTH: u32 = 1024;
    /// Default framebuffer height in pixels.
    pub const FRAMEBUFFER_HEIGHT: u32 = 1024;

    /// Default maximum active-segment-set size in bytes.
    pub const MAX_ACTIVE_SET_SIZE: u64 = 4 * 1024 * 1024;

    /// Default number of DRAM channels.
    pub const NUM_CHANNELS: usize = 8;
    /// Default DRAM row size in bytes (used to stripe bucket allocation).
    pub const ROW_SIZE: u64 = 2048;

    /// Default periodic-callback interval in cycles.
    pub const LOGGING_INTERVAL: u64 = 100_000;

    /// Default column-access-strobe latency, in cycles.
    pub const T_CAS: u64 = 14;
    /// Default row-access-strobe latency, in cycles.
    pub const T_RAS: u64 = 14;
    /// Default precharge latency, in cycles.
    pub const T_PRE: u64 = 14;
}

/// Treelet admission-control traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraversalScheme {
    /// Breadth-first: children are revealed in FIFO order.
    #[default]
    Bfs,
    /// Depth-first: children are weighed and pushed onto a stack.
    Dfs,
}

/// DFS child-weighing scheme, only meaningful under
/// [`TraversalScheme::Dfs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// Weigh by total accumulated segment weight.
    #[default]
    TotalWeight,
    /// Weigh by `weight / num_rays`.
    AverageRayWeight,
    /// Weigh by `1 / num_rays`.
    InverseRayCount,
    /// Weigh by order of appearance (memory order), i.e. no reordering.
    MemoryOrder,
}

/// Address → DRAM-channel mapping preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ChannelMapping {
    /// Row, rank, bank, channel, column (low-order channel bits).
    #[default]
    RoRaBaChCo,
    /// Row, bank-group, bank, rank, channel, column.
    RoBgBaRaChCo,
}

/// Cache replacement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Least-recently-used.
    #[default]
    Lru,
    /// Hash-progressed deterministic pseudo-random victim selection.
    Random,
}

/// Root configuration structure for one simulation run.
///
/// # Examples
///
/// ```
/// use arches_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.block_size, 64);
/// assert_eq!(config.l1.size_bytes, 32 * 1024);
/// config.validate().unwrap();
/// ```
///
/// Deserializing a partial JSON document fills the rest from defaults:
///
/// ```
/// use arches_core::config::{Config, TraversalScheme};
///
/// let json = r#"{
///     "scene_name": "cornell-box",
///     "coalescer": { "traversal_scheme": "DFS" }
/// }"#;
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.scene_name, "cornell-box");
/// assert_eq!(config.coalescer.traversal_scheme, TraversalScheme::Dfs);
/// assert_eq!(config.l2.size_bytes, 1024 * 1024);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Scene key used to locate scene + cached BVH/treelet files.
    #[serde(default)]
    pub scene_name: String,

    /// Cache block size in bytes, shared by every cache level.
    #[serde(default = "Config::default_block_size")]
    pub block_size: usize,

    /// Total thread-processor count.
    #[serde(default = "Config::default_num_tps")]
    pub num_tps: usize,
    /// Thread-module count (groups of TPs sharing an RT-core and L1).
    #[serde(default = "Config::default_num_tms")]
    pub num_tms: usize,
    /// RT-core count.
    #[serde(default = "Config::default_num_rt_cores")]
    pub num_rt_cores: usize,
    /// Simulated hardware threads per thread-processor.
    #[serde(default = "Config::default_num_threads")]
    pub num_threads: usize,

    /// L1 cache geometry (per thread-module).
    #[serde(default)]
    pub l1: CacheConfig,
    /// L2 cache geometry (shared).
    #[serde(default)]
    pub l2: CacheConfig,

    /// Framebuffer width in pixels.
    #[serde(default = "Config::default_fb_width")]
    pub framebuffer_width: u32,
    /// Framebuffer height in pixels.
    #[serde(default = "Config::default_fb_height")]
    pub framebuffer_height: u32,

    /// Seed primary rays from a CPU pre-pass rather than generating them on
    /// chip.
    #[serde(default)]
    pub pregen_rays: bool,
    /// Seed secondary (bounce) rays from a CPU pre-pass.
    #[serde(default)]
    pub pregen_bounce: bool,

    /// Ray coalescer / treelet scheduler configuration.
    #[serde(default)]
    pub coalescer: CoalescerConfig,

    /// DRAM configuration.
    #[serde(default)]
    pub dram: DramConfig,

    /// Use an SRAM-backed ray store instead of DRAM-resident ray state.
    #[serde(default)]
    pub rays_on_chip: bool,
    /// Deserialize cached L2 tag/data state before timing a run.
    #[serde(default)]
    pub warm_l2: bool,
    /// Cycles between periodic log callbacks.
    #[serde(default = "Config::default_logging_interval")]
    pub logging_interval: u64,
}

impl Config {
    fn default_block_size() -> usize {
        defaults::BLOCK_SIZE
    }
    fn default_num_tps() -> usize {
        defaults::NUM_TPS
    }
    fn default_num_tms() -> usize {
        defaults::NUM_TMS
    }
    fn default_num_rt_cores() -> usize {
        defaults::NUM_RT_CORES
    }
    fn default_num_threads() -> usize {
        defaults::NUM_THREADS
    }
    fn default_fb_width() -> u32 {
        defaults::FRAMEBUFFER_WIDTH
    }
    fn default_fb_height() -> u32 {
        defaults::FRAMEBUFFER_HEIGHT
    }
    fn default_logging_interval() -> u64 {
        defaults::LOGGING_INTERVAL
    }

    /// Validates every numeric invariant the construction of the unit graph
    /// depends on, returning the first violation found.
    ///
    /// Callers building a unit graph from a `Config` must call this before
    /// constructing any unit; it is the only place configuration errors
    /// originate. The generic `Simulator` kernel itself is config-agnostic
    /// (it only sweeps whatever `Unit`s are registered with it), so this is
    /// a caller obligation rather than something `Simulator::new` enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 || !self.block_size.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                option: "block_size",
                value: self.block_size as u64,
            });
        }
        if self.num_tms == 0 || self.num_tps % self.num_tms != 0 {
            return Err(ConfigError::OutOfRange {
                option: "num_tps",
                value: self.num_tps as i64,
                expected: "a positive multiple of num_tms",
            });
        }
        if self.num_rt_cores == 0 {
            return Err(ConfigError::OutOfRange {
                option: "num_rt_cores",
                value: 0,
                expected: "> 0",
            });
        }
        self.l1.validate("l1", self.block_size)?;
        self.l2.validate("l2", self.block_size)?;
        self.coalescer.validate()?;
        self.dram.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scene_name: String::new(),
            block_size: defaults::BLOCK_SIZE,
            num_tps: defaults::NUM_TPS,
            num_tms: defaults::NUM_TMS,
            num_rt_cores: defaults::NUM_RT_CORES,
            num_threads: defaults::NUM_THREADS,
            l1: CacheConfig::default_with_size(defaults::L1_SIZE, defaults::L1_ASSOCIATIVITY),
            l2: CacheConfig::default_with_size(defaults::L2_SIZE, defaults::L2_ASSOCIATIVITY),
            framebuffer_width: defaults::FRAMEBUFFER_WIDTH,
            framebuffer_height: defaults::FRAMEBUFFER_HEIGHT,
            pregen_rays: false,
            pregen_bounce: false,
            coalescer: CoalescerConfig::default(),
            dram: DramConfig::default(),
            rays_on_chip: false,
            warm_l2: false,
            logging_interval: defaults::LOGGING_INTERVAL,
        }
    }
}

/// Geometry and policy for one cache level.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Total cache size in bytes.
    #[serde(default = "CacheConfig::default_size")]
    pub size_bytes: usize,
    /// Associativity (number of ways).
    #[serde(default = "CacheConfig::default_associativity")]
    pub associativity: usize,
    /// Sector size in bytes; equal to `size_bytes`'s block size when unsectored.
    #[serde(default)]
    pub sector_size: Option<usize>,
    /// Access latency in cycles.
    #[serde(default = "CacheConfig::default_latency")]
    pub latency: u64,
    /// Number of independent banks.
    #[serde(default = "CacheConfig::default_num_banks")]
    pub num_banks: usize,
    /// MSHR pool size per bank.
    #[serde(default = "CacheConfig::default_num_mshr")]
    pub num_mshr: usize,
    /// Use a line-fill buffer (write-combining, post-fill reuse).
    #[serde(default)]
    pub use_lfb: bool,
    /// Replacement policy.
    #[serde(default)]
    pub policy: ReplacementPolicy,
    /// Whether accesses to this TM/RT-core are served in program order.
    #[serde(default)]
    pub in_order: bool,
}

impl CacheConfig {
    fn default_size() -> usize {
        defaults::L1_SIZE
    }
    fn default_associativity() -> usize {
        defaults::L1_ASSOCIATIVITY
    }
    fn default_latency() -> u64 {
        1
    }
    fn default_num_banks() -> usize {
        defaults::NUM_BANKS
    }
    fn default_num_mshr() -> usize {
        defaults::NUM_MSHR
    }

    fn default_with_size(size_bytes: usize, associativity: usize) -> Self {
        Self {
            size_bytes,
            associativity,
            sector_size: None,
            latency: Self::default_latency(),
            num_banks: Self::default_num_banks(),
            num_mshr: Self::default_num_mshr(),
            use_lfb: false,
            policy: ReplacementPolicy::default(),
            in_order: false,
        }
    }

    /// Resolved sector size: `sector_size` if set, else `block_size`
    /// (unsectored).
    #[must_use]
    pub fn resolved_sector_size(&self, block_size: usize) -> usize {
        self.sector_size.unwrap_or(block_size)
    }

    fn validate(&self, name: &'static str, block_size: usize) -> Result<(), ConfigError> {
        if self.associativity == 0 || self.size_bytes % (block_size * self.associativity) != 0 {
            return Err(ConfigError::InconsistentGeometry {
                option: name,
                size: self.size_bytes,
                block_size,
                associativity: self.associativity,
            });
        }
        if self.num_banks == 0 {
            return Err(ConfigError::OutOfRange {
                option: name,
                value: 0,
                expected: "num_banks > 0",
            });
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::default_with_size(defaults::L1_SIZE, defaults::L1_ASSOCIATIVITY)
    }
}

/// Ray coalescer / treelet scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CoalescerConfig {
    /// Admission-control traversal order.
    #[serde(default)]
    pub traversal_scheme: TraversalScheme,
    /// DFS child-weighing scheme (ignored under BFS).
    #[serde(default)]
    pub weight_scheme: WeightScheme,
    /// Active-set byte budget.
    #[serde(default = "CoalescerConfig::default_max_active_set_size")]
    pub max_active_set_size: u64,
    /// Number of configured root rays (primary rays launched into treelet 0).
    #[serde(default)]
    pub num_root_rays: u32,
    /// Number of prefetch lanes draining the admitted-segment prefetch queue.
    #[serde(default = "CoalescerConfig::default_num_prefetch_lanes")]
    pub num_prefetch_lanes: usize,
}

impl CoalescerConfig {
    fn default_max_active_set_size() -> u64 {
        defaults::MAX_ACTIVE_SET_SIZE
    }
    fn default_num_prefetch_lanes() -> usize {
        16
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_active_set_size == 0 {
            return Err(ConfigError::OutOfRange {
                option: "coalescer.max_active_set_size",
                value: 0,
                expected: "> 0",
            });
        }
        Ok(())
    }
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            traversal_scheme: TraversalScheme::default(),
            weight_scheme: WeightScheme::default(),
            max_active_set_size: defaults::MAX_ACTIVE_SET_SIZE,
            num_root_rays: 0,
            num_prefetch_lanes: Self::default_num_prefetch_lanes(),
        }
    }
}

/// Black-box DRAM controller wrapper configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DramConfig {
    /// Number of independent channels.
    #[serde(default = "DramConfig::default_num_channels")]
    pub num_channels: usize,
    /// Row size in bytes, used to stripe bucket allocation round-robin.
    #[serde(default = "DramConfig::default_row_size")]
    pub row_size: u64,
    /// Address → channel mapping preset.
    #[serde(default)]
    pub channel_mapping: ChannelMapping,
}

impl DramConfig {
    fn default_num_channels() -> usize {
        defaults::NUM_CHANNELS
    }
    fn default_row_size() -> u64 {
        defaults::ROW_SIZE
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.num_channels == 0 {
            return Err(ConfigError::OutOfRange {
                option: "dram.num_channels",
                value: 0,
                expected: "> 0",
            });
        }
        if !self.row_size.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                option: "dram.row_size",
                value: self.row_size,
            });
        }
        Ok(())
    }
}

impl Default for DramConfig {
    fn default() -> Self {
        Self {
            num_channels: defaults::NUM_CHANNELS,
            row_size: defaults::ROW_SIZE,
            channel_mapping: ChannelMapping::default(),
        }
    }
}
