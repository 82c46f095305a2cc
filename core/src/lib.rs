//! Cycle-accurate architectural simulator for a GPU-class ray-tracing
//! accelerator.
//!
//! This crate models, at cycle granularity, the coordinated behavior of
//! many thread processors' cache/SFU interfaces, specialized ray-tracing
//! cores, a multi-level non-blocking cache hierarchy, a DRAM controller
//! wrapper, and a ray coalescer that streams rays between partitions
//! ("treelets") of a bounding-volume hierarchy. It measures latency,
//! throughput, and energy of ray-tracing kernels executed on proposed
//! hardware configurations before any silicon is built.
//!
//! Out of scope (external collaborators, consumed at the cache/SFU
//! interface only): the guest instruction-set decoder and thread
//! processor, command-line argument parsing, DRAM timing/power tables
//! (modeled as a black-box [`memory::DramModel`]), and scene loaders.

/// Common types and constants: addresses, the destination-stack bit
/// packing scheme, and wire request/return/error types.
pub mod common;
/// Ray coalescer / treelet scheduler: buckets, admission control, and
/// per-channel DRAM bucket I/O.
pub mod coalescer;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Interconnect primitives: cascades, crossbars, arbitration, pipelines.
pub mod interconnect;
/// Multi-level non-blocking cache hierarchy, MSHR state machine, and the
/// DRAM controller wrapper.
pub mod memory;
/// Final framebuffer encoding and the textual run report.
pub mod output;
/// Ray-tracing engine: treelet decode, per-ray state, RT-core traversal.
pub mod rt;
/// The discrete-event core: the `Unit` trait and the registration-order
/// two-phase `Simulator`.
pub mod sim;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; deserialize from JSON or use `Config::default()`.
pub use crate::config::Config;
/// Top-level simulator; owns every registered `Unit` and drives the
/// rise/fall sweep.
pub use crate::sim::Simulator;
/// Simulation statistics accumulated over one run.
pub use crate::stats::SimStats;
