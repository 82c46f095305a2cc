//! Interconnect primitives: cascades, crossbars, arbitration, and fixed-
//! latency pipelines.

/// Round-robin arbitration network.
pub mod arbiter;
/// Fixed-width one-cycle FIFO.
pub mod cascade;
/// N-input, M-output routing crossbar.
pub mod crossbar;
/// Fixed-latency pipeline stage.
pub mod pipeline;

pub use arbiter::Arbiter;
pub use cascade::Cascade;
pub use crossbar::{Crossbar, Selector};
pub use pipeline::Pipeline;
