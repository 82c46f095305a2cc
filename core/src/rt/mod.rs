//! The ray-tracing engine: treelet decode, per-ray state, and the RT-core
//! traversal state machine.

/// Per-ray traversal state and work items exchanged with the coalescer.
pub mod ray;
/// Fixed-function traversal core.
pub mod rt_core;
/// On-disk treelet layout and ray/triangle intersection primitives.
pub mod treelet;

pub use ray::{Hit, Phase, Ray, RayState, WorkItem};
pub use rt_core::{RtCore, RtCoreLog};
pub use treelet::{Aabb, Node, NodeData, Treelet, TreeletHeader, Triangle};
