//! Common types shared across every unit: addresses, wire requests/returns,
//! cache block metadata, and the error taxonomy.

/// Physical addresses and the `BitStack27` destination-stack encoding.
pub mod addr;

/// Cache block metadata (`BlockMetaData`).
pub mod data;

/// Error taxonomy: configuration errors, protocol violations, external faults.
pub mod error;

/// Wire types: `MemoryRequest`, `MemoryReturn`, `StreamSchedulerRequest`.
pub mod request;

pub use addr::{BitStack27, PhysAddr};
pub use data::BlockMetaData;
pub use error::{ConfigError, ExternalFault, SimError, Violation};
pub use request::{
    BypassFlags, MAX_SIZE, MemoryRequest, MemoryReturn, RequestKind, ReturnKind,
    SchedulerRequestKind, SchedulerRequestPayload, SfuRequest, StreamSchedulerRequest, WorkItem,
};
