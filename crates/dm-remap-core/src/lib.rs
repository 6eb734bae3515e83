//! Device-Mapper Target Core Library
//!
//! This library provides the pluggable remapping core of a logical volume
//! layer. A table of contiguous logical segments redirects each block I/O
//! request to a physical location or policy chosen per segment, without the
//! caller knowing which policy applies where.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`target`] - The construct/destruct/map contract and the built-in targets
//! - [`registry`] - Process-wide registry of named target types
//! - [`table`] - Segment table builder and the request dispatcher
//! - [`args`] - Cursor over a target's argument text
//! - [`device`] - Device resolution and dependency bookkeeping
//! - [`io`] - Block I/O requests and mapping results
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Domain-specific error types
//! - [`metrics`] - Prometheus metrics collection
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dm_remap_core::{DeviceId, MemoryDeviceTable, TableBuilder, TargetRegistry};
//!
//! let devices = Arc::new(MemoryDeviceTable::new().with_device("/dev/sda", DeviceId::new(8, 0)));
//! let table = TableBuilder::build_from_lines(
//!     TargetRegistry::global(),
//!     devices,
//!     None,
//!     ["0 1024 linear /dev/sda 2048", "1024 512 io-err"],
//! )?;
//!
//! let (result, request) = table.dispatcher().map_sector(DeviceId::new(253, 0), 10);
//! ```

#![forbid(unsafe_code)]

pub mod args;
pub mod config;
pub mod device;
pub mod error;
pub mod io;
pub mod metrics;
pub mod registry;
pub mod table;
pub mod target;

/// Test utilities for integration testing.
///
/// This module is only available when compiling tests or when the `testing` feature is enabled.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use args::ArgumentCursor;
pub use config::RemapConfig;
pub use device::{DeviceId, DeviceTable, MemoryDeviceTable};
pub use error::{
    ArgError, ConfigError, ConstructError, DeviceError, RegistryError, TableError,
};
pub use io::{Direction, IoRequest, IoStatus, MapResult, Sector};
pub use registry::TargetRegistry;
pub use table::{MappingDispatcher, Origin, SegmentInfo, Table, TableBuilder};
pub use target::{
    ErrorSink, ErrorTarget, LinearTarget, SegmentBounds, TargetInstance, TargetType,
    TargetTypeRef,
};
