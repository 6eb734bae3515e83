//! Test utilities for the target-type core.
//!
//! This module provides infrastructure for integration testing:
//!
//! - [`MockDeviceTable`] - A device table that records every call and can
//!   refuse dependency registration
//! - [`TargetTestHarness`] - A registry with the built-in targets plus a
//!   mock device table holding a few well-known devices
//! - [`count_events`] - Counts `tracing` events emitted by a closure
//!
//! # Example
//!
//! ```rust,ignore
//! use dm_remap_core::testing::{DeviceCall, TargetTestHarness};
//!
//! #[test]
//! fn test_linear_registers_dependency() {
//!     let harness = TargetTestHarness::new();
//!     let instance = harness.construct("linear", 0, 100, "/dev/sda 0").unwrap();
//!
//!     assert_eq!(harness.devices.added(), vec![TargetTestHarness::SDA]);
//!     instance.destruct(harness.devices.as_ref());
//! }
//! ```

pub mod events;
pub mod harness;
pub mod mock_devices;

pub use events::count_events;
pub use harness::TargetTestHarness;
pub use mock_devices::{DeviceCall, MockDeviceTable};
