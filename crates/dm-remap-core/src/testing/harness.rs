//! Test harness for exercising target types.
//!
//! Provides a complete test environment with:
//! - A registry holding the built-in targets
//! - A mock device table with two well-known devices
//! - Helpers for constructing instances and building tables

use std::sync::Arc;

use crate::args::ArgumentCursor;
use crate::device::{DeviceId, DeviceTable};
use crate::error::{ConstructResult, TableResult};
use crate::registry::TargetRegistry;
use crate::table::{Table, TableBuilder};
use crate::target::{SegmentBounds, TargetInstance};

use super::mock_devices::MockDeviceTable;

/// Test harness for target integration tests.
pub struct TargetTestHarness {
    /// Registry with `io-err` and `linear`.
    pub registry: TargetRegistry,
    /// Device table resolving [`Self::SDA_PATH`] and [`Self::SDB_PATH`].
    pub devices: Arc<MockDeviceTable>,
}

impl TargetTestHarness {
    pub const SDA_PATH: &'static str = "/dev/sda";
    pub const SDB_PATH: &'static str = "/dev/sdb";
    pub const SDA: DeviceId = DeviceId::new(8, 0);
    pub const SDB: DeviceId = DeviceId::new(8, 16);
    /// Device number of the logical volume requests are addressed to.
    pub const LOGICAL: DeviceId = DeviceId::new(253, 0);

    /// Create a new harness.
    ///
    /// # Panics
    ///
    /// Panics if the built-in targets cannot be registered.
    #[must_use]
    pub fn new() -> Self {
        let registry = TargetRegistry::with_builtins().expect("built-in targets register");
        let devices = Arc::new(
            MockDeviceTable::new()
                .with_device(Self::SDA_PATH, Self::SDA)
                .with_device(Self::SDB_PATH, Self::SDB),
        );
        Self { registry, devices }
    }

    /// Construct one instance of `target` for the segment `start..start + len`.
    ///
    /// Construct diagnostics are discarded.
    ///
    /// # Panics
    ///
    /// Panics if `target` is not registered.
    pub fn construct(
        &self,
        target: &str,
        start: u64,
        len: u64,
        args: &str,
    ) -> ConstructResult<TargetInstance> {
        self.construct_reporting(target, start, len, args).0
    }

    /// Like [`construct`](Self::construct), also returning the reported messages.
    ///
    /// # Panics
    ///
    /// Panics if `target` is not registered.
    pub fn construct_reporting(
        &self,
        target: &str,
        start: u64,
        len: u64,
        args: &str,
    ) -> (ConstructResult<TargetInstance>, Vec<String>) {
        let handle = self
            .registry
            .lookup(target)
            .unwrap_or_else(|| panic!("target type '{target}' not registered"));
        let mut reported = Vec::new();
        let result = handle.construct(
            self.devices.as_ref(),
            SegmentBounds::new(start, len),
            &mut ArgumentCursor::new(args),
            &mut |msg: &str| reported.push(msg.to_string()),
        );
        (result, reported)
    }

    /// Build a table over the harness devices.
    ///
    /// # Errors
    ///
    /// Returns the table builder's error.
    pub fn build_table(&self, lines: &[&str]) -> TableResult<Table> {
        let devices: Arc<dyn DeviceTable> = self.devices.clone();
        TableBuilder::build_from_lines(&self.registry, devices, None, lines.iter().copied())
    }
}

impl Default for TargetTestHarness {
    fn default() -> Self {
        Self::new()
    }
}
