//! Device resolution and dependency bookkeeping.
//!
//! Targets resolve textual device paths through a [`DeviceTable`] and record
//! a dependency on every device they will route requests to. The table keeps
//! those dependencies so the device cannot disappear underneath a live
//! segment.

use std::fmt;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DeviceError;

/// A block device identified by its `major:minor` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct DeviceId {
    pub major: u32,
    pub minor: u32,
}

impl DeviceId {
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Device lookup and dependency tracking used by target construct/destruct.
///
/// Implementations must be callable from any thread. Construct and destruct
/// calls against one table are serialized by the table builder.
pub trait DeviceTable: Send + Sync {
    /// Resolve a device path to its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NotFound`] if no device is known under `path`.
    fn lookup_device(&self, path: &str) -> Result<DeviceId, DeviceError>;

    /// Record that a segment depends on `device`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::DependencyRejected`] if the dependency cannot be recorded.
    fn add_device(&self, device: DeviceId) -> Result<(), DeviceError>;

    /// Drop one dependency previously recorded with [`add_device`](Self::add_device).
    fn remove_device(&self, device: DeviceId);
}

/// In-memory device table.
///
/// Devices are registered up front by path; dependencies are reference
/// counted per device.
#[derive(Debug, Default)]
pub struct MemoryDeviceTable {
    /// Known devices keyed by path.
    devices: DashMap<String, DeviceId>,
    /// Outstanding dependency count per device.
    dependencies: DashMap<DeviceId, usize>,
}

impl MemoryDeviceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `device` resolvable under `path`, replacing any previous entry.
    pub fn insert_device(&self, path: impl Into<String>, device: DeviceId) {
        let path = path.into();
        debug!(path = %path, device = %device, "device registered");
        self.devices.insert(path, device);
    }

    /// Builder-style variant of [`insert_device`](Self::insert_device).
    #[must_use]
    pub fn with_device(self, path: impl Into<String>, device: DeviceId) -> Self {
        self.insert_device(path, device);
        self
    }

    /// Number of known devices.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Outstanding dependencies on `device`.
    #[must_use]
    pub fn dependency_count(&self, device: DeviceId) -> usize {
        self.dependencies.get(&device).map_or(0, |count| *count)
    }

    /// Sum of all outstanding dependencies.
    #[must_use]
    pub fn total_dependencies(&self) -> usize {
        self.dependencies.iter().map(|entry| *entry.value()).sum()
    }

    /// Devices with at least one outstanding dependency, sorted.
    #[must_use]
    pub fn dependencies(&self) -> Vec<(DeviceId, usize)> {
        let mut deps: Vec<_> = self
            .dependencies
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        deps.sort_unstable();
        deps
    }
}

impl DeviceTable for MemoryDeviceTable {
    fn lookup_device(&self, path: &str) -> Result<DeviceId, DeviceError> {
        self.devices
            .get(path)
            .map(|entry| *entry.value())
            .ok_or_else(|| DeviceError::NotFound(path.to_string()))
    }

    fn add_device(&self, device: DeviceId) -> Result<(), DeviceError> {
        *self.dependencies.entry(device).or_insert(0) += 1;
        Ok(())
    }

    fn remove_device(&self, device: DeviceId) {
        let removed = self
            .dependencies
            .remove_if_mut(&device, |_, count| {
                *count -= 1;
                *count == 0
            })
            .is_some();

        if !removed && !self.dependencies.contains_key(&device) {
            warn!(device = %device, "removing dependency that was never added");
        }
    }
}
