//! Mock device table for integration testing.
//!
//! A device table that:
//! - Resolves paths like [`MemoryDeviceTable`]
//! - Records every lookup, add and remove it receives
//! - Can be told to reject dependency registration

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::device::{DeviceId, DeviceTable, MemoryDeviceTable};
use crate::error::DeviceError;

/// A recorded device table call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    /// `lookup_device` with the requested path.
    Lookup(String),
    /// `add_device`, whether or not it succeeded.
    Add(DeviceId),
    /// `remove_device`.
    Remove(DeviceId),
}

/// Recording, fault-injecting device table.
#[derive(Debug, Default)]
pub struct MockDeviceTable {
    inner: MemoryDeviceTable,
    call_log: Mutex<Vec<DeviceCall>>,
    reject_dependencies: AtomicBool,
}

impl MockDeviceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `device` resolvable under `path`.
    #[must_use]
    pub fn with_device(self, path: impl Into<String>, device: DeviceId) -> Self {
        self.inner.insert_device(path, device);
        self
    }

    /// Refuse (or accept again) every subsequent `add_device`.
    pub fn set_reject_dependencies(&self, reject: bool) {
        self.reject_dependencies.store(reject, Ordering::SeqCst);
    }

    /// All calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.log().clone()
    }

    /// Devices passed to `add_device`, in order.
    #[must_use]
    pub fn added(&self) -> Vec<DeviceId> {
        self.log()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Add(device) => Some(*device),
                _ => None,
            })
            .collect()
    }

    /// Devices passed to `remove_device`, in order.
    #[must_use]
    pub fn removed(&self) -> Vec<DeviceId> {
        self.log()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Remove(device) => Some(*device),
                _ => None,
            })
            .collect()
    }

    /// Outstanding dependencies on `device`.
    #[must_use]
    pub fn dependency_count(&self, device: DeviceId) -> usize {
        self.inner.dependency_count(device)
    }

    /// Sum of all outstanding dependencies.
    #[must_use]
    pub fn total_dependencies(&self) -> usize {
        self.inner.total_dependencies()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.log().clear();
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<DeviceCall>> {
        self.call_log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: DeviceCall) {
        self.log().push(call);
    }
}

impl DeviceTable for MockDeviceTable {
    fn lookup_device(&self, path: &str) -> Result<DeviceId, DeviceError> {
        self.record(DeviceCall::Lookup(path.to_string()));
        self.inner.lookup_device(path)
    }

    fn add_device(&self, device: DeviceId) -> Result<(), DeviceError> {
        self.record(DeviceCall::Add(device));
        if self.reject_dependencies.load(Ordering::SeqCst) {
            return Err(DeviceError::DependencyRejected {
                device,
                reason: "rejected by test".to_string(),
            });
        }
        self.inner.add_device(device)
    }

    fn remove_device(&self, device: DeviceId) {
        self.record(DeviceCall::Remove(device));
        self.inner.remove_device(device);
    }
}
