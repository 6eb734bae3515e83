//! Block I/O requests as seen by the mapping layer.
//!
//! A request names a device and a sector. Targets either rewrite those
//! routing fields or mark the request failed; the buffer itself is never
//! touched here.

use std::fmt;

use crate::device::DeviceId;

/// A sector address in 512-byte units.
pub type Sector = u64;

/// Transfer direction of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Read,
    Write,
}

/// Completion state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoStatus {
    /// Routed and ready for submission.
    #[default]
    Pending,
    /// Completed with an I/O error; will not be forwarded.
    Error,
}

/// Outcome of a target's `map` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapResult {
    /// The request's device and sector were rewritten; submit it.
    Remapped,
    /// The request was failed with an I/O error.
    Failed,
}

/// A block I/O request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoRequest {
    device: DeviceId,
    sector: Sector,
    direction: Direction,
    status: IoStatus,
}

impl IoRequest {
    /// Create a pending request for `sector` on `device`.
    #[must_use]
    pub fn new(device: DeviceId, sector: Sector, direction: Direction) -> Self {
        Self {
            device,
            sector,
            direction,
            status: IoStatus::Pending,
        }
    }

    /// Create a pending read request.
    #[must_use]
    pub fn read(device: DeviceId, sector: Sector) -> Self {
        Self::new(device, sector, Direction::Read)
    }

    /// Create a pending write request.
    #[must_use]
    pub fn write(device: DeviceId, sector: Sector) -> Self {
        Self::new(device, sector, Direction::Write)
    }

    #[must_use]
    pub fn device(&self) -> DeviceId {
        self.device
    }

    #[must_use]
    pub fn sector(&self) -> Sector {
        self.sector
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn status(&self) -> IoStatus {
        self.status
    }

    /// Whether the request has been failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == IoStatus::Error
    }

    /// Point the request at a new device and sector.
    pub fn redirect(&mut self, device: DeviceId, sector: Sector) {
        self.device = device;
        self.sector = sector;
    }

    /// Complete the request with an I/O error.
    pub fn fail(&mut self) {
        self.status = IoStatus::Error;
    }
}

impl fmt::Display for IoRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Read => "R",
            Direction::Write => "W",
        };
        write!(f, "{dir} {}@{}", self.device, self.sector)
    }
}
