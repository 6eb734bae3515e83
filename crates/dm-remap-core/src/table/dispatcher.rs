//! Per-request dispatch over a built table.
//!
//! The dispatcher finds the segment owning a request's sector and calls that
//! segment's already-constructed instance. It never touches the registry and
//! takes no locks, so it can be shared freely across I/O threads.

use super::Segment;
use crate::device::DeviceId;
use crate::io::{IoRequest, MapResult, Sector};

/// Routes requests through the segments of a [`Table`](super::Table).
#[derive(Debug, Clone, Copy)]
pub struct MappingDispatcher<'t> {
    segments: &'t [Segment],
}

impl<'t> MappingDispatcher<'t> {
    pub(super) fn new(segments: &'t [Segment]) -> Self {
        Self { segments }
    }

    /// Segment containing `sector`.
    #[inline]
    fn owning_segment(&self, sector: Sector) -> Option<&'t Segment> {
        // Segments are contiguous and sorted by start.
        let idx = self
            .segments
            .partition_point(|segment| segment.bounds.end() <= sector);
        self.segments
            .get(idx)
            .filter(|segment| segment.bounds.contains(sector))
    }

    /// Route one request.
    ///
    /// Requests past the end of the table are failed.
    #[inline]
    pub fn dispatch(&self, request: &mut IoRequest) -> MapResult {
        let Some(segment) = self.owning_segment(request.sector()) else {
            request.fail();
            return MapResult::Failed;
        };

        let result = segment.instance.map(request);
        if let Some(counters) = &segment.counters {
            counters.record(result);
        }
        result
    }

    /// Route a read of `sector` addressed to the logical device `device`.
    #[must_use]
    pub fn map_sector(&self, device: DeviceId, sector: Sector) -> (MapResult, IoRequest) {
        let mut request = IoRequest::read(device, sector);
        let result = self.dispatch(&mut request);
        (result, request)
    }
}
