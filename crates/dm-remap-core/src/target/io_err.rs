//! `io-err`: fails every request.
//!
//! Used to bring up logical volumes that have holes in them, such as
//! extents that were never provisioned.

use super::{ErrorSink, SegmentBounds, TargetType};
use crate::args::ArgumentCursor;
use crate::device::DeviceTable;
use crate::error::{ConstructError, ConstructResult};
use crate::io::{IoRequest, MapResult};

/// Target that completes every request with an I/O error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTarget;

impl TargetType for ErrorTarget {
    type Context = ();

    /// Takes no arguments; any token is rejected.
    fn construct(
        &self,
        _table: &dyn DeviceTable,
        _segment: SegmentBounds,
        args: &mut ArgumentCursor<'_>,
        errors: &mut dyn ErrorSink,
    ) -> ConstructResult<()> {
        if let Err(e) = args.expect_end() {
            errors.report("io-err takes no arguments");
            return Err(ConstructError::malformed(e.to_string()));
        }
        Ok(())
    }

    fn destruct(&self, _table: &dyn DeviceTable, _context: ()) {}

    #[inline]
    fn map(&self, request: &mut IoRequest, _context: &()) -> MapResult {
        request.fail();
        MapResult::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceId, MemoryDeviceTable};
    use crate::io::IoStatus;
    use crate::testing::count_events;

    #[test]
    fn test_construct_without_arguments() {
        let table = MemoryDeviceTable::new();
        let mut reported = Vec::new();
        let result = ErrorTarget.construct(
            &table,
            SegmentBounds::new(0, 8),
            &mut ArgumentCursor::new("  "),
            &mut |msg: &str| reported.push(msg.to_string()),
        );
        assert_eq!(result, Ok(()));
        assert!(reported.is_empty());
    }

    #[test]
    fn test_construct_rejects_leftover_tokens() {
        let table = MemoryDeviceTable::new();
        let mut reported = Vec::new();
        let result = ErrorTarget.construct(
            &table,
            SegmentBounds::new(0, 8),
            &mut ArgumentCursor::new("/dev/sda 0"),
            &mut |msg: &str| reported.push(msg.to_string()),
        );
        assert!(matches!(
            result,
            Err(ConstructError::MalformedArguments { .. })
        ));
        assert_eq!(reported, vec!["io-err takes no arguments".to_string()]);
    }

    #[test]
    fn test_map_always_fails() {
        for (device, sector) in [
            (DeviceId::new(253, 0), 0),
            (DeviceId::new(8, 0), 12_345),
            (DeviceId::new(0, 0), u64::MAX),
        ] {
            let mut req = IoRequest::write(device, sector);
            assert_eq!(ErrorTarget.map(&mut req, &()), MapResult::Failed);
            assert_eq!(req.status(), IoStatus::Error);
            // Routing fields are left alone.
            assert_eq!(req.device(), device);
            assert_eq!(req.sector(), sector);
        }
    }

    #[test]
    fn test_map_emits_no_events() {
        let ((), events) = count_events(|| {
            let mut req = IoRequest::read(DeviceId::new(253, 0), 7);
            assert_eq!(ErrorTarget.map(&mut req, &()), MapResult::Failed);
        });
        assert_eq!(events, 0);
    }
}
