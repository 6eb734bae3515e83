//! `linear`: maps a segment onto a contiguous range of another device.
//!
//! Argument text is `<device_path> <destination_start>`. A request for
//! logical sector `s` in a segment starting at `b` is sent to sector
//! `destination_start + (s - b)` on the destination device.
//!
//! # Example
//!
//! A segment starting at sector 100 with arguments `/dev/sdb 500` has a
//! delta of 400: sector 100 maps to 500, sector 150 maps to 550.

use tracing::debug;

use super::{ErrorSink, SegmentBounds, TargetType};
use crate::args::ArgumentCursor;
use crate::device::{DeviceId, DeviceTable};
use crate::error::{ArgError, ConstructError, ConstructResult};
use crate::io::{IoRequest, MapResult};

/// Longest device path accepted, in bytes. Longer paths are rejected rather
/// than truncated.
pub const MAX_DEVICE_PATH_LEN: usize = 255;

/// Target that offsets requests onto a destination device.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTarget;

/// Per-segment state of a [`LinearTarget`]. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearContext {
    device: DeviceId,
    delta: i64,
}

impl LinearContext {
    /// The destination device.
    #[must_use]
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Signed offset added to every request sector.
    #[must_use]
    pub fn delta(&self) -> i64 {
        self.delta
    }
}

/// Fail a construct step: report to the sink, then return the error.
fn reject(errors: &mut dyn ErrorSink, message: &str, err: ConstructError) -> ConstructError {
    errors.report(message);
    err
}

impl TargetType for LinearTarget {
    type Context = LinearContext;

    fn construct(
        &self,
        table: &dyn DeviceTable,
        segment: SegmentBounds,
        args: &mut ArgumentCursor<'_>,
        errors: &mut dyn ErrorSink,
    ) -> ConstructResult<LinearContext> {
        let path = args.next_token().map_err(|_| {
            reject(
                errors,
                "couldn't get device path",
                ConstructError::malformed("device path not given"),
            )
        })?;
        if path.len() > MAX_DEVICE_PATH_LEN {
            return Err(reject(
                errors,
                "device path too long",
                ConstructError::malformed(format!(
                    "device path is {} bytes, limit is {MAX_DEVICE_PATH_LEN}",
                    path.len()
                )),
            ));
        }
        let path = path.to_owned();

        let device = table.lookup_device(&path).map_err(|source| {
            reject(
                errors,
                "no such device",
                ConstructError::DeviceResolutionFailure {
                    path: path.clone(),
                    source,
                },
            )
        })?;

        let start = args.next_u64().map_err(|e| {
            let reason = match e {
                ArgError::Exhausted => "destination start not given".to_string(),
                other => format!("destination start: {other}"),
            };
            reject(
                errors,
                "destination start not given",
                ConstructError::MalformedArguments { reason },
            )
        })?;

        if let Err(e) = args.expect_end() {
            return Err(reject(
                errors,
                "too many arguments for linear",
                ConstructError::malformed(e.to_string()),
            ));
        }

        let delta = i64::try_from(i128::from(start) - i128::from(segment.start)).map_err(|_| {
            reject(
                errors,
                "destination start out of range",
                ConstructError::malformed(format!(
                    "delta from sector {} to {start} does not fit a signed sector offset",
                    segment.start
                )),
            )
        })?;

        let context = LinearContext { device, delta };

        // Nothing else is held yet, so a rejected dependency only drops the context.
        table.add_device(device).map_err(|source| {
            reject(
                errors,
                "failed to add destination device to list",
                ConstructError::DependencyRegistrationFailure { device, source },
            )
        })?;

        debug!(
            path = %path,
            device = %device,
            segment_start = segment.start,
            segment_len = segment.len,
            delta,
            "linear target constructed"
        );
        Ok(context)
    }

    fn destruct(&self, table: &dyn DeviceTable, context: LinearContext) {
        table.remove_device(context.device);
        debug!(device = %context.device, "linear target destructed");
    }

    #[inline]
    fn map(&self, request: &mut IoRequest, context: &LinearContext) -> MapResult {
        // Bounds are checked below this layer.
        let sector = request.sector().wrapping_add_signed(context.delta);
        request.redirect(context.device, sector);
        MapResult::Remapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDeviceTable;
    use crate::io::IoStatus;

    const SDB: DeviceId = DeviceId::new(8, 16);

    fn table() -> MemoryDeviceTable {
        MemoryDeviceTable::new().with_device("/dev/sdb", SDB)
    }

    fn construct(
        table: &MemoryDeviceTable,
        start: u64,
        args: &str,
    ) -> (ConstructResult<LinearContext>, Vec<String>) {
        let mut reported = Vec::new();
        let result = LinearTarget.construct(
            table,
            SegmentBounds::new(start, 1000),
            &mut ArgumentCursor::new(args),
            &mut |msg: &str| reported.push(msg.to_string()),
        );
        (result, reported)
    }

    #[test]
    fn test_positive_delta() {
        let table = table();
        let (ctx, _) = construct(&table, 100, "/dev/sdb 500");
        let ctx = ctx.unwrap();
        assert_eq!(ctx.delta(), 400);
        assert_eq!(ctx.device(), SDB);
        assert_eq!(table.dependency_count(SDB), 1);

        for (logical, physical) in [(100, 500), (150, 550), (100, 500)] {
            let mut req = IoRequest::read(DeviceId::new(253, 0), logical);
            assert_eq!(LinearTarget.map(&mut req, &ctx), MapResult::Remapped);
            assert_eq!(req.device(), SDB);
            assert_eq!(req.sector(), physical);
            assert_eq!(req.status(), IoStatus::Pending);
        }
        assert_eq!(ctx.delta(), 400);
    }

    #[test]
    fn test_negative_delta() {
        let table = table();
        let (ctx, _) = construct(&table, 2048, "/dev/sdb 0");
        let ctx = ctx.unwrap();
        assert_eq!(ctx.delta(), -2048);

        let mut req = IoRequest::write(DeviceId::new(253, 0), 2050);
        LinearTarget.map(&mut req, &ctx);
        assert_eq!(req.sector(), 2);
    }

    #[test]
    fn test_missing_path() {
        let table = table();
        let (result, reported) = construct(&table, 0, "");
        assert!(matches!(
            result,
            Err(ConstructError::MalformedArguments { .. })
        ));
        assert_eq!(reported, vec!["couldn't get device path".to_string()]);
        assert_eq!(table.total_dependencies(), 0);
    }

    #[test]
    fn test_unknown_device() {
        let table = table();
        let (result, reported) = construct(&table, 0, "/dev/nope 0");
        assert!(matches!(
            result,
            Err(ConstructError::DeviceResolutionFailure { ref path, .. }) if path == "/dev/nope"
        ));
        assert_eq!(reported, vec!["no such device".to_string()]);
        assert_eq!(table.total_dependencies(), 0);
    }

    #[test]
    fn test_missing_destination_start() {
        let table = table();
        let (result, reported) = construct(&table, 0, "/dev/sdb");
        assert_eq!(
            result,
            Err(ConstructError::MalformedArguments {
                reason: "destination start not given".to_string()
            })
        );
        assert_eq!(reported, vec!["destination start not given".to_string()]);
        assert_eq!(table.total_dependencies(), 0);
    }

    #[test]
    fn test_unparseable_destination_start() {
        let table = table();
        let (result, _) = construct(&table, 0, "/dev/sdb 0x10");
        assert!(matches!(
            result,
            Err(ConstructError::MalformedArguments { ref reason }) if reason.contains("0x10")
        ));
        assert_eq!(table.total_dependencies(), 0);
    }

    #[test]
    fn test_excess_arguments() {
        let table = table();
        let (result, _) = construct(&table, 0, "/dev/sdb 0 extra");
        assert!(matches!(
            result,
            Err(ConstructError::MalformedArguments { ref reason }) if reason.contains("extra")
        ));
        assert_eq!(table.total_dependencies(), 0);
    }

    #[test]
    fn test_oversize_path_rejected() {
        let long = format!("/dev/{}", "x".repeat(MAX_DEVICE_PATH_LEN));
        let table = MemoryDeviceTable::new().with_device(long.clone(), SDB);
        let (result, reported) = construct(&table, 0, &format!("{long} 0"));
        assert!(matches!(
            result,
            Err(ConstructError::MalformedArguments { .. })
        ));
        assert_eq!(reported, vec!["device path too long".to_string()]);
        assert_eq!(table.total_dependencies(), 0);
    }

    #[test]
    fn test_path_at_limit_accepted() {
        let path = format!("/{}", "d".repeat(MAX_DEVICE_PATH_LEN - 1));
        let table = MemoryDeviceTable::new().with_device(path.clone(), SDB);
        let (result, _) = construct(&table, 0, &format!("{path} 0"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_destruct_releases_dependency() {
        let table = table();
        let (first, _) = construct(&table, 0, "/dev/sdb 0");
        let (second, _) = construct(&table, 1000, "/dev/sdb 1000");
        assert_eq!(table.dependency_count(SDB), 2);

        LinearTarget.destruct(&table, first.unwrap());
        assert_eq!(table.dependency_count(SDB), 1);

        LinearTarget.destruct(&table, second.unwrap());
        assert_eq!(table.dependency_count(SDB), 0);
    }
}
