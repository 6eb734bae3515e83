//! Target types: the construct / destruct / map contract.
//!
//! A target type is a named remapping strategy. The table builder calls
//! [`TargetType::construct`] once per segment to obtain that segment's
//! context, routes every request for the segment through
//! [`TargetType::map`], and hands the context back to
//! [`TargetType::destruct`] at teardown.
//!
//! The registry stores target types behind an object-safe adapter. A
//! constructed segment is a [`TargetInstance`]: the context bound to the
//! target type that produced it, so `map` and `destruct` always receive
//! the context type they expect.
//!
//! # Built-in targets
//!
//! - [`ErrorTarget`] (`io-err`) fails every request
//! - [`LinearTarget`] (`linear`) maps onto a contiguous range of another device

mod io_err;
mod linear;

use std::fmt;
use std::sync::Arc;

use crate::args::ArgumentCursor;
use crate::device::DeviceTable;
use crate::error::ConstructResult;
use crate::io::{IoRequest, MapResult, Sector};

pub use io_err::ErrorTarget;
pub use linear::{LinearContext, LinearTarget, MAX_DEVICE_PATH_LEN};

/// Logical bounds of the segment being constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentBounds {
    /// First logical sector of the segment.
    pub start: Sector,
    /// Number of sectors in the segment.
    pub len: Sector,
}

impl SegmentBounds {
    #[must_use]
    pub const fn new(start: Sector, len: Sector) -> Self {
        Self { start, len }
    }

    /// One past the last sector of the segment.
    #[must_use]
    pub const fn end(&self) -> Sector {
        self.start.saturating_add(self.len)
    }

    #[must_use]
    pub const fn contains(&self, sector: Sector) -> bool {
        sector >= self.start && sector < self.end()
    }
}

/// Receives human readable construct failures for the control plane.
pub trait ErrorSink {
    fn report(&mut self, message: &str);
}

impl<F: FnMut(&str)> ErrorSink for F {
    fn report(&mut self, message: &str) {
        self(message);
    }
}

/// A remapping strategy.
///
/// `construct` and `destruct` may block and are serialized per segment by
/// the caller. `map` runs on the I/O path: it must not block, allocate or
/// take locks, and may be called concurrently against the same context.
pub trait TargetType: Send + Sync + 'static {
    /// Per-segment state produced by `construct`.
    type Context: Send + Sync + 'static;

    /// Build the context for one segment from its argument text.
    ///
    /// Must consume exactly the arguments the target defines. On failure the
    /// reason is reported to `errors` and nothing acquired here may remain
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns a [`ConstructError`](crate::error::ConstructError) describing the failing step.
    fn construct(
        &self,
        table: &dyn DeviceTable,
        segment: SegmentBounds,
        args: &mut ArgumentCursor<'_>,
        errors: &mut dyn ErrorSink,
    ) -> ConstructResult<Self::Context>;

    /// Release everything `construct` acquired.
    fn destruct(&self, table: &dyn DeviceTable, context: Self::Context);

    /// Route one request.
    fn map(&self, request: &mut IoRequest, context: &Self::Context) -> MapResult;
}

/// Object-safe view of a [`TargetType`] as stored in the registry.
trait ErasedTargetType: Send + Sync {
    fn construct_instance(
        self: Arc<Self>,
        table: &dyn DeviceTable,
        segment: SegmentBounds,
        args: &mut ArgumentCursor<'_>,
        errors: &mut dyn ErrorSink,
    ) -> ConstructResult<Box<dyn ErasedInstance>>;
}

impl<T: TargetType> ErasedTargetType for T {
    fn construct_instance(
        self: Arc<Self>,
        table: &dyn DeviceTable,
        segment: SegmentBounds,
        args: &mut ArgumentCursor<'_>,
        errors: &mut dyn ErrorSink,
    ) -> ConstructResult<Box<dyn ErasedInstance>> {
        let context = self.construct(table, segment, args, errors)?;
        Ok(Box::new(Bound {
            target: self,
            context,
        }))
    }
}

/// Object-safe view of a constructed segment.
trait ErasedInstance: Send + Sync {
    fn map(&self, request: &mut IoRequest) -> MapResult;
    fn destruct(self: Box<Self>, table: &dyn DeviceTable);
}

/// A context together with the target type that built it.
struct Bound<T: TargetType> {
    target: Arc<T>,
    context: T::Context,
}

impl<T: TargetType> ErasedInstance for Bound<T> {
    #[inline]
    fn map(&self, request: &mut IoRequest) -> MapResult {
        self.target.map(request, &self.context)
    }

    fn destruct(self: Box<Self>, table: &dyn DeviceTable) {
        let Bound { target, context } = *self;
        target.destruct(table, context);
    }
}

/// Handle to a registered target type.
///
/// Cheap to clone; stays valid for as long as any clone is alive, which for
/// registry entries is the life of the process.
#[derive(Clone)]
pub struct TargetTypeRef {
    name: Arc<str>,
    target: Arc<dyn ErasedTargetType>,
}

impl TargetTypeRef {
    pub(crate) fn new<T: TargetType>(name: &str, target: T) -> Self {
        Self {
            name: Arc::from(name),
            target: Arc::new(target),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construct an instance of this target type for one segment.
    ///
    /// # Errors
    ///
    /// Propagates the target's [`ConstructError`](crate::error::ConstructError).
    pub fn construct(
        &self,
        table: &dyn DeviceTable,
        segment: SegmentBounds,
        args: &mut ArgumentCursor<'_>,
        errors: &mut dyn ErrorSink,
    ) -> ConstructResult<TargetInstance> {
        let inner = Arc::clone(&self.target).construct_instance(table, segment, args, errors)?;
        Ok(TargetInstance {
            type_name: Arc::clone(&self.name),
            inner,
        })
    }

    /// Whether two handles refer to the same registration.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.name, &b.name)
    }
}

impl fmt::Debug for TargetTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetTypeRef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A constructed target bound to one segment.
///
/// Owned by exactly one segment. [`destruct`](Self::destruct) consumes the
/// instance, so it can run at most once.
pub struct TargetInstance {
    type_name: Arc<str>,
    inner: Box<dyn ErasedInstance>,
}

impl TargetInstance {
    /// Name of the target type that built this instance.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Route one request through the instance.
    #[inline]
    pub fn map(&self, request: &mut IoRequest) -> MapResult {
        self.inner.map(request)
    }

    /// Release the instance and everything its construct acquired.
    pub fn destruct(self, table: &dyn DeviceTable) {
        self.inner.destruct(table);
    }
}

impl fmt::Debug for TargetInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetInstance")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}
