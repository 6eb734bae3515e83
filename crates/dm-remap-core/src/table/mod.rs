//! Segment tables.
//!
//! A table is an ordered list of contiguous segments covering logical
//! sectors `0..len`, each bound to one constructed [`TargetInstance`].
//! Tables are built from definition lines of the form
//!
//! ```text
//! <start> <length> <target-type> <target args...>
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.
//!
//! Building resolves every target type through the [`TargetRegistry`] and
//! constructs its instance. Instances are destructed exactly once: when the
//! table is torn down, or when an unfinished [`TableBuilder`] is dropped
//! after a failed line.

mod dispatcher;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::args::ArgumentCursor;
use crate::device::DeviceTable;
use crate::error::{ArgError, TableError, TableResult};
use crate::io::Sector;
use crate::metrics::{SegmentCounters, TargetMetrics};
use crate::registry::TargetRegistry;
use crate::target::{SegmentBounds, TargetInstance};

pub use dispatcher::MappingDispatcher;

/// One segment of a table.
#[derive(Debug)]
pub(crate) struct Segment {
    bounds: SegmentBounds,
    instance: TargetInstance,
    counters: Option<SegmentCounters>,
}

/// Where a segment came from, for error reports and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// 1-based number of a definition line passed to
    /// [`TableBuilder::add_line`], counting blank and comment lines.
    Line(usize),
    /// 1-based position in the table of a segment added with
    /// [`TableBuilder::add_target`].
    Segment(usize),
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line(n) => write!(f, "line {n}"),
            Self::Segment(n) => write!(f, "segment {n}"),
        }
    }
}

/// Summary of a segment, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    pub start: Sector,
    pub len: Sector,
    pub target: String,
}

/// Destruct every segment in order.
fn destruct_all(
    segments: &mut Vec<Segment>,
    devices: &dyn DeviceTable,
    metrics: Option<&TargetMetrics>,
) {
    for segment in segments.drain(..) {
        debug!(
            start = segment.bounds.start,
            len = segment.bounds.len,
            target_type = segment.instance.type_name(),
            "destructing segment"
        );
        segment.instance.destruct(devices);
        if let Some(metrics) = metrics {
            metrics.record_destruct();
        }
    }
}

/// Builds a [`Table`] one segment at a time.
///
/// A failed `add_*` call leaves the builder as it was; the segments added so
/// far are destructed when the builder is dropped.
pub struct TableBuilder<'r> {
    registry: &'r TargetRegistry,
    devices: Arc<dyn DeviceTable>,
    metrics: Option<Arc<TargetMetrics>>,
    segments: Vec<Segment>,
    next_start: Sector,
    line: usize,
    diagnostics: Vec<String>,
}

impl<'r> TableBuilder<'r> {
    #[must_use]
    pub fn new(registry: &'r TargetRegistry, devices: Arc<dyn DeviceTable>) -> Self {
        Self {
            registry,
            devices,
            metrics: None,
            segments: Vec::new(),
            next_start: 0,
            line: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Count constructs and mapped requests in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<TargetMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Messages reported by target constructs, prefixed with their origin.
    #[must_use]
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Sectors covered so far.
    #[must_use]
    pub fn len_sectors(&self) -> Sector {
        self.next_start
    }

    /// Parse and add one table definition line.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Syntax`] for an unparseable line, or any error
    /// of [`add_target`](Self::add_target).
    pub fn add_line(&mut self, text: &str) -> TableResult<()> {
        self.line += 1;
        let at = Origin::Line(self.line);

        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            return Ok(());
        }

        let mut fields = ArgumentCursor::new(text);
        let syntax = |what: &str, e: ArgError| TableError::Syntax {
            at,
            reason: format!("{what}: {e}"),
        };
        let start = fields.next_u64().map_err(|e| syntax("segment start", e))?;
        let len = fields.next_u64().map_err(|e| syntax("segment length", e))?;
        let name = fields.next_token().map_err(|e| syntax("target type", e))?;

        self.add_segment(at, start, len, name, fields.remaining())
    }

    /// Add a segment of target type `name` with argument text `args`.
    ///
    /// Errors name the segment by its position in the table; the definition
    /// line count is left alone.
    ///
    /// # Errors
    ///
    /// - [`TableError::EmptySegment`] if `len` is zero
    /// - [`TableError::NotContiguous`] if `start` is not where the table ends
    /// - [`TableError::UnknownTargetName`] if `name` is not registered
    /// - [`TableError::Construct`] if the target rejects its arguments
    pub fn add_target(
        &mut self,
        start: Sector,
        len: Sector,
        name: &str,
        args: &str,
    ) -> TableResult<()> {
        let at = Origin::Segment(self.segments.len() + 1);
        self.add_segment(at, start, len, name, args)
    }

    fn add_segment(
        &mut self,
        at: Origin,
        start: Sector,
        len: Sector,
        name: &str,
        args: &str,
    ) -> TableResult<()> {
        if len == 0 {
            return Err(TableError::EmptySegment { at, start });
        }
        if start != self.next_start {
            return Err(TableError::NotContiguous {
                at,
                start,
                expected: self.next_start,
            });
        }
        let end = start.checked_add(len).ok_or_else(|| TableError::Syntax {
            at,
            reason: format!("segment {start}+{len} overflows the sector range"),
        })?;

        let target = self
            .registry
            .lookup(name)
            .ok_or_else(|| TableError::UnknownTargetName {
                at,
                name: name.to_string(),
            })?;

        self.segments
            .try_reserve(1)
            .map_err(|_| TableError::AllocationFailure { at })?;

        let bounds = SegmentBounds::new(start, len);
        let diagnostics = &mut self.diagnostics;
        let mut sink = |message: &str| {
            warn!(%at, target_type = name, reason = message, "target construct failed");
            diagnostics.push(format!("{at}: {name}: {message}"));
        };

        let instance = target
            .construct(
                self.devices.as_ref(),
                bounds,
                &mut ArgumentCursor::new(args),
                &mut sink,
            )
            .map_err(|source| {
                if let Some(metrics) = &self.metrics {
                    metrics.record_construct_failure(name, source.kind());
                }
                TableError::Construct {
                    at,
                    target: name.to_string(),
                    source,
                }
            })?;

        let counters = self.metrics.as_ref().map(|metrics| {
            metrics.record_construct(name);
            metrics.segment_counters(name)
        });

        debug!(%at, start, len, target_type = name, "segment added");
        self.segments.push(Segment {
            bounds,
            instance,
            counters,
        });
        self.next_start = end;
        Ok(())
    }

    /// Finish the table.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Empty`] if no segment was added.
    pub fn build(mut self) -> TableResult<Table> {
        if self.segments.is_empty() {
            return Err(TableError::Empty);
        }

        let segments = std::mem::take(&mut self.segments);
        info!(
            segments = segments.len(),
            sectors = self.next_start,
            "table built"
        );
        Ok(Table {
            segments,
            devices: Arc::clone(&self.devices),
            metrics: self.metrics.take(),
        })
    }

    /// Build a table from definition lines.
    ///
    /// On error every segment constructed so far is destructed before returning.
    ///
    /// # Errors
    ///
    /// Returns the first line's error, or [`TableError::Empty`].
    pub fn build_from_lines<I, S>(
        registry: &'r TargetRegistry,
        devices: Arc<dyn DeviceTable>,
        metrics: Option<Arc<TargetMetrics>>,
        lines: I,
    ) -> TableResult<Table>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = Self::new(registry, devices);
        builder.metrics = metrics;
        for line in lines {
            builder.add_line(line.as_ref())?;
        }
        builder.build()
    }
}

impl Drop for TableBuilder<'_> {
    fn drop(&mut self) {
        if !self.segments.is_empty() {
            debug!(
                segments = self.segments.len(),
                "discarding unfinished table"
            );
            destruct_all(
                &mut self.segments,
                self.devices.as_ref(),
                self.metrics.as_deref(),
            );
        }
    }
}

/// A built table of contiguous segments.
///
/// Dropping the table tears it down.
pub struct Table {
    segments: Vec<Segment>,
    devices: Arc<dyn DeviceTable>,
    metrics: Option<Arc<TargetMetrics>>,
}

impl Table {
    /// Total sectors covered by the table.
    #[must_use]
    pub fn len_sectors(&self) -> Sector {
        self.segments.last().map_or(0, |s| s.bounds.end())
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Describe each segment in order.
    #[must_use]
    pub fn segments(&self) -> Vec<SegmentInfo> {
        self.segments
            .iter()
            .map(|s| SegmentInfo {
                start: s.bounds.start,
                len: s.bounds.len,
                target: s.instance.type_name().to_string(),
            })
            .collect()
    }

    /// Lock-free request router over this table's segments.
    #[must_use]
    pub fn dispatcher(&self) -> MappingDispatcher<'_> {
        MappingDispatcher::new(&self.segments)
    }

    /// Destruct every segment exactly once.
    pub fn teardown(mut self) {
        self.destruct_segments();
    }

    fn destruct_segments(&mut self) {
        if self.segments.is_empty() {
            return;
        }
        info!(segments = self.segments.len(), "tearing down table");
        destruct_all(
            &mut self.segments,
            self.devices.as_ref(),
            self.metrics.as_deref(),
        );
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        self.destruct_segments();
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("segments", &self.segments)
            .finish_non_exhaustive()
    }
}
