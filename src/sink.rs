//! Track output capability
//!
//! One export skeleton (start, parts, points, end) drives any number of
//! output formats; each format implements [`TrackSink`] instead of
//! subclassing an exporter. See [`crate::gpx::GpxTrackSink`] for a concrete
//! implementation.

use crate::types::TrackPoint;
use crate::Result;

/// Receives the segmented track produced by [`crate::segment::export_track`]
///
/// Call order: `start`, then for each part `part_start`, `point`*,
/// `part_end`, then one `setpoints`, then up to eight `single_point`, then
/// `end`. Any call may fail with an I/O error; implementations must release
/// their underlying resource on drop so every exit path closes the output.
pub trait TrackSink {
    fn start(&mut self) -> Result<()>;
    fn part_start(&mut self, name: &str) -> Result<()>;
    fn point(&mut self, point: &TrackPoint) -> Result<()>;
    fn part_end(&mut self) -> Result<()>;
    fn setpoints(&mut self, points: &[TrackPoint]) -> Result<()>;
    fn single_point(&mut self, point: &TrackPoint, label: &str) -> Result<()>;
    fn end(&mut self) -> Result<()>;
}
