//! Consumed input capabilities
//!
//! The flight-log parser itself is out of scope: the pipeline only needs a
//! sequential reader over timestamped field maps, and optionally a position
//! stream already mapped to [`TrackPoint`]s. Both are expressed as traits so
//! any log backend can plug in.

use crate::types::TrackPoint;
use crate::Result;
use std::collections::HashMap;

/// One telemetry record: a timestamp plus named numeric fields
#[derive(Debug, Clone, Default)]
pub struct TelemetryRecord {
    pub time_us: i64,
    pub fields: HashMap<String, f64>,
}

/// Sequential, seekable reader over a bounded telemetry log
pub trait TelemetryReader {
    /// Position the reader at the first record with time >= `time_us`
    fn seek(&mut self, time_us: i64) -> Result<()>;

    /// Read the next record, or `None` at end of stream
    ///
    /// End of stream is a normal condition, not an error.
    fn read_next(&mut self) -> Result<Option<TelemetryRecord>>;

    /// Timestamp of the first record in the log
    fn start_us(&self) -> i64;

    /// Time span covered by the log
    fn duration_us(&self) -> i64;

    /// Flat flight-parameter map, for readers that carry one
    ///
    /// Capability query: backends without parameter storage keep the default.
    fn parameters(&self) -> Option<&HashMap<String, f64>> {
        None
    }
}

/// Ordered stream of track points, non-decreasing in time
pub trait TrackPointSource {
    /// Read the next point, or `None` at end of stream
    fn next_point(&mut self) -> Result<Option<TrackPoint>>;

    /// Flat flight-parameter map capability, same contract as
    /// [`TelemetryReader::parameters`]
    fn parameters(&self) -> Option<&HashMap<String, f64>> {
        None
    }
}
