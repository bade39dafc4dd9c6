//! Track segmentation
//!
//! Splits the point stream into contiguous parts at flight-mode boundaries
//! and feeds them to a [`TrackSink`], diverting setpoints into a separate
//! batch and appending recovery waypoints when the source carries a
//! parameter map.

use crate::reader::TrackPointSource;
use crate::sink::TrackSink;
use crate::types::TrackPoint;
use crate::Result;
use std::collections::HashMap;

/// Recovery waypoint slots stored in the flight parameters
pub const RECOVERY_POINT_IDS: [&str; 8] = ["1", "2", "3", "4", "A", "B", "C", "D"];

/// Part name used when points carry no flight mode
const GENERIC_PART_NAME: &str = "Track";

/// Run the single-pass track export
///
/// Consumes `source` to exhaustion and drives `sink` through the fixed call
/// sequence described on [`TrackSink`]. Parts are opened on the first
/// non-setpoint point and on every mode change; the part index only advances
/// for named modes. Setpoint-flagged points never enter a part body and are
/// emitted once, in input order, after the last part closes.
///
/// Sink failures propagate; the sink's own drop releases its resource on
/// every exit path.
pub fn export_track<S, K>(source: &mut S, sink: &mut K) -> Result<()>
where
    S: TrackPointSource + ?Sized,
    K: TrackSink + ?Sized,
{
    let mut started = false;
    let mut current_mode: Option<String> = None;
    let mut part_index = 0usize;
    let mut setpoints: Vec<TrackPoint> = Vec::new();

    sink.start()?;

    while let Some(point) = source.next_point()? {
        if point.setpoint {
            setpoints.push(point);
            continue;
        }

        let mode_changed = point.flight_mode.is_some() && point.flight_mode != current_mode;
        if !started || mode_changed {
            if started {
                // Repeat the boundary point in the closing part so adjacent
                // parts stay connected.
                sink.point(&point)?;
                sink.part_end()?;
            }
            current_mode = point.flight_mode.clone();
            let part_name = match &point.flight_mode {
                Some(mode) => {
                    let name = format!("{}: {}", part_index, mode);
                    part_index += 1;
                    name
                }
                None => GENERIC_PART_NAME.to_string(),
            };
            sink.part_start(&part_name)?;
            started = true;
        }

        sink.point(&point)?;
    }

    if started {
        sink.part_end()?;
    }

    sink.setpoints(&setpoints)?;

    // Capability query: only sources backed by a log with parameter storage
    // can supply recovery waypoints.
    if let Some(parameters) = source.parameters() {
        for id in RECOVERY_POINT_IDS {
            let label = format!("RTL {}", id);
            sink.single_point(&recovery_point(parameters, id), &label)?;
        }
    }

    sink.end()
}

/// Build one recovery waypoint from the flat parameter map
///
/// Looks up `RTL_P{id}_LAT`, `RTL_P{id}_LON` and `RTL_P{id}_ALT`; absent keys
/// default to 0.0 rather than being an error, so unset slots come out as
/// zero-valued points. Timestamp is 0 and the point is neither a setpoint nor
/// mode-labeled.
pub fn recovery_point(parameters: &HashMap<String, f64>, id: &str) -> TrackPoint {
    let axis = |name: &str| {
        parameters
            .get(&format!("RTL_P{}_{}", id, name))
            .copied()
            .unwrap_or(0.0)
    };
    TrackPoint::new(axis("LAT"), axis("LON"), axis("ALT"), 0)
}
