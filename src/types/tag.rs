#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Camera trigger event extracted from the telemetry stream
///
/// Orientation angles are in radians, converted from the quaternion the log
/// records for the trigger sample. Tags keep the order records were read in,
/// which is non-decreasing in time but not necessarily contiguous in
/// `sequence`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraTag {
    pub sequence: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub roll: f64,
    pub pitch: f64,
    pub heading: f64,
    pub time_us: i64,
}
