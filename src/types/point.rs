#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One position sample of the track stream
///
/// Points arrive in non-decreasing `time_us` order; the pipeline never
/// reorders them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub time_us: i64,
    /// Active flight mode label, if the log carries one for this sample
    pub flight_mode: Option<String>,
    /// Commanded position rather than a measured one; kept out of track parts
    pub setpoint: bool,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, time_us: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            time_us,
            flight_mode: None,
            setpoint: false,
        }
    }

    pub fn with_mode(mut self, mode: &str) -> Self {
        self.flight_mode = Some(mode.to_string());
        self
    }

    pub fn as_setpoint(mut self) -> Self {
        self.setpoint = true;
        self
    }
}
