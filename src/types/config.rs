#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for one camera export run
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CamExportConfig {
    /// Image filename pattern with a single integer placeholder,
    /// e.g. `IMG_%04d.jpg`
    pub image_name_format: String,
    /// Number assigned to the image matching the first collected tag
    pub start_number: i64,
    /// Inclusive lower time bound, log clock microseconds
    pub time_start_us: i64,
    /// Exclusive upper time bound, log clock microseconds
    pub time_end_us: i64,
}

impl Default for CamExportConfig {
    fn default() -> Self {
        Self {
            image_name_format: "IMG_%04d.jpg".to_string(),
            start_number: 1,
            time_start_us: 0,
            time_end_us: i64::MAX,
        }
    }
}

/// Final counters of a completed camera export
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CamExportReport {
    /// Tags collected from the telemetry stream
    pub tags: usize,
    /// Synthetic rows inserted for sequence gaps
    pub missing_tags: usize,
    /// Tags whose computed image file was not on disk
    pub missing_images: usize,
    /// Tags whose image could not be read or rewritten
    pub image_errors: usize,
    /// Standard deviation of the drift derivative, seconds
    pub jitter_seconds: f64,
}

impl CamExportReport {
    /// One-line summary in the shape shown to the user at the end of a run
    pub fn summary(&self) -> String {
        format!(
            "Exported {} tags, missing tags {}, images missing {}, image errors {}, std dev {:.2}",
            self.tags, self.missing_tags, self.missing_images, self.image_errors, self.jitter_seconds
        )
    }
}
