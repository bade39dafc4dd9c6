//! Clock drift estimation
//!
//! The log clock and the camera's capture clock run independently. Per
//! matched tag the estimator tracks the drift between both clocks relative to
//! their first matched occurrence, and accumulates running mean/variance of
//! the drift's sample-to-sample change. The standard deviation of that series
//! is the batch's timing-jitter figure.

use crate::types::CamExportReport;

/// Absolute drift beyond which a sidecar line gets the LARGE DIFF flag
const LARGE_DIFF_SECONDS: f64 = 10.0;

/// Result of feeding one matched tag to the estimator
#[derive(Debug, Clone, Copy)]
pub struct DriftObservation {
    /// Drift of the image clock against the log clock, microseconds
    pub diff_us: i64,
    /// Image capture time relative to the first matched image
    pub image_rel_us: i64,
    /// Tag time relative to the first matched tag
    pub tag_rel_us: i64,
    /// Set when `|diff_us|` exceeds 10 seconds
    pub large_diff: bool,
}

/// Online mean/variance accumulator over the drift derivative
///
/// The variance denominator is the overall 1-based tag position handed in by
/// the caller: every tag advances it whether or not an image matched, so the
/// estimate mixes matched and unmatched tags. Preserved reference behavior.
#[derive(Debug, Default)]
pub struct DriftEstimator {
    image_start_us: Option<i64>,
    tag_start_us: Option<i64>,
    prev_diff_us: Option<i64>,
    mean: f64,
    m2: f64,
    denominator: u64,
}

impl DriftEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one tag with a resolvable image capture timestamp
    ///
    /// `n` is the tag's 1-based position over the whole batch. The first
    /// matched tag anchors both clocks, so its drift is zero by definition.
    pub fn observe(&mut self, n: u64, tag_time_us: i64, image_time_us: i64) -> DriftObservation {
        let image_start = *self.image_start_us.get_or_insert(image_time_us);
        let tag_start = *self.tag_start_us.get_or_insert(tag_time_us);

        let image_rel_us = image_time_us - image_start;
        let tag_rel_us = tag_time_us - tag_start;
        let diff_us = image_rel_us - tag_rel_us;

        let prev_diff_us = *self.prev_diff_us.get_or_insert(diff_us);
        let diff_diff = (prev_diff_us - diff_us) as f64;
        self.accumulate(n, diff_diff);
        self.prev_diff_us = Some(diff_us);

        DriftObservation {
            diff_us,
            image_rel_us,
            tag_rel_us,
            large_diff: (diff_us as f64 / 1e6).abs() > LARGE_DIFF_SECONDS,
        }
    }

    fn accumulate(&mut self, n: u64, diff_diff: f64) {
        let delta = diff_diff - self.mean;
        self.mean += delta / n as f64;
        self.m2 += delta * (diff_diff - self.mean);
        self.denominator = n;
    }

    /// Running mean of the drift derivative, microseconds
    pub fn mean_us(&self) -> f64 {
        self.mean
    }

    /// Running variance of the drift derivative, microseconds squared
    pub fn variance_us2(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.m2 / self.denominator as f64
        }
    }

    /// Standard deviation of the drift derivative, seconds
    pub fn jitter_seconds(&self) -> f64 {
        self.variance_us2().sqrt() / 1e6
    }

    /// Fold the jitter figure into a finished report
    pub fn finish_report(&self, report: &mut CamExportReport) {
        report.jitter_seconds = self.jitter_seconds();
    }
}
