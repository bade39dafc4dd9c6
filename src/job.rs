//! Batch-job plumbing shared by the export pipelines
//!
//! The export runs as one long background task. The interactive surface
//! talks to it through exactly two primitives: a shared cancellation flag
//! polled cooperatively by the pipeline, and a one-way channel of discrete
//! progress events.

use crate::types::CamExportReport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag
///
/// Clone freely; all clones observe the same flag. The pipeline polls it once
/// per telemetry record while collecting tags and once per row while writing,
/// so cancellation takes effect before the next row, never mid-row.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Discrete progress updates emitted during a camera export
///
/// Sent best-effort over an `mpsc` channel; a dropped receiver never stalls
/// the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// First pass started: scanning the telemetry stream for tags
    CountingTags,
    /// First pass finished; `total` rows of real tags will follow
    TagsCounted { total: usize },
    /// One row (real or synthetic) was written; `row` is 1-based over real tags
    RowWritten { row: usize, total: usize },
}

/// Terminal state of an export run
///
/// Cancellation is a normal terminal state, reported distinctly from both
/// completion and failure; fatal errors surface as `Err` instead.
#[derive(Debug)]
pub enum ExportOutcome {
    Completed(CamExportReport),
    Canceled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_canceled());
        token.cancel();
        assert!(clone.is_canceled());
    }
}
