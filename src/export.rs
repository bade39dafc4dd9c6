//! Camera export controller
//!
//! Orchestrates the geotagged image batch as one cancellable job: a first
//! pass materializes the camera-tag list, a second pass writes one CSV row
//! per real or synthetic tag, updates the drift estimator, and rewrites
//! matched images, strictly in tag order. Row-local failures (missing image,
//! unreadable metadata) are counted and marked in the row; only output-file
//! and stream faults abort the batch.

use crate::camera::{collect_camera_tags, TagScan};
use crate::drift::DriftEstimator;
use crate::error::ExportError;
use crate::geotag::{format_image_name, geotag_image, read_capture_time_us, tagged_image_path};
use crate::job::{CancelToken, ExportOutcome, ProgressEvent};
use crate::reader::TelemetryReader;
use crate::types::{CamExportConfig, CamExportReport, CameraTag};
use crate::Result;
use anyhow::Context;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

/// One camera export job
///
/// Owns all intermediate state for a single invocation; nothing is retained
/// across runs. Clone the cancel token before starting the job to keep a
/// handle for the controlling surface.
pub struct CamExporter {
    config: CamExportConfig,
    cancel: CancelToken,
    progress: Option<Sender<ProgressEvent>>,
}

impl CamExporter {
    pub fn new(config: CamExportConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Attach a progress channel; events are sent best-effort
    pub fn with_progress(mut self, progress: Sender<ProgressEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Handle for requesting cooperative cancellation
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn send_progress(&self, event: ProgressEvent) {
        if let Some(progress) = &self.progress {
            let _ = progress.send(event);
        }
    }

    /// Run the export, writing `csv_path` and a `.log` sidecar beside it
    ///
    /// Source images are looked up in the CSV file's directory. On
    /// cancellation the files written so far are kept and
    /// [`ExportOutcome::Canceled`] is returned; fatal faults come back as
    /// `Err`.
    pub fn export(
        &self,
        reader: &mut dyn TelemetryReader,
        csv_path: &Path,
    ) -> Result<ExportOutcome> {
        let mut csv = BufWriter::new(
            File::create(csv_path)
                .map_err(ExportError::from)
                .with_context(|| format!("Failed to create output file: {:?}", csv_path))?,
        );
        let sidecar_path = sidecar_log_path(csv_path);
        let mut sidecar = BufWriter::new(
            File::create(&sidecar_path)
                .map_err(ExportError::from)
                .with_context(|| format!("Failed to create sidecar log: {:?}", sidecar_path))?,
        );

        writeln!(csv, "imagename,latitude,longitude,altitude,pitch,roll,yaw")?;

        self.send_progress(ProgressEvent::CountingTags);
        let tags = match collect_camera_tags(reader, &self.config, &self.cancel)? {
            TagScan::Complete(tags) => tags,
            TagScan::Canceled => {
                info!("export canceled while counting tags");
                csv.flush()?;
                return Ok(ExportOutcome::Canceled);
            }
        };
        info!("exporting {} tags", tags.len());
        self.send_progress(ProgressEvent::TagsCounted { total: tags.len() });

        let image_dir = csv_path.parent().unwrap_or_else(|| Path::new("."));
        let first_sequence = tags.first().map(|tag| tag.sequence).unwrap_or(0);
        let mut last_sequence: Option<u32> = None;
        let mut drift = DriftEstimator::new();
        let mut report = CamExportReport {
            tags: tags.len(),
            ..Default::default()
        };

        for (index, tag) in tags.iter().enumerate() {
            if self.cancel.is_canceled() {
                info!("export canceled after {} of {} rows", index, tags.len());
                csv.flush()?;
                sidecar.flush()?;
                return Ok(ExportOutcome::Canceled);
            }

            // Sequence gap: one synthetic row per missing trigger, named by
            // the same formula as real rows.
            if let Some(last) = last_sequence {
                for missing in (last + 1)..tag.sequence {
                    report.missing_tags += 1;
                    let name = self.image_name(missing, first_sequence)?;
                    writeln!(csv, "{},,,,,,,tag missing", name)?;
                }
            }
            last_sequence = Some(tag.sequence);

            let image_name = self.image_name(tag.sequence, first_sequence)?;
            write!(
                csv,
                "{},{:.7},{:.7},{:.3},{:.3},{:.3},{:.3}",
                image_name,
                tag.latitude,
                tag.longitude,
                tag.altitude,
                tag.pitch.to_degrees(),
                tag.roll.to_degrees(),
                tag.heading.to_degrees()
            )?;

            let source = image_dir.join(&image_name);
            if source.exists() {
                self.write_drift_line(&source, &image_name, tag, index + 1, &mut drift, &mut sidecar)?;
                let dest = tagged_image_path(&source);
                if let Err(err) = geotag_image(&source, &dest, tag) {
                    warn!("failed to geotag {}: {:#}", image_name, err);
                    report.image_errors += 1;
                    write!(csv, ",image error")?;
                }
            } else {
                report.missing_images += 1;
                write!(csv, ",image missing")?;
                write!(sidecar, "Missing image {}", image_name)?;
            }

            writeln!(csv)?;
            writeln!(sidecar)?;
            self.send_progress(ProgressEvent::RowWritten {
                row: index + 1,
                total: tags.len(),
            });
        }

        csv.flush()?;
        sidecar.flush()?;

        drift.finish_report(&mut report);
        info!("{}", report.summary());
        Ok(ExportOutcome::Completed(report))
    }

    fn image_name(&self, sequence: u32, first_sequence: u32) -> Result<String> {
        format_image_name(
            &self.config.image_name_format,
            image_index(sequence, first_sequence, self.config.start_number),
        )
    }

    /// Match the image clock against the tag clock and log one sidecar line
    ///
    /// A missing or unparseable capture timestamp is row-local: the image is
    /// still geotagged, the sidecar records the gap, and the estimator is
    /// not fed. Only sidecar I/O faults propagate.
    fn write_drift_line(
        &self,
        source: &Path,
        image_name: &str,
        tag: &CameraTag,
        position: usize,
        drift: &mut DriftEstimator,
        sidecar: &mut impl Write,
    ) -> Result<()> {
        let capture_time = read_capture_time_us(source).unwrap_or_else(|err| {
            debug!("capture time unavailable for {}: {:#}", image_name, err);
            None
        });
        match capture_time {
            Some(image_time_us) => {
                let obs = drift.observe(position as u64, tag.time_us, image_time_us);
                write!(
                    sidecar,
                    "tag {} ({:.2}s), image {} ({:.2}s), time diff: {:.2}s",
                    tag.sequence,
                    obs.tag_rel_us as f64 / 1e6,
                    image_name,
                    obs.image_rel_us as f64 / 1e6,
                    obs.diff_us as f64 / 1e6
                )?;
                if obs.large_diff {
                    write!(sidecar, ", LARGE DIFF")?;
                }
            }
            None => {
                write!(
                    sidecar,
                    "tag {}, image {}, missing original date time",
                    tag.sequence, image_name
                )?;
            }
        }
        Ok(())
    }
}

/// The sidecar text log sits beside the CSV with an extra `.log` suffix
fn sidecar_log_path(csv_path: &Path) -> PathBuf {
    let mut path = csv_path.as_os_str().to_os_string();
    path.push(".log");
    PathBuf::from(path)
}

/// Image number for a trigger sequence value
///
/// The trigger sequence can start anywhere, so the first collected tag's
/// sequence is subtracted before the configured start number is applied.
fn image_index(sequence: u32, first_sequence: u32, start_number: i64) -> i64 {
    sequence as i64 - first_sequence as i64 + start_number
}
