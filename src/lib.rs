//! Flight-log track and camera export
//!
//! Turns a time-ordered telemetry stream into two derived artifacts: a
//! mode-segmented track delivered to a pluggable sink, and a geotagged image
//! batch where camera-trigger events are correlated by sequence number with
//! JPEG files on disk and written back into their EXIF metadata.
//!
//! # Features
//!
//! - **`csv`** (default): CSV-backed telemetry reader and parameter loading
//! - **`cli`** (default): build the command-line binary
//! - **`serde`**: serialization/deserialization of the value types
//!
//! # Quick Start
//!
//! Export the camera tags of a log window, geotagging matched images:
//! ```rust,no_run
//! use flighttag::{CamExporter, CamExportConfig, CsvTelemetryReader, ExportOutcome};
//! use std::path::Path;
//!
//! let mut reader = CsvTelemetryReader::from_path(Path::new("flight.csv")).unwrap();
//! let exporter = CamExporter::new(CamExportConfig::default());
//! match exporter.export(&mut reader, Path::new("tags.csv")).unwrap() {
//!     ExportOutcome::Completed(report) => println!("{}", report.summary()),
//!     ExportOutcome::Canceled => println!("Export canceled"),
//! }
//! ```
//!
//! Export the segmented track to GPX:
//! ```rust,no_run
//! use flighttag::{export_track, CsvTelemetryReader, GpxTrackSink};
//! use std::path::Path;
//!
//! let mut source = CsvTelemetryReader::from_path(Path::new("flight.csv")).unwrap();
//! let mut sink = GpxTrackSink::create(Path::new("flight.gpx"), "flight").unwrap();
//! export_track(&mut source, &mut sink).unwrap();
//! ```
//!
//! # Public API
//!
//! ## Pipelines
//! - [`export_track`] - Single-pass mode-segmented track export
//! - [`CamExporter`] - Cancellable two-pass camera tag export
//!
//! ## Capabilities
//! - [`TelemetryReader`] / [`TrackPointSource`] - Consumed input streams
//! - [`TrackSink`] - Produced track output, one impl per format
//!
//! ## Data Types
//! - [`TrackPoint`], [`CameraTag`] - Value records of both pipelines
//! - [`CamExportConfig`], [`CamExportReport`] - Job configuration and counters
//! - [`CancelToken`], [`ProgressEvent`], [`ExportOutcome`] - Job control surface

// Module declarations
pub mod camera;
#[cfg(feature = "csv")]
pub mod csv_reader;
pub mod drift;
pub mod error;
pub mod export;
pub mod geotag;
pub mod gpx;
pub mod job;
pub mod reader;
pub mod segment;
pub mod sink;
pub mod types;

// Re-export the working set at the crate root for convenience
pub use camera::{collect_camera_tags, TagScan};
#[cfg(feature = "csv")]
pub use csv_reader::{load_parameters, CsvTelemetryReader};
pub use drift::{DriftEstimator, DriftObservation};
pub use error::ExportError;
pub use export::CamExporter;
pub use geotag::{format_image_name, geotag_image, read_capture_time_us};
pub use gpx::GpxTrackSink;
pub use job::{CancelToken, ExportOutcome, ProgressEvent};
pub use reader::{TelemetryReader, TelemetryRecord, TrackPointSource};
pub use segment::{export_track, recovery_point};
pub use sink::TrackSink;
pub use types::{CamExportConfig, CamExportReport, CameraTag, TrackPoint};

// Re-export Result type for convenience
pub use anyhow::Result;
