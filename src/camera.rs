//! Camera trigger extraction
//!
//! First pass of the camera export: scan the telemetry stream over the
//! configured time window and materialize every camera-trigger record as a
//! [`CameraTag`], converting the logged attitude quaternion to Euler angles.

use crate::error::ExportError;
use crate::job::CancelToken;
use crate::reader::{TelemetryReader, TelemetryRecord};
use crate::types::{CamExportConfig, CameraTag};
use crate::Result;
use log::warn;
use nalgebra::{Quaternion, UnitQuaternion};

/// Field marking a record as a camera trigger
pub const CAMERA_SEQUENCE_FIELD: &str = "CAMT.seq";

const LAT_FIELD: &str = "CAMT.lat";
const LON_FIELD: &str = "CAMT.lon";
const ALT_FIELD: &str = "CAMT.alt";
const QW_FIELD: &str = "CAMT.qw";
const QX_FIELD: &str = "CAMT.qx";
const QY_FIELD: &str = "CAMT.qy";
const QZ_FIELD: &str = "CAMT.qz";

/// Result of the tag-collection pass
#[derive(Debug)]
pub enum TagScan {
    /// Stream exhausted or end bound reached; tags are in record read order
    Complete(Vec<CameraTag>),
    /// Cooperative cancellation observed mid-scan
    Canceled,
}

/// Collect all camera tags in `[time_start_us, time_end_us)`
///
/// Stops normally on end of stream or on the first record at or past the end
/// bound; checks the cancellation token once per record. Tags keep record
/// read order and are never sorted by sequence number.
pub fn collect_camera_tags(
    reader: &mut dyn TelemetryReader,
    config: &CamExportConfig,
    cancel: &CancelToken,
) -> Result<TagScan> {
    reader
        .seek(config.time_start_us)
        .map_err(|err| ExportError::Stream(format!("seek to {} us: {:#}", config.time_start_us, err)))?;

    let mut tags = Vec::new();
    loop {
        let next = reader
            .read_next()
            .map_err(|err| ExportError::Stream(format!("read: {:#}", err)))?;
        let record = match next {
            Some(record) => record,
            None => break,
        };
        if record.time_us >= config.time_end_us {
            break;
        }
        if cancel.is_canceled() {
            return Ok(TagScan::Canceled);
        }
        if let Some(tag) = tag_from_record(&record) {
            tags.push(tag);
        }
    }

    Ok(TagScan::Complete(tags))
}

/// Build a tag from a trigger record, or `None` for non-trigger records
fn tag_from_record(record: &TelemetryRecord) -> Option<CameraTag> {
    let sequence = record.fields.get(CAMERA_SEQUENCE_FIELD)?;

    let field = |name: &str| record.fields.get(name).copied();
    let (lat, lon, alt) = match (field(LAT_FIELD), field(LON_FIELD), field(ALT_FIELD)) {
        (Some(lat), Some(lon), Some(alt)) => (lat, lon, alt),
        _ => {
            warn!(
                "camera trigger at {} us has incomplete position, skipped",
                record.time_us
            );
            return None;
        }
    };

    // The middle two quaternion components are stored under each other's
    // field name; this swap is a wire convention and must stay.
    let quaternion = match (
        field(QW_FIELD),
        field(QY_FIELD),
        field(QX_FIELD),
        field(QZ_FIELD),
    ) {
        (Some(w), Some(x), Some(y), Some(z)) => Quaternion::new(w, x, y, z),
        _ => {
            warn!(
                "camera trigger at {} us has incomplete attitude, skipped",
                record.time_us
            );
            return None;
        }
    };

    let rotation = UnitQuaternion::from_quaternion(quaternion).to_rotation_matrix();
    let (roll, pitch, heading) = rotation.euler_angles();

    Some(CameraTag {
        sequence: *sequence as u32,
        latitude: lat,
        longitude: lon,
        altitude: alt,
        roll,
        pitch,
        heading,
        time_us: record.time_us,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::f64::consts::FRAC_PI_2;

    struct FakeReader {
        records: Vec<TelemetryRecord>,
        cursor: usize,
    }

    impl FakeReader {
        fn new(records: Vec<TelemetryRecord>) -> Self {
            Self { records, cursor: 0 }
        }
    }

    impl TelemetryReader for FakeReader {
        fn seek(&mut self, time_us: i64) -> Result<()> {
            self.cursor = self
                .records
                .iter()
                .position(|r| r.time_us >= time_us)
                .unwrap_or(self.records.len());
            Ok(())
        }
        fn read_next(&mut self) -> Result<Option<TelemetryRecord>> {
            let record = self.records.get(self.cursor).cloned();
            if record.is_some() {
                self.cursor += 1;
            }
            Ok(record)
        }
        fn start_us(&self) -> i64 {
            self.records.first().map(|r| r.time_us).unwrap_or(0)
        }
        fn duration_us(&self) -> i64 {
            self.records.last().map(|r| r.time_us).unwrap_or(0) - self.start_us()
        }
    }

    fn trigger_record(time_us: i64, sequence: f64, q: [f64; 4]) -> TelemetryRecord {
        let mut fields = HashMap::new();
        fields.insert(CAMERA_SEQUENCE_FIELD.to_string(), sequence);
        fields.insert(LAT_FIELD.to_string(), 47.1);
        fields.insert(LON_FIELD.to_string(), 8.2);
        fields.insert(ALT_FIELD.to_string(), 120.0);
        fields.insert(QW_FIELD.to_string(), q[0]);
        fields.insert(QX_FIELD.to_string(), q[1]);
        fields.insert(QY_FIELD.to_string(), q[2]);
        fields.insert(QZ_FIELD.to_string(), q[3]);
        TelemetryRecord { time_us, fields }
    }

    fn plain_record(time_us: i64) -> TelemetryRecord {
        let mut fields = HashMap::new();
        fields.insert("ATT.pitch".to_string(), 0.1);
        TelemetryRecord { time_us, fields }
    }

    fn config(start: i64, end: i64) -> CamExportConfig {
        CamExportConfig {
            time_start_us: start,
            time_end_us: end,
            ..CamExportConfig::default()
        }
    }

    fn complete(scan: TagScan) -> Vec<CameraTag> {
        match scan {
            TagScan::Complete(tags) => tags,
            TagScan::Canceled => panic!("scan was canceled"),
        }
    }

    #[test]
    fn only_trigger_records_become_tags() {
        let mut reader = FakeReader::new(vec![
            plain_record(10),
            trigger_record(20, 5.0, [1.0, 0.0, 0.0, 0.0]),
            plain_record(30),
            trigger_record(40, 6.0, [1.0, 0.0, 0.0, 0.0]),
        ]);
        let tags = complete(
            collect_camera_tags(&mut reader, &config(0, i64::MAX), &CancelToken::new()).unwrap(),
        );
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].sequence, 5);
        assert_eq!(tags[1].sequence, 6);
        assert_eq!(tags[0].latitude, 47.1);
    }

    #[test]
    fn end_bound_is_exclusive() {
        let mut reader = FakeReader::new(vec![
            trigger_record(10, 1.0, [1.0, 0.0, 0.0, 0.0]),
            trigger_record(20, 2.0, [1.0, 0.0, 0.0, 0.0]),
        ]);
        let tags = complete(
            collect_camera_tags(&mut reader, &config(0, 20), &CancelToken::new()).unwrap(),
        );
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].sequence, 1);
    }

    #[test]
    fn tags_keep_read_order_not_sequence_order() {
        let mut reader = FakeReader::new(vec![
            trigger_record(10, 9.0, [1.0, 0.0, 0.0, 0.0]),
            trigger_record(20, 3.0, [1.0, 0.0, 0.0, 0.0]),
        ]);
        let tags = complete(
            collect_camera_tags(&mut reader, &config(0, i64::MAX), &CancelToken::new()).unwrap(),
        );
        let sequences: Vec<u32> = tags.iter().map(|t| t.sequence).collect();
        assert_eq!(sequences, vec![9, 3]);
    }

    struct FaultyReader;

    impl TelemetryReader for FaultyReader {
        fn seek(&mut self, _time_us: i64) -> Result<()> {
            Ok(())
        }
        fn read_next(&mut self) -> Result<Option<TelemetryRecord>> {
            Err(anyhow::anyhow!("truncated stream"))
        }
        fn start_us(&self) -> i64 {
            0
        }
        fn duration_us(&self) -> i64 {
            0
        }
    }

    #[test]
    fn reader_faults_surface_as_stream_errors() {
        let err = collect_camera_tags(&mut FaultyReader, &config(0, i64::MAX), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExportError>(),
            Some(ExportError::Stream(_))
        ));
        assert!(err.to_string().contains("truncated stream"));
    }

    #[test]
    fn cancellation_is_reported_distinctly() {
        let mut reader = FakeReader::new(vec![trigger_record(10, 1.0, [1.0, 0.0, 0.0, 0.0])]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let scan = collect_camera_tags(&mut reader, &config(0, i64::MAX), &cancel).unwrap();
        assert!(matches!(scan, TagScan::Canceled));
    }

    #[test]
    fn identity_quaternion_gives_level_attitude() {
        let mut reader = FakeReader::new(vec![trigger_record(10, 1.0, [1.0, 0.0, 0.0, 0.0])]);
        let tags = complete(
            collect_camera_tags(&mut reader, &config(0, i64::MAX), &CancelToken::new()).unwrap(),
        );
        assert!(tags[0].roll.abs() < 1e-9);
        assert!(tags[0].pitch.abs() < 1e-9);
        assert!(tags[0].heading.abs() < 1e-9);
    }

    #[test]
    fn middle_quaternion_components_are_read_swapped() {
        // A 90 degree roll about x has its x component stored in the qy
        // field; the swap must put it back on the roll axis.
        let half = FRAC_PI_2 / 2.0;
        let q = [half.cos(), 0.0, half.sin(), 0.0]; // [w, qx field, qy field, qz field]
        let mut reader = FakeReader::new(vec![trigger_record(10, 1.0, q)]);
        let tags = complete(
            collect_camera_tags(&mut reader, &config(0, i64::MAX), &CancelToken::new()).unwrap(),
        );
        assert!((tags[0].roll - FRAC_PI_2).abs() < 1e-9);
        assert!(tags[0].pitch.abs() < 1e-9);
    }
}
