//! Image metadata rewrite
//!
//! Correlated tags are written back into the matched JPEG's EXIF block: GPS
//! position in degrees, altitude as an unsigned rational with the matching
//! sea-level reference, and a fixed software identifier. The source image is never
//! touched; a `_tagged.jpg` copy is written beside it with the pixel data
//! carried over unchanged.

use crate::error::ExportError;
use crate::types::CameraTag;
use crate::Result;
use anyhow::Context;
use chrono::NaiveDateTime;
use exif::{In, Tag, Value};
use little_exif::exif_tag::ExifTag;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;
use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Product identifier written into the EXIF software tag
pub const SOFTWARE_TAG: &str = "FlightTag";

/// EXIF capture timestamp format, second resolution
const DATE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

const ALTITUDE_REF_ABOVE_SEA_LEVEL: u8 = 0;
const ALTITUDE_REF_BELOW_SEA_LEVEL: u8 = 1;

/// Expand the caller-supplied image name pattern for one image index
///
/// The pattern carries a single printf-style integer placeholder, `%d` or
/// zero-padded `%0Nd` (e.g. `IMG_%04d.jpg`); anything else is a
/// configuration error.
pub fn format_image_name(pattern: &str, index: i64) -> Result<String> {
    let bad = |why: &str| -> anyhow::Error {
        ExportError::Config(format!("image name pattern {:?}: {}", pattern, why)).into()
    };

    let percent = match pattern.find('%') {
        Some(pos) => pos,
        None => return Err(bad("no integer placeholder")),
    };
    let rest = &pattern[percent + 1..];

    let mut width = String::new();
    let mut placeholder_len = None;
    for (offset, c) in rest.char_indices() {
        if c.is_ascii_digit() {
            width.push(c);
        } else if c == 'd' {
            placeholder_len = Some(offset + 1);
            break;
        } else {
            return Err(bad("placeholder must be %d or %0Nd"));
        }
    }
    let placeholder_len = match placeholder_len {
        Some(len) => len,
        None => return Err(bad("unterminated placeholder")),
    };

    let formatted = if width.is_empty() {
        index.to_string()
    } else {
        let pad: usize = width.parse().unwrap_or(0);
        if width.starts_with('0') {
            format!("{:0pad$}", index)
        } else {
            format!("{:pad$}", index)
        }
    };

    Ok(format!(
        "{}{}{}",
        &pattern[..percent],
        formatted,
        &rest[placeholder_len..]
    ))
}

/// Output path for the geotagged copy: `<imagename>_tagged.jpg` beside the source
pub fn tagged_image_path(source: &Path) -> PathBuf {
    let mut name = source
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push("_tagged.jpg");
    source.with_file_name(name)
}

/// Read the image's capture timestamp, log-clock microseconds since epoch
///
/// Returns `Ok(None)` when the image has no EXIF block, no
/// `DateTimeOriginal` field, or an unparseable one; only failure to open the
/// file is an error. Resolution is one second.
pub fn read_capture_time_us(path: &Path) -> Result<Option<i64>> {
    let file = File::open(path)
        .map_err(ExportError::from)
        .with_context(|| format!("Failed to open image: {:?}", path))?;
    let mut reader = BufReader::new(&file);

    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(err) => {
            debug!("no readable EXIF in {:?}: {}", path, err);
            return Ok(None);
        }
    };

    let field = match exif.get_field(Tag::DateTimeOriginal, In::PRIMARY) {
        Some(field) => field,
        None => return Ok(None),
    };
    let text = match &field.value {
        Value::Ascii(items) if !items.is_empty() => String::from_utf8_lossy(&items[0]).into_owned(),
        _ => return Ok(None),
    };

    match NaiveDateTime::parse_from_str(text.trim(), DATE_TIME_FORMAT) {
        Ok(parsed) => Ok(Some(parsed.and_utc().timestamp() * 1_000_000)),
        Err(err) => {
            debug!("bad DateTimeOriginal {:?} in {:?}: {}", text, path, err);
            Ok(None)
        }
    }
}

/// Write the geotagged copy of `source` at `dest`
///
/// Starts from a byte copy of the source, so pixel data and every metadata
/// field not set here survive unchanged. `set_tag` replaces any existing
/// instance of a tag, which keeps altitude, altitude reference and software
/// from ever being duplicated across repeated runs.
pub fn geotag_image(source: &Path, dest: &Path, tag: &CameraTag) -> Result<()> {
    std::fs::copy(source, dest)
        .map_err(ExportError::from)
        .with_context(|| format!("Failed to copy {:?} to {:?}", source, dest))?;

    let mut metadata = Metadata::new_from_path(dest)
        .map_err(|err| ExportError::Image(format!("unreadable metadata in {:?}: {}", dest, err)))?;

    let lat_ref = if tag.latitude >= 0.0 { "N" } else { "S" };
    let lon_ref = if tag.longitude >= 0.0 { "E" } else { "W" };
    metadata.set_tag(ExifTag::GPSLatitudeRef(lat_ref.to_string()));
    metadata.set_tag(ExifTag::GPSLatitude(degrees_to_dms(tag.latitude.abs())));
    metadata.set_tag(ExifTag::GPSLongitudeRef(lon_ref.to_string()));
    metadata.set_tag(ExifTag::GPSLongitude(degrees_to_dms(tag.longitude.abs())));
    let (altitude_ref, altitude) = altitude_fields(tag.altitude);
    metadata.set_tag(ExifTag::GPSAltitudeRef(vec![altitude_ref]));
    metadata.set_tag(ExifTag::GPSAltitude(vec![altitude]));
    metadata.set_tag(ExifTag::Software(SOFTWARE_TAG.to_string()));

    metadata
        .write_to_file(dest)
        .map_err(|err| ExportError::Image(format!("cannot rewrite metadata of {:?}: {}", dest, err)))?;
    Ok(())
}

/// Split an absolute coordinate into EXIF degree/minute/second rationals
///
/// Rounding happens once, on the scaled total, so a coordinate just under a
/// minute boundary carries into the minute and degree fields instead of
/// producing a 60-second component.
fn degrees_to_dms(degrees: f64) -> Vec<uR64> {
    const SECOND_SCALE: u64 = 10_000;
    const SCALED_MINUTE: u64 = 60 * SECOND_SCALE;

    let total = (degrees * 3600.0 * SECOND_SCALE as f64).round() as u64;
    let scaled_seconds = total % SCALED_MINUTE;
    let total_minutes = total / SCALED_MINUTE;
    vec![
        uR64 {
            nominator: (total_minutes / 60) as u32,
            denominator: 1,
        },
        uR64 {
            nominator: (total_minutes % 60) as u32,
            denominator: 1,
        },
        uR64 {
            nominator: scaled_seconds as u32,
            denominator: SECOND_SCALE as u32,
        },
    ]
}

/// EXIF altitude: unsigned magnitude plus the sea-level reference byte
fn altitude_fields(altitude: f64) -> (u8, uR64) {
    let reference = if altitude < 0.0 {
        ALTITUDE_REF_BELOW_SEA_LEVEL
    } else {
        ALTITUDE_REF_ABOVE_SEA_LEVEL
    };
    let magnitude = uR64 {
        nominator: (altitude.abs() * 1_000.0).round() as u32,
        denominator: 1_000,
    };
    (reference, magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Smallest JPEG the metadata layer will walk: SOI, a JFIF APP0 segment,
    /// a scan header with a few bytes of entropy data, EOI.
    fn minimal_jpeg() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0xFF, 0xD8]);
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        bytes.extend_from_slice(b"JFIF\0");
        bytes.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
        bytes.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
        bytes.extend_from_slice(&[0x12, 0x34, 0x56]);
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    fn sample_tag() -> CameraTag {
        CameraTag {
            sequence: 1,
            latitude: 47.5,
            longitude: 8.5,
            altitude: 120.5,
            roll: 0.0,
            pitch: 0.0,
            heading: 0.0,
            time_us: 0,
        }
    }

    #[test]
    fn formats_plain_and_padded_placeholders() {
        assert_eq!(format_image_name("IMG_%d.jpg", 7).unwrap(), "IMG_7.jpg");
        assert_eq!(format_image_name("IMG_%04d.jpg", 7).unwrap(), "IMG_0007.jpg");
        assert_eq!(format_image_name("IMG_%04d.jpg", 12345).unwrap(), "IMG_12345.jpg");
        assert_eq!(format_image_name("%d", 3).unwrap(), "3");
    }

    #[test]
    fn rejects_patterns_without_placeholder() {
        assert!(format_image_name("IMG.jpg", 1).is_err());
        assert!(format_image_name("IMG_%s.jpg", 1).is_err());
        assert!(format_image_name("IMG_%04", 1).is_err());
    }

    #[test]
    fn tagged_path_keeps_directory_and_appends_suffix() {
        let path = tagged_image_path(Path::new("/data/flight/IMG_0001.jpg"));
        assert_eq!(path, Path::new("/data/flight/IMG_0001.jpg_tagged.jpg"));
    }

    #[test]
    fn dms_conversion_round_trips() {
        let dms = degrees_to_dms(47.5125);
        assert_eq!(dms[0].nominator, 47);
        assert_eq!(dms[1].nominator, 30);
        let seconds = dms[2].nominator as f64 / dms[2].denominator as f64;
        assert!((seconds - 45.0).abs() < 1e-3);
        let back = dms[0].nominator as f64 + dms[1].nominator as f64 / 60.0 + seconds / 3600.0;
        assert!((back - 47.5125).abs() < 1e-6);
    }

    #[test]
    fn dms_seconds_never_reach_sixty() {
        // just under the degree boundary: must carry into the degree field
        let dms = degrees_to_dms(47.99999999);
        assert_eq!(dms[0].nominator, 48);
        assert_eq!(dms[1].nominator, 0);
        assert_eq!(dms[2].nominator, 0);

        // just under a minute boundary: must carry into the minute field
        let dms = degrees_to_dms(8.01666666);
        assert_eq!(dms[0].nominator, 8);
        assert_eq!(dms[1].nominator, 1);
        assert!((dms[2].nominator as f64 / dms[2].denominator as f64) < 60.0);
    }

    #[test]
    fn negative_altitude_keeps_magnitude_and_flips_reference() {
        let (reference, rational) = altitude_fields(-12.5);
        assert_eq!(reference, ALTITUDE_REF_BELOW_SEA_LEVEL);
        assert_eq!(rational.nominator, 12_500);
        assert_eq!(rational.denominator, 1_000);

        let (reference, rational) = altitude_fields(12.5);
        assert_eq!(reference, ALTITUDE_REF_ABOVE_SEA_LEVEL);
        assert_eq!(rational.nominator, 12_500);
    }

    #[test]
    fn geotagging_a_jpeg_writes_each_field_once() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("IMG_0001.jpg");
        std::fs::write(&source, minimal_jpeg()).unwrap();
        let tag = sample_tag();

        // tag the source, then tag the already-tagged output again: the
        // second pass must replace the fields, not duplicate them
        let first = tagged_image_path(&source);
        geotag_image(&source, &first, &tag).unwrap();
        let second = tagged_image_path(&first);
        geotag_image(&first, &second, &tag).unwrap();

        let file = std::fs::File::open(&second).unwrap();
        let mut buffered = BufReader::new(&file);
        let exif = exif::Reader::new().read_from_container(&mut buffered).unwrap();

        let altitudes: Vec<_> = exif.fields().filter(|f| f.tag == Tag::GPSAltitude).collect();
        assert_eq!(altitudes.len(), 1);
        match &altitudes[0].value {
            Value::Rational(values) => {
                assert_eq!(values.len(), 1);
                assert!((values[0].to_f64() - 120.5).abs() < 1e-6);
            }
            other => panic!("GPSAltitude is not rational: {:?}", other),
        }

        let references: Vec<_> = exif
            .fields()
            .filter(|f| f.tag == Tag::GPSAltitudeRef)
            .collect();
        assert_eq!(references.len(), 1);
        match &references[0].value {
            Value::Byte(bytes) => assert_eq!(bytes.as_slice(), &[ALTITUDE_REF_ABOVE_SEA_LEVEL]),
            other => panic!("GPSAltitudeRef is not a byte: {:?}", other),
        }

        let software: Vec<_> = exif.fields().filter(|f| f.tag == Tag::Software).collect();
        assert_eq!(software.len(), 1);
        match &software[0].value {
            Value::Ascii(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].as_slice(), SOFTWARE_TAG.as_bytes());
            }
            other => panic!("Software is not ASCII: {:?}", other),
        }

        assert_eq!(exif.fields().filter(|f| f.tag == Tag::GPSLatitude).count(), 1);
    }

    #[test]
    fn capture_time_is_read_back_from_written_exif() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("IMG_0002.jpg");
        std::fs::write(&path, minimal_jpeg()).unwrap();

        let mut metadata = Metadata::new_from_path(&path).unwrap();
        metadata.set_tag(ExifTag::DateTimeOriginal("2024:06:01 10:00:00".to_string()));
        metadata.write_to_file(&path).unwrap();

        let expected = NaiveDateTime::parse_from_str("2024:06:01 10:00:00", DATE_TIME_FORMAT)
            .unwrap()
            .and_utc()
            .timestamp()
            * 1_000_000;
        assert_eq!(read_capture_time_us(&path).unwrap(), Some(expected));
    }

    #[test]
    fn capture_time_of_non_image_is_none_not_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not_an_image.jpg");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"plain text, no JPEG markers").unwrap();
        assert!(read_capture_time_us(&path).unwrap().is_none());
    }

    #[test]
    fn capture_time_of_missing_file_is_an_io_error() {
        let err = read_capture_time_us(Path::new("/nonexistent/img.jpg")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExportError>(),
            Some(ExportError::Io(_))
        ));
    }

    #[test]
    fn geotagging_a_missing_source_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let err = geotag_image(
            Path::new("/nonexistent/img.jpg"),
            &dir.path().join("out.jpg"),
            &sample_tag(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExportError>(),
            Some(ExportError::Io(_))
        ));
    }
}
