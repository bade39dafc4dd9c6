//! CSV-backed telemetry input
//!
//! Concrete implementations of the reader capabilities over wide-format CSV
//! files, used by the CLI and the integration tests. One row per record; a
//! `time_us` column is required, every other numeric column becomes a record
//! field. The columns `lat`, `lon`, `alt`, `mode` and `setpoint` additionally
//! map rows to track points.

use crate::reader::{TelemetryReader, TelemetryRecord, TrackPointSource};
use crate::types::TrackPoint;
use crate::Result;
use anyhow::{bail, Context};
use std::collections::HashMap;
use std::path::Path;

const TIME_COLUMN: &str = "time_us";
const LAT_COLUMN: &str = "lat";
const LON_COLUMN: &str = "lon";
const ALT_COLUMN: &str = "alt";
const MODE_COLUMN: &str = "mode";
const SETPOINT_COLUMN: &str = "setpoint";

#[derive(Debug, Clone)]
struct CsvRow {
    time_us: i64,
    fields: HashMap<String, f64>,
    mode: Option<String>,
    setpoint: bool,
}

/// Telemetry reader over a wide-format CSV file
///
/// The whole file is materialized at construction, which keeps `seek` cheap
/// and is fine for the bounded logs this tool works on. Rows must already be
/// in non-decreasing time order; the reader does not sort.
#[derive(Debug)]
pub struct CsvTelemetryReader {
    rows: Vec<CsvRow>,
    cursor: usize,
    parameters: Option<HashMap<String, f64>>,
}

impl CsvTelemetryReader {
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open telemetry CSV: {:?}", path))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header: {:?}", path))?
            .clone();
        if !headers.iter().any(|h| h == TIME_COLUMN) {
            bail!("Telemetry CSV {:?} has no '{}' column", path, TIME_COLUMN);
        }

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("Malformed CSV row {} in {:?}", line + 2, path))?;

            let mut time_us = None;
            let mut fields = HashMap::new();
            let mut mode = None;
            let mut setpoint = false;
            for (name, value) in headers.iter().zip(record.iter()) {
                if value.is_empty() {
                    continue;
                }
                match name {
                    TIME_COLUMN => {
                        time_us = Some(value.parse::<i64>().with_context(|| {
                            format!("Bad {} value {:?} on row {}", TIME_COLUMN, value, line + 2)
                        })?);
                    }
                    MODE_COLUMN => mode = Some(value.to_string()),
                    SETPOINT_COLUMN => setpoint = value.parse::<f64>().unwrap_or(0.0) != 0.0,
                    _ => {
                        if let Ok(number) = value.parse::<f64>() {
                            fields.insert(name.to_string(), number);
                        }
                    }
                }
            }

            let time_us = match time_us {
                Some(t) => t,
                None => continue, // row without a timestamp carries no sample
            };
            rows.push(CsvRow {
                time_us,
                fields,
                mode,
                setpoint,
            });
        }

        Ok(Self {
            rows,
            cursor: 0,
            parameters: None,
        })
    }

    /// Attach a flat parameter map, enabling the recovery-waypoint capability
    pub fn with_parameters(mut self, parameters: HashMap<String, f64>) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

impl TelemetryReader for CsvTelemetryReader {
    fn seek(&mut self, time_us: i64) -> Result<()> {
        self.cursor = self
            .rows
            .iter()
            .position(|row| row.time_us >= time_us)
            .unwrap_or(self.rows.len());
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<TelemetryRecord>> {
        let row = match self.rows.get(self.cursor) {
            Some(row) => row,
            None => return Ok(None),
        };
        self.cursor += 1;
        Ok(Some(TelemetryRecord {
            time_us: row.time_us,
            fields: row.fields.clone(),
        }))
    }

    fn start_us(&self) -> i64 {
        self.rows.first().map(|row| row.time_us).unwrap_or(0)
    }

    fn duration_us(&self) -> i64 {
        match (self.rows.first(), self.rows.last()) {
            (Some(first), Some(last)) => last.time_us - first.time_us,
            _ => 0,
        }
    }

    fn parameters(&self) -> Option<&HashMap<String, f64>> {
        self.parameters.as_ref()
    }
}

impl TrackPointSource for CsvTelemetryReader {
    fn next_point(&mut self) -> Result<Option<TrackPoint>> {
        // Rows without a position (e.g. pure attitude samples) are skipped.
        while let Some(row) = self.rows.get(self.cursor) {
            self.cursor += 1;
            let position = (
                row.fields.get(LAT_COLUMN),
                row.fields.get(LON_COLUMN),
                row.fields.get(ALT_COLUMN),
            );
            if let (Some(&lat), Some(&lon), Some(&alt)) = position {
                let mut point = TrackPoint::new(lat, lon, alt, row.time_us);
                point.flight_mode = row.mode.clone();
                point.setpoint = row.setpoint;
                return Ok(Some(point));
            }
        }
        Ok(None)
    }

    fn parameters(&self) -> Option<&HashMap<String, f64>> {
        self.parameters.as_ref()
    }
}

/// Load a flat `key,value` parameter file
///
/// Non-numeric values are skipped; an empty file yields an empty map.
pub fn load_parameters(path: &Path) -> Result<HashMap<String, f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open parameter file: {:?}", path))?;

    let mut parameters = HashMap::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed parameter row in {:?}", path))?;
        if let (Some(key), Some(value)) = (record.get(0), record.get(1)) {
            if let Ok(number) = value.parse::<f64>() {
                parameters.insert(key.to_string(), number);
            }
        }
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_records_and_seeks() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "log.csv",
            "time_us,CAMT.seq,ATT.pitch\n100,1,0.5\n200,,0.6\n300,2,0.7\n",
        );
        let mut reader = CsvTelemetryReader::from_path(&path).unwrap();
        assert_eq!(reader.start_us(), 100);
        assert_eq!(reader.duration_us(), 200);

        let record = reader.read_next().unwrap().unwrap();
        assert_eq!(record.time_us, 100);
        assert_eq!(record.fields.get("CAMT.seq"), Some(&1.0));

        reader.seek(250).unwrap();
        let record = reader.read_next().unwrap().unwrap();
        assert_eq!(record.time_us, 300);
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn maps_rows_to_track_points() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "log.csv",
            "time_us,lat,lon,alt,mode,setpoint\n\
             100,47.0,8.0,10.0,MISSION,0\n\
             200,,,,,\n\
             300,47.1,8.1,11.0,,1\n",
        );
        let mut source = CsvTelemetryReader::from_path(&path).unwrap();

        let point = TrackPointSource::next_point(&mut source).unwrap().unwrap();
        assert_eq!(point.flight_mode.as_deref(), Some("MISSION"));
        assert!(!point.setpoint);

        // the positionless row is skipped
        let point = TrackPointSource::next_point(&mut source).unwrap().unwrap();
        assert_eq!(point.time_us, 300);
        assert!(point.setpoint);
        assert!(point.flight_mode.is_none());

        assert!(TrackPointSource::next_point(&mut source).unwrap().is_none());
    }

    #[test]
    fn missing_time_column_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "log.csv", "t,lat\n1,47.0\n");
        assert!(CsvTelemetryReader::from_path(&path).is_err());
    }

    #[test]
    fn loads_parameter_files() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "params.csv", "RTL_P1_LAT,47.5\nRTL_P1_LON,8.5\nNAME,abc\n");
        let parameters = load_parameters(&path).unwrap();
        assert_eq!(parameters.get("RTL_P1_LAT"), Some(&47.5));
        assert!(!parameters.contains_key("NAME"));

        let reader = CsvTelemetryReader {
            rows: Vec::new(),
            cursor: 0,
            parameters: None,
        }
        .with_parameters(parameters);
        assert!(TelemetryReader::parameters(&reader).is_some());
    }
}
