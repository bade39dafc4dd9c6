//! CLI binary for the flight-log exporters
//!
//! Drives the camera tag export (CSV plus geotagged images) and optionally
//! the segmented track export over a CSV telemetry dump.

use anyhow::{anyhow, Context, Result};
use clap::{Arg, Command};
use flighttag::{
    export_track, load_parameters, CamExportConfig, CamExporter, CsvTelemetryReader,
    ExportOutcome, GpxTrackSink, ProgressEvent, TelemetryReader,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("flighttag")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Export camera tags and segmented tracks from flight-log telemetry.")
        .arg(
            Arg::new("log")
                .help("Telemetry CSV file (wide format with a time_us column)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Output CSV path; source images are looked up in its directory (default: <log>.tags.csv)")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("image-name-format")
                .long("image-name-format")
                .help("Image filename pattern with one integer placeholder")
                .value_name("PATTERN")
                .default_value("IMG_%04d.jpg"),
        )
        .arg(
            Arg::new("start-number")
                .long("start-number")
                .help("Image number assigned to the first collected tag")
                .value_name("N")
                .default_value("1"),
        )
        .arg(
            Arg::new("start")
                .long("start")
                .help("Export window start in seconds from log start (default: log start)")
                .value_name("SECONDS"),
        )
        .arg(
            Arg::new("end")
                .long("end")
                .help("Export window end in seconds from log start, exclusive (default: log end)")
                .value_name("SECONDS"),
        )
        .arg(
            Arg::new("gpx")
                .long("gpx")
                .help("Also export the mode-segmented track to this GPX file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("params")
                .long("params")
                .help("Flat key,value flight-parameter file; enables recovery waypoints in the GPX output")
                .value_name("FILE"),
        )
        .get_matches();

    let log_path = PathBuf::from(matches.get_one::<String>("log").unwrap());
    let output_path = match matches.get_one::<String>("output") {
        Some(path) => PathBuf::from(path),
        None => {
            let mut path = log_path.as_os_str().to_os_string();
            path.push(".tags.csv");
            PathBuf::from(path)
        }
    };

    let parameters = matches
        .get_one::<String>("params")
        .map(|path| load_parameters(Path::new(path)))
        .transpose()?;

    if let Some(gpx_path) = matches.get_one::<String>("gpx") {
        let mut source = CsvTelemetryReader::from_path(&log_path)?;
        if let Some(parameters) = parameters.clone() {
            source = source.with_parameters(parameters);
        }
        let title = log_path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("Track")
            .to_string();
        let mut sink = GpxTrackSink::create(Path::new(gpx_path), &title)?;
        export_track(&mut source, &mut sink)?;
        println!("Exported track to: {}", gpx_path);
    }

    let mut reader = CsvTelemetryReader::from_path(&log_path)?;
    let log_start_us = reader.start_us();
    let log_end_us = log_start_us + reader.duration_us();

    let time_start_us = match matches.get_one::<String>("start") {
        Some(text) => log_start_us + parse_seconds_us(text, "start")?,
        None => log_start_us,
    };
    let time_end_us = match matches.get_one::<String>("end") {
        Some(text) => log_start_us + parse_seconds_us(text, "end")?,
        None => log_end_us + 1, // end bound is exclusive; keep the last record
    };
    if time_end_us <= time_start_us {
        return Err(anyhow!("Export window is empty: end must be after start"));
    }

    let config = CamExportConfig {
        image_name_format: matches
            .get_one::<String>("image-name-format")
            .unwrap()
            .clone(),
        start_number: matches
            .get_one::<String>("start-number")
            .unwrap()
            .parse()
            .context("Invalid --start-number")?,
        time_start_us,
        time_end_us,
    };

    let (progress_tx, progress_rx) = mpsc::channel();
    let exporter = CamExporter::new(config).with_progress(progress_tx);

    // The export is one long blocking job; keep it off the thread that
    // renders progress.
    let worker = thread::spawn(move || exporter.export(&mut reader, &output_path));

    for event in progress_rx {
        match event {
            ProgressEvent::CountingTags => println!("Counting tags..."),
            ProgressEvent::TagsCounted { total } => println!("Exporting {} tags...", total),
            ProgressEvent::RowWritten { row, total } => {
                if row % 100 == 0 || row == total {
                    println!("  {}/{} rows", row, total);
                }
            }
        }
    }

    let outcome = worker
        .join()
        .map_err(|_| anyhow!("Export worker panicked"))??;
    match outcome {
        ExportOutcome::Completed(report) => println!("{}", report.summary()),
        ExportOutcome::Canceled => println!("Export canceled"),
    }

    Ok(())
}

fn parse_seconds_us(text: &str, name: &str) -> Result<i64> {
    let seconds: f64 = text
        .parse()
        .with_context(|| format!("Invalid --{} value: {:?}", name, text))?;
    Ok((seconds * 1_000_000.0) as i64)
}
