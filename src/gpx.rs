//! GPX track sink
//!
//! One concrete [`TrackSink`]: each track part becomes a named `<trk>` with a
//! single segment, collected setpoints become a dedicated track, and recovery
//! waypoints become `<wpt>` elements.

use crate::sink::TrackSink;
use crate::types::TrackPoint;
use crate::Result;
use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct GpxTrackSink<W: Write> {
    writer: W,
    title: String,
}

impl GpxTrackSink<BufWriter<File>> {
    pub fn create(path: &Path, title: &str) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create GPX output: {:?}", path))?;
        Ok(Self::new(BufWriter::new(file), title))
    }
}

impl<W: Write> GpxTrackSink<W> {
    pub fn new(writer: W, title: &str) -> Self {
        Self {
            writer,
            title: title.to_string(),
        }
    }

    fn write_point_body(&mut self, tag: &str, point: &TrackPoint) -> Result<()> {
        write!(
            self.writer,
            r#"  <{} lat="{:.7}" lon="{:.7}"><ele>{:.2}</ele>"#,
            tag, point.latitude, point.longitude, point.altitude
        )?;
        Ok(())
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl<W: Write> TrackSink for GpxTrackSink<W> {
    fn start(&mut self) -> Result<()> {
        writeln!(self.writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            self.writer,
            r#"<gpx version="1.1" creator="flighttag" xmlns="http://www.topografix.com/GPX/1/1">"#
        )?;
        writeln!(
            self.writer,
            "<metadata><name>{}</name></metadata>",
            escape_xml(&self.title)
        )?;
        Ok(())
    }

    fn part_start(&mut self, name: &str) -> Result<()> {
        writeln!(
            self.writer,
            "<trk><name>{}</name><trkseg>",
            escape_xml(name)
        )?;
        Ok(())
    }

    fn point(&mut self, point: &TrackPoint) -> Result<()> {
        self.write_point_body("trkpt", point)?;
        writeln!(self.writer, "</trkpt>")?;
        Ok(())
    }

    fn part_end(&mut self) -> Result<()> {
        writeln!(self.writer, "</trkseg></trk>")?;
        Ok(())
    }

    fn setpoints(&mut self, points: &[TrackPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        self.part_start("Setpoints")?;
        for point in points {
            self.point(point)?;
        }
        self.part_end()
    }

    fn single_point(&mut self, point: &TrackPoint, label: &str) -> Result<()> {
        self.write_point_body("wpt", point)?;
        writeln!(self.writer, "<name>{}</name></wpt>", escape_xml(label))?;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        writeln!(self.writer, "</gpx>")?;
        self.writer.flush()?;
        Ok(())
    }
}
