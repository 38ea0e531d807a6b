//! TRC: tab-separated marker trajectories as exported by motion analysis
//! software. Occluded samples are left empty.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use mocap_core::{log_error, log_warning, Acquisition, Point, PointType};

use crate::errors::CodecError;
use crate::file_io::{read_prefix, AcquisitionFileIO, FileType};

const MAGIC: &[u8] = b"PathFileType";

#[derive(Debug, Clone, Copy, Default)]
pub struct TrcFileIO;

impl TrcFileIO {
    pub const NAME: &'static str = "TRC";
    const EXTENSIONS: &'static [&'static str] = &["trc"];

    pub fn new() -> Self {
        Self
    }
}

fn header_err(message: impl Into<String>) -> CodecError {
    CodecError::header(TrcFileIO::NAME, message)
}

fn data_err(message: impl Into<String>) -> CodecError {
    CodecError::data(TrcFileIO::NAME, message)
}

fn inconsistent(message: impl Into<String>) -> CodecError {
    CodecError::inconsistent(TrcFileIO::NAME, message)
}

fn csv_err(source: csv::Error) -> CodecError {
    CodecError::Csv {
        codec: TrcFileIO::NAME,
        source,
    }
}

fn next_record(
    records: &mut impl Iterator<Item = csv::Result<StringRecord>>,
) -> Result<StringRecord, CodecError> {
    records
        .next()
        .ok_or(CodecError::UnexpectedEof {
            codec: TrcFileIO::NAME,
        })?
        .map_err(csv_err)
}

fn parse_number<T: std::str::FromStr>(keyword: &str, value: &str) -> Result<T, CodecError> {
    value
        .parse()
        .map_err(|_| header_err(format!("Invalid value '{value}' for keyword {keyword}")))
}

impl AcquisitionFileIO for TrcFileIO {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn has_write_operation(&self) -> bool {
        true
    }

    fn file_type(&self) -> FileType {
        FileType::Ascii
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        Self::EXTENSIONS
    }

    fn can_read_file(&self, path: &Path) -> bool {
        read_prefix(path, MAGIC.len()).is_some_and(|prefix| prefix == MAGIC)
    }

    fn read(&mut self, path: &Path) -> Result<Acquisition, CodecError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(Trim::All)
            .from_path(path)
            .map_err(csv_err)?;
        let mut records = reader.records();

        let first = next_record(&mut records)?;
        if first.get(0) != Some("PathFileType") {
            return Err(CodecError::FormatMismatch {
                codec: TrcFileIO::NAME,
                reason: "Invalid TRC file.".to_owned(),
            });
        }
        let keys = next_record(&mut records)?;
        let values = next_record(&mut records)?;
        if keys.len() != values.len() {
            return Err(header_err("Error between TRC header keywords and values."));
        }
        let keywords: HashMap<&str, &str> = keys
            .iter()
            .zip(values.iter())
            .filter(|(key, _)| !key.is_empty())
            .collect();
        let keyword = |key: &str| keywords.get(key).copied().filter(|v| !v.is_empty());

        let mut acquisition = Acquisition::new();
        let mut point_count: usize = match keyword("NumMarkers") {
            Some(value) => parse_number("NumMarkers", value)?,
            None => 0,
        };
        let frames: usize = match keyword("NumFrames") {
            Some(value) => parse_number("NumFrames", value)?,
            None => 0,
        };
        if let Some(value) = keyword("DataRate") {
            let rate: f64 = parse_number("DataRate", value)?;
            if rate > 0.0 {
                acquisition
                    .set_point_frequency(rate)
                    .map_err(|err| header_err(err.to_string()))?;
            }
        }
        if let Some(value) = keyword("OrigDataStartFrame") {
            let first_frame: i32 = parse_number("OrigDataStartFrame", value)?;
            acquisition
                .set_first_frame(first_frame.max(1))
                .map_err(|err| header_err(err.to_string()))?;
        }
        match keyword("Units") {
            Some(unit) => acquisition.set_point_unit(PointType::Marker, unit),
            None => {
                log_error!("No 'Units' keyword. Default unit is millimeter (mm)");
                acquisition.set_point_unit(PointType::Marker, "mm");
            }
        }

        if point_count == 0 {
            return Ok(acquisition);
        }

        let labels: Vec<String> = next_record(&mut records)?
            .iter()
            .skip(2)
            .filter(|label| !label.is_empty())
            .map(str::to_owned)
            .collect();
        if labels.len() != point_count {
            log_error!(
                "Mismatch between the number of points and the number of labels extracted. Final number of points corresponds to the number of labels extracted."
            );
            point_count = labels.len();
        }
        // X1 Y1 Z1 ... headings
        next_record(&mut records)?;

        // Rows are collected before sizing so a bogus NumFrames fails on EOF.
        let mut rows = Vec::new();
        for _ in 0..frames {
            rows.push(next_record(&mut records)?);
        }
        acquisition
            .init(point_count, rows.len(), 0, 1)
            .map_err(|err| header_err(err.to_string()))?;
        for (point, label) in acquisition.points_mut().iter_mut().zip(labels) {
            point.label = label;
        }

        for (frame, row) in rows.iter().enumerate() {
            for (index, point) in acquisition.points_mut().iter_mut().enumerate() {
                let cells: Vec<&str> = (0..3)
                    .map(|axis| row.get(2 + 3 * index + axis).unwrap_or(""))
                    .collect();
                if cells.iter().any(|cell| cell.is_empty()) {
                    point
                        .invalidate(frame)
                        .map_err(|err| data_err(err.to_string()))?;
                    continue;
                }
                let mut coords = [0.0; 3];
                for (coord, cell) in coords.iter_mut().zip(&cells) {
                    *coord = cell.parse().map_err(|_| {
                        data_err(format!(
                            "Invalid coordinate '{cell}' for marker {} at frame {}",
                            point.label,
                            frame + 1
                        ))
                    })?;
                }
                point
                    .set_frame(frame, coords, 0.0)
                    .map_err(|err| data_err(err.to_string()))?;
            }
        }
        Ok(acquisition)
    }

    fn write(&mut self, path: &Path, acquisition: &Acquisition) -> Result<(), CodecError> {
        let frames = acquisition.point_frame_number();
        if frames == 0 {
            return Err(inconsistent("No frames to write"));
        }
        let frequency = acquisition.point_frequency();
        if frequency <= 0.0 {
            return Err(inconsistent("Point frequency must be set before writing"));
        }
        let markers: Vec<&Point> = acquisition.points_of_type(PointType::Marker).collect();
        if let Some(marker) = markers.iter().find(|m| m.frame_number() != frames) {
            return Err(inconsistent(format!(
                "Marker {} has {} frames instead of {frames}",
                marker.label,
                marker.frame_number()
            )));
        }
        let skipped = acquisition.point_number() - markers.len();
        if skipped > 0 || acquisition.analog_number() > 0 {
            log_warning!(
                "TRC files only store markers: {skipped} points and {} analog channels are not written.",
                acquisition.analog_number()
            );
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_writer(Vec::new());
        let mut put = |fields: Vec<String>| writer.write_record(&fields).map_err(csv_err);

        put(vec![
            "PathFileType".into(),
            "4".into(),
            "(X/Y/Z)".into(),
            file_name,
        ])?;
        put(
            [
                "DataRate",
                "CameraRate",
                "NumFrames",
                "NumMarkers",
                "Units",
                "OrigDataRate",
                "OrigDataStartFrame",
                "OrigNumFrames",
            ]
            .map(String::from)
            .to_vec(),
        )?;
        put(vec![
            format!("{frequency:.2}"),
            format!("{frequency:.2}"),
            frames.to_string(),
            markers.len().to_string(),
            acquisition.point_unit(PointType::Marker).to_owned(),
            format!("{frequency:.2}"),
            acquisition.first_frame().to_string(),
            frames.to_string(),
        ])?;

        let mut labels = vec!["Frame#".to_owned(), "Time".to_owned()];
        let mut headings = vec![String::new(), String::new()];
        for (index, marker) in markers.iter().enumerate() {
            labels.extend([marker.label.clone(), String::new(), String::new()]);
            let n = index + 1;
            headings.extend([format!("X{n}"), format!("Y{n}"), format!("Z{n}")]);
        }
        put(labels)?;
        put(headings)?;

        for frame in 0..frames {
            let mut row = vec![
                (frame + 1).to_string(),
                format!("{:.3}", frame as f64 / frequency),
            ];
            for marker in &markers {
                if marker.residuals()[frame] < 0.0 {
                    row.extend([String::new(), String::new(), String::new()]);
                } else {
                    row.extend(marker.values()[frame].iter().map(|v| format!("{v:.5}")));
                }
            }
            put(row)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|err| CodecError::io(Self::NAME, err.into_error()))?;
        fs::write(path, bytes).map_err(|err| CodecError::io(Self::NAME, err))
    }
}
