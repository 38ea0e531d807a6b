//! GRx: ground reaction file of one force platform (`.gr1` to `.gr9`),
//! little-endian, 512-byte header followed by six floats per frame.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use mocap_core::{Acquisition, MetaDataInfo};

use crate::binary::{BinaryReader, ByteOrder};
use crate::errors::CodecError;
use crate::file_io::{extension, open_for_probe, AcquisitionFileIO, FileType};

const HEADER_LEN: u64 = 512;
const FRAME_LEN: u64 = 6 * 4;
const UNITS: [&str; 6] = ["N", "N", "N", "mm", "mm", "Nmm"];
const CHANNELS: [&str; 6] = ["Fx", "Fy", "Fz", "Px", "Py", "Mz"];

#[derive(Debug, Clone, Copy, Default)]
pub struct GrxFileIO;

impl GrxFileIO {
    pub const NAME: &'static str = "GRx";
    const EXTENSIONS: &'static [&'static str] =
        &["gr1", "gr2", "gr3", "gr4", "gr5", "gr6", "gr7", "gr8", "gr9"];

    pub fn new() -> Self {
        Self
    }
}

fn io_err(err: std::io::Error) -> CodecError {
    CodecError::io(GrxFileIO::NAME, err)
}

fn header_err(message: impl Into<String>) -> CodecError {
    CodecError::header(GrxFileIO::NAME, message)
}

impl AcquisitionFileIO for GrxFileIO {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn has_write_operation(&self) -> bool {
        false
    }

    fn file_type(&self) -> FileType {
        FileType::Binary
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        Self::EXTENSIONS
    }

    fn can_read_file(&self, path: &Path) -> bool {
        if !extension(path).is_some_and(|ext| Self::EXTENSIONS.contains(&ext.as_str())) {
            return false;
        }
        let Some((file, len)) = open_for_probe(path) else {
            return false;
        };
        if len < HEADER_LEN {
            return false;
        }
        let mut stream = BinaryReader::new(file, ByteOrder::IeeeLittleEndian);
        let (Ok(frames), Ok(frequency)) = (stream.read_u16(), stream.read_u16()) else {
            return false;
        };
        frames != 0 && frequency != 0 && len == HEADER_LEN + u64::from(frames) * FRAME_LEN
    }

    fn byte_order(&self) -> Option<ByteOrder> {
        Some(ByteOrder::IeeeLittleEndian)
    }

    fn read(&mut self, path: &Path) -> Result<Acquisition, CodecError> {
        let bytes = fs::read(path).map_err(io_err)?;
        let mut stream = BinaryReader::new(Cursor::new(bytes), ByteOrder::IeeeLittleEndian);

        let frames = usize::from(stream.read_u16().map_err(io_err)?);
        let frequency = f64::from(stream.read_u16().map_err(io_err)?);
        stream.seek_to(54).map_err(io_err)?;
        let first_frame_ms = f64::from(stream.read_u16().map_err(io_err)?);
        stream.seek_to(136).map_err(io_err)?;
        let length = f64::from(stream.read_f32().map_err(io_err)?);
        let width = f64::from(stream.read_f32().map_err(io_err)?);
        let height = f64::from(stream.read_f32().map_err(io_err)?);
        let corners: Vec<f64> = stream
            .read_f32s(12)
            .map_err(io_err)?
            .into_iter()
            .map(f64::from)
            .collect();
        if frequency <= 0.0 {
            return Err(header_err("Null acquisition frequency"));
        }

        let mut acquisition = Acquisition::new();
        acquisition
            .init(0, frames, 6, 1)
            .map_err(|err| header_err(err.to_string()))?;
        acquisition
            .set_point_frequency(frequency)
            .map_err(|err| header_err(err.to_string()))?;
        let first_frame = (first_frame_ms / 1000.0 * frequency + 1.0).ceil() as i32;
        acquisition
            .set_first_frame(first_frame.max(1))
            .map_err(|err| header_err(err.to_string()))?;

        let invalid = |err: mocap_core::Error| header_err(err.to_string());
        let platform = acquisition.metadata_mut();
        platform
            .set_info("FORCE_PLATFORM.USED", MetaDataInfo::int16(1))
            .map_err(invalid)?;
        platform
            .set_info("FORCE_PLATFORM.ZERO", MetaDataInfo::int16s(vec![0, 0]))
            .map_err(invalid)?;
        platform
            .set_info("FORCE_PLATFORM.TYPE", MetaDataInfo::int16s(vec![1]))
            .map_err(invalid)?;
        let corners = MetaDataInfo::floats(corners)
            .reshaped(vec![3, 4, 1])
            .map_err(invalid)?;
        platform
            .set_info("FORCE_PLATFORM.CORNERS", corners)
            .map_err(invalid)?;
        let origin = MetaDataInfo::floats(vec![length / 2.0, width / 2.0, -height / 2.0])
            .reshaped(vec![3, 1])
            .map_err(invalid)?;
        platform
            .set_info("FORCE_PLATFORM.ORIGIN", origin)
            .map_err(invalid)?;
        let channels = MetaDataInfo::int16s(vec![1, 2, 3, 4, 5, 6])
            .reshaped(vec![6, 1])
            .map_err(invalid)?;
        platform
            .set_info("FORCE_PLATFORM.CHANNEL", channels)
            .map_err(invalid)?;

        stream.seek_to(HEADER_LEN).map_err(io_err)?;
        let analogs = acquisition.analogs_mut();
        for frame in 0..frames {
            let raw: Vec<f64> = stream
                .read_f32s(6)
                .map_err(io_err)?
                .into_iter()
                .map(f64::from)
                .collect();
            // Plate axes are swapped relative to the laboratory frame.
            analogs[1].values_mut()[frame] = raw[0];
            analogs[0].values_mut()[frame] = -raw[1];
            analogs[2].values_mut()[frame] = -raw[2];
            analogs[4].values_mut()[frame] = raw[3] - width / 2.0;
            analogs[3].values_mut()[frame] = -raw[4] + length / 2.0;
            analogs[5].values_mut()[frame] = raw[5];
        }

        let suffix = extension(path)
            .and_then(|ext| ext.chars().last())
            .unwrap_or('1');
        for ((analog, channel), unit) in analogs.iter_mut().zip(CHANNELS).zip(UNITS) {
            analog.label = format!("{channel}{suffix}");
            analog.unit = unit.to_owned();
        }
        Ok(acquisition)
    }
}
