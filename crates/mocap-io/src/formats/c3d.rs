//! C3D: binary trial format with a 512-byte header, a self-describing
//! parameter section and frame-interleaved point and analog samples.

use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use mocap_core::model::Gain;
use mocap_core::{log_warning, Acquisition, Event, MetaData, MetaDataInfo, MetaDataValue, PointType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binary::{BinaryReader, BinaryWriter, ByteOrder};
use crate::errors::CodecError;
use crate::file_io::{open_for_probe, AcquisitionFileIO, FileType, StorageFormat};

const BLOCK: u64 = 512;
const HEADER_KEY: u8 = 0x50;
const EVENT_KEY: u16 = 12345;
const MAX_HEADER_EVENTS: usize = 18;
const INTEGER_RANGE: f64 = 32000.0;
const FLOAT_POINT_SCALE: f64 = -0.1;

/// Point type lists of the `POINT` group and the units parameter of each.
const TYPED_POINTS: [(PointType, &str, &str); 6] = [
    (PointType::Angle, "ANGLES", "ANGLE_UNITS"),
    (PointType::Force, "FORCES", "FORCE_UNITS"),
    (PointType::Moment, "MOMENTS", "MOMENT_UNITS"),
    (PointType::Power, "POWERS", "POWER_UNITS"),
    (PointType::Scalar, "SCALARS", "SCALAR_UNITS"),
    (PointType::Reaction, "REACTIONS", "REACTION_UNITS"),
];

/// Layout used when encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct C3dWriteOptions {
    pub byte_order: ByteOrder,
    pub storage: StorageFormat,
}

#[derive(Debug, Clone, Default)]
pub struct C3dFileIO {
    options: C3dWriteOptions,
    byte_order: Option<ByteOrder>,
    storage: Option<StorageFormat>,
}

impl C3dFileIO {
    pub const NAME: &'static str = "C3D";
    const EXTENSIONS: &'static [&'static str] = &["c3d"];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: C3dWriteOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> C3dWriteOptions {
        self.options
    }

    pub fn set_options(&mut self, options: C3dWriteOptions) {
        self.options = options;
    }
}

impl AcquisitionFileIO for C3dFileIO {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn has_write_operation(&self) -> bool {
        true
    }

    fn file_type(&self) -> FileType {
        FileType::Binary
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        Self::EXTENSIONS
    }

    /// The header key must be 0x50 and the parameter section must declare a
    /// known processor type.
    fn can_read_file(&self, path: &Path) -> bool {
        let Some((mut file, len)) = open_for_probe(path) else {
            return false;
        };
        let mut key = [0u8; 2];
        if file.read_exact(&mut key).is_err() || key[0] == 0 || key[1] != HEADER_KEY {
            return false;
        }
        let processor_at = BLOCK * (u64::from(key[0]) - 1) + 3;
        if processor_at >= len || file.seek(SeekFrom::Start(processor_at)).is_err() {
            return false;
        }
        let mut processor = [0u8; 1];
        file.read_exact(&mut processor).is_ok()
            && ByteOrder::from_processor_code(processor[0]).is_some()
    }

    fn read(&mut self, path: &Path) -> Result<Acquisition, CodecError> {
        let bytes = fs::read(path).map_err(io_err)?;
        let decoded = decode(&bytes)?;
        self.byte_order = Some(decoded.byte_order);
        self.storage = Some(decoded.storage);
        Ok(decoded.acquisition)
    }

    fn write(&mut self, path: &Path, acquisition: &Acquisition) -> Result<(), CodecError> {
        let bytes = encode(acquisition, self.options)?;
        fs::write(path, bytes).map_err(io_err)?;
        self.byte_order = Some(self.options.byte_order);
        self.storage = Some(self.options.storage);
        Ok(())
    }

    fn byte_order(&self) -> Option<ByteOrder> {
        self.byte_order
    }

    fn storage_format(&self) -> Option<StorageFormat> {
        self.storage
    }
}

fn io_err(err: io::Error) -> CodecError {
    CodecError::io(C3dFileIO::NAME, err)
}

fn header_err(message: impl Into<String>) -> CodecError {
    CodecError::header(C3dFileIO::NAME, message)
}

fn data_err(message: impl Into<String>) -> CodecError {
    CodecError::data(C3dFileIO::NAME, message)
}

fn inconsistent(message: impl Into<String>) -> CodecError {
    CodecError::inconsistent(C3dFileIO::NAME, message)
}

pub(crate) struct Decoded {
    pub acquisition: Acquisition,
    pub byte_order: ByteOrder,
    pub storage: StorageFormat,
}

#[derive(Debug, Default)]
struct Header {
    point_count: u16,
    analog_samples: u16,
    first_frame: u16,
    last_frame: u16,
    max_gap: u16,
    scale: f32,
    data_start: u16,
    analog_ratio: u16,
    frame_rate: f32,
    events: Vec<Event>,
}

type Reader<'a> = BinaryReader<Cursor<&'a [u8]>>;

pub(crate) fn decode(bytes: &[u8]) -> Result<Decoded, CodecError> {
    if bytes.len() < 2 {
        return Err(CodecError::UnexpectedEof {
            codec: C3dFileIO::NAME,
        });
    }
    if bytes[1] != HEADER_KEY {
        return Err(header_err("Invalid header key."));
    }
    let parameter_block = bytes[0];
    if parameter_block == 0 {
        return Err(header_err("Bad parameter first block number"));
    }
    let processor_at = (BLOCK * (u64::from(parameter_block) - 1) + 3) as usize;
    let processor = *bytes.get(processor_at).ok_or(CodecError::UnexpectedEof {
        codec: C3dFileIO::NAME,
    })?;
    let byte_order = ByteOrder::from_processor_code(processor)
        .ok_or_else(|| header_err("Invalid processor type"))?;
    debug!(order = byte_order.as_str(), "C3D byte order");

    let mut stream = BinaryReader::new(Cursor::new(bytes), byte_order);
    let mut header = if parameter_block > 1 {
        read_header(&mut stream)?
    } else {
        Header::default()
    };
    let (metadata, parameter_blocks) = read_parameters(&mut stream, parameter_block)?;

    let mut acquisition = Acquisition::new();
    *acquisition.metadata_mut() = metadata;
    let storage = if header.scale > 0.0 {
        StorageFormat::Integer
    } else {
        StorageFormat::Float
    };

    read_events(&mut acquisition, std::mem::take(&mut header.events));
    if header.data_start != 0 {
        let parameter_end = u64::from(parameter_block) + u64::from(parameter_blocks);
        if u64::from(header.data_start) < parameter_end {
            return Err(header_err("Bad data first block"));
        }
        read_data(&mut stream, &header, bytes.len() as u64, &mut acquisition)?;
    }
    Ok(Decoded {
        acquisition,
        byte_order,
        storage,
    })
}

fn read_header(stream: &mut Reader<'_>) -> Result<Header, CodecError> {
    stream.seek_to(2).map_err(io_err)?;
    let mut header = Header {
        point_count: stream.read_u16().map_err(io_err)?,
        analog_samples: stream.read_u16().map_err(io_err)?,
        first_frame: stream.read_u16().map_err(io_err)?,
        last_frame: stream.read_u16().map_err(io_err)?,
        max_gap: stream.read_u16().map_err(io_err)?,
        scale: stream.read_f32().map_err(io_err)?,
        data_start: stream.read_u16().map_err(io_err)?,
        analog_ratio: stream.read_u16().map_err(io_err)?,
        frame_rate: stream.read_f32().map_err(io_err)?,
        events: Vec::new(),
    };
    if header.scale == 0.0 {
        return Err(header_err("Incorrect 3D scale factor"));
    }

    // Words 148-149 describe the unsupported label and range section.
    stream.seek_to(296).map_err(io_err)?;
    let label_range_block = stream.read_u16().map_err(io_err)?;
    if label_range_block != 0 {
        debug!(block = label_range_block, "ignoring label and range section");
    }
    let event_key = stream.read_u16().map_err(io_err)?;
    let event_count = usize::from(stream.read_u16().map_err(io_err)?).min(MAX_HEADER_EVENTS);
    stream.skip(2).map_err(io_err)?;
    let times = stream.read_f32s(MAX_HEADER_EVENTS).map_err(io_err)?;
    stream.skip((MAX_HEADER_EVENTS + 2) as i64).map_err(io_err)?;
    let label_width = if event_key == EVENT_KEY { 4 } else { 2 };
    for time in times.iter().take(event_count) {
        let label = stream.read_string(label_width).map_err(io_err)?;
        header
            .events
            .push(Event::new(label.trim(), f64::from(*time), "General"));
    }
    Ok(header)
}

fn read_char_value(stream: &mut Reader<'_>, dims: &[usize]) -> io::Result<MetaDataValue> {
    let strings = match dims {
        [] => vec![stream.read_string(1)?],
        [width] => vec![stream.read_string(*width)?],
        [width, rest @ ..] => {
            let count: usize = rest.iter().product();
            (0..count)
                .map(|_| stream.read_string(*width))
                .collect::<io::Result<Vec<_>>>()?
        }
    };
    Ok(MetaDataValue::Char(strings))
}

fn read_parameters(
    stream: &mut Reader<'_>,
    parameter_block: u8,
) -> Result<(MetaData, u8), CodecError> {
    let start = BLOCK * (u64::from(parameter_block) - 1);
    stream.seek_to(start).map_err(io_err)?;
    // First block and key bytes are not reliable across writers.
    stream.skip(2).map_err(io_err)?;
    let block_count = stream.read_u8().map_err(io_err)?;
    let _processor = stream.read_u8().map_err(io_err)?;
    let end = start + BLOCK * u64::from(block_count);

    let mut cursor = start + 4;

    let mut groups: Vec<(i8, MetaData)> = Vec::new();
    let mut parameters: Vec<(i8, MetaData)> = Vec::new();
    loop {
        stream.seek_to(cursor).map_err(io_err)?;
        let name_len = stream.read_i8().map_err(io_err)?;
        if name_len == 0 {
            break;
        }
        let id = stream.read_i8().map_err(io_err)?;
        if id == 0 {
            return Err(header_err(
                "Error during the ID extraction in the parameter section - ID equal to 0",
            ));
        }
        let label = stream
            .read_string(usize::from(name_len.unsigned_abs()))
            .map_err(io_err)?;
        let offset_at = stream.position().map_err(io_err)?;
        let offset = stream.read_u16().map_err(io_err)?;
        let unlocked = name_len > 0;

        if id < 0 {
            let desc_len = stream.read_u8().map_err(io_err)?;
            let description = stream.read_string(usize::from(desc_len)).map_err(io_err)?;
            let mut group = MetaData::group(label).with_description(description);
            group.set_unlocked(unlocked);
            groups.push((-id, group));
        } else {
            let kind = stream.read_i8().map_err(io_err)?;
            let dim_count = stream.read_u8().map_err(io_err)?;
            let dims: Vec<usize> = stream
                .read_bytes(usize::from(dim_count))
                .map_err(io_err)?
                .into_iter()
                .map(usize::from)
                .collect();
            let count: usize = dims.iter().product();
            let value = match kind {
                -1 => read_char_value(stream, &dims).map_err(io_err)?,
                1 => MetaDataValue::Int8(stream.read_i8s(count).map_err(io_err)?),
                2 => MetaDataValue::Int16(stream.read_i16s(count).map_err(io_err)?),
                4 => MetaDataValue::Float(
                    stream
                        .read_f32s(count)
                        .map_err(io_err)?
                        .into_iter()
                        .map(f64::from)
                        .collect(),
                ),
                _ => return Err(header_err("Data parameter type unknown")),
            };
            let info = MetaDataInfo::new(value, dims)
                .map_err(|err| header_err(format!("parameter {label}: {err}")))?;
            let desc_len = stream.read_u8().map_err(io_err)?;
            let description = stream.read_string(usize::from(desc_len)).map_err(io_err)?;
            let mut parameter = MetaData::leaf(label, info).with_description(description);
            parameter.set_unlocked(unlocked);
            parameters.push((id, parameter));
        }

        if offset == 0 {
            break;
        }
        cursor = offset_at + u64::from(offset);
        if block_count > 0 && cursor >= end {
            log_warning!(
                "The next parameter is pointing in the Data section. Parameters' extraction is stopped."
            );
            break;
        }
    }

    let mut root = MetaData::root();
    let mut group_ids: Vec<(i8, String)> = Vec::new();
    for (id, group) in groups {
        let label = group.label().to_owned();
        match root.append_child(group) {
            Ok(true) => group_ids.push((id, label)),
            _ => log_warning!("Duplicate parameter group {label}. Only the first one is kept."),
        }
    }
    let mut orphans = 0;
    for (id, parameter) in parameters {
        let group = group_ids
            .iter()
            .find(|(group_id, _)| *group_id == id)
            .and_then(|(_, label)| root.child_mut(label));
        match group {
            Some(group) => {
                let label = parameter.label().to_owned();
                if !matches!(group.append_child(parameter), Ok(true)) {
                    log_warning!("Duplicate parameter {}:{label}. Only the first one is kept.", group.label());
                }
            }
            None => orphans += 1,
        }
    }
    if orphans > 0 {
        log_warning!(
            "Some parameters are orphans. No group has the same id. These parameters are lost"
        );
    }

    let read_blocks = stream
        .position()
        .map(|position| position.saturating_sub(start).div_ceil(BLOCK))
        .unwrap_or(0);
    let blocks = if block_count == 0 {
        u8::try_from(read_blocks).unwrap_or(u8::MAX)
    } else {
        block_count
    };
    Ok((root, blocks))
}

/// Values of `base`, `base2`, `base3`, ... concatenated, as C3D splits long
/// lists over numbered parameters.
fn collapse_strings(group: Option<&MetaData>, base: &str) -> Vec<String> {
    collapse(group, base, MetaDataInfo::to_strings)
}

fn collapse_f64s(group: Option<&MetaData>, base: &str) -> Vec<f64> {
    collapse(group, base, MetaDataInfo::to_f64s)
}

fn collapse<T>(
    group: Option<&MetaData>,
    base: &str,
    values: impl Fn(&MetaDataInfo) -> Vec<T>,
) -> Vec<T> {
    let Some(group) = group else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if let Some(info) = group.child(base).and_then(MetaData::info) {
        out.extend(values(info));
    }
    for index in 2.. {
        match group.child(&format!("{base}{index}")).and_then(MetaData::info) {
            Some(info) => out.extend(values(info)),
            None => break,
        }
    }
    out
}

fn first_i32(group: Option<&MetaData>, label: &str) -> Option<i32> {
    group?.child(label)?.info()?.first_i32()
}

fn read_events(acquisition: &mut Acquisition, header_events: Vec<Event>) {
    let metadata = acquisition.metadata();
    let group = match metadata.child("EVENT") {
        Some(group) => Some(group),
        None => {
            let fallback = metadata.child("EVENTS");
            if fallback.is_some() {
                log_warning!(
                    "EVENTS group found instead of EVENT. The EVENTS group is used to extract events."
                );
            }
            fallback
        }
    };
    let Some(used) = first_i32(group, "USED") else {
        for event in header_events {
            acquisition.append_event(event);
        }
        return;
    };

    let count = usize::try_from(used).unwrap_or(0);
    let mut labels = collapse_strings(group, "LABELS");
    labels.resize(count, String::new());
    for (index, label) in labels.iter_mut().enumerate() {
        if label.is_empty() {
            *label = format!("uname*{}", index + 1);
        }
    }
    let mut times = collapse_f64s(group, "TIMES");
    if times.len() < 2 * count {
        log_warning!(
            "The EVENT:TIMES doesn't contain the appropriate number of values. The extracted times could be corrupted."
        );
    }
    times.resize(2 * count, 0.0);
    let mut contexts = collapse_strings(group, "CONTEXTS");
    contexts.resize(count, String::new());
    let mut subjects = collapse_strings(group, "SUBJECTS");
    subjects.resize(count, String::new());
    let mut descriptions = collapse_strings(group, "DESCRIPTIONS");
    descriptions.resize(count, String::new());

    let events: Vec<Event> = (0..count)
        .map(|i| {
            let mut event = Event::new(
                labels[i].clone(),
                times[2 * i] * 60.0 + times[2 * i + 1],
                contexts[i].clone(),
            );
            event.subject = subjects[i].clone();
            event.description = descriptions[i].clone();
            event
        })
        .collect();
    for event in events {
        acquisition.append_event(event);
    }
}

fn decode_residual(word: i16, scale: f64) -> (f64, f64) {
    if word < 0 {
        (-1.0, -1.0)
    } else {
        (f64::from(word & 0xff) * scale.abs(), f64::from(word >> 8))
    }
}

/// Bytes needed by the data section, or `None` on overflow.
fn data_section_len(
    data_start: u16,
    frames: usize,
    points: usize,
    analogs: usize,
    ratio: usize,
    word: u64,
) -> Option<u64> {
    let per_frame = (points as u64)
        .checked_mul(4)?
        .checked_add((analogs as u64).checked_mul(ratio as u64)?)?
        .checked_mul(word)?;
    BLOCK
        .checked_mul(u64::from(data_start).checked_sub(1)?)?
        .checked_add((frames as u64).checked_mul(per_frame)?)
}

fn read_data(
    stream: &mut Reader<'_>,
    header: &Header,
    available: u64,
    acquisition: &mut Acquisition,
) -> Result<(), CodecError> {
    let ratio = header.analog_ratio.max(1);
    let mut analog_count = header.analog_samples / ratio;
    let mut point_count = header.point_count;
    let metadata = acquisition.metadata().clone();
    let point_group = metadata.child("POINT");
    let analog_group = metadata.child("ANALOG");

    if let Some(used) = first_i32(point_group, "USED") {
        if used != i32::from(point_count) {
            log_warning!(
                "The number of markers wrote in the header section and in the parameter section are not the same. The value kept is from the parameter section."
            );
            point_count = u16::try_from(used).unwrap_or(0);
        }
    }
    if let Some(used) = first_i32(analog_group, "USED") {
        if used != i32::from(analog_count) {
            log_warning!(
                "The number of analog channels wrote in the header section and in the parameter section are not the same. The value kept is from the parameter section."
            );
            analog_count = u16::try_from(used).unwrap_or(0);
        }
    }

    let frames = if header.last_frame >= header.first_frame {
        usize::from(header.last_frame - header.first_frame) + 1
    } else {
        0
    };
    let points = usize::from(point_count);
    let analogs = usize::from(analog_count);
    let ratio = usize::from(ratio);
    let word = if header.scale > 0.0 { 2 } else { 4 };
    match data_section_len(header.data_start, frames, points, analogs, ratio, word) {
        Some(needed) if needed <= available => {}
        Some(_) => {
            return Err(CodecError::UnexpectedEof {
                codec: C3dFileIO::NAME,
            })
        }
        None => return Err(header_err("Data section size exceeds the addressable range")),
    }
    acquisition
        .init(points, frames, analogs, ratio)
        .map_err(|err| header_err(err.to_string()))?;
    acquisition
        .set_first_frame(i32::from(header.first_frame.max(1)))
        .map_err(|err| header_err(err.to_string()))?;
    if header.frame_rate > 0.0 {
        acquisition
            .set_point_frequency(f64::from(header.frame_rate))
            .map_err(|err| header_err(err.to_string()))?;
    }
    acquisition.set_max_interpolation_gap(u32::from(header.max_gap));

    let unsigned = analog_group
        .and_then(|group| group.child("FORMAT"))
        .and_then(MetaData::info)
        .and_then(MetaDataInfo::first_string)
        .is_some_and(|format| format == "UNSIGNED");
    let mut offsets: Vec<f64> = analog_group
        .and_then(|group| group.child("OFFSET"))
        .and_then(MetaData::info)
        .map(|info| {
            info.to_i32s()
                .into_iter()
                .map(|offset| {
                    if unsigned {
                        f64::from(offset as i16 as u16)
                    } else {
                        f64::from(offset)
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    offsets.resize(analogs, 0.0);
    let mut scales = collapse_f64s(analog_group, "SCALE");
    scales.resize(analogs, 1.0);
    let gen_scale = analog_group
        .and_then(|group| group.child("GEN_SCALE"))
        .and_then(MetaData::info)
        .and_then(MetaDataInfo::first_f64)
        .unwrap_or(1.0);

    let scale = f64::from(header.scale);
    let integer = header.scale > 0.0;
    stream
        .seek_to(BLOCK * (u64::from(header.data_start) - 1))
        .map_err(io_err)?;
    for frame in 0..frames {
        for point in acquisition.points_mut() {
            let (coords, word) = if integer {
                let x = f64::from(stream.read_i16().map_err(io_err)?) * scale;
                let y = f64::from(stream.read_i16().map_err(io_err)?) * scale;
                let z = f64::from(stream.read_i16().map_err(io_err)?) * scale;
                ([x, y, z], stream.read_i16().map_err(io_err)?)
            } else {
                let x = f64::from(stream.read_f32().map_err(io_err)?);
                let y = f64::from(stream.read_f32().map_err(io_err)?);
                let z = f64::from(stream.read_f32().map_err(io_err)?);
                ([x, y, z], stream.read_f32().map_err(io_err)? as i16)
            };
            let (residual, mask) = decode_residual(word, scale);
            point
                .set_frame(frame, coords, residual)
                .map_err(|err| data_err(err.to_string()))?;
            point.masks_mut()[frame] = mask;
        }
        for sample in 0..ratio {
            let index = frame * ratio + sample;
            for (channel, analog) in acquisition.analogs_mut().iter_mut().enumerate() {
                let raw = if integer {
                    let raw = stream.read_i16().map_err(io_err)?;
                    if unsigned {
                        f64::from(raw as u16)
                    } else {
                        f64::from(raw)
                    }
                } else {
                    f64::from(stream.read_f32().map_err(io_err)?)
                };
                analog.values_mut()[index] = (raw - offsets[channel]) * scales[channel] * gen_scale;
            }
        }
    }

    let mut labels = collapse_strings(point_group, "LABELS");
    let descriptions = collapse_strings(point_group, "DESCRIPTIONS");
    for (index, point) in acquisition.points_mut().iter_mut().enumerate() {
        point.label = labels
            .get_mut(index)
            .filter(|label| !label.is_empty())
            .map(std::mem::take)
            .unwrap_or_else(|| format!("uname*{}", index + 1));
        if let Some(description) = descriptions.get(index) {
            point.description = description.clone();
        }
    }
    for (kind, list, units) in TYPED_POINTS {
        for label in collapse_strings(point_group, list) {
            if let Some(point) = acquisition.find_point_mut(&label) {
                point.kind = kind;
            }
        }
        if let Some(unit) = collapse_strings(point_group, units).into_iter().next() {
            acquisition.set_point_unit(kind, unit);
        }
    }
    if let Some(unit) = collapse_strings(point_group, "UNITS").into_iter().next() {
        acquisition.set_point_unit(PointType::Marker, unit);
    }

    let mut labels = collapse_strings(analog_group, "LABELS");
    let descriptions = collapse_strings(analog_group, "DESCRIPTIONS");
    let units = collapse_strings(analog_group, "UNITS");
    let gains = analog_group
        .and_then(|group| group.child("GAIN"))
        .and_then(MetaData::info)
        .map(MetaDataInfo::to_i32s)
        .unwrap_or_default();
    for (index, analog) in acquisition.analogs_mut().iter_mut().enumerate() {
        analog.label = labels
            .get_mut(index)
            .filter(|label| !label.is_empty())
            .map(std::mem::take)
            .unwrap_or_else(|| format!("uname*{}", index + 1));
        if let Some(description) = descriptions.get(index) {
            analog.description = description.clone();
        }
        if let Some(unit) = units.get(index) {
            analog.unit = unit.clone();
        }
        if let Some(code) = gains.get(index) {
            analog.gain = Gain::from_code(*code);
        }
        analog.scale = scales[index] * gen_scale;
        analog.offset = offsets[index] as i32;
    }
    if let Some(bits) = first_i32(analog_group, "BITS") {
        if acquisition.set_analog_resolution(bits.max(0) as u32).is_err() {
            log_warning!("Unsupported analog resolution of {bits} bits. The default is kept.");
        }
    }
    Ok(())
}

fn encode_residual(residual: f64, mask: f64, scale: f64) -> i16 {
    if residual < 0.0 {
        return -1;
    }
    let low = (residual / scale.abs()).round().clamp(0.0, 255.0) as i16;
    let high = mask.clamp(0.0, 127.0) as i16;
    (high << 8) | low
}

fn to_i16(value: f64) -> i16 {
    value.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

fn check_writable(acquisition: &Acquisition) -> Result<(), CodecError> {
    let frames = acquisition.point_frame_number();
    if frames == 0 {
        return Err(inconsistent("No frames to write"));
    }
    if acquisition.point_frequency() <= 0.0 {
        return Err(inconsistent("Point frequency must be set before writing"));
    }
    if acquisition.last_frame() > i32::from(u16::MAX) {
        return Err(inconsistent(format!(
            "Last frame {} cannot be stored in a C3D header",
            acquisition.last_frame()
        )));
    }
    if acquisition.point_number() > usize::from(u8::MAX) {
        return Err(inconsistent("More than 255 points cannot be labelled"));
    }
    if acquisition.analog_number() > usize::from(u8::MAX) {
        return Err(inconsistent("More than 255 analog channels cannot be labelled"));
    }
    if acquisition.analog_number() * acquisition.analog_sample_ratio() > usize::from(u16::MAX) {
        return Err(inconsistent("Too many analog samples per point frame"));
    }
    if acquisition.event_number() > usize::from(u8::MAX) {
        return Err(inconsistent("More than 255 events cannot be written"));
    }
    if let Some(point) = acquisition.points().iter().find(|p| p.frame_number() != frames) {
        return Err(inconsistent(format!(
            "Point {} has {} frames instead of {frames}",
            point.label,
            point.frame_number()
        )));
    }
    let analog_frames = acquisition.analog_frame_number();
    if let Some(analog) = acquisition
        .analogs()
        .iter()
        .find(|a| a.frame_number() != analog_frames)
    {
        return Err(inconsistent(format!(
            "Analog channel {} has {} frames instead of {analog_frames}",
            analog.label,
            analog.frame_number()
        )));
    }
    Ok(())
}

fn max_abs(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, |max: f64, v| max.max(v.abs()))
}

/// Scale factors and offsets chosen for one encoding.
struct Scaling {
    point: f64,
    analog_scales: Vec<f64>,
    analog_offsets: Vec<i16>,
}

fn scaling(acquisition: &Acquisition, storage: StorageFormat) -> Scaling {
    match storage {
        StorageFormat::Float => Scaling {
            point: FLOAT_POINT_SCALE,
            analog_scales: acquisition
                .analogs()
                .iter()
                .map(|a| {
                    if a.scale.is_finite() && a.scale != 0.0 {
                        a.scale
                    } else {
                        1.0
                    }
                })
                .collect(),
            analog_offsets: acquisition
                .analogs()
                .iter()
                .map(|a| a.offset.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16)
                .collect(),
        },
        StorageFormat::Integer => {
            let largest = max_abs(acquisition.points().iter().flat_map(|p| {
                p.values()
                    .iter()
                    .zip(p.residuals())
                    .filter(|(_, r)| **r >= 0.0)
                    .flat_map(|(v, _)| v.iter().copied())
            }));
            Scaling {
                point: if largest > 0.0 {
                    largest / INTEGER_RANGE
                } else {
                    FLOAT_POINT_SCALE.abs()
                },
                analog_scales: acquisition
                    .analogs()
                    .iter()
                    .map(|a| {
                        let largest = max_abs(a.values().iter().copied());
                        if largest > 0.0 {
                            largest / INTEGER_RANGE
                        } else {
                            1.0
                        }
                    })
                    .collect(),
                analog_offsets: vec![0; acquisition.analog_number()],
            }
        }
    }
}

/// Removes `LABELS2`, `LABELS3`, ... left over from a previously read file.
fn drop_continuations(group: &mut MetaData, base: &str) {
    let stale: Vec<String> = group
        .children()
        .iter()
        .map(|child| child.label().to_owned())
        .filter(|label| {
            label
                .strip_prefix(base)
                .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        })
        .collect();
    for label in stale {
        group.remove_child(&label);
    }
}

fn set(root: &mut MetaData, path: &str, info: MetaDataInfo) -> Result<(), CodecError> {
    root.set_info(path, info)
        .map_err(|err| inconsistent(format!("{path}: {err}")))
}

fn build_parameters(
    acquisition: &Acquisition,
    scaling: &Scaling,
    data_start: u16,
) -> Result<MetaData, CodecError> {
    let mut root = acquisition.metadata().clone();
    let frames = acquisition.point_frame_number();

    set(&mut root, "POINT.USED", MetaDataInfo::int16(acquisition.point_number() as i16))?;
    set(
        &mut root,
        "POINT.FRAMES",
        match i16::try_from(frames) {
            Ok(frames) => MetaDataInfo::int16(frames),
            Err(_) => MetaDataInfo::float(frames as f64),
        },
    )?;
    set(&mut root, "POINT.DATA_START", MetaDataInfo::int16(data_start as i16))?;
    set(&mut root, "POINT.SCALE", MetaDataInfo::float(scaling.point))?;
    set(&mut root, "POINT.RATE", MetaDataInfo::float(acquisition.point_frequency()))?;
    if let Some(group) = root.child_mut("POINT") {
        drop_continuations(group, "LABELS");
        drop_continuations(group, "DESCRIPTIONS");
    }
    let points = acquisition.points();
    set(
        &mut root,
        "POINT.LABELS",
        MetaDataInfo::strings(points.iter().map(|p| p.label.as_str())),
    )?;
    set(
        &mut root,
        "POINT.DESCRIPTIONS",
        MetaDataInfo::strings(points.iter().map(|p| p.description.as_str())),
    )?;
    set(
        &mut root,
        "POINT.UNITS",
        MetaDataInfo::string(acquisition.point_unit(PointType::Marker)),
    )?;
    for (kind, list, units) in TYPED_POINTS {
        let labels: Vec<&str> = acquisition
            .points_of_type(kind)
            .map(|p| p.label.as_str())
            .collect();
        if labels.is_empty() {
            if let Some(group) = root.child_mut("POINT") {
                group.remove_child(list);
            }
        } else {
            set(&mut root, &format!("POINT.{list}"), MetaDataInfo::strings(labels))?;
            set(
                &mut root,
                &format!("POINT.{units}"),
                MetaDataInfo::string(acquisition.point_unit(kind)),
            )?;
        }
    }

    let analogs = acquisition.analogs();
    set(&mut root, "ANALOG.USED", MetaDataInfo::int16(analogs.len() as i16))?;
    if let Some(group) = root.child_mut("ANALOG") {
        for base in ["LABELS", "DESCRIPTIONS", "UNITS", "SCALE"] {
            drop_continuations(group, base);
        }
    }
    set(
        &mut root,
        "ANALOG.LABELS",
        MetaDataInfo::strings(analogs.iter().map(|a| a.label.as_str())),
    )?;
    set(
        &mut root,
        "ANALOG.DESCRIPTIONS",
        MetaDataInfo::strings(analogs.iter().map(|a| a.description.as_str())),
    )?;
    set(
        &mut root,
        "ANALOG.UNITS",
        MetaDataInfo::strings(analogs.iter().map(|a| a.unit.as_str())),
    )?;
    set(&mut root, "ANALOG.SCALE", MetaDataInfo::floats(scaling.analog_scales.clone()))?;
    set(&mut root, "ANALOG.OFFSET", MetaDataInfo::int16s(scaling.analog_offsets.clone()))?;
    set(&mut root, "ANALOG.GEN_SCALE", MetaDataInfo::float(1.0))?;
    set(&mut root, "ANALOG.RATE", MetaDataInfo::float(acquisition.analog_frequency()))?;
    set(&mut root, "ANALOG.FORMAT", MetaDataInfo::string("SIGNED"))?;
    set(
        &mut root,
        "ANALOG.BITS",
        MetaDataInfo::int16(acquisition.analog_resolution() as i16),
    )?;
    set(
        &mut root,
        "ANALOG.GAIN",
        MetaDataInfo::int16s(analogs.iter().map(|a| a.gain.code() as i16).collect()),
    )?;

    let events = acquisition.events();
    if events.is_empty() {
        root.remove_child("EVENT");
    } else {
        if let Some(group) = root.child_mut("EVENT") {
            for base in ["LABELS", "DESCRIPTIONS", "CONTEXTS", "SUBJECTS", "TIMES"] {
                drop_continuations(group, base);
            }
        }
        set(&mut root, "EVENT.USED", MetaDataInfo::int16(events.len() as i16))?;
        set(
            &mut root,
            "EVENT.LABELS",
            MetaDataInfo::strings(events.iter().map(|e| e.label.as_str())),
        )?;
        set(
            &mut root,
            "EVENT.DESCRIPTIONS",
            MetaDataInfo::strings(events.iter().map(|e| e.description.as_str())),
        )?;
        set(
            &mut root,
            "EVENT.CONTEXTS",
            MetaDataInfo::strings(events.iter().map(|e| e.context.as_str())),
        )?;
        set(
            &mut root,
            "EVENT.SUBJECTS",
            MetaDataInfo::strings(events.iter().map(|e| e.subject.as_str())),
        )?;
        let times: Vec<f64> = events
            .iter()
            .flat_map(|e| {
                let minutes = (e.time / 60.0).floor();
                [minutes, e.time - minutes * 60.0]
            })
            .collect();
        let times = MetaDataInfo::floats(times)
            .reshaped(vec![2, events.len()])
            .map_err(|err| inconsistent(err.to_string()))?;
        set(&mut root, "EVENT.TIMES", times)?;
    }
    Ok(root)
}

type Writer = BinaryWriter<Cursor<Vec<u8>>>;

/// Type code, dimensions and raw bytes of a parameter value.
fn encode_value(info: &MetaDataInfo, order: ByteOrder) -> Option<(i8, Vec<u8>, Vec<u8>)> {
    let dims = info
        .dimensions()
        .iter()
        .map(|d| u8::try_from(*d).ok())
        .collect::<Option<Vec<u8>>>()?;
    let mut out = BinaryWriter::new(Cursor::new(Vec::new()), order);
    let kind = match info.value() {
        MetaDataValue::Char(strings) => {
            let width = info.dimensions().first().copied().unwrap_or(1);
            for s in strings {
                out.write_string(s, width).ok()?;
            }
            -1
        }
        MetaDataValue::Int8(values) => {
            for v in values {
                out.write_i8(*v).ok()?;
            }
            1
        }
        MetaDataValue::Int16(values) => {
            for v in values {
                out.write_i16(*v).ok()?;
            }
            2
        }
        MetaDataValue::Int32(values) => {
            for v in values {
                out.write_f32(*v as f32).ok()?;
            }
            4
        }
        MetaDataValue::Float(values) => {
            for v in values {
                out.write_f32(*v as f32).ok()?;
            }
            4
        }
    };
    Some((kind, dims, out.into_inner().into_inner()))
}

fn record_name(node: &MetaData) -> Option<(i8, &[u8])> {
    let name = node.label().as_bytes();
    let len = i8::try_from(name.len()).ok().filter(|len| *len > 0)?;
    Some((if node.is_unlocked() { len } else { -len }, name))
}

fn description_bytes(node: &MetaData) -> &[u8] {
    let bytes = node.description().as_bytes();
    &bytes[..bytes.len().min(255)]
}

fn encode_parameters(root: &MetaData, order: ByteOrder) -> Result<Vec<u8>, CodecError> {
    let mut w: Writer = BinaryWriter::new(Cursor::new(Vec::new()), order);
    w.write_u8(1).map_err(io_err)?;
    w.write_u8(HEADER_KEY).map_err(io_err)?;
    w.write_u8(0).map_err(io_err)?;
    w.write_u8(order.processor_code()).map_err(io_err)?;

    let mut last_offset_at = None;
    let mut group_id: i8 = 0;
    for group in root.children() {
        if group.is_leaf() {
            log_warning!("Metadata {} is not in a group and cannot be written.", group.label());
            continue;
        }
        let Some((name_len, name)) = record_name(group) else {
            log_warning!("Group name {} is too long to be written.", group.label());
            continue;
        };
        group_id = group_id
            .checked_add(1)
            .ok_or_else(|| inconsistent("More than 127 parameter groups cannot be written"))?;
        let description = description_bytes(group);
        w.write_i8(name_len).map_err(io_err)?;
        w.write_i8(-group_id).map_err(io_err)?;
        w.write_bytes(name).map_err(io_err)?;
        last_offset_at = Some(w.position().map_err(io_err)?);
        w.write_u16((2 + 1 + description.len()) as u16).map_err(io_err)?;
        w.write_u8(description.len() as u8).map_err(io_err)?;
        w.write_bytes(description).map_err(io_err)?;

        for parameter in group.children() {
            let Some(info) = parameter.info() else {
                log_warning!(
                    "Nested group {}:{} cannot be written.",
                    group.label(),
                    parameter.label()
                );
                continue;
            };
            let (Some((name_len, name)), Some((kind, dims, data))) =
                (record_name(parameter), encode_value(info, order))
            else {
                log_warning!(
                    "Parameter {}:{} cannot be represented and is skipped.",
                    group.label(),
                    parameter.label()
                );
                continue;
            };
            let description = description_bytes(parameter);
            let offset = 2 + 1 + 1 + dims.len() + data.len() + 1 + description.len();
            let offset = u16::try_from(offset).map_err(|_| {
                inconsistent(format!(
                    "Parameter {}:{} is too large",
                    group.label(),
                    parameter.label()
                ))
            })?;
            w.write_i8(name_len).map_err(io_err)?;
            w.write_i8(group_id).map_err(io_err)?;
            w.write_bytes(name).map_err(io_err)?;
            last_offset_at = Some(w.position().map_err(io_err)?);
            w.write_u16(offset).map_err(io_err)?;
            w.write_i8(kind).map_err(io_err)?;
            w.write_u8(dims.len() as u8).map_err(io_err)?;
            w.write_bytes(&dims).map_err(io_err)?;
            w.write_bytes(&data).map_err(io_err)?;
            w.write_u8(description.len() as u8).map_err(io_err)?;
            w.write_bytes(description).map_err(io_err)?;
        }
    }
    if let Some(at) = last_offset_at {
        let end = w.position().map_err(io_err)?;
        w.seek_to(at).map_err(io_err)?;
        w.write_u16(0).map_err(io_err)?;
        w.seek_to(end).map_err(io_err)?;
    }
    w.pad_to_block(BLOCK).map_err(io_err)?;

    let mut bytes = w.into_inner().into_inner();
    let blocks = u8::try_from(bytes.len() as u64 / BLOCK)
        .map_err(|_| inconsistent("Parameter section exceeds 255 blocks"))?;
    bytes[2] = blocks;
    Ok(bytes)
}

pub(crate) fn encode(
    acquisition: &Acquisition,
    options: C3dWriteOptions,
) -> Result<Vec<u8>, CodecError> {
    check_writable(acquisition)?;
    let order = options.byte_order;
    let scaling = scaling(acquisition, options.storage);
    let point_scale = match options.storage {
        StorageFormat::Float => -scaling.point.abs(),
        StorageFormat::Integer => scaling.point.abs(),
    };
    let scaling = Scaling {
        point: point_scale,
        ..scaling
    };

    // DATA_START has a fixed size, so the section length does not depend on it.
    let probe = encode_parameters(&build_parameters(acquisition, &scaling, 0)?, order)?;
    let data_start = 2 + probe.len() as u64 / BLOCK;
    let data_start =
        u16::try_from(data_start).map_err(|_| inconsistent("Parameter section is too large"))?;
    let parameters =
        encode_parameters(&build_parameters(acquisition, &scaling, data_start)?, order)?;

    let ratio = acquisition.analog_sample_ratio();
    let mut w: Writer = BinaryWriter::new(Cursor::new(Vec::new()), order);
    w.write_u8(2).map_err(io_err)?;
    w.write_u8(HEADER_KEY).map_err(io_err)?;
    w.write_u16(acquisition.point_number() as u16).map_err(io_err)?;
    w.write_u16((acquisition.analog_number() * ratio) as u16)
        .map_err(io_err)?;
    w.write_u16(acquisition.first_frame() as u16).map_err(io_err)?;
    w.write_u16(acquisition.last_frame() as u16).map_err(io_err)?;
    w.write_u16(acquisition.max_interpolation_gap().min(u32::from(u16::MAX)) as u16)
        .map_err(io_err)?;
    w.write_f32(scaling.point as f32).map_err(io_err)?;
    w.write_u16(data_start).map_err(io_err)?;
    w.write_u16(ratio as u16).map_err(io_err)?;
    w.write_f32(acquisition.point_frequency() as f32)
        .map_err(io_err)?;
    w.seek_to(298).map_err(io_err)?;
    w.write_u16(EVENT_KEY).map_err(io_err)?;
    w.write_u16(0).map_err(io_err)?;
    w.seek_to(BLOCK).map_err(io_err)?;
    w.write_bytes(&parameters).map_err(io_err)?;

    let integer = options.storage == StorageFormat::Integer;
    let scale = scaling.point.abs();
    for frame in 0..acquisition.point_frame_number() {
        for point in acquisition.points() {
            let residual = point.residuals()[frame];
            let word = encode_residual(residual, point.masks()[frame], scale);
            let coords = if residual < 0.0 {
                [0.0; 3]
            } else {
                point.values()[frame]
            };
            for coord in coords {
                if integer {
                    w.write_i16(to_i16(coord / scale)).map_err(io_err)?;
                } else {
                    w.write_f32(coord as f32).map_err(io_err)?;
                }
            }
            if integer {
                w.write_i16(word).map_err(io_err)?;
            } else {
                w.write_f32(f32::from(word)).map_err(io_err)?;
            }
        }
        for sample in 0..ratio {
            for (channel, analog) in acquisition.analogs().iter().enumerate() {
                let value = analog.values()[frame * ratio + sample];
                let raw = value / scaling.analog_scales[channel]
                    + f64::from(scaling.analog_offsets[channel]);
                if integer {
                    w.write_i16(to_i16(raw)).map_err(io_err)?;
                } else {
                    w.write_f32(raw as f32).map_err(io_err)?;
                }
            }
        }
    }
    w.pad_to_block(BLOCK).map_err(io_err)?;
    Ok(w.into_inner().into_inner())
}
