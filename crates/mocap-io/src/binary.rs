//! Byte-order aware primitive streams for the binary codecs.
//!
//! Three layouts exist in the wild: IEEE little-endian (Intel), VAX
//! little-endian (DEC) and IEEE big-endian (MIPS/SGI). Integers of the VAX
//! layout are little-endian; only its floats differ.

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ByteOrder {
    #[default]
    IeeeLittleEndian,
    VaxLittleEndian,
    IeeeBigEndian,
}

impl ByteOrder {
    /// Processor code stored in C3D parameter sections.
    pub fn processor_code(self) -> u8 {
        match self {
            ByteOrder::IeeeLittleEndian => 84,
            ByteOrder::VaxLittleEndian => 85,
            ByteOrder::IeeeBigEndian => 86,
        }
    }

    pub fn from_processor_code(code: u8) -> Option<Self> {
        match code {
            84 => Some(ByteOrder::IeeeLittleEndian),
            85 => Some(ByteOrder::VaxLittleEndian),
            86 => Some(ByteOrder::IeeeBigEndian),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ByteOrder::IeeeLittleEndian => "IEEE little-endian",
            ByteOrder::VaxLittleEndian => "VAX little-endian",
            ByteOrder::IeeeBigEndian => "IEEE big-endian",
        }
    }
}

/// VAX F_floating to IEEE single precision.
pub fn vax_to_ieee(bytes: [u8; 4]) -> f32 {
    f32::from_le_bytes([bytes[2], bytes[3], bytes[0], bytes[1]]) / 4.0
}

pub fn ieee_to_vax(value: f32) -> [u8; 4] {
    let ieee = (value * 4.0).to_le_bytes();
    [ieee[2], ieee[3], ieee[0], ieee[1]]
}

pub struct BinaryReader<R> {
    inner: R,
    order: ByteOrder,
}

impl<R: Read + Seek> BinaryReader<R> {
    pub fn new(inner: R, order: ByteOrder) -> Self {
        Self { inner, order }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    pub fn seek_to(&mut self, position: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(position)).map(|_| ())
    }

    pub fn skip(&mut self, bytes: i64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Current(bytes)).map(|_| ())
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.inner.read_u8()
    }

    pub fn read_i8(&mut self) -> io::Result<i8> {
        self.inner.read_i8()
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        match self.order {
            ByteOrder::IeeeBigEndian => self.inner.read_u16::<BigEndian>(),
            _ => self.inner.read_u16::<LittleEndian>(),
        }
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        match self.order {
            ByteOrder::IeeeBigEndian => self.inner.read_i16::<BigEndian>(),
            _ => self.inner.read_i16::<LittleEndian>(),
        }
    }

    pub fn read_f32(&mut self) -> io::Result<f32> {
        match self.order {
            ByteOrder::IeeeLittleEndian => self.inner.read_f32::<LittleEndian>(),
            ByteOrder::IeeeBigEndian => self.inner.read_f32::<BigEndian>(),
            ByteOrder::VaxLittleEndian => {
                let mut bytes = [0u8; 4];
                self.inner.read_exact(&mut bytes)?;
                Ok(vax_to_ieee(bytes))
            }
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        self.inner.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Fixed-width text field with trailing blanks and NULs removed.
    pub fn read_string(&mut self, len: usize) -> io::Result<String> {
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(&bytes)
            .trim_end_matches(|c| c == '\0' || c == ' ')
            .to_owned())
    }

    pub fn read_i8s(&mut self, count: usize) -> io::Result<Vec<i8>> {
        (0..count).map(|_| self.read_i8()).collect()
    }

    pub fn read_i16s(&mut self, count: usize) -> io::Result<Vec<i16>> {
        (0..count).map(|_| self.read_i16()).collect()
    }

    pub fn read_f32s(&mut self, count: usize) -> io::Result<Vec<f32>> {
        (0..count).map(|_| self.read_f32()).collect()
    }
}

pub struct BinaryWriter<W> {
    inner: W,
    order: ByteOrder,
}

impl<W: Write + Seek> BinaryWriter<W> {
    pub fn new(inner: W, order: ByteOrder) -> Self {
        Self { inner, order }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    pub fn seek_to(&mut self, position: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(position)).map(|_| ())
    }

    pub fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.inner.write_u8(value)
    }

    pub fn write_i8(&mut self, value: i8) -> io::Result<()> {
        self.inner.write_i8(value)
    }

    pub fn write_u16(&mut self, value: u16) -> io::Result<()> {
        match self.order {
            ByteOrder::IeeeBigEndian => self.inner.write_u16::<BigEndian>(value),
            _ => self.inner.write_u16::<LittleEndian>(value),
        }
    }

    pub fn write_i16(&mut self, value: i16) -> io::Result<()> {
        match self.order {
            ByteOrder::IeeeBigEndian => self.inner.write_i16::<BigEndian>(value),
            _ => self.inner.write_i16::<LittleEndian>(value),
        }
    }

    pub fn write_f32(&mut self, value: f32) -> io::Result<()> {
        match self.order {
            ByteOrder::IeeeLittleEndian => self.inner.write_f32::<LittleEndian>(value),
            ByteOrder::IeeeBigEndian => self.inner.write_f32::<BigEndian>(value),
            ByteOrder::VaxLittleEndian => self.inner.write_all(&ieee_to_vax(value)),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    /// Writes `value` into a field of exactly `width` bytes, blank padded.
    pub fn write_string(&mut self, value: &str, width: usize) -> io::Result<()> {
        let mut bytes: Vec<u8> = value.bytes().take(width).collect();
        bytes.resize(width, b' ');
        self.inner.write_all(&bytes)
    }

    /// Zero-fills up to the next multiple of `block` bytes.
    pub fn pad_to_block(&mut self, block: u64) -> io::Result<()> {
        let position = self.position()?;
        let remainder = position % block;
        if remainder != 0 {
            let padding = vec![0u8; (block - remainder) as usize];
            self.inner.write_all(&padding)?;
        }
        Ok(())
    }
}
