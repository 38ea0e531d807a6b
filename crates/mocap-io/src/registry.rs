use std::fmt;
use std::path::Path;

use mocap_core::Acquisition;
use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::errors::CodecError;
use crate::file_io::AcquisitionFileIO;
use crate::formats::{C3dFileIO, GrxFileIO, TrcFileIO};

/// Registered codec: its name and how to build a fresh instance.
#[derive(Clone, Copy)]
pub struct CodecEntry {
    pub name: &'static str,
    pub create: fn() -> Box<dyn AcquisitionFileIO>,
}

impl fmt::Debug for CodecEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CodecEntry").field(&self.name).finish()
    }
}

fn create_c3d() -> Box<dyn AcquisitionFileIO> {
    Box::new(C3dFileIO::new())
}

fn create_trc() -> Box<dyn AcquisitionFileIO> {
    Box::new(TrcFileIO::new())
}

fn create_grx() -> Box<dyn AcquisitionFileIO> {
    Box::new(GrxFileIO::new())
}

static DEFAULT_CODECS: Lazy<Vec<CodecEntry>> = Lazy::new(|| {
    vec![
        CodecEntry {
            name: C3dFileIO::NAME,
            create: create_c3d,
        },
        CodecEntry {
            name: TrcFileIO::NAME,
            create: create_trc,
        },
        CodecEntry {
            name: GrxFileIO::NAME,
            create: create_grx,
        },
    ]
});

/// Ordered list of codecs probed when no codec is assigned explicitly.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<CodecEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            entries: DEFAULT_CODECS.clone(),
        }
    }
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[CodecEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    /// Appends a codec at the lowest priority. A codec already registered
    /// under the same name is replaced in place.
    pub fn register(&mut self, entry: CodecEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Removes a codec from the detection order. Names match case-insensitively.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !e.name.eq_ignore_ascii_case(name));
        self.entries.len() != before
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn AcquisitionFileIO>> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| (e.create)())
    }

    /// First codec, in priority order, whose content probe accepts `path`.
    pub fn detect_reader(&self, path: &Path) -> Option<Box<dyn AcquisitionFileIO>> {
        for entry in &self.entries {
            let io = (entry.create)();
            if io.has_read_operation() && io.can_read_file(path) {
                info!(codec = entry.name, path = %path.display(), "codec selected for reading");
                return Some(io);
            }
            debug!(codec = entry.name, path = %path.display(), "probe rejected file");
        }
        None
    }

    /// First codec, in priority order, that claims the extension of `path`.
    pub fn detect_writer(&self, path: &Path) -> Option<Box<dyn AcquisitionFileIO>> {
        let io = self
            .entries
            .iter()
            .map(|entry| (entry.create)())
            .find(|io| io.can_write_file(path))?;
        info!(codec = io.name(), path = %path.display(), "codec selected for writing");
        Some(io)
    }
}

/// Reads `path` with the first matching codec of the default registry.
pub fn read_acquisition(path: &Path) -> mocap_core::Result<Acquisition> {
    let mut io = Registry::default().detect_reader(path).ok_or_else(|| {
        mocap_core::Error::reader("No suitable file format found")
    })?;
    Ok(io.read(path)?)
}

/// Writes `acquisition` to `path` with the codec claiming its extension.
pub fn write_acquisition(path: &Path, acquisition: &Acquisition) -> mocap_core::Result<()> {
    let mut io = Registry::default().detect_writer(path).ok_or_else(|| {
        mocap_core::Error::writer("No suitable file format found")
    })?;
    io.write(path, acquisition).map_err(|err: CodecError| err.into())
}
