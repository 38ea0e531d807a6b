use std::path::PathBuf;

use mocap_core::{
    Acquisition, Algorithm, AnyDataObject, DataObject, Error, Inputs, Outputs, ProcessObject,
    Result, Source,
};
use tracing::info;

use crate::file_io::AcquisitionFileIO;
use crate::registry::Registry;

/// Pipeline source decoding one file into an [`Acquisition`].
pub struct AcquisitionReading {
    filename: Option<PathBuf>,
    io: Option<Box<dyn AcquisitionFileIO>>,
    explicit_io: bool,
    registry: Registry,
}

impl AcquisitionReading {
    pub const NAME: &'static str = "AcquisitionFileReader";

    pub fn new(registry: Registry) -> Self {
        Self {
            filename: None,
            io: None,
            explicit_io: false,
            registry,
        }
    }
}

impl Algorithm for AcquisitionReading {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn make_outputs(&self) -> Vec<AnyDataObject> {
        vec![DataObject::new(Acquisition::new()).into()]
    }

    fn generate(&mut self, _inputs: &Inputs, outputs: &mut Outputs<'_>) -> Result<()> {
        let path = match &self.filename {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => return Err(Error::reader("Filename must be specified")),
        };
        if !path.exists() {
            return Err(Error::reader(format!(
                "File doesn't exist\nFilename: {}",
                path.display()
            )));
        }

        if self.io.is_none() {
            self.io = self.registry.detect_reader(&path);
        }
        let io = self
            .io
            .as_mut()
            .ok_or_else(|| Error::reader("No suitable file format found"))?;
        if !io.has_read_operation() {
            return Err(Error::reader(format!(
                "{} files cannot be read\nFilename: {}",
                io.name(),
                path.display()
            )));
        }

        let acquisition = io.read(&path)?;
        info!(
            codec = io.name(),
            path = %path.display(),
            points = acquisition.point_number(),
            analogs = acquisition.analog_number(),
            frames = acquisition.point_frame_number(),
            "acquisition read"
        );
        outputs.set(0, acquisition)
    }
}

/// Reads an acquisition file as the head of a pipeline.
///
/// Without an explicit codec, the registry is probed in priority order on
/// the first update after the filename changes.
#[derive(Clone)]
pub struct AcquisitionFileReader {
    process: ProcessObject<AcquisitionReading>,
}

impl Default for AcquisitionFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquisitionFileReader {
    pub fn new() -> Self {
        Self::with_registry(Registry::default())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            process: ProcessObject::new(AcquisitionReading::new(registry)),
        }
    }

    pub fn set_filename(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.process.configure(|reading| {
            if !reading.explicit_io {
                reading.io = None;
            }
            reading.filename = Some(path);
        });
    }

    pub fn filename(&self) -> Option<PathBuf> {
        self.process.with_algorithm(|reading| reading.filename.clone())
    }

    /// Forces `io` for every subsequent read, bypassing detection.
    pub fn set_acquisition_io(&self, io: Box<dyn AcquisitionFileIO>) {
        self.process.configure(|reading| {
            reading.io = Some(io);
            reading.explicit_io = true;
        });
    }

    /// Returns to registry detection.
    pub fn clear_acquisition_io(&self) {
        self.process.configure(|reading| {
            reading.io = None;
            reading.explicit_io = false;
        });
    }

    /// Name of the assigned or detected codec, if any.
    pub fn acquisition_io(&self) -> Option<&'static str> {
        self.process
            .with_algorithm(|reading| reading.io.as_ref().map(|io| io.name()))
    }

    pub fn with_acquisition_io<R>(&self, f: impl FnOnce(Option<&dyn AcquisitionFileIO>) -> R) -> R {
        self.process
            .with_algorithm(|reading| f(reading.io.as_deref()))
    }

    pub fn output(&self) -> Result<DataObject<Acquisition>> {
        self.process.output(0)
    }

    /// Source for connecting the reader to a downstream node.
    pub fn output_port(&self) -> Source {
        self.process.output_port(0)
    }

    pub fn update(&self) -> Result<()> {
        self.process.update()
    }

    /// Re-reads the file on the next update even if nothing changed.
    pub fn modified(&self) {
        self.process.modified();
    }

    pub fn process(&self) -> &ProcessObject<AcquisitionReading> {
        &self.process
    }
}
