use std::path::PathBuf;

use mocap_core::{
    Acquisition, Algorithm, AnyDataObject, Error, Inputs, Outputs, Ports, ProcessObject, Result,
    Source,
};
use tracing::info;

use crate::file_io::AcquisitionFileIO;
use crate::registry::Registry;

/// Pipeline sink encoding its input acquisition into one file.
pub struct AcquisitionWriting {
    filename: Option<PathBuf>,
    io: Option<Box<dyn AcquisitionFileIO>>,
    explicit_io: bool,
    registry: Registry,
}

impl AcquisitionWriting {
    pub const NAME: &'static str = "AcquisitionFileWriter";

    pub fn new(registry: Registry) -> Self {
        Self {
            filename: None,
            io: None,
            explicit_io: false,
            registry,
        }
    }
}

impl Algorithm for AcquisitionWriting {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn input_ports(&self) -> Ports {
        Ports::Named(&["acquisition"])
    }

    fn make_outputs(&self) -> Vec<AnyDataObject> {
        Vec::new()
    }

    fn generate(&mut self, inputs: &Inputs, _outputs: &mut Outputs<'_>) -> Result<()> {
        let path = match &self.filename {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => return Err(Error::writer("Filename must be specified")),
        };
        let acquisition = inputs.required::<Acquisition>(0)?;

        if self.io.is_none() {
            self.io = self.registry.detect_writer(&path);
        }
        let io = self
            .io
            .as_mut()
            .ok_or_else(|| Error::writer("No suitable file format found"))?;
        if !io.has_write_operation() {
            return Err(Error::writer(format!(
                "{} files cannot be written\nFilename: {}",
                io.name(),
                path.display()
            )));
        }

        io.write(&path, &acquisition.borrow())?;
        info!(codec = io.name(), path = %path.display(), "acquisition written");
        Ok(())
    }
}

/// Writes the acquisition connected to its input when updated.
#[derive(Clone)]
pub struct AcquisitionFileWriter {
    process: ProcessObject<AcquisitionWriting>,
}

impl Default for AcquisitionFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquisitionFileWriter {
    pub fn new() -> Self {
        Self::with_registry(Registry::default())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            process: ProcessObject::new(AcquisitionWriting::new(registry)),
        }
    }

    pub fn set_filename(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.process.configure(|writing| {
            if !writing.explicit_io {
                writing.io = None;
            }
            writing.filename = Some(path);
        });
    }

    pub fn filename(&self) -> Option<PathBuf> {
        self.process.with_algorithm(|writing| writing.filename.clone())
    }

    pub fn set_input(&self, source: impl Into<Source>) -> Result<()> {
        self.process.set_input(0, source)
    }

    pub fn set_acquisition_io(&self, io: Box<dyn AcquisitionFileIO>) {
        self.process.configure(|writing| {
            writing.io = Some(io);
            writing.explicit_io = true;
        });
    }

    pub fn clear_acquisition_io(&self) {
        self.process.configure(|writing| {
            writing.io = None;
            writing.explicit_io = false;
        });
    }

    pub fn acquisition_io(&self) -> Option<&'static str> {
        self.process
            .with_algorithm(|writing| writing.io.as_ref().map(|io| io.name()))
    }

    pub fn with_acquisition_io<R>(&self, f: impl FnOnce(Option<&dyn AcquisitionFileIO>) -> R) -> R {
        self.process
            .with_algorithm(|writing| f(writing.io.as_deref()))
    }

    /// Writes the file if the input or the settings changed since the last write.
    pub fn update(&self) -> Result<()> {
        self.process.update()
    }

    pub fn process(&self) -> &ProcessObject<AcquisitionWriting> {
        &self.process
    }
}
