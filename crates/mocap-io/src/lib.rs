pub mod binary;
pub mod errors;
pub mod file_io;
pub mod formats;
pub mod reader;
pub mod registry;
pub mod writer;

pub use binary::ByteOrder;
pub use errors::CodecError;
pub use file_io::{AcquisitionFileIO, FileType, StorageFormat};
pub use formats::{C3dFileIO, C3dWriteOptions, GrxFileIO, TrcFileIO};
pub use reader::{AcquisitionFileReader, AcquisitionReading};
pub use registry::{read_acquisition, write_acquisition, CodecEntry, Registry};
pub use writer::{AcquisitionFileWriter, AcquisitionWriting};

#[cfg(test)]
mod tests;
