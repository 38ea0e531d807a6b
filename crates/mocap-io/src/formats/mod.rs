mod c3d;
mod grx;
mod trc;

pub use c3d::{C3dFileIO, C3dWriteOptions};
pub use grx::GrxFileIO;
pub use trc::TrcFileIO;
