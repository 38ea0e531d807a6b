pub mod data_object;
pub mod diagnostics;
pub mod error;
pub mod filters;
pub mod geometry;
pub mod model;
pub mod process;

pub use data_object::{AnyDataObject, DataObject, Timestamp};
pub use error::{Error, ErrorKind, Result};
pub use filters::{ForcePlatformsExtractor, GroundReactionWrenchFilter};
pub use model::{
    Acquisition, Analog, Event, ForcePlatform, ForcePlatformCollection, ForcePlatformType,
    LandmarksTranslator, MetaData, MetaDataInfo, MetaDataValue, Point, PointType, Wrench,
    WrenchCollection,
};
pub use process::{Algorithm, Inputs, Outputs, Ports, ProcessObject, Source, UpstreamNode};
