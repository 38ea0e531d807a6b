mod acquisition;
mod analog;
mod event;
mod force_platform;
mod landmarks;
mod metadata;
mod point;
mod wrench;

pub use acquisition::{Acquisition, ANALOG_RESOLUTIONS};
pub use analog::{Analog, Gain};
pub use event::Event;
pub use force_platform::{
    ForcePlatform, ForcePlatformCollection, ForcePlatformType, DEFAULT_CORNERS,
};
pub use landmarks::LandmarksTranslator;
pub use metadata::{MetaData, MetaDataInfo, MetaDataValue, ValueFormat};
pub use point::{Point, PointType};
pub use wrench::{Wrench, WrenchCollection};
