use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Analog;

/// Force platform types following the C3D `FORCE_PLATFORM:TYPE` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForcePlatformType {
    /// Fx, Fy, Fz, COPx, COPy, Tz.
    Type1,
    /// Fx, Fy, Fz, Mx, My, Mz.
    Type2,
    /// Kistler 8-channel: Fx12, Fx34, Fy14, Fy23, Fz1..Fz4.
    Type3,
    /// Type 2 channels in volts, converted with a calibration matrix.
    Type4,
}

impl ForcePlatformType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ForcePlatformType::Type1),
            2 => Some(ForcePlatformType::Type2),
            3 => Some(ForcePlatformType::Type3),
            4 => Some(ForcePlatformType::Type4),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ForcePlatformType::Type1 => 1,
            ForcePlatformType::Type2 => 2,
            ForcePlatformType::Type3 => 3,
            ForcePlatformType::Type4 => 4,
        }
    }

    pub fn channel_number(&self) -> usize {
        match self {
            ForcePlatformType::Type3 => 8,
            _ => 6,
        }
    }

    pub fn requires_calibration(&self) -> bool {
        matches!(self, ForcePlatformType::Type4)
    }
}

impl fmt::Display for ForcePlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type {}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcePlatform {
    pub kind: ForcePlatformType,
    /// Vector from the centre of the working surface to the platform's
    /// sensing origin, in platform coordinates.
    pub origin: [f64; 3],
    /// Working-surface corners in the global frame, numbered as in the C3D
    /// convention.
    pub corners: [[f64; 3]; 4],
    /// Row-major `channels x channels` matrix, when the type uses one.
    pub calibration: Option<Vec<f64>>,
    pub channels: Vec<Analog>,
}

impl ForcePlatform {
    /// A platform with zeroed channels and the default 500 mm square geometry.
    pub fn new(kind: ForcePlatformType) -> Self {
        Self {
            kind,
            origin: [0.0; 3],
            corners: DEFAULT_CORNERS,
            calibration: None,
            channels: Vec::new(),
        }
    }

    pub fn channel_number(&self) -> usize {
        self.channels.len()
    }

    /// Frame count of the channels (0 for a platform without channels).
    pub fn frame_number(&self) -> usize {
        self.channels.first().map(Analog::frame_number).unwrap_or(0)
    }
}

pub const DEFAULT_CORNERS: [[f64; 3]; 4] = [
    [250.0, 250.0, 0.0],
    [-250.0, 250.0, 0.0],
    [-250.0, -250.0, 0.0],
    [250.0, -250.0, 0.0],
];

pub type ForcePlatformCollection = Vec<ForcePlatform>;
