use serde::{Deserialize, Serialize};

use crate::model::{Point, PointType};

/// Resultant load of one force platform: point of application, force and
/// moment, all at the same frame count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wrench {
    pub position: Point,
    pub force: Point,
    pub moment: Point,
}

impl Wrench {
    pub fn new(label: &str, frames: usize) -> Self {
        Self {
            position: Point::with_type(format!("{label}.P"), frames, PointType::Marker),
            force: Point::with_type(format!("{label}.F"), frames, PointType::Force),
            moment: Point::with_type(format!("{label}.M"), frames, PointType::Moment),
        }
    }

    /// Label shared by the three components.
    pub fn label(&self) -> &str {
        self.position
            .label
            .strip_suffix(".P")
            .unwrap_or(&self.position.label)
    }

    pub fn frame_number(&self) -> usize {
        self.position.frame_number()
    }
}

pub type WrenchCollection = Vec<Wrench>;
