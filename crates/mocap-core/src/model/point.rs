use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PointType {
    #[default]
    Marker,
    Angle,
    Force,
    Moment,
    Power,
    Scalar,
    Reaction,
}

impl PointType {
    pub const ALL: [PointType; 7] = [
        PointType::Marker,
        PointType::Angle,
        PointType::Force,
        PointType::Moment,
        PointType::Power,
        PointType::Scalar,
        PointType::Reaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PointType::Marker => "Marker",
            PointType::Angle => "Angle",
            PointType::Force => "Force",
            PointType::Moment => "Moment",
            PointType::Power => "Power",
            PointType::Scalar => "Scalar",
            PointType::Reaction => "Reaction",
        }
    }

    pub fn default_unit(&self) -> &'static str {
        match self {
            PointType::Marker => "mm",
            PointType::Angle => "deg",
            PointType::Force => "N",
            PointType::Moment => "Nmm",
            PointType::Power => "W",
            PointType::Scalar | PointType::Reaction => "",
        }
    }
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 3D quantity sampled at the point frequency.
///
/// A negative residual marks the sample at that frame as invalid (occluded
/// marker, undefined centre of pressure).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub label: String,
    pub description: String,
    pub kind: PointType,
    values: Vec<[f64; 3]>,
    residuals: Vec<f64>,
    masks: Vec<f64>,
}

impl Point {
    pub fn new(label: impl Into<String>, frames: usize) -> Self {
        Self::with_type(label, frames, PointType::Marker)
    }

    pub fn with_type(label: impl Into<String>, frames: usize, kind: PointType) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            kind,
            values: vec![[0.0; 3]; frames],
            residuals: vec![0.0; frames],
            masks: vec![0.0; frames],
        }
    }

    pub fn frame_number(&self) -> usize {
        self.values.len()
    }

    /// Truncates or zero-extends the three series together.
    pub fn set_frame_number(&mut self, frames: usize) {
        self.values.resize(frames, [0.0; 3]);
        self.residuals.resize(frames, 0.0);
        self.masks.resize(frames, 0.0);
    }

    pub fn values(&self) -> &[[f64; 3]] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [[f64; 3]] {
        &mut self.values
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn residuals_mut(&mut self) -> &mut [f64] {
        &mut self.residuals
    }

    pub fn masks(&self) -> &[f64] {
        &self.masks
    }

    pub fn masks_mut(&mut self) -> &mut [f64] {
        &mut self.masks
    }

    pub fn is_valid(&self, frame: usize) -> bool {
        self.residuals.get(frame).is_some_and(|r| *r >= 0.0)
    }

    /// Writes one frame. A negative residual zeroes the coordinates.
    pub fn set_frame(&mut self, frame: usize, value: [f64; 3], residual: f64) -> Result<()> {
        let frames = self.values.len();
        if frame >= frames {
            return Err(Error::out_of_range(format!(
                "frame {frame} out of range for point {} ({frames} frames)",
                self.label
            )));
        }
        self.values[frame] = if residual < 0.0 { [0.0; 3] } else { value };
        self.residuals[frame] = residual;
        Ok(())
    }

    /// Marks `frame` as invalid.
    pub fn invalidate(&mut self, frame: usize) -> Result<()> {
        self.set_frame(frame, [0.0; 3], -1.0)
    }

    /// Values of one coordinate (0 = x, 1 = y, 2 = z) across frames.
    pub fn component(&self, axis: usize) -> Vec<f64> {
        self.values.iter().map(|v| v[axis]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resizing_keeps_series_aligned() {
        let mut point = Point::new("LASI", 4);
        point.set_frame(3, [1.0, 2.0, 3.0], 0.5).unwrap();
        point.set_frame_number(6);
        assert_eq!(point.frame_number(), 6);
        assert_eq!(point.residuals().len(), 6);
        assert_eq!(point.masks().len(), 6);
        assert_eq!(point.values()[3], [1.0, 2.0, 3.0]);

        point.set_frame_number(2);
        assert_eq!(point.values().len(), 2);
        assert_eq!(point.residuals().len(), 2);
    }

    #[test]
    fn negative_residual_invalidates_sample() {
        let mut point = Point::with_type("GRW1.P", 3, PointType::Force);
        point.set_frame(1, [5.0, 5.0, 5.0], -1.0).unwrap();
        assert!(!point.is_valid(1));
        assert!(point.is_valid(0));
        assert!(!point.is_valid(7));
        assert_eq!(point.values()[1], [0.0; 3]);
    }

    #[test]
    fn frames_past_the_end_are_rejected() {
        let mut point = Point::new("C7", 2);
        let err = point.set_frame(2, [1.0, 1.0, 1.0], 0.0).unwrap_err();
        assert!(err.is(crate::ErrorKind::OutOfRange));
        assert!(point.invalidate(5).is_err());
        assert_eq!(point.values(), &[[0.0; 3]; 2]);
        assert_eq!(point.residuals(), &[0.0; 2]);
    }
}
