use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Point;

/// 3D values with a validity residual per frame (negative = invalid).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub values: Vec<[f64; 3]>,
    pub residuals: Vec<f64>,
}

impl Trajectory {
    pub fn new(frames: usize) -> Self {
        Self {
            values: vec![[0.0; 3]; frames],
            residuals: vec![0.0; frames],
        }
    }

    pub fn from_parts(values: Vec<[f64; 3]>, residuals: Vec<f64>) -> Result<Self> {
        if values.len() != residuals.len() {
            return Err(Error::invalid_argument(format!(
                "trajectory has {} values but {} residuals",
                values.len(),
                residuals.len()
            )));
        }
        Ok(Self { values, residuals })
    }

    pub fn frame_number(&self) -> usize {
        self.values.len()
    }

    pub fn is_valid(&self, frame: usize) -> bool {
        self.residuals.get(frame).is_some_and(|r| *r >= 0.0)
    }

    /// Frame-wise combination. A frame is valid only when it is valid in both
    /// operands; its residual is then the smaller of the two.
    pub fn combine(
        &self,
        other: &Trajectory,
        op: impl Fn([f64; 3], [f64; 3]) -> [f64; 3],
    ) -> Result<Trajectory> {
        if self.frame_number() != other.frame_number() {
            return Err(Error::invalid_argument(format!(
                "cannot combine trajectories of {} and {} frames",
                self.frame_number(),
                other.frame_number()
            )));
        }
        let mut out = Trajectory::new(self.frame_number());
        for frame in 0..self.frame_number() {
            let (ra, rb) = (self.residuals[frame], other.residuals[frame]);
            if ra < 0.0 || rb < 0.0 {
                out.residuals[frame] = -1.0;
                continue;
            }
            out.values[frame] = op(self.values[frame], other.values[frame]);
            out.residuals[frame] = ra.min(rb);
        }
        Ok(out)
    }

    pub fn average(&self, other: &Trajectory) -> Result<Trajectory> {
        self.combine(other, |a, b| {
            [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0, (a[2] + b[2]) / 2.0]
        })
    }

    pub fn sum(&self, other: &Trajectory) -> Result<Trajectory> {
        self.combine(other, |a, b| [a[0] + b[0], a[1] + b[1], a[2] + b[2]])
    }

    pub fn difference(&self, other: &Trajectory) -> Result<Trajectory> {
        self.combine(other, |a, b| [a[0] - b[0], a[1] - b[1], a[2] - b[2]])
    }

    /// Copies the trajectory into a point of the same frame count.
    pub fn to_point(&self, label: impl Into<String>) -> Result<Point> {
        let mut point = Point::new(label, self.frame_number());
        for (frame, (value, residual)) in self.values.iter().zip(&self.residuals).enumerate() {
            point.set_frame(frame, *value, *residual)?;
        }
        Ok(point)
    }
}

impl From<&Point> for Trajectory {
    fn from(point: &Point) -> Self {
        Self {
            values: point.values().to_vec(),
            residuals: point.residuals().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn average_propagates_invalid_frames() {
        let a = Trajectory::from_parts(
            vec![[0.0, 0.0, 0.0], [2.0, 4.0, 6.0], [1.0, 1.0, 1.0]],
            vec![0.5, 0.2, -1.0],
        )
        .unwrap();
        let b = Trajectory::from_parts(
            vec![[9.0, 9.0, 9.0], [4.0, 8.0, 10.0], [3.0, 3.0, 3.0]],
            vec![-1.0, 0.7, 0.1],
        )
        .unwrap();

        let mean = a.average(&b).unwrap();
        assert!(mean.residuals[0] < 0.0);
        assert!(mean.residuals[2] < 0.0);
        assert_eq!(mean.values[0], [0.0; 3]);
        assert_relative_eq!(mean.residuals[1], 0.2);
        assert_eq!(mean.values[1], [3.0, 6.0, 8.0]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = Trajectory::new(3).average(&Trajectory::new(4)).unwrap_err();
        assert!(err.is(crate::ErrorKind::InvalidArgument));
    }

    fn trajectory(frames: usize) -> impl Strategy<Value = Trajectory> {
        (
            prop::collection::vec(prop::array::uniform3(-1e3..1e3f64), frames),
            prop::collection::vec(prop_oneof![Just(-1.0), 0.0..5.0f64], frames),
        )
            .prop_map(|(values, residuals)| Trajectory { values, residuals })
    }

    proptest! {
        #[test]
        fn average_is_valid_exactly_where_both_are(
            (a, b) in (1usize..40).prop_flat_map(|n| (trajectory(n), trajectory(n)))
        ) {
            let mean = a.average(&b).unwrap();
            for frame in 0..a.frame_number() {
                let both = a.is_valid(frame) && b.is_valid(frame);
                prop_assert_eq!(mean.is_valid(frame), both);
                if both {
                    for axis in 0..3 {
                        let expected = (a.values[frame][axis] + b.values[frame][axis]) / 2.0;
                        prop_assert!((mean.values[frame][axis] - expected).abs() < 1e-9);
                    }
                    prop_assert!(mean.residuals[frame] <= a.residuals[frame]);
                    prop_assert!(mean.residuals[frame] <= b.residuals[frame]);
                }
            }
        }
    }
}
