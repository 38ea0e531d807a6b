use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{Motion, Trajectory, Transform, Vector3};

/// A point fixed in the local frame of `anchor` (a segment or a relative
/// reference frame).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativePosition {
    pub label: String,
    pub anchor: String,
    pub position: Vector3,
}

/// A reference frame fixed relative to `anchor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeReferenceFrame {
    pub label: String,
    pub anchor: String,
    pub transform: Transform,
}

impl RelativePosition {
    pub fn new(label: impl Into<String>, anchor: impl Into<String>, position: Vector3) -> Self {
        Self {
            label: label.into(),
            anchor: anchor.into(),
            position,
        }
    }
}

impl RelativeReferenceFrame {
    pub fn new(label: impl Into<String>, anchor: impl Into<String>, transform: Transform) -> Self {
        Self {
            label: label.into(),
            anchor: anchor.into(),
            transform,
        }
    }
}

/// Walks from `anchor` up to `segment` through `frames` and returns the
/// composed transform mapping `anchor` coordinates into `segment` ones.
fn resolve_chain<'a>(
    mut anchor: &'a str,
    segment: &str,
    frames: &'a [RelativeReferenceFrame],
) -> Result<Transform> {
    let mut chain = Transform::IDENTITY;
    let mut visited: Vec<&str> = Vec::new();
    while anchor != segment {
        if visited.contains(&anchor) {
            return Err(Error::invalid_argument(format!(
                "relative frame '{anchor}' is anchored on itself"
            )));
        }
        visited.push(anchor);
        let frame = frames.iter().find(|f| f.label == anchor).ok_or_else(|| {
            Error::invalid_argument(format!(
                "'{anchor}' is neither segment '{segment}' nor a known relative frame"
            ))
        })?;
        chain = frame.transform.compose(&chain);
        anchor = &frame.anchor;
    }
    Ok(chain)
}

/// Trajectory of `position` given the motion of the segment it is
/// (possibly indirectly) attached to. Invalid motion frames yield invalid
/// trajectory frames.
pub fn transform_relative_position(
    position: &RelativePosition,
    frames: &[RelativeReferenceFrame],
    motion: &Motion,
) -> Result<Trajectory> {
    let local = resolve_chain(&position.anchor, &motion.label, frames)?.apply(position.position);
    let mut trajectory = Trajectory::new(motion.frame_number());
    for (frame, transform) in motion.transforms.iter().enumerate() {
        if !motion.is_valid(frame) {
            trajectory.residuals[frame] = -1.0;
            continue;
        }
        trajectory.values[frame] = transform.apply(local);
        trajectory.residuals[frame] = motion.residuals[frame];
    }
    Ok(trajectory)
}

/// Motion of `frame` given the motion of the segment it is attached to.
pub fn transform_relative_frame(
    frame: &RelativeReferenceFrame,
    frames: &[RelativeReferenceFrame],
    motion: &Motion,
) -> Result<Motion> {
    let local = resolve_chain(&frame.anchor, &motion.label, frames)?.compose(&frame.transform);
    let mut out = Motion::new(frame.label.clone(), motion.frame_number());
    for (index, transform) in motion.transforms.iter().enumerate() {
        if !motion.is_valid(index) {
            out.residuals[index] = -1.0;
            continue;
        }
        out.transforms[index] = transform.compose(&local);
        out.residuals[index] = motion.residuals[index];
    }
    Ok(out)
}
