mod motion;
mod relative;
mod trajectory;

pub use motion::{add, cross, dot, norm, normalize, scale, sub, Motion, Transform, Vector3};
pub use relative::{
    transform_relative_frame, transform_relative_position, RelativePosition,
    RelativeReferenceFrame,
};
pub use trajectory::Trajectory;
