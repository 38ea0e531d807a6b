use std::ops::Mul;

use serde::{Deserialize, Serialize};

pub type Vector3 = [f64; 3];

pub fn add(a: Vector3, b: Vector3) -> Vector3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: Vector3, b: Vector3) -> Vector3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(a: Vector3, s: f64) -> Vector3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub fn cross(a: Vector3, b: Vector3) -> Vector3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn dot(a: Vector3, b: Vector3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn norm(a: Vector3) -> f64 {
    dot(a, a).sqrt()
}

/// Unit vector along `a`; the zero vector stays zero.
pub fn normalize(a: Vector3) -> Vector3 {
    let n = norm(a);
    if n == 0.0 {
        a
    } else {
        scale(a, 1.0 / n)
    }
}

/// Rigid transform stored as the 12 values of a motion row: the rotation
/// axes `u`, `v`, `w` (columns of the rotation matrix) then the origin `o`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub u: Vector3,
    pub v: Vector3,
    pub w: Vector3,
    pub o: Vector3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        u: [1.0, 0.0, 0.0],
        v: [0.0, 1.0, 0.0],
        w: [0.0, 0.0, 1.0],
        o: [0.0, 0.0, 0.0],
    };

    pub fn new(u: Vector3, v: Vector3, w: Vector3, o: Vector3) -> Self {
        Self { u, v, w, o }
    }

    pub fn translation(o: Vector3) -> Self {
        Self {
            o,
            ..Self::IDENTITY
        }
    }

    pub fn from_row(row: &[f64; 12]) -> Self {
        Self {
            u: [row[0], row[1], row[2]],
            v: [row[3], row[4], row[5]],
            w: [row[6], row[7], row[8]],
            o: [row[9], row[10], row[11]],
        }
    }

    pub fn to_row(&self) -> [f64; 12] {
        let mut row = [0.0; 12];
        row[0..3].copy_from_slice(&self.u);
        row[3..6].copy_from_slice(&self.v);
        row[6..9].copy_from_slice(&self.w);
        row[9..12].copy_from_slice(&self.o);
        row
    }

    pub fn rotate(&self, p: Vector3) -> Vector3 {
        add(
            add(scale(self.u, p[0]), scale(self.v, p[1])),
            scale(self.w, p[2]),
        )
    }

    /// `R * p + o`.
    pub fn apply(&self, p: Vector3) -> Vector3 {
        add(self.rotate(p), self.o)
    }

    /// `self * other`: applies `other` first, then `self`.
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform {
            u: self.rotate(other.u),
            v: self.rotate(other.v),
            w: self.rotate(other.w),
            o: self.apply(other.o),
        }
    }

    /// Inverse of a rigid transform (orthonormal rotation assumed).
    pub fn inverse(&self) -> Transform {
        let u = [self.u[0], self.v[0], self.w[0]];
        let v = [self.u[1], self.v[1], self.w[1]];
        let w = [self.u[2], self.v[2], self.w[2]];
        let rt = Transform::new(u, v, w, [0.0; 3]);
        Transform {
            o: scale(rt.rotate(self.o), -1.0),
            ..rt
        }
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.compose(&rhs)
    }
}

/// Per-frame pose of a named segment, with a residual per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub label: String,
    pub transforms: Vec<Transform>,
    pub residuals: Vec<f64>,
}

impl Motion {
    pub fn new(label: impl Into<String>, frames: usize) -> Self {
        Self {
            label: label.into(),
            transforms: vec![Transform::IDENTITY; frames],
            residuals: vec![0.0; frames],
        }
    }

    pub fn from_transforms(label: impl Into<String>, transforms: Vec<Transform>) -> Self {
        let residuals = vec![0.0; transforms.len()];
        Self {
            label: label.into(),
            transforms,
            residuals,
        }
    }

    pub fn frame_number(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_valid(&self, frame: usize) -> bool {
        self.residuals.get(frame).is_some_and(|r| *r >= 0.0)
    }
}
