//! This module implements some domain-specific 4-momentum handling logic.

use crate::numeric::{floats::consts::PI, Float};
use nalgebra::{SVector, Vector3};
use prefix_num_ops::real::*;

/// 4-momentum dimension
pub const MOMENTUM_DIM: usize = 4;

/// Relativistic 4-momentum
pub type Momentum = SVector<Float, MOMENTUM_DIM>;

/// Spatial 3-vector (momenta, positions)
pub type ThreeVector = Vector3<Float>;

/// Convenience const for accessing the X coordinate of a 4-vector
pub const X: usize = 0;

/// Convenience const for accessing the Y coordinate of a 4-vector
pub const Y: usize = 1;

/// Convenience const for accessing the Z coordinate of a 4-vector
pub const Z: usize = 2;

/// Convenience const for accessing the E coordinate of a 4-vector
pub const E: usize = 3;

/// Build a 4-momentum from a 3-momentum and a mass hypothesis
pub fn from_xyzm(p: &ThreeVector, mass: Float) -> Momentum {
    let energy = sqrt(p.norm_squared() + mass * mass);
    Momentum::new(p[X], p[Y], p[Z], energy)
}

/// Spatial part of a 4-momentum
pub fn xyz(m: &Momentum) -> ThreeVector {
    ThreeVector::new(m[X], m[Y], m[Z])
}

/// Invariant mass of a 4-momentum
///
/// Space-like inputs yield NaN, which callers are expected to handle.
///
pub fn invariant_mass(m: &Momentum) -> Float {
    sqrt(m[E] * m[E] - xyz(m).norm_squared())
}

/// Transverse component of a 3-vector
pub fn transverse(p: &ThreeVector) -> Float {
    sqrt(p[X] * p[X] + p[Y] * p[Y])
}

/// Pseudorapidity of a 3-vector
pub fn pseudorapidity(p: &ThreeVector) -> Float {
    (p[Z] / transverse(p)).asinh()
}

/// Azimuthal angle of a 3-vector, in (-π, π]
pub fn azimuth(p: &ThreeVector) -> Float {
    p[Y].atan2(p[X])
}

/// Azimuthal difference of two 3-vectors, wrapped to (-π, π]
pub fn delta_azimuth(a: &ThreeVector, b: &ThreeVector) -> Float {
    let mut dphi = azimuth(a) - azimuth(b);
    while dphi > PI {
        dphi -= 2. * PI;
    }
    while dphi <= -PI {
        dphi += 2. * PI;
    }
    dphi
}
