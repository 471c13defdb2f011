//! Basic numerical concepts used throughout the program

#![allow(missing_docs)]

// Floating-point precision is configured here
#[cfg(feature = "f32")]
pub type Float = f32;
#[cfg(feature = "f32")]
pub use std::f32 as floats;
#[cfg(not(feature = "f32"))]
pub type Float = f64;
#[cfg(not(feature = "f32"))]
pub use std::f64 as floats;

/// Physical constants of the analysis (GeV/c²)
pub mod masses {
    use super::Float;

    /// Electron mass
    pub const ELECTRON: Float = 0.000510998928;

    /// Λ baryon mass
    pub const LAMBDA: Float = 1.115683;
}

/// Truth that all components of a value tuple are usable for filling
pub fn all_finite(values: &[Float]) -> bool {
    values.iter().all(|x| x.is_finite())
}
