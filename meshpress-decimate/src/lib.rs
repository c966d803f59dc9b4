//! Polygon reduction algorithms
//!
//! This crate reduces mesh complexity while preserving important
//! geometric features:
//! - Quadric error edge collapse on a half-edge structure
//! - Boundary and texture seam preservation via constraint weighting
//! - A convergence-guarded progressive driver for aggressive reductions

pub mod collapse;
pub mod params;
pub mod progressive;

pub use collapse::*;
pub use params::*;
pub use progressive::*;
