//! Core data structures and traits for meshpress
//!
//! This crate provides the fundamental types shared by the meshpress
//! pipeline: triangle meshes with optional normals and texture coordinates,
//! and the common error type.

pub mod mesh;
pub mod error;

pub use mesh::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point2, Point3, Vector3, Matrix3, Matrix4};

/// A 3D point with single precision coordinates
pub type Point3f = Point3<f32>;

/// A 2D point with single precision coordinates
pub type Point2f = Point2<f32>;

/// A 3D vector with single precision components
pub type Vector3f = Vector3<f32>;

// Type alias for easier imports
pub type Mesh = TriangleMesh;
