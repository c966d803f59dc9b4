//! # Meshpress Analysis
//!
//! Mesh quality inspection and repair.
//!
//! This crate inspects triangle meshes for structural problems (open
//! boundaries, degenerate faces, disconnected shells), produces quality
//! reports that drive the processing pipeline, and repairs the defects
//! that can be fixed in-process.

pub mod quality;
pub mod components;
pub mod repair;
pub mod recommend;

// Re-export commonly used items
pub use quality::*;
pub use components::*;
pub use repair::*;
pub use recommend::*;
