//! End-to-end mesh processing pipeline.
//!
//! Ties the meshpress crates together: inspect the input, pick a strategy,
//! reduce or remesh, carry the materials over and deliver the result. The
//! per-request flow is documented on [`process`]; [`analyze`] exposes the
//! inspection half on its own.

pub mod analyze;
pub mod error;
pub mod process;
pub mod select;
pub mod workspace;

pub use analyze::{analyze, analyze_mesh, AnalysisReport};
pub use error::{PipelineError, PipelineResult};
pub use process::{process, ProcessOptions, ProcessOutcome, ProcessingSummary};
pub use select::{select, RequestedOperation, Strategy};
pub use workspace::WorkspaceContext;
