//! External tool orchestration for meshpress.
//!
//! Everything that crosses a process boundary lives here: locating tool
//! executables, describing a run as an [`ExternalJob`], driving it to
//! completion and mapping the outcome back into errors the pipeline can
//! act on. Two tools are wrapped: an Instant Meshes style retopology CLI,
//! which blocks until done, and a Blender based delivery-format converter,
//! which is observed through the flag-file protocol.

pub mod convert;
pub mod coordinator;
pub mod discover;
pub mod error;
pub mod job;
pub mod retopo;

pub use convert::{MeshConverter, DEFAULT_CONVERT_TIMEOUT_SECS};
pub use coordinator::{run_job, JobStatus, SIZE_STABILITY_WINDOW};
pub use discover::find_tool;
pub use error::{ToolError, ToolResult};
pub use job::{CompletionSignal, ExternalJob, DEFAULT_MAX_WAIT_SECS, DEFAULT_POLL_INTERVAL};
pub use retopo::{edge_length_hint, ExtraOptions, RetopoMode, RetopoTool, DEFAULT_RETOPO_TIMEOUT_SECS};
