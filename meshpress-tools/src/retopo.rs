//! Retopology tool invocation.
//!
//! Drives an Instant Meshes style CLI: `-i <in> -o <out> --faces <n>` plus
//! per-mode flags. Every mode passes `-d` for deterministic output. The
//! tool blocks until its work is done, so completion is observed by process
//! exit.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::coordinator::{run_job, JobStatus};
use crate::discover::find_tool;
use crate::error::{ToolError, ToolResult};
use crate::job::{CompletionSignal, ExternalJob};

/// Default wall-clock budget for a retopology run (5 minutes).
pub const DEFAULT_RETOPO_TIMEOUT_SECS: u64 = 300;

const TOOL_NAME: &str = "instant-meshes";
const ENV_VARS: &[&str] = &["INSTANT_MESHES_PATH"];

/// Retopology presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetopoMode {
    /// Boundary-aligned remesh at the requested face count.
    Balanced,
    /// Boundary-aligned, pure-quad output.
    Fine,
    /// 20% below the requested face count, minimal constraints.
    Coarse,
    /// Boundary-aligned with extra smoothing iterations, for meshes with
    /// open holes.
    FixHoles,
}

impl RetopoMode {
    /// Returns the string identifier for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            RetopoMode::Balanced => "balanced",
            RetopoMode::Fine => "fine",
            RetopoMode::Coarse => "coarse",
            RetopoMode::FixHoles => "fix_holes",
        }
    }
}

impl FromStr for RetopoMode {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "balanced" => Ok(RetopoMode::Balanced),
            "fine" => Ok(RetopoMode::Fine),
            "coarse" => Ok(RetopoMode::Coarse),
            "fix_holes" => Ok(RetopoMode::FixHoles),
            _ => Err(ToolError::InvalidMode {
                mode: s.to_string(),
            }),
        }
    }
}

/// Extra tool options appended after the mode flags. `(flag, None)` appends
/// a bare switch, `(flag, Some(value))` appends the flag and its value.
pub type ExtraOptions = Vec<(String, Option<String>)>;

/// Invokes the external retopology tool.
#[derive(Debug, Clone, Default)]
pub struct RetopoTool {
    executable: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl RetopoTool {
    /// Creates a tool wrapper using executable discovery and the default
    /// run budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides executable discovery.
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Overrides the run budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Remeshes `input` into `output`, aiming at `target_faces`.
    pub fn remesh(
        &self,
        input: &Path,
        output: &Path,
        target_faces: usize,
        mode: RetopoMode,
        extra: &[(String, Option<String>)],
    ) -> ToolResult<()> {
        let exe = find_tool(
            TOOL_NAME,
            self.executable.as_deref(),
            ENV_VARS,
            binary_names(),
            common_paths(),
        )?;

        info!(
            mode = mode.as_str(),
            target_faces,
            input = %input.display(),
            "starting retopology run"
        );

        let max_wait = self
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_RETOPO_TIMEOUT_SECS));
        let job = ExternalJob::new(TOOL_NAME, exe, output)
            .args(build_args(input, output, target_faces, mode, extra))
            .completion(CompletionSignal::ProcessExit)
            .max_wait(max_wait);

        match run_job(&job)? {
            JobStatus::Completed => Ok(()),
            JobStatus::TimedOut => Err(ToolError::timeout(TOOL_NAME, max_wait.as_secs())),
            JobStatus::Failed { reason } => Err(ToolError::run_failed(TOOL_NAME, reason)),
        }
    }
}

/// Suggested isotropic edge length for a remesh of `target_faces` faces on
/// a model with the given bounding-box diagonal, clamped away from
/// degenerate values. Diagnostic only: the face-count flag already fixes
/// the output density.
pub fn edge_length_hint(bbox_diagonal: f64, target_faces: usize) -> f64 {
    let target = target_faces.max(1) as f64;
    let raw = bbox_diagonal / (target.sqrt() * 10.0);
    raw.clamp(1e-3, (0.1 * bbox_diagonal).max(1e-3))
}

fn build_args(
    input: &Path,
    output: &Path,
    target_faces: usize,
    mode: RetopoMode,
    extra: &[(String, Option<String>)],
) -> Vec<OsString> {
    let target = match mode {
        RetopoMode::Coarse => (target_faces as f64 * 0.8) as usize,
        _ => target_faces,
    };

    let mut args: Vec<OsString> = vec![
        OsString::from("-i"),
        OsString::from(input),
        OsString::from("-o"),
        OsString::from(output),
        OsString::from("--faces"),
        OsString::from(target.to_string()),
        OsString::from("-d"),
    ];
    match mode {
        RetopoMode::Balanced => args.push(OsString::from("-b")),
        RetopoMode::Fine => {
            args.push(OsString::from("-b"));
            args.push(OsString::from("-c"));
        }
        RetopoMode::Coarse => {}
        RetopoMode::FixHoles => {
            args.push(OsString::from("-b"));
            args.push(OsString::from("-s"));
            args.push(OsString::from("2"));
        }
    }
    for (flag, value) in extra {
        args.push(OsString::from(flag.as_str()));
        if let Some(value) = value {
            args.push(OsString::from(value.as_str()));
        }
    }
    args
}

fn binary_names() -> &'static [&'static str] {
    if cfg!(windows) {
        &["Instant Meshes.exe", "instant-meshes.exe", "InstantMeshes.exe"]
    } else {
        &["instant-meshes", "InstantMeshes", "Instant Meshes"]
    }
}

fn common_paths() -> &'static [&'static str] {
    if cfg!(windows) {
        &[
            "C:\\Program Files\\Instant Meshes\\Instant Meshes.exe",
            "C:\\Instant Meshes\\Instant Meshes.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &["/Applications/Instant Meshes.app/Contents/MacOS/Instant Meshes"]
    } else {
        &[
            "/usr/local/bin/instant-meshes",
            "/opt/instant-meshes/instant-meshes",
        ]
    }
}
