//! End-to-end mesh processing.
//!
//! One request flows inspect -> select -> (decimate | repair + retopology
//! tool) -> relink -> deliver. Intermediate files live in a per-request
//! workspace that disappears when the request ends; only the delivered
//! files and the optional report sidecar land in the output directory.

use std::fs;
use std::path::{Path, PathBuf};

use meshpress_analysis::{inspect, repair, MeshQualityReport, RepairOptions, RepairSummary};
use meshpress_core::{Error, TriangleMesh};
use meshpress_decimate::{
    DecimationOutcome, DecimationStatus, DecimationTarget, ProgressiveDecimator,
};
use meshpress_io::{read_mesh, relink_materials, write_mesh, RelinkOutcome};
use meshpress_tools::{edge_length_hint, ExtraOptions, MeshConverter, RetopoMode, RetopoTool};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::select::{select, RequestedOperation, Strategy};
use crate::workspace::WorkspaceContext;

/// Options for one processing request.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Face count the output should land at.
    pub target_faces: usize,
    /// Requested processing path.
    pub operation: RequestedOperation,
    /// Preset for the external retopology tool.
    pub mode: RetopoMode,
    /// Keep open boundaries in place during decimation.
    pub preserve_boundaries: bool,
    /// Protect texture seams during decimation.
    pub preserve_uv: bool,
    /// Extra flags passed through to the retopology tool.
    pub extra_tool_options: ExtraOptions,
    /// Convert the delivered mesh to binary glTF.
    pub deliver_glb: bool,
    /// Write a JSON processing report beside the output.
    pub write_report: bool,
    /// Where delivered files go; defaults to the input's directory.
    pub output_dir: Option<PathBuf>,
    /// Retopology tool wrapper, overridable for testing.
    pub retopo: RetopoTool,
    /// Delivery converter wrapper, overridable for testing.
    pub converter: MeshConverter,
}

impl ProcessOptions {
    /// Creates options with the given face target and defaults everywhere
    /// else: auto operation, balanced mode, boundaries preserved, OBJ
    /// delivery.
    pub fn new(target_faces: usize) -> Self {
        Self {
            target_faces,
            operation: RequestedOperation::Auto,
            mode: RetopoMode::Balanced,
            preserve_boundaries: true,
            preserve_uv: false,
            extra_tool_options: Vec::new(),
            deliver_glb: false,
            write_report: false,
            output_dir: None,
            retopo: RetopoTool::new(),
            converter: MeshConverter::new(),
        }
    }

    /// Sets the requested operation.
    pub fn operation(mut self, operation: RequestedOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Sets the retopology preset.
    pub fn mode(mut self, mode: RetopoMode) -> Self {
        self.mode = mode;
        self
    }

    /// Toggles boundary preservation during decimation.
    pub fn preserve_boundaries(mut self, preserve: bool) -> Self {
        self.preserve_boundaries = preserve;
        self
    }

    /// Toggles texture seam protection during decimation.
    pub fn preserve_uv(mut self, preserve: bool) -> Self {
        self.preserve_uv = preserve;
        self
    }

    /// Sets extra retopology tool flags.
    pub fn extra_tool_options(mut self, extra: ExtraOptions) -> Self {
        self.extra_tool_options = extra;
        self
    }

    /// Toggles binary glTF delivery.
    pub fn deliver_glb(mut self, deliver: bool) -> Self {
        self.deliver_glb = deliver;
        self
    }

    /// Toggles the JSON report sidecar.
    pub fn write_report(mut self, write: bool) -> Self {
        self.write_report = write;
        self
    }

    /// Sets the delivery directory.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Overrides the retopology tool wrapper.
    pub fn retopo(mut self, tool: RetopoTool) -> Self {
        self.retopo = tool;
        self
    }

    /// Overrides the delivery converter wrapper.
    pub fn converter(mut self, converter: MeshConverter) -> Self {
        self.converter = converter;
        self
    }
}

/// Serializable record of what a request did, written as the report
/// sidecar when asked for.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub strategy: Strategy,
    pub target_faces: usize,
    pub faces_before: usize,
    pub faces_after: usize,
    pub delivered_format: String,
    pub used_fallback_conversion: bool,
    pub decimation_status: Option<DecimationStatus>,
    pub decimation_step_count: usize,
    pub repair: Option<RepairSummary>,
    pub relink: RelinkOutcome,
    pub original_quality: MeshQualityReport,
    pub final_quality: MeshQualityReport,
}

/// Result of one processing request.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// The delivered mesh file.
    pub output_path: PathBuf,
    pub strategy: Strategy,
    /// Quality of the mesh as loaded.
    pub original: MeshQualityReport,
    /// Quality of the mesh as delivered.
    pub final_report: MeshQualityReport,
    pub summary: ProcessingSummary,
}

/// Runs one processing request end to end.
///
/// The input file is never modified. Fatal errors are load failures,
/// unusable targets and delivery failures with no working fallback;
/// everything else degrades with a warning.
pub fn process(input: &Path, options: &ProcessOptions) -> PipelineResult<ProcessOutcome> {
    if options.target_faces == 0 {
        return Err(Error::InvalidData("target face count must be positive".to_string()).into());
    }

    let mesh = read_mesh(input).map_err(|source| PipelineError::load(input, source))?;
    let original = inspect(&mesh);
    let strategy = select(&original, options.target_faces, options.operation);
    info!(
        input = %input.display(),
        faces = original.face_count,
        target = options.target_faces,
        strategy = strategy.as_str(),
        "processing request"
    );

    let workspace = WorkspaceContext::new()?;
    let staged = run_strategy(&workspace, input, &mesh, &original, strategy, options)?;

    let relink = relink_materials(&staged.path, input)?;

    let final_mesh =
        read_mesh(&staged.path).map_err(|source| PipelineError::load(&staged.path, source))?;
    let final_quality = inspect(&final_mesh);

    let output_dir = match &options.output_dir {
        Some(dir) => dir.clone(),
        None => input.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
    };
    fs::create_dir_all(&output_dir)?;
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh");

    let (output_path, delivered_format, used_fallback_conversion) = deliver(
        &staged.path,
        &relink,
        &output_dir,
        stem,
        strategy,
        options,
    )?;

    let summary = ProcessingSummary {
        input: input.to_path_buf(),
        output: output_path.clone(),
        strategy,
        target_faces: options.target_faces,
        faces_before: original.face_count,
        faces_after: final_quality.face_count,
        delivered_format,
        used_fallback_conversion,
        decimation_status: staged.decimation.as_ref().map(|d| d.status),
        decimation_step_count: staged
            .decimation
            .as_ref()
            .map(|d| d.steps.len())
            .unwrap_or(0),
        repair: staged.repair,
        relink,
        original_quality: original.clone(),
        final_quality: final_quality.clone(),
    };

    if options.write_report {
        let report_path = output_path.with_extension("report.json");
        fs::write(&report_path, serde_json::to_string_pretty(&summary)?)?;
        info!(report = %report_path.display(), "processing report written");
    }

    info!(
        output = %output_path.display(),
        faces_after = summary.faces_after,
        "processing finished"
    );
    Ok(ProcessOutcome {
        output_path,
        strategy,
        original,
        final_report: final_quality,
        summary,
    })
}

/// A staged mesh in the workspace plus what was done to get it there.
struct StagedMesh {
    path: PathBuf,
    decimation: Option<DecimationOutcome>,
    repair: Option<RepairSummary>,
}

fn run_strategy(
    workspace: &WorkspaceContext,
    input: &Path,
    mesh: &TriangleMesh,
    original: &MeshQualityReport,
    strategy: Strategy,
    options: &ProcessOptions,
) -> PipelineResult<StagedMesh> {
    match strategy {
        Strategy::NoOp => {
            let path = workspace.scratch_file("passthrough.obj");
            write_mesh(mesh, &path)?;
            Ok(StagedMesh {
                path,
                decimation: None,
                repair: None,
            })
        }
        Strategy::Simplify => {
            let outcome = decimate_mesh(mesh, options)?;
            let path = workspace.scratch_file("simplified.obj");
            write_mesh(&outcome.mesh, &path)?;
            Ok(StagedMesh {
                path,
                decimation: Some(outcome),
                repair: None,
            })
        }
        Strategy::Remesh => {
            let mut repaired = mesh.clone();
            let repair_summary = repair(&mut repaired, &RepairOptions::default());
            let repaired_path = workspace.scratch_file("repaired.obj");
            write_mesh(&repaired, &repaired_path)?;

            debug!(
                edge_length = edge_length_hint(original.bbox_diagonal, options.target_faces),
                "retopology density hint"
            );
            let retopo_path = workspace.scratch_file("retopologized.obj");
            match options.retopo.remesh(
                &repaired_path,
                &retopo_path,
                options.target_faces,
                options.mode,
                &options.extra_tool_options,
            ) {
                Ok(()) => Ok(StagedMesh {
                    path: retopo_path,
                    decimation: None,
                    repair: Some(repair_summary),
                }),
                Err(err) => {
                    warn!(%err, input = %input.display(), "retopology tool unavailable, decimating in process");
                    let outcome = decimate_mesh(&repaired, options)?;
                    let path = workspace.scratch_file("simplified.obj");
                    write_mesh(&outcome.mesh, &path)?;
                    Ok(StagedMesh {
                        path,
                        decimation: Some(outcome),
                        repair: Some(repair_summary),
                    })
                }
            }
        }
    }
}

fn decimate_mesh(
    mesh: &TriangleMesh,
    options: &ProcessOptions,
) -> PipelineResult<DecimationOutcome> {
    let target = DecimationTarget::new(options.target_faces)?
        .with_preserve_boundaries(options.preserve_boundaries)
        .with_preserve_uv(options.preserve_uv);
    Ok(ProgressiveDecimator::new().decimate(mesh, &target))
}

/// Places the final files in the output directory.
///
/// GLB delivery goes through the external converter; when that fails the
/// staged OBJ is delivered instead, together with its material library and
/// textures. Plain OBJ delivery always carries the companions.
fn deliver(
    staged_obj: &Path,
    relink: &RelinkOutcome,
    output_dir: &Path,
    stem: &str,
    strategy: Strategy,
    options: &ProcessOptions,
) -> PipelineResult<(PathBuf, String, bool)> {
    if options.deliver_glb {
        let glb_path = output_dir.join(format!("{stem}_{}.glb", strategy.as_str()));
        match options.converter.obj_to_glb(staged_obj, &glb_path) {
            Ok(()) => return Ok((glb_path, "glb".to_string(), false)),
            Err(err) => {
                warn!(%err, "delivery conversion failed, falling back to OBJ");
            }
        }
        let obj_path = output_dir.join(format!("{stem}_{}.obj", strategy.as_str()));
        copy_with_companions(staged_obj, relink, &obj_path)
            .map_err(|err| PipelineError::conversion(&glb_path, err.to_string()))?;
        return Ok((obj_path, "obj".to_string(), true));
    }

    let obj_path = output_dir.join(format!("{stem}_{}.obj", strategy.as_str()));
    copy_with_companions(staged_obj, relink, &obj_path)?;
    Ok((obj_path, "obj".to_string(), false))
}

/// Copies the staged OBJ and every file the relink pass placed beside it.
fn copy_with_companions(
    staged_obj: &Path,
    relink: &RelinkOutcome,
    output: &Path,
) -> PipelineResult<()> {
    fs::copy(staged_obj, output)?;

    let scratch = staged_obj.parent().unwrap_or_else(|| Path::new("."));
    let out_dir = output.parent().unwrap_or_else(|| Path::new("."));
    if scratch == out_dir {
        return Ok(());
    }

    let mut companions: Vec<&String> = Vec::new();
    if let Some(material) = &relink.material_file {
        companions.push(material);
    }
    companions.extend(&relink.textures_copied);
    companions.extend(&relink.textures_already_present);
    for name in companions {
        let src = scratch.join(name);
        if src.is_file() {
            fs::copy(&src, out_dir.join(name))?;
        }
    }
    Ok(())
}
