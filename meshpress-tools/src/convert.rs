//! Delivery-format conversion via an external converter.
//!
//! Generates a small Python driver script, launches the converter headless
//! and waits on the flag-file protocol: the script writes the flag on every
//! exit path, successful or not, so flag presence plus a stable non-empty
//! output is the completion signal. The caller decides what to do when the
//! conversion fails; this module never falls back on its own.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::coordinator::{run_job, JobStatus};
use crate::discover::find_tool;
use crate::error::{ToolError, ToolResult};
use crate::job::{CompletionSignal, ExternalJob};

/// Default wall-clock budget for a conversion run (3 minutes).
pub const DEFAULT_CONVERT_TIMEOUT_SECS: u64 = 180;

const TOOL_NAME: &str = "blender";
const ENV_VARS: &[&str] = &["BLENDER_EXECUTABLE", "BLENDER_PATH"];

/// Converts processed meshes to the delivery format with an external tool.
#[derive(Debug, Clone, Default)]
pub struct MeshConverter {
    executable: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl MeshConverter {
    /// Creates a converter using executable discovery and the default run
    /// budget.
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

    /// Converts a Wavefront OBJ into a binary glTF at `output`.
    pub fn obj_to_glb(&self, input: &Path, output: &Path) -> ToolResult<()> {
        let exe = find_tool(
            TOOL_NAME,
            self.executable.as_deref(),
            ENV_VARS,
            binary_names(),
            common_paths(),
        )?;

        let flag = completion_flag_path(output);
        let script = write_driver_script(input, output, &flag)?;

        info!(
            input = %input.display(),
            output = %output.display(),
            "starting delivery conversion"
        );

        let max_wait = self
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_CONVERT_TIMEOUT_SECS));
        let job = ExternalJob::new(TOOL_NAME, exe, output)
            .args([
                OsString::from("--background"),
                OsString::from("--factory-startup"),
                OsString::from("--python"),
                OsString::from(&script),
            ])
            .completion(CompletionSignal::FlagFile(flag))
            .max_wait(max_wait)
            .cleanup(&script);

        match run_job(&job)? {
            JobStatus::Completed => Ok(()),
            JobStatus::TimedOut => Err(ToolError::timeout(TOOL_NAME, max_wait.as_secs())),
            JobStatus::Failed { reason } => Err(ToolError::run_failed(TOOL_NAME, reason)),
        }
    }
}

/// The flag lands beside the output so concurrent conversions into
/// different directories cannot observe each other's signals.
fn completion_flag_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("convert"));
    name.push(".done");
    output.with_file_name(name)
}

fn write_driver_script(input: &Path, output: &Path, flag: &Path) -> ToolResult<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("meshpress_convert_")
        .suffix(".py")
        .tempfile()?;
    // The coordinator owns removal, so the file must survive this scope.
    let (mut handle, path) = file.keep().map_err(|err| ToolError::Io(err.error))?;
    handle.write_all(driver_script(input, output, flag).as_bytes())?;
    handle.flush()?;
    Ok(path)
}

fn driver_script(input: &Path, output: &Path, flag: &Path) -> String {
    format!(
        r#"import bpy

input_path = {input}
output_path = {output}
flag_path = {flag}

def write_flag():
    try:
        with open(flag_path, "w") as handle:
            handle.write("done")
    except Exception:
        pass

try:
    bpy.ops.wm.read_factory_settings(use_empty=True)
    bpy.ops.wm.obj_import(filepath=input_path)
    bpy.ops.export_scene.gltf(filepath=output_path, export_format='GLB')
finally:
    write_flag()
"#,
        input = py_string(input),
        output = py_string(output),
        flag = py_string(flag),
    )
}

fn py_string(path: &Path) -> String {
    let raw = path.display().to_string();
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

fn binary_names() -> &'static [&'static str] {
    if cfg!(windows) {
        &["blender.exe", "blender"]
    } else {
        &["blender"]
    }
}

fn common_paths() -> &'static [&'static str] {
    if cfg!(windows) {
        &[
            "C:\\Program Files\\Blender Foundation\\Blender 4.0\\blender.exe",
            "C:\\Program Files\\Blender Foundation\\Blender 3.6\\blender.exe",
            "C:\\Program Files\\Blender Foundation\\Blender\\blender.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Blender.app/Contents/MacOS/Blender",
            "/Applications/Blender.app/Contents/MacOS/blender",
        ]
    } else {
        &["/usr/bin/blender", "/usr/local/bin/blender", "/snap/bin/blender"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_lands_beside_output() {
        let flag = completion_flag_path(Path::new("/tmp/assets/model.glb"));
        assert_eq!(flag, PathBuf::from("/tmp/assets/model.glb.done"));
    }

    #[test]
    fn test_driver_script_embeds_paths() {
        let script = driver_script(
            Path::new("/work/in.obj"),
            Path::new("/work/out.glb"),
            Path::new("/work/out.glb.done"),
        );
        assert!(script.contains("\"/work/in.obj\""));
        assert!(script.contains("\"/work/out.glb\""));
        assert!(script.contains("\"/work/out.glb.done\""));
        assert!(script.contains("finally:"));
        assert!(script.contains("export_format='GLB'"));
    }

    #[test]
    fn test_py_string_escaping() {
        assert_eq!(py_string(Path::new("C:\\work\\in.obj")), "\"C:\\\\work\\\\in.obj\"");
        assert_eq!(py_string(Path::new("/tmp/o\"dd.obj")), "\"/tmp/o\\\"dd.obj\"");
    }

    #[test]
    fn test_driver_script_written_to_disk() {
        let script = write_driver_script(
            Path::new("/work/in.obj"),
            Path::new("/work/out.glb"),
            Path::new("/work/out.glb.done"),
        )
        .unwrap();
        assert!(script.exists());
        let content = std::fs::read_to_string(&script).unwrap();
        assert!(content.contains("import bpy"));
        std::fs::remove_file(&script).unwrap();
    }
}
