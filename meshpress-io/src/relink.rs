//! Material relinking for rewritten meshes
//!
//! Decimation and external retopology rewrite the OBJ geometry and drop
//! its material references. This module carries the material library and
//! its textures over from the reference file and points the new mesh at
//! them again.

use crate::mtl::{normalize_texture_lines, texture_basename, texture_references};
use meshpress_core::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a relink run found and moved
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelinkOutcome {
    /// Filename of the material library the mesh now references
    pub material_file: Option<String>,
    pub textures_copied: Vec<String>,
    pub textures_already_present: Vec<String>,
    pub textures_missing: Vec<String>,
}

fn first_token(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}

/// Name of the first material library a mesh file references
fn referenced_material(content: &str) -> Option<String> {
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("mtllib") {
            if rest.starts_with(char::is_whitespace) {
                let name = rest.trim();
                if !name.is_empty() {
                    return Some(texture_basename(name));
                }
            }
        }
    }
    None
}

/// Resolve a filename against an ordered list of directories
fn resolve_in<'a>(name: &str, dirs: &'a [&Path]) -> Option<PathBuf> {
    dirs.iter().map(|d| d.join(name)).find(|p| p.is_file())
}

/// Rewrite the mesh file so it references exactly one material library
///
/// All existing `mtllib` lines are removed and a single one is inserted
/// after the leading comment block. Applying this twice yields identical
/// bytes.
fn rewrite_material_reference(obj_path: &Path, material_name: &str) -> Result<()> {
    let content = fs::read_to_string(obj_path)?;
    let kept: Vec<&str> = content
        .lines()
        .filter(|line| first_token(line) != Some("mtllib"))
        .collect();
    let insert_at = kept
        .iter()
        .position(|line| {
            let t = line.trim();
            !t.is_empty() && !t.starts_with('#')
        })
        .unwrap_or(kept.len());

    let mut out = String::with_capacity(content.len() + material_name.len() + 8);
    for (i, line) in kept.iter().enumerate() {
        if i == insert_at {
            out.push_str("mtllib ");
            out.push_str(material_name);
            out.push('\n');
        }
        out.push_str(line);
        out.push('\n');
    }
    if insert_at == kept.len() {
        out.push_str("mtllib ");
        out.push_str(material_name);
        out.push('\n');
    }
    fs::write(obj_path, out)?;
    Ok(())
}

/// Re-attach the reference mesh's materials to a rewritten mesh
///
/// Looks up the material library named by the reference mesh, copies it
/// (with texture paths flattened) beside the new mesh, copies every
/// referenced texture that is not already there, and rewrites the new
/// mesh to carry exactly one `mtllib` line. Files are resolved against
/// the new mesh's directory first, then the reference mesh's directory.
///
/// Missing materials and textures are logged and skipped; only I/O
/// failures on files that exist are errors.
///
/// # Arguments
/// * `new_obj` - The rewritten mesh to fix up
/// * `reference_obj` - The original mesh whose materials to carry over
///
/// # Returns
/// * `Result<RelinkOutcome>` - What was linked, copied and left missing
pub fn relink_materials(new_obj: &Path, reference_obj: &Path) -> Result<RelinkOutcome> {
    let mut outcome = RelinkOutcome::default();

    let scratch_dir = new_obj.parent().unwrap_or_else(|| Path::new("."));
    let source_dir = reference_obj.parent().unwrap_or_else(|| Path::new("."));
    let search_dirs = [scratch_dir, source_dir];

    let reference_content = fs::read_to_string(reference_obj)?;
    let material_name = match referenced_material(&reference_content) {
        Some(name) => name,
        None => {
            info!(reference = %reference_obj.display(), "no material library referenced, nothing to relink");
            return Ok(outcome);
        }
    };

    let resolved_mtl = match resolve_in(&material_name, &search_dirs) {
        Some(path) => path,
        None => {
            warn!(material = %material_name, "material library not found, leaving mesh unlinked");
            return Ok(outcome);
        }
    };

    // Copy the library beside the new mesh with texture paths flattened
    let dst_mtl = scratch_dir.join(&material_name);
    let mtl_content = fs::read_to_string(&resolved_mtl)?;
    fs::write(&dst_mtl, normalize_texture_lines(&mtl_content))?;
    debug!(from = %resolved_mtl.display(), to = %dst_mtl.display(), "material library copied");

    for texture in texture_references(&dst_mtl)? {
        let dst_tex = scratch_dir.join(&texture);
        if dst_tex.is_file() {
            outcome.textures_already_present.push(texture);
            continue;
        }
        match resolve_in(&texture, &[source_dir]) {
            Some(src_tex) => {
                fs::copy(&src_tex, &dst_tex)?;
                debug!(texture = %texture, "texture copied");
                outcome.textures_copied.push(texture);
            }
            None => {
                warn!(texture = %texture, "referenced texture not found");
                outcome.textures_missing.push(texture);
            }
        }
    }

    rewrite_material_reference(new_obj, &material_name)?;
    outcome.material_file = Some(material_name);

    info!(
        material = outcome.material_file.as_deref().unwrap_or(""),
        copied = outcome.textures_copied.len(),
        present = outcome.textures_already_present.len(),
        missing = outcome.textures_missing.len(),
        "materials relinked"
    );
    Ok(outcome)
}
