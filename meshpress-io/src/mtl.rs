//! MTL material library parsing
//!
//! Only the texture references matter to the pipeline; colors and shading
//! coefficients pass through untouched.

use meshpress_core::Result;
use std::fs;
use std::path::Path;

/// Directives whose last token names a texture file
///
/// Matched case-insensitively against the first token of a line. Covers
/// the classic illumination maps plus the PBR extensions seen in the wild.
pub const TEXTURE_DIRECTIVES: &[&str] = &[
    "map_kd",
    "map_ka",
    "map_ks",
    "map_ns",
    "map_bump",
    "bump",
    "map_d",
    "map_normal",
    "map_normalgl",
    "map_orm",
    "map_roughness",
    "map_metallic",
    "map_ao",
    "map_emissive",
    "map_opacity",
    "map_displacement",
    "map_height",
    "disp",
];

/// Strip any directory prefix from a texture token
///
/// MTL files exported on other systems often carry absolute Windows paths;
/// both separator styles are treated as directories.
pub fn texture_basename(token: &str) -> String {
    token
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(token)
        .to_string()
}

/// If the line is a texture-map directive, return the referenced filename
///
/// Map directives may carry options (`map_Kd -s 1 1 1 tex.png`); the
/// filename is the last whitespace token.
pub fn texture_directive(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    let keyword = tokens.next()?.to_lowercase();
    if !TEXTURE_DIRECTIVES.contains(&keyword.as_str()) {
        return None;
    }
    let filename = tokens.last()?;
    Some(texture_basename(filename))
}

/// Collect the texture filenames a material library references
///
/// Filenames are reduced to basenames and deduplicated in order of first
/// appearance.
pub fn texture_references<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())?;
    let mut seen = std::collections::HashSet::new();
    let mut textures = Vec::new();
    for line in content.lines() {
        if let Some(name) = texture_directive(line) {
            if seen.insert(name.clone()) {
                textures.push(name);
            }
        }
    }
    Ok(textures)
}

/// Rewrite texture directive paths to bare basenames
///
/// Used when copying a material library beside a rewritten mesh: the
/// textures land flat next to the mesh, so directory prefixes in the
/// directives would dangle.
pub fn normalize_texture_lines(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        if texture_directive(line).is_some() {
            let mut tokens: Vec<&str> = line.split_whitespace().collect();
            let basename = texture_basename(tokens[tokens.len() - 1]);
            tokens.pop();
            let mut rebuilt = tokens.join(" ");
            rebuilt.push(' ');
            rebuilt.push_str(&basename);
            out.push_str(&rebuilt);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}
