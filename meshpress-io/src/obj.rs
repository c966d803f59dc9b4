//! OBJ format support
//!
//! Hand-rolled line parser. The pipeline needs line-level control over
//! material directives, and OBJ geometry is simple enough to read
//! directly. Polygonal faces are fan-triangulated; corners that disagree
//! on texture or normal indices split into separate vertices.

use crate::{MeshReader, MeshWriter};
use meshpress_core::{Error, Point2f, Point3f, Result, TriangleMesh, Vector3f};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub struct ObjReader;
pub struct ObjWriter;

/// One face corner with indices already resolved to zero-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Corner {
    position: usize,
    texcoord: Option<usize>,
    normal: Option<usize>,
}

fn expect_token<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
    line_no: usize,
) -> Result<&'a str> {
    tokens
        .next()
        .ok_or_else(|| Error::InvalidData(format!("missing {} on line {}", what, line_no)))
}

fn parse_float(token: &str, line_no: usize) -> Result<f32> {
    token
        .parse::<f32>()
        .map_err(|_| Error::InvalidData(format!("invalid number '{}' on line {}", token, line_no)))
}

/// Resolve a one-based (or negative, relative-to-end) OBJ index
fn resolve_index(raw: i64, len: usize, line_no: usize) -> Result<usize> {
    let idx = if raw > 0 {
        raw - 1
    } else if raw < 0 {
        len as i64 + raw
    } else {
        return Err(Error::InvalidData(format!(
            "OBJ indices are one-based (line {})",
            line_no
        )));
    };
    if idx < 0 || idx as usize >= len {
        return Err(Error::InvalidData(format!(
            "index {} out of range on line {}",
            raw, line_no
        )));
    }
    Ok(idx as usize)
}

fn parse_corner(
    token: &str,
    positions: usize,
    texcoords: usize,
    normals: usize,
    line_no: usize,
) -> Result<Corner> {
    let mut fields = token.split('/');
    let position_field = fields.next().filter(|s| !s.is_empty()).ok_or_else(|| {
        Error::InvalidData(format!(
            "malformed face corner '{}' on line {}",
            token, line_no
        ))
    })?;
    let raw = position_field.parse::<i64>().map_err(|_| {
        Error::InvalidData(format!(
            "invalid face index '{}' on line {}",
            position_field, line_no
        ))
    })?;
    let position = resolve_index(raw, positions, line_no)?;

    let parse_optional = |field: Option<&str>, len: usize| -> Result<Option<usize>> {
        match field {
            None | Some("") => Ok(None),
            Some(s) => {
                let raw = s.parse::<i64>().map_err(|_| {
                    Error::InvalidData(format!("invalid face index '{}' on line {}", s, line_no))
                })?;
                Ok(Some(resolve_index(raw, len, line_no)?))
            }
        }
    };
    let texcoord = parse_optional(fields.next(), texcoords)?;
    let normal = parse_optional(fields.next(), normals)?;

    Ok(Corner {
        position,
        texcoord,
        normal,
    })
}

impl MeshReader for ObjReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);

        let mut positions: Vec<Point3f> = Vec::new();
        let mut texcoord_pool: Vec<Point2f> = Vec::new();
        let mut normal_pool: Vec<Vector3f> = Vec::new();
        let mut triangles: Vec<[Corner; 3]> = Vec::new();
        let mut any_texcoord = false;
        let mut any_normal = false;

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            let line_no = i + 1;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => {
                    let x = parse_float(expect_token(&mut tokens, "x coordinate", line_no)?, line_no)?;
                    let y = parse_float(expect_token(&mut tokens, "y coordinate", line_no)?, line_no)?;
                    let z = parse_float(expect_token(&mut tokens, "z coordinate", line_no)?, line_no)?;
                    positions.push(Point3f::new(x, y, z));
                }
                Some("vt") => {
                    let u = parse_float(expect_token(&mut tokens, "u coordinate", line_no)?, line_no)?;
                    let v = parse_float(expect_token(&mut tokens, "v coordinate", line_no)?, line_no)?;
                    texcoord_pool.push(Point2f::new(u, v));
                }
                Some("vn") => {
                    let x = parse_float(expect_token(&mut tokens, "x component", line_no)?, line_no)?;
                    let y = parse_float(expect_token(&mut tokens, "y component", line_no)?, line_no)?;
                    let z = parse_float(expect_token(&mut tokens, "z component", line_no)?, line_no)?;
                    normal_pool.push(Vector3f::new(x, y, z));
                }
                Some("f") => {
                    let mut corners = Vec::new();
                    for token in tokens {
                        let corner = parse_corner(
                            token,
                            positions.len(),
                            texcoord_pool.len(),
                            normal_pool.len(),
                            line_no,
                        )?;
                        any_texcoord |= corner.texcoord.is_some();
                        any_normal |= corner.normal.is_some();
                        corners.push(corner);
                    }
                    if corners.len() < 3 {
                        return Err(Error::InvalidData(format!(
                            "face with fewer than 3 corners on line {}",
                            line_no
                        )));
                    }
                    // Fan triangulation of polygonal faces
                    for i in 1..corners.len() - 1 {
                        triangles.push([corners[0], corners[i], corners[i + 1]]);
                    }
                }
                // mtllib, usemtl, o, g, s and friends carry no geometry
                _ => {}
            }
        }

        // Intern (position, texcoord, normal) triples into final vertices
        let mut corner_map: HashMap<Corner, usize> = HashMap::new();
        let mut vertices: Vec<Point3f> = Vec::new();
        let mut texcoords: Vec<Point2f> = Vec::new();
        let mut normals: Vec<Vector3f> = Vec::new();
        let mut faces = Vec::with_capacity(triangles.len());
        for tri in triangles {
            let mut face = [0usize; 3];
            for (slot, corner) in tri.into_iter().enumerate() {
                let next = vertices.len();
                let index = *corner_map.entry(corner).or_insert_with(|| {
                    vertices.push(positions[corner.position]);
                    texcoords.push(corner.texcoord.map_or(Point2f::origin(), |t| texcoord_pool[t]));
                    normals.push(corner.normal.map_or(Vector3f::zeros(), |n| normal_pool[n]));
                    next
                });
                face[slot] = index;
            }
            faces.push(face);
        }

        let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
        if any_texcoord {
            mesh.set_texcoords(texcoords);
        }
        if any_normal {
            mesh.set_normals(normals);
        }
        Ok(mesh)
    }
}

impl MeshWriter for ObjWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
        for face in &mesh.faces {
            for &v in face {
                if v >= mesh.vertex_count() {
                    return Err(Error::InvalidData(format!(
                        "face references vertex {} but mesh has {} vertices",
                        v,
                        mesh.vertex_count()
                    )));
                }
            }
        }

        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        writeln!(
            writer,
            "# {} vertices, {} faces",
            mesh.vertex_count(),
            mesh.face_count()
        )?;
        for v in &mesh.vertices {
            writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
        }
        if let Some(texcoords) = &mesh.texcoords {
            for t in texcoords {
                writeln!(writer, "vt {} {}", t.x, t.y)?;
            }
        }
        if let Some(normals) = &mesh.normals {
            for n in normals {
                writeln!(writer, "vn {} {} {}", n.x, n.y, n.z)?;
            }
        }

        // Attribute arrays are per-vertex, so all index slots agree
        let has_texcoords = mesh.texcoords.is_some();
        let has_normals = mesh.normals.is_some();
        for face in &mesh.faces {
            let [a, b, c] = [face[0] + 1, face[1] + 1, face[2] + 1];
            match (has_texcoords, has_normals) {
                (true, true) => {
                    writeln!(writer, "f {0}/{0}/{0} {1}/{1}/{1} {2}/{2}/{2}", a, b, c)?
                }
                (true, false) => writeln!(writer, "f {0}/{0} {1}/{1} {2}/{2}", a, b, c)?,
                (false, true) => writeln!(writer, "f {0}//{0} {1}//{1} {2}//{2}", a, b, c)?,
                (false, false) => writeln!(writer, "f {} {} {}", a, b, c)?,
            }
        }
        writer.flush()?;
        Ok(())
    }
}
