//! Wavefront OBJ mesh loading
//!
//! Supports the subset the viewer needs: `v` positions, `vt` texture
//! coordinates and `f` faces with `v/vt` or `v/vt/vn` corners. Polygons are
//! fan-triangulated. Texture V is flipped because OBJ puts the origin at the
//! bottom-left while Vulkan samples from the top-left. Identical corners are
//! deduplicated by exact bit pattern so shared vertices collapse to one
//! index.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

use crate::render::{MeshData, Vertex};

/// OBJ parsing errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("model has no faces")]
    Empty,
}

/// Load and triangulate an OBJ file
pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<MeshData, ModelError> {
    let file = File::open(path)?;
    parse_obj(BufReader::new(file))
}

/// Parse OBJ data from any buffered reader
pub fn parse_obj<R: BufRead>(reader: R) -> Result<MeshData, ModelError> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut tex_coords: Vec<[f32; 2]> = Vec::new();

    let mut mesh = MeshData::default();
    let mut seen: HashMap<[u32; 8], u32> = HashMap::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = line_number + 1;
        let mut parts = line.split_whitespace();

        match parts.next() {
            Some("v") => {
                positions.push([
                    parse_float(parts.next(), line_number)?,
                    parse_float(parts.next(), line_number)?,
                    parse_float(parts.next(), line_number)?,
                ]);
            }
            Some("vt") => {
                let u = parse_float(parts.next(), line_number)?;
                let v = parse_float(parts.next(), line_number)?;
                tex_coords.push([u, 1.0 - v]);
            }
            Some("f") => {
                let corners: Vec<&str> = parts.collect();
                if corners.len() < 3 {
                    return Err(ModelError::Parse {
                        line: line_number,
                        message: format!("face with {} corners", corners.len()),
                    });
                }

                let mut indices = Vec::with_capacity(corners.len());
                for corner in &corners {
                    indices.push(resolve_corner(
                        corner,
                        &positions,
                        &tex_coords,
                        &mut mesh,
                        &mut seen,
                        line_number,
                    )?);
                }

                // Fan triangulation around the first corner
                for i in 1..indices.len() - 1 {
                    mesh.indices.push(indices[0]);
                    mesh.indices.push(indices[i]);
                    mesh.indices.push(indices[i + 1]);
                }
            }
            // Normals, materials, groups and comments are ignored
            _ => {}
        }
    }

    if mesh.indices.is_empty() {
        return Err(ModelError::Empty);
    }

    Ok(mesh)
}

fn parse_float(token: Option<&str>, line: usize) -> Result<f32, ModelError> {
    let token = token.ok_or(ModelError::Parse {
        line,
        message: "missing component".to_string(),
    })?;
    token.parse().map_err(|_| ModelError::Parse {
        line,
        message: format!("invalid number '{token}'"),
    })
}

fn resolve_corner(
    corner: &str,
    positions: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
    mesh: &mut MeshData,
    seen: &mut HashMap<[u32; 8], u32>,
    line: usize,
) -> Result<u32, ModelError> {
    let mut refs = corner.split('/');

    let position = lookup(refs.next(), positions, corner, line)?;
    let tex_coord = match refs.next() {
        Some("") | None => [0.0, 0.0],
        index => lookup(index, tex_coords, corner, line)?,
    };

    let vertex = Vertex {
        position,
        tex_coord,
        color: [1.0, 1.0, 1.0],
    };

    let key = vertex.bit_key();
    if let Some(&index) = seen.get(&key) {
        return Ok(index);
    }

    let index = mesh.vertices.len() as u32;
    mesh.vertices.push(vertex);
    seen.insert(key, index);
    Ok(index)
}

/// Resolve a 1-based OBJ index into `table`
fn lookup<T: Copy>(
    index: Option<&str>,
    table: &[T],
    corner: &str,
    line: usize,
) -> Result<T, ModelError> {
    let index: usize = index
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ModelError::Parse {
            line,
            message: format!("invalid face corner '{corner}'"),
        })?;
    if index == 0 || index > table.len() {
        return Err(ModelError::Parse {
            line,
            message: format!("index {index} out of range in '{corner}'"),
        });
    }
    Ok(table[index - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TRIANGLE: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
f 1/1 2/2 3/3
";

    #[test]
    fn parses_a_triangle() {
        let mesh = parse_obj(Cursor::new(TRIANGLE)).expect("valid OBJ");
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[0].color, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn flips_texture_v() {
        let mesh = parse_obj(Cursor::new(TRIANGLE)).expect("valid OBJ");
        // vt 0.0 0.0 becomes (0.0, 1.0)
        assert_eq!(mesh.vertices[0].tex_coord, [0.0, 1.0]);
        // vt 0.0 1.0 becomes (0.0, 0.0)
        assert_eq!(mesh.vertices[2].tex_coord, [0.0, 0.0]);
    }

    #[test]
    fn quad_is_fan_triangulated() {
        let obj = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
";
        let mesh = parse_obj(Cursor::new(obj)).expect("valid OBJ");
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn identical_corners_are_deduplicated() {
        let obj = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
vt 0 0
f 1/1 2/1 3/1
f 2/1 4/1 3/1
";
        let mesh = parse_obj(Cursor::new(obj)).expect("valid OBJ");
        // Corners 2 and 3 are shared between the faces
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
    }

    #[test]
    fn vn_only_corners_default_tex_coords() {
        let obj = "\
v 0 0 0
v 1 0 0
v 0 1 0
f 1//1 2//1 3//1
";
        let mesh = parse_obj(Cursor::new(obj)).expect("valid OBJ");
        assert_eq!(mesh.vertices[0].tex_coord, [0.0, 0.0]);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let obj = "\
v 0 0 0
f 1 2 3
";
        let result = parse_obj(Cursor::new(obj));
        assert!(matches!(result, Err(ModelError::Parse { line: 2, .. })));
    }

    #[test]
    fn empty_model_is_an_error() {
        let result = parse_obj(Cursor::new("v 0 0 0\n"));
        assert!(matches!(result, Err(ModelError::Empty)));
    }
}
