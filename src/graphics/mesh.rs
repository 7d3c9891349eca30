//! Wavefront OBJ/MTL output for decoded models.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::Path,
};

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshFace {
    pub positions: [u32; 3],
    pub uvs: [u32; 3],
    pub normals: [u32; 3],
}

/// Index-triangulated mesh. Face indices are zero-based.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    pub faces: Vec<MeshFace>,
}

/// Material binding a mesh to one texture image.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub texture: String,
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExtractError::write(parent, e))?;
    }
    let file = File::create(path).map_err(|e| ExtractError::write(path, e))?;
    Ok(BufWriter::new(file))
}

/// Writes `mesh` as OBJ. Texture V is flipped since OBJ puts the origin at the
/// bottom left.
pub fn write_obj(mesh: &Mesh, path: &Path, mtl_file: &str, material: &Material) -> Result<()> {
    let mut out = create(path)?;
    write_obj_body(&mut out, mesh, mtl_file, material)
        .and_then(|_| out.flush())
        .map_err(|e| ExtractError::write(path, e))
}

fn write_obj_body(
    out: &mut impl Write,
    mesh: &Mesh,
    mtl_file: &str,
    material: &Material,
) -> io::Result<()> {
    writeln!(out, "mtllib {}", mtl_file)?;
    writeln!(out, "o {}", material.name)?;

    for [x, y, z] in &mesh.positions {
        writeln!(out, "v {:.6} {:.6} {:.6}", x, y, z)?;
    }
    for [u, v] in &mesh.uvs {
        writeln!(out, "vt {:.6} {:.6}", u, 1.0 - v)?;
    }
    for [x, y, z] in &mesh.normals {
        writeln!(out, "vn {:.6} {:.6} {:.6}", x, y, z)?;
    }

    writeln!(out, "usemtl {}", material.name)?;
    for face in &mesh.faces {
        write!(out, "f")?;
        for corner in 0..3 {
            write!(
                out,
                " {}/{}/{}",
                face.positions[corner] + 1,
                face.uvs[corner] + 1,
                face.normals[corner] + 1
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_mtl(path: &Path, material: &Material) -> Result<()> {
    let mut out = create(path)?;
    let body = writeln!(out, "newmtl {}", material.name)
        .and_then(|_| writeln!(out, "Ka 1.000000 1.000000 1.000000"))
        .and_then(|_| writeln!(out, "Kd 1.000000 1.000000 1.000000"))
        .and_then(|_| writeln!(out, "Ks 0.000000 0.000000 0.000000"))
        .and_then(|_| writeln!(out, "d 1.0"))
        .and_then(|_| writeln!(out, "illum 1"))
        .and_then(|_| writeln!(out, "map_Kd {}", material.texture))
        .and_then(|_| out.flush());
    body.map_err(|e| ExtractError::write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        Mesh {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            uvs: vec![[0.0, 0.0], [0.5, 0.0], [0.0, 0.25]],
            normals: vec![[0.0, 0.0, 1.0]],
            faces: vec![MeshFace {
                positions: [0, 1, 2],
                uvs: [0, 1, 2],
                normals: [0, 0, 0],
            }],
        }
    }

    fn material() -> Material {
        Material {
            name: "tree".to_string(),
            texture: "textures/model_atlas.png".to_string(),
        }
    }

    #[test]
    fn obj_uses_one_based_indices_and_flipped_v() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("tree.obj");
        write_obj(&triangle(), &path, "tree.mtl", &material()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("mtllib tree.mtl\n"));
        assert!(text.contains("vt 0.000000 0.750000\n"));
        assert!(text.contains("vn 0.000000 0.000000 1.000000\n"));
        assert!(text.contains("usemtl tree\n"));
        assert!(text.ends_with("f 1/1/1 2/2/1 3/3/1\n"));
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 3);
    }

    #[test]
    fn mtl_points_at_texture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.mtl");
        write_mtl(&path, &material()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("newmtl tree\n"));
        assert!(text.contains("map_Kd textures/model_atlas.png\n"));
    }
}
