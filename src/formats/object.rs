//! # Bullfrog Object Data
//!
//! 3D models made of signed 16-bit fixed-point vertices and indexed
//! triangles. Textured triangles carry an atlas texture id and three local
//! UV byte pairs; UVs are mapped into the shared model texture atlas.
//!
//! ## File layout
//! - 58-byte header (`OBJECT_HEADER`).
//! - Vertex block, `num_bytes_vertex_data` bytes: `x, y, z` as i16 LE per
//!   vertex. Animated objects store further frames after the first; only the
//!   first frame is read.
//! - Triangle block, `num_bytes_tri_def` bytes: tagged records. Animated
//!   objects may pad each record with leading zero bytes.

use std::io::Cursor;

use crate::{
    binary_utils::{read_bytes, read_i16_le, read_u16_le, read_u8, Field, FieldKind, RecordLayout},
    containers::archive::ArchiveIndexEntry,
    error::{ExtractError, Result},
    graphics::mesh::{Mesh, MeshFace},
};

pub const OBJECT_HEADER_SIZE: usize = 58;
pub const OBJECT_MAGIC: &[u8; 20] = b"BULLFROG OBJECT DATA";
pub const FIXED_POINT_ONE: f32 = 1024.0;

static OBJECT_HEADER: RecordLayout = RecordLayout::new("object header", OBJECT_HEADER_SIZE);
const MAGIC: Field = Field::new("magic", 0, FieldKind::Bytes(20));
const ZERO_RUN: Field = Field::new("zero_run", 34, FieldKind::Bytes(4));
const TRI_DEF_BYTES: Field = Field::new("num_bytes_tri_def", 38, FieldKind::U16Le);
const VERTEX_DATA_BYTES: Field = Field::new("num_bytes_vertex_data", 42, FieldKind::U16Le);
const NUM3: Field = Field::new("num3", 46, FieldKind::U16Le);
const OBJECT_KIND: Field = Field::new("object_kind", 50, FieldKind::U8);
const KIND_MARKER: Field = Field::new("kind_marker", 51, FieldKind::U8);
const NUM_TRIANGLES: Field = Field::new("num_triangles", 52, FieldKind::U16Le);
const NUM_VERTICES: Field = Field::new("num_vertices", 54, FieldKind::U16Le);
const TRAILER: Field = Field::new("trailer", 56, FieldKind::Bytes(2));

const KIND_MARKER_VALUE: u8 = 1;
const VERTEX_SIZE: usize = 6;

const TRIANGLE_UNTEXTURED: u8 = 4;
const TRIANGLE_TEXTURED: u8 = 5;

/// Same shape as a TAB entry, addressing the linear model texture atlas.
pub type TextureAtlasRegion = ArchiveIndexEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Static,
    Animated,
}

impl ObjectKind {
    fn from_byte(value: u8) -> Option<Self> {
        match value {
            5 => Some(ObjectKind::Static),
            7 => Some(ObjectKind::Animated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl ObjectVertex {
    fn from_fixed(x: i16, y: i16, z: i16) -> Self {
        ObjectVertex {
            x: x as f32 / FIXED_POINT_ONE,
            y: y as f32 / FIXED_POINT_ONE,
            z: z as f32 / FIXED_POINT_ONE,
        }
    }

    fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectTriangle {
    pub a: u16,
    pub b: u16,
    pub c: u16,
    pub texture_id: Option<u8>,
    pub uv: Option<[u8; 6]>,
}

#[derive(Debug, Clone)]
pub struct BullfrogObject {
    pub kind: ObjectKind,
    /// Stored but unused by the decoder.
    pub num3: u16,
    pub vertices: Vec<ObjectVertex>,
    pub triangles: Vec<ObjectTriangle>,
}

/// Parses an object file. `name` only labels errors.
pub fn parse_object(data: &[u8], name: &str) -> Result<BullfrogObject> {
    let context = format!("object {}", name);
    let label = |e: ExtractError| relabel(e, &context);
    let header = OBJECT_HEADER.at(data, 0).map_err(label)?;

    header.expect_raw(&MAGIC, OBJECT_MAGIC).map_err(label)?;
    header.expect_raw(&ZERO_RUN, &[0; 4]).map_err(label)?;

    let kind_byte = header.u8(&OBJECT_KIND).map_err(label)?;
    let kind = ObjectKind::from_byte(kind_byte).ok_or_else(|| {
        ExtractError::format(
            &context,
            format!("field object_kind is {}, expected 5 or 7", kind_byte),
        )
    })?;

    let tri_def_bytes = header.u16(&TRI_DEF_BYTES).map_err(label)? as usize;
    let vertex_bytes = header.u16(&VERTEX_DATA_BYTES).map_err(label)? as usize;
    let num3 = header.u16(&NUM3).map_err(label)?;
    header.expect_u8(&KIND_MARKER, KIND_MARKER_VALUE).map_err(label)?;
    header.expect_raw(&TRAILER, &[0, 0]).map_err(label)?;
    let num_triangles = header.nonzero_u16(&NUM_TRIANGLES).map_err(label)?;
    let num_vertices = header.nonzero_u16(&NUM_VERTICES).map_err(label)?;

    let num_vertices = num_vertices as usize;
    if num_vertices * VERTEX_SIZE > vertex_bytes {
        return Err(ExtractError::format(
            &context,
            format!(
                "field num_bytes_vertex_data is {}, too small for {} vertices",
                vertex_bytes, num_vertices
            ),
        ));
    }

    let vertex_start = OBJECT_HEADER_SIZE;
    let triangle_start = vertex_start + vertex_bytes;
    let triangle_end = triangle_start + tri_def_bytes;
    if triangle_end > data.len() {
        return Err(ExtractError::format(
            &context,
            format!(
                "file is {} bytes, header declares {}",
                data.len(),
                triangle_end
            ),
        ));
    }

    let vertices = read_vertices(&data[vertex_start..triangle_start], num_vertices, &context)?;
    let triangles = read_triangles(
        &data[triangle_start..triangle_end],
        num_triangles as usize,
        kind,
        &context,
    )?;

    for (i, tri) in triangles.iter().enumerate() {
        for index in [tri.a, tri.b, tri.c] {
            if index as usize >= vertices.len() {
                return Err(ExtractError::format(
                    &context,
                    format!(
                        "triangle {} references vertex {} of {}",
                        i,
                        index,
                        vertices.len()
                    ),
                ));
            }
        }
    }

    Ok(BullfrogObject {
        kind,
        num3,
        vertices,
        triangles,
    })
}

fn relabel(err: ExtractError, context: &str) -> ExtractError {
    match err {
        ExtractError::Format { message, .. } => ExtractError::format(context, message),
        other => other,
    }
}

fn read_vertices(block: &[u8], count: usize, context: &str) -> Result<Vec<ObjectVertex>> {
    let mut cursor = Cursor::new(block);
    let mut vertices = Vec::with_capacity(count);
    for i in 0..count {
        let mut coord = || {
            read_i16_le(&mut cursor).map_err(|e| {
                ExtractError::format(context, format!("vertex {}: {}", i, e))
            })
        };
        let (x, y, z) = (coord()?, coord()?, coord()?);
        vertices.push(ObjectVertex::from_fixed(x, y, z));
    }
    Ok(vertices)
}

fn read_triangles(
    block: &[u8],
    count: usize,
    kind: ObjectKind,
    context: &str,
) -> Result<Vec<ObjectTriangle>> {
    let mut cursor = Cursor::new(block);
    let mut triangles = Vec::with_capacity(count);

    for i in 0..count {
        let truncated = |e: std::io::Error| {
            ExtractError::format(context, format!("triangle {}: {}", i, e))
        };

        let mut tag = read_u8(&mut cursor).map_err(truncated)?;
        if kind == ObjectKind::Animated {
            while tag == 0 {
                tag = read_u8(&mut cursor).map_err(truncated)?;
            }
        }

        let a = read_u16_le(&mut cursor).map_err(truncated)?;
        let b = read_u16_le(&mut cursor).map_err(truncated)?;
        let c = read_u16_le(&mut cursor).map_err(truncated)?;

        let (texture_id, uv) = match tag {
            TRIANGLE_TEXTURED => {
                let texture = read_u8(&mut cursor).map_err(truncated)?;
                let bytes = read_bytes(&mut cursor, 6).map_err(truncated)?;
                let mut uv = [0u8; 6];
                uv.copy_from_slice(&bytes);
                (Some(texture), Some(uv))
            }
            TRIANGLE_UNTEXTURED => (None, None),
            other => {
                return Err(ExtractError::format(
                    context,
                    format!("triangle {} has unknown type {}", i, other),
                ))
            }
        };

        triangles.push(ObjectTriangle {
            a,
            b,
            c,
            texture_id,
            uv,
        });
    }

    Ok(triangles)
}

/// Pixel size of the shared model texture atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasGeometry {
    pub width: u32,
    pub height: u32,
}

/// Maps a local UV byte pair inside `region` to atlas-normalised `[u, v]`.
pub fn map_uv(region: &TextureAtlasRegion, atlas: AtlasGeometry, u: u8, v: u8) -> [f32; 2] {
    let (col, row) = region.atlas_origin(atlas.width);
    [
        (col + u as u32) as f32 / atlas.width as f32,
        (row + v as u32) as f32 / atlas.height as f32,
    ]
}

/// Unit normal of triangle `abc`, zero for degenerate triangles.
pub fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len <= f32::EPSILON {
        return [0.0; 3];
    }
    [n[0] / len, n[1] / len, n[2] / len]
}

/// Flat-shaded, index-triangulated mesh with UVs in atlas space.
pub fn build_mesh(
    object: &BullfrogObject,
    regions: &[TextureAtlasRegion],
    atlas: AtlasGeometry,
    name: &str,
) -> Result<Mesh> {
    let mut mesh = Mesh {
        positions: object.vertices.iter().map(|v| v.to_array()).collect(),
        ..Mesh::default()
    };

    for (i, tri) in object.triangles.iter().enumerate() {
        let corners = [tri.a as usize, tri.b as usize, tri.c as usize];

        let uvs = match (tri.texture_id, tri.uv) {
            (Some(texture), Some(uv)) => {
                let region = regions.get(texture as usize).ok_or_else(|| {
                    ExtractError::format(
                        format!("object {}", name),
                        format!(
                            "triangle {} uses texture {} but the atlas has {} regions",
                            i,
                            texture,
                            regions.len()
                        ),
                    )
                })?;
                [
                    map_uv(region, atlas, uv[0], uv[1]),
                    map_uv(region, atlas, uv[2], uv[3]),
                    map_uv(region, atlas, uv[4], uv[5]),
                ]
            }
            _ => [[0.0; 2]; 3],
        };

        let uv_base = mesh.uvs.len() as u32;
        mesh.uvs.extend_from_slice(&uvs);

        let normal = face_normal(
            mesh.positions[corners[0]],
            mesh.positions[corners[1]],
            mesh.positions[corners[2]],
        );
        let normal_index = mesh.normals.len() as u32;
        mesh.normals.push(normal);

        mesh.faces.push(MeshFace {
            positions: [corners[0] as u32, corners[1] as u32, corners[2] as u32],
            uvs: [uv_base, uv_base + 1, uv_base + 2],
            normals: [normal_index; 3],
        });
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(kind: u8, tri_bytes: u16, vertex_bytes: u16, triangles: u16, vertices: u16) -> Vec<u8> {
        let mut data = vec![0u8; OBJECT_HEADER_SIZE];
        data[..20].copy_from_slice(OBJECT_MAGIC);
        data[38..40].copy_from_slice(&tri_bytes.to_le_bytes());
        data[42..44].copy_from_slice(&vertex_bytes.to_le_bytes());
        data[46..48].copy_from_slice(&1u16.to_le_bytes());
        data[50] = kind;
        data[51] = KIND_MARKER_VALUE;
        data[52..54].copy_from_slice(&triangles.to_le_bytes());
        data[54..56].copy_from_slice(&vertices.to_le_bytes());
        data
    }

    fn push_vertex(data: &mut Vec<u8>, x: i16, y: i16, z: i16) {
        for v in [x, y, z] {
            data.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn push_triangle(data: &mut Vec<u8>, a: u16, b: u16, c: u16, texture: Option<(u8, [u8; 6])>) {
        data.push(if texture.is_some() { 5 } else { 4 });
        for v in [a, b, c] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        if let Some((id, uv)) = texture {
            data.push(id);
            data.extend_from_slice(&uv);
        }
    }

    fn unit_triangle(kind: u8, padding: usize) -> Vec<u8> {
        let tri_bytes = (14 + 7 + 2 * padding) as u16;
        let mut data = header(kind, tri_bytes, 18, 2, 3);
        push_vertex(&mut data, 0, 0, 0);
        push_vertex(&mut data, 1024, 0, 0);
        push_vertex(&mut data, 0, 2048, -512);
        data.extend(std::iter::repeat(0).take(padding));
        push_triangle(&mut data, 0, 1, 2, Some((1, [0, 0, 3, 0, 0, 3])));
        data.extend(std::iter::repeat(0).take(padding));
        push_triangle(&mut data, 2, 1, 0, None);
        data
    }

    #[test]
    fn parses_static_object() {
        let object = parse_object(&unit_triangle(5, 0), "tree").unwrap();
        assert_eq!(object.kind, ObjectKind::Static);
        assert_eq!(object.vertices.len(), 3);
        assert_eq!(
            object.vertices[2],
            ObjectVertex {
                x: 0.0,
                y: 2.0,
                z: -0.5
            }
        );
        assert_eq!(object.triangles[0].texture_id, Some(1));
        assert_eq!(object.triangles[0].uv, Some([0, 0, 3, 0, 0, 3]));
        assert_eq!(object.triangles[1].uv, None);
    }

    #[test]
    fn animated_records_skip_zero_padding() {
        let object = parse_object(&unit_triangle(7, 3), "bird").unwrap();
        assert_eq!(object.kind, ObjectKind::Animated);
        assert_eq!(object.triangles.len(), 2);
        assert_eq!((object.triangles[1].a, object.triangles[1].c), (2, 0));
    }

    #[test]
    fn bad_magic_is_a_format_error() {
        let mut data = unit_triangle(5, 0);
        data[0] = b'X';
        let err = parse_object(&data, "castle").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("object castle"), "{}", text);
        assert!(text.contains("magic"), "{}", text);
    }

    #[test]
    fn unexpected_constant_names_the_field() {
        let mut data = unit_triangle(5, 0);
        data[50] = 6;
        let text = parse_object(&data, "x").unwrap_err().to_string();
        assert!(text.contains("object x") && text.contains("object_kind"), "{}", text);

        let mut data = unit_triangle(5, 0);
        data[51] = 9;
        let text = parse_object(&data, "x").unwrap_err().to_string();
        assert!(text.contains("object x") && text.contains("kind_marker"), "{}", text);
    }

    #[test]
    fn zero_counts_are_rejected() {
        let data = header(5, 0, 0, 0, 3);
        let text = parse_object(&data, "empty").unwrap_err().to_string();
        assert!(text.contains("object empty") && text.contains("num_triangles"), "{}", text);
    }

    #[test]
    fn short_header_names_the_object() {
        let text = parse_object(&[0u8; 20], "stub").unwrap_err().to_string();
        assert!(text.contains("object stub"), "{}", text);
    }

    #[test]
    fn out_of_range_vertex_index_is_rejected() {
        let mut data = header(5, 7, 6, 1, 1);
        push_vertex(&mut data, 0, 0, 0);
        push_triangle(&mut data, 0, 0, 4, None);
        let err = parse_object(&data, "broken").unwrap_err();
        assert!(err.to_string().contains("references vertex 4"));
    }

    #[test]
    fn uv_origin_maps_to_zero() {
        let region = TextureAtlasRegion {
            offset: 0,
            width: 32,
            height: 16,
        };
        let atlas = AtlasGeometry {
            width: 256,
            height: 128,
        };
        assert_eq!(map_uv(&region, atlas, 0, 0), [0.0, 0.0]);
        assert_eq!(
            map_uv(&region, atlas, 31, 15),
            [31.0 / 256.0, 15.0 / 128.0]
        );
    }

    #[test]
    fn uv_corner_adds_region_row() {
        let atlas = AtlasGeometry {
            width: 256,
            height: 256,
        };
        let region = TextureAtlasRegion {
            offset: 256 * 64,
            width: 64,
            height: 64,
        };
        assert_eq!(
            map_uv(&region, atlas, 63, 63),
            [63.0 / 256.0, (63.0 + 64.0) / 256.0]
        );
    }

    #[test]
    fn normals_are_flat_and_unit_length() {
        let n = face_normal([0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        assert_eq!(n, [0.0, 0.0, 1.0]);
        assert_eq!(face_normal([0.0; 3], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]), [0.0; 3]);
    }

    #[test]
    fn mesh_shares_one_normal_per_face() {
        let object = parse_object(&unit_triangle(5, 0), "tree").unwrap();
        let regions = vec![
            TextureAtlasRegion {
                offset: 0,
                width: 64,
                height: 64,
            },
            TextureAtlasRegion {
                offset: 64,
                width: 64,
                height: 64,
            },
        ];
        let atlas = AtlasGeometry {
            width: 128,
            height: 64,
        };
        let mesh = build_mesh(&object, &regions, atlas, "tree").unwrap();
        assert_eq!(mesh.faces.len(), 2);
        assert_eq!(mesh.normals.len(), 2);
        assert_eq!(mesh.faces[0].normals, [0, 0, 0]);
        assert_eq!(mesh.uvs[1], [67.0 / 128.0, 0.0]);
        assert_eq!(mesh.uvs[3], [0.0, 0.0]);
    }

    #[test]
    fn unknown_texture_id_is_rejected() {
        let object = parse_object(&unit_triangle(5, 0), "tree").unwrap();
        let atlas = AtlasGeometry {
            width: 64,
            height: 64,
        };
        assert!(build_mesh(&object, &[], atlas, "tree").is_err());
    }
}
