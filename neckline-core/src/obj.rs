/// OBJ mesh loader: the `v`/`vn`/`vt`/`f` subset, fan-triangulated into an indexed mesh
use std::collections::{BTreeSet, HashMap, HashSet};

use nalgebra::{Point3, Vector2, Vector3};
use nom::{
    character::complete::{char, i64 as parse_index, space0, space1},
    combinator::opt,
    number::complete::float,
    sequence::preceded,
    IResult,
};

use crate::error::LoadError;
use crate::geometry::{IndexedMesh, MAX_VERTICES};

/// Texture coordinate used when a corner has none
fn default_tex_coord() -> Vector2<f32> {
    Vector2::zeros()
}

/// Normal used when a corner has none; faces the viewer
fn default_normal() -> Vector3<f32> {
    Vector3::z()
}

/// Recoveries made while building a mesh.
///
/// None of these abort the load; they are reported so the caller can log
/// them next to the asset name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// `v`/`vn`/`vt` lines whose numbers did not parse (stored as zeros)
    pub malformed_lines: usize,
    /// Corners whose position index was missing or out of range
    pub bad_positions: usize,
    /// Corners that named a texture coordinate outside the pool
    pub bad_tex_coords: usize,
    /// Corners that named a normal outside the pool
    pub bad_normals: usize,
    /// Face lines with fewer than three corners
    pub short_faces: usize,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Raw line statistics of an OBJ file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelInfo {
    pub vertex_count: usize,
    pub tex_coord_count: usize,
    pub normal_count: usize,
    pub face_count: usize,
    /// Distinct `usemtl` names, sorted; reported, never interpreted
    pub materials: Vec<String>,
}

/// One reference inside a face line, 1-based as written in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Corner {
    position: Option<i64>,
    tex_coord: Option<i64>,
    normal: Option<i64>,
}

/// Attribute pools in file order
#[derive(Default)]
struct Pools<'a> {
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    tex_coords: Vec<Vector2<f32>>,
    faces: Vec<&'a str>,
}

/// Parse OBJ text into an indexed mesh
pub fn load_mesh(data: &[u8]) -> Result<IndexedMesh, LoadError> {
    load_mesh_with_report(data).map(|(mesh, _)| mesh)
}

/// Parse OBJ text into an indexed mesh, also returning what had to be patched up
pub fn load_mesh_with_report(data: &[u8]) -> Result<(IndexedMesh, LoadReport), LoadError> {
    let text = String::from_utf8_lossy(data);
    let mut report = LoadReport::default();
    let pools = collect_pools(&text, &mut report);

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut tex_coords = Vec::new();
    let mut indices: Vec<u16> = Vec::new();
    let mut assigned: HashMap<&str, u16> = HashMap::new();

    for face in &pools.faces {
        let corners: Vec<&str> = face.split_whitespace().collect();
        if corners.len() < 3 {
            report.short_faces += 1;
            continue;
        }

        // Fan around the first corner; exact for convex planar polygons only
        for i in 1..corners.len() - 1 {
            for token in [corners[0], corners[i], corners[i + 1]] {
                if let Some(&existing) = assigned.get(token) {
                    indices.push(existing);
                    continue;
                }

                if positions.len() == MAX_VERTICES {
                    return Err(LoadError::TooManyVertices {
                        count: distinct_corners(&pools.faces),
                        limit: MAX_VERTICES,
                    });
                }

                let corner = parse_corner(token)
                    .map(|(_, corner)| corner)
                    .unwrap_or_default();
                let new_index = positions.len() as u16;

                positions.push(match resolve(corner.position, pools.positions.len()) {
                    Some(i) => pools.positions[i],
                    None => {
                        report.bad_positions += 1;
                        Point3::origin()
                    }
                });
                tex_coords.push(match resolve(corner.tex_coord, pools.tex_coords.len()) {
                    Some(i) => pools.tex_coords[i],
                    None => {
                        if corner.tex_coord.is_some() {
                            report.bad_tex_coords += 1;
                        }
                        default_tex_coord()
                    }
                });
                normals.push(match resolve(corner.normal, pools.normals.len()) {
                    Some(i) => pools.normals[i],
                    None => {
                        if corner.normal.is_some() {
                            report.bad_normals += 1;
                        }
                        default_normal()
                    }
                });

                assigned.insert(token, new_index);
                indices.push(new_index);
            }
        }
    }

    if positions.is_empty() || indices.is_empty() {
        return Err(LoadError::Empty);
    }

    let mesh = IndexedMesh::new(positions, normals, tex_coords, indices).ok_or(LoadError::Empty)?;
    Ok((mesh, report))
}

/// Count the raw statements of an OBJ file without building geometry
pub fn inspect_model(data: &[u8]) -> ModelInfo {
    let text = String::from_utf8_lossy(data);
    let mut info = ModelInfo::default();
    let mut materials = BTreeSet::new();

    for line in text.lines() {
        let (keyword, rest) = split_keyword(line);
        match keyword {
            "v" => info.vertex_count += 1,
            "vt" => info.tex_coord_count += 1,
            "vn" => info.normal_count += 1,
            "f" => info.face_count += 1,
            "usemtl" if !rest.trim().is_empty() => {
                materials.insert(rest.trim().to_string());
            }
            _ => {}
        }
    }

    info.materials = materials.into_iter().collect();
    info
}

/// First pass: fill attribute pools and buffer face lines
fn collect_pools<'a>(text: &'a str, report: &mut LoadReport) -> Pools<'a> {
    let mut pools = Pools::default();

    for line in text.lines() {
        let (keyword, rest) = split_keyword(line);
        match keyword {
            "v" => {
                let (x, y, z) = vector3_or_zero(rest, report);
                pools.positions.push(Point3::new(x, y, z));
            }
            "vn" => {
                let (x, y, z) = vector3_or_zero(rest, report);
                pools.normals.push(Vector3::new(x, y, z));
            }
            "vt" => {
                let (u, v) = match parse_vector2(rest) {
                    Ok((_, uv)) => uv,
                    Err(_) => {
                        report.malformed_lines += 1;
                        (0.0, 0.0)
                    }
                };
                pools.tex_coords.push(Vector2::new(u, v));
            }
            "f" => pools.faces.push(rest),
            _ => {}
        }
    }

    pools
}

/// Split a line into its leading keyword and the remainder
fn split_keyword(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(|c: char| c.is_whitespace()) {
        Some(at) => (&line[..at], &line[at..]),
        None => (line, ""),
    }
}

/// Malformed lines keep their pool slot so later indices stay aligned
fn vector3_or_zero(rest: &str, report: &mut LoadReport) -> (f32, f32, f32) {
    match parse_vector3(rest) {
        Ok((_, xyz)) => xyz,
        Err(_) => {
            report.malformed_lines += 1;
            (0.0, 0.0, 0.0)
        }
    }
}

/// Map a 1-based file index onto a pool slot
fn resolve(index: Option<i64>, len: usize) -> Option<usize> {
    let index = index?;
    if index >= 1 && (index as u64) <= len as u64 {
        Some(index as usize - 1)
    } else {
        None
    }
}

fn distinct_corners(faces: &[&str]) -> usize {
    faces
        .iter()
        .map(|face| face.split_whitespace().collect::<Vec<_>>())
        .filter(|corners| corners.len() >= 3)
        .flatten()
        .collect::<HashSet<_>>()
        .len()
}

fn parse_corner(input: &str) -> IResult<&str, Corner> {
    let (input, position) = opt(parse_index)(input)?;
    let (input, tex_coord) = opt(preceded(char('/'), opt(parse_index)))(input)?;
    let (input, normal) = opt(preceded(char('/'), opt(parse_index)))(input)?;
    Ok((
        input,
        Corner {
            position,
            tex_coord: tex_coord.flatten(),
            normal: normal.flatten(),
        },
    ))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = space0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = space1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = space1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

fn parse_vector2(input: &str) -> IResult<&str, (f32, f32)> {
    let (input, _) = space0(input)?;
    let (input, u) = float(input)?;
    let (input, _) = space1(input)?;
    let (input, v) = float(input)?;
    Ok((input, (u, v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn test_quad_fans_into_two_triangles() {
        let mesh = load_mesh(QUAD.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.indices(), &[0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.tex_coords()[2], Vector2::new(1.0, 1.0));
    }

    #[test]
    fn test_parse_corner_forms() {
        let (_, c) = parse_corner("12/4/7").unwrap();
        assert_eq!(c, Corner { position: Some(12), tex_coord: Some(4), normal: Some(7) });

        let (_, c) = parse_corner("12//7").unwrap();
        assert_eq!(c, Corner { position: Some(12), tex_coord: None, normal: Some(7) });

        let (_, c) = parse_corner("3/9").unwrap();
        assert_eq!(c, Corner { position: Some(3), tex_coord: Some(9), normal: None });

        let (_, c) = parse_corner("5").unwrap();
        assert_eq!(c, Corner { position: Some(5), tex_coord: None, normal: None });
    }

    #[test]
    fn test_pentagon_triangle_count() {
        let obj = "\
v 0 0 0
v 2 0 0
v 3 1 0
v 1 2 0
v -1 1 0
f 1 2 3 4 5
f 1 2 3
";
        let mesh = load_mesh(obj.as_bytes()).unwrap();
        // (5 - 2) + (3 - 2)
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.vertex_count(), 5);
    }

    #[test]
    fn test_shared_tokens_are_deduplicated() {
        let obj = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3
f 1 3 4
";
        let mesh = load_mesh(obj.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices(), &[0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_same_position_different_token_is_a_new_vertex() {
        let obj = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
vn 0 0 -1
f 1//1 2//1 3//1
f 1//2 3//2 2//2
";
        let mesh = load_mesh(obj.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.normals()[3], Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_out_of_range_position_is_zeroed() {
        let obj = "\
v 1 1 1
v 2 2 2
v 3 3 3
f 1 2 9
";
        let (mesh, report) = load_mesh_with_report(obj.as_bytes()).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.positions()[2], Point3::origin());
        assert_eq!(report.bad_positions, 1);
    }

    #[test]
    fn test_missing_attributes_use_defaults() {
        let obj = "\
v 0 0 0
v 1 0 0
v 0 1 0
f 1/5/5 2 3
";
        let (mesh, report) = load_mesh_with_report(obj.as_bytes()).unwrap();
        assert_eq!(mesh.normals()[0], default_normal());
        assert_eq!(mesh.tex_coords()[0], default_tex_coord());
        assert_eq!(report.bad_tex_coords, 1);
        assert_eq!(report.bad_normals, 1);
        assert_eq!(mesh.normals()[1], default_normal());
    }

    #[test]
    fn test_no_faces_is_empty() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\n";
        assert_eq!(load_mesh(obj.as_bytes()), Err(LoadError::Empty));
    }

    #[test]
    fn test_only_short_faces_is_empty() {
        let obj = "v 0 0 0\nv 1 0 0\nf 1 2\n";
        assert_eq!(load_mesh(obj.as_bytes()), Err(LoadError::Empty));
    }

    #[test]
    fn test_malformed_vertex_keeps_slot() {
        let obj = "\
v 0 0 0
v one two three
v 1 0 0
v 0 1 0
f 1 3 4
";
        let (mesh, report) = load_mesh_with_report(obj.as_bytes()).unwrap();
        assert_eq!(report.malformed_lines, 1);
        assert_eq!(mesh.positions()[1], Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_unknown_lines_and_extra_components_are_ignored() {
        let obj = "\
# comment
mtllib jewel.mtl
o necklace
g chain
usemtl gold
s 1
v 0 0 0 1
v 1 0 0 1
v 0 1 0 1
vt 0.5 0.5 0
f 1/1 2/1 3/1
";
        let (mesh, report) = load_mesh_with_report(obj.as_bytes()).unwrap();
        assert!(report.is_clean());
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.tex_coords()[0], Vector2::new(0.5, 0.5));
    }

    #[test]
    fn test_vertex_ceiling() {
        let mut obj = String::from("v 0 0 0\n");
        // Every corner token is distinct through a unique texture index
        for i in 0..(MAX_VERTICES / 3 + 1) {
            let base = i * 3;
            obj.push_str(&format!("f 1/{} 1/{} 1/{}\n", base + 1, base + 2, base + 3));
        }
        match load_mesh(obj.as_bytes()) {
            Err(LoadError::TooManyVertices { count, limit }) => {
                assert_eq!(limit, MAX_VERTICES);
                assert!(count > limit);
            }
            other => panic!("expected vertex ceiling error, got {:?}", other.map(|m| m.vertex_count())),
        }
    }

    #[test]
    fn test_exactly_max_vertices_loads() {
        let mut obj = String::from("v 0 0 0\nf");
        for i in 1..=MAX_VERTICES {
            obj.push_str(&format!(" 1/{}", i));
        }
        obj.push('\n');

        let mesh = load_mesh(obj.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), MAX_VERTICES);
        assert_eq!(mesh.triangle_count(), MAX_VERTICES - 2);
        assert_eq!(mesh.indices().iter().max(), Some(&u16::MAX));

        // One more distinct corner no longer fits
        obj.insert_str(obj.len() - 1, &format!(" 1/{}", MAX_VERTICES + 1));
        assert!(matches!(
            load_mesh(obj.as_bytes()),
            Err(LoadError::TooManyVertices { count, .. }) if count == MAX_VERTICES + 1
        ));
    }

    #[test]
    fn test_inspect_model() {
        let obj = format!("{}usemtl gold\nusemtl stone\nusemtl gold\n", QUAD);
        let info = inspect_model(obj.as_bytes());
        assert_eq!(info.vertex_count, 4);
        assert_eq!(info.tex_coord_count, 4);
        assert_eq!(info.normal_count, 1);
        assert_eq!(info.face_count, 1);
        assert_eq!(info.materials, vec!["gold".to_string(), "stone".to_string()]);
    }
}
