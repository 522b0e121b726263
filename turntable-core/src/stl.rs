/// STL file parser for binary and ASCII formats
use nalgebra::{Point3, Vector3};
use nom::{
    bytes::complete::{tag, take_till},
    character::complete::{multispace0, multispace1},
    multi::many0,
    number::complete::{float, le_f32, le_u16, le_u32},
    sequence::{preceded, tuple},
    IResult,
};

use crate::error::LoadError;
use crate::geometry::{Mesh, Primitive};
use crate::scene::{LoadedAsset, Model};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Facet as stored in the file: one normal, three corners.
type Facet = ([f32; 3], [[f32; 3]; 3]);

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh, LoadError> {
    if data.len() < HEADER_LEN + 4 {
        return Err(LoadError::Stl("file too small to be a valid STL".to_string()));
    }

    let (body, count) = le_u32::<_, nom::error::Error<&[u8]>>(&data[HEADER_LEN..])
        .map_err(|e| LoadError::Stl(format!("bad triangle count: {e:?}")))?;
    let count = count as usize;
    let needed = count
        .checked_mul(FACET_LEN)
        .ok_or_else(|| LoadError::Stl(format!("triangle count {count} is too large")))?;
    if body.len() < needed {
        return Err(LoadError::Stl(format!(
            "header promises {count} triangles but only {} bytes follow",
            body.len()
        )));
    }

    let mut facets = Vec::with_capacity(count);
    let mut input = body;
    for _ in 0..count {
        let (rest, facet) = binary_facet(input)
            .map_err(|e| LoadError::Stl(format!("truncated facet: {e:?}")))?;
        facets.push(facet);
        input = rest;
    }

    Ok(mesh_from_facets(facets))
}

fn binary_facet(input: &[u8]) -> IResult<&[u8], Facet> {
    let (input, normal) = le_vec3(input)?;
    let (input, a) = le_vec3(input)?;
    let (input, b) = le_vec3(input)?;
    let (input, c) = le_vec3(input)?;
    let (input, _attributes) = le_u16(input)?;
    Ok((input, (normal, [a, b, c])))
}

fn le_vec3(input: &[u8]) -> IResult<&[u8], [f32; 3]> {
    let (input, (x, y, z)) = tuple((le_f32, le_f32, le_f32))(input)?;
    Ok((input, [x, y, z]))
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh, LoadError> {
    match parse_ascii_stl_impl(input) {
        Ok((_, facets)) => Ok(mesh_from_facets(facets)),
        Err(e) => Err(LoadError::Stl(format!("failed to parse ASCII STL: {e:?}"))),
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Vec<Facet>> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _name) = take_till(|c| c == '\n')(input)?;
    let (input, facets) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    Ok((input, facets))
}

fn parse_facet(input: &str) -> IResult<&str, Facet> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, a) = parse_vertex(input)?;
    let (input, b) = parse_vertex(input)?;
    let (input, c) = parse_vertex(input)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;
    Ok((input, (normal, [a, b, c])))
}

fn parse_vertex(input: &str) -> IResult<&str, [f32; 3]> {
    preceded(preceded(multispace0, tag("vertex")), parse_vector3)(input)
}

fn parse_vector3(input: &str) -> IResult<&str, [f32; 3]> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, [x, y, z]))
}

/// Flat-shaded mesh: every facet gets its own three vertices.
fn mesh_from_facets(facets: Vec<Facet>) -> Mesh {
    let mut positions = Vec::with_capacity(facets.len() * 3);
    let mut normals = Vec::with_capacity(facets.len() * 3);
    for (normal, corners) in facets {
        let [a, b, c] = corners.map(Point3::from);
        // Many exporters write zero normals; recompute from the winding.
        let normal = Vector3::from(normal)
            .try_normalize(1e-9)
            .or_else(|| (b - a).cross(&(c - a)).try_normalize(1e-12))
            .unwrap_or_else(Vector3::z);
        positions.extend([a, b, c]);
        normals.extend([normal; 3]);
    }
    let indices = (0..positions.len() as u32).collect();
    Mesh::new("stl").with_primitive(Primitive::new(positions, normals, indices))
}

/// Detect and parse STL file (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<LoadedAsset, LoadError> {
    let mesh = parse_stl_mesh(data)?;
    log::debug!("parsed STL with {} triangles", mesh.triangle_count());
    Ok(LoadedAsset::new(Model::from_mesh(mesh)))
}

fn parse_stl_mesh(data: &[u8]) -> Result<Mesh, LoadError> {
    // Binary files may also start with "solid", so fall back on failure.
    if data.starts_with(b"solid") {
        if let Ok(text) = std::str::from_utf8(data) {
            if let Ok(mesh) = parse_ascii_stl(text) {
                return Ok(mesh);
            }
        }
    }
    parse_binary_stl(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_TRIANGLE: &str = "solid tri
  facet normal 0 0 0
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid tri
";

    #[test]
    fn test_parse_binary_header() {
        let mut data = vec![0u8; 84];
        // Set triangle count to 0
        data[80..84].copy_from_slice(&0u32.to_le_bytes());

        let mesh = parse_binary_stl(&data).unwrap();
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn test_parse_binary_triangle() {
        let mut data = vec![0u8; 80];
        data.extend_from_slice(&1u32.to_le_bytes());
        for v in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&0u16.to_le_bytes());

        let mesh = parse_binary_stl(&data).unwrap();
        let primitive = &mesh.primitives[0];
        assert_eq!(primitive.positions[1], Point3::new(2.0, 0.0, 0.0));
        assert_eq!(primitive.normals, vec![Vector3::z(); 3]);
        assert_eq!(primitive.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_truncated_binary_is_rejected() {
        let mut data = vec![0u8; 80];
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 50]);
        assert!(matches!(parse_binary_stl(&data), Err(LoadError::Stl(_))));
        assert!(matches!(parse_binary_stl(&[0u8; 10]), Err(LoadError::Stl(_))));
    }

    #[test]
    fn test_huge_triangle_count_is_rejected() {
        let mut data = vec![0u8; 80];
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&[0u8; FACET_LEN]);
        assert!(matches!(parse_binary_stl(&data), Err(LoadError::Stl(_))));
    }

    #[test]
    fn test_parse_ascii_recomputes_zero_normal() {
        let mesh = parse_ascii_stl(ASCII_TRIANGLE).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        let normal = mesh.primitives[0].normals[0];
        assert!((normal - Vector3::z()).norm() < 1e-6);
    }

    #[test]
    fn test_parse_stl_builds_single_node_asset() {
        let asset = parse_stl(ASCII_TRIANGLE.as_bytes()).unwrap();
        assert!(asset.clips.is_empty());
        assert_eq!(asset.model.node_count(), 1);
        assert_eq!(asset.model.triangle_count(), 1);
    }
}
