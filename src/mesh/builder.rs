//! Mesh construction utilities.
//!
//! Builds half-edge meshes from face-vertex lists. Element numbering is
//! deterministic: half-edges follow the face list, boundary half-edges are
//! appended in the order their interior twins were created, and edges are
//! numbered by first appearance. Layout edge ids are therefore predictable
//! from the input faces.

use std::collections::HashMap;

use nalgebra::Point3;

use super::halfedge::{Edge, Face, HalfEdge, HalfEdgeMesh};
use super::index::{EdgeId, FaceId, HalfEdgeId, MeshIndex, VertexId};
use crate::error::{EmbeddingError, Result};

/// Build a half-edge mesh from vertices and polygonal faces.
///
/// Faces are given as counter-clockwise vertex index loops of arbitrary
/// length (at least three).
///
/// # Example
/// ```
/// use layout_embedding::mesh::{build_from_polygons, HalfEdgeMesh};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.5, 2.0, 0.0),
/// ];
/// let faces: Vec<Vec<usize>> = vec![vec![0, 1, 2, 3], vec![3, 2, 4]];
///
/// let mesh: HalfEdgeMesh = build_from_polygons(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_faces(), 2);
/// assert_eq!(mesh.num_edges(), 6);
/// ```
pub fn build_from_polygons<I: MeshIndex, F: AsRef<[usize]>>(
    vertices: &[Point3<f64>],
    faces: &[F],
) -> Result<HalfEdgeMesh<I>> {
    if faces.is_empty() {
        return Err(EmbeddingError::EmptyMesh);
    }

    for (fi, face) in faces.iter().enumerate() {
        let face = face.as_ref();
        if face.len() < 3 {
            return Err(EmbeddingError::DegenerateFace { face: fi });
        }
        for &vi in face {
            if vi >= vertices.len() {
                return Err(EmbeddingError::InvalidVertexIndex { face: fi, vertex: vi });
            }
        }
        for (i, &a) in face.iter().enumerate() {
            if face[i + 1..].contains(&a) {
                return Err(EmbeddingError::DegenerateFace { face: fi });
            }
        }
    }

    let num_corners: usize = faces.iter().map(|f| f.as_ref().len()).sum();
    let mut mesh = HalfEdgeMesh::with_capacity(vertices.len(), num_corners * 2, faces.len());

    let vertex_ids: Vec<VertexId<I>> = vertices.iter().map(|&pos| mesh.add_vertex(pos)).collect();

    // Directed edge (v0, v1) -> half-edge, plus creation order for determinism.
    let mut edge_map: HashMap<(usize, usize), HalfEdgeId<I>> = HashMap::new();
    let mut directed: Vec<(usize, usize, HalfEdgeId<I>)> = Vec::with_capacity(num_corners);

    // First pass: interior half-edges and faces
    for face in faces {
        let face = face.as_ref();
        let n = face.len();
        let base = mesh.num_halfedges();
        let face_id = FaceId::<I>::new(mesh.num_faces());
        mesh.faces.push(Face::new(HalfEdgeId::new(base)));

        for i in 0..n {
            let v0 = face[i];
            let v1 = face[(i + 1) % n];
            let id = HalfEdgeId::<I>::new(base + i);

            let mut he = HalfEdge::new();
            he.origin = vertex_ids[v0];
            he.next = HalfEdgeId::new(base + (i + 1) % n);
            he.prev = HalfEdgeId::new(base + (i + n - 1) % n);
            he.face = face_id;
            mesh.halfedges.push(he);

            mesh.vertex_mut(vertex_ids[v0]).halfedge = id;

            if edge_map.insert((v0, v1), id).is_some() {
                return Err(EmbeddingError::NonManifoldEdge { v0, v1 });
            }
            directed.push((v0, v1, id));
        }
    }

    // Second pass: twins and full edges, in creation order
    for &(v0, v1, he) in &directed {
        if mesh.halfedge(he).edge.is_valid() {
            continue;
        }

        let edge_id = EdgeId::<I>::new(mesh.num_edges());
        mesh.edges.push(Edge { halfedge: he });

        let twin = match edge_map.get(&(v1, v0)) {
            Some(&twin) => twin,
            None => {
                let boundary_he = HalfEdgeId::<I>::new(mesh.num_halfedges());
                let mut bhe = HalfEdge::new();
                bhe.origin = vertex_ids[v1];
                mesh.halfedges.push(bhe);
                boundary_he
            }
        };

        mesh.halfedge_mut(he).twin = twin;
        mesh.halfedge_mut(he).edge = edge_id;
        mesh.halfedge_mut(twin).twin = he;
        mesh.halfedge_mut(twin).edge = edge_id;
    }

    link_boundary_loops(&mut mesh)?;
    fix_boundary_vertex_halfedges(&mut mesh);

    Ok(mesh)
}

/// Build a half-edge mesh from vertices and triangle faces.
///
/// # Example
/// ```
/// use layout_embedding::mesh::{build_from_triangles, HalfEdgeMesh};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_faces(), 1);
/// ```
pub fn build_from_triangles<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<HalfEdgeMesh<I>> {
    build_from_polygons(vertices, faces)
}

/// Build a half-edge mesh from vertices and quad faces (counter-clockwise).
pub fn build_from_quads<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 4]],
) -> Result<HalfEdgeMesh<I>> {
    build_from_polygons(vertices, faces)
}

/// Link boundary half-edges into loops.
fn link_boundary_loops<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) -> Result<()> {
    let boundary_hes: Vec<HalfEdgeId<I>> = mesh
        .halfedge_ids()
        .filter(|&he| mesh.is_boundary_halfedge(he))
        .collect();

    let mut outgoing: HashMap<usize, HalfEdgeId<I>> = HashMap::new();
    for &he in &boundary_hes {
        let origin = mesh.origin(he).index();
        if outgoing.insert(origin, he).is_some() {
            return Err(EmbeddingError::NonManifold {
                details: format!("vertex {} lies on more than one boundary loop", origin),
            });
        }
    }

    for &he in &boundary_hes {
        let dest = mesh.dest(he).index();
        if let Some(&next_he) = outgoing.get(&dest) {
            mesh.halfedge_mut(he).next = next_he;
            mesh.halfedge_mut(next_he).prev = he;
        }
    }

    Ok(())
}

/// Ensure boundary vertices point to a boundary half-edge.
fn fix_boundary_vertex_halfedges<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) {
    for vid in mesh.vertex_ids().collect::<Vec<_>>() {
        let boundary = mesh
            .vertex_halfedges(vid)
            .find(|&he| mesh.is_boundary_halfedge(he));
        if let Some(he) = boundary {
            mesh.vertex_mut(vid).halfedge = he;
        }
    }
}

/// Convert a triangle half-edge mesh back to a face-vertex representation.
pub fn to_face_vertex<I: MeshIndex>(mesh: &HalfEdgeMesh<I>) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let vertices: Vec<Point3<f64>> = mesh.vertex_ids().map(|v| *mesh.position(v)).collect();

    let faces: Vec<[usize; 3]> = mesh
        .face_ids()
        .map(|f| {
            let [v0, v1, v2] = mesh.face_triangle(f);
            [v0.index(), v1.index(), v2.index()]
        })
        .collect();

    (vertices, faces)
}
