//! Virtual vertices, virtual paths and ports.
//!
//! A virtual path runs over the target mesh without refining it: every
//! element of the path is either a real target vertex or a point on a target
//! edge. Consecutive elements always share a face, so each segment can be
//! attributed to exactly one target element (an edge for vertex-to-vertex
//! segments, a face otherwise).

use nalgebra::Point3;

use crate::mesh::{EdgeId, FaceId, HalfEdgeId, HalfEdgeMesh, VertexId};

/// A position on the target mesh: a real vertex or a point on an edge.
///
/// Edge points are identified by their edge alone; their position is taken
/// to be the edge midpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VirtualVertex {
    /// A real target vertex.
    Vertex(VertexId),
    /// A point strictly inside a target edge.
    Edge(EdgeId),
}

impl VirtualVertex {
    /// Returns `true` for real vertices.
    #[inline]
    pub fn is_real_vertex(self) -> bool {
        matches!(self, VirtualVertex::Vertex(_))
    }

    /// The real vertex, if this is one.
    #[inline]
    pub fn real_vertex(self) -> Option<VertexId> {
        match self {
            VirtualVertex::Vertex(v) => Some(v),
            VirtualVertex::Edge(_) => None,
        }
    }

    /// The edge, if this is an edge point.
    #[inline]
    pub fn real_edge(self) -> Option<EdgeId> {
        match self {
            VirtualVertex::Vertex(_) => None,
            VirtualVertex::Edge(e) => Some(e),
        }
    }

    /// 3D position on the target mesh.
    pub fn position(self, mesh: &HalfEdgeMesh) -> Point3<f64> {
        match self {
            VirtualVertex::Vertex(v) => *mesh.position(v),
            VirtualVertex::Edge(e) => mesh.edge_midpoint(e),
        }
    }

    /// Dense node index: vertices first, then edges.
    #[inline]
    pub(crate) fn node_index(self, mesh: &HalfEdgeMesh) -> usize {
        match self {
            VirtualVertex::Vertex(v) => v.index(),
            VirtualVertex::Edge(e) => mesh.num_vertices() + e.index(),
        }
    }

    /// Inverse of [`VirtualVertex::node_index`].
    #[inline]
    pub(crate) fn from_node_index(mesh: &HalfEdgeMesh, node: usize) -> Self {
        if node < mesh.num_vertices() {
            VirtualVertex::Vertex(VertexId::new(node))
        } else {
            VirtualVertex::Edge(EdgeId::new(node - mesh.num_vertices()))
        }
    }
}

/// An ordered sequence of virtual vertices. Committed and candidate paths
/// always start and end at real vertices.
pub type VirtualPath = Vec<VirtualVertex>;

/// A target mesh element that a path can occupy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeshElement {
    /// A target vertex.
    Vertex(VertexId),
    /// A target edge.
    Edge(EdgeId),
    /// A target face.
    Face(FaceId),
}

impl From<VirtualVertex> for MeshElement {
    fn from(vv: VirtualVertex) -> Self {
        match vv {
            VirtualVertex::Vertex(v) => MeshElement::Vertex(v),
            VirtualVertex::Edge(e) => MeshElement::Edge(e),
        }
    }
}

/// The target element covered by the segment `a -> b`.
///
/// # Panics
/// Panics if `a` and `b` do not share a face.
pub fn segment_element(mesh: &HalfEdgeMesh, a: VirtualVertex, b: VirtualVertex) -> MeshElement {
    let element = match (a, b) {
        (VirtualVertex::Vertex(v0), VirtualVertex::Vertex(v1)) => mesh
            .halfedge_from_to(v0, v1)
            .map(|he| MeshElement::Edge(mesh.edge_of(he))),
        (VirtualVertex::Vertex(v), VirtualVertex::Edge(e))
        | (VirtualVertex::Edge(e), VirtualVertex::Vertex(v)) => {
            mesh.face_with_edge_and_vertex(e, v).map(MeshElement::Face)
        }
        (VirtualVertex::Edge(e0), VirtualVertex::Edge(e1)) if e0 != e1 => {
            mesh.common_face(e0, e1).map(MeshElement::Face)
        }
        _ => None,
    };
    element.unwrap_or_else(|| panic!("path segment {:?} -> {:?} is not inside a face", a, b))
}

/// All target elements a path occupies, excluding its two endpoints.
///
/// Interior virtual vertices come first, followed by one element per segment.
pub fn path_elements(mesh: &HalfEdgeMesh, path: &[VirtualVertex]) -> Vec<MeshElement> {
    assert!(path.len() >= 2, "a virtual path needs at least two vertices");

    let interior = path[1..path.len() - 1].iter().map(|&vv| MeshElement::from(vv));
    let segments = path.windows(2).map(|w| segment_element(mesh, w[0], w[1]));
    interior.chain(segments).collect()
}

/// Sum of the Euclidean segment lengths of a path.
pub fn path_length(mesh: &HalfEdgeMesh, path: &[VirtualVertex]) -> f64 {
    path.windows(2)
        .map(|w| (w[1].position(mesh) - w[0].position(mesh)).norm())
        .sum()
}

/// The direction in which a path leaves (or enters) a real vertex.
///
/// Ports around a vertex form a ring that alternates between neighbouring
/// vertices and the edges opposite the vertex in its incident faces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualPort {
    /// The vertex the port belongs to.
    pub from: VertexId,
    /// The first path element after `from`.
    pub to: VirtualVertex,
}

impl VirtualPort {
    /// Create a port.
    pub fn new(from: VertexId, to: VirtualVertex) -> Self {
        Self { from, to }
    }

    /// The port through which `path` leaves its first vertex.
    pub fn at_start(path: &[VirtualVertex]) -> Self {
        let from = path[0]
            .real_vertex()
            .unwrap_or_else(|| panic!("path starts at an edge point: {:?}", path[0]));
        Self::new(from, path[1])
    }

    /// The port through which `path` enters its last vertex.
    pub fn at_end(path: &[VirtualVertex]) -> Self {
        let n = path.len();
        let from = path[n - 1]
            .real_vertex()
            .unwrap_or_else(|| panic!("path ends at an edge point: {:?}", path[n - 1]));
        Self::new(from, path[n - 2])
    }

    /// The next port counter-clockwise around `from`.
    pub fn rotated_ccw(self, mesh: &HalfEdgeMesh) -> Self {
        let to = match self.to {
            VirtualVertex::Vertex(w) => {
                let he = self.halfedge_to(mesh, w);
                if mesh.is_boundary_halfedge(he) {
                    VirtualVertex::Vertex(mesh.dest(mesh.rotated_ccw(he)))
                } else {
                    VirtualVertex::Edge(mesh.edge_of(mesh.next(he)))
                }
            }
            VirtualVertex::Edge(e) => VirtualVertex::Vertex(mesh.dest(self.facing(mesh, e))),
        };
        Self::new(self.from, to)
    }

    /// The next port clockwise around `from`.
    pub fn rotated_cw(self, mesh: &HalfEdgeMesh) -> Self {
        let to = match self.to {
            VirtualVertex::Vertex(w) => {
                let he = self.halfedge_to(mesh, w);
                let twin = mesh.twin(he);
                if mesh.is_boundary_halfedge(twin) {
                    VirtualVertex::Vertex(mesh.dest(mesh.rotated_cw(he)))
                } else {
                    VirtualVertex::Edge(mesh.edge_of(mesh.prev(twin)))
                }
            }
            VirtualVertex::Edge(e) => VirtualVertex::Vertex(mesh.origin(self.facing(mesh, e))),
        };
        Self::new(self.from, to)
    }

    /// All ports around `v` in counter-clockwise order.
    pub fn ring(mesh: &HalfEdgeMesh, v: VertexId) -> Vec<VirtualPort> {
        let start = mesh.vertex(v).halfedge;
        let mut ring = Vec::new();
        if !start.is_valid() {
            return ring;
        }

        let mut he = start;
        loop {
            ring.push(Self::new(v, VirtualVertex::Vertex(mesh.dest(he))));
            if !mesh.is_boundary_halfedge(he) {
                ring.push(Self::new(v, VirtualVertex::Edge(mesh.edge_of(mesh.next(he)))));
            }
            he = mesh.rotated_ccw(he);
            if he == start {
                break;
            }
        }
        ring
    }

    fn halfedge_to(self, mesh: &HalfEdgeMesh, w: VertexId) -> HalfEdgeId {
        mesh.halfedge_from_to(self.from, w)
            .unwrap_or_else(|| panic!("port {:?} does not point to a neighbour", self))
    }

    /// The half-edge of `e` whose face also contains `from`.
    fn facing(self, mesh: &HalfEdgeMesh, e: EdgeId) -> HalfEdgeId {
        let a = mesh.edge_halfedge(e);
        [a, mesh.twin(a)]
            .into_iter()
            .find(|&h| !mesh.is_boundary_halfedge(h) && mesh.dest(mesh.next(h)) == self.from)
            .unwrap_or_else(|| panic!("port {:?} does not point to an opposite edge", self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;

    /// 3x3 vertex grid, vertex 4 in the centre.
    fn grid() -> HalfEdgeMesh {
        let mut vertices = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        let mut faces = Vec::new();
        for j in 0..2 {
            for i in 0..2 {
                let v00 = j * 3 + i;
                faces.push([v00, v00 + 1, v00 + 4]);
                faces.push([v00, v00 + 4, v00 + 3]);
            }
        }
        build_from_triangles(&vertices, &faces).unwrap()
    }

    #[test]
    fn test_ring_of_interior_vertex() {
        let mesh = grid();
        let centre = VertexId::new(4);
        let ring = VirtualPort::ring(&mesh, centre);

        // Six neighbours and six opposite edges, alternating.
        assert_eq!(ring.len(), 12);
        for (i, port) in ring.iter().enumerate() {
            assert_eq!(port.to.is_real_vertex(), i % 2 == 0);
            let next = ring[(i + 1) % ring.len()];
            assert_eq!(port.rotated_ccw(&mesh), next);
            assert_eq!(next.rotated_cw(&mesh), *port);
        }
    }

    #[test]
    fn test_ring_of_corner_vertex_wraps() {
        let mesh = grid();
        let corner = VertexId::new(0);
        let ring = VirtualPort::ring(&mesh, corner);

        // Neighbours 1, 4, 3 and the two opposite edges (1,4) and (4,3).
        assert_eq!(ring.len(), 5);
        let first = ring[0];
        let mut port = first;
        for _ in 0..ring.len() {
            port = port.rotated_ccw(&mesh);
        }
        assert_eq!(port, first);
    }

    #[test]
    fn test_segment_elements() {
        let mesh = grid();
        let v0 = VirtualVertex::Vertex(VertexId::new(0));
        let v4 = VirtualVertex::Vertex(VertexId::new(4));
        let diagonal = match segment_element(&mesh, v0, v4) {
            MeshElement::Edge(e) => e,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(mesh.edge_vertices(diagonal), (VertexId::new(4), VertexId::new(0)));

        let opposite = mesh.edge_of(mesh.halfedge_from_to(VertexId::new(1), VertexId::new(4)).unwrap());
        assert_eq!(
            segment_element(&mesh, v0, VirtualVertex::Edge(opposite)),
            MeshElement::Face(FaceId::new(0))
        );
    }

    #[test]
    #[should_panic(expected = "not inside a face")]
    fn test_segment_between_distant_vertices_panics() {
        let mesh = grid();
        segment_element(
            &mesh,
            VirtualVertex::Vertex(VertexId::new(0)),
            VirtualVertex::Vertex(VertexId::new(8)),
        );
    }

    #[test]
    fn test_path_length_uses_edge_midpoints() {
        let mesh = grid();
        let e = mesh.edge_of(mesh.halfedge_from_to(VertexId::new(1), VertexId::new(4)).unwrap());
        let path = vec![
            VirtualVertex::Vertex(VertexId::new(0)),
            VirtualVertex::Edge(e),
        ];
        let expected = (1.0_f64 + 0.25).sqrt();
        assert!((path_length(&mesh, &path) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_path_elements_skip_endpoints() {
        let mesh = grid();
        let path = vec![
            VirtualVertex::Vertex(VertexId::new(0)),
            VirtualVertex::Vertex(VertexId::new(1)),
            VirtualVertex::Vertex(VertexId::new(2)),
        ];
        let elements = path_elements(&mesh, &path);
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0], MeshElement::Vertex(VertexId::new(1)));
        assert!(!elements.contains(&MeshElement::Vertex(VertexId::new(0))));
    }
}
