//! Embedding of a layout mesh onto a target mesh.
//!
//! An [`Embedding`] pins every layout vertex to a target vertex (its
//! *matching vertex*) and stores, per layout edge, the committed virtual path
//! connecting the two matching vertices. Committed paths never share a
//! target element except their endpoints; every element a path occupies is
//! labelled with its layout edge and is blocked for all other paths.
//!
//! The target and layout meshes are shared through [`Arc`], so cloning an
//! embedding only copies the per-element labels. Search code that probes
//! many partial embeddings should prefer [`Embedding::mark`] and
//! [`Embedding::rollback`], which undo commits without copying anything.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use layout_embedding::prelude::*;
//! use nalgebra::Point3;
//!
//! // Target: a 3x3 vertex grid.
//! let mut vertices = Vec::new();
//! for j in 0..3 {
//!     for i in 0..3 {
//!         vertices.push(Point3::new(i as f64, j as f64, 0.0));
//!     }
//! }
//! let mut faces = Vec::new();
//! for j in 0..2 {
//!     for i in 0..2 {
//!         let v = j * 3 + i;
//!         faces.push([v, v + 1, v + 4]);
//!         faces.push([v, v + 4, v + 3]);
//!     }
//! }
//! let target: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! // Layout: a single quad pinned to the grid corners.
//! let corners = [vertices[0], vertices[2], vertices[8], vertices[6]];
//! let layout: HalfEdgeMesh = build_from_quads(&corners, &[[0, 1, 2, 3]]).unwrap();
//! let matching: [VertexId; 4] = [0, 2, 8, 6].map(VertexId::new);
//!
//! let mut em = Embedding::new(Arc::new(layout), Arc::new(target), &matching);
//! let l_he = em.layout_mesh().edge_halfedge(EdgeId::new(0));
//! let path = em.find_shortest_path(l_he).unwrap();
//! em.embed_path(l_he, &path);
//! assert!(em.is_embedded(EdgeId::new(0)));
//! assert!((em.total_embedded_path_length() - 2.0).abs() < 1e-12);
//! ```

mod conflict;
mod state;
mod trace;
mod union_find;
mod virtual_path;

use std::sync::Arc;

pub use conflict::{Conflict, VirtualPathConflictSentinel};
pub use state::{CandidatePath, EmbeddingState, HashValue, StateSavepoint};
pub use union_find::UnionFind;
pub use virtual_path::{
    path_elements, path_length, segment_element, MeshElement, VirtualPath, VirtualPort,
    VirtualVertex,
};

use crate::mesh::{EdgeId, HalfEdgeId, HalfEdgeMesh, VertexId};

/// A position in the commit journal, see [`Embedding::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct JournalMark(usize);

/// A (partial) embedding of a layout mesh onto a target mesh.
#[derive(Debug, Clone)]
pub struct Embedding {
    layout: Arc<HalfEdgeMesh>,
    target: Arc<HalfEdgeMesh>,

    /// Layout vertex -> target vertex.
    l_matching: Vec<VertexId>,
    /// Target vertex -> layout vertex.
    t_matching: Vec<Option<VertexId>>,

    /// Committed path per layout edge, oriented along the edge's A half-edge.
    paths: Vec<Option<VirtualPath>>,

    vertex_owner: Vec<Option<EdgeId>>,
    edge_owner: Vec<Option<EdgeId>>,
    face_owner: Vec<Option<EdgeId>>,

    /// Layout edges in commit order.
    journal: Vec<EdgeId>,
}

impl Embedding {
    /// Create an empty embedding.
    ///
    /// `matching[i]` is the target vertex that layout vertex `i` is pinned to.
    ///
    /// # Panics
    /// Panics if the matching does not cover every layout vertex, refers to a
    /// target vertex that does not exist, pins two layout vertices to the same
    /// target vertex, or if the target mesh is not a triangle mesh.
    pub fn new(layout: Arc<HalfEdgeMesh>, target: Arc<HalfEdgeMesh>, matching: &[VertexId]) -> Self {
        assert_eq!(
            matching.len(),
            layout.num_vertices(),
            "matching must assign a target vertex to every layout vertex"
        );
        assert!(target.is_triangle_mesh(), "target mesh must be a triangle mesh");

        let mut t_matching = vec![None; target.num_vertices()];
        for (i, &t_v) in matching.iter().enumerate() {
            assert!(
                t_v.index() < target.num_vertices(),
                "layout vertex {} is matched to nonexistent target vertex {:?}",
                i,
                t_v
            );
            if let Some(other) = t_matching[t_v.index()] {
                panic!(
                    "layout vertices {:?} and {:?} are both matched to target vertex {:?}",
                    other,
                    VertexId::<u32>::new(i),
                    t_v
                );
            }
            t_matching[t_v.index()] = Some(VertexId::new(i));
        }

        Self {
            paths: vec![None; layout.num_edges()],
            vertex_owner: vec![None; target.num_vertices()],
            edge_owner: vec![None; target.num_edges()],
            face_owner: vec![None; target.num_faces()],
            journal: Vec::new(),
            l_matching: matching.to_vec(),
            t_matching,
            layout,
            target,
        }
    }

    // ==================== Accessors ====================

    /// The layout mesh.
    #[inline]
    pub fn layout_mesh(&self) -> &HalfEdgeMesh {
        &self.layout
    }

    /// The target mesh.
    #[inline]
    pub fn target_mesh(&self) -> &HalfEdgeMesh {
        &self.target
    }

    /// The target vertex a layout vertex is pinned to.
    #[inline]
    pub fn matching_target_vertex(&self, l_v: VertexId) -> VertexId {
        self.l_matching[l_v.index()]
    }

    /// The layout vertex pinned to a target vertex, if any.
    #[inline]
    pub fn matching_layout_vertex(&self, t_v: VertexId) -> Option<VertexId> {
        self.t_matching[t_v.index()]
    }

    /// Check whether a layout edge has a committed path.
    #[inline]
    pub fn is_embedded(&self, l_e: EdgeId) -> bool {
        self.paths[l_e.index()].is_some()
    }

    /// Check whether the edge of a layout half-edge has a committed path.
    #[inline]
    pub fn is_halfedge_embedded(&self, l_he: HalfEdgeId) -> bool {
        self.is_embedded(self.layout.edge_of(l_he))
    }

    /// The committed path of a layout edge, oriented along its A half-edge.
    pub fn embedded_path(&self, l_e: EdgeId) -> Option<&[VirtualVertex]> {
        self.paths[l_e.index()].as_deref()
    }

    /// The committed path of a layout half-edge's edge, oriented from the
    /// half-edge's origin to its destination.
    pub fn embedded_path_from(&self, l_he: HalfEdgeId) -> Option<VirtualPath> {
        let path = self.embedded_path(self.layout.edge_of(l_he))?;
        let mut path = path.to_vec();
        if !self.layout.is_halfedge_a(l_he) {
            path.reverse();
        }
        Some(path)
    }

    /// The port through which the committed path of `l_he` leaves the
    /// matching vertex of `origin(l_he)`.
    pub fn embedded_port(&self, l_he: HalfEdgeId) -> Option<VirtualPort> {
        let l_e = self.layout.edge_of(l_he);
        let path = self.paths[l_e.index()].as_ref()?;
        Some(if self.layout.is_halfedge_a(l_he) {
            VirtualPort::at_start(path)
        } else {
            VirtualPort::at_end(path)
        })
    }

    /// The layout edge whose committed path occupies a target element.
    pub fn owner(&self, element: MeshElement) -> Option<EdgeId> {
        match element {
            MeshElement::Vertex(v) => self.vertex_owner[v.index()],
            MeshElement::Edge(e) => self.edge_owner[e.index()],
            MeshElement::Face(f) => self.face_owner[f.index()],
        }
    }

    /// Check whether a target element is occupied by a committed path.
    #[inline]
    pub fn is_blocked(&self, element: MeshElement) -> bool {
        self.owner(element).is_some()
    }

    /// Check whether a path may pass through a virtual vertex without ending there.
    pub(crate) fn is_passable(&self, vv: VirtualVertex) -> bool {
        match vv {
            VirtualVertex::Vertex(v) => {
                self.vertex_owner[v.index()].is_none() && self.t_matching[v.index()].is_none()
            }
            VirtualVertex::Edge(e) => self.edge_owner[e.index()].is_none(),
        }
    }

    /// Length of a virtual path on the target mesh.
    #[inline]
    pub fn path_length(&self, path: &[VirtualVertex]) -> f64 {
        path_length(&self.target, path)
    }

    /// Total length of all committed paths.
    pub fn total_embedded_path_length(&self) -> f64 {
        self.paths
            .iter()
            .flatten()
            .map(|p| self.path_length(p))
            .sum()
    }

    /// Number of layout edges with a committed path.
    #[inline]
    pub fn num_embedded_edges(&self) -> usize {
        self.journal.len()
    }

    /// Check whether every layout edge has a committed path.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.journal.len() == self.layout.num_edges()
    }

    /// Layout edges in the order their paths were committed.
    #[inline]
    pub fn commit_order(&self) -> &[EdgeId] {
        &self.journal
    }

    // ==================== Commit / Undo ====================

    /// Commit `path` as the embedding of the edge of `l_he`.
    ///
    /// `path` runs from the matching vertex of `origin(l_he)` to the matching
    /// vertex of `dest(l_he)`.
    ///
    /// # Panics
    /// Panics if the edge is already embedded, the path has fewer than two
    /// vertices, its endpoints do not match the layout half-edge, or any
    /// element it covers is occupied by another layout edge.
    pub fn embed_path(&mut self, l_he: HalfEdgeId, path: &[VirtualVertex]) {
        let l_e = self.layout.edge_of(l_he);
        assert!(!self.is_embedded(l_e), "layout edge {:?} is already embedded", l_e);
        assert!(path.len() >= 2, "a virtual path needs at least two vertices");

        let source = self.matching_target_vertex(self.layout.origin(l_he));
        let sink = self.matching_target_vertex(self.layout.dest(l_he));
        assert_eq!(
            path[0],
            VirtualVertex::Vertex(source),
            "path for {:?} does not start at its matching vertex",
            l_e
        );
        assert_eq!(
            path[path.len() - 1],
            VirtualVertex::Vertex(sink),
            "path for {:?} does not end at its matching vertex",
            l_e
        );

        for element in path_elements(&self.target, path) {
            let slot = match element {
                MeshElement::Vertex(v) => &mut self.vertex_owner[v.index()],
                MeshElement::Edge(e) => &mut self.edge_owner[e.index()],
                MeshElement::Face(f) => &mut self.face_owner[f.index()],
            };
            match *slot {
                Some(other) if other != l_e => panic!(
                    "target element {:?} is already used by layout edge {:?}",
                    element, other
                ),
                _ => *slot = Some(l_e),
            }
        }

        let mut stored = path.to_vec();
        if !self.layout.is_halfedge_a(l_he) {
            stored.reverse();
        }
        self.paths[l_e.index()] = Some(stored);
        self.journal.push(l_e);
    }

    /// The current journal position.
    #[inline]
    pub fn mark(&self) -> JournalMark {
        JournalMark(self.journal.len())
    }

    /// Undo every commit made after `mark`.
    pub fn rollback(&mut self, mark: JournalMark) {
        assert!(mark.0 <= self.journal.len(), "journal mark is ahead of the journal");
        while self.journal.len() > mark.0 {
            if let Some(l_e) = self.journal.pop() {
                self.unembed(l_e);
            }
        }
    }

    fn unembed(&mut self, l_e: EdgeId) {
        let Some(path) = self.paths[l_e.index()].take() else {
            return;
        };
        for element in path_elements(&self.target, &path) {
            let slot = match element {
                MeshElement::Vertex(v) => &mut self.vertex_owner[v.index()],
                MeshElement::Edge(e) => &mut self.edge_owner[e.index()],
                MeshElement::Face(f) => &mut self.face_owner[f.index()],
            };
            debug_assert!(slot.is_none() || *slot == Some(l_e));
            *slot = None;
        }
    }
}

#[cfg(test)]
pub(crate) mod test_meshes {
    //! Small meshes shared by the embedding tests.

    use std::sync::Arc;

    use nalgebra::Point3;

    use crate::mesh::{build_from_polygons, build_from_triangles, HalfEdgeMesh, VertexId};

    use super::Embedding;

    /// An `n x n` quad grid on `[0, n]^2`, each quad split along its main diagonal.
    pub fn grid(n: usize) -> HalfEdgeMesh {
        let mut vertices = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        let mut faces = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                let v10 = v00 + 1;
                let v01 = v00 + n + 1;
                let v11 = v01 + 1;
                faces.push([v00, v10, v11]);
                faces.push([v00, v11, v01]);
            }
        }
        build_from_triangles(&vertices, &faces).unwrap()
    }

    /// Index of grid vertex `(i, j)`.
    pub fn grid_vertex(n: usize, i: usize, j: usize) -> VertexId {
        VertexId::new(j * (n + 1) + i)
    }

    /// A layout with the given faces; positions are irrelevant for embedding.
    pub fn layout(num_vertices: usize, faces: &[Vec<usize>]) -> HalfEdgeMesh {
        let vertices = vec![Point3::origin(); num_vertices];
        build_from_polygons(&vertices, faces).unwrap()
    }

    /// A single quad layout pinned to the four corners of `grid(n)`.
    pub fn quad_on_grid(n: usize) -> Embedding {
        let layout = layout(4, &[vec![0, 1, 2, 3]]);
        let matching = [
            grid_vertex(n, 0, 0),
            grid_vertex(n, n, 0),
            grid_vertex(n, n, n),
            grid_vertex(n, 0, n),
        ];
        Embedding::new(Arc::new(layout), Arc::new(grid(n)), &matching)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::test_meshes::*;
    use super::*;

    #[test]
    fn test_new_embedding_is_empty() {
        let em = quad_on_grid(3);
        assert_eq!(em.num_embedded_edges(), 0);
        assert!(!em.is_complete());
        assert_eq!(em.total_embedded_path_length(), 0.0);
        assert_eq!(em.matching_layout_vertex(grid_vertex(3, 3, 3)), Some(VertexId::new(2)));
        assert_eq!(em.matching_layout_vertex(grid_vertex(3, 1, 1)), None);
    }

    #[test]
    #[should_panic(expected = "are both matched to target vertex")]
    fn test_duplicate_matching_panics() {
        let layout = layout(4, &[vec![0, 1, 2, 3]]);
        let v = grid_vertex(2, 0, 0);
        let matching = [v, grid_vertex(2, 2, 0), grid_vertex(2, 2, 2), v];
        Embedding::new(Arc::new(layout), Arc::new(grid(2)), &matching);
    }

    #[test]
    fn test_embed_labels_and_rollback() {
        let mut em = quad_on_grid(2);
        let mark = em.mark();

        let l_he = em.layout_mesh().edge_halfedge(EdgeId::new(0));
        let path = em.find_shortest_path(l_he).unwrap();
        em.embed_path(l_he, &path);

        let middle = VirtualVertex::Vertex(grid_vertex(2, 1, 0));
        assert_eq!(path[1], middle);
        assert_eq!(em.owner(MeshElement::Vertex(grid_vertex(2, 1, 0))), Some(EdgeId::new(0)));
        assert!(!em.is_passable(middle));
        assert_eq!(em.embedded_port(l_he).map(|p| p.to), Some(middle));

        em.rollback(mark);
        assert!(!em.is_embedded(EdgeId::new(0)));
        assert!(em.is_passable(middle));
        assert!(em.target_mesh().edge_ids().all(|e| !em.is_blocked(MeshElement::Edge(e))));
    }

    #[test]
    fn test_reverse_halfedge_stores_path_along_a() {
        let mut em = quad_on_grid(2);
        let a = em.layout_mesh().edge_halfedge(EdgeId::new(1));
        let b = em.layout_mesh().twin(a);

        let path = em.find_shortest_path(b).unwrap();
        em.embed_path(b, &path);

        let stored = em.embedded_path(EdgeId::new(1)).unwrap();
        assert_eq!(stored.first(), path.last());
        assert_eq!(em.embedded_path_from(b).unwrap(), path);
    }

    #[test]
    #[should_panic(expected = "already embedded")]
    fn test_double_embedding_panics() {
        let mut em = quad_on_grid(2);
        let l_he = em.layout_mesh().edge_halfedge(EdgeId::new(0));
        let path = em.find_shortest_path(l_he).unwrap();
        em.embed_path(l_he, &path);
        em.embed_path(l_he, &path);
    }

    #[test]
    #[should_panic(expected = "does not start at its matching vertex")]
    fn test_wrong_endpoints_panic() {
        let mut em = quad_on_grid(2);
        let l_he = em.layout_mesh().edge_halfedge(EdgeId::new(0));
        let mut path = em.find_shortest_path(l_he).unwrap();
        path.reverse();
        em.embed_path(l_he, &path);
    }
}
