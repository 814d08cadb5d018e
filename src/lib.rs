//! # Layout Embedding
//!
//! Embed a coarse *layout* mesh onto a fine triangle *target* mesh as a
//! network of crossing-free paths.
//!
//! Every layout vertex is pinned to a target vertex. Every layout edge
//! becomes a path on the target surface between the two pinned vertices,
//! running along target edges and through target faces via edge midpoints.
//! No two paths share a target element except their endpoints, and the
//! cyclic order of paths around each pinned vertex matches the layout.
//!
//! ## Features
//!
//! - **Half-edge meshes**: O(1) adjacency queries with type-safe indices
//! - **Virtual paths**: shortest path tracing through target vertices and
//!   edge points, restricted to the correct angular sector at each endpoint
//! - **Conflict detection**: finds which candidate paths would cross or
//!   violate the cyclic order
//! - **Branch and bound**: best-first search for a near-optimal embedding
//!   with an optimality gap and an optional time limit
//! - **Insertion strategies**: greedy and randomized single-pass embedding
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use layout_embedding::prelude::*;
//! use nalgebra::Point3;
//!
//! // Target: a 5x5 vertex grid in the plane.
//! let mut vertices = Vec::new();
//! for j in 0..5 {
//!     for i in 0..5 {
//!         vertices.push(Point3::new(i as f64, j as f64, 0.0));
//!     }
//! }
//! let mut faces = Vec::new();
//! for j in 0..4 {
//!     for i in 0..4 {
//!         let v = j * 5 + i;
//!         faces.push([v, v + 1, v + 6]);
//!         faces.push([v, v + 6, v + 5]);
//!     }
//! }
//! let target: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! // Layout: one quad pinned to the grid corners.
//! let corners = [vertices[0], vertices[4], vertices[24], vertices[20]];
//! let layout: HalfEdgeMesh = build_from_quads(&corners, &[[0, 1, 2, 3]]).unwrap();
//! let matching: [VertexId; 4] = [0, 4, 24, 20].map(VertexId::new);
//!
//! let mut em = Embedding::new(Arc::new(layout), Arc::new(target), &matching);
//! let cost = embed(&mut em, &Algorithm::default()).unwrap();
//! assert!(em.is_complete());
//! assert!((cost - 16.0).abs() < 1e-9);
//! ```
//!
//! ## Searching with Settings
//!
//! ```
//! use std::time::Duration;
//! use layout_embedding::prelude::*;
//!
//! let settings = BranchAndBoundSettings::default()
//!     .with_time_limit(Duration::from_secs(10))
//!     .with_max_gap(0.0);
//! let algorithm = Algorithm::BranchAndBound(settings);
//! # let _ = algorithm;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod embedding;
pub mod error;
pub mod mesh;

pub use error::{EmbeddingError, Result};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use layout_embedding::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::{
        branch_and_bound, embed, embed_with, Algorithm, BranchAndBoundSettings, InsertionStrategy,
        SearchOutcome, SolutionStatus,
    };
    pub use crate::embedding::{
        Embedding, EmbeddingState, MeshElement, VirtualPath, VirtualPathConflictSentinel,
        VirtualPort, VirtualVertex,
    };
    pub use crate::error::{EmbeddingError, Result};
    pub use crate::mesh::{
        build_from_polygons, build_from_quads, build_from_triangles, EdgeId, FaceId, HalfEdgeId,
        HalfEdgeMesh, MeshIndex, VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_triangle_layout_on_tetrahedron() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        let target: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
        assert!(target.is_valid());

        // A single triangle of the tetrahedron, seen as a layout.
        let layout: HalfEdgeMesh =
            build_from_triangles(&vertices[..3], &[[0, 1, 2]]).unwrap();
        let matching: [VertexId; 3] = [0, 1, 2].map(VertexId::new);
        let mut em = Embedding::new(Arc::new(layout), Arc::new(target), &matching);

        let cost = embed(&mut em, &Algorithm::Greedy).unwrap();
        assert!(em.is_complete());
        assert_eq!(em.num_embedded_edges(), 3);
        for l_e in em.layout_mesh().edge_ids() {
            assert_eq!(em.embedded_path(l_e).unwrap().len(), 2);
        }
        let perimeter = 1.0 + 2.0 * 1.25_f64.sqrt();
        assert!((cost - perimeter).abs() < 1e-9);
    }
}
