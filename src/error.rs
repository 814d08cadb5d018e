//! Error types for layout embedding.
//!
//! Only data-dependent failures are reported through [`EmbeddingError`].
//! Broken invariants of the embedding machinery itself (double embedding of
//! a layout edge, malformed path endpoints, a degenerate matching) panic.

use std::time::Duration;

use thiserror::Error;

use crate::mesh::EdgeId;

/// Result type alias using [`EmbeddingError`].
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while building meshes or computing an embedding.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has fewer than three or repeated vertex indices.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// The mesh has non-manifold topology.
    #[error("mesh has non-manifold topology: {details}")]
    NonManifold {
        /// Description of the non-manifold condition.
        details: String,
    },

    /// A directed edge is used by more than one face.
    #[error("edge ({v0}, {v1}) has more than two incident faces or inconsistent orientation")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
    },

    /// No path exists for a layout edge while replaying a solution.
    #[error("no path for layout edge {edge:?}: its matching vertices are disconnected")]
    PathNotFound {
        /// The layout edge.
        edge: EdgeId,
    },

    /// The search finished without finding any crossing-free embedding.
    #[error("no feasible embedding found after exploring {explored} search nodes")]
    NoFeasibleEmbedding {
        /// Number of search nodes that were evaluated.
        explored: usize,
    },

    /// The time limit stopped the search before any feasible embedding was found.
    #[error("time limit of {limit:?} exceeded before a feasible embedding was found")]
    TimeLimitExceeded {
        /// The configured limit.
        limit: Duration,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl EmbeddingError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        EmbeddingError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}
