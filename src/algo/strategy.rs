//! Insertion strategies: embed one layout edge at a time in a chosen order.
//!
//! A strategy only decides *which* layout edge to commit next; the driver
//! [`embed_with`] traces candidates, detects conflicts and commits the
//! chosen edge's current shortest path.
//!
//! - [`NaturalOrder`]: layout edges by index
//! - [`ShortestFirst`]: the globally shortest candidate each round (greedy)
//! - [`RandomConflicting`]: a uniformly random conflicting edge each round,
//!   then the remaining conflict-free candidates

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::embedding::{Embedding, EmbeddingState};
use crate::error::{EmbeddingError, Result};
use crate::mesh::EdgeId;

/// Chooses the next layout edge to commit.
pub trait InsertionStrategy {
    /// The next edge to commit, given a state whose candidates and conflicts
    /// are up to date. Returning `None` stops the driver.
    fn next_edge(&mut self, state: &EmbeddingState) -> Option<EdgeId>;
}

/// Commit layout edges in index order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl InsertionStrategy for NaturalOrder {
    fn next_edge(&mut self, state: &EmbeddingState) -> Option<EdgeId> {
        let em = state.embedding();
        em.layout_mesh().edge_ids().find(|&l_e| !em.is_embedded(l_e))
    }
}

/// Commit the shortest candidate path first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestFirst;

impl InsertionStrategy for ShortestFirst {
    fn next_edge(&mut self, state: &EmbeddingState) -> Option<EdgeId> {
        state
            .embedding()
            .layout_mesh()
            .edge_ids()
            .filter_map(|l_e| state.candidate_path(l_e).map(|cp| (l_e, cp.cost)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(l_e, _)| l_e)
    }
}

/// Force a random conflicting edge per round until no conflicts remain.
///
/// Also counts the decisions taken and the number of leaves of the search
/// tree the random walk went through (the product of the conflicting set
/// sizes along the way).
#[derive(Debug, Clone)]
pub struct RandomConflicting {
    rng: StdRng,
    decisions: usize,
    potential_leaves: f64,
}

impl RandomConflicting {
    /// Create a strategy with a seeded RNG.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            decisions: 0,
            potential_leaves: 1.0,
        }
    }

    /// Number of random choices made so far.
    pub fn decisions(&self) -> usize {
        self.decisions
    }

    /// Product of the conflicting set sizes of all random choices.
    pub fn potential_leaves(&self) -> f64 {
        self.potential_leaves
    }
}

impl InsertionStrategy for RandomConflicting {
    fn next_edge(&mut self, state: &EmbeddingState) -> Option<EdgeId> {
        let conflicting = state.conflicting_edges();
        if conflicting.is_empty() {
            return state.non_conflicting_edges().iter().next().copied();
        }

        self.decisions += 1;
        self.potential_leaves *= conflicting.len() as f64;
        let i = self.rng.gen_range(0..conflicting.len());
        let l_e = conflicting.iter().nth(i).copied();
        log::debug!("forcing conflicting layout edge {:?} ({} candidates)", l_e, conflicting.len());
        l_e
    }
}

/// Complete `em` by repeatedly committing the edge chosen by `strategy`.
///
/// Each round traces a candidate for every unembedded edge, classifies the
/// candidates and commits the chosen edge's candidate path. On failure `em`
/// is left unchanged.
///
/// # Errors
/// [`EmbeddingError::PathNotFound`] if some unembedded layout edge has no
/// admissible path left.
pub fn embed_with<S: InsertionStrategy + ?Sized>(em: &mut Embedding, strategy: &mut S) -> Result<()> {
    let mut state = EmbeddingState::new(em.clone());

    while !state.embedding().is_complete() {
        state.compute_candidate_paths();
        if !state.is_valid() {
            let current = state.embedding();
            let edge = current
                .layout_mesh()
                .edge_ids()
                .find(|&l_e| !current.is_embedded(l_e) && state.candidate_path(l_e).is_none())
                .unwrap_or_default();
            return Err(EmbeddingError::PathNotFound { edge });
        }
        state.detect_candidate_path_conflicts();
        log::trace!(
            "embedded: {}    conflicting: {}    non-conflicting: {}",
            state.embedded_edges().len(),
            state.conflicting_edges().len(),
            state.non_conflicting_edges().len()
        );

        let Some(l_e) = strategy.next_edge(&state) else {
            break;
        };
        let path = match state.candidate_path(l_e) {
            Some(candidate) => candidate.path.clone(),
            None => panic!("strategy chose layout edge {:?} without a candidate", l_e),
        };
        state.extend_with_path(l_e, &path);
    }

    *em = state.into_embedding();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nalgebra::Point3;

    use super::*;
    use crate::embedding::test_meshes::*;
    use crate::mesh::{build_from_triangles, HalfEdgeMesh, VertexId};

    #[test]
    fn test_natural_order_completes_square() {
        let mut em = quad_on_grid(3);
        embed_with(&mut em, &mut NaturalOrder).unwrap();
        assert!(em.is_complete());
        let expected: [EdgeId; 4] = [0, 1, 2, 3].map(EdgeId::new);
        assert_eq!(em.commit_order(), &expected);
        assert!((em.total_embedded_path_length() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_shortest_first_picks_shortest_candidate() {
        // A rectangle: the short sides come first.
        let layout = layout(4, &[vec![0, 1, 2, 3]]);
        let matching: [VertexId; 4] = [0, 1, 21, 20].map(VertexId::new);
        let mut em = Embedding::new(Arc::new(layout), Arc::new(grid(4)), &matching);

        embed_with(&mut em, &mut ShortestFirst).unwrap();
        assert!(em.is_complete());
        let order = em.commit_order();
        assert!(order[..2].contains(&EdgeId::new(0)));
        assert!(order[..2].contains(&EdgeId::new(2)));
    }

    #[test]
    fn test_random_conflicting_is_reproducible() {
        let mut a = quad_on_grid(3);
        let mut b = quad_on_grid(3);
        let mut sa = RandomConflicting::new(7);
        let mut sb = RandomConflicting::new(7);
        embed_with(&mut a, &mut sa).unwrap();
        embed_with(&mut b, &mut sb).unwrap();
        assert_eq!(a.commit_order(), b.commit_order());
        assert_eq!(sa.decisions(), 0);
        assert_eq!(sa.potential_leaves(), 1.0);
    }

    #[test]
    fn test_failure_leaves_embedding_untouched() {
        let vertices: Vec<_> = (0..6)
            .map(|i| Point3::new((i % 3) as f64, (i / 3) as f64 * 5.0, 0.0))
            .collect();
        let target: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2], [3, 4, 5]]).unwrap();
        let layout = layout(3, &[vec![0, 1, 2]]);
        let matching: [VertexId; 3] = [0, 1, 3].map(VertexId::new);
        let mut em = Embedding::new(Arc::new(layout), Arc::new(target), &matching);

        let result = embed_with(&mut em, &mut NaturalOrder);
        assert!(matches!(
            result,
            Err(EmbeddingError::PathNotFound { edge }) if edge == EdgeId::new(1)
        ));
        assert_eq!(em.num_embedded_edges(), 0);
    }
}
