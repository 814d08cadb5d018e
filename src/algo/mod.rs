//! Embedding algorithms.
//!
//! - **Branch and bound**: best-first search over forced insertions with an
//!   optimality gap ([`branch_and_bound`])
//! - **Strategies**: single-pass insertion orders driven by [`embed_with`]
//!   (natural order, greedy shortest-first, random conflicting)
//!
//! [`embed`] selects one of them through the [`Algorithm`] enum.

pub mod branch_and_bound;
pub mod progress;
pub mod strategy;

pub use branch_and_bound::{
    branch_and_bound, branch_and_bound_with_progress, BranchAndBoundSettings, SearchOutcome,
    SolutionStatus,
};
pub use progress::{Progress, SearchStats};
pub use strategy::{embed_with, InsertionStrategy, NaturalOrder, RandomConflicting, ShortestFirst};

use crate::embedding::Embedding;
use crate::error::Result;

/// An embedding algorithm.
#[derive(Debug, Clone)]
pub enum Algorithm {
    /// Commit the shortest candidate path each round.
    Greedy,
    /// Force a random conflicting edge each round.
    Stochastic {
        /// RNG seed.
        seed: u64,
    },
    /// Search for a near-optimal embedding.
    BranchAndBound(BranchAndBoundSettings),
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::BranchAndBound(BranchAndBoundSettings::default())
    }
}

/// Complete `em` with the given algorithm and return its total path length.
///
/// On failure `em` is left unchanged.
pub fn embed(em: &mut Embedding, algorithm: &Algorithm) -> Result<f64> {
    match algorithm {
        Algorithm::Greedy => embed_with(em, &mut ShortestFirst)?,
        Algorithm::Stochastic { seed } => {
            let mut strategy = RandomConflicting::new(*seed);
            embed_with(em, &mut strategy)?;
            log::info!(
                "{} potential leaves, {} decisions",
                strategy.potential_leaves(),
                strategy.decisions()
            );
        }
        Algorithm::BranchAndBound(settings) => {
            branch_and_bound(em, settings)?;
        }
    }
    Ok(em.total_embedded_path_length())
}
