//! Branch-and-bound search for a crossing-free, cost-minimal embedding.
//!
//! The search runs best-first over insertion sequences. A search node is an
//! ordered list of layout edges whose shortest paths are committed first;
//! every other layout edge gets its current shortest path as a candidate.
//! If the candidates do not conflict, the node is a complete embedding. If
//! they do, one child per conflicting edge forces that edge next.
//!
//! Node lower bounds are the committed cost plus the candidate cost of the
//! remaining edges. The search stops when the best lower bound in the queue
//! is within `max_gap` of the best complete embedding.
//!
//! All nodes are evaluated on a single working [`EmbeddingState`]: a node is
//! rebuilt by rolling back to the root and replaying its insertions, and a
//! child is probed by committing one more edge and rolling it back.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use layout_embedding::prelude::*;
//! use layout_embedding::algo::branch_and_bound::{branch_and_bound, BranchAndBoundSettings};
//! use nalgebra::Point3;
//!
//! let mut vertices = Vec::new();
//! for j in 0..4 {
//!     for i in 0..4 {
//!         vertices.push(Point3::new(i as f64, j as f64, 0.0));
//!     }
//! }
//! let mut faces = Vec::new();
//! for j in 0..3 {
//!     for i in 0..3 {
//!         let v = j * 4 + i;
//!         faces.push([v, v + 1, v + 5]);
//!         faces.push([v, v + 5, v + 4]);
//!     }
//! }
//! let target: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! let corners = [vertices[0], vertices[3], vertices[15], vertices[12]];
//! let layout: HalfEdgeMesh = build_from_quads(&corners, &[[0, 1, 2, 3]]).unwrap();
//! let matching: [VertexId; 4] = [0, 3, 15, 12].map(VertexId::new);
//!
//! let mut em = Embedding::new(Arc::new(layout), Arc::new(target), &matching);
//! let outcome = branch_and_bound(&mut em, &BranchAndBoundSettings::default()).unwrap();
//! assert!(em.is_complete());
//! assert!((outcome.cost - 12.0).abs() < 1e-9);
//! ```

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::{Duration, Instant};

use crate::embedding::{Embedding, EmbeddingState, UnionFind, VirtualPath};
use crate::error::{EmbeddingError, Result};
use crate::mesh::{EdgeId, HalfEdgeMesh};

use super::progress::{Progress, SearchStats};

/// Settings for [`branch_and_bound`].
#[derive(Debug, Clone)]
pub struct BranchAndBoundSettings {
    /// Wall-clock limit, checked before each node is evaluated.
    pub time_limit: Option<Duration>,

    /// Skip children whose committed paths equal those of a node already
    /// queued or evaluated.
    pub use_hashing: bool,

    /// Relative optimality gap in `[0, 1)` at which the search stops.
    /// Zero searches for the true optimum.
    pub max_gap: f64,

    /// Expand conflicting edges whose endpoints are already connected by
    /// forced insertions when no other conflicting edge is left. Without
    /// this such nodes are dead ends.
    pub expand_blocked_when_stuck: bool,

    /// Whether to trace candidate paths in parallel (default: true).
    pub parallel: bool,
}

impl Default for BranchAndBoundSettings {
    fn default() -> Self {
        Self {
            time_limit: None,
            use_hashing: true,
            max_gap: 0.03,
            expand_blocked_when_stuck: true,
            parallel: true,
        }
    }
}

impl BranchAndBoundSettings {
    /// Stop the search after `limit`.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Set whether duplicate nodes are skipped.
    pub fn with_hashing(mut self, use_hashing: bool) -> Self {
        self.use_hashing = use_hashing;
        self
    }

    /// Set the relative optimality gap.
    pub fn with_max_gap(mut self, max_gap: f64) -> Self {
        self.max_gap = max_gap;
        self
    }

    /// Set whether topologically blocked edges are expanded as a last resort.
    pub fn with_expand_blocked_when_stuck(mut self, expand: bool) -> Self {
        self.expand_blocked_when_stuck = expand;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create settings for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.max_gap.is_finite() && (0.0..1.0).contains(&self.max_gap)) {
            return Err(EmbeddingError::invalid_param(
                "max_gap",
                self.max_gap,
                "must be in [0, 1)",
            ));
        }
        Ok(())
    }
}

/// How a successful search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// No queued node can beat the returned embedding.
    Optimal,
    /// The returned embedding is within the configured gap of the optimum.
    WithinGap,
    /// The time limit stopped the search; the result may be far from optimal.
    TimeLimit,
}

/// Result of a successful [`branch_and_bound`] run.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// How the search ended.
    pub status: SolutionStatus,
    /// Total path length of the returned embedding.
    pub cost: f64,
    /// Best lower bound on the optimal cost when the search stopped.
    pub lower_bound: f64,
    /// Layout edges forced before the remaining edges were committed.
    pub insertions: Vec<EdgeId>,
    /// Number of search nodes evaluated.
    pub iterations: usize,
}

impl SearchOutcome {
    /// Relative gap between `lower_bound` and `cost`.
    pub fn gap(&self) -> f64 {
        relative_gap(self.lower_bound, self.cost)
    }
}

/// Relative gap between a lower and an upper bound.
///
/// `1.0` while no upper bound is known.
pub fn relative_gap(lower_bound: f64, upper_bound: f64) -> f64 {
    if upper_bound.is_infinite() {
        1.0
    } else if upper_bound <= 0.0 {
        0.0
    } else {
        1.0 - lower_bound / upper_bound
    }
}

/// Queue entry, ordered by ascending lower bound, then by insertion time.
#[derive(Debug, Clone)]
struct Candidate {
    lower_bound: f64,
    order: usize,
    insertions: Vec<EdgeId>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        other
            .lower_bound
            .total_cmp(&self.lower_bound)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Split conflicting edges into those whose endpoints are already joined by
/// `insertions` (blocked) and the rest (expandable).
fn split_blocked(
    layout: &HalfEdgeMesh,
    insertions: &[EdgeId],
    conflicting: impl Iterator<Item = EdgeId>,
) -> (Vec<EdgeId>, Vec<EdgeId>) {
    let mut l_v_components = UnionFind::new(layout.num_vertices());
    for &l_e in insertions {
        let (a, b) = layout.edge_vertices(l_e);
        l_v_components.merge(a.index(), b.index());
    }
    conflicting.partition(|&l_e| {
        let (a, b) = layout.edge_vertices(l_e);
        l_v_components.equivalent(a.index(), b.index())
    })
}

/// The best complete embedding found so far.
#[derive(Debug)]
struct Incumbent {
    insertions: Vec<EdgeId>,
    /// Path per layout edge along its A half-edge; `None` for edges that
    /// were embedded before the search started.
    paths: Vec<Option<VirtualPath>>,
}

/// Complete `em` with a crossing-free embedding of (near) minimal total length.
///
/// See [`branch_and_bound_with_progress`].
pub fn branch_and_bound(em: &mut Embedding, settings: &BranchAndBoundSettings) -> Result<SearchOutcome> {
    branch_and_bound_with_progress(em, settings, &Progress::none())
}

/// Complete `em` with a crossing-free embedding of (near) minimal total
/// length, reporting every evaluated node to `progress`.
///
/// Edges already embedded in `em` stay fixed. On failure `em` is left
/// unchanged.
///
/// # Errors
/// - [`EmbeddingError::InvalidParameter`] for a `max_gap` outside `[0, 1)`.
/// - [`EmbeddingError::NoFeasibleEmbedding`] if the search space is
///   exhausted without a complete embedding.
/// - [`EmbeddingError::TimeLimitExceeded`] if the time limit is hit before
///   any complete embedding is found.
pub fn branch_and_bound_with_progress(
    em: &mut Embedding,
    settings: &BranchAndBoundSettings,
    progress: &Progress,
) -> Result<SearchOutcome> {
    settings.validate()?;

    let start = Instant::now();
    let num_l_edges = em.layout_mesh().num_edges();

    let mut state = EmbeddingState::new(em.clone()).with_parallel_tracing(settings.parallel);
    let root = state.savepoint();

    let mut queue = BinaryHeap::new();
    let mut order = 0;
    queue.push(Candidate {
        lower_bound: 0.0,
        order,
        insertions: Vec::new(),
    });

    let mut seen: HashSet<u64> = HashSet::new();
    if settings.use_hashing {
        seen.insert(state.hash());
    }

    let mut upper_bound = f64::INFINITY;
    let mut best: Option<Incumbent> = None;
    let mut iterations = 0;

    let (status, lower_bound) = loop {
        if let Some(limit) = settings.time_limit {
            if start.elapsed() >= limit {
                log::warn!(
                    "branch and bound stopped by time limit of {:?} after {} nodes",
                    limit,
                    iterations
                );
                let lb = queue.peek().map_or(upper_bound, |c| c.lower_bound.min(upper_bound));
                break (SolutionStatus::TimeLimit, lb);
            }
        }

        let Some(c) = queue.pop() else {
            break (SolutionStatus::Optimal, upper_bound);
        };

        let gap = relative_gap(c.lower_bound, upper_bound);
        if gap <= settings.max_gap {
            // All remaining nodes have higher lower bounds.
            let status = if c.lower_bound >= upper_bound {
                SolutionStatus::Optimal
            } else {
                SolutionStatus::WithinGap
            };
            break (status, c.lower_bound.min(upper_bound));
        }

        iterations += 1;

        // Rebuild the node on the working state
        state.restore(root);
        state.extend_sequence(&c.insertions);
        if state.is_valid() {
            state.compute_candidate_paths();
        }
        if !state.is_valid() {
            log::warn!("node {:?} has a layout edge without any path", c.insertions);
            continue;
        }
        state.detect_candidate_path_conflicts();
        let cost_lower_bound = state.cost_lower_bound();

        // Conflicting edges whose endpoints are already connected by forced
        // insertions would only close a cycle.
        let (blocked, expandable) = split_blocked(
            state.embedding().layout_mesh(),
            &c.insertions,
            state.conflicting_edges().iter().copied(),
        );

        log::debug!(
            "|Embd|: {}    |Conf|: {}    |Blkd|: {}    |Ncnf|: {}    LB: {:.6}    UB: {:.6}    gap: {:.4}    |Q|: {}",
            state.embedded_edges().len(),
            expandable.len(),
            blocked.len(),
            state.non_conflicting_edges().len(),
            cost_lower_bound,
            upper_bound,
            gap,
            queue.len()
        );
        progress.report(&SearchStats {
            iteration: iterations,
            embedded: state.embedded_edges().len(),
            conflicting: state.conflicting_edges().len(),
            non_conflicting: state.non_conflicting_edges().len(),
            lower_bound: cost_lower_bound,
            upper_bound,
            gap,
            queue_len: queue.len(),
        });

        if state.conflicting_edges().is_empty() {
            if cost_lower_bound < upper_bound {
                upper_bound = cost_lower_bound;
                let paths = (0..num_l_edges)
                    .map(EdgeId::new)
                    .map(|l_e| {
                        if em.is_embedded(l_e) {
                            None
                        } else if let Some(path) = state.embedding().embedded_path(l_e) {
                            Some(path.to_vec())
                        } else {
                            state.candidate_path(l_e).map(|cp| cp.path.clone())
                        }
                    })
                    .collect();
                log::info!(
                    "new incumbent with cost {:.6} after {} nodes ({} forced insertions)",
                    upper_bound,
                    iterations,
                    c.insertions.len()
                );
                best = Some(Incumbent {
                    insertions: c.insertions.clone(),
                    paths,
                });
            }
            continue;
        }

        if cost_lower_bound >= upper_bound {
            continue;
        }

        let branch_on = if !expandable.is_empty() {
            expandable
        } else if settings.expand_blocked_when_stuck {
            blocked
        } else {
            log::warn!("node {:?} only has topologically blocked conflicts", c.insertions);
            continue;
        };

        for l_e in branch_on {
            let sp = state.savepoint();
            state.extend(l_e);
            if state.is_valid() {
                state.compute_candidate_paths();
            }
            let child = state.is_valid().then(|| (state.cost_lower_bound(), state.hash()));
            state.restore(sp);

            let Some((child_lower_bound, hash)) = child else {
                continue;
            };
            if settings.use_hashing && !seen.insert(hash) {
                continue;
            }
            if relative_gap(child_lower_bound, upper_bound) > settings.max_gap {
                let mut insertions = c.insertions.clone();
                insertions.push(l_e);
                order += 1;
                queue.push(Candidate {
                    lower_bound: child_lower_bound,
                    order,
                    insertions,
                });
            }
        }
    };

    let Some(best) = best else {
        return Err(match (status, settings.time_limit) {
            (SolutionStatus::TimeLimit, Some(limit)) => EmbeddingError::TimeLimitExceeded { limit },
            _ => EmbeddingError::NoFeasibleEmbedding { explored: iterations },
        });
    };

    // Apply the winning paths: forced insertions first, then the rest.
    let layout_edges: Vec<EdgeId> = best
        .insertions
        .iter()
        .copied()
        .chain((0..num_l_edges).map(EdgeId::new).filter(|e| !best.insertions.contains(e)))
        .collect();
    for l_e in layout_edges {
        if let Some(path) = &best.paths[l_e.index()] {
            let l_he = em.layout_mesh().edge_halfedge(l_e);
            em.embed_path(l_he, path);
        }
    }

    log::info!(
        "branch and bound finished ({:?}): cost {:.6}, lower bound {:.6}, {} nodes in {:?}",
        status,
        upper_bound,
        lower_bound,
        iterations,
        start.elapsed()
    );

    Ok(SearchOutcome {
        status,
        cost: upper_bound,
        lower_bound,
        insertions: best.insertions,
        iterations,
    })
}
