//! Search-node state: an embedding plus its candidate paths.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use rayon::prelude::*;

use crate::mesh::EdgeId;

use super::{
    Embedding, JournalMark, UnionFind, VirtualPath, VirtualPathConflictSentinel, VirtualVertex,
};

/// Content hash of the committed paths of a state.
pub type HashValue = u64;

/// The shortest admissible path of an unembedded layout edge.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePath {
    /// Path along the layout edge's A half-edge.
    pub path: VirtualPath,
    /// Length of `path`.
    pub cost: f64,
}

/// Bookkeeping needed to return an [`EmbeddingState`] to an earlier point.
#[derive(Debug, Clone, Copy)]
pub struct StateSavepoint {
    mark: JournalMark,
    num_embedded: usize,
    embedded_cost: f64,
    valid: bool,
}

/// A partial embedding together with candidate paths for the remaining
/// layout edges, their conflicts and the resulting cost bound.
///
/// Candidate data is only meaningful right after
/// [`compute_candidate_paths`](Self::compute_candidate_paths) and
/// [`detect_candidate_path_conflicts`](Self::detect_candidate_path_conflicts);
/// any commit makes it stale.
#[derive(Debug, Clone)]
pub struct EmbeddingState {
    em: Embedding,

    candidate_paths: Vec<Option<CandidatePath>>,
    embedded_l_edges: Vec<EdgeId>,
    conflicting_l_edges: BTreeSet<EdgeId>,
    non_conflicting_l_edges: BTreeSet<EdgeId>,

    embedded_cost: f64,
    unembedded_cost: f64,
    valid: bool,
    parallel: bool,
}

impl EmbeddingState {
    /// Wrap an embedding. Edges already embedded in `em` count towards the
    /// embedded cost.
    pub fn new(em: Embedding) -> Self {
        let embedded_l_edges = em.commit_order().to_vec();
        let embedded_cost = em.total_embedded_path_length();
        Self {
            candidate_paths: vec![None; em.layout_mesh().num_edges()],
            em,
            embedded_l_edges,
            conflicting_l_edges: BTreeSet::new(),
            non_conflicting_l_edges: BTreeSet::new(),
            embedded_cost,
            unembedded_cost: 0.0,
            valid: true,
            parallel: false,
        }
    }

    /// Trace candidate paths on the rayon thread pool.
    ///
    /// The results are identical to sequential tracing.
    pub fn with_parallel_tracing(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    // ==================== Extension ====================

    /// Trace and commit the shortest path of `l_e`.
    ///
    /// If no path exists the state becomes invalid and its cost infinite.
    ///
    /// # Panics
    /// Panics if `l_e` is already embedded.
    pub fn extend(&mut self, l_e: EdgeId) {
        assert!(!self.em.is_embedded(l_e), "layout edge {:?} is already embedded", l_e);

        let l_he = self.em.layout_mesh().edge_halfedge(l_e);
        match self.em.find_shortest_path(l_he) {
            Some(path) => {
                self.embedded_cost += self.em.path_length(&path);
                self.em.embed_path(l_he, &path);
                self.embedded_l_edges.push(l_e);
            }
            None => {
                log::trace!("no path for layout edge {:?}", l_e);
                self.embedded_cost = f64::INFINITY;
                self.valid = false;
            }
        }
    }

    /// Commit a known path for `l_e`, running along its A half-edge.
    ///
    /// # Panics
    /// Panics if `l_e` is already embedded or the path endpoints do not
    /// match the edge.
    pub fn extend_with_path(&mut self, l_e: EdgeId, path: &[VirtualVertex]) {
        assert!(!self.em.is_embedded(l_e), "layout edge {:?} is already embedded", l_e);
        assert!(path.len() >= 2, "a virtual path needs at least two vertices");

        let l_he = self.em.layout_mesh().edge_halfedge(l_e);
        self.embedded_cost += self.em.path_length(path);
        self.em.embed_path(l_he, path);
        self.embedded_l_edges.push(l_e);
    }

    /// Extend edge by edge, stopping at the first edge without a path.
    pub fn extend_sequence(&mut self, seq: &[EdgeId]) {
        for &l_e in seq {
            self.extend(l_e);
            if !self.valid {
                break;
            }
        }
    }

    // ==================== Candidates ====================

    /// Trace a candidate for every unembedded layout edge against the
    /// current embedding.
    ///
    /// The unembedded cost becomes the sum of candidate lengths. An edge
    /// without a path invalidates the state.
    pub fn compute_candidate_paths(&mut self) {
        let em = &self.em;
        let layout = em.layout_mesh();
        let unembedded: Vec<EdgeId> = layout.edge_ids().filter(|&e| !em.is_embedded(e)).collect();

        let trace = |&l_e: &EdgeId| {
            let path = em.find_shortest_path(layout.edge_halfedge(l_e));
            (l_e, path)
        };
        let traced: Vec<(EdgeId, Option<VirtualPath>)> = if self.parallel {
            unembedded.par_iter().map(trace).collect()
        } else {
            unembedded.iter().map(trace).collect()
        };

        self.candidate_paths.iter_mut().for_each(|c| *c = None);
        self.unembedded_cost = 0.0;
        for (l_e, path) in traced {
            match path {
                Some(path) => {
                    let cost = self.em.path_length(&path);
                    self.unembedded_cost += cost;
                    self.candidate_paths[l_e.index()] = Some(CandidatePath { path, cost });
                }
                None => {
                    self.unembedded_cost = f64::INFINITY;
                    self.valid = false;
                }
            }
        }
    }

    /// Classify the unembedded edges into conflicting and non-conflicting,
    /// based on the current candidates.
    ///
    /// An invalid state reports no conflicts.
    pub fn detect_candidate_path_conflicts(&mut self) {
        self.conflicting_l_edges.clear();
        self.non_conflicting_l_edges.clear();

        if self.valid {
            let mut vpcs = VirtualPathConflictSentinel::new(&self.em);
            for l_e in self.em.layout_mesh().edge_ids() {
                if self.em.is_embedded(l_e) {
                    continue;
                }
                if let Some(candidate) = &self.candidate_paths[l_e.index()] {
                    vpcs.insert_path(&candidate.path, l_e);
                }
            }
            vpcs.check_path_ordering();
            self.conflicting_l_edges = vpcs.into_conflicting_edges();
        }

        for l_e in self.em.layout_mesh().edge_ids() {
            if !self.em.is_embedded(l_e) && !self.conflicting_l_edges.contains(&l_e) {
                self.non_conflicting_l_edges.insert(l_e);
            }
        }
        assert_eq!(
            self.embedded_l_edges.len()
                + self.conflicting_l_edges.len()
                + self.non_conflicting_l_edges.len(),
            self.em.layout_mesh().num_edges()
        );
    }

    /// Committed cost plus the candidate cost of every other edge.
    ///
    /// Blocking more of the target can only lengthen or remove paths, so
    /// this never exceeds the cost of any completion of this state.
    #[inline]
    pub fn cost_lower_bound(&self) -> f64 {
        self.embedded_cost + self.unembedded_cost
    }

    /// Hash of the positions along all committed paths, edges in index order.
    ///
    /// States reached through different insertion orders with the same
    /// paths hash equally.
    pub fn hash(&self) -> HashValue {
        let target = self.em.target_mesh();
        let mut hasher = DefaultHasher::new();
        for l_e in self.em.layout_mesh().edge_ids() {
            if let Some(path) = self.em.embedded_path(l_e) {
                for vv in path {
                    let p = vv.position(target);
                    p.x.to_bits().hash(&mut hasher);
                    p.y.to_bits().hash(&mut hasher);
                    p.z.to_bits().hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }

    /// Number of layout face groups separated by embedded edges.
    ///
    /// Faces are merged across every unembedded layout edge that has a face
    /// on both sides.
    pub fn count_connected_components(&self) -> usize {
        let layout = self.em.layout_mesh();
        let mut components = layout.num_faces();
        let mut uf = UnionFind::new(components);
        for l_e in layout.edge_ids() {
            if self.em.is_embedded(l_e) {
                continue;
            }
            let (fa, fb) = layout.edge_faces(l_e);
            if fa.is_valid() && fb.is_valid() && uf.merge(fa.index(), fb.index()) {
                components -= 1;
            }
        }
        components
    }

    // ==================== Savepoints ====================

    /// Remember the current commits and costs.
    pub fn savepoint(&self) -> StateSavepoint {
        StateSavepoint {
            mark: self.em.mark(),
            num_embedded: self.embedded_l_edges.len(),
            embedded_cost: self.embedded_cost,
            valid: self.valid,
        }
    }

    /// Undo every commit made after `sp`.
    ///
    /// Candidates and conflict sets are cleared and must be recomputed.
    pub fn restore(&mut self, sp: StateSavepoint) {
        self.em.rollback(sp.mark);
        self.embedded_l_edges.truncate(sp.num_embedded);
        self.embedded_cost = sp.embedded_cost;
        self.valid = sp.valid;
        self.unembedded_cost = 0.0;
        self.candidate_paths.iter_mut().for_each(|c| *c = None);
        self.conflicting_l_edges.clear();
        self.non_conflicting_l_edges.clear();
    }

    // ==================== Accessors ====================

    /// The wrapped embedding.
    #[inline]
    pub fn embedding(&self) -> &Embedding {
        &self.em
    }

    /// Unwrap the embedding.
    pub fn into_embedding(self) -> Embedding {
        self.em
    }

    /// The current candidate of an unembedded edge.
    pub fn candidate_path(&self, l_e: EdgeId) -> Option<&CandidatePath> {
        self.candidate_paths[l_e.index()].as_ref()
    }

    /// Edges whose candidates conflict with another candidate.
    #[inline]
    pub fn conflicting_edges(&self) -> &BTreeSet<EdgeId> {
        &self.conflicting_l_edges
    }

    /// Unembedded edges whose candidates can be committed as they are.
    #[inline]
    pub fn non_conflicting_edges(&self) -> &BTreeSet<EdgeId> {
        &self.non_conflicting_l_edges
    }

    /// Embedded edges in insertion order.
    #[inline]
    pub fn embedded_edges(&self) -> &[EdgeId] {
        &self.embedded_l_edges
    }

    /// Whether every extension and candidate trace so far succeeded.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Total length of the committed paths.
    #[inline]
    pub fn embedded_cost(&self) -> f64 {
        self.embedded_cost
    }

    /// Total length of the current candidates.
    #[inline]
    pub fn unembedded_cost(&self) -> f64 {
        self.unembedded_cost
    }
}
