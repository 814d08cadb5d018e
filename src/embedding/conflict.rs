//! Conflict detection between candidate paths.
//!
//! A [`VirtualPathConflictSentinel`] collects one candidate path per
//! unembedded layout edge and reports which of them cannot be committed
//! together. Two candidates conflict when
//!
//! - they touch a common target element (vertex, edge point, edge or face)
//!   away from their endpoints, or
//! - around some layout vertex, the directions in which they leave its
//!   matching vertex disagree with the rotation order of the layout edges.
//!
//! The rotation check works per sector: embedded layout half-edges cut the
//! ports around a matching vertex into arcs, and the candidates inside one
//! arc must leave in counter-clockwise layout order. A candidate that would
//! have to rotate clockwise to reach its successor conflicts with every
//! candidate it sweeps over. Without embedded half-edges at a vertex there
//! is no fixed reference direction, so any cyclic mismatch marks all edges
//! at that vertex as conflicting.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::mesh::{EdgeId, HalfEdgeId, VertexId};

use super::{path_elements, Embedding, MeshElement, VirtualPort, VirtualVertex};

/// An unordered pair of conflicting layout edges, stored as `(min, max)`.
pub type Conflict = (EdgeId, EdgeId);

/// Collects candidate paths and classifies them as conflicting or not.
#[derive(Debug)]
pub struct VirtualPathConflictSentinel<'a> {
    em: &'a Embedding,

    /// Candidate labels per touched target element.
    labels: HashMap<MeshElement, BTreeSet<EdgeId>>,

    /// Port of each candidate at the origin of each of its half-edges.
    l_port: HashMap<HalfEdgeId, VirtualPort>,

    /// Candidates leaving a matching vertex through each port.
    t_port: HashMap<VirtualPort, BTreeSet<EdgeId>>,

    global_conflicts: BTreeSet<EdgeId>,
    conflict_relation: BTreeSet<Conflict>,
}

impl<'a> VirtualPathConflictSentinel<'a> {
    /// Create an empty sentinel for the current state of `em`.
    pub fn new(em: &'a Embedding) -> Self {
        Self {
            em,
            labels: HashMap::new(),
            l_port: HashMap::new(),
            t_port: HashMap::new(),
            global_conflicts: BTreeSet::new(),
            conflict_relation: BTreeSet::new(),
        }
    }

    /// Register the candidate `path` of layout edge `l_e`.
    ///
    /// The path must run along the edge's A half-edge.
    ///
    /// # Panics
    /// Panics if `l_e` is already embedded or the path does not connect the
    /// matching vertices of the edge in A orientation.
    pub fn insert_path(&mut self, path: &[VirtualVertex], l_e: EdgeId) {
        let em = self.em;
        let layout = em.layout_mesh();
        assert!(!em.is_embedded(l_e), "candidate for embedded layout edge {:?}", l_e);
        assert!(path.len() >= 2, "a virtual path needs at least two vertices");

        let he_a = layout.edge_halfedge(l_e);
        let he_b = layout.twin(he_a);
        assert_eq!(
            path[0],
            VirtualVertex::Vertex(em.matching_target_vertex(layout.origin(he_a))),
            "candidate for {:?} must start at the origin of its A half-edge",
            l_e
        );

        for element in path_elements(em.target_mesh(), path) {
            let entry = self.labels.entry(element).or_default();
            let previous: Vec<EdgeId> = entry.iter().copied().collect();
            entry.insert(l_e);
            for other in previous {
                self.mark_conflicting(l_e, other);
            }
        }

        let port_a = VirtualPort::at_start(path);
        let port_b = VirtualPort::at_end(path);
        self.l_port.insert(he_a, port_a);
        self.l_port.insert(he_b, port_b);
        self.t_port.entry(port_a).or_default().insert(l_e);
        self.t_port.entry(port_b).or_default().insert(l_e);
    }

    /// Record that the candidates of `a` and `b` cannot coexist.
    pub fn mark_conflicting(&mut self, a: EdgeId, b: EdgeId) {
        if a == b {
            return;
        }
        self.global_conflicts.insert(a);
        self.global_conflicts.insert(b);
        self.conflict_relation.insert((a.min(b), a.max(b)));
    }

    /// Run the rotation order check around every layout vertex.
    ///
    /// Call once after all candidates are inserted.
    pub fn check_path_ordering(&mut self) {
        let em = self.em;
        let layout = em.layout_mesh();
        for l_v in layout.vertex_ids() {
            let outgoing: Vec<HalfEdgeId> = layout.vertex_halfedges(l_v).collect();
            if outgoing.is_empty() {
                continue;
            }

            let boundaries: Vec<HalfEdgeId> = outgoing
                .iter()
                .copied()
                .filter(|&he| em.is_halfedge_embedded(he))
                .collect();

            if boundaries.is_empty() {
                self.check_cyclic_order(l_v, outgoing[0]);
            } else {
                let boundary_ports: HashSet<VirtualPort> = boundaries
                    .iter()
                    .filter_map(|&he| em.embedded_port(he))
                    .collect();
                for &boundary in &boundaries {
                    self.check_sector(boundary, &boundary_ports);
                }
            }
        }
    }

    /// Check the candidates in the sector following `boundary` counter-clockwise.
    fn check_sector(&mut self, boundary: HalfEdgeId, boundary_ports: &HashSet<VirtualPort>) {
        let em = self.em;
        let layout = em.layout_mesh();
        let mut current = layout.rotated_ccw(boundary);
        if em.is_halfedge_embedded(current) {
            return;
        }
        let mut current_port = self.port(current);

        loop {
            let next = layout.rotated_ccw(current);
            if em.is_halfedge_embedded(next) {
                break;
            }
            let next_port = self.port(next);

            if !self.reachable_ccw_in_sector(current_port, next_port, boundary_ports) {
                let l_e = layout.edge_of(current);
                self.mark_and_sweep_cw_in_sector(current_port, next_port, boundary_ports, l_e);
            }

            current = next;
            current_port = next_port;
        }
    }

    /// Whether `end` follows `start` counter-clockwise without leaving the sector.
    fn reachable_ccw_in_sector(
        &self,
        start: VirtualPort,
        end: VirtualPort,
        boundary_ports: &HashSet<VirtualPort>,
    ) -> bool {
        assert_eq!(start.from, end.from);
        if start == end {
            return false;
        }
        let target = self.em.target_mesh();
        let mut port = start;
        while port != end {
            port = port.rotated_ccw(target);
            if boundary_ports.contains(&port) {
                return false;
            }
        }
        true
    }

    /// Rotate clockwise from `start` to `end`, marking every candidate passed
    /// on the way as conflicting with `l_e`.
    fn mark_and_sweep_cw_in_sector(
        &mut self,
        start: VirtualPort,
        end: VirtualPort,
        boundary_ports: &HashSet<VirtualPort>,
        l_e: EdgeId,
    ) {
        assert_eq!(start.from, end.from);
        let em = self.em;
        let target = em.target_mesh();
        let mut port = start;
        self.mark_port(port, l_e);
        while port != end {
            port = port.rotated_cw(target);
            assert!(
                !boundary_ports.contains(&port),
                "clockwise sweep around {:?} left its sector",
                port.from
            );
            self.mark_port(port, l_e);
        }
    }

    /// Without sectors, the candidates must visit the ports around the
    /// matching vertex in the same cyclic order as the layout half-edges.
    fn check_cyclic_order(&mut self, l_v: VertexId, start: HalfEdgeId) {
        let em = self.em;
        let layout = em.layout_mesh();
        let target = em.target_mesh();

        let start_port = self.port(start);
        let mut port = start_port;
        let mut he = layout.rotated_ccw(start);
        let mut cyclic_conflict = false;

        while he != start && !cyclic_conflict {
            let next_port = self.port(he);
            if port == next_port {
                cyclic_conflict = true;
            }
            while !cyclic_conflict && port != next_port {
                port = port.rotated_ccw(target);
                if port == start_port {
                    cyclic_conflict = true;
                }
            }
            he = layout.rotated_ccw(he);
        }

        if cyclic_conflict {
            let edges: Vec<EdgeId> = layout
                .vertex_halfedges(l_v)
                .map(|he| layout.edge_of(he))
                .collect();
            for &a in &edges {
                for &b in &edges {
                    self.mark_conflicting(a, b);
                }
            }
        }
    }

    fn mark_port(&mut self, port: VirtualPort, l_e: EdgeId) {
        let others: Vec<EdgeId> = self
            .t_port
            .get(&port)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for other in others {
            self.mark_conflicting(l_e, other);
        }
    }

    fn port(&self, l_he: HalfEdgeId) -> VirtualPort {
        *self.l_port.get(&l_he).unwrap_or_else(|| {
            panic!(
                "no candidate path for layout edge {:?}",
                self.em.layout_mesh().edge_of(l_he)
            )
        })
    }

    // ==================== Results ====================

    /// Layout edges whose candidates conflict with at least one other candidate.
    pub fn conflicting_edges(&self) -> &BTreeSet<EdgeId> {
        &self.global_conflicts
    }

    /// All conflicting pairs, each stored once as `(min, max)`.
    pub fn conflicts(&self) -> &BTreeSet<Conflict> {
        &self.conflict_relation
    }

    /// Whether the candidates of `a` and `b` were marked as conflicting.
    pub fn conflicts_with(&self, a: EdgeId, b: EdgeId) -> bool {
        self.conflict_relation.contains(&(a.min(b), a.max(b)))
    }

    /// Consume the sentinel, returning the set of conflicting layout edges.
    pub fn into_conflicting_edges(self) -> BTreeSet<EdgeId> {
        self.global_conflicts
    }
}
