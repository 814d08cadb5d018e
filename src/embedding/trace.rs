//! Shortest virtual path tracing.
//!
//! Dijkstra over the virtual graph of the target mesh. Nodes are the target
//! vertices plus one point per target edge; two nodes are adjacent when they
//! lie on a common face. Segment weights are Euclidean distances, with edge
//! points placed at edge midpoints.
//!
//! A traced path only uses free elements: no occupied vertex, edge point,
//! edge or face, and no matching vertex other than its two endpoints. At each
//! endpoint the path must leave through a port inside the sector bounded by
//! the neighbouring embedded layout edges, so the cyclic order of layout
//! edges around every layout vertex is preserved on the target.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::mesh::HalfEdgeId;

use super::{Embedding, MeshElement, VirtualPath, VirtualPort, VirtualVertex};

/// Priority queue entry for Dijkstra's algorithm.
#[derive(Debug, Clone, Copy)]
struct DijkstraEntry {
    distance: f64,
    node: usize,
}

impl PartialEq for DijkstraEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DijkstraEntry {}

impl PartialOrd for DijkstraEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DijkstraEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap; ties go to the smaller node index.
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl Embedding {
    /// Trace the shortest admissible virtual path for the edge of `l_he`.
    ///
    /// The path runs from the matching vertex of `origin(l_he)` to the
    /// matching vertex of `dest(l_he)`. Returns `None` if no admissible path
    /// exists. The embedding is not modified.
    ///
    /// # Panics
    /// Panics if the edge is already embedded.
    pub fn find_shortest_path(&self, l_he: HalfEdgeId) -> Option<VirtualPath> {
        assert!(
            !self.is_halfedge_embedded(l_he),
            "layout edge {:?} is already embedded",
            self.layout.edge_of(l_he)
        );

        let target = &*self.target;
        let source = self.matching_target_vertex(self.layout.origin(l_he));
        let sink = self.matching_target_vertex(self.layout.dest(l_he));

        let start_ports: HashSet<VirtualVertex> = self
            .sector_ports(l_he)
            .into_iter()
            .map(|p| p.to)
            .collect();
        let end_ports: HashSet<VirtualVertex> = self
            .sector_ports(self.layout.twin(l_he))
            .into_iter()
            .map(|p| p.to)
            .collect();
        if start_ports.is_empty() || end_ports.is_empty() {
            return None;
        }

        let num_nodes = target.num_vertices() + target.num_edges();
        let source_node = VirtualVertex::Vertex(source).node_index(target);
        let sink_node = VirtualVertex::Vertex(sink).node_index(target);

        let mut dist = vec![f64::INFINITY; num_nodes];
        let mut pred: Vec<Option<usize>> = vec![None; num_nodes];
        let mut settled = vec![false; num_nodes];
        let mut heap = BinaryHeap::new();
        let mut neighbors = Vec::new();

        dist[source_node] = 0.0;
        heap.push(DijkstraEntry { distance: 0.0, node: source_node });

        while let Some(DijkstraEntry { distance, node }) = heap.pop() {
            if settled[node] {
                continue;
            }
            settled[node] = true;
            if node == sink_node {
                break;
            }

            let u = VirtualVertex::from_node_index(target, node);
            let u_pos = u.position(target);

            neighbors.clear();
            self.push_neighbors(u, &mut neighbors);

            for &(w, element) in &neighbors {
                if node == source_node && !start_ports.contains(&w) {
                    continue;
                }
                if self.is_blocked(element) {
                    continue;
                }
                let w_node = w.node_index(target);
                if w_node == source_node || settled[w_node] {
                    continue;
                }
                if w_node == sink_node {
                    if !end_ports.contains(&u) {
                        continue;
                    }
                } else if !self.is_passable(w) {
                    continue;
                }

                let new_dist = distance + (w.position(target) - u_pos).norm();
                if new_dist < dist[w_node] {
                    dist[w_node] = new_dist;
                    pred[w_node] = Some(node);
                    heap.push(DijkstraEntry { distance: new_dist, node: w_node });
                }
            }
        }

        if !settled[sink_node] {
            return None;
        }

        let mut path = vec![VirtualVertex::Vertex(sink)];
        let mut current = sink_node;
        while let Some(p) = pred[current] {
            path.push(VirtualVertex::from_node_index(target, p));
            current = p;
        }
        path.reverse();
        debug_assert_eq!(path[0], VirtualVertex::Vertex(source));
        Some(path)
    }

    /// Ports around the matching vertex of `origin(l_he)` through which a
    /// path for `l_he` may leave.
    ///
    /// Without embedded neighbours every port is allowed. Otherwise the
    /// allowed ports lie strictly between the port of the closest embedded
    /// layout half-edge clockwise and the closest one counter-clockwise.
    pub fn sector_ports(&self, l_he: HalfEdgeId) -> Vec<VirtualPort> {
        let target = &*self.target;
        let t_v = self.matching_target_vertex(self.layout.origin(l_he));

        let Some((cw, ccw)) = self.sector_bounds(l_he) else {
            return VirtualPort::ring(target, t_v);
        };

        let mut ports = Vec::new();
        let mut port = cw.rotated_ccw(target);
        while port != ccw {
            ports.push(port);
            port = port.rotated_ccw(target);
        }
        ports
    }

    /// Ports of the closest embedded layout half-edges clockwise and
    /// counter-clockwise of `l_he` around its origin.
    pub(crate) fn sector_bounds(&self, l_he: HalfEdgeId) -> Option<(VirtualPort, VirtualPort)> {
        let layout = &*self.layout;

        let mut ccw = layout.rotated_ccw(l_he);
        while ccw != l_he && !self.is_halfedge_embedded(ccw) {
            ccw = layout.rotated_ccw(ccw);
        }
        if ccw == l_he {
            return None;
        }

        let mut cw = layout.rotated_cw(l_he);
        while !self.is_halfedge_embedded(cw) {
            cw = layout.rotated_cw(cw);
        }

        Some((self.embedded_port(cw)?, self.embedded_port(ccw)?))
    }

    /// Candidate steps out of `u`, with the element each step covers.
    fn push_neighbors(&self, u: VirtualVertex, out: &mut Vec<(VirtualVertex, MeshElement)>) {
        let target = &*self.target;
        match u {
            VirtualVertex::Vertex(v) => {
                for he in target.vertex_halfedges(v) {
                    let w = target.dest(he);
                    out.push((VirtualVertex::Vertex(w), MeshElement::Edge(target.edge_of(he))));
                    let f = target.face_of(he);
                    if f.is_valid() {
                        let opposite = target.edge_of(target.next(he));
                        out.push((VirtualVertex::Edge(opposite), MeshElement::Face(f)));
                    }
                }
            }
            VirtualVertex::Edge(e) => {
                let a = target.edge_halfedge(e);
                for h in [a, target.twin(a)] {
                    let f = target.face_of(h);
                    if !f.is_valid() {
                        continue;
                    }
                    let next = target.next(h);
                    let prev = target.prev(h);
                    out.push((VirtualVertex::Edge(target.edge_of(next)), MeshElement::Face(f)));
                    out.push((VirtualVertex::Edge(target.edge_of(prev)), MeshElement::Face(f)));
                    out.push((VirtualVertex::Vertex(target.dest(next)), MeshElement::Face(f)));
                }
            }
        }
    }
}
