//! End-to-end embedding scenarios on planar grid targets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use layout_embedding::embedding::path_elements;
use layout_embedding::prelude::*;
use nalgebra::Point3;

/// An `n x n` quad grid on `[0, n]^2`, each quad split along its main diagonal.
fn grid(n: usize) -> HalfEdgeMesh {
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

fn at(n: usize, i: usize, j: usize) -> VertexId {
    VertexId::new(j * (n + 1) + i)
}

fn layout(num_vertices: usize, faces: &[Vec<usize>]) -> HalfEdgeMesh {
    build_from_polygons(&vec![Point3::origin(); num_vertices], faces).unwrap()
}

fn quad_on_grid(n: usize) -> Embedding {
    let matching = [at(n, 0, 0), at(n, n, 0), at(n, n, n), at(n, 0, n)];
    Embedding::new(
        Arc::new(layout(4, &[vec![0, 1, 2, 3]])),
        Arc::new(grid(n)),
        &matching,
    )
}

/// A center vertex joined to three outer vertices, which are joined to each
/// other. The matching is a straight-line planar drawing on an 8x8 grid.
fn fan_on_grid() -> Embedding {
    let n = 8;
    let faces = [vec![0, 1, 2], vec![0, 2, 3], vec![0, 3, 1]];
    let matching = [at(n, 4, 4), at(n, 8, 4), at(n, 0, 8), at(n, 0, 0)];
    Embedding::new(Arc::new(layout(4, &faces)), Arc::new(grid(n)), &matching)
}

/// Two layout triangles whose edges (0,2)-(4,2) and (2,0)-(2,4) cannot both
/// be drawn on a disk without crossing.
fn crossing_on_grid() -> Embedding {
    let n = 4;
    let faces = [vec![0, 1, 2], vec![3, 4, 5]];
    let matching = [
        at(n, 0, 2),
        at(n, 4, 2),
        at(n, 0, 4),
        at(n, 2, 0),
        at(n, 2, 4),
        at(n, 4, 0),
    ];
    Embedding::new(Arc::new(layout(6, &faces)), Arc::new(grid(n)), &matching)
}

/// A quad whose matching swaps two corners, so the shortest routes of its
/// two diagonal edges cross in the middle of a 6x6 grid.
fn bowtie_on_grid() -> Embedding {
    let n = 6;
    let matching = [at(n, 1, 1), at(n, 5, 5), at(n, 5, 1), at(n, 1, 5)];
    Embedding::new(
        Arc::new(layout(4, &[vec![0, 1, 2, 3]])),
        Arc::new(grid(n)),
        &matching,
    )
}

fn permutations(items: &[EdgeId]) -> Vec<Vec<EdgeId>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let first = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, first);
            out.push(tail);
        }
    }
    out
}

/// Cheapest complete embedding over every insertion order, if any.
fn best_completion(em: &Embedding) -> Option<f64> {
    let edges: Vec<EdgeId> = em.layout_mesh().edge_ids().collect();
    permutations(&edges)
        .into_iter()
        .filter_map(|order| {
            let mut state = EmbeddingState::new(em.clone());
            state.extend_sequence(&order);
            (state.is_valid() && state.embedding().is_complete()).then(|| state.embedded_cost())
        })
        .min_by(f64::total_cmp)
}

fn assert_valid_embedding(em: &Embedding) {
    assert!(em.is_complete());

    let target = em.target_mesh();
    let mut owners: HashMap<MeshElement, EdgeId> = HashMap::new();
    let mut total = 0.0;
    for l_e in em.layout_mesh().edge_ids() {
        let path = em.embedded_path(l_e).expect("every layout edge is embedded");
        let (a, b) = em.layout_mesh().edge_vertices(l_e);
        assert_eq!(path[0], VirtualVertex::Vertex(em.matching_target_vertex(a)));
        assert_eq!(
            path[path.len() - 1],
            VirtualVertex::Vertex(em.matching_target_vertex(b))
        );

        for element in path_elements(target, path) {
            if let MeshElement::Vertex(t_v) = element {
                assert!(em.matching_layout_vertex(t_v).is_none());
            }
            if let Some(other) = owners.insert(element, l_e) {
                assert_eq!(other, l_e, "{:?} is shared by {:?} and {:?}", element, other, l_e);
            }
            assert_eq!(em.owner(element), Some(l_e));
        }
        total += em.path_length(path);
    }
    assert!((total - em.total_embedded_path_length()).abs() < 1e-9);
}

#[test]
fn test_square_on_grid() {
    let mut em = quad_on_grid(4);
    let outcome = branch_and_bound(&mut em, &BranchAndBoundSettings::default()).unwrap();

    assert_valid_embedding(&em);
    assert_eq!(em.num_embedded_edges(), 4);
    assert_eq!(outcome.status, SolutionStatus::Optimal);
    assert_eq!(outcome.iterations, 1);
    assert!(outcome.insertions.is_empty());
    assert!((outcome.cost - 16.0).abs() < 1e-9);
    for l_e in em.layout_mesh().edge_ids() {
        let path = em.embedded_path(l_e).unwrap();
        assert_eq!(path.len(), 5);
        assert!(path.iter().all(|vv| vv.is_real_vertex()));
    }
}

#[test]
fn test_fan_optimal_search() {
    let mut root = EmbeddingState::new(fan_on_grid()).with_parallel_tracing(false);
    root.compute_candidate_paths();
    assert!(root.is_valid());
    let root_lower_bound = root.cost_lower_bound();

    let mut em = fan_on_grid();
    let settings = BranchAndBoundSettings::default().with_max_gap(0.0).sequential();
    let outcome = branch_and_bound(&mut em, &settings).unwrap();

    assert_valid_embedding(&em);
    assert_eq!(outcome.status, SolutionStatus::Optimal);
    assert!(outcome.gap() <= 1e-12);
    assert!(outcome.lower_bound <= outcome.cost + 1e-9);
    assert!(root_lower_bound <= outcome.cost + 1e-9);
    assert!((outcome.cost - em.total_embedded_path_length()).abs() < 1e-9);
}

#[test]
fn test_fan_greedy() {
    let mut em = fan_on_grid();
    let cost = embed(&mut em, &Algorithm::Greedy).unwrap();
    assert_valid_embedding(&em);

    // The straight spokes are committed first.
    let spokes = &em.commit_order()[..3];
    let layout = em.layout_mesh();
    for &l_e in spokes {
        let (a, b) = layout.edge_vertices(l_e);
        assert!(a == VertexId::new(0) || b == VertexId::new(0));
    }
    let spoke_cost = 4.0 + 2.0 * 32.0_f64.sqrt();
    assert!(cost > spoke_cost + 8.0);
}

#[test]
fn test_crossing_routes_are_resolved_by_rerouting() {
    let mut root = EmbeddingState::new(bowtie_on_grid());
    root.compute_candidate_paths();
    root.detect_candidate_path_conflicts();
    assert!(!root.conflicting_edges().is_empty());
    let independent_cost = root.cost_lower_bound();
    assert!((independent_cost - (8.0 + 8.0 * 2.0_f64.sqrt())).abs() < 1e-9);

    let mut em = bowtie_on_grid();
    let settings = BranchAndBoundSettings::default().with_max_gap(0.0).sequential();
    let outcome = branch_and_bound(&mut em, &settings).unwrap();

    assert_valid_embedding(&em);
    assert_eq!(outcome.status, SolutionStatus::Optimal);
    assert!(!outcome.insertions.is_empty());
    assert!(outcome.iterations > 1);
    assert!(outcome.cost > independent_cost + 1e-6);
    assert_eq!(
        &em.commit_order()[..outcome.insertions.len()],
        outcome.insertions.as_slice()
    );
}

#[test]
fn test_lower_bound_against_every_insertion_order() {
    for em in [bowtie_on_grid(), quad_on_grid(4)] {
        let mut root = EmbeddingState::new(em.clone());
        root.compute_candidate_paths();
        let root_lower_bound = root.cost_lower_bound();

        let best = best_completion(&em).expect("some insertion order completes");
        assert!(root_lower_bound <= best + 1e-9);

        let mut searched = em.clone();
        let settings = BranchAndBoundSettings::default().with_max_gap(0.0).sequential();
        let outcome = branch_and_bound(&mut searched, &settings).unwrap();
        assert!((outcome.cost - best).abs() < 1e-9);
        assert!(outcome.lower_bound <= best + 1e-9);
    }
}

#[test]
fn test_crossing_layout_is_infeasible() {
    let mut em = crossing_on_grid();
    let settings = BranchAndBoundSettings::default().sequential();
    match branch_and_bound(&mut em, &settings) {
        Err(EmbeddingError::NoFeasibleEmbedding { explored }) => assert!(explored >= 1),
        other => panic!("expected an infeasible search, got {:?}", other),
    }
    assert_eq!(em.num_embedded_edges(), 0);
}

#[test]
fn test_crossing_candidates_conflict_at_root() {
    let mut state = EmbeddingState::new(crossing_on_grid());
    state.compute_candidate_paths();
    state.detect_candidate_path_conflicts();

    // Horizontal (0,2)-(4,2) and vertical (2,0)-(2,4).
    assert!(state.conflicting_edges().contains(&EdgeId::new(0)));
    assert!(state.conflicting_edges().contains(&EdgeId::new(3)));

    let lone_sum: f64 = em_edges(&state)
        .into_iter()
        .map(|l_e| state.candidate_path(l_e).unwrap().cost)
        .sum();
    assert!((state.cost_lower_bound() - lone_sum).abs() < 1e-9);
}

fn em_edges(state: &EmbeddingState) -> Vec<EdgeId> {
    state.embedding().layout_mesh().edge_ids().collect()
}

#[test]
fn test_disconnected_target_is_infeasible() {
    let vertices: Vec<_> = (0..6)
        .map(|i| Point3::new((i % 3) as f64, (i / 3) as f64 * 5.0, 0.0))
        .collect();
    let target: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2], [3, 4, 5]]).unwrap();
    let matching: [VertexId; 3] = [0, 1, 3].map(VertexId::new);
    let mut em = Embedding::new(
        Arc::new(layout(3, &[vec![0, 1, 2]])),
        Arc::new(target),
        &matching,
    );

    let result = embed(&mut em, &Algorithm::default());
    assert!(matches!(result, Err(EmbeddingError::NoFeasibleEmbedding { .. })));
    assert_eq!(em.num_embedded_edges(), 0);
}

#[test]
#[should_panic(expected = "both matched")]
fn test_degenerate_matching_panics() {
    let matching = [at(4, 0, 0), at(4, 4, 0), at(4, 4, 0), at(4, 0, 4)];
    Embedding::new(
        Arc::new(layout(4, &[vec![0, 1, 2, 3]])),
        Arc::new(grid(4)),
        &matching,
    );
}

#[test]
fn test_invalid_gap_is_rejected() {
    let mut em = quad_on_grid(2);
    let settings = BranchAndBoundSettings::default().with_max_gap(1.0);
    assert!(matches!(
        branch_and_bound(&mut em, &settings),
        Err(EmbeddingError::InvalidParameter { .. })
    ));
    assert_eq!(em.num_embedded_edges(), 0);
}

#[test]
fn test_zero_time_limit() {
    let mut em = quad_on_grid(3);
    let settings = BranchAndBoundSettings::default().with_time_limit(Duration::ZERO);
    assert!(matches!(
        embed(&mut em, &Algorithm::BranchAndBound(settings)),
        Err(EmbeddingError::TimeLimitExceeded { .. })
    ));
}

#[test]
fn test_all_algorithms_agree_on_square() {
    let algorithms = [
        Algorithm::Greedy,
        Algorithm::Stochastic { seed: 42 },
        Algorithm::BranchAndBound(BranchAndBoundSettings::default()),
        Algorithm::BranchAndBound(BranchAndBoundSettings::default().with_hashing(false).sequential()),
    ];
    for algorithm in &algorithms {
        let mut em = quad_on_grid(5);
        let cost = embed(&mut em, algorithm).unwrap();
        assert_valid_embedding(&em);
        assert!((cost - 20.0).abs() < 1e-9, "{:?} returned {}", algorithm, cost);
    }
}

#[test]
fn test_search_keeps_pre_embedded_edges() {
    let mut em = quad_on_grid(4);
    let l_he = em.layout_mesh().edge_halfedge(EdgeId::new(2));
    let path = em.find_shortest_path(l_he).unwrap();
    em.embed_path(l_he, &path);

    branch_and_bound(&mut em, &BranchAndBoundSettings::default()).unwrap();
    assert_valid_embedding(&em);
    assert_eq!(em.embedded_path(EdgeId::new(2)).unwrap(), path.as_slice());
    assert_eq!(em.commit_order()[0], EdgeId::new(2));
}
