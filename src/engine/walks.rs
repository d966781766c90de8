//! Built-in engine: knn similarity graph + weighted random walks.
//!
//! Landmark selection follows the random-walk formulation of hierarchical
//! SNE: start a fixed number of walks from every point over the
//! row-stochastic transition matrix and count where they end. Points whose
//! endpoint count exceeds a multiple of the expected count under uniform
//! visits are promoted to landmarks: they are the states the chain
//! concentrates on. Influence sets and inter-landmark affinities come from
//! the same walks: each finer point belongs to the landmark its walks reach
//! most often, and landmark-to-landmark transition weights count which
//! landmark a walk leaving one reaches first.
//!
//! Neighbor search is a parallel brute-force sweep; exact, and fast enough
//! for the dataset sizes this engine targets.

use ndarray::{Array2, ArrayView2};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rand::prelude::*;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::hierarchy::{LandmarkMap, TransitionMatrix};
use crate::params::{EmbeddingParameters, HierarchyParameters};

use super::{sgd, ComputationEngine, NextScale};

/// Walks stop looking for a landmark after this many times the configured
/// walk length.
const INFLUENCE_WALK_CAP: usize = 8;

/// Default [`ComputationEngine`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomWalkEngine;

impl RandomWalkEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }
}

impl ComputationEngine for RandomWalkEngine {
    fn base_similarities(
        &self,
        data: ArrayView2<'_, f32>,
        params: &HierarchyParameters,
    ) -> Result<TransitionMatrix> {
        let n = data.nrows();
        if n == 0 {
            return Err(Error::engine("base similarities", "no points"));
        }
        let k = params.num_neighbors.min(n.saturating_sub(1));
        if k == 0 {
            return Ok(TransitionMatrix::new(vec![Vec::new(); n]));
        }

        let neighbors = knn(data, k);

        // Gaussian kernel bandwidth from the median neighbor distance.
        let mut distances: Vec<f32> = neighbors
            .iter()
            .flat_map(|row| row.iter().map(|&(_, d)| d))
            .collect();
        distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let sigma = distances
            .get(distances.len() / 2)
            .copied()
            .filter(|&s| s > 0.0)
            .unwrap_or(1.0);

        // Symmetric similarity graph; an edge reaches both endpoints' rows.
        let mut graph = UnGraph::<(), f32>::new_undirected();
        let nodes: Vec<NodeIndex> = (0..n).map(|_| graph.add_node(())).collect();
        for (i, row) in neighbors.iter().enumerate() {
            for &(j, dist) in row {
                let weight = (-dist * dist / (sigma * sigma)).exp().max(1e-6);
                graph.update_edge(nodes[i], nodes[j], weight);
            }
        }

        let rows = (0..n)
            .map(|i| {
                graph
                    .edges(nodes[i])
                    .map(|edge| {
                        let other = if edge.source() == nodes[i] {
                            edge.target()
                        } else {
                            edge.source()
                        };
                        (other.index() as u32, *edge.weight())
                    })
                    .collect()
            })
            .collect();

        Ok(TransitionMatrix::from_weights(rows))
    }

    fn next_scale(
        &self,
        previous: &TransitionMatrix,
        params: &HierarchyParameters,
    ) -> Result<NextScale> {
        let n = previous.num_rows();
        if n == 0 {
            return Err(Error::engine("landmark selection", "empty scale"));
        }

        let mut rng: Box<dyn RngCore> = match params.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(rand::rng()),
        };

        // Count walk endpoints.
        let mut hits = vec![0usize; n];
        for start in 0..n {
            for _ in 0..params.num_walks {
                let mut node = start;
                for _ in 0..params.walk_length {
                    node = walk_step(previous, node, &mut rng);
                }
                hits[node] += 1;
            }
        }

        // Expected endpoint count under uniform visits is `num_walks`.
        let threshold = params.landmark_threshold * params.num_walks as f32;
        let mut landmarks: Vec<u32> = hits
            .iter()
            .enumerate()
            .filter(|&(_, &h)| h as f32 > threshold)
            .map(|(i, _)| i as u32)
            .collect();
        if landmarks.is_empty() {
            // Degenerate chain; keep the single most visited state.
            let best = hits
                .iter()
                .enumerate()
                .max_by_key(|&(_, &h)| h)
                .map(|(i, _)| i as u32)
                .unwrap_or(0);
            landmarks.push(best);
        }
        debug!(previous = n, selected = landmarks.len(), "landmarks selected");

        let mut landmark_of = vec![None; n];
        for (id, &node) in landmarks.iter().enumerate() {
            landmark_of[node as usize] = Some(id);
        }

        // Assign every previous-scale point to the landmark its walks reach
        // most often; landmarks represent themselves.
        let cap = params.walk_length * INFLUENCE_WALK_CAP;
        let mut influence: Vec<Vec<u32>> = vec![Vec::new(); landmarks.len()];
        let mut unreachable = 0usize;
        for point in 0..n {
            let owner = match landmark_of[point] {
                Some(id) => id,
                None => {
                    let mut reached = vec![0usize; landmarks.len()];
                    for _ in 0..params.num_walks {
                        if let Some(id) = first_landmark_hit(previous, point, &landmark_of, cap, &mut rng)
                        {
                            reached[id] += 1;
                        }
                    }
                    match reached.iter().enumerate().max_by_key(|&(_, &c)| c) {
                        Some((id, &count)) if count > 0 => id,
                        _ => {
                            unreachable += 1;
                            0
                        }
                    }
                }
            };
            influence[owner].push(point as u32);
        }
        if unreachable > 0 {
            warn!(
                points = unreachable,
                "walks reached no landmark; assigned to landmark 0"
            );
        }

        // Inter-landmark transitions: which landmark does a walk leaving
        // this one reach first.
        let mut rows: Vec<Vec<(u32, f32)>> = Vec::with_capacity(landmarks.len());
        for (id, &node) in landmarks.iter().enumerate() {
            let mut counts = vec![0usize; landmarks.len()];
            for _ in 0..params.num_walks {
                let mut current = walk_step(previous, node as usize, &mut rng);
                for _ in 0..cap {
                    match landmark_of[current] {
                        Some(other) if other != id => {
                            counts[other] += 1;
                            break;
                        }
                        _ => current = walk_step(previous, current, &mut rng),
                    }
                }
            }
            let mut row: Vec<(u32, f32)> = counts
                .into_iter()
                .enumerate()
                .filter(|&(_, c)| c > 0)
                .map(|(other, c)| (other as u32, c as f32))
                .collect();
            if row.is_empty() {
                // Isolated landmark; absorbing state.
                row.push((id as u32, 1.0));
            }
            rows.push(row);
        }

        Ok(NextScale {
            landmark_to_previous: landmarks,
            transition: TransitionMatrix::from_weights(rows),
            influence: LandmarkMap::new(influence),
        })
    }

    fn solver_step(
        &self,
        affinity: &TransitionMatrix,
        coordinates: &mut Array2<f32>,
        iteration: usize,
        params: &EmbeddingParameters,
    ) -> Result<()> {
        sgd::step(affinity, coordinates, iteration, params)
    }
}

/// Parallel brute-force k-nearest-neighbors over Euclidean distance.
fn knn(data: ArrayView2<'_, f32>, k: usize) -> Vec<Vec<(usize, f32)>> {
    let n = data.nrows();
    (0..n)
        .into_par_iter()
        .map(|i| {
            let mut distances: Vec<(usize, f32)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    let d = data
                        .row(i)
                        .iter()
                        .zip(data.row(j).iter())
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum::<f32>()
                        .sqrt();
                    (j, d)
                })
                .collect();
            distances
                .sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            distances.truncate(k);
            distances
        })
        .collect()
}

/// One step of the chain; empty rows are absorbing.
fn walk_step(matrix: &TransitionMatrix, node: usize, rng: &mut dyn RngCore) -> usize {
    let row = matrix.row(node);
    if row.is_empty() {
        return node;
    }
    let mut u: f32 = rng.random();
    for &(next, weight) in row {
        if u < weight {
            return next as usize;
        }
        u -= weight;
    }
    row[row.len() - 1].0 as usize
}

/// First landmark a walk from `start` reaches within `cap` steps.
fn first_landmark_hit(
    matrix: &TransitionMatrix,
    start: usize,
    landmark_of: &[Option<usize>],
    cap: usize,
    rng: &mut dyn RngCore,
) -> Option<usize> {
    let mut node = start;
    for _ in 0..cap {
        node = walk_step(matrix, node, rng);
        if let Some(id) = landmark_of[node] {
            return Some(id);
        }
    }
    None
}
