//! Sparse stochastic gradient layout step.
//!
//! Attractive forces follow the transition matrix entries; repulsion uses a
//! handful of negative samples per point with a heavy-tailed kernel, so a
//! step stays linear in the number of matrix entries. Early iterations run
//! with an exaggerated attraction that decays back to 1 over a configured
//! window, which lets clusters form before the layout relaxes.

use ndarray::Array2;
use rand::prelude::*;

use crate::error::Result;
use crate::hierarchy::TransitionMatrix;
use crate::params::EmbeddingParameters;

const LEARNING_RATE: f32 = 0.2;
const EXAGGERATION: f32 = 4.0;
const NEGATIVE_SAMPLES: usize = 5;
const REPULSION: f32 = 0.1;

/// Attraction multiplier for the given iteration.
fn exaggeration_factor(iteration: usize, params: &EmbeddingParameters) -> f32 {
    if iteration < params.exaggeration_iters {
        EXAGGERATION
    } else if iteration < params.exaggeration_iters + params.exponential_decay_iters {
        let progress = (iteration - params.exaggeration_iters) as f32
            / params.exponential_decay_iters as f32;
        EXAGGERATION + (1.0 - EXAGGERATION) * progress
    } else {
        1.0
    }
}

/// Advance `coordinates` by one gradient step.
pub(super) fn step(
    affinity: &TransitionMatrix,
    coordinates: &mut Array2<f32>,
    iteration: usize,
    params: &EmbeddingParameters,
) -> Result<()> {
    let n = coordinates.nrows();
    let dims = coordinates.ncols();
    let factor = exaggeration_factor(iteration, params);

    // Deterministic per-iteration negative sampling when seeded.
    let base = params.seed.unwrap_or(0x9e37_79b9_7f4a_7c15);
    let mut rng = StdRng::seed_from_u64(base.wrapping_add(iteration as u64));

    let mut gradient = Array2::<f32>::zeros((n, dims));

    for i in 0..n {
        for &(j, weight) in affinity.row(i) {
            let j = j as usize;
            if j == i {
                continue;
            }
            for d in 0..dims {
                let delta = coordinates[[j, d]] - coordinates[[i, d]];
                gradient[[i, d]] += factor * weight * delta;
            }
        }

        if n > 1 {
            for _ in 0..NEGATIVE_SAMPLES {
                let j = rng.random_range(0..n);
                if j == i {
                    continue;
                }
                let mut dist_sq = 0.0;
                for d in 0..dims {
                    let delta = coordinates[[i, d]] - coordinates[[j, d]];
                    dist_sq += delta * delta;
                }
                let push = REPULSION / (1.0 + dist_sq);
                for d in 0..dims {
                    let delta = coordinates[[i, d]] - coordinates[[j, d]];
                    gradient[[i, d]] += push * delta;
                }
            }
        }
    }

    coordinates.scaled_add(LEARNING_RATE, &gradient);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exaggeration_schedule() {
        let params = EmbeddingParameters::default();

        assert_eq!(exaggeration_factor(0, &params), EXAGGERATION);
        assert_eq!(exaggeration_factor(249, &params), EXAGGERATION);
        // Decays across the window...
        let mid = exaggeration_factor(250 + 35, &params);
        assert!(mid < EXAGGERATION && mid > 1.0);
        // ...and settles at 1.
        assert_eq!(exaggeration_factor(250 + 70, &params), 1.0);
        assert_eq!(exaggeration_factor(5000, &params), 1.0);
    }

    #[test]
    fn test_attraction_pulls_linked_points_together() {
        // Two points, strongly linked, no third point to repel from.
        let affinity = TransitionMatrix::new(vec![vec![(1, 1.0)], vec![(0, 1.0)]]);
        let mut coordinates =
            Array2::from_shape_vec((2, 2), vec![0.0, 0.0, 10.0, 0.0]).unwrap();
        let params = EmbeddingParameters::default().with_seed(1);

        let gap_before = coordinates[[1, 0]] - coordinates[[0, 0]];
        for iteration in 0..50 {
            step(&affinity, &mut coordinates, iteration, &params).unwrap();
        }
        let gap_after = coordinates[[1, 0]] - coordinates[[0, 0]];

        assert!(gap_after.abs() < gap_before.abs());
    }

    #[test]
    fn test_seeded_steps_are_deterministic() {
        let affinity = TransitionMatrix::new(vec![
            vec![(1, 0.5), (2, 0.5)],
            vec![(0, 1.0)],
            vec![(0, 1.0)],
        ]);
        let params = EmbeddingParameters::default().with_seed(42);
        let start =
            Array2::from_shape_vec((3, 2), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        let mut a = start.clone();
        let mut b = start;
        for iteration in 0..10 {
            step(&affinity, &mut a, iteration, &params).unwrap();
            step(&affinity, &mut b, iteration, &params).unwrap();
        }

        assert_eq!(a, b);
    }
}
