//! Validated parameter structs.
//!
//! All tunables enter the crate through these two flat structs. They are
//! validated once, at the orchestrator/session boundary; downstream
//! components only ever see validated values.

use std::time::Duration;

use crate::error::{Error, Result};

fn check_range(name: &'static str, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        return Err(Error::invalid(
            name,
            format!("{value} not in [{min}, {max}]"),
        ));
    }
    Ok(())
}

/// Parameters for building the landmark hierarchy.
#[derive(Debug, Clone)]
pub struct HierarchyParameters {
    /// Number of scales to build above scale 0 (>= 1).
    pub num_scales: usize,
    /// Neighbors per point in the similarity graph.
    pub num_neighbors: usize,
    /// Random walks started per point when selecting landmarks.
    pub num_walks: usize,
    /// Length of each landmark-selection walk.
    pub walk_length: usize,
    /// Minimum hit-count multiplier for a point to become a landmark.
    ///
    /// A point is selected when its walk endpoint count exceeds
    /// `landmark_threshold` times the expected count under uniform visits.
    pub landmark_threshold: f32,
    /// Random seed for landmark selection walks.
    pub seed: Option<u64>,
}

impl Default for HierarchyParameters {
    fn default() -> Self {
        Self {
            num_scales: 1,
            num_neighbors: 30,
            num_walks: 200,
            walk_length: 15,
            landmark_threshold: 1.5,
            seed: None,
        }
    }
}

impl HierarchyParameters {
    /// Create parameters with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of scales to build above scale 0.
    pub fn with_num_scales(mut self, num_scales: usize) -> Self {
        self.num_scales = num_scales;
        self
    }

    /// Set the neighbor count of the similarity graph.
    pub fn with_num_neighbors(mut self, num_neighbors: usize) -> Self {
        self.num_neighbors = num_neighbors;
        self
    }

    /// Set random seed for reproducible landmark selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Default scale count for a dataset of `num_points` points.
    ///
    /// `max(1, round(log10(n)) - 2)`: 10k points get 2 scales above the
    /// original data, 1M points get 4.
    pub fn default_num_scales(num_points: usize) -> usize {
        if num_points == 0 {
            return 1;
        }
        let scales = (num_points as f64).log10().round() as i64 - 2;
        scales.max(1) as usize
    }

    /// Validate all fields, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        check_range("num_scales", self.num_scales, 1, usize::MAX)?;
        check_range("num_neighbors", self.num_neighbors, 1, usize::MAX)?;
        check_range("num_walks", self.num_walks, 1, usize::MAX)?;
        check_range("walk_length", self.walk_length, 1, usize::MAX)?;
        if !(self.landmark_threshold > 0.0) {
            return Err(Error::invalid(
                "landmark_threshold",
                format!("{} is not positive", self.landmark_threshold),
            ));
        }
        Ok(())
    }
}

/// Parameters for one embedding computation.
///
/// Ranges are inclusive and match the accepted input ranges of the
/// solver; `validate` rejects anything outside them.
#[derive(Debug, Clone)]
pub struct EmbeddingParameters {
    /// Gradient descent iterations (1..=10000).
    pub num_iterations: usize,
    /// Perplexity of the input neighborhoods (2..=50).
    pub perplexity: usize,
    /// Iterations run with early exaggeration applied (1..=10000).
    pub exaggeration_iters: usize,
    /// Iterations over which exaggeration decays back to 1 (1..=10000).
    pub exponential_decay_iters: usize,
    /// Number of trees for approximate neighbor search (1..=10000).
    pub num_trees: usize,
    /// Number of checks for approximate neighbor search (1..=10000).
    pub num_checks: usize,
    /// Output dimensionality of the layout.
    pub num_output_dims: usize,
    /// How long `stop` waits for cooperative cancellation before
    /// abandoning the solver.
    pub stop_grace: Duration,
    /// Random seed for coordinate initialization.
    pub seed: Option<u64>,
}

impl Default for EmbeddingParameters {
    fn default() -> Self {
        Self {
            num_iterations: 1000,
            perplexity: 30,
            exaggeration_iters: 250,
            exponential_decay_iters: 70,
            num_trees: 4,
            num_checks: 1024,
            num_output_dims: 2,
            stop_grace: Duration::from_secs(3),
            seed: None,
        }
    }
}

impl EmbeddingParameters {
    /// Create parameters with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration budget.
    pub fn with_num_iterations(mut self, num_iterations: usize) -> Self {
        self.num_iterations = num_iterations;
        self
    }

    /// Set the perplexity.
    pub fn with_perplexity(mut self, perplexity: usize) -> Self {
        self.perplexity = perplexity;
        self
    }

    /// Set the cooperative-stop grace period.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Set random seed for reproducible initialization.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate all fields, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        check_range("num_iterations", self.num_iterations, 1, 10_000)?;
        check_range("perplexity", self.perplexity, 2, 50)?;
        check_range("exaggeration_iters", self.exaggeration_iters, 1, 10_000)?;
        check_range(
            "exponential_decay_iters",
            self.exponential_decay_iters,
            1,
            10_000,
        )?;
        check_range("num_trees", self.num_trees, 1, 10_000)?;
        check_range("num_checks", self.num_checks, 1, 10_000)?;
        check_range("num_output_dims", self.num_output_dims, 1, usize::MAX)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_num_scales() {
        assert_eq!(HierarchyParameters::default_num_scales(10_000), 2);
        assert_eq!(HierarchyParameters::default_num_scales(1_000_000), 4);
        // Small datasets never go below one scale.
        assert_eq!(HierarchyParameters::default_num_scales(10), 1);
        assert_eq!(HierarchyParameters::default_num_scales(0), 1);
    }

    #[test]
    fn test_embedding_defaults_are_valid() {
        assert!(EmbeddingParameters::default().validate().is_ok());
    }

    #[test]
    fn test_embedding_ranges() {
        let params = EmbeddingParameters::default().with_num_iterations(0);
        assert!(matches!(
            params.validate(),
            Err(Error::InvalidParameter {
                name: "num_iterations",
                ..
            })
        ));

        let params = EmbeddingParameters::default().with_perplexity(1);
        assert!(params.validate().is_err());
        let params = EmbeddingParameters::default().with_perplexity(51);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_hierarchy_ranges() {
        let params = HierarchyParameters::default().with_num_scales(0);
        assert!(params.validate().is_err());
        assert!(HierarchyParameters::default().validate().is_ok());
    }
}
