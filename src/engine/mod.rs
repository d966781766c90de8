//! The computation engine boundary.
//!
//! All numeric kernels — neighbor search, landmark selection, and the
//! iterative layout solver — sit behind the [`ComputationEngine`] trait.
//! The hierarchy builder and embedding session only ever call through it,
//! so a host can swap in GPU kernels or an approximate-neighbor library
//! without touching the orchestration code.
//!
//! The built-in [`RandomWalkEngine`] (feature `engine`, on by default)
//! implements the trait with a knn similarity graph, weighted random walks
//! for landmark selection, and a sparse SGD layout step.

use ndarray::{Array2, ArrayView2};

use crate::error::Result;
use crate::hierarchy::{LandmarkMap, TransitionMatrix};
use crate::params::{EmbeddingParameters, HierarchyParameters};

#[cfg(feature = "engine")]
mod sgd;
#[cfg(feature = "engine")]
mod walks;

#[cfg(feature = "engine")]
pub use walks::RandomWalkEngine;

/// One newly built scale, as returned by the engine.
#[derive(Debug, Clone)]
pub struct NextScale {
    /// Index of each new landmark in the previous scale.
    pub landmark_to_previous: Vec<u32>,
    /// Affinities among the new landmarks.
    pub transition: TransitionMatrix,
    /// Which previous-scale indices each landmark represents.
    ///
    /// Must partition the previous scale's index range.
    pub influence: LandmarkMap,
}

/// Numeric kernels consumed by hierarchy construction and embedding
/// sessions.
///
/// Implementations must be callable from a worker thread; the solver is
/// cancelled cooperatively between `solver_step` calls, so a step should
/// return in bounded time.
pub trait ComputationEngine: Send + Sync {
    /// Affinity structure of the original (dimension-filtered) data:
    /// scale 0's transition matrix.
    fn base_similarities(
        &self,
        data: ArrayView2<'_, f32>,
        params: &HierarchyParameters,
    ) -> Result<TransitionMatrix>;

    /// Select landmarks over `previous` and derive their affinities and
    /// influence sets.
    ///
    /// Returning as many (or more) landmarks as `previous` has rows signals
    /// that the data cannot be reduced further; the builder truncates the
    /// hierarchy there.
    fn next_scale(
        &self,
        previous: &TransitionMatrix,
        params: &HierarchyParameters,
    ) -> Result<NextScale>;

    /// Advance the layout by one gradient step.
    ///
    /// `coordinates` has one row per point of the embedded scale;
    /// `iteration` is the zero-based step index.
    fn solver_step(
        &self,
        affinity: &TransitionMatrix,
        coordinates: &mut Array2<f32>,
        iteration: usize,
        params: &EmbeddingParameters,
    ) -> Result<()>;
}
