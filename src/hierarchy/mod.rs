//! Multi-scale landmark hierarchies.
//!
//! # The Multi-Scale Problem
//!
//! Embedding a large point set at full resolution is slow and produces
//! cluttered layouts. A landmark hierarchy summarizes the data at
//! progressively coarser scales:
//!
//! ```text
//! Scale 2:        [ 120 landmarks ]       coarsest ("top scale")
//!                        │ influence
//! Scale 1:        [ 1.4k landmarks ]
//!                        │ influence
//! Scale 0:        [ 10k points ]          original data
//! ```
//!
//! Each scale keeps two structures: a sparse row-stochastic
//! [`TransitionMatrix`] of affinities among its landmarks (the embedding
//! solver's input), and a provenance mapping from each landmark to the
//! previous-scale index it was drawn from. Across each boundary, a
//! [`LandmarkMap`] records which finer indices every landmark represents;
//! for a fixed boundary these sets partition the finer level.
//!
//! Coarse scales are embedded quickly; drilling down re-enters the
//! hierarchy at a finer scale. [`resolve_selection_map`] translates the
//! influence partition into dataset-global index space so selections in a
//! coarse embedding highlight the original points it summarizes.
//!
//! # Module Overview
//!
//! - [`Scale`], [`TransitionMatrix`]: one level and its affinity structure
//! - [`ScaleHierarchy`]: the ordered sequence of scales, finest first
//! - [`HierarchyBuilder`]: construction, delegating numerics to a
//!   [`ComputationEngine`](crate::engine::ComputationEngine)
//! - [`LandmarkMap`], [`InfluenceIndex`], [`SelectionMap`]: cross-scale
//!   influence and selection translation
//! - [`validate`]: structural invariant checking
//!
//! # References
//!
//! - Pezzotti et al. (2016). "Hierarchical Stochastic Neighbor Embedding."
//!   Computer Graphics Forum 35(3).

mod builder;
#[allow(clippy::module_inception)]
mod hierarchy;
mod influence;
mod scale;
pub mod validate;

pub use builder::HierarchyBuilder;
pub use hierarchy::ScaleHierarchy;
pub use influence::{resolve_selection_map, InfluenceIndex, LandmarkMap, SelectionMap};
pub use scale::{Scale, TransitionMatrix};
pub use validate::{validate_hierarchy, ValidationIssue, ValidationReport};
