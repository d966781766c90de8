//! # hsne
//!
//! Multi-scale landmark hierarchies and cancellable embedding sessions for
//! hierarchical SNE analysis.
//!
//! **Default build** ships a working computation engine (knn similarity
//! graph + weighted random walks + sparse SGD layout). Disable the `engine`
//! feature to use the crate purely as orchestration plumbing around your
//! own numeric kernels.
//!
//! The flow, end to end:
//!
//! ```text
//! dataset ──▶ HierarchyBuilder ──▶ ScaleHierarchy (+ InfluenceIndex)
//!                                       │ pick a scale
//!                                       ▼
//!             layout events ◀── EmbeddingSession ◀── transition matrix
//!                  │
//!                  ▼
//!             AnalysisOrchestrator republishes + links selections
//! ```

pub mod dataset;
pub mod engine;
/// Error types used across `hsne`.
pub mod error;
pub mod hierarchy;
pub mod orchestrator;
pub mod params;
pub mod session;

#[cfg(test)]
mod lifecycle_tests;

pub use error::{Error, Result};

pub use dataset::{Dataset, DatasetRef, MemoryDataset};
pub use engine::{ComputationEngine, NextScale};
pub use hierarchy::{
    resolve_selection_map, HierarchyBuilder, InfluenceIndex, LandmarkMap, Scale, ScaleHierarchy,
    SelectionMap, TransitionMatrix,
};
pub use orchestrator::AnalysisOrchestrator;
pub use params::{EmbeddingParameters, HierarchyParameters};
pub use session::{EmbeddingSession, SessionEvent, SessionState};

pub use hierarchy::{validate_hierarchy, ValidationReport};

#[cfg(feature = "engine")]
pub use engine::RandomWalkEngine;
