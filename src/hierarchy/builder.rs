//! Hierarchy construction.

use ndarray::Array2;
use tracing::{debug, info};

use crate::dataset::DatasetRef;
use crate::engine::ComputationEngine;
use crate::error::{Error, Result};
use crate::params::HierarchyParameters;

use super::influence::InfluenceIndex;
use super::scale::Scale;
use super::ScaleHierarchy;

/// Builds a [`ScaleHierarchy`] from a dataset, delegating the numeric work
/// (similarities, landmark selection, influence maps) to a
/// [`ComputationEngine`].
///
/// Construction is synchronous but long-running; a progress callback is
/// invoked between scales so the caller stays responsive. The input dataset
/// is never mutated, and nothing is published until the whole build
/// succeeds; on error the caller's previous hierarchy is untouched.
pub struct HierarchyBuilder<'e> {
    engine: &'e dyn ComputationEngine,
}

impl<'e> HierarchyBuilder<'e> {
    /// Create a builder over the given engine.
    pub fn new(engine: &'e dyn ComputationEngine) -> Self {
        Self { engine }
    }

    /// Build a hierarchy with `params.num_scales` scales above scale 0.
    pub fn initialize(
        &self,
        dataset: &DatasetRef,
        enabled_dimensions: &[bool],
        params: &HierarchyParameters,
    ) -> Result<ScaleHierarchy> {
        self.initialize_with_progress(dataset, enabled_dimensions, params, &mut |_, _| {})
    }

    /// Build a hierarchy, reporting `(percentage, stage)` between phases.
    pub fn initialize_with_progress(
        &self,
        dataset: &DatasetRef,
        enabled_dimensions: &[bool],
        params: &HierarchyParameters,
        progress: &mut dyn FnMut(f32, &str),
    ) -> Result<ScaleHierarchy> {
        params.validate()?;

        let num_points = dataset.num_points();
        if num_points == 0 {
            return Err(Error::invalid("dataset", "dataset has zero points"));
        }
        if enabled_dimensions.len() != dataset.num_dimensions() {
            return Err(Error::invalid(
                "enabled_dimensions",
                format!(
                    "mask has {} entries, dataset has {} dimensions",
                    enabled_dimensions.len(),
                    dataset.num_dimensions()
                ),
            ));
        }
        let num_enabled = enabled_dimensions.iter().filter(|&&e| e).count();
        if num_enabled == 0 {
            return Err(Error::invalid("enabled_dimensions", "no dimension enabled"));
        }

        let data = filter_dimensions(dataset, enabled_dimensions, num_enabled);

        // One progress step for the base similarities, one per scale.
        let total_steps = (params.num_scales + 1) as f32;

        progress(0.0, "computing base similarities");
        let base = self
            .engine
            .base_similarities(data.view(), params)?;
        let mut scales = vec![Scale::base(num_points, base)];
        let mut boundaries = Vec::new();

        for scale_index in 1..=params.num_scales {
            progress(
                scale_index as f32 / total_steps * 100.0,
                &format!("building scale {scale_index}"),
            );

            let previous_count = scales[scale_index - 1].num_landmarks();
            let next = self
                .engine
                .next_scale(scales[scale_index - 1].transition(), params)?;
            let landmark_count = next.landmark_to_previous.len();

            if landmark_count == 0 || landmark_count >= previous_count {
                // The engine cannot reduce further; truncate without error.
                info!(
                    requested = params.num_scales,
                    built = scale_index - 1,
                    "landmark count stopped shrinking, truncating hierarchy"
                );
                break;
            }

            debug_assert!(next
                .landmark_to_previous
                .iter()
                .all(|&idx| (idx as usize) < previous_count));
            debug_assert!(next.influence.is_partition_of(previous_count));
            debug!(
                scale = scale_index,
                landmarks = landmark_count,
                previous = previous_count,
                "scale built"
            );

            scales.push(Scale::new(next.landmark_to_previous, next.transition));
            boundaries.push(next.influence);
        }

        progress(100.0, "hierarchy built");
        Ok(ScaleHierarchy::new(
            scales,
            InfluenceIndex::new(boundaries),
            num_enabled,
        ))
    }
}

/// Extract the enabled dimensions of every point into a dense matrix.
///
/// The result has one row per point and exactly one column per enabled
/// dimension.
fn filter_dimensions(
    dataset: &DatasetRef,
    enabled_dimensions: &[bool],
    num_enabled: usize,
) -> Array2<f32> {
    let num_points = dataset.num_points();
    let enabled: Vec<usize> = enabled_dimensions
        .iter()
        .enumerate()
        .filter_map(|(dim, &on)| on.then_some(dim))
        .collect();

    let mut data = Array2::zeros((num_points, num_enabled));
    for point in 0..num_points {
        for (col, &dim) in enabled.iter().enumerate() {
            data[[point, col]] = dataset.value_at(point, dim);
        }
    }
    data
}
