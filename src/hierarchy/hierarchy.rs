//! The scale hierarchy container.

use tracing::info;

use crate::error::{Error, Result};

use super::influence::InfluenceIndex;
use super::scale::Scale;

/// Ordered sequence of scales, finest first.
///
/// Scale 0 is the original (dimension-filtered) data; the last scale is the
/// coarsest. Built once by
/// [`HierarchyBuilder`](crate::hierarchy::HierarchyBuilder) and immutable
/// thereafter; rebuilding replaces the whole value.
#[derive(Debug, Clone)]
pub struct ScaleHierarchy {
    scales: Vec<Scale>,
    influence: InfluenceIndex,
    num_enabled_dimensions: usize,
}

impl ScaleHierarchy {
    /// Assemble a hierarchy from its parts.
    ///
    /// `scales` must be non-empty; the influence index must carry one
    /// boundary map per adjacent scale pair.
    pub fn new(scales: Vec<Scale>, influence: InfluenceIndex, num_enabled_dimensions: usize) -> Self {
        assert!(!scales.is_empty(), "a hierarchy has at least scale 0");
        debug_assert_eq!(influence.num_boundaries(), scales.len() - 1);
        Self {
            scales,
            influence,
            num_enabled_dimensions,
        }
    }

    /// Number of scales, including scale 0.
    pub fn num_scales(&self) -> usize {
        self.scales.len()
    }

    /// Index of the coarsest scale.
    pub fn top_scale_index(&self) -> usize {
        self.scales.len() - 1
    }

    /// The scale at `index`.
    pub fn scale(&self, index: usize) -> Result<&Scale> {
        self.scales.get(index).ok_or(Error::ScaleOutOfRange {
            index,
            num_scales: self.scales.len(),
        })
    }

    /// All scales, finest first.
    pub fn scales(&self) -> &[Scale] {
        &self.scales
    }

    /// Influence maps across the scale boundaries.
    pub fn influence(&self) -> &InfluenceIndex {
        &self.influence
    }

    /// Width of the feature vectors the hierarchy was built from.
    pub fn num_enabled_dimensions(&self) -> usize {
        self.num_enabled_dimensions
    }

    /// Translate a landmark at `scale_index` to its original data index by
    /// walking the provenance mappings down to scale 0.
    pub fn landmark_to_original(&self, scale_index: usize, landmark: usize) -> Result<u32> {
        let scale = self.scale(scale_index)?;
        if landmark >= scale.num_landmarks() {
            return Err(Error::invalid(
                "landmark",
                format!(
                    "landmark {landmark} out of range for scale {scale_index} \
                     ({} landmarks)",
                    scale.num_landmarks()
                ),
            ));
        }

        let mut idx = scale.landmark_to_previous()[landmark];
        for lower in (1..scale_index).rev() {
            idx = self.scales[lower].landmark_to_previous()[idx as usize];
        }
        Ok(idx)
    }

    /// Original data indices of every landmark at `scale_index`, in
    /// landmark order.
    pub fn representative_indices(&self, scale_index: usize) -> Result<Vec<u32>> {
        let scale = self.scale(scale_index)?;
        (0..scale.num_landmarks())
            .map(|landmark| self.landmark_to_original(scale_index, landmark))
            .collect()
    }

    /// Log per-scale landmark counts and sparsity.
    pub fn log_scale_info(&self) {
        for (index, scale) in self.scales.iter().enumerate() {
            let entries: usize = scale.transition().iter_rows().map(|r| r.len()).sum();
            info!(
                scale = index,
                landmarks = scale.num_landmarks(),
                transition_entries = entries,
                "hierarchy scale"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{LandmarkMap, TransitionMatrix};

    fn hierarchy() -> ScaleHierarchy {
        let scales = vec![
            Scale::base(6, TransitionMatrix::new(vec![vec![]; 6])),
            // Landmarks at previous-scale indices 1, 3, 5.
            Scale::new(vec![1, 3, 5], TransitionMatrix::new(vec![vec![]; 3])),
            // Landmark at scale-1 index 2 (original point 5).
            Scale::new(vec![2], TransitionMatrix::new(vec![vec![]; 1])),
        ];
        let influence = InfluenceIndex::new(vec![
            LandmarkMap::new(vec![vec![0, 1], vec![2, 3], vec![4, 5]]),
            LandmarkMap::new(vec![vec![0, 1, 2]]),
        ]);
        ScaleHierarchy::new(scales, influence, 4)
    }

    #[test]
    fn test_top_scale() {
        let h = hierarchy();
        assert_eq!(h.num_scales(), 3);
        assert_eq!(h.top_scale_index(), 2);
        assert_eq!(h.scale(2).unwrap().num_landmarks(), 1);
        assert!(matches!(h.scale(3), Err(Error::ScaleOutOfRange { .. })));
    }

    #[test]
    fn test_landmark_to_original_walks_down() {
        let h = hierarchy();
        // Scale 1 maps straight into original indices.
        assert_eq!(h.landmark_to_original(1, 0).unwrap(), 1);
        assert_eq!(h.landmark_to_original(1, 2).unwrap(), 5);
        // Scale 2 landmark 0 -> scale-1 landmark 2 -> original 5.
        assert_eq!(h.landmark_to_original(2, 0).unwrap(), 5);
        // Scale 0 is the identity.
        assert_eq!(h.landmark_to_original(0, 4).unwrap(), 4);
    }

    #[test]
    fn test_representative_indices() {
        let h = hierarchy();
        assert_eq!(h.representative_indices(1).unwrap(), vec![1, 3, 5]);
        assert_eq!(h.representative_indices(2).unwrap(), vec![5]);
    }
}
