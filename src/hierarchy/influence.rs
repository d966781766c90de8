//! Landmark influence maps and cross-scale selection translation.
//!
//! Each scale boundary carries a [`LandmarkMap`]: for every landmark at
//! scale `s`, the set of scale-`s-1` indices it represents. For a fixed
//! boundary the sets form a partition of the finer level — every finer index
//! appears in exactly one landmark's set.
//!
//! A [`SelectionMap`] is the translated, dataset-global version of that
//! partition, composed down to original data indices and pushed through the
//! global-index tables of the two datasets being linked. It is what makes
//! brushing a coarse embedding highlight the right original points.

use std::collections::HashMap;

use crate::dataset::DatasetRef;
use crate::error::{Error, Result};

use super::ScaleHierarchy;

/// Partition of one scale boundary: landmark id at scale `s` to the
/// scale-`s-1` indices it represents.
#[derive(Debug, Clone, Default)]
pub struct LandmarkMap {
    sets: Vec<Vec<u32>>,
}

impl LandmarkMap {
    /// Wrap per-landmark index sets.
    pub fn new(sets: Vec<Vec<u32>>) -> Self {
        Self { sets }
    }

    /// Number of landmarks on the coarse side of the boundary.
    pub fn num_landmarks(&self) -> usize {
        self.sets.len()
    }

    /// Finer-level indices represented by landmark `i`.
    pub fn influence_of(&self, i: usize) -> &[u32] {
        &self.sets[i]
    }

    /// Iterate over `(landmark, influence set)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[u32])> {
        self.sets.iter().enumerate().map(|(i, s)| (i, s.as_slice()))
    }

    /// Check the partition property against a finer level of `n` indices:
    /// every index in `0..n` appears exactly once across all sets.
    pub fn is_partition_of(&self, n: usize) -> bool {
        let mut seen = vec![false; n];
        for set in &self.sets {
            for &idx in set {
                let idx = idx as usize;
                if idx >= n || seen[idx] {
                    return false;
                }
                seen[idx] = true;
            }
        }
        seen.into_iter().all(|covered| covered)
    }
}

/// All influence maps of a hierarchy, one per scale boundary.
///
/// `map_at(s)` is the boundary between scale `s` and scale `s-1`; it exists
/// for `1 <= s <= top`.
#[derive(Debug, Clone, Default)]
pub struct InfluenceIndex {
    boundaries: Vec<LandmarkMap>,
}

impl InfluenceIndex {
    /// Assemble from per-boundary maps, ordered from scale 1 upward.
    pub fn new(boundaries: Vec<LandmarkMap>) -> Self {
        Self { boundaries }
    }

    /// Number of boundaries (equals `num_scales - 1`).
    pub fn num_boundaries(&self) -> usize {
        self.boundaries.len()
    }

    /// The boundary map between `scale_index` and `scale_index - 1`.
    pub fn map_at(&self, scale_index: usize) -> Option<&LandmarkMap> {
        if scale_index == 0 {
            return None;
        }
        self.boundaries.get(scale_index - 1)
    }

    /// Compose boundary maps downward: for each landmark at `scale_index`,
    /// the full set of original data indices it represents.
    ///
    /// For `scale_index == 1` this is the stored boundary map itself. The
    /// composition of partitions is again a partition.
    pub fn compose_to_original(&self, scale_index: usize) -> Option<LandmarkMap> {
        let top_map = self.map_at(scale_index)?;

        let mut sets: Vec<Vec<u32>> = top_map.sets.clone();
        // Expand through each lower boundary until indices are original.
        for boundary in (1..scale_index).rev() {
            let finer = self.map_at(boundary)?;
            for set in &mut sets {
                let mut expanded = Vec::with_capacity(set.len());
                for &idx in set.iter() {
                    expanded.extend_from_slice(finer.influence_of(idx as usize));
                }
                *set = expanded;
            }
        }
        Some(LandmarkMap::new(sets))
    }
}

/// Translated, dataset-global selection mapping between two linked datasets.
#[derive(Debug, Clone, Default)]
pub struct SelectionMap {
    map: HashMap<u32, Vec<u32>>,
}

impl SelectionMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a representative global index with its represented set.
    pub fn insert(&mut self, key: u32, indices: Vec<u32>) {
        self.map.insert(key, indices);
    }

    /// Represented global indices for a representative, if linked.
    pub fn get(&self, key: u32) -> Option<&[u32]> {
        self.map.get(&key).map(|v| v.as_slice())
    }

    /// Number of representatives.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the map holds no links.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over `(representative, represented)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u32])> {
        self.map.iter().map(|(&k, v)| (k, v.as_slice()))
    }
}

fn translate(table: Option<&[u32]>, idx: u32) -> u32 {
    match table {
        Some(table) => table[idx as usize],
        None => idx,
    }
}

/// Build the selection map linking the landmarks of `scale_index` to the
/// original points they represent.
///
/// Keys are the landmarks' representative points translated into
/// `target`-space; each value set holds the represented original indices
/// translated into `source`-space. Value sets are non-empty and mutually
/// disjoint (the partition property survives translation). When a dataset
/// is full its translation is the identity.
pub fn resolve_selection_map(
    hierarchy: &ScaleHierarchy,
    scale_index: usize,
    source: &DatasetRef,
    target: &DatasetRef,
) -> Result<SelectionMap> {
    if scale_index == 0 || scale_index >= hierarchy.num_scales() {
        return Err(Error::ScaleOutOfRange {
            index: scale_index,
            num_scales: hierarchy.num_scales(),
        });
    }

    let composed = hierarchy
        .influence()
        .compose_to_original(scale_index)
        .ok_or(Error::ScaleOutOfRange {
            index: scale_index,
            num_scales: hierarchy.num_scales(),
        })?;

    let source_table = (!source.is_full()).then(|| source.global_indices());
    let target_table = (!target.is_full()).then(|| target.global_indices());

    let mut mapping = SelectionMap::new();
    for (landmark, influence) in composed.iter() {
        let representative = hierarchy.landmark_to_original(scale_index, landmark)?;
        let key = translate(target_table.as_deref(), representative);
        let values = influence
            .iter()
            .map(|&idx| translate(source_table.as_deref(), idx))
            .collect();
        mapping.insert(key, values);
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemoryDataset;
    use crate::hierarchy::{Scale, TransitionMatrix};

    fn two_boundary_hierarchy() -> ScaleHierarchy {
        // Original: 8 points. Scale 1: 4 landmarks covering pairs.
        // Scale 2: 2 landmarks covering scale-1 pairs.
        let scales = vec![
            Scale::base(8, TransitionMatrix::new(vec![vec![]; 8])),
            Scale::new(vec![0, 2, 4, 6], TransitionMatrix::new(vec![vec![]; 4])),
            Scale::new(vec![0, 2], TransitionMatrix::new(vec![vec![]; 2])),
        ];
        let influence = InfluenceIndex::new(vec![
            LandmarkMap::new(vec![vec![0, 1], vec![2, 3], vec![4, 5], vec![6, 7]]),
            LandmarkMap::new(vec![vec![0, 1], vec![2, 3]]),
        ]);
        ScaleHierarchy::new(scales, influence, 2)
    }

    #[test]
    fn test_partition_property() {
        let map = LandmarkMap::new(vec![vec![0, 1], vec![2, 3], vec![4]]);
        assert!(map.is_partition_of(5));

        // Gap: index 4 missing.
        let gap = LandmarkMap::new(vec![vec![0, 1], vec![2, 3]]);
        assert!(!gap.is_partition_of(5));

        // Duplicate across landmarks.
        let dup = LandmarkMap::new(vec![vec![0, 1], vec![1, 2], vec![3, 4]]);
        assert!(!dup.is_partition_of(5));
    }

    #[test]
    fn test_compose_to_original() {
        let hierarchy = two_boundary_hierarchy();
        let composed = hierarchy.influence().compose_to_original(2).unwrap();

        assert_eq!(composed.num_landmarks(), 2);
        assert_eq!(composed.influence_of(0), &[0, 1, 2, 3]);
        assert_eq!(composed.influence_of(1), &[4, 5, 6, 7]);
        assert!(composed.is_partition_of(8));
    }

    #[test]
    fn test_selection_map_full_dataset() {
        let hierarchy = two_boundary_hierarchy();
        let data = vec![0.0; 8 * 2];
        let dataset: DatasetRef = MemoryDataset::full("points", data, 8, 2);

        let mapping = resolve_selection_map(&hierarchy, 2, &dataset, &dataset).unwrap();

        // Landmark 0 at scale 2 -> scale-1 landmark 0 -> original point 0.
        assert_eq!(mapping.get(0), Some(&[0u32, 1, 2, 3][..]));
        // Landmark 1 at scale 2 -> scale-1 landmark 2 -> original point 4.
        assert_eq!(mapping.get(4), Some(&[4u32, 5, 6, 7][..]));
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_selection_map_translates_subset_globals() {
        let hierarchy = two_boundary_hierarchy();
        // The analyzed dataset is itself a subset: its 8 local points are
        // global indices 100..108 of some backing store.
        let global: Vec<u32> = (100..108).collect();
        let dataset: DatasetRef =
            MemoryDataset::subset("sub", vec![0.0; 8 * 2], 2, global);

        let mapping = resolve_selection_map(&hierarchy, 2, &dataset, &dataset).unwrap();

        assert_eq!(mapping.get(100), Some(&[100u32, 101, 102, 103][..]));
        assert_eq!(mapping.get(104), Some(&[104u32, 105, 106, 107][..]));
    }

    #[test]
    fn test_selection_map_rejects_scale_zero() {
        let hierarchy = two_boundary_hierarchy();
        let dataset: DatasetRef = MemoryDataset::full("points", vec![0.0; 16], 8, 2);
        assert!(matches!(
            resolve_selection_map(&hierarchy, 0, &dataset, &dataset),
            Err(Error::ScaleOutOfRange { .. })
        ));
    }
}
