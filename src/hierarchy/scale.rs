//! One level of the landmark hierarchy.

/// Sparse row-stochastic affinity matrix among the points of one scale.
///
/// Row `i` holds `(column, weight)` pairs for the transition probabilities
/// out of point `i`. Weights are non-negative and each non-empty row sums
/// to 1.
#[derive(Debug, Clone, Default)]
pub struct TransitionMatrix {
    rows: Vec<Vec<(u32, f32)>>,
}

impl TransitionMatrix {
    /// Wrap pre-normalized rows.
    pub fn new(rows: Vec<Vec<(u32, f32)>>) -> Self {
        Self { rows }
    }

    /// Build from unnormalized non-negative weights, normalizing each row
    /// to sum to 1. Rows with zero total weight are left empty.
    pub fn from_weights(mut rows: Vec<Vec<(u32, f32)>>) -> Self {
        for row in &mut rows {
            let total: f32 = row.iter().map(|&(_, w)| w).sum();
            if total > 0.0 {
                for entry in row.iter_mut() {
                    entry.1 /= total;
                }
            } else {
                row.clear();
            }
        }
        Self { rows }
    }

    /// Number of rows (points at this scale).
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Sparse entries of row `i`.
    pub fn row(&self, i: usize) -> &[(u32, f32)] {
        &self.rows[i]
    }

    /// Iterate over all rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[(u32, f32)]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Check that every non-empty row sums to 1 within `tolerance` and
    /// carries no negative weight.
    pub fn is_row_stochastic(&self, tolerance: f32) -> bool {
        self.rows.iter().all(|row| {
            if row.is_empty() {
                return true;
            }
            if row.iter().any(|&(_, w)| w < 0.0) {
                return false;
            }
            let total: f32 = row.iter().map(|&(_, w)| w).sum();
            (total - 1.0).abs() <= tolerance
        })
    }
}

/// One scale of the hierarchy: its landmarks' provenance and their
/// affinity structure.
///
/// `landmark_to_previous[i]` is the index of landmark `i` in the previous
/// scale (in the original dataset for scale 0, where the mapping is the
/// identity).
#[derive(Debug, Clone)]
pub struct Scale {
    landmark_to_previous: Vec<u32>,
    transition: TransitionMatrix,
}

impl Scale {
    /// Create a scale from a provenance mapping and its transition matrix.
    pub fn new(landmark_to_previous: Vec<u32>, transition: TransitionMatrix) -> Self {
        debug_assert_eq!(landmark_to_previous.len(), transition.num_rows());
        Self {
            landmark_to_previous,
            transition,
        }
    }

    /// Create scale 0: every original point is its own landmark.
    pub fn base(num_points: usize, transition: TransitionMatrix) -> Self {
        Self::new((0..num_points as u32).collect(), transition)
    }

    /// Number of landmarks at this scale.
    pub fn num_landmarks(&self) -> usize {
        self.landmark_to_previous.len()
    }

    /// Mapping from landmark id to previous-scale index.
    pub fn landmark_to_previous(&self) -> &[u32] {
        &self.landmark_to_previous
    }

    /// Affinity structure among this scale's landmarks.
    pub fn transition(&self) -> &TransitionMatrix {
        &self.transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_weights_normalizes() {
        let matrix = TransitionMatrix::from_weights(vec![
            vec![(1, 2.0), (2, 2.0)],
            vec![(0, 5.0)],
            vec![],
        ]);

        assert_eq!(matrix.row(0), &[(1, 0.5), (2, 0.5)]);
        assert_eq!(matrix.row(1), &[(0, 1.0)]);
        assert!(matrix.row(2).is_empty());
        assert!(matrix.is_row_stochastic(1e-5));
    }

    #[test]
    fn test_row_stochastic_rejects_negative() {
        let matrix = TransitionMatrix::new(vec![vec![(0, 1.5), (1, -0.5)]]);
        assert!(!matrix.is_row_stochastic(1e-5));
    }

    #[test]
    fn test_base_scale_identity() {
        let scale = Scale::base(4, TransitionMatrix::new(vec![vec![]; 4]));
        assert_eq!(scale.num_landmarks(), 4);
        assert_eq!(scale.landmark_to_previous(), &[0, 1, 2, 3]);
    }
}
