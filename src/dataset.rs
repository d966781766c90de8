//! The dataset collaborator boundary.
//!
//! The crate never owns point storage. It consumes a narrow read-and-derive
//! interface: point/dimension counts, raw values, full-vs-subset status with
//! global index translation, and the ability to create derived and subset
//! datasets. The host application implements [`Dataset`] over whatever its
//! storage layer is; [`MemoryDataset`] is a minimal in-process implementation
//! used by the tests and demos.
//!
//! Index spaces matter here. A *full* dataset's local indices are global
//! indices. A *subset* carries a translation table: local index `i` refers to
//! global index `global_indices()[i]` of the backing store.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::hierarchy::SelectionMap;

/// Shared handle to a dataset collaborator.
pub type DatasetRef = Arc<dyn Dataset>;

/// Read-and-derive interface onto an externally owned point collection.
pub trait Dataset: Send + Sync {
    /// Number of points in this dataset.
    fn num_points(&self) -> usize;

    /// Number of dimensions per point.
    fn num_dimensions(&self) -> usize;

    /// Whether this dataset covers the entire backing store.
    fn is_full(&self) -> bool;

    /// Local-to-global index translation.
    ///
    /// For a full dataset this is the identity sequence.
    fn global_indices(&self) -> Vec<u32>;

    /// Raw value of one point in one dimension.
    fn value_at(&self, point: usize, dim: usize) -> f32;

    /// Create a subset dataset referencing the given global indices.
    fn create_subset(&self, name: &str, indices: &[u32]) -> Result<DatasetRef>;

    /// Create an empty derived dataset (e.g. to receive embedding output).
    fn create_derived(&self, name: &str) -> Result<DatasetRef>;

    /// Replace this dataset's contents with a raw row-major buffer.
    fn set_data(&self, data: &[f32], num_points: usize, num_dims: usize);

    /// Attach a selection link towards `target`.
    ///
    /// Selecting points here should highlight the mapped points there.
    fn link_to(&self, target: &DatasetRef, mapping: SelectionMap);
}

struct Buffer {
    data: Vec<f32>,
    num_points: usize,
    num_dims: usize,
}

/// In-process [`Dataset`] implementation.
///
/// Good enough for tests, demos, and small standalone runs; a real host
/// replaces this with its own storage layer.
pub struct MemoryDataset {
    name: String,
    buffer: Mutex<Buffer>,
    /// `None` for a full dataset, translation table for a subset.
    global: Option<Vec<u32>>,
    links: Mutex<Vec<(DatasetRef, SelectionMap)>>,
}

impl MemoryDataset {
    /// Create a full dataset over a row-major buffer.
    pub fn full(name: impl Into<String>, data: Vec<f32>, num_points: usize, num_dims: usize) -> Arc<Self> {
        assert_eq!(data.len(), num_points * num_dims, "buffer shape mismatch");
        Arc::new(Self {
            name: name.into(),
            buffer: Mutex::new(Buffer {
                data,
                num_points,
                num_dims,
            }),
            global: None,
            links: Mutex::new(Vec::new()),
        })
    }

    /// Create a subset view with an explicit global-index table.
    ///
    /// `data` holds the subset's own rows; `global` maps each row to its
    /// index in the backing store.
    pub fn subset(
        name: impl Into<String>,
        data: Vec<f32>,
        num_dims: usize,
        global: Vec<u32>,
    ) -> Arc<Self> {
        let num_points = global.len();
        assert_eq!(data.len(), num_points * num_dims, "buffer shape mismatch");
        Arc::new(Self {
            name: name.into(),
            buffer: Mutex::new(Buffer {
                data,
                num_points,
                num_dims,
            }),
            global: Some(global),
            links: Mutex::new(Vec::new()),
        })
    }

    /// Dataset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Links recorded by `link_to`, for inspection.
    pub fn links(&self) -> Vec<(DatasetRef, SelectionMap)> {
        self.links.lock().clone()
    }

    /// Copy of the current raw buffer.
    pub fn raw_data(&self) -> Vec<f32> {
        self.buffer.lock().data.clone()
    }
}

impl Dataset for MemoryDataset {
    fn num_points(&self) -> usize {
        self.buffer.lock().num_points
    }

    fn num_dimensions(&self) -> usize {
        self.buffer.lock().num_dims
    }

    fn is_full(&self) -> bool {
        self.global.is_none()
    }

    fn global_indices(&self) -> Vec<u32> {
        match &self.global {
            Some(table) => table.clone(),
            None => (0..self.num_points() as u32).collect(),
        }
    }

    fn value_at(&self, point: usize, dim: usize) -> f32 {
        let buffer = self.buffer.lock();
        buffer.data[point * buffer.num_dims + dim]
    }

    fn create_subset(&self, name: &str, indices: &[u32]) -> Result<DatasetRef> {
        // `indices` are global; map them back to our local rows.
        let table = self.global_indices();
        let buffer = self.buffer.lock();
        let num_dims = buffer.num_dims;

        let mut data = Vec::with_capacity(indices.len() * num_dims);
        for &global_idx in indices {
            let local = table.iter().position(|&g| g == global_idx).ok_or_else(|| {
                Error::invalid(
                    "indices",
                    format!("global index {global_idx} is not part of this dataset"),
                )
            })?;
            let start = local * num_dims;
            data.extend_from_slice(&buffer.data[start..start + num_dims]);
        }
        drop(buffer);

        Ok(MemoryDataset::subset(name, data, num_dims, indices.to_vec()))
    }

    fn create_derived(&self, name: &str) -> Result<DatasetRef> {
        Ok(MemoryDataset::full(name, Vec::new(), 0, 0))
    }

    fn set_data(&self, data: &[f32], num_points: usize, num_dims: usize) {
        let mut buffer = self.buffer.lock();
        buffer.data = data.to_vec();
        buffer.num_points = num_points;
        buffer.num_dims = num_dims;
    }

    fn link_to(&self, target: &DatasetRef, mapping: SelectionMap) {
        self.links.lock().push((Arc::clone(target), mapping));
    }
}
