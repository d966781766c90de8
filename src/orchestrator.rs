//! Top-level analysis coordination.
//!
//! The orchestrator ties the pieces together: it owns the hierarchy, the
//! embedding session, and the derived output dataset, and walks them
//! through the standard flow: build the hierarchy, embed the coarsest
//! scale, and on request drill down to a finer one. Every collaborator it
//! needs is passed in at construction; there is no process-wide state.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::{debug, info};

use crate::dataset::DatasetRef;
use crate::engine::ComputationEngine;
use crate::error::{Error, Result};
use crate::hierarchy::{resolve_selection_map, HierarchyBuilder, ScaleHierarchy};
use crate::params::{EmbeddingParameters, HierarchyParameters};
use crate::session::{EmbeddingSession, SessionEvent};

/// Coordinates hierarchy construction, scale selection, and embedding
/// sessions over one input dataset.
pub struct AnalysisOrchestrator {
    engine: Arc<dyn ComputationEngine>,
    input: DatasetRef,
    output: DatasetRef,
    hierarchy: Option<ScaleHierarchy>,
    session: EmbeddingSession,
    events: Receiver<SessionEvent>,
    current_scale: Option<usize>,
    current_subset: Option<DatasetRef>,
}

impl AnalysisOrchestrator {
    /// Create an orchestrator over `input`, deriving an output dataset to
    /// receive embedding coordinates.
    pub fn new(engine: Arc<dyn ComputationEngine>, input: DatasetRef) -> Result<Self> {
        let output = input.create_derived("embedding")?;
        let session = EmbeddingSession::new(Arc::clone(&engine));
        let events = session.subscribe();
        Ok(Self {
            engine,
            input,
            output,
            hierarchy: None,
            session,
            events,
            current_scale: None,
            current_subset: None,
        })
    }

    /// The dataset receiving layout updates.
    pub fn output(&self) -> &DatasetRef {
        &self.output
    }

    /// The built hierarchy.
    pub fn hierarchy(&self) -> Result<&ScaleHierarchy> {
        self.hierarchy.as_ref().ok_or(Error::HierarchyNotBuilt)
    }

    /// The embedding session, for state queries.
    pub fn session(&self) -> &EmbeddingSession {
        &self.session
    }

    /// Scale currently being embedded, if any.
    pub fn current_scale(&self) -> Option<usize> {
        self.current_scale
    }

    /// Subset dataset backing the current embedding, if any.
    pub fn current_subset(&self) -> Option<&DatasetRef> {
        self.current_subset.as_ref()
    }

    /// Register an observer for session events.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.session.subscribe()
    }

    /// Build (or rebuild) the landmark hierarchy.
    ///
    /// Any active embedding run is stopped first and its retained state
    /// invalidated; the previous hierarchy is only replaced on success.
    pub fn initialize_hierarchy(
        &mut self,
        enabled_dimensions: &[bool],
        params: &HierarchyParameters,
    ) -> Result<()> {
        self.session.stop();
        self.session.invalidate();

        info!(num_scales = params.num_scales, "building landmark hierarchy");
        let hierarchy = HierarchyBuilder::new(self.engine.as_ref()).initialize_with_progress(
            &self.input,
            enabled_dimensions,
            params,
            &mut |percentage, stage| debug!(percentage, stage, "hierarchy progress"),
        )?;
        hierarchy.log_scale_info();

        self.hierarchy = Some(hierarchy);
        self.current_scale = None;
        self.current_subset = None;
        Ok(())
    }

    /// Embed the coarsest scale of the hierarchy.
    pub fn compute_top_level_embedding(&mut self, params: &EmbeddingParameters) -> Result<()> {
        let top = self.hierarchy()?.top_scale_index();
        self.compute_embedding_at_scale(top, params)
    }

    /// Drill down (or back up) to `scale_index` and embed it.
    ///
    /// Stops any active run, derives the scale's representative subset of
    /// the input, links the output dataset to the input through the
    /// scale's influence partition, and starts a fresh session over the
    /// scale's transition matrix.
    pub fn compute_embedding_at_scale(
        &mut self,
        scale_index: usize,
        params: &EmbeddingParameters,
    ) -> Result<()> {
        params.validate()?;
        let hierarchy = self.hierarchy.as_ref().ok_or(Error::HierarchyNotBuilt)?;
        let scale = hierarchy.scale(scale_index)?;
        let num_landmarks = scale.num_landmarks();
        let affinity = scale.transition().clone();

        // Representative points of this scale, in input-global space.
        let representatives = hierarchy.representative_indices(scale_index)?;
        let globals = if self.input.is_full() {
            representatives
        } else {
            let table = self.input.global_indices();
            representatives
                .into_iter()
                .map(|idx| table[idx as usize])
                .collect()
        };

        let mapping = (scale_index > 0)
            .then(|| resolve_selection_map(hierarchy, scale_index, &self.input, &self.input))
            .transpose()?;

        // Stop-then-start: never two concurrent runs.
        self.session.stop();

        let subset = self
            .input
            .create_subset(&format!("scale_{scale_index}"), &globals)?;
        if let Some(mapping) = mapping {
            self.output.link_to(&self.input, mapping);
        }

        info!(scale = scale_index, num_landmarks, "embedding scale");
        self.session.start(params, affinity, num_landmarks)?;
        self.current_scale = Some(scale_index);
        self.current_subset = Some(subset);
        Ok(())
    }

    /// Extend the current run by `additional_iterations`.
    pub fn continue_embedding(&mut self, additional_iterations: usize) -> Result<()> {
        self.session.continue_computation(additional_iterations)
    }

    /// Stop the current run, if any.
    pub fn stop(&mut self) {
        self.session.stop();
    }

    /// Drain pending session events, applying layout snapshots to the
    /// output dataset, and return them for further consumption.
    pub fn pump_events(&mut self) -> Vec<SessionEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let SessionEvent::Layout {
                iteration,
                coordinates,
            } = &event
            {
                let flat: Vec<f32> = coordinates.iter().copied().collect();
                self.output
                    .set_data(&flat, coordinates.nrows(), coordinates.ncols());
                debug!(iteration, "layout applied to output dataset");
            }
            drained.push(event);
        }
        drained
    }
}
