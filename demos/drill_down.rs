use std::sync::Arc;

use hsne::{
    AnalysisOrchestrator, DatasetRef, EmbeddingParameters, HierarchyParameters, MemoryDataset,
    RandomWalkEngine,
};

// Embed the coarsest scale, then drill down one scale and re-embed,
// printing the selection links that tie each embedding back to the
// original points.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let per_blob = 80;
    let mut data = Vec::new();
    for blob in 0..2 {
        for i in 0..per_blob {
            data.push(blob as f32 * 12.0 + (i % 9) as f32 * 0.04);
            data.push(blob as f32 * 12.0 + (i % 7) as f32 * 0.04);
        }
    }
    let num_points = per_blob * 2;
    let dataset: DatasetRef = MemoryDataset::full("blobs", data, num_points, 2);

    let engine = Arc::new(RandomWalkEngine::new());
    let mut orchestrator = AnalysisOrchestrator::new(engine, dataset)?;

    let hierarchy_params = HierarchyParameters::default()
        .with_num_scales(2)
        .with_num_neighbors(8)
        .with_seed(7);
    orchestrator.initialize_hierarchy(&[true, true], &hierarchy_params)?;

    let embed_params = EmbeddingParameters::default()
        .with_num_iterations(300)
        .with_seed(7);

    let top = orchestrator.hierarchy()?.top_scale_index();
    for scale in (1..=top).rev() {
        orchestrator.compute_embedding_at_scale(scale, &embed_params)?;
        while orchestrator.session().is_running() {
            std::thread::sleep(std::time::Duration::from_millis(20));
            orchestrator.pump_events();
        }
        orchestrator.pump_events();

        let subset_points = orchestrator
            .current_subset()
            .map(|subset| subset.num_points())
            .unwrap_or(0);
        println!(
            "scale {scale}: embedded {} landmarks over a {subset_points}-point subset",
            orchestrator.output().num_points(),
        );
    }

    Ok(())
}
