use std::sync::Arc;

use hsne::{
    AnalysisOrchestrator, DatasetRef, EmbeddingParameters, HierarchyParameters, MemoryDataset,
    RandomWalkEngine, SessionEvent,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Minimal end-to-end: points -> landmark hierarchy -> top-scale embedding.
    //
    // This example intentionally stays small: it exists primarily to
    // validate that the full pipeline builds and runs.
    tracing_subscriber::fmt().with_target(false).init();

    // Three separated blobs in 4D.
    let per_blob = 60;
    let centers = [[0.0, 0.0, 0.0, 0.0], [8.0, 8.0, 0.0, 0.0], [0.0, 8.0, 8.0, 0.0]];
    let mut data = Vec::new();
    for center in &centers {
        for i in 0..per_blob {
            for (d, &c) in center.iter().enumerate() {
                data.push(c + ((i * (d + 3)) % 11) as f32 * 0.05);
            }
        }
    }
    let num_points = per_blob * centers.len();
    let dataset: DatasetRef = MemoryDataset::full("blobs", data, num_points, 4);

    let engine = Arc::new(RandomWalkEngine::new());
    let mut orchestrator = AnalysisOrchestrator::new(engine, dataset)?;

    // All four dimensions participate.
    let hierarchy_params = HierarchyParameters::default()
        .with_num_scales(HierarchyParameters::default_num_scales(num_points))
        .with_num_neighbors(10)
        .with_seed(42);
    orchestrator.initialize_hierarchy(&[true; 4], &hierarchy_params)?;

    let hierarchy = orchestrator.hierarchy()?;
    println!("built {} scales:", hierarchy.num_scales());
    for (index, scale) in hierarchy.scales().iter().enumerate() {
        println!("  scale {index}: {} landmarks", scale.num_landmarks());
    }

    let embed_params = EmbeddingParameters::default()
        .with_num_iterations(500)
        .with_seed(42);
    orchestrator.compute_top_level_embedding(&embed_params)?;

    // Poll until the session finishes, applying layout updates as they come.
    while orchestrator.session().is_running() {
        std::thread::sleep(std::time::Duration::from_millis(20));
        for event in orchestrator.pump_events() {
            if let SessionEvent::Progress { percentage, stage } = event {
                println!("{percentage:5.1}% {stage}");
            }
        }
    }
    orchestrator.pump_events();

    println!(
        "embedding done: {} landmarks x {} dims",
        orchestrator.output().num_points(),
        orchestrator.output().num_dimensions()
    );
    Ok(())
}
