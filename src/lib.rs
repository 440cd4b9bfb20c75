pub mod classify;
pub mod codegen;
pub mod config;
pub mod error;
pub mod generators;
pub mod logging;
pub mod model;
pub mod relations;
pub mod template;
pub mod utils;

pub use classify::{ClassSet, classify};
pub use codegen::{
    GenerationReport, GeneratorConfig, GeneratorEngine, Pipeline, WorkflowGenerator, WriteStatus,
};
pub use config::{CliArgs, GenerationConfig, ProjectInfo};
pub use error::{GenerationError, Result};
pub use logging::{LoggingConfig, init_logging};
pub use model::{ClassModel, load_class_model};
pub use relations::{RelationEdge, RelationKind, RelationsModel};

use anyhow::Context;

/// Load the configured class model and run the full pipeline.
pub fn run_generation(config: &GenerationConfig) -> anyhow::Result<GenerationReport> {
    let model = load_class_model(&config.model_path)?;
    tracing::info!(
        model = %config.model_path.display(),
        property_classes = model.property_classes().len(),
        object_classes = model.object_classes().len(),
        "class model loaded"
    );

    let pipeline = Pipeline::from_config(config)?;
    let report = pipeline
        .run(&model)
        .with_context(|| format!("generation from {:?} failed", config.model_path))?;

    tracing::info!(
        core = %pipeline.project().core_root.display(),
        custom = %pipeline.project().custom_root.display(),
        written = report.written(),
        unchanged = report.unchanged(),
        "generation complete"
    );
    Ok(report)
}
