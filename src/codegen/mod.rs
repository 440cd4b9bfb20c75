//! Code Generation Module
//!
//! ```text
//! ClassModel → classify → relations → derived models → render → atomic write
//! ```
//!
//! - **engine**: [`GeneratorEngine`] renders one model through one template
//!   into `<base_dir>/<package path>/<template name>`
//! - **writer**: [`SafeCodeWriter`] commits artifacts atomically and skips
//!   byte-identical rewrites
//! - **pipeline**: [`Pipeline`] drives a full run over the five artifacts and
//!   returns a [`GenerationReport`]

pub mod engine;
pub mod pipeline;
pub mod writer;

pub use engine::{GeneratedArtifact, GeneratorConfig, GeneratorEngine, RenderedArtifact};
pub use pipeline::{
    CUSTOM_MAPPING_ARTIFACT, DerivedModels, EXECUTOR_ARTIFACT, FINDERS_ARTIFACT,
    GENERATED_PACKAGE, GENERATED_SOURCES_ROOT, GenerationReport, ModelCounts, Pipeline,
    RELATIONS_ARTIFACT, TEMPLATE_DIR, WRAPPERS_ARTIFACT, WorkflowGenerator, generated_sources,
};
pub use writer::{SafeCodeWriter, WriteStatus, compute_string_hash};
