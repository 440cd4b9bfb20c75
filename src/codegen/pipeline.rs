//! Pipeline driver
//!
//! classify → relations → derived models → render all → write all → hook
//!
//! Every model is built and every artifact rendered before the first write,
//! so a model or template failure leaves the output roots untouched.

use super::engine::{GeneratedArtifact, GeneratorConfig, GeneratorEngine, RenderedArtifact};
use super::writer::WriteStatus;
use crate::classify::{ClassSet, classify};
use crate::config::{GenerationConfig, ProjectInfo};
use crate::error::{GenerationError, Result};
use crate::generators::{
    ConvertersModel, CustomMappingModel, FindersModel, GenerationModel, TypePaths, WrappersModel,
    generate_converters, generate_custom_mapping, generate_finders, generate_wrappers,
};
use crate::logging::{artifact_span, stage_span};
use crate::model::ClassModel;
use crate::relations::{RelationKind, RelationsModel};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Subpath of each destination root that receives generated sources
pub const GENERATED_SOURCES_ROOT: &str = "target/generated-sources";

/// Package every artifact is generated into unless configured otherwise
pub const GENERATED_PACKAGE: &str = "schema::generated";

/// Template directory below the generator root
pub const TEMPLATE_DIR: &str = "templates";

pub const CUSTOM_MAPPING_ARTIFACT: &str = "custom_mapping.rs";
pub const RELATIONS_ARTIFACT: &str = "relations.rs";
pub const FINDERS_ARTIFACT: &str = "finders.rs";
pub const EXECUTOR_ARTIFACT: &str = "executor.rs";
pub const WRAPPERS_ARTIFACT: &str = "wrappers.rs";

/// Follow-up generator run once the artifacts are on disk
pub trait WorkflowGenerator {
    fn name(&self) -> &str {
        "workflow"
    }

    fn generate(&self, project: &ProjectInfo, model: &ClassModel) -> anyhow::Result<()>;
}

/// Every model derived from one class model
#[derive(Debug, Clone)]
pub struct DerivedModels {
    pub classes: ClassSet,
    pub relations: RelationsModel,
    pub custom_mapping: CustomMappingModel,
    pub wrappers: WrappersModel,
    pub finders: FindersModel,
    pub converters: ConvertersModel,
}

impl DerivedModels {
    pub fn build(model: &ClassModel, package: &str) -> Result<Self> {
        let paths = TypePaths::new(package);

        let classes = {
            let _span = stage_span("classify").entered();
            classify(model)?
        };
        let relations = {
            let _span = stage_span("relations").entered();
            RelationsModel::build(model)?
        };

        let _span = stage_span("derive").entered();
        let custom_mapping = generate_custom_mapping(model, &classes, &relations, &paths)?;
        let wrappers = generate_wrappers(model, &classes, &relations, &paths)?;
        let finders = generate_finders(model, &classes, &wrappers, &relations, &paths)?;
        let converters = generate_converters(model, &classes, &paths)?;

        Ok(Self {
            classes,
            relations,
            custom_mapping,
            wrappers,
            finders,
            converters,
        })
    }

    pub fn counts(&self, model: &ClassModel) -> ModelCounts {
        ModelCounts {
            property_classes: model.property_classes().len(),
            object_classes: model.object_classes().len(),
            root_classes: self.classes.root_classes.len(),
            nested_classes: self.classes.nested_classes.len(),
            inner_classes: self.classes.inner_classes.len(),
            alias_classes: self.classes.alias_classes.len(),
            parent_child_edges: self.relations.count(RelationKind::ParentChild),
            reference_edges: self.relations.count(RelationKind::Reference),
            back_reference_edges: self.relations.count(RelationKind::BackReference),
            mapping_entries: self.custom_mapping.entries.len(),
            wrappers: self.wrappers.wrappers.len(),
            finders: self.finders.finders.len(),
            converters: self.converters.converters.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelCounts {
    pub property_classes: usize,
    pub object_classes: usize,
    pub root_classes: usize,
    pub nested_classes: usize,
    pub inner_classes: usize,
    pub alias_classes: usize,
    pub parent_child_edges: usize,
    pub reference_edges: usize,
    pub back_reference_edges: usize,
    pub mapping_entries: usize,
    pub wrappers: usize,
    pub finders: usize,
    pub converters: usize,
}

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub artifacts: Vec<GeneratedArtifact>,
    pub counts: ModelCounts,
}

impl GenerationReport {
    pub fn artifact(&self, template: &str) -> Option<&GeneratedArtifact> {
        self.artifacts.iter().find(|a| a.template == template)
    }

    pub fn written(&self) -> usize {
        self.count_status(WriteStatus::Written)
    }

    pub fn unchanged(&self) -> usize {
        self.count_status(WriteStatus::Unchanged)
    }

    fn count_status(&self, status: WriteStatus) -> usize {
        self.artifacts.iter().filter(|a| a.status == status).count()
    }
}

pub struct Pipeline {
    project: ProjectInfo,
    package: String,
    custom: GeneratorEngine,
    core: GeneratorEngine,
    workflow: Option<Box<dyn WorkflowGenerator>>,
}

impl Pipeline {
    pub fn new(project: ProjectInfo, template_root: &Path, package: impl Into<String>) -> Result<Self> {
        let package = package.into();
        let custom = GeneratorEngine::new(
            GeneratorConfig::new(generated_sources(&project.custom_root), package.clone()),
            template_root,
        )?;
        let core = GeneratorEngine::new(
            GeneratorConfig::new(generated_sources(&project.core_root), package.clone()),
            template_root,
        )?;
        Ok(Self {
            project,
            package,
            custom,
            core,
            workflow: None,
        })
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        Self::new(config.project.clone(), &config.template_root, config.package.clone())
    }

    pub fn with_workflow(mut self, workflow: impl WorkflowGenerator + 'static) -> Self {
        self.workflow = Some(Box::new(workflow));
        self
    }

    pub fn project(&self) -> &ProjectInfo {
        &self.project
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Build all models and render all artifacts without touching disk.
    pub fn render(&self, model: &ClassModel) -> Result<(DerivedModels, Vec<(&GeneratorEngine, RenderedArtifact)>)> {
        let derived = DerivedModels::build(model, &self.package)?;

        let _span = stage_span("render").entered();
        let rendered = vec![
            render_artifact(&self.custom, &derived.custom_mapping, CUSTOM_MAPPING_ARTIFACT)?,
            render_artifact(&self.core, &derived.relations, RELATIONS_ARTIFACT)?,
            render_artifact(&self.core, &derived.finders, FINDERS_ARTIFACT)?,
            render_artifact(&self.core, &derived.custom_mapping, EXECUTOR_ARTIFACT)?,
            render_artifact(&self.core, &derived.wrappers, WRAPPERS_ARTIFACT)?,
        ];
        Ok((derived, rendered))
    }

    pub fn run(&self, model: &ClassModel) -> Result<GenerationReport> {
        let started = Instant::now();
        let (derived, rendered) = self.render(model)?;
        let counts = derived.counts(model);

        let artifacts = {
            let _span = stage_span("write").entered();
            rendered
                .into_iter()
                .map(|(engine, artifact)| engine.write(artifact))
                .collect::<Result<Vec<_>>>()?
        };

        for artifact in &artifacts {
            tracing::info!(
                template = %artifact.template,
                path = %artifact.path.display(),
                hash = %artifact.hash,
                status = ?artifact.status,
                entries = artifact.entries,
                "artifact emitted"
            );
        }

        if let Some(workflow) = &self.workflow {
            let _span = stage_span("workflow").entered();
            workflow
                .generate(&self.project, model)
                .map_err(|source| GenerationError::Workflow {
                    hook: workflow.name().to_string(),
                    source,
                })?;
        }

        let report = GenerationReport { artifacts, counts };
        crate::log_slow_operation!(
            started.elapsed(),
            2_000,
            written = report.written(),
            unchanged = report.unchanged(),
            converters = report.counts.converters,
            "generation finished"
        );
        Ok(report)
    }
}

fn render_artifact<'e, M: GenerationModel>(
    engine: &'e GeneratorEngine,
    model: &M,
    template: &str,
) -> Result<(&'e GeneratorEngine, RenderedArtifact)> {
    let _span = artifact_span(template).entered();
    Ok((engine, engine.render(model, template)?))
}

/// `<root>/target/generated-sources`
pub fn generated_sources(root: &Path) -> PathBuf {
    root.join(GENERATED_SOURCES_ROOT)
}
