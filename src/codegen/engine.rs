//! Generator engine: one template root, one output root, one package
//!
//! `render` produces an artifact fully in memory; `write` commits it.
//! Keeping the two apart lets the pipeline render every artifact before the
//! first byte reaches disk.

use super::writer::{SafeCodeWriter, WriteStatus, compute_string_hash};
use crate::error::{GenerationError, Result};
use crate::generators::GenerationModel;
use crate::template::{RenderConfig, RenderingError, SafeRenderer, TEMPLATE_EXTENSION};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tera::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Root under which package directories are created
    pub base_dir: PathBuf,
    /// `::`-separated package, e.g. `schema::generated`
    pub package_name: String,
}

impl GeneratorConfig {
    pub fn new(base_dir: impl Into<PathBuf>, package_name: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            package_name: package_name.into(),
        }
    }

    pub fn package_segments(&self) -> Vec<&str> {
        self.package_name
            .split("::")
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    /// Directory the package's files live in
    pub fn package_dir(&self) -> PathBuf {
        self.package_segments()
            .into_iter()
            .fold(self.base_dir.clone(), |dir, segment| dir.join(segment))
    }
}

/// A rendered, validated artifact not yet written
#[derive(Debug, Clone, Serialize)]
pub struct RenderedArtifact {
    pub template: String,
    pub family: &'static str,
    pub path: PathBuf,
    #[serde(skip)]
    pub content: String,
    pub hash: String,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedArtifact {
    pub template: String,
    pub family: &'static str,
    pub path: PathBuf,
    pub hash: String,
    pub entries: usize,
    pub status: WriteStatus,
}

pub struct GeneratorEngine {
    config: GeneratorConfig,
    renderer: SafeRenderer,
    writer: SafeCodeWriter,
}

impl GeneratorEngine {
    /// Load every template below `template_root`.
    pub fn new(config: GeneratorConfig, template_root: &Path) -> Result<Self> {
        let renderer = SafeRenderer::from_directory(template_root, RenderConfig::default())
            .map_err(|source| GenerationError::Render {
                template: template_root.display().to_string(),
                source,
            })?;
        Ok(Self::with_renderer(config, renderer))
    }

    pub fn with_renderer(config: GeneratorConfig, renderer: SafeRenderer) -> Self {
        Self {
            config,
            renderer,
            writer: SafeCodeWriter::new(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn output_path(&self, template_name: &str) -> PathBuf {
        self.config.package_dir().join(template_name)
    }

    /// Render `<template_name>.tera` against `model`.
    pub fn render<M: GenerationModel>(&self, model: &M, template_name: &str) -> Result<RenderedArtifact> {
        let started = Instant::now();
        let render_error = |source: RenderingError| GenerationError::Render {
            template: template_name.to_string(),
            source,
        };

        let mut context = Context::new();
        context
            .try_insert("model", model)
            .map_err(|e| {
                render_error(RenderingError::ContextError {
                    message: e.to_string(),
                })
            })?;
        context.insert("package", &self.config.package_name);
        context.insert("package_segments", &self.config.package_segments());
        context.insert("template", template_name);
        context.insert("generator", env!("CARGO_PKG_NAME"));

        let full_name = format!("{template_name}.{TEMPLATE_EXTENSION}");
        let content = self
            .renderer
            .render_safe(&full_name, &context)
            .map_err(render_error)?;

        let artifact = RenderedArtifact {
            template: template_name.to_string(),
            family: M::FAMILY,
            path: self.output_path(template_name),
            hash: compute_string_hash(&content),
            entries: model.entry_count(),
            content,
        };

        crate::log_slow_operation!(
            started.elapsed(),
            500,
            template = template_name,
            family = M::FAMILY,
            bytes = artifact.content.len(),
            "artifact rendered"
        );
        Ok(artifact)
    }

    pub fn write(&self, artifact: RenderedArtifact) -> Result<GeneratedArtifact> {
        let status = self.writer.write(&artifact.path, &artifact.content)?;
        Ok(GeneratedArtifact {
            template: artifact.template,
            family: artifact.family,
            path: artifact.path,
            hash: artifact.hash,
            entries: artifact.entries,
            status,
        })
    }

    /// Render and write in one step.
    pub fn generate<M: GenerationModel>(&self, model: &M, template_name: &str) -> Result<GeneratedArtifact> {
        let artifact = self.render(model, template_name)?;
        self.write(artifact)
    }
}
