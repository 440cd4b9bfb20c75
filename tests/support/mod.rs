#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use schema_codegen::codegen::GENERATED_PACKAGE;
use schema_codegen::{ClassModel, Pipeline, ProjectInfo, load_class_model};
use walkdir::WalkDir;

pub const PROJECT_VERSION: &str = "3.1.0-SNAPSHOT";

pub fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn template_root() -> PathBuf {
    manifest_dir().join("templates")
}

pub fn fixture_path(name: &str) -> PathBuf {
    manifest_dir().join("fixtures").join("models").join(name)
}

pub fn network_model() -> ClassModel {
    load_class_model(&fixture_path("network.yaml")).expect("load network fixture")
}

/// `<dir>/network-generator`, writing into `network-core` and `network-custom`
pub fn project_in(dir: &Path) -> ProjectInfo {
    ProjectInfo::derive(
        dir.join("network-generator"),
        PROJECT_VERSION,
        Some("17".to_string()),
    )
}

pub fn pipeline_in(dir: &Path) -> Pipeline {
    Pipeline::new(project_in(dir), &template_root(), GENERATED_PACKAGE).expect("build pipeline")
}

pub fn generated_dir(root: &Path) -> PathBuf {
    root.join("target/generated-sources/schema/generated")
}

/// Every file under `dir` keyed by its path relative to `dir`
pub fn read_tree(dir: &Path) -> BTreeMap<PathBuf, String> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let path = entry.path();
            let contents = std::fs::read_to_string(path).expect("read generated file");
            let relative = path.strip_prefix(dir).expect("relative path").to_path_buf();
            (relative, contents)
        })
        .collect()
}
