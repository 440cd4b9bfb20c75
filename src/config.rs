use crate::codegen::{GENERATED_PACKAGE, TEMPLATE_DIR};
use anyhow::{Context, Result};
use clap::Parser;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const DEFAULT_MODEL_FILE: &str = "model.yaml";
const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

static GENERATOR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-generator$").expect("generator suffix pattern valid"));

static PACKAGE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("package segment pattern valid"));

/// Locations and version of the project family a generator belongs to.
///
/// A generator living in `<name>-generator` writes into its siblings
/// `<name>-core` and `<name>-custom`; the packaged plugin is assembled in
/// `<name>-package` and the final project lives in `<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    pub generator_root: PathBuf,
    pub final_project_root: PathBuf,
    pub core_root: PathBuf,
    pub custom_root: PathBuf,
    pub package_root: PathBuf,
    pub static_root: PathBuf,
    pub version: String,
    pub base_version: String,
    pub build_number: Option<String>,
}

impl ProjectInfo {
    pub fn derive(
        generator_root: impl Into<PathBuf>,
        version: impl Into<String>,
        build_number: Option<String>,
    ) -> Self {
        let generator_root = generator_root.into();
        let root = generator_root.to_string_lossy();
        let root = root.trim_end_matches(['/', '\\']);
        let base = GENERATOR_SUFFIX.replace(root, "").into_owned();
        let version = version.into();

        Self {
            final_project_root: PathBuf::from(&base),
            core_root: PathBuf::from(format!("{base}-core")),
            custom_root: PathBuf::from(format!("{base}-custom")),
            package_root: PathBuf::from(format!("{base}-package")),
            static_root: generator_root.join("src").join("main").join("static"),
            base_version: version.replace(SNAPSHOT_SUFFIX, ""),
            version,
            build_number,
            generator_root,
        }
    }

    pub fn with_core_root(mut self, core_root: impl Into<PathBuf>) -> Self {
        self.core_root = core_root.into();
        self
    }

    pub fn with_custom_root(mut self, custom_root: impl Into<PathBuf>) -> Self {
        self.custom_root = custom_root.into();
        self
    }

    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with(SNAPSHOT_SUFFIX)
    }
}

/// Everything one generation run needs
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub model_path: PathBuf,
    pub template_root: PathBuf,
    pub package: String,
    pub project: ProjectInfo,
}

impl GenerationConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            model: cli_model,
            generator_root: cli_generator_root,
            core_root: cli_core_root,
            custom_root: cli_custom_root,
            template_root: cli_template_root,
            package: cli_package,
            project_version: cli_project_version,
            build_number: cli_build_number,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            model: file_model,
            generator_root: file_generator_root,
            core_root: file_core_root,
            custom_root: file_custom_root,
            template_root: file_template_root,
            package: file_package,
            project_version: file_project_version,
            build_number: file_build_number,
        } = file_config;

        let generator_root = match cli_generator_root.or(file_generator_root) {
            Some(root) => root,
            None => std::env::current_dir().context("failed to resolve current directory")?,
        };

        let version = cli_project_version
            .or(file_project_version)
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
        let build_number = cli_build_number.or(file_build_number);

        let mut project = ProjectInfo::derive(&generator_root, version, build_number);
        if let Some(core_root) = cli_core_root.or(file_core_root) {
            project = project.with_core_root(core_root);
        }
        if let Some(custom_root) = cli_custom_root.or(file_custom_root) {
            project = project.with_custom_root(custom_root);
        }

        let model_path = cli_model
            .or(file_model)
            .unwrap_or_else(|| generator_root.join(DEFAULT_MODEL_FILE));
        let template_root = cli_template_root
            .or(file_template_root)
            .unwrap_or_else(|| generator_root.join(TEMPLATE_DIR));
        let package = cli_package
            .or(file_package)
            .map(|package| package.trim().to_string())
            .unwrap_or_else(|| GENERATED_PACKAGE.to_string());

        Ok(Self {
            model_path,
            template_root,
            package,
            project,
        })
    }

    /// Fail fast on settings that would only break mid-run.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.package.is_empty(), "package name must not be empty");
        for segment in self.package.split("::") {
            anyhow::ensure!(
                PACKAGE_SEGMENT.is_match(segment),
                "package {:?} has invalid segment {:?}",
                self.package,
                segment
            );
        }

        anyhow::ensure!(
            self.model_path.is_file(),
            "class model {:?} does not exist or is not a file",
            self.model_path
        );
        anyhow::ensure!(
            self.template_root.is_dir(),
            "template root {:?} does not exist or is not a directory",
            self.template_root
        );
        anyhow::ensure!(
            self.project.core_root != self.project.custom_root,
            "core and custom roots must differ, both are {:?}",
            self.project.core_root
        );
        Ok(())
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "schema-codegen",
    about = "Generate relations, wrappers, finders and mapping sources from a class model",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML, JSON or TOML)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "SCHEMA_CODEGEN_MODEL",
        value_name = "FILE",
        help = "Class model document (YAML or JSON)"
    )]
    pub model: Option<PathBuf>,

    #[arg(
        long,
        env = "SCHEMA_CODEGEN_GENERATOR_ROOT",
        value_name = "DIR",
        help = "Generator project directory, conventionally named <name>-generator"
    )]
    pub generator_root: Option<PathBuf>,

    #[arg(
        long,
        env = "SCHEMA_CODEGEN_CORE_ROOT",
        value_name = "DIR",
        help = "Override the derived <name>-core root"
    )]
    pub core_root: Option<PathBuf>,

    #[arg(
        long,
        env = "SCHEMA_CODEGEN_CUSTOM_ROOT",
        value_name = "DIR",
        help = "Override the derived <name>-custom root"
    )]
    pub custom_root: Option<PathBuf>,

    #[arg(
        long,
        env = "SCHEMA_CODEGEN_TEMPLATE_ROOT",
        value_name = "DIR",
        help = "Directory holding the *.tera templates"
    )]
    pub template_root: Option<PathBuf>,

    #[arg(
        long,
        env = "SCHEMA_CODEGEN_PACKAGE",
        value_name = "PATH",
        help = "Package the artifacts are generated into, e.g. schema::generated"
    )]
    pub package: Option<String>,

    #[arg(
        long,
        env = "SCHEMA_CODEGEN_PROJECT_VERSION",
        value_name = "VERSION",
        help = "Project version; a -SNAPSHOT suffix is stripped for the base version"
    )]
    pub project_version: Option<String>,

    #[arg(
        long,
        env = "SCHEMA_CODEGEN_BUILD_NUMBER",
        value_name = "N",
        help = "Build number recorded in project metadata"
    )]
    pub build_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    model: Option<PathBuf>,
    generator_root: Option<PathBuf>,
    core_root: Option<PathBuf>,
    custom_root: Option<PathBuf>,
    template_root: Option<PathBuf>,
    package: Option<String>,
    project_version: Option<String>,
    build_number: Option<String>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        "toml" => toml::from_str(&contents)
            .with_context(|| format!("failed to parse TOML config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
