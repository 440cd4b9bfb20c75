//! Guarded Tera rendering
//!
//! - **SafeRenderer**: loads every `*.tera` file below a template root and
//!   renders one template against a prepared context
//! - **OutputValidator**: rejects rendered Rust whose delimiters do not
//!   balance, ignoring string literals, char literals and comments
//!
//! Rendering never touches the filesystem beyond loading templates; writing
//! is the generator engine's job.

use std::error::Error as _;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use thiserror::Error;

/// Default maximum output size (10 MB)
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 10 * 1024 * 1024;

/// Extension every template file carries
pub const TEMPLATE_EXTENSION: &str = "tera";

#[derive(Debug, Error)]
pub enum RenderingError {
    #[error("template root {path:?} does not exist")]
    TemplateRootMissing { path: PathBuf },

    #[error("template not found: {name}")]
    TemplateNotFound { name: String },

    #[error("template syntax error: {message}")]
    SyntaxError { message: String },

    #[error("tera rendering error: {message}")]
    TeraError {
        message: String,
        #[source]
        source: tera::Error,
    },

    #[error("output size limit exceeded: {size} bytes (max: {limit} bytes)")]
    OutputSizeExceeded { size: usize, limit: usize },

    #[error("output validation failed: {}", errors.join(", "))]
    ValidationFailed { errors: Vec<String> },

    #[error("context error: {message}")]
    ContextError { message: String },
}

impl RenderingError {
    fn tera(source: tera::Error) -> Self {
        RenderingError::TeraError {
            message: error_chain(&source),
            source,
        }
    }
}

/// Tera hides the useful part of a failure (undefined variable, bad filter)
/// in the source chain; flatten it into one line.
fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub line: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub max_output_size: usize,
    pub validate_syntax: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            validate_syntax: true,
        }
    }
}

impl RenderConfig {
    pub fn with_syntax_validation(mut self, enable: bool) -> Self {
        self.validate_syntax = enable;
        self
    }

    pub fn with_max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }
}

/// Validates rendered Rust source
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputValidator;

impl OutputValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, output: &str) -> Vec<ValidationError> {
        check_balanced_delimiters(output)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    LineComment,
    BlockComment(usize),
    Str,
}

fn check_balanced_delimiters(output: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut open: Vec<(char, usize)> = Vec::new();
    let mut state = Scan::Code;
    let mut line = 1;

    let chars: Vec<char> = output.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        if ch == '\n' {
            line += 1;
        }

        match state {
            Scan::LineComment => {
                if ch == '\n' {
                    state = Scan::Code;
                }
            }
            Scan::BlockComment(depth) => match (ch, next) {
                ('*', Some('/')) => {
                    state = if depth == 1 {
                        Scan::Code
                    } else {
                        Scan::BlockComment(depth - 1)
                    };
                    i += 1;
                }
                ('/', Some('*')) => {
                    state = Scan::BlockComment(depth + 1);
                    i += 1;
                }
                _ => {}
            },
            Scan::Str => match ch {
                '\\' => i += 1,
                '"' => state = Scan::Code,
                _ => {}
            },
            Scan::Code => match ch {
                '/' if next == Some('/') => state = Scan::LineComment,
                '/' if next == Some('*') => {
                    state = Scan::BlockComment(1);
                    i += 1;
                }
                '"' => state = Scan::Str,
                '\'' => i += char_literal_len(&chars[i..]).saturating_sub(1),
                '{' | '[' | '(' => open.push((ch, line)),
                '}' | ']' | ')' => {
                    let expected = match ch {
                        '}' => '{',
                        ']' => '[',
                        _ => '(',
                    };
                    match open.pop() {
                        Some((opener, _)) if opener == expected => {}
                        Some((opener, opened_at)) => errors.push(ValidationError {
                            line: Some(line),
                            message: format!(
                                "mismatched `{ch}`: closes `{opener}` opened on line {opened_at}"
                            ),
                        }),
                        None => errors.push(ValidationError {
                            line: Some(line),
                            message: format!("unbalanced `{ch}`: nothing to close"),
                        }),
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }

    if state == Scan::Str {
        errors.push(ValidationError {
            line: None,
            message: "unterminated string literal".to_string(),
        });
    }
    if let Scan::BlockComment(_) = state {
        errors.push(ValidationError {
            line: None,
            message: "unterminated block comment".to_string(),
        });
    }
    for (opener, opened_at) in open {
        errors.push(ValidationError {
            line: Some(opened_at),
            message: format!("unclosed `{opener}`"),
        });
    }
    errors
}

/// Length of a char literal starting at `'`, or 1 for a lifetime or label.
fn char_literal_len(chars: &[char]) -> usize {
    match chars {
        ['\'', '\\', _, '\'', ..] => 4,
        ['\'', '\\', ..] => chars
            .iter()
            .skip(2)
            .position(|&c| c == '\'')
            .map_or(1, |end| end + 3),
        ['\'', _, '\'', ..] => 3,
        _ => 1,
    }
}

/// Tera renderer over a template directory
#[derive(Debug)]
pub struct SafeRenderer {
    tera: Tera,
    config: RenderConfig,
    validator: OutputValidator,
}

impl SafeRenderer {
    /// Load every `*.tera` template below `dir`.
    pub fn from_directory(dir: &Path, config: RenderConfig) -> Result<Self, RenderingError> {
        if !dir.is_dir() {
            return Err(RenderingError::TemplateRootMissing {
                path: dir.to_path_buf(),
            });
        }
        let pattern = format!("{}/**/*.{}", dir.display(), TEMPLATE_EXTENSION);
        let mut tera = Tera::new(&pattern).map_err(|e| RenderingError::SyntaxError {
            message: error_chain(&e),
        })?;
        tera.autoescape_on(Vec::new());

        tracing::debug!(
            root = %dir.display(),
            templates = tera.get_template_names().count(),
            "templates loaded"
        );

        Ok(Self {
            tera,
            config,
            validator: OutputValidator::new(),
        })
    }

    /// Renderer over in-memory templates, keyed by full template name.
    pub fn from_templates<'a>(
        templates: impl IntoIterator<Item = (&'a str, &'a str)>,
        config: RenderConfig,
    ) -> Result<Self, RenderingError> {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.add_raw_templates(templates)
            .map_err(|e| RenderingError::SyntaxError {
                message: error_chain(&e),
            })?;
        Ok(Self {
            tera,
            config,
            validator: OutputValidator::new(),
        })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|loaded| loaded == name)
    }

    /// Render `name` and validate the result.
    pub fn render_safe(&self, name: &str, context: &Context) -> Result<String, RenderingError> {
        if !self.has_template(name) {
            return Err(RenderingError::TemplateNotFound {
                name: name.to_string(),
            });
        }

        let output = self
            .tera
            .render(name, context)
            .map_err(RenderingError::tera)?;

        if output.len() > self.config.max_output_size {
            return Err(RenderingError::OutputSizeExceeded {
                size: output.len(),
                limit: self.config.max_output_size,
            });
        }

        if self.config.validate_syntax {
            let errors = self.validator.validate(&output);
            if !errors.is_empty() {
                return Err(RenderingError::ValidationFailed {
                    errors: errors.iter().map(ToString::to_string).collect(),
                });
            }
        }

        Ok(output)
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }
}
