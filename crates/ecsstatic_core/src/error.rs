use std::path::PathBuf;

use thiserror::Error;

/// Message thrown by the runtime stubs when the build transform was not applied
pub const CONFIGURATION_ERROR_MESSAGE: &str =
  "ecsstatic: the style tags are not meant to run at runtime. Make sure the ecsstatic build plugin is configured.";

pub type EcsstaticResult<T> = std::result::Result<T, EcsstaticError>;

#[derive(Error, Debug)]
pub enum EcsstaticError {
  #[error("Configuration error: {0}")]
  Configuration(String),

  #[error("{}", .0)]
  Resolution(#[from] ResolveError),

  #[error("{}", .0)]
  Normalization(#[from] NormalizeError),

  #[error("{}", .0)]
  Parse(#[from] ParseError),

  #[error("{}", .0)]
  Edit(#[from] EditError),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

/// Why an interpolated expression could not be evaluated
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ResolveCause {
  #[error("{0} is not defined")]
  UnresolvedReference(String),

  #[error(
    "package {0} is not listed in evaluateExpressions.resolvePackages and cannot be evaluated"
  )]
  ExternalPackage(String),

  #[error("Cannot resolve module {specifier} from {importer}")]
  ModuleNotFound { specifier: String, importer: PathBuf },

  #[error("Circular reference while evaluating {0}")]
  Cycle(String),

  #[error("Syntax error: {0}")]
  Syntax(String),

  #[error("{0}")]
  Runtime(String),

  #[error("Unsupported expression: {0}")]
  Unsupported(String),
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("Failed to resolve expression `{expression}`: {cause}")]
pub struct ResolveError {
  /// Expression source, as written in the template
  pub expression: String,
  pub cause: ResolveCause,
}

impl ResolveError {
  pub fn new(expression: impl Into<String>, cause: ResolveCause) -> Self {
    ResolveError {
      expression: expression.into(),
      cause,
    }
  }
}

/// Malformed style text, located relative to the text given to the normalizer
#[derive(Clone, Debug, Error, PartialEq)]
#[error("Invalid style syntax at {line}:{column}: {message}")]
pub struct NormalizeError {
  pub message: String,
  /// 1-based
  pub line: u32,
  /// 1-based
  pub column: u32,
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("Failed to parse {file}: {message}")]
pub struct ParseError {
  pub file: String,
  pub message: String,
  pub line: u32,
  pub column: u32,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum EditError {
  #[error("Edit {0} overlaps edit {1}")]
  Overlap(crate::types::Span, crate::types::Span),

  #[error("Edit {span} is out of bounds for a source of length {len}")]
  OutOfBounds { span: crate::types::Span, len: usize },

  #[error("Edit {0} does not fall on a character boundary")]
  CharBoundary(crate::types::Span),

  #[error("Failed to serialize source map: {0}")]
  SourceMap(String),
}
