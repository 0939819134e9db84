use std::fmt::Debug;

use serde::Serialize;

/// Result of a transform hook that changed the module
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransformOutput {
  /// The rewritten source
  pub code: String,
  /// Version 3 source map from the rewritten source back to the input
  pub map: String,
}

/// The hook surface a host bundler drives
///
/// Hooks take `&self` because per-file transforms may run concurrently within a build.
/// Implementations keep their per-build state behind interior mutability.
pub trait BundlerPlugin: Debug + Send + Sync {
  fn name(&self) -> &str;

  /// Called once before any module of a build is transformed
  fn build_start(&self) {}

  /// Called once after the last module of a build has been transformed
  fn build_end(&self) {}

  /// Map a specifier to a canonical id this plugin owns
  fn resolve_id(&self, _specifier: &str, _importer: Option<&str>) -> Option<String> {
    None
  }

  /// Contents of an id previously returned by `resolve_id`
  fn load(&self, _id: &str) -> Option<String> {
    None
  }

  /// Rewrite one module
  ///
  /// `Ok(None)` means the module is left untouched.
  fn transform(&self, code: &str, id: &str) -> Result<Option<TransformOutput>, anyhow::Error>;
}
