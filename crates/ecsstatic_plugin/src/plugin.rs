use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Error;
use ecsstatic_core::config::EcsstaticConfig;
use ecsstatic_core::config_loader::load_config;
use ecsstatic_core::plugin::BundlerPlugin;
use ecsstatic_core::plugin::TransformOutput;
use ecsstatic_filesystem::FileSystemRef;
use ecsstatic_swc::Evaluator;
use ecsstatic_swc::StaticEvaluator;

use crate::orchestrator::transform_module;
use crate::orchestrator::TransformContext;
use crate::registry::StyleRegistry;
use crate::stylesheet_id::strip_query;
use crate::stylesheet_id::stylesheet_candidate;

/// Extracts `@acab/ecsstatic` style templates into virtual stylesheets
///
/// The transform hook rewrites modules and fills the registry, `resolve_id` and `load`
/// serve the registered stylesheets back to the host bundler.
#[derive(Debug)]
pub struct EcsstaticPlugin {
  config: EcsstaticConfig,
  project_root: PathBuf,
  fs: FileSystemRef,
  evaluator: Arc<dyn Evaluator>,
  registry: Arc<StyleRegistry>,
}

impl EcsstaticPlugin {
  pub fn new(config: EcsstaticConfig, project_root: PathBuf, fs: FileSystemRef) -> Result<Self, Error> {
    config.validate()?;

    let evaluator = Arc::new(StaticEvaluator::new(config.class_name_prefix.clone()));

    Ok(EcsstaticPlugin {
      config,
      project_root,
      fs,
      evaluator,
      registry: Arc::new(StyleRegistry::new()),
    })
  }

  /// Create the plugin with the options found in the project's package.json
  pub fn from_project(project_root: PathBuf, fs: FileSystemRef) -> Result<Self, Error> {
    let config = load_config(&*fs, &project_root)
      .with_context(|| format!("Failed to load ecsstatic options from {}", project_root.display()))?;

    EcsstaticPlugin::new(config, project_root, fs)
  }

  /// Evaluate interpolations with another evaluator
  pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
    self.evaluator = evaluator;
    self
  }

  pub fn config(&self) -> &EcsstaticConfig {
    &self.config
  }

  pub fn registry(&self) -> Arc<StyleRegistry> {
    self.registry.clone()
  }
}

impl BundlerPlugin for EcsstaticPlugin {
  fn name(&self) -> &str {
    "ecsstatic"
  }

  fn build_start(&self) {
    self.registry.clear();
  }

  fn build_end(&self) {
    tracing::info!(stylesheets = self.registry.len(), "Build finished");
    self.registry.clear();
  }

  fn resolve_id(&self, specifier: &str, importer: Option<&str>) -> Option<String> {
    let candidate = stylesheet_candidate(specifier, importer?, &self.project_root)?;
    self.registry.contains(&candidate).then_some(candidate)
  }

  fn load(&self, id: &str) -> Option<String> {
    self.registry.get(strip_query(id))
  }

  fn transform(&self, code: &str, id: &str) -> Result<Option<TransformOutput>, Error> {
    let id = strip_query(id);
    if !self.config.accepts(id) {
      return Ok(None);
    }

    let context = TransformContext {
      config: &self.config,
      fs: &*self.fs,
      evaluator: &*self.evaluator,
    };

    let transformed = transform_module(&context, code, Path::new(id))
      .with_context(|| format!("Failed to transform {}", id))?;

    let Some(transformed) = transformed else {
      // The module may have registered stylesheets before an edit removed its templates
      self.registry.invalidate_source(id);
      return Ok(None);
    };

    self.registry.replace_for_source(
      id,
      transformed
        .stylesheets
        .into_iter()
        .map(|stylesheet| (stylesheet.id, stylesheet.css)),
    );

    Ok(Some(TransformOutput {
      code: transformed.code,
      map: transformed.map,
    }))
  }
}
