use std::path::PathBuf;

use clap::Parser;
use ecsstatic_core::config::AtomizeConfig;
use ecsstatic_core::config::AtomizeFullConfig;
use ecsstatic_core::config::EcsstaticConfig;

/// Extract ecsstatic style templates into static stylesheets
#[derive(Clone, Debug, Parser)]
#[command(name = "ecsstatic", version)]
pub struct CliArgs {
  /// Modules to transform
  #[arg(required = true)]
  pub files: Vec<PathBuf>,

  /// Project root, where package.json options are read from
  #[arg(long, default_value = ".")]
  pub root: PathBuf,

  /// Where rewritten modules, source maps and stylesheets are written
  #[arg(long = "out-dir", default_value = "dist")]
  pub out_dir: PathBuf,

  /// Prefix of generated class names
  #[arg(long)]
  pub prefix: Option<String>,

  /// Split scoped CSS templates into atomic classes
  #[arg(long)]
  pub atomize: bool,

  /// Prefix of atomic class names, implies --atomize
  #[arg(long = "atomic-prefix")]
  pub atomic_prefix: Option<String>,

  /// Package that may be inlined when evaluating interpolations
  #[arg(long = "resolve-package")]
  pub resolve_packages: Vec<String>,

  /// Skip vendor prefixing
  #[arg(long = "no-autoprefix")]
  pub no_autoprefix: bool,

  /// Log every extracted template
  #[arg(short, long)]
  pub verbose: bool,
}

impl CliArgs {
  /// Layer the command line flags over the options read from package.json
  pub fn apply_overrides(&self, config: &mut EcsstaticConfig) {
    if let Some(prefix) = &self.prefix {
      config.class_name_prefix = prefix.clone();
    }

    if let Some(prefix) = &self.atomic_prefix {
      config.atomize = AtomizeConfig::Full(AtomizeFullConfig {
        prefix: Some(prefix.clone()),
      });
    } else if self.atomize && config.atomize.prefix().is_none() {
      config.atomize = AtomizeConfig::Enabled(true);
    }

    for package in &self.resolve_packages {
      if !config.evaluate_expressions.resolve_packages.contains(package) {
        config.evaluate_expressions.resolve_packages.push(package.clone());
      }
    }

    if self.no_autoprefix {
      config.autoprefix = false;
    }
  }
}
