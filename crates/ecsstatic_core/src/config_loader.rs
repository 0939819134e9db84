use std::path::Path;

use ecsstatic_filesystem::FileSystem;
use serde::Deserialize;

use crate::config::EcsstaticConfig;
use crate::EcsstaticError;

#[derive(Deserialize)]
struct PackageJson {
  ecsstatic: Option<EcsstaticConfig>,
}

/// Load the transform configuration from `<project_root>/package.json`
///
/// A missing package.json or a missing `"ecsstatic"` key yields the defaults.
pub fn load_config(
  fs: &dyn FileSystem,
  project_root: &Path,
) -> Result<EcsstaticConfig, EcsstaticError> {
  let package_json_path = project_root.join("package.json");

  if !fs.is_file(&package_json_path) {
    tracing::debug!(path = ?package_json_path, "No package.json, using default config");
    return Ok(EcsstaticConfig::default());
  }

  let contents = fs.read_to_string(&package_json_path)?;
  let package_json: PackageJson = serde_json::from_str(&contents).map_err(|error| {
    EcsstaticError::Configuration(format!(
      "Failed to parse {}: {}",
      package_json_path.display(),
      error
    ))
  })?;

  let config = package_json.ecsstatic.unwrap_or_default();
  config.validate()?;

  Ok(config)
}
