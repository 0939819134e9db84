use serde::Deserialize;

use crate::EcsstaticError;

pub const DEFAULT_PACKAGE_NAME: &str = "@acab/ecsstatic";
pub const DEFAULT_CLASS_NAME_PREFIX: &str = "ecsstatic";
pub const DEFAULT_ATOMIC_PREFIX: &str = "_";

fn default_package_name() -> String {
  DEFAULT_PACKAGE_NAME.to_string()
}

fn default_class_name_prefix() -> String {
  DEFAULT_CLASS_NAME_PREFIX.to_string()
}

fn default_extensions() -> Vec<String> {
  [".tsx", ".jsx", ".ts", ".js", ".mts", ".mjs"]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_true() -> bool {
  true
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateExpressionsConfig {
  /// Third-party packages that may be inlined when resolving interpolations
  #[serde(default)]
  pub resolve_packages: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AtomizeFullConfig {
  pub prefix: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AtomizeConfig {
  Enabled(bool),
  Full(AtomizeFullConfig),
}

impl Default for AtomizeConfig {
  fn default() -> Self {
    AtomizeConfig::Enabled(false)
  }
}

impl AtomizeConfig {
  /// The atomic class prefix, if atomization is enabled
  pub fn prefix(&self) -> Option<&str> {
    match self {
      AtomizeConfig::Enabled(false) => None,
      AtomizeConfig::Enabled(true) => Some(DEFAULT_ATOMIC_PREFIX),
      AtomizeConfig::Full(config) => Some(config.prefix.as_deref().unwrap_or(DEFAULT_ATOMIC_PREFIX)),
    }
  }
}

/// Options of the ecsstatic transform
///
/// Read from the `"ecsstatic"` key of the project's package.json.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EcsstaticConfig {
  #[serde(default = "default_package_name")]
  pub package_name: String,

  #[serde(default = "default_class_name_prefix")]
  pub class_name_prefix: String,

  #[serde(default)]
  pub evaluate_expressions: EvaluateExpressionsConfig,

  #[serde(default)]
  pub atomize: AtomizeConfig,

  #[serde(default = "default_true")]
  pub autoprefix: bool,

  #[serde(default = "default_extensions")]
  pub extensions: Vec<String>,
}

impl Default for EcsstaticConfig {
  fn default() -> Self {
    EcsstaticConfig {
      package_name: default_package_name(),
      class_name_prefix: default_class_name_prefix(),
      evaluate_expressions: EvaluateExpressionsConfig::default(),
      atomize: AtomizeConfig::default(),
      autoprefix: true,
      extensions: default_extensions(),
    }
  }
}

impl EcsstaticConfig {
  /// Reject options that would produce invalid selectors
  pub fn validate(&self) -> Result<(), EcsstaticError> {
    if !is_css_identifier_valid(&self.class_name_prefix) {
      return Err(EcsstaticError::Configuration(format!(
        "{} isn't a valid CSS identifier. Accepted characters are ^[a-zA-Z\\-_]+[a-zA-Z\\-_0-9]*$",
        self.class_name_prefix
      )));
    }

    if let Some(prefix) = self.atomize.prefix() {
      if !is_css_identifier_valid(prefix) {
        return Err(EcsstaticError::Configuration(format!(
          "Atomic class prefix {} isn't a valid CSS identifier",
          prefix
        )));
      }
    }

    if self.package_name.is_empty() {
      return Err(EcsstaticError::Configuration(
        "packageName must not be empty".into(),
      ));
    }

    Ok(())
  }

  /// Whether the transform hook should look at a module id
  pub fn accepts(&self, id: &str) -> bool {
    self.extensions.iter().any(|ext| id.ends_with(ext.as_str()))
  }
}

pub fn is_css_identifier_valid(value: &str) -> bool {
  let mut chars = value.chars();
  match chars.next() {
    Some(first) if first.is_ascii_alphabetic() || first == '-' || first == '_' => {
      chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    }
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn deserializes_defaults_from_empty_object() {
    let config: EcsstaticConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, EcsstaticConfig::default());
  }

  #[test]
  fn deserializes_atomize_forms() {
    let config: EcsstaticConfig = serde_json::from_str(r#"{"atomize": true}"#).unwrap();
    assert_eq!(config.atomize.prefix(), Some("_"));

    let config: EcsstaticConfig =
      serde_json::from_str(r#"{"atomize": {"prefix": "a"}}"#).unwrap();
    assert_eq!(config.atomize.prefix(), Some("a"));

    let config: EcsstaticConfig = serde_json::from_str(r#"{"atomize": false}"#).unwrap();
    assert_eq!(config.atomize.prefix(), None);
  }

  #[test]
  fn deserializes_resolve_packages() {
    let config: EcsstaticConfig = serde_json::from_str(
      r#"{"classNamePrefix": "x", "evaluateExpressions": {"resolvePackages": ["open-props"]}}"#,
    )
    .unwrap();

    assert_eq!(config.class_name_prefix, "x");
    assert_eq!(
      config.evaluate_expressions.resolve_packages,
      vec!["open-props".to_string()]
    );
  }

  #[test]
  fn rejects_invalid_prefixes() {
    let config = EcsstaticConfig {
      class_name_prefix: "9lives".into(),
      ..EcsstaticConfig::default()
    };

    assert!(matches!(
      config.validate(),
      Err(EcsstaticError::Configuration(_))
    ));
    assert!(EcsstaticConfig::default().validate().is_ok());
  }

  #[test]
  fn accepts_configured_extensions() {
    let config = EcsstaticConfig::default();

    assert!(config.accepts("/app/src/App.tsx"));
    assert!(!config.accepts("/app/src/styles.css"));
  }
}
