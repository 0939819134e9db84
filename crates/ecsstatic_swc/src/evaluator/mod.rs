use std::fmt::Debug;

use ecsstatic_core::config::DEFAULT_CLASS_NAME_PREFIX;
use ecsstatic_core::ResolveCause;
use ecsstatic_core::ResolveError;
use ecsstatic_filesystem::to_slash;

use crate::bundler::DeclarationSnippet;
use crate::parse::parse_expression;

mod builtins;
mod interpreter;
pub mod value;

use interpreter::Interpreter;

/// Computes the values of template interpolations at build time
///
/// Implementations receive the declaration snippet of the file being transformed and the
/// source text of each interpolation, and return one stringified value per expression, in
/// the same order. Evaluation must not perform I/O or run code outside the snippet.
pub trait Evaluator: Debug + Send + Sync {
  fn evaluate(
    &self,
    snippet: &DeclarationSnippet,
    expressions: &[String],
  ) -> Result<Vec<String>, ResolveError>;
}

/// Evaluator that interprets the snippet's declarations directly
///
/// Covers literals, templates, object and array values, arithmetic, conditionals and calls
/// to functions declared in the snippet, plus a small set of globals (`Math`, `String`,
/// `Number`, `Object`, `JSON`, `parseInt`, `parseFloat`). Anything else is reported as
/// unsupported instead of guessed.
#[derive(Clone, Debug)]
pub struct StaticEvaluator {
  class_name_prefix: String,
}

impl StaticEvaluator {
  /// `class_name_prefix` must match the one used to name the registered stylesheets, so
  /// that a style template referenced from another template resolves to its real class
  pub fn new(class_name_prefix: impl Into<String>) -> Self {
    StaticEvaluator {
      class_name_prefix: class_name_prefix.into(),
    }
  }
}

impl Default for StaticEvaluator {
  fn default() -> Self {
    StaticEvaluator::new(DEFAULT_CLASS_NAME_PREFIX)
  }
}

impl Evaluator for StaticEvaluator {
  fn evaluate(
    &self,
    snippet: &DeclarationSnippet,
    expressions: &[String],
  ) -> Result<Vec<String>, ResolveError> {
    let first_expression = expressions.first().map(String::as_str).unwrap_or_default();
    let interpreter = Interpreter::new(snippet, &self.class_name_prefix)
      .map_err(|cause| ResolveError::new(first_expression, cause))?;
    let file_name = to_slash(&snippet.entry);

    expressions
      .iter()
      .map(|expression| {
        let expr = parse_expression(expression, &file_name)
          .map_err(|error| ResolveError::new(expression, ResolveCause::Syntax(error.message)))?;
        let value = interpreter
          .evaluate(&expr)
          .map_err(|cause| ResolveError::new(expression, cause))?;

        tracing::trace!(expression = %expression, value = %value, "Evaluated interpolation");
        Ok(value.to_js_string())
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use ecsstatic_filesystem::in_memory_file_system::InMemoryFileSystem;
  use ecsstatic_hash::class_name_for;
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::bundler::build_snippet;
  use crate::bundler::BundleOptions;

  const ENTRY: &str = "/app/src/Button.tsx";

  fn evaluate_with(
    fs: &InMemoryFileSystem,
    code: &str,
    packages: &[&str],
    expressions: &[&str],
  ) -> Result<Vec<String>, ResolveError> {
    let packages: Vec<String> = packages.iter().map(|package| package.to_string()).collect();
    let snippet = build_snippet(
      fs,
      Path::new(ENTRY),
      code,
      &BundleOptions {
        package_name: "@acab/ecsstatic",
        resolve_packages: &packages,
      },
    )
    .unwrap();
    let expressions: Vec<String> = expressions.iter().map(|expr| expr.to_string()).collect();

    StaticEvaluator::default().evaluate(&snippet, &expressions)
  }

  fn evaluate(code: &str, expressions: &[&str]) -> Result<Vec<String>, ResolveError> {
    evaluate_with(&InMemoryFileSystem::default(), code, &[], expressions)
  }

  #[test]
  fn inlines_local_constants() {
    let values = evaluate(
      "import { css } from '@acab/ecsstatic';\nconst accent = '#fff';\nconst button = css`color: ${accent};`;",
      &["accent"],
    );

    assert_eq!(values, Ok(vec!["#fff".to_string()]));
  }

  #[test]
  fn evaluates_arithmetic_and_templates() {
    let values = evaluate(
      "const base = 4;\nconst unit = 'px';",
      &["`${base * 2}${unit}`", "base / 8", "0.1 + 0.2", "Math.max(1, base) * 2", "base > 2 ? 'big' : 'small'"],
    );

    assert_eq!(
      values,
      Ok(vec![
        "8px".to_string(),
        "0.5".to_string(),
        "0.30000000000000004".to_string(),
        "8".to_string(),
        "big".to_string(),
      ])
    );
  }

  #[test]
  fn follows_relative_imports() {
    let fs = InMemoryFileSystem::default();
    fs.write_file(
      Path::new("/app/src/tokens.ts"),
      "export const colors = { primary: 'hotpink' };\nexport const spacing = (n: number) => `${n * 4}px`;\nexport default 'serif';",
    );
    fs.write_file(Path::new("/app/src/theme.json"), r#"{ "radius": 6 }"#);

    let values = evaluate_with(
      &fs,
      "import font, { colors, spacing } from './tokens';\nimport * as tokens from './tokens';\nimport theme from './theme.json';",
      &[],
      &["colors.primary", "spacing(2)", "font", "tokens.colors.primary", "`${theme.radius}px`"],
    );

    assert_eq!(
      values,
      Ok(vec![
        "hotpink".to_string(),
        "8px".to_string(),
        "serif".to_string(),
        "hotpink".to_string(),
        "6px".to_string(),
      ])
    );
  }

  #[test]
  fn follows_reexports() {
    let fs = InMemoryFileSystem::default();
    fs.write_file(Path::new("/app/src/tokens/colors.ts"), "export const red = 'crimson';");
    fs.write_file(
      Path::new("/app/src/tokens/index.ts"),
      "export * from './colors';\nexport { red as danger } from './colors';",
    );

    let values = evaluate_with(
      &fs,
      "import { red, danger } from './tokens';",
      &[],
      &["red", "danger"],
    );

    assert_eq!(values, Ok(vec!["crimson".to_string(), "crimson".to_string()]));
  }

  #[test]
  fn rejects_packages_that_are_not_allowed() {
    let values = evaluate("import props from 'open-props';", &["props.blue"]);

    assert_eq!(
      values,
      Err(ResolveError::new(
        "props.blue",
        ResolveCause::ExternalPackage("open-props".into())
      ))
    );
  }

  #[test]
  fn follows_allowed_packages() {
    let fs = InMemoryFileSystem::default();
    fs.write_file(
      Path::new("/app/node_modules/open-props/package.json"),
      r#"{ "main": "index.js" }"#,
    );
    fs.write_file(
      Path::new("/app/node_modules/open-props/index.js"),
      "export const blue = '#4dabf7';",
    );

    let values = evaluate_with(
      &fs,
      "import { blue } from 'open-props';",
      &["open-props"],
      &["blue"],
    );

    assert_eq!(values, Ok(vec!["#4dabf7".to_string()]));
  }

  #[test]
  fn reports_missing_modules_when_used() {
    let values = evaluate("import { gap } from './missing';\nconst a = 1;", &["a", "gap"]);

    let error = values.unwrap_err();
    assert_eq!(error.expression, "gap");
    assert!(matches!(error.cause, ResolveCause::ModuleNotFound { .. }));
  }

  #[test]
  fn reports_cycles() {
    let values = evaluate("const a = b + 1;\nconst b = a + 1;", &["a"]);

    assert!(matches!(values.unwrap_err().cause, ResolveCause::Cycle(_)));
  }

  #[test]
  fn reports_unknown_references() {
    let values = evaluate("const a = 1;", &["window.innerWidth"]);

    assert_eq!(
      values.unwrap_err().cause,
      ResolveCause::UnresolvedReference("window".into())
    );
  }

  #[test]
  fn never_runs_side_effects() {
    let values = evaluate("const now = new Date();", &["now"]);

    assert!(matches!(values.unwrap_err().cause, ResolveCause::Unsupported(_)));
  }

  #[test]
  fn resolves_style_templates_to_their_class_names() {
    let values = evaluate(
      "import { css } from '@acab/ecsstatic';\nconst accent = 'red';\nconst button = css`color: ${accent};`;",
      &["button"],
    );

    assert_eq!(values, Ok(vec![class_name_for("ecsstatic", "color: red;")]));
  }

  #[test]
  fn fails_oversized_strings_without_allocating_them() {
    let values = evaluate("const fill = 'a';", &["fill.repeat(1e19)"]);

    let error = values.unwrap_err();
    assert_eq!(error.expression, "fill.repeat(1e19)");
    assert_eq!(error.cause, ResolveCause::Runtime("Invalid string length".into()));
  }

  #[test]
  fn rejects_style_tags_called_as_functions() {
    let values = evaluate(
      "import { css } from '@acab/ecsstatic';\nconst button = css('color: red;');",
      &["button"],
    );

    assert_eq!(
      values.unwrap_err().cause,
      ResolveCause::Runtime(ecsstatic_core::CONFIGURATION_ERROR_MESSAGE.to_string())
    );
  }

  #[test]
  fn resolves_modules_templates_to_their_class_maps() {
    let values = evaluate(
      "import { css } from '@acab/ecsstatic/modules';\nconst styles = css`.title { color: red; }`;",
      &["styles.title"],
    );

    let class_name = class_name_for("ecsstatic", ".title { color: red; }");
    assert_eq!(values, Ok(vec![format!("{}_title", class_name)]));
  }

  #[test]
  fn calls_declared_functions() {
    let values = evaluate(
      r#"
const scale = { sm: 2, md: 4 } as const;
function gap(size: keyof typeof scale): string {
  if (size === 'sm') {
    return '2px';
  }
  const { [size]: value = 0 } = scale;
  return `${value}px`;
}
const sizes = [1, 2, 3];
"#,
      &[
        "gap('md')",
        "gap('sm')",
        "sizes.map((n) => `${n}rem`).join(' ')",
        "sizes.reduce((sum, n) => sum + n, 0)",
        "Object.keys(scale).length",
      ],
    );

    assert_eq!(
      values,
      Ok(vec![
        "4px".to_string(),
        "2px".to_string(),
        "1rem 2rem 3rem".to_string(),
        "6".to_string(),
        "2".to_string(),
      ])
    );
  }

  #[test]
  fn supports_optional_chains_and_nullish_defaults() {
    let values = evaluate(
      "const theme = { dark: undefined, light: { bg: 'white' } };",
      &["theme.dark?.bg ?? 'black'", "theme.light?.bg", "theme.dark?.bg.toUpperCase()"],
    );

    assert_eq!(
      values,
      Ok(vec![
        "black".to_string(),
        "white".to_string(),
        "undefined".to_string(),
      ])
    );
  }

  #[test]
  fn reports_syntax_errors_in_expressions() {
    let values = evaluate("const a = 1;", &["a +"]);

    assert!(matches!(values.unwrap_err().cause, ResolveCause::Syntax(_)));
  }
}
