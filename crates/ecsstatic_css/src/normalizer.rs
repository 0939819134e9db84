use ecsstatic_core::types::SourceKind;
use ecsstatic_core::types::StyleForm;
use ecsstatic_core::NormalizeError;
use indexmap::IndexMap;
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::MinifyOptions;
use lightningcss::stylesheet::ParserFlags;
use lightningcss::stylesheet::ParserOptions;
use lightningcss::stylesheet::StyleSheet;
use lightningcss::targets::Browsers;
use lightningcss::targets::Features;
use lightningcss::targets::Targets;

use crate::modules::rename_local_classes;
use crate::sass;

/// Support matrix used for vendor prefixing
const AUTOPREFIX_QUERY: &str = "last 2 versions";

#[derive(Clone, Debug)]
pub struct NormalizeOptions<'a> {
  pub class_name: &'a str,
  pub source_kind: SourceKind,
  pub style_form: StyleForm,
  pub autoprefix: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedStyle {
  pub css: String,
  /// Local classes of a modules template, empty for other forms
  pub local_classes: IndexMap<String, String>,
}

/// Separate top-level `@import`/`@use` lines from the rest of the style text
///
/// Directives are returned trimmed, in order. The body keeps its original lines.
pub fn split_directives(text: &str) -> (Vec<&str>, String) {
  let mut directives = Vec::new();
  let mut body = Vec::new();

  for line in text.lines() {
    let trimmed = line.trim_start();
    if trimmed.starts_with("@import") || trimmed.starts_with("@use") {
      directives.push(trimmed.trim_end());
    } else {
      body.push(line);
    }
  }

  (directives, body.join("\n"))
}

/// Turn author-written style text into the stylesheet registered for it
///
/// Scoped templates are wrapped in `.<class_name>{...}`. Global templates are used as
/// written. Modules templates have their local classes renamed and are not wrapped.
/// Plain CSS is flattened (and optionally prefixed) with lightningcss, Sass-like text is
/// validated and kept for the host's Sass toolchain.
pub fn normalize_style(
  text: &str,
  options: &NormalizeOptions<'_>,
) -> Result<NormalizedStyle, NormalizeError> {
  let (directives, body) = split_directives(text.trim());

  let (body, local_classes) = match options.style_form {
    StyleForm::Scoped => (format!(".{}{{{}}}", options.class_name, body), IndexMap::new()),
    StyleForm::GlobalUnscoped => (body, IndexMap::new()),
    StyleForm::Modules => {
      let renamed = rename_local_classes(&body, options.class_name);
      (renamed.css, renamed.classes)
    }
  };

  let mut unprocessed = directives.join("\n");
  if !unprocessed.is_empty() {
    unprocessed.push('\n');
  }
  unprocessed.push_str(&body);

  let css = match options.source_kind {
    SourceKind::PlainCss => flatten(&unprocessed, options.autoprefix)?,
    SourceKind::SassLike => {
      sass::validate(&unprocessed)?;
      unprocessed
    }
  };

  tracing::debug!(
    class_name = options.class_name,
    form = ?options.style_form,
    "Normalized style"
  );

  Ok(NormalizedStyle { css, local_classes })
}

fn targets(autoprefix: bool) -> Targets {
  let browsers = if autoprefix {
    match Browsers::from_browserslist([AUTOPREFIX_QUERY]) {
      Ok(browsers) => browsers,
      Err(error) => {
        tracing::warn!("Failed to resolve browser targets, skipping prefixes: {}", error);
        None
      }
    }
  } else {
    None
  };

  Targets {
    browsers,
    // Nesting is always lowered, whatever the browser targets support
    include: Features::Nesting,
    exclude: Features::empty(),
  }
}

fn flatten(css: &str, autoprefix: bool) -> Result<String, NormalizeError> {
  let targets = targets(autoprefix);

  let mut stylesheet = StyleSheet::parse(
    css,
    ParserOptions {
      flags: ParserFlags::NESTING,
      error_recovery: false,
      ..ParserOptions::default()
    },
  )
  .map_err(|error| {
    let (line, column) = error
      .loc
      .as_ref()
      .map(|loc| (loc.line + 1, loc.column))
      .unwrap_or((1, 1));
    NormalizeError {
      message: error.kind.to_string(),
      line,
      column,
    }
  })?;

  stylesheet
    .minify(MinifyOptions {
      targets,
      ..MinifyOptions::default()
    })
    .map_err(|error| NormalizeError {
      message: error.kind.to_string(),
      line: error.loc.as_ref().map_or(1, |loc| loc.line + 1),
      column: error.loc.as_ref().map_or(1, |loc| loc.column),
    })?;

  let result = stylesheet
    .to_css(PrinterOptions {
      minify: true,
      targets,
      ..PrinterOptions::default()
    })
    .map_err(|error| NormalizeError {
      message: error.kind.to_string(),
      line: error.loc.as_ref().map_or(1, |loc| loc.line + 1),
      column: error.loc.as_ref().map_or(1, |loc| loc.column),
    })?;

  Ok(result.code)
}
