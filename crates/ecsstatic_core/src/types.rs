use std::fmt::Display;
use std::fmt::Formatter;

use serde::Serialize;

/// Byte range into the original source text of one file
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Span {
  pub start: usize,
  pub end: usize,
}

impl Span {
  pub fn new(start: usize, end: usize) -> Self {
    Span { start, end }
  }

  pub fn contains(&self, other: &Span) -> bool {
    self.start <= other.start && other.end <= self.end && self != other
  }

  pub fn is_empty(&self) -> bool {
    self.start >= self.end
  }
}

impl Display for Span {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}..{}", self.start, self.end)
  }
}

/// Dialect of the style text inside a template
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize)]
pub enum SourceKind {
  PlainCss,
  SassLike,
}

impl SourceKind {
  /// Extension of the generated stylesheet
  pub fn extension(&self) -> &'static str {
    match self {
      SourceKind::PlainCss => "css",
      SourceKind::SassLike => "scss",
    }
  }
}

/// What a tagged template produces at its call site
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize)]
pub enum StyleForm {
  /// One generated class name
  Scoped,
  /// Styles applied verbatim, the call site produces no value
  GlobalUnscoped,
  /// An object mapping each local class in the template to its generated name
  Modules,
}

/// One import specifier that binds a style-authoring tag in a file
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize)]
pub struct TagBinding {
  /// Local name the tag is bound to, `foo` in `import { css as foo }`
  pub local_alias: String,
  pub source_kind: SourceKind,
  pub style_form: StyleForm,
  /// Span of the whole import declaration this specifier belongs to
  pub import_span: Span,
}

/// An interpolated expression inside a tagged template
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Interpolation {
  pub span: Span,
  /// The expression source text, as written by the author
  pub source: String,
}

/// A literal chunk of a template followed by the interpolation after it, if any
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuasiPart {
  /// Raw literal text
  pub literal: String,
  pub interpolation: Option<Interpolation>,
}

/// One discovered `tag\`...\`` occurrence
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaggedTemplateSite {
  /// Span of the whole tagged template expression, tag included
  pub span: Span,
  pub quasis: Vec<QuasiPart>,
  pub binding: TagBinding,
  /// Variable or object property the template is assigned to, when syntactically obvious
  pub original_name: Option<String>,
}

impl TaggedTemplateSite {
  pub fn has_interpolations(&self) -> bool {
    self
      .quasis
      .iter()
      .any(|quasi| quasi.interpolation.is_some())
  }

  pub fn interpolations(&self) -> impl Iterator<Item = &Interpolation> {
    self
      .quasis
      .iter()
      .filter_map(|quasi| quasi.interpolation.as_ref())
  }

  /// Rebuild the template text, substituting interpolations in order
  ///
  /// Missing values are substituted with an empty string.
  pub fn template_text(&self, values: &[String]) -> String {
    let mut text = String::new();
    let mut values = values.iter();

    for quasi in &self.quasis {
      text.push_str(&quasi.literal);
      if quasi.interpolation.is_some() {
        if let Some(value) = values.next() {
          text.push_str(value);
        }
      }
    }

    text
  }

  /// Name used in diagnostics
  pub fn display_name(&self) -> &str {
    self
      .original_name
      .as_deref()
      .unwrap_or(self.binding.local_alias.as_str())
  }
}

/// Exports of the style-authoring module, per import source
///
/// `package_name` is the canonical module, `<package_name>/scss` and
/// `<package_name>/modules` are its subpath entry points.
pub fn tag_kind(
  package_name: &str,
  import_source: &str,
  export_name: &str,
) -> Option<(SourceKind, StyleForm)> {
  let subpath = import_source.strip_prefix(package_name)?;

  match (subpath, export_name) {
    ("", "css") => Some((SourceKind::PlainCss, StyleForm::Scoped)),
    ("", "scss") => Some((SourceKind::SassLike, StyleForm::Scoped)),
    ("", "createGlobalStyle") => Some((SourceKind::PlainCss, StyleForm::GlobalUnscoped)),
    ("/scss", "css" | "scss") => Some((SourceKind::SassLike, StyleForm::Scoped)),
    ("/scss", "createGlobalStyle") => Some((SourceKind::SassLike, StyleForm::GlobalUnscoped)),
    ("/modules", "css") => Some((SourceKind::PlainCss, StyleForm::Modules)),
    ("/modules", "scss") => Some((SourceKind::SassLike, StyleForm::Modules)),
    _ => None,
  }
}

/// Whether an import source refers to the style-authoring module or one of its subpaths
pub fn is_style_module(package_name: &str, import_source: &str) -> bool {
  import_source
    .strip_prefix(package_name)
    .is_some_and(|subpath| matches!(subpath, "" | "/scss" | "/modules"))
}
