use std::path::Path;

use ecsstatic_core::config::EcsstaticConfig;
use ecsstatic_core::text_edits::TextEdits;
use ecsstatic_core::types::SourceKind;
use ecsstatic_core::types::StyleForm;
use ecsstatic_core::types::TaggedTemplateSite;
use ecsstatic_core::EcsstaticError;
use ecsstatic_core::ResolveError;
use ecsstatic_css::atomize;
use ecsstatic_css::normalize_style;
use ecsstatic_css::NormalizeOptions;
use ecsstatic_filesystem::to_slash;
use ecsstatic_filesystem::FileSystem;
use ecsstatic_hash::class_name_for;
use ecsstatic_swc::build_snippet;
use ecsstatic_swc::locate_tag_sites;
use ecsstatic_swc::parse::parse_module_with_scopes;
use ecsstatic_swc::BundleOptions;
use ecsstatic_swc::Evaluator;
use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::stylesheet_id::stylesheet_file_name;
use crate::stylesheet_id::virtual_stylesheet_id;

/// What a module transform needs besides the module itself
#[derive(Clone, Copy, Debug)]
pub struct TransformContext<'a> {
  pub config: &'a EcsstaticConfig,
  pub fs: &'a dyn FileSystem,
  pub evaluator: &'a dyn Evaluator,
}

/// A stylesheet extracted from one tagged template
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedStylesheet {
  pub id: String,
  pub class_name: String,
  pub source_kind: SourceKind,
  pub style_form: StyleForm,
  pub css: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransformedModule {
  pub code: String,
  /// Version 3 source map JSON
  pub map: String,
  /// In source order, one per distinct class name
  pub stylesheets: Vec<GeneratedStylesheet>,
}

/// Text that takes the place of a style template in the rewritten module
fn replacement(
  site: &TaggedTemplateSite,
  class_list: &str,
  local_classes: &IndexMap<String, String>,
) -> String {
  match site.binding.style_form {
    StyleForm::Scoped => format!("\"{}\"", class_list),
    // A global template used as a value still needs an expression in its place
    StyleForm::GlobalUnscoped => match site.original_name {
      Some(_) => "undefined".to_string(),
      None => String::new(),
    },
    StyleForm::Modules => {
      let entries: Vec<String> = local_classes
        .iter()
        .map(|(local, generated)| {
          format!(
            "{}: \"{}\"",
            serde_json::to_string(local).unwrap_or_else(|_| format!("\"{}\"", local)),
            generated
          )
        })
        .collect();
      format!("{{{}}}", entries.join(", "))
    }
  }
}

/// Evaluate every interpolation of the file in one batch, split back per site
fn resolve_interpolations(
  context: &TransformContext<'_>,
  file_path: &Path,
  code: &str,
  sites: &[TaggedTemplateSite],
) -> Result<Vec<Vec<String>>, EcsstaticError> {
  let expressions: Vec<String> = sites
    .iter()
    .flat_map(|site| site.interpolations().map(|interpolation| interpolation.source.clone()))
    .collect();

  let snippet = build_snippet(
    context.fs,
    file_path,
    code,
    &BundleOptions {
      package_name: &context.config.package_name,
      resolve_packages: &context.config.evaluate_expressions.resolve_packages,
    },
  )
  .map_err(|cause| {
    ResolveError::new(
      expressions.first().map(String::as_str).unwrap_or_default(),
      cause,
    )
  })?;

  let mut values = context.evaluator.evaluate(&snippet, &expressions)?.into_iter();
  Ok(
    sites
      .iter()
      .map(|site| values.by_ref().take(site.interpolations().count()).collect())
      .collect(),
  )
}

/// Extract the style templates of one module
///
/// Returns `Ok(None)` when the module does not use a style tag. On error nothing is
/// returned for the module at all, not even the stylesheets of templates that did succeed.
pub fn transform_module(
  context: &TransformContext<'_>,
  code: &str,
  file_path: &Path,
) -> Result<Option<TransformedModule>, EcsstaticError> {
  let file_name = to_slash(file_path);
  let config = context.config;

  let parsed = parse_module_with_scopes(code, &file_name)?;
  let located = locate_tag_sites(&parsed, &config.package_name);
  if located.bindings.is_empty() {
    return Ok(None);
  }
  if located.sites.is_empty() {
    tracing::debug!(file = %file_name, "Style tags imported but never used");
    return Ok(None);
  }

  let values = if located.sites.iter().any(TaggedTemplateSite::has_interpolations) {
    resolve_interpolations(context, file_path, code, &located.sites)?
  } else {
    vec![Vec::new(); located.sites.len()]
  };

  let atomic_prefix = config.atomize.prefix();
  let mut edits = TextEdits::new();
  let mut stylesheets: IndexMap<String, GeneratedStylesheet> = IndexMap::new();

  for (site, values) in located.sites.iter().zip(&values) {
    let text = site.template_text(values);
    let class_name = class_name_for(&config.class_name_prefix, &text);
    let source_kind = site.binding.source_kind;
    let style_form = site.binding.style_form;

    let normalized = normalize_style(
      &text,
      &NormalizeOptions {
        class_name: &class_name,
        source_kind,
        style_form,
        autoprefix: config.autoprefix,
      },
    )?;

    let (css, class_list) = match atomic_prefix {
      Some(prefix) if style_form == StyleForm::Scoped && source_kind == SourceKind::PlainCss => {
        let atomized = atomize(&normalized.css, &class_name, prefix)?;
        let class_list = atomized.class_list();
        (atomized.css, class_list)
      }
      _ => (normalized.css, class_name.clone()),
    };

    tracing::debug!(
      file = %file_name,
      name = site.display_name(),
      class_name = %class_name,
      "Extracted style template"
    );

    let id = virtual_stylesheet_id(file_path, &class_name, source_kind, style_form);
    stylesheets.entry(id.clone()).or_insert(GeneratedStylesheet {
      id,
      class_name: class_name.clone(),
      source_kind,
      style_form,
      css,
    });

    // A template nested in another template's interpolation is replaced along with it
    let nested = located
      .sites
      .iter()
      .any(|other| other.span != site.span && other.span.contains(&site.span));
    if !nested {
      edits.replace(site.span, replacement(site, &class_list, &normalized.local_classes));
    }
  }

  for stylesheet in stylesheets.values() {
    edits.append(format!(
      "import \"./{}\";",
      stylesheet_file_name(
        &stylesheet.class_name,
        stylesheet.source_kind,
        stylesheet.style_form
      )
    ));
  }

  // An import whose tag is still referenced as a value is kept
  for alias in &located.value_uses {
    tracing::warn!(
      file = %file_name,
      alias = %alias,
      "Style tag used outside a tagged template, keeping its import"
    );
  }
  let kept_imports: IndexSet<_> = located
    .bindings
    .iter()
    .filter(|binding| located.value_uses.contains(&binding.local_alias))
    .map(|binding| binding.import_span)
    .collect();
  let import_spans: IndexSet<_> = located
    .bindings
    .iter()
    .map(|binding| binding.import_span)
    .filter(|span| !kept_imports.contains(span))
    .collect();
  for span in import_spans {
    edits.remove(span);
  }

  let edited = edits.apply(code, &file_name)?;

  tracing::debug!(
    file = %file_name,
    sites = located.sites.len(),
    stylesheets = stylesheets.len(),
    "Transformed module"
  );

  Ok(Some(TransformedModule {
    code: edited.code,
    map: edited.map,
    stylesheets: stylesheets.into_values().collect(),
  }))
}
