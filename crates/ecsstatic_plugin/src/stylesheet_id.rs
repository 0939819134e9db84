use std::path::Path;

use ecsstatic_core::types::SourceKind;
use ecsstatic_core::types::StyleForm;
use ecsstatic_filesystem::normalize_path;
use ecsstatic_filesystem::to_slash;

/// Drop a `?query` suffix from a module id
pub fn strip_query(id: &str) -> &str {
  id.split_once('?').map_or(id, |(path, _)| path)
}

/// File name of the stylesheet generated for `class_name`
///
/// The class name only hashes the template text, so the form is part of the name: a
/// global or modules template with the same text as a scoped one has different rules.
pub fn stylesheet_file_name(
  class_name: &str,
  source_kind: SourceKind,
  style_form: StyleForm,
) -> String {
  let form = match style_form {
    StyleForm::Scoped => "",
    StyleForm::GlobalUnscoped => ".global",
    StyleForm::Modules => ".module",
  };
  format!("{}{}.acab.{}", class_name, form, source_kind.extension()).to_lowercase()
}

/// Id of the stylesheet generated for `class_name`, next to the source file
pub fn virtual_stylesheet_id(
  source: &Path,
  class_name: &str,
  source_kind: SourceKind,
  style_form: StyleForm,
) -> String {
  let file_name = stylesheet_file_name(class_name, source_kind, style_form);
  let path = match source.parent() {
    Some(dir) => dir.join(file_name),
    None => Path::new(&file_name).to_path_buf(),
  };
  to_slash(&normalize_path(&path))
}

/// Candidate id for a stylesheet specifier
///
/// Relative specifiers are joined to the importer's directory and root-absolute ones to
/// the project root. Anything other than a `.css` or `.scss` specifier is not a
/// candidate.
pub fn stylesheet_candidate(specifier: &str, importer: &str, project_root: &Path) -> Option<String> {
  let specifier = strip_query(specifier);
  if !(specifier.ends_with(".css") || specifier.ends_with(".scss")) {
    return None;
  }

  let path = if specifier.starts_with("./") || specifier.starts_with("../") {
    Path::new(strip_query(importer)).parent()?.join(specifier)
  } else if let Some(rooted) = specifier.strip_prefix('/') {
    if Path::new(specifier).starts_with(project_root) {
      Path::new(specifier).to_path_buf()
    } else {
      project_root.join(rooted)
    }
  } else {
    Path::new(specifier).to_path_buf()
  };

  Some(to_slash(&normalize_path(&path)))
}
