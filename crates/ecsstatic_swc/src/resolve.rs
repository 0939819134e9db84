use std::path::Path;
use std::path::PathBuf;

use ecsstatic_core::ResolveCause;
use ecsstatic_filesystem::normalize_path;
use ecsstatic_filesystem::FileSystem;

/// Extensions tried, in order, for extensionless specifiers
pub(crate) const RESOLVE_EXTENSIONS: [&str; 6] = [".ts", ".tsx", ".js", ".jsx", ".mjs", ".mts"];

#[derive(Debug, PartialEq)]
pub(crate) enum Resolution {
  /// A module inlined into the snippet
  File(PathBuf),
  /// A package that stays opaque
  External(String),
}

/// Package name of a bare specifier, `@scope/name` or `name`
pub(crate) fn package_name(specifier: &str) -> &str {
  let mut slashes = specifier.match_indices('/');
  let end = if specifier.starts_with('@') {
    slashes.nth(1)
  } else {
    slashes.next()
  };

  match end {
    Some((index, _)) => &specifier[..index],
    None => specifier,
  }
}

fn is_relative(specifier: &str) -> bool {
  specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." || specifier == ".."
}

fn resolve_file(fs: &dyn FileSystem, base: &Path) -> Option<PathBuf> {
  let base = normalize_path(base);
  if fs.is_file(&base) {
    return Some(base);
  }

  let as_string = base.to_string_lossy();
  for extension in RESOLVE_EXTENSIONS {
    let candidate = PathBuf::from(format!("{}{}", as_string, extension));
    if fs.is_file(&candidate) {
      return Some(candidate);
    }
  }

  if fs.is_dir(&base) {
    for extension in RESOLVE_EXTENSIONS {
      let candidate = base.join(format!("index{}", extension));
      if fs.is_file(&candidate) {
        return Some(candidate);
      }
    }
  }

  None
}

fn package_entry(fs: &dyn FileSystem, package_dir: &Path) -> Option<PathBuf> {
  let manifest = fs.read_to_string(&package_dir.join("package.json")).ok();
  let manifest = manifest.and_then(|contents| serde_json::from_str::<serde_json::Value>(&contents).ok());

  let fields = ["module", "main"];
  for field in fields {
    let entry = manifest
      .as_ref()
      .and_then(|manifest| manifest.get(field))
      .and_then(|entry| entry.as_str());
    if let Some(resolved) = entry.and_then(|entry| resolve_file(fs, &package_dir.join(entry))) {
      return Some(resolved);
    }
  }

  resolve_file(fs, &package_dir.join("index.js"))
}

fn resolve_package(fs: &dyn FileSystem, importer: &Path, specifier: &str) -> Option<PathBuf> {
  let name = package_name(specifier);
  let subpath = specifier[name.len()..].trim_start_matches('/');

  let mut dir = importer.parent();
  while let Some(current) = dir {
    let package_dir = current.join("node_modules").join(name);
    if fs.is_dir(&package_dir) {
      return if subpath.is_empty() {
        package_entry(fs, &package_dir)
      } else {
        resolve_file(fs, &package_dir.join(subpath))
      };
    }
    dir = current.parent();
  }

  None
}

/// Resolve an import specifier found in `importer`
///
/// Relative and absolute specifiers always resolve to files. Bare specifiers resolve to
/// files only when their package is listed in `resolve_packages`.
pub(crate) fn resolve_specifier(
  fs: &dyn FileSystem,
  importer: &Path,
  specifier: &str,
  resolve_packages: &[String],
) -> Result<Resolution, ResolveCause> {
  let not_found = || ResolveCause::ModuleNotFound {
    specifier: specifier.to_string(),
    importer: importer.to_path_buf(),
  };

  if is_relative(specifier) {
    let base = importer.parent().unwrap_or(importer).join(specifier);
    return resolve_file(fs, &base).map(Resolution::File).ok_or_else(not_found);
  }

  if specifier.starts_with('/') {
    return resolve_file(fs, Path::new(specifier))
      .map(Resolution::File)
      .ok_or_else(not_found);
  }

  let name = package_name(specifier);
  if !resolve_packages.iter().any(|package| package == name) {
    return Ok(Resolution::External(name.to_string()));
  }

  resolve_package(fs, importer, specifier)
    .map(Resolution::File)
    .ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
  use ecsstatic_filesystem::in_memory_file_system::InMemoryFileSystem;
  use pretty_assertions::assert_eq;

  use super::*;

  fn resolve(fs: &InMemoryFileSystem, specifier: &str, packages: &[&str]) -> Result<Resolution, ResolveCause> {
    let packages: Vec<String> = packages.iter().map(|package| package.to_string()).collect();
    resolve_specifier(fs, Path::new("/app/src/App.tsx"), specifier, &packages)
  }

  #[test]
  fn splits_package_names() {
    assert_eq!(package_name("open-props"), "open-props");
    assert_eq!(package_name("open-props/src/colors"), "open-props");
    assert_eq!(package_name("@scope/pkg/sub"), "@scope/pkg");
  }

  #[test]
  fn resolves_relative_files_with_extensions_and_index() {
    let fs = InMemoryFileSystem::default();
    fs.write_file(Path::new("/app/src/tokens.ts"), "");
    fs.write_file(Path::new("/app/src/theme/index.tsx"), "");
    fs.write_file(Path::new("/app/shared.js"), "");

    assert_eq!(
      resolve(&fs, "./tokens", &[]),
      Ok(Resolution::File(PathBuf::from("/app/src/tokens.ts")))
    );
    assert_eq!(
      resolve(&fs, "./theme", &[]),
      Ok(Resolution::File(PathBuf::from("/app/src/theme/index.tsx")))
    );
    assert_eq!(
      resolve(&fs, "../shared.js", &[]),
      Ok(Resolution::File(PathBuf::from("/app/shared.js")))
    );
    assert!(matches!(
      resolve(&fs, "./missing", &[]),
      Err(ResolveCause::ModuleNotFound { .. })
    ));
  }

  #[test]
  fn keeps_unlisted_packages_external() {
    let fs = InMemoryFileSystem::default();

    assert_eq!(
      resolve(&fs, "open-props/colors", &[]),
      Ok(Resolution::External("open-props".to_string()))
    );
  }

  #[test]
  fn resolves_listed_packages_through_node_modules() {
    let fs = InMemoryFileSystem::default();
    fs.write_file(
      Path::new("/app/node_modules/open-props/package.json"),
      r#"{"main": "dist/index.cjs", "module": "dist/index.mjs"}"#,
    );
    fs.write_file(Path::new("/app/node_modules/open-props/dist/index.mjs"), "");
    fs.write_file(Path::new("/app/node_modules/open-props/src/colors.js"), "");

    assert_eq!(
      resolve(&fs, "open-props", &["open-props"]),
      Ok(Resolution::File(PathBuf::from(
        "/app/node_modules/open-props/dist/index.mjs"
      )))
    );
    assert_eq!(
      resolve(&fs, "open-props/src/colors", &["open-props"]),
      Ok(Resolution::File(PathBuf::from(
        "/app/node_modules/open-props/src/colors.js"
      )))
    );
  }
}
