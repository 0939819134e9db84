use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

/// Lexically normalize a path, resolving `.` and `..` without touching the disk.
///
/// Virtual stylesheets never exist on disk, so `canonicalize` cannot be used for them.
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut normalized = PathBuf::new();

  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !normalized.pop() {
          normalized.push("..");
        }
      }
      other => normalized.push(other.as_os_str()),
    }
  }

  normalized
}

/// Render a path with forward slashes on every platform
pub fn to_slash(path: &Path) -> String {
  path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn removes_current_dir_components() {
    assert_eq!(
      normalize_path(Path::new("/app/./src/./a.css")),
      PathBuf::from("/app/src/a.css")
    );
  }

  #[test]
  fn resolves_parent_dir_components() {
    assert_eq!(
      normalize_path(Path::new("/app/src/components/../styles/a.css")),
      PathBuf::from("/app/src/styles/a.css")
    );
  }

  #[test]
  fn keeps_leading_parent_dirs_of_relative_paths() {
    assert_eq!(normalize_path(Path::new("../a/b/../c")), PathBuf::from("../a/c"));
  }
}
