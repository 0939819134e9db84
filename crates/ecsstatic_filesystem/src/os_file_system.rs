use std::path::Path;
use std::path::PathBuf;

use crate::FileSystem;

#[derive(Default, Debug)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
  fn cwd(&self) -> std::io::Result<PathBuf> {
    std::env::current_dir()
  }

  fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
    std::fs::read_to_string(path)
  }

  fn is_file(&self, path: &Path) -> bool {
    path.is_file()
  }

  fn is_dir(&self, path: &Path) -> bool {
    path.is_dir()
  }

  fn write(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn writes_into_missing_directories() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested/deeper/file.txt");
    let fs = OsFileSystem;

    fs.write(&target, b"hello").unwrap();

    assert!(fs.is_file(&target));
    assert!(fs.is_dir(&dir.path().join("nested")));
    assert_eq!(fs.read_to_string(&target).unwrap(), "hello");
  }
}
