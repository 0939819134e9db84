use std::collections::HashMap;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::normalize_path;
use crate::FileSystem;

#[derive(Debug, Default)]
struct Tree {
  files: HashMap<PathBuf, String>,
  /// Every ancestor of a written file
  dirs: HashSet<PathBuf>,
}

/// Project tree held in memory, used to run transforms against fixture files
///
/// Relative paths resolve against a working directory that starts at the root.
#[derive(Debug)]
pub struct InMemoryFileSystem {
  tree: RwLock<Tree>,
  cwd: RwLock<PathBuf>,
}

impl Default for InMemoryFileSystem {
  fn default() -> Self {
    let root = if cfg!(windows) { "C:/" } else { "/" };

    InMemoryFileSystem {
      tree: RwLock::new(Tree::default()),
      cwd: RwLock::new(PathBuf::from(root)),
    }
  }
}

impl InMemoryFileSystem {
  pub fn set_current_working_directory(&self, cwd: &Path) {
    let cwd = self.absolute(cwd);
    *self.cwd.write() = cwd;
  }

  pub fn write_file(&self, path: &Path, contents: impl Into<String>) {
    let path = self.absolute(path);
    let mut tree = self.tree.write();

    tree
      .dirs
      .extend(path.ancestors().skip(1).map(Path::to_path_buf));
    tree.files.insert(path, contents.into());
  }

  fn absolute(&self, path: &Path) -> PathBuf {
    normalize_path(&self.cwd.read().join(path))
  }
}

impl FileSystem for InMemoryFileSystem {
  fn cwd(&self) -> io::Result<PathBuf> {
    Ok(self.cwd.read().clone())
  }

  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    let path = self.absolute(path);
    let tree = self.tree.read();

    if let Some(contents) = tree.files.get(&path) {
      return Ok(contents.clone());
    }

    let kind = if tree.dirs.contains(&path) {
      io::ErrorKind::InvalidInput
    } else {
      io::ErrorKind::NotFound
    };
    Err(io::Error::new(kind, format!("No file at {}", path.display())))
  }

  fn is_file(&self, path: &Path) -> bool {
    self.tree.read().files.contains_key(&self.absolute(path))
  }

  fn is_dir(&self, path: &Path) -> bool {
    self.tree.read().dirs.contains(&self.absolute(path))
  }

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    let contents = std::str::from_utf8(contents)
      .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    self.write_file(path, contents);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn reads_written_files() {
    let fs = InMemoryFileSystem::default();
    fs.write_file(Path::new("/app/src/theme.ts"), "export const a = 1;");

    assert_eq!(
      fs.read_to_string(Path::new("/app/src/theme.ts")).unwrap(),
      "export const a = 1;"
    );
    assert!(fs.is_file(Path::new("/app/src/theme.ts")));
    assert!(fs.is_dir(Path::new("/app/src")));
    assert!(fs.is_dir(Path::new("/app")));
    assert!(!fs.is_file(Path::new("/app/src")));
  }

  #[test]
  fn reports_missing_files_and_directories() {
    let fs = InMemoryFileSystem::default();
    fs.write_file(Path::new("/app/package.json"), "{}");

    assert_eq!(
      fs.read_to_string(Path::new("/app/missing.ts")).unwrap_err().kind(),
      io::ErrorKind::NotFound
    );
    assert_eq!(
      fs.read_to_string(Path::new("/app")).unwrap_err().kind(),
      io::ErrorKind::InvalidInput
    );
  }

  #[test]
  fn resolves_relative_paths_against_the_working_directory() {
    let fs = InMemoryFileSystem::default();
    fs.set_current_working_directory(Path::new("/app"));
    fs.write_file(Path::new("src/a.ts"), "export const a = 1;");

    assert!(fs.is_file(Path::new("/app/src/a.ts")));
    assert!(fs.is_file(Path::new("./src/../src/a.ts")));
    assert_eq!(fs.cwd().unwrap(), PathBuf::from("/app"));
  }

  #[test]
  fn rejects_binary_writes() {
    let fs = InMemoryFileSystem::default();

    assert!(fs.write(Path::new("/a.css"), &[0xff, 0xfe]).is_err());
    assert!(fs.write(Path::new("/b.css"), b".a{color:red}").is_ok());
    assert!(fs.is_file(Path::new("/b.css")));
  }
}
