use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

pub mod in_memory_file_system;
pub mod os_file_system;

mod path;

pub use path::normalize_path;
pub use path::to_slash;

/// Shared handle held by the plugin for the whole build
pub type FileSystemRef = Arc<dyn FileSystem + Send + Sync>;

/// Trait abstracting the file-system operations the expression resolver and the
/// configuration loader need
pub trait FileSystem: std::fmt::Debug {
  fn cwd(&self) -> std::io::Result<PathBuf>;
  fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
  fn is_file(&self, path: &Path) -> bool;
  fn is_dir(&self, path: &Path) -> bool;

  /// Write a file, creating missing parent directories
  fn write(&self, path: &Path, _contents: &[u8]) -> std::io::Result<()> {
    Err(std::io::Error::new(
      std::io::ErrorKind::Unsupported,
      format!("Read-only file system, cannot write {}", path.display()),
    ))
  }
}
