use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use anyhow::Context;
use ecsstatic_core::config_loader::load_config;
use ecsstatic_core::plugin::BundlerPlugin;
use ecsstatic_filesystem::normalize_path;
use ecsstatic_filesystem::os_file_system::OsFileSystem;
use ecsstatic_filesystem::to_slash;
use ecsstatic_filesystem::FileSystem;
use ecsstatic_filesystem::FileSystemRef;
use ecsstatic_plugin::EcsstaticPlugin;
use rayon::iter::IntoParallelRefIterator;
use rayon::iter::ParallelIterator;

use crate::CliArgs;

#[derive(Debug, Default)]
pub struct BuildReport {
  /// Modules that contained style templates
  pub transformed: Vec<PathBuf>,
  /// Modules copied to the output as they were
  pub unchanged: Vec<PathBuf>,
  /// Stylesheets written to the output directory
  pub stylesheets: Vec<PathBuf>,
  pub failures: Vec<(PathBuf, anyhow::Error)>,
}

impl BuildReport {
  pub fn is_success(&self) -> bool {
    self.failures.is_empty()
  }
}

enum FileOutcome {
  Transformed,
  Unchanged,
}

struct Build<'a> {
  fs: FileSystemRef,
  plugin: &'a EcsstaticPlugin,
  root: PathBuf,
  out_dir: PathBuf,
}

impl Build<'_> {
  /// Output location of a file that lives under the project root
  fn output_path(&self, path: &Path) -> anyhow::Result<PathBuf> {
    let relative = path.strip_prefix(&self.root).map_err(|_| {
      anyhow!(
        "{} is outside the project root {}",
        path.display(),
        self.root.display()
      )
    })?;

    Ok(self.out_dir.join(relative))
  }

  fn transform_file(&self, path: &Path) -> anyhow::Result<FileOutcome> {
    let code = self
      .fs
      .read_to_string(path)
      .with_context(|| format!("Failed to read {}", path.display()))?;
    let output_path = self.output_path(path)?;

    let Some(output) = self.plugin.transform(&code, &to_slash(path))? else {
      self.fs.write(&output_path, code.as_bytes())?;
      return Ok(FileOutcome::Unchanged);
    };

    let mut map_name = output_path
      .file_name()
      .map(|name| name.to_os_string())
      .unwrap_or_default();
    map_name.push(".map");
    let map_path = output_path.with_file_name(&map_name);

    let code = format!(
      "{}\n//# sourceMappingURL={}\n",
      output.code.trim_end(),
      map_name.to_string_lossy()
    );
    self.fs.write(&output_path, code.as_bytes())?;
    self.fs.write(&map_path, output.map.as_bytes())?;

    Ok(FileOutcome::Transformed)
  }
}

/// Transform every file of the command line in parallel and write the results
///
/// A file that fails is reported and skipped, the other files are still written. Only
/// problems that affect the whole build, such as invalid options, are returned as errors.
pub fn run(args: &CliArgs) -> anyhow::Result<BuildReport> {
  let start = Instant::now();
  let fs: FileSystemRef = Arc::new(OsFileSystem);
  let cwd = fs.cwd()?;
  let root = normalize_path(&cwd.join(&args.root));
  let out_dir = normalize_path(&root.join(&args.out_dir));

  let mut config = load_config(&*fs, &root)
    .with_context(|| format!("Failed to load ecsstatic options from {}", root.display()))?;
  args.apply_overrides(&mut config);
  let plugin = EcsstaticPlugin::new(config, root.clone(), fs.clone())?;

  let build = Build {
    fs,
    plugin: &plugin,
    root,
    out_dir,
  };
  let files: Vec<PathBuf> = args
    .files
    .iter()
    .map(|file| normalize_path(&cwd.join(file)))
    .collect();

  plugin.build_start();

  let outcomes: Vec<(PathBuf, anyhow::Result<FileOutcome>)> = files
    .par_iter()
    .map(|file| (file.clone(), build.transform_file(file)))
    .collect();

  let mut report = BuildReport::default();
  for (file, outcome) in outcomes {
    match outcome {
      Ok(FileOutcome::Transformed) => report.transformed.push(file),
      Ok(FileOutcome::Unchanged) => report.unchanged.push(file),
      Err(error) => {
        tracing::error!("{:#}", error);
        report.failures.push((file, error));
      }
    }
  }

  for (id, css) in plugin.registry().entries() {
    let written = build
      .output_path(Path::new(&id))
      .and_then(|path| {
        build.fs.write(&path, css.as_bytes())?;
        Ok(path)
      })
      .with_context(|| format!("Failed to write stylesheet {}", id));

    match written {
      Ok(path) => report.stylesheets.push(path),
      Err(error) => {
        tracing::error!("{:#}", error);
        report.failures.push((PathBuf::from(id), error));
      }
    }
  }

  plugin.build_end();

  tracing::info!(
    transformed = report.transformed.len(),
    unchanged = report.unchanged.len(),
    stylesheets = report.stylesheets.len(),
    failed = report.failures.len(),
    "Finished in {:?}",
    start.elapsed()
  );

  Ok(report)
}
