use std::process::ExitCode;

use clap::Parser;
use ecsstatic_cli::run;
use ecsstatic_cli::CliArgs;
use tracing::Level;

fn main() -> ExitCode {
  let args = CliArgs::parse();

  tracing_subscriber::fmt()
    .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
    .with_target(false)
    .init();

  match run(&args) {
    Ok(report) if report.is_success() => ExitCode::SUCCESS,
    Ok(report) => {
      tracing::error!(failed = report.failures.len(), "Build finished with errors");
      ExitCode::FAILURE
    }
    Err(error) => {
      tracing::error!("{:?}", error);
      ExitCode::FAILURE
    }
  }
}
