mod args;
mod build;

pub use args::CliArgs;
pub use build::run;
pub use build::BuildReport;
