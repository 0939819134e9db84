pub mod config;
pub mod config_loader;
pub mod error;
pub mod plugin;
pub mod text_edits;
pub mod types;

pub use error::*;
