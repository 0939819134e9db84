pub mod orchestrator;
mod plugin;
pub mod registry;
pub mod stylesheet_id;

pub use orchestrator::transform_module;
pub use orchestrator::GeneratedStylesheet;
pub use orchestrator::TransformContext;
pub use orchestrator::TransformedModule;
pub use plugin::*;
pub use registry::RegistryEvent;
pub use registry::StyleRegistry;
