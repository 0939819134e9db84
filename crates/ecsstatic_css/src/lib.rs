pub mod atomizer;
pub mod modules;
pub mod normalizer;
mod sass;

pub use atomizer::atomize;
pub use atomizer::AtomizedStyle;
pub use modules::rename_local_classes;
pub use normalizer::normalize_style;
pub use normalizer::split_directives;
pub use normalizer::NormalizeOptions;
pub use normalizer::NormalizedStyle;
