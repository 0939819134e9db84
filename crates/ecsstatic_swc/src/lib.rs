pub mod bundler;
pub mod evaluator;
pub mod locator;
pub mod parse;
mod resolve;

pub use bundler::build_snippet;
pub use bundler::BundleOptions;
pub use bundler::DeclarationSnippet;
pub use evaluator::Evaluator;
pub use evaluator::StaticEvaluator;
pub use locator::locate_tag_sites;
pub use locator::LocatedSites;
pub use parse::parse_module;
pub use parse::ParsedModule;
