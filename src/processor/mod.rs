pub mod category_classifier;
pub mod html_processor;
pub mod reconciler;
pub mod rule_normalizer;
pub mod sql_emitter;

pub use category_classifier::*;
pub use html_processor::*;
pub use reconciler::*;
pub use rule_normalizer::*;
pub use sql_emitter::*;
