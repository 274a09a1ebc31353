//! ledgerlens-finance: categorization gateway, analysis engine, and the job pipeline

pub mod analysis;
pub mod classifier;
pub mod pipeline;

pub use analysis::AnalysisEngine;
pub use classifier::{Classifier, KeywordClassifier, LlmClassifier, LlmConfig};
pub use pipeline::{Pipeline, PipelineConfig};
