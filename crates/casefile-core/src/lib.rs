//! Casefile Core — analysis data model, cost model, configuration, errors.

pub mod analysis;
pub mod config;
pub mod cost;
pub mod error;
pub mod tier;

pub use analysis::{
    AnalysisResult, ConnectionMention, EventMention, PersonMention, DEFAULT_DOCUMENT_TYPE,
};
pub use config::{CasefileConfig, DataPaths, PipelineConfig};
pub use cost::CostModel;
pub use error::{Error, Result};
pub use tier::AnalysisTier;
