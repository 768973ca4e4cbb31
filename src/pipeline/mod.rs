pub mod preprocess;
pub mod workflow;

pub use preprocess::PreparedMatrix;
pub use workflow::{AnalysisKind, AnalysisPipeline, PipelineFailure, PipelineReport};
