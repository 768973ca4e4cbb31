pub mod clustering;
pub mod config;
pub mod correlation;
pub mod error;
pub mod factor;
pub mod matrix;
pub mod pipeline;
pub mod report;
pub mod spectral;
pub mod stats;

pub use clustering::{ClusterAssignment, ClusterStudy, KMeans};
pub use config::{AnalysisConfig, ClusterConfig, TwoFactorDesign};
pub use correlation::{CorrelationAnalysis, CorrelationMatrix, NormalizedMatrix, SignificantPair};
pub use error::AnalysisError;
pub use factor::{EigenDecomposition, FactorAnalysis};
pub use matrix::{MatrixLoader, SampleMatrix};
pub use pipeline::{AnalysisKind, AnalysisPipeline, PipelineReport, PreparedMatrix};
pub use report::{
    AnalysisResult, LogReportSink, NumericalWarning, ReportLine, ReportSink, ReportValue,
    ReportWriter, Series, SeriesSink, SinkRouter,
};
pub use spectral::{ChannelSpectrum, FourierAnalysis, FourierCoefficients};
pub use stats::{ChannelSummary, DescriptiveStatistics, OneWayAnova, TwoFactorAnova};
