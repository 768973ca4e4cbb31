pub mod model;
pub mod sink;

pub use model::{AnalysisResult, NumericalWarning, ReportLine, ReportValue, Series};
pub use sink::{LogReportSink, MemoryReportSink, ReportSink, ReportWriter, SeriesSink, SinkRouter};
