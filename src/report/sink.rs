use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info};

use crate::report::model::{AnalysisResult, Series};

/// Receives the textual part of an analysis result.
pub trait ReportSink {
    fn emit(&mut self, result: &AnalysisResult) -> Result<()>;
}

/// Receives one named series at a time for rendering.
pub trait SeriesSink {
    fn plot(&mut self, series: &Series) -> Result<()>;
}

impl<F> SeriesSink for F
where
    F: FnMut(&Series) -> Result<()>,
{
    fn plot(&mut self, series: &Series) -> Result<()> {
        self(series)
    }
}

/// Routes series to sinks registered by series name.
///
/// Series without a registered sink go to the fallback when one is set and
/// are skipped otherwise.
#[derive(Default)]
pub struct SinkRouter {
    routes: IndexMap<String, Box<dyn SeriesSink>>,
    fallback: Option<Box<dyn SeriesSink>>,
}

impl SinkRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, series: impl Into<String>, sink: impl SeriesSink + 'static) -> Self {
        self.routes.insert(series.into(), Box::new(sink));
        self
    }

    pub fn with_fallback(mut self, sink: impl SeriesSink + 'static) -> Self {
        self.fallback = Some(Box::new(sink));
        self
    }

    pub fn is_routed(&self, series: &str) -> bool {
        self.routes.contains_key(series)
    }

    /// Deliver every series of `result`, returning how many reached a sink.
    pub fn dispatch(&mut self, result: &AnalysisResult) -> Result<usize> {
        let mut delivered = 0;
        for (name, series) in &result.series {
            if let Some(sink) = self.routes.get_mut(name) {
                sink.plot(series)
                    .with_context(|| format!("plot series '{}'", name))?;
                delivered += 1;
            } else if let Some(fallback) = self.fallback.as_mut() {
                fallback
                    .plot(series)
                    .with_context(|| format!("plot series '{}' on fallback sink", name))?;
                delivered += 1;
            } else {
                debug!("No sink registered for series '{}'", name);
            }
        }
        Ok(delivered)
    }
}

/// Writes report lines and warnings through the `log` facade.
#[derive(Debug, Default)]
pub struct LogReportSink;

impl ReportSink for LogReportSink {
    fn emit(&mut self, result: &AnalysisResult) -> Result<()> {
        info!("== {} ==", result.title);
        for line in &result.lines {
            info!("  {}", line);
        }
        for warning in &result.warnings {
            info!("  warning: {}", warning);
        }
        Ok(())
    }
}

/// Collects emitted results in memory.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    pub results: Vec<AnalysisResult>,
}

impl ReportSink for MemoryReportSink {
    fn emit(&mut self, result: &AnalysisResult) -> Result<()> {
        self.results.push(result.clone());
        Ok(())
    }
}

/// Serializes analysis results to JSON.
pub struct ReportWriter;

impl ReportWriter {
    pub fn to_json_string(results: &[AnalysisResult]) -> Result<String> {
        Ok(serde_json::to_string_pretty(results)?)
    }

    pub fn write_to_path(results: &[AnalysisResult], path: &Path) -> Result<()> {
        let json = Self::to_json_string(results)?;
        let mut file =
            File::create(path).with_context(|| format!("create report file {:?}", path))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("write report file {:?}", path))?;
        Ok(())
    }
}
