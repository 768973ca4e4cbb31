use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use leadstat::{
    AnalysisConfig, AnalysisPipeline, LogReportSink, MatrixLoader, ReportSink, ReportWriter,
};

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

struct Args {
    data: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let data = args
        .next()
        .map(PathBuf::from)
        .context("usage: leadstat <data.csv> [config.json]")?;
    let config = args.next().map(PathBuf::from);
    if let Some(extra) = args.next() {
        anyhow::bail!("Unexpected extra argument: {extra}");
    }
    Ok(Args { data, config })
}

fn report_path(data: &Path) -> PathBuf {
    data.with_extension("report.json")
}

fn main() -> Result<()> {
    init_logging();
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => AnalysisConfig::from_path(path)
            .with_context(|| format!("load analysis config {:?}", path))?,
        None => AnalysisConfig::default(),
    };
    config.validate()?;

    let matrix = MatrixLoader::new(config.channels)
        .from_path(&args.data)
        .with_context(|| format!("load samples from {:?}", args.data))?;
    info!(
        "Loaded {} observations over {} channels from {:?}",
        matrix.rows(),
        matrix.channels(),
        args.data
    );

    let pipeline = AnalysisPipeline::new(config);
    let prepared = pipeline.prepare(matrix);
    let report = pipeline.run(&prepared);

    let mut sink = LogReportSink;
    for result in &report.results {
        sink.emit(result)?;
    }
    for failure in &report.failures {
        warn!("{} analysis failed: {}", failure.kind, failure.error);
    }

    let output = report_path(&args.data);
    ReportWriter::write_to_path(&report.results, &output)
        .with_context(|| format!("write analysis report to {:?}", output))?;
    info!(
        "Wrote {} results to {:?} in {:?}",
        report.results.len(),
        output,
        report.elapsed
    );
    Ok(())
}
