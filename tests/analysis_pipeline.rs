use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use leadstat::{
    AnalysisConfig, AnalysisKind, AnalysisPipeline, AnalysisResult, MatrixLoader, OneWayAnova,
    ReportWriter, SampleMatrix, Series, SinkRouter,
};
use proptest::prelude::*;

fn temp_path(name: &str, extension: &str) -> PathBuf {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("leadstat_{}_{}.{}", name, epoch, extension));
    path
}

fn lead_csv(channels: usize, rows: usize) -> String {
    let mut text = String::new();
    for i in 0..rows {
        let t = i as f64 / rows as f64;
        let values: Vec<String> = (0..channels)
            .map(|c| {
                let phase = c as f64 * 0.4;
                let value = (2.0 * std::f64::consts::PI * 3.0 * t + phase).sin()
                    + 0.3 * (2.0 * std::f64::consts::PI * 11.0 * t * (c as f64 + 1.0)).cos()
                    + 0.05 * c as f64;
                format!("{value:.6}")
            })
            .collect();
        text.push_str(&values.join(","));
        text.push('\n');
    }
    text
}

fn small_config(channels: usize) -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.channels = channels;
    config.cluster_counts = vec![4, 2];
    config.clustering.seed = Some(2024);
    config
}

#[test]
fn csv_to_json_report_end_to_end() -> Result<()> {
    let data_path = temp_path("samples", "csv");
    let report_path = temp_path("samples", "report.json");
    fs::write(&data_path, lead_csv(4, 60))?;

    let config = small_config(4);
    let matrix = MatrixLoader::new(config.channels).from_path(&data_path)?;
    assert_eq!(matrix.rows(), 60);
    assert_eq!(matrix.channels(), 4);

    let pipeline = AnalysisPipeline::new(config);
    let report = pipeline.run(&pipeline.prepare(matrix));
    assert!(report.failures.is_empty(), "{:?}", report.failures);

    ReportWriter::write_to_path(&report.results, &report_path)?;
    let parsed: Vec<AnalysisResult> = serde_json::from_str(&fs::read_to_string(&report_path)?)?;
    let titles: Vec<&str> = parsed.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "descriptive statistics",
            "one-way variance analysis",
            "two-factor variance analysis",
            "correlation analysis",
            "factor analysis",
            "cluster analysis",
            "fourier analysis",
        ]
    );

    let factor = &parsed[4];
    let total: f64 = (1..=4)
        .map(|c| factor.number(&format!("explained {c} %")).unwrap_or(0.0))
        .sum();
    assert!((total - 100.0).abs() < 1e-4);

    fs::remove_file(&data_path)?;
    fs::remove_file(&report_path)?;
    Ok(())
}

#[test]
fn config_file_overrides_defaults() -> Result<()> {
    let path = temp_path("config", "json");
    fs::write(
        &path,
        r#"{"channels": 4, "correlation_threshold": 0.5, "cluster_counts": [2]}"#,
    )?;
    let config = AnalysisConfig::from_path(&path)?;
    assert_eq!(config.channels, 4);
    assert_eq!(config.correlation_threshold, 0.5);
    assert_eq!(config.cluster_counts, vec![2]);
    assert_eq!(config.principal_series, 3);

    fs::write(&path, r#"{"cluster_counts": []}"#)?;
    assert!(AnalysisConfig::from_path(&path).is_err());
    fs::remove_file(&path)?;
    Ok(())
}

#[test]
fn router_delivers_fourier_series() -> Result<()> {
    let matrix = MatrixLoader::new(3).from_csv_str(&lead_csv(3, 32))?;
    let pipeline = AnalysisPipeline::new(small_config(3));
    let report = pipeline.run_selected(&pipeline.prepare(matrix), &[AnalysisKind::Fourier]);
    assert_eq!(report.results.len(), 1);

    let spectrum_len = Rc::new(RefCell::new(0usize));
    let captured = Rc::clone(&spectrum_len);
    let others = Rc::new(RefCell::new(Vec::new()));
    let fallback = Rc::clone(&others);
    let mut router = SinkRouter::new()
        .route("spectrum 1", move |series: &Series| {
            *captured.borrow_mut() = series.len();
            Ok::<(), anyhow::Error>(())
        })
        .with_fallback(move |series: &Series| {
            fallback.borrow_mut().push(series.name.clone());
            Ok::<(), anyhow::Error>(())
        });

    let delivered = router.dispatch(&report.results[0])?;
    assert_eq!(delivered, 6);
    assert_eq!(*spectrum_len.borrow(), 17);
    assert!(others.borrow().contains(&"restored 3".to_string()));
    Ok(())
}

#[test]
fn loader_errors_name_the_row() {
    let err = MatrixLoader::new(3)
        .from_csv_str("1,2,3\n4,5,6\n7,8\n")
        .unwrap_err();
    assert_eq!(err.to_string(), "Row 3: has 2 values, expected 3");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn one_way_f_ignores_uniform_shift(
        first in proptest::collection::vec(-10.0f64..10.0, 100),
        second in proptest::collection::vec(-10.0f64..10.0, 100),
    ) {
        let matrix = SampleMatrix::from_channels(&[first, second]).unwrap();
        let shifted = matrix.map(|x| x + 5.0);
        let before = OneWayAnova::compute(&matrix).unwrap().f_statistic;
        let after = OneWayAnova::compute(&shifted).unwrap().f_statistic;
        match (before, after) {
            (Some(before), Some(after)) => prop_assert!((before - after).abs() < 1e-9),
            (None, None) => {}
            other => prop_assert!(false, "F changed definedness: {:?}", other),
        }
    }
}
