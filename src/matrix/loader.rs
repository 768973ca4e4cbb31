use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::AnalysisError;
use crate::matrix::model::SampleMatrix;

/// Parses comma-separated sample records into a [`SampleMatrix`].
///
/// Each non-blank line is one observation. Decimal points are always `.`,
/// independent of locale.
#[derive(Debug, Clone)]
pub struct MatrixLoader {
    channels: usize,
}

impl Default for MatrixLoader {
    fn default() -> Self {
        Self::new(12)
    }
}

impl MatrixLoader {
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn from_csv_str(&self, text: &str) -> Result<SampleMatrix, AnalysisError> {
        let mut rows = Vec::new();
        for (row_idx, line) in text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
        {
            rows.push(self.parse_row(row_idx + 1, line)?);
        }
        if rows.is_empty() {
            return Err(AnalysisError::input_format(0, "input contains no data rows"));
        }
        SampleMatrix::from_rows(&rows)
    }

    pub fn from_reader<R: Read>(&self, mut reader: R) -> Result<SampleMatrix> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Ok(self.from_csv_str(&buf)?)
    }

    pub fn from_path(&self, path: &Path) -> Result<SampleMatrix> {
        let file = File::open(path).with_context(|| format!("open sample file {:?}", path))?;
        self.from_reader(file)
            .with_context(|| format!("parse sample file {:?}", path))
    }

    fn parse_row(&self, row: usize, line: &str) -> Result<Vec<f64>, AnalysisError> {
        let tokens: Vec<&str> = line.split(',').collect();
        if tokens.len() != self.channels {
            return Err(AnalysisError::input_format(
                row,
                format!(
                    "has {} values, expected {}",
                    tokens.len(),
                    self.channels
                ),
            ));
        }
        tokens
            .iter()
            .enumerate()
            .map(|(col, token)| {
                let trimmed = token.trim();
                match trimmed.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    Ok(_) => Err(AnalysisError::input_format(
                        row,
                        format!("column {} holds non-finite value '{}'", col + 1, trimmed),
                    )),
                    Err(_) => Err(AnalysisError::input_format(
                        row,
                        format!("column {} holds unparsable value '{}'", col + 1, trimmed),
                    )),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_skips_blank_lines() {
        let text = "1.5,2,3\n\n  \n4,-5.25, 6e1\n";
        let matrix = MatrixLoader::new(3).from_csv_str(text).expect("matrix");
        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.row(1), vec![4.0, -5.25, 60.0]);
    }

    #[test]
    fn width_mismatch_reports_row_and_counts() {
        let text = "1,2,3\n4,5\n";
        let err = MatrixLoader::new(3).from_csv_str(text).unwrap_err();
        match err {
            AnalysisError::InputFormat { row, message } => {
                assert_eq!(row, 2);
                assert!(message.contains("has 2 values, expected 3"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn bad_tokens_are_rejected() {
        let err = MatrixLoader::new(2).from_csv_str("1,abc\n").unwrap_err();
        assert!(matches!(err, AnalysisError::InputFormat { row: 1, .. }));

        let err = MatrixLoader::new(2).from_csv_str("1,NaN\n").unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(MatrixLoader::new(2).from_csv_str("\n \n").is_err());
    }
}
