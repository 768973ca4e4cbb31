use std::ops::Range;

use nalgebra::DMatrix;

use crate::error::AnalysisError;

/// Dense observation matrix: rows are time-ordered samples, columns are channels.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMatrix {
    data: DMatrix<f64>,
}

impl SampleMatrix {
    /// Build a matrix from row vectors. Every row must have the same width.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, AnalysisError> {
        let Some(first) = rows.first() else {
            return Ok(Self {
                data: DMatrix::zeros(0, 0),
            });
        };
        let width = first.len();
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(AnalysisError::input_format(
                    idx + 1,
                    format!("has {} values, expected {}", row.len(), width),
                ));
            }
        }
        let data = DMatrix::from_fn(rows.len(), width, |i, j| rows[i][j]);
        Ok(Self { data })
    }

    /// Build a matrix from whole channels (each inner vector is one column).
    pub fn from_channels(channels: &[Vec<f64>]) -> Result<Self, AnalysisError> {
        let Some(first) = channels.first() else {
            return Ok(Self {
                data: DMatrix::zeros(0, 0),
            });
        };
        let points = first.len();
        for (idx, channel) in channels.iter().enumerate() {
            if channel.len() != points {
                return Err(AnalysisError::configuration(format!(
                    "channel {} has {} points, expected {}",
                    idx + 1,
                    channel.len(),
                    points
                )));
            }
        }
        let data = DMatrix::from_fn(points, channels.len(), |i, j| channels[j][i]);
        Ok(Self { data })
    }

    pub fn from_dmatrix(data: DMatrix<f64>) -> Self {
        Self { data }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn channels(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, channel: usize) -> f64 {
        self.data[(row, channel)]
    }

    pub fn column(&self, channel: usize) -> Vec<f64> {
        self.data.column(channel).iter().copied().collect()
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        self.data.row(row).iter().copied().collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        (0..self.channels()).map(move |j| self.column(j))
    }

    pub fn as_dmatrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Apply `f` to every value, keeping the shape.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            data: self.data.map(f),
        }
    }

    /// Copy a contiguous block of rows.
    pub fn select_rows(&self, range: Range<usize>) -> Result<Self, AnalysisError> {
        if range.start > range.end || range.end > self.rows() {
            return Err(AnalysisError::configuration(format!(
                "row range {:?} outside 0..{}",
                range,
                self.rows()
            )));
        }
        let data = self.data.rows(range.start, range.len()).into_owned();
        Ok(Self { data })
    }

    /// Keep only the leading `count` channels.
    pub fn leading_channels(&self, count: usize) -> Self {
        let count = count.min(self.channels());
        Self {
            data: self.data.columns(0, count).into_owned(),
        }
    }
}

impl From<DMatrix<f64>> for SampleMatrix {
    fn from(data: DMatrix<f64>) -> Self {
        Self::from_dmatrix(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SampleMatrix {
        SampleMatrix::from_rows(&[
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
            vec![10.0, 11.0, 12.0],
        ])
        .expect("matrix")
    }

    #[test]
    fn rows_and_columns_are_extracted_in_order() {
        let matrix = sample();
        assert_eq!(matrix.rows(), 4);
        assert_eq!(matrix.channels(), 3);
        assert_eq!(matrix.column(1), vec![2.0, 5.0, 8.0, 11.0]);
        assert_eq!(matrix.row(2), vec![7.0, 8.0, 9.0]);
        assert_eq!(matrix.get(3, 2), 12.0);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = SampleMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, AnalysisError::InputFormat { row: 2, .. }));
    }

    #[test]
    fn channels_constructor_transposes() {
        let matrix =
            SampleMatrix::from_channels(&[vec![1.0, 2.0], vec![3.0, 4.0]]).expect("matrix");
        assert_eq!(matrix.row(0), vec![1.0, 3.0]);
        assert_eq!(matrix.row(1), vec![2.0, 4.0]);
    }

    #[test]
    fn row_selection_and_channel_trim() {
        let matrix = sample();
        let block = matrix.select_rows(1..3).expect("block");
        assert_eq!(block.rows(), 2);
        assert_eq!(block.row(0), vec![4.0, 5.0, 6.0]);
        assert!(matrix.select_rows(2..9).is_err());

        let lead = matrix.leading_channels(2);
        assert_eq!(lead.channels(), 2);
        assert_eq!(lead.column(1), matrix.column(1));
    }
}
