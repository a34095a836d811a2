use nalgebra::DMatrix;

use crate::error::{Result, VarxError};

/// One contiguous record of input and output samples.
///
/// Both matrices are channels x samples.
#[derive(Debug, Clone)]
pub struct Batch {
    pub u: DMatrix<f64>, // nu x N
    pub y: DMatrix<f64>, // ny x N
}

impl Batch {
    pub fn new(u: DMatrix<f64>, y: DMatrix<f64>) -> Result<Self> {
        if u.ncols() != y.ncols() {
            return Err(VarxError::DataError(format!(
                "u has {} samples but y has {}",
                u.ncols(),
                y.ncols()
            )));
        }
        if u.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(VarxError::DataError("batch contains non-finite samples".into()));
        }
        Ok(Self { u, y })
    }

    /// Build from row-per-channel slices. An empty `u` means no inputs.
    pub fn from_rows(u: &[Vec<f64>], y: &[Vec<f64>]) -> Result<Self> {
        let y = rows_to_matrix(y, "y")?;
        let u = if u.is_empty() {
            DMatrix::zeros(0, y.ncols())
        } else {
            rows_to_matrix(u, "u")?
        };
        Self::new(u, y)
    }

    pub fn n_samples(&self) -> usize {
        self.y.ncols()
    }

    pub fn ny(&self) -> usize {
        self.y.nrows()
    }

    pub fn nu(&self) -> usize {
        self.u.nrows()
    }
}

fn rows_to_matrix(rows: &[Vec<f64>], name: &str) -> Result<DMatrix<f64>> {
    let n = rows.first().map_or(0, |r| r.len());
    if let Some((i, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
        return Err(VarxError::DataError(format!(
            "{} channel {} has {} samples, expected {}",
            name,
            i,
            r.len(),
            n
        )));
    }
    Ok(DMatrix::from_fn(rows.len(), n, |i, j| rows[i][j]))
}

/// Channel counts shared by every batch of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub ny: usize,
    pub nu: usize,
}

/// Check that the dataset is non-empty and channel counts agree across batches.
pub fn validate_dataset(batches: &[Batch]) -> Result<Dims> {
    let first = batches.first().ok_or(VarxError::EmptyDataset)?;
    let dims = Dims {
        ny: first.ny(),
        nu: first.nu(),
    };
    if dims.ny == 0 {
        return Err(VarxError::DataError("output must have at least one channel".into()));
    }
    for (b, batch) in batches.iter().enumerate().skip(1) {
        if batch.ny() != dims.ny {
            return Err(VarxError::ChannelMismatch {
                batch: b,
                signal: "output",
                expected: dims.ny,
                got: batch.ny(),
            });
        }
        if batch.nu() != dims.nu {
            return Err(VarxError::ChannelMismatch {
                batch: b,
                signal: "input",
                expected: dims.nu,
                got: batch.nu(),
            });
        }
    }
    Ok(dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(nu: usize, ny: usize, n: usize) -> Batch {
        Batch::new(DMatrix::zeros(nu, n), DMatrix::zeros(ny, n)).unwrap()
    }

    #[test]
    fn test_sample_count_mismatch() {
        let r = Batch::new(DMatrix::zeros(1, 10), DMatrix::zeros(1, 9));
        assert!(matches!(r, Err(VarxError::DataError(_))));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut y = DMatrix::zeros(1, 4);
        y[(0, 2)] = f64::NAN;
        assert!(Batch::new(DMatrix::zeros(1, 4), y).is_err());
    }

    #[test]
    fn test_from_rows() {
        let b = Batch::from_rows(&[vec![1.0, 2.0, 3.0]], &[vec![4.0, 5.0, 6.0], vec![0.0; 3]]).unwrap();
        assert_eq!(b.nu(), 1);
        assert_eq!(b.ny(), 2);
        assert_eq!(b.n_samples(), 3);
        assert_eq!(b.y[(0, 1)], 5.0);
        assert!(Batch::from_rows(&[vec![1.0]], &[vec![1.0, 2.0], vec![1.0]]).is_err());

        let output_only = Batch::from_rows(&[], &[vec![1.0, 2.0]]).unwrap();
        assert_eq!((output_only.nu(), output_only.n_samples()), (0, 2));
    }

    #[test]
    fn test_validate_dataset() {
        assert!(matches!(validate_dataset(&[]), Err(VarxError::EmptyDataset)));

        let dims = validate_dataset(&[batch(2, 1, 10), batch(2, 1, 7)]).unwrap();
        assert_eq!(dims, Dims { ny: 1, nu: 2 });

        let r = validate_dataset(&[batch(2, 1, 10), batch(1, 1, 10)]);
        assert!(matches!(r, Err(VarxError::ChannelMismatch { batch: 1, signal: "input", .. })));

        let r = validate_dataset(&[batch(1, 1, 10), batch(1, 2, 10)]);
        assert!(matches!(r, Err(VarxError::ChannelMismatch { signal: "output", .. })));
    }
}
