use nalgebra::DMatrix;

use crate::dataset::Batch;
use crate::types::Scaling;

/// Aligned target/regressor pair for one batch.
#[derive(Debug, Clone)]
pub struct Regressors {
    /// Scaled targets y(k): ny x Neff.
    pub y: DMatrix<f64>,
    /// Stacked lags [u(k-1); y(k-1); ...; u(k-p); y(k-p)] (+ u(k)): nz x Neff.
    pub z: DMatrix<f64>,
}

impl Regressors {
    pub fn n_samples(&self) -> usize {
        self.y.ncols()
    }
}

/// Build the VARX regression for one batch.
///
/// Column j corresponds to time index k = p + j (0-based), so Neff = N - p.
/// Lags are ordered most recent first, each lag block is [u; y]. With
/// `direct_feedthrough` the current input u(k) is appended last.
pub fn build_regressors(
    batch: &Batch,
    lag: usize,
    direct_feedthrough: bool,
    scaling: &Scaling,
) -> Regressors {
    let ny = batch.ny();
    let nu = batch.nu();
    let n = batch.n_samples();
    let n_eff = n.saturating_sub(lag);
    let width = nu + ny;
    let nz = lag * width + if direct_feedthrough { nu } else { 0 };

    let inv_y = 1.0 / scaling.y;
    let inv_u = 1.0 / scaling.u;

    let mut y = DMatrix::<f64>::zeros(ny, n_eff);
    let mut z = DMatrix::<f64>::zeros(nz, n_eff);

    for j in 0..n_eff {
        let k = lag + j;
        for r in 0..ny {
            y[(r, j)] = batch.y[(r, k)] * inv_y;
        }
        for i in 1..=lag {
            let base = (i - 1) * width;
            for r in 0..nu {
                z[(base + r, j)] = batch.u[(r, k - i)] * inv_u;
            }
            for r in 0..ny {
                z[(base + nu + r, j)] = batch.y[(r, k - i)] * inv_y;
            }
        }
        if direct_feedthrough {
            let base = lag * width;
            for r in 0..nu {
                z[(base + r, j)] = batch.u[(r, k)] * inv_u;
            }
        }
    }

    Regressors { y, z }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(m: &DMatrix<f64>, j: usize) -> Vec<f64> {
        m.column(j).iter().copied().collect()
    }

    fn ramp_batch() -> Batch {
        // u = 10, 11, 12, 13, 14 ; y = 0, 1, 2, 3, 4
        Batch::from_rows(
            &[vec![10.0, 11.0, 12.0, 13.0, 14.0]],
            &[vec![0.0, 1.0, 2.0, 3.0, 4.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_regressor_layout() {
        let r = build_regressors(&ramp_batch(), 2, false, &Scaling::identity());
        assert_eq!(r.n_samples(), 3);
        assert_eq!(r.z.nrows(), 4);

        // First column: k = 2, target y(2) = 2
        assert_eq!(r.y[(0, 0)], 2.0);
        // [u(1); y(1); u(0); y(0)]
        assert_eq!(col(&r.z, 0), vec![11.0, 1.0, 10.0, 0.0]);
        // Last column: k = 4
        assert_eq!(r.y[(0, 2)], 4.0);
        assert_eq!(col(&r.z, 2), vec![13.0, 3.0, 12.0, 2.0]);
    }

    #[test]
    fn test_direct_term_appended() {
        let r = build_regressors(&ramp_batch(), 1, true, &Scaling::identity());
        assert_eq!(r.z.nrows(), 3);
        // k = 1: [u(0); y(0); u(1)]
        assert_eq!(col(&r.z, 0), vec![10.0, 0.0, 11.0]);
    }

    #[test]
    fn test_scaling_applied() {
        let scaling = Scaling { y: 2.0, u: 10.0 };
        let r = build_regressors(&ramp_batch(), 1, false, &scaling);
        assert!((r.y[(0, 0)] - 0.5).abs() < 1e-15);
        assert!((r.z[(0, 0)] - 1.0).abs() < 1e-15);
        assert!((r.z[(1, 0)] - 0.0).abs() < 1e-15);
    }

    #[test]
    fn test_short_batch_is_empty() {
        let r = build_regressors(&ramp_batch(), 5, false, &Scaling::identity());
        assert_eq!(r.n_samples(), 0);
        assert_eq!(r.z.nrows(), 10);
    }

    #[test]
    fn test_multichannel_block_order() {
        let b = Batch::from_rows(
            &[vec![1.0, 2.0, 3.0]],
            &[vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]],
        )
        .unwrap();
        let r = build_regressors(&b, 1, false, &Scaling::identity());
        assert_eq!(r.y.nrows(), 2);
        // k = 1: [u(0); y1(0); y2(0)]
        assert_eq!(col(&r.z, 0), vec![1.0, 4.0, 7.0]);
        assert_eq!(col(&r.y, 0), vec![5.0, 8.0]);
    }
}
