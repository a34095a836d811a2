//! Global signal covariances and unit-RMS scaling.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::dataset::{Batch, Dims};
use crate::error::{Result, VarxError};
use crate::types::Scaling;

/// Mean auto-covariances of y and u over every sample of every batch.
#[derive(Debug, Clone)]
pub struct SignalCovariances {
    pub ryy: DMatrix<f64>,
    pub ruu: DMatrix<f64>,
    pub n_samples: usize,
}

/// Sum of per-batch outer products, divided by the total sample count.
pub fn signal_covariances(batches: &[Batch], dims: Dims) -> Result<SignalCovariances> {
    let partials: Vec<(DMatrix<f64>, DMatrix<f64>, usize)> = batches
        .par_iter()
        .map(|b| (&b.y * b.y.transpose(), &b.u * b.u.transpose(), b.n_samples()))
        .collect();

    let init = (
        DMatrix::zeros(dims.ny, dims.ny),
        DMatrix::zeros(dims.nu, dims.nu),
        0usize,
    );
    let (syy, suu, n_samples) = partials
        .into_iter()
        .fold(init, |(syy, suu, n), (pyy, puu, pn)| (syy + pyy, suu + puu, n + pn));

    if n_samples == 0 {
        return Err(VarxError::DataError("dataset contains no samples".into()));
    }
    let inv = 1.0 / n_samples as f64;
    Ok(SignalCovariances {
        ryy: syy * inv,
        ruu: suu * inv,
        n_samples,
    })
}

/// RMS scaling factors of the dataset; identity when `autoscale` is off.
pub fn compute_scaling(batches: &[Batch], dims: Dims, autoscale: bool) -> Result<Scaling> {
    if !autoscale {
        return Ok(Scaling::identity());
    }
    let cov = signal_covariances(batches, dims)?;
    let y = rms(&cov.ryy, "y")?;
    let u = if dims.nu == 0 { 1.0 } else { rms(&cov.ruu, "u")? };
    log::debug!("autoscaling: rms(y) = {:.6e}, rms(u) = {:.6e}", y, u);
    Ok(Scaling { y, u })
}

fn rms(r: &DMatrix<f64>, name: &str) -> Result<f64> {
    let s = (r.trace() / r.nrows() as f64).sqrt();
    if !(s.is_finite() && s > 0.0) {
        return Err(VarxError::DataError(format!(
            "cannot autoscale {}: signal RMS is {}",
            name, s
        )));
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::validate_dataset;

    fn make_batches() -> Vec<Batch> {
        vec![
            Batch::from_rows(&[vec![1.0, -1.0, 1.0, -1.0]], &[vec![2.0, 2.0, -2.0, -2.0]]).unwrap(),
            Batch::from_rows(&[vec![3.0, -3.0]], &[vec![0.0, 0.0]]).unwrap(),
        ]
    }

    #[test]
    fn test_signal_covariances() {
        let batches = make_batches();
        let dims = validate_dataset(&batches).unwrap();
        let cov = signal_covariances(&batches, dims).unwrap();
        assert_eq!(cov.n_samples, 6);
        // sum y^2 = 16 over 6 samples
        assert!((cov.ryy[(0, 0)] - 16.0 / 6.0).abs() < 1e-14);
        // sum u^2 = 4 + 18 = 22
        assert!((cov.ruu[(0, 0)] - 22.0 / 6.0).abs() < 1e-14);
    }

    #[test]
    fn test_compute_scaling() {
        let batches = make_batches();
        let dims = validate_dataset(&batches).unwrap();
        let s = compute_scaling(&batches, dims, true).unwrap();
        assert!((s.y - (16.0f64 / 6.0).sqrt()).abs() < 1e-14);
        assert!((s.u - (22.0f64 / 6.0).sqrt()).abs() < 1e-14);
    }

    #[test]
    fn test_scaling_disabled_is_identity() {
        let batches = make_batches();
        let dims = validate_dataset(&batches).unwrap();
        assert_eq!(compute_scaling(&batches, dims, false).unwrap(), Scaling::identity());
    }

    #[test]
    fn test_zero_signal_fails() {
        let batches = vec![Batch::from_rows(&[vec![1.0, 2.0]], &[vec![0.0, 0.0]]).unwrap()];
        let dims = validate_dataset(&batches).unwrap();
        assert!(matches!(
            compute_scaling(&batches, dims, true),
            Err(VarxError::DataError(_))
        ));
    }

    #[test]
    fn test_multichannel_rms_uses_trace() {
        let batches = vec![Batch::from_rows(
            &[vec![1.0, 1.0]],
            &[vec![1.0, 1.0], vec![3.0, 3.0]],
        )
        .unwrap()];
        let dims = validate_dataset(&batches).unwrap();
        let s = compute_scaling(&batches, dims, true).unwrap();
        // trace(Ryy)/ny = (1 + 9)/2 = 5
        assert!((s.y - 5.0f64.sqrt()).abs() < 1e-14);
        assert!((s.u - 1.0).abs() < 1e-14);
    }
}
