//! Batch VARX least squares.
//!
//! Per-batch cross products are computed in parallel with Rayon and combined
//! by an ordered fold, so the reduced sums do not depend on thread scheduling.

use std::ops::{Add, Sub};

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::dataset::{Batch, Dims};
use crate::error::{Result, VarxError};
use crate::regressor::{build_regressors, Regressors};
use crate::types::{Scaling, VarxConfig};

/// Summed cross products of one or more batches.
#[derive(Debug, Clone, PartialEq)]
pub struct Covariances {
    /// sum Y Z': ny x nz
    pub yz: DMatrix<f64>,
    /// sum Z Z': nz x nz
    pub zz: DMatrix<f64>,
    pub n_samples: usize,
}

impl Covariances {
    pub fn zeros(ny: usize, nz: usize) -> Self {
        Self {
            yz: DMatrix::zeros(ny, nz),
            zz: DMatrix::zeros(nz, nz),
            n_samples: 0,
        }
    }

    pub fn from_regressors(r: &Regressors) -> Self {
        Self {
            yz: &r.y * r.z.transpose(),
            zz: &r.z * r.z.transpose(),
            n_samples: r.n_samples(),
        }
    }
}

impl Add for Covariances {
    type Output = Covariances;

    fn add(self, rhs: Covariances) -> Covariances {
        Covariances {
            yz: self.yz + rhs.yz,
            zz: self.zz + rhs.zz,
            n_samples: self.n_samples + rhs.n_samples,
        }
    }
}

impl<'a> Sub<&'a Covariances> for &'a Covariances {
    type Output = Covariances;

    fn sub(self, rhs: &'a Covariances) -> Covariances {
        Covariances {
            yz: &self.yz - &rhs.yz,
            zz: &self.zz - &rhs.zz,
            n_samples: self.n_samples - rhs.n_samples,
        }
    }
}

/// Per-batch contributions, in batch order.
pub fn batch_covariances(
    batches: &[Batch],
    config: &VarxConfig,
    scaling: &Scaling,
) -> Vec<Covariances> {
    batches
        .par_iter()
        .map(|b| {
            let r = build_regressors(b, config.order.lag, config.direct_feedthrough, scaling);
            Covariances::from_regressors(&r)
        })
        .collect()
}

/// Ordered sum of per-batch contributions.
pub fn sum_covariances(parts: &[Covariances], ny: usize, nz: usize) -> Covariances {
    parts
        .iter()
        .cloned()
        .fold(Covariances::zeros(ny, nz), |acc, c| acc + c)
}

/// Solve G (ZZ' + l I) = YZ' for G.
pub fn solve_ridge(cov: &Covariances, penalty: f64) -> Result<DMatrix<f64>> {
    let nz = cov.zz.nrows();
    let normal = &cov.zz + DMatrix::<f64>::identity(nz, nz) * penalty;
    let chol = normal.cholesky().ok_or_else(|| {
        VarxError::SolveFailed(format!(
            "regressor covariance (+ {} I) is not positive definite",
            penalty
        ))
    })?;
    // ZZ' is symmetric, so G' = (ZZ' + l I)^-1 (YZ')'
    let g = chol.solve(&cov.yz.transpose()).transpose();
    if g.iter().any(|v| !v.is_finite()) {
        return Err(VarxError::SolveFailed("non-finite VARX coefficients".into()));
    }
    Ok(g)
}

/// VARX coefficient blocks.
///
/// Columns: `[G_1 | G_2 | ... | G_p | D?]`, each `G_i` is ny x (nu + ny)
/// with input columns first.
#[derive(Debug, Clone, PartialEq)]
pub struct VarxCoefficients {
    pub matrix: DMatrix<f64>,
    pub lag: usize,
    pub ny: usize,
    pub nu: usize,
    pub direct_feedthrough: bool,
}

impl VarxCoefficients {
    pub fn new(
        matrix: DMatrix<f64>,
        lag: usize,
        dims: Dims,
        direct_feedthrough: bool,
    ) -> Result<Self> {
        if matrix.nrows() != dims.ny {
            return Err(VarxError::ShapeMismatch {
                expected: dims.ny,
                got: matrix.nrows(),
            });
        }
        let width = lag * (dims.ny + dims.nu) + if direct_feedthrough { dims.nu } else { 0 };
        if matrix.ncols() != width {
            return Err(VarxError::ShapeMismatch {
                expected: width,
                got: matrix.ncols(),
            });
        }
        Ok(Self {
            matrix,
            lag,
            ny: dims.ny,
            nu: dims.nu,
            direct_feedthrough,
        })
    }

    pub fn block_width(&self) -> usize {
        self.ny + self.nu
    }

    /// Coefficients of lag `i` (1-based): maps [u(k-i); y(k-i)] to y(k).
    pub fn lag_block(&self, i: usize) -> Option<DMatrix<f64>> {
        if i == 0 || i > self.lag {
            return None;
        }
        let w = self.block_width();
        Some(self.matrix.columns((i - 1) * w, w).into_owned())
    }

    /// Direct feedthrough block (ny x nu), if estimated.
    pub fn direct_block(&self) -> Option<DMatrix<f64>> {
        if self.direct_feedthrough {
            Some(self.matrix.columns(self.lag * self.block_width(), self.nu).into_owned())
        } else {
            None
        }
    }
}

/// Output of the batch estimator.
#[derive(Debug, Clone)]
pub struct VarxEstimate {
    pub coefficients: VarxCoefficients,
    pub n_samples: usize,
    /// Accumulated ZZ' over all batches (including the direct block, if any).
    pub zz: DMatrix<f64>,
}

impl VarxEstimate {
    /// n_samples / (p * ny).
    pub fn samples_per_parameter(&self) -> f64 {
        samples_per_parameter(self.n_samples, self.coefficients.lag, self.coefficients.ny)
    }
}

pub fn samples_per_parameter(n_samples: usize, lag: usize, ny: usize) -> f64 {
    n_samples as f64 / (lag * ny) as f64
}

/// Fit VARX coefficients over the whole dataset with ridge penalty `penalty`.
pub fn estimate(
    batches: &[Batch],
    dims: Dims,
    config: &VarxConfig,
    scaling: &Scaling,
    penalty: f64,
) -> Result<VarxEstimate> {
    let nz = config.regressor_dim(dims.ny, dims.nu);
    let parts = batch_covariances(batches, config, scaling);
    let cov = sum_covariances(&parts, dims.ny, nz);

    if cov.n_samples == 0 {
        return Err(VarxError::DataError(format!(
            "no batch is longer than the lag order p = {}",
            config.order.lag
        )));
    }
    let spp = samples_per_parameter(cov.n_samples, config.order.lag, dims.ny);
    log::info!(
        "VARX fit: {} samples, {} regressors, {:.1} samples per parameter",
        cov.n_samples,
        nz,
        spp
    );
    if cov.n_samples < nz {
        log::warn!(
            "under-determined VARX fit: {} samples for {} regressors (penalty = {})",
            cov.n_samples,
            nz,
            penalty
        );
    }

    let g = solve_ridge(&cov, penalty)?;
    let coefficients = VarxCoefficients::new(g, config.order.lag, dims, config.direct_feedthrough)?;

    Ok(VarxEstimate {
        coefficients,
        n_samples: cov.n_samples,
        zz: cov.zz,
    })
}
