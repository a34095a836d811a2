//! Weighted truncation of the predictor realization.
//!
//! The predictor state is x_k = Mpf * z_k, where z_k stacks the p most recent
//! [u; y] samples. Directions of x are ranked by their energy under the
//! regressor covariance ZZ'/N, which plays the role of the Gramians in
//! balanced truncation.

use std::cmp::Ordering;

use nalgebra::{Cholesky, DMatrix, SymmetricEigen, SVD};

use crate::error::{Result, VarxError};
use crate::state_space::PredictorForm;
use crate::types::TruncationMode;

/// Truncating similarity transform: x = T * x_r, x_r = Ti * x.
#[derive(Debug, Clone)]
pub struct Truncation {
    pub t: DMatrix<f64>,  // k_states x n
    pub ti: DMatrix<f64>, // n x k_states
    /// Full descending spectrum; T and Ti use the leading n entries.
    pub singular_values: Vec<f64>,
}

impl Truncation {
    pub fn order(&self) -> usize {
        self.t.ncols()
    }

    /// Ar = Ti A T, Br = Ti B, Cr = C T, Dr = D.
    pub fn apply(&self, pf: &PredictorForm) -> PredictorForm {
        PredictorForm {
            k_states: self.order(),
            ny: pf.ny,
            nu: pf.nu,
            a: &self.ti * &pf.a * &self.t,
            b: &self.ti * &pf.b,
            c: &pf.c * &self.t,
            d: pf.d.clone(),
        }
    }
}

/// Map from the stacked past [z_{k-1}; ...; z_{k-p}] to the predictor state.
///
/// Block 0 is B; block j is block j-1 shifted down by ny rows with zeros on top,
/// i.e. A^j * B for the block-shift A of [`PredictorForm`].
pub fn extended_map(pf: &PredictorForm) -> DMatrix<f64> {
    let k = pf.k_states;
    let ny = pf.ny;
    let w = pf.b.ncols();
    let lag = k / ny;

    let mut m = DMatrix::<f64>::zeros(k, lag * w);
    m.view_mut((0, 0), (k, w)).copy_from(&pf.b);
    for j in 1..lag {
        let prev = m.view((0, (j - 1) * w), (k - ny, w)).into_owned();
        m.view_mut((ny, j * w), (k - ny, w)).copy_from(&prev);
    }
    m
}

/// Compute the order-`states` truncation of `pf`.
///
/// `zz` is the accumulated regressor covariance restricted to the lag blocks
/// and `n_samples` the number of samples it sums over.
pub fn weighted_truncation(
    pf: &PredictorForm,
    zz: &DMatrix<f64>,
    n_samples: usize,
    states: usize,
    mode: TruncationMode,
) -> Result<Truncation> {
    let mpf = extended_map(pf);
    if zz.nrows() != mpf.ncols() || zz.ncols() != mpf.ncols() {
        return Err(VarxError::ShapeMismatch {
            expected: mpf.ncols(),
            got: zz.nrows(),
        });
    }
    if states == 0 || states > pf.k_states {
        return Err(VarxError::InvalidOrder(format!(
            "cannot truncate {} states to {}",
            pf.k_states, states
        )));
    }
    if n_samples == 0 {
        return Err(VarxError::DataError("weighted truncation needs at least one sample".into()));
    }
    let weight = zz / n_samples as f64;

    let (u, sv, rank) = match mode {
        TruncationMode::Gramian => gramian_directions(&mpf, &weight)?,
        TruncationMode::Cholesky(reg) => cholesky_directions(&mpf, weight, reg)?,
    };
    log::debug!(
        "weighted truncation ({:?}): {} -> {} states, numerical rank {}, spectrum = {:?}",
        mode,
        pf.k_states,
        states,
        rank,
        sv
    );

    if states > rank {
        return Err(VarxError::DecompositionFailed(format!(
            "state order {} exceeds the numerical rank {} of the weighted map (singular value {} is {:e})",
            states,
            rank,
            rank + 1,
            sv[rank]
        )));
    }
    let kept = &sv[..states];
    if kept[states - 1] < WARN_RATIO * kept[0] {
        log::warn!(
            "retained singular value {:.3e} is small relative to the largest ({:.3e})",
            kept[states - 1],
            kept[0]
        );
    }

    let mut t = u.columns(0, states).into_owned();
    let mut ti = t.transpose();
    for (j, &s) in kept.iter().enumerate() {
        t.column_mut(j).scale_mut(s);
        ti.row_mut(j).scale_mut(1.0 / s);
    }

    Ok(Truncation {
        t,
        ti,
        singular_values: sv,
    })
}

/// Retained directions whose singular value falls below this ratio are logged.
const WARN_RATIO: f64 = 1e-6;

/// Number of leading entries of the descending `values` above `dim * eps * values[0]`.
///
/// `values` is the quantity the decomposition resolves directly: eigenvalues of P
/// in the Gramian path, singular values of Mpf L in the Cholesky path.
fn numerical_rank(values: &[f64], dim: usize) -> usize {
    let Some(&largest) = values.first() else {
        return 0;
    };
    if !(largest.is_finite() && largest > 0.0) {
        return 0;
    }
    let tol = dim as f64 * f64::EPSILON * largest;
    values.iter().take_while(|v| v.is_finite() && **v > tol).count()
}

/// Eigenvectors of P = Mpf W Mpf', singular values sqrt(eig(P)).
fn gramian_directions(
    mpf: &DMatrix<f64>,
    weight: &DMatrix<f64>,
) -> Result<(DMatrix<f64>, Vec<f64>, usize)> {
    let p = mpf * weight * mpf.transpose();
    let p = (&p + p.transpose()) * 0.5;
    let dim = p.nrows();
    let eig = SymmetricEigen::try_new(p, f64::EPSILON, 0).ok_or_else(|| {
        VarxError::DecompositionFailed("eigendecomposition of the weighted Gramian did not converge".into())
    })?;
    let order = descending(eig.eigenvalues.as_slice());
    let u = reorder_columns(&eig.eigenvectors, &order);
    let lambda: Vec<f64> = order.iter().map(|&i| eig.eigenvalues[i]).collect();
    let rank = numerical_rank(&lambda, dim);
    let sv = lambda.iter().map(|l| l.max(0.0).sqrt()).collect();
    Ok((u, sv, rank))
}

/// Left singular vectors of Mpf L with L L' = W + reg I.
fn cholesky_directions(
    mpf: &DMatrix<f64>,
    weight: DMatrix<f64>,
    reg: f64,
) -> Result<(DMatrix<f64>, Vec<f64>, usize)> {
    let nz = weight.nrows();
    let shifted = weight + DMatrix::<f64>::identity(nz, nz) * reg;
    let chol = Cholesky::new(shifted).ok_or_else(|| {
        VarxError::DecompositionFailed(format!(
            "ZZ'/N + {} I is not positive definite",
            reg
        ))
    })?;
    let x = mpf * chol.l();
    let dim = x.nrows().max(x.ncols());
    let svd = SVD::try_new(x, true, false, f64::EPSILON, 0).ok_or_else(|| {
        VarxError::DecompositionFailed("SVD of the weighted map did not converge".into())
    })?;
    let u = svd
        .u
        .ok_or_else(|| VarxError::DecompositionFailed("SVD returned no left vectors".into()))?;
    let order = descending(svd.singular_values.as_slice());
    let u = reorder_columns(&u, &order);
    let sv: Vec<f64> = order.iter().map(|&i| svd.singular_values[i]).collect();
    let rank = numerical_rank(&sv, dim);
    Ok((u, sv, rank))
}

fn descending(values: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&i, &j| values[j].partial_cmp(&values[i]).unwrap_or(Ordering::Equal));
    idx
}

fn reorder_columns(m: &DMatrix<f64>, order: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), order.len(), |i, j| m[(i, order[j])])
}
