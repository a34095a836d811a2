use nalgebra::DMatrix;

use crate::error::{Result, VarxError};
use crate::estimator::VarxCoefficients;

/// Predictor-form realization of a VARX model.
///
/// State equation:  x_{k+1} = A * x_k + B * [u_k; y_k]
/// Observation:     y_hat_k = C * x_k + D * [u_k; y_k]
///
/// The state stacks p blocks of ny entries. A shifts each block down by one
/// block, so the newest contribution enters at the bottom and C reads the
/// last block.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorForm {
    pub k_states: usize,
    pub ny: usize,
    pub nu: usize,
    pub a: DMatrix<f64>, // k_states x k_states
    pub b: DMatrix<f64>, // k_states x (nu + ny)
    pub c: DMatrix<f64>, // ny x k_states
    pub d: DMatrix<f64>, // ny x (nu + ny)
}

impl PredictorForm {
    /// Companion-form realization of the VARX predictor, k_states = p * ny.
    pub fn from_varx(coefs: &VarxCoefficients) -> Result<Self> {
        let ny = coefs.ny;
        let nu = coefs.nu;
        let lag = coefs.lag;
        if lag == 0 || ny == 0 {
            return Err(VarxError::InvalidOrder(
                "predictor needs p >= 1 and ny >= 1".into(),
            ));
        }
        let k_states = lag * ny;

        let a = Self::build_transition(lag, ny);
        let b = Self::build_input(coefs);
        let c = Self::build_design(lag, ny);
        let d = Self::build_feedthrough(coefs);

        Ok(Self {
            k_states,
            ny,
            nu,
            a,
            b,
            c,
            d,
        })
    }

    /// Block sub-diagonal identity: block i+1 <- block i.
    fn build_transition(lag: usize, ny: usize) -> DMatrix<f64> {
        let k = lag * ny;
        let mut a = DMatrix::<f64>::zeros(k, k);
        for i in ny..k {
            a[(i, i - ny)] = 1.0;
        }
        a
    }

    /// Stack [G_p; G_{p-1}; ...; G_1] so that block p (the last) holds G_1.
    fn build_input(coefs: &VarxCoefficients) -> DMatrix<f64> {
        let ny = coefs.ny;
        let lag = coefs.lag;
        let w = coefs.block_width();
        let mut b = DMatrix::<f64>::zeros(lag * ny, w);
        for blk in 0..lag {
            if let Some(g) = coefs.lag_block(lag - blk) {
                b.view_mut((blk * ny, 0), (ny, w)).copy_from(&g);
            }
        }
        b
    }

    /// C = [0 ... 0 I].
    fn build_design(lag: usize, ny: usize) -> DMatrix<f64> {
        let mut c = DMatrix::<f64>::zeros(ny, lag * ny);
        for r in 0..ny {
            c[(r, (lag - 1) * ny + r)] = 1.0;
        }
        c
    }

    /// D = [D_u 0]; the predictor never feeds y_k through.
    fn build_feedthrough(coefs: &VarxCoefficients) -> DMatrix<f64> {
        let mut d = DMatrix::<f64>::zeros(coefs.ny, coefs.block_width());
        if let Some(du) = coefs.direct_block() {
            d.view_mut((0, 0), (coefs.ny, coefs.nu)).copy_from(&du);
        }
        d
    }
}
