use nalgebra::{Complex, DMatrix, DVector};

use crate::error::{Result, VarxError};
use crate::state_space::PredictorForm;
use crate::types::Scaling;

/// Innovations-form state-space model.
///
/// State equation:  x_{k+1} = A x_k + B u_k + K e_k
/// Observation:     y_k     = C x_k + D u_k + e_k
#[derive(Debug, Clone, PartialEq)]
pub struct InnovationsModel {
    pub a: DMatrix<f64>, // n x n
    pub b: DMatrix<f64>, // n x nu
    pub c: DMatrix<f64>, // ny x n
    pub d: DMatrix<f64>, // ny x nu
    pub k: DMatrix<f64>, // n x ny
}

/// One-step-ahead predictions and their residuals.
#[derive(Debug, Clone)]
pub struct PredictionOutput {
    pub y_hat: DMatrix<f64>,
    pub residuals: DMatrix<f64>,
}

impl InnovationsModel {
    /// Recover the innovations form from a (reduced) predictor in scaled units.
    ///
    /// The predictor input is [u; y]: its y columns are K, and A - K C, B - K D
    /// are undone. B and D return to physical units through `scaling`.
    pub fn from_predictor(pf: &PredictorForm, scaling: &Scaling) -> Self {
        let nu = pf.nu;
        let ny = pf.ny;
        let k = pf.b.columns(nu, ny).into_owned();
        let bu = pf.b.columns(0, nu).into_owned();
        let du = pf.d.columns(0, nu).into_owned();

        let a = &pf.a + &k * &pf.c;
        let gain = scaling.gain();
        let b = (bu + &k * &du) * gain;
        let d = du * gain;

        Self {
            a,
            b,
            c: pf.c.clone(),
            d,
            k,
        }
    }

    pub fn order(&self) -> usize {
        self.a.nrows()
    }

    pub fn ny(&self) -> usize {
        self.c.nrows()
    }

    pub fn nu(&self) -> usize {
        self.b.ncols()
    }

    /// Eigenvalues of A.
    pub fn poles(&self) -> Vec<Complex<f64>> {
        self.a.complex_eigenvalues().iter().copied().collect()
    }

    /// Noise-free response from a zero initial state.
    pub fn simulate(&self, u: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.check_input(u)?;
        let n = u.ncols();
        let mut x = DVector::<f64>::zeros(self.order());
        let mut y = DMatrix::<f64>::zeros(self.ny(), n);
        for t in 0..n {
            let u_t = u.column(t);
            y.set_column(t, &(&self.c * &x + &self.d * &u_t));
            x = &self.a * &x + &self.b * &u_t;
        }
        Ok(y)
    }

    /// Steady-state Kalman predictor over measured (u, y), from a zero initial state.
    ///
    ///   y_hat_k = C x_k + D u_k
    ///   x_{k+1} = A x_k + B u_k + K (y_k - y_hat_k)
    pub fn predict(&self, u: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<PredictionOutput> {
        self.check_input(u)?;
        if y.nrows() != self.ny() || y.ncols() != u.ncols() {
            return Err(VarxError::DataError(format!(
                "y must be {} x {}, got {} x {}",
                self.ny(),
                u.ncols(),
                y.nrows(),
                y.ncols()
            )));
        }
        let n = u.ncols();
        let mut x = DVector::<f64>::zeros(self.order());
        let mut y_hat = DMatrix::<f64>::zeros(self.ny(), n);
        let mut residuals = DMatrix::<f64>::zeros(self.ny(), n);
        for t in 0..n {
            let u_t = u.column(t);
            let yh = &self.c * &x + &self.d * &u_t;
            let e: DVector<f64> = y.column(t).into_owned() - &yh;
            x = &self.a * &x + &self.b * &u_t + &self.k * &e;
            y_hat.set_column(t, &yh);
            residuals.set_column(t, &e);
        }
        Ok(PredictionOutput { y_hat, residuals })
    }

    fn check_input(&self, u: &DMatrix<f64>) -> Result<()> {
        if u.nrows() != self.nu() {
            return Err(VarxError::ChannelMismatch {
                batch: 0,
                signal: "input",
                expected: self.nu(),
                got: u.nrows(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deadbeat predictor of y(k) = 1.5 y(k-1) - 0.7 y(k-2) + u(k-1) + 0.5 u(k-2)
    fn arx2_predictor(direct: f64) -> PredictorForm {
        PredictorForm {
            k_states: 2,
            ny: 1,
            nu: 1,
            a: DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 0.0]),
            b: DMatrix::from_row_slice(2, 2, &[0.5, -0.7, 1.0, 1.5]),
            c: DMatrix::from_row_slice(1, 2, &[0.0, 1.0]),
            d: DMatrix::from_row_slice(1, 2, &[direct, 0.0]),
        }
    }

    #[test]
    fn test_assembly_recovers_companion_dynamics() {
        let m = InnovationsModel::from_predictor(&arx2_predictor(0.0), &Scaling::identity());
        assert_eq!(m.order(), 2);
        // A = Apf + K C
        assert_eq!(m.a, DMatrix::from_row_slice(2, 2, &[0.0, -0.7, 1.0, 1.5]));
        assert_eq!(m.k, DMatrix::from_row_slice(2, 1, &[-0.7, 1.5]));
        assert_eq!(m.b, DMatrix::from_row_slice(2, 1, &[0.5, 1.0]));
        assert!((m.a.trace() - 1.5).abs() < 1e-15);
        assert!((m.a.determinant() - 0.7).abs() < 1e-15);
    }

    #[test]
    fn test_assembly_direct_term_and_scaling() {
        let scaling = Scaling { y: 4.0, u: 2.0 };
        let m = InnovationsModel::from_predictor(&arx2_predictor(0.25), &scaling);
        // D = 0.25 * (4 / 2)
        assert!((m.d[(0, 0)] - 0.5).abs() < 1e-15);
        // B = (Bu + K D) * 2 = ([0.5; 1.0] + [-0.7; 1.5] * 0.25) * 2
        assert!((m.b[(0, 0)] - (0.5 - 0.175) * 2.0).abs() < 1e-15);
        assert!((m.b[(1, 0)] - (1.0 + 0.375) * 2.0).abs() < 1e-15);
        // A, C, K are scale free
        assert_eq!(m.c, DMatrix::from_row_slice(1, 2, &[0.0, 1.0]));
        assert_eq!(m.k, DMatrix::from_row_slice(2, 1, &[-0.7, 1.5]));
    }

    #[test]
    fn test_poles() {
        let m = InnovationsModel::from_predictor(&arx2_predictor(0.0), &Scaling::identity());
        let poles = m.poles();
        assert_eq!(poles.len(), 2);
        let im = (0.7f64 - 0.5625).sqrt();
        for p in &poles {
            assert!((p.re - 0.75).abs() < 1e-12);
            assert!((p.im.abs() - im).abs() < 1e-12);
        }
    }

    #[test]
    fn test_simulate_matches_difference_equation() {
        let m = InnovationsModel::from_predictor(&arx2_predictor(0.0), &Scaling::identity());
        let u = DMatrix::from_row_slice(1, 6, &[1.0, 0.0, -1.0, 2.0, 0.5, 0.0]);
        let y = m.simulate(&u).unwrap();
        let mut expected = vec![0.0; 6];
        for k in 0..6 {
            let mut v = 0.0;
            if k >= 1 {
                v += 1.5 * expected[k - 1] + u[(0, k - 1)];
            }
            if k >= 2 {
                v += -0.7 * expected[k - 2] + 0.5 * u[(0, k - 2)];
            }
            expected[k] = v;
        }
        for k in 0..6 {
            assert!((y[(0, k)] - expected[k]).abs() < 1e-12, "k={}: {} vs {}", k, y[(0, k)], expected[k]);
        }
    }

    #[test]
    fn test_predict_residuals_are_innovations() {
        // Deadbeat predictor: after p samples the residual equals e(k) exactly
        let m = InnovationsModel::from_predictor(&arx2_predictor(0.0), &Scaling::identity());
        let u = DMatrix::from_row_slice(1, 8, &[1.0, -1.0, 0.5, 0.2, -0.3, 0.0, 1.0, 0.4]);
        let e = [0.1, -0.2, 0.05, 0.3, -0.1, 0.0, 0.2, -0.05];
        let mut y = DMatrix::<f64>::zeros(1, 8);
        for k in 0..8 {
            let mut v = e[k];
            if k >= 1 {
                v += 1.5 * y[(0, k - 1)] + u[(0, k - 1)];
            }
            if k >= 2 {
                v += -0.7 * y[(0, k - 2)] + 0.5 * u[(0, k - 2)];
            }
            y[(0, k)] = v;
        }
        let out = m.predict(&u, &y).unwrap();
        for k in 2..8 {
            assert!((out.residuals[(0, k)] - e[k]).abs() < 1e-12);
            assert!((out.y_hat[(0, k)] + out.residuals[(0, k)] - y[(0, k)]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_input_shape_checked() {
        let m = InnovationsModel::from_predictor(&arx2_predictor(0.0), &Scaling::identity());
        assert!(m.simulate(&DMatrix::zeros(2, 5)).is_err());
        assert!(m.predict(&DMatrix::zeros(1, 5), &DMatrix::zeros(1, 4)).is_err());
    }
}
