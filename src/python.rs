use nalgebra::DMatrix;
use numpy::PyReadonlyArray2;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::dataset::Batch;
use crate::error::VarxError;
use crate::identification::identify;
use crate::types::{flag_from_int, Identification, ModelOrder, Ridge, VarxConfig};

fn to_py_err(e: VarxError) -> PyErr {
    if e.is_input_error() {
        PyValueError::new_err(e.to_string())
    } else {
        PyRuntimeError::new_err(e.to_string())
    }
}

fn to_matrix(a: &PyReadonlyArray2<'_, f64>) -> DMatrix<f64> {
    let view = a.as_array();
    let (rows, cols) = (view.shape()[0], view.shape()[1]);
    DMatrix::from_fn(rows, cols, |i, j| view[[i, j]])
}

fn to_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}

/// Float selects fit mode, a sequence of floats selects cross-validation.
fn parse_ridge(ridge: Option<&Bound<'_, PyAny>>) -> PyResult<Ridge> {
    let Some(obj) = ridge else {
        return Ok(Ridge::default());
    };
    if let Ok(l) = obj.extract::<f64>() {
        return Ok(Ridge::Penalty(l));
    }
    obj.extract::<Vec<f64>>()
        .map(Ridge::Grid)
        .map_err(|_| PyValueError::new_err("ridge must be a float or a list of floats"))
}

/// Identify an innovations-form state-space model from input-output batches.
///
/// # Arguments
/// * `ys` - One (ny x N_i) output array per batch
/// * `us` - One (nu x N_i) input array per batch
/// * `order` - [p, n]: VARX lag and state dimension
/// * `dterm` - 1 to estimate a direct input term
/// * `autoscl` - 1 to normalize y and u by their RMS
/// * `trans` - Truncation selector: negative for the Gramian path, else the Cholesky regularization
/// * `ridge` - Penalty (fit mode) or list of penalties (cross-validation mode)
///
/// Fit mode returns: mode, A, B, C, D, K, scale_y, scale_u, penalty, n_samples,
/// samples_per_parameter, singular_values.
/// Cross-validation mode returns: mode, penalties, errors[batch][channel][penalty],
/// mean_error, best_penalty.
#[pyfunction]
#[pyo3(signature = (ys, us, order, dterm=0, autoscl=1, trans=-1.0, ridge=None))]
#[allow(clippy::too_many_arguments)]
fn varx_fit<'py>(
    py: Python<'py>,
    ys: Vec<PyReadonlyArray2<'py, f64>>,
    us: Vec<PyReadonlyArray2<'py, f64>>,
    order: Vec<i64>,
    dterm: i64,
    autoscl: i64,
    trans: f64,
    ridge: Option<&Bound<'py, PyAny>>,
) -> PyResult<Py<PyDict>> {
    if ys.len() != us.len() {
        return Err(PyValueError::new_err(format!(
            "ys and us must have same length: {} vs {}",
            ys.len(),
            us.len()
        )));
    }

    let config = VarxConfig {
        order: ModelOrder::from_slice(&order).map_err(to_py_err)?,
        direct_feedthrough: flag_from_int("dterm", dterm).map_err(to_py_err)?,
        autoscale: flag_from_int("autoscl", autoscl).map_err(to_py_err)?,
        truncation_mode: trans,
    };
    let ridge = parse_ridge(ridge)?;

    // Copy out of the numpy buffers while holding the GIL
    let batches: Vec<Batch> = ys
        .iter()
        .zip(us.iter())
        .map(|(y, u)| Batch::new(to_matrix(u), to_matrix(y)))
        .collect::<crate::error::Result<Vec<_>>>()
        .map_err(to_py_err)?;

    let result = py
        .allow_threads(|| identify(&batches, &config, &ridge))
        .map_err(to_py_err)?;

    let dict = PyDict::new(py);
    match result {
        Identification::Fit(fit) => {
            dict.set_item("mode", "fit")?;
            dict.set_item("A", to_rows(&fit.model.a))?;
            dict.set_item("B", to_rows(&fit.model.b))?;
            dict.set_item("C", to_rows(&fit.model.c))?;
            dict.set_item("D", to_rows(&fit.model.d))?;
            dict.set_item("K", to_rows(&fit.model.k))?;
            dict.set_item("scale_y", fit.scaling.y)?;
            dict.set_item("scale_u", fit.scaling.u)?;
            dict.set_item("penalty", fit.penalty)?;
            dict.set_item("n_samples", fit.n_samples)?;
            dict.set_item("samples_per_parameter", fit.samples_per_parameter)?;
            dict.set_item("singular_values", fit.singular_values)?;
        }
        Identification::CrossValidation(cv) => {
            let e = &cv.errors;
            let errors: Vec<Vec<Vec<f64>>> = (0..e.n_batches)
                .map(|b| {
                    (0..e.n_channels)
                        .map(|c| (0..e.n_penalties).filter_map(|l| e.get(b, c, l)).collect())
                        .collect()
                })
                .collect();
            dict.set_item("mode", "cv")?;
            dict.set_item("mean_error", e.mean_per_penalty())?;
            dict.set_item("errors", errors)?;
            dict.set_item("best_penalty", cv.best_penalty)?;
            dict.set_item("penalties", cv.penalties)?;
        }
    }

    Ok(dict.into())
}

/// Smoke-test function: returns the version string.
#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Python module definition.
#[pymodule]
fn varx_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(varx_fit, m)?)?;
    Ok(())
}
