//! Top-level identification pipeline.
//!
//! Fit mode: scaling -> VARX estimate -> predictor -> weighted truncation -> innovations form.
//! Cross-validation mode: scaling -> leave-one-batch-out errors over the penalty grid.

use crate::cross_validation::{self, CrossValidation};
use crate::dataset::{validate_dataset, Batch, Dims};
use crate::error::{Result, VarxError};
use crate::estimator::estimate;
use crate::model::InnovationsModel;
use crate::scaling::compute_scaling;
use crate::state_space::PredictorForm;
use crate::truncation::weighted_truncation;
use crate::types::{FitResult, Identification, Ridge, VarxConfig};

/// Run the pipeline selected by `ridge`: a single penalty fits a model, a grid
/// only reports cross-validation errors.
pub fn identify(batches: &[Batch], config: &VarxConfig, ridge: &Ridge) -> Result<Identification> {
    match ridge {
        Ridge::Penalty(l) => fit(batches, config, *l).map(Identification::Fit),
        Ridge::Grid(grid) => cross_validate(batches, config, grid).map(Identification::CrossValidation),
    }
}

/// Preconditions shared by both modes.
fn validate_inputs(batches: &[Batch], config: &VarxConfig, ridge: &Ridge) -> Result<Dims> {
    let dims = validate_dataset(batches)?;
    config.order.validate(dims.ny)?;
    config.truncation()?;
    ridge.validate()?;
    Ok(dims)
}

/// Fit an order-n innovations model with ridge penalty `penalty`.
pub fn fit(batches: &[Batch], config: &VarxConfig, penalty: f64) -> Result<FitResult> {
    let dims = validate_inputs(batches, config, &Ridge::Penalty(penalty))?;
    let mode = config.truncation()?;
    let lag = config.order.lag;
    let states = config.order.states;
    log::debug!(
        "fit: {} batches, ny = {}, nu = {}, p = {}, n = {}, penalty = {}",
        batches.len(),
        dims.ny,
        dims.nu,
        lag,
        states,
        penalty
    );

    let scaling = compute_scaling(batches, dims, config.autoscale)?;
    let est = estimate(batches, dims, config, &scaling, penalty)?;

    let predictor = PredictorForm::from_varx(&est.coefficients)?;
    // The direct block, when present, trails the lag blocks and is not weighted.
    let nz_lag = lag * VarxConfig::block_width(dims.ny, dims.nu);
    let zz_lag = est.zz.view((0, 0), (nz_lag, nz_lag)).into_owned();
    let truncation = weighted_truncation(&predictor, &zz_lag, est.n_samples, states, mode)?;
    let reduced = truncation.apply(&predictor);

    let model = InnovationsModel::from_predictor(&reduced, &scaling);
    if model.order() != states {
        return Err(VarxError::ShapeMismatch {
            expected: states,
            got: model.order(),
        });
    }

    Ok(FitResult {
        config: config.clone(),
        scaling,
        penalty,
        n_samples: est.n_samples,
        samples_per_parameter: est.samples_per_parameter(),
        coefficients: est.coefficients,
        singular_values: truncation.singular_values,
        model,
    })
}

/// Leave-one-batch-out errors for every penalty in `penalties`.
pub fn cross_validate(
    batches: &[Batch],
    config: &VarxConfig,
    penalties: &[f64],
) -> Result<CrossValidation> {
    let dims = validate_inputs(batches, config, &Ridge::Grid(penalties.to_vec()))?;
    if batches.len() < 2 {
        return Err(VarxError::TooFewBatches(batches.len()));
    }
    let scaling = compute_scaling(batches, dims, config.autoscale)?;
    let errors = cross_validation::evaluate(batches, dims, config, &scaling, penalties)?;
    let cv = CrossValidation::new(penalties.to_vec(), errors)?;
    log::info!("cross-validation selected penalty {}", cv.best_penalty);
    Ok(cv)
}
