//! Leave-one-batch-out cross-validation over a ridge penalty grid.
//!
//! Full-dataset cross products are computed once; each held-out batch's own
//! contribution is subtracted to obtain the training sums for that fold.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::dataset::{Batch, Dims};
use crate::error::{Result, VarxError};
use crate::estimator::{batch_covariances, solve_ridge, sum_covariances};
use crate::regressor::build_regressors;
use crate::types::{Scaling, VarxConfig};

/// Held-out RMS prediction error indexed by (batch, output channel, penalty).
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorTensor {
    pub n_batches: usize,
    pub n_channels: usize,
    pub n_penalties: usize,
    data: Vec<f64>,
}

impl ErrorTensor {
    fn from_folds(folds: Vec<Vec<Vec<f64>>>, n_channels: usize, n_penalties: usize) -> Self {
        let n_batches = folds.len();
        let mut data = vec![0.0; n_batches * n_channels * n_penalties];
        for (b, per_penalty) in folds.iter().enumerate() {
            for (l, per_channel) in per_penalty.iter().enumerate() {
                for (c, &e) in per_channel.iter().enumerate() {
                    data[(b * n_channels + c) * n_penalties + l] = e;
                }
            }
        }
        Self {
            n_batches,
            n_channels,
            n_penalties,
            data,
        }
    }

    fn at(&self, batch: usize, channel: usize, penalty: usize) -> f64 {
        self.data[(batch * self.n_channels + channel) * self.n_penalties + penalty]
    }

    /// Error of `channel` on held-out `batch` under grid entry `penalty`.
    pub fn get(&self, batch: usize, channel: usize, penalty: usize) -> Option<f64> {
        if batch < self.n_batches && channel < self.n_channels && penalty < self.n_penalties {
            Some(self.at(batch, channel, penalty))
        } else {
            None
        }
    }

    /// Error averaged over batches and channels, one entry per penalty.
    pub fn mean_per_penalty(&self) -> Vec<f64> {
        let count = (self.n_batches * self.n_channels) as f64;
        (0..self.n_penalties)
            .map(|l| {
                let mut s = 0.0;
                for b in 0..self.n_batches {
                    for c in 0..self.n_channels {
                        s += self.at(b, c, l);
                    }
                }
                s / count
            })
            .collect()
    }

    /// Error of one channel averaged over batches, one entry per penalty.
    pub fn channel_curve(&self, channel: usize) -> Option<Vec<f64>> {
        if channel >= self.n_channels {
            return None;
        }
        let curve = (0..self.n_penalties)
            .map(|l| {
                let s: f64 = (0..self.n_batches).map(|b| self.at(b, channel, l)).sum();
                s / self.n_batches as f64
            })
            .collect();
        Some(curve)
    }
}

/// Cross-validation output.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    pub penalties: Vec<f64>,
    pub errors: ErrorTensor,
    /// Grid value minimizing the mean error over batches and channels.
    pub best_penalty: f64,
}

impl CrossValidation {
    /// Pair a penalty grid with its error tensor and select the best entry.
    pub fn new(penalties: Vec<f64>, errors: ErrorTensor) -> Result<Self> {
        if penalties.is_empty() {
            return Err(VarxError::InvalidPenalty("penalty grid is empty".into()));
        }
        if penalties.len() != errors.n_penalties {
            return Err(VarxError::InvalidPenalty(format!(
                "grid has {} penalties but the error tensor has {}",
                penalties.len(),
                errors.n_penalties
            )));
        }
        let best = best_index(&errors.mean_per_penalty());
        Ok(Self {
            best_penalty: penalties[best],
            penalties,
            errors,
        })
    }

    pub fn best_index(&self) -> usize {
        best_index(&self.errors.mean_per_penalty())
    }
}

/// First index of the smallest value.
fn best_index(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map_or(0, |(i, _)| i)
}

/// Held-out error for every (batch, channel, penalty). No selection is made.
pub fn evaluate(
    batches: &[Batch],
    dims: Dims,
    config: &VarxConfig,
    scaling: &Scaling,
    penalties: &[f64],
) -> Result<ErrorTensor> {
    if batches.len() < 2 {
        return Err(VarxError::TooFewBatches(batches.len()));
    }
    let lag = config.order.lag;
    if let Some(b) = batches.iter().position(|b| b.n_samples() <= lag) {
        return Err(VarxError::DataError(format!(
            "batch {} has {} samples; cross-validation needs every batch longer than p = {}",
            b,
            batches[b].n_samples(),
            lag
        )));
    }

    let nz = config.regressor_dim(dims.ny, dims.nu);
    let parts = batch_covariances(batches, config, scaling);
    let total = sum_covariances(&parts, dims.ny, nz);
    log::debug!(
        "cross-validation: {} folds, {} penalties, {} samples",
        batches.len(),
        penalties.len(),
        total.n_samples
    );

    let folds: Vec<Vec<Vec<f64>>> = (0..batches.len())
        .into_par_iter()
        .map(|b| {
            let train = &total - &parts[b];
            let held_out = build_regressors(&batches[b], lag, config.direct_feedthrough, scaling);
            let n_eff = held_out.n_samples() as f64;
            penalties
                .iter()
                .map(|&l| {
                    let g = solve_ridge(&train, l)?;
                    let resid = &held_out.y - &g * &held_out.z;
                    Ok(resid
                        .row_iter()
                        .map(|row| (row.norm_squared() / n_eff).sqrt())
                        .collect())
                })
                .collect::<Result<Vec<Vec<f64>>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ErrorTensor::from_folds(folds, dims.ny, penalties.len()))
}
