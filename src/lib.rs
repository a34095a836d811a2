//! State-space system identification from batches of input-output data.
//!
//! A VARX predictor is fitted by (ridge-regularized) least squares and then
//! reduced to an innovations-form model of the requested order by weighted
//! truncation of its extended controllability map.

pub mod error;
pub mod types;
pub mod dataset;
pub mod scaling;
pub mod regressor;
pub mod estimator;
pub mod cross_validation;
pub mod state_space;
pub mod truncation;
pub mod model;
pub mod identification;
pub mod report;

#[cfg(feature = "python")]
mod python;

pub use cross_validation::{CrossValidation, ErrorTensor};
pub use dataset::Batch;
pub use error::{Result, VarxError};
pub use identification::{cross_validate, fit, identify};
pub use model::InnovationsModel;
pub use report::CvReport;
pub use types::{FitResult, Identification, ModelOrder, Ridge, TruncationMode, VarxConfig};
