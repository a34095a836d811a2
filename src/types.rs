use crate::cross_validation::CrossValidation;
use crate::error::{Result, VarxError};
use crate::estimator::VarxCoefficients;
use crate::model::InnovationsModel;

/// Lag order and target state order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelOrder {
    pub lag: usize,    // p: VARX lag window
    pub states: usize, // n: state dimension after truncation
}

impl ModelOrder {
    pub fn new(lag: usize, states: usize) -> Self {
        Self { lag, states }
    }

    /// Parse the two-element `[p, n]` form used by the bindings.
    ///
    /// Signed entries are accepted so that negative orders are reported as
    /// `InvalidOrder` rather than failing integer conversion upstream.
    pub fn from_slice(order: &[i64]) -> Result<Self> {
        let to_usize = |name: &str, v: i64| {
            usize::try_from(v).map_err(|_| {
                VarxError::InvalidOrder(format!("{} must be non-negative, got {}", name, v))
            })
        };
        match order {
            [lag, states] => Ok(Self::new(to_usize("p", *lag)?, to_usize("n", *states)?)),
            _ => Err(VarxError::InvalidOrder(format!(
                "expected two elements [p, n], got {}",
                order.len()
            ))),
        }
    }

    /// Predictor state dimension: p * ny.
    pub fn predictor_states(&self, ny: usize) -> usize {
        self.lag * ny
    }

    pub fn validate(&self, ny: usize) -> Result<()> {
        if self.lag < 1 {
            return Err(VarxError::InvalidOrder(format!(
                "lag order p must be >= 1, got {}",
                self.lag
            )));
        }
        let max_states = self.predictor_states(ny);
        if self.states < 1 || self.states > max_states {
            return Err(VarxError::InvalidOrder(format!(
                "state order n must be in [1, p*ny] = [1, {}], got {}",
                max_states, self.states
            )));
        }
        Ok(())
    }
}

/// Numerical path for the weighted truncation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TruncationMode {
    /// Eigendecomposition of the weighted Gramian (selector < 0).
    Gramian,
    /// SVD of the extended map times chol(ZZ'/N + m I) (selector m >= 0).
    Cholesky(f64),
}

impl TruncationMode {
    pub fn from_selector(selector: f64) -> Result<Self> {
        if !selector.is_finite() {
            return Err(VarxError::NonFiniteTruncation(selector));
        }
        if selector < 0.0 {
            Ok(TruncationMode::Gramian)
        } else {
            Ok(TruncationMode::Cholesky(selector))
        }
    }
}

/// Ridge request: a single penalty fits a model, a grid runs cross-validation only.
#[derive(Debug, Clone, PartialEq)]
pub enum Ridge {
    Penalty(f64),
    Grid(Vec<f64>),
}

impl Ridge {
    pub fn validate(&self) -> Result<()> {
        let check = |l: f64| {
            if l.is_finite() && l >= 0.0 {
                Ok(())
            } else {
                Err(VarxError::InvalidPenalty(format!(
                    "penalties must be finite and non-negative, got {}",
                    l
                )))
            }
        };
        match self {
            Ridge::Penalty(l) => check(*l),
            Ridge::Grid(grid) => {
                if grid.is_empty() {
                    return Err(VarxError::InvalidPenalty("penalty grid is empty".into()));
                }
                grid.iter().try_for_each(|&l| check(l))
            }
        }
    }
}

impl Default for Ridge {
    fn default() -> Self {
        Ridge::Penalty(0.0)
    }
}

/// Model configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarxConfig {
    pub order: ModelOrder,
    pub direct_feedthrough: bool,
    pub autoscale: bool,
    pub truncation_mode: f64,
}

impl VarxConfig {
    pub fn new(lag: usize, states: usize) -> Self {
        Self {
            order: ModelOrder::new(lag, states),
            ..Self::default()
        }
    }

    pub fn truncation(&self) -> Result<TruncationMode> {
        TruncationMode::from_selector(self.truncation_mode)
    }

    /// Width of one lag block in the regressor: nu + ny.
    pub fn block_width(ny: usize, nu: usize) -> usize {
        ny + nu
    }

    /// Total regressor dimension, including the direct-term block.
    pub fn regressor_dim(&self, ny: usize, nu: usize) -> usize {
        self.order.lag * Self::block_width(ny, nu) + if self.direct_feedthrough { nu } else { 0 }
    }
}

impl Default for VarxConfig {
    fn default() -> Self {
        Self {
            order: ModelOrder::new(1, 1),
            direct_feedthrough: false,
            autoscale: true,
            truncation_mode: -1.0,
        }
    }
}

/// Convert a 0/1 integer flag into a bool.
pub fn flag_from_int(name: &'static str, value: i64) -> Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(VarxError::InvalidFlag { name, value }),
    }
}

/// Global RMS of the output and input signals.
///
/// The data are multiplied by the reciprocals before fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub y: f64,
    pub u: f64,
}

impl Scaling {
    pub fn identity() -> Self {
        Self { y: 1.0, u: 1.0 }
    }

    /// Factor applied to B and D when returning to physical units.
    pub fn gain(&self) -> f64 {
        self.y / self.u
    }
}

impl Default for Scaling {
    fn default() -> Self {
        Self::identity()
    }
}

/// Fit-mode output.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub config: VarxConfig,
    pub scaling: Scaling,
    pub penalty: f64,
    pub n_samples: usize,
    pub samples_per_parameter: f64,
    pub coefficients: VarxCoefficients,
    /// Full descending spectrum of the weighted map; the leading `n` were kept.
    pub singular_values: Vec<f64>,
    pub model: InnovationsModel,
}

/// Result of [`crate::identification::identify`], tagged by mode.
#[derive(Debug, Clone)]
pub enum Identification {
    Fit(FitResult),
    CrossValidation(CrossValidation),
}

impl Identification {
    pub fn into_fit(self) -> Option<FitResult> {
        match self {
            Identification::Fit(f) => Some(f),
            Identification::CrossValidation(_) => None,
        }
    }

    pub fn into_cross_validation(self) -> Option<CrossValidation> {
        match self {
            Identification::CrossValidation(cv) => Some(cv),
            Identification::Fit(_) => None,
        }
    }
}
