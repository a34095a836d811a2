//! Plain-text summary of a cross-validation run.

use std::fmt;

use crate::cross_validation::CrossValidation;

/// Table of per-channel error curves against the penalty grid.
///
/// One row per penalty; the selected penalty is marked with `*`.
pub struct CvReport<'a> {
    cv: &'a CrossValidation,
}

impl<'a> CvReport<'a> {
    pub fn new(cv: &'a CrossValidation) -> Self {
        Self { cv }
    }

    /// Abscissa used for the curves. Zero has no logarithm and is reported as `-inf`.
    fn log_penalty(l: f64) -> String {
        if l > 0.0 {
            format!("{:8.3}", l.log10())
        } else {
            format!("{:>8}", "-inf")
        }
    }
}

impl fmt::Display for CvReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = &self.cv.errors;
        let best = self.cv.best_index();
        let curves: Vec<Vec<f64>> = (0..errors.n_channels)
            .filter_map(|c| errors.channel_curve(c))
            .collect();
        let mean = errors.mean_per_penalty();

        writeln!(
            f,
            "leave-one-batch-out RMS error ({} batches, {} channels)",
            errors.n_batches, errors.n_channels
        )?;
        write!(f, "  {:>12} {:>8}", "penalty", "log10")?;
        for c in 0..errors.n_channels {
            write!(f, " {:>12}", format!("y{}", c))?;
        }
        writeln!(f, " {:>12}", "mean")?;

        for (l, &penalty) in self.cv.penalties.iter().enumerate() {
            let mark = if l == best { '*' } else { ' ' };
            write!(f, "{} {:>12.4e} {}", mark, penalty, Self::log_penalty(penalty))?;
            for curve in &curves {
                write!(f, " {:>12.6}", curve[l])?;
            }
            writeln!(f, " {:>12.6}", mean[l])?;
        }
        write!(f, "selected penalty: {}", self.cv.best_penalty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_validation::evaluate;
    use crate::dataset::{validate_dataset, Batch};
    use crate::types::{Scaling, VarxConfig};

    fn sine_batches() -> Vec<Batch> {
        (0..3)
            .map(|b| {
                let n = 200;
                let u: Vec<f64> = (0..n).map(|k| ((k * (b + 2)) as f64 * 0.37).sin()).collect();
                let mut y = vec![0.0; n];
                for k in 1..n {
                    y[k] = 0.8 * y[k - 1] + u[k - 1] + 0.01 * ((k * 7 + b) as f64).cos();
                }
                Batch::from_rows(&[u], &[y]).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_report_marks_selected_penalty() {
        let batches = sine_batches();
        let dims = validate_dataset(&batches).unwrap();
        let penalties = vec![0.0, 1e3, 1e6];
        let errors = evaluate(&batches, dims, &VarxConfig::new(1, 1), &Scaling::identity(), &penalties).unwrap();
        let cv = CrossValidation::new(penalties, errors).unwrap();
        let text = CvReport::new(&cv).to_string();

        let lines: Vec<&str> = text.lines().collect();
        // Title, header, three rows, selection
        assert_eq!(lines.len(), 6);
        assert!(lines[1].contains("y0") && lines[1].contains("mean"));
        assert_eq!(lines.iter().filter(|l| l.starts_with('*')).count(), 1);
        assert!(lines[2 + cv.best_index()].starts_with('*'));
        assert!(lines[2].contains("-inf"));
        assert!(lines[5].starts_with("selected penalty:"));
    }
}
