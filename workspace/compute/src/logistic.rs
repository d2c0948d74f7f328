//! Multinomial logistic regression trained with full-batch gradient descent.
//!
//! Features are standardised with the training split's mean and standard
//! deviation before fitting; the fitted model applies the same transform at
//! prediction time. The objective is the mean cross-entropy plus an L2 penalty
//! `||W||^2 / (2 * C * n)`, which is the usual `C`-parameterised objective
//! divided by the sample count.

use model::Species;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use tracing::{debug, trace};

use crate::error::{PredictionError, Result};

const N_CLASSES: usize = 3;

/// Training hyper-parameters.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub max_iter: usize,
    /// Inverse regularisation strength.
    pub c: f64,
    pub learning_rate: f64,
    /// Stop early once the largest gradient component falls below this.
    pub tol: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            max_iter: 200,
            c: 1.0,
            learning_rate: 0.5,
            tol: 1e-4,
        }
    }
}

impl LogisticRegression {
    pub fn with_max_iter(max_iter: usize) -> Self {
        Self {
            max_iter,
            ..Self::default()
        }
    }

    pub fn fit(&self, x: &Array2<f64>, y: &[Species]) -> Result<FittedLogisticRegression> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(PredictionError::Inference(
                "Cannot fit on an empty training set".to_string(),
            ));
        }
        if y.len() != n_samples {
            return Err(PredictionError::Inference(format!(
                "Found {} samples but {} labels",
                n_samples,
                y.len()
            )));
        }
        if self.c <= 0.0 {
            return Err(PredictionError::Inference(format!(
                "C must be positive, got {}",
                self.c
            )));
        }

        let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
            PredictionError::Inference("Cannot compute feature means".to_string())
        })?;
        // Constant columns keep a unit scale so they standardise to zero
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        let xs = (x - &mean) / &scale;

        let mut targets = Array2::<f64>::zeros((n_samples, N_CLASSES));
        for (row, species) in y.iter().enumerate() {
            targets[[row, species.index()]] = 1.0;
        }

        let n = n_samples as f64;
        let penalty = 1.0 / (self.c * n);
        let mut weights = Array2::<f64>::zeros((n_features, N_CLASSES));
        let mut bias = Array1::<f64>::zeros(N_CLASSES);

        let mut iterations = 0;
        for iter in 0..self.max_iter {
            iterations = iter + 1;
            let probs = softmax_rows(xs.dot(&weights) + &bias);
            let residual = probs - &targets;

            let grad_w = xs.t().dot(&residual) / n + &weights * penalty;
            let grad_b = residual.sum_axis(Axis(0)) / n;

            weights.scaled_add(-self.learning_rate, &grad_w);
            bias.scaled_add(-self.learning_rate, &grad_b);

            let max_grad = grad_w
                .iter()
                .chain(grad_b.iter())
                .fold(0.0_f64, |acc, g| acc.max(g.abs()));
            if !max_grad.is_finite() {
                return Err(PredictionError::Inference(
                    "Gradient diverged while fitting".to_string(),
                ));
            }
            if max_grad < self.tol {
                trace!("Converged after {} iterations", iterations);
                break;
            }
        }
        debug!(
            "Fitted logistic regression on {} samples x {} features in {} iterations",
            n_samples, n_features, iterations
        );

        Ok(FittedLogisticRegression {
            mean,
            scale,
            weights,
            bias,
            iterations,
        })
    }
}

/// A trained model.
#[derive(Debug, Clone)]
pub struct FittedLogisticRegression {
    mean: Array1<f64>,
    scale: Array1<f64>,
    weights: Array2<f64>,
    bias: Array1<f64>,
    iterations: usize,
}

impl FittedLogisticRegression {
    pub fn n_features(&self) -> usize {
        self.weights.nrows()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Class probabilities, one row per sample, columns in `Species::ALL` order.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(PredictionError::MalformedInput(format!(
                "X has {} features, but the model is expecting {} features as input",
                x.ncols(),
                self.n_features()
            )));
        }
        let xs = (x - &self.mean) / &self.scale;
        let probs = softmax_rows(xs.dot(&self.weights) + &self.bias);
        // Overflowing logits turn into NaN rows that argmax would read as class 0
        if probs.iter().any(|p| !p.is_finite()) {
            return Err(PredictionError::Inference(
                "Input is outside the range the model can score".to_string(),
            ));
        }
        Ok(probs)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<Species>> {
        let probs = self.predict_proba(x)?;
        probs
            .axis_iter(Axis(0))
            .map(|row| {
                Species::from_index(argmax(row)).ok_or_else(|| {
                    PredictionError::Inference("Prediction index out of range".to_string())
                })
            })
            .collect()
    }

    /// Fraction of rows predicted correctly.
    pub fn score(&self, x: &Array2<f64>, y: &[Species]) -> Result<f64> {
        if y.is_empty() {
            return Ok(0.0);
        }
        let predicted = self.predict(x)?;
        let correct = predicted.iter().zip(y).filter(|(p, t)| p == t).count();
        Ok(correct as f64 / y.len() as f64)
    }
}

fn softmax_rows(mut logits: Array2<f64>) -> Array2<f64> {
    for mut row in logits.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    logits
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(values: ArrayView1<f64>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_i, best_v), (i, &v)| {
            if v > best_v { (i, v) } else { (best_i, best_v) }
        })
        .0
}
