//! Logistic regression by full-batch gradient descent
//!
//! Minimises mean cross-entropy plus `(l2 / 2n) * |w|^2` over standardized
//! features, then maps the weights back to the raw feature space so the
//! returned [`Model`] scores unscaled rows directly.
//!
//! Each iteration's gradient is summed over fixed-size row chunks in parallel.
//! Chunk partials are collected in chunk order and added sequentially, so the
//! result does not depend on the number of threads.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::features::FeatureMatrix;

/// Rows per gradient chunk
const CHUNK_ROWS: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub max_iterations: usize,
    pub learning_rate: f64,
    /// L2 penalty strength; 1.0 matches an inverse regularization strength of 1
    pub l2: f64,
    /// Stop once every gradient component is at most this large
    pub tolerance: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            learning_rate: 0.5,
            l2: 1.0,
            tolerance: 1e-6,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::config("max_iterations must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return Err(Error::config(format!(
                "l2 must be non-negative, got {}",
                self.l2
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(Error::config(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Fitted binary classifier: `p(y=1|x) = sigmoid(w.x + b)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl Model {
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    /// Number of features the model expects
    pub fn width(&self) -> usize {
        self.weights.len()
    }

    pub fn decision(&self, x: &[f64]) -> f64 {
        dot(&self.weights, x) + self.bias
    }

    /// Probability of the positive class for one row
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        sigmoid(self.decision(x))
    }

    /// 1 iff the probability reaches `threshold`
    pub fn predict(&self, x: &[f64], threshold: f64) -> u8 {
        u8::from(self.predict_proba(x) >= threshold)
    }

    /// Probabilities for every row of a matrix
    pub fn predict_proba_matrix(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        if matrix.ncols() != self.width() {
            return Err(Error::config(format!(
                "Model expects {} features, matrix has {}",
                self.width(),
                matrix.ncols()
            )));
        }
        Ok(matrix.iter_rows().map(|x| self.predict_proba(x)).collect())
    }
}

/// How the optimisation went
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitSummary {
    /// Gradient steps taken
    pub iterations: usize,
    /// Whether the gradient tolerance was met before the iteration cap
    pub converged: bool,
    /// Regularized loss of the returned model
    pub final_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedModel {
    pub model: Model,
    pub summary: FitSummary,
}

pub struct LogisticRegressionTrainer {
    config: TrainerConfig,
}

impl Default for LogisticRegressionTrainer {
    fn default() -> Self {
        Self::new(TrainerConfig::default())
    }
}

/// Per-column statistics from the training rows
struct Standardizer {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Standardizer {
    fn fit(matrix: &FeatureMatrix) -> Self {
        let n = matrix.nrows() as f64;
        let d = matrix.ncols();
        let mut means = vec![0.0; d];
        for row in matrix.iter_rows() {
            for (m, x) in means.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut scales = vec![0.0; d];
        for row in matrix.iter_rows() {
            for ((s, x), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (x - m) * (x - m);
            }
        }
        for s in &mut scales {
            *s = (*s / n).sqrt();
            // Constant columns stay centred at zero
            if *s == 0.0 || !s.is_finite() {
                *s = 1.0;
            }
        }

        Self { means, scales }
    }

    fn transform(&self, matrix: &FeatureMatrix) -> Vec<f64> {
        let mut data = Vec::with_capacity(matrix.nrows() * matrix.ncols());
        for row in matrix.iter_rows() {
            for ((x, m), s) in row.iter().zip(&self.means).zip(&self.scales) {
                data.push((x - m) / s);
            }
        }
        data
    }

    /// Express standardized-space parameters in raw feature space
    fn unscale(&self, weights: &[f64], bias: f64) -> Model {
        let raw: Vec<f64> = weights
            .iter()
            .zip(&self.scales)
            .map(|(w, s)| w / s)
            .collect();
        let shift: f64 = raw.iter().zip(&self.means).map(|(w, m)| w * m).sum();
        Model::new(raw, bias - shift)
    }
}

/// Loss and gradient sums over a block of rows
struct Partial {
    grad: Vec<f64>,
    grad_bias: f64,
    loss: f64,
}

struct Evaluation {
    grad: Vec<f64>,
    grad_bias: f64,
    loss: f64,
}

impl Evaluation {
    fn max_abs_gradient(&self) -> f64 {
        self.grad
            .iter()
            .fold(self.grad_bias.abs(), |acc, g| acc.max(g.abs()))
    }
}

impl LogisticRegressionTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Fit a model on a training matrix and its 0/1 labels
    pub fn fit(&self, matrix: &FeatureMatrix, labels: &[u8]) -> Result<FittedModel> {
        self.config.validate()?;

        if matrix.nrows() == 0 {
            return Err(Error::EmptyInput("No training rows".to_string()));
        }
        if matrix.nrows() != labels.len() {
            return Err(Error::config(format!(
                "Training matrix has {} rows but {} labels",
                matrix.nrows(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            return Err(Error::config(format!("Labels must be 0 or 1, found {}", bad)));
        }
        let positives = labels.iter().filter(|&&l| l == 1).count();
        if positives == 0 || positives == labels.len() {
            return Err(Error::DegenerateTrainingSet(format!(
                "All {} training labels are {}",
                labels.len(),
                u8::from(positives > 0)
            )));
        }

        let n = matrix.nrows();
        let d = matrix.ncols();
        let scaler = Standardizer::fit(matrix);
        let data = scaler.transform(matrix);

        let mut weights = vec![0.0; d];
        let mut bias = 0.0;
        let mut eval = self.evaluate(&data, labels, d, &weights, bias);
        let mut best = (weights.clone(), bias, eval.loss);
        let mut iterations = 0;
        let mut converged = false;

        loop {
            if eval.max_abs_gradient() <= self.config.tolerance {
                converged = true;
                break;
            }
            if iterations == self.config.max_iterations {
                break;
            }

            for (w, g) in weights.iter_mut().zip(&eval.grad) {
                *w -= self.config.learning_rate * g;
            }
            bias -= self.config.learning_rate * eval.grad_bias;
            iterations += 1;

            eval = self.evaluate(&data, labels, d, &weights, bias);
            if eval.loss < best.2 {
                best = (weights.clone(), bias, eval.loss);
            }

            if iterations % 100 == 0 {
                debug!(iteration = iterations, loss = eval.loss, "Gradient descent");
            }
        }

        let (weights, bias, final_loss) = best;
        let summary = FitSummary {
            iterations,
            converged,
            final_loss,
        };

        if converged {
            info!(
                rows = n,
                features = d,
                iterations,
                loss = final_loss,
                "Model converged"
            );
        } else {
            warn!(
                rows = n,
                features = d,
                iterations,
                loss = final_loss,
                "Model did not converge within the iteration cap"
            );
        }

        Ok(FittedModel {
            model: scaler.unscale(&weights, bias),
            summary,
        })
    }

    /// Regularized loss and gradient at `(weights, bias)`
    fn evaluate(
        &self,
        data: &[f64],
        labels: &[u8],
        d: usize,
        weights: &[f64],
        bias: f64,
    ) -> Evaluation {
        let n = labels.len();
        let chunks = n.div_ceil(CHUNK_ROWS);

        let partials: Vec<Partial> = (0..chunks)
            .into_par_iter()
            .map(|c| {
                let start = c * CHUNK_ROWS;
                let end = (start + CHUNK_ROWS).min(n);
                let mut partial = Partial {
                    grad: vec![0.0; d],
                    grad_bias: 0.0,
                    loss: 0.0,
                };
                for i in start..end {
                    let x = &data[i * d..(i + 1) * d];
                    let y = f64::from(labels[i]);
                    let z = dot(weights, x) + bias;
                    let residual = sigmoid(z) - y;
                    for (g, xj) in partial.grad.iter_mut().zip(x) {
                        *g += residual * xj;
                    }
                    partial.grad_bias += residual;
                    partial.loss += log_loss(z, y);
                }
                partial
            })
            .collect();

        let mut grad = vec![0.0; d];
        let mut grad_bias = 0.0;
        let mut loss = 0.0;
        for partial in partials {
            for (g, p) in grad.iter_mut().zip(&partial.grad) {
                *g += p;
            }
            grad_bias += partial.grad_bias;
            loss += partial.loss;
        }

        let n = n as f64;
        let penalty = self.config.l2 / n;
        for (g, w) in grad.iter_mut().zip(weights) {
            *g = *g / n + penalty * w;
        }

        Evaluation {
            grad,
            grad_bias: grad_bias / n,
            loss: loss / n + 0.5 * penalty * dot(weights, weights),
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Logistic function without overflow for large |z|
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Cross-entropy of logit `z` against label `y`
fn log_loss(z: f64, y: f64) -> f64 {
    z.max(0.0) - z * y + (-z.abs()).exp().ln_1p()
}
