//! Binary logistic regression over sparse TF-IDF rows.

use super::tfidf::SparseVec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Optimiser settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainParams {
    /// Inverse L2 regularisation strength; smaller is stronger.
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 500,
            learning_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl LogisticRegression {
    /// Fit by full-batch gradient descent on the mean log-loss plus
    /// `||w||² / (2 C n)`. The bias is not regularised. Deterministic for a
    /// given input order.
    ///
    /// The step is `learning_rate / (1 + 1/(C n))` so strong regularisation
    /// cannot make the weight update overshoot.
    pub fn fit(rows: &[SparseVec], targets: &[f64], n_features: usize, params: &TrainParams) -> Self {
        let mut model = Self {
            weights: vec![0.0; n_features],
            bias: 0.0,
        };
        if rows.is_empty() {
            return model;
        }

        let n = rows.len() as f64;
        let l2 = 1.0 / (params.c * n);
        let step = params.learning_rate / (1.0 + l2);
        let mut grad = vec![0.0; n_features];

        for iter in 0..params.max_iter {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_bias = 0.0;
            let mut loss = 0.0;

            for (row, &y) in rows.iter().zip(targets) {
                let p = sigmoid(model.decision(row));
                let err = p - y;
                for &(j, x) in row {
                    grad[j] += err * x;
                }
                grad_bias += err;
                loss -= y * p.max(1e-12).ln() + (1.0 - y) * (1.0 - p).max(1e-12).ln();
            }

            for (w, g) in model.weights.iter_mut().zip(&grad) {
                *w -= step * (g / n + l2 * *w);
            }
            model.bias -= step * grad_bias / n;

            if iter % 100 == 0 {
                debug!(iter, loss = loss / n, "Gradient descent step");
            }
        }

        model
    }

    pub fn decision(&self, row: &SparseVec) -> f64 {
        self.bias
            + row
                .iter()
                .filter_map(|&(j, x)| self.weights.get(j).map(|w| w * x))
                .sum::<f64>()
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, row: &SparseVec) -> f64 {
        sigmoid(self.decision(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(!sigmoid(-800.0).is_nan());
    }

    #[test]
    fn test_fit_separable_data() {
        let rows: Vec<SparseVec> = vec![
            vec![(0, 1.0)],
            vec![(0, 1.0)],
            vec![(1, 1.0)],
            vec![(1, 1.0)],
        ];
        let targets = [1.0, 1.0, 0.0, 0.0];
        let model = LogisticRegression::fit(&rows, &targets, 2, &TrainParams::default());

        assert!(model.predict_proba(&vec![(0, 1.0)]) > 0.6);
        assert!(model.predict_proba(&vec![(1, 1.0)]) < 0.4);
    }

    #[test]
    fn test_strong_regularisation_shrinks_weights() {
        let rows: Vec<SparseVec> = vec![vec![(0, 1.0)], vec![(1, 1.0)]];
        let targets = [1.0, 0.0];
        let loose = LogisticRegression::fit(&rows, &targets, 2, &TrainParams::default());
        let tight = LogisticRegression::fit(
            &rows,
            &targets,
            2,
            &TrainParams {
                c: 0.01,
                ..TrainParams::default()
            },
        );
        assert!(tight.weights[0].abs() < loose.weights[0].abs());
    }

    #[test]
    fn test_empty_training_set() {
        let model = LogisticRegression::fit(&[], &[], 3, &TrainParams::default());
        assert_eq!(model.predict_proba(&vec![(0, 1.0)]), 0.5);
    }

    #[test]
    fn test_decision_ignores_out_of_range_features() {
        let model = LogisticRegression {
            weights: vec![2.0],
            bias: 0.5,
        };
        assert_eq!(model.decision(&vec![(0, 1.0), (7, 3.0)]), 2.5);
    }
}
