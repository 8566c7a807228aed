//! Evaluation metrics and the train/test overfitting diagnosis.

use crate::models::VerifiedLabel;
use std::fmt;
use tracing::{info, warn};

/// Test score above train score by more than this is reported as a mismatch.
pub const MISMATCH_MARGIN: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Confusion counts with FAKE as the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Confusion {
    pub true_real: usize,
    pub false_fake: usize,
    pub false_real: usize,
    pub true_fake: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    pub real: ClassMetrics,
    pub fake: ClassMetrics,
    pub confusion: Confusion,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn class_metrics(tp: usize, fp: usize, fn_: usize) -> ClassMetrics {
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    ClassMetrics {
        precision,
        recall,
        f1,
        support: tp + fn_,
    }
}

/// Compare predictions with ground truth, pairwise.
pub fn evaluate(truth: &[VerifiedLabel], predicted: &[VerifiedLabel]) -> Evaluation {
    let mut c = Confusion::default();
    for (t, p) in truth.iter().zip(predicted) {
        match (t, p) {
            (VerifiedLabel::Real, VerifiedLabel::Real) => c.true_real += 1,
            (VerifiedLabel::Real, VerifiedLabel::Fake) => c.false_fake += 1,
            (VerifiedLabel::Fake, VerifiedLabel::Real) => c.false_real += 1,
            (VerifiedLabel::Fake, VerifiedLabel::Fake) => c.true_fake += 1,
        }
    }
    let total = c.true_real + c.false_fake + c.false_real + c.true_fake;

    Evaluation {
        accuracy: ratio(c.true_real + c.true_fake, total),
        real: class_metrics(c.true_real, c.false_real, c.false_fake),
        fake: class_metrics(c.true_fake, c.false_fake, c.false_real),
        confusion: c,
    }
}

impl Evaluation {
    pub fn log(&self) {
        info!(accuracy = %format!("{:.4}", self.accuracy), "Test set accuracy");
        for (name, m) in [("REAL", &self.real), ("FAKE", &self.fake)] {
            info!(
                class = name,
                precision = %format!("{:.2}", m.precision),
                recall = %format!("{:.2}", m.recall),
                f1 = %format!("{:.2}", m.f1),
                support = m.support,
                "Class report"
            );
        }
        let c = &self.confusion;
        info!(
            tn = c.true_real,
            fp = c.false_fake,
            fn_ = c.false_real,
            tp = c.true_fake,
            "Confusion matrix"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    Overfitting,
    Mismatch,
    Robust,
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitStatus::Overfitting => write!(f, "overfitting"),
            FitStatus::Mismatch => write!(f, "underfitting or data mismatch"),
            FitStatus::Robust => write!(f, "robust"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitDiagnosis {
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub gap: f64,
    pub status: FitStatus,
}

/// Classify the train/test accuracy gap.
pub fn diagnose(train_accuracy: f64, test_accuracy: f64, threshold: f64) -> FitDiagnosis {
    let gap = train_accuracy - test_accuracy;
    let status = if gap > threshold {
        FitStatus::Overfitting
    } else if gap < -MISMATCH_MARGIN {
        FitStatus::Mismatch
    } else {
        FitStatus::Robust
    };
    FitDiagnosis {
        train_accuracy,
        test_accuracy,
        gap,
        status,
    }
}

impl FitDiagnosis {
    pub fn log(&self) {
        let train = format!("{:.4}", self.train_accuracy);
        let test = format!("{:.4}", self.test_accuracy);
        let gap = format!("{:.4}", self.gap);
        match self.status {
            FitStatus::Overfitting => {
                warn!(%train, %test, %gap, "High overfitting detected")
            }
            FitStatus::Mismatch => {
                warn!(%train, %test, %gap, "Test score is higher than train score")
            }
            FitStatus::Robust => {
                info!(%train, %test, %gap, "Generalization gap within limits")
            }
        }
    }
}
