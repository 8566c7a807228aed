//! Bag-of-words fake-news classifier.
//!
//! A [`TextClassifier`] bundles a [`TfidfVectorizer`] and a binary
//! [`LogisticRegression`] under a version string. It is trained from the
//! articles the labeler has marked, persisted as JSON and reloaded by the
//! `predict` stage to score new articles.
//!
//! ```text
//! labeled articles ─► (undersample) ─► stratified split ─► fit ─► evaluate ─► save
//! ```

pub mod dataset;
pub mod logistic;
pub mod metrics;
pub mod tfidf;

use crate::config::ClassifierConfig;
use crate::models::VerifiedLabel;
use dataset::Sample;
use logistic::{LogisticRegression, TrainParams};
use metrics::{Evaluation, FitDiagnosis};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tfidf::TfidfVectorizer;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("no usable tokens in the training texts")]
    EmptyVocabulary,

    #[error("training needs both classes (real: {real}, fake: {fake})")]
    SingleClass { real: usize, fake: usize },

    #[error("each class needs at least {needed} samples, smallest has {got}")]
    NotEnoughSamples { needed: usize, got: usize },

    #[error("test size must be in (0, 1), got {0}")]
    InvalidTestSize(f64),

    #[error("model file not found at {path}; train it first")]
    ModelNotFound { path: PathBuf },

    #[error("model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read validation set {path}: {source}")]
    ValidationRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid validation set {path}: {source}")]
    ValidationParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<&ClassifierConfig> for TrainParams {
    fn from(config: &ClassifierConfig) -> Self {
        Self {
            c: config.c,
            max_iter: config.max_iter,
            learning_rate: config.learning_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextClassifier {
    version: String,
    vectorizer: TfidfVectorizer,
    model: LogisticRegression,
}

impl TextClassifier {
    /// Fit the vectoriser and the model on `samples`.
    #[instrument(level = "info", skip(samples, params), fields(samples = samples.len()))]
    pub fn fit(
        samples: &[Sample],
        version: &str,
        params: &TrainParams,
    ) -> Result<Self, ClassifierError> {
        let texts: Vec<&str> = samples.iter().map(|s| s.text.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(&texts)?;
        let rows: Vec<_> = texts.iter().map(|t| vectorizer.transform(t)).collect();
        let targets: Vec<f64> = samples.iter().map(Sample::target).collect();

        info!(features = vectorizer.n_features(), "Vocabulary built");
        let model = LogisticRegression::fit(&rows, &targets, vectorizer.n_features(), params);

        Ok(Self {
            version: version.to_string(),
            vectorizer,
            model,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Probability that `text` is FAKE.
    pub fn fake_probability(&self, text: &str) -> f64 {
        self.model.predict_proba(&self.vectorizer.transform(text))
    }

    /// Predicted label and the probability of that label.
    pub fn predict(&self, text: &str) -> (VerifiedLabel, f64) {
        let p = self.fake_probability(text);
        if p > 0.5 {
            (VerifiedLabel::Fake, p)
        } else {
            (VerifiedLabel::Real, 1.0 - p)
        }
    }

    /// Predict every sample and compare with its label.
    ///
    /// # Arguments
    ///
    /// * `samples` - Texts with their ground truth
    ///
    /// # Returns
    ///
    /// * `Evaluation` - Accuracy, per-class metrics and the confusion matrix
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let evaluation = model.evaluate(&test_set);
    /// evaluation.log();
    /// ```
    pub fn evaluate(&self, samples: &[Sample]) -> Evaluation {
        let truth: Vec<VerifiedLabel> = samples.iter().map(|s| s.label).collect();
        let predicted: Vec<VerifiedLabel> =
            samples.iter().map(|s| self.predict(&s.text).0).collect();
        metrics::evaluate(&truth, &predicted)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json).map_err(|source| ClassifierError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(version = %self.version, "Model saved");
        Ok(())
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        if !path.exists() {
            return Err(ClassifierError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ClassifierError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model: Self = serde_json::from_str(&raw)?;
        info!(version = %model.version, "Model loaded");
        Ok(model)
    }
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub train_size: usize,
    pub test_size: usize,
    pub evaluation: Evaluation,
    pub diagnosis: FitDiagnosis,
}

/// Balance (optionally), split, fit and evaluate.
#[instrument(level = "info", skip_all, fields(samples = samples.len()))]
pub fn train(
    samples: Vec<Sample>,
    config: &ClassifierConfig,
) -> Result<(TextClassifier, TrainingReport), ClassifierError> {
    let (real, fake) = dataset::class_counts(&samples);
    info!(real, fake, "Class balance");

    let samples = if config.balance_classes {
        dataset::undersample(samples, config.seed)
    } else {
        samples
    };

    let (train_set, test_set) = dataset::stratified_split(samples, config.test_size, config.seed)?;
    info!(train = train_set.len(), test = test_set.len(), "Split done");

    let classifier = TextClassifier::fit(&train_set, &config.model_version, &config.into())?;

    let evaluation = classifier.evaluate(&test_set);
    let train_accuracy = classifier.evaluate(&train_set).accuracy;
    let diagnosis = metrics::diagnose(
        train_accuracy,
        evaluation.accuracy,
        config.overfit_threshold,
    );

    let report = TrainingReport {
        train_size: train_set.len(),
        test_size: test_set.len(),
        evaluation,
        diagnosis,
    };
    Ok((classifier, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use VerifiedLabel::{Fake, Real};

    fn corpus() -> Vec<Sample> {
        let fake = [
            "shocking secret cure doctors hate miracle",
            "aliens secretly control government shocking truth",
            "miracle pill melts fat overnight shocking",
            "celebrity clone replaced secret leaked shocking",
            "moon landing staged hollywood secret studio",
            "vaccine microchips tracking secret leaked",
        ];
        let real = [
            "parliament passed budget after lengthy debate",
            "central bank held interest rates steady",
            "earthquake damaged buildings officials reported",
            "senate delayed vote healthcare bill recess",
            "company reported quarterly earnings analysts expected",
            "ministers met discuss trade agreement brussels",
        ];
        fake.iter()
            .map(|t| Sample::new(*t, Fake))
            .chain(real.iter().map(|t| Sample::new(*t, Real)))
            .collect()
    }

    #[test]
    fn test_fit_and_predict() {
        let classifier = TextClassifier::fit(&corpus(), "test_v1", &TrainParams::default()).unwrap();
        assert_eq!(classifier.version(), "test_v1");

        let (label, confidence) = classifier.predict("shocking secret miracle leaked");
        assert_eq!(label, Fake);
        assert!(confidence > 0.5 && confidence <= 1.0);

        let (label, confidence) = classifier.predict("budget debate parliament interest rates");
        assert_eq!(label, Real);
        assert!(confidence >= 0.5);
    }

    #[test]
    fn test_unknown_text_falls_back_to_bias() {
        let classifier = TextClassifier::fit(&corpus(), "v", &TrainParams::default()).unwrap();
        let p = classifier.fake_probability("zzzz qqqq");
        assert!((p - 0.5).abs() < 0.1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let classifier = TextClassifier::fit(&corpus(), "bow_v", &TrainParams::default()).unwrap();
        classifier.save(&path).unwrap();

        let loaded = TextClassifier::load(&path).unwrap();
        assert_eq!(loaded.version(), "bow_v");
        let text = "secret shocking cure";
        assert_eq!(loaded.fake_probability(text), classifier.fake_probability(text));
    }

    #[test]
    fn test_load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = TextClassifier::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ClassifierError::ModelNotFound { .. }));
        assert!(err.to_string().contains("train it first"));
    }

    #[test]
    fn test_train_reports_metrics() {
        let config = ClassifierConfig {
            test_size: 0.34,
            ..ClassifierConfig::default()
        };
        let (classifier, report) = train(corpus(), &config).unwrap();
        assert_eq!(classifier.version(), "bow_logit_v1");
        assert_eq!(report.train_size + report.test_size, 12);
        assert_eq!(report.test_size, 4);
        assert_eq!(
            report.evaluation.real.support + report.evaluation.fake.support,
            report.test_size
        );
        assert!((0.0..=1.0).contains(&report.diagnosis.train_accuracy));
    }

    #[test]
    fn test_train_with_balancing() {
        let mut samples = corpus();
        samples.push(Sample::new("officials confirmed storm warning coast", Real));
        samples.push(Sample::new("court ruled regulation lawful", Real));
        let config = ClassifierConfig {
            balance_classes: true,
            test_size: 0.34,
            ..ClassifierConfig::default()
        };
        let (_, report) = train(samples, &config).unwrap();
        assert_eq!(report.train_size + report.test_size, 12);
    }

    #[test]
    fn test_train_single_class() {
        let samples: Vec<Sample> = corpus().into_iter().filter(|s| s.label == Fake).collect();
        let err = train(samples, &ClassifierConfig::default()).unwrap_err();
        assert!(matches!(err, ClassifierError::SingleClass { .. }));
    }
}
