//! Training samples, class balancing and the stratified train/test split.

use super::ClassifierError;
use crate::models::{LabeledText, VerifiedLabel};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub text: String,
    pub label: VerifiedLabel,
}

impl Sample {
    pub fn new(text: impl Into<String>, label: VerifiedLabel) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }

    /// `1.0` for FAKE, `0.0` for REAL.
    pub fn target(&self) -> f64 {
        self.label.as_i64() as f64
    }
}

/// Convert store rows into samples, skipping rows with an unrecognised label value.
pub fn from_labeled(rows: Vec<LabeledText>) -> Vec<Sample> {
    rows.into_iter()
        .filter_map(|row| match VerifiedLabel::from_i64(row.verified_label) {
            Some(label) => Some(Sample::new(row.text, label)),
            None => {
                warn!(value = row.verified_label, "Skipping row with invalid label");
                None
            }
        })
        .collect()
}

/// Ground truth as written in validation files: `FAKE`, or `TRUE` / `REAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum GroundTruth {
    Fake,
    #[serde(alias = "REAL")]
    True,
}

impl From<GroundTruth> for VerifiedLabel {
    fn from(truth: GroundTruth) -> Self {
        match truth {
            GroundTruth::Fake => VerifiedLabel::Fake,
            GroundTruth::True => VerifiedLabel::Real,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValidationRow {
    text: String,
    #[serde(alias = "ground_truth")]
    truth: GroundTruth,
}

/// Read a held-out validation set.
///
/// The file is a JSON array of `{"text": ..., "truth": "FAKE" | "TRUE"}`
/// objects. Texts in it should never have been part of training.
///
/// # Arguments
///
/// * `path` - Location of the JSON file
///
/// # Returns
///
/// * `Result<Vec<Sample>, ClassifierError>` - One sample per row, in file order
///
/// # Examples
///
/// ```ignore
/// // [{"text": "NASA confirms Earth will go dark for 6 days", "truth": "FAKE"}]
/// let samples = load_validation_set(Path::new("validation.json"))?;
/// assert_eq!(samples[0].label, VerifiedLabel::Fake);
/// ```
pub fn load_validation_set(path: &Path) -> Result<Vec<Sample>, ClassifierError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ClassifierError::ValidationRead {
        path: path.to_path_buf(),
        source,
    })?;
    let rows: Vec<ValidationRow> =
        serde_json::from_str(&raw).map_err(|source| ClassifierError::ValidationParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(rows
        .into_iter()
        .map(|row| Sample::new(row.text, row.truth.into()))
        .collect())
}

/// `(real, fake)` counts.
pub fn class_counts(samples: &[Sample]) -> (usize, usize) {
    let fake = samples
        .iter()
        .filter(|s| s.label == VerifiedLabel::Fake)
        .count();
    (samples.len() - fake, fake)
}

fn partition(samples: Vec<Sample>) -> (Vec<Sample>, Vec<Sample>) {
    samples
        .into_iter()
        .partition(|s| s.label == VerifiedLabel::Real)
}

/// Randomly drop samples of the majority class until both classes are the
/// size of the minority class. Surviving samples keep their original order.
pub fn undersample(samples: Vec<Sample>, seed: u64) -> Vec<Sample> {
    let (real, fake) = class_counts(&samples);
    let keep = real.min(fake);
    info!(real, fake, keep, "Undersampling to the minority class");

    let mut rng = StdRng::seed_from_u64(seed);
    let mut chosen = Vec::with_capacity(keep * 2);
    for label in [VerifiedLabel::Real, VerifiedLabel::Fake] {
        let mut indices: Vec<usize> = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.label == label)
            .map(|(i, _)| i)
            .collect();
        indices.shuffle(&mut rng);
        chosen.extend(indices.into_iter().take(keep));
    }
    chosen.sort_unstable();

    let mut slots: Vec<Option<Sample>> = samples.into_iter().map(Some).collect();
    chosen
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

/// Split into `(train, test)` keeping the class proportions in both parts.
///
/// Each class contributes `round(len * test_size)` samples to the test set,
/// clamped so that both parts receive at least one sample of each class.
pub fn stratified_split(
    samples: Vec<Sample>,
    test_size: f64,
    seed: u64,
) -> Result<(Vec<Sample>, Vec<Sample>), ClassifierError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ClassifierError::InvalidTestSize(test_size));
    }
    let (real, fake) = class_counts(&samples);
    if real == 0 || fake == 0 {
        return Err(ClassifierError::SingleClass { real, fake });
    }
    if real < 2 || fake < 2 {
        return Err(ClassifierError::NotEnoughSamples {
            needed: 2,
            got: real.min(fake),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let (real_samples, fake_samples) = partition(samples);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for mut class in [real_samples, fake_samples] {
        class.shuffle(&mut rng);
        let n_test = ((class.len() as f64 * test_size).round() as usize).clamp(1, class.len() - 1);
        let rest = class.split_off(n_test);
        test.extend(class);
        train.extend(rest);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok((train, test))
}
