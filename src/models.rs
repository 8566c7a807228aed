//! Data models for articles, fact-checks and classifier predictions.
//!
//! This module defines the records that flow between the pipeline stages:
//! - [`NewArticle`]: a scraped news article before insertion
//! - [`NewFactCheck`] / [`FactCheck`]: verdicts published by fact-checking sites
//! - [`UnlabeledArticle`]: the slice of an article the labeler needs
//! - [`Prediction`]: classifier output persisted by `predict`
//! - [`VerifiedLabel`]: the binary ground truth (FAKE = 1, REAL = 0)

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Value written to `authors` / `publish_date` when a page carries no metadata.
pub const UNKNOWN: &str = "Unknown";

/// Ground-truth classification of an article.
///
/// Stored as an integer in the `verified_label` column: `1` for FAKE and
/// `0` for REAL. A `NULL` column means the article has not been labeled yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifiedLabel {
    Real,
    Fake,
}

impl VerifiedLabel {
    /// Integer encoding used by the store and the classifier.
    pub fn as_i64(self) -> i64 {
        match self {
            VerifiedLabel::Real => 0,
            VerifiedLabel::Fake => 1,
        }
    }

    /// Decode the integer encoding; any other value is rejected.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(VerifiedLabel::Real),
            1 => Some(VerifiedLabel::Fake),
            _ => None,
        }
    }
}

impl fmt::Display for VerifiedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifiedLabel::Real => write!(f, "REAL"),
            VerifiedLabel::Fake => write!(f, "FAKE"),
        }
    }
}

/// A news article as scraped, before it has an id.
///
/// Missing metadata is represented by [`UNKNOWN`] rather than `None`,
/// matching what ends up in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    /// Canonical URL of the article (unique in the store).
    pub url: String,
    /// Human name of the feed the article came from.
    pub source: String,
    pub title: String,
    /// Extracted body text.
    pub text: String,
    /// Comma separated author list or [`UNKNOWN`].
    pub authors: String,
    /// Publication date (RFC 3339 when parseable) or [`UNKNOWN`].
    pub publish_date: String,
}

/// A stored article row, read back by store tests.
#[cfg(test)]
#[derive(Debug, Clone, FromRow)]
pub struct Article {
    pub id: i64,
    pub url: String,
    pub source: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub authors: Option<String>,
    pub publish_date: Option<String>,
    pub scraped_at: Option<String>,
    pub is_processed: i64,
    pub verified_label: Option<i64>,
    pub label_source: Option<String>,
}

#[cfg(test)]
impl Article {
    pub fn processed(&self) -> bool {
        self.is_processed != 0
    }

    /// The decoded ground-truth label, if any.
    pub fn label(&self) -> Option<VerifiedLabel> {
        self.verified_label.and_then(VerifiedLabel::from_i64)
    }
}

/// The part of an unlabeled article the semantic matcher works on.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UnlabeledArticle {
    pub id: i64,
    pub title: String,
}

/// An article waiting to be scored by the classifier.
#[derive(Debug, Clone, FromRow)]
pub struct PendingArticle {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub source: String,
}

/// A labeled article used as classifier training signal.
#[derive(Debug, Clone, FromRow)]
pub struct LabeledText {
    pub text: String,
    pub verified_label: i64,
}

/// A fact-check as scraped, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFactCheck {
    /// The statement that was checked.
    pub claim: String,
    /// Free-form verdict, lower-cased (e.g. `"pants-fire"`).
    pub verdict: String,
    /// Link to the fact-check page.
    pub source_url: String,
    /// Name of the fact-checking organisation.
    pub checker_site: String,
}

/// A stored fact-check row.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FactCheck {
    pub id: i64,
    pub claim: String,
    pub verdict: String,
    pub source_url: String,
    pub checker_site: String,
}

/// Classifier output for one article.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub article_id: i64,
    pub model_version: String,
    pub predicted_label: VerifiedLabel,
    /// Probability of the predicted class, in `[0.5, 1.0]`.
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verified_label_encoding() {
        assert_eq!(VerifiedLabel::Fake.as_i64(), 1);
        assert_eq!(VerifiedLabel::Real.as_i64(), 0);
        assert_eq!(VerifiedLabel::from_i64(1), Some(VerifiedLabel::Fake));
        assert_eq!(VerifiedLabel::from_i64(0), Some(VerifiedLabel::Real));
        assert_eq!(VerifiedLabel::from_i64(2), None);
    }

    #[test]
    fn test_verified_label_display() {
        assert_eq!(VerifiedLabel::Fake.to_string(), "FAKE");
        assert_eq!(VerifiedLabel::Real.to_string(), "REAL");
    }

    #[test]
    fn test_verified_label_serde() {
        let json = serde_json::to_string(&VerifiedLabel::Fake).unwrap();
        assert_eq!(json, "\"fake\"");
        let back: VerifiedLabel = serde_json::from_str("\"real\"").unwrap();
        assert_eq!(back, VerifiedLabel::Real);
    }

    #[test]
    fn test_article_label_decoding() {
        let article = Article {
            id: 1,
            url: "https://example.com/a".to_string(),
            source: None,
            title: None,
            text: None,
            authors: None,
            publish_date: None,
            scraped_at: None,
            is_processed: 0,
            verified_label: Some(1),
            label_source: None,
        };
        assert_eq!(article.label(), Some(VerifiedLabel::Fake));
    }
}
