//! Mapping of free-form fact-check verdicts to binary labels.
//!
//! Verdicts are matched against an ordered list of [`VerdictRule`]s. Each
//! rule carries a set of keywords and a [`VerdictClass`]; the first rule with
//! a keyword that occurs (case-insensitively) inside the verdict decides.
//! Because this is substring membership and not an exclusive partition, the
//! order of the rules matters: `"barely-true"` and `"half-true"` both contain
//! `"true"`, so the FAKE and AMBIGUOUS rules are evaluated before the REAL one.
//!
//! A verdict that no rule matches is ambiguous as well, and the labeler
//! leaves the article alone.

use crate::config::default_verdict_rules;
use crate::models::VerifiedLabel;
use serde::Deserialize;

/// Outcome of a verdict rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictClass {
    Fake,
    Real,
    /// Too mixed to serve as ground truth.
    Ambiguous,
}

impl VerdictClass {
    pub fn label(self) -> Option<VerifiedLabel> {
        match self {
            VerdictClass::Fake => Some(VerifiedLabel::Fake),
            VerdictClass::Real => Some(VerifiedLabel::Real),
            VerdictClass::Ambiguous => None,
        }
    }
}

/// One entry of the ordered rule list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerdictRule {
    pub class: VerdictClass,
    pub keywords: Vec<String>,
}

impl VerdictRule {
    pub fn new<I, S>(class: VerdictClass, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            class,
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    fn matches(&self, verdict: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| verdict.contains(&keyword.to_lowercase()))
    }
}

/// First-match-wins evaluator over a list of [`VerdictRule`]s.
#[derive(Debug, Clone)]
pub struct VerdictMapper {
    rules: Vec<VerdictRule>,
}

impl Default for VerdictMapper {
    fn default() -> Self {
        Self::new(default_verdict_rules())
    }
}

impl VerdictMapper {
    pub fn new(rules: Vec<VerdictRule>) -> Self {
        Self { rules }
    }

    /// Classify a verdict; verdicts no rule recognises are ambiguous.
    pub fn classify(&self, verdict: &str) -> VerdictClass {
        let verdict = verdict.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&verdict))
            .map_or(VerdictClass::Ambiguous, |rule| rule.class)
    }

    /// Map a verdict to a label, or `None` when the verdict is ambiguous.
    pub fn map(&self, verdict: &str) -> Option<VerifiedLabel> {
        self.classify(verdict).label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_indicators() {
        let mapper = VerdictMapper::default();
        assert_eq!(mapper.map("false"), Some(VerifiedLabel::Fake));
        assert_eq!(mapper.map("pants-fire"), Some(VerifiedLabel::Fake));
        assert_eq!(mapper.map("mostly-false"), Some(VerifiedLabel::Fake));
    }

    #[test]
    fn test_barely_true_is_fake() {
        let mapper = VerdictMapper::default();
        assert_eq!(mapper.map("barely-true"), Some(VerifiedLabel::Fake));
    }

    #[test]
    fn test_real_indicators() {
        let mapper = VerdictMapper::default();
        assert_eq!(mapper.map("true"), Some(VerifiedLabel::Real));
        assert_eq!(mapper.map("mostly-true"), Some(VerifiedLabel::Real));
    }

    #[test]
    fn test_case_insensitive() {
        let mapper = VerdictMapper::default();
        assert_eq!(mapper.map("Pants-Fire"), Some(VerifiedLabel::Fake));
        assert_eq!(mapper.map("TRUE"), Some(VerifiedLabel::Real));
        assert_eq!(mapper.map("Half-True"), None);
    }

    #[test]
    fn test_half_true_is_ambiguous() {
        let mapper = VerdictMapper::default();
        assert_eq!(mapper.classify("half-true"), VerdictClass::Ambiguous);
        assert_eq!(mapper.map("half-true"), None);
    }

    #[test]
    fn test_unrecognised_verdicts_are_ambiguous() {
        let mapper = VerdictMapper::default();
        assert_eq!(mapper.map("full-flop"), None);
        assert_eq!(mapper.map("unknown"), None);
        assert_eq!(mapper.map(""), None);
    }

    #[test]
    fn test_fake_rule_wins_when_both_match() {
        let mapper = VerdictMapper::default();
        assert_eq!(mapper.map("true or false"), Some(VerifiedLabel::Fake));
    }

    #[test]
    fn test_custom_rules_are_evaluated_in_order() {
        let mapper = VerdictMapper::new(vec![
            VerdictRule::new(VerdictClass::Real, ["Geppetto"]),
            VerdictRule::new(VerdictClass::Fake, ["pinocchio"]),
        ]);
        assert_eq!(mapper.map("four pinocchios"), Some(VerifiedLabel::Fake));
        assert_eq!(mapper.map("geppetto checkmark"), Some(VerifiedLabel::Real));
        assert_eq!(mapper.map("false"), None);
    }

    #[test]
    fn test_empty_rule_list_maps_nothing() {
        let mapper = VerdictMapper::new(Vec::new());
        assert_eq!(mapper.map("false"), None);
    }
}
