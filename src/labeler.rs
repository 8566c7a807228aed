//! Semantic labeler: links unlabeled articles to known fact-checks.
//!
//! One pass embeds every unlabeled article title and every fact-check claim,
//! builds the full cosine-similarity matrix and picks the best fact-check
//! for each article. The best score then decides what happens:
//!
//! | Best score `s` | Outcome |
//! |----------------|---------|
//! | `s < candidate_threshold` | ignored |
//! | `candidate_threshold ≤ s < accept_threshold` | reported as a potential match |
//! | `s ≥ accept_threshold` | verdict mapped to a label and written to the article |
//!
//! Each label is written in its own transaction. A failed write is logged
//! and counted, and the pass moves on to the next article. Labeled articles
//! are excluded by the selection query, so a second pass over an unchanged
//! store writes nothing.

use crate::config::LabelerConfig;
use crate::embedding::{EmbeddingError, TextEmbedder};
use crate::models::{FactCheck, UnlabeledArticle, VerifiedLabel};
use crate::similarity::{best_match, similarity_matrix};
use crate::store::{Store, StoreError};
use crate::utils::truncate_for_log;
use crate::verdict::VerdictMapper;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Why a labeling pass stopped before finishing.
///
/// Both variants abort the pass before any label is written. Failures of
/// individual label writes are not errors; they are counted in
/// [`LabelReport::failed`].
#[derive(Debug, Error)]
pub enum LabelError {
    /// The unlabeled articles or the fact-checks could not be read.
    #[error("failed to load input data: {0}")]
    Load(#[source] StoreError),

    /// The embedder failed or returned the wrong number of vectors.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Data source and sink of a labeling pass.
pub trait LabelStore {
    /// Articles with no verified label, in ascending id order.
    async fn unlabeled_articles(&self) -> Result<Vec<UnlabeledArticle>, StoreError>;

    /// Every stored fact-check, in ascending id order.
    async fn fact_checks(&self) -> Result<Vec<FactCheck>, StoreError>;

    /// Write `label` to an article that is still unlabeled.
    ///
    /// Returns the number of rows updated (`0` or `1`).
    async fn apply_label(
        &self,
        article_id: i64,
        label: VerifiedLabel,
        source: &str,
    ) -> Result<u64, StoreError>;
}

impl LabelStore for Store {
    async fn unlabeled_articles(&self) -> Result<Vec<UnlabeledArticle>, StoreError> {
        Store::unlabeled_articles(self).await
    }

    async fn fact_checks(&self) -> Result<Vec<FactCheck>, StoreError> {
        Store::fact_checks(self).await
    }

    async fn apply_label(
        &self,
        article_id: i64,
        label: VerifiedLabel,
        source: &str,
    ) -> Result<u64, StoreError> {
        Store::apply_label(self, article_id, label, source).await
    }
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassOutcome {
    #[default]
    Completed,
    /// No unlabeled articles in the store.
    NothingToDo,
    /// No fact-checks to compare against.
    NoReferenceKnowledge,
}

/// Summary of a labeling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelReport {
    pub outcome: PassOutcome,
    pub articles: usize,
    pub fact_checks: usize,
    /// Labels written to the store.
    pub accepted: usize,
    /// Matches between the candidate and acceptance thresholds.
    pub potential: usize,
    /// Accepted-score matches whose verdict maps to no label.
    pub ambiguous: usize,
    /// Updates that affected no row (article deleted or already labeled).
    pub vanished: usize,
    /// Updates that failed with a store error.
    pub failed: usize,
}

/// Where a best-match score falls relative to the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Below,
    Potential,
    Accepted,
}

/// The best fact-check for one article.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchDecision {
    /// Index into the article list.
    pub article: usize,
    /// Index into the fact-check list.
    pub fact_check: usize,
    pub score: f32,
}

/// Inputs of one labeling pass, read before any model is needed.
#[derive(Debug, Clone, Default)]
pub struct PendingWork {
    pub articles: Vec<UnlabeledArticle>,
    pub facts: Vec<FactCheck>,
}

impl PendingWork {
    /// Read the unlabeled articles and then the fact-checks from `store`.
    ///
    /// # Arguments
    ///
    /// * `store` - Anything implementing [`LabelStore`]
    ///
    /// # Returns
    ///
    /// * `Result<PendingWork, LabelError>` - Both input sets, or
    ///   [`LabelError::Load`] if either read fails
    pub async fn load<S: LabelStore>(store: &S) -> Result<Self, LabelError> {
        let articles = store.unlabeled_articles().await.map_err(LabelError::Load)?;
        let facts = store.fact_checks().await.map_err(LabelError::Load)?;
        Ok(Self { articles, facts })
    }

    /// The outcome of a pass that has nothing to compare, or `None` when
    /// both sets are non-empty. Empty articles take precedence.
    pub fn idle_outcome(&self) -> Option<PassOutcome> {
        if self.articles.is_empty() {
            Some(PassOutcome::NothingToDo)
        } else if self.facts.is_empty() {
            Some(PassOutcome::NoReferenceKnowledge)
        } else {
            None
        }
    }

    /// An empty report carrying the input sizes and the idle outcome, if any.
    pub fn report(&self) -> LabelReport {
        LabelReport {
            outcome: self.idle_outcome().unwrap_or_default(),
            articles: self.articles.len(),
            fact_checks: self.facts.len(),
            ..Default::default()
        }
    }
}

/// Matches article titles against fact-check claims and writes labels.
///
/// The embedder is generic so passes can run against the BERT model or a
/// deterministic test double.
///
/// # Examples
///
/// ```ignore
/// let work = PendingWork::load(&store).await?;
/// let embedder = SentenceEmbedder::load(&config)?;
/// let report = Labeler::new(config, embedder).label(&store, &work).await?;
/// println!("{} articles tagged", report.accepted);
/// ```
pub struct Labeler<E> {
    config: LabelerConfig,
    mapper: VerdictMapper,
    embedder: E,
}

impl<E: TextEmbedder> Labeler<E> {
    /// Build a labeler from its configuration and an embedder.
    ///
    /// # Arguments
    ///
    /// * `config` - Thresholds, model name and verdict rules
    /// * `embedder` - Turns titles and claims into vectors
    ///
    /// # Returns
    ///
    /// * `Labeler<E>` - Ready to run passes; the verdict mapper is compiled
    ///   from `config.verdict_rules`
    pub fn new(config: LabelerConfig, embedder: E) -> Self {
        let mapper = VerdictMapper::new(config.verdict_rules.clone());
        Self {
            config,
            mapper,
            embedder,
        }
    }

    /// Classify a best-match score against the configured thresholds.
    ///
    /// # Arguments
    ///
    /// * `score` - Cosine similarity of an article and its best fact-check
    ///
    /// # Returns
    ///
    /// * `MatchTier` - `Accepted` at or above `accept_threshold`, `Potential`
    ///   at or above `candidate_threshold`, `Below` otherwise (including NaN)
    ///
    /// # Examples
    ///
    /// ```ignore
    /// assert_eq!(labeler.tier(0.85), MatchTier::Accepted);
    /// assert_eq!(labeler.tier(0.6), MatchTier::Potential);
    /// ```
    pub fn tier(&self, score: f32) -> MatchTier {
        if score >= self.config.accept_threshold {
            MatchTier::Accepted
        } else if score >= self.config.candidate_threshold {
            MatchTier::Potential
        } else {
            MatchTier::Below
        }
    }

    /// Best fact-check per article. Ties go to the earliest fact-check in
    /// `facts`, which the store returns in ascending id order.
    #[instrument(level = "info", skip_all, fields(articles = articles.len(), fact_checks = facts.len()))]
    pub fn best_matches(
        &self,
        articles: &[UnlabeledArticle],
        facts: &[FactCheck],
    ) -> Result<Vec<MatchDecision>, EmbeddingError> {
        let claims: Vec<&str> = facts.iter().map(|f| f.claim.as_str()).collect();
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();

        let t0 = Instant::now();
        let fact_vectors = embed_checked(&self.embedder, &claims)?;
        let article_vectors = embed_checked(&self.embedder, &titles)?;
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Encoded titles and claims"
        );

        let matrix = similarity_matrix(&article_vectors, &fact_vectors);
        Ok(matrix
            .iter()
            .enumerate()
            .filter_map(|(article, row)| {
                best_match(row).map(|(fact_check, score)| MatchDecision {
                    article,
                    fact_check,
                    score,
                })
            })
            .collect())
    }

    /// Load and label in one go.
    #[cfg(test)]
    pub async fn run<S: LabelStore>(&self, store: &S) -> Result<LabelReport, LabelError> {
        let work = PendingWork::load(store).await?;
        self.label(store, &work).await
    }

    /// Run one labeling pass over `work`, writing accepted matches to `store`.
    ///
    /// Embedding failures abort the pass before any write. Write failures
    /// are counted in the report instead.
    ///
    /// # Arguments
    ///
    /// * `store` - Sink for labels
    /// * `work` - Articles and fact-checks read by [`PendingWork::load`]
    ///
    /// # Returns
    ///
    /// * `Result<LabelReport, LabelError>` - Counts of the pass
    #[instrument(level = "info", skip_all, fields(model = %self.config.model_name))]
    pub async fn label<S: LabelStore>(
        &self,
        store: &S,
        work: &PendingWork,
    ) -> Result<LabelReport, LabelError> {
        let mut report = work.report();
        match report.outcome {
            PassOutcome::NothingToDo => {
                info!("No pending articles to check");
                return Ok(report);
            }
            PassOutcome::NoReferenceKnowledge => {
                warn!("No fact-checks available; run `judge` first");
                return Ok(report);
            }
            PassOutcome::Completed => {}
        }
        let (articles, facts) = (&work.articles, &work.facts);

        info!(
            articles = articles.len(),
            fact_checks = facts.len(),
            "Loaded articles and fact-checks"
        );

        let decisions = self.best_matches(articles, facts)?;

        for decision in decisions {
            let article = &articles[decision.article];
            let fact = &facts[decision.fact_check];
            let score = decision.score;

            match self.tier(score) {
                MatchTier::Below => continue,
                MatchTier::Potential => {
                    info!(
                        score = %format!("{score:.2}"),
                        article_id = article.id,
                        fact_check_id = fact.id,
                        news = %truncate_for_log(&article.title, 50),
                        fact = %truncate_for_log(&fact.claim, 50),
                        "Potential match"
                    );
                    report.potential += 1;
                }
                MatchTier::Accepted => {
                    let Some(label) = self.mapper.map(&fact.verdict) else {
                        debug!(
                            article_id = article.id,
                            verdict = %fact.verdict,
                            "High similarity but ambiguous verdict; skipping"
                        );
                        report.ambiguous += 1;
                        continue;
                    };

                    info!(
                        score = %format!("{score:.2}"),
                        news = %article.title,
                        fact = %fact.claim,
                        verdict = %fact.verdict,
                        "Match found"
                    );

                    let source = label_source(&fact.checker_site, score);
                    match store.apply_label(article.id, label, &source).await {
                        Ok(0) => {
                            debug!(article_id = article.id, "Article no longer pending; nothing written");
                            report.vanished += 1;
                        }
                        Ok(_) => {
                            info!(article_id = article.id, %label, "Tagged article");
                            report.accepted += 1;
                        }
                        Err(e) => {
                            error!(article_id = article.id, error = %e, "Failed to write label");
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        info!(
            accepted = report.accepted,
            potential = report.potential,
            ambiguous = report.ambiguous,
            vanished = report.vanished,
            failed = report.failed,
            "Matching complete"
        );
        Ok(report)
    }
}

/// Annotation stored in `label_source`, e.g. `Match with PolitiFact (Sim: 0.91)`.
pub fn label_source(checker_site: &str, score: f32) -> String {
    format!("Match with {checker_site} (Sim: {score:.2})")
}

fn embed_checked<E: TextEmbedder>(
    embedder: &E,
    texts: &[&str],
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let vectors = embedder.embed(texts)?;
    if vectors.len() != texts.len() {
        return Err(EmbeddingError::CountMismatch {
            expected: texts.len(),
            got: vectors.len(),
        });
    }
    Ok(vectors)
}
