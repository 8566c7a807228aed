//! SQLite storage for articles, fact-checks and predictions.
//!
//! The store is a single SQLite file accessed by one process at a time. The
//! pool is capped at one connection so every statement runs on the same
//! writer. Duplicate detection relies on SQLite constraints:
//!
//! - `articles.url` is `UNIQUE`; re-ingesting a URL leaves the row untouched.
//! - `fact_checks` is `UNIQUE (claim, verdict, source_url, checker_site)`.
//!
//! Both inserts use `INSERT OR IGNORE` and report whether a row was added.
//! Two processes writing concurrently only get SQLite's own write isolation.

#[cfg(test)]
use crate::models::Article;
use crate::models::{
    FactCheck, LabeledText, NewArticle, NewFactCheck, PendingArticle, Prediction,
    UnlabeledArticle, VerifiedLabel,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

const SCHEMA: &str = include_str!("schema.sql");

/// Failures of the SQLite store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file does not exist; only `init-db` creates it.
    #[error("database not found at {path} (run `init-db` first)")]
    Missing { path: PathBuf },

    /// The parent directory of a new database could not be created.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Row counts reported after each pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub articles: i64,
    pub labeled: i64,
    pub processed: i64,
    pub fact_checks: i64,
    pub predictions: i64,
}

/// Handle to the pipeline's SQLite file. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
    path: PathBuf,
}

impl Store {
    /// Create the database file (and its parent directory) and ensure the schema.
    ///
    /// Running it against an existing database is harmless: the schema uses
    /// `CREATE TABLE IF NOT EXISTS` and no rows are touched.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the SQLite file
    ///
    /// # Returns
    ///
    /// * `Result<Store, StoreError>` - An open store with all three tables
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let store = Store::create(Path::new("data/database.db")).await?;
    /// assert_eq!(store.stats().await?.articles, 0);
    /// ```
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn create(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::connect(path, true).await
    }

    /// Open an existing database file. A missing file is a missing prerequisite,
    /// never silently created.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.is_file() {
            return Err(StoreError::Missing {
                path: path.to_path_buf(),
            });
        }
        Self::connect(path, false).await
    }

    async fn connect(path: &Path, create: bool) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        info!("Tables ensured to exist");

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Location of the SQLite file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert an article unless its URL is already stored. Returns `true` when a row was added.
    #[instrument(level = "debug", skip_all, fields(url = %article.url))]
    pub async fn insert_article(&self, article: &NewArticle) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO articles (url, source, title, text, authors, publish_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&article.url)
        .bind(&article.source)
        .bind(&article.title)
        .bind(&article.text)
        .bind(&article.authors)
        .bind(&article.publish_date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a fact-check unless the same natural key is already stored.
    #[instrument(level = "debug", skip_all, fields(checker = %fact.checker_site))]
    pub async fn insert_fact_check(&self, fact: &NewFactCheck) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO fact_checks (claim, verdict, source_url, checker_site)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&fact.claim)
        .bind(&fact.verdict)
        .bind(&fact.source_url)
        .bind(&fact.checker_site)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Articles without a verified label, ordered by id.
    pub async fn unlabeled_articles(&self) -> Result<Vec<UnlabeledArticle>, StoreError> {
        let rows = sqlx::query_as::<_, UnlabeledArticle>(
            "SELECT id, COALESCE(title, '') AS title FROM articles WHERE verified_label IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        debug!(count = rows.len(), "Loaded unlabeled articles");
        Ok(rows)
    }

    /// Every fact-check, ordered by id.
    pub async fn fact_checks(&self) -> Result<Vec<FactCheck>, StoreError> {
        let rows = sqlx::query_as::<_, FactCheck>(
            "SELECT id, claim, verdict, source_url, checker_site FROM fact_checks ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        debug!(count = rows.len(), "Loaded fact-checks");
        Ok(rows)
    }

    /// Write a verified label onto one article in its own transaction.
    ///
    /// Only rows that are still unlabeled are touched, so a label is written
    /// at most once. Returns the number of affected rows: `0` when the
    /// article is gone or was labeled in the meantime. A failed statement
    /// drops the transaction, which rolls it back.
    #[instrument(level = "debug", skip(self, source))]
    pub async fn apply_label(
        &self,
        article_id: i64,
        label: VerifiedLabel,
        source: &str,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET verified_label = ?1, label_source = ?2
            WHERE id = ?3 AND verified_label IS NULL
            "#,
        )
        .bind(label.as_i64())
        .bind(source)
        .bind(article_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    /// One article by id, `None` when no such row exists.
    #[cfg(test)]
    pub async fn article(&self, id: i64) -> Result<Option<Article>, StoreError> {
        let row = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, url, source, title, text, authors, publish_date,
                   CAST(scraped_at AS TEXT) AS scraped_at,
                   is_processed, verified_label, label_source
            FROM articles WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Body text and label of every labeled article, the classifier's training signal.
    pub async fn labeled_texts(&self) -> Result<Vec<LabeledText>, StoreError> {
        let rows = sqlx::query_as::<_, LabeledText>(
            "SELECT COALESCE(text, '') AS text, verified_label FROM articles WHERE verified_label IS NOT NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Articles the classifier has not scored yet.
    pub async fn pending_articles(&self) -> Result<Vec<PendingArticle>, StoreError> {
        let rows = sqlx::query_as::<_, PendingArticle>(
            r#"
            SELECT id, COALESCE(title, '') AS title, COALESCE(text, '') AS text,
                   COALESCE(source, '') AS source
            FROM articles WHERE is_processed = 0 ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Persist predictions and mark their articles processed, all or nothing.
    #[instrument(level = "info", skip_all, fields(count = predictions.len()))]
    pub async fn save_predictions(&self, predictions: &[Prediction]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for prediction in predictions {
            sqlx::query(
                r#"
                INSERT INTO predictions (article_id, model_version, predicted_label, confidence_score)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(prediction.article_id)
            .bind(&prediction.model_version)
            .bind(prediction.predicted_label.as_i64())
            .bind(prediction.confidence)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE articles SET is_processed = 1 WHERE id = ?1")
                .bind(prediction.article_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Count rows across the three tables.
    ///
    /// # Returns
    ///
    /// * `Result<StoreStats, StoreError>` - Total, labeled and processed
    ///   articles plus fact-check and prediction counts
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let stats = store.stats().await?;
    /// info!(articles = stats.articles, labeled = stats.labeled, "Store summary");
    /// ```
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let (articles, labeled, processed): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(verified_label IS NOT NULL), 0),
                   COALESCE(SUM(is_processed != 0), 0)
            FROM articles
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        let (fact_checks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fact_checks")
            .fetch_one(&self.pool)
            .await?;
        let (predictions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM predictions")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            articles,
            labeled,
            processed,
            fact_checks,
            predictions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNKNOWN;
    use tempfile::TempDir;

    async fn temp_store() -> (TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("data").join("lake.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn article(url: &str, title: &str) -> NewArticle {
        NewArticle {
            url: url.to_string(),
            source: "BBC News".to_string(),
            title: title.to_string(),
            text: "body ".repeat(40),
            authors: UNKNOWN.to_string(),
            publish_date: UNKNOWN.to_string(),
        }
    }

    fn fact(claim: &str, verdict: &str) -> NewFactCheck {
        NewFactCheck {
            claim: claim.to_string(),
            verdict: verdict.to_string(),
            source_url: "https://www.politifact.com/x".to_string(),
            checker_site: "PolitiFact".to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let err = Store::open(&dir.path().join("absent.db")).await.unwrap_err();
        assert!(matches!(err, StoreError::Missing { .. }));
    }

    #[tokio::test]
    async fn test_open_after_create() {
        let (dir, store) = temp_store().await;
        let path = store.path().to_path_buf();
        drop(store);
        let reopened = Store::open(&path).await.unwrap();
        assert_eq!(reopened.stats().await.unwrap(), StoreStats::default());
        drop(dir);
    }

    #[tokio::test]
    async fn test_duplicate_url_is_ignored() {
        let (_dir, store) = temp_store().await;
        assert!(store.insert_article(&article("https://a", "First")).await.unwrap());
        assert!(!store.insert_article(&article("https://a", "Second")).await.unwrap());

        let stored = store.article(1).await.unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("First"));
        assert!(!stored.processed());
        assert!(stored.scraped_at.is_some());
        assert_eq!(store.stats().await.unwrap().articles, 1);
    }

    #[tokio::test]
    async fn test_fact_check_natural_key() {
        let (_dir, store) = temp_store().await;
        assert!(store.insert_fact_check(&fact("Claim", "false")).await.unwrap());
        assert!(!store.insert_fact_check(&fact("Claim", "false")).await.unwrap());
        assert!(store.insert_fact_check(&fact("Claim", "true")).await.unwrap());

        let facts = store.fact_checks().await.unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].verdict, "false");
        assert_eq!(facts[1].verdict, "true");
    }

    #[tokio::test]
    async fn test_apply_label_once() {
        let (_dir, store) = temp_store().await;
        store.insert_article(&article("https://a", "A")).await.unwrap();
        store.insert_article(&article("https://b", "B")).await.unwrap();

        let n = store
            .apply_label(1, VerifiedLabel::Fake, "Match with PolitiFact (Sim: 0.91)")
            .await
            .unwrap();
        assert_eq!(n, 1);

        let again = store
            .apply_label(1, VerifiedLabel::Real, "second")
            .await
            .unwrap();
        assert_eq!(again, 0);

        let stored = store.article(1).await.unwrap().unwrap();
        assert_eq!(stored.label(), Some(VerifiedLabel::Fake));
        assert_eq!(
            stored.label_source.as_deref(),
            Some("Match with PolitiFact (Sim: 0.91)")
        );

        let unlabeled = store.unlabeled_articles().await.unwrap();
        assert_eq!(
            unlabeled,
            vec![UnlabeledArticle {
                id: 2,
                title: "B".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_apply_label_to_missing_row() {
        let (_dir, store) = temp_store().await;
        let n = store.apply_label(42, VerifiedLabel::Real, "x").await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_predictions_mark_articles_processed() {
        let (_dir, store) = temp_store().await;
        store.insert_article(&article("https://a", "A")).await.unwrap();
        store.insert_article(&article("https://b", "B")).await.unwrap();
        assert_eq!(store.pending_articles().await.unwrap().len(), 2);

        store
            .save_predictions(&[Prediction {
                article_id: 2,
                model_version: "bow_logit_v1".to_string(),
                predicted_label: VerifiedLabel::Fake,
                confidence: 0.8,
            }])
            .await
            .unwrap();

        let pending = store.pending_articles().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, 1);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.predictions, 1);
        assert_eq!(stats.processed, 1);
    }

    #[tokio::test]
    async fn test_failed_prediction_batch_rolls_back() {
        let (_dir, store) = temp_store().await;
        store.insert_article(&article("https://a", "A")).await.unwrap();

        let result = store
            .save_predictions(&[
                Prediction {
                    article_id: 1,
                    model_version: "v".to_string(),
                    predicted_label: VerifiedLabel::Real,
                    confidence: 0.6,
                },
                Prediction {
                    article_id: 999,
                    model_version: "v".to_string(),
                    predicted_label: VerifiedLabel::Real,
                    confidence: 0.6,
                },
            ])
            .await;
        assert!(result.is_err());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.predictions, 0);
        assert_eq!(stats.processed, 0);
    }

    #[tokio::test]
    async fn test_labeled_texts() {
        let (_dir, store) = temp_store().await;
        store.insert_article(&article("https://a", "A")).await.unwrap();
        store.insert_article(&article("https://b", "B")).await.unwrap();
        store.apply_label(2, VerifiedLabel::Real, "manual").await.unwrap();

        let labeled = store.labeled_texts().await.unwrap();
        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].verified_label, 0);
    }
}
