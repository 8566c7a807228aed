//! Subcommand handlers.
//!
//! Each handler opens what it needs, runs one pipeline stage and logs a
//! summary. Fatal problems are logged with their diagnostic before the error
//! is returned to `main`.

mod classify;
mod ingest;
mod label;

pub use classify::{predict, train, validate};
pub use ingest::{hunt, init_db, judge};
pub use label::label;

use crate::config::AppConfig;
use crate::store::Store;
use std::error::Error;
use std::path::PathBuf;
use tracing::{error, info};

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: AppConfig,
    pub db_path: PathBuf,
}

impl Context {
    /// `--db` wins over the config file.
    pub fn new(config: AppConfig, db_override: Option<PathBuf>) -> Self {
        let db_path = db_override.unwrap_or_else(|| config.database_path.clone());
        Self { config, db_path }
    }

    /// Open the existing store, logging a hint when it is missing.
    pub async fn open_store(&self) -> Result<Store, Box<dyn Error>> {
        match Store::open(&self.db_path).await {
            Ok(store) => Ok(store),
            Err(e) => {
                error!(path = %self.db_path.display(), error = %e, "Cannot open database");
                Err(e.into())
            }
        }
    }
}

/// Log the row counts of the store.
pub async fn log_stats(store: &Store) -> Result<(), Box<dyn Error>> {
    let stats = store.stats().await?;
    info!(
        db = %store.path().display(),
        articles = stats.articles,
        labeled = stats.labeled,
        processed = stats.processed,
        fact_checks = stats.fact_checks,
        predictions = stats.predictions,
        "Store summary"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_override() {
        let config = AppConfig::default();
        let ctx = Context::new(config.clone(), None);
        assert_eq!(ctx.db_path, config.database_path);

        let ctx = Context::new(config, Some(PathBuf::from("/tmp/other.db")));
        assert_eq!(ctx.db_path, PathBuf::from("/tmp/other.db"));
    }

    #[tokio::test]
    async fn test_open_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(AppConfig::default(), Some(dir.path().join("absent.db")));
        let err = ctx.open_store().await.unwrap_err();
        assert!(err.to_string().contains("init-db"));
    }
}
