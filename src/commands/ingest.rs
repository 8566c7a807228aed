use super::{Context, log_stats};
use crate::scrapers::{news, politifact};
use crate::store::Store;
use std::error::Error;
use tracing::{error, info, instrument};

#[instrument(level = "info", skip_all, fields(path = %ctx.db_path.display()))]
pub async fn init_db(ctx: &Context) -> Result<(), Box<dyn Error>> {
    let store = match Store::create(&ctx.db_path).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Could not create database");
            return Err(e.into());
        }
    };
    info!("Database ready with articles, fact_checks and predictions tables");
    log_stats(&store).await
}

#[instrument(level = "info", skip_all)]
pub async fn hunt(ctx: &Context, entries: Option<usize>) -> Result<(), Box<dyn Error>> {
    let store = ctx.open_store().await?;
    let mut config = ctx.config.hunter.clone();
    if let Some(entries) = entries {
        config.entries_per_feed = entries;
    }

    let report = news::hunt(&store, &config).await?;
    for feed in &report.feeds {
        info!(source = %feed.name, indexed = feed.indexed, saved = feed.saved, "New articles");
    }
    info!(total = report.total_saved(), "Hunt complete");
    log_stats(&store).await
}

#[instrument(level = "info", skip_all)]
pub async fn judge(ctx: &Context, pages: Option<u32>) -> Result<(), Box<dyn Error>> {
    let store = ctx.open_store().await?;
    let mut config = ctx.config.judge.clone();
    if let Some(pages) = pages {
        config.pages = pages;
    }

    let report = politifact::judge(&store, &config).await?;
    info!(
        saved = report.saved,
        duplicates = report.duplicates,
        failed = report.failed,
        pages_scanned = report.pages_scanned,
        pages_failed = report.pages_failed,
        "Judgement complete"
    );
    log_stats(&store).await
}
