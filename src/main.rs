//! # Fake News Lake
//!
//! A data pipeline that collects news articles and published fact-checks
//! into one SQLite store, labels articles by semantic similarity to the
//! fact-checked claims, and trains a bag-of-words classifier on the result.
//!
//! ## Usage
//!
//! ```sh
//! fake_news_lake init-db
//! fake_news_lake hunt
//! fake_news_lake judge
//! fake_news_lake label
//! fake_news_lake train
//! fake_news_lake predict
//! ```
//!
//! ## Architecture
//!
//! 1. **Hunting**: read RSS / Atom feeds and store new articles
//! 2. **Judging**: scrape PolitiFact and store claims with their verdicts
//! 3. **Labeling**: embed titles and claims, match them by cosine similarity
//!    and write FAKE / REAL onto confidently matched articles
//! 4. **Classifying**: train TF-IDF + logistic regression on labeled
//!    articles, then score the ones not processed yet

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod classifier;
mod cli;
mod commands;
mod config;
mod embedding;
mod labeler;
mod models;
mod scrapers;
mod similarity;
mod store;
mod utils;
mod verdict;

use cli::{Cli, Command};
use commands::Context;
use config::AppConfig;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();

    let args = Cli::parse();
    debug!(?args.command, ?args.db, ?args.config, "Parsed CLI arguments");

    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    let ctx = Context::new(config, args.db);
    info!(db = %ctx.db_path.display(), "fake_news_lake starting up");

    let result = match args.command {
        Command::InitDb => commands::init_db(&ctx).await,
        Command::Hunt { entries } => commands::hunt(&ctx, entries).await,
        Command::Judge { pages } => commands::judge(&ctx, pages).await,
        Command::Label { accept, candidate } => commands::label(&ctx, accept, candidate).await,
        Command::Train { balance, output } => commands::train(&ctx, balance, output).await,
        Command::Predict { model } => commands::predict(&ctx, model).await,
        Command::Validate { input, model } => commands::validate(&ctx, &input, model),
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        success = result.is_ok(),
        "Execution complete"
    );

    result
}
