//! Command-line interface definitions for the fake-news lake.
//!
//! Every pipeline stage is a subcommand. Global options may also be set
//! through environment variables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Create the database, then fill it
/// fake_news_lake init-db
/// fake_news_lake hunt
/// fake_news_lake judge --pages 5
///
/// # Label articles against the stored fact-checks
/// fake_news_lake --config lake.yaml label
///
/// # Train the classifier and score new articles
/// fake_news_lake train --balance
/// fake_news_lake predict
///
/// # Check the saved model against a held-out labeled set
/// fake_news_lake validate --input validation.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// SQLite database file (overrides `database_path` from the config)
    #[arg(long, global = true, env = "FAKE_NEWS_DB")]
    pub db: Option<PathBuf>,

    /// Optional path to a YAML config file
    #[arg(short, long, global = true, env = "FAKE_NEWS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create the database file and schema
    InitDb,

    /// Collect articles from the configured RSS feeds
    Hunt {
        /// Entries to keep per feed
        #[arg(long)]
        entries: Option<usize>,
    },

    /// Collect fact-checks from PolitiFact
    Judge {
        /// Number of list pages to scan
        #[arg(long)]
        pages: Option<u32>,
    },

    /// Label articles by semantic match against fact-checks
    Label {
        /// Override the acceptance threshold
        #[arg(long)]
        accept: Option<f32>,

        /// Override the candidate threshold
        #[arg(long)]
        candidate: Option<f32>,
    },

    /// Train the bag-of-words classifier on labeled articles
    Train {
        /// Undersample the majority class before splitting
        #[arg(long)]
        balance: bool,

        /// Where to write the model (overrides the config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score unprocessed articles with the trained classifier
    Predict {
        /// Model file to load (overrides the config)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Evaluate the trained classifier on a labeled JSON file never used for training
    Validate {
        /// JSON array of `{"text": ..., "truth": "FAKE" | "TRUE"}` rows
        #[arg(short, long)]
        input: PathBuf,

        /// Model file to load (overrides the config)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["fake_news_lake", "--db", "/tmp/lake.db", "init-db"]);

        assert_eq!(cli.db, Some(PathBuf::from("/tmp/lake.db")));
        assert_eq!(cli.command, Command::InitDb);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["fake_news_lake", "judge", "--pages", "3", "-c", "lake.yaml"]);

        assert_eq!(cli.config, Some(PathBuf::from("lake.yaml")));
        assert_eq!(cli.command, Command::Judge { pages: Some(3) });
    }

    #[test]
    fn test_label_threshold_overrides() {
        let cli = Cli::parse_from(["fake_news_lake", "label", "--accept", "0.9"]);

        assert_eq!(
            cli.command,
            Command::Label {
                accept: Some(0.9),
                candidate: None,
            }
        );
    }

    #[test]
    fn test_train_flags() {
        let cli = Cli::parse_from(["fake_news_lake", "train", "--balance", "-o", "m.json"]);

        assert_eq!(
            cli.command,
            Command::Train {
                balance: true,
                output: Some(PathBuf::from("m.json")),
            }
        );
    }

    #[test]
    fn test_validate_requires_input() {
        let cli = Cli::parse_from(["fake_news_lake", "validate", "-i", "held_out.json"]);

        assert_eq!(
            cli.command,
            Command::Validate {
                input: PathBuf::from("held_out.json"),
                model: None,
            }
        );
        assert!(Cli::try_parse_from(["fake_news_lake", "validate"]).is_err());
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["fake_news_lake"]).is_err());
    }
}
