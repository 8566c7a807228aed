use super::{Context, log_stats};
use crate::config::LabelerConfig;
use crate::embedding::sentence::SentenceEmbedder;
use crate::labeler::{LabelReport, Labeler, PassOutcome, PendingWork};
use std::error::Error;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Apply command-line threshold overrides on top of the configured ones.
fn with_overrides(
    mut config: LabelerConfig,
    accept: Option<f32>,
    candidate: Option<f32>,
) -> LabelerConfig {
    if let Some(accept) = accept {
        config.accept_threshold = accept;
    }
    if let Some(candidate) = candidate {
        config.candidate_threshold = candidate;
    }
    config
}

#[instrument(level = "info", skip_all)]
pub async fn label(
    ctx: &Context,
    accept: Option<f32>,
    candidate: Option<f32>,
) -> Result<(), Box<dyn Error>> {
    let config = with_overrides(ctx.config.labeler.clone(), accept, candidate);
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid labeler configuration");
        return Err(e.into());
    }
    if config.candidate_threshold > config.accept_threshold {
        warn!(
            accept = config.accept_threshold,
            candidate = config.candidate_threshold,
            "Candidate threshold above acceptance threshold; no match will be reported as potential"
        );
    }

    let store = ctx.open_store().await?;

    let work = match PendingWork::load(&store).await {
        Ok(work) => work,
        Err(e) => {
            error!(error = %e, "Labeling pass aborted; nothing was written");
            return Err(e.into());
        }
    };
    if work.idle_outcome().is_some() {
        log_outcome(&work.report());
        return log_stats(&store).await;
    }

    let started = Instant::now();
    let embedder = match SentenceEmbedder::load(&config) {
        Ok(embedder) => embedder,
        Err(e) => {
            error!(error = %e, "Embedding model unavailable");
            return Err(e.into());
        }
    };
    info!(elapsed = ?started.elapsed(), "Embedding model loaded");

    let labeler = Labeler::new(config, embedder);
    let report = match labeler.label(&store, &work).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Labeling pass aborted; nothing was written");
            return Err(e.into());
        }
    };

    log_outcome(&report);
    log_stats(&store).await
}

fn log_outcome(report: &LabelReport) {
    match report.outcome {
        PassOutcome::NothingToDo => info!("All articles already labeled"),
        PassOutcome::NoReferenceKnowledge => {
            warn!("No reference knowledge; collect fact-checks with `judge`")
        }
        PassOutcome::Completed => info!(
            articles = report.articles,
            fact_checks = report.fact_checks,
            tagged = report.accepted,
            potential = report.potential,
            failed = report.failed,
            "Labeling pass complete"
        ),
    }
}
