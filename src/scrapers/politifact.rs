//! PolitiFact fact-check judge.
//!
//! Walks the paginated fact-check list and stores one row per statement:
//! the claim text, the lower-cased verdict from the truth-o-meter image and
//! the link to the full fact-check.

use super::{ScrapeError, build_client, fetch_text};
use crate::config::JudgeConfig;
use crate::models::NewFactCheck;
use crate::store::Store;
use crate::utils::{squash_whitespace, truncate_for_log};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static ITEMS: Lazy<Selector> = Lazy::new(|| selector("li.o-listicle__item"));
static QUOTE_LINK: Lazy<Selector> = Lazy::new(|| selector("div.m-statement__quote a"));
static METER_IMG: Lazy<Selector> = Lazy::new(|| selector("div.m-statement__meter img"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

/// Verdict stored when the item carries no meter image.
pub const UNKNOWN_VERDICT: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JudgeReport {
    pub pages_scanned: u32,
    pub pages_failed: u32,
    pub saved: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Scrape `config.pages` list pages and store every fact-check found.
#[instrument(level = "info", skip_all, fields(pages = config.pages))]
pub async fn judge(store: &Store, config: &JudgeConfig) -> Result<JudgeReport, ScrapeError> {
    let client = build_client(&config.user_agent, config.request_timeout())?;
    let mut report = JudgeReport::default();

    for page in 1..=config.pages {
        match scrape_page(&client, config, page).await {
            Ok(facts) => {
                report.pages_scanned += 1;
                store_facts(store, &facts, &mut report).await;
            }
            Err(e) => {
                error!(page, error = %e, "Could not fetch list page");
                report.pages_failed += 1;
            }
        }
        sleep(config.delay()).await;
    }

    info!(
        saved = report.saved,
        duplicates = report.duplicates,
        pages_failed = report.pages_failed,
        "Judge pass complete"
    );
    Ok(report)
}

#[instrument(level = "info", skip(client, config))]
async fn scrape_page(
    client: &Client,
    config: &JudgeConfig,
    page: u32,
) -> Result<Vec<NewFactCheck>, ScrapeError> {
    let url = config.page_url(page);
    let html = fetch_text(client, &url).await?;
    let facts = parse_listing(&html, &config.site_root, &config.checker_site);
    if facts.is_empty() {
        warn!(%url, "No fact-check items found; has the page layout changed?");
    } else {
        info!(count = facts.len(), "Extracted fact-checks");
    }
    Ok(facts)
}

async fn store_facts(store: &Store, facts: &[NewFactCheck], report: &mut JudgeReport) {
    for fact in facts {
        match store.insert_fact_check(fact).await {
            Ok(true) => {
                report.saved += 1;
                info!(
                    verdict = %fact.verdict,
                    claim = %truncate_for_log(&fact.claim, 40),
                    "Verdict saved"
                );
            }
            Ok(false) => report.duplicates += 1,
            Err(e) => {
                report.failed += 1;
                error!(error = %e, url = %fact.source_url, "Database error");
            }
        }
    }
}

/// Parse one PolitiFact list page. Items without a quote link are skipped.
pub fn parse_listing(html: &str, site_root: &str, checker_site: &str) -> Vec<NewFactCheck> {
    let document = Html::parse_document(html);
    let root = Url::parse(site_root).ok();

    document
        .select(&ITEMS)
        .filter_map(|item| parse_item(item, root.as_ref(), site_root, checker_site))
        .collect()
}

fn parse_item(
    item: ElementRef<'_>,
    root: Option<&Url>,
    site_root: &str,
    checker_site: &str,
) -> Option<NewFactCheck> {
    let Some(link) = item.select(&QUOTE_LINK).next() else {
        debug!("Item without a statement quote; skipped");
        return None;
    };

    let claim = squash_whitespace(&link.text().collect::<String>());
    let href = link.value().attr("href").unwrap_or_default();
    let source_url = resolve_link(root, site_root, href);

    let verdict = item
        .select(&METER_IMG)
        .next()
        .and_then(|img| img.value().attr("alt"))
        .map(|alt| alt.trim().to_lowercase())
        .filter(|alt| !alt.is_empty())
        .unwrap_or_else(|| UNKNOWN_VERDICT.to_string());

    Some(NewFactCheck {
        claim,
        verdict,
        source_url,
        checker_site: checker_site.to_string(),
    })
}

fn resolve_link(root: Option<&Url>, site_root: &str, href: &str) -> String {
    match root.and_then(|r| r.join(href).ok()) {
        Some(url) => url.to_string(),
        None => format!("{}{}", site_root.trim_end_matches('/'), href),
    }
}
