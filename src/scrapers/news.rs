//! RSS / Atom news hunter.
//!
//! Reads each configured feed, keeps the newest entries and downloads the
//! linked pages. Title, body text, authors and publication date are
//! extracted from the article HTML; pages with too little body text
//! (video-only pages, paywall stubs) are discarded.
//!
//! Rows are inserted with insert-if-url-absent semantics, so re-running the
//! hunter over the same feeds only adds articles it has not seen before.

use super::{ScrapeError, build_client, fetch_text};
use crate::config::{FeedSource, HunterConfig};
use crate::models::{NewArticle, UNKNOWN};
use crate::store::Store;
use crate::utils::{squash_whitespace, truncate_for_log};
use chrono::DateTime;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use reqwest::Client;
use scraper::{Html, Selector};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static ARTICLE_PARAGRAPHS: Lazy<Selector> = Lazy::new(|| selector("article p"));
static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| selector("p"));
static AUTHORS: Lazy<Selector> = Lazy::new(|| {
    selector(r#"meta[name="author"], meta[property="article:author"], meta[name="byl"]"#)
});
static PUBLISHED_META: Lazy<Selector> = Lazy::new(|| {
    selector(r#"meta[property="article:published_time"], meta[name="pubdate"], meta[itemprop="datePublished"]"#)
});
static TIME_TAG: Lazy<Selector> = Lazy::new(|| selector("time[datetime]"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

/// What happened to one feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Saved,
    Duplicate,
    TooShort,
    Failed,
}

/// Counts for one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedReport {
    pub name: String,
    pub indexed: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub too_short: usize,
    pub failed: usize,
}

impl FeedReport {
    fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Saved => self.saved += 1,
            EntryOutcome::Duplicate => self.duplicates += 1,
            EntryOutcome::TooShort => self.too_short += 1,
            EntryOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HuntReport {
    pub feeds: Vec<FeedReport>,
}

impl HuntReport {
    pub fn total_saved(&self) -> usize {
        self.feeds.iter().map(|f| f.saved).sum()
    }
}

/// Scan every configured feed and store new articles.
#[instrument(level = "info", skip_all, fields(feeds = config.feeds.len()))]
pub async fn hunt(store: &Store, config: &HunterConfig) -> Result<HuntReport, ScrapeError> {
    let client = build_client(&config.user_agent, config.request_timeout())?;
    let mut report = HuntReport::default();

    for feed in &config.feeds {
        let feed_report = process_feed(store, &client, feed, config).await;
        info!(
            source = %feed.name,
            indexed = feed_report.indexed,
            saved = feed_report.saved,
            duplicates = feed_report.duplicates,
            too_short = feed_report.too_short,
            failed = feed_report.failed,
            "Feed done"
        );
        report.feeds.push(feed_report);
    }

    Ok(report)
}

#[instrument(level = "info", skip_all, fields(source = %feed.name))]
async fn process_feed(
    store: &Store,
    client: &Client,
    feed: &FeedSource,
    config: &HunterConfig,
) -> FeedReport {
    let mut report = FeedReport {
        name: feed.name.clone(),
        ..Default::default()
    };

    let urls = match index_feed(client, &feed.url, config.entries_per_feed).await {
        Ok(urls) => urls,
        Err(e) => {
            error!(error = %e, url = %feed.url, "Error reaching feed");
            return report;
        }
    };
    report.indexed = urls.len();
    info!(count = urls.len(), "Processing latest feed entries");

    let outcomes: Vec<EntryOutcome> = stream::iter(urls)
        .then(|url: String| async move {
            let outcome = fetch_and_store(store, client, &feed.name, &url, config.min_text_len).await;
            sleep(config.delay()).await;
            outcome
        })
        .collect()
        .await;

    for outcome in outcomes {
        report.record(outcome);
    }
    report
}

/// Fetch a feed and return up to `limit` unique entry links, newest first as listed.
#[instrument(level = "info", skip(client))]
pub async fn index_feed(
    client: &Client,
    feed_url: &str,
    limit: usize,
) -> Result<Vec<String>, ScrapeError> {
    let xml = fetch_text(client, feed_url).await?;
    let links = parse_feed(&xml)?;
    debug!(found = links.len(), "Parsed feed entries");
    Ok(links.into_iter().unique().take(limit).collect())
}

async fn fetch_and_store(
    store: &Store,
    client: &Client,
    source: &str,
    url: &str,
    min_text_len: usize,
) -> EntryOutcome {
    let html = match fetch_text(client, url).await {
        Ok(html) => html,
        Err(e) => {
            error!(error = %e, %url, "Scrape error");
            return EntryOutcome::Failed;
        }
    };

    let article = parse_article_html(url, source, &html);
    if !is_substantial(&article.text, min_text_len) {
        warn!(%url, chars = article.text.chars().count(), "Content too short; discarded");
        return EntryOutcome::TooShort;
    }

    match store.insert_article(&article).await {
        Ok(true) => {
            info!(title = %truncate_for_log(&article.title, 40), "Saved article");
            EntryOutcome::Saved
        }
        Ok(false) => {
            debug!(title = %truncate_for_log(&article.title, 40), "Skipped duplicate");
            EntryOutcome::Duplicate
        }
        Err(e) => {
            error!(error = %e, %url, "Database error");
            EntryOutcome::Failed
        }
    }
}

/// Body text must be strictly longer than `min_len` characters to be kept.
pub fn is_substantial(text: &str, min_len: usize) -> bool {
    text.chars().count() > min_len
}

/// Extract entry links from an RSS 2.0 (`item/link`) or Atom (`entry/link@href`) document.
pub fn parse_feed(xml: &str) -> Result<Vec<String>, ScrapeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut links = Vec::new();
    let mut in_entry = false;
    let mut in_link = false;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => in_entry = true,
                b"link" if in_entry => match link_href(&e)? {
                    LinkHref::Alternate(href) => links.push(href),
                    LinkHref::Other => {}
                    LinkHref::None => {
                        in_link = true;
                        text.clear();
                    }
                },
                _ => {}
            },
            Ok(Event::Empty(e)) if in_entry && e.local_name().as_ref() == b"link" => {
                if let LinkHref::Alternate(href) = link_href(&e)? {
                    links.push(href);
                }
            }
            Ok(Event::Text(t)) if in_link => {
                let raw = String::from_utf8_lossy(&t);
                let decoded = unescape(&raw).map_err(|e| ScrapeError::Feed(e.to_string()))?;
                text.push_str(&decoded);
            }
            Ok(Event::CData(t)) if in_link => text.push_str(&String::from_utf8_lossy(&t)),
            Ok(Event::GeneralRef(r)) if in_link => {
                let name = String::from_utf8_lossy(&r);
                if let Some(resolved) = resolve_entity(&name) {
                    text.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"link" if in_link => {
                    in_link = false;
                    let link = text.trim();
                    if !link.is_empty() {
                        links.push(link.to_string());
                    }
                }
                b"item" | b"entry" => in_entry = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ScrapeError::Feed(e.to_string())),
            _ => {}
        }
    }

    Ok(links)
}

enum LinkHref {
    /// Atom link to the article itself.
    Alternate(String),
    /// Atom link with another relation (comments, enclosures).
    Other,
    /// No `href`: an RSS link whose URL is the element text.
    None,
}

fn link_href(e: &BytesStart) -> Result<LinkHref, ScrapeError> {
    let mut href = None;
    let mut alternate = true;
    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"href" => {
                let raw = String::from_utf8_lossy(&attr.value);
                let value = unescape(&raw).map_err(|e| ScrapeError::Feed(e.to_string()))?;
                href = Some(value.trim().to_string());
            }
            b"rel" => alternate = attr.value.as_ref() == b"alternate",
            _ => {}
        }
    }
    Ok(match href {
        Some(href) if alternate && !href.is_empty() => LinkHref::Alternate(href),
        Some(_) => LinkHref::Other,
        None => LinkHref::None,
    })
}

fn resolve_entity(name: &str) -> Option<String> {
    if let Some(s) = resolve_predefined_entity(name) {
        return Some(s.to_string());
    }
    let code = name.strip_prefix('#')?;
    let value = match code.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => code.parse().ok()?,
    };
    char::from_u32(value).map(String::from)
}

/// Extract the article fields from a downloaded page.
pub fn parse_article_html(url: &str, source: &str, html: &str) -> NewArticle {
    let document = Html::parse_document(html);

    let title = document
        .select(&OG_TITLE)
        .find_map(|el| el.value().attr("content").map(squash_whitespace))
        .filter(|t| !t.is_empty())
        .or_else(|| first_text(&document, &TITLE))
        .or_else(|| first_text(&document, &H1))
        .unwrap_or_default();

    let mut paragraphs = paragraph_texts(&document, &ARTICLE_PARAGRAPHS);
    if paragraphs.is_empty() {
        paragraphs = paragraph_texts(&document, &PARAGRAPHS);
    }
    let text = paragraphs.join("\n");

    let authors = document
        .select(&AUTHORS)
        .filter_map(|el| el.value().attr("content"))
        .map(squash_whitespace)
        .filter(|a| !a.is_empty() && !a.starts_with("http"))
        .unique()
        .join(", ");

    let published = document
        .select(&PUBLISHED_META)
        .find_map(|el| el.value().attr("content"))
        .or_else(|| {
            document
                .select(&TIME_TAG)
                .find_map(|el| el.value().attr("datetime"))
        })
        .map(normalize_date);

    NewArticle {
        url: url.to_string(),
        source: source.to_string(),
        title,
        text,
        authors: if authors.is_empty() {
            UNKNOWN.to_string()
        } else {
            authors
        },
        publish_date: published.unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(|el| squash_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn paragraph_texts(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(|el| squash_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// RFC 3339 when the value parses as a timestamp, otherwise the trimmed raw value.
fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|_| raw.to_string())
}
